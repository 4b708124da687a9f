//! Seekable reader adapters composing the decode pipeline.
//!
//! [`RangedReader`] carves a window out of a backing stream, and
//! [`ObfsReader`] strips the XOR obfuscation from a compressed container
//! payload. A compressed container stacks them under a zstd decoder; an
//! uncompressed one uses the window directly.

#[doc(inline)]
pub use self::obfs::*;
#[doc(inline)]
pub use self::ranged::*;

mod obfs;
mod ranged;
