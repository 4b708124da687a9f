//! BIN container: the outer envelope of a VROMFS archive.
//!
//! On disk a container is a 16-byte header, an 8-byte extended header when
//! the magic says so, the payload (plain or zstd-compressed-and-obfuscated),
//! an MD5 of the plaintext unless the pack type waives it, and an optional
//! opaque 256-byte trailer.

#[doc(inline)]
pub use self::file::*;
#[doc(inline)]
pub use self::header::*;
#[doc(inline)]
pub use self::pack::*;

mod file;
mod header;
mod pack;
