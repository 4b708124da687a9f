//! VROMFS image: the addressable file directory inside a container.
//!
//! Every logical block of the image — names table, data table, optional
//! SHA-1 table and each file body — starts on a 16-byte boundary relative to
//! the image start. The extended layout adds a digests header at 0x20,
//! shifting the names table to 0x30.

#[doc(inline)]
pub use self::file::*;
#[doc(inline)]
pub use self::layout::*;
#[doc(inline)]
pub use self::pack::*;

mod file;
mod layout;
mod names;
mod pack;
