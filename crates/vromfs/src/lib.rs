//! VROMFS game-asset archives.
//!
//! Two layers make up an archive on disk. The outer layer is the **BIN
//! container**: a small header carrying a platform tag and an optional
//! version, a payload that is either stored plain or zstd-compressed with a
//! light XOR obfuscation, an optional MD5 of the plaintext, and an optional
//! 256-byte trailing blob. The inner layer is the **VROMFS image**: an
//! addressable directory of named files with optional per-entry SHA-1
//! digests.
//!
//! [`container::BinFile`] opens a container and exposes its plaintext as a
//! lazy, seekable stream; [`image::VromfsFile`] sits on any seekable
//! plaintext source (typically that stream) and enumerates, extracts and
//! verifies entries. Both layers can also be built:
//! [`container::pack_into`] frames a plaintext payload, and
//! [`image::pack_into`] assembles a directory tree into an image.

#![warn(clippy::unwrap_used, missing_docs)]
#![deny(rust_2018_idioms)]

pub mod container;
pub mod error;
pub mod image;
pub mod integrity;
pub mod reader;
pub mod shared_names;

#[doc(inline)]
pub use self::error::{Error, Result};

use std::{
	ffi::OsString,
	path::{Path, PathBuf},
};

/// Temporary sibling (`target~`) written before the final rename, in the same
/// directory so the rename stays on one filesystem.
pub(crate) fn sibling_tmp(target: &Path) -> PathBuf {
	let mut name = target.file_name().map(OsString::from).unwrap_or_default();
	name.push("~");
	target.with_file_name(name)
}
