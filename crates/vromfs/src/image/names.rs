//! Entry-name encoding rules for the image names table.
//!
//! Names are NUL-terminated byte strings. The shared-names entry `nm` is
//! stored with a two-byte `ff 3f` prefix; leading slashes are stripped on
//! read, and an empty or all-slash name is rejected. Building refuses
//! absolute names outright.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

const NM_ENCODED: &[u8] = b"\xff\x3fnm";

/// Decode one name (terminator already stripped).
pub(crate) fn decode_name(bytes: &[u8]) -> Result<PathBuf> {
	if bytes == NM_ENCODED {
		return Ok(PathBuf::from("nm"));
	}
	let text = std::str::from_utf8(bytes)
		.map_err(|_| Error::format(format!("entry name {bytes:02x?} is not valid UTF-8")))?;
	let name = text.trim_start_matches('/');
	if name.is_empty() {
		return Err(Error::format("empty entry name"));
	}
	Ok(PathBuf::from(name))
}

/// Encode a relative entry name (terminator excluded).
pub(crate) fn encode_name(path: &Path) -> Result<Vec<u8>> {
	if path.is_absolute() {
		return Err(Error::invalid(format!(
			"absolute entry name {}",
			path.display()
		)));
	}
	let mut parts = Vec::new();
	for component in path.components() {
		match component {
			Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
				Error::invalid(format!("entry name {} is not valid UTF-8", path.display()))
			})?),
			Component::CurDir => {}
			_ => {
				return Err(Error::invalid(format!(
					"entry name {} escapes the image root",
					path.display()
				)))
			}
		}
	}
	if parts.is_empty() {
		return Err(Error::invalid("empty entry name"));
	}
	let name = parts.join("/");
	Ok(if name == "nm" {
		NM_ENCODED.to_vec()
	} else {
		name.into_bytes()
	})
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn plain_and_compound_names_round_trip() {
		for name in ["name", "pre/fix/name"] {
			assert_eq!(decode_name(name.as_bytes()).expect("decode"), Path::new(name));
			assert_eq!(
				encode_name(Path::new(name)).expect("encode"),
				name.as_bytes()
			);
		}
	}

	#[test]
	fn leading_slashes_are_stripped() {
		assert_eq!(
			decode_name(b"/version").expect("decode"),
			Path::new("version")
		);
	}

	#[test]
	fn nm_uses_the_sentinel() {
		assert_eq!(decode_name(b"\xff\x3fnm").expect("decode"), Path::new("nm"));
		assert_eq!(encode_name(Path::new("nm")).expect("encode"), b"\xff\x3fnm");
	}

	#[test]
	fn empty_or_root_names_are_rejected() {
		for bytes in [b"".as_slice(), b"/", b"//"] {
			assert!(matches!(
				decode_name(bytes),
				Err(crate::Error::Format { .. })
			));
		}
	}

	#[test]
	fn absolute_names_do_not_build() {
		assert!(matches!(
			encode_name(Path::new("/version")),
			Err(crate::Error::InvalidArgument { .. })
		));
	}
}
