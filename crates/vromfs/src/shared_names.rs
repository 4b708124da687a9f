//! Envelope of the shared-names (`nm`) entry.
//!
//! The entry opens with an eight-byte hash and a 32-byte dictionary stem —
//! all zeroes when no dictionary was involved, otherwise the hex stem of the
//! `<stem>.dict` entry it was compressed against — followed by a zstd frame
//! holding the names blob. The blob itself belongs to the BLK codec; this
//! module only peels the envelope.

use std::{
	fmt::Write as _,
	io::{BufReader, Read, Write},
	path::{Path, PathBuf},
};

use zstd::{dict::DecoderDictionary, stream::read::Decoder, stream::write::Encoder};

use crate::error::{Error, Result};

/// Length of the dictionary stem field.
pub const STEM_LEN: usize = 32;

/// Parsed shared-names envelope.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SharedNames {
	/// Hash field of unknown derivation; carried verbatim.
	pub hash: u64,
	/// Dictionary entry backing the compressed blob, if any.
	pub dict_path: Option<PathBuf>,
	/// Decompressed names blob.
	pub data: Vec<u8>,
}

/// Parse the envelope and decompress the blob, with `dictionary` when the
/// image provides one.
pub fn parse<R: Read>(
	reader: &mut R,
	dictionary: Option<&DecoderDictionary<'_>>,
) -> Result<SharedNames> {
	let mut head = [0u8; 8 + STEM_LEN];
	reader
		.read_exact(&mut head)
		.map_err(Error::truncated("shared-names header"))?;
	let hash = u64::from_le_bytes(head[..8].try_into().expect("eight bytes"));
	let stem: [u8; STEM_LEN] = head[8..].try_into().expect("stem bytes");
	let dict_path = (stem != [0u8; STEM_LEN]).then(|| {
		let mut name = String::with_capacity(STEM_LEN * 2 + 5);
		for byte in stem {
			let _ = write!(name, "{byte:02x}");
		}
		name.push_str(".dict");
		PathBuf::from(name)
	});

	let mut data = Vec::new();
	let buffered = BufReader::new(reader);
	let mut decoder = match dictionary {
		Some(dictionary) => {
			Decoder::with_prepared_dictionary(buffered, dictionary).map_err(Error::decompression)?
		}
		None => Decoder::with_buffer(buffered).map_err(Error::decompression)?,
	};
	decoder
		.read_to_end(&mut data)
		.map_err(Error::decompression)?;

	Ok(SharedNames {
		hash,
		dict_path,
		data,
	})
}

/// Write an envelope around `data`, naming `dict_path` in the stem field.
///
/// The blob is compressed without a dictionary, which matches how game data
/// ships its `nm` entry even when a dictionary is present for other files.
pub fn build<W: Write>(
	writer: &mut W,
	hash: u64,
	dict_path: Option<&Path>,
	data: &[u8],
) -> Result<()> {
	let stem = match dict_path {
		None => [0u8; STEM_LEN],
		Some(path) => stem_bytes(path)?,
	};
	writer.write_all(&hash.to_le_bytes())?;
	writer.write_all(&stem)?;
	let mut encoder =
		Encoder::new(writer, zstd::DEFAULT_COMPRESSION_LEVEL).map_err(Error::decompression)?;
	encoder.write_all(data)?;
	encoder.finish().map_err(Error::decompression)?;
	Ok(())
}

fn stem_bytes(path: &Path) -> Result<[u8; STEM_LEN]> {
	let stem = path
		.file_stem()
		.and_then(|stem| stem.to_str())
		.ok_or_else(|| Error::invalid(format!("dictionary path {} has no stem", path.display())))?;
	if stem.len() != STEM_LEN * 2 || !stem.bytes().all(|byte| byte.is_ascii_hexdigit()) {
		return Err(Error::invalid(format!(
			"dictionary stem {stem:?} is not {} hex digits",
			STEM_LEN * 2
		)));
	}
	let mut bytes = [0u8; STEM_LEN];
	for (slot, pair) in bytes.iter_mut().zip(stem.as_bytes().chunks_exact(2)) {
		let pair = std::str::from_utf8(pair).expect("hex digits are ascii");
		*slot = u8::from_str_radix(pair, 16).expect("hex digits checked above");
	}
	Ok(bytes)
}
