//! Building BIN containers.

use std::{
	fs::File,
	io::{Read, Seek, Write},
	path::Path,
};

use md5::{Digest as _, Md5};
use tracing::debug;
use zstd::stream::write::Encoder;

use super::{
	file::EXTRA_LEN,
	header::{BinExtHeader, BinHeader, HeaderType, PackType, PlatformType, Version, EXT_HEADER_LEN},
};
use crate::{
	error::{Error, Result},
	integrity::{copy_exact, Md5Digest},
	reader::obfuscate,
};

const PACKED_SIZE_LIMIT: u64 = 1 << 26;

/// Framing choices for [`pack_into`].
#[derive(Debug, Clone)]
pub struct PackOptions {
	/// Target platform tag.
	pub platform: PlatformType,
	/// File version; selects the `VRFx` flavour when present.
	pub version: Option<Version>,
	/// Compress and obfuscate the payload.
	pub compressed: bool,
	/// Record an MD5 of the plaintext.
	pub checked: bool,
	/// Opaque trailing blob, exactly 256 bytes when given.
	pub extra: Option<Vec<u8>>,
}

impl Default for PackOptions {
	fn default() -> Self {
		Self {
			platform: PlatformType::Pc,
			version: None,
			compressed: true,
			checked: true,
			extra: None,
		}
	}
}

/// Pack `size` bytes of plaintext from `input` into a container written to
/// `output`.
///
/// `input` must be rewindable to position zero: the plain-payload path runs
/// one digest pass and one copy pass over it.
pub fn pack_into<R: Read + Seek, W: Write>(
	input: &mut R,
	output: &mut W,
	size: u64,
	opts: &PackOptions,
) -> Result<()> {
	let pack_type = PackType::from_flags(opts.compressed, opts.checked).ok_or_else(|| {
		Error::invalid("a container must be compressed, carry a digest, or both")
	})?;
	let size_u32 = u32::try_from(size)
		.map_err(|_| Error::invalid(format!("payload of {size} bytes exceeds the size field")))?;
	if let Some(extra) = &opts.extra {
		if extra.len() != EXTRA_LEN {
			return Err(Error::invalid(format!(
				"trailing blob must be exactly {EXTRA_LEN} bytes, got {}",
				extra.len()
			)));
		}
	}

	let mut digest = None;
	let mut payload = Vec::new();
	let packed_size = if opts.compressed {
		let mut encoder =
			Encoder::new(&mut payload, zstd::DEFAULT_COMPRESSION_LEVEL).map_err(Error::decompression)?;
		if opts.checked {
			let mut hasher = Md5::new();
			copy_exact(input, &mut encoder, size, |chunk| hasher.update(chunk))?;
			digest = Some(Md5Digest(hasher.finalize().into()));
		} else {
			copy_exact(input, &mut encoder, size, |_| {})?;
		}
		encoder.finish().map_err(Error::decompression)?;
		obfuscate(&mut payload);
		if payload.len() as u64 >= PACKED_SIZE_LIMIT {
			return Err(Error::invalid(format!(
				"compressed payload of {} bytes exceeds the 26-bit size field",
				payload.len()
			)));
		}
		payload.len() as u32
	} else {
		input.rewind()?;
		digest = Some(Md5Digest::from_reader(input, size)?);
		0
	};

	let header = BinHeader {
		header_type: if opts.version.is_some() {
			HeaderType::Vrfx
		} else {
			HeaderType::Vrfs
		},
		platform: opts.platform,
		size: size_u32,
		pack_type,
		packed_size,
	};
	output.write_all(&header.to_bytes()?)?;
	if let Some(version) = opts.version {
		let ext = BinExtHeader {
			size: EXT_HEADER_LEN as u16,
			flags: 0,
			version,
		};
		output.write_all(&ext.to_bytes()?)?;
	}

	if opts.compressed {
		output.write_all(&payload)?;
	} else {
		input.rewind()?;
		copy_exact(input, output, size, |_| {})?;
	}

	if let Some(digest) = &digest {
		output.write_all(digest.as_ref())?;
	}
	if let Some(extra) = &opts.extra {
		output.write_all(extra)?;
	}

	debug!(
		platform = %opts.platform,
		size,
		packed_size,
		pack_type = ?pack_type,
		"packed bin container"
	);
	Ok(())
}

/// Pack the file at `source` into a container at `target`.
pub fn pack(source: impl AsRef<Path>, target: impl AsRef<Path>, opts: &PackOptions) -> Result<()> {
	let mut input = File::open(source.as_ref())?;
	let size = input.metadata()?.len();
	let mut output = File::create(target.as_ref())?;
	pack_into(&mut input, &mut output, size, opts)
}
