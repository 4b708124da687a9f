//! Container engine: open, inspect, stream and verify.

use std::{
	fs::{self, File},
	io::{self, BufReader, Read, Seek, SeekFrom, Write},
	path::Path,
};

use tracing::{debug, trace};
use zstd::stream::read::Decoder;

use super::header::{
	BinExtHeader, BinHeader, PackType, PlatformType, Version, BIN_HEADER_LEN, EXT_HEADER_LEN,
};
use crate::{
	error::{Error, Result},
	integrity::{copy_exact, Md5Digest},
	reader::{ObfsReader, RangedReader},
	sibling_tmp,
};

/// Wire length of the optional trailing blob.
pub const EXTRA_LEN: usize = 0x100;

/// An opened BIN container over a seekable byte source.
///
/// Opening parses the headers, notes where the payload lives, remembers the
/// MD5 when the pack type carries one, and validates that the trailing blob
/// is absent or exactly 256 bytes. The payload itself is only touched when a
/// stream is requested. A container opened from a path owns its file handle
/// and releases it on drop; one opened from a caller-supplied reader leaves
/// the reader's lifetime to the caller.
#[derive(Debug)]
pub struct BinFile<S> {
	source: S,
	header: BinHeader,
	ext: Option<BinExtHeader>,
	payload_offset: u64,
	digest: Option<Md5Digest>,
	extra: Option<Vec<u8>>,
}

impl BinFile<File> {
	/// Open a container file.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		debug!(?path, "open bin container");
		Self::from_reader(File::open(path)?)
	}
}

impl<S: Read + Seek> BinFile<S> {
	/// Parse container metadata from `source`, starting at its current
	/// position.
	pub fn from_reader(mut source: S) -> Result<Self> {
		let mut head = [0u8; BIN_HEADER_LEN];
		source
			.read_exact(&mut head)
			.map_err(Error::truncated("container header"))?;
		let header = BinHeader::parse(&head)?;

		let ext = if header.header_type.extended() {
			let mut raw = [0u8; EXT_HEADER_LEN];
			source
				.read_exact(&mut raw)
				.map_err(Error::truncated("extended header"))?;
			Some(BinExtHeader::parse(&raw)?)
		} else {
			None
		};

		let payload_offset = source.stream_position()?;
		source.seek(SeekFrom::Current(i64::from(header.stored_size())))?;

		let digest = if header.pack_type.checked() {
			let mut raw = [0u8; 16];
			source
				.read_exact(&mut raw)
				.map_err(Error::truncated("payload digest"))?;
			Some(Md5Digest(raw))
		} else {
			None
		};

		let mut extra = Vec::new();
		source.read_to_end(&mut extra)?;
		let extra = match extra.len() {
			0 => None,
			EXTRA_LEN => Some(extra),
			n => {
				return Err(Error::format(format!(
					"trailing blob of {n} bytes, expected none or {EXTRA_LEN}"
				)))
			}
		};

		debug!(
			header_type = %header.header_type,
			platform = %header.platform,
			size = header.size,
			pack_type = ?header.pack_type,
			packed_size = header.packed_size,
			"parsed bin container"
		);
		Ok(Self {
			source,
			header,
			ext,
			payload_offset,
			digest,
			extra,
		})
	}

	/// Plaintext payload size in bytes.
	pub fn size(&self) -> u64 {
		u64::from(self.header.size)
	}

	/// Payload packing selector.
	pub fn pack_type(&self) -> PackType {
		self.header.pack_type
	}

	/// Target platform.
	pub fn platform(&self) -> PlatformType {
		self.header.platform
	}

	/// File version; `None` for the bare `VRFs` flavour.
	pub fn version(&self) -> Option<Version> {
		self.ext.map(|ext| ext.version)
	}

	/// Extended header, when the container has one.
	pub fn ext_header(&self) -> Option<&BinExtHeader> {
		self.ext.as_ref()
	}

	/// Whether the payload is compressed and obfuscated.
	pub fn compressed(&self) -> bool {
		self.header.pack_type.compressed()
	}

	/// Whether the container records a payload MD5.
	pub fn checked(&self) -> bool {
		self.header.pack_type.checked()
	}

	/// Stored payload MD5, when present.
	pub fn digest(&self) -> Option<&Md5Digest> {
		self.digest.as_ref()
	}

	/// Trailing 256-byte blob, when present.
	pub fn extra(&self) -> Option<&[u8]> {
		self.extra.as_deref()
	}

	/// Fresh plaintext stream borrowing this container's source.
	pub fn stream(&mut self) -> Result<PlaintextStream<&mut S>> {
		make_stream(&mut self.source, &self.header, self.payload_offset)
	}

	/// Consume the container and return an owning plaintext stream,
	/// positioned at the start of the payload.
	pub fn into_stream(self) -> Result<PlaintextStream<S>> {
		make_stream(self.source, &self.header, self.payload_offset)
	}

	/// Verify the payload against the stored MD5.
	///
	/// Returns `None` when the container carries no digest; this is distinct
	/// from a failed comparison.
	pub fn check(&mut self) -> Result<Option<bool>> {
		let Some(expected) = self.digest else {
			return Ok(None);
		};
		let size = self.size();
		let mut stream = self.stream()?;
		let actual = Md5Digest::from_reader(&mut stream, size)?;
		Ok(Some(actual == expected))
	}

	/// Copy the whole plaintext payload into `writer`.
	pub fn unpack_into<W: Write>(&mut self, writer: &mut W) -> Result<u64> {
		let size = self.size();
		let mut stream = self.stream()?;
		copy_exact(&mut stream, writer, size, |_| {})?;
		Ok(size)
	}

	/// Extract the payload to `target`, writing through a `target~` sibling
	/// which is renamed into place on success and left behind on failure.
	pub fn unpack(&mut self, target: impl AsRef<Path>) -> Result<()> {
		let target = target.as_ref();
		let tmp = sibling_tmp(target);
		let mut out = File::create(&tmp)?;
		self.unpack_into(&mut out)?;
		drop(out);
		fs::rename(&tmp, target)?;
		Ok(())
	}
}

fn make_stream<T: Read + Seek>(
	source: T,
	header: &BinHeader,
	payload_offset: u64,
) -> Result<PlaintextStream<T>> {
	Ok(if header.pack_type.compressed() {
		PlaintextStream::Compressed(CompressedStream::new(
			source,
			payload_offset,
			u64::from(header.packed_size),
			u64::from(header.size),
		)?)
	} else {
		PlaintextStream::Plain(RangedReader::new(
			source,
			payload_offset,
			u64::from(header.size),
		))
	})
}

/// Seekable plaintext view of a container payload.
#[derive(Debug)]
pub enum PlaintextStream<S> {
	/// Uncompressed payload: a window straight over the source.
	Plain(RangedReader<S>),
	/// Compressed payload: deobfuscation plus streaming zstd decode.
	Compressed(CompressedStream<S>),
}

impl<S: Read + Seek> PlaintextStream<S> {
	/// Plaintext size in bytes.
	pub fn size(&self) -> u64 {
		match self {
			Self::Plain(ranged) => ranged.size(),
			Self::Compressed(stream) => stream.size(),
		}
	}
}

impl<S: Read + Seek> Read for PlaintextStream<S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		match self {
			Self::Plain(ranged) => ranged.read(buf),
			Self::Compressed(stream) => stream.read(buf),
		}
	}
}

impl<S: Read + Seek> Seek for PlaintextStream<S> {
	fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
		match self {
			Self::Plain(ranged) => ranged.seek(target),
			Self::Compressed(stream) => stream.seek(target),
		}
	}
}

type Pipeline<S> = Decoder<'static, BufReader<ObfsReader<RangedReader<S>>>>;

/// Lazily decoded view of an obfuscated, zstd-compressed payload.
///
/// Forward seeks decode and discard. A backward seek (absolute below the
/// cursor, or relative with a negative offset, which clamps to zero) tears
/// the decoder down and rebuilds the pipeline from the start of the payload,
/// discarding any buffered state. End-relative seeks are refused.
pub struct CompressedStream<S> {
	offset: u64,
	packed_size: u64,
	size: u64,
	pos: u64,
	decoder: Option<Pipeline<S>>,
}

impl<S> std::fmt::Debug for CompressedStream<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CompressedStream")
			.field("offset", &self.offset)
			.field("packed_size", &self.packed_size)
			.field("size", &self.size)
			.field("pos", &self.pos)
			.field("decoder", &"zstd stream decoder")
			.finish()
	}
}

impl<S: Read + Seek> CompressedStream<S> {
	pub(crate) fn new(source: S, offset: u64, packed_size: u64, size: u64) -> Result<Self> {
		let decoder = Self::pipeline(source, offset, packed_size)?;
		Ok(Self {
			offset,
			packed_size,
			size,
			pos: 0,
			decoder: Some(decoder),
		})
	}

	/// Plaintext size in bytes.
	pub fn size(&self) -> u64 {
		self.size
	}

	fn pipeline(source: S, offset: u64, packed_size: u64) -> Result<Pipeline<S>> {
		let ranged = RangedReader::new(source, offset, packed_size);
		let obfs = ObfsReader::new(ranged, packed_size);
		Decoder::new(obfs).map_err(Error::decompression)
	}

	fn rebuild(&mut self) -> io::Result<()> {
		trace!(pos = self.pos, "rebuild compressed payload pipeline");
		let decoder = self.decoder.take().expect("pipeline always present");
		let source = decoder.finish().into_inner().into_inner().into_inner();
		let decoder =
			Self::pipeline(source, self.offset, self.packed_size).map_err(io::Error::other)?;
		self.decoder = Some(decoder);
		self.pos = 0;
		Ok(())
	}

	fn skip_to(&mut self, target: u64) -> io::Result<()> {
		if target < self.pos {
			self.rebuild()?;
		}
		let mut scratch = [0u8; 8192];
		while self.pos < target {
			let want = scratch.len().min(usize::try_from(target - self.pos).unwrap_or(scratch.len()));
			let read = self.read(&mut scratch[..want])?;
			if read == 0 {
				break;
			}
		}
		Ok(())
	}
}

impl<S: Read + Seek> Read for CompressedStream<S> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let decoder = self.decoder.as_mut().expect("pipeline always present");
		let read = decoder.read(buf)?;
		self.pos += read as u64;
		Ok(read)
	}
}

impl<S: Read + Seek> Seek for CompressedStream<S> {
	fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
		let target = match target {
			SeekFrom::Start(pos) => pos,
			SeekFrom::Current(delta) => self.pos.saturating_add_signed(delta),
			SeekFrom::End(_) => {
				return Err(io::Error::new(
					io::ErrorKind::Unsupported,
					"end-relative seeks on a compressed payload",
				))
			}
		};
		self.skip_to(target)?;
		Ok(self.pos)
	}
}
