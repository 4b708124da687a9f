//! On-disk layout of the image directory.
//!
//! The image opens with a names header at 0, a data header at 0x10 and — in
//! the extended layout — a digests header at 0x20. The names-info table (one
//! u64 offset per entry) sits where the names header points, followed by the
//! NUL-terminated names, the per-entry offset/size table, the optional SHA-1
//! table and finally the file bodies, every block padded out to 16 bytes.

use std::{
	fs::File,
	io::{self, Read, Seek, SeekFrom, Write},
	path::{Path, PathBuf},
};

use deku::prelude::*;
use sha1::{Digest as _, Sha1};
use tracing::{debug, trace};

use super::names;
use crate::{
	error::{Error, Result},
	integrity::{copy_exact, Sha1Digest},
};

pub(crate) const ALIGN: u64 = 16;

const DATA_HEADER_AT: u64 = 0x10;
const DIGESTS_HEADER_AT: u64 = 0x20;
const NAMES_AT_PLAIN: u32 = 0x20;
const NAMES_AT_EXTENDED: u32 = 0x30;
const SHA1_LEN: u64 = 20;

#[derive(Debug, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
struct RawBlockHeader {
	offset: u32,
	count: u32,
}

#[derive(Debug, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
struct RawDigestsHeader {
	end: u64,
	begin: u16,
}

#[derive(Debug, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
struct RawDataInfo {
	offset: u32,
	size: u32,
}

/// One entry of the image directory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileInfo {
	/// Path of the entry inside the image.
	pub path: PathBuf,
	/// Offset of the body from the image start.
	pub offset: u64,
	/// Body size in bytes.
	pub size: u64,
	/// Stored SHA-1 of the body, when the image carries digests.
	pub digest: Option<Sha1Digest>,
}

#[derive(Debug)]
pub(crate) struct ImageIndex {
	pub entries: Vec<FileInfo>,
	pub extended: bool,
	pub checked: bool,
}

pub(crate) const fn align_up(pos: u64) -> u64 {
	(pos + (ALIGN - 1)) & !(ALIGN - 1)
}

fn read_chunk<R: Read>(source: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
	let mut raw = vec![0u8; len];
	source.read_exact(&mut raw).map_err(Error::truncated(what))?;
	Ok(raw)
}

fn deku_format(err: DekuError) -> Error {
	Error::format(err.to_string())
}

/// Parse the directory from a plaintext image source.
///
/// The source is rewound first: all table offsets are relative to the image
/// start. Cursor positions are validated against the header offsets the way
/// the format demands, so a directory that lies about its layout fails here
/// rather than yielding bogus entries.
pub(crate) fn parse_image<R: Read + Seek>(source: &mut R) -> Result<ImageIndex> {
	source.rewind()?;

	let raw = read_chunk(source, ALIGN as usize, "names header")?;
	let (_, names_header) = RawBlockHeader::from_bytes((raw.as_slice(), 0)).map_err(deku_format)?;
	let raw = read_chunk(source, ALIGN as usize, "data header")?;
	let (_, data_header) = RawBlockHeader::from_bytes((raw.as_slice(), 0)).map_err(deku_format)?;

	let digests_header = if names_header.offset == NAMES_AT_EXTENDED {
		let raw = read_chunk(source, ALIGN as usize, "digests header")?;
		let (_, header) = RawDigestsHeader::from_bytes((raw.as_slice(), 0)).map_err(deku_format)?;
		Some(header)
	} else {
		None
	};

	let pos = source.stream_position()?;
	if pos != u64::from(names_header.offset) {
		return Err(Error::format(format!(
			"names table expected at {pos:#x}, header says {:#x}",
			names_header.offset
		)));
	}
	if names_header.count == 0 {
		return Err(Error::format("empty names table"));
	}
	if data_header.count != names_header.count {
		return Err(Error::format(format!(
			"names table has {} entries but data table has {}",
			names_header.count, data_header.count
		)));
	}
	let count = names_header.count as usize;

	// names info: one u64 offset per entry, padded to 16
	let mut raw = vec![0u8; count * 8];
	source
		.read_exact(&mut raw)
		.map_err(Error::truncated("names info"))?;
	let name_offsets: Vec<u64> = raw
		.chunks_exact(8)
		.map(|chunk| u64::from_le_bytes(chunk.try_into().expect("eight-byte chunks")))
		.collect();

	let names_start = align_up(source.stream_position()?);
	let names_end = u64::from(data_header.offset);
	if names_end < names_start {
		return Err(Error::format("data table overlaps the names table"));
	}
	source.seek(SeekFrom::Start(names_start))?;
	let mut region = vec![0u8; (names_end - names_start) as usize];
	source
		.read_exact(&mut region)
		.map_err(Error::truncated("names data"))?;

	let mut paths = Vec::with_capacity(count);
	let mut names_max_end = 0u64;
	for offset in name_offsets {
		if offset < names_start || offset >= names_end {
			return Err(Error::format(format!(
				"name offset {offset:#x} outside the names block"
			)));
		}
		let rel = (offset - names_start) as usize;
		let terminator = region[rel..]
			.iter()
			.position(|&byte| byte == 0)
			.ok_or_else(|| Error::format("unterminated entry name"))?;
		paths.push(names::decode_name(&region[rel..rel + terminator])?);
		names_max_end = names_max_end.max(offset + terminator as u64 + 1);
	}
	if align_up(names_max_end) != names_end {
		return Err(Error::format(
			"names block does not end at the data table",
		));
	}

	// data info: offset/size per entry, each record padded to 16
	let mut data_info = Vec::with_capacity(count);
	for _ in 0..count {
		let raw = read_chunk(source, ALIGN as usize, "data info")?;
		let (_, info) = RawDataInfo::from_bytes((raw.as_slice(), 0)).map_err(deku_format)?;
		data_info.push(info);
	}

	let digests_data = match &digests_header {
		Some(header) if header.begin != 0 => {
			let pos = source.stream_position()?;
			if pos != u64::from(header.begin) {
				return Err(Error::format(format!(
					"digests table expected at {pos:#x}, header says {:#x}",
					header.begin
				)));
			}
			if header.end != u64::from(header.begin) + SHA1_LEN * count as u64 {
				return Err(Error::format("digests table end mismatch"));
			}
			let mut raw = vec![0u8; count * SHA1_LEN as usize];
			source
				.read_exact(&mut raw)
				.map_err(Error::truncated("digests table"))?;
			Some(
				raw.chunks_exact(SHA1_LEN as usize)
					.map(|chunk| Sha1Digest(chunk.try_into().expect("twenty-byte chunks")))
					.collect::<Vec<_>>(),
			)
		}
		Some(header) => {
			// extended layout without per-entry digests: `end` points at the
			// start of the data region instead
			let pos = source.stream_position()?;
			if header.end != pos {
				return Err(Error::format(format!(
					"data region expected at {:#x}, cursor at {pos:#x}",
					header.end
				)));
			}
			None
		}
		None => None,
	};

	let entries = paths
		.into_iter()
		.enumerate()
		.map(|(index, path)| FileInfo {
			path,
			offset: u64::from(data_info[index].offset),
			size: u64::from(data_info[index].size),
			digest: digests_data.as_ref().map(|digests| digests[index]),
		})
		.collect::<Vec<_>>();

	trace!(count, "parsed image directory tables");
	Ok(ImageIndex {
		entries,
		extended: digests_header.is_some(),
		checked: digests_data.is_some(),
	})
}

fn write_record<W: Write>(out: &mut W, record: impl DekuContainerWrite, pad: usize) -> Result<()> {
	let bytes = record.to_bytes().map_err(|err| Error::format(err.to_string()))?;
	out.write_all(&bytes)?;
	out.write_all(&vec![0u8; pad - bytes.len()])?;
	Ok(())
}

fn pad_to_align<W: Write + Seek>(out: &mut W) -> io::Result<u64> {
	let pos = out.stream_position()?;
	let target = align_up(pos);
	if target > pos {
		out.write_all(&vec![0u8; (target - pos) as usize])?;
	}
	Ok(target)
}

fn fits_u32(value: u64, what: &str) -> Result<u32> {
	u32::try_from(value)
		.map_err(|_| Error::invalid(format!("{what} {value} does not fit the image format")))
}

/// Build an image from files under `root`, in the exact order of `rpaths`.
///
/// The sink must be seekable and positioned at the image start: the names
/// info, data header, data info and digest tables are backfilled once the
/// running offsets are known. The cursor is left at the end of the image.
pub(crate) fn build_image<W: Write + Seek>(
	root: &Path,
	rpaths: &[PathBuf],
	out: &mut W,
	extended: bool,
	checked: bool,
) -> Result<()> {
	if checked && !extended {
		return Err(Error::invalid(
			"per-entry digests require the extended layout",
		));
	}
	if rpaths.is_empty() {
		return Err(Error::invalid("cannot build an image with no entries"));
	}
	let count = fits_u32(rpaths.len() as u64, "entry count")?;

	let names_at = if extended {
		NAMES_AT_EXTENDED
	} else {
		NAMES_AT_PLAIN
	};
	write_record(
		out,
		RawBlockHeader {
			offset: names_at,
			count,
		},
		ALIGN as usize,
	)?;

	// names, leaving the info table to backfill
	let names_info_at = u64::from(names_at);
	let names_data_at = align_up(names_info_at + u64::from(count) * 8);
	out.seek(SeekFrom::Start(names_data_at))?;
	let mut name_offsets = Vec::with_capacity(rpaths.len());
	for rpath in rpaths {
		let encoded = names::encode_name(rpath)?;
		name_offsets.push(out.stream_position()?);
		out.write_all(&encoded)?;
		out.write_all(&[0])?;
	}
	pad_to_align(out)?;
	let data_info_at = out.stream_position()?;

	out.seek(SeekFrom::Start(DATA_HEADER_AT))?;
	write_record(
		out,
		RawBlockHeader {
			offset: fits_u32(data_info_at, "data table offset")?,
			count,
		},
		ALIGN as usize,
	)?;

	out.seek(SeekFrom::Start(names_info_at))?;
	for offset in &name_offsets {
		out.write_all(&offset.to_le_bytes())?;
	}

	let digests_at = data_info_at + u64::from(count) * ALIGN;
	let data_at = if checked {
		align_up(digests_at + u64::from(count) * SHA1_LEN)
	} else {
		digests_at
	};

	// file bodies, each padded out to 16
	out.seek(SeekFrom::Start(data_at))?;
	let mut data_info = Vec::with_capacity(rpaths.len());
	let mut digests = Vec::with_capacity(if checked { rpaths.len() } else { 0 });
	for rpath in rpaths {
		let path = root.join(rpath);
		let mut input = File::open(&path)?;
		let size = input.metadata()?.len();
		let offset = out.stream_position()?;
		if checked {
			let mut hasher = Sha1::new();
			copy_exact(&mut input, out, size, |chunk| hasher.update(chunk))?;
			digests.push(Sha1Digest(hasher.finalize().into()));
		} else {
			copy_exact(&mut input, out, size, |_| {})?;
		}
		data_info.push(RawDataInfo {
			offset: fits_u32(offset, "entry offset")?,
			size: fits_u32(size, "entry size")?,
		});
		pad_to_align(out)?;
		trace!(path = %rpath.display(), offset, size, "image entry written");
	}
	let image_end = out.stream_position()?;

	// backfill the tables now that real offsets are known
	out.seek(SeekFrom::Start(data_info_at))?;
	for info in data_info {
		write_record(out, info, ALIGN as usize)?;
	}

	if checked {
		out.seek(SeekFrom::Start(digests_at))?;
		for digest in &digests {
			out.write_all(digest.as_ref())?;
		}
	}

	if extended {
		let (begin, end) = if checked {
			(digests_at, digests_at + u64::from(count) * SHA1_LEN)
		} else {
			(0, data_at)
		};
		let begin = u16::try_from(begin).map_err(|_| {
			Error::invalid(format!(
				"digests table at {begin:#x} does not fit the 16-bit begin field"
			))
		})?;
		out.seek(SeekFrom::Start(DIGESTS_HEADER_AT))?;
		write_record(out, RawDigestsHeader { end, begin }, ALIGN as usize)?;
	}

	out.seek(SeekFrom::Start(image_end))?;
	debug!(
		entries = rpaths.len(),
		extended, checked, size = image_end, "image built"
	);
	Ok(())
}
