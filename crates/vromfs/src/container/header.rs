//! Container header records and the packed-type word.

use std::{fmt, str::FromStr};

use deku::prelude::*;

use crate::error::{Error, Result};

/// Wire length of [`BinHeader`].
pub const BIN_HEADER_LEN: usize = 16;

/// Wire length of [`BinExtHeader`].
pub const EXT_HEADER_LEN: usize = 8;

/// Bits available for the stored payload size in the packed word.
const PACKED_SIZE_BITS: u32 = 26;

const PACKED_SIZE_MASK: u32 = (1 << PACKED_SIZE_BITS) - 1;

#[derive(Debug, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
struct RawBinHeader {
	magic: [u8; 4],
	platform: [u8; 4],
	size: u32,
	packed: u32,
}

#[derive(Debug, PartialEq, Eq, DekuRead, DekuWrite)]
#[deku(endian = "little")]
struct RawExtHeader {
	size: u16,
	flags: u16,
	version: [u8; 4],
}

/// Container flavour, selected by the 4-byte magic.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HeaderType {
	/// `VRFs`: bare container without a version.
	Vrfs,
	/// `VRFx`: carries an extended header with a version quadruple.
	Vrfx,
}

impl HeaderType {
	fn from_magic(magic: [u8; 4]) -> Option<Self> {
		match &magic {
			b"VRFs" => Some(Self::Vrfs),
			b"VRFx" => Some(Self::Vrfx),
			_ => None,
		}
	}

	fn magic(self) -> [u8; 4] {
		match self {
			Self::Vrfs => *b"VRFs",
			Self::Vrfx => *b"VRFx",
		}
	}

	/// Whether this flavour carries the extended header.
	pub fn extended(self) -> bool {
		self == Self::Vrfx
	}
}

impl fmt::Display for HeaderType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Vrfs => "VRFs",
			Self::Vrfx => "VRFx",
		})
	}
}

/// Target platform tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PlatformType {
	/// Desktop builds, tag `\0\0PC`.
	Pc,
	/// iOS builds, tag `\0iOS`.
	Ios,
	/// Android builds, tag `\0and`.
	Android,
}

impl PlatformType {
	fn from_tag(tag: [u8; 4]) -> Option<Self> {
		match &tag {
			b"\x00\x00PC" => Some(Self::Pc),
			b"\x00iOS" => Some(Self::Ios),
			b"\x00and" => Some(Self::Android),
			_ => None,
		}
	}

	fn tag(self) -> [u8; 4] {
		match self {
			Self::Pc => *b"\x00\x00PC",
			Self::Ios => *b"\x00iOS",
			Self::Android => *b"\x00and",
		}
	}
}

impl fmt::Display for PlatformType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Pc => "pc",
			Self::Ios => "ios",
			Self::Android => "android",
		})
	}
}

impl FromStr for PlatformType {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_lowercase().as_str() {
			"pc" => Ok(Self::Pc),
			"ios" => Ok(Self::Ios),
			"android" => Ok(Self::Android),
			other => Err(Error::invalid(format!("unknown platform {other:?}"))),
		}
	}
}

/// Payload packing selector: six bits of the packed word.
///
/// Only three of the four compressed/checked combinations exist; an
/// uncompressed payload without a digest has no encoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum PackType {
	/// Compressed and obfuscated, no MD5 in the container.
	ZstdObfsNocheck = 0x10,
	/// Stored plain, MD5 present.
	Plain = 0x20,
	/// Compressed and obfuscated, MD5 present.
	ZstdObfs = 0x30,
}

impl PackType {
	fn from_bits(bits: u32) -> Option<Self> {
		match bits {
			0x10 => Some(Self::ZstdObfsNocheck),
			0x20 => Some(Self::Plain),
			0x30 => Some(Self::ZstdObfs),
			_ => None,
		}
	}

	pub(crate) fn from_flags(compressed: bool, checked: bool) -> Option<Self> {
		match (compressed, checked) {
			(true, false) => Some(Self::ZstdObfsNocheck),
			(false, true) => Some(Self::Plain),
			(true, true) => Some(Self::ZstdObfs),
			(false, false) => None,
		}
	}

	/// Whether the payload is zstd-compressed and obfuscated.
	pub fn compressed(self) -> bool {
		self != Self::Plain
	}

	/// Whether the container records an MD5 of the plaintext.
	pub fn checked(self) -> bool {
		self != Self::ZstdObfsNocheck
	}
}

/// Four-component file version carried by `VRFx` containers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Version(pub [u8; 4]);

impl fmt::Display for Version {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let [a, b, c, d] = self.0;
		write!(f, "{a}.{b}.{c}.{d}")
	}
}

impl FromStr for Version {
	type Err = Error;

	/// Parse a dotted version. Short forms are padded on the left, so `1.2`
	/// reads as `0.0.1.2`; components outside `0..=255` are refused.
	fn from_str(s: &str) -> Result<Self> {
		let parts: Vec<&str> = s.split('.').collect();
		if parts.len() > 4 {
			return Err(Error::invalid(format!(
				"version {s:?} has more than four components"
			)));
		}
		let mut version = [0u8; 4];
		let pad = 4 - parts.len();
		for (slot, part) in version[pad..].iter_mut().zip(parts) {
			*slot = part
				.parse::<u32>()
				.ok()
				.and_then(|v| u8::try_from(v).ok())
				.ok_or_else(|| {
					Error::invalid(format!("version component {part:?} is not in 0..=255"))
				})?;
		}
		Ok(Self(version))
	}
}

/// Parsed container header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BinHeader {
	/// Container flavour.
	pub header_type: HeaderType,
	/// Target platform.
	pub platform: PlatformType,
	/// Plaintext payload size.
	pub size: u32,
	/// Payload packing selector.
	pub pack_type: PackType,
	/// Stored payload size for compressed containers; zero when plain.
	pub packed_size: u32,
}

impl BinHeader {
	/// Decode the 16 header bytes.
	pub fn parse(bytes: &[u8; BIN_HEADER_LEN]) -> Result<Self> {
		let (_, raw) = RawBinHeader::from_bytes((bytes.as_slice(), 0))
			.map_err(|err| Error::format(err.to_string()))?;
		let header_type = HeaderType::from_magic(raw.magic)
			.ok_or_else(|| Error::format(format!("unknown magic {:02x?}", raw.magic)))?;
		let platform = PlatformType::from_tag(raw.platform)
			.ok_or_else(|| Error::format(format!("unknown platform tag {:02x?}", raw.platform)))?;
		let pack_type = PackType::from_bits(raw.packed >> PACKED_SIZE_BITS).ok_or_else(|| {
			Error::format(format!(
				"unknown pack type {:#04x}",
				raw.packed >> PACKED_SIZE_BITS
			))
		})?;
		Ok(Self {
			header_type,
			platform,
			size: raw.size,
			pack_type,
			packed_size: raw.packed & PACKED_SIZE_MASK,
		})
	}

	/// Encode to the 16 header bytes.
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		let raw = RawBinHeader {
			magic: self.header_type.magic(),
			platform: self.platform.tag(),
			size: self.size,
			packed: ((self.pack_type as u32) << PACKED_SIZE_BITS)
				| (self.packed_size & PACKED_SIZE_MASK),
		};
		raw.to_bytes().map_err(|err| Error::format(err.to_string()))
	}

	/// Length of the payload as stored on disk.
	pub fn stored_size(&self) -> u32 {
		if self.pack_type.compressed() {
			self.packed_size
		} else {
			self.size
		}
	}
}

/// Extended header present in `VRFx` containers.
///
/// `size` is always written as 8 but not validated on read, and `flags` is
/// carried verbatim; the version quadruple is stored reversed on disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BinExtHeader {
	/// Recorded header size.
	pub size: u16,
	/// Flag word of unknown meaning, round-tripped untouched.
	pub flags: u16,
	/// File version.
	pub version: Version,
}

impl BinExtHeader {
	/// Decode the 8 extended-header bytes.
	pub fn parse(bytes: &[u8; EXT_HEADER_LEN]) -> Result<Self> {
		let (_, raw) = RawExtHeader::from_bytes((bytes.as_slice(), 0))
			.map_err(|err| Error::format(err.to_string()))?;
		let [d, c, b, a] = raw.version;
		Ok(Self {
			size: raw.size,
			flags: raw.flags,
			version: Version([a, b, c, d]),
		})
	}

	/// Encode to the 8 extended-header bytes, rebuilding `size` as 8.
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		let [a, b, c, d] = self.version.0;
		let raw = RawExtHeader {
			size: EXT_HEADER_LEN as u16,
			flags: self.flags,
			version: [d, c, b, a],
		};
		raw.to_bytes().map_err(|err| Error::format(err.to_string()))
	}
}
