//! Digest types backing container and entry verification.

use std::{
	fmt,
	io::{self, Read, Write},
};

use md5::{Digest as _, Md5};
use sha1::Sha1;

/// Chunk size for digest and copy passes over backing streams.
pub(crate) const CHUNK_SIZE: usize = 1 << 20;

/// Copy exactly `len` bytes from `reader` to `writer` in chunks, feeding each
/// chunk to `observe` on the way through. Fails with [`io::ErrorKind::UnexpectedEof`]
/// if the reader runs dry early.
pub(crate) fn copy_exact<R: Read + ?Sized, W: Write + ?Sized>(
	reader: &mut R,
	writer: &mut W,
	len: u64,
	mut observe: impl FnMut(&[u8]),
) -> io::Result<()> {
	let mut chunk = vec![0u8; CHUNK_SIZE.min(len.try_into().unwrap_or(CHUNK_SIZE))];
	let mut left = len;
	while left > 0 {
		let want = chunk.len().min(usize::try_from(left).unwrap_or(chunk.len()));
		let read = reader.read(&mut chunk[..want])?;
		if read == 0 {
			return Err(io::Error::new(
				io::ErrorKind::UnexpectedEof,
				format!("source ended {left} bytes early"),
			));
		}
		observe(&chunk[..read]);
		writer.write_all(&chunk[..read])?;
		left -= read as u64;
	}
	Ok(())
}

/// MD5 digest of a whole container payload.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Md5Digest(pub [u8; 16]);

impl Md5Digest {
	/// Digest exactly `len` bytes read from `reader`.
	pub fn from_reader<R: Read + ?Sized>(reader: &mut R, len: u64) -> io::Result<Self> {
		let mut hasher = Md5::new();
		copy_exact(reader, &mut io::sink(), len, |chunk| hasher.update(chunk))?;
		Ok(Self(hasher.finalize().into()))
	}

	/// Digest a byte slice.
	pub fn of(data: &[u8]) -> Self {
		Self(Md5::digest(data).into())
	}
}

/// SHA-1 digest of one image entry body.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub struct Sha1Digest(pub [u8; 20]);

impl Sha1Digest {
	/// Digest exactly `len` bytes read from `reader`.
	pub fn from_reader<R: Read + ?Sized>(reader: &mut R, len: u64) -> io::Result<Self> {
		let mut hasher = Sha1::new();
		copy_exact(reader, &mut io::sink(), len, |chunk| hasher.update(chunk))?;
		Ok(Self(hasher.finalize().into()))
	}

	/// Digest a byte slice.
	pub fn of(data: &[u8]) -> Self {
		Self(Sha1::digest(data).into())
	}
}

macro_rules! hex_fmt {
	($ty:ty) => {
		impl fmt::Display for $ty {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				for byte in self.0 {
					write!(f, "{byte:02x}")?;
				}
				Ok(())
			}
		}

		impl fmt::Debug for $ty {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}({})", stringify!($ty), self)
			}
		}

		impl AsRef<[u8]> for $ty {
			fn as_ref(&self) -> &[u8] {
				&self.0
			}
		}
	};
}

hex_fmt!(Md5Digest);
hex_fmt!(Sha1Digest);
