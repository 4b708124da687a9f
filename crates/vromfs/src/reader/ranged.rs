//! Windowed view over a seekable byte source.

use std::io::{self, Read, Seek, SeekFrom};

/// Read-only view of `[offset, offset + size)` within a backing reader.
///
/// The view keeps its own logical position and repositions the backing
/// stream immediately before every read, so several views may share one
/// source as long as their accesses are serialised. End-relative seeks are
/// relative to the window size; seeking to a negative logical position
/// clamps to zero.
#[derive(Debug)]
pub struct RangedReader<R> {
	inner: R,
	offset: u64,
	size: u64,
	pos: u64,
}

impl<R> RangedReader<R> {
	/// View `size` bytes of `inner` starting at `offset`.
	pub fn new(inner: R, offset: u64, size: u64) -> Self {
		Self {
			inner,
			offset,
			size,
			pos: 0,
		}
	}

	/// Window length in bytes.
	pub fn size(&self) -> u64 {
		self.size
	}

	/// Give back the backing reader.
	pub fn into_inner(self) -> R {
		self.inner
	}
}

impl<R: Read + Seek> Read for RangedReader<R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if buf.is_empty() || self.pos >= self.size {
			return Ok(0);
		}
		let left = usize::try_from(self.size - self.pos).unwrap_or(usize::MAX);
		let want = buf.len().min(left);
		self.inner.seek(SeekFrom::Start(self.offset + self.pos))?;
		let read = self.inner.read(&mut buf[..want])?;
		self.pos += read as u64;
		Ok(read)
	}
}

impl<R: Read + Seek> Seek for RangedReader<R> {
	fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
		self.pos = match target {
			SeekFrom::Start(pos) => pos,
			SeekFrom::Current(delta) => self.pos.saturating_add_signed(delta),
			SeekFrom::End(delta) => self.size.saturating_add_signed(delta),
		};
		Ok(self.pos)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::Cursor;

	fn reader() -> RangedReader<Cursor<&'static [u8]>> {
		RangedReader::new(Cursor::new(b"0123456789abcdef"), 4, 8)
	}

	#[test]
	fn reads_exactly_the_window() {
		let mut ranged = reader();
		let mut all = Vec::new();
		ranged.read_to_end(&mut all).expect("read");
		assert_eq!(all, b"456789ab");
	}

	#[test]
	fn short_reads_resume_where_they_left_off() {
		let mut ranged = reader();
		let mut buf = [0u8; 3];
		assert_eq!(ranged.read(&mut buf).expect("read"), 3);
		assert_eq!(&buf, b"456");
		assert_eq!(ranged.read(&mut buf).expect("read"), 3);
		assert_eq!(&buf, b"789");
	}

	#[test]
	fn end_relative_seeks_use_the_window_size() {
		let mut ranged = reader();
		ranged.seek(SeekFrom::End(-2)).expect("seek");
		let mut tail = Vec::new();
		ranged.read_to_end(&mut tail).expect("read");
		assert_eq!(tail, b"ab");
	}

	#[test]
	fn negative_relative_seek_clamps_to_zero() {
		let mut ranged = reader();
		ranged.seek(SeekFrom::Start(5)).expect("seek");
		assert_eq!(ranged.seek(SeekFrom::Current(-20)).expect("seek"), 0);
	}

	#[test]
	fn reads_past_the_window_are_empty() {
		let mut ranged = reader();
		ranged.seek(SeekFrom::Start(100)).expect("seek");
		let mut buf = [0u8; 4];
		assert_eq!(ranged.read(&mut buf).expect("read"), 0);
	}

	#[test]
	fn shared_source_views_interleave() {
		let mut source = Cursor::new(b"0123456789abcdef".to_vec());
		let mut head = [0u8; 4];
		let mut tail = [0u8; 4];
		RangedReader::new(&mut source, 0, 4)
			.read_exact(&mut head)
			.expect("head");
		RangedReader::new(&mut source, 12, 4)
			.read_exact(&mut tail)
			.expect("tail");
		assert_eq!(&head, b"0123");
		assert_eq!(&tail, b"cdef");
	}
}
