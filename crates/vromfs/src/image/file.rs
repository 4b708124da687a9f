//! Image engine: enumerate, extract and verify entries.

use std::{
	collections::{HashMap, VecDeque},
	fs::{self, File},
	io::{self, BufRead, Read, Seek, Write},
	path::{Component, Path, PathBuf},
};

use tracing::debug;
use zstd::{dict::DecoderDictionary, stream::read::Decoder};

use super::layout::{self, FileInfo};
use crate::{
	container::{BinFile, PlaintextStream},
	error::{Error, Result},
	integrity::Sha1Digest,
	reader::RangedReader,
	shared_names::{self, SharedNames},
	sibling_tmp,
};

/// Reference to one entry, either by path or by an already-resolved
/// [`FileInfo`].
#[derive(Debug, Clone, Copy)]
pub enum Item<'a> {
	/// Entry named by its path inside the image.
	Path(&'a Path),
	/// Entry described by directory metadata.
	Info(&'a FileInfo),
}

impl<'a> Item<'a> {
	fn path(&self) -> &'a Path {
		match self {
			Self::Path(path) => path,
			Self::Info(info) => &info.path,
		}
	}
}

impl<'a> From<&'a Path> for Item<'a> {
	fn from(path: &'a Path) -> Self {
		Self::Path(path)
	}
}

impl<'a> From<&'a PathBuf> for Item<'a> {
	fn from(path: &'a PathBuf) -> Self {
		Self::Path(path)
	}
}

impl<'a> From<&'a str> for Item<'a> {
	fn from(path: &'a str) -> Self {
		Self::Path(Path::new(path))
	}
}

impl<'a> From<&'a FileInfo> for Item<'a> {
	fn from(info: &'a FileInfo) -> Self {
		Self::Info(info)
	}
}

/// Outcome of extracting one entry.
#[derive(Debug)]
pub struct ExtractResult {
	/// Entry path inside the image.
	pub path: PathBuf,
	/// The failure, if the entry did not make it out.
	pub error: Option<Error>,
}

/// An opened VROMFS image over a seekable plaintext source.
///
/// The source is usually a [`BinFile`] stream, but any `Read + Seek` over
/// image bytes works. Entry metadata is parsed up front; bodies are read on
/// demand through windows over the source, so extraction never materialises
/// the whole image.
pub struct VromfsFile<S> {
	source: S,
	entries: Vec<FileInfo>,
	by_path: HashMap<PathBuf, usize>,
	extended: bool,
	checked: bool,
	dictionary: Option<Option<DecoderDictionary<'static>>>,
}

impl<S: std::fmt::Debug> std::fmt::Debug for VromfsFile<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("VromfsFile")
			.field("source", &self.source)
			.field("entries", &self.entries.len())
			.field("extended", &self.extended)
			.field("checked", &self.checked)
			.finish()
	}
}

impl VromfsFile<File> {
	/// Open a plaintext image file; the handle is owned and closed on drop.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		debug!(?path, "open image");
		Self::from_reader(File::open(path)?)
	}
}

impl<S: Read + Seek> VromfsFile<PlaintextStream<S>> {
	/// Layer an image over an opened container, taking ownership of it.
	pub fn from_bin(bin: BinFile<S>) -> Result<Self> {
		Self::from_reader(bin.into_stream()?)
	}
}

impl VromfsFile<PlaintextStream<File>> {
	/// Open a container file and the image inside it in one step.
	pub fn open_bin(path: impl AsRef<Path>) -> Result<Self> {
		Self::from_bin(BinFile::open(path)?)
	}
}

impl<S: Read + Seek> VromfsFile<S> {
	/// Parse the image directory from `source`.
	pub fn from_reader(mut source: S) -> Result<Self> {
		let index = layout::parse_image(&mut source)?;
		let mut entries = index.entries;
		entries.sort_by(|a, b| a.offset.cmp(&b.offset));
		let by_path = entries
			.iter()
			.enumerate()
			.map(|(position, entry)| (entry.path.clone(), position))
			.collect();
		debug!(
			entries = entries.len(),
			extended = index.extended,
			checked = index.checked,
			"parsed image"
		);
		Ok(Self {
			source,
			entries,
			by_path,
			extended: index.extended,
			checked: index.checked,
			dictionary: None,
		})
	}

	/// Whether the image uses the extended layout (digests header present).
	pub fn extended(&self) -> bool {
		self.extended
	}

	/// Whether the image stores per-entry SHA-1 digests.
	pub fn checked(&self) -> bool {
		self.checked
	}

	/// Entry metadata in ascending offset order.
	pub fn info_list(&self) -> &[FileInfo] {
		&self.entries
	}

	/// Entry paths in ascending offset order.
	pub fn name_list(&self) -> impl Iterator<Item = &Path> {
		self.entries.iter().map(|entry| entry.path.as_path())
	}

	/// `(path, metadata)` pairs in ascending offset order.
	pub fn info_map(&self) -> impl Iterator<Item = (&Path, &FileInfo)> {
		self.entries
			.iter()
			.map(|entry| (entry.path.as_path(), entry))
	}

	/// Metadata for the entry at `path`.
	pub fn get_info(&self, path: impl AsRef<Path>) -> Result<&FileInfo> {
		let path = path.as_ref();
		self.by_path
			.get(path)
			.map(|&position| &self.entries[position])
			.ok_or_else(|| Error::not_found(path))
	}

	/// Copy one entry's raw bytes into `writer`.
	pub fn unpack_into<'a, W: Write>(
		&mut self,
		item: impl Into<Item<'a>>,
		writer: &mut W,
	) -> Result<u64> {
		let info = self.get_info(item.into().path())?.clone();
		self.copy_entry(&info, writer)
	}

	fn copy_entry<W: Write>(&mut self, info: &FileInfo, writer: &mut W) -> Result<u64> {
		let mut reader = RangedReader::new(&mut self.source, info.offset, info.size);
		let copied = io::copy(&mut reader, writer)?;
		if copied != info.size {
			return Err(Error::format(format!(
				"entry {} ends {} bytes early",
				info.path.display(),
				info.size - copied
			)));
		}
		Ok(copied)
	}

	/// Split `items` into paths missing from the image and resolved entries
	/// in ascending offset order. `None` selects every entry.
	fn plan(&self, items: Option<&[Item<'_>]>) -> (Vec<PathBuf>, Vec<FileInfo>) {
		match items {
			None => (Vec::new(), self.entries.clone()),
			Some(items) => {
				let mut missing = Vec::new();
				let mut wanted = Vec::new();
				for item in items {
					match self.get_info(item.path()) {
						Ok(info) => wanted.push(info.path.as_path()),
						Err(_) => missing.push(item.path().to_path_buf()),
					}
				}
				let chosen = self
					.entries
					.iter()
					.filter(|entry| wanted.contains(&entry.path.as_path()))
					.cloned()
					.collect();
				(missing, chosen)
			}
		}
	}

	/// Extract entries under `out_dir`, yielding one outcome per item.
	///
	/// Missing items surface first as not-found outcomes; present entries
	/// follow in ascending offset order. Each file is written through a
	/// `target~` sibling renamed into place on success; a failed entry
	/// leaves its `target~` behind and the iteration carries on.
	pub fn unpack_iter<'a>(
		&'a mut self,
		out_dir: impl Into<PathBuf>,
		items: Option<&[Item<'_>]>,
	) -> UnpackIter<'a, S> {
		let (missing, chosen) = self.plan(items);
		let mut pending = VecDeque::with_capacity(missing.len() + chosen.len());
		pending.extend(missing.into_iter().map(Planned::Absent));
		pending.extend(chosen.into_iter().map(Planned::Entry));
		UnpackIter {
			image: self,
			out_dir: out_dir.into(),
			pending,
		}
	}

	/// Extract a single entry under `out_dir`; shorthand for a one-item
	/// [`unpack_iter`](Self::unpack_iter).
	pub fn unpack<'a>(&mut self, item: impl Into<Item<'a>>, out_dir: &Path) -> ExtractResult {
		let item = item.into();
		match self.get_info(item.path()).cloned() {
			Err(error) => ExtractResult {
				path: item.path().to_path_buf(),
				error: Some(error),
			},
			Ok(info) => {
				let error = self.extract_entry(&info, out_dir).err();
				ExtractResult {
					path: info.path,
					error,
				}
			}
		}
	}

	fn extract_entry(&mut self, info: &FileInfo, out_dir: &Path) -> Result<()> {
		if info
			.path
			.components()
			.any(|component| matches!(component, Component::ParentDir))
		{
			return Err(Error::invalid(format!(
				"entry {} would escape the output directory",
				info.path.display()
			)));
		}
		let target = out_dir.join(&info.path);
		if let Some(parent) = target.parent() {
			fs::create_dir_all(parent)?;
		}
		let tmp = sibling_tmp(&target);
		let mut out = File::create(&tmp)?;
		self.copy_entry(info, &mut out)?;
		drop(out);
		fs::rename(&tmp, &target)?;
		debug!(path = %info.path.display(), "extracted");
		Ok(())
	}

	/// Recompute each entry's SHA-1 and return the paths that do not match
	/// their stored digest. `None` when the image carries no digests.
	pub fn check(&mut self) -> Result<Option<Vec<PathBuf>>> {
		if !self.checked {
			return Ok(None);
		}
		let entries = self.entries.clone();
		let mut failed = Vec::new();
		for info in &entries {
			let Some(expected) = info.digest else {
				return Ok(None);
			};
			let mut reader = RangedReader::new(&mut self.source, info.offset, info.size);
			let actual = Sha1Digest::from_reader(&mut reader, info.size)?;
			if actual != expected {
				failed.push(info.path.clone());
			}
		}
		Ok(Some(failed))
	}

	/// Stored-or-computed SHA-1 per entry, in ascending offset order.
	///
	/// Missing items from `items` are appended to `absent` when given.
	pub fn digests_table(
		&mut self,
		items: Option<&[Item<'_>]>,
		absent: Option<&mut Vec<PathBuf>>,
	) -> Result<Vec<(PathBuf, Sha1Digest)>> {
		let (missing, chosen) = self.plan(items);
		if let Some(absent) = absent {
			absent.extend(missing);
		}
		let mut table = Vec::with_capacity(chosen.len());
		for info in chosen {
			let digest = match info.digest {
				Some(digest) => digest,
				None => {
					let mut reader =
						RangedReader::new(&mut self.source, info.offset, info.size);
					Sha1Digest::from_reader(&mut reader, info.size)?
				}
			};
			table.push((info.path, digest));
		}
		Ok(table)
	}

	/// Metadata of the shared-names entry `nm`, when the image has one.
	pub fn shared_names_info(&self) -> Option<&FileInfo> {
		self.get_info("nm").ok()
	}

	/// Decompressed shared-names envelope, when the image has one. The blob
	/// inside is handed over raw; interpreting it is the BLK codec's job.
	pub fn shared_names(&mut self) -> Result<Option<SharedNames>> {
		let Some(info) = self.shared_names_info().cloned() else {
			return Ok(None);
		};
		self.load_dictionary()?;
		let dictionary = self
			.dictionary
			.as_ref()
			.and_then(|dictionary| dictionary.as_ref());
		let mut reader = RangedReader::new(&mut self.source, info.offset, info.size);
		shared_names::parse(&mut reader, dictionary).map(Some)
	}

	/// Metadata of the first `*.dict` entry in ascending offset order.
	pub fn dictionary_info(&self) -> Option<&FileInfo> {
		self.entries
			.iter()
			.find(|entry| entry.path.extension().is_some_and(|ext| ext == "dict"))
	}

	fn load_dictionary(&mut self) -> Result<()> {
		if self.dictionary.is_some() {
			return Ok(());
		}
		let loaded = match self.dictionary_info().cloned() {
			None => None,
			Some(info) => {
				let mut bytes = Vec::with_capacity(info.size as usize);
				self.copy_entry(&info, &mut bytes)?;
				debug!(path = %info.path.display(), size = info.size, "loaded zstd dictionary");
				Some(DecoderDictionary::copy(&bytes))
			}
		};
		self.dictionary = Some(loaded);
		Ok(())
	}

	/// A zstd streaming decoder over `reader`, initialised with the image's
	/// dictionary when one is present.
	pub fn decoder<R: BufRead>(&mut self, reader: R) -> Result<Decoder<'_, R>> {
		self.load_dictionary()?;
		match self.dictionary.as_ref().and_then(|d| d.as_ref()) {
			Some(dictionary) => {
				Decoder::with_prepared_dictionary(reader, dictionary).map_err(Error::decompression)
			}
			None => Decoder::with_buffer(reader).map_err(Error::decompression),
		}
	}
}

enum Planned {
	Absent(PathBuf),
	Entry(FileInfo),
}

/// Iterator over per-entry extraction outcomes; see
/// [`VromfsFile::unpack_iter`].
pub struct UnpackIter<'a, S> {
	image: &'a mut VromfsFile<S>,
	out_dir: PathBuf,
	pending: VecDeque<Planned>,
}

impl<S: Read + Seek> Iterator for UnpackIter<'_, S> {
	type Item = ExtractResult;

	fn next(&mut self) -> Option<Self::Item> {
		match self.pending.pop_front()? {
			Planned::Absent(path) => Some(ExtractResult {
				error: Some(Error::not_found(path.clone())),
				path,
			}),
			Planned::Entry(info) => {
				let error = self.image.extract_entry(&info, &self.out_dir).err();
				Some(ExtractResult {
					path: info.path,
					error,
				})
			}
		}
	}
}
