//! Building images from directory trees.

use std::{
	fs::File,
	io::{self, Seek, Write},
	path::{Path, PathBuf},
};

use tracing::debug;
use walkdir::WalkDir;

use super::layout;
use crate::error::Result;

/// Pack the tree under `root` into an image written to `out`.
///
/// Regular files are collected recursively, sorted by relative path, and an
/// entry named exactly `nm` is moved to the last position. `extended`
/// selects the layout with a digests header; `checked` additionally stores a
/// SHA-1 per entry and requires `extended`.
pub fn pack_into<W: Write + Seek>(
	root: impl AsRef<Path>,
	out: &mut W,
	extended: bool,
	checked: bool,
) -> Result<()> {
	let root = root.as_ref();
	let rpaths = collect_entries(root)?;
	debug!(root = %root.display(), entries = rpaths.len(), "packing image");
	layout::build_image(root, &rpaths, out, extended, checked)
}

/// Pack an explicit list of relative paths rooted at `root`, in the given
/// order.
///
/// This is the seam for callers bringing their own directory walker; such a
/// walker is expected to produce stable, sorted relative paths of regular
/// files.
pub fn pack_entries<W: Write + Seek>(
	root: impl AsRef<Path>,
	rpaths: &[PathBuf],
	out: &mut W,
	extended: bool,
	checked: bool,
) -> Result<()> {
	layout::build_image(root.as_ref(), rpaths, out, extended, checked)
}

/// Pack the tree under `root` into an image file at `target`.
pub fn pack(
	root: impl AsRef<Path>,
	target: impl AsRef<Path>,
	extended: bool,
	checked: bool,
) -> Result<()> {
	let mut out = File::create(target.as_ref())?;
	pack_into(root, &mut out, extended, checked)
}

fn collect_entries(root: &Path) -> Result<Vec<PathBuf>> {
	let mut rpaths = Vec::new();
	for entry in WalkDir::new(root) {
		let entry = entry.map_err(io::Error::from)?;
		if entry.file_type().is_file() {
			let rpath = entry
				.path()
				.strip_prefix(root)
				.expect("walked paths start with the root")
				.to_path_buf();
			rpaths.push(rpath);
		}
	}
	rpaths.sort();
	if let Some(position) = rpaths.iter().position(|rpath| rpath == Path::new("nm")) {
		if position != rpaths.len() - 1 {
			let nm = rpaths.remove(position);
			rpaths.push(nm);
		}
	}
	Ok(rpaths)
}

#[cfg(test)]
mod test {
	use super::*;
	use std::fs;

	#[test]
	fn entries_are_sorted_with_nm_last() {
		let dir = tempfile::tempdir().expect("tempdir");
		fs::create_dir(dir.path().join("config")).expect("mkdir");
		fs::write(dir.path().join("version"), b"1.2.3.4\n").expect("write");
		fs::write(dir.path().join("nm"), b"names").expect("write");
		fs::write(dir.path().join("config/game.blk"), b"\x01").expect("write");

		let rpaths = collect_entries(dir.path()).expect("collect");
		assert_eq!(
			rpaths,
			vec![
				PathBuf::from("config/game.blk"),
				PathBuf::from("version"),
				PathBuf::from("nm"),
			]
		);
	}

	#[test]
	fn directories_do_not_become_entries() {
		let dir = tempfile::tempdir().expect("tempdir");
		fs::create_dir_all(dir.path().join("a/b")).expect("mkdir");
		fs::write(dir.path().join("a/b/c"), b"x").expect("write");
		let rpaths = collect_entries(dir.path()).expect("collect");
		assert_eq!(rpaths, vec![PathBuf::from("a/b/c")]);
	}
}
