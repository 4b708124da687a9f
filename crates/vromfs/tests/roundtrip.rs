//! Round-trips through both archive layers, driven by the same sample data
//! the format was reverse-engineered from.

use std::{
	fs,
	io::{Cursor, Read, Seek, SeekFrom},
	path::{Path, PathBuf},
};

use vromfs::{
	container::{self, BinFile, PackOptions, PackType, PlatformType, Version},
	image::{self, Item, VromfsFile},
	integrity::Md5Digest,
	Error,
};

fn sample_tree() -> tempfile::TempDir {
	let dir = tempfile::tempdir().expect("tempdir");
	fs::write(dir.path().join("answer"), b"42").expect("write");
	fs::write(dir.path().join("greeting"), b"hello world\n").expect("write");
	dir
}

fn sample_image(extended: bool, checked: bool) -> Vec<u8> {
	let dir = sample_tree();
	let mut out = Cursor::new(Vec::new());
	image::pack_into(dir.path(), &mut out, extended, checked).expect("pack image");
	out.into_inner()
}

fn bin_bytes(image: &[u8], opts: &PackOptions) -> Vec<u8> {
	let mut input = Cursor::new(image);
	let mut out = Vec::new();
	container::pack_into(&mut input, &mut out, image.len() as u64, opts).expect("pack bin");
	out
}

#[test]
fn plain_vrfs_layout_matches_the_wire_format() {
	let image = sample_image(false, false);
	assert_eq!(image.len(), 0x80);

	let bytes = bin_bytes(
		&image,
		&PackOptions {
			platform: PlatformType::Pc,
			version: None,
			compressed: false,
			checked: true,
			extra: None,
		},
	);

	// VRFs, \0\0PC, size 0x80, packed word for PLAIN
	assert_eq!(&bytes[..4], b"VRFs");
	assert_eq!(&bytes[4..8], b"\x00\x00PC");
	assert_eq!(&bytes[8..12], &0x80u32.to_le_bytes());
	assert_eq!(&bytes[12..16], &(0x20u32 << 26).to_le_bytes());
	assert_eq!(&bytes[16..16 + 0x80], &image[..]);
	assert_eq!(&bytes[16 + 0x80..], Md5Digest::of(&image).as_ref());

	let mut bin = BinFile::from_reader(Cursor::new(bytes)).expect("open");
	assert_eq!(bin.size(), 0x80);
	assert_eq!(bin.pack_type(), PackType::Plain);
	assert_eq!(bin.platform(), PlatformType::Pc);
	assert_eq!(bin.version(), None);
	assert!(!bin.compressed());
	assert!(bin.checked());
	assert_eq!(bin.check().expect("check"), Some(true));

	let mut vromfs = VromfsFile::from_bin(bin).expect("image");
	let infos = vromfs.info_list().to_vec();
	assert_eq!(infos[0].path, Path::new("answer"));
	assert_eq!(infos[0].offset, 0x60);
	assert_eq!(infos[1].path, Path::new("greeting"));
	assert_eq!(infos[1].offset, 0x70);

	let mut body = Vec::new();
	vromfs.unpack_into("answer", &mut body).expect("unpack");
	assert_eq!(body, b"42");
	body.clear();
	vromfs.unpack_into("greeting", &mut body).expect("unpack");
	assert_eq!(body, b"hello world\n");
}

#[test]
fn compressed_vrfx_round_trips_with_version_and_digest() {
	let image = sample_image(false, false);
	let bytes = bin_bytes(
		&image,
		&PackOptions {
			platform: PlatformType::Pc,
			version: Some(Version([1, 2, 3, 4])),
			compressed: true,
			checked: true,
			extra: None,
		},
	);

	assert_eq!(&bytes[..4], b"VRFx");
	// extended header: size 8, flags 0, version stored reversed
	assert_eq!(&bytes[16..24], &[0x08, 0, 0, 0, 0x04, 0x03, 0x02, 0x01]);
	let packed = u32::from_le_bytes(bytes[12..16].try_into().expect("word"));
	assert_eq!(packed >> 26, 0x30);
	let packed_size = (packed & 0x03ff_ffff) as usize;
	assert_eq!(bytes.len(), 24 + packed_size + 16);
	assert_eq!(&bytes[24 + packed_size..], Md5Digest::of(&image).as_ref());

	let mut bin = BinFile::from_reader(Cursor::new(bytes)).expect("open");
	assert_eq!(bin.version(), Some(Version([1, 2, 3, 4])));
	assert_eq!(bin.pack_type(), PackType::ZstdObfs);
	assert_eq!(bin.size(), image.len() as u64);
	assert_eq!(bin.check().expect("check"), Some(true));

	let mut plaintext = Vec::new();
	bin.unpack_into(&mut plaintext).expect("unpack");
	assert_eq!(plaintext, image);
}

#[test]
fn nocheck_containers_carry_no_digest() {
	let image = sample_image(false, false);
	let bytes = bin_bytes(
		&image,
		&PackOptions {
			platform: PlatformType::Pc,
			version: None,
			compressed: true,
			checked: false,
			extra: None,
		},
	);

	assert_eq!(&bytes[..4], b"VRFs");
	let packed = u32::from_le_bytes(bytes[12..16].try_into().expect("word"));
	assert_eq!(packed >> 26, 0x10);
	// nothing after the payload
	assert_eq!(bytes.len(), 16 + (packed & 0x03ff_ffff) as usize);

	let mut bin = BinFile::from_reader(Cursor::new(bytes)).expect("open");
	assert!(bin.digest().is_none());
	assert!(!bin.checked());
	assert_eq!(bin.check().expect("check"), None);

	let mut plaintext = Vec::new();
	bin.unpack_into(&mut plaintext).expect("unpack");
	assert_eq!(plaintext, image);
}

#[test]
fn compressed_streams_rewind_by_rebuilding() {
	let image = sample_image(false, false);
	let bytes = bin_bytes(&image, &PackOptions::default());
	let mut bin = BinFile::from_reader(Cursor::new(bytes)).expect("open");
	let mut stream = bin.stream().expect("stream");

	let mut head = [0u8; 0x10];
	stream.read_exact(&mut head).expect("read");
	assert_eq!(head, image[..0x10]);

	// backward absolute seek restarts the pipeline
	stream.seek(SeekFrom::Start(4)).expect("seek");
	let mut four = [0u8; 4];
	stream.read_exact(&mut four).expect("read");
	assert_eq!(four, image[4..8]);

	// negative relative seeks clamp to the start
	stream.seek(SeekFrom::Current(-1000)).expect("seek");
	let mut start = [0u8; 4];
	stream.read_exact(&mut start).expect("read");
	assert_eq!(start, image[..4]);

	// end-relative seeks are refused
	let err = stream.seek(SeekFrom::End(-4)).expect_err("seek from end");
	assert_eq!(err.kind(), std::io::ErrorKind::Unsupported);
}

#[test]
fn extended_checked_image_verifies_and_survives_tampering() {
	let image = sample_image(true, true);
	// names at 0x30, digests span per the fixture layout
	assert_eq!(u32::from_le_bytes(image[0..4].try_into().expect("word")), 0x30);
	assert_eq!(
		u64::from_le_bytes(image[0x20..0x28].try_into().expect("word")),
		0x98
	);
	assert_eq!(
		u16::from_le_bytes(image[0x28..0x2a].try_into().expect("word")),
		0x70
	);
	assert_eq!(
		hex::encode(&image[0x70..0x84]),
		"92cfceb39d57d914ed8b14d0e37643de0797ae56"
	);

	let mut vromfs = VromfsFile::from_reader(Cursor::new(image.clone())).expect("open");
	assert!(vromfs.extended());
	assert!(vromfs.checked());
	assert_eq!(vromfs.check().expect("check"), Some(Vec::new()));

	// flip one byte of the first body
	let mut tampered = image;
	tampered[0xa0] ^= 0xff;
	let mut vromfs = VromfsFile::from_reader(Cursor::new(tampered)).expect("open");
	assert_eq!(
		vromfs.check().expect("check"),
		Some(vec![PathBuf::from("answer")])
	);
}

#[test]
fn unchecked_images_have_no_verdict() {
	let image = sample_image(false, false);
	let mut vromfs = VromfsFile::from_reader(Cursor::new(image)).expect("open");
	assert_eq!(vromfs.check().expect("check"), None);
}

#[test]
fn nm_entries_use_the_sentinel_and_stay_last() {
	let dir = sample_tree();
	fs::write(dir.path().join("nm"), b"shared names").expect("write");
	let mut out = Cursor::new(Vec::new());
	image::pack_into(dir.path(), &mut out, false, false).expect("pack");
	let image = out.into_inner();

	// the name entry for `nm` is sentinel-prefixed on disk
	assert!(image
		.windows(5)
		.any(|window| window == b"\xff\x3fnm\x00".as_slice()));

	let vromfs = VromfsFile::from_reader(Cursor::new(image)).expect("open");
	let names: Vec<_> = vromfs.name_list().collect();
	assert_eq!(
		names,
		vec![Path::new("answer"), Path::new("greeting"), Path::new("nm")]
	);
	assert_eq!(
		vromfs.info_list().last().expect("entries").path,
		Path::new("nm")
	);
}

#[test]
fn tree_round_trips_through_both_layers() {
	let dir = tempfile::tempdir().expect("tempdir");
	fs::create_dir_all(dir.path().join("config/input")).expect("mkdir");
	fs::write(dir.path().join("version"), b"1.2.3.4\n").expect("write");
	fs::write(dir.path().join("config/game.blk"), vec![0x01; 300]).expect("write");
	fs::write(dir.path().join("config/input/keys.blk"), b"\x03keys").expect("write");

	let mut image = Cursor::new(Vec::new());
	image::pack_into(dir.path(), &mut image, true, true).expect("pack image");
	let image = image.into_inner();
	let size = image.len() as u64;

	let mut bin = Vec::new();
	container::pack_into(
		&mut Cursor::new(&image),
		&mut bin,
		size,
		&PackOptions {
			version: Some(Version([0, 9, 0, 1])),
			..PackOptions::default()
		},
	)
	.expect("pack bin");

	let mut vromfs =
		VromfsFile::from_bin(BinFile::from_reader(Cursor::new(bin)).expect("open")).expect("image");

	// alignment invariant: every body starts on a 16-byte boundary
	assert!(vromfs.info_list().iter().all(|info| info.offset % 16 == 0));

	let out = tempfile::tempdir().expect("tempdir");
	let results: Vec<_> = vromfs.unpack_iter(out.path(), None).collect();
	assert_eq!(results.len(), 3);
	assert!(results.iter().all(|result| result.error.is_none()));

	for rpath in ["version", "config/game.blk", "config/input/keys.blk"] {
		assert_eq!(
			fs::read(out.path().join(rpath)).expect("read"),
			fs::read(dir.path().join(rpath)).expect("read"),
			"{rpath} should round-trip"
		);
	}
}

#[test]
fn unpack_iter_reports_missing_items_first() {
	let image = sample_image(false, false);
	let mut vromfs = VromfsFile::from_reader(Cursor::new(image)).expect("open");
	let out = tempfile::tempdir().expect("tempdir");

	let items = [
		Item::from("greeting"),
		Item::from("missing/file"),
		Item::from("answer"),
	];
	let results: Vec<_> = vromfs.unpack_iter(out.path(), Some(&items)).collect();

	assert_eq!(results[0].path, Path::new("missing/file"));
	assert!(matches!(results[0].error, Some(Error::NotFound { .. })));
	// present entries follow in ascending offset order
	assert_eq!(results[1].path, Path::new("answer"));
	assert!(results[1].error.is_none());
	assert_eq!(results[2].path, Path::new("greeting"));
	assert!(results[2].error.is_none());

	assert_eq!(fs::read(out.path().join("answer")).expect("read"), b"42");
	assert!(!out.path().join("answer~").exists());
}

#[test]
fn digests_table_computes_when_the_image_stores_none() {
	let image = sample_image(false, false);
	let mut vromfs = VromfsFile::from_reader(Cursor::new(image)).expect("open");

	let mut absent = Vec::new();
	let items = [Item::from("answer"), Item::from("nope")];
	let table = vromfs
		.digests_table(Some(&items), Some(&mut absent))
		.expect("table");

	assert_eq!(absent, vec![PathBuf::from("nope")]);
	assert_eq!(table.len(), 1);
	assert_eq!(table[0].0, Path::new("answer"));
	assert_eq!(
		table[0].1.to_string(),
		"92cfceb39d57d914ed8b14d0e37643de0797ae56"
	);
}

#[test]
fn trailing_blob_round_trips_or_is_refused() {
	let image = sample_image(false, false);
	let blob = vec![0xabu8; 0x100];
	let bytes = bin_bytes(
		&image,
		&PackOptions {
			extra: Some(blob.clone()),
			..PackOptions::default()
		},
	);
	let bin = BinFile::from_reader(Cursor::new(bytes.clone())).expect("open");
	assert_eq!(bin.extra(), Some(blob.as_slice()));

	// any other trailer length is structural damage
	let mut damaged = bytes;
	damaged.extend_from_slice(&[0u8; 10]);
	assert!(matches!(
		BinFile::from_reader(Cursor::new(damaged)),
		Err(Error::Format { .. })
	));

	// and packing refuses to write one
	let mut out = Vec::new();
	let result = container::pack_into(
		&mut Cursor::new(&image),
		&mut out,
		image.len() as u64,
		&PackOptions {
			extra: Some(vec![1, 2, 3]),
			..PackOptions::default()
		},
	);
	assert!(matches!(result, Err(Error::InvalidArgument { .. })));
}

#[test]
fn uncompressed_unchecked_has_no_encoding() {
	let image = sample_image(false, false);
	let mut out = Vec::new();
	let result = container::pack_into(
		&mut Cursor::new(&image),
		&mut out,
		image.len() as u64,
		&PackOptions {
			compressed: false,
			checked: false,
			..PackOptions::default()
		},
	);
	assert!(matches!(result, Err(Error::InvalidArgument { .. })));
}

#[test]
fn empty_trees_are_rejected() {
	let dir = tempfile::tempdir().expect("tempdir");
	let mut out = Cursor::new(Vec::new());
	assert!(matches!(
		image::pack_into(dir.path(), &mut out, false, false),
		Err(Error::InvalidArgument { .. })
	));
}

#[test]
fn every_legal_framing_combination_round_trips() {
	let image = sample_image(true, true);
	let platforms = [PlatformType::Pc, PlatformType::Ios, PlatformType::Android];
	let versions = [None, Some(Version([0, 9, 0, 41]))];
	let framings = [(true, false), (false, true), (true, true)];

	for platform in platforms {
		for version in versions {
			for (compressed, checked) in framings {
				let bytes = bin_bytes(
					&image,
					&PackOptions {
						platform,
						version,
						compressed,
						checked,
						extra: None,
					},
				);
				let mut bin = BinFile::from_reader(Cursor::new(bytes)).expect("open");
				assert_eq!(bin.platform(), platform);
				assert_eq!(bin.version(), version);
				assert_eq!(bin.compressed(), compressed);
				assert_eq!(bin.checked(), checked);
				assert_eq!(bin.size(), image.len() as u64);

				let mut plaintext = Vec::new();
				bin.unpack_into(&mut plaintext).expect("unpack");
				assert_eq!(plaintext, image, "{platform} {version:?} {compressed} {checked}");
			}
		}
	}
}

#[test]
fn single_item_unpack_uses_the_temp_rename_path() {
	let image = sample_image(false, false);
	let mut vromfs = VromfsFile::from_reader(Cursor::new(image)).expect("open");
	let out = tempfile::tempdir().expect("tempdir");

	let result = vromfs.unpack("greeting", out.path());
	assert!(result.error.is_none());
	assert_eq!(
		fs::read(out.path().join("greeting")).expect("read"),
		b"hello world\n"
	);

	let result = vromfs.unpack("nope", out.path());
	assert!(matches!(result.error, Some(Error::NotFound { .. })));
}

#[test]
fn shared_names_and_dictionary_are_discovered() {
	let dir = sample_tree();
	let stem = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";
	// raw-content dictionary; zstd treats undigested bytes as prefix material
	fs::write(
		dir.path().join(format!("{stem}.dict")),
		b"interface ui config gameplay sound",
	)
	.expect("write");

	let mut nm = Vec::new();
	vromfs::shared_names::build(&mut nm, 42, None, b"the\x00name\x00table\x00").expect("build nm");
	fs::write(dir.path().join("nm"), &nm).expect("write");

	let mut out = Cursor::new(Vec::new());
	image::pack_into(dir.path(), &mut out, false, false).expect("pack");
	let mut vromfs = VromfsFile::from_reader(Cursor::new(out.into_inner())).expect("open");

	assert_eq!(
		vromfs.dictionary_info().expect("dict entry").path,
		Path::new(format!("{stem}.dict").as_str())
	);
	let shared = vromfs.shared_names().expect("nm").expect("present");
	assert_eq!(shared.hash, 42);
	assert_eq!(shared.data, b"the\x00name\x00table\x00");
}
