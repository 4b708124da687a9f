use std::{
	fs::File,
	io::{Cursor, Seek},
	path::PathBuf,
};

use clap::{Parser, ValueHint};
use miette::IntoDiagnostic;
use tracing::{debug, info};
use vromfs::container::{self, PackOptions, PlatformType, Version};
use vromfs::image;

#[derive(Debug, Clone, Parser)]
pub struct PackArgs {
	/// Directory tree to pack.
	#[arg(
		value_hint = ValueHint::DirPath,
		value_name = "PATH",
	)]
	pub input: PathBuf,

	/// Output archive.
	#[arg(
		long,
		short,
		value_hint = ValueHint::AnyPath,
		value_name = "PATH",
		default_value = "out.vromfs.bin",
	)]
	pub output: PathBuf,

	/// Target platform.
	#[arg(long, default_value = "pc")]
	pub platform: PlatformType,

	/// Archive version as up to four dot-separated components (0-255 each).
	///
	/// Selects the VRFx container flavour; without it the archive is a bare
	/// VRFs.
	#[arg(long, value_name = "X.Y.Z.W")]
	pub ver: Option<Version>,

	/// Store the image uncompressed.
	#[arg(long)]
	pub store: bool,

	/// Skip the whole-image MD5.
	///
	/// Only compressed archives can go without one.
	#[arg(long)]
	pub no_digest: bool,

	/// Use the extended image layout (with a digests header).
	#[arg(long)]
	pub extended: bool,

	/// Record a SHA-1 per entry; implies '--extended'.
	#[arg(long)]
	pub checked_entries: bool,
}

pub(crate) fn pack(args: PackArgs) -> miette::Result<()> {
	info!(input = %args.input.display(), "packing image");
	let mut image = Cursor::new(Vec::new());
	image::pack_into(
		&args.input,
		&mut image,
		args.extended || args.checked_entries,
		args.checked_entries,
	)
	.into_diagnostic()?;

	let size = image.position();
	image.rewind().into_diagnostic()?;
	debug!(size, "image assembled");

	let opts = PackOptions {
		platform: args.platform,
		version: args.ver,
		compressed: !args.store,
		checked: !args.no_digest,
		extra: None,
	};
	let mut output = File::create(&args.output).into_diagnostic()?;
	container::pack_into(&mut image, &mut output, size, &opts).into_diagnostic()?;

	println!("{} => {}", args.input.display(), args.output.display());
	Ok(())
}
