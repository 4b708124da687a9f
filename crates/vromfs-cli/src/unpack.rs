use std::path::PathBuf;

use clap::{Parser, ValueHint};
use miette::IntoDiagnostic;
use regex::Regex;
use tracing::{error, info};
use vromfs::image::{Item, VromfsFile};

#[derive(Debug, Clone, Parser)]
pub struct UnpackArgs {
	/// Archive to unpack.
	#[arg(
		value_hint = ValueHint::FilePath,
		value_name = "PATH",
	)]
	pub input: PathBuf,

	/// Output directory.
	///
	/// Defaults to the archive name with a '_u' suffix, next to the archive.
	#[arg(
		long,
		short,
		value_hint = ValueHint::DirPath,
		value_name = "PATH",
	)]
	pub output: Option<PathBuf>,

	/// Filter entries by name (with a regex).
	///
	/// Can be given multiple times; entries are extracted if they match any
	/// of the regexes.
	#[arg(long, value_name = "REGEX")]
	pub filter: Vec<Regex>,
}

pub(crate) fn unpack(args: UnpackArgs) -> miette::Result<()> {
	info!("open archive");
	let mut vromfs = VromfsFile::open_bin(&args.input).into_diagnostic()?;

	let out_dir = args.output.unwrap_or_else(|| {
		let mut name = args.input.file_name().unwrap_or_default().to_os_string();
		name.push("_u");
		args.input.with_file_name(name)
	});

	let selected: Option<Vec<PathBuf>> = if args.filter.is_empty() {
		None
	} else {
		Some(
			vromfs
				.name_list()
				.filter(|path| {
					let name = path.display().to_string();
					args.filter.iter().any(|filter| filter.is_match(&name))
				})
				.map(PathBuf::from)
				.collect(),
		)
	};
	let items: Option<Vec<Item<'_>>> = selected
		.as_ref()
		.map(|paths| paths.iter().map(Item::from).collect());

	let mut successful = 0usize;
	let mut failed = 0usize;
	for result in vromfs.unpack_iter(&out_dir, items.as_deref()) {
		match result.error {
			None => {
				successful += 1;
				info!(path = %result.path.display(), "unpacked");
			}
			Some(err) => {
				failed += 1;
				error!(path = %result.path.display(), "unpack failed: {err}");
			}
		}
	}

	println!(
		"{successful}/{} entries unpacked into {}",
		successful + failed,
		out_dir.display()
	);
	if failed > 0 {
		Err(miette::miette!("{failed} entries failed to unpack"))
	} else {
		Ok(())
	}
}
