use std::path::PathBuf;

use clap::{Parser, ValueHint};
use miette::IntoDiagnostic;
use tracing::info;
use vromfs::image::{Item, VromfsFile};

#[derive(Debug, Clone, Parser)]
pub struct DigestsArgs {
	/// Archive to summarise.
	#[arg(
		value_hint = ValueHint::FilePath,
		value_name = "PATH",
	)]
	pub input: PathBuf,

	/// Only these entry paths; all entries when omitted.
	#[arg(value_name = "ENTRY")]
	pub entries: Vec<PathBuf>,
}

pub(crate) fn digests(args: DigestsArgs) -> miette::Result<()> {
	info!("open archive");
	let mut vromfs = VromfsFile::open_bin(&args.input).into_diagnostic()?;

	let items: Option<Vec<Item<'_>>> = if args.entries.is_empty() {
		None
	} else {
		Some(args.entries.iter().map(Item::from).collect())
	};

	let mut absent = Vec::new();
	let table = vromfs
		.digests_table(items.as_deref(), Some(&mut absent))
		.into_diagnostic()?;

	for (path, digest) in &table {
		println!("{digest}  {}", path.display());
	}
	for path in &absent {
		eprintln!("absent: {}", path.display());
	}

	if absent.is_empty() {
		Ok(())
	} else {
		Err(miette::miette!("{} entries were not found", absent.len()))
	}
}
