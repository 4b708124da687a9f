use std::path::PathBuf;

use clap::{Parser, ValueHint};
use miette::IntoDiagnostic;
use tracing::info;
use vromfs::image::VromfsFile;

#[derive(Debug, Clone, Parser)]
pub struct ListArgs {
	/// Archive to list.
	#[arg(
		value_hint = ValueHint::FilePath,
		value_name = "PATH",
	)]
	pub input: PathBuf,
}

pub(crate) fn list(args: ListArgs) -> miette::Result<()> {
	info!("open archive");
	let vromfs = VromfsFile::open_bin(&args.input).into_diagnostic()?;

	let digests = vromfs.checked();
	if digests {
		println!("{:<52} {:>12} {:>8}", "File Name", "Size", "SHA-1");
	} else {
		println!("{:<52} {:>12}", "File Name", "Size");
	}
	for info in vromfs.info_list() {
		let name = info.path.display().to_string();
		if let Some(digest) = &info.digest {
			let hex = digest.to_string();
			println!("{name:<52} {:>12} {:>8}", info.size, &hex[..8]);
		} else {
			println!("{name:<52} {:>12}", info.size);
		}
	}

	Ok(())
}
