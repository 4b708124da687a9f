use std::path::PathBuf;

use clap::{Parser, ValueHint};
use miette::IntoDiagnostic;
use tracing::info;
use vromfs::{
	container::BinFile,
	image::VromfsFile,
	Error,
};

#[derive(Debug, Clone, Parser)]
pub struct CheckArgs {
	/// Archive to verify.
	#[arg(
		value_hint = ValueHint::FilePath,
		value_name = "PATH",
	)]
	pub input: PathBuf,

	/// Also verify per-entry SHA-1 digests, when the image stores them.
	#[arg(long)]
	pub entries: bool,
}

pub(crate) fn check(args: CheckArgs) -> miette::Result<()> {
	info!("open archive");
	let mut bin = BinFile::open(&args.input).into_diagnostic()?;

	match bin.check().into_diagnostic()? {
		None => println!("container: no digest stored"),
		Some(true) => println!("container: ok"),
		Some(false) => {
			return Err(Error::Integrity {
				subject: format!("container payload of {}", args.input.display()),
			})
			.into_diagnostic()
		}
	}

	if args.entries {
		let mut vromfs = VromfsFile::from_bin(bin).into_diagnostic()?;
		match vromfs.check().into_diagnostic()? {
			None => println!("entries: no digests stored"),
			Some(failed) if failed.is_empty() => println!("entries: ok"),
			Some(failed) => {
				for path in &failed {
					eprintln!("entry mismatch: {}", path.display());
				}
				return Err(Error::Integrity {
					subject: format!("{} entries of {}", failed.len(), args.input.display()),
				})
				.into_diagnostic();
			}
		}
	}

	Ok(())
}
