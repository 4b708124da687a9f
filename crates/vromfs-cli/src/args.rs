use clap::{Parser, Subcommand};

use crate::{
	check::CheckArgs, digests::DigestsArgs, list::ListArgs, pack::PackArgs, unpack::UnpackArgs,
};

/// Pack, unpack and verify VROMFS game-asset archives.
#[derive(Debug, Clone, Parser)]
#[command(
	name = "vromfs",
	bin_name = "vromfs",
	author,
	version,
	after_help = "Want more detail? Try the long '--help' flag!",
	after_long_help = "Didn't expect this much output? Use the short '-h' flag to get short help."
)]
#[cfg_attr(debug_assertions, command(before_help = "⚠ DEBUG BUILD ⚠"))]
pub struct Args {
	/// What to do.
	#[command(subcommand)]
	pub action: Action,

	/// How chatty to be (-v = warn, -vv = info, etc).
	#[arg(
		long,
		short,
		action = clap::ArgAction::Count,
		global = true,
	)]
	pub verbose: u8,
}

/// What to do.
#[derive(Debug, Clone, Subcommand)]
pub enum Action {
	/// Print the entry table of an archive.
	List(ListArgs),

	/// Extract entries from an archive.
	Unpack(UnpackArgs),

	/// Pack a directory tree into an archive.
	Pack(PackArgs),

	/// Verify the archive digest and per-entry digests.
	Check(CheckArgs),

	/// Print a SHA-1 digest per entry.
	Digests(DigestsArgs),
}
