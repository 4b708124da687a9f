#![warn(clippy::unwrap_used)]
#![deny(rust_2018_idioms)]

use clap::Parser;
use miette::IntoDiagnostic;
use tracing::{debug, warn};

use crate::args::Action;

mod args;
mod check;
mod digests;
mod list;
mod logs;
mod pack;
mod unpack;

fn main() -> miette::Result<()> {
	let logs_on = logs::from_env().into_diagnostic()?;

	debug!("parsing arguments");
	let args = args::Args::parse();

	if logs_on {
		warn!("ignoring logging options from args");
	} else {
		logs::from_args(&args).into_diagnostic()?;
	}

	debug!(?args, "got arguments");

	match args.action {
		Action::List(args) => list::list(args),
		Action::Unpack(args) => unpack::unpack(args),
		Action::Pack(args) => pack::pack(args),
		Action::Check(args) => check::check(args),
		Action::Digests(args) => digests::digests(args),
	}
}
