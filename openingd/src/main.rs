//! Process entrypoint. Wires up the three I/O endpoints, stdin (control in),
//! stdout (control out), fd 3 (peer stream), and turns an
//! [`openingd::error::EngineFatal`] into the process exit code the
//! supervisor watches.
//!
//! Logging is initialized to stderr explicitly: stdout is the supervisor
//! control wire, and a stray log line on it would corrupt the framed
//! protocol.

use std::fs::File;
use std::io;
use std::os::unix::io::FromRawFd;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use openingd::engine;

/// This process speaks a fixed supervisor/peer protocol; it takes no
/// configuration of its own beyond knowing its own version.
#[derive(Parser)]
#[command(name = "openingd", version, about = "Lightning Network channel-opening engine", long_about = None)]
struct Cli;

/// Safety: the supervisor is contractually required to have fd 3 open and
/// connected to the peer stream before spawning this process. A missing or
/// invalid fd 3 is a supervisor bug, not something this engine can recover
/// from, so we accept the only unsafety in the whole crate right here at the
/// boundary instead of threading a `Result` through every downstream
/// read/write.
unsafe fn peer_stream_from_fd3() -> File {
	File::from_raw_fd(3)
}

fn main() -> ExitCode {
	let _cli = Cli::parse();

	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
		.target(env_logger::Target::Stderr)
		.init();

	let peer = unsafe { peer_stream_from_fd3() };

	match engine::run(peer, io::stdin(), io::stdout()) {
		Ok(()) => ExitCode::SUCCESS,
		Err(fatal) => {
			error!("channel negotiation failed: {} ({})", fatal, fatal.status_kind());
			ExitCode::from(fatal.exit_code() as u8)
		}
	}
}
