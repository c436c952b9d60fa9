//! Top-level orchestration: init, derive keys, read the role selector, run
//! exactly one of Funder or Fundee, emit the result, hand the peer stream
//! back, wait for exit, terminate. This is the only module that owns both
//! the control channel and the peer stream at once; everything below it
//! only ever sees one or the other.

use std::io::{Read, Write};

use crate::error::EngineFatal;
use crate::funder;
use crate::fundee;
use crate::keys::KeyMaterial;
use crate::peer::PeerStream;
use crate::supervisor::{ControlChannel, FatalStatus, RoleRequest};
use crate::validate::PolicyBounds;

/// Drives one negotiation end to end over `peer_transport` (fd 3) and
/// `control_in`/`control_out` (stdin/stdout). Returns `Ok(())` only after
/// `exit_req` has been received; any failure along the way is already fully
/// reported to both the peer (best-effort) and the supervisor by the time
/// it's returned, so the caller's only remaining job is to pick an exit
/// code from it.
pub fn run<P: Read + Write, R: Read, W: Write>(
	peer_transport: P,
	control_in: R,
	control_out: W,
) -> Result<(), EngineFatal> {
	let mut ctrl = ControlChannel::new(control_in, control_out);
	let mut peer = PeerStream::new(peer_transport);

	match run_inner(&mut peer, &mut ctrl) {
		Ok(()) => {
			ctrl.wait_exit()?;
			Ok(())
		}
		Err(fatal) => {
			report_failure(&fatal, &mut peer, &mut ctrl);
			Err(fatal)
		}
	}
}

fn run_inner<P: Read + Write, R: Read, W: Write>(
	peer: &mut PeerStream<P>,
	ctrl: &mut ControlChannel<R, W>,
) -> Result<(), EngineFatal> {
	let init = ctrl.read_init()?;
	let keys = KeyMaterial::derive(&init.seed)?;
	let policy = PolicyBounds {
		max_to_self_delay: init.max_to_self_delay,
		min_effective_htlc_capacity_msat: init.min_effective_htlc_capacity_msat,
	};

	let role = ctrl.read_role()?;
	let result = match role {
		RoleRequest::Open(open) => funder::run_funder(&keys, init.localconf, policy, open, peer, ctrl)?,
		RoleRequest::Accept(accept) => {
			let result = fundee::run_fundee(&keys, init.localconf, policy, accept, peer)?;
			ctrl.send_accept_resp(&result)?;
			return Ok(());
		}
	};
	ctrl.send_open_funding_resp(&result)?;
	Ok(())
}

/// Best-effort failure reporting: a wire error to the peer when the failure
/// kind warrants one, then a structured status to the supervisor. Neither
/// send is allowed to mask the original error; failures here are swallowed.
fn report_failure<P: Read + Write, R: Read, W: Write>(
	fatal: &EngineFatal,
	peer: &mut PeerStream<P>,
	ctrl: &mut ControlChannel<R, W>,
) {
	if let EngineFatal::Channel(channel_failure) = fatal {
		if channel_failure.should_notify_peer() {
			let _ = peer.send_error([0u8; 32], &channel_failure.to_string());
		}
	}

	let _ = ctrl.send_fatal(&FatalStatus { kind: fatal.status_kind().to_string(), detail: fatal.to_string() });
}
