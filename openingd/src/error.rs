//! The two disjoint failure kinds in this engine: protocol failures (the
//! peer misbehaved, "fail the channel") and local failures (our own command
//! stream or key material is broken). Nothing here is recoverable: every
//! variant eventually becomes a nonzero process exit.

use std::io;

use crate::ser::DecodeError;

/// A protocol-level failure: the peer violated a MUST, or a signature we
/// were given doesn't verify. The engine sends a best-effort error frame to
/// the peer, reports the subtype to the supervisor, and exits nonzero.
#[derive(Debug, thiserror::Error)]
pub enum ChannelFailure {
	#[error("peer's initial message was malformed or out of sequence: {0}")]
	PeerBadInitialMessage(String),

	#[error("peer proposed or accepted invalid funding parameters: {0}")]
	PeerBadFunding(String),

	#[error("peer's channel configuration violates a protocol bound: {0}")]
	PeerBadConfig(String),

	#[error("failed to read an expected message from the peer: {0}")]
	PeerReadFailed(String),

	#[error("failed to write a message to the peer: {0}")]
	PeerWriteFailed(String),

	#[error("a locally proposed parameter is invalid: {0}")]
	BadParam(String),
}

impl ChannelFailure {
	/// The supervisor status subtype string, exactly as the wire names it
	/// (`peer-bad-<something>`, or the two local-looking but still
	/// channel-scoped names used for param/IO failures).
	pub fn status_kind(&self) -> &'static str {
		match self {
			ChannelFailure::PeerBadInitialMessage(_) => "PEER_BAD_INITIAL_MESSAGE",
			ChannelFailure::PeerBadFunding(_) => "PEER_BAD_FUNDING",
			ChannelFailure::PeerBadConfig(_) => "PEER_BAD_CONFIG",
			ChannelFailure::PeerReadFailed(_) => "PEER_READ_FAILED",
			ChannelFailure::PeerWriteFailed(_) => "PEER_WRITE_FAILED",
			ChannelFailure::BadParam(_) => "BAD_PARAM",
		}
	}

	/// Whether a best-effort wire error should still be attempted towards
	/// the peer. We never try to write to a peer stream we just failed to
	/// write to, or a read that already proves the stream is gone, and a
	/// `BadParam` failure by definition happens before any message was sent
	/// to this peer at all.
	pub fn should_notify_peer(&self) -> bool {
		!matches!(self, ChannelFailure::PeerWriteFailed(_) | ChannelFailure::BadParam(_))
	}
}

/// A local failure: malformed supervisor command, unusable key material, or
/// an OS-level I/O error on the control channel. No peer error is sent; from
/// the peer's perspective we simply vanish, which the supervisor's
/// process-lifecycle handling is expected to cover.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	#[error("malformed or unexpected supervisor command: {0}")]
	BadCommand(String),

	#[error("key derivation produced an unusable scalar")]
	KeyDerivationFailed,

	#[error("supervisor control channel I/O error: {0}")]
	ControlIo(#[from] io::Error),
}

impl EngineError {
	pub fn status_kind(&self) -> &'static str {
		match self {
			EngineError::BadCommand(_) => "BAD_COMMAND",
			EngineError::KeyDerivationFailed => "KEY_DERIVATION_FAILED",
			EngineError::ControlIo(_) => "BAD_COMMAND",
		}
	}
}

impl From<DecodeError> for EngineError {
	fn from(e: DecodeError) -> Self {
		EngineError::BadCommand(e.to_string())
	}
}

/// The single error type `main` deals with: either failure kind, carrying
/// the process exit code the two kinds share (any nonzero code; we use 1
/// for protocol failures and 2 for local failures so a supervisor watching
/// exit codes can tell the two apart without parsing stdout).
#[derive(Debug, thiserror::Error)]
pub enum EngineFatal {
	#[error(transparent)]
	Channel(#[from] ChannelFailure),
	#[error(transparent)]
	Local(#[from] EngineError),
}

impl EngineFatal {
	pub fn exit_code(&self) -> i32 {
		match self {
			EngineFatal::Channel(_) => 1,
			EngineFatal::Local(_) => 2,
		}
	}

	pub fn status_kind(&self) -> &'static str {
		match self {
			EngineFatal::Channel(e) => e.status_kind(),
			EngineFatal::Local(e) => e.status_kind(),
		}
	}
}
