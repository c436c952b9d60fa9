//! The framed, length-prefixed, type-discriminated control protocol between
//! this engine and its parent supervisor. Distinct from the peer wire module
//! (`peer.rs`) even though the framing shape is similar, because the message
//! set, the direction of each message, and the failure semantics on a broken
//! read are all different: an unreadable control channel is always fatal
//! (`EngineError::ControlIo`), never something to "fail the channel" over.

use std::io;
use std::io::{Read, Write};

use bitcoin::secp256k1::key::PublicKey;
use bitcoin::secp256k1::Signature;

use crate::config::ChannelConfig;
use crate::error::EngineError;
use crate::ser::{DecodeError, Readable, Writeable, Writer};

/// Control-wire message type tags. `EXIT_REQ` carries no payload; every
/// other message's shape is defined below.
pub mod ctrl_type {
	pub const INIT: u8 = 1;
	pub const OPEN: u8 = 2;
	pub const ACCEPT: u8 = 3;
	pub const OPEN_RESP: u8 = 4;
	pub const OPEN_FUNDING: u8 = 5;
	pub const OPEN_FUNDING_RESP: u8 = 6;
	pub const ACCEPT_RESP: u8 = 7;
	pub const EXIT_REQ: u8 = 8;
	pub const FATAL: u8 = 9;
}

/// `init →`: everything the engine needs before it can do anything else.
/// `peer_cs` itself isn't part of this payload; it arrives out of band on
/// fd 3, already connected, by the time `init` is read.
pub struct InitMsg {
	pub localconf: ChannelConfig,
	pub max_to_self_delay: u16,
	pub min_effective_htlc_capacity_msat: u64,
	pub seed: [u8; 32],
}

impl Writeable for InitMsg {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.localconf.write(writer)?;
		self.max_to_self_delay.write(writer)?;
		self.min_effective_htlc_capacity_msat.write(writer)?;
		self.seed.write(writer)
	}
}
impl Readable for InitMsg {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(InitMsg {
			localconf: Readable::read(r)?,
			max_to_self_delay: Readable::read(r)?,
			min_effective_htlc_capacity_msat: Readable::read(r)?,
			seed: Readable::read(r)?,
		})
	}
}

/// `open →`: run the funder path.
pub struct OpenMsg {
	pub funding_satoshis: u64,
	pub push_msat: u64,
	pub feerate_per_kw: u32,
	pub max_minimum_depth: u32,
}

impl Writeable for OpenMsg {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.funding_satoshis.write(writer)?;
		self.push_msat.write(writer)?;
		self.feerate_per_kw.write(writer)?;
		self.max_minimum_depth.write(writer)
	}
}
impl Readable for OpenMsg {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(OpenMsg {
			funding_satoshis: Readable::read(r)?,
			push_msat: Readable::read(r)?,
			feerate_per_kw: Readable::read(r)?,
			max_minimum_depth: Readable::read(r)?,
		})
	}
}

/// `accept →`: run the fundee path. `open_channel_bytes` is the already
/// BOLT-2-encoded `open_channel` message (minus its 2-byte type tag) the
/// supervisor captured upstream of this process.
pub struct AcceptMsg {
	pub min_feerate: u32,
	pub max_feerate: u32,
	pub open_channel_bytes: Vec<u8>,
}

impl Writeable for AcceptMsg {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.min_feerate.write(writer)?;
		self.max_feerate.write(writer)?;
		self.open_channel_bytes.write(writer)
	}
}
impl Readable for AcceptMsg {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(AcceptMsg {
			min_feerate: Readable::read(r)?,
			max_feerate: Readable::read(r)?,
			open_channel_bytes: Readable::read(r)?,
		})
	}
}

/// `← open_resp` (funder only, mid-flow): lets the supervisor go source a
/// funding outpoint now that both funding pubkeys are known.
pub struct OpenRespMsg {
	pub our_funding_pubkey: PublicKey,
	pub their_funding_pubkey: PublicKey,
}

impl Writeable for OpenRespMsg {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.our_funding_pubkey.write(writer)?;
		self.their_funding_pubkey.write(writer)
	}
}
impl Readable for OpenRespMsg {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(OpenRespMsg { our_funding_pubkey: Readable::read(r)?, their_funding_pubkey: Readable::read(r)? })
	}
}

/// `open_funding →` (funder only, mid-flow response): the outpoint the
/// supervisor picked for the funding transaction.
pub struct OpenFundingMsg {
	pub funding_txid: [u8; 32],
	pub funding_txout: u16,
}

impl Writeable for OpenFundingMsg {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.funding_txid.write(writer)?;
		self.funding_txout.write(writer)
	}
}
impl Readable for OpenFundingMsg {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(OpenFundingMsg { funding_txid: Readable::read(r)?, funding_txout: Readable::read(r)? })
	}
}

/// The terminal success payload shared by `open_funding_resp` (funder) and
/// `accept_resp` (fundee). `peer_cs` itself isn't serialized here: it
/// crosses back to the supervisor by OS-level descriptor passing on fd 3,
/// which this struct's presence on the control wire is the signal for.
pub struct NegotiationResult {
	pub channel_id: [u8; 32],
	pub remoteconf: ChannelConfig,
	pub their_signature: Signature,
	pub remote_revocation_basepoint: PublicKey,
	pub remote_payment_basepoint: PublicKey,
	pub remote_delayed_payment_basepoint: PublicKey,
	pub next_per_commit_remote: PublicKey,
}

impl Writeable for NegotiationResult {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.channel_id.write(writer)?;
		self.remoteconf.write(writer)?;
		self.their_signature.write(writer)?;
		self.remote_revocation_basepoint.write(writer)?;
		self.remote_payment_basepoint.write(writer)?;
		self.remote_delayed_payment_basepoint.write(writer)?;
		self.next_per_commit_remote.write(writer)
	}
}
impl Readable for NegotiationResult {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(NegotiationResult {
			channel_id: Readable::read(r)?,
			remoteconf: Readable::read(r)?,
			their_signature: Readable::read(r)?,
			remote_revocation_basepoint: Readable::read(r)?,
			remote_payment_basepoint: Readable::read(r)?,
			remote_delayed_payment_basepoint: Readable::read(r)?,
			next_per_commit_remote: Readable::read(r)?,
		})
	}
}

/// A fatal status reported to the supervisor just before the process exits
/// nonzero. Carries the `status_kind()` string from `error.rs` so the
/// supervisor can act on the failure class without parsing free text.
pub struct FatalStatus {
	pub kind: String,
	pub detail: String,
}

impl Writeable for FatalStatus {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.kind.clone().into_bytes().write(writer)?;
		self.detail.clone().into_bytes().write(writer)
	}
}
impl Readable for FatalStatus {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let kind_bytes: Vec<u8> = Readable::read(r)?;
		let detail_bytes: Vec<u8> = Readable::read(r)?;
		Ok(FatalStatus {
			kind: String::from_utf8(kind_bytes).map_err(|_| DecodeError::InvalidValue)?,
			detail: String::from_utf8(detail_bytes).map_err(|_| DecodeError::InvalidValue)?,
		})
	}
}

/// Which path the supervisor asked us to run, decoded from the first
/// role-dispatch frame after `init`.
pub enum RoleRequest {
	Open(OpenMsg),
	Accept(AcceptMsg),
}

/// One frame on the control wire: 4-byte BE length covering type tag +
/// payload, then the type tag, then the `Writeable`-encoded payload.
fn write_frame<W: Write, M: Writeable>(writer: &mut W, msg_type: u8, msg: &M) -> Result<(), io::Error> {
	let mut body = Vec::new();
	msg_type.write(&mut body)?;
	msg.write(&mut body)?;
	(body.len() as u32).write(writer)?;
	writer.write_all(&body)
}

fn read_frame<R: Read>(reader: &mut R) -> Result<(u8, Vec<u8>), DecodeError> {
	let len: u32 = Readable::read(reader)?;
	let mut body = vec![0u8; len as usize];
	reader.read_exact(&mut body)?;
	if body.is_empty() {
		return Err(DecodeError::ShortRead);
	}
	Ok((body[0], body[1..].to_vec()))
}

/// The supervisor side of the wire, wrapping control-in (`R`, normally
/// stdin) and control-out (`W`, normally stdout). Every mandatory read that
/// fails is mapped to `EngineError::ControlIo`/`BadCommand`; there is no
/// such thing as a "protocol failure" on this channel.
pub struct ControlChannel<R: Read, W: Write> {
	control_in: R,
	control_out: W,
}

impl<R: Read, W: Write> ControlChannel<R, W> {
	pub fn new(control_in: R, control_out: W) -> Self {
		ControlChannel { control_in, control_out }
	}

	pub fn read_init(&mut self) -> Result<InitMsg, EngineError> {
		let (tag, body) = read_frame(&mut self.control_in)?;
		if tag != ctrl_type::INIT {
			return Err(EngineError::BadCommand(format!("expected init frame, got tag {}", tag)));
		}
		let mut cursor = &body[..];
		Ok(InitMsg::read(&mut cursor)?)
	}

	pub fn read_role(&mut self) -> Result<RoleRequest, EngineError> {
		let (tag, body) = read_frame(&mut self.control_in)?;
		let mut cursor = &body[..];
		match tag {
			ctrl_type::OPEN => Ok(RoleRequest::Open(OpenMsg::read(&mut cursor)?)),
			ctrl_type::ACCEPT => Ok(RoleRequest::Accept(AcceptMsg::read(&mut cursor)?)),
			other => Err(EngineError::BadCommand(format!("expected open/accept frame, got tag {}", other))),
		}
	}

	pub fn send_open_resp(&mut self, msg: &OpenRespMsg) -> Result<(), EngineError> {
		write_frame(&mut self.control_out, ctrl_type::OPEN_RESP, msg)?;
		Ok(())
	}

	pub fn read_open_funding(&mut self) -> Result<OpenFundingMsg, EngineError> {
		let (tag, body) = read_frame(&mut self.control_in)?;
		if tag != ctrl_type::OPEN_FUNDING {
			return Err(EngineError::BadCommand(format!("expected open_funding frame, got tag {}", tag)));
		}
		let mut cursor = &body[..];
		Ok(OpenFundingMsg::read(&mut cursor)?)
	}

	pub fn send_open_funding_resp(&mut self, result: &NegotiationResult) -> Result<(), EngineError> {
		write_frame(&mut self.control_out, ctrl_type::OPEN_FUNDING_RESP, result)?;
		Ok(())
	}

	pub fn send_accept_resp(&mut self, result: &NegotiationResult) -> Result<(), EngineError> {
		write_frame(&mut self.control_out, ctrl_type::ACCEPT_RESP, result)?;
		Ok(())
	}

	pub fn send_fatal(&mut self, status: &FatalStatus) -> Result<(), EngineError> {
		write_frame(&mut self.control_out, ctrl_type::FATAL, status)?;
		Ok(())
	}

	/// Blocks for `exit_req`. The engine must not exit before the supervisor
	/// has had a chance to observe the handed-back peer descriptor and send
	/// this.
	pub fn wait_exit(&mut self) -> Result<(), EngineError> {
		let (tag, _body) = read_frame(&mut self.control_in)?;
		if tag != ctrl_type::EXIT_REQ {
			return Err(EngineError::BadCommand(format!("expected exit_req, got tag {}", tag)));
		}
		Ok(())
	}
}
