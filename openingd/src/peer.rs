//! The peer stream: a framed, bidirectional byte connection to the remote
//! node, received on fd 3 and handed back to the supervisor intact once the
//! negotiation succeeds. The encrypted transport framing itself is assumed
//! to already deframe to the BOLT-1 length-prefixed shape this module reads
//! and writes.
//!
//! Ownership is linear: `PeerStream` is moved into whichever state machine
//! runs, and moved back out, never cloned, never borrowed past a state
//! transition, so that use after handoff is a compile error rather than a
//! runtime bug.

use std::io;
use std::io::{Read, Write};

use crate::msgs;
use crate::ser::{DecodeError, Readable, Writeable};

/// A single framed message read off the peer wire: its BOLT-1 type and the
/// raw payload bytes following it, not yet parsed into a concrete message
/// struct. Kept this way so a caller expecting `accept_channel` can reject
/// an unexpected type without us having to guess the right parser up front.
struct RawPeerMessage {
	msg_type: u16,
	payload: Vec<u8>,
}

/// Linearly-owned handle to the peer's encrypted byte stream. `T` is
/// whatever the supervisor handed us on fd 3: in production a raw OS
/// socket/pipe, in tests an in-memory duplex buffer.
pub struct PeerStream<T: Read + Write> {
	inner: T,
}

impl<T: Read + Write> PeerStream<T> {
	pub fn new(inner: T) -> Self {
		PeerStream { inner }
	}

	/// Sends `msg` framed as `msg_type` (u16 BE) followed by its encoding,
	/// itself prefixed with a u16 BE length, the same shape BOLT-1 uses once
	/// the transport's own encryption framing is stripped away.
	pub fn send<M: Writeable>(&mut self, msg_type: u16, msg: &M) -> Result<(), io::Error> {
		let body = msgs::encode_with_type(msg_type, msg);
		(body.len() as u16).write(&mut self.inner)?;
		self.inner.write_all(&body)
	}

	/// Sends a best-effort BOLT-1 `error` message. Failures writing it are
	/// swallowed by the caller, which is already failing the channel; a
	/// failed best-effort write doesn't change the outcome.
	pub fn send_error(&mut self, channel_id: [u8; 32], reason: &str) -> Result<(), io::Error> {
		let msg = msgs::ErrorMessage { channel_id, data: reason.as_bytes().to_vec() };
		self.send(msgs::msg_type::ERROR, &msg)
	}

	fn recv_raw(&mut self) -> Result<RawPeerMessage, DecodeError> {
		let len: u16 = Readable::read(&mut self.inner)?;
		let mut buf = vec![0u8; len as usize];
		self.inner.read_exact(&mut buf)?;
		if buf.len() < 2 {
			return Err(DecodeError::ShortRead);
		}
		let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
		Ok(RawPeerMessage { msg_type, payload: buf[2..].to_vec() })
	}

	/// Reads the next frame and parses it as `M`, failing if the type tag
	/// doesn't match `expected_type`. Callers turn a `DecodeError` into
	/// `ChannelFailure::PeerReadFailed`.
	pub fn recv_expecting<M: Readable>(&mut self, expected_type: u16) -> Result<M, DecodeError> {
		let raw = self.recv_raw()?;
		if raw.msg_type != expected_type {
			return Err(DecodeError::InvalidValue);
		}
		let mut cursor = &raw.payload[..];
		M::read(&mut cursor)
	}

	/// Gives back the underlying transport, consuming this handle. The only
	/// legitimate caller is the terminal success path, which hands the
	/// descriptor back to the supervisor.
	pub fn into_inner(self) -> T {
		self.inner
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	/// A trivial `Read + Write` over two independent buffers, standing in
	/// for the duplex fd 3 stream in unit tests that don't need a real pipe.
	struct DuplexBuf {
		read_from: Cursor<Vec<u8>>,
		written: Vec<u8>,
	}

	impl Read for DuplexBuf {
		fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
			self.read_from.read(buf)
		}
	}
	impl Write for DuplexBuf {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.written.write(buf)
		}
		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	#[test]
	fn send_then_recv_same_frame_on_a_loopback_buffer() {
		let msg = msgs::FundingSigned { channel_id: [0x22; 32], signature: {
			use bitcoin::secp256k1::{Secp256k1, SecretKey, Message};
			let secp = Secp256k1::new();
			let sk = SecretKey::from_slice(&[0x33; 32]).unwrap();
			secp.sign(&Message::from_slice(&[0x44; 32]).unwrap(), &sk)
		}};

		let mut framed = Vec::new();
		let body = msgs::encode_with_type(msgs::msg_type::FUNDING_SIGNED, &msg);
		(body.len() as u16).write(&mut framed).unwrap();
		framed.extend_from_slice(&body);

		let mut peer = PeerStream::new(DuplexBuf { read_from: Cursor::new(framed), written: Vec::new() });
		let got: msgs::FundingSigned = peer.recv_expecting(msgs::msg_type::FUNDING_SIGNED).unwrap();
		assert_eq!(got, msg);
	}

	#[test]
	fn recv_expecting_wrong_type_is_rejected() {
		let msg = msgs::FundingSigned { channel_id: [0x22; 32], signature: {
			use bitcoin::secp256k1::{Secp256k1, SecretKey, Message};
			let secp = Secp256k1::new();
			let sk = SecretKey::from_slice(&[0x33; 32]).unwrap();
			secp.sign(&Message::from_slice(&[0x44; 32]).unwrap(), &sk)
		}};
		let mut framed = Vec::new();
		let body = msgs::encode_with_type(msgs::msg_type::FUNDING_SIGNED, &msg);
		(body.len() as u16).write(&mut framed).unwrap();
		framed.extend_from_slice(&body);

		let mut peer = PeerStream::new(DuplexBuf { read_from: Cursor::new(framed), written: Vec::new() });
		let got: Result<msgs::AcceptChannel, _> = peer.recv_expecting(msgs::msg_type::ACCEPT_CHANNEL);
		assert!(got.is_err());
	}
}
