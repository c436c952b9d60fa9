//! Minimal binary (de)serialization, in the shape rust-lightning's
//! `util::ser` module uses: a `Writeable`/`Readable` pair of traits plus
//! primitive impls, rather than pulling in a general-purpose serde backend
//! for a wire format that is neither self-describing nor schema-evolving.
//!
//! This crate only ever needs to encode/decode a handful of BOLT-2 messages
//! and a handful of supervisor control frames, so we keep exactly the
//! surface those need instead of the full upstream module.

use std::io;
use std::io::{Read, Write};

use bitcoin::secp256k1;
use bitcoin::secp256k1::key::PublicKey;
use bitcoin::secp256k1::Signature;

/// Anything `Readable`/`Writeable` can be written through. A blanket impl
/// over `io::Write` keeps call sites generic without inventing a new trait
/// hierarchy.
pub trait Writer: Write {}
impl<W: Write> Writer for W {}

/// Failure to decode a value read off the wire. Distinguished from
/// [`crate::error::EngineError`]/[`crate::error::ChannelFailure`] on
/// purpose: a `DecodeError` is a pure parsing failure with no opinion about
/// whether it's fatal to the process or just to the channel; callers
/// attach that meaning (see `PeerReadFailed` in `error.rs`).
#[derive(Debug)]
pub enum DecodeError {
	/// Not enough bytes were available to fill a fixed-size field.
	ShortRead,
	/// A value was present but outside the range the type allows (e.g. a
	/// non-canonical point encoding, or an unknown message type tag).
	InvalidValue,
	/// Wraps a lower-level I/O error from the underlying reader.
	Io(io::ErrorKind),
}

impl std::fmt::Display for DecodeError {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			DecodeError::ShortRead => write!(f, "short read"),
			DecodeError::InvalidValue => write!(f, "invalid value"),
			DecodeError::Io(kind) => write!(f, "io error: {:?}", kind),
		}
	}
}

impl std::error::Error for DecodeError {}

impl From<io::Error> for DecodeError {
	fn from(e: io::Error) -> Self {
		if e.kind() == io::ErrorKind::UnexpectedEof {
			DecodeError::ShortRead
		} else {
			DecodeError::Io(e.kind())
		}
	}
}

pub trait Writeable {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error>;

	/// Convenience encode to an owned buffer, used when a message needs to
	/// be sent as a whole chunk (peer wire framing, supervisor framing).
	fn encode(&self) -> Vec<u8> {
		let mut buf = Vec::new();
		self.write(&mut buf).expect("in-memory write can't fail");
		buf
	}
}

pub trait Readable: Sized {
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError>;
}

macro_rules! impl_int_writeable {
	($ty: ty, $size: expr) => {
		impl Writeable for $ty {
			fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
				writer.write_all(&self.to_be_bytes())
			}
		}
		impl Readable for $ty {
			fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
				let mut buf = [0u8; $size];
				reader.read_exact(&mut buf)?;
				Ok(<$ty>::from_be_bytes(buf))
			}
		}
	};
}

impl_int_writeable!(u8, 1);
impl_int_writeable!(u16, 2);
impl_int_writeable!(u32, 4);
impl_int_writeable!(u64, 8);

impl Writeable for [u8; 32] {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		writer.write_all(self)
	}
}
impl Readable for [u8; 32] {
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
		let mut buf = [0u8; 32];
		reader.read_exact(&mut buf)?;
		Ok(buf)
	}
}

impl Writeable for PublicKey {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		writer.write_all(&self.serialize())
	}
}
impl Readable for PublicKey {
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
		let mut buf = [0u8; 33];
		reader.read_exact(&mut buf)?;
		PublicKey::from_slice(&buf).map_err(|_| DecodeError::InvalidValue)
	}
}

/// BOLT wire signatures are 64-byte compact (r || s) ECDSA, never DER and
/// never carrying a recovery id.
impl Writeable for Signature {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		writer.write_all(&self.serialize_compact())
	}
}
impl Readable for Signature {
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
		let mut buf = [0u8; 64];
		reader.read_exact(&mut buf)?;
		Signature::from_compact(&buf).map_err(|_| DecodeError::InvalidValue)
	}
}

/// A length-prefixed (u32 big-endian) byte blob, used on the supervisor
/// control wire for payloads that don't have a fixed BOLT-2 shape (e.g. a
/// passed-through `open_channel` bytestring).
impl Writeable for Vec<u8> {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		(self.len() as u32).write(writer)?;
		writer.write_all(self)
	}
}
impl Readable for Vec<u8> {
	fn read<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
		let len: u32 = Readable::read(reader)?;
		let mut buf = vec![0u8; len as usize];
		reader.read_exact(&mut buf)?;
		Ok(buf)
	}
}

/// Turns a 32-byte digest into a secp256k1 message, for commitment sighash
/// signing and verification.
macro_rules! hash_to_message {
	($slice: expr) => {
		::bitcoin::secp256k1::Message::from_slice($slice).expect("sighash is always 32 bytes")
	};
}
pub(crate) use hash_to_message;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roundtrip_ints() {
		let mut buf = Vec::new();
		42u8.write(&mut buf).unwrap();
		1234u16.write(&mut buf).unwrap();
		0xdead_beefu32.write(&mut buf).unwrap();
		0x0123_4567_89ab_cdefu64.write(&mut buf).unwrap();

		let mut cursor = &buf[..];
		assert_eq!(u8::read(&mut cursor).unwrap(), 42u8);
		assert_eq!(u16::read(&mut cursor).unwrap(), 1234u16);
		assert_eq!(u32::read(&mut cursor).unwrap(), 0xdead_beef);
		assert_eq!(u64::read(&mut cursor).unwrap(), 0x0123_4567_89ab_cdef);
	}

	#[test]
	fn short_read_is_an_error() {
		let buf = [0u8; 1];
		let mut cursor = &buf[..];
		assert!(matches!(u64::read(&mut cursor), Err(DecodeError::ShortRead)));
	}

	#[test]
	fn pubkey_roundtrip() {
		let secp_ctx = secp256k1::Secp256k1::new();
		let sk = secp256k1::SecretKey::from_slice(&[0x11; 32]).unwrap();
		let pk = PublicKey::from_secret_key(&secp_ctx, &sk);
		let mut buf = Vec::new();
		pk.write(&mut buf).unwrap();
		assert_eq!(buf.len(), 33);
		let mut cursor = &buf[..];
		assert_eq!(PublicKey::read(&mut cursor).unwrap(), pk);
	}
}
