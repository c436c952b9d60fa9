//! BOLT-2 wire messages this engine sends or receives: `open_channel`,
//! `accept_channel`, `funding_created`, `funding_signed`, and the generic
//! `error` message used to fail a channel. `chain_hash` is deliberately
//! omitted from `open_channel`/`accept_channel`; this engine is only ever
//! run against a single, pre-agreed chain.

use std::io;
use std::io::{Read, Write};

use bitcoin::secp256k1::key::PublicKey;
use bitcoin::secp256k1::Signature;

use crate::ser::{DecodeError, Readable, Writeable, Writer};

/// BOLT-2 message type numbers. `Error` is included because the engine's
/// best-effort peer notification on a protocol failure uses it.
pub mod msg_type {
	pub const ERROR: u16 = 17;
	pub const OPEN_CHANNEL: u16 = 32;
	pub const ACCEPT_CHANNEL: u16 = 33;
	pub const FUNDING_CREATED: u16 = 34;
	pub const FUNDING_SIGNED: u16 = 35;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenChannel {
	pub temporary_channel_id: [u8; 32],
	pub funding_satoshis: u64,
	pub push_msat: u64,
	pub dust_limit_satoshis: u64,
	pub max_htlc_value_in_flight_msat: u64,
	pub channel_reserve_satoshis: u64,
	pub htlc_minimum_msat: u32,
	pub feerate_per_kw: u32,
	pub to_self_delay: u16,
	pub max_accepted_htlcs: u16,
	pub funding_pubkey: PublicKey,
	pub revocation_basepoint: PublicKey,
	pub payment_basepoint: PublicKey,
	pub delayed_payment_basepoint: PublicKey,
	pub first_per_commitment_point: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptChannel {
	pub temporary_channel_id: [u8; 32],
	pub dust_limit_satoshis: u64,
	pub max_htlc_value_in_flight_msat: u64,
	pub channel_reserve_satoshis: u64,
	pub minimum_depth: u32,
	pub htlc_minimum_msat: u32,
	pub to_self_delay: u16,
	pub max_accepted_htlcs: u16,
	pub funding_pubkey: PublicKey,
	pub revocation_basepoint: PublicKey,
	pub payment_basepoint: PublicKey,
	pub delayed_payment_basepoint: PublicKey,
	pub first_per_commitment_point: PublicKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingCreated {
	pub temporary_channel_id: [u8; 32],
	pub funding_txid: [u8; 32],
	pub funding_output_index: u16,
	pub signature: Signature,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundingSigned {
	pub channel_id: [u8; 32],
	pub signature: Signature,
}

/// A BOLT-1 `error` message: `channel_id` of all-zeroes means "no specific
/// channel", which is never the case here since we always have at least a
/// temporary channel id once we're far enough along to fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMessage {
	pub channel_id: [u8; 32],
	pub data: Vec<u8>,
}

macro_rules! impl_pubkey_fields_writeable {
	($name: ident, { $($field: ident: $ty: ty),* $(,)? }) => {
		impl Writeable for $name {
			fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
				$(self.$field.write(writer)?;)*
				Ok(())
			}
		}
	};
}

impl_pubkey_fields_writeable!(OpenChannel, {
	temporary_channel_id: [u8; 32],
	funding_satoshis: u64,
	push_msat: u64,
	dust_limit_satoshis: u64,
	max_htlc_value_in_flight_msat: u64,
	channel_reserve_satoshis: u64,
	htlc_minimum_msat: u32,
	feerate_per_kw: u32,
	to_self_delay: u16,
	max_accepted_htlcs: u16,
	funding_pubkey: PublicKey,
	revocation_basepoint: PublicKey,
	payment_basepoint: PublicKey,
	delayed_payment_basepoint: PublicKey,
	first_per_commitment_point: PublicKey,
});

impl Readable for OpenChannel {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(OpenChannel {
			temporary_channel_id: Readable::read(r)?,
			funding_satoshis: Readable::read(r)?,
			push_msat: Readable::read(r)?,
			dust_limit_satoshis: Readable::read(r)?,
			max_htlc_value_in_flight_msat: Readable::read(r)?,
			channel_reserve_satoshis: Readable::read(r)?,
			htlc_minimum_msat: Readable::read(r)?,
			feerate_per_kw: Readable::read(r)?,
			to_self_delay: Readable::read(r)?,
			max_accepted_htlcs: Readable::read(r)?,
			funding_pubkey: Readable::read(r)?,
			revocation_basepoint: Readable::read(r)?,
			payment_basepoint: Readable::read(r)?,
			delayed_payment_basepoint: Readable::read(r)?,
			first_per_commitment_point: Readable::read(r)?,
		})
	}
}

impl_pubkey_fields_writeable!(AcceptChannel, {
	temporary_channel_id: [u8; 32],
	dust_limit_satoshis: u64,
	max_htlc_value_in_flight_msat: u64,
	channel_reserve_satoshis: u64,
	minimum_depth: u32,
	htlc_minimum_msat: u32,
	to_self_delay: u16,
	max_accepted_htlcs: u16,
	funding_pubkey: PublicKey,
	revocation_basepoint: PublicKey,
	payment_basepoint: PublicKey,
	delayed_payment_basepoint: PublicKey,
	first_per_commitment_point: PublicKey,
});

impl Readable for AcceptChannel {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(AcceptChannel {
			temporary_channel_id: Readable::read(r)?,
			dust_limit_satoshis: Readable::read(r)?,
			max_htlc_value_in_flight_msat: Readable::read(r)?,
			channel_reserve_satoshis: Readable::read(r)?,
			minimum_depth: Readable::read(r)?,
			htlc_minimum_msat: Readable::read(r)?,
			to_self_delay: Readable::read(r)?,
			max_accepted_htlcs: Readable::read(r)?,
			funding_pubkey: Readable::read(r)?,
			revocation_basepoint: Readable::read(r)?,
			payment_basepoint: Readable::read(r)?,
			delayed_payment_basepoint: Readable::read(r)?,
			first_per_commitment_point: Readable::read(r)?,
		})
	}
}

impl Writeable for FundingCreated {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.temporary_channel_id.write(writer)?;
		self.funding_txid.write(writer)?;
		self.funding_output_index.write(writer)?;
		self.signature.write(writer)
	}
}
impl Readable for FundingCreated {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(FundingCreated {
			temporary_channel_id: Readable::read(r)?,
			funding_txid: Readable::read(r)?,
			funding_output_index: Readable::read(r)?,
			signature: Readable::read(r)?,
		})
	}
}

impl Writeable for FundingSigned {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.channel_id.write(writer)?;
		self.signature.write(writer)
	}
}
impl Readable for FundingSigned {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(FundingSigned { channel_id: Readable::read(r)?, signature: Readable::read(r)? })
	}
}

impl Writeable for ErrorMessage {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.channel_id.write(writer)?;
		(self.data.len() as u16).write(writer)?;
		writer.write_all(&self.data)
	}
}
impl Readable for ErrorMessage {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		let channel_id = Readable::read(r)?;
		let len: u16 = Readable::read(r)?;
		let mut data = vec![0u8; len as usize];
		r.read_exact(&mut data)?;
		Ok(ErrorMessage { channel_id, data })
	}
}

/// Writes a message prefixed with its 2-byte BOLT-1 type, the shape every
/// message takes on the encrypted peer wire.
pub fn encode_with_type<M: Writeable>(msg_type: u16, msg: &M) -> Vec<u8> {
	let mut buf = Vec::new();
	msg_type.write(&mut buf).expect("in-memory write can't fail");
	msg.write(&mut buf).expect("in-memory write can't fail");
	buf
}

#[cfg(test)]
mod tests {
	use super::*;
	use bitcoin::secp256k1::{Secp256k1, SecretKey};

	fn pk(byte: u8) -> PublicKey {
		let secp_ctx = Secp256k1::new();
		PublicKey::from_secret_key(&secp_ctx, &SecretKey::from_slice(&[byte; 32]).unwrap())
	}

	fn sig(byte: u8) -> Signature {
		let secp_ctx = Secp256k1::new();
		let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
		let msg = bitcoin::secp256k1::Message::from_slice(&[byte; 32]).unwrap();
		secp_ctx.sign(&msg, &sk)
	}

	#[test]
	fn open_channel_roundtrips() {
		let msg = OpenChannel {
			temporary_channel_id: [0xff; 32],
			funding_satoshis: 1_000_000,
			push_msat: 0,
			dust_limit_satoshis: 546,
			max_htlc_value_in_flight_msat: 1_000_000_000,
			channel_reserve_satoshis: 10_000,
			htlc_minimum_msat: 1,
			feerate_per_kw: 15_000,
			to_self_delay: 144,
			max_accepted_htlcs: 30,
			funding_pubkey: pk(1),
			revocation_basepoint: pk(2),
			payment_basepoint: pk(3),
			delayed_payment_basepoint: pk(4),
			first_per_commitment_point: pk(5),
		};
		let buf = msg.encode();
		let mut cursor = &buf[..];
		assert_eq!(OpenChannel::read(&mut cursor).unwrap(), msg);
	}

	#[test]
	fn accept_channel_roundtrips() {
		let msg = AcceptChannel {
			temporary_channel_id: [0xff; 32],
			dust_limit_satoshis: 546,
			max_htlc_value_in_flight_msat: 1_000_000_000,
			channel_reserve_satoshis: 10_000,
			minimum_depth: 3,
			htlc_minimum_msat: 1,
			to_self_delay: 144,
			max_accepted_htlcs: 30,
			funding_pubkey: pk(6),
			revocation_basepoint: pk(7),
			payment_basepoint: pk(8),
			delayed_payment_basepoint: pk(9),
			first_per_commitment_point: pk(10),
		};
		let buf = msg.encode();
		let mut cursor = &buf[..];
		assert_eq!(AcceptChannel::read(&mut cursor).unwrap(), msg);
	}

	#[test]
	fn funding_created_roundtrips() {
		let msg = FundingCreated {
			temporary_channel_id: [0xff; 32],
			funding_txid: [0x11; 32],
			funding_output_index: 1,
			signature: sig(11),
		};
		let buf = msg.encode();
		let mut cursor = &buf[..];
		assert_eq!(FundingCreated::read(&mut cursor).unwrap(), msg);
	}

	#[test]
	fn funding_signed_roundtrips() {
		let msg = FundingSigned { channel_id: [0xff; 32], signature: sig(12) };
		let buf = msg.encode();
		let mut cursor = &buf[..];
		assert_eq!(FundingSigned::read(&mut cursor).unwrap(), msg);
	}

	#[test]
	fn truncated_open_channel_is_a_short_read() {
		let msg = OpenChannel {
			temporary_channel_id: [0xff; 32],
			funding_satoshis: 1_000_000,
			push_msat: 0,
			dust_limit_satoshis: 546,
			max_htlc_value_in_flight_msat: 1_000_000_000,
			channel_reserve_satoshis: 10_000,
			htlc_minimum_msat: 1,
			feerate_per_kw: 15_000,
			to_self_delay: 144,
			max_accepted_htlcs: 30,
			funding_pubkey: pk(1),
			revocation_basepoint: pk(2),
			payment_basepoint: pk(3),
			delayed_payment_basepoint: pk(4),
			first_per_commitment_point: pk(5),
		};
		let mut buf = msg.encode();
		buf.truncate(buf.len() - 10);
		let mut cursor = &buf[..];
		assert!(matches!(OpenChannel::read(&mut cursor), Err(DecodeError::ShortRead)));
	}
}
