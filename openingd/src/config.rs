//! Per-side channel parameters. Symmetric: both the config we propose and
//! the one the peer sends back use the same shape.

use std::io;
use std::io::Read;

use crate::ser::{DecodeError, Readable, Writeable, Writer};

/// One side's channel parameters, as carried in `open_channel`/`accept_channel`
/// (minus the basepoints, which live in [`crate::keys::Points`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
	pub dust_limit_satoshis: u64,
	pub max_htlc_value_in_flight_msat: u64,
	pub channel_reserve_satoshis: u64,
	pub htlc_minimum_msat: u32,
	pub to_self_delay: u16,
	pub max_accepted_htlcs: u16,
	/// Only meaningful on the fundee's config: confirmations the funder must
	/// see before the channel is locked in. Zero when unused (the funder's
	/// own `localconf` never reads this field).
	pub minimum_depth: u32,
}

/// `⌈funding_satoshis / 100⌉`, the 1% channel reserve every side sets on
/// its own config.
pub fn reserve_for_funding(funding_satoshis: u64) -> u64 {
	(funding_satoshis + 99) / 100
}

/// Used on the supervisor control wire (`init`, and embedded in the terminal
/// result messages). Never on the peer wire, where the fields are inlined
/// directly into `open_channel`/`accept_channel`.
impl Writeable for ChannelConfig {
	fn write<W: Writer>(&self, writer: &mut W) -> Result<(), io::Error> {
		self.dust_limit_satoshis.write(writer)?;
		self.max_htlc_value_in_flight_msat.write(writer)?;
		self.channel_reserve_satoshis.write(writer)?;
		self.htlc_minimum_msat.write(writer)?;
		self.to_self_delay.write(writer)?;
		self.max_accepted_htlcs.write(writer)?;
		self.minimum_depth.write(writer)
	}
}
impl Readable for ChannelConfig {
	fn read<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
		Ok(ChannelConfig {
			dust_limit_satoshis: Readable::read(r)?,
			max_htlc_value_in_flight_msat: Readable::read(r)?,
			channel_reserve_satoshis: Readable::read(r)?,
			htlc_minimum_msat: Readable::read(r)?,
			to_self_delay: Readable::read(r)?,
			max_accepted_htlcs: Readable::read(r)?,
			minimum_depth: Readable::read(r)?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reserve_rounds_up() {
		assert_eq!(reserve_for_funding(99), 1);
		assert_eq!(reserve_for_funding(100), 1);
		assert_eq!(reserve_for_funding(101), 2);
		assert_eq!(reserve_for_funding(200), 2);
	}

	#[test]
	fn channel_config_roundtrips() {
		let cfg = ChannelConfig {
			dust_limit_satoshis: 546,
			max_htlc_value_in_flight_msat: 1_000_000_000,
			channel_reserve_satoshis: 10_000,
			htlc_minimum_msat: 1,
			to_self_delay: 144,
			max_accepted_htlcs: 30,
			minimum_depth: 3,
		};
		let buf = cfg.encode();
		let mut cursor = &buf[..];
		assert_eq!(ChannelConfig::read(&mut cursor).unwrap(), cfg);
	}
}
