//! The ordered checks a peer's channel config must pass, plus the local
//! bound checks each side enforces on its own proposed parameters before
//! ever touching the wire.

use crate::config::ChannelConfig;
use crate::error::ChannelFailure;

/// `funding_satoshis` MUST be strictly less than 2**24.
pub const MAX_FUNDING_SATOSHIS: u64 = 1 << 24;

/// Policy bounds supplied by the supervisor at `init` and carried for the
/// lifetime of the negotiation.
#[derive(Clone, Copy, Debug)]
pub struct PolicyBounds {
	pub max_to_self_delay: u16,
	pub min_effective_htlc_capacity_msat: u64,
}

/// Runs the seven remote-config checks in order, short-circuiting on the
/// first failure. `funding_satoshis` is already known to be below
/// [`MAX_FUNDING_SATOSHIS`] by the time this runs (checked separately,
/// earlier, by whichever side owns that value first).
pub fn validate_remote_config(
	localconf: &ChannelConfig,
	remoteconf: &ChannelConfig,
	funding_satoshis: u64,
	policy: &PolicyBounds,
) -> Result<u64, ChannelFailure> {
	// 1. to_self_delay bound.
	if remoteconf.to_self_delay > policy.max_to_self_delay {
		return Err(ChannelFailure::PeerBadConfig(format!(
			"to_self_delay {} exceeds our maximum {}",
			remoteconf.to_self_delay, policy.max_to_self_delay
		)));
	}

	// 2. reserve must not exceed the funding amount, or later capacity math
	// underflows.
	if remoteconf.channel_reserve_satoshis > funding_satoshis {
		return Err(ChannelFailure::PeerBadConfig(format!(
			"channel_reserve_satoshis {} exceeds funding_satoshis {}",
			remoteconf.channel_reserve_satoshis, funding_satoshis
		)));
	}

	// 3. effective reserve in msat, the larger of the two sides'.
	let reserve_msat =
		std::cmp::max(remoteconf.channel_reserve_satoshis, localconf.channel_reserve_satoshis) * 1000;

	// 4. capacity available for HTLCs after reserving both sides' minimums.
	let capacity_msat =
		std::cmp::min(funding_satoshis * 1000 - reserve_msat, remoteconf.max_htlc_value_in_flight_msat);

	// 5. htlc_minimum_msat, scaled by 1000 before comparison against capacity_msat.
	if (remoteconf.htlc_minimum_msat as u64) * 1000 > capacity_msat {
		return Err(ChannelFailure::PeerBadConfig(format!(
			"htlc_minimum_msat {} leaves no usable capacity (capacity_msat={})",
			remoteconf.htlc_minimum_msat, capacity_msat
		)));
	}

	// 6. floor on the capacity itself.
	if capacity_msat < policy.min_effective_htlc_capacity_msat {
		return Err(ChannelFailure::PeerBadConfig(format!(
			"effective htlc capacity {} msat below our minimum {}",
			capacity_msat, policy.min_effective_htlc_capacity_msat
		)));
	}

	// 7. max_accepted_htlcs in [1, 511].
	if remoteconf.max_accepted_htlcs < 1 || remoteconf.max_accepted_htlcs > 511 {
		return Err(ChannelFailure::PeerBadConfig(format!(
			"max_accepted_htlcs {} out of range [1, 511]",
			remoteconf.max_accepted_htlcs
		)));
	}

	Ok(capacity_msat)
}

/// Locally-set values enforced before ever sending our own opening message.
/// Both funder and fundee share these checks.
pub fn validate_local_funding_params(funding_satoshis: u64, push_msat: u64) -> Result<(), ChannelFailure> {
	if funding_satoshis >= MAX_FUNDING_SATOSHIS {
		return Err(ChannelFailure::BadParam(format!(
			"funding_satoshis {} must be < 2^24",
			funding_satoshis
		)));
	}
	if push_msat > funding_satoshis.saturating_mul(1000) {
		return Err(ChannelFailure::BadParam(format!(
			"push_msat {} exceeds 1000 * funding_satoshis ({})",
			push_msat,
			funding_satoshis * 1000
		)));
	}
	Ok(())
}

/// Same bound as [`validate_local_funding_params`] but reported as a peer
/// failure. Used by the fundee, which receives `funding_satoshis`/`push_msat`
/// from the peer's `open_channel` rather than proposing them itself.
pub fn validate_peer_funding_params(funding_satoshis: u64, push_msat: u64) -> Result<(), ChannelFailure> {
	if funding_satoshis >= MAX_FUNDING_SATOSHIS {
		return Err(ChannelFailure::PeerBadFunding(format!(
			"funding_satoshis {} must be < 2^24",
			funding_satoshis
		)));
	}
	if push_msat > funding_satoshis.saturating_mul(1000) {
		return Err(ChannelFailure::PeerBadFunding(format!(
			"push_msat {} exceeds 1000 * funding_satoshis ({})",
			push_msat,
			funding_satoshis * 1000
		)));
	}
	Ok(())
}

/// Fundee-only: the funder's proposed feerate must fall within our
/// acceptable range.
pub fn validate_feerate(feerate_per_kw: u32, min_feerate: u32, max_feerate: u32) -> Result<(), ChannelFailure> {
	if feerate_per_kw < min_feerate || feerate_per_kw > max_feerate {
		return Err(ChannelFailure::PeerBadFunding(format!(
			"feerate_per_kw {} outside [{}, {}]",
			feerate_per_kw, min_feerate, max_feerate
		)));
	}
	Ok(())
}

/// Funder-only: reject a fundee that demands too many confirmations before
/// considering the channel locked in.
pub fn validate_minimum_depth(minimum_depth: u32, max_minimum_depth: u32) -> Result<(), ChannelFailure> {
	if minimum_depth > max_minimum_depth {
		return Err(ChannelFailure::PeerBadConfig(format!(
			"minimum_depth {} exceeds our maximum {}",
			minimum_depth, max_minimum_depth
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn conf(reserve: u64, max_in_flight: u64, htlc_min: u32, max_htlcs: u16, to_self_delay: u16) -> ChannelConfig {
		ChannelConfig {
			dust_limit_satoshis: 546,
			max_htlc_value_in_flight_msat: max_in_flight,
			channel_reserve_satoshis: reserve,
			htlc_minimum_msat: htlc_min,
			to_self_delay,
			max_accepted_htlcs: max_htlcs,
			minimum_depth: 0,
		}
	}

	fn policy() -> PolicyBounds {
		PolicyBounds { max_to_self_delay: 2016, min_effective_htlc_capacity_msat: 1 }
	}

	#[test]
	fn accepts_reasonable_config() {
		let localconf = conf(10_000, 1_000_000_000, 1, 30, 144);
		let remoteconf = conf(10_000, 1_000_000_000, 1, 30, 144);
		assert!(validate_remote_config(&localconf, &remoteconf, 1_000_000, &policy()).is_ok());
	}

	#[test]
	fn rejects_to_self_delay_too_large() {
		let localconf = conf(10_000, 1_000_000_000, 1, 30, 144);
		let remoteconf = conf(10_000, 1_000_000_000, 1, 30, 1009);
		let mut p = policy();
		p.max_to_self_delay = 1008;
		assert!(matches!(
			validate_remote_config(&localconf, &remoteconf, 1_000_000, &p),
			Err(ChannelFailure::PeerBadConfig(_))
		));
	}

	#[test]
	fn rejects_max_accepted_htlcs_out_of_range() {
		let localconf = conf(10_000, 1_000_000_000, 1, 30, 144);
		for bad in [0u16, 512u16] {
			let remoteconf = conf(10_000, 1_000_000_000, 1, bad, 144);
			assert!(matches!(
				validate_remote_config(&localconf, &remoteconf, 1_000_000, &policy()),
				Err(ChannelFailure::PeerBadConfig(_))
			));
		}
	}

	#[test]
	fn rejects_funding_at_the_2_24_boundary() {
		assert!(validate_local_funding_params(MAX_FUNDING_SATOSHIS, 0).is_err());
		assert!(validate_local_funding_params(MAX_FUNDING_SATOSHIS - 1, 0).is_ok());
	}

	#[test]
	fn rejects_push_msat_over_bound() {
		assert!(validate_local_funding_params(1000, 1_000_000).is_ok());
		assert!(validate_local_funding_params(1000, 1_000_001).is_err());
	}

	#[test]
	fn rejects_feerate_below_minimum() {
		assert!(validate_feerate(999, 1000, 50_000).is_err());
		assert!(validate_feerate(1000, 1000, 50_000).is_ok());
	}
}
