//! Fundee state machine: the "we accept" path, entered with an
//! already-received `open_channel` passed through by the supervisor. Mirror
//! image of `funder.rs`'s flat sequence; see that module's doc comment for
//! why this isn't modeled as an event-driven state machine.
//!
//! Carries one notable quirk: the `first_per_commitment_point` this engine
//! puts on the wire in `accept_channel` is the funder's own point echoed
//! back, not our own `next_per_commit[LOCAL]`.

use std::io::{Read, Write};

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::Secp256k1;

use crate::chan_utils::{self, ChannelPublicKeys, FirstCommitmentParams, TxCreationKeys};
use crate::config::{self, ChannelConfig};
use crate::error::{ChannelFailure, EngineFatal};
use crate::keys::KeyMaterial;
use crate::msgs::{self, msg_type};
use crate::peer::PeerStream;
use crate::ser::Readable;
use crate::supervisor::{AcceptMsg, NegotiationResult};
use crate::validate::{self, PolicyBounds};

/// Runs the fundee path to completion: T0 GOT_OPEN through T2 DONE. Unlike
/// the funder path, nothing here talks to the supervisor mid-flow; the
/// caller sends `accept_resp` itself once this returns.
pub fn run_fundee<P: Read + Write>(
	keys: &KeyMaterial,
	localconf_template: ChannelConfig,
	policy: PolicyBounds,
	accept_req: AcceptMsg,
	peer: &mut PeerStream<P>,
) -> Result<NegotiationResult, EngineFatal> {
	// T0 GOT_OPEN
	let mut cursor = &accept_req.open_channel_bytes[..];
	let open = msgs::OpenChannel::read(&mut cursor)
		.map_err(|e| EngineFatal::from(ChannelFailure::PeerBadInitialMessage(e.to_string())))?;

	validate::validate_peer_funding_params(open.funding_satoshis, open.push_msat).map_err(EngineFatal::from)?;
	validate::validate_feerate(open.feerate_per_kw, accept_req.min_feerate, accept_req.max_feerate)
		.map_err(EngineFatal::from)?;

	let mut localconf = localconf_template;
	localconf.channel_reserve_satoshis = config::reserve_for_funding(open.funding_satoshis);

	let remoteconf = ChannelConfig {
		dust_limit_satoshis: open.dust_limit_satoshis,
		max_htlc_value_in_flight_msat: open.max_htlc_value_in_flight_msat,
		channel_reserve_satoshis: open.channel_reserve_satoshis,
		htlc_minimum_msat: open.htlc_minimum_msat,
		to_self_delay: open.to_self_delay,
		max_accepted_htlcs: open.max_accepted_htlcs,
		minimum_depth: 0,
	};
	validate::validate_remote_config(&localconf, &remoteconf, open.funding_satoshis, &policy)
		.map_err(EngineFatal::from)?;

	let remote_keys = ChannelPublicKeys {
		funding_pubkey: open.funding_pubkey,
		revocation_basepoint: open.revocation_basepoint,
		payment_basepoint: open.payment_basepoint,
		delayed_payment_basepoint: open.delayed_payment_basepoint,
	};
	let our_keys = ChannelPublicKeys {
		funding_pubkey: keys.points.funding,
		revocation_basepoint: keys.points.revocation_basepoint,
		payment_basepoint: keys.points.payment_basepoint,
		delayed_payment_basepoint: keys.points.delayed_payment_basepoint,
	};

	let accept_channel_msg = msgs::AcceptChannel {
		temporary_channel_id: open.temporary_channel_id,
		dust_limit_satoshis: localconf.dust_limit_satoshis,
		max_htlc_value_in_flight_msat: localconf.max_htlc_value_in_flight_msat,
		channel_reserve_satoshis: localconf.channel_reserve_satoshis,
		minimum_depth: localconf.minimum_depth,
		htlc_minimum_msat: localconf.htlc_minimum_msat,
		to_self_delay: localconf.to_self_delay,
		max_accepted_htlcs: localconf.max_accepted_htlcs,
		funding_pubkey: keys.points.funding,
		revocation_basepoint: keys.points.revocation_basepoint,
		payment_basepoint: keys.points.payment_basepoint,
		delayed_payment_basepoint: keys.points.delayed_payment_basepoint,
		// This is the funder's own point (`next_per_commit[REMOTE]` from our
		// perspective), echoed back, rather than `keys.next_per_commit_local`.
		first_per_commitment_point: open.first_per_commitment_point,
	};
	peer.send(msg_type::ACCEPT_CHANNEL, &accept_channel_msg)
		.map_err(|e| EngineFatal::from(ChannelFailure::PeerWriteFailed(e.to_string())))?;

	// T1 SENT_ACCEPT
	let funding_created: msgs::FundingCreated = peer
		.recv_expecting(msg_type::FUNDING_CREATED)
		.map_err(|e| EngineFatal::from(ChannelFailure::PeerReadFailed(e.to_string())))?;

	if funding_created.temporary_channel_id != open.temporary_channel_id {
		return Err(EngineFatal::from(ChannelFailure::PeerReadFailed(
			"funding_created echoed the wrong temporary_channel_id".into(),
		)));
	}

	let funding_outpoint = bitcoin::blockdata::transaction::OutPoint {
		txid: bitcoin::hash_types::Txid::from_inner(funding_created.funding_txid),
		vout: funding_created.funding_output_index as u32,
	};

	let secp_ctx = Secp256k1::new();
	let redeemscript = chan_utils::make_funding_redeemscript(&keys.points.funding, &open.funding_pubkey);
	let obscure_factor =
		chan_utils::commitment_number_obscure_factor(&open.payment_basepoint, &keys.points.payment_basepoint);

	let our_balance_sat = open.push_msat / 1000;
	let their_balance_sat = open.funding_satoshis - our_balance_sat;

	// Our first commitment tx: we're the broadcaster, keyed off our own
	// per-commitment point.
	let local_commit_keys =
		TxCreationKeys::derive(&secp_ctx, &keys.next_per_commit_local, &our_keys, &remote_keys)
			.map_err(|e| EngineFatal::from(ChannelFailure::PeerBadFunding(e.to_string())))?;
	let local_commitment_tx = chan_utils::build_first_commitment_transaction(&FirstCommitmentParams {
		funding_outpoint,
		obscure_factor,
		to_broadcaster_sat: our_balance_sat,
		to_countersignatory_sat: their_balance_sat,
		dust_limit_sat: localconf.dust_limit_satoshis,
		to_self_delay: localconf.to_self_delay,
		keys: local_commit_keys,
		countersignatory_payment_point: open.payment_basepoint,
	});

	chan_utils::verify_commitment_signature(
		&secp_ctx,
		&local_commitment_tx,
		&redeemscript,
		open.funding_satoshis,
		&open.funding_pubkey,
		&funding_created.signature,
	)
	.map_err(|_| EngineFatal::from(ChannelFailure::PeerReadFailed("bad signature in funding_created".into())))?;

	// The funder's first commitment tx: they're the broadcaster, keyed off
	// the point they gave us in `open_channel`.
	let remote_commit_keys = TxCreationKeys::derive(
		&secp_ctx,
		&open.first_per_commitment_point,
		&remote_keys,
		&our_keys,
	)
	.map_err(|e| EngineFatal::from(ChannelFailure::PeerBadFunding(e.to_string())))?;
	let remote_commitment_tx = chan_utils::build_first_commitment_transaction(&FirstCommitmentParams {
		funding_outpoint,
		obscure_factor,
		to_broadcaster_sat: their_balance_sat,
		to_countersignatory_sat: our_balance_sat,
		dust_limit_sat: remoteconf.dust_limit_satoshis,
		to_self_delay: remoteconf.to_self_delay,
		keys: remote_commit_keys,
		countersignatory_payment_point: keys.points.payment_basepoint,
	});

	let sig_for_them = chan_utils::sign_commitment(
		&secp_ctx,
		&remote_commitment_tx,
		&redeemscript,
		open.funding_satoshis,
		&keys.secrets.funding,
	);

	peer.send(
		msg_type::FUNDING_SIGNED,
		&msgs::FundingSigned { channel_id: open.temporary_channel_id, signature: sig_for_them },
	)
	.map_err(|e| EngineFatal::from(ChannelFailure::PeerWriteFailed(e.to_string())))?;

	// T2 DONE
	Ok(NegotiationResult {
		channel_id: open.temporary_channel_id,
		remoteconf,
		their_signature: funding_created.signature,
		remote_revocation_basepoint: open.revocation_basepoint,
		remote_payment_basepoint: open.payment_basepoint,
		remote_delayed_payment_basepoint: open.delayed_payment_basepoint,
		next_per_commit_remote: open.first_per_commitment_point,
	})
}
