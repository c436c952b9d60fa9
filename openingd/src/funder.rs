//! Funder state machine: the "we initiate" path. Shaped after the
//! propose, accepted, signing, funding, done sequence, generalized here into
//! a flat sequence since this engine has no event bus to dispatch through:
//! every transition is a direct, blocking `send`/`recv` on one of the two
//! control surfaces, performed in strict order.

use std::io::{Read, Write};

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::Secp256k1;

use crate::chan_utils::{self, ChannelPublicKeys, FirstCommitmentParams, TxCreationKeys};
use crate::config::{self, ChannelConfig};
use crate::error::{ChannelFailure, EngineFatal};
use crate::keys::KeyMaterial;
use crate::msgs::{self, msg_type};
use crate::peer::PeerStream;
use crate::supervisor::{ControlChannel, NegotiationResult, OpenMsg, OpenRespMsg};
use crate::validate::{self, PolicyBounds};

/// Marks which step a running negotiation is at. Not driven through an
/// event queue (there's nothing to queue here): `run_funder` advances
/// through these in a straight line and exists mainly so a panic or an
/// early return is easy to attribute to a specific step while debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunderStep {
	Init,
	SentOpen,
	AwaitOutpoint,
	SentFundingCreated,
	Done,
}

/// Runs the funder path to completion: S0 INIT through S4 DONE. `peer`
/// carries the peer stream, `ctrl` the supervisor control wire; both are
/// borrowed for the duration of the call and not released until the caller
/// (`engine.rs`) decides the negotiation is over.
pub fn run_funder<P: Read + Write, R: Read, W: Write>(
	keys: &KeyMaterial,
	localconf_template: ChannelConfig,
	policy: PolicyBounds,
	open: OpenMsg,
	peer: &mut PeerStream<P>,
	ctrl: &mut ControlChannel<R, W>,
) -> Result<NegotiationResult, EngineFatal> {
	// S0 INIT
	let mut localconf = localconf_template;
	localconf.channel_reserve_satoshis = config::reserve_for_funding(open.funding_satoshis);

	validate::validate_local_funding_params(open.funding_satoshis, open.push_msat)
		.map_err(EngineFatal::from)?;

	let temporary_channel_id = [0xffu8; 32];

	let open_channel_msg = msgs::OpenChannel {
		temporary_channel_id,
		funding_satoshis: open.funding_satoshis,
		push_msat: open.push_msat,
		dust_limit_satoshis: localconf.dust_limit_satoshis,
		max_htlc_value_in_flight_msat: localconf.max_htlc_value_in_flight_msat,
		channel_reserve_satoshis: localconf.channel_reserve_satoshis,
		htlc_minimum_msat: localconf.htlc_minimum_msat,
		feerate_per_kw: open.feerate_per_kw,
		to_self_delay: localconf.to_self_delay,
		max_accepted_htlcs: localconf.max_accepted_htlcs,
		funding_pubkey: keys.points.funding,
		revocation_basepoint: keys.points.revocation_basepoint,
		payment_basepoint: keys.points.payment_basepoint,
		delayed_payment_basepoint: keys.points.delayed_payment_basepoint,
		first_per_commitment_point: keys.next_per_commit_local,
	};

	peer.send(msg_type::OPEN_CHANNEL, &open_channel_msg)
		.map_err(|e| EngineFatal::from(ChannelFailure::PeerWriteFailed(e.to_string())))?;

	// S1 SENT_OPEN
	let accept: msgs::AcceptChannel = peer
		.recv_expecting(msg_type::ACCEPT_CHANNEL)
		.map_err(|e| EngineFatal::from(ChannelFailure::PeerReadFailed(e.to_string())))?;

	if accept.temporary_channel_id != temporary_channel_id {
		return Err(EngineFatal::from(ChannelFailure::PeerReadFailed(
			"accept_channel echoed the wrong temporary_channel_id".into(),
		)));
	}

	validate::validate_minimum_depth(accept.minimum_depth, open.max_minimum_depth).map_err(EngineFatal::from)?;

	let remoteconf = ChannelConfig {
		dust_limit_satoshis: accept.dust_limit_satoshis,
		max_htlc_value_in_flight_msat: accept.max_htlc_value_in_flight_msat,
		channel_reserve_satoshis: accept.channel_reserve_satoshis,
		htlc_minimum_msat: accept.htlc_minimum_msat,
		to_self_delay: accept.to_self_delay,
		max_accepted_htlcs: accept.max_accepted_htlcs,
		minimum_depth: accept.minimum_depth,
	};
	validate::validate_remote_config(&localconf, &remoteconf, open.funding_satoshis, &policy)
		.map_err(EngineFatal::from)?;

	let remote_keys = ChannelPublicKeys {
		funding_pubkey: accept.funding_pubkey,
		revocation_basepoint: accept.revocation_basepoint,
		payment_basepoint: accept.payment_basepoint,
		delayed_payment_basepoint: accept.delayed_payment_basepoint,
	};
	let our_keys = ChannelPublicKeys {
		funding_pubkey: keys.points.funding,
		revocation_basepoint: keys.points.revocation_basepoint,
		payment_basepoint: keys.points.payment_basepoint,
		delayed_payment_basepoint: keys.points.delayed_payment_basepoint,
	};

	ctrl.send_open_resp(&OpenRespMsg {
		our_funding_pubkey: keys.points.funding,
		their_funding_pubkey: accept.funding_pubkey,
	})
	.map_err(EngineFatal::from)?;

	// S2 AWAIT_OUTPOINT
	let outpoint = ctrl.read_open_funding().map_err(EngineFatal::from)?;
	let funding_outpoint = bitcoin::blockdata::transaction::OutPoint {
		txid: bitcoin::hash_types::Txid::from_inner(outpoint.funding_txid),
		vout: outpoint.funding_txout as u32,
	};

	let secp_ctx = Secp256k1::new();
	let redeemscript = chan_utils::make_funding_redeemscript(&keys.points.funding, &accept.funding_pubkey);

	let remote_balance_sat = open.push_msat / 1000;
	let local_balance_sat = open.funding_satoshis - remote_balance_sat;

	let remote_commit_keys = TxCreationKeys::derive(
		&secp_ctx,
		&accept.first_per_commitment_point,
		&remote_keys,
		&our_keys,
	)
	.map_err(|e| EngineFatal::from(ChannelFailure::PeerBadFunding(e.to_string())))?;

	let remote_commitment_tx = chan_utils::build_first_commitment_transaction(&FirstCommitmentParams {
		funding_outpoint,
		obscure_factor: chan_utils::commitment_number_obscure_factor(&keys.points.payment_basepoint, &accept.payment_basepoint),
		to_broadcaster_sat: remote_balance_sat,
		to_countersignatory_sat: local_balance_sat,
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

	let funding_created_msg = msgs::FundingCreated {
		temporary_channel_id,
		funding_txid: outpoint.funding_txid,
		funding_output_index: outpoint.funding_txout,
		signature: sig_for_them,
	};
	peer.send(msg_type::FUNDING_CREATED, &funding_created_msg)
		.map_err(|e| EngineFatal::from(ChannelFailure::PeerWriteFailed(e.to_string())))?;

	// S3 SENT_FUNDING_CREATED
	let funding_signed: msgs::FundingSigned = peer
		.recv_expecting(msg_type::FUNDING_SIGNED)
		.map_err(|e| EngineFatal::from(ChannelFailure::PeerReadFailed(e.to_string())))?;

	if funding_signed.channel_id != temporary_channel_id {
		return Err(EngineFatal::from(ChannelFailure::PeerReadFailed(
			"funding_signed echoed the wrong channel_id".into(),
		)));
	}

	let local_commit_keys =
		TxCreationKeys::derive(&secp_ctx, &keys.next_per_commit_local, &our_keys, &remote_keys)
			.map_err(|e| EngineFatal::from(ChannelFailure::PeerBadFunding(e.to_string())))?;

	let local_commitment_tx = chan_utils::build_first_commitment_transaction(&FirstCommitmentParams {
		funding_outpoint,
		obscure_factor: chan_utils::commitment_number_obscure_factor(&keys.points.payment_basepoint, &accept.payment_basepoint),
		to_broadcaster_sat: local_balance_sat,
		to_countersignatory_sat: remote_balance_sat,
		dust_limit_sat: localconf.dust_limit_satoshis,
		to_self_delay: localconf.to_self_delay,
		keys: local_commit_keys,
		countersignatory_payment_point: accept.payment_basepoint,
	});

	chan_utils::verify_commitment_signature(
		&secp_ctx,
		&local_commitment_tx,
		&redeemscript,
		open.funding_satoshis,
		&accept.funding_pubkey,
		&funding_signed.signature,
	)
	.map_err(|_| EngineFatal::from(ChannelFailure::PeerReadFailed("bad signature in funding_signed".into())))?;

	// S4 DONE
	Ok(NegotiationResult {
		channel_id: temporary_channel_id,
		remoteconf,
		their_signature: funding_signed.signature,
		remote_revocation_basepoint: accept.revocation_basepoint,
		remote_payment_basepoint: accept.payment_basepoint,
		remote_delayed_payment_basepoint: accept.delayed_payment_basepoint,
		next_per_commit_remote: accept.first_per_commitment_point,
	})
}
