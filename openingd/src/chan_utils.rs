//! BOLT-3 channel transaction utilities: the funding redeem script, the
//! per-commitment key-tweak derivations, the revocable `to_local` script,
//! and the builder/signer/verifier for a side's *first* commitment
//! transaction. This is the only commitment transaction the opening
//! handshake ever needs to build, since it carries no HTLCs yet.

use bitcoin::blockdata::opcodes;
use bitcoin::blockdata::script::{Builder, Script};
use bitcoin::blockdata::transaction::{OutPoint, Transaction, TxIn, TxOut};
use bitcoin::hash_types::WPubkeyHash;
use bitcoin::hashes::sha256::Hash as Sha256;
use bitcoin::hashes::{Hash, HashEngine};
use bitcoin::secp256k1;
use bitcoin::secp256k1::key::{PublicKey, SecretKey};
use bitcoin::secp256k1::{Secp256k1, Signature, Signing, Verification};
use bitcoin::util::bip143;

use crate::ser::hash_to_message;

/// The four basepoints one side contributes to a channel, as they appear on
/// the wire in `open_channel`/`accept_channel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelPublicKeys {
	pub funding_pubkey: PublicKey,
	pub revocation_basepoint: PublicKey,
	pub payment_basepoint: PublicKey,
	pub delayed_payment_basepoint: PublicKey,
}

/// Which side a commitment transaction is being built for: the broadcaster
/// of that transaction is the one whose `to_local`/delayed output it is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
	Local,
	Remote,
}

/// Keys derived for one specific commitment transaction: the per-commitment
/// point it's built from, the revocation pubkey that can punish it if
/// revoked, and the broadcaster's delayed payment key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxCreationKeys {
	pub per_commitment_point: PublicKey,
	pub revocation_key: PublicKey,
	pub a_delayed_payment_key: PublicKey,
}

impl TxCreationKeys {
	/// Derives the keys needed to build/spend `side`'s commitment
	/// transaction at `per_commitment_point`, given both sides' basepoints.
	pub fn derive<C: Verification>(
		secp_ctx: &Secp256k1<C>,
		per_commitment_point: &PublicKey,
		broadcaster_keys: &ChannelPublicKeys,
		countersignatory_keys: &ChannelPublicKeys,
	) -> Result<TxCreationKeys, secp256k1::Error> {
		let revocation_key =
			derive_public_revocation_key(secp_ctx, per_commitment_point, &countersignatory_keys.revocation_basepoint)?;
		let a_delayed_payment_key =
			derive_public_key(secp_ctx, per_commitment_point, &broadcaster_keys.delayed_payment_basepoint)?;
		Ok(TxCreationKeys { per_commitment_point: *per_commitment_point, revocation_key, a_delayed_payment_key })
	}
}

/// Builds the 2-of-2 funding redeem script with keys ordered
/// lexicographically, per BOLT-3.
pub fn make_funding_redeemscript(a: &PublicKey, b: &PublicKey) -> Script {
	let a_ser = a.serialize();
	let b_ser = b.serialize();
	let (first, second) = if a_ser[..] < b_ser[..] { (&a_ser, &b_ser) } else { (&b_ser, &a_ser) };
	Builder::new()
		.push_opcode(opcodes::all::OP_PUSHNUM_2)
		.push_slice(first)
		.push_slice(second)
		.push_opcode(opcodes::all::OP_PUSHNUM_2)
		.push_opcode(opcodes::all::OP_CHECKMULTISIG)
		.into_script()
}

/// `pubkey = basepoint + SHA256(per_commitment_point || basepoint) * G`
pub fn derive_public_key<C: Verification>(
	secp_ctx: &Secp256k1<C>,
	per_commitment_point: &PublicKey,
	base_point: &PublicKey,
) -> Result<PublicKey, secp256k1::Error> {
	let tweak = {
		let mut sha = Sha256::engine();
		sha.input(&per_commitment_point.serialize());
		sha.input(&base_point.serialize());
		Sha256::from_engine(sha).into_inner()
	};
	let mut key = *base_point;
	key.add_exp_assign(secp_ctx, &tweak)?;
	Ok(key)
}

/// Private-key counterpart of [`derive_public_key`].
pub fn derive_private_key<C: Signing>(
	secp_ctx: &Secp256k1<C>,
	per_commitment_point: &PublicKey,
	base_secret: &SecretKey,
) -> Result<SecretKey, secp256k1::Error> {
	let tweak = {
		let mut sha = Sha256::engine();
		sha.input(&per_commitment_point.serialize());
		sha.input(&PublicKey::from_secret_key(secp_ctx, base_secret).serialize());
		Sha256::from_engine(sha).into_inner()
	};
	let mut key = *base_secret;
	key.add_assign(&tweak)?;
	Ok(key)
}

/// `revocationpubkey = revocation_basepoint*H(revocation_basepoint||P) + P*H(P||revocation_basepoint)`
pub fn derive_public_revocation_key<C: Verification>(
	secp_ctx: &Secp256k1<C>,
	per_commitment_point: &PublicKey,
	revocation_basepoint: &PublicKey,
) -> Result<PublicKey, secp256k1::Error> {
	let rev_tweak = {
		let mut sha = Sha256::engine();
		sha.input(&revocation_basepoint.serialize());
		sha.input(&per_commitment_point.serialize());
		Sha256::from_engine(sha).into_inner()
	};
	let commit_tweak = {
		let mut sha = Sha256::engine();
		sha.input(&per_commitment_point.serialize());
		sha.input(&revocation_basepoint.serialize());
		Sha256::from_engine(sha).into_inner()
	};

	let mut part_a = *revocation_basepoint;
	part_a.mul_assign(secp_ctx, &rev_tweak)?;
	let mut part_b = *per_commitment_point;
	part_b.mul_assign(secp_ctx, &commit_tweak)?;
	part_a.combine(&part_b)
}

/// Private-key counterpart of [`derive_public_revocation_key`], needed if
/// this side ever has to produce a justice transaction after a revoked
/// commitment is broadcast.
pub fn derive_private_revocation_key<C: Signing>(
	secp_ctx: &Secp256k1<C>,
	per_commitment_secret: &SecretKey,
	revocation_base_secret: &SecretKey,
) -> Result<SecretKey, secp256k1::Error> {
	let per_commitment_point = PublicKey::from_secret_key(secp_ctx, per_commitment_secret);
	let revocation_basepoint = PublicKey::from_secret_key(secp_ctx, revocation_base_secret);

	let rev_tweak = {
		let mut sha = Sha256::engine();
		sha.input(&revocation_basepoint.serialize());
		sha.input(&per_commitment_point.serialize());
		Sha256::from_engine(sha).into_inner()
	};
	let commit_tweak = {
		let mut sha = Sha256::engine();
		sha.input(&per_commitment_point.serialize());
		sha.input(&revocation_basepoint.serialize());
		Sha256::from_engine(sha).into_inner()
	};

	let mut part_a = *revocation_base_secret;
	part_a.mul_assign(&rev_tweak)?;
	let mut part_b = *per_commitment_secret;
	part_b.mul_assign(&commit_tweak)?;
	part_a.add_assign(&part_b[..])?;
	Ok(part_a)
}

/// The revocable `to_local` witness script: spendable immediately by the
/// revocation key, or after `to_self_delay` blocks by the delayed payment
/// key.
pub fn get_revokeable_redeemscript(
	revocation_key: &PublicKey,
	to_self_delay: u16,
	delayed_payment_key: &PublicKey,
) -> Script {
	Builder::new()
		.push_opcode(opcodes::all::OP_IF)
		.push_slice(&revocation_key.serialize())
		.push_opcode(opcodes::all::OP_ELSE)
		.push_int(to_self_delay as i64)
		.push_opcode(opcodes::all::OP_CSV)
		.push_opcode(opcodes::all::OP_DROP)
		.push_slice(&delayed_payment_key.serialize())
		.push_opcode(opcodes::all::OP_ENDIF)
		.push_opcode(opcodes::all::OP_CHECKSIG)
		.into_script()
}

/// Lower 48 bits of `SHA256(opener_payment_basepoint || accepter_payment_basepoint)`,
/// XORed with the commitment number to obscure it in the transaction's
/// locktime/sequence fields (BOLT-3).
pub fn commitment_number_obscure_factor(
	opener_payment_basepoint: &PublicKey,
	accepter_payment_basepoint: &PublicKey,
) -> u64 {
	let mut sha = Sha256::engine();
	sha.input(&opener_payment_basepoint.serialize());
	sha.input(&accepter_payment_basepoint.serialize());
	let res = Sha256::from_engine(sha).into_inner();
	((res[26] as u64) << 40)
		| ((res[27] as u64) << 32)
		| ((res[28] as u64) << 24)
		| ((res[29] as u64) << 16)
		| ((res[30] as u64) << 8)
		| (res[31] as u64)
}

/// Everything needed to build one side's first (HTLC-free) commitment
/// transaction.
pub struct FirstCommitmentParams {
	pub funding_outpoint: OutPoint,
	pub obscure_factor: u64,
	pub to_broadcaster_sat: u64,
	pub to_countersignatory_sat: u64,
	pub dust_limit_sat: u64,
	pub to_self_delay: u16,
	pub keys: TxCreationKeys,
	/// Countersignatory's payment basepoint, paid directly. No
	/// per-commitment tweak applies to this output (static remote key
	/// semantics).
	pub countersignatory_payment_point: PublicKey,
}

/// Builds `side`'s first commitment transaction: a single input spending
/// the funding outpoint, an optional `to_local` (revocable) output and an
/// optional `to_remote` (plain P2WPKH) output, each dropped if below
/// `dust_limit_sat`, ordered by BOLT-3's value-then-scriptPubKey rule.
pub fn build_first_commitment_transaction(params: &FirstCommitmentParams) -> Transaction {
	// Commitment number 0: this is the first commitment either side has
	// ever produced for this channel.
	let obscured = 0u64 ^ params.obscure_factor;
	let lock_time = 0x2000_0000u32 | ((obscured >> 24) as u32 & 0x00FF_FFFF);
	let sequence = 0x8000_0000u32 | (obscured as u32 & 0x00FF_FFFF);

	let to_local_script =
		get_revokeable_redeemscript(&params.keys.revocation_key, params.to_self_delay, &params.keys.a_delayed_payment_key);

	let mut outputs = Vec::with_capacity(2);
	if params.to_broadcaster_sat >= params.dust_limit_sat {
		outputs.push(TxOut { value: params.to_broadcaster_sat, script_pubkey: to_local_script.to_v0_p2wsh() });
	}
	if params.to_countersignatory_sat >= params.dust_limit_sat {
		let wpkh = WPubkeyHash::hash(&params.countersignatory_payment_point.serialize());
		outputs.push(TxOut { value: params.to_countersignatory_sat, script_pubkey: Script::new_v0_wpkh(&wpkh) });
	}
	outputs.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| a.script_pubkey[..].cmp(&b.script_pubkey[..])));

	Transaction {
		version: 2,
		lock_time,
		input: vec![TxIn {
			previous_output: params.funding_outpoint,
			script_sig: Script::new(),
			sequence,
			witness: vec![],
		}],
		output: outputs,
	}
}

/// Signs `commitment_tx`'s single funding-spending input with
/// `our_funding_key`, SIGHASH_ALL.
pub fn sign_commitment<C: Signing + Verification>(
	secp_ctx: &Secp256k1<C>,
	commitment_tx: &Transaction,
	funding_redeemscript: &Script,
	channel_value_satoshis: u64,
	our_funding_key: &SecretKey,
) -> Signature {
	let sighash = hash_to_message!(&bip143::SighashComponents::new(commitment_tx)
		.sighash_all(&commitment_tx.input[0], funding_redeemscript, channel_value_satoshis)[..]);
	secp_ctx.sign(&sighash, our_funding_key)
}

/// Verifies a peer-supplied signature against `their_funding_pubkey` over
/// the same sighash [`sign_commitment`] would produce for this transaction.
pub fn verify_commitment_signature<C: Verification>(
	secp_ctx: &Secp256k1<C>,
	commitment_tx: &Transaction,
	funding_redeemscript: &Script,
	channel_value_satoshis: u64,
	their_funding_pubkey: &PublicKey,
	signature: &Signature,
) -> Result<(), secp256k1::Error> {
	let sighash = hash_to_message!(&bip143::SighashComponents::new(commitment_tx)
		.sighash_all(&commitment_tx.input[0], funding_redeemscript, channel_value_satoshis)[..]);
	secp_ctx.verify(&sighash, signature, their_funding_pubkey)
}
