//! Deterministic derivation of the four channel keypairs and the shachain
//! seed from a single 256-bit root: HKDF-SHA-256 with an empty salt and a
//! fixed info string, producing one flat 160-byte block that splits into
//! the four scalars plus the shachain seed.

use bitcoin::secp256k1::key::{PublicKey, SecretKey};
use bitcoin::secp256k1::Secp256k1;
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::EngineError;
use crate::shachain;

/// The fixed HKDF info string. It is a domain separator, not a version
/// string; changing it would change every derived key for every seed.
const HKDF_INFO: &[u8] = b"c-lightning";

/// Four 256-bit private scalars backing this side's non-HTLC basepoints.
/// Deliberately carries no `Debug`/`Clone` impl beyond what signing needs:
/// accidentally logging one of these would expose private key material.
pub struct Secrets {
	pub funding: SecretKey,
	pub revocation_basepoint: SecretKey,
	pub payment_basepoint: SecretKey,
	pub delayed_payment_basepoint: SecretKey,
}

/// The public counterparts of [`Secrets`]: what actually crosses the peer
/// wire in `open_channel`/`accept_channel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Points {
	pub funding: PublicKey,
	pub revocation_basepoint: PublicKey,
	pub payment_basepoint: PublicKey,
	pub delayed_payment_basepoint: PublicKey,
}

/// Everything derived from the 256-bit seed for the lifetime of one
/// negotiation: the four scalars, their points, and the first
/// per-commitment point we'll offer the peer. `shaseed` is kept private and
/// is never exposed through any public accessor or `Debug` impl.
pub struct KeyMaterial {
	pub secrets: Secrets,
	pub points: Points,
	shaseed: [u8; 32],
	/// `next_per_commit[LOCAL]`: our first per-commitment point, derived
	/// from `shaseed` at shachain index `2**48 - 1`.
	pub next_per_commit_local: PublicKey,
}

impl KeyMaterial {
	/// Derives the full key block from `seed`. Fails with
	/// [`EngineError::KeyDerivationFailed`] if HKDF expansion fails (only
	/// possible for a degenerate output length, which never happens here)
	/// or if any of the five derived 32-byte chunks doesn't parse as a
	/// valid secp256k1 scalar. Vanishingly unlikely, but checked rather
	/// than assumed.
	pub fn derive(seed: &[u8; 32]) -> Result<Self, EngineError> {
		let hk = Hkdf::<Sha256>::new(None, seed);
		let mut okm = [0u8; 32 * 5];
		hk.expand(HKDF_INFO, &mut okm).map_err(|_| EngineError::KeyDerivationFailed)?;

		let scalar = |bytes: &[u8]| -> Result<SecretKey, EngineError> {
			SecretKey::from_slice(bytes).map_err(|_| EngineError::KeyDerivationFailed)
		};

		let funding = scalar(&okm[0..32])?;
		let revocation_basepoint = scalar(&okm[32..64])?;
		let payment_basepoint = scalar(&okm[64..96])?;
		let delayed_payment_basepoint = scalar(&okm[96..128])?;
		let mut shaseed = [0u8; 32];
		shaseed.copy_from_slice(&okm[128..160]);

		let secp_ctx = Secp256k1::signing_only();
		let points = Points {
			funding: PublicKey::from_secret_key(&secp_ctx, &funding),
			revocation_basepoint: PublicKey::from_secret_key(&secp_ctx, &revocation_basepoint),
			payment_basepoint: PublicKey::from_secret_key(&secp_ctx, &payment_basepoint),
			delayed_payment_basepoint: PublicKey::from_secret_key(&secp_ctx, &delayed_payment_basepoint),
		};

		let first_secret = shachain::first_secret(&shaseed);
		let first_secret_key =
			SecretKey::from_slice(&first_secret).map_err(|_| EngineError::KeyDerivationFailed)?;
		let next_per_commit_local = PublicKey::from_secret_key(&secp_ctx, &first_secret_key);

		Ok(KeyMaterial {
			secrets: Secrets { funding, revocation_basepoint, payment_basepoint, delayed_payment_basepoint },
			points,
			shaseed,
			next_per_commit_local,
		})
	}

	#[cfg(test)]
	fn shaseed_for_test(&self) -> [u8; 32] {
		self.shaseed
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn derivation_is_deterministic() {
		let seed = [0x7a; 32];
		let a = KeyMaterial::derive(&seed).unwrap();
		let b = KeyMaterial::derive(&seed).unwrap();
		assert_eq!(a.points, b.points);
		assert_eq!(a.next_per_commit_local, b.next_per_commit_local);
		assert_eq!(a.shaseed_for_test(), b.shaseed_for_test());
	}

	#[test]
	fn different_seeds_give_different_keys() {
		let a = KeyMaterial::derive(&[0x01; 32]).unwrap();
		let b = KeyMaterial::derive(&[0x02; 32]).unwrap();
		assert_ne!(a.points, b.points);
	}

	#[test]
	fn the_four_basepoints_are_pairwise_distinct() {
		let km = KeyMaterial::derive(&[0x11; 32]).unwrap();
		let pts = [
			km.points.funding,
			km.points.revocation_basepoint,
			km.points.payment_basepoint,
			km.points.delayed_payment_basepoint,
		];
		for i in 0..pts.len() {
			for j in (i + 1)..pts.len() {
				assert_ne!(pts[i], pts[j]);
			}
		}
	}
}
