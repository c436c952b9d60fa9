//! The `shachain` per-commitment-secret construction (BOLT-3). This engine
//! only ever produces the very first secret, index `2**48 - 1`, since later
//! indices are released one at a time as the channel revokes old states,
//! which happens after the opening handshake is done.

/// Index a shachain secret can be derived at. Valid range is `0..=2**48-1`;
/// we only ever construct the top index, but keep the general derivation
/// since it's the textbook shachain algorithm and a partial version would
/// be harder to trust than the real one.
pub const FIRST_INDEX: u64 = (1u64 << 48) - 1;

/// Derives the per-commitment secret at `index` from a shachain `seed`,
/// per BOLT-3 `generate_from_seed`: walk the bits of `index` from the
/// highest set one downward, flipping the corresponding bit of a running
/// buffer and re-hashing each time.
pub fn derive_secret(seed: &[u8; 32], index: u64) -> [u8; 32] {
	use bitcoin::hashes::sha256::Hash as Sha256;
	use bitcoin::hashes::Hash;

	let mut res = *seed;
	for i in (0..48).rev() {
		if index & (1u64 << i) != 0 {
			res[i / 8] ^= 1 << (i % 8);
			res = Sha256::hash(&res).into_inner();
		}
	}
	res
}

/// Convenience for this engine's one call site: the first secret this side
/// will ever hand out, from which `next_per_commit[LOCAL]` is derived by
/// multiplying by the generator.
pub fn first_secret(seed: &[u8; 32]) -> [u8; 32] {
	derive_secret(seed, FIRST_INDEX)
}
