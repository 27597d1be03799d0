//! Deterministic root-key provider for simulation.

use biscuit_auth::KeyPair;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Provides a deterministic Biscuit root keypair derived from a seed.
///
/// In simulation we need a reproducible trust root: the same seed always
/// yields the same authority, so tokens minted in one run verify in a
/// replay of that run.
pub struct RootKeyProvider {
    master_seed: u64,
}

impl RootKeyProvider {
    /// Creates a new key provider with the given master seed.
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    /// Returns the root keypair for the trust layer.
    ///
    /// A salt is mixed into the seed so the key stream does not collide
    /// with other consumers of the master seed.
    pub fn biscuit_root_key(&self) -> KeyPair {
        let biscuit_seed = self.master_seed.wrapping_mul(0x3c6ef372fe94f82b);
        let mut rng = ChaCha8Rng::seed_from_u64(biscuit_seed);
        KeyPair::new_with_rng(&mut rng)
    }
}
