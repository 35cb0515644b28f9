//! Seeded randomness for boards.
//!
//! Each match carries its own Xorshift128+ stream. Field generation, refill
//! and every random pick (shot targets, reward placement, freeze areas)
//! draw from it, so a match id plus its participants fully determine the
//! boards it produces.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

/// Xorshift128+ stream owned by one match.
///
/// ```
/// use block_duel::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(7);
/// let mut b = DeterministicRng::new(7);
/// assert_eq!(a.next_index(36), b.next_index(36));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Expand a 64-bit seed into the two state words with SplitMix64.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let words = [splitmix64(&mut s), splitmix64(&mut s)];
        // An all-zero state would emit zeros forever
        let state = if words == [0, 0] { [1, 1] } else { words };
        Self { state }
    }

    /// Stream for a freshly created match.
    pub fn for_match(server_seed: u64, match_id: &[u8; 16], player_ids: &[[u8; 16]]) -> Self {
        Self::new(derive_match_seed(server_seed, match_id, player_ids))
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let [s0, mut s1] = self.state;
        let out = s0.wrapping_add(s1);
        s1 ^= s0;
        self.state = [s0.rotate_left(24) ^ s1 ^ (s1 << 16), s1.rotate_left(37)];
        out
    }

    /// Uniform index in `[0, len)`. Zero when `len` is zero.
    ///
    /// Draws above the largest multiple of `len` are rejected, so small
    /// boards see no modulo bias.
    pub fn next_index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        let len = len as u64;
        let zone = u64::MAX - (u64::MAX % len);
        loop {
            let draw = self.next_u64();
            if draw < zone {
                return (draw % len) as usize;
            }
        }
    }

    /// Fisher-Yates, back to front.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.next_index(i + 1);
            items.swap(i, j);
        }
    }

    /// One element, `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.next_index(items.len());
        items.get(idx)
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Hash the server seed, match id and participants (in slot order) into a
/// match seed.
pub fn derive_match_seed(server_seed: u64, match_id: &[u8; 16], player_ids: &[[u8; 16]]) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(b"BLOCK_DUEL_SEED_V1");
    hasher.update(server_seed.to_le_bytes());
    hasher.update(match_id);
    for pid in player_ids {
        hasher.update(pid);
    }

    let digest = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_boards() {
        let mut a = DeterministicRng::new(12345);
        let mut b = DeterministicRng::new(12345);
        let draws_a: Vec<usize> = (0..200).map(|_| a.next_index(5)).collect();
        let draws_b: Vec<usize> = (0..200).map(|_| b.next_index(5)).collect();
        assert_eq!(draws_a, draws_b);

        let mut c = DeterministicRng::new(54321);
        let draws_c: Vec<usize> = (0..200).map(|_| c.next_index(5)).collect();
        assert_ne!(draws_a, draws_c);
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = DeterministicRng::default();
        assert!((0..10).any(|_| rng.next_u64() != 0));
    }

    #[test]
    fn test_next_index_bounds() {
        let mut rng = DeterministicRng::new(1234);
        let mut seen = [false; 6];
        for _ in 0..600 {
            let i = rng.next_index(6);
            assert!(i < 6);
            seen[i] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(rng.next_index(0), 0);
        assert_eq!(rng.next_index(1), 0);
    }

    #[test]
    fn test_choose_and_shuffle() {
        let mut rng = DeterministicRng::new(77);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert!(matches!(rng.choose(&[3, 5, 7]).copied(), Some(3) | Some(5) | Some(7)));

        let mut cells: Vec<usize> = (0..36).collect();
        rng.shuffle(&mut cells);
        let mut sorted = cells.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..36).collect::<Vec<_>>());
    }

    #[test]
    fn test_match_seed_depends_on_slot_order() {
        let match_id = [1u8; 16];
        let players = [[2u8; 16], [3u8; 16]];
        let seed = derive_match_seed(7, &match_id, &players);

        assert_eq!(seed, derive_match_seed(7, &match_id, &players));
        assert_ne!(seed, derive_match_seed(7, &match_id, &[[3u8; 16], [2u8; 16]]));
        assert_ne!(seed, derive_match_seed(8, &match_id, &players));
    }
}
