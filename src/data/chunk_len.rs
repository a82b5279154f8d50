// ============================================================
// Layer 4 — Chunk Length Policy
// ============================================================
// Decides how many time steps each language-model batch covers.
//
// Fixed mode:
//   every chunk is exactly `bptt` steps.
//
// Randomized mode:
//   step 0 (warm-up on)  → bptt + 25, the widest chunk possible
//   every later step     → base = bptt      with p = 0.95
//                                = bptt / 2  otherwise
//                          len  = round(N(base, 5)) clamped to [5, bptt + 25]
//
// With warm-up on, the first batch of every pass is the widest
// one the policy can produce.
//
// The random source is passed in by the caller so tests (and
// reproducible runs) can use a seeded StdRng.
//
// Reference: Merity et al. (2017) AWD-LSTM variable-length BPTT
//            rand / rand_distr crate documentation

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::data::error::{DataError, Result};

/// Extra steps allowed on top of `bptt` in randomized mode.
pub const MAX_PLUS: usize = 25;

/// Smallest chunk the randomized policy ever returns.
pub const MIN_CHUNK_LEN: usize = 5;

/// Standard deviation of the Gaussian jitter around the base length.
pub const CHUNK_STD_DEV: f64 = 5.0;

/// Probability of keeping the full `bptt` as the Gaussian mean.
pub const FULL_BPTT_PROB: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct ChunkLengthPolicy {
    bptt:      usize,
    randomize: bool,
    warmup:    bool,
    full:      Normal<f64>,
    half:      Normal<f64>,
}

impl ChunkLengthPolicy {
    /// Build a policy for base length `bptt`.
    ///
    /// `warmup` only matters when `randomize` is set.
    pub fn new(bptt: usize, randomize: bool, warmup: bool) -> Result<Self> {
        if bptt == 0 {
            return Err(DataError::InvalidConfig("bptt must be > 0".into()));
        }
        let full = Normal::new(bptt as f64, CHUNK_STD_DEV)
            .map_err(|e| DataError::InvalidConfig(format!("chunk length distribution: {e}")))?;
        let half = Normal::new(bptt as f64 / 2.0, CHUNK_STD_DEV)
            .map_err(|e| DataError::InvalidConfig(format!("chunk length distribution: {e}")))?;
        Ok(Self { bptt, randomize, warmup, full, half })
    }

    pub fn bptt(&self) -> usize {
        self.bptt
    }

    pub fn is_randomized(&self) -> bool {
        self.randomize
    }

    /// Widest chunk this policy can return.
    pub fn max_len(&self) -> usize {
        if self.randomize {
            self.bptt + MAX_PLUS
        } else {
            self.bptt
        }
    }

    /// Chunk length for iteration step `step` (0-based).
    pub fn next_len<R: Rng>(&self, step: usize, rng: &mut R) -> usize {
        if !self.randomize {
            return self.bptt;
        }
        if step == 0 && self.warmup {
            return self.max_len();
        }

        let dist = if rng.gen::<f64>() < FULL_BPTT_PROB {
            &self.full
        } else {
            &self.half
        };
        let sampled = dist.sample(rng);
        sampled
            .clamp(MIN_CHUNK_LEN as f64, self.max_len() as f64)
            .round() as usize
    }
}
