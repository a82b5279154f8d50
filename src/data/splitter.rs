// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Two ways to hold out validation data:
//
//   split_train_val  labelled examples are shuffled, then cut
//                    (seeded, so the split is reproducible)
//
//   split_stream     an LM token stream is cut at one point;
//                    the tail becomes validation. Never shuffled,
//                    since the stream's order is the signal.
//
// Reference: rand crate documentation (SliceRandom)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = split_index(total, train_fraction);
    let val      = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        samples.len(),
        val.len(),
    );

    (samples, val)
}

/// Cut a token stream into (train, validation) without reordering.
pub fn split_stream(tokens: &[u32], train_fraction: f64) -> (&[u32], &[u32]) {
    tokens.split_at(split_index(tokens.len(), train_fraction))
}

fn split_index(total: usize, train_fraction: f64) -> usize {
    let at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    at.min(total)
}
