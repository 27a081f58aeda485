//! Monte-Carlo permutation testing.
//!
//! Significance of a selection step is estimated by re-running the step's
//! search against permuted targets and counting how often the permuted
//! result meets or beats the observed one. The permutations come from the
//! legacy Park-Miller generator: its exact sequence is part of the engine's
//! reproducibility contract (golden vectors below), so a better generator
//! must not be substituted.

use rayon::prelude::*;

use crate::config::PermutationKind;

const IA: i32 = 16807;
const IM: i32 = 2_147_483_647;
const IQ: i32 = 127_773;
const IR: i32 = 2836;

/// Park-Miller minimal-standard linear congruential generator on a 32-bit
/// signed state, using the Schrage overflow-free update.
#[derive(Clone, Copy, Debug)]
pub struct ParkMillerRng {
    state: i32,
}

impl ParkMillerRng {
    pub fn new(seed: i32) -> Self {
        Self { state: seed }
    }

    /// Generator for replication `irep`, seeded `17 * irep + 11` and warmed
    /// with two draws, as the permutation protocol requires.
    pub fn for_replication(irep: usize) -> Self {
        let mut rng = Self::new(17 * irep as i32 + 11);
        rng.next_unit();
        rng.next_unit();
        rng
    }

    /// Next value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        let k = self.state / IQ;
        self.state = IA * (self.state - k * IQ) - IR * k;
        if self.state < 0 {
            self.state += IM;
        }
        f64::from(self.state) / f64::from(IM)
    }

    /// Uniform index in `[0, bound)`, clamped to `bound - 1`.
    fn index_below(&mut self, bound: usize) -> usize {
        let j = (self.next_unit() * bound as f64) as usize;
        j.min(bound - 1)
    }
}

/// In-place Fisher-Yates reshuffle matching the legacy loop: `i` runs from
/// `n` down to 2, drawing `j = floor(u * i)` clamped to `i - 1` and swapping
/// `y[i - 1]` with `y[j]`.
pub fn permute_complete(y: &mut [f64], rng: &mut ParkMillerRng) {
    let mut i = y.len();
    while i > 1 {
        let j = rng.index_below(i);
        i -= 1;
        y.swap(i, j);
    }
}

/// Cyclic rotation by a random offset, preserving serial correlation:
/// `y'[i] = y[(i + j) mod n]`.
pub fn permute_cyclic(y: &mut [f64], rng: &mut ParkMillerRng) {
    let n = y.len();
    if n <= 1 {
        return;
    }
    let offset = rng.index_below(n);
    y.rotate_left(offset);
}

/// Counts accumulated over the permuted replications of one step. The
/// unpermuted baseline is counted by the caller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct McptCounts {
    pub model: usize,
    pub change: usize,
}

impl McptCounts {
    fn merge(self, other: Self) -> Self {
        Self {
            model: self.model + other.model,
            change: self.change + other.change,
        }
    }
}

/// Replays one step's search under permuted targets.
#[derive(Clone, Copy, Debug)]
pub struct McptDriver {
    /// Total replications including the baseline.
    pub replications: usize,
    pub kind: PermutationKind,
}

impl McptDriver {
    /// Runs replications `1..replications` in parallel and reduces the
    /// counts. `search` re-executes the step's search against a permuted
    /// target and returns the best criterion, or `None` when no candidate
    /// survives; it must evaluate candidates serially, because the
    /// replications themselves occupy the parallel layer.
    pub fn run(
        &self,
        y: &[f64],
        original_crit: f64,
        original_change: f64,
        prior_crit: f64,
        search: impl Fn(&[f64]) -> Option<f64> + Sync,
    ) -> McptCounts {
        let normalized_prior = if prior_crit < 0.0 { 0.0 } else { prior_crit };
        (1..self.replications)
            .into_par_iter()
            .map(|irep| {
                let mut rng = ParkMillerRng::for_replication(irep);
                let mut permuted = y.to_vec();
                match self.kind {
                    PermutationKind::Complete => permute_complete(&mut permuted, &mut rng),
                    PermutationKind::Cyclic => permute_cyclic(&mut permuted, &mut rng),
                }
                match search(&permuted) {
                    Some(best) => {
                        let new_crit = if best < 0.0 { 0.0 } else { best };
                        McptCounts {
                            model: usize::from(new_crit >= original_crit),
                            change: usize::from(new_crit - normalized_prior >= original_change),
                        }
                    }
                    None => McptCounts::default(),
                }
            })
            .reduce(McptCounts::default, McptCounts::merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn golden_sequence_from_seed_one() {
        let mut rng = ParkMillerRng::new(1);
        let expected = [
            7.826369259425611e-6,
            0.13153778814316625,
            0.7556053221950332,
            0.4586501319234493,
            0.5327672374121692,
            0.21895918632809036,
            0.04704461621448613,
            0.678864716868319,
            0.6792964058366122,
            0.9346928959408276,
        ];
        for want in expected {
            assert_eq!(rng.next_unit(), want);
        }
    }

    #[test]
    fn golden_sequence_for_first_replication() {
        // Replication 1 seeds with 17 * 1 + 11 = 28 and warms twice.
        let mut rng = ParkMillerRng::for_replication(1);
        let expected = [
            0.15694902146093037,
            0.84220369385658,
            0.9174826475407382,
            0.13085721718652976,
            0.31724925400561155,
        ];
        for want in expected {
            assert_eq!(rng.next_unit(), want);
        }
    }

    #[test]
    fn complete_permutation_golden() {
        let mut y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut rng = ParkMillerRng::for_replication(1);
        permute_complete(&mut y, &mut rng);
        let expected = [2.0, 5.0, 3.0, 4.0, 6.0, 9.0, 0.0, 8.0, 7.0, 1.0];
        assert_eq!(y, expected);
    }

    #[test]
    fn complete_permutation_preserves_multiset() {
        let mut y: Vec<f64> = (0..57).map(|i| i as f64).collect();
        let mut rng = ParkMillerRng::for_replication(3);
        permute_complete(&mut y, &mut rng);
        let mut sorted = y.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let original: Vec<f64> = (0..57).map(|i| i as f64).collect();
        assert_eq!(sorted, original);
        assert_ne!(y, original);
    }

    #[test]
    fn cyclic_permutation_golden() {
        let mut y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut rng = ParkMillerRng::for_replication(1);
        permute_cyclic(&mut y, &mut rng);
        // The first post-warm-up draw is ~0.157, so the offset is 1.
        let expected = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 0.0];
        assert_eq!(y, expected);
    }

    #[test]
    fn driver_counts_meet_or_exceed_events() {
        let y = vec![0.0; 16];
        let driver = McptDriver {
            replications: 8,
            kind: PermutationKind::Complete,
        };
        // Every replication "finds" a criterion of 0.5 against an observed
        // 0.5 with prior 0: both counters fire every time.
        let counts = driver.run(&y, 0.5, 0.5, f64::NEG_INFINITY, |_| Some(0.5));
        assert_eq!(counts, McptCounts { model: 7, change: 7 });

        // A weaker permuted result never fires either counter.
        let counts = driver.run(&y, 0.5, 0.5, f64::NEG_INFINITY, |_| Some(0.1));
        assert_eq!(counts, McptCounts { model: 0, change: 0 });

        // Failed replications contribute nothing.
        let counts = driver.run(&y, 0.5, 0.5, f64::NEG_INFINITY, |_| None);
        assert_eq!(counts, McptCounts::default());
    }

    #[test]
    fn driver_clamps_negative_criteria() {
        let y = vec![0.0; 8];
        let driver = McptDriver {
            replications: 5,
            kind: PermutationKind::Complete,
        };
        // Negative permuted scores clamp to zero; with an observed criterion
        // of zero they still count as "met".
        let counts = driver.run(&y, 0.0, 0.0, f64::NEG_INFINITY, |_| Some(-3.0));
        assert_eq!(counts, McptCounts { model: 4, change: 4 });
    }

    #[test]
    fn replication_seeds_are_independent_of_execution_order() {
        let y: Vec<f64> = (0..32).map(|i| (i as f64).sin()).collect();
        let driver = McptDriver {
            replications: 20,
            kind: PermutationKind::Cyclic,
        };
        let search = |permuted: &[f64]| Some(permuted[0]);
        let first = driver.run(&y, 0.4, 0.4, f64::NEG_INFINITY, search);
        let second = driver.run(&y, 0.4, 0.4, f64::NEG_INFINITY, search);
        assert_eq!(first, second);
    }
}
