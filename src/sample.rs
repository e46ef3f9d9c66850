// src/sample.rs
//
// Optimal-stopping scenarios as random permutations.
//
// A sample is an ordered list of candidate ranks; rank 0 is the unique best
// candidate and higher ranks are worse. The policy never sees ranks: it only
// sees, at each position, whether the candidate there beats everything
// observed before it (a "record").

use rand::seq::SliceRandom;
use rand::Rng;

/// One stopping scenario: a permutation of `{0..len-1}` with 0 the best.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample(pub Vec<usize>);

impl Sample {
    /// Draws a uniformly random permutation of the given length.
    pub fn random<R: Rng>(len: usize, rng: &mut R) -> Self {
        let mut perm: Vec<usize> = (0..len).collect();
        perm.shuffle(rng);
        Sample(perm)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Position of the overall best candidate (rank 0).
    pub fn best_index(&self) -> usize {
        self.0
            .iter()
            .position(|&r| r == 0)
            .expect("a permutation of 0..len contains 0")
    }

    /// True iff stopping at `index` selects the overall best candidate.
    pub fn is_best(&self, index: usize) -> bool {
        self.0[index] == 0
    }

    /// The record sequence the policy observes: entry t is true iff the
    /// candidate at t is better than every candidate before it.
    ///
    /// Entry 0 is always true.
    pub fn comparisons(&self) -> Vec<bool> {
        let mut lowest_seen = self.0.len();
        self.0
            .iter()
            .map(|&rank| {
                if rank < lowest_seen {
                    lowest_seen = rank;
                    true
                } else {
                    false
                }
            })
            .collect()
    }

    /// One-hot supervised target: 1.0 at the best candidate's position.
    pub fn stop_targets(&self) -> Vec<f64> {
        self.0
            .iter()
            .map(|&rank| if rank == 0 { 1.0 } else { 0.0 })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn random_sample_is_permutation() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for len in [1usize, 2, 5, 50] {
            let s = Sample::random(len, &mut rng);
            let mut sorted = s.0.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (0..len).collect::<Vec<_>>());
        }
    }

    #[test]
    fn comparisons_start_true_and_track_running_minimum() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..200 {
            let s = Sample::random(20, &mut rng);
            let cmp = s.comparisons();
            assert!(cmp[0]);
            for i in 1..s.len() {
                let min_before = *s.0[..i].iter().min().unwrap();
                assert_eq!(cmp[i], s.0[i] < min_before, "perm {:?} index {i}", s.0);
            }
        }
    }

    #[test]
    fn targets_are_one_hot_at_best() {
        let s = Sample(vec![2, 0, 3, 1, 4]);
        assert_eq!(s.best_index(), 1);
        assert_eq!(s.stop_targets(), vec![0.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(s.comparisons(), vec![true, true, false, false, false]);
    }
}
