//! Restartable batch sequences over one split.

use super::dataset::Dataset;
use super::{Batch, Split};
use crate::error::{InfoGanError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::debug;

/// How a sequence behaves at the end of its split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// One pass; the last batch may be partial.
    Single,
    /// Wrap forever with full batches only, reshuffling at each wrap when shuffling.
    Cyclic,
}

/// Index list plus batching rules for one split. Cheap to clone.
#[derive(Clone)]
pub struct BatchSequence {
    split: Split,
    dataset: Arc<dyn Dataset>,
    indices: Arc<[usize]>,
    batch_size: usize,
    shuffle: bool,
    seed: u64,
    mode: PassMode,
}

impl std::fmt::Debug for BatchSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchSequence")
            .field("split", &self.split)
            .field("samples", &self.indices.len())
            .field("batch_size", &self.batch_size)
            .field("mode", &self.mode)
            .finish()
    }
}

impl BatchSequence {
    pub(crate) fn new(
        split: Split,
        dataset: Arc<dyn Dataset>,
        indices: Vec<usize>,
        batch_size: usize,
        shuffle: bool,
        seed: u64,
        mode: PassMode,
    ) -> Self {
        Self {
            split,
            dataset,
            indices: indices.into(),
            batch_size,
            shuffle,
            seed: seed ^ split.salt(),
            mode,
        }
    }

    pub fn split(&self) -> Split {
        self.split
    }

    /// Samples in the split.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn mode(&self) -> PassMode {
        self.mode
    }

    /// Batches yielded by one pass over the split.
    pub fn batches_per_pass(&self) -> usize {
        match self.mode {
            PassMode::Single => self.indices.len().div_ceil(self.batch_size),
            PassMode::Cyclic => self.indices.len() / self.batch_size,
        }
    }

    /// A fresh iterator from the start of the split.
    ///
    /// A cyclic sequence over fewer samples than one batch yields nothing.
    pub fn iter(&self) -> BatchIter {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut order = self.indices.to_vec();
        if self.shuffle {
            order.shuffle(&mut rng);
        }
        BatchIter {
            seq: self.clone(),
            order,
            cursor: 0,
            passes: 0,
            rng,
        }
    }

    fn assemble(&self, indices: &[usize]) -> Result<Batch> {
        let shape = self.dataset.shape();
        let mut images = Vec::with_capacity(indices.len() * shape.product());
        let mut factors = Vec::with_capacity(indices.len());
        let mut any_factors = false;
        for &index in indices {
            let image = self.dataset.load(index)?;
            if image.len() != shape.product() {
                return Err(InfoGanError::dataset(format!(
                    "{} sample {index} has {} values, expected {}",
                    self.dataset.name(),
                    image.len(),
                    shape.product()
                )));
            }
            images.extend_from_slice(&image);
            let f = self.dataset.factors(index);
            any_factors |= !f.is_empty();
            factors.push(f.to_vec());
        }
        Ok(Batch {
            shape,
            size: indices.len(),
            images,
            factors: if any_factors { factors } else { Vec::new() },
        })
    }
}

impl<'a> IntoIterator for &'a BatchSequence {
    type Item = Result<Batch>;
    type IntoIter = BatchIter;

    fn into_iter(self) -> BatchIter {
        self.iter()
    }
}

/// Cursor over a [`BatchSequence`].
pub struct BatchIter {
    seq: BatchSequence,
    order: Vec<usize>,
    cursor: usize,
    passes: u64,
    rng: StdRng,
}

impl BatchIter {
    /// Completed wraps over the split (always 0 for single-pass sequences).
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

impl Iterator for BatchIter {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.order.len();
        let batch_size = self.seq.batch_size;
        let range = match self.seq.mode {
            PassMode::Single => {
                if self.cursor >= len {
                    return None;
                }
                self.cursor..(self.cursor + batch_size).min(len)
            }
            PassMode::Cyclic => {
                if len < batch_size {
                    return None;
                }
                if self.cursor + batch_size > len {
                    self.passes += 1;
                    self.cursor = 0;
                    if self.seq.shuffle {
                        self.order.shuffle(&mut self.rng);
                    }
                    debug!(split = %self.seq.split, passes = self.passes, "Wrapped batch sequence");
                }
                self.cursor..self.cursor + batch_size
            }
        };
        self.cursor = range.end;
        Some(self.seq.assemble(&self.order[range]))
    }
}

/// Train, dev and test sequences handed to the model.
#[derive(Debug, Clone)]
pub struct Generators {
    pub train: BatchSequence,
    pub dev: BatchSequence,
    pub test: BatchSequence,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageShape;
    use crate::data::dataset::InMemoryDataset;

    fn sequence(n: usize, batch_size: usize, shuffle: bool, mode: PassMode) -> BatchSequence {
        let dataset = Arc::new(InMemoryDataset::indexed(ImageShape::new(1, 1, 1), n));
        BatchSequence::new(
            Split::Train,
            dataset,
            (0..n).collect(),
            batch_size,
            shuffle,
            9,
            mode,
        )
    }

    fn ids(batch: &Batch) -> Vec<usize> {
        batch.images.iter().map(|v| *v as usize).collect()
    }

    #[test]
    fn test_single_pass_keeps_partial_batch() {
        let seq = sequence(10, 4, false, PassMode::Single);
        let batches: Vec<Batch> = seq.iter().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(seq.batches_per_pass(), 3);
        assert_eq!(ids(&batches[0]), vec![0, 1, 2, 3]);
        assert_eq!(ids(&batches[2]), vec![8, 9]);
        assert_eq!(batches[2].size, 2);
    }

    #[test]
    fn test_iter_restarts() {
        let seq = sequence(5, 2, true, PassMode::Single);
        let first: Vec<Vec<usize>> = seq.iter().map(|b| ids(&b.unwrap())).collect();
        let second: Vec<Vec<usize>> = seq.iter().map(|b| ids(&b.unwrap())).collect();
        assert_eq!(first, second);
        let mut all: Vec<usize> = first.into_iter().flatten().collect();
        all.sort_unstable();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cyclic_yields_full_batches_forever() {
        let seq = sequence(10, 4, true, PassMode::Cyclic);
        assert_eq!(seq.batches_per_pass(), 2);
        let mut iter = seq.iter();
        for _ in 0..25 {
            let batch = iter.next().unwrap().unwrap();
            assert_eq!(batch.size, 4);
        }
        assert!(iter.passes() >= 12);
    }

    #[test]
    fn test_cyclic_pass_covers_distinct_samples() {
        let seq = sequence(8, 4, true, PassMode::Cyclic);
        let mut iter = seq.iter();
        let mut pass: Vec<usize> = (0..2)
            .flat_map(|_| ids(&iter.next().unwrap().unwrap()))
            .collect();
        pass.sort_unstable();
        assert_eq!(pass, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_cyclic_shorter_than_batch_is_empty() {
        let seq = sequence(3, 4, false, PassMode::Cyclic);
        assert!(seq.iter().next().is_none());
    }

    #[test]
    fn test_factors_carried() {
        let seq = sequence(4, 2, false, PassMode::Single);
        let batch = seq.iter().next().unwrap().unwrap();
        assert_eq!(batch.factors, vec![vec![0.0], vec![0.25]]);
    }
}
