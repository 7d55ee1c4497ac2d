//! Split bookkeeping and generator hand-out for one data session.

use super::batch::{BatchSequence, Generators, PassMode};
use super::dataset::Dataset;
use super::gaps::GapPolicy;
use super::Split;
use crate::config::RunConfig;
use crate::error::{InfoGanError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info};

/// Share of the (non-withheld) samples used for training.
pub const TRAIN_FRACTION: f64 = 0.8;

/// How a [`DataManager`] partitions and batches its dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DataOptions {
    pub batch_size: usize,
    pub shuffle: bool,
    pub gaps: bool,
    pub train_fraction: f64,
    pub seed: u64,
    pub gap_policy: GapPolicy,
}

impl DataOptions {
    pub fn training(config: &RunConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            shuffle: true,
            gaps: config.gaps,
            train_fraction: TRAIN_FRACTION,
            seed: config.seed,
            gap_policy: GapPolicy::default(),
        }
    }

    /// Every sample in the train split, in dataset order.
    pub fn export(batch_size: usize) -> Self {
        Self {
            batch_size,
            shuffle: false,
            gaps: false,
            train_fraction: 1.0,
            seed: 0,
            gap_policy: GapPolicy::default(),
        }
    }
}

pub struct DataManager {
    dataset: Arc<dyn Dataset>,
    options: DataOptions,
    train: Vec<usize>,
    dev: Vec<usize>,
    test: Vec<usize>,
    batch_size: usize,
    mode: PassMode,
}

impl DataManager {
    pub fn new(dataset: Arc<dyn Dataset>, options: DataOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(InfoGanError::config("batch_size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&options.train_fraction) {
            return Err(InfoGanError::config(format!(
                "train_fraction must lie in [0, 1] (got {})",
                options.train_fraction
            )));
        }

        let mut order: Vec<usize> = (0..dataset.len()).collect();
        if options.shuffle {
            order.shuffle(&mut StdRng::seed_from_u64(options.seed));
        }

        let (kept, withheld) = if options.gaps {
            let required = options.gap_policy.required_factors();
            if let Some(index) = order.iter().find(|&&i| dataset.factors(i).len() < required) {
                return Err(InfoGanError::dataset(format!(
                    "gap split needs {required} factors per sample; sample {index} of {} has {}",
                    dataset.name(),
                    dataset.factors(*index).len()
                )));
            }
            order
                .into_iter()
                .partition::<Vec<usize>, _>(|&i| !options.gap_policy.withholds(dataset.factors(i)))
        } else {
            (order, Vec::new())
        };

        let n_train = (options.train_fraction * kept.len() as f64).floor() as usize;
        let rest = &kept[n_train..];
        let half = rest.len() / 2;
        let mut dev = rest[..half].to_vec();
        let mut test = rest[half..].to_vec();
        for (k, index) in withheld.iter().enumerate() {
            if k % 2 == 0 {
                dev.push(*index);
            } else {
                test.push(*index);
            }
        }

        let manager = Self {
            train: kept[..n_train].to_vec(),
            dev,
            test,
            batch_size: options.batch_size,
            mode: PassMode::Single,
            dataset,
            options,
        };
        info!(
            dataset = manager.dataset.name(),
            n_train = manager.n_train(),
            n_dev = manager.n_dev(),
            n_test = manager.n_test(),
            withheld = withheld.len(),
            batch_size = manager.batch_size,
            "Partitioned dataset"
        );
        Ok(manager)
    }

    /// Switch every sequence to cyclic mode. Must precede training; calling it again is a no-op.
    pub fn inf_generators(&mut self) {
        if self.mode != PassMode::Cyclic {
            debug!("Generators switched to cyclic mode");
            self.mode = PassMode::Cyclic;
        }
    }

    pub fn get_generators(&self) -> Result<Generators> {
        if self.train.is_empty() {
            return Err(InfoGanError::dataset("training split is empty"));
        }
        if self.mode == PassMode::Cyclic && self.train.len() < self.batch_size {
            return Err(InfoGanError::dataset(format!(
                "training split has {} samples, fewer than one batch of {}",
                self.train.len(),
                self.batch_size
            )));
        }
        let make = |split, indices: &[usize]| {
            BatchSequence::new(
                split,
                Arc::clone(&self.dataset),
                indices.to_vec(),
                self.batch_size,
                self.options.shuffle,
                self.options.seed,
                self.mode,
            )
        };
        Ok(Generators {
            train: make(Split::Train, &self.train),
            dev: make(Split::Dev, &self.dev),
            test: make(Split::Test, &self.test),
        })
    }

    /// Shrink the batch size to the largest divisor of `n_train` not above the request.
    pub fn set_divisor_batch_size(&mut self) -> Result<usize> {
        let n = self.train.len();
        if n == 0 {
            return Err(InfoGanError::dataset(
                "cannot choose a divisor batch size for an empty training split",
            ));
        }
        let chosen = divisor_batch_size(n, self.options.batch_size);
        if chosen != self.batch_size {
            info!(
                requested = self.options.batch_size,
                chosen,
                n_train = n,
                "Adjusted batch size to divide the training split"
            );
        }
        self.batch_size = chosen;
        Ok(chosen)
    }

    pub fn n_train(&self) -> usize {
        self.train.len()
    }

    pub fn n_dev(&self) -> usize {
        self.dev.len()
    }

    pub fn n_test(&self) -> usize {
        self.test.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn mode(&self) -> PassMode {
        self.mode
    }
}

/// Largest divisor of `n` that is at most `requested` (both assumed positive).
pub fn divisor_batch_size(n: usize, requested: usize) -> usize {
    (1..=requested.min(n)).rev().find(|d| n % d == 0).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageShape;
    use crate::data::dataset::InMemoryDataset;
    use pretty_assertions::assert_eq;

    fn dataset(n: usize) -> Arc<dyn Dataset> {
        Arc::new(InMemoryDataset::indexed(ImageShape::new(1, 1, 1), n))
    }

    fn grid_dataset(side: usize) -> Arc<dyn Dataset> {
        let mut ds = InMemoryDataset::new(ImageShape::new(1, 1, 1));
        for a in 0..side {
            for b in 0..side {
                let f = |v: usize| v as f32 / (side - 1) as f32;
                ds.push(vec![(a * side + b) as f32], vec![f(a), f(b)]).unwrap();
            }
        }
        Arc::new(ds)
    }

    fn options(batch_size: usize, shuffle: bool, gaps: bool) -> DataOptions {
        DataOptions {
            batch_size,
            shuffle,
            gaps,
            train_fraction: TRAIN_FRACTION,
            seed: 3,
            gap_policy: GapPolicy::default(),
        }
    }

    #[test]
    fn test_split_sizes() {
        let dm = DataManager::new(dataset(100), options(10, true, false)).unwrap();
        assert_eq!((dm.n_train(), dm.n_dev(), dm.n_test()), (80, 10, 10));
    }

    #[test]
    fn test_split_preserves_order_without_shuffle() {
        let dm = DataManager::new(dataset(10), options(2, false, false)).unwrap();
        assert_eq!(dm.train, (0..8).collect::<Vec<_>>());
        assert_eq!(dm.dev, vec![8]);
        assert_eq!(dm.test, vec![9]);
    }

    #[test]
    fn test_split_is_seeded() {
        let a = DataManager::new(dataset(50), options(5, true, false)).unwrap();
        let b = DataManager::new(dataset(50), options(5, true, false)).unwrap();
        assert_eq!(a.train, b.train);
        assert_ne!(a.train, (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn test_gaps_withhold_corner_from_train() {
        let ds = grid_dataset(5);
        let dm = DataManager::new(Arc::clone(&ds), options(4, true, true)).unwrap();
        let policy = GapPolicy::default();
        // factors 0.75 and 1.0 on both axes -> 4 withheld samples
        assert!(dm.train.iter().all(|&i| !policy.withholds(ds.factors(i))));
        let withheld_in_eval = dm
            .dev
            .iter()
            .chain(dm.test.iter())
            .filter(|&&i| policy.withholds(ds.factors(i)))
            .count();
        assert_eq!(withheld_in_eval, 4);
        assert_eq!(dm.n_train() + dm.n_dev() + dm.n_test(), 25);
    }

    #[test]
    fn test_gaps_without_factors_is_error() {
        let mut ds = InMemoryDataset::new(ImageShape::new(1, 1, 1));
        ds.push(vec![0.0], vec![]).unwrap();
        let result = DataManager::new(Arc::new(ds), options(1, false, true));
        assert!(matches!(result, Err(InfoGanError::Dataset(_))));
    }

    #[test]
    fn test_divisor_batch_size() {
        assert_eq!(divisor_batch_size(2000, 500), 500);
        assert_eq!(divisor_batch_size(2017, 500), 1);
        assert_eq!(divisor_batch_size(1200, 500), 400);
        assert_eq!(divisor_batch_size(30, 500), 30);
    }

    #[test]
    fn test_set_divisor_batch_size_updates_sequences() {
        let mut dm = DataManager::new(dataset(12), DataOptions::export(5)).unwrap();
        assert_eq!(dm.set_divisor_batch_size().unwrap(), 4);
        let gens = dm.get_generators().unwrap();
        let sizes: Vec<usize> = gens.train.iter().map(|b| b.unwrap().size).collect();
        assert_eq!(sizes, vec![4, 4, 4]);
        assert!(gens.dev.is_empty() && gens.test.is_empty());
    }

    #[test]
    fn test_empty_train_split_is_error() {
        let mut dm = DataManager::new(dataset(0), DataOptions::export(5)).unwrap();
        assert!(dm.set_divisor_batch_size().is_err());
        assert!(dm.get_generators().is_err());
    }

    #[test]
    fn test_inf_generators_switches_mode_once() {
        let mut dm = DataManager::new(dataset(20), options(4, true, false)).unwrap();
        assert_eq!(dm.mode(), PassMode::Single);
        dm.inf_generators();
        dm.inf_generators();
        assert_eq!(dm.mode(), PassMode::Cyclic);
        let gens = dm.get_generators().unwrap();
        assert_eq!(gens.train.mode(), PassMode::Cyclic);
        assert_eq!(gens.train.iter().take(50).count(), 50);
    }

    #[test]
    fn test_cyclic_train_smaller_than_batch_is_error() {
        let mut dm = DataManager::new(dataset(4), options(8, false, false)).unwrap();
        dm.inf_generators();
        assert!(dm.get_generators().is_err());
    }
}
