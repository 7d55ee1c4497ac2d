//! Data pipeline: datasets, gap splits and restartable batch sequences.

pub mod batch;
pub mod dataset;
pub mod gaps;
pub mod manager;

pub use batch::{BatchIter, BatchSequence, Generators, PassMode};
pub use dataset::{Dataset, ImageFolder, InMemoryDataset};
pub use gaps::{FactorRange, GapPolicy, GapRegion};
pub use manager::{DataManager, DataOptions};

use crate::config::ImageShape;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which partition a sequence draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    /// Mixed into the data seed so the three sequences shuffle independently.
    fn salt(self) -> u64 {
        match self {
            Self::Train => 0x7472_6169_6e00_0001,
            Self::Dev => 0x6465_7600_0000_0002,
            Self::Test => 0x7465_7374_0000_0003,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Dev => "dev",
            Self::Test => "test",
        })
    }
}

/// A batch of channels-first images, flattened row-major (`size * shape.product()` values).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub shape: ImageShape,
    pub size: usize,
    pub images: Vec<f32>,
    /// Generating factors per image; empty when the dataset has none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub factors: Vec<Vec<f32>>,
}

impl Batch {
    pub fn image(&self, index: usize) -> &[f32] {
        let stride = self.shape.product();
        &self.images[index * stride..(index + 1) * stride]
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}
