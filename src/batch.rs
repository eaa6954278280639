//! Batch assembly: feature vectors flattened into one inference tensor.

use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};

/// Default cap on rows per inference call.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Row-major flattened feature matrix of shape `[rows, FEATURE_COUNT]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    data: Vec<f32>,
    shape: [usize; 2],
}

impl Batch {
    /// Flattened feature values, `rows * FEATURE_COUNT` long.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    /// Number of rows (feature vectors) in the batch.
    pub fn count(&self) -> usize {
        self.shape[0]
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn into_parts(self) -> (Vec<f32>, [usize; 2]) {
        (self.data, self.shape)
    }
}

/// Collects feature vectors into a single [`Batch`], capped at a maximum
/// number of rows.
#[derive(Debug, Clone, Copy)]
pub struct BatchAssembler {
    max_batch_size: usize,
}

impl BatchAssembler {
    pub fn new(max_batch_size: usize) -> Self {
        Self { max_batch_size }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    /// Take the first `min(len, max_batch_size)` vectors in order.
    ///
    /// Rows beyond the cap are dropped without error. Compare
    /// [`Batch::count`] with the input length to detect truncation.
    pub fn assemble(&self, vectors: &[FeatureVector]) -> Batch {
        let selected = &vectors[..vectors.len().min(self.max_batch_size)];
        let data: Vec<f32> = selected.iter().flat_map(|v| v.iter().copied()).collect();

        Batch {
            data,
            shape: [selected.len(), FEATURE_COUNT],
        }
    }
}

impl Default for BatchAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE)
    }
}
