/// Merge buckets that share a key across models and years
///
/// Values are concatenated per variable, never averaged, so the spread
/// between models survives into aggregation.
use std::collections::BTreeMap;
use thiserror::Error;

use crate::partition::{Bucket, BucketKey};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollateError {
    #[error("Bucket {key} has variables {found:?}, expected {expected:?}")]
    VariableMismatch {
        key: String,
        expected: Vec<String>,
        found: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Collator<T> {
    merged: BTreeMap<BucketKey, Bucket<T>>,
}

impl<T> Default for Collator<T> {
    fn default() -> Self {
        Self {
            merged: BTreeMap::new(),
        }
    }
}

impl<T> Collator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one bucket in; the first bucket seen for a key fixes its variable set
    pub fn add(&mut self, key: BucketKey, bucket: Bucket<T>) -> Result<(), CollateError> {
        match self.merged.get_mut(&key) {
            None => {
                self.merged.insert(key, bucket);
            }
            Some(existing) => {
                if !existing.keys().eq(bucket.keys()) {
                    return Err(CollateError::VariableMismatch {
                        key: key.to_string(),
                        expected: existing.keys().cloned().collect(),
                        found: bucket.keys().cloned().collect(),
                    });
                }
                for (variable, values) in bucket {
                    if let Some(target) = existing.get_mut(&variable) {
                        target.extend(values);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    pub fn finish(self) -> BTreeMap<BucketKey, Bucket<T>> {
        self.merged
    }
}

/// Merge several per-model partition streams
pub fn merge<S, B, T>(streams: S) -> Result<BTreeMap<BucketKey, Bucket<T>>, CollateError>
where
    S: IntoIterator<Item = B>,
    B: IntoIterator<Item = (BucketKey, Bucket<T>)>,
{
    let mut collator = Collator::new();
    for stream in streams {
        for (key, bucket) in stream {
            collator.add(key, bucket)?;
        }
    }
    Ok(collator.finish())
}
