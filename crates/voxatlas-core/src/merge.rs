//! Per-voxel compositing rules applied when a brush writes over existing data.

use serde::{Deserialize, Serialize};

use crate::sample::{Sample, Texel};

/// Combines a newly painted value with the value already stored.
///
/// Implemented by [`MergeMode`] and by any `Fn(new, old) -> T` closure.
pub trait Merge<T: Sample> {
    /// Returns the value to store.
    fn merge(&self, new_value: T, old_value: T) -> T;

    /// Merges the first `components` lanes of two texels.
    fn merge_texel(&self, new_value: &Texel<T>, old_value: &Texel<T>, components: u32) -> Texel<T> {
        let mut out = *old_value;
        for c in 0..components as usize {
            out[c] = self.merge(new_value[c], old_value[c]);
        }
        out
    }
}

impl<T: Sample, F> Merge<T> for F
where
    F: Fn(T, T) -> T,
{
    fn merge(&self, new_value: T, old_value: T) -> T {
        self(new_value, old_value)
    }
}

/// Built-in merge policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MergeMode {
    /// Destructive paint: the new value wins.
    #[default]
    Replace,
    /// Saturating sum, for accumulating preview layers.
    Add,
    /// Keeps the larger value.
    Max,
    /// Keeps the smaller value.
    Min,
}

impl<T: Sample> Merge<T> for MergeMode {
    fn merge(&self, new_value: T, old_value: T) -> T {
        match self {
            Self::Replace => new_value,
            Self::Add => T::from_f64(new_value.to_f64() + old_value.to_f64()),
            Self::Max => {
                if new_value > old_value {
                    new_value
                } else {
                    old_value
                }
            }
            Self::Min => {
                if new_value < old_value {
                    new_value
                } else {
                    old_value
                }
            }
        }
    }
}
