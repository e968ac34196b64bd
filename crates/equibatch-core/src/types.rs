use std::cmp::Ordering;
use std::fmt;
use std::ops::Add;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric measure of a sample's size, summed into a batch footprint.
///
/// Lengths are expected to be non-negative. Floating point lengths are accepted;
/// comparisons against NaN are always false, so a NaN length never triggers a flush.
/// Negative float lengths are not rejected either: they lower the running footprint
/// and can drop it back to zero, which disarms the flush gate for the current batch.
pub trait Footprint: Copy + PartialOrd + Add<Output = Self> + fmt::Debug {
    const ZERO: Self;

    /// Addition that reports overflow as `None` instead of wrapping or panicking.
    ///
    /// An overflowing sum is larger than any cap the type can express.
    fn checked_add(self, rhs: Self) -> Option<Self>;
}

macro_rules! impl_footprint_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Footprint for $ty {
                const ZERO: Self = 0;

                fn checked_add(self, rhs: Self) -> Option<Self> {
                    <$ty>::checked_add(self, rhs)
                }
            }
        )*
    };
}

macro_rules! impl_footprint_float {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Footprint for $ty {
                const ZERO: Self = 0.0;

                // Floats go to infinity rather than wrapping.
                fn checked_add(self, rhs: Self) -> Option<Self> {
                    Some(self + rhs)
                }
            }
        )*
    };
}

impl_footprint_int!(u8, u16, u32, u64, usize);
impl_footprint_float!(f32, f64);

/// Caps for one packing run. Fixed once the packer is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PackerConfig<F = u64> {
    /// Maximum number of indices per batch.
    pub max_size: usize,
    /// Maximum summed length per batch. Only the first sample of a batch may exceed it.
    pub max_footprint: F,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackerConfigError {
    #[error("max_size must be > 0")]
    ZeroMaxSize,
    #[error("max_footprint must be > 0 (got {got})")]
    NonPositiveMaxFootprint { got: String },
}

impl<F: Footprint> PackerConfig<F> {
    pub fn new(max_size: usize, max_footprint: F) -> Result<Self, PackerConfigError> {
        let config = Self {
            max_size,
            max_footprint,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PackerConfigError> {
        if self.max_size == 0 {
            return Err(PackerConfigError::ZeroMaxSize);
        }

        // NaN compares as None and is rejected together with zero and negatives.
        match self.max_footprint.partial_cmp(&F::ZERO) {
            Some(Ordering::Greater) => Ok(()),
            _ => Err(PackerConfigError::NonPositiveMaxFootprint {
                got: format!("{:?}", self.max_footprint),
            }),
        }
    }

    /// True when `length` alone would overflow an empty batch.
    pub fn is_oversized(&self, length: F) -> bool {
        length > self.max_footprint
    }
}

/// v0 length manifest schema version.
pub const LENGTH_MANIFEST_SCHEMA_VERSION: u32 = 0;

/// One row of a length manifest: a sample and its precomputed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthRecord {
    pub sample_id: u64,
    pub length: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_zero_is_additive_identity() {
        assert_eq!(f64::ZERO + 2.5, 2.5);
        assert_eq!(u64::ZERO + 7, 7);
    }

    #[test]
    fn integer_footprints_report_overflow() {
        assert_eq!(Footprint::checked_add(200u8, 100), None);
        assert_eq!(Footprint::checked_add(u64::MAX, 1), None);
        assert_eq!(Footprint::checked_add(3usize, 4), Some(7));
        assert_eq!(
            Footprint::checked_add(f32::MAX, f32::MAX),
            Some(f32::INFINITY)
        );
    }

    #[test]
    fn oversized_is_strict() {
        let config = PackerConfig::new(4, 10u32).unwrap();
        assert!(!config.is_oversized(10));
        assert!(config.is_oversized(11));
    }

    #[test]
    fn config_roundtrips_through_serde_derive() {
        fn assert_serde<T: Serialize + for<'de> Deserialize<'de>>() {}
        assert_serde::<PackerConfig<u64>>();
        assert_serde::<PackerConfig<f32>>();
    }
}
