//! Generation request — the validated (count, size) input of the compiler.

use crate::config::GenerationLimits;
use crate::types::{GatherError, GatherResult, RoutineKey, MAX_LANES, RECORD_ALIGN};

/// A validated request to generate a gather routine.
///
/// Construction is the single place where configuration errors are raised;
/// everything downstream (mask, plan, emission) may assume the invariants
/// below hold.
///
/// - `count >= 1`
/// - `size >= 4` and `size % 4 == 0`
/// - both within the configured [`GenerationLimits`]
/// - every store displacement `lane * size + offset` fits in an `i32`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationRequest {
    key: RoutineKey,
}

impl GenerationRequest {
    pub fn new(count: usize, size: usize, limits: &GenerationLimits) -> GatherResult<Self> {
        if count == 0 {
            return Err(GatherError::Configuration(
                "record count must be at least 1".into(),
            ));
        }
        if size == 0 || size % RECORD_ALIGN != 0 {
            return Err(GatherError::Configuration(format!(
                "record size {size} is not a positive multiple of {RECORD_ALIGN}"
            )));
        }
        if count > limits.max_count {
            return Err(GatherError::Configuration(format!(
                "record count {count} exceeds limit {}",
                limits.max_count
            )));
        }
        if size > limits.max_record_size {
            return Err(GatherError::Configuration(format!(
                "record size {size} exceeds limit {}",
                limits.max_record_size
            )));
        }
        if size
            .checked_mul(MAX_LANES)
            .map_or(true, |span| span > i32::MAX as usize)
        {
            return Err(GatherError::Configuration(format!(
                "record size {size} overflows a 32-bit store displacement"
            )));
        }
        Ok(GenerationRequest {
            key: RoutineKey::new(count, size),
        })
    }

    #[inline]
    pub fn key(&self) -> RoutineKey {
        self.key
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.key.count
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.key.size
    }
}
