//! Shared types: the crate error, routine keys and gather geometry constants.

use thiserror::Error;

/// Bytes moved by one vector instruction (AVX2 `ymm`).
pub const VECTOR_WIDTH: usize = 32;

/// Maximum number of concurrent source streams in one stream group.
pub const MAX_LANES: usize = 8;

/// Width of one entry of the source-pointer array.
pub const POINTER_WIDTH: usize = std::mem::size_of::<*const u8>();

/// Record sizes must be a multiple of this (masked moves work on dwords).
pub const RECORD_ALIGN: usize = 4;

#[derive(Debug, Error)]
pub enum GatherError {
    /// The (count, size) request is malformed or exceeds the configured limits.
    #[error("invalid gather configuration: {0}")]
    Configuration(String),
    /// The host (or the build) lacks the vector extension the generator needs.
    #[error("capability unavailable: {0}")]
    Capability(String),
    /// Assembler or executable-memory failure while materializing a routine.
    #[error("compile error: {0}")]
    Compile(String),
    /// Checked wrappers only: buffers do not match the routine's shape.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },
}

pub type GatherResult<T> = Result<T, GatherError>;

/// Identity of a generated routine: how many records of how many bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutineKey {
    pub count: usize,
    pub size: usize,
}

impl RoutineKey {
    pub const fn new(count: usize, size: usize) -> Self {
        RoutineKey { count, size }
    }

    /// Bytes written to the destination by one call.
    #[inline]
    pub const fn total_bytes(&self) -> usize {
        self.count * self.size
    }
}

impl std::fmt::Display for RoutineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}B", self.count, self.size)
    }
}

/// Validate caller buffers against a (count, size) shape.
///
/// Shared by the checked `gather` wrappers of every copy backend.
pub(crate) fn check_shape(
    key: RoutineKey,
    dst: &[u8],
    srcs: &[&[u8]],
) -> GatherResult<()> {
    if srcs.len() != key.count {
        return Err(GatherError::ShapeMismatch {
            expected: format!("{} source records", key.count),
            got: format!("{}", srcs.len()),
        });
    }
    if dst.len() != key.total_bytes() {
        return Err(GatherError::ShapeMismatch {
            expected: format!("destination of {} bytes", key.total_bytes()),
            got: format!("{} bytes", dst.len()),
        });
    }
    if let Some((i, short)) = srcs.iter().enumerate().find(|(_, s)| s.len() < key.size) {
        return Err(GatherError::ShapeMismatch {
            expected: format!("source {i} of at least {} bytes", key.size),
            got: format!("{} bytes", short.len()),
        });
    }
    Ok(())
}
