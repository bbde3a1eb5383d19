//! Portable CPU gather kernels.
//!
//! These run on any target and are the fallback when the gather JIT is
//! unavailable or disabled. See [`gather`].

pub mod gather;

pub use gather::{gather_portable, gather_unrolled};
