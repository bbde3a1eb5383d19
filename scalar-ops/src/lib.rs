//! Scalar gather implementations — `extern "C"` pure scalar functions.
//!
//! These serve as the golden reference for correctness testing of the
//! JIT-generated gather routines and the portable unrolled copy. They copy
//! one byte at a time, record by record, with no vectorization tricks.
//!
//! Every function here is `#[no_mangle] pub extern "C"` so it can be called
//! through the same raw-pointer calling convention as a generated routine.

pub mod gather;

pub use gather::{gather_reference, scalar_gather};
