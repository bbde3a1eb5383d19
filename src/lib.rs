//! gather-kernels: JIT-generated batched gathers for cache-hostile lookups.
//!
//! Copies many fixed-size records from scattered addresses into one
//! contiguous buffer. A generated routine issues the loads of up to eight
//! records before issuing any store, so their cache misses overlap instead
//! of being paid one after another.
//!
//! - **Runtime code generation**: x86-64 AVX2 machine code emitted with
//!   iced-x86 for each (count, size) shape, with masked tails and
//!   double-pumped 64-byte steps
//! - **Bounded registry**: generated routines cached per shape with LRU eviction
//! - **Graceful fallback**: a portable lane-unrolled copy when the host lacks AVX2
//!
//! # Quick Start
//!
//! ```no_run
//! use gather_kernels::{GatherKernel, RoutineRegistry};
//!
//! let registry = RoutineRegistry::detect();
//! let kernel = GatherKernel::select(&registry, 2, 16).unwrap();
//!
//! let table = vec![0u8; 1 << 20];
//! let srcs: [&[u8]; 2] = [&table[4096..], &table[65536..]];
//! let mut out = [0u8; 32];
//! kernel.gather(&mut out, &srcs).unwrap();
//! ```

pub mod compiler;
pub mod config;
pub mod cpu_kernels;
pub mod dispatch;
pub mod kernel_dispatcher;
pub mod types;

pub use compiler::{
    CopyStep, GatherCompiler, GatherFn, GatherRoutine, GenerationRequest, RegistryStats,
    RoutineRegistry, StreamGroup, StreamGroupPlan, TailMask,
};
pub use config::{GatherConfig, GenerationLimits};
pub use dispatch::{capability, CapabilityDescriptor, IsaLevel};
pub use kernel_dispatcher::GatherKernel;
pub use types::{GatherError, GatherResult, RoutineKey, MAX_LANES, VECTOR_WIDTH};
