//! Gather compiler — JIT generation of batched scattered-record copies.
//!
//! The compiler takes a (count, size) request, validates it, builds the
//! tail mask and stream-group plan, emits machine code via the appropriate
//! `GatherCodegen` backend, and wraps the result in an executable routine.
//!
//! # Pipeline
//!
//! ```text
//! (count, size) → GenerationRequest → TailMask + StreamGroupPlan → Codegen → GatherRoutine
//!                       ↑                                             ↑
//!                 config limits                              dispatch capability
//! ```
//!
//! Every failure happens before a routine exists; a failed build leaves
//! nothing behind.

pub mod codegen;
pub mod executable;
pub mod ir;
pub mod planner;
pub mod registry;
pub mod tail_mask;

pub use codegen::{CodegenOutput, GatherCodegen};
pub use executable::{GatherFn, GatherRoutine};
pub use ir::GenerationRequest;
pub use planner::{CopyStep, StreamGroup, StreamGroupPlan};
pub use registry::{RegistryStats, RoutineRegistry};
pub use tail_mask::TailMask;

use crate::config::{GatherConfig, GenerationLimits};
use crate::dispatch::CapabilityDescriptor;
use crate::types::{GatherError, GatherResult};

/// Generates gather routines for one host description.
#[derive(Debug, Clone)]
pub struct GatherCompiler {
    capability: CapabilityDescriptor,
    limits: GenerationLimits,
    jit_enabled: bool,
}

impl GatherCompiler {
    /// Create a compiler for the detected host and environment configuration.
    pub fn new() -> Self {
        Self::with_config(*crate::dispatch::capability(), &GatherConfig::from_env())
    }

    /// Create a compiler with an explicit capability and configuration.
    pub fn with_config(capability: CapabilityDescriptor, config: &GatherConfig) -> Self {
        GatherCompiler {
            capability,
            limits: config.limits,
            jit_enabled: config.jit_enabled,
        }
    }

    pub fn capability(&self) -> &CapabilityDescriptor {
        &self.capability
    }

    pub fn limits(&self) -> &GenerationLimits {
        &self.limits
    }

    /// Validate a request against this compiler's limits without building.
    pub fn request(&self, count: usize, size: usize) -> GatherResult<GenerationRequest> {
        GenerationRequest::new(count, size, &self.limits)
    }

    /// Build a routine for `count` records of `size` bytes.
    pub fn compile(&self, count: usize, size: usize) -> GatherResult<GatherRoutine> {
        let request = self.request(count, size)?;

        if !self.jit_enabled {
            return Err(GatherError::Capability(
                "gather JIT disabled by configuration".into(),
            ));
        }
        let backend = codegen::select_codegen(&self.capability)?;

        let mask = TailMask::build(request.size())?;
        let plan = StreamGroupPlan::build(&request);
        let output = backend.generate(&plan, mask.as_ref())?;

        let routine = GatherRoutine::from_code(
            request.key(),
            &output.code,
            mask,
            plan.double_pump(),
            output.instruction_count,
        )?;
        log::debug!(
            "compiled gather {}: {} groups, {} steps/lane, {} instrs, {} bytes code, double_pump={}, tail={}B",
            request.key(),
            plan.groups.len(),
            plan.steps.len(),
            output.instruction_count,
            output.code.len(),
            plan.double_pump(),
            plan.tail_bytes(),
        );
        Ok(routine)
    }
}

impl Default for GatherCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jit_compiler() -> Option<GatherCompiler> {
        let cap = *crate::dispatch::capability();
        if !cap.supports_gather_jit() {
            eprintln!("skipping: host lacks AVX2 gather support ({cap})");
            return None;
        }
        Some(GatherCompiler::with_config(cap, &GatherConfig::default()))
    }

    #[test]
    fn test_configuration_errors_on_any_host() {
        let compiler =
            GatherCompiler::with_config(CapabilityDescriptor::scalar(), &GatherConfig::default());
        assert!(matches!(
            compiler.compile(2, 5),
            Err(GatherError::Configuration(_))
        ));
        assert!(matches!(
            compiler.compile(0, 8),
            Err(GatherError::Configuration(_))
        ));
    }

    #[test]
    fn test_capability_error_on_scalar_host() {
        let compiler =
            GatherCompiler::with_config(CapabilityDescriptor::scalar(), &GatherConfig::default());
        assert!(matches!(
            compiler.compile(2, 8),
            Err(GatherError::Capability(_))
        ));
    }

    #[test]
    fn test_disabled_jit_is_capability_error() {
        let config = GatherConfig {
            jit_enabled: false,
            ..GatherConfig::default()
        };
        let compiler = GatherCompiler::with_config(CapabilityDescriptor::avx2(), &config);
        assert!(matches!(
            compiler.compile(2, 8),
            Err(GatherError::Capability(_))
        ));
    }

    #[test]
    fn test_compile_and_run_small() {
        let Some(compiler) = jit_compiler() else { return };
        let routine = compiler.compile(2, 12).unwrap();
        assert!(routine.uses_tail_mask());
        assert!(!routine.double_pump());

        let a: Vec<u8> = (0..12).collect();
        let b: Vec<u8> = (50..62).collect();
        let mut dst = vec![0u8; 24];
        routine.gather(&mut dst, &[&a, &b]).unwrap();
        assert_eq!(&dst[..12], &a[..]);
        assert_eq!(&dst[12..], &b[..]);
    }

    #[test]
    fn test_compile_double_pump() {
        let Some(compiler) = jit_compiler() else { return };
        let routine = compiler.compile(3, 64).unwrap();
        assert!(routine.double_pump());
        assert!(!routine.uses_tail_mask());
    }
}
