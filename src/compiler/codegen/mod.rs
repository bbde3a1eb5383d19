//! Code generation trait and dispatch.
//!
//! The `GatherCodegen` trait defines the interface for architecture-specific
//! code generators. Each target implements it to emit machine code for a
//! planned gather routine.

#[cfg(all(feature = "jit-x86", target_arch = "x86_64", unix))]
pub mod x86_64;

use crate::compiler::planner::StreamGroupPlan;
use crate::compiler::tail_mask::TailMask;
use crate::dispatch::{CapabilityDescriptor, IsaLevel};
use crate::types::{GatherError, GatherResult};

/// Output of code generation: raw machine code bytes.
#[derive(Debug, Clone)]
pub struct CodegenOutput {
    /// Raw, position-independent machine code
    pub code: Vec<u8>,
    /// Number of instructions emitted
    pub instruction_count: usize,
}

/// Trait for architecture-specific gather code generators.
pub trait GatherCodegen {
    /// Generate machine code for a planned gather routine.
    ///
    /// `mask` must be `Some` exactly when the plan has a masked step; its
    /// address is baked into the code.
    fn generate(
        &self,
        plan: &StreamGroupPlan,
        mask: Option<&TailMask>,
    ) -> GatherResult<CodegenOutput>;

    /// Target ISA level.
    fn isa_level(&self) -> IsaLevel;
}

/// Select the appropriate codegen backend for the described host.
pub fn select_codegen(cap: &CapabilityDescriptor) -> GatherResult<Box<dyn GatherCodegen>> {
    if !cap.supports_gather_jit() {
        return Err(GatherError::Capability(format!(
            "no gather codegen backend for {cap}"
        )));
    }
    #[cfg(all(feature = "jit-x86", target_arch = "x86_64", unix))]
    {
        return Ok(Box::new(x86_64::X86GatherCodegen::new(cap.isa)));
    }
    #[allow(unreachable_code)]
    Err(GatherError::Capability(
        "gather codegen not compiled for this target".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_host_has_no_codegen() {
        let err = select_codegen(&CapabilityDescriptor::scalar()).err().unwrap();
        assert!(matches!(err, GatherError::Capability(_)));
    }

    #[test]
    fn test_avx2_codegen_selected_when_compiled() {
        let result = select_codegen(&CapabilityDescriptor::avx2());
        if crate::dispatch::jit_backend_compiled() {
            assert_eq!(result.unwrap().isa_level(), IsaLevel::Avx2);
        } else {
            assert!(matches!(result, Err(GatherError::Capability(_))));
        }
    }
}
