//! Gather kernel selection with graceful fallback.
//!
//! `GatherKernel::select` asks the registry for a JIT routine and, when the
//! host (or the configuration) cannot provide one, falls back to the
//! portable unrolled copy instead of failing. Configuration errors are
//! never masked: a malformed (count, size) is the caller's bug.

use std::sync::Arc;

use crate::compiler::{GatherRoutine, RoutineRegistry};
use crate::cpu_kernels::gather::gather_unrolled;
use crate::types::{check_shape, GatherError, GatherResult, RoutineKey};

#[derive(Debug, Clone)]
pub enum GatherKernel {
    /// A generated routine for exactly this shape.
    Jit(Arc<GatherRoutine>),
    /// Portable lane-unrolled copy.
    Portable(RoutineKey),
}

impl GatherKernel {
    /// Pick the fastest available kernel for (count, size).
    pub fn select(registry: &RoutineRegistry, count: usize, size: usize) -> GatherResult<Self> {
        match registry.get_or_build(count, size) {
            Ok(routine) => Ok(GatherKernel::Jit(routine)),
            Err(GatherError::Capability(reason)) => {
                log::warn!(
                    "gather kernel fallback for {}: {reason}",
                    RoutineKey::new(count, size)
                );
                Ok(GatherKernel::Portable(RoutineKey::new(count, size)))
            }
            Err(err) => Err(err),
        }
    }

    /// The portable kernel, with the same validation the JIT path applies.
    pub fn portable(registry: &RoutineRegistry, count: usize, size: usize) -> GatherResult<Self> {
        let request = registry.compiler().request(count, size)?;
        Ok(GatherKernel::Portable(request.key()))
    }

    pub fn key(&self) -> RoutineKey {
        match self {
            GatherKernel::Jit(routine) => routine.key(),
            GatherKernel::Portable(key) => *key,
        }
    }

    pub fn is_jit(&self) -> bool {
        matches!(self, GatherKernel::Jit(_))
    }

    /// Run the gather without any checks.
    ///
    /// # Safety
    /// Same contract as [`GatherRoutine::call`].
    #[inline]
    pub unsafe fn call(&self, dst: *mut u8, srcs: *const *const u8) {
        match self {
            GatherKernel::Jit(routine) => routine.call(dst, srcs),
            GatherKernel::Portable(key) => gather_unrolled(dst, srcs, key.count, key.size),
        }
    }

    /// Checked gather: validates buffer shapes, then runs the kernel.
    pub fn gather(&self, dst: &mut [u8], srcs: &[&[u8]]) -> GatherResult<()> {
        check_shape(self.key(), dst, srcs)?;
        let ptrs: Vec<*const u8> = srcs.iter().map(|s| s.as_ptr()).collect();
        // SAFETY: shapes validated above; `dst` is uniquely borrowed.
        unsafe { self.call(dst.as_mut_ptr(), ptrs.as_ptr()) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatherConfig;
    use crate::dispatch::CapabilityDescriptor;

    #[test]
    fn test_scalar_host_falls_back() {
        let reg = RoutineRegistry::new(CapabilityDescriptor::scalar(), &GatherConfig::default());
        let kernel = GatherKernel::select(&reg, 3, 8).unwrap();
        assert!(!kernel.is_jit());
        assert_eq!(kernel.key(), RoutineKey::new(3, 8));

        let a = [1u8; 8];
        let b = [2u8; 8];
        let c = [3u8; 8];
        let mut dst = [0u8; 24];
        kernel.gather(&mut dst, &[&a, &b, &c]).unwrap();
        assert_eq!(&dst[..8], &a);
        assert_eq!(&dst[8..16], &b);
        assert_eq!(&dst[16..], &c);
    }

    #[test]
    fn test_configuration_error_not_masked() {
        let reg = RoutineRegistry::new(CapabilityDescriptor::scalar(), &GatherConfig::default());
        assert!(matches!(
            GatherKernel::select(&reg, 2, 5),
            Err(GatherError::Configuration(_))
        ));
        assert!(matches!(
            GatherKernel::portable(&reg, 0, 8),
            Err(GatherError::Configuration(_))
        ));
    }

    #[test]
    fn test_jit_selected_when_supported() {
        let cap = *crate::dispatch::capability();
        let reg = RoutineRegistry::new(cap, &GatherConfig::default());
        let kernel = GatherKernel::select(&reg, 2, 8).unwrap();
        assert_eq!(kernel.is_jit(), cap.supports_gather_jit());
    }
}
