//! Host capability descriptor.
//!
//! Describes which vector extension the host supports, as far as the gather
//! generator cares: vector width in bytes and whether masked dword
//! load/store (`vpmaskmovd`) is available. Built once per process by
//! [`CapabilityDescriptor::detect`] and threaded explicitly into the compiler.

use crate::types::VECTOR_WIDTH;

/// ISA level for dispatch decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsaLevel {
    Scalar,
    Avx2,
    Avx512,
    Neon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CapabilityDescriptor {
    /// Highest ISA level detected
    pub isa: IsaLevel,
    /// Widest vector register usable by the generator, in bytes
    pub vector_width: usize,
    /// Masked vector load/store with fault suppression on masked-off lanes
    pub masked_load_store: bool,
}

impl CapabilityDescriptor {
    /// Query the running CPU.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                // The generator only ever uses ymm registers, so AVX-512
                // hosts are still described with a 32-byte width.
                let isa = if is_x86_feature_detected!("avx512f") {
                    IsaLevel::Avx512
                } else {
                    IsaLevel::Avx2
                };
                return CapabilityDescriptor {
                    isa,
                    vector_width: VECTOR_WIDTH,
                    masked_load_store: true,
                };
            }
        }
        #[cfg(target_arch = "aarch64")]
        {
            return CapabilityDescriptor {
                isa: IsaLevel::Neon,
                vector_width: 16,
                masked_load_store: false,
            };
        }
        #[allow(unreachable_code)]
        Self::scalar()
    }

    /// A host with no usable vector extension.
    pub const fn scalar() -> Self {
        CapabilityDescriptor {
            isa: IsaLevel::Scalar,
            vector_width: 0,
            masked_load_store: false,
        }
    }

    /// An AVX2 host, regardless of what the running CPU actually supports.
    pub const fn avx2() -> Self {
        CapabilityDescriptor {
            isa: IsaLevel::Avx2,
            vector_width: VECTOR_WIDTH,
            masked_load_store: true,
        }
    }

    /// Whether this descriptor, combined with the backends compiled into
    /// this build, allows emitting gather routines.
    pub fn supports_gather_jit(&self) -> bool {
        jit_backend_compiled()
            && self.vector_width >= VECTOR_WIDTH
            && self.masked_load_store
            && matches!(self.isa, IsaLevel::Avx2 | IsaLevel::Avx512)
    }
}

/// True when the x86-64 emitter and executable-memory support are built in.
pub const fn jit_backend_compiled() -> bool {
    cfg!(all(feature = "jit-x86", target_arch = "x86_64", unix))
}

impl std::fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} | vector {}B | masked load/store {} | gather jit {}",
            self.isa,
            self.vector_width,
            if self.masked_load_store { "yes" } else { "no" },
            if self.supports_gather_jit() { "on" } else { "off" },
        )
    }
}
