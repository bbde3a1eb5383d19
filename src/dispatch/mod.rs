//! Host capability probe for the gather generator.
//!
//! Provides a `CapabilityDescriptor` describing the vector extension level
//! of the running CPU, detected once and cached for the process lifetime.

pub mod device_profile;

pub use device_profile::{jit_backend_compiled, CapabilityDescriptor, IsaLevel};

use std::sync::OnceLock;

static CAPABILITY: OnceLock<CapabilityDescriptor> = OnceLock::new();

/// Get the global capability descriptor (detected once, cached for process lifetime).
pub fn capability() -> &'static CapabilityDescriptor {
    CAPABILITY.get_or_init(|| {
        let cap = CapabilityDescriptor::detect();
        log::info!("gather-kernels host capability: {cap}");
        cap
    })
}
