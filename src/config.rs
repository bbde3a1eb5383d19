//! Runtime configuration for gather generation.
//!
//! Defaults suit the common deployment: a handful of (count, size) shapes
//! generated during warm-up. Every field can be overridden through the
//! environment with [`GatherConfig::from_env`].

use std::str::FromStr;

pub const ENV_REGISTRY_CAPACITY: &str = "GATHER_KERNELS_REGISTRY_CAPACITY";
pub const ENV_MAX_COUNT: &str = "GATHER_KERNELS_MAX_COUNT";
pub const ENV_MAX_RECORD_SIZE: &str = "GATHER_KERNELS_MAX_RECORD_SIZE";
pub const ENV_DISABLE_JIT: &str = "GATHER_KERNELS_DISABLE_JIT";

/// Upper bounds applied when validating a generation request.
///
/// Generated code is fully unrolled, so code size grows with
/// `count * size`; these bounds keep it finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationLimits {
    pub max_count: usize,
    pub max_record_size: usize,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        GenerationLimits {
            max_count: 1024,
            max_record_size: 4096,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatherConfig {
    /// Maximum number of routines retained by a registry (LRU beyond that).
    pub registry_capacity: usize,
    pub limits: GenerationLimits,
    /// When false the compiler refuses to emit code and callers fall back
    /// to the portable copy.
    pub jit_enabled: bool,
}

impl Default for GatherConfig {
    fn default() -> Self {
        GatherConfig {
            registry_capacity: 64,
            limits: GenerationLimits::default(),
            jit_enabled: true,
        }
    }
}

impl GatherConfig {
    /// Defaults overridden by `GATHER_KERNELS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = GatherConfig::default();
        cfg.registry_capacity =
            parse_or(&lookup, ENV_REGISTRY_CAPACITY, cfg.registry_capacity).max(1);
        cfg.limits.max_count = parse_or(&lookup, ENV_MAX_COUNT, cfg.limits.max_count);
        cfg.limits.max_record_size =
            parse_or(&lookup, ENV_MAX_RECORD_SIZE, cfg.limits.max_record_size);
        if let Some(v) = lookup(ENV_DISABLE_JIT) {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => cfg.jit_enabled = false,
                "0" | "false" | "no" | "off" | "" => {}
                other => log::warn!("{ENV_DISABLE_JIT}: unrecognized value {other:?}, ignoring"),
            }
        }
        cfg
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("{name}: cannot parse {raw:?}, keeping default {default}");
                default
            }
        },
    }
}
