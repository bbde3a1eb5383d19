//! Routine registry — bounded cache of generated gather routines.
//!
//! Keyed by (count, size). The first request for a key compiles and retains
//! the routine; later requests return the retained one. Capacity is
//! explicit: once full, the least-recently-used routine is evicted.
//!
//! Routines are handed out as `Arc`s. Eviction only drops the registry's
//! reference, so a caller still holding a routine keeps its code and tail
//! mask alive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::compiler::{GatherCompiler, GatherRoutine};
use crate::config::GatherConfig;
use crate::dispatch::CapabilityDescriptor;
use crate::types::{GatherResult, RoutineKey};

/// Counters describing registry traffic since creation (or last `clear`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Slot {
    routine: Arc<GatherRoutine>,
    last_used: u64,
}

#[derive(Default)]
struct RegistryInner {
    entries: HashMap<RoutineKey, Slot>,
    /// Logical clock for LRU ordering
    tick: u64,
    stats: RegistryStats,
}

impl RegistryInner {
    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, slot)| slot.last_used)
            .map(|(key, _)| *key);
        if let Some(key) = victim {
            self.entries.remove(&key);
            self.stats.evictions += 1;
            log::debug!("gather registry: evicted {key}");
        }
    }
}

pub struct RoutineRegistry {
    compiler: GatherCompiler,
    capacity: usize,
    inner: Mutex<RegistryInner>,
}

impl RoutineRegistry {
    /// Registry for the detected host, configured from the environment.
    pub fn detect() -> Self {
        Self::new(*crate::dispatch::capability(), &GatherConfig::from_env())
    }

    pub fn new(capability: CapabilityDescriptor, config: &GatherConfig) -> Self {
        Self::with_compiler(
            GatherCompiler::with_config(capability, config),
            config.registry_capacity,
        )
    }

    pub fn with_compiler(compiler: GatherCompiler, capacity: usize) -> Self {
        RoutineRegistry {
            compiler,
            capacity: capacity.max(1),
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Return the routine for (count, size), compiling it on first request.
    ///
    /// Building happens under the registry lock, so concurrent callers asking
    /// for the same key compile it once. A failed build registers nothing.
    pub fn get_or_build(&self, count: usize, size: usize) -> GatherResult<Arc<GatherRoutine>> {
        let key = RoutineKey::new(count, size);
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.tick += 1;
        let now = inner.tick;

        if let Some(slot) = inner.entries.get_mut(&key) {
            slot.last_used = now;
            let routine = Arc::clone(&slot.routine);
            inner.stats.hits += 1;
            log::debug!("gather registry: hit {key}");
            return Ok(routine);
        }

        inner.stats.misses += 1;
        let routine = Arc::new(self.compiler.compile(count, size)?);

        if inner.entries.len() >= self.capacity {
            inner.evict_lru();
        }
        inner.entries.insert(
            key,
            Slot {
                routine: Arc::clone(&routine),
                last_used: now,
            },
        );
        Ok(routine)
    }

    pub fn contains(&self, count: usize, size: usize) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.contains_key(&RoutineKey::new(count, size))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).stats
    }

    pub fn compiler(&self) -> &GatherCompiler {
        &self.compiler
    }

    /// Drop every retained routine and reset the counters.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner = RegistryInner::default();
    }
}

impl std::fmt::Debug for RoutineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutineRegistry")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GatherError;

    fn jit_registry(capacity: usize) -> Option<RoutineRegistry> {
        let cap = *crate::dispatch::capability();
        if !cap.supports_gather_jit() {
            eprintln!("skipping: host lacks AVX2 gather support ({cap})");
            return None;
        }
        let config = GatherConfig {
            registry_capacity: capacity,
            ..GatherConfig::default()
        };
        Some(RoutineRegistry::new(cap, &config))
    }

    #[test]
    fn test_failed_build_registers_nothing() {
        let reg = RoutineRegistry::new(CapabilityDescriptor::scalar(), &GatherConfig::default());
        assert!(matches!(
            reg.get_or_build(2, 5),
            Err(GatherError::Configuration(_))
        ));
        assert!(matches!(
            reg.get_or_build(2, 8),
            Err(GatherError::Capability(_))
        ));
        assert!(reg.is_empty());
        assert_eq!(reg.stats().misses, 2);
        assert_eq!(reg.stats().hits, 0);
    }

    #[test]
    fn test_same_key_returns_same_routine() {
        let Some(reg) = jit_registry(8) else { return };
        let a = reg.get_or_build(4, 16).unwrap();
        let b = reg.get_or_build(4, 16).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.stats(),
            RegistryStats {
                hits: 1,
                misses: 1,
                evictions: 0
            }
        );
    }

    #[test]
    fn test_lru_eviction() {
        let Some(reg) = jit_registry(2) else { return };
        let first = reg.get_or_build(1, 4).unwrap();
        reg.get_or_build(2, 4).unwrap();
        // Touch (1, 4) so (2, 4) becomes least recently used.
        reg.get_or_build(1, 4).unwrap();
        reg.get_or_build(3, 4).unwrap();

        assert_eq!(reg.len(), 2);
        assert!(reg.contains(1, 4));
        assert!(!reg.contains(2, 4));
        assert!(reg.contains(3, 4));
        assert_eq!(reg.stats().evictions, 1);

        // Evicted or not, a held routine stays callable.
        let src = [7u8; 4];
        let mut dst = [0u8; 4];
        first.gather(&mut dst, &[&src]).unwrap();
        assert_eq!(dst, [7; 4]);
    }

    #[test]
    fn test_evicted_routine_outlives_registry_entry() {
        let Some(reg) = jit_registry(1) else { return };
        let held = reg.get_or_build(2, 20).unwrap();
        reg.get_or_build(2, 24).unwrap();
        assert!(!reg.contains(2, 20));

        let a: Vec<u8> = (0..20).collect();
        let b: Vec<u8> = (20..40).collect();
        let mut dst = vec![0u8; 40];
        held.gather(&mut dst, &[&a, &b]).unwrap();
        assert_eq!(dst, (0..40).collect::<Vec<u8>>());
    }

    #[test]
    fn test_clear() {
        let Some(reg) = jit_registry(4) else { return };
        reg.get_or_build(1, 8).unwrap();
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.stats(), RegistryStats::default());
    }

    #[test]
    fn test_concurrent_get_or_build() {
        let Some(reg) = jit_registry(4) else { return };
        let reg = Arc::new(reg);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || reg.get_or_build(9, 28).unwrap())
            })
            .collect();
        let routines: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(routines.iter().all(|r| Arc::ptr_eq(r, &routines[0])));
        assert_eq!(reg.stats().misses, 1);
    }

    /// Collects every record logged by this crate while tests run.
    struct CaptureLogger;

    static CAPTURED: Mutex<Vec<(log::Level, String)>> = Mutex::new(Vec::new());

    impl log::Log for CaptureLogger {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            CAPTURED
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    fn install_capture_logger() {
        static LOGGER: CaptureLogger = CaptureLogger;
        static INSTALL: std::sync::Once = std::sync::Once::new();
        INSTALL.call_once(|| {
            let _ = log::set_logger(&LOGGER);
            log::set_max_level(log::LevelFilter::Trace);
        });
    }

    #[test]
    fn test_hit_logged_at_debug() {
        install_capture_logger();
        let Some(reg) = jit_registry(4) else { return };
        reg.get_or_build(3, 44).unwrap();
        reg.get_or_build(3, 44).unwrap();

        let captured = CAPTURED.lock().unwrap_or_else(|e| e.into_inner());
        let hit = captured
            .iter()
            .find(|(_, msg)| msg == "gather registry: hit 3x44B")
            .expect("registry hit was not logged");
        assert_eq!(hit.0, log::Level::Debug);
    }
}
