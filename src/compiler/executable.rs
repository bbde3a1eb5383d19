//! GatherRoutine — mmap'd executable code + the tail mask it references.
//!
//! Wraps a block of JIT-compiled machine code implementing one
//! (count, size) gather. The code is stored in an executable memory region
//! (via mmap) and called through a function pointer.

use crate::compiler::tail_mask::TailMask;
use crate::types::{check_shape, GatherError, GatherResult, RoutineKey};

/// Signature of a generated gather routine.
///
/// ```text
/// fn(dst: *mut u8, srcs: *const *const u8)
/// ```
///
/// `sysv64` on every x86_64 OS: the emitter hard-codes rdi/rsi as arguments.
#[cfg(target_arch = "x86_64")]
pub type GatherFn = unsafe extern "sysv64" fn(
    *mut u8,          // destination, count * size bytes
    *const *const u8, // count source pointers
);

#[cfg(not(target_arch = "x86_64"))]
pub type GatherFn = unsafe extern "C" fn(*mut u8, *const *const u8);

/// A JIT-compiled gather routine.
///
/// Immutable once built. Owns the executable region and the tail mask whose
/// address is embedded in the code, so both live exactly as long as the
/// routine. Dropping the routine while a call is in flight is prevented by
/// the borrow on `self` in [`GatherRoutine::call`].
///
/// Routines only come out of [`GatherCompiler`](crate::GatherCompiler); safe
/// code cannot wrap arbitrary bytes as one:
///
/// ```compile_fail
/// use gather_kernels::{GatherRoutine, RoutineKey};
///
/// let _ = GatherRoutine::from_code(RoutineKey::new(1, 4), &[0xC3], None, false, 1);
/// ```
pub struct GatherRoutine {
    key: RoutineKey,
    code: ExecutableBuffer,
    // Referenced by address from `code`.
    mask: Option<TailMask>,
    double_pump: bool,
    instruction_count: usize,
}

impl GatherRoutine {
    /// Wrap emitted machine code and the mask it embeds.
    ///
    /// Crate-private: the safe [`GatherRoutine::gather`] trusts that `code_bytes`
    /// was emitted for `key` by this crate's codegen.
    pub(crate) fn from_code(
        key: RoutineKey,
        code_bytes: &[u8],
        mask: Option<TailMask>,
        double_pump: bool,
        instruction_count: usize,
    ) -> GatherResult<Self> {
        if code_bytes.is_empty() {
            return Err(GatherError::Compile(format!(
                "empty code for gather routine {key}"
            )));
        }
        let code = ExecutableBuffer::new(code_bytes)?;
        Ok(GatherRoutine {
            key,
            code,
            mask,
            double_pump,
            instruction_count,
        })
    }

    #[inline]
    pub fn key(&self) -> RoutineKey {
        self.key
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.key.count
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.key.size
    }

    /// Size of the mapped code region in bytes (page-rounded).
    pub fn code_size(&self) -> usize {
        self.code.len
    }

    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    pub fn uses_tail_mask(&self) -> bool {
        self.mask.is_some()
    }

    pub fn double_pump(&self) -> bool {
        self.double_pump
    }

    /// Get the entry point function pointer.
    ///
    /// # Safety
    /// The returned pointer is only valid while `self` is alive, and may only
    /// be called on a host with the vector extension it was generated for.
    #[inline]
    pub unsafe fn entry_point(&self) -> GatherFn {
        std::mem::transmute::<*mut u8, GatherFn>(self.code.ptr)
    }

    /// Run the gather. No checks of any kind are performed.
    ///
    /// # Safety
    /// `dst` must have exactly `count * size` writable bytes, `srcs` must
    /// point to `count` pointers each referencing at least `size` readable
    /// bytes, and no source may overlap the destination.
    #[inline]
    pub unsafe fn call(&self, dst: *mut u8, srcs: *const *const u8) {
        let f = self.entry_point();
        f(dst, srcs);
    }

    /// Checked gather: validates buffer shapes, then runs the routine.
    pub fn gather(&self, dst: &mut [u8], srcs: &[&[u8]]) -> GatherResult<()> {
        check_shape(self.key, dst, srcs)?;
        let ptrs: Vec<*const u8> = srcs.iter().map(|s| s.as_ptr()).collect();
        // SAFETY: shapes validated above; `dst` is a unique borrow so it
        // cannot overlap any shared source borrow.
        unsafe { self.call(dst.as_mut_ptr(), ptrs.as_ptr()) };
        Ok(())
    }
}

impl std::fmt::Debug for GatherRoutine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatherRoutine")
            .field("key", &self.key)
            .field("code_size", &self.code.len)
            .field("instructions", &self.instruction_count)
            .field("double_pump", &self.double_pump)
            .field("mask", &self.mask)
            .finish()
    }
}

/// Page-rounded anonymous mapping holding one routine's code.
///
/// Writable only while the code is copied in; read+exec afterwards.
struct ExecutableBuffer {
    ptr: *mut u8,
    len: usize,
}

// SAFETY: the mapping is owned by this value alone and never written after
// `new` returns, so sharing or moving it across threads is sound.
unsafe impl Send for ExecutableBuffer {}
unsafe impl Sync for ExecutableBuffer {}

impl ExecutableBuffer {
    #[cfg(unix)]
    fn new(code: &[u8]) -> GatherResult<Self> {
        let len = code.len().div_ceil(page_size()) * page_size();

        // SAFETY: fresh anonymous private mapping, no fd; checked below.
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(GatherError::Compile(format!(
                "cannot map {len} bytes for gather code"
            )));
        }
        // Owns the mapping from here on; an early return unmaps it.
        let buf = ExecutableBuffer {
            ptr: base.cast::<u8>(),
            len,
        };

        // SAFETY: `buf` spans `len >= code.len()` writable bytes and cannot
        // overlap the caller's slice.
        unsafe { std::ptr::copy_nonoverlapping(code.as_ptr(), buf.ptr, code.len()) };

        // SAFETY: the range is exactly the mapping created above.
        let rc = unsafe { libc::mprotect(base, len, libc::PROT_READ | libc::PROT_EXEC) };
        if rc != 0 {
            return Err(GatherError::Compile(format!(
                "cannot make gather code executable: {}",
                std::io::Error::last_os_error()
            )));
        }
        Ok(buf)
    }

    #[cfg(not(unix))]
    fn new(_code: &[u8]) -> GatherResult<Self> {
        Err(GatherError::Capability(
            "executable memory is only supported on unix targets".into(),
        ))
    }
}

// Non-unix targets never construct a buffer.
#[cfg(unix)]
impl Drop for ExecutableBuffer {
    fn drop(&mut self) {
        // SAFETY: `ptr`/`len` describe a live mapping owned by `self`.
        unsafe {
            libc::munmap(self.ptr.cast(), self.len);
        }
    }
}

#[cfg(unix)]
fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
