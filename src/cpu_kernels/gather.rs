//! Lane-unrolled portable gather.
//!
//! Mirrors the shape of the generated routine without emitting code: records
//! are processed in groups of up to eight lanes, and each 32-byte step reads
//! every lane's chunk into a stack staging area before writing any of them
//! out. The compiler is free to reorder these accesses, so the
//! loads-before-stores ordering is a strong hint here rather than a
//! guarantee.
//!
//! Unlike the JIT, any record size is accepted; there is no mask.

use crate::types::{check_shape, GatherResult, RoutineKey, MAX_LANES, VECTOR_WIDTH};

/// Copy `count` records of `size` bytes from `srcs[i]` into `dst`.
///
/// # Safety
/// `dst` must have `count * size` writable bytes, `srcs` must point to
/// `count` pointers each referencing at least `size` readable bytes, and no
/// source may overlap the destination.
#[inline]
pub unsafe fn gather_unrolled(dst: *mut u8, srcs: *const *const u8, count: usize, size: usize) {
    let mut base = 0;
    while base < count {
        let lanes = (count - base).min(MAX_LANES);
        let mut ptrs = [std::ptr::null::<u8>(); MAX_LANES];
        for (lane, p) in ptrs.iter_mut().take(lanes).enumerate() {
            *p = *srcs.add(base + lane);
        }
        let out = dst.add(base * size);

        let mut offset = 0;
        while offset < size {
            let chunk = (size - offset).min(VECTOR_WIDTH);
            let mut staging = [[0u8; VECTOR_WIDTH]; MAX_LANES];
            for (stage, src) in staging.iter_mut().zip(&ptrs[..lanes]) {
                std::ptr::copy_nonoverlapping(src.add(offset), stage.as_mut_ptr(), chunk);
            }
            for (lane, stage) in staging[..lanes].iter().enumerate() {
                std::ptr::copy_nonoverlapping(stage.as_ptr(), out.add(lane * size + offset), chunk);
            }
            offset += chunk;
        }

        base += lanes;
    }
}

/// Checked portable gather: `dst` must be exactly `srcs.len() * size` bytes.
pub fn gather_portable(dst: &mut [u8], srcs: &[&[u8]], size: usize) -> GatherResult<()> {
    check_shape(RoutineKey::new(srcs.len(), size), dst, srcs)?;
    let ptrs: Vec<*const u8> = srcs.iter().map(|s| s.as_ptr()).collect();
    // SAFETY: shapes validated above; `dst` is uniquely borrowed.
    unsafe { gather_unrolled(dst.as_mut_ptr(), ptrs.as_ptr(), srcs.len(), size) };
    Ok(())
}
