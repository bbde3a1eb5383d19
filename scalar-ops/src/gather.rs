/// Gather: `dst[i*size + j] = srcs[i][j]` for `i < count`, `j < size`.
///
/// # Safety
/// `dst` must have `count * size` writable bytes, `srcs` must point to
/// `count` pointers and each of them to at least `size` readable bytes.
/// Destination and sources must not overlap.
#[no_mangle]
#[inline(never)]
pub unsafe extern "C" fn scalar_gather(
    dst: *mut u8,
    srcs: *const *const u8,
    count: usize,
    size: usize,
) {
    for i in 0..count {
        let src = *srcs.add(i);
        let out = dst.add(i * size);
        for j in 0..size {
            *out.add(j) = *src.add(j);
        }
    }
}

/// Safe wrapper over [`scalar_gather`]: concatenates the first `size` bytes
/// of every source into a freshly allocated buffer.
///
/// Panics if any source is shorter than `size`.
pub fn gather_reference(srcs: &[&[u8]], size: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(srcs.len() * size);
    for src in srcs {
        out.extend_from_slice(&src[..size]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_gather_two_records() {
        let buf = [1u8, 2, 2, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 5];
        let srcs = [buf.as_ptr(), unsafe { buf.as_ptr().add(5) }];
        let mut dst = [0u8; 10];
        unsafe { scalar_gather(dst.as_mut_ptr(), srcs.as_ptr(), 2, 5) };
        assert_eq!(dst, [1, 2, 2, 3, 3, 3, 4, 4, 4, 4]);
    }

    #[test]
    fn test_reference_matches_raw() {
        let a: Vec<u8> = (0..40).collect();
        let b: Vec<u8> = (100..140).collect();
        let expected = gather_reference(&[&a[8..], &b[..]], 12);
        let srcs = [a[8..].as_ptr(), b.as_ptr()];
        let mut dst = vec![0u8; 24];
        unsafe { scalar_gather(dst.as_mut_ptr(), srcs.as_ptr(), 2, 12) };
        assert_eq!(dst, expected);
        assert_eq!(&dst[..12], &a[8..20]);
    }

    #[test]
    fn test_zero_count_writes_nothing() {
        let mut dst = [0xAAu8; 4];
        unsafe { scalar_gather(dst.as_mut_ptr(), std::ptr::null(), 0, 4) };
        assert_eq!(dst, [0xAA; 4]);
    }
}
