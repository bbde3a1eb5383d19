//! Tail mask for the partial last vector of a record.
//!
//! When `size % 32 != 0` the final chunk of each record is moved with a
//! masked dword load/store. The mask is a 32-byte vector whose first
//! `size % 32` bytes are `0xFF`; `vpmaskmovd` reads the sign bit of each
//! dword, so the tail must be a whole number of dwords.
//!
//! The generated code embeds the mask's absolute address, so the buffer is
//! boxed (stable address) and owned by the routine that references it.

use crate::types::{GatherError, GatherResult, RECORD_ALIGN, VECTOR_WIDTH};

#[repr(C, align(32))]
#[derive(Clone, PartialEq, Eq)]
struct MaskBytes([u8; VECTOR_WIDTH]);

pub struct TailMask {
    bytes: Box<MaskBytes>,
    valid: usize,
}

impl TailMask {
    /// Build the mask for records of `size` bytes, or `None` when the
    /// record is a whole number of vectors.
    pub fn build(size: usize) -> GatherResult<Option<TailMask>> {
        let tail = size % VECTOR_WIDTH;
        if tail == 0 {
            return Ok(None);
        }
        if tail % RECORD_ALIGN != 0 {
            return Err(GatherError::Configuration(format!(
                "tail of {tail} bytes cannot be masked at dword granularity"
            )));
        }
        let mut bytes = Box::new(MaskBytes([0u8; VECTOR_WIDTH]));
        bytes.0[..tail].fill(0xFF);
        Ok(Some(TailMask { bytes, valid: tail }))
    }

    /// Number of leading bytes the mask lets through.
    #[inline]
    pub fn valid_bytes(&self) -> usize {
        self.valid
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; VECTOR_WIDTH] {
        &self.bytes.0
    }

    /// Address embedded in generated code. Stable for the mask's lifetime.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.bytes.0.as_ptr()
    }
}

impl std::fmt::Debug for TailMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailMask")
            .field("valid", &self.valid)
            .field("addr", &self.as_ptr())
            .finish()
    }
}
