//! Stream-group planner — transforms a GenerationRequest into a StreamGroupPlan.
//!
//! The planner decides everything the emitter needs at compile time:
//! how records are grouped into lanes, and how each record is broken into
//! vector steps. At runtime the generated routine makes no decisions.
//!
//! All records share one size, so every lane of every group runs the same
//! step sequence; only the lane count of the last group may differ.

use crate::compiler::ir::GenerationRequest;
use crate::types::{RoutineKey, MAX_LANES, VECTOR_WIDTH};

/// One copy step of a single lane, at byte `offset` within its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStep {
    /// One full vector (32 bytes).
    Full { offset: usize },
    /// Two full vectors per lane (64 bytes), double-pumped.
    Double { offset: usize },
    /// The masked remainder, `bytes < 32`.
    Masked { offset: usize, bytes: usize },
}

impl CopyStep {
    #[inline]
    pub fn offset(&self) -> usize {
        match *self {
            CopyStep::Full { offset }
            | CopyStep::Double { offset }
            | CopyStep::Masked { offset, .. } => offset,
        }
    }

    /// Bytes of the record this step delivers.
    #[inline]
    pub fn bytes(&self) -> usize {
        match *self {
            CopyStep::Full { .. } => VECTOR_WIDTH,
            CopyStep::Double { .. } => 2 * VECTOR_WIDTH,
            CopyStep::Masked { bytes, .. } => bytes,
        }
    }

    /// Bytes the lane's address register advances past this step.
    #[inline]
    pub fn stride(&self) -> usize {
        match self {
            CopyStep::Double { .. } => 2 * VECTOR_WIDTH,
            _ => VECTOR_WIDTH,
        }
    }
}

/// A batch of up to eight records processed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamGroup {
    /// Index of this group's first record in the source-pointer array
    pub first_record: usize,
    /// Number of concurrent streams, 1..=8
    pub lanes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGroupPlan {
    key: RoutineKey,
    pub groups: Vec<StreamGroup>,
    pub steps: Vec<CopyStep>,
    tail: usize,
}

impl StreamGroupPlan {
    /// Plan a request. A partial remainder disables double-pumping for the
    /// whole routine: ymm15 is then the mask register, not a lane's second half.
    pub fn build(req: &GenerationRequest) -> Self {
        let (count, size) = (req.count(), req.size());
        let tail_present = size % VECTOR_WIDTH != 0;

        let mut groups = Vec::with_capacity(count.div_ceil(MAX_LANES));
        let mut first_record = 0;
        while first_record < count {
            let lanes = (count - first_record).min(MAX_LANES);
            groups.push(StreamGroup { first_record, lanes });
            first_record += lanes;
        }

        let mut steps = Vec::with_capacity(size / VECTOR_WIDTH + 1);
        let mut offset = 0;
        while size - offset >= VECTOR_WIDTH {
            if !tail_present && size - offset >= 2 * VECTOR_WIDTH {
                steps.push(CopyStep::Double { offset });
                offset += 2 * VECTOR_WIDTH;
            } else {
                steps.push(CopyStep::Full { offset });
                offset += VECTOR_WIDTH;
            }
        }
        let tail = size - offset;
        if tail > 0 {
            steps.push(CopyStep::Masked { offset, bytes: tail });
        }

        StreamGroupPlan {
            key: req.key(),
            groups,
            steps,
            tail,
        }
    }

    #[inline]
    pub fn key(&self) -> RoutineKey {
        self.key
    }

    /// Whether any step moves 64 bytes per lane.
    pub fn double_pump(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, CopyStep::Double { .. }))
    }

    /// Bytes moved by the masked step, 0 when none.
    #[inline]
    pub fn tail_bytes(&self) -> usize {
        self.tail
    }

    /// Widest group in the plan.
    pub fn max_lanes(&self) -> usize {
        self.groups.iter().map(|g| g.lanes).max().unwrap_or(0)
    }

    /// Bytes written to the destination by the whole routine.
    pub fn total_bytes(&self) -> usize {
        self.groups.iter().map(|g| g.lanes).sum::<usize>()
            * self.steps.iter().map(CopyStep::bytes).sum::<usize>()
    }
}
