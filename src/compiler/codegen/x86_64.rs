//! x86_64 AVX2 gather code generation via iced-x86 CodeAssembler.
//!
//! Register convention (System V AMD64 ABI, entry declared `extern "sysv64"`):
//!   rdi = destination cursor (advances by `lanes * size` per group)
//!   rsi = source-pointer-array cursor (advances by `lanes * 8` per group)
//!   rax, rcx, rdx, r8, r9, r10, r11, rbx = per-lane source address
//!   ymm0..ymm7  = per-lane data, first vector of a step
//!   ymm8..ymm15 = per-lane data, second vector of a double-pumped step
//!   ymm15       = tail mask (only when no step is double-pumped)
//!
//! rbx is callee-saved; it is pushed only when some group runs 8 lanes.
//!
//! The emitted routine is straight-line code with no branches. Within every
//! step, all lanes issue their loads before any lane issues its store, so
//! up to 8 (16 when double-pumped) independent misses are in flight at once.

use iced_x86::code_asm::*;

use super::{CodegenOutput, GatherCodegen};
use crate::compiler::planner::{CopyStep, StreamGroupPlan};
use crate::compiler::tail_mask::TailMask;
use crate::dispatch::IsaLevel;
use crate::types::{GatherError, GatherResult, MAX_LANES, POINTER_WIDTH, VECTOR_WIDTH};

/// Index of the ymm register holding the tail mask.
pub const MASK_YMM: usize = 15;

/// AVX2 gather code generator.
pub struct X86GatherCodegen {
    isa: IsaLevel,
}

impl X86GatherCodegen {
    pub fn new(isa: IsaLevel) -> Self {
        X86GatherCodegen { isa }
    }
}

impl GatherCodegen for X86GatherCodegen {
    fn generate(
        &self,
        plan: &StreamGroupPlan,
        mask: Option<&TailMask>,
    ) -> GatherResult<CodegenOutput> {
        if mask.is_some() != (plan.tail_bytes() > 0) {
            return Err(GatherError::Compile(format!(
                "tail mask presence does not match plan for {}",
                plan.key()
            )));
        }
        // Lane 7's second half is ymm15, the mask register.
        if mask.is_some() && plan.double_pump() {
            return Err(GatherError::Compile(format!(
                "double-pumped steps cannot share ymm{MASK_YMM} with a tail mask in {}",
                plan.key()
            )));
        }
        let mut asm = CodeAssembler::new(64).map_err(|e| GatherError::Compile(e.to_string()))?;
        emit_gather(&mut asm, plan, mask).map_err(GatherError::Compile)?;
        let instruction_count = asm.instructions().len();
        // No labels or rip-relative operands: the code is position independent.
        let code = asm
            .assemble(0)
            .map_err(|e| GatherError::Compile(e.to_string()))?;
        Ok(CodegenOutput {
            code,
            instruction_count,
        })
    }

    fn isa_level(&self) -> IsaLevel {
        self.isa
    }
}

/// Map lane index 0..7 to its source address register.
pub fn lane_gpr(idx: usize) -> Result<AsmRegister64, String> {
    match idx {
        0 => Ok(rax),
        1 => Ok(rcx),
        2 => Ok(rdx),
        3 => Ok(r8),
        4 => Ok(r9),
        5 => Ok(r10),
        6 => Ok(r11),
        7 => Ok(rbx),
        _ => Err(format!("lane index {idx} out of range (0..7)")),
    }
}

/// Map index 0..15 to iced-x86 AsmRegisterYmm.
pub fn ymm_reg(idx: usize) -> Result<AsmRegisterYmm, String> {
    match idx {
        0 => Ok(ymm0),
        1 => Ok(ymm1),
        2 => Ok(ymm2),
        3 => Ok(ymm3),
        4 => Ok(ymm4),
        5 => Ok(ymm5),
        6 => Ok(ymm6),
        7 => Ok(ymm7),
        8 => Ok(ymm8),
        9 => Ok(ymm9),
        10 => Ok(ymm10),
        11 => Ok(ymm11),
        12 => Ok(ymm12),
        13 => Ok(ymm13),
        14 => Ok(ymm14),
        15 => Ok(ymm15),
        _ => Err(format!("ymm index {idx} out of range (0..15)")),
    }
}

/// Emit the complete routine: prologue, every stream group, epilogue.
pub fn emit_gather(
    asm: &mut CodeAssembler,
    plan: &StreamGroupPlan,
    mask: Option<&TailMask>,
) -> Result<(), String> {
    let size = plan.key().size;
    let save_rbx = plan.max_lanes() == MAX_LANES;

    if save_rbx {
        asm.push(rbx).map_err(|e| e.to_string())?;
    }

    if let Some(mask) = mask {
        // rax is free until the first group loads its lane pointers.
        asm.mov(rax, mask.as_ptr() as u64).map_err(|e| e.to_string())?;
        asm.vmovdqa(ymm_reg(MASK_YMM)?, ymmword_ptr(rax))
            .map_err(|e| e.to_string())?;
    }

    let num_groups = plan.groups.len();
    for (g, group) in plan.groups.iter().enumerate() {
        emit_group(asm, plan, group.lanes)?;

        if g + 1 < num_groups {
            asm.add(rdi, (group.lanes * size) as i32)
                .map_err(|e| e.to_string())?;
            asm.add(rsi, (group.lanes * POINTER_WIDTH) as i32)
                .map_err(|e| e.to_string())?;
        }
    }

    asm.vzeroupper().map_err(|e| e.to_string())?;
    if save_rbx {
        asm.pop(rbx).map_err(|e| e.to_string())?;
    }
    asm.ret().map_err(|e| e.to_string())?;

    Ok(())
}

/// Emit one stream group of `lanes` records starting at the current cursors.
pub fn emit_group(
    asm: &mut CodeAssembler,
    plan: &StreamGroupPlan,
    lanes: usize,
) -> Result<(), String> {
    if lanes == 0 || lanes > MAX_LANES {
        return Err(format!("group of {lanes} lanes out of range (1..8)"));
    }
    let size = plan.key().size;

    for lane in 0..lanes {
        asm.mov(lane_gpr(lane)?, qword_ptr(rsi + (lane * POINTER_WIDTH) as i32))
            .map_err(|e| e.to_string())?;
    }

    let num_steps = plan.steps.len();
    for (s, step) in plan.steps.iter().enumerate() {
        let advance = s + 1 < num_steps;

        // Every lane loads first; each advances only its own address register.
        for lane in 0..lanes {
            let src = lane_gpr(lane)?;
            emit_step_load(asm, step, lane, src)?;
            if advance {
                asm.add(src, step.stride() as i32)
                    .map_err(|e| e.to_string())?;
            }
        }

        for lane in 0..lanes {
            let disp = (lane * size + step.offset()) as i32;
            emit_step_store(asm, step, lane, disp)?;
        }
    }

    Ok(())
}

fn emit_step_load(
    asm: &mut CodeAssembler,
    step: &CopyStep,
    lane: usize,
    src: AsmRegister64,
) -> Result<(), String> {
    let lo = ymm_reg(lane)?;
    match step {
        CopyStep::Full { .. } => {
            asm.vmovdqu(lo, ymmword_ptr(src)).map_err(|e| e.to_string())?;
        }
        CopyStep::Double { .. } => {
            let hi = ymm_reg(lane + MAX_LANES)?;
            asm.vmovdqu(lo, ymmword_ptr(src)).map_err(|e| e.to_string())?;
            asm.vmovdqu(hi, ymmword_ptr(src + VECTOR_WIDTH as i32))
                .map_err(|e| e.to_string())?;
        }
        CopyStep::Masked { .. } => {
            asm.vpmaskmovd(lo, ymm_reg(MASK_YMM)?, ymmword_ptr(src))
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

fn emit_step_store(
    asm: &mut CodeAssembler,
    step: &CopyStep,
    lane: usize,
    disp: i32,
) -> Result<(), String> {
    let lo = ymm_reg(lane)?;
    match step {
        CopyStep::Full { .. } => {
            asm.vmovdqu(ymmword_ptr(rdi + disp), lo)
                .map_err(|e| e.to_string())?;
        }
        CopyStep::Double { .. } => {
            let hi = ymm_reg(lane + MAX_LANES)?;
            asm.vmovdqu(ymmword_ptr(rdi + disp), lo)
                .map_err(|e| e.to_string())?;
            asm.vmovdqu(ymmword_ptr(rdi + (disp + VECTOR_WIDTH as i32)), hi)
                .map_err(|e| e.to_string())?;
        }
        CopyStep::Masked { .. } => {
            asm.vpmaskmovd(ymmword_ptr(rdi + disp), ymm_reg(MASK_YMM)?, lo)
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}
