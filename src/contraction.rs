use serde::{Serialize, Deserialize};

use crate::core::spec::ContractionSpec;
use crate::core::types::{ContractionError, ExecKind};
use crate::kernels::{resolve_main, resolve_touch, MainFn, TouchFn};
use crate::optimizer::classifier::{classify, DimClassification};
use crate::optimizer::nest::{optimize, KernelSpec, LoopDesc, LoopPlan};
use crate::optimizer::packing::{plan_packing, PackingPlan};
use crate::optimizer::strides::StrideMaps;
use crate::runtime::arena::MemoryArena;
use crate::runtime::engine::{LoopEngine, PackExec};
use crate::runtime::iter_space::IterSpace;

/// Lifecycle of a contraction plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanState {
    Fresh,
    Configured,
    Compiled,
    Ready,
    Failed,
}

struct CompiledPlan {
    classification: DimClassification,
    plan: LoopPlan,
    space: IterSpace,
    packing: PackingPlan,
    first_touch: Option<TouchFn>,
    main: MainFn,
    last_touch: Option<TouchFn>,
    pack_id_left: i64,
    pack_id_right: i64,
}

/// The contraction facade: configure once, compile once, contract repeatedly.
///
/// All validation happens in [`compile`](Self::compile); `contract` performs
/// no runtime checks beyond the state machine, consistent with the
/// systems-level contract of the kernels.
pub struct BinaryContraction {
    spec: Option<ContractionSpec>,
    state: PlanState,
    compiled: Option<CompiledPlan>,
    arena: MemoryArena,
}

impl BinaryContraction {
    pub fn new() -> Self {
        Self {
            spec: None,
            state: PlanState::Fresh,
            compiled: None,
            arena: MemoryArena::new(),
        }
    }

    /// Supplies the contraction description and resets any previous plan.
    pub fn init(&mut self, spec: ContractionSpec) {
        self.spec = Some(spec);
        self.compiled = None;
        self.arena = MemoryArena::new();
        self.state = PlanState::Configured;
    }

    pub fn with_spec(spec: ContractionSpec) -> Self {
        let mut c = Self::new();
        c.init(spec);
        c
    }

    pub fn state(&self) -> PlanState {
        self.state
    }

    /// Builds the executable plan. Idempotent: recompiling an unchanged
    /// configuration reproduces an identical plan.
    pub fn compile(&mut self) -> Result<(), ContractionError> {
        match self.try_compile() {
            Ok(()) => {
                self.state = PlanState::Compiled;
                Ok(())
            }
            Err(e) => {
                self.state = PlanState::Failed;
                self.compiled = None;
                Err(e)
            }
        }
    }

    fn try_compile(&mut self) -> Result<(), ContractionError> {
        let spec = self.spec.as_ref().ok_or(ContractionError::CompilationFailed)?;

        let classification = classify(spec)?;
        let strides = StrideMaps::derive(spec);
        let mut plan = optimize(spec, &classification, &strides)?;
        let packing = plan_packing(spec, &mut plan)?;

        let loop_sizes: Vec<i64> = plan.loops.iter().map(|l| l.size).collect();
        let space = IterSpace::compile(
            &loop_sizes,
            plan.num_parallel_max,
            spec.num_tasks_target(),
        );
        for lo in 0..space.num_parallel() {
            plan.loops[lo].exec = ExecKind::Par;
        }

        let first_touch = resolve_touch(plan.kernel.ktype_first_touch, plan.kernel.dtype_out)?;
        let last_touch = resolve_touch(plan.kernel.ktype_last_touch, plan.kernel.dtype_out)?;
        let main = resolve_main(&plan.kernel)?;

        // Reservations for per-task packing slots; the backing buffer itself
        // is allocated lazily on the first contract.
        self.arena = MemoryArena::new();
        let num_tasks = space.num_tasks() as i64;
        let pack_id_left = match &packing.left {
            Some(side) => self.arena.reserve(num_tasks * side.tile_bytes),
            None => 0,
        };
        let pack_id_right = match &packing.right {
            Some(side) => self.arena.reserve(num_tasks * side.tile_bytes),
            None => 0,
        };

        if spec.verbose {
            eprintln!(
                "[contracta] plan: {} loops, kernel {}x{}x{}, {} tasks, pack l/r: {}/{}",
                plan.loops.len(),
                plan.kernel.m,
                plan.kernel.n,
                plan.kernel.k,
                space.num_tasks(),
                packing.left.is_some(),
                packing.right.is_some(),
            );
        }

        self.compiled = Some(CompiledPlan {
            classification,
            plan,
            space,
            packing,
            first_touch,
            main,
            last_touch,
            pack_id_left,
            pack_id_right,
        });
        Ok(())
    }

    /// Executes the contraction without an aux tensor.
    ///
    /// # Safety
    /// The pointers must address tensors matching the compiled description;
    /// out-of-bounds strides are not checked at runtime.
    pub unsafe fn contract(
        &mut self,
        left: *const u8,
        right: *const u8,
        out: *mut u8,
    ) -> Result<(), ContractionError> {
        self.contract_with_aux(left, right, std::ptr::null(), out)
    }

    /// Executes the contraction with an aux (bias) tensor read by the
    /// first/last-touch kernels.
    ///
    /// # Safety
    /// See [`contract`](Self::contract). `aux` may be null only if no touch
    /// kernel reads it.
    pub unsafe fn contract_with_aux(
        &mut self,
        left: *const u8,
        right: *const u8,
        aux: *const u8,
        out: *mut u8,
    ) -> Result<(), ContractionError> {
        match self.state {
            PlanState::Compiled => {
                self.arena.alloc_all();
                self.state = PlanState::Ready;
            }
            PlanState::Ready => {}
            _ => return Err(ContractionError::CalledBeforeCompile),
        }

        let compiled = self.compiled.as_ref().ok_or(ContractionError::CalledBeforeCompile)?;

        let pack_left = compiled.packing.left.as_ref().map(|s| PackExec {
            trigger_depth: s.trigger_depth,
            steps: &s.steps,
            elem_bytes: s.dtype.scalar_bytes() as usize,
            slots: self.arena.ptr(compiled.pack_id_left),
            tile_bytes: s.tile_bytes,
        });
        let pack_right = compiled.packing.right.as_ref().map(|s| PackExec {
            trigger_depth: s.trigger_depth,
            steps: &s.steps,
            elem_bytes: s.dtype.scalar_bytes() as usize,
            slots: self.arena.ptr(compiled.pack_id_right),
            tile_bytes: s.tile_bytes,
        });

        let engine = LoopEngine {
            loops: &compiled.plan.loops,
            space: &compiled.space,
            kernel_spec: &compiled.plan.kernel,
            first_touch: compiled.first_touch,
            main: compiled.main,
            last_touch: compiled.last_touch,
            pack_left,
            pack_right,
        };
        engine.contract(left, right, aux, out);
        Ok(())
    }

    /// The planned engine nest, outermost first.
    pub fn loops(&self) -> Option<&[LoopDesc]> {
        self.compiled.as_ref().map(|c| c.plan.loops.as_slice())
    }

    pub fn kernel_spec(&self) -> Option<&KernelSpec> {
        self.compiled.as_ref().map(|c| &c.plan.kernel)
    }

    pub fn classification(&self) -> Option<&DimClassification> {
        self.compiled.as_ref().map(|c| &c.classification)
    }

    pub fn num_tasks(&self) -> usize {
        self.compiled.as_ref().map(|c| c.space.num_tasks()).unwrap_or(0)
    }

    /// High-water scratch requirement of the plan in bytes.
    pub fn scratch_bytes(&self) -> i64 {
        self.arena.high_water()
    }
}

impl Default for BinaryContraction {
    fn default() -> Self {
        Self::new()
    }
}
