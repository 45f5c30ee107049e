use rayon::prelude::*;

use crate::core::types::TouchKind;
use crate::kernels::unary::strided_copy;
use crate::kernels::{MainFn, TouchFn};
use crate::optimizer::nest::{KernelSpec, LoopDesc};
use crate::optimizer::packing::CopyStep;
use crate::runtime::iter_space::IterSpace;

/// Packing state of one input side at execution time: the copy program and
/// the base of the per-task slot array in the arena.
pub struct PackExec<'a> {
    pub trigger_depth: usize,
    pub steps: &'a [CopyStep],
    pub elem_bytes: usize,
    pub slots: *mut u8,
    pub tile_bytes: i64,
}

/// Walks the planned nest and drives the kernels.
///
/// Tasks run independently over disjoint partitions of the parallel loops;
/// iterations within a task follow the nest's lexicographic order. The
/// fork-join of the parallel dispatch is the only synchronization point.
pub struct LoopEngine<'a> {
    pub loops: &'a [LoopDesc],
    pub space: &'a IterSpace,
    pub kernel_spec: &'a KernelSpec,
    pub first_touch: Option<TouchFn>,
    pub main: MainFn,
    pub last_touch: Option<TouchFn>,
    pub pack_left: Option<PackExec<'a>>,
    pub pack_right: Option<PackExec<'a>>,
}

struct SharedPtrs {
    left: *const u8,
    right: *const u8,
    aux: *const u8,
    out: *mut u8,
}

// Tasks write disjoint output regions and disjoint packing slots.
unsafe impl Send for SharedPtrs {}
unsafe impl Sync for SharedPtrs {}
unsafe impl Send for PackExec<'_> {}
unsafe impl Sync for PackExec<'_> {}

impl LoopEngine<'_> {
    /// Executes the contraction. `aux` may be null when no touch kernel
    /// reads it.
    ///
    /// # Safety
    /// The pointers must address tensors laid out as described by the
    /// compiled plan.
    pub unsafe fn contract(
        &self,
        left: *const u8,
        right: *const u8,
        aux: *const u8,
        out: *mut u8,
    ) {
        let ptrs = SharedPtrs { left, right, aux, out };
        let shared = &ptrs;
        (0..self.space.num_tasks()).into_par_iter().for_each(|task| {
            unsafe {
                self.descend(task, 0, shared.left, shared.right, shared.aux, shared.out);
            }
        });
    }

    unsafe fn descend(
        &self,
        task: usize,
        depth: usize,
        left: *const u8,
        right: *const u8,
        aux: *const u8,
        out: *mut u8,
    ) {
        let desc = &self.loops[depth];
        let first = self.space.first(task, depth);
        let size = self.space.size(task, depth);

        if desc.touch == TouchKind::BeforeAfterIter {
            if let Some(f) = self.first_touch {
                f(aux, out, self.kernel_spec);
            }
        }

        for it in first..first + size {
            let l = left.offset((it * desc.stride_left) as isize);
            let r = right.offset((it * desc.stride_right) as isize);
            let a = if aux.is_null() {
                aux
            } else {
                aux.offset((it * desc.stride_out_aux) as isize)
            };
            let o = out.offset((it * desc.stride_out) as isize);

            if desc.touch == TouchKind::EveryIter {
                if let Some(f) = self.first_touch {
                    f(a, o, self.kernel_spec);
                }
            }

            let l = match &self.pack_left {
                Some(pack) if pack.trigger_depth == depth => {
                    let slot = pack.slots.offset(task as isize * pack.tile_bytes as isize);
                    strided_copy(l, slot, pack.steps, pack.elem_bytes);
                    slot as *const u8
                }
                _ => l,
            };
            let r = match &self.pack_right {
                Some(pack) if pack.trigger_depth == depth => {
                    let slot = pack.slots.offset(task as isize * pack.tile_bytes as isize);
                    strided_copy(r, slot, pack.steps, pack.elem_bytes);
                    slot as *const u8
                }
                _ => r,
            };

            if depth + 1 < self.loops.len() {
                self.descend(task, depth + 1, l, r, a, o);
            } else {
                (self.main)(l, r, o, self.kernel_spec);
            }

            if desc.touch == TouchKind::EveryIter {
                if let Some(f) = self.last_touch {
                    f(a, o, self.kernel_spec);
                }
            }
        }

        if desc.touch == TouchKind::BeforeAfterIter {
            if let Some(f) = self.last_touch {
                f(aux, out, self.kernel_spec);
            }
        }
    }
}
