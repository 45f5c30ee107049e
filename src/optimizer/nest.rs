use serde::{Serialize, Deserialize};

use crate::core::spec::ContractionSpec;
use crate::core::types::{ContractionError, DimId, DimKind, ExecKind, KernelKind, TouchKind};
use crate::optimizer::classifier::DimClassification;
use crate::optimizer::strides::StrideMaps;

/// Dimension id of the dummy loop injected for scalar contractions.
pub const DUMMY_DIM: DimId = -1;

/// One level of the planned loop nest. Position 0 is outermost. All strides
/// are in bytes per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopDesc {
    pub dim_id: DimId,
    pub kind: DimKind,
    pub exec: ExecKind,
    pub size: i64,
    pub stride_left: i64,
    pub stride_right: i64,
    pub stride_out_aux: i64,
    pub stride_out: i64,
    pub touch: TouchKind,
}

/// Descriptor of the primitive block handled atomically by the micro-kernel.
///
/// The main kernel computes `out[m,n] += Σ_k left[m,k] · right[n,k]` over the
/// block extents using the leading strides below; the touch kernels cover the
/// same `(m, n)` output block. All strides are in bytes. The `cpx_*` strides
/// separate the real and imaginary planes in complex mode and are zero
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    pub m: i64,
    pub n: i64,
    pub k: i64,

    pub stride_left_m: i64,
    pub stride_left_k: i64,
    pub stride_right_n: i64,
    pub stride_right_k: i64,
    pub stride_out_m: i64,
    pub stride_out_n: i64,
    pub stride_out_aux_m: i64,
    pub stride_out_aux_n: i64,

    pub cpx_stride_left: i64,
    pub cpx_stride_right: i64,
    pub cpx_stride_out_aux: i64,
    pub cpx_stride_out: i64,

    pub dtype_left: crate::core::types::DataType,
    pub dtype_right: crate::core::types::DataType,
    pub dtype_comp: crate::core::types::DataType,
    pub dtype_out: crate::core::types::DataType,

    pub ktype_first_touch: KernelKind,
    pub ktype_main: KernelKind,
    pub ktype_last_touch: KernelKind,
}

/// A primitive dimension together with its engine-level block loop, if the
/// extent was split against the target.
#[derive(Debug, Clone, Copy)]
struct PrimChoice {
    dim: DimId,
    /// Extent consumed by the micro-kernel.
    prim_extent: i64,
    /// Iterations of the blocked engine loop above the kernel (1 = no loop).
    block_iters: i64,
}

/// The executable plan produced by the loop optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopPlan {
    pub loops: Vec<LoopDesc>,
    pub kernel: KernelSpec,
    /// Length of the leading run of loops eligible for parallelization.
    pub num_parallel_max: usize,
    pub prim_m_dim: Option<DimId>,
    pub prim_n_dim: Option<DimId>,
    pub prim_k_dim: Option<DimId>,
}

impl LoopPlan {
    /// Product of all loop sizes and primitive extents; equals the product of
    /// the inner sizes of every dimension in the contraction.
    pub fn iteration_count(&self) -> i64 {
        let engine: i64 = self.loops.iter().map(|l| l.size).product();
        engine * self.kernel.m * self.kernel.n * self.kernel.k
    }
}

fn pick_prim(
    dims: &[DimId],
    primary: &std::collections::HashMap<DimId, i64>,
    secondary: &std::collections::HashMap<DimId, i64>,
) -> Option<DimId> {
    dims.iter()
        .copied()
        .enumerate()
        .min_by_key(|&(pos, d)| {
            (
                StrideMaps::of(primary, d),
                StrideMaps::of(secondary, d),
                pos,
            )
        })
        .map(|(_, d)| d)
}

fn split_against_target(spec: &ContractionSpec, dim: Option<DimId>, target: i64) -> PrimChoice {
    match dim {
        None => PrimChoice { dim: DUMMY_DIM, prim_extent: 1, block_iters: 1 },
        Some(d) => {
            let extent = spec.sizes_inner[&d];
            if extent > target && target > 0 && extent % target == 0 {
                PrimChoice { dim: d, prim_extent: target, block_iters: extent / target }
            } else {
                PrimChoice { dim: d, prim_extent: extent, block_iters: 1 }
            }
        }
    }
}

/// Plans the loop nest of a contraction.
///
/// Outside the primitive block the order is: C dimensions outermost, then the
/// M and N groups with the group closer to the output's unit stride placed
/// inner, then K dimensions. The first/last-touch marker is carried by the
/// outermost K loop when the nest reduces, by the innermost loop otherwise.
pub fn optimize(
    spec: &ContractionSpec,
    cls: &DimClassification,
    strides: &StrideMaps,
) -> Result<LoopPlan, ContractionError> {
    let cpx = spec.ktype_first_touch.is_cpx()
        || spec.ktype_main.is_cpx()
        || spec.ktype_last_touch.is_cpx();

    let bytes_left = spec.dtype_left.scalar_bytes();
    let bytes_right = spec.dtype_right.scalar_bytes();
    let bytes_out = spec.dtype_out.scalar_bytes();

    // Complex mode strips the outermost C dimension; its strides address the
    // imaginary plane inside the kernels.
    let mut dims_c = cls.dims_c.as_slice();
    let mut cpx_strides = (0i64, 0i64, 0i64, 0i64);
    if cpx {
        let cpx_dim = match dims_c.first() {
            Some(&d) if spec.sizes_inner[&d] == 2 => d,
            _ => return Err(ContractionError::InvalidCpxDim),
        };
        cpx_strides = (
            StrideMaps::of(&strides.left, cpx_dim) * bytes_left,
            StrideMaps::of(&strides.right, cpx_dim) * bytes_right,
            StrideMaps::of(&strides.out_aux, cpx_dim) * bytes_out,
            StrideMaps::of(&strides.out, cpx_dim) * bytes_out,
        );
        dims_c = &dims_c[1..];
    }

    let prim_m_dim = pick_prim(&cls.dims_m, &strides.out, &strides.left);
    let prim_n_dim = pick_prim(&cls.dims_n, &strides.out, &strides.right);
    let prim_k_dim = pick_prim(&cls.dims_k, &strides.right, &strides.left);

    let prim_m = split_against_target(spec, prim_m_dim, spec.target_prim_m);
    let prim_n = split_against_target(spec, prim_n_dim, spec.target_prim_n);
    let prim_k = split_against_target(spec, prim_k_dim, spec.target_prim_k);

    let desc = |dim: DimId, kind: DimKind, size: i64, stride_scale: i64| LoopDesc {
        dim_id: dim,
        kind,
        exec: ExecKind::Seq,
        size,
        stride_left: StrideMaps::of(&strides.left, dim) * stride_scale * bytes_left,
        stride_right: StrideMaps::of(&strides.right, dim) * stride_scale * bytes_right,
        stride_out_aux: StrideMaps::of(&strides.out_aux, dim) * stride_scale * bytes_out,
        stride_out: StrideMaps::of(&strides.out, dim) * stride_scale * bytes_out,
        touch: TouchKind::None,
    };

    // Build the engine groups. A split primitive dimension contributes a
    // blocked loop as the innermost member of its group, striding by whole
    // primitive tiles.
    let group = |dims: &[DimId], kind: DimKind, prim: &PrimChoice| -> Vec<LoopDesc> {
        let mut loops = Vec::new();
        for &d in dims {
            if prim.dim != DUMMY_DIM && d == prim.dim {
                continue;
            }
            loops.push(desc(d, kind, spec.sizes_inner[&d], 1));
        }
        if prim.dim != DUMMY_DIM && prim.block_iters > 1 {
            loops.push(desc(prim.dim, kind, prim.block_iters, prim.prim_extent));
        }
        loops
    };

    let loops_c: Vec<LoopDesc> =
        dims_c.iter().map(|&d| desc(d, DimKind::C, spec.sizes_inner[&d], 1)).collect();
    let loops_m = group(&cls.dims_m, DimKind::M, &prim_m);
    let loops_n = group(&cls.dims_n, DimKind::N, &prim_n);
    let loops_k = group(&cls.dims_k, DimKind::K, &prim_k);

    // The group aligned with the output's unit stride runs inner.
    let min_out = |dims: &[DimId]| {
        dims.iter().map(|&d| StrideMaps::of(&strides.out, d)).min().unwrap_or(i64::MAX)
    };
    let m_inner = min_out(&cls.dims_m) <= min_out(&cls.dims_n);

    let mut loops: Vec<LoopDesc> = Vec::new();
    loops.extend(loops_c);
    if m_inner {
        loops.extend(loops_n);
        loops.extend(loops_m);
    } else {
        loops.extend(loops_m);
        loops.extend(loops_n);
    }
    loops.extend(loops_k);

    // Touch marker placement.
    if let Some(first_k) = loops.iter().position(|l| l.kind == DimKind::K) {
        loops[first_k].touch = TouchKind::BeforeAfterIter;
    } else if let Some(last) = loops.last_mut() {
        last.touch = TouchKind::EveryIter;
    } else {
        loops.push(LoopDesc {
            dim_id: DUMMY_DIM,
            kind: DimKind::Undef,
            exec: ExecKind::Seq,
            size: 1,
            stride_left: 0,
            stride_right: 0,
            stride_out_aux: 0,
            stride_out: 0,
            touch: TouchKind::EveryIter,
        });
    }

    let num_parallel_max = loops
        .iter()
        .take_while(|l| matches!(l.kind, DimKind::C | DimKind::M | DimKind::N))
        .count();

    let prim_stride = |map: &std::collections::HashMap<DimId, i64>, p: &PrimChoice, bytes: i64| {
        if p.dim == DUMMY_DIM { 0 } else { StrideMaps::of(map, p.dim) * bytes }
    };

    let kernel = KernelSpec {
        m: prim_m.prim_extent,
        n: prim_n.prim_extent,
        k: prim_k.prim_extent,
        stride_left_m: prim_stride(&strides.left, &prim_m, bytes_left),
        stride_left_k: prim_stride(&strides.left, &prim_k, bytes_left),
        stride_right_n: prim_stride(&strides.right, &prim_n, bytes_right),
        stride_right_k: prim_stride(&strides.right, &prim_k, bytes_right),
        stride_out_m: prim_stride(&strides.out, &prim_m, bytes_out),
        stride_out_n: prim_stride(&strides.out, &prim_n, bytes_out),
        stride_out_aux_m: prim_stride(&strides.out_aux, &prim_m, bytes_out),
        stride_out_aux_n: prim_stride(&strides.out_aux, &prim_n, bytes_out),
        cpx_stride_left: cpx_strides.0,
        cpx_stride_right: cpx_strides.1,
        cpx_stride_out_aux: cpx_strides.2,
        cpx_stride_out: cpx_strides.3,
        dtype_left: spec.dtype_left,
        dtype_right: spec.dtype_right,
        dtype_comp: spec.dtype_comp,
        dtype_out: spec.dtype_out,
        ktype_first_touch: spec.ktype_first_touch,
        ktype_main: spec.ktype_main,
        ktype_last_touch: spec.ktype_last_touch,
    };

    Ok(LoopPlan {
        loops,
        kernel,
        num_parallel_max,
        prim_m_dim,
        prim_n_dim,
        prim_k_dim,
    })
}
