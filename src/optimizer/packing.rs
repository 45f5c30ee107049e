use serde::{Serialize, Deserialize};

use crate::core::spec::ContractionSpec;
use crate::core::types::{ContractionError, DataType};
use crate::optimizer::nest::LoopPlan;

/// One level of a strided copy program, outer to inner. Strides are in bytes
/// per iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyStep {
    pub size: i64,
    pub stride_src: i64,
    pub stride_dst: i64,
}

/// Packing decision for one input side: a contiguous tile in the
/// micro-kernel's preferred layout, filled by a unary copy at `trigger_depth`
/// of the engine nest. Every task owns a disjoint slot of `tile_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSide {
    pub tile_bytes: i64,
    pub trigger_depth: usize,
    pub steps: Vec<CopyStep>,
    pub dtype: DataType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingPlan {
    pub left: Option<PackSide>,
    pub right: Option<PackSide>,
}

impl PackingPlan {
    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

const LINE_BYTES: i64 = 64;

fn round_line(bytes: i64) -> i64 {
    (bytes + LINE_BYTES - 1) / LINE_BYTES * LINE_BYTES
}

/// Deepest engine loop whose iteration moves the given side; the pack is
/// issued there and amortized over all deeper loops.
fn trigger_depth(plan: &LoopPlan, stride_of: impl Fn(&crate::optimizer::nest::LoopDesc) -> i64) -> usize {
    plan.loops
        .iter()
        .rposition(|l| stride_of(l) != 0)
        .unwrap_or(0)
}

/// Decides repacking per input side.
///
/// A side is packed when the caller requests it or when the micro-kernel's
/// unit-stride dimension for that side (M for left, K for right) is not
/// unit-stride in storage. The packed strides replace the kernel strides for
/// that side.
pub fn plan_packing(
    spec: &ContractionSpec,
    plan: &mut LoopPlan,
) -> Result<PackingPlan, ContractionError> {
    let bytes_left = plan.kernel.dtype_left.scalar_bytes();
    let bytes_right = plan.kernel.dtype_right.scalar_bytes();

    let pack_left =
        spec.pack_left || (plan.kernel.m > 1 && plan.kernel.stride_left_m != bytes_left);
    let pack_right =
        spec.pack_right || (plan.kernel.k > 1 && plan.kernel.stride_right_k != bytes_right);

    if (pack_left || pack_right) && plan.kernel.cpx_stride_out != 0 {
        return Err(ContractionError::CompilationFailed);
    }

    let trigger_left = trigger_depth(plan, |l| l.stride_left);
    let trigger_right = trigger_depth(plan, |l| l.stride_right);

    let kernel = &mut plan.kernel;
    let mut packing = PackingPlan::default();

    if pack_left {
        // Tile layout (k, m), m unit-stride.
        let steps = vec![
            CopyStep {
                size: kernel.k,
                stride_src: kernel.stride_left_k,
                stride_dst: kernel.m * bytes_left,
            },
            CopyStep {
                size: kernel.m,
                stride_src: kernel.stride_left_m,
                stride_dst: bytes_left,
            },
        ];
        packing.left = Some(PackSide {
            tile_bytes: round_line(kernel.m * kernel.k * bytes_left),
            trigger_depth: trigger_left,
            steps,
            dtype: kernel.dtype_left,
        });
        kernel.stride_left_m = bytes_left;
        kernel.stride_left_k = kernel.m * bytes_left;
    }

    if pack_right {
        // Tile layout (n, k), k unit-stride.
        let steps = vec![
            CopyStep {
                size: kernel.n,
                stride_src: kernel.stride_right_n,
                stride_dst: kernel.k * bytes_right,
            },
            CopyStep {
                size: kernel.k,
                stride_src: kernel.stride_right_k,
                stride_dst: bytes_right,
            },
        ];
        packing.right = Some(PackSide {
            tile_bytes: round_line(kernel.n * kernel.k * bytes_right),
            trigger_depth: trigger_right,
            steps,
            dtype: kernel.dtype_right,
        });
        kernel.stride_right_k = bytes_right;
        kernel.stride_right_n = kernel.k * bytes_right;
    }

    Ok(packing)
}
