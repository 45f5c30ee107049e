//! # Reference Kernels
//!
//! Scalar and SIMD kernels satisfying the micro-kernel contract, plus the
//! compile-time resolution from (kernel kind, data types) to function
//! pointers.
//!
//! - **[`scalar`]:** Main contraction kernels (multiply-add, complex multiply-add).
//! - **[`touch`]:** First/last-touch kernels over the primitive output block.
//! - **[`unary`]:** Strided permute-copy for packed tiles.

pub mod scalar;
pub mod touch;
pub mod unary;

use half::{bf16, f16};

use crate::core::types::{ContractionError, DataType, KernelKind};
use crate::optimizer::nest::KernelSpec;

/// First/last-touch kernel: `(aux_or_null, out)`.
pub type TouchFn = unsafe fn(*const u8, *mut u8, &KernelSpec);
/// Main contraction kernel: `(left, right, out)`.
pub type MainFn = unsafe fn(*const u8, *const u8, *mut u8, &KernelSpec);

/// Resolves the main kernel for the descriptor's dtype row.
pub fn resolve_main(spec: &KernelSpec) -> Result<MainFn, ContractionError> {
    use DataType::*;
    let row = (spec.dtype_left, spec.dtype_right, spec.dtype_comp, spec.dtype_out);
    match spec.ktype_main {
        KernelKind::Madd => match row {
            (Fp32, Fp32, Fp32, Fp32) => Ok(scalar::kernel_madd_f32),
            (Fp64, Fp64, Fp64, Fp64) => Ok(scalar::kernel_madd_c64::<f64, f64, f64>),
            (Bf16, Bf16, Fp32, Bf16) => Ok(scalar::kernel_madd_c32::<bf16, bf16, bf16>),
            (Bf16, Bf16, Fp32, Fp32) => Ok(scalar::kernel_madd_c32::<bf16, bf16, f32>),
            (Fp16, Fp16, Fp32, Fp16) => Ok(scalar::kernel_madd_c32::<f16, f16, f16>),
            (Fp16, Fp16, Fp32, Fp32) => Ok(scalar::kernel_madd_c32::<f16, f16, f32>),
            _ => Err(ContractionError::KernelUnsupported),
        },
        KernelKind::CpxMadd => match row {
            (CpxFp32, CpxFp32, CpxFp32, CpxFp32) => Ok(scalar::kernel_cpx_madd_f32),
            (CpxFp64, CpxFp64, CpxFp64, CpxFp64) => Ok(scalar::kernel_cpx_madd_f64),
            _ => Err(ContractionError::KernelUnsupported),
        },
        _ => Err(ContractionError::KernelUnsupported),
    }
}

/// Resolves a first/last-touch kernel; `Undef` resolves to no kernel.
pub fn resolve_touch(
    kind: KernelKind,
    dtype_out: DataType,
) -> Result<Option<TouchFn>, ContractionError> {
    use DataType::*;
    use KernelKind::*;

    let f: TouchFn = match (kind, dtype_out) {
        (Undef, _) => return Ok(None),

        (Zero, Fp32) => touch::kernel_zero::<f32>,
        (Zero, Fp64) => touch::kernel_zero::<f64>,
        (Zero, Bf16) => touch::kernel_zero::<bf16>,
        (Zero, Fp16) => touch::kernel_zero::<f16>,

        (Copy, Fp32) => touch::kernel_copy::<f32>,
        (Copy, Fp64) => touch::kernel_copy::<f64>,
        (Copy, Bf16) => touch::kernel_copy::<bf16>,
        (Copy, Fp16) => touch::kernel_copy::<f16>,

        (Add, Fp32) => touch::kernel_add::<f32>,
        (Add, Fp64) => touch::kernel_add::<f64>,
        (Add, Bf16) => touch::kernel_add::<bf16>,
        (Add, Fp16) => touch::kernel_add::<f16>,

        (Relu, Fp32) => touch::kernel_relu::<f32>,
        (Relu, Fp64) => touch::kernel_relu::<f64>,
        (Relu, Bf16) => touch::kernel_relu::<bf16>,
        (Relu, Fp16) => touch::kernel_relu::<f16>,

        (CpxZero, CpxFp32) => touch::kernel_cpx_zero::<f32>,
        (CpxZero, CpxFp64) => touch::kernel_cpx_zero::<f64>,
        (CpxCopy, CpxFp32) => touch::kernel_cpx_copy::<f32>,
        (CpxCopy, CpxFp64) => touch::kernel_cpx_copy::<f64>,
        (CpxAdd, CpxFp32) => touch::kernel_cpx_add::<f32>,
        (CpxAdd, CpxFp64) => touch::kernel_cpx_add::<f64>,

        _ => return Err(ContractionError::KernelUnsupported),
    };
    Ok(Some(f))
}
