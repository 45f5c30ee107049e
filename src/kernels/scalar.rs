use half::{bf16, f16};
use wide::f32x8;

use crate::optimizer::nest::KernelSpec;

/// Element type bridged through the compute precision of the kernels.
pub trait Scalar: Copy + Send + Sync + 'static {
    fn to_f32(self) -> f32;
    fn from_f32(v: f32) -> Self;
    fn to_f64(self) -> f64;
    fn from_f64(v: f64) -> Self;
}

impl Scalar for f32 {
    fn to_f32(self) -> f32 { self }
    fn from_f32(v: f32) -> Self { v }
    fn to_f64(self) -> f64 { self as f64 }
    fn from_f64(v: f64) -> Self { v as f32 }
}

impl Scalar for f64 {
    fn to_f32(self) -> f32 { self as f32 }
    fn from_f32(v: f32) -> Self { v as f64 }
    fn to_f64(self) -> f64 { self }
    fn from_f64(v: f64) -> Self { v }
}

impl Scalar for bf16 {
    fn to_f32(self) -> f32 { self.to_f32() }
    fn from_f32(v: f32) -> Self { bf16::from_f32(v) }
    fn to_f64(self) -> f64 { self.to_f64() }
    fn from_f64(v: f64) -> Self { bf16::from_f64(v) }
}

impl Scalar for f16 {
    fn to_f32(self) -> f32 { self.to_f32() }
    fn from_f32(v: f32) -> Self { f16::from_f32(v) }
    fn to_f64(self) -> f64 { self.to_f64() }
    fn from_f64(v: f64) -> Self { f16::from_f64(v) }
}

#[inline(always)]
unsafe fn load<T: Scalar>(base: *const u8, byte_offset: i64) -> T {
    (base.offset(byte_offset as isize) as *const T).read_unaligned()
}

/// Multiply-add over the primitive block with FP32 accumulation:
/// `out[m,n] += Σ_k left[m,k] · right[n,k]`.
pub unsafe fn kernel_madd_c32<L: Scalar, R: Scalar, O: Scalar>(
    left: *const u8,
    right: *const u8,
    out: *mut u8,
    s: &KernelSpec,
) {
    for n in 0..s.n {
        for m in 0..s.m {
            let mut acc = 0.0f32;
            for k in 0..s.k {
                let l: L = load(left, m * s.stride_left_m + k * s.stride_left_k);
                let r: R = load(right, n * s.stride_right_n + k * s.stride_right_k);
                acc += l.to_f32() * r.to_f32();
            }
            let po = out.offset((m * s.stride_out_m + n * s.stride_out_n) as isize) as *mut O;
            let cur: O = po.read_unaligned();
            po.write_unaligned(O::from_f32(cur.to_f32() + acc));
        }
    }
}

/// Multiply-add with FP64 accumulation.
pub unsafe fn kernel_madd_c64<L: Scalar, R: Scalar, O: Scalar>(
    left: *const u8,
    right: *const u8,
    out: *mut u8,
    s: &KernelSpec,
) {
    for n in 0..s.n {
        for m in 0..s.m {
            let mut acc = 0.0f64;
            for k in 0..s.k {
                let l: L = load(left, m * s.stride_left_m + k * s.stride_left_k);
                let r: R = load(right, n * s.stride_right_n + k * s.stride_right_k);
                acc += l.to_f64() * r.to_f64();
            }
            let po = out.offset((m * s.stride_out_m + n * s.stride_out_n) as isize) as *mut O;
            let cur: O = po.read_unaligned();
            po.write_unaligned(O::from_f64(cur.to_f64() + acc));
        }
    }
}

/// FP32 multiply-add with a vectorized path over unit-stride M.
pub unsafe fn kernel_madd_f32(left: *const u8, right: *const u8, out: *mut u8, s: &KernelSpec) {
    if s.stride_left_m != 4 || s.stride_out_m != 4 {
        return kernel_madd_c32::<f32, f32, f32>(left, right, out, s);
    }

    for n in 0..s.n {
        let mut m = 0i64;
        while m + 8 <= s.m {
            let mut acc = f32x8::ZERO;
            for k in 0..s.k {
                let lp = left.offset((m * 4 + k * s.stride_left_k) as isize) as *const [f32; 8];
                let rv = f32x8::splat(load::<f32>(right, n * s.stride_right_n + k * s.stride_right_k));
                acc = f32x8::from(lp.read_unaligned()).mul_add(rv, acc);
            }
            let po = out.offset((m * 4 + n * s.stride_out_n) as isize) as *mut [f32; 8];
            let cur = f32x8::from(po.read_unaligned());
            po.write_unaligned((cur + acc).to_array());
            m += 8;
        }
        while m < s.m {
            let mut acc = 0.0f32;
            for k in 0..s.k {
                let l: f32 = load(left, m * 4 + k * s.stride_left_k);
                let r: f32 = load(right, n * s.stride_right_n + k * s.stride_right_k);
                acc += l * r;
            }
            let po = out.offset((m * 4 + n * s.stride_out_n) as isize) as *mut f32;
            *po += acc;
            m += 1;
        }
    }
}

macro_rules! cpx_madd_impl {
    ($name:ident, $t:ty) => {
        /// Planar complex multiply-add: the imaginary planes sit at the
        /// per-tensor `cpx_*` byte offsets.
        pub unsafe fn $name(left: *const u8, right: *const u8, out: *mut u8, s: &KernelSpec) {
            for n in 0..s.n {
                for m in 0..s.m {
                    let mut acc_re: $t = 0.0;
                    let mut acc_im: $t = 0.0;
                    for k in 0..s.k {
                        let off_l = m * s.stride_left_m + k * s.stride_left_k;
                        let off_r = n * s.stride_right_n + k * s.stride_right_k;
                        let lr: $t = load(left, off_l);
                        let li: $t = load(left, off_l + s.cpx_stride_left);
                        let rr: $t = load(right, off_r);
                        let ri: $t = load(right, off_r + s.cpx_stride_right);
                        acc_re += lr * rr - li * ri;
                        acc_im += lr * ri + li * rr;
                    }
                    let off_o = m * s.stride_out_m + n * s.stride_out_n;
                    let pr = out.offset(off_o as isize) as *mut $t;
                    let pi = out.offset((off_o + s.cpx_stride_out) as isize) as *mut $t;
                    *pr += acc_re;
                    *pi += acc_im;
                }
            }
        }
    };
}

cpx_madd_impl!(kernel_cpx_madd_f32, f32);
cpx_madd_impl!(kernel_cpx_madd_f64, f64);
