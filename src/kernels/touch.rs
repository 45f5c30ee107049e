use crate::kernels::scalar::Scalar;
use crate::optimizer::nest::KernelSpec;

/// First/last-touch kernels over the primitive `(m, n)` output block.
///
/// The aux operand shares the output element type; broadcast biases arrive
/// with zeroed aux strides. Complex variants apply the operation to the real
/// and imaginary planes through the `cpx_*` offsets.

#[inline(always)]
unsafe fn for_each_cell(s: &KernelSpec, mut f: impl FnMut(i64, i64)) {
    for n in 0..s.n {
        for m in 0..s.m {
            f(
                m * s.stride_out_aux_m + n * s.stride_out_aux_n,
                m * s.stride_out_m + n * s.stride_out_n,
            );
        }
    }
}

pub unsafe fn kernel_zero<O: Scalar>(_aux: *const u8, out: *mut u8, s: &KernelSpec) {
    for_each_cell(s, |_, off_o| {
        (out.offset(off_o as isize) as *mut O).write_unaligned(O::from_f64(0.0));
    });
}

pub unsafe fn kernel_copy<O: Scalar>(aux: *const u8, out: *mut u8, s: &KernelSpec) {
    for_each_cell(s, |off_a, off_o| {
        let v = (aux.offset(off_a as isize) as *const O).read_unaligned();
        (out.offset(off_o as isize) as *mut O).write_unaligned(v);
    });
}

pub unsafe fn kernel_add<O: Scalar>(aux: *const u8, out: *mut u8, s: &KernelSpec) {
    for_each_cell(s, |off_a, off_o| {
        let a = (aux.offset(off_a as isize) as *const O).read_unaligned();
        let po = out.offset(off_o as isize) as *mut O;
        let v = po.read_unaligned();
        po.write_unaligned(O::from_f64(v.to_f64() + a.to_f64()));
    });
}

pub unsafe fn kernel_relu<O: Scalar>(_aux: *const u8, out: *mut u8, s: &KernelSpec) {
    for_each_cell(s, |_, off_o| {
        let po = out.offset(off_o as isize) as *mut O;
        let v = po.read_unaligned().to_f64();
        if v < 0.0 {
            po.write_unaligned(O::from_f64(0.0));
        }
    });
}

pub unsafe fn kernel_cpx_zero<O: Scalar>(_aux: *const u8, out: *mut u8, s: &KernelSpec) {
    for_each_cell(s, |_, off_o| {
        (out.offset(off_o as isize) as *mut O).write_unaligned(O::from_f64(0.0));
        (out.offset((off_o + s.cpx_stride_out) as isize) as *mut O).write_unaligned(O::from_f64(0.0));
    });
}

pub unsafe fn kernel_cpx_copy<O: Scalar>(aux: *const u8, out: *mut u8, s: &KernelSpec) {
    for_each_cell(s, |off_a, off_o| {
        let re = (aux.offset(off_a as isize) as *const O).read_unaligned();
        let im = (aux.offset((off_a + s.cpx_stride_out_aux) as isize) as *const O).read_unaligned();
        (out.offset(off_o as isize) as *mut O).write_unaligned(re);
        (out.offset((off_o + s.cpx_stride_out) as isize) as *mut O).write_unaligned(im);
    });
}

pub unsafe fn kernel_cpx_add<O: Scalar>(aux: *const u8, out: *mut u8, s: &KernelSpec) {
    for_each_cell(s, |off_a, off_o| {
        for (da, do_) in [(0, 0), (s.cpx_stride_out_aux, s.cpx_stride_out)] {
            let a = (aux.offset((off_a + da) as isize) as *const O).read_unaligned();
            let po = out.offset((off_o + do_) as isize) as *mut O;
            let v = po.read_unaligned();
            po.write_unaligned(O::from_f64(v.to_f64() + a.to_f64()));
        }
    });
}
