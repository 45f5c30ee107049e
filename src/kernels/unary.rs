use crate::optimizer::packing::CopyStep;

/// Strided permute-copy used to fill packed tiles.
///
/// Walks the copy program outer to inner; a unit-stride innermost level on
/// both sides degenerates to one contiguous copy.
pub unsafe fn strided_copy(src: *const u8, dst: *mut u8, steps: &[CopyStep], elem_bytes: usize) {
    match steps {
        [] => {
            std::ptr::copy_nonoverlapping(src, dst, elem_bytes);
        }
        [step] if step.stride_src == elem_bytes as i64 && step.stride_dst == elem_bytes as i64 => {
            std::ptr::copy_nonoverlapping(src, dst, step.size as usize * elem_bytes);
        }
        [step, rest @ ..] => {
            for it in 0..step.size {
                strided_copy(
                    src.offset((it * step.stride_src) as isize),
                    dst.offset((it * step.stride_dst) as isize),
                    rest,
                    elem_bytes,
                );
            }
        }
    }
}
