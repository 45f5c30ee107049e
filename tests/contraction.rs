use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use contracta::{BinaryContraction, ContractionSpec, DataType, KernelKind};

fn rand_vec_f32(rng: &mut StdRng, n: usize) -> Vec<f32> {
    (0..n).map(|_| rng.gen::<f32>()).collect()
}

fn rand_vec_f64(rng: &mut StdRng, n: usize) -> Vec<f64> {
    (0..n).map(|_| rng.gen::<f64>()).collect()
}

fn assert_close_f32(out: &[f32], want: &[f64], tol: f64) {
    assert_eq!(out.len(), want.len());
    for (i, (&a, &w)) in out.iter().zip(want.iter()).enumerate() {
        assert!(
            (a as f64 - w).abs() < tol,
            "mismatch at {}: got {}, want {}",
            i,
            a,
            w
        );
    }
}

fn assert_close_f64(out: &[f64], want: &[f64], tol: f64) {
    assert_eq!(out.len(), want.len());
    for (i, (&a, &w)) in out.iter().zip(want.iter()).enumerate() {
        assert!((a - w).abs() < tol, "mismatch at {}: got {}, want {}", i, a, w);
    }
}

/// km, nk -> nm matmul geometry shared by the bias family.
///
///    ____nm___
///   /         \
/// km           nk
///
/// char   id   size
///    m    0      2
///    n    1      3
///    k    2      4
fn matmul_spec(first: KernelKind, last: KernelKind) -> ContractionSpec {
    let mut sizes = HashMap::new();
    sizes.insert(0, 2);
    sizes.insert(1, 3);
    sizes.insert(2, 4);
    ContractionSpec::new(
        vec![2, 0],
        vec![1, 2],
        vec![1, 0],
        sizes,
        DataType::Fp32,
        first,
        KernelKind::Madd,
        last,
    )
}

/// `out[n,m] += Σ_k left[k,m] · right[n,k]` in f64.
fn matmul_reference(left: &[f32], right: &[f32], out: &mut [f64], m: usize, n: usize, k: usize) {
    for jn in 0..n {
        for jm in 0..m {
            for jk in 0..k {
                out[jn * m + jm] += left[jk * m + jm] as f64 * right[jn * k + jk] as f64;
            }
        }
    }
}

#[test]
fn test_simple_matmul() {
    let mut rng = StdRng::seed_from_u64(7);
    let left = rand_vec_f32(&mut rng, 8);
    let right = rand_vec_f32(&mut rng, 12);
    let mut out = rand_vec_f32(&mut rng, 6);

    let mut want: Vec<f64> = out.iter().map(|&v| v as f64).collect();
    matmul_reference(&left, &right, &mut want, 2, 3, 4);

    let mut cont = BinaryContraction::with_spec(matmul_spec(KernelKind::Undef, KernelKind::Undef));
    cont.compile().unwrap();
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_matmul_with_full_bias() {
    let mut rng = StdRng::seed_from_u64(11);
    let left = rand_vec_f32(&mut rng, 8);
    let right = rand_vec_f32(&mut rng, 12);
    let bias = rand_vec_f32(&mut rng, 6);
    let mut out = rand_vec_f32(&mut rng, 6);

    let mut want: Vec<f64> = bias.iter().map(|&v| v as f64).collect();
    matmul_reference(&left, &right, &mut want, 2, 3, 4);

    let mut cont =
        BinaryContraction::with_spec(matmul_spec(KernelKind::Copy, KernelKind::Undef));
    cont.compile().unwrap();
    unsafe {
        cont.contract_with_aux(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            bias.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_matmul_with_scalar_bias() {
    let mut rng = StdRng::seed_from_u64(13);
    let left = rand_vec_f32(&mut rng, 8);
    let right = rand_vec_f32(&mut rng, 12);
    let bias = vec![rng.gen::<f32>()];
    let mut out = rand_vec_f32(&mut rng, 6);

    let mut want = vec![bias[0] as f64; 6];
    matmul_reference(&left, &right, &mut want, 2, 3, 4);

    let mut spec = matmul_spec(KernelKind::Copy, KernelKind::Undef);
    let mut aux = HashMap::new();
    aux.insert(0, 1);
    aux.insert(1, 1);
    spec.sizes_outer_out_aux = Some(aux);

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract_with_aux(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            bias.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_matmul_with_row_bias() {
    let mut rng = StdRng::seed_from_u64(17);
    let left = rand_vec_f32(&mut rng, 8);
    let right = rand_vec_f32(&mut rng, 12);
    let bias = rand_vec_f32(&mut rng, 3);
    let mut out = rand_vec_f32(&mut rng, 6);

    let mut want = vec![0.0f64; 6];
    for n in 0..3 {
        for m in 0..2 {
            want[n * 2 + m] = bias[n] as f64;
        }
    }
    matmul_reference(&left, &right, &mut want, 2, 3, 4);

    let mut spec = matmul_spec(KernelKind::Copy, KernelKind::Undef);
    let mut aux = HashMap::new();
    aux.insert(0, 1);
    aux.insert(1, 3);
    spec.sizes_outer_out_aux = Some(aux);

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract_with_aux(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            bias.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_matmul_with_column_bias() {
    let mut rng = StdRng::seed_from_u64(19);
    let left = rand_vec_f32(&mut rng, 8);
    let right = rand_vec_f32(&mut rng, 12);
    let bias = rand_vec_f32(&mut rng, 2);
    let mut out = rand_vec_f32(&mut rng, 6);

    let mut want = vec![0.0f64; 6];
    for n in 0..3 {
        for m in 0..2 {
            want[n * 2 + m] = bias[m] as f64;
        }
    }
    matmul_reference(&left, &right, &mut want, 2, 3, 4);

    let mut spec = matmul_spec(KernelKind::Copy, KernelKind::Undef);
    let mut aux = HashMap::new();
    aux.insert(0, 2);
    aux.insert(1, 1);
    spec.sizes_outer_out_aux = Some(aux);

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract_with_aux(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            bias.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_batched_matmul() {
    // kmc, nkc -> nmc
    //
    // char   id   size
    //    c    0      2
    //    m    1      3
    //    n    2      4
    //    k    3      5
    let mut sizes = HashMap::new();
    sizes.insert(0, 2);
    sizes.insert(1, 3);
    sizes.insert(2, 4);
    sizes.insert(3, 5);
    let spec = ContractionSpec::new(
        vec![3, 1, 0],
        vec![2, 3, 0],
        vec![2, 1, 0],
        sizes,
        DataType::Fp32,
        KernelKind::Undef,
        KernelKind::Madd,
        KernelKind::Undef,
    );

    let mut rng = StdRng::seed_from_u64(23);
    let left = rand_vec_f32(&mut rng, 5 * 3 * 2);
    let right = rand_vec_f32(&mut rng, 4 * 5 * 2);
    let mut out = rand_vec_f32(&mut rng, 4 * 3 * 2);

    let mut want: Vec<f64> = out.iter().map(|&v| v as f64).collect();
    for n in 0..4 {
        for m in 0..3 {
            for c in 0..2 {
                for k in 0..5 {
                    want[(n * 3 + m) * 2 + c] += left[(k * 3 + m) * 2 + c] as f64
                        * right[(n * 5 + k) * 2 + c] as f64;
                }
            }
        }
    }

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_fp64_matmul_with_zero_first_touch() {
    let mut sizes = HashMap::new();
    sizes.insert(0, 2);
    sizes.insert(1, 3);
    sizes.insert(2, 4);
    let spec = ContractionSpec::new(
        vec![2, 0],
        vec![1, 2],
        vec![1, 0],
        sizes,
        DataType::Fp64,
        KernelKind::Zero,
        KernelKind::Madd,
        KernelKind::Undef,
    );

    let mut rng = StdRng::seed_from_u64(29);
    let left = rand_vec_f64(&mut rng, 8);
    let right = rand_vec_f64(&mut rng, 12);
    // prior content must not leak through the zero first touch
    let mut out = rand_vec_f64(&mut rng, 6);

    let mut want = vec![0.0f64; 6];
    for n in 0..3 {
        for m in 0..2 {
            for k in 0..4 {
                want[n * 2 + m] += left[k * 2 + m] * right[n * 4 + k];
            }
        }
    }

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f64(&out, &want, 1e-12);
}

#[test]
fn test_add_first_touch_accumulates_bias_and_output() {
    let mut rng = StdRng::seed_from_u64(31);
    let left = rand_vec_f32(&mut rng, 8);
    let right = rand_vec_f32(&mut rng, 12);
    let bias = rand_vec_f32(&mut rng, 6);
    let mut out = rand_vec_f32(&mut rng, 6);

    let mut want: Vec<f64> = out
        .iter()
        .zip(bias.iter())
        .map(|(&o, &b)| o as f64 + b as f64)
        .collect();
    matmul_reference(&left, &right, &mut want, 2, 3, 4);

    let mut cont = BinaryContraction::with_spec(matmul_spec(KernelKind::Add, KernelKind::Undef));
    cont.compile().unwrap();
    unsafe {
        cont.contract_with_aux(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            bias.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_seven_dim_contraction_with_relu() {
    // ygcxaei, yhcxfa -> yhgfxei with zero first touch and relu last touch
    //
    // char id size type
    //    i  0    3   m
    //    e  1    8   m
    //    a  2    2   k
    //    c  3    7   k
    //    g  4    6   m
    //    f  5    5   n
    //    h  6    4   n
    //    x  7    3   c
    //    y  8    4   c
    let mut sizes = HashMap::new();
    for (d, s) in [(0, 3), (1, 8), (2, 2), (3, 7), (4, 6), (5, 5), (6, 4), (7, 3), (8, 4)] {
        sizes.insert(d, s);
    }
    let spec = ContractionSpec::new(
        vec![8, 4, 3, 7, 2, 1, 0],
        vec![8, 6, 3, 7, 5, 2],
        vec![8, 6, 4, 5, 7, 1, 0],
        sizes,
        DataType::Fp32,
        KernelKind::Zero,
        KernelKind::Madd,
        KernelKind::Relu,
    );

    let (ni, ne, na, nc, ng, nf, nh, nx, ny) = (3, 8, 2, 7, 6, 5, 4, 3, 4);
    let mut rng = StdRng::seed_from_u64(37);
    let left: Vec<f32> = (0..ny * ng * nc * nx * na * ne * ni)
        .map(|_| rng.gen::<f32>() - 0.5)
        .collect();
    let right: Vec<f32> = (0..ny * nh * nc * nx * nf * na)
        .map(|_| rng.gen::<f32>() - 0.5)
        .collect();
    let mut out = rand_vec_f32(&mut rng, ny * nh * ng * nf * nx * ne * ni);

    let mut want = vec![0.0f64; out.len()];
    for y in 0..ny {
        for h in 0..nh {
            for g in 0..ng {
                for f in 0..nf {
                    for x in 0..nx {
                        for e in 0..ne {
                            for i in 0..ni {
                                let mut acc = 0.0f64;
                                for c in 0..nc {
                                    for a in 0..na {
                                        let l = left[(((((y * ng + g) * nc + c) * nx + x) * na
                                            + a)
                                            * ne
                                            + e)
                                            * ni
                                            + i];
                                        let r = right[((((y * nh + h) * nc + c) * nx + x) * nf
                                            + f)
                                            * na
                                            + a];
                                        acc += l as f64 * r as f64;
                                    }
                                }
                                let idx = (((((y * nh + h) * ng + g) * nf + f) * nx + x) * ne
                                    + e)
                                    * ni
                                    + i;
                                want[idx] = acc.max(0.0);
                            }
                        }
                    }
                }
            }
        }
    }

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_matmul_with_forced_packing() {
    let mut sizes = HashMap::new();
    sizes.insert(0, 16);
    sizes.insert(1, 6);
    sizes.insert(2, 8);
    let mut spec = ContractionSpec::new(
        vec![2, 0],
        vec![1, 2],
        vec![1, 0],
        sizes,
        DataType::Fp32,
        KernelKind::Zero,
        KernelKind::Madd,
        KernelKind::Undef,
    );
    spec.pack_left = true;
    spec.pack_right = true;

    let mut rng = StdRng::seed_from_u64(41);
    let left = rand_vec_f32(&mut rng, 8 * 16);
    let right = rand_vec_f32(&mut rng, 6 * 8);
    let mut out = rand_vec_f32(&mut rng, 6 * 16);

    let mut want = vec![0.0f64; 6 * 16];
    matmul_reference(&left, &right, &mut want, 16, 6, 8);

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    assert!(cont.scratch_bytes() > 0);
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_transposed_left_repacks_automatically() {
    // left stored mk instead of km: the kernel M is strided, forcing a repack
    let mut sizes = HashMap::new();
    sizes.insert(0, 8);
    sizes.insert(1, 5);
    sizes.insert(2, 12);
    let spec = ContractionSpec::new(
        vec![0, 2],
        vec![1, 2],
        vec![1, 0],
        sizes,
        DataType::Fp32,
        KernelKind::Zero,
        KernelKind::Madd,
        KernelKind::Undef,
    );

    let mut rng = StdRng::seed_from_u64(43);
    let left = rand_vec_f32(&mut rng, 8 * 12);
    let right = rand_vec_f32(&mut rng, 5 * 12);
    let mut out = rand_vec_f32(&mut rng, 5 * 8);

    let mut want = vec![0.0f64; 5 * 8];
    for n in 0..5 {
        for m in 0..8 {
            for k in 0..12 {
                want[n * 8 + m] += left[m * 12 + k] as f64 * right[n * 12 + k] as f64;
            }
        }
    }

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    assert!(cont.scratch_bytes() > 0);
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_blocked_k_with_zero_first_touch() {
    // k = 64 splits against the target of 16, leaving a K loop in the nest;
    // the first/last touch must still fire exactly once per output cell
    let mut sizes = HashMap::new();
    sizes.insert(0, 4);
    sizes.insert(1, 3);
    sizes.insert(2, 64);
    let mut spec = ContractionSpec::new(
        vec![2, 0],
        vec![1, 2],
        vec![1, 0],
        sizes,
        DataType::Fp32,
        KernelKind::Zero,
        KernelKind::Madd,
        KernelKind::Relu,
    );
    spec.target_prim_k = 16;

    let mut rng = StdRng::seed_from_u64(47);
    let left: Vec<f32> = (0..64 * 4).map(|_| rng.gen::<f32>() - 0.5).collect();
    let right: Vec<f32> = (0..3 * 64).map(|_| rng.gen::<f32>() - 0.5).collect();
    let mut out = rand_vec_f32(&mut rng, 3 * 4);

    let mut want = vec![0.0f64; 12];
    for n in 0..3 {
        for m in 0..4 {
            let mut acc = 0.0f64;
            for k in 0..64 {
                acc += left[k * 4 + m] as f64 * right[n * 64 + k] as f64;
            }
            want[n * 4 + m] = acc.max(0.0);
        }
    }

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_bf16_inputs_fp32_compute() {
    use half::bf16;

    let mut sizes = HashMap::new();
    sizes.insert(0, 4);
    sizes.insert(1, 3);
    sizes.insert(2, 5);
    let mut spec = ContractionSpec::new(
        vec![2, 0],
        vec![1, 2],
        vec![1, 0],
        sizes,
        DataType::Bf16,
        KernelKind::Zero,
        KernelKind::Madd,
        KernelKind::Undef,
    );
    spec.dtype_comp = DataType::Fp32;
    spec.dtype_out = DataType::Fp32;

    let mut rng = StdRng::seed_from_u64(53);
    // small integers stay exact in bf16
    let left: Vec<bf16> =
        (0..5 * 4).map(|_| bf16::from_f32(rng.gen_range(0..8) as f32)).collect();
    let right: Vec<bf16> =
        (0..3 * 5).map(|_| bf16::from_f32(rng.gen_range(0..8) as f32)).collect();
    let mut out = vec![0.0f32; 3 * 4];

    let mut want = vec![0.0f64; 12];
    for n in 0..3 {
        for m in 0..4 {
            for k in 0..5 {
                want[n * 4 + m] +=
                    left[k * 4 + m].to_f64() * right[n * 5 + k].to_f64();
            }
        }
    }

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_complex_matmul_planar() {
    // leading dimension s of extent 2 carries the re/im planes
    let mut sizes = HashMap::new();
    sizes.insert(9, 2);
    sizes.insert(0, 2);
    sizes.insert(1, 3);
    sizes.insert(2, 4);
    let spec = ContractionSpec::new(
        vec![9, 2, 0],
        vec![9, 1, 2],
        vec![9, 1, 0],
        sizes,
        DataType::CpxFp32,
        KernelKind::CpxZero,
        KernelKind::CpxMadd,
        KernelKind::Undef,
    );

    let mut rng = StdRng::seed_from_u64(59);
    let left = rand_vec_f32(&mut rng, 2 * 4 * 2);
    let right = rand_vec_f32(&mut rng, 2 * 3 * 4);
    let mut out = rand_vec_f32(&mut rng, 2 * 3 * 2);

    let mut want = vec![0.0f64; 12];
    for n in 0..3 {
        for m in 0..2 {
            let mut re = 0.0f64;
            let mut im = 0.0f64;
            for k in 0..4 {
                let lr = left[k * 2 + m] as f64;
                let li = left[8 + k * 2 + m] as f64;
                let rr = right[n * 4 + k] as f64;
                let ri = right[12 + n * 4 + k] as f64;
                re += lr * rr - li * ri;
                im += lr * ri + li * rr;
            }
            want[n * 2 + m] = re;
            want[6 + n * 2 + m] = im;
        }
    }

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_close_f32(&out, &want, 1e-5);
}

#[test]
fn test_scalar_contraction() {
    // zero-dimensional tensors: the dummy loop fires the kernels exactly once
    let spec = ContractionSpec::new(
        vec![],
        vec![],
        vec![],
        HashMap::new(),
        DataType::Fp32,
        KernelKind::Undef,
        KernelKind::Madd,
        KernelKind::Undef,
    );

    let left = vec![3.0f32];
    let right = vec![4.0f32];
    let mut out = vec![5.0f32];

    let mut cont = BinaryContraction::with_spec(spec);
    cont.compile().unwrap();
    unsafe {
        cont.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_eq!(out[0], 17.0);
}

#[test]
fn test_explicit_thread_target_matches_single_thread() {
    let mut sizes = HashMap::new();
    sizes.insert(0, 2);
    sizes.insert(1, 3);
    sizes.insert(2, 4);
    sizes.insert(3, 5);
    let mut spec = ContractionSpec::new(
        vec![3, 1, 0],
        vec![2, 3, 0],
        vec![2, 1, 0],
        sizes,
        DataType::Fp32,
        KernelKind::Zero,
        KernelKind::Madd,
        KernelKind::Undef,
    );

    let mut rng = StdRng::seed_from_u64(61);
    let left = rand_vec_f32(&mut rng, 5 * 3 * 2);
    let right = rand_vec_f32(&mut rng, 4 * 5 * 2);

    let mut out_seq = vec![0.0f32; 4 * 3 * 2];
    let mut out_par = vec![0.0f32; 4 * 3 * 2];

    spec.num_threads = Some(1);
    let mut seq = BinaryContraction::with_spec(spec.clone());
    seq.compile().unwrap();
    assert_eq!(seq.num_tasks(), 1);

    spec.num_threads = Some(8);
    let mut par = BinaryContraction::with_spec(spec);
    par.compile().unwrap();
    assert!(par.num_tasks() > 1);

    unsafe {
        seq.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out_seq.as_mut_ptr() as *mut u8,
        )
        .unwrap();
        par.contract(
            left.as_ptr() as *const u8,
            right.as_ptr() as *const u8,
            out_par.as_mut_ptr() as *mut u8,
        )
        .unwrap();
    }

    assert_eq!(out_seq, out_par);
}
