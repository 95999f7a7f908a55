//! End-to-end validation of the convolution engine against the scalar
//! reference evaluator, across backends, worker counts, and layer shapes.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use srcnn_kernels::ops::conv3x3::apply_layer_with;
use srcnn_kernels::validation::{max_abs_diff, reference_conv3x3};
use srcnn_kernels::{
    apply_layer, ComputeEnv, ConvKernels, IsaLevel, PlanarTensor, RayonEnv, ThreadEnv, WeightBank,
};

fn rand_vec(rng: &mut StdRng, n: usize) -> Vec<f32> {
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

/// Run one layer through the engine and return the output tensor.
fn run_layer(
    kernels: &ConvKernels,
    env: &dyn ComputeEnv,
    input: &[f32],
    std_weights: &[f32],
    biases: &[f32],
    width: usize,
    height: usize,
    n_in: usize,
    n_out: usize,
    n_jobs: usize,
) -> Vec<f32> {
    let bank = WeightBank::pack(std_weights, n_in, n_out);
    let mut output = vec![0.0f32; width * height * n_out];
    apply_layer_with(
        kernels, env, input, &mut output, &bank, biases, width, height, n_jobs,
    )
    .expect("layer must evaluate");
    output
}

fn assert_close(engine: &[f32], reference: &[f32], tol: f32) {
    assert_eq!(engine.len(), reference.len());
    for (i, (a, b)) in engine.iter().zip(reference.iter()).enumerate() {
        assert!(
            (a - b).abs() <= tol * (1.0 + b.abs()),
            "element {i}: engine {a} vs reference {b}"
        );
    }
}

// ── Concrete scenarios ───────────────────────────────────────────────

#[test]
fn s1_identity_single_pixel() {
    let mut weights = vec![0.0f32; 9];
    weights[4] = 1.0;
    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &[5.0],
        &weights,
        &[0.0],
        1,
        1,
        1,
        1,
        1,
    );
    assert_eq!(out, vec![5.0]);
}

#[test]
fn s2_negative_slope() {
    let mut weights = vec![0.0f32; 9];
    weights[4] = 1.0;
    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &[-3.0],
        &weights,
        &[0.0],
        1,
        1,
        1,
        1,
        1,
    );
    assert!((out[0] - (-0.3)).abs() < 1e-6);
}

#[test]
fn s3_box_filter_with_border_clamp() {
    let input: Vec<f32> = (1..=9).map(|v| v as f32).collect();
    let weights = vec![1.0f32 / 9.0; 9];
    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &input,
        &weights,
        &[0.0],
        3,
        3,
        1,
        1,
        1,
    );
    assert!((out[4] - 5.0).abs() < 1e-6, "center must average the full window");
    let corner = (1.0 + 1.0 + 2.0 + 1.0 + 1.0 + 2.0 + 4.0 + 4.0 + 5.0) / 9.0;
    assert!((out[0] - corner).abs() < 1e-6, "corner must average the clamped window");
}

#[test]
fn s4_three_output_channels() {
    // Center tap of output plane op is op + 1.
    let mut weights = vec![0.0f32; 3 * 9];
    for op in 0..3 {
        weights[op * 9 + 4] = (op + 1) as f32;
    }
    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &[2.0],
        &weights,
        &[0.0; 3],
        1,
        1,
        1,
        3,
        1,
    );
    assert_eq!(out, vec![2.0, 4.0, 6.0]);
}

#[test]
fn s5_wide_kernel_matches_reference() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let (w, h, n_in, n_out) = (4, 2, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let weights = rand_vec(&mut rng, n_in * n_out * 9);
    let biases = rand_vec(&mut rng, n_out);

    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &input,
        &weights,
        &biases,
        w,
        h,
        n_in,
        n_out,
        1,
    );
    let expect = reference_conv3x3(&input, &weights, &biases, w, h, n_in, n_out);
    assert_close(&out, &expect, 1e-5);
}

#[test]
fn s6_worker_count_invariance() {
    let mut rng = StdRng::seed_from_u64(0xfeed);
    let (w, h, n_in, n_out) = (70, 40, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let weights = rand_vec(&mut rng, n_in * n_out * 9);
    let biases = rand_vec(&mut rng, n_out);

    // One backend for every run, so outputs must be bit-exact.
    let kernels = ConvKernels::with_isa(IsaLevel::Scalar).unwrap();
    let baseline = run_layer(
        &kernels, &ThreadEnv, &input, &weights, &biases, w, h, n_in, n_out, 1,
    );
    for n_jobs in [2usize, 4, 8] {
        let out = run_layer(
            &kernels, &ThreadEnv, &input, &weights, &biases, w, h, n_in, n_out, n_jobs,
        );
        for (i, (a, b)) in out.iter().zip(baseline.iter()).enumerate() {
            assert_eq!(
                a.to_bits(),
                b.to_bits(),
                "element {i} differs with {n_jobs} workers"
            );
        }
    }
}

// ── Invariants ───────────────────────────────────────────────────────

#[test]
fn every_output_pixel_is_written() {
    let mut rng = StdRng::seed_from_u64(3);
    const SENTINEL: f32 = 1.0e30;

    // Wide path across several tiles, including an odd final column.
    let (w, h, n_in, n_out) = (261, 18, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let bank = WeightBank::pack(&rand_vec(&mut rng, n_in * n_out * 9), n_in, n_out);
    let biases = rand_vec(&mut rng, n_out);
    let mut output = vec![SENTINEL; w * h * n_out];
    apply_layer(&ThreadEnv, &input, &mut output, &bank, &biases, w, h, 4).unwrap();
    assert!(output.iter().all(|v| *v != SENTINEL), "wide path left pixels untouched");

    // Narrow path.
    let (w, h, n_in, n_out) = (7, 5, 4, 3);
    let input = rand_vec(&mut rng, w * h * n_in);
    let bank = WeightBank::pack(&rand_vec(&mut rng, n_in * n_out * 9), n_in, n_out);
    let biases = rand_vec(&mut rng, n_out);
    let mut output = vec![SENTINEL; w * h * n_out];
    apply_layer(&ThreadEnv, &input, &mut output, &bank, &biases, w, h, 2).unwrap();
    assert!(output.iter().all(|v| *v != SENTINEL), "narrow path left pixels untouched");
}

#[test]
fn multi_tile_image_matches_reference() {
    // 260x18 crosses both the horizontal (256) and vertical (16) tile edges.
    let mut rng = StdRng::seed_from_u64(17);
    let (w, h, n_in, n_out) = (260, 18, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let weights = rand_vec(&mut rng, n_in * n_out * 9);
    let biases = rand_vec(&mut rng, n_out);

    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &input,
        &weights,
        &biases,
        w,
        h,
        n_in,
        n_out,
        4,
    );
    let expect = reference_conv3x3(&input, &weights, &biases, w, h, n_in, n_out);
    assert_close(&out, &expect, 1e-5);
}

#[test]
fn odd_width_wide_path_matches_reference() {
    let mut rng = StdRng::seed_from_u64(29);
    let (w, h, n_in, n_out) = (5, 3, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let weights = rand_vec(&mut rng, n_in * n_out * 9);
    let biases = rand_vec(&mut rng, n_out);

    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &input,
        &weights,
        &biases,
        w,
        h,
        n_in,
        n_out,
        1,
    );
    let expect = reference_conv3x3(&input, &weights, &biases, w, h, n_in, n_out);
    assert_close(&out, &expect, 1e-5);
}

#[test]
fn single_column_trailing_tile_matches_reference() {
    // 257 columns leaves a one-column tile past the horizontal tile edge;
    // the preceding tile must absorb it, with any worker count.
    let mut rng = StdRng::seed_from_u64(37);
    let (w, h, n_in, n_out) = (257, 8, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let weights = rand_vec(&mut rng, n_in * n_out * 9);
    let biases = rand_vec(&mut rng, n_out);

    let expect = reference_conv3x3(&input, &weights, &biases, w, h, n_in, n_out);
    for n_jobs in [1usize, 4] {
        let out = run_layer(
            &ConvKernels::new(),
            &ThreadEnv,
            &input,
            &weights,
            &biases,
            w,
            h,
            n_in,
            n_out,
            n_jobs,
        );
        assert_close(&out, &expect, 1e-5);
    }
}

#[test]
fn narrow_path_tall_image_matches_reference() {
    // Crosses the vertical tile edge with a plane count that needs the
    // scalar tail (4 planes < vector width).
    let mut rng = StdRng::seed_from_u64(31);
    for n_out in [1usize, 3] {
        let (w, h, n_in) = (3, 40, 4);
        let input = rand_vec(&mut rng, w * h * n_in);
        let weights = rand_vec(&mut rng, n_in * n_out * 9);
        let biases = rand_vec(&mut rng, n_out);

        let out = run_layer(
            &ConvKernels::new(),
            &ThreadEnv,
            &input,
            &weights,
            &biases,
            w,
            h,
            n_in,
            n_out,
            3,
        );
        let expect = reference_conv3x3(&input, &weights, &biases, w, h, n_in, n_out);
        assert_close(&out, &expect, 1e-5);
    }
}

#[test]
fn border_clamp_equals_virtual_padding() {
    // Evaluating with clamped borders must equal evaluating the interior
    // of an image padded by duplicating its edge rows and columns.
    let mut rng = StdRng::seed_from_u64(41);
    let (w, h, n_in, n_out) = (6, 5, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let weights = rand_vec(&mut rng, n_in * n_out * 9);
    let biases = rand_vec(&mut rng, n_out);

    let (pw, ph) = (w + 2, h + 2);
    let src = PlanarTensor::new(input.clone(), w, h, n_in);
    let mut padded = PlanarTensor::zeros(pw, ph, n_in);
    for y in 0..ph {
        for x in 0..pw {
            let sy = y.saturating_sub(1).min(h - 1);
            let sx = x.saturating_sub(1).min(w - 1);
            for p in 0..n_in {
                padded.set(y, x, p, src.at(sy, sx, p));
            }
        }
    }

    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &input,
        &weights,
        &biases,
        w,
        h,
        n_in,
        n_out,
        1,
    );
    let padded_out =
        reference_conv3x3(padded.as_slice(), &weights, &biases, pw, ph, n_in, n_out);
    for y in 0..h {
        for x in 0..w {
            for op in 0..n_out {
                let a = out[(y * w + x) * n_out + op];
                let b = padded_out[((y + 1) * pw + (x + 1)) * n_out + op];
                assert!(
                    (a - b).abs() <= 1e-5 * (1.0 + b.abs()),
                    "pixel ({y}, {x}) plane {op}: {a} vs padded {b}"
                );
            }
        }
    }
}

#[test]
fn output_planes_are_independent() {
    let mut rng = StdRng::seed_from_u64(43);
    let (w, h, n_in, n_out) = (6, 4, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let mut weights = rand_vec(&mut rng, n_in * n_out * 9);
    let mut biases = rand_vec(&mut rng, n_out);

    let kernels = ConvKernels::new();
    let before = run_layer(
        &kernels, &ThreadEnv, &input, &weights, &biases, w, h, n_in, n_out, 1,
    );

    // Perturb everything that feeds output plane 5 and nothing else.
    let victim = 5;
    for ip in 0..n_in {
        for tap in 0..9 {
            weights[(victim * n_in + ip) * 9 + tap] += 0.25;
        }
    }
    biases[victim] -= 1.0;
    let after = run_layer(
        &kernels, &ThreadEnv, &input, &weights, &biases, w, h, n_in, n_out, 1,
    );

    let mut victim_changed = false;
    for pixel in 0..w * h {
        for op in 0..n_out {
            let (a, b) = (before[pixel * n_out + op], after[pixel * n_out + op]);
            if op == victim {
                victim_changed |= a.to_bits() != b.to_bits();
            } else {
                assert_eq!(
                    a.to_bits(),
                    b.to_bits(),
                    "plane {op} at pixel {pixel} depends on plane {victim}'s weights"
                );
            }
        }
    }
    assert!(victim_changed, "perturbed plane must actually change");
}

#[test]
fn backends_agree_within_fma_tolerance() {
    let mut rng = StdRng::seed_from_u64(47);
    let scalar = ConvKernels::with_isa(IsaLevel::Scalar).unwrap();
    let native = ConvKernels::new();
    if native.isa() == IsaLevel::Scalar {
        println!("Skipping backend agreement: no SIMD backend on this CPU");
        return;
    }

    // Wide and narrow shapes, odd width included.
    for (w, h, n_in, n_out) in [(9, 6, 8, 16), (5, 4, 12, 1), (5, 4, 12, 3)] {
        let input = rand_vec(&mut rng, w * h * n_in);
        let weights = rand_vec(&mut rng, n_in * n_out * 9);
        let biases = rand_vec(&mut rng, n_out);

        let a = run_layer(
            &native, &ThreadEnv, &input, &weights, &biases, w, h, n_in, n_out, 2,
        );
        let b = run_layer(
            &scalar, &ThreadEnv, &input, &weights, &biases, w, h, n_in, n_out, 2,
        );
        assert_close(&a, &b, 1e-5);
        assert!(max_abs_diff(&a, &b) < 1e-3);
    }
}

#[test]
fn rayon_env_matches_thread_env() {
    let mut rng = StdRng::seed_from_u64(53);
    let (w, h, n_in, n_out) = (33, 21, 8, 16);
    let input = rand_vec(&mut rng, w * h * n_in);
    let weights = rand_vec(&mut rng, n_in * n_out * 9);
    let biases = rand_vec(&mut rng, n_out);

    let kernels = ConvKernels::with_isa(IsaLevel::Scalar).unwrap();
    let a = run_layer(
        &kernels, &ThreadEnv, &input, &weights, &biases, w, h, n_in, n_out, 4,
    );
    let b = run_layer(
        &kernels, &RayonEnv, &input, &weights, &biases, w, h, n_in, n_out, 4,
    );
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.to_bits(), y.to_bits());
    }
}

#[test]
fn leaky_rectifier_law_holds() {
    // Inputs and weights live in (-1, 1), so the 18-tap sum is bounded by
    // 18 in magnitude; a bias of -30 forces every pre-activation into
    // [-48, -12] and the output must be exactly a tenth of it.
    let mut rng = StdRng::seed_from_u64(59);
    let (w, h, n_in, n_out) = (4, 4, 2, 1);
    let input = rand_vec(&mut rng, w * h * n_in);
    let weights = rand_vec(&mut rng, n_in * n_out * 9);
    let biases = vec![-30.0f32];

    let out = run_layer(
        &ConvKernels::new(),
        &ThreadEnv,
        &input,
        &weights,
        &biases,
        w,
        h,
        n_in,
        n_out,
        1,
    );
    for v in &out {
        assert!(*v < 0.0, "pre-activation must be negative");
        assert!(
            (-4.8..=-1.2).contains(v),
            "output {v} must be a tenth of a pre-activation in [-48, -12]"
        );
    }
}
