#![allow(dead_code)]

use wengert::Scalar;

fn lit<T: Scalar>(v: f64) -> T {
    T::from_f(<T::Float as num_traits::FromPrimitive>::from_f64(v).unwrap())
}

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock<T: Scalar>(x: &[T]) -> T {
    let one = lit::<T>(1.0);
    let hundred = lit::<T>(100.0);
    let mut sum = T::zero();
    for i in 0..x.len() - 1 {
        let t1 = one - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum = sum + t1 * t1 + hundred * t2 * t2;
    }
    sum
}

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

// ─── Rastrigin ─────────────────────────────────────────────────────────────
// f(x) = 10n + Σ[x_i² - 10·cos(2π·x_i)]

pub fn rastrigin<T: Scalar>(x: &[T]) -> T {
    let ten = lit::<T>(10.0);
    let two_pi = lit::<T>(2.0 * std::f64::consts::PI);
    let mut sum = ten * lit::<T>(x.len() as f64);
    for &xi in x {
        sum = sum + xi * xi - ten * (two_pi * xi).cos();
    }
    sum
}

// ─── Neural Network Layer ──────────────────────────────────────────────────
// y_j = sigmoid(Σ_i w_ji·x_i + b_j), 4 hidden units
// Deterministic weights: w_ji = sin(j*N+i+1) / (N+1), b_j = 0.1*(j+1)

pub fn nn_layer_vec<T: Scalar>(x: &[T]) -> Vec<T> {
    let n = x.len();
    let one = T::one();
    let scale = 1.0 / (n as f64 + 1.0);
    (0..4_usize)
        .map(|j| {
            let mut z = lit::<T>(0.1 * (j as f64 + 1.0));
            for (i, &xi) in x.iter().enumerate() {
                let w = ((j * n + i + 1) as f64).sin() * scale;
                z = z + lit::<T>(w) * xi;
            }
            one / (one + (-z).exp())
        })
        .collect()
}

pub fn nn_layer<T: Scalar>(x: &[T]) -> T {
    nn_layer_vec(x)
        .into_iter()
        .fold(T::zero(), |acc, y| acc + y)
}

// ─── Finite differences ────────────────────────────────────────────────────

pub fn finite_diff_gradient(f: impl Fn(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
    let n = x.len();
    let mut grad = vec![0.0; n];
    for i in 0..n {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        xp[i] += h;
        xm[i] -= h;
        grad[i] = (f(&xp) - f(&xm)) / (2.0 * h);
    }
    grad
}

// ─── Helpers ───────────────────────────────────────────────────────────────

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}

pub fn make_direction(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.1 * (i + 1) as f64).collect()
}
