use crate::dual::Dual;
use crate::error::Result;
use crate::float::Float;
use crate::reverse::Reverse;
use crate::tape::{Tape, TapeGuard, TapeThreadLocal};

/// Record `f` at `x` on a fresh tape that stays active while the guard lives.
fn record<F: TapeThreadLocal, R>(
    f: impl FnOnce(&[Reverse<F>]) -> R,
    x: &[F],
) -> Result<(TapeGuard<F>, Vec<Reverse<F>>, R)> {
    let tape = Tape::with_capacity(x.len() * 10);
    let guard = tape.scoped()?;
    let mut inputs: Vec<Reverse<F>> = x.iter().map(|&v| Reverse::new(v)).collect();
    guard.register_inputs(&mut inputs)?;
    guard.new_recording();
    let out = f(&inputs);
    Ok((guard, inputs, out))
}

/// Compute the gradient of a scalar function `f : R^n → R` using reverse mode.
///
/// The function is recorded on a private tape, so the calling thread must not
/// have an active tape of the same precision.
///
/// ```
/// let g = wengert::grad(|x: &[wengert::Reverse<f64>]| {
///     x[0] * x[0] + x[1] * x[1]
/// }, &[3.0, 4.0]).unwrap();
/// assert!((g[0] - 6.0).abs() < 1e-10);
/// assert!((g[1] - 8.0).abs() < 1e-10);
/// ```
pub fn grad<F: TapeThreadLocal>(
    f: impl FnOnce(&[Reverse<F>]) -> Reverse<F>,
    x: &[F],
) -> Result<Vec<F>> {
    let (tape, inputs, mut output) = record(f, x)?;
    tape.register_output(&mut output)?;
    tape.set_derivative(&output, F::one())?;
    tape.compute_adjoints()?;
    inputs.iter().map(|xi| tape.derivative(xi)).collect()
}

/// Jacobian-vector product (forward mode): `(f(x), J·v)`.
///
/// Evaluates `f` at `x` and computes the directional derivative in direction `v`.
pub fn jvp<F: Float>(f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>, x: &[F], v: &[F]) -> (Vec<F>, Vec<F>) {
    assert_eq!(x.len(), v.len(), "x and v must have the same length");
    let inputs: Vec<Dual<F>> = x
        .iter()
        .zip(v.iter())
        .map(|(&xi, &vi)| Dual::new(xi, vi))
        .collect();
    let outputs = f(&inputs);
    let values = outputs.iter().map(|d| d.re).collect();
    let tangents = outputs.iter().map(|d| d.eps).collect();
    (values, tangents)
}

/// Vector-Jacobian product (reverse mode): `(f(x), wᵀ·J)`.
///
/// Output weights are accumulated, so an output returned twice counts twice.
pub fn vjp<F: TapeThreadLocal>(
    f: impl FnOnce(&[Reverse<F>]) -> Vec<Reverse<F>>,
    x: &[F],
    w: &[F],
) -> Result<(Vec<F>, Vec<F>)> {
    let (tape, inputs, mut outputs) = record(f, x)?;
    assert_eq!(
        outputs.len(),
        w.len(),
        "output length must match weight vector length"
    );

    let values: Vec<F> = outputs.iter().map(|r| r.value()).collect();
    if outputs.is_empty() {
        return Ok((values, vec![F::zero(); x.len()]));
    }

    tape.register_outputs(&mut outputs)?;
    for (out, &wi) in outputs.iter().zip(w) {
        tape.increment_adjoint(out.slot(), wi)?;
    }
    tape.compute_adjoints()?;

    let grad = inputs
        .iter()
        .map(|xi| tape.derivative(xi))
        .collect::<Result<Vec<F>>>()?;
    Ok((values, grad))
}

/// Compute the full Jacobian of `f : R^n → R^m` using forward mode.
///
/// Returns `(f(x), J)` where `J[i][j] = ∂f_i/∂x_j`.
pub fn jacobian<F: Float>(
    f: impl Fn(&[Dual<F>]) -> Vec<Dual<F>>,
    x: &[F],
) -> (Vec<F>, Vec<Vec<F>>) {
    let n = x.len();

    // Value pass, also fixes the output dimension.
    let const_inputs: Vec<Dual<F>> = x.iter().map(|&xi| Dual::constant(xi)).collect();
    let const_outputs = f(&const_inputs);
    let m = const_outputs.len();
    let values: Vec<F> = const_outputs.iter().map(|d| d.re).collect();

    // One forward pass per input variable.
    let mut jac = vec![vec![F::zero(); n]; m];
    for j in 0..n {
        let inputs: Vec<Dual<F>> = x
            .iter()
            .enumerate()
            .map(|(k, &xi)| {
                if k == j {
                    Dual::variable(xi)
                } else {
                    Dual::constant(xi)
                }
            })
            .collect();
        let outputs = f(&inputs);
        for (row, out) in jac.iter_mut().zip(outputs.iter()) {
            row[j] = out.eps;
        }
    }

    (values, jac)
}

/// Compute the full Jacobian of `f : R^n → R^m` using reverse mode.
///
/// `f` is recorded once; each row is one reverse sweep over the same
/// recording, with the adjoints cleared in between.
///
/// ```
/// let (y, j) = wengert::jacobian_reverse(|x: &[wengert::Reverse<f64>]| {
///     vec![x[0] * x[1], x[0] + x[1]]
/// }, &[2.0, 5.0]).unwrap();
/// assert_eq!(y, vec![10.0, 7.0]);
/// assert_eq!(j, vec![vec![5.0, 2.0], vec![1.0, 1.0]]);
/// ```
pub fn jacobian_reverse<F: TapeThreadLocal>(
    f: impl FnOnce(&[Reverse<F>]) -> Vec<Reverse<F>>,
    x: &[F],
) -> Result<(Vec<F>, Vec<Vec<F>>)> {
    let (tape, inputs, mut outputs) = record(f, x)?;
    let values: Vec<F> = outputs.iter().map(|r| r.value()).collect();
    tape.register_outputs(&mut outputs)?;

    let mut jac = Vec::with_capacity(outputs.len());
    for out in &outputs {
        tape.clear_derivatives();
        tape.set_derivative(out, F::one())?;
        tape.compute_adjoints()?;
        let row = inputs
            .iter()
            .map(|xi| tape.derivative(xi))
            .collect::<Result<Vec<F>>>()?;
        jac.push(row);
    }

    log::trace!(
        "reverse jacobian: {} rows over {} statements",
        jac.len(),
        tape.num_statements()
    );
    Ok((values, jac))
}
