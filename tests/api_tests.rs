use approx::assert_relative_eq;
use num_traits::Float;
use wengert::{grad, jacobian, jacobian_reverse, jvp, vjp, Dual, Reverse, Scalar, Tape, TapeError};

fn rosenbrock<T: Scalar>(x: &[T]) -> T {
    let a = T::from_f(<T::Float as num_traits::FromPrimitive>::from_f64(1.0).unwrap());
    let b = T::from_f(<T::Float as num_traits::FromPrimitive>::from_f64(100.0).unwrap());
    let mut sum = T::zero();
    for i in 0..x.len() - 1 {
        let t1 = a - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum = sum + t1 * t1 + b * t2 * t2;
    }
    sum
}

// ── grad ──

#[test]
fn grad_x_squared() {
    let g = grad(|x| x[0] * x[0], &[3.0]).unwrap();
    assert_relative_eq!(g[0], 6.0, max_relative = 1e-12);
}

#[test]
fn grad_sum_of_squares() {
    let g = grad(|x| x[0] * x[0] + x[1] * x[1], &[3.0, 4.0]).unwrap();
    assert_relative_eq!(g[0], 6.0, max_relative = 1e-12);
    assert_relative_eq!(g[1], 8.0, max_relative = 1e-12);
}

#[test]
fn grad_rosenbrock_2d() {
    // df/dx = -2(1-x) - 400x(y-x²), df/dy = 200(y-x²)
    let x = [1.5_f64, 2.0];
    let g = grad(|v| rosenbrock(v), &x).unwrap();
    let expected_dx = -2.0 * (1.0 - x[0]) - 400.0 * x[0] * (x[1] - x[0] * x[0]);
    let expected_dy = 200.0 * (x[1] - x[0] * x[0]);
    assert_relative_eq!(g[0], expected_dx, max_relative = 1e-10);
    assert_relative_eq!(g[1], expected_dy, max_relative = 1e-10);
}

#[test]
fn grad_rosenbrock_at_minimum() {
    let x = vec![1.0; 10];
    let g = grad(|v| rosenbrock(v), &x).unwrap();
    for gi in &g {
        assert!(gi.abs() < 1e-12, "gradient at minimum should be zero, got {}", gi);
    }
}

#[test]
fn grad_matches_forward_mode() {
    let x: Vec<f64> = (0..20).map(|i| 0.5 + 0.03 * i as f64).collect();
    let g = grad(|v| rosenbrock(v), &x).unwrap();
    let (_, jac) = jacobian(|v| vec![rosenbrock(v)], &x);
    assert_eq!(g.len(), 20);
    for (gi, ji) in g.iter().zip(&jac[0]) {
        assert_relative_eq!(*gi, *ji, max_relative = 1e-12);
    }
}

#[test]
fn grad_of_constant_function_is_zero() {
    let g = grad(|_| Reverse::new(4.0), &[1.0, 2.0]).unwrap();
    assert_eq!(g, vec![0.0, 0.0]);
}

#[test]
fn grad_f32() {
    let g = grad(|x| x[0].sin() * x[1], &[1.0_f32, 2.0]).unwrap();
    assert_relative_eq!(g[0], 2.0 * 1.0_f32.cos(), max_relative = 1e-5);
    assert_relative_eq!(g[1], 1.0_f32.sin(), max_relative = 1e-5);
}

#[test]
fn repeated_calls_use_fresh_tapes() {
    let g1 = grad(|x| x[0] * x[1], &[3.0_f64, 5.0]).unwrap();
    let g2 = grad(|x| x[0] * x[1] + x[2] * x[3], &[1.0_f64, 2.0, 3.0, 4.0]).unwrap();
    let g3 = grad(|x| x[0].exp() + x[1].ln(), &[1.0_f64, 2.0]).unwrap();
    assert_eq!(g1, vec![5.0, 3.0]);
    assert_eq!(g2, vec![2.0, 1.0, 4.0, 3.0]);
    assert_relative_eq!(g3[0], 1.0_f64.exp(), max_relative = 1e-12);
    assert_relative_eq!(g3[1], 0.5, max_relative = 1e-12);
    assert!(Tape::<f64>::get_active().is_none());
}

#[test]
fn drivers_refuse_to_shadow_an_active_tape() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    assert_eq!(grad(|x| x[0] * x[0], &[1.0]), Err(TapeError::TapeAlreadyActive));
    assert_eq!(
        vjp(|x| vec![x[0]], &[1.0], &[1.0]),
        Err(TapeError::TapeAlreadyActive)
    );
    assert_eq!(
        jacobian_reverse(|x| vec![x[0]], &[1.0]),
        Err(TapeError::TapeAlreadyActive)
    );
    // the caller's tape is untouched
    assert!(tape.is_active());
    assert_eq!(tape.get_position(), 0);
}

// ── jvp ──

#[test]
fn jvp_linear() {
    // J = [[2, 1], [1, -1]], J·[1, 0] = [2, 1]
    let (vals, tangents) = jvp(
        |x| vec![x[0] + x[0] + x[1], x[0] - x[1]],
        &[3.0, 4.0],
        &[1.0, 0.0],
    );
    assert_relative_eq!(vals[0], 10.0, max_relative = 1e-12);
    assert_relative_eq!(vals[1], -1.0, max_relative = 1e-12);
    assert_relative_eq!(tangents[0], 2.0, max_relative = 1e-12);
    assert_relative_eq!(tangents[1], 1.0, max_relative = 1e-12);
}

#[test]
#[should_panic(expected = "x and v must have the same length")]
fn jvp_length_mismatch_panics() {
    let _ = jvp(|x| x.to_vec(), &[1.0, 2.0], &[1.0]);
}

// ── vjp ──

#[test]
fn vjp_linear() {
    // wᵀ J = [1, 0] · [[2, 1], [1, -1]] = [2, 1]
    let (vals, grad) = vjp(
        |x| vec![x[0] + x[0] + x[1], x[0] - x[1]],
        &[3.0, 4.0],
        &[1.0, 0.0],
    )
    .unwrap();
    assert_relative_eq!(vals[0], 10.0, max_relative = 1e-12);
    assert_relative_eq!(vals[1], -1.0, max_relative = 1e-12);
    assert_relative_eq!(grad[0], 2.0, max_relative = 1e-12);
    assert_relative_eq!(grad[1], 1.0, max_relative = 1e-12);
}

#[test]
fn vjp_repeated_output_counts_twice() {
    let (_, grad) = vjp(
        |x| {
            let y = x[0] * x[1];
            vec![y, y]
        },
        &[3.0, 5.0],
        &[1.0, 2.0],
    )
    .unwrap();
    assert_eq!(grad, vec![15.0, 9.0]);
}

#[test]
fn vjp_with_passive_output() {
    let (vals, grad) = vjp(|x| vec![x[0] * 2.0, Reverse::new(7.0)], &[1.5], &[1.0, 1.0]).unwrap();
    assert_eq!(vals, vec![3.0, 7.0]);
    assert_eq!(grad, vec![2.0]);
}

#[test]
fn vjp_without_outputs() {
    let (vals, grad) = vjp(|_| Vec::new(), &[1.0, 2.0], &[]).unwrap();
    assert!(vals.is_empty());
    assert_eq!(grad, vec![0.0, 0.0]);
}

#[test]
fn jvp_vjp_transpose_consistency() {
    // <J v, w> == <v, wᵀ J>
    let x = [1.5, 2.0];
    let v = [0.7, -0.3];
    let w = [1.2, 0.5];

    let f_fwd = |inp: &[Dual<f64>]| -> Vec<Dual<f64>> {
        vec![inp[0] * inp[1], inp[0].sin() + inp[1].exp()]
    };
    let f_rev = |inp: &[Reverse<f64>]| -> Vec<Reverse<f64>> {
        vec![inp[0] * inp[1], inp[0].sin() + inp[1].exp()]
    };

    let (_, tangents) = jvp(f_fwd, &x, &v);
    let (_, grad) = vjp(f_rev, &x, &w).unwrap();

    let lhs: f64 = tangents.iter().zip(w.iter()).map(|(t, wi)| t * wi).sum();
    let rhs: f64 = v.iter().zip(grad.iter()).map(|(vi, gi)| vi * gi).sum();
    assert_relative_eq!(lhs, rhs, max_relative = 1e-10);
}

// ── jacobian ──

#[test]
fn jacobian_linear() {
    let (vals, jac) = jacobian(|x| vec![x[0] + x[0] + x[1], x[0] - x[1]], &[3.0, 4.0]);
    assert_eq!(vals, vec![10.0, -1.0]);
    assert_eq!(jac, vec![vec![2.0, 1.0], vec![1.0, -1.0]]);
}

#[test]
fn jacobian_nonlinear() {
    // J = [[2 x0, 0], [x1, x0]]
    let (_, jac) = jacobian(|x| vec![x[0] * x[0], x[0] * x[1]], &[3.0, 4.0]);
    assert_relative_eq!(jac[0][0], 6.0, max_relative = 1e-12);
    assert_relative_eq!(jac[0][1], 0.0, epsilon = 1e-14);
    assert_relative_eq!(jac[1][0], 4.0, max_relative = 1e-12);
    assert_relative_eq!(jac[1][1], 3.0, max_relative = 1e-12);
}

#[test]
fn jacobian_reverse_matches_forward() {
    let x = [0.4, 1.7, -0.6];
    let (fv, fj) = jacobian(
        |v| vec![v[0] * v[1].exp(), (v[1] - v[2]).atan(), v[2].powi(3) + v[0]],
        &x,
    );
    let (rv, rj) = jacobian_reverse(
        |v| vec![v[0] * v[1].exp(), (v[1] - v[2]).atan(), v[2].powi(3) + v[0]],
        &x,
    )
    .unwrap();
    assert_eq!(fv, rv);
    for (frow, rrow) in fj.iter().zip(&rj) {
        for (a, b) in frow.iter().zip(rrow) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12, epsilon = 1e-15);
        }
    }
}

#[test]
fn jacobian_reverse_rows_do_not_leak() {
    // Both rows share x0; clearing between sweeps keeps row 2 independent.
    let (_, jac) = jacobian_reverse(|x| vec![x[0] * x[0], x[0] + x[1]], &[3.0, 4.0]).unwrap();
    assert_eq!(jac, vec![vec![6.0, 0.0], vec![1.0, 1.0]]);
}

// ── Scalar trait generic code ──

#[test]
fn scalar_generic_function() {
    fn square<T: Scalar>(x: T) -> T {
        x * x
    }

    assert_relative_eq!(square(3.0_f64), 9.0);

    let d = square(Dual::variable(3.0_f64));
    assert_relative_eq!(d.re, 9.0);
    assert_relative_eq!(d.eps, 6.0);

    let g = grad(|x| square(x[0]), &[3.0]).unwrap();
    assert_relative_eq!(g[0], 6.0);
}
