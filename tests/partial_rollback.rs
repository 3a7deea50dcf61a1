//! Rewinding the tape to a recorded position and computing adjoints in pieces.

use approx::assert_relative_eq;
use num_traits::Float;
use wengert::{Reverse, Scalar, Tape, TapeError};

fn evaluate<T: Scalar<Float = f64>>(path: f64, val: T) -> T {
    // derivative = 2 * val * path + exp(val)
    val * val * T::from_f(path) + val.exp()
}

#[test]
fn multi_derivatives_in_loop() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let mut input = Reverse::new(2.0_f64);
    tape.register_input(&mut input).unwrap();
    tape.new_recording();

    let pos = tape.get_position();
    let mut values = Vec::new();
    let mut derivs = Vec::new();
    for p in 1..10 {
        let mut v = p as f64 * input;
        tape.register_output(&mut v).unwrap();
        v.set_derivative(1.0).unwrap();
        tape.compute_adjoints_to(pos).unwrap();
        values.push(v.value());
        derivs.push(input.derivative().unwrap());
        tape.reset_to(pos).unwrap();
        tape.clear_derivatives();
    }

    assert_eq!(values, [2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0, 16.0, 18.0]);
    assert_eq!(derivs, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
}

#[test]
fn multi_derivatives_in_complex_loop() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let mut input = Reverse::new(2.0_f64);
    tape.register_input(&mut input).unwrap();
    tape.new_recording();

    let pos = tape.get_position();
    let x = input.value();
    for p in 0..4 {
        let path = p as f64;
        let vt = evaluate(path, input);
        let mut v = 2.0 * vt;
        // recorded after v but never seeded
        let _unused = v * v;
        tape.register_output(&mut v).unwrap();
        v.set_derivative(1.0).unwrap();
        tape.compute_adjoints_to(pos).unwrap();

        assert_relative_eq!(v.value(), 2.0 * evaluate(path, x), max_relative = 1e-14);
        assert_relative_eq!(
            input.derivative().unwrap(),
            2.0 * (2.0 * x * path + x.exp()),
            max_relative = 1e-14
        );

        tape.reset_to(pos).unwrap();
        tape.clear_derivatives();
    }
}

#[test]
fn multi_derivatives_in_nested_loop() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let mut r = Reverse::new(0.3_f64);
    let mut q = Reverse::new(0.4_f64);
    tape.register_input(&mut r).unwrap();
    tape.register_input(&mut q).unwrap();
    tape.new_recording();

    let (rv, qv) = (r.value(), q.value());
    let sim_position = tape.get_position();
    for p in 0..5 {
        let p = p as f64;
        tape.reset_to(sim_position).unwrap();
        for t in 0..5 {
            let t = t as f64;
            let rpt = q * p * (-r * t).exp();
            let drpt_dq = p * (-rv * t).exp();
            let drpt_dr = qv * p * -t * (-rv * t).exp();

            let tpos = tape.get_position();
            for path in [1.0, 2.0, 3.0, 4.0] {
                let mut v = evaluate(path, rpt);
                let dv_drpt = 2.0 * rpt.value() * path + rpt.value().exp();

                tape.register_output(&mut v).unwrap();
                v.set_derivative(1.0).unwrap();
                tape.compute_adjoints().unwrap();
                let dv_dr = r.derivative().unwrap();
                let dv_dq = q.derivative().unwrap();
                tape.reset_to(tpos).unwrap();
                tape.clear_derivatives();

                assert_relative_eq!(dv_dr, dv_drpt * drpt_dr, max_relative = 1e-12);
                assert_relative_eq!(dv_dq, dv_drpt * drpt_dq, max_relative = 1e-12);
            }
        }
    }
}

#[test]
fn clear_derivatives_after() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let mut x1 = Reverse::new(1.0_f64);
    tape.register_input(&mut x1).unwrap();
    let x2 = 1.2 * x1;
    let pos = tape.get_position();
    let x3 = 1.4 * x2 * x1;
    let mut x4 = x2 + x3;
    tape.register_output(&mut x4).unwrap();
    for x in [x4, x3, x2, x1] {
        x.set_derivative(1.0).unwrap();
    }

    tape.clear_derivatives_after(pos).unwrap();

    assert_eq!(x2.derivative(), Ok(1.0));
    assert_eq!(x1.derivative(), Ok(1.0));
    for x in [x3, x4] {
        let err = x.derivative().unwrap_err();
        assert!(matches!(err, TapeError::SlotOutOfRange { .. }));
        assert_eq!(
            err.to_string(),
            "given derivative slot is out of range - did you register the outputs?"
        );
    }
}

#[test]
fn clear_full_tape_restarts_slots() {
    fn record(tape: &Tape<f64>) -> (f64, f64, f64, [u32; 3]) {
        let mut r = Reverse::new(0.3_f64);
        let mut q = Reverse::new(0.4_f64);
        tape.register_input(&mut r).unwrap();
        tape.register_input(&mut q).unwrap();
        tape.new_recording();
        let mut y = (r + q).exp();
        tape.register_output(&mut y).unwrap();
        y.set_derivative(1.0).unwrap();
        tape.compute_adjoints().unwrap();
        (
            y.value(),
            r.derivative().unwrap(),
            q.derivative().unwrap(),
            [r.slot(), q.slot(), y.slot()],
        )
    }

    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let first = record(&tape);
    tape.clear_all();
    assert_eq!(tape.get_position(), 0);
    assert_eq!(tape.num_variables(), 0);
    let second = record(&tape);

    assert_eq!(first, second);
    assert_relative_eq!(first.1, 0.7_f64.exp(), max_relative = 1e-14);
}

#[test]
fn incremental_sweep_matches_a_single_sweep() {
    fn run(split: bool) -> (f64, f64) {
        let tape = Tape::<f64>::new();
        let _g = tape.scoped().unwrap();
        let mut x = [Reverse::new(0.7_f64), Reverse::new(1.3)];
        tape.register_inputs(&mut x).unwrap();
        tape.new_recording();

        let u = x[0].sin() * x[1];
        let p = tape.get_position();
        let mut y = (u * u + x[0]).ln();
        tape.register_output(&mut y).unwrap();
        y.set_derivative(1.0).unwrap();

        if split {
            tape.compute_adjoints_to(p).unwrap();
        }
        // unrelated work recorded after the first sweep
        let _w = (x[0] * x[1]).exp();
        tape.compute_adjoints().unwrap();

        (x[0].derivative().unwrap(), x[1].derivative().unwrap())
    }

    let (a0, a1) = run(false);
    let (b0, b1) = run(true);
    assert_relative_eq!(a0, b0, max_relative = 1e-14);
    assert_relative_eq!(a1, b1, max_relative = 1e-14);

    let (x0, x1) = (0.7_f64, 1.3_f64);
    let u = x0.sin() * x1;
    let s = u * u + x0;
    assert_relative_eq!(a0, (2.0 * u * x0.cos() * x1 + 1.0) / s, max_relative = 1e-12);
    assert_relative_eq!(a1, 2.0 * u * x0.sin() / s, max_relative = 1e-12);
}

#[test]
fn compute_adjoints_to_keeps_the_recording() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let mut x = Reverse::new(2.0_f64);
    tape.register_input(&mut x).unwrap();
    let mut y = x * x;
    tape.register_output(&mut y).unwrap();
    let end = tape.get_position();
    y.set_derivative(1.0).unwrap();
    tape.compute_adjoints_to(1).unwrap();
    assert_eq!(tape.get_position(), end);
    assert_eq!(x.derivative(), Ok(4.0));
}

#[test]
fn reset_then_clear_matches_a_fresh_recording() {
    fn prefix(tape: &Tape<f64>) -> Reverse<f64> {
        let mut x = Reverse::new(1.5_f64);
        tape.register_input(&mut x).unwrap();
        tape.new_recording();
        x.sin() * x
    }

    let rewound = Tape::<f64>::new();
    {
        let _g = rewound.scoped().unwrap();
        let u = prefix(&rewound);
        let pos = rewound.get_position();
        let mut y = (u * 3.0).tanh() + u;
        rewound.register_output(&mut y).unwrap();
        y.set_derivative(1.0).unwrap();
        rewound.compute_adjoints().unwrap();
        rewound.reset_to(pos).unwrap();
        rewound.clear_derivatives();
    }

    let fresh = Tape::<f64>::new();
    {
        let _g = fresh.scoped().unwrap();
        prefix(&fresh);
    }

    assert_eq!(rewound.status(), fresh.status());
    let _g = rewound.scoped().unwrap();
    for slot in 0..rewound.num_variables() {
        assert_eq!(rewound.derivative(slot), Ok(0.0));
    }
}

#[test]
fn reset_to_current_position_is_a_no_op() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let mut x = Reverse::new(1.0_f64);
    tape.register_input(&mut x).unwrap();
    let _ = x.exp();
    let before = tape.status();
    tape.reset_to(tape.get_position()).unwrap();
    assert_eq!(tape.status(), before);
}

#[test]
fn slots_are_reused_after_a_reset() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let mut x = Reverse::new(1.0_f64);
    tape.register_input(&mut x).unwrap();
    let pos = tape.get_position();
    let first = x * 2.0;
    tape.reset_to(pos).unwrap();
    let second = x * 3.0;
    assert_eq!(first.slot(), second.slot());
}

#[test]
fn released_variables_are_treated_as_constants() {
    let tape = Tape::<f64>::new();
    let _g = tape.scoped().unwrap();
    let mut x = Reverse::new(2.0_f64);
    tape.register_input(&mut x).unwrap();
    let pos = tape.get_position();
    let stale = x * x;
    tape.reset_to(pos).unwrap();
    assert!(!stale.should_record());

    let ops = tape.num_operations();
    let mut y = stale * x;
    assert_eq!(tape.num_operations(), ops + 1);
    tape.register_output(&mut y).unwrap();
    y.set_derivative(1.0).unwrap();
    tape.compute_adjoints().unwrap();
    assert_eq!(x.derivative(), Ok(4.0));
}
