//! Elementary-function derivative rules.
//!
//! Each rule evaluates a primitive at a point and returns the value together
//! with its local partial derivative(s). Forward mode ([`crate::Dual`])
//! contracts the partials with the operand tangents immediately; adjoint mode
//! ([`crate::Reverse`]) stores them on the tape as multipliers. Both modes go
//! through [`Unary::eval`] / [`Binary::eval`], so the two always agree.
//!
//! Non-smooth primitives use the subgradient conventions below:
//!
//! - rounding (`floor`, `ceil`, `round`, `trunc`, `signum`): derivative 0;
//! - `abs`: `sign(x)`, which is 0 at the origin;
//! - `min`/`max`: the selected operand gets 1, the other 0, a tie splits 0.5/0.5.

use crate::float::Float;

/// Default half-width of the quadratic region used by `smooth_abs`.
pub const DEFAULT_SMOOTHING: f64 = 0.001;

/// Unary primitives.
///
/// `Powi` and `Ldexp` carry their integer argument, which is passive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Unary {
    // ── Arithmetic ──
    Neg,
    Recip,

    // ── Powers ──
    Sqrt,
    Cbrt,
    Powi(i32),

    // ── Exp / Log ──
    Exp,
    Exp2,
    ExpM1,
    Ln,
    Log2,
    Log10,
    Ln1p,

    // ── Trig ──
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,

    // ── Hyperbolic ──
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,

    // ── Special functions ──
    Erf,
    Erfc,

    // ── Angle conversion ──
    Degrees,
    Radians,

    // ── Rounding ──
    Floor,
    Ceil,
    Round,
    Trunc,
    Signum,
    /// `x - trunc(x)`, the fractional part returned by `modf`.
    Fract,

    // ── Sign / scale ──
    Abs,
    /// `x * 2^n`.
    Ldexp(i32),
}

/// Binary primitives. Partials are returned as `(∂/∂a, ∂/∂b)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Binary {
    // ── Arithmetic ──
    Add,
    Sub,
    Mul,
    Div,

    // ── Remainder family ──
    /// Truncated remainder, the semantics of `%` and C `fmod`.
    Fmod,
    /// IEEE remainder (quotient rounded half-to-even).
    Remainder,

    // ── Power / angle / distance ──
    Pow,
    Atan2,
    Hypot,

    // ── Selection ──
    Max,
    Min,
    /// Like `Max`, but a NaN operand loses to the other.
    Fmax,
    /// Like `Min`, but a NaN operand loses to the other.
    Fmin,

    // ── Sign ──
    Copysign,
    Nextafter,

    // ── Smoothed ──
    /// `smooth_abs(a, c)`: `|a|` with a cubic blend on `[-c, c]`.
    SmoothAbs,
}

impl Unary {
    /// Evaluate at `a`. Returns `(f(a), f'(a))`.
    #[inline]
    pub fn eval<F: Float>(self, a: F) -> (F, F) {
        let zero = F::zero();
        let one = F::one();
        match self {
            Unary::Neg => (-a, -one),
            Unary::Recip => {
                let inv = one / a;
                (inv, -inv * inv)
            }

            Unary::Sqrt => {
                let r = a.sqrt();
                (r, F::lit(0.5) / r)
            }
            Unary::Cbrt => {
                let r = a.cbrt();
                (r, one / (F::lit(3.0) * r * r))
            }
            Unary::Powi(0) => (one, zero),
            Unary::Powi(n) => (a.powi(n), F::lit(f64::from(n)) * a.powi(n - 1)),

            Unary::Exp => {
                let r = a.exp();
                (r, r)
            }
            Unary::Exp2 => {
                let r = a.exp2();
                (r, r * F::LN_2())
            }
            Unary::ExpM1 => (a.exp_m1(), a.exp()),
            Unary::Ln => (a.ln(), one / a),
            Unary::Log2 => (a.log2(), one / (a * F::LN_2())),
            Unary::Log10 => (a.log10(), one / (a * F::LN_10())),
            Unary::Ln1p => (a.ln_1p(), one / (one + a)),

            Unary::Sin => (a.sin(), a.cos()),
            Unary::Cos => (a.cos(), -a.sin()),
            Unary::Tan => {
                let c = a.cos();
                (a.tan(), one / (c * c))
            }
            Unary::Asin => (a.asin(), one / (one - a * a).sqrt()),
            Unary::Acos => (a.acos(), -one / (one - a * a).sqrt()),
            Unary::Atan => (a.atan(), one / (one + a * a)),

            Unary::Sinh => (a.sinh(), a.cosh()),
            Unary::Cosh => (a.cosh(), a.sinh()),
            Unary::Tanh => {
                let r = a.tanh();
                (r, one - r * r)
            }
            Unary::Asinh => (a.asinh(), one / (a * a + one).sqrt()),
            Unary::Acosh => (a.acosh(), one / (a * a - one).sqrt()),
            Unary::Atanh => (a.atanh(), one / (one - a * a)),

            Unary::Erf => (Float::erf(a), F::FRAC_2_SQRT_PI() * (-a * a).exp()),
            Unary::Erfc => (Float::erfc(a), -F::FRAC_2_SQRT_PI() * (-a * a).exp()),

            Unary::Degrees => (a.to_degrees(), F::lit(180.0) / F::PI()),
            Unary::Radians => (a.to_radians(), F::PI() / F::lit(180.0)),

            Unary::Floor => (a.floor(), zero),
            Unary::Ceil => (a.ceil(), zero),
            Unary::Round => (a.round(), zero),
            Unary::Trunc => (a.trunc(), zero),
            Unary::Signum => (a.signum(), zero),
            Unary::Fract => (a.fract(), one),

            Unary::Abs => (a.abs(), sign(a)),
            Unary::Ldexp(n) => (Float::ldexp(a, n), Float::ldexp(one, n)),
        }
    }
}

impl Binary {
    /// Evaluate at `(a, b)`. Returns `(f(a, b), ∂f/∂a, ∂f/∂b)`.
    #[inline]
    pub fn eval<F: Float>(self, a: F, b: F) -> (F, F, F) {
        let zero = F::zero();
        let one = F::one();
        let half = F::lit(0.5);
        match self {
            Binary::Add => (a + b, one, one),
            Binary::Sub => (a - b, one, -one),
            Binary::Mul => (a * b, b, a),
            Binary::Div => {
                let inv = one / b;
                (a * inv, inv, -a * inv * inv)
            }

            Binary::Fmod => (a % b, one, -(a / b).trunc()),
            Binary::Remainder => {
                let r = Float::remainder(a, b);
                // a - r is an exact multiple of b, so the quotient rounds exactly
                (r, one, -((a - r) / b).round())
            }

            Binary::Pow => {
                let r = a.powf(b);
                let da = if b == zero { zero } else { b * a.powf(b - one) };
                let db = if r == zero { zero } else { r * a.ln() };
                (r, da, db)
            }
            Binary::Atan2 => {
                let denom = a * a + b * b;
                (a.atan2(b), b / denom, -a / denom)
            }
            Binary::Hypot => {
                let r = a.hypot(b);
                (r, a / r, b / r)
            }

            Binary::Max => {
                let (da, db) = select(b < a, a < b, half);
                (if a < b { b } else { a }, da, db)
            }
            Binary::Min => {
                let (da, db) = select(a < b, b < a, half);
                (if a < b { a } else { b }, da, db)
            }
            Binary::Fmax => {
                let (da, db) = match (a.is_nan(), b.is_nan()) {
                    (true, false) => (zero, one),
                    (false, true) => (one, zero),
                    _ => select(b < a, a < b, half),
                };
                (a.max(b), da, db)
            }
            Binary::Fmin => {
                let (da, db) = match (a.is_nan(), b.is_nan()) {
                    (true, false) => (zero, one),
                    (false, true) => (one, zero),
                    _ => select(a < b, b < a, half),
                };
                (a.min(b), da, db)
            }

            Binary::Copysign => {
                let flip = a.is_sign_negative() != b.is_sign_negative();
                (a.copysign(b), if flip { -one } else { one }, zero)
            }
            Binary::Nextafter => (Float::nextafter(a, b), one, zero),

            Binary::SmoothAbs => smooth_abs(a, b),
        }
    }
}

/// `(a_wins, b_wins)` to partials; a tie gives `half` to both.
#[inline]
fn select<F: Float>(a_wins: bool, b_wins: bool, half: F) -> (F, F) {
    if a_wins {
        (F::one(), F::zero())
    } else if b_wins {
        (F::zero(), F::one())
    } else {
        (half, half)
    }
}

#[inline]
fn sign<F: Float>(a: F) -> F {
    if a > F::zero() {
        F::one()
    } else if a < F::zero() {
        -F::one()
    } else {
        F::zero()
    }
}

/// Outside `[-c, c]` this is `|x|`; inside, a cubic that meets `|x|` with
/// matching value and slope at `±c` and is flat at the origin.
#[inline]
fn smooth_abs<F: Float>(x: F, c: F) -> (F, F, F) {
    let zero = F::zero();
    let one = F::one();
    let two = F::lit(2.0);
    let three = F::lit(3.0);
    let four = F::lit(4.0);
    if x > c {
        return (x, one, zero);
    }
    if x < -c {
        return (-x, -one, zero);
    }
    let c2 = c * c;
    let c3 = c2 * c;
    let x2 = x * x;
    if x < zero {
        (
            x2 * (two / c + x / c2),
            x / c2 * (three * x + four * c),
            -two * x2 * (c + x) / c3,
        )
    } else {
        (
            x2 * (two / c - x / c2),
            -x / c2 * (three * x - four * c),
            -two * x2 * (c - x) / c3,
        )
    }
}
