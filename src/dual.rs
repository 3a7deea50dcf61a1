use std::fmt::{self, Display, LowerExp};
use std::hash::{Hash, Hasher};

use crate::elemental::{Binary, Unary};
use crate::Float;

/// Forward-mode dual number: a value paired with its tangent (derivative).
///
/// `Dual { re, eps }` represents `re + eps·ε` where `ε² = 0`. One seed gives one
/// directional derivative; another direction needs another evaluation.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dual<F: Float> {
    /// Primal (real) value.
    pub re: F,
    /// Tangent (derivative) value.
    pub eps: F,
}

impl<F: Float> Display for Dual<F> {
    /// Formats the value only; format options such as precision apply to it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.re, f)
    }
}

impl<F: Float> LowerExp for Dual<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        LowerExp::fmt(&self.re, f)
    }
}

impl<F: Float> From<F> for Dual<F> {
    #[inline]
    fn from(re: F) -> Self {
        Dual::constant(re)
    }
}

/// Hashes the value only, consistent with `PartialEq`.
impl<F: Float> Hash for Dual<F> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let v = if self.re == F::zero() { F::zero() } else { self.re };
        v.integer_decode().hash(state);
    }
}

/// `eps * d`, except that a zero tangent stays zero even when `d` is not finite.
#[inline]
fn tangent<F: Float>(eps: F, d: F) -> F {
    if eps == F::zero() {
        F::zero()
    } else {
        eps * d
    }
}

impl<F: Float> Dual<F> {
    /// Create a new dual number.
    #[inline]
    pub fn new(re: F, eps: F) -> Self {
        Dual { re, eps }
    }

    /// Create a constant (zero derivative).
    #[inline]
    pub fn constant(re: F) -> Self {
        Dual { re, eps: F::zero() }
    }

    /// Create a variable (unit derivative) for differentiation.
    #[inline]
    pub fn variable(re: F) -> Self {
        Dual { re, eps: F::one() }
    }

    #[inline]
    pub fn value(&self) -> F {
        self.re
    }

    #[inline]
    pub fn derivative(&self) -> F {
        self.eps
    }

    /// Replace the tangent, e.g. to seed a different direction.
    #[inline]
    pub fn set_derivative(&mut self, eps: F) {
        self.eps = eps;
    }

    /// Apply a unary rule: `(f(re), f'(re)·eps)`.
    #[inline]
    pub(crate) fn unary(self, op: Unary) -> Self {
        let (re, d) = op.eval(self.re);
        Dual {
            re,
            eps: tangent(self.eps, d),
        }
    }

    /// Apply a binary rule: `(f(a, b), ∂f/∂a·a.eps + ∂f/∂b·b.eps)`.
    #[inline]
    pub(crate) fn binary(self, rhs: Self, op: Binary) -> Self {
        let (re, da, db) = op.eval(self.re, rhs.re);
        Dual {
            re,
            eps: tangent(self.eps, da) + tangent(rhs.eps, db),
        }
    }

    // ── Powers ──

    #[inline]
    pub fn recip(self) -> Self {
        self.unary(Unary::Recip)
    }

    #[inline]
    pub fn sqrt(self) -> Self {
        self.unary(Unary::Sqrt)
    }

    #[inline]
    pub fn cbrt(self) -> Self {
        self.unary(Unary::Cbrt)
    }

    #[inline]
    pub fn powi(self, n: i32) -> Self {
        self.unary(Unary::Powi(n))
    }

    #[inline]
    pub fn powf(self, n: Self) -> Self {
        self.binary(n, Binary::Pow)
    }

    // ── Exp/Log ──

    #[inline]
    pub fn exp(self) -> Self {
        self.unary(Unary::Exp)
    }

    #[inline]
    pub fn exp2(self) -> Self {
        self.unary(Unary::Exp2)
    }

    #[inline]
    pub fn exp_m1(self) -> Self {
        self.unary(Unary::ExpM1)
    }

    #[inline]
    pub fn ln(self) -> Self {
        self.unary(Unary::Ln)
    }

    #[inline]
    pub fn log2(self) -> Self {
        self.unary(Unary::Log2)
    }

    #[inline]
    pub fn log10(self) -> Self {
        self.unary(Unary::Log10)
    }

    #[inline]
    pub fn ln_1p(self) -> Self {
        self.unary(Unary::Ln1p)
    }

    #[inline]
    pub fn log(self, base: Self) -> Self {
        self.ln() / base.ln()
    }

    // ── Trig ──

    #[inline]
    pub fn sin(self) -> Self {
        self.unary(Unary::Sin)
    }

    #[inline]
    pub fn cos(self) -> Self {
        self.unary(Unary::Cos)
    }

    #[inline]
    pub fn tan(self) -> Self {
        self.unary(Unary::Tan)
    }

    #[inline]
    pub fn sin_cos(self) -> (Self, Self) {
        (self.sin(), self.cos())
    }

    #[inline]
    pub fn asin(self) -> Self {
        self.unary(Unary::Asin)
    }

    #[inline]
    pub fn acos(self) -> Self {
        self.unary(Unary::Acos)
    }

    #[inline]
    pub fn atan(self) -> Self {
        self.unary(Unary::Atan)
    }

    #[inline]
    pub fn atan2(self, other: Self) -> Self {
        self.binary(other, Binary::Atan2)
    }

    // ── Hyperbolic ──

    #[inline]
    pub fn sinh(self) -> Self {
        self.unary(Unary::Sinh)
    }

    #[inline]
    pub fn cosh(self) -> Self {
        self.unary(Unary::Cosh)
    }

    #[inline]
    pub fn tanh(self) -> Self {
        self.unary(Unary::Tanh)
    }

    #[inline]
    pub fn asinh(self) -> Self {
        self.unary(Unary::Asinh)
    }

    #[inline]
    pub fn acosh(self) -> Self {
        self.unary(Unary::Acosh)
    }

    #[inline]
    pub fn atanh(self) -> Self {
        self.unary(Unary::Atanh)
    }

    // ── Special ──

    #[inline]
    pub fn erf(self) -> Self {
        self.unary(Unary::Erf)
    }

    #[inline]
    pub fn erfc(self) -> Self {
        self.unary(Unary::Erfc)
    }

    // ── Misc ──

    #[inline]
    pub fn abs(self) -> Self {
        self.unary(Unary::Abs)
    }

    #[inline]
    pub fn signum(self) -> Self {
        self.unary(Unary::Signum)
    }

    #[inline]
    pub fn floor(self) -> Self {
        self.unary(Unary::Floor)
    }

    #[inline]
    pub fn ceil(self) -> Self {
        self.unary(Unary::Ceil)
    }

    #[inline]
    pub fn round(self) -> Self {
        self.unary(Unary::Round)
    }

    #[inline]
    pub fn trunc(self) -> Self {
        self.unary(Unary::Trunc)
    }

    #[inline]
    pub fn fract(self) -> Self {
        self.unary(Unary::Fract)
    }

    #[inline]
    pub fn mul_add(self, a: Self, b: Self) -> Self {
        self * a + b
    }

    #[inline]
    pub fn hypot(self, other: Self) -> Self {
        self.binary(other, Binary::Hypot)
    }

    /// NaN-ignoring maximum, like `f64::max`.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        self.binary(other, Binary::Fmax)
    }

    /// NaN-ignoring minimum, like `f64::min`.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        self.binary(other, Binary::Fmin)
    }

    #[inline]
    pub fn copysign(self, sign: Self) -> Self {
        self.binary(sign, Binary::Copysign)
    }
}
