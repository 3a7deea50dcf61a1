//! Value- and derivative-aware math functions.
//!
//! Every function accepts plain floats, [`Dual`] or [`Reverse`] values, and
//! binary functions accept any mixture of one AD type with plain numbers:
//!
//! ```
//! use wengert::{math, Dual};
//!
//! let x = Dual::variable(2.0_f64);
//! let y = math::pow(x, 3.0);
//! assert_eq!(y.re, 8.0);
//! assert_eq!(y.eps, 12.0);
//!
//! assert_eq!(math::pow(2.0_f64, 3.0), 8.0);
//! ```
//!
//! Rounding functions have zero derivative; `min`/`max` credit the selected
//! operand, splitting evenly on a tie. The `smooth_*` family replaces the
//! hard selection with a differentiable blend.

use crate::dual::Dual;
use crate::elemental::{Binary, Unary, DEFAULT_SMOOTHING};
use crate::float::Float;
use crate::reverse::Reverse;
use crate::scalar::Scalar;
use crate::tape::TapeThreadLocal;

/// Brings two operands to a common scalar type.
///
/// Implemented for matching types and for one AD type mixed with its plain
/// float, in either order. Forward and adjoint values never mix.
pub trait Promote<Rhs> {
    type Output: Scalar;

    fn promote(self, rhs: Rhs) -> (Self::Output, Self::Output);
}

impl<T: Scalar> Promote<T> for T {
    type Output = T;

    #[inline]
    fn promote(self, rhs: T) -> (T, T) {
        (self, rhs)
    }
}

impl<F: Float> Promote<F> for Dual<F> {
    type Output = Dual<F>;

    #[inline]
    fn promote(self, rhs: F) -> (Dual<F>, Dual<F>) {
        (self, Dual::constant(rhs))
    }
}

impl<F: Float> Promote<Dual<F>> for F {
    type Output = Dual<F>;

    #[inline]
    fn promote(self, rhs: Dual<F>) -> (Dual<F>, Dual<F>) {
        (Dual::constant(self), rhs)
    }
}

impl<F: TapeThreadLocal> Promote<F> for Reverse<F> {
    type Output = Reverse<F>;

    #[inline]
    fn promote(self, rhs: F) -> (Reverse<F>, Reverse<F>) {
        (self, Reverse::new(rhs))
    }
}

impl<F: TapeThreadLocal> Promote<Reverse<F>> for F {
    type Output = Reverse<F>;

    #[inline]
    fn promote(self, rhs: Reverse<F>) -> (Reverse<F>, Reverse<F>) {
        (Reverse::new(self), rhs)
    }
}

macro_rules! unary_fns {
    ($($(#[$doc:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$doc])*
            #[inline]
            pub fn $name<T: Scalar>(x: T) -> T {
                x.apply_unary($op)
            }
        )*
    };
}

macro_rules! binary_fns {
    ($($(#[$doc:meta])* $name:ident => $op:expr;)*) => {
        $(
            $(#[$doc])*
            #[inline]
            pub fn $name<A: Promote<B>, B>(a: A, b: B) -> A::Output {
                let (a, b) = a.promote(b);
                a.apply_binary(b, $op)
            }
        )*
    };
}

// ── Powers ──

unary_fns! {
    sqrt => Unary::Sqrt;
    cbrt => Unary::Cbrt;
    recip => Unary::Recip;
}

/// `x^n` for an integer exponent.
#[inline]
pub fn powi<T: Scalar>(x: T, n: i32) -> T {
    x.apply_unary(Unary::Powi(n))
}

binary_fns! {
    /// `a^b`. The exponent derivative is zero where the result is zero.
    pow => Binary::Pow;
    hypot => Binary::Hypot;
}

// ── Exp / Log ──

unary_fns! {
    exp => Unary::Exp;
    exp2 => Unary::Exp2;
    expm1 => Unary::ExpM1;
    /// Natural logarithm.
    ln => Unary::Ln;
    /// Natural logarithm, same as [`ln`].
    log => Unary::Ln;
    log2 => Unary::Log2;
    log10 => Unary::Log10;
    log1p => Unary::Ln1p;
}

// ── Trig ──

unary_fns! {
    sin => Unary::Sin;
    cos => Unary::Cos;
    tan => Unary::Tan;
    asin => Unary::Asin;
    acos => Unary::Acos;
    atan => Unary::Atan;
    degrees => Unary::Degrees;
    radians => Unary::Radians;
}

binary_fns! {
    /// Four-quadrant arctangent of `a / b`.
    atan2 => Binary::Atan2;
}

// ── Hyperbolic ──

unary_fns! {
    sinh => Unary::Sinh;
    cosh => Unary::Cosh;
    tanh => Unary::Tanh;
    asinh => Unary::Asinh;
    acosh => Unary::Acosh;
    atanh => Unary::Atanh;
}

// ── Special ──

unary_fns! {
    erf => Unary::Erf;
    erfc => Unary::Erfc;
}

// ── Rounding and sign ──

unary_fns! {
    floor => Unary::Floor;
    ceil => Unary::Ceil;
    trunc => Unary::Trunc;
    round => Unary::Round;
    signum => Unary::Signum;
    /// `|x|`, with derivative 0 at the origin.
    abs => Unary::Abs;
    fabs => Unary::Abs;
}

binary_fns! {
    /// Magnitude of `a` with the sign of `b`.
    copysign => Binary::Copysign;
    nextafter => Binary::Nextafter;
}

// ── Remainders ──

binary_fns! {
    /// Truncated remainder, the sign follows `a`.
    fmod => Binary::Fmod;
    /// IEEE remainder, the quotient rounds to nearest even.
    remainder => Binary::Remainder;
}

// ── Min / Max ──

binary_fns! {
    max => Binary::Max;
    min => Binary::Min;
    /// Like [`max`] but returns the other operand when one is NaN.
    fmax => Binary::Fmax;
    /// Like [`min`] but returns the other operand when one is NaN.
    fmin => Binary::Fmin;
}

// ── Decomposition ──

/// `x * 2^e`.
#[inline]
pub fn ldexp<T: Scalar>(x: T, e: i32) -> T {
    x.apply_unary(Unary::Ldexp(e))
}

/// Split into a mantissa in `[0.5, 1)` and an exponent, `x = m * 2^e`.
///
/// The mantissa carries the derivative `2^-e`; the exponent is an integer.
#[inline]
pub fn frexp<T: Scalar>(x: T) -> (T, i32) {
    let (_, e) = Float::frexp(x.value());
    (x.apply_unary(Unary::Ldexp(-e)), e)
}

/// Split into `(fractional, integral)` parts, both with the sign of `x`.
///
/// The fractional part carries the full derivative.
#[inline]
pub fn modf<T: Scalar>(x: T) -> (T, T) {
    (x.apply_unary(Unary::Fract), x.apply_unary(Unary::Trunc))
}

// ── Smoothed ──

/// Differentiable `|x|` with the default half-width [`DEFAULT_SMOOTHING`].
#[inline]
pub fn smooth_abs<T: Scalar>(x: T) -> T {
    smooth_abs_with(x, <T::Float as Float>::lit(DEFAULT_SMOOTHING))
}

/// `|x|` outside `[-c, c]`, a cubic blend inside that is flat at the origin.
#[inline]
pub fn smooth_abs_with<T: Scalar>(x: T, c: T::Float) -> T {
    x.apply_binary(T::from_f(c), Binary::SmoothAbs)
}

/// Differentiable maximum: `(a + b + smooth_abs(a - b)) / 2`.
#[inline]
pub fn smooth_max<A: Promote<B>, B>(a: A, b: B) -> A::Output {
    smooth_max_with(a, b, lit::<A::Output>(DEFAULT_SMOOTHING))
}

#[inline]
pub fn smooth_max_with<A: Promote<B>, B>(
    a: A,
    b: B,
    c: <A::Output as Scalar>::Float,
) -> A::Output {
    let (a, b) = a.promote(b);
    half::<A::Output>() * (a + b + smooth_abs_with(a - b, c))
}

/// Differentiable minimum: `(a + b - smooth_abs(a - b)) / 2`.
#[inline]
pub fn smooth_min<A: Promote<B>, B>(a: A, b: B) -> A::Output {
    smooth_min_with(a, b, lit::<A::Output>(DEFAULT_SMOOTHING))
}

#[inline]
pub fn smooth_min_with<A: Promote<B>, B>(
    a: A,
    b: B,
    c: <A::Output as Scalar>::Float,
) -> A::Output {
    let (a, b) = a.promote(b);
    half::<A::Output>() * (a + b - smooth_abs_with(a - b, c))
}

#[inline]
fn lit<T: Scalar>(v: f64) -> T::Float {
    <T::Float as Float>::lit(v)
}

#[inline]
fn half<T: Scalar>() -> T {
    T::from_f(lit::<T>(0.5))
}
