use std::fmt::{Debug, Display, LowerExp};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Bundles the numeric traits needed by the derivative rules, plus the
/// C math-library functions `std` does not expose (error function, IEEE
/// remainder, mantissa/exponent decomposition). Those are routed to `libm`
/// per precision. Only primitive float types implement this; AD wrapper
/// types do not.
pub trait Float:
    NumFloat
    + FloatConst
    + FromPrimitive
    + Copy
    + Send
    + Sync
    + Default
    + Debug
    + Display
    + LowerExp
    + 'static
{
    /// Gauss error function.
    fn erf(self) -> Self;
    /// Complementary error function, `1 - erf(x)`.
    fn erfc(self) -> Self;
    /// IEEE remainder: `self - n * y` with `n` the quotient rounded half-to-even.
    fn remainder(self, y: Self) -> Self;
    /// Split into a mantissa in `[0.5, 1)` and a power-of-two exponent.
    fn frexp(self) -> (Self, i32);
    /// `self * 2^exp`.
    fn ldexp(self, exp: i32) -> Self;
    /// Next representable value after `self` in the direction of `toward`.
    fn nextafter(self, toward: Self) -> Self;

    /// Lift a small literal. Exact for every constant used by the rule table.
    #[inline]
    fn lit(v: f64) -> Self {
        Self::from_f64(v).unwrap_or_else(Self::nan)
    }
}

impl Float for f32 {
    #[inline]
    fn erf(self) -> Self {
        libm::erff(self)
    }
    #[inline]
    fn erfc(self) -> Self {
        libm::erfcf(self)
    }
    #[inline]
    fn remainder(self, y: Self) -> Self {
        libm::remainderf(self, y)
    }
    #[inline]
    fn frexp(self) -> (Self, i32) {
        libm::frexpf(self)
    }
    #[inline]
    fn ldexp(self, exp: i32) -> Self {
        libm::ldexpf(self, exp)
    }
    #[inline]
    fn nextafter(self, toward: Self) -> Self {
        libm::nextafterf(self, toward)
    }
}

impl Float for f64 {
    #[inline]
    fn erf(self) -> Self {
        libm::erf(self)
    }
    #[inline]
    fn erfc(self) -> Self {
        libm::erfc(self)
    }
    #[inline]
    fn remainder(self, y: Self) -> Self {
        libm::remainder(self, y)
    }
    #[inline]
    fn frexp(self) -> (Self, i32) {
        libm::frexp(self)
    }
    #[inline]
    fn ldexp(self, exp: i32) -> Self {
        libm::ldexp(self, exp)
    }
    #[inline]
    fn nextafter(self, toward: Self) -> Self {
        libm::nextafter(self, toward)
    }
}
