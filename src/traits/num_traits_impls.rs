use std::num::FpCategory;

use num_traits::{
    Float as NumFloat, FloatConst, FromPrimitive, Num, NumCast, One, Signed, ToPrimitive, Zero,
};

use crate::dual::Dual;
use crate::elemental::{Binary, Unary};
use crate::float::Float;
use crate::reverse::Reverse;
use crate::tape::TapeThreadLocal;

// Both AD types route every function through the shared rule table, so one
// macro covers them. `$lift` builds a passive value from a plain float.

macro_rules! float_consts {
    ($lift:path; $($name:ident),* $(,)?) => {
        $( fn $name() -> Self { $lift(F::$name()) } )*
    };
}

macro_rules! impl_num_traits {
    ([$($bound:tt)*] $t:ident, $lift:path) => {
        impl<F: $($bound)*> Zero for $t<F> {
            #[inline]
            fn zero() -> Self {
                $lift(F::zero())
            }
            #[inline]
            fn is_zero(&self) -> bool {
                self.value().is_zero()
            }
        }

        impl<F: $($bound)*> One for $t<F> {
            #[inline]
            fn one() -> Self {
                $lift(F::one())
            }
        }

        impl<F: $($bound)*> Num for $t<F> {
            type FromStrRadixErr = F::FromStrRadixErr;
            fn from_str_radix(str: &str, radix: u32) -> Result<Self, Self::FromStrRadixErr> {
                F::from_str_radix(str, radix).map($lift)
            }
        }

        impl<F: $($bound)*> FromPrimitive for $t<F> {
            #[inline]
            fn from_i64(n: i64) -> Option<Self> {
                F::from_i64(n).map($lift)
            }
            #[inline]
            fn from_u64(n: u64) -> Option<Self> {
                F::from_u64(n).map($lift)
            }
            #[inline]
            fn from_f32(n: f32) -> Option<Self> {
                F::from_f32(n).map($lift)
            }
            #[inline]
            fn from_f64(n: f64) -> Option<Self> {
                F::from_f64(n).map($lift)
            }
        }

        impl<F: $($bound)*> ToPrimitive for $t<F> {
            #[inline]
            fn to_i64(&self) -> Option<i64> {
                self.value().to_i64()
            }
            #[inline]
            fn to_u64(&self) -> Option<u64> {
                self.value().to_u64()
            }
            #[inline]
            fn to_f32(&self) -> Option<f32> {
                self.value().to_f32()
            }
            #[inline]
            fn to_f64(&self) -> Option<f64> {
                self.value().to_f64()
            }
        }

        impl<F: $($bound)*> NumCast for $t<F> {
            #[inline]
            fn from<T: ToPrimitive>(n: T) -> Option<Self> {
                <F as NumCast>::from(n).map($lift)
            }
        }

        impl<F: $($bound)*> Signed for $t<F> {
            #[inline]
            fn abs(&self) -> Self {
                self.unary(Unary::Abs)
            }
            #[inline]
            fn abs_sub(&self, other: &Self) -> Self {
                if self.value() > other.value() {
                    *self - *other
                } else {
                    Self::zero()
                }
            }
            #[inline]
            fn signum(&self) -> Self {
                self.unary(Unary::Signum)
            }
            #[inline]
            fn is_positive(&self) -> bool {
                self.value().is_sign_positive()
            }
            #[inline]
            fn is_negative(&self) -> bool {
                self.value().is_sign_negative()
            }
        }

        #[allow(non_snake_case)]
        impl<F: $($bound)*> FloatConst for $t<F> {
            float_consts!(
                $lift;
                E, FRAC_1_PI, FRAC_1_SQRT_2, FRAC_2_PI, FRAC_2_SQRT_PI, FRAC_PI_2, FRAC_PI_3,
                FRAC_PI_4, FRAC_PI_6, FRAC_PI_8, LN_10, LN_2, LOG10_E, LOG2_E, PI, SQRT_2, TAU,
                LOG10_2, LOG2_10,
            );
        }

        impl<F: $($bound)*> NumFloat for $t<F> {
            fn nan() -> Self { $lift(F::nan()) }
            fn infinity() -> Self { $lift(F::infinity()) }
            fn neg_infinity() -> Self { $lift(F::neg_infinity()) }
            fn neg_zero() -> Self { $lift(F::neg_zero()) }

            fn min_value() -> Self { $lift(F::min_value()) }
            fn min_positive_value() -> Self { $lift(F::min_positive_value()) }
            fn max_value() -> Self { $lift(F::max_value()) }
            fn epsilon() -> Self { $lift(F::epsilon()) }

            fn is_nan(self) -> bool { self.value().is_nan() }
            fn is_infinite(self) -> bool { self.value().is_infinite() }
            fn is_finite(self) -> bool { self.value().is_finite() }
            fn is_normal(self) -> bool { self.value().is_normal() }
            fn is_sign_positive(self) -> bool { self.value().is_sign_positive() }
            fn is_sign_negative(self) -> bool { self.value().is_sign_negative() }
            fn classify(self) -> FpCategory { self.value().classify() }

            fn floor(self) -> Self { self.unary(Unary::Floor) }
            fn ceil(self) -> Self { self.unary(Unary::Ceil) }
            fn round(self) -> Self { self.unary(Unary::Round) }
            fn trunc(self) -> Self { self.unary(Unary::Trunc) }
            fn fract(self) -> Self { self.unary(Unary::Fract) }
            fn abs(self) -> Self { self.unary(Unary::Abs) }
            fn signum(self) -> Self { self.unary(Unary::Signum) }

            fn mul_add(self, a: Self, b: Self) -> Self { self * a + b }

            fn recip(self) -> Self { self.unary(Unary::Recip) }
            fn powi(self, n: i32) -> Self { self.unary(Unary::Powi(n)) }
            fn powf(self, n: Self) -> Self { self.binary(n, Binary::Pow) }
            fn sqrt(self) -> Self { self.unary(Unary::Sqrt) }
            fn cbrt(self) -> Self { self.unary(Unary::Cbrt) }

            fn exp(self) -> Self { self.unary(Unary::Exp) }
            fn exp2(self) -> Self { self.unary(Unary::Exp2) }
            fn exp_m1(self) -> Self { self.unary(Unary::ExpM1) }
            fn ln(self) -> Self { self.unary(Unary::Ln) }
            fn log2(self) -> Self { self.unary(Unary::Log2) }
            fn log10(self) -> Self { self.unary(Unary::Log10) }
            fn ln_1p(self) -> Self { self.unary(Unary::Ln1p) }
            fn log(self, base: Self) -> Self { self.unary(Unary::Ln) / base.unary(Unary::Ln) }

            fn sin(self) -> Self { self.unary(Unary::Sin) }
            fn cos(self) -> Self { self.unary(Unary::Cos) }
            fn tan(self) -> Self { self.unary(Unary::Tan) }
            fn sin_cos(self) -> (Self, Self) { (self.unary(Unary::Sin), self.unary(Unary::Cos)) }
            fn asin(self) -> Self { self.unary(Unary::Asin) }
            fn acos(self) -> Self { self.unary(Unary::Acos) }
            fn atan(self) -> Self { self.unary(Unary::Atan) }
            fn atan2(self, other: Self) -> Self { self.binary(other, Binary::Atan2) }

            fn sinh(self) -> Self { self.unary(Unary::Sinh) }
            fn cosh(self) -> Self { self.unary(Unary::Cosh) }
            fn tanh(self) -> Self { self.unary(Unary::Tanh) }
            fn asinh(self) -> Self { self.unary(Unary::Asinh) }
            fn acosh(self) -> Self { self.unary(Unary::Acosh) }
            fn atanh(self) -> Self { self.unary(Unary::Atanh) }

            fn hypot(self, other: Self) -> Self { self.binary(other, Binary::Hypot) }
            fn copysign(self, sign: Self) -> Self { self.binary(sign, Binary::Copysign) }

            fn max(self, other: Self) -> Self { self.binary(other, Binary::Fmax) }
            fn min(self, other: Self) -> Self { self.binary(other, Binary::Fmin) }

            fn abs_sub(self, other: Self) -> Self {
                if self.value() > other.value() { self - other } else { Self::zero() }
            }

            fn integer_decode(self) -> (u64, i16, i8) { self.value().integer_decode() }

            fn to_degrees(self) -> Self { self.unary(Unary::Degrees) }
            fn to_radians(self) -> Self { self.unary(Unary::Radians) }
        }
    };
}

impl_num_traits!([Float] Dual, Dual::constant);
impl_num_traits!([TapeThreadLocal] Reverse, Reverse::new);
