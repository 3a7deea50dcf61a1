use std::cmp::Ordering;
use std::ops::{
    Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Rem, RemAssign, Sub, SubAssign,
};

use crate::dual::Dual;
use crate::elemental::{Binary, Unary};
use crate::float::Float;
use crate::reverse::Reverse;
use crate::tape::TapeThreadLocal;

// ──────────────────────────────────────────────
//  Dual<F> operators
// ──────────────────────────────────────────────

impl<F: Float> Add for Dual<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Dual {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl<F: Float> Sub for Dual<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Dual {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl<F: Float> Mul for Dual<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.binary(rhs, Binary::Mul)
    }
}

impl<F: Float> Div for Dual<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        self.binary(rhs, Binary::Div)
    }
}

impl<F: Float> Neg for Dual<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Dual {
            re: -self.re,
            eps: -self.eps,
        }
    }
}

/// `fmod` semantics: the result has the sign of the dividend.
impl<F: Float> Rem for Dual<F> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        self.binary(rhs, Binary::Fmod)
    }
}

// ──────────────────────────────────────────────
//  Reverse<F> operators
// ──────────────────────────────────────────────

impl<F: TapeThreadLocal> Add for Reverse<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.binary(rhs, Binary::Add)
    }
}

impl<F: TapeThreadLocal> Sub for Reverse<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.binary(rhs, Binary::Sub)
    }
}

impl<F: TapeThreadLocal> Mul for Reverse<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.binary(rhs, Binary::Mul)
    }
}

impl<F: TapeThreadLocal> Div for Reverse<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        self.binary(rhs, Binary::Div)
    }
}

impl<F: TapeThreadLocal> Neg for Reverse<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.unary(Unary::Neg)
    }
}

impl<F: TapeThreadLocal> Rem for Reverse<F> {
    type Output = Self;
    #[inline]
    fn rem(self, rhs: Self) -> Self {
        self.binary(rhs, Binary::Fmod)
    }
}

// ──────────────────────────────────────────────
//  Compound assignment
// ──────────────────────────────────────────────

macro_rules! impl_assign_ops {
    ([$($bound:tt)*] $t:ty) => {
        impl<F: $($bound)*> AddAssign for $t {
            #[inline]
            fn add_assign(&mut self, rhs: Self) {
                *self = *self + rhs;
            }
        }

        impl<F: $($bound)*> SubAssign for $t {
            #[inline]
            fn sub_assign(&mut self, rhs: Self) {
                *self = *self - rhs;
            }
        }

        impl<F: $($bound)*> MulAssign for $t {
            #[inline]
            fn mul_assign(&mut self, rhs: Self) {
                *self = *self * rhs;
            }
        }

        impl<F: $($bound)*> DivAssign for $t {
            #[inline]
            fn div_assign(&mut self, rhs: Self) {
                *self = *self / rhs;
            }
        }

        impl<F: $($bound)*> RemAssign for $t {
            #[inline]
            fn rem_assign(&mut self, rhs: Self) {
                *self = *self % rhs;
            }
        }
    };
}

impl_assign_ops!([Float] Dual<F>);
impl_assign_ops!([TapeThreadLocal] Reverse<F>);

// ──────────────────────────────────────────────
//  Mixed ops with primitive floats
// ──────────────────────────────────────────────

// A plain number is lifted to a passive operand, so only the AD side gets a
// partial (on the tape, or in the tangent).
macro_rules! impl_mixed_op {
    ($t:ident, $f:ty, $trait:ident, $method:ident, $assign:ident, $assign_method:ident, $op:expr) => {
        impl $trait<$f> for $t<$f> {
            type Output = $t<$f>;
            #[inline]
            fn $method(self, rhs: $f) -> $t<$f> {
                self.binary($t::from(rhs), $op)
            }
        }

        impl $trait<$t<$f>> for $f {
            type Output = $t<$f>;
            #[inline]
            fn $method(self, rhs: $t<$f>) -> $t<$f> {
                $t::from(self).binary(rhs, $op)
            }
        }

        impl $assign<$f> for $t<$f> {
            #[inline]
            fn $assign_method(&mut self, rhs: $f) {
                *self = self.binary($t::from(rhs), $op);
            }
        }
    };
}

macro_rules! impl_mixed_ops {
    ($t:ident, $f:ty) => {
        impl_mixed_op!($t, $f, Add, add, AddAssign, add_assign, Binary::Add);
        impl_mixed_op!($t, $f, Sub, sub, SubAssign, sub_assign, Binary::Sub);
        impl_mixed_op!($t, $f, Mul, mul, MulAssign, mul_assign, Binary::Mul);
        impl_mixed_op!($t, $f, Div, div, DivAssign, div_assign, Binary::Div);
        impl_mixed_op!($t, $f, Rem, rem, RemAssign, rem_assign, Binary::Fmod);
    };
}

impl_mixed_ops!(Dual, f32);
impl_mixed_ops!(Dual, f64);
impl_mixed_ops!(Reverse, f32);
impl_mixed_ops!(Reverse, f64);

// ──────────────────────────────────────────────
//  Comparisons (by value; derivatives are ignored)
// ──────────────────────────────────────────────

impl<F: Float> PartialEq for Dual<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.re == other.re
    }
}

impl<F: Float> PartialOrd for Dual<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.re.partial_cmp(&other.re)
    }
}

impl<F: Float> PartialEq for Reverse<F> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for Reverse<F> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

macro_rules! impl_mixed_cmp {
    ($t:ident, $f:ty) => {
        impl PartialEq<$f> for $t<$f> {
            #[inline]
            fn eq(&self, other: &$f) -> bool {
                self.value() == *other
            }
        }

        impl PartialEq<$t<$f>> for $f {
            #[inline]
            fn eq(&self, other: &$t<$f>) -> bool {
                *self == other.value()
            }
        }

        impl PartialOrd<$f> for $t<$f> {
            #[inline]
            fn partial_cmp(&self, other: &$f) -> Option<Ordering> {
                self.value().partial_cmp(other)
            }
        }

        impl PartialOrd<$t<$f>> for $f {
            #[inline]
            fn partial_cmp(&self, other: &$t<$f>) -> Option<Ordering> {
                self.partial_cmp(&other.value())
            }
        }
    };
}

impl_mixed_cmp!(Dual, f32);
impl_mixed_cmp!(Dual, f64);
impl_mixed_cmp!(Reverse, f32);
impl_mixed_cmp!(Reverse, f64);
