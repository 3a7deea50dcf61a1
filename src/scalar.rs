//! The [`Scalar`] trait for writing AD-generic numeric code.
//!
//! Functions written as `fn f<T: Scalar>(x: T) -> T` work transparently with plain
//! `f64`, `Dual<f64>` and `Reverse<f64>`.

use std::fmt::{Debug, Display};

use num_traits::FromPrimitive;

use crate::dual::Dual;
use crate::elemental::{Binary, Unary};
use crate::error::Result;
use crate::float::Float;
use crate::reverse::Reverse;
use crate::tape::TapeThreadLocal;

/// The central trait for AD-generic numeric code.
///
/// Implement functions as `fn foo<T: Scalar>(x: T) -> T` and they work
/// with plain `f64`, `Dual<f64>`, and `Reverse<f64>`.
pub trait Scalar:
    num_traits::Float
    + num_traits::FloatConst
    + FromPrimitive
    + Copy
    + Default
    + Debug
    + Display
    + Send
    + 'static
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar (constant, zero derivative).
    fn from_f(val: Self::Float) -> Self;

    /// Extract the primal value.
    fn value(&self) -> Self::Float;

    /// Evaluate a unary primitive from the rule table.
    fn apply_unary(self, op: Unary) -> Self;

    /// Evaluate a binary primitive from the rule table.
    fn apply_binary(self, rhs: Self, op: Binary) -> Self;
}

macro_rules! impl_scalar_primitive {
    ($f:ty) => {
        impl Scalar for $f {
            type Float = $f;

            #[inline]
            fn from_f(val: $f) -> Self {
                val
            }

            #[inline]
            fn value(&self) -> $f {
                *self
            }

            #[inline]
            fn apply_unary(self, op: Unary) -> Self {
                op.eval(self).0
            }

            #[inline]
            fn apply_binary(self, rhs: Self, op: Binary) -> Self {
                op.eval(self, rhs).0
            }
        }
    };
}

impl_scalar_primitive!(f32);
impl_scalar_primitive!(f64);

impl<F: Float> Scalar for Dual<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Dual::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.re
    }

    #[inline]
    fn apply_unary(self, op: Unary) -> Self {
        self.unary(op)
    }

    #[inline]
    fn apply_binary(self, rhs: Self, op: Binary) -> Self {
        self.binary(rhs, op)
    }
}

impl<F: TapeThreadLocal> Scalar for Reverse<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Reverse::new(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }

    #[inline]
    fn apply_unary(self, op: Unary) -> Self {
        self.unary(op)
    }

    #[inline]
    fn apply_binary(self, rhs: Self, op: Binary) -> Self {
        self.binary(rhs, op)
    }
}

/// Scalars that carry a derivative: [`Dual`] and [`Reverse`].
///
/// Plain floats do not implement this, so asking for the derivative of a
/// plain number is a compile error rather than a run-time one.
pub trait Active: Scalar {
    /// Forward tangent, or the adjoint on the active tape.
    fn derivative(&self) -> Result<Self::Float>;
}

impl<F: Float> Active for Dual<F> {
    #[inline]
    fn derivative(&self) -> Result<F> {
        Ok(self.eps)
    }
}

impl<F: TapeThreadLocal> Active for Reverse<F> {
    #[inline]
    fn derivative(&self) -> Result<F> {
        Reverse::derivative(self)
    }
}

/// Underlying value of any scalar; the identity for plain numbers.
#[inline]
pub fn value<T: Scalar>(x: &T) -> T::Float {
    x.value()
}

/// Derivative of an AD scalar.
///
/// For [`Reverse`] this reads the adjoint on the active tape and fails with
/// [`TapeError::NoTape`](crate::TapeError::NoTape) when there is none.
#[inline]
pub fn derivative<T: Active>(x: &T) -> Result<T::Float> {
    x.derivative()
}
