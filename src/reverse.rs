use std::fmt::{self, Display, LowerExp};
use std::hash::{Hash, Hasher};

use crate::elemental::{Binary, Unary};
use crate::error::{Result, TapeError};
use crate::float::Float;
use crate::tape::{self, Slot, Tape, TapeId, TapeThreadLocal, CONSTANT};

/// Adjoint-mode AD variable.
///
/// A value, a slot and the identity of the tape that slot belongs to. `Copy`
/// because the tape is reached through the thread's active-tape registry, not
/// through this struct. A variable built from a literal is passive until it is
/// registered with [`Tape::register_input`].
#[derive(Clone, Copy, Debug)]
pub struct Reverse<F: Float> {
    pub(crate) value: F,
    pub(crate) slot: Slot,
    pub(crate) tape: TapeId,
}

impl<F: Float> Reverse<F> {
    /// Create an unregistered variable. It does not record until registered.
    #[inline]
    pub fn new(value: F) -> Self {
        Reverse {
            value,
            slot: CONSTANT,
            tape: TapeId::NONE,
        }
    }

    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Raw slot on the owning tape, or [`CONSTANT`] when unregistered.
    #[inline]
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Alias of [`slot`](Self::slot).
    #[inline]
    pub fn get_slot(&self) -> Slot {
        self.slot
    }

    /// Identity of the tape this variable was registered with.
    #[inline]
    pub fn tape_id(&self) -> TapeId {
        self.tape
    }

    #[inline]
    pub fn is_registered(&self) -> bool {
        self.slot != CONSTANT
    }
}

impl<F: TapeThreadLocal> Reverse<F> {
    /// Whether operations on this variable are currently being recorded:
    /// its tape is the active tape and its slot is still live.
    pub fn should_record(&self) -> bool {
        if !self.is_registered() {
            return false;
        }
        tape::with_active_tape(|id, t| t.owns(id, self)).unwrap_or(false)
    }

    /// Adjoint of this variable on the active tape.
    pub fn derivative(&self) -> Result<F> {
        Tape::get_active().ok_or(TapeError::NoTape)?.derivative(self)
    }

    /// Seed the adjoint of this variable on the active tape.
    pub fn set_derivative(&self, value: F) -> Result<()> {
        Tape::get_active()
            .ok_or(TapeError::NoTape)?
            .set_derivative(self, value)
    }

    /// Alias of [`set_derivative`](Self::set_derivative).
    pub fn set_adjoint(&self, value: F) -> Result<()> {
        self.set_derivative(value)
    }

    #[inline]
    pub(crate) fn unary(self, op: Unary) -> Self {
        let (value, d) = op.eval(self.value);
        record_unary(self, value, d)
    }

    #[inline]
    pub(crate) fn binary(self, rhs: Self, op: Binary) -> Self {
        let (value, da, db) = op.eval(self.value, rhs.value);
        record_binary(self, da, rhs, db, value)
    }
}

/// Record `value = f(x)` with local partial `d` if `x` is live on the active tape.
#[inline]
pub(crate) fn record_unary<F: TapeThreadLocal>(x: Reverse<F>, value: F, d: F) -> Reverse<F> {
    if x.slot == CONSTANT {
        return Reverse::new(value);
    }
    tape::with_active_tape(|id, t| match t.operand(id, &x) {
        CONSTANT => Reverse::new(value),
        s => Reverse {
            value,
            slot: t.push_unary(s, d),
            tape: id,
        },
    })
    .unwrap_or_else(|| Reverse::new(value))
}

/// Record a binary result; operands that are passive on the active tape are skipped.
#[inline]
pub(crate) fn record_binary<F: TapeThreadLocal>(
    x: Reverse<F>,
    dx: F,
    y: Reverse<F>,
    dy: F,
    value: F,
) -> Reverse<F> {
    if x.slot == CONSTANT && y.slot == CONSTANT {
        return Reverse::new(value);
    }
    tape::with_active_tape(|id, t| match (t.operand(id, &x), t.operand(id, &y)) {
        (CONSTANT, CONSTANT) => Reverse::new(value),
        (sx, sy) => Reverse {
            value,
            slot: t.push_binary(sx, dx, sy, dy),
            tape: id,
        },
    })
    .unwrap_or_else(|| Reverse::new(value))
}

impl<F: Float> From<F> for Reverse<F> {
    #[inline]
    fn from(value: F) -> Self {
        Reverse::new(value)
    }
}

impl<F: Float> Display for Reverse<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.value, f)
    }
}

impl<F: Float> LowerExp for Reverse<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        LowerExp::fmt(&self.value, f)
    }
}

impl<F: Float> Default for Reverse<F> {
    fn default() -> Self {
        Reverse::new(F::zero())
    }
}

/// Hashes the value only, consistent with `PartialEq`; `-0.0` hashes like `0.0`.
impl<F: Float> Hash for Reverse<F> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let v = if self.value == F::zero() {
            F::zero()
        } else {
            self.value
        };
        v.integer_decode().hash(state);
    }
}
