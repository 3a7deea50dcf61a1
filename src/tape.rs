//! Rewindable adjoint tape for reverse-mode AD.
//!
//! The tape is an Adept-style two-stack Wengert list: every statement owns one
//! freshly allocated slot (`lhs_index`) and a contiguous run of
//! `(multiplier, operand slot)` pairs holding the local partials recorded at
//! evaluation time. Input and output registrations are statements with no
//! operands. The reverse sweep is a single multiply-accumulate loop with
//! zero-adjoint skipping.
//!
//! A position is a statement count. Because slots are allocated one per
//! statement in order, truncating the statement log to a position also fixes
//! the number of live slots, which is what makes [`Tape::reset_to`] and
//! [`Tape::clear_derivatives_after`] cheap.
//!
//! At most one tape per float precision is active on a thread. The registry
//! holds a weak reference only: dropping the last [`Tape`] handle deactivates it.
//!
//! A [`CheckpointCallback`] inserted while recording marks a position where the
//! reverse sweep hands control to user code. The callback typically replays a
//! segment that was run passively in the forward pass, records it on the same
//! tape, sweeps it and pushes the result into the segment's input adjoints.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::LocalKey;

use crate::error::{Result, TapeError};
use crate::float::Float;
use crate::reverse::Reverse;

/// Index into a tape's derivative storage.
pub type Slot = u32;

/// Number of statements recorded on a tape.
pub type Position = u32;

/// Slot value of a variable that is not recorded on any tape.
pub const CONSTANT: Slot = u32::MAX;

/// Identity of a tape instance. Variables keep this instead of a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TapeId(u64);

impl TapeId {
    /// Id carried by variables that were never registered.
    pub const NONE: TapeId = TapeId(0);

    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TapeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A recorded statement: its result lives at `lhs_index`, and its operands'
/// multipliers/indices span `[prev.end_plus_one .. self.end_plus_one)`.
#[derive(Clone, Copy, Debug)]
struct Statement {
    lhs_index: u32,
    end_plus_one: u32,
}

/// Mutable state behind a [`Tape`] handle.
pub(crate) struct TapeData<F: Float> {
    statements: Vec<Statement>,
    multipliers: Vec<F>,
    indices: Vec<u32>,
    /// Adjoints. Its length is the bound for derivative reads and writes and
    /// never exceeds `num_slots`.
    derivatives: Vec<F>,
    num_slots: u32,
    baseline: Position,
    derivatives_initialized: bool,
    /// Set once a stale operand has been reported; cleared by truncation.
    stale_reported: bool,
}

impl<F: Float> TapeData<F> {
    fn with_capacity(est_ops: usize) -> Self {
        let mut statements = Vec::with_capacity(est_ops + 1);
        // Sentinel statement at index 0 so that `statements[i-1].end_plus_one`
        // is always valid for i >= 1.
        statements.push(Statement {
            lhs_index: CONSTANT,
            end_plus_one: 0,
        });
        TapeData {
            statements,
            multipliers: Vec::with_capacity(est_ops * 2),
            indices: Vec::with_capacity(est_ops * 2),
            derivatives: Vec::with_capacity(est_ops),
            num_slots: 0,
            baseline: 0,
            derivatives_initialized: false,
            stale_reported: false,
        }
    }

    #[inline]
    fn position(&self) -> Position {
        (self.statements.len() - 1) as Position
    }

    /// Number of slots allocated by the first `pos` statements.
    #[inline]
    fn slots_at(&self, pos: Position) -> u32 {
        if pos == 0 {
            0
        } else {
            self.statements[pos as usize].lhs_index + 1
        }
    }

    fn check_position(&self, pos: Position) -> Result<()> {
        let current = self.position();
        if pos > current {
            return Err(TapeError::PositionOutOfRange {
                position: pos,
                current,
            });
        }
        Ok(())
    }

    fn check_slot(&self, slot: Slot) -> Result<usize> {
        let len = self.derivatives.len();
        if (slot as usize) < len {
            Ok(slot as usize)
        } else {
            Err(TapeError::SlotOutOfRange {
                slot,
                len: len as u32,
            })
        }
    }

    /// Resolve `at` to an index into the derivative storage of tape `id`.
    ///
    /// A variable registered elsewhere is rejected with its own slot in the
    /// error, whatever the length of this tape's storage.
    fn resolve(&self, id: TapeId, at: &impl AsSlot<F>) -> Result<usize> {
        let slot = at.raw_slot();
        if !at.lives_on(id) {
            return Err(TapeError::SlotOutOfRange {
                slot,
                len: self.derivatives.len() as u32,
            });
        }
        self.check_slot(slot)
    }

    /// Slot to record for operand `x` on tape `id`, or [`CONSTANT`] when `x`
    /// is passive here.
    ///
    /// The first stale operand after a truncation is reported at `warn`, the
    /// rest at `trace`.
    #[inline]
    pub(crate) fn operand(&mut self, id: TapeId, x: &Reverse<F>) -> Slot {
        if x.slot == CONSTANT || x.tape != id {
            return CONSTANT;
        }
        if x.slot >= self.num_slots {
            if self.stale_reported {
                log::trace!("tape {id}: stale operand slot {}", x.slot);
            } else {
                self.stale_reported = true;
                log::warn!(
                    "tape {id}: operand slot {} was released by a reset, treating it as a constant",
                    x.slot
                );
            }
            return CONSTANT;
        }
        x.slot
    }

    /// Whether `x` names a live slot on tape `id`.
    #[inline]
    pub(crate) fn owns(&self, id: TapeId, x: &Reverse<F>) -> bool {
        x.tape == id && x.slot != CONSTANT && x.slot < self.num_slots
    }

    #[inline]
    fn allocate(&mut self) -> Slot {
        let slot = self.num_slots;
        self.num_slots += 1;
        if self.derivatives.len() < self.num_slots as usize {
            self.derivatives.resize(self.num_slots as usize, F::zero());
        }
        slot
    }

    #[inline]
    fn close_statement(&mut self, lhs_index: Slot) {
        self.statements.push(Statement {
            lhs_index,
            end_plus_one: self.multipliers.len() as u32,
        });
    }

    /// Record a registration: a fresh slot with no operands.
    pub(crate) fn push_leaf(&mut self) -> Slot {
        let slot = self.allocate();
        self.close_statement(slot);
        slot
    }

    /// Record `result = f(operand)` with `multiplier = df/d(operand)`.
    #[inline]
    pub(crate) fn push_unary(&mut self, operand: Slot, multiplier: F) -> Slot {
        let slot = self.allocate();
        self.multipliers.push(multiplier);
        self.indices.push(operand);
        self.close_statement(slot);
        slot
    }

    /// Record a binary operation. Either operand may be [`CONSTANT`], but not both.
    #[inline]
    pub(crate) fn push_binary(&mut self, lhs: Slot, lhs_mult: F, rhs: Slot, rhs_mult: F) -> Slot {
        let slot = self.allocate();
        if lhs != CONSTANT {
            self.multipliers.push(lhs_mult);
            self.indices.push(lhs);
        }
        if rhs != CONSTANT {
            self.multipliers.push(rhs_mult);
            self.indices.push(rhs);
        }
        self.close_statement(slot);
        slot
    }

    /// Propagate adjoints through statements `(to, from]`, newest first.
    ///
    /// The adjoint of each consumed operation result is zeroed, so a later
    /// sweep over the same statements only propagates new contributions.
    /// Registrations carry no operands and keep their adjoints.
    fn sweep(&mut self, from: Position, to: Position) {
        let zero = F::zero();
        for i in ((to as usize + 1)..=(from as usize)).rev() {
            let stmt = self.statements[i];
            let start = self.statements[i - 1].end_plus_one as usize;
            let end = stmt.end_plus_one as usize;
            if start == end {
                continue;
            }
            let lhs = stmt.lhs_index as usize;
            let a = match self.derivatives.get(lhs) {
                Some(&a) => a,
                None => continue,
            };
            if a == zero {
                continue;
            }
            self.derivatives[lhs] = zero;
            for j in start..end {
                let k = self.indices[j] as usize;
                self.derivatives[k] = self.derivatives[k] + self.multipliers[j] * a;
            }
        }
    }

    fn truncate(&mut self, pos: Position) {
        let ops_end = self.statements[pos as usize].end_plus_one as usize;
        self.num_slots = self.slots_at(pos);
        self.statements.truncate(pos as usize + 1);
        self.multipliers.truncate(ops_end);
        self.indices.truncate(ops_end);
        self.derivatives.truncate(self.num_slots as usize);
        self.baseline = self.baseline.min(pos);
        self.stale_reported = false;
    }

    fn zero_derivatives(&mut self) {
        self.derivatives.clear();
        self.derivatives.resize(self.num_slots as usize, F::zero());
    }

    fn memory(&self) -> usize {
        mem::size_of::<F>() * (self.multipliers.len() + self.derivatives.len())
            + mem::size_of::<u32>() * (self.indices.len() + 2 * self.statements.len())
    }
}

/// Counters describing a tape, as reported by [`Tape::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TapeStatus {
    /// Recorded statements (operations and registrations).
    pub statements: u32,
    /// Stored `(multiplier, operand)` pairs.
    pub operations: u32,
    /// Allocated slots.
    pub variables: u32,
    /// Length of the derivative storage.
    pub derivatives: u32,
    pub position: Position,
    pub baseline: Position,
    /// Bytes held by the tape's stacks.
    pub memory: usize,
}

impl fmt::Display for TapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statements: {}, operations: {}, variables: {}, derivatives: {}, \
             position: {} (baseline {}), memory: {} bytes",
            self.statements,
            self.operations,
            self.variables,
            self.derivatives,
            self.position,
            self.baseline,
            self.memory
        )
    }
}

/// User code run by the reverse sweep at the position it was inserted.
///
/// When [`Tape::compute_adjoints_to`] reaches the marker, everything recorded
/// after it has been swept and the tape has been reset to just before it. The
/// callback may record on `tape`, sweep what it recorded with
/// [`Tape::compute_adjoints_to`] and accumulate into earlier slots with
/// [`Tape::increment_adjoint`]. Anything it records is discarded afterwards.
///
/// Closures `FnMut(&Tape<F>) -> Result<()>` implement this trait.
pub trait CheckpointCallback<F: TapeThreadLocal> {
    fn compute_adjoint(&mut self, tape: &Tape<F>) -> Result<()>;
}

impl<F, C> CheckpointCallback<F> for C
where
    F: TapeThreadLocal,
    C: FnMut(&Tape<F>) -> Result<()>,
{
    fn compute_adjoint(&mut self, tape: &Tape<F>) -> Result<()> {
        self(tape)
    }
}

/// Inserted callbacks with their marker positions, in ascending order.
type Checkpoints<F> = Vec<(Position, Box<dyn CheckpointCallback<F>>)>;

struct TapeInner<F: TapeThreadLocal> {
    id: TapeId,
    data: RefCell<TapeData<F>>,
    // Kept apart from `data` so a running callback can use the tape.
    checkpoints: RefCell<Checkpoints<F>>,
}

impl<F: TapeThreadLocal> Drop for TapeInner<F> {
    fn drop(&mut self) {
        // The registry may already be gone during thread teardown.
        let _ = F::registry().try_with(|cell| {
            if let Ok(mut active) = cell.try_borrow_mut() {
                if active.as_ref().map(|a| a.id) == Some(self.id) {
                    *active = None;
                    log::debug!("tape {} dropped while active", self.id);
                }
            }
        });
    }
}

/// Registry entry for the active tape of one precision on one thread.
pub struct ActiveTape<F: TapeThreadLocal> {
    id: TapeId,
    tape: Weak<TapeInner<F>>,
}

thread_local! {
    static ACTIVE_F32: RefCell<Option<ActiveTape<f32>>> = const { RefCell::new(None) };
    static ACTIVE_F64: RefCell<Option<ActiveTape<f64>>> = const { RefCell::new(None) };
}

/// Trait to select the correct thread-local registry for a given float type.
pub trait TapeThreadLocal: Float {
    fn registry() -> &'static LocalKey<RefCell<Option<ActiveTape<Self>>>>;
}

impl TapeThreadLocal for f32 {
    fn registry() -> &'static LocalKey<RefCell<Option<ActiveTape<Self>>>> {
        &ACTIVE_F32
    }
}

impl TapeThreadLocal for f64 {
    fn registry() -> &'static LocalKey<RefCell<Option<ActiveTape<Self>>>> {
        &ACTIVE_F64
    }
}

fn active_inner<F: TapeThreadLocal>() -> Option<Rc<TapeInner<F>>> {
    F::registry()
        .try_with(|cell| cell.borrow().as_ref().and_then(|a| a.tape.upgrade()))
        .ok()
        .flatten()
}

fn active_id<F: TapeThreadLocal>() -> Option<TapeId> {
    F::registry()
        .try_with(|cell| cell.borrow().as_ref().map(|a| a.id))
        .ok()
        .flatten()
}

/// Run `f` against the active tape of this thread, or return `None` when no
/// tape is active.
#[inline]
pub(crate) fn with_active_tape<F: TapeThreadLocal, R>(
    f: impl FnOnce(TapeId, &mut TapeData<F>) -> R,
) -> Option<R> {
    let inner = active_inner::<F>()?;
    let mut data = inner.data.borrow_mut();
    Some(f(inner.id, &mut data))
}

/// Anything that names a derivative slot: a raw [`Slot`] or a variable.
pub trait AsSlot<F: Float> {
    /// The slot as given, without regard to which tape it belongs to.
    fn raw_slot(&self) -> Slot;

    /// Whether the slot may be looked up on tape `tape`. Raw slots always can.
    fn lives_on(&self, _tape: TapeId) -> bool {
        true
    }
}

impl<F: Float> AsSlot<F> for Slot {
    #[inline]
    fn raw_slot(&self) -> Slot {
        *self
    }
}

impl<F: Float> AsSlot<F> for Reverse<F> {
    #[inline]
    fn raw_slot(&self) -> Slot {
        self.slot
    }

    #[inline]
    fn lives_on(&self, tape: TapeId) -> bool {
        self.tape == tape
    }
}

impl<F: Float, T: AsSlot<F> + ?Sized> AsSlot<F> for &T {
    #[inline]
    fn raw_slot(&self) -> Slot {
        (**self).raw_slot()
    }

    #[inline]
    fn lives_on(&self, tape: TapeId) -> bool {
        (**self).lives_on(tape)
    }
}

/// Handle to an adjoint tape.
///
/// Cloning the handle shares the tape. Handles are neither `Send` nor `Sync`:
/// a tape lives and dies on the thread that created it.
pub struct Tape<F: TapeThreadLocal> {
    inner: Rc<TapeInner<F>>,
}

impl<F: TapeThreadLocal> Clone for Tape<F> {
    fn clone(&self) -> Self {
        Tape {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<F: TapeThreadLocal> PartialEq for Tape<F> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<F: TapeThreadLocal> Eq for Tape<F> {}

impl<F: TapeThreadLocal> fmt::Debug for Tape<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape")
            .field("id", &self.inner.id)
            .field("status", &self.snapshot())
            .finish()
    }
}

impl<F: TapeThreadLocal> Default for Tape<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: TapeThreadLocal> Tape<F> {
    /// Create an empty, inactive tape.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an inactive tape with room for about `est_ops` operations.
    pub fn with_capacity(est_ops: usize) -> Self {
        Tape {
            inner: Rc::new(TapeInner {
                id: TapeId::fresh(),
                data: RefCell::new(TapeData::with_capacity(est_ops)),
                checkpoints: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> TapeId {
        self.inner.id
    }

    #[inline]
    fn data(&self) -> Ref<'_, TapeData<F>> {
        self.inner.data.borrow()
    }

    #[inline]
    fn data_mut(&self) -> RefMut<'_, TapeData<F>> {
        self.inner.data.borrow_mut()
    }

    // ── Activation ──

    /// Make this the active tape of the current thread.
    ///
    /// Fails with [`TapeError::TapeAlreadyActive`] if any tape of this
    /// precision is already active, including this one.
    pub fn activate(&self) -> Result<()> {
        F::registry().with(|cell| {
            let mut active = cell.borrow_mut();
            if active.as_ref().is_some_and(|a| a.tape.strong_count() > 0) {
                return Err(TapeError::TapeAlreadyActive);
            }
            *active = Some(ActiveTape {
                id: self.inner.id,
                tape: Rc::downgrade(&self.inner),
            });
            log::debug!("tape {} activated", self.inner.id);
            Ok(())
        })
    }

    /// Release the current thread's active-tape slot.
    ///
    /// Fails with [`TapeError::InactiveTape`] if this tape is not the active one.
    pub fn deactivate(&self) -> Result<()> {
        F::registry().with(|cell| {
            let mut active = cell.borrow_mut();
            if active.as_ref().map(|a| a.id) != Some(self.inner.id) {
                return Err(self.inactive());
            }
            *active = None;
            log::debug!("tape {} deactivated", self.inner.id);
            Ok(())
        })
    }

    /// Whether this tape is the active tape of the current thread.
    pub fn is_active(&self) -> bool {
        active_id::<F>() == Some(self.inner.id)
    }

    /// The current thread's active tape, if any.
    pub fn get_active() -> Option<Tape<F>> {
        active_inner::<F>().map(|inner| Tape { inner })
    }

    /// Activate for the lifetime of the returned guard.
    pub fn scoped(&self) -> Result<TapeGuard<F>> {
        TapeGuard::new(self)
    }

    fn inactive(&self) -> TapeError {
        TapeError::InactiveTape {
            id: self.inner.id.get(),
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(self.inactive())
        }
    }

    // ── Registration ──

    /// Bind `x` to a fresh slot on this tape. The tape must be active.
    ///
    /// Registering an already registered variable allocates a new slot; the
    /// old one is never reused.
    pub fn register_input(&self, x: &mut Reverse<F>) -> Result<()> {
        self.ensure_active()?;
        x.slot = self.data_mut().push_leaf();
        x.tape = self.inner.id;
        Ok(())
    }

    pub fn register_inputs(&self, xs: &mut [Reverse<F>]) -> Result<()> {
        self.ensure_active()?;
        let mut data = self.data_mut();
        for x in xs {
            x.slot = data.push_leaf();
            x.tape = self.inner.id;
        }
        Ok(())
    }

    /// Mark `x` as an output. A recorded variable keeps its slot; a variable
    /// that is passive on this tape is registered first.
    pub fn register_output(&self, x: &mut Reverse<F>) -> Result<()> {
        self.ensure_active()?;
        let mut data = self.data_mut();
        if data.operand(self.inner.id, x) == CONSTANT {
            x.slot = data.push_leaf();
            x.tape = self.inner.id;
        }
        Ok(())
    }

    pub fn register_outputs(&self, xs: &mut [Reverse<F>]) -> Result<()> {
        self.ensure_active()?;
        let mut data = self.data_mut();
        for x in xs {
            if data.operand(self.inner.id, x) == CONSTANT {
                x.slot = data.push_leaf();
                x.tape = self.inner.id;
            }
        }
        Ok(())
    }

    // ── Recording control ──

    /// Start a new recording window at the current position.
    ///
    /// [`compute_adjoints`](Self::compute_adjoints) sweeps back to this point.
    /// All derivatives are zeroed and must be seeded again.
    pub fn new_recording(&self) {
        let mut data = self.data_mut();
        data.baseline = data.position();
        data.zero_derivatives();
        data.derivatives_initialized = false;
        log::debug!(
            "tape {}: new recording at position {}",
            self.inner.id,
            data.baseline
        );
    }

    /// Number of statements recorded so far.
    pub fn get_position(&self) -> Position {
        self.data().position()
    }

    /// Truncate the tape back to `pos`, releasing every slot allocated after it.
    /// Checkpoint callbacks inserted after `pos` are dropped.
    ///
    /// Variables created after `pos` must not be used with this tape again.
    pub fn reset_to(&self, pos: Position) -> Result<()> {
        self.data().check_position(pos)?;
        self.truncate_to(pos);
        Ok(())
    }

    fn truncate_to(&self, pos: Position) {
        let dropped = {
            let mut data = self.data_mut();
            if pos >= data.position() {
                return;
            }
            data.truncate(pos);
            log::debug!(
                "tape {}: reset to position {pos}, {} slots live",
                self.inner.id,
                data.num_slots
            );
            let mut checkpoints = self.inner.checkpoints.borrow_mut();
            let keep = checkpoints.partition_point(|(marker, _)| *marker <= pos);
            checkpoints.split_off(keep)
        };
        if !dropped.is_empty() {
            log::debug!(
                "tape {}: dropped {} checkpoint callbacks",
                self.inner.id,
                dropped.len()
            );
        }
    }

    /// Drop everything: statements, slots, derivatives, checkpoint callbacks
    /// and the recording baseline. Slot numbering restarts at zero.
    pub fn clear_all(&self) {
        {
            let mut data = self.data_mut();
            data.truncate(0);
            data.baseline = 0;
            data.derivatives_initialized = false;
        }
        let dropped = mem::take(&mut *self.inner.checkpoints.borrow_mut());
        log::debug!(
            "tape {}: cleared, {} checkpoint callbacks dropped",
            self.inner.id,
            dropped.len()
        );
    }

    // ── Checkpointing ──

    /// Insert `callback` at the current end of the tape. The tape must be active.
    ///
    /// This records one operand-free marker statement, which allocates a slot
    /// like any other statement. The callback runs once, when a reverse sweep
    /// passes the marker, and is then dropped.
    pub fn insert_callback(&self, callback: Box<dyn CheckpointCallback<F>>) -> Result<()> {
        self.ensure_active()?;
        let marker = {
            let mut data = self.data_mut();
            data.push_leaf();
            data.position()
        };
        self.inner.checkpoints.borrow_mut().push((marker, callback));
        log::trace!("tape {}: checkpoint at {marker}", self.inner.id);
        Ok(())
    }

    /// Number of callbacks waiting for a reverse sweep.
    pub fn num_callbacks(&self) -> usize {
        self.inner.checkpoints.borrow().len()
    }

    fn pop_checkpoint_above(
        &self,
        pos: Position,
    ) -> Option<(Position, Box<dyn CheckpointCallback<F>>)> {
        let mut checkpoints = self.inner.checkpoints.borrow_mut();
        match checkpoints.last() {
            Some((marker, _)) if *marker > pos => checkpoints.pop(),
            _ => None,
        }
    }

    // ── Derivatives ──

    /// Seed or overwrite the adjoint of `at`.
    pub fn set_derivative(&self, at: impl AsSlot<F>, value: F) -> Result<()> {
        let mut data = self.data_mut();
        let slot = data.resolve(self.inner.id, &at)?;
        data.derivatives[slot] = value;
        data.derivatives_initialized = true;
        Ok(())
    }

    /// Read the adjoint of `at`.
    pub fn derivative(&self, at: impl AsSlot<F>) -> Result<F> {
        let data = self.data();
        let slot = data.resolve(self.inner.id, &at)?;
        Ok(data.derivatives[slot])
    }

    /// Alias of [`derivative`](Self::derivative).
    pub fn get_derivative(&self, at: impl AsSlot<F>) -> Result<F> {
        self.derivative(at)
    }

    /// `adjoint[slot] += x`.
    pub fn increment_adjoint(&self, slot: Slot, x: F) -> Result<()> {
        let mut data = self.data_mut();
        let slot = data.check_slot(slot)?;
        data.derivatives[slot] = data.derivatives[slot] + x;
        data.derivatives_initialized = true;
        Ok(())
    }

    /// Return the adjoint of `slot` and zero it.
    pub fn get_and_reset_output_adjoint(&self, slot: Slot) -> Result<F> {
        let mut data = self.data_mut();
        let slot = data.check_slot(slot)?;
        Ok(mem::replace(&mut data.derivatives[slot], F::zero()))
    }

    /// Zero every adjoint. Statements and slots are untouched.
    pub fn clear_derivatives(&self) {
        let mut data = self.data_mut();
        data.zero_derivatives();
        data.derivatives_initialized = false;
    }

    /// Release the derivative storage of every slot allocated after `pos`.
    ///
    /// Reading those slots fails with [`TapeError::SlotOutOfRange`] until a
    /// new allocation extends the storage again.
    pub fn clear_derivatives_after(&self, pos: Position) -> Result<()> {
        let mut data = self.data_mut();
        data.check_position(pos)?;
        let len = data.slots_at(pos) as usize;
        data.derivatives.truncate(len);
        Ok(())
    }

    /// Reverse sweep from the end of the tape to the current recording baseline.
    pub fn compute_adjoints(&self) -> Result<()> {
        let baseline = self.data().baseline;
        self.compute_adjoints_to(baseline)
    }

    /// Reverse sweep from the end of the tape down to `pos`.
    ///
    /// Statements after `pos` are settled: sweeping them again later only
    /// propagates adjoints seeded or accumulated since.
    ///
    /// Each checkpoint marker after `pos` splits the sweep. The segment above
    /// the marker is swept, the tape is reset to just before the marker and
    /// the callback runs; whatever it recorded is then reset away as well. A
    /// sweep that passes markers therefore leaves the tape truncated to the
    /// lowest of them, minus one.
    pub fn compute_adjoints_to(&self, pos: Position) -> Result<()> {
        let mut start = {
            let data = self.data();
            if !data.derivatives_initialized {
                return Err(TapeError::DerivativesNotInitialized);
            }
            data.check_position(pos)?;
            data.position()
        };
        let end = start;
        while let Some((marker, mut callback)) = self.pop_checkpoint_above(pos) {
            self.data_mut().sweep(start, marker);
            self.truncate_to(marker - 1);
            log::trace!("tape {}: running checkpoint at {marker}", self.inner.id);
            callback.compute_adjoint(self)?;
            self.truncate_to(marker - 1);
            start = marker - 1;
        }
        self.data_mut().sweep(start, pos);
        log::trace!(
            "tape {}: adjoints computed from {end} down to {pos}",
            self.inner.id
        );
        Ok(())
    }

    // ── Introspection ──

    pub fn num_statements(&self) -> u32 {
        self.data().position()
    }

    pub fn num_operations(&self) -> u32 {
        self.data().multipliers.len() as u32
    }

    pub fn num_variables(&self) -> u32 {
        self.data().num_slots
    }

    /// Bytes held by the tape's stacks.
    pub fn memory(&self) -> usize {
        self.data().memory()
    }

    /// Current counters. Also logged at debug level.
    pub fn status(&self) -> TapeStatus {
        let status = self.snapshot();
        log::debug!("tape {}: {status}", self.inner.id);
        status
    }

    fn snapshot(&self) -> TapeStatus {
        let data = self.data();
        TapeStatus {
            statements: data.position(),
            operations: data.multipliers.len() as u32,
            variables: data.num_slots,
            derivatives: data.derivatives.len() as u32,
            position: data.position(),
            baseline: data.baseline,
            memory: data.memory(),
        }
    }
}

/// RAII guard that activates a tape and deactivates it on drop.
///
/// Derefs to the guarded [`Tape`], so the guard can be used in its place.
pub struct TapeGuard<F: TapeThreadLocal> {
    tape: Tape<F>,
}

impl<F: TapeThreadLocal> TapeGuard<F> {
    /// Activate `tape` for the guard's lifetime.
    pub fn new(tape: &Tape<F>) -> Result<Self> {
        tape.activate()?;
        Ok(TapeGuard { tape: tape.clone() })
    }
}

impl<F: TapeThreadLocal> Deref for TapeGuard<F> {
    type Target = Tape<F>;

    fn deref(&self) -> &Tape<F> {
        &self.tape
    }
}

impl<F: TapeThreadLocal> Drop for TapeGuard<F> {
    fn drop(&mut self) {
        // Already deactivated by hand inside the scope: nothing to release.
        if self.tape.is_active() {
            let _ = self.tape.deactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Float as _;

    fn input(tape: &Tape<f64>, v: f64) -> Reverse<f64> {
        let mut x = Reverse::new(v);
        tape.register_input(&mut x).unwrap();
        x
    }

    #[test]
    fn registration_pushes_leaf_statements() {
        let tape = Tape::<f64>::new();
        let _g = tape.scoped().unwrap();
        assert_eq!(tape.get_position(), 0);
        let x = input(&tape, 1.0);
        let y = input(&tape, 2.0);
        assert_eq!((x.slot(), y.slot()), (0, 1));
        assert_eq!(tape.get_position(), 2);
        assert_eq!(tape.num_operations(), 0);
    }

    #[test]
    fn constant_operands_are_not_stored() {
        let tape = Tape::<f64>::new();
        let _g = tape.scoped().unwrap();
        let x = input(&tape, 3.0);
        let y = x * 2.0;
        let z = x * y;
        assert_eq!(tape.num_operations(), 3);
        assert_eq!(tape.num_variables(), 3);
        assert_eq!(z.slot(), 2);
    }

    #[test]
    fn slots_at_follows_statement_lhs() {
        let tape = Tape::<f64>::new();
        let _g = tape.scoped().unwrap();
        let x = input(&tape, 1.0);
        let _y = x.sin();
        let data = tape.data();
        assert_eq!(data.slots_at(0), 0);
        assert_eq!(data.slots_at(1), 1);
        assert_eq!(data.slots_at(2), 2);
    }

    #[test]
    fn truncate_restores_operand_stacks() {
        let tape = Tape::<f64>::new();
        let _g = tape.scoped().unwrap();
        let x = input(&tape, 1.5);
        let pos = tape.get_position();
        let ops = tape.num_operations();
        let _ = (x * x).exp() + x;
        tape.reset_to(pos).unwrap();
        assert_eq!(tape.num_operations(), ops);
        assert_eq!(tape.num_variables(), 1);
        assert_eq!(tape.data().derivatives.len(), 1);
    }

    #[test]
    fn memory_grows_with_recording() {
        let tape = Tape::<f64>::with_capacity(16);
        let _g = tape.scoped().unwrap();
        let before = tape.memory();
        let x = input(&tape, 0.5);
        let _ = x * x + x.cos();
        assert!(tape.memory() > before);
        let status = tape.status();
        assert_eq!(status.statements, tape.get_position());
        assert!(status.to_string().contains("statements: 4"));
    }

    #[test]
    fn stale_operands_are_reported_once_per_reset() {
        let tape = Tape::<f64>::new();
        let _g = tape.scoped().unwrap();
        let x = input(&tape, 2.0);
        let pos = tape.get_position();
        let stale = x * x;
        tape.reset_to(pos).unwrap();
        assert!(!tape.data().stale_reported);

        for _ in 0..3 {
            let _ = stale + x;
        }
        assert!(tape.data().stale_reported);

        let _ = x.exp();
        tape.reset_to(pos).unwrap();
        assert!(!tape.data().stale_reported);
    }

    #[test]
    fn callback_markers_take_a_statement_and_a_slot() {
        let tape = Tape::<f64>::new();
        let _g = tape.scoped().unwrap();
        let x = input(&tape, 1.0);
        tape.insert_callback(Box::new(|_: &Tape<f64>| -> Result<()> { Ok(()) })).unwrap();
        let y = x * 2.0;
        assert_eq!(tape.get_position(), 3);
        assert_eq!(y.slot(), 2);
        assert_eq!(tape.num_callbacks(), 1);
        assert_eq!(tape.inner.checkpoints.borrow()[0].0, 2);

        tape.reset_to(2).unwrap();
        assert_eq!(tape.num_callbacks(), 1);
        tape.reset_to(1).unwrap();
        assert_eq!(tape.num_callbacks(), 0);
    }

    #[test]
    fn dropping_the_last_handle_releases_the_registry() {
        {
            let tape = Tape::<f64>::new();
            tape.activate().unwrap();
        }
        assert!(Tape::<f64>::get_active().is_none());
        let other = Tape::<f64>::new();
        other.activate().unwrap();
        other.deactivate().unwrap();
    }
}
