//! Two-slot parameter exchange between the control and the audio thread.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{default_values, ParameterId, ParameterValues, PARAMETER_COUNT};

// -------------------------------------------------------------------------------------------------

#[derive(Debug)]
struct ParameterSlots {
    /// Values in effect on the audio thread. Written by the audio thread only.
    live: ParameterValues,
    live_dirty: [bool; PARAMETER_COUNT],
    /// Values written by the control thread. Written by the control thread only.
    staged: ParameterValues,
    staged_dirty: [bool; PARAMETER_COUNT],
    /// The control thread's view of all values: its own edits and drained live changes.
    snapshot: ParameterValues,
}

// -------------------------------------------------------------------------------------------------

/// Holds the organ's parameter values in two slots: `live` values, which are owned by the audio
/// thread, and `staged` values, which are owned by the control thread.
///
/// Both slots carry per-parameter dirty flags. Changes are reconciled explicitly: the audio
/// thread flushes dirty staged values into the live slot once per processing call via
/// [`flush_staged_into_live`](Self::flush_staged_into_live), and the control thread drains
/// dirty live values into a separate snapshot via
/// [`drain_live_changes`](Self::drain_live_changes).
///
/// All critical sections only copy fixed size arrays, so the time the audio thread may block
/// on the mutex is bounded by `O(PARAMETER_COUNT)`.
#[derive(Debug)]
pub struct ParameterStore {
    slots: Mutex<ParameterSlots>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(default_values())
    }
}

impl ParameterStore {
    /// Create a new store with the given initial values in both slots, all flags clean.
    pub fn new(values: ParameterValues) -> Self {
        Self {
            slots: Mutex::new(ParameterSlots {
                live: values,
                live_dirty: [false; PARAMETER_COUNT],
                staged: values,
                staged_dirty: [false; PARAMETER_COUNT],
                snapshot: values,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ParameterSlots> {
        // slots are plain arrays: a panic while holding the lock can't leave them torn
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Control thread

    /// Stage a new value for the audio thread. Control thread only.
    pub fn stage(&self, id: ParameterId, value: f32) {
        let mut slots = self.lock();
        slots.staged[id.index()] = value;
        slots.staged_dirty[id.index()] = true;
        slots.snapshot[id.index()] = value;
    }

    /// Replace all staged values and mark all of them dirty, so the audio thread re-applies the
    /// whole set with its next flush. Control thread only.
    pub fn load_staged(&self, values: &ParameterValues) {
        let mut slots = self.lock();
        slots.staged = *values;
        slots.staged_dirty = [true; PARAMETER_COUNT];
        slots.snapshot = *values;
    }

    /// Copy all live values, which changed on the audio thread, into the control thread's
    /// snapshot and clear their dirty flags. Returns true when anything changed.
    ///
    /// Values with a pending staged edit keep the edit in the snapshot: the edit replaces the
    /// live value with the next flush. Control thread only.
    pub fn drain_live_changes(&self) -> bool {
        let mut slots = self.lock();
        let slots = &mut *slots;
        let mut any_changed = false;
        for index in 0..PARAMETER_COUNT {
            if slots.live_dirty[index] {
                if !slots.staged_dirty[index] {
                    slots.snapshot[index] = slots.live[index];
                }
                slots.live_dirty[index] = false;
                any_changed = true;
            }
        }
        any_changed
    }

    /// The most authoritative value of the given parameter: a staged, not yet flushed value if
    /// there is one, else the live value.
    pub fn value(&self, id: ParameterId) -> f32 {
        let slots = self.lock();
        if slots.staged_dirty[id.index()] {
            slots.staged[id.index()]
        } else {
            slots.live[id.index()]
        }
    }

    /// Copy of the control thread's snapshot.
    pub fn staged_values(&self) -> ParameterValues {
        self.lock().snapshot
    }

    // Audio thread

    /// Record a value change, which happened on the audio thread, so the control thread can
    /// observe it. Audio thread only.
    pub fn apply_from_audio(&self, id: ParameterId, value: f32) {
        self.apply_from_audio_with(id, value, |_| ());
    }

    /// Record a value change, which happened on the audio thread, and invoke `apply` with the
    /// updated live values within the same critical section. Audio thread only.
    pub fn apply_from_audio_with<R>(
        &self,
        id: ParameterId,
        value: f32,
        apply: impl FnOnce(&ParameterValues) -> R,
    ) -> R {
        let mut slots = self.lock();
        slots.live[id.index()] = value;
        slots.live_dirty[id.index()] = true;
        apply(&slots.live)
    }

    /// Copy all dirty staged values into the live slot, clearing their staged dirty flag.
    /// `flushed` is called for each copied value with the updated live values, within the same
    /// critical section. Audio thread only.
    pub fn flush_staged_into_live(
        &self,
        mut flushed: impl FnMut(ParameterId, f32, &ParameterValues),
    ) {
        let mut slots = self.lock();
        let slots = &mut *slots;
        for id in ParameterId::all() {
            let index = id.index();
            if slots.staged_dirty[index] {
                slots.live[index] = slots.staged[index];
                slots.staged_dirty[index] = false;
                flushed(id, slots.live[index], &slots.live);
            }
        }
    }

    /// Copy of the live values.
    pub fn live_values(&self) -> ParameterValues {
        self.lock().live
    }

    /// Invoke `f` with the live values within a critical section.
    pub fn with_live_values<R>(&self, f: impl FnOnce(&ParameterValues) -> R) -> R {
        f(&self.lock().live)
    }

    // Inspection

    /// True when a staged value is waiting to be flushed into the live slot.
    pub fn is_staged_dirty(&self, id: ParameterId) -> bool {
        self.lock().staged_dirty[id.index()]
    }

    /// True when a live value change has not yet been drained by the control thread.
    pub fn is_live_dirty(&self, id: ParameterId) -> bool {
        self.lock().live_dirty[id.index()]
    }
}

// -------------------------------------------------------------------------------------------------
