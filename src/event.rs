//! Timestamped inbound events and outbound notifications of the audio thread.

use crossbeam_queue::ArrayQueue;

use crate::utils::permit_alloc;

// -------------------------------------------------------------------------------------------------

/// Wildcard value for [`NoteMatch`] fields.
pub const WILDCARD: i32 = -1;

/// Identifies the voices a note event targets.
///
/// Each field may be `-1`, which matches any value of that field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteMatch {
    pub key: i16,
    pub channel: i16,
    pub note_id: i32,
}

impl NoteMatch {
    /// Matches all voices.
    pub const ALL: Self = Self {
        key: WILDCARD as i16,
        channel: WILDCARD as i16,
        note_id: WILDCARD,
    };

    pub const fn new(key: i16, channel: i16, note_id: i32) -> Self {
        Self {
            key,
            channel,
            note_id,
        }
    }

    /// Matches all voices with the given key.
    pub const fn key(key: i16) -> Self {
        Self {
            key,
            ..Self::ALL
        }
    }

    /// Wildcard aware comparison against a voice's identity.
    #[inline]
    pub fn matches(&self, key: i16, channel: i16, note_id: i32) -> bool {
        (self.key == WILDCARD as i16 || self.key == key)
            && (self.note_id == WILDCARD || self.note_id == note_id)
            && (self.channel == WILDCARD as i16 || self.channel == channel)
    }
}

// -------------------------------------------------------------------------------------------------

/// Events consumed by the audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Start a new voice. The key must not be a wildcard.
    NoteOn(NoteMatch),
    /// Release all matching voices.
    NoteOff(NoteMatch),
    /// Remove all matching voices without a release tail.
    NoteChoke(NoteMatch),
    /// Set a parameter's value. `index` must be a valid parameter index.
    ParameterValue { index: u32, value: f64 },
    /// Set a per-voice modulation offset of the first matching voice.
    ParameterModulation {
        note: NoteMatch,
        index: u32,
        amount: f64,
    },
}

/// An [`InputEvent`] with its frame offset within the current processing call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    pub time: u32,
    pub event: InputEvent,
}

impl TimedEvent {
    pub const fn new(time: u32, event: InputEvent) -> Self {
        Self { time, event }
    }
}

// -------------------------------------------------------------------------------------------------

/// Notifications emitted by the audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputEvent {
    /// Echo of a value, which got flushed from the control thread into the audio thread.
    ParameterValue { index: u32, value: f64 },
    /// A released voice finished.
    NoteEnd {
        key: i16,
        channel: i16,
        note_id: i32,
        port_index: i16,
    },
}

// -------------------------------------------------------------------------------------------------

/// Receives [`OutputEvent`]s from the audio thread. Implementations must not block.
pub trait EventSink {
    /// Push a new event. Returns false when the event could not be queued.
    fn try_push(&mut self, event: OutputEvent) -> bool;
}

/// Growable sink for offline use and tests. May allocate.
impl EventSink for Vec<OutputEvent> {
    fn try_push(&mut self, event: OutputEvent) -> bool {
        self.push(event);
        true
    }
}

/// Bounded, lock-free sink, which is safe to use in real-time threads.
impl EventSink for ArrayQueue<OutputEvent> {
    fn try_push(&mut self, event: OutputEvent) -> bool {
        self.push(event).is_ok()
    }
}

/// Drops all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn try_push(&mut self, _event: OutputEvent) -> bool {
        true
    }
}

/// Push an event, logging dropped ones.
pub(crate) fn push_event(sink: &mut dyn EventSink, event: OutputEvent) {
    if !sink.try_push(event) {
        permit_alloc(|| log::debug!("Output event queue is full, dropping {event:?}"));
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matching() {
        let exact = NoteMatch::new(60, 0, 1);
        assert!(exact.matches(60, 0, 1));
        assert!(!exact.matches(61, 0, 1));
        assert!(!exact.matches(60, 1, 1));
        assert!(!exact.matches(60, 0, 2));

        assert!(NoteMatch::ALL.matches(12, 3, 99));
        assert!(NoteMatch::key(60).matches(60, 7, 42));
        assert!(!NoteMatch::key(60).matches(59, 7, 42));
        assert!(NoteMatch::new(-1, 2, -1).matches(30, 2, 5));
        assert!(!NoteMatch::new(-1, 2, -1).matches(30, 1, 5));
    }

    #[test]
    fn bounded_sink_drops_when_full() {
        let mut queue = ArrayQueue::<OutputEvent>::new(1);
        let event = OutputEvent::ParameterValue {
            index: 0,
            value: 1.0,
        };
        assert!(queue.try_push(event));
        assert!(!queue.try_push(event));
        // dropping events logs within the audio thread's no-alloc scope
        crate::utils::assert_no_alloc(|| push_event(&mut queue, event));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(event));
    }
}
