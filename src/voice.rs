//! Per-note life-cycle state of the audio thread.

use crate::{
    event::{push_event, EventSink, NoteMatch, OutputEvent},
    parameter::{ParameterId, PARAMETER_COUNT},
    utils::permit_alloc,
};

// -------------------------------------------------------------------------------------------------

/// One currently sounding or just released note.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    held: bool,
    note_id: i32,
    channel: i16,
    key: i16,
    phase: f32,
    modulation: [f32; PARAMETER_COUNT],
}

impl Voice {
    fn new(key: i16, channel: i16, note_id: i32) -> Self {
        Self {
            held: true,
            note_id,
            channel,
            key,
            phase: 0.0,
            modulation: [0.0; PARAMETER_COUNT],
        }
    }

    /// True while the key is physically down.
    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn note_id(&self) -> i32 {
        self.note_id
    }

    pub fn channel(&self) -> i16 {
        self.channel
    }

    pub fn key(&self) -> i16 {
        self.key
    }

    /// Oscillator phase in range `0.0..1.0`. Always zero with the tonewheel stages, which
    /// don't render per voice.
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// The voice's modulation offset for the given parameter.
    pub fn modulation(&self, id: ParameterId) -> f32 {
        self.modulation[id.index()]
    }

    /// All of the voice's modulation offsets, indexed by parameter index.
    pub fn modulations(&self) -> &[f32; PARAMETER_COUNT] {
        &self.modulation
    }

    fn matches(&self, note: &NoteMatch) -> bool {
        note.matches(self.key, self.channel, self.note_id)
    }
}

// -------------------------------------------------------------------------------------------------

/// Ordered set of active [`Voice`]s, owned by the audio thread.
///
/// Voices are kept in arrival order. Removing voices preserves the order of the remaining ones.
/// Note events are matched against voices with [`NoteMatch`]'s wildcard semantics.
#[derive(Debug, Default, Clone)]
pub struct VoiceTable {
    voices: Vec<Voice>,
}

impl VoiceTable {
    /// Create a new table with preallocated space for `capacity` voices.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            voices: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Access voices in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &Voice> {
        self.voices.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    /// Append a new held voice with cleared modulation offsets.
    ///
    /// Existing voices matching the new note get released first, so a retriggered note ends
    /// its previous voice with the next reap. Voices with the same key but another channel or
    /// note id are kept.
    pub fn note_on(&mut self, key: i16, channel: i16, note_id: i32) {
        self.note_off(&NoteMatch::new(key, channel, note_id));
        let voice = Voice::new(key, channel, note_id);
        if self.voices.len() == self.voices.capacity() {
            permit_alloc(|| {
                log::debug!(
                    "Voice table is full, growing it beyond {} voices",
                    self.voices.len()
                );
                self.voices.push(voice)
            });
        } else {
            self.voices.push(voice);
        }
    }

    /// Release all matching voices. Released voices are removed by
    /// [`reap_released_voices`](Self::reap_released_voices) after the audio got rendered.
    pub fn note_off(&mut self, note: &NoteMatch) {
        for voice in self.voices.iter_mut().filter(|voice| voice.matches(note)) {
            voice.held = false;
        }
    }

    /// Remove all matching voices immediately, without emitting note end events.
    pub fn note_choke(&mut self, note: &NoteMatch) {
        self.voices.retain(|voice| !voice.matches(note));
    }

    /// Set the modulation offset of the first matching voice. Later updates overwrite
    /// previous ones.
    pub fn apply_modulation(&mut self, note: &NoteMatch, id: ParameterId, amount: f32) {
        if let Some(voice) = self.voices.iter_mut().find(|voice| voice.matches(note)) {
            voice.modulation[id.index()] = amount;
        }
    }

    /// Remove all voices which are no longer held, emitting one note end event per removed
    /// voice, in voice order.
    pub fn reap_released_voices(&mut self, out_events: &mut dyn EventSink) {
        self.voices.retain(|voice| {
            if voice.held {
                return true;
            }
            push_event(
                out_events,
                OutputEvent::NoteEnd {
                    key: voice.key,
                    channel: voice.channel,
                    note_id: voice.note_id,
                    port_index: 0,
                },
            );
            false
        });
    }

    /// Remove all voices without emitting any events.
    pub fn clear(&mut self) {
        self.voices.clear();
    }
}

// -------------------------------------------------------------------------------------------------
