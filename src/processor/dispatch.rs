use crate::{
    event::{InputEvent, NoteMatch},
    parameter::{ParameterId, ParameterStore, ParameterValues},
    pipeline::DspStages,
    stage::{RotarySpeedMode, VibratoType},
    voice::VoiceTable,
};

// -------------------------------------------------------------------------------------------------

/// Resolve a host parameter index from an event. Invalid indices are host bugs.
fn event_parameter_id(index: u32) -> ParameterId {
    match ParameterId::from_index(index as usize) {
        Some(id) => id,
        None => panic!("Invalid parameter index {index} in event"),
    }
}

// -------------------------------------------------------------------------------------------------

/// Applies [`InputEvent`]s to the parameter store, the voice table and the DSP stages' control
/// inputs. All mutation of those goes through here.
pub(crate) struct EventProcessor<'a> {
    parameters: &'a ParameterStore,
    voices: &'a mut VoiceTable,
    stages: &'a mut DspStages,
}

impl<'a> EventProcessor<'a> {
    pub fn new(
        parameters: &'a ParameterStore,
        voices: &'a mut VoiceTable,
        stages: &'a mut DspStages,
    ) -> Self {
        Self {
            parameters,
            voices,
            stages,
        }
    }

    /// Apply a single event.
    ///
    /// ### Panics
    /// On caller contract violations: out of range parameter indices or note-ons with a
    /// wildcard or out of range key.
    pub fn process_event(&mut self, event: &InputEvent) {
        match event {
            InputEvent::NoteOn(note) => {
                assert!(
                    (0..128).contains(&note.key),
                    "Invalid note-on key {}",
                    note.key
                );
                self.stages.generator.key_on(note.key as u8);
                self.voices.note_on(note.key, note.channel, note.note_id);
            }
            InputEvent::NoteOff(note) => {
                self.release_keys(note);
                self.voices.note_off(note);
            }
            InputEvent::NoteChoke(note) => {
                self.release_keys(note);
                self.voices.note_choke(note);
            }
            InputEvent::ParameterValue { index, value } => {
                let id = event_parameter_id(*index);
                let value = *value as f32;
                let stages = &mut *self.stages;
                self.parameters.apply_from_audio_with(id, value, |live| {
                    Self::route_parameter(stages, id, value, live);
                });
            }
            InputEvent::ParameterModulation {
                note,
                index,
                amount,
            } => {
                let id = event_parameter_id(*index);
                self.voices.apply_modulation(note, id, *amount as f32);
            }
        }
    }

    /// Key off the generator for the released key. Wildcard keys release the keys of all
    /// matching voices.
    fn release_keys(&mut self, note: &NoteMatch) {
        if (0..128).contains(&note.key) {
            self.stages.generator.key_off(note.key as u8);
        } else {
            for voice in self.voices.iter() {
                if note.matches(voice.key(), voice.channel(), voice.note_id())
                    && (0..128).contains(&voice.key())
                {
                    self.stages.generator.key_off(voice.key() as u8);
                }
            }
        }
    }

    /// Route a parameter's new value to the control input of the DSP stage it affects.
    /// `live` are the live values, including the new value.
    pub fn route_parameter(
        stages: &mut DspStages,
        id: ParameterId,
        value: f32,
        live: &ParameterValues,
    ) {
        let quantized = id.descriptor().quantize_value(value);
        match id {
            ParameterId::Drawbar0
            | ParameterId::Drawbar1
            | ParameterId::Drawbar2
            | ParameterId::Drawbar3
            | ParameterId::Drawbar4
            | ParameterId::Drawbar5
            | ParameterId::Drawbar6
            | ParameterId::Drawbar7
            | ParameterId::Drawbar8 => {
                let drawbar = id.index();
                stages
                    .generator
                    .set_drawbar(drawbar, quantized.clamp(0.0, 8.0) as u8);
            }
            ParameterId::Vibrato => {
                stages.generator.set_vibrato_upper(quantized != 0.0);
            }
            ParameterId::VibratoType => {
                stages
                    .generator
                    .set_vibrato_type(VibratoType::from_value(quantized));
            }
            ParameterId::Drum | ParameterId::Horn => {
                stages.rotary.set_speed_mode(RotarySpeedMode::from_values(
                    live[ParameterId::Drum.index()],
                    live[ParameterId::Horn.index()],
                ));
            }
            ParameterId::Overdrive => {
                // "on" means not clean
                stages.preamp.set_clean((1.0 - value).round_ties_even() != 0.0);
            }
            ParameterId::Character => {
                stages.preamp.set_character(value);
            }
            ParameterId::Reverb => {
                stages.reverb.set_mix(value);
            }
        }
    }

    /// Route all given values, e.g. to configure freshly initialized stages.
    pub fn route_all_parameters(stages: &mut DspStages, live: &ParameterValues) {
        for id in ParameterId::all() {
            Self::route_parameter(stages, id, live[id.index()], live);
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        parameter::default_values,
        pipeline::tests::{test_stages, StageCall},
        stage::RotorSpeed,
    };

    fn value_event(id: ParameterId, value: f64) -> InputEvent {
        InputEvent::ParameterValue {
            index: id.index() as u32,
            value,
        }
    }

    #[test]
    fn note_events_update_generator_before_voices() {
        let store = ParameterStore::default();
        let mut voices = VoiceTable::default();
        let (mut stages, log) = test_stages();
        let mut processor = EventProcessor::new(&store, &mut voices, &mut stages);
        processor.process_event(&InputEvent::NoteOn(NoteMatch::new(60, 0, 1)));
        processor.process_event(&InputEvent::NoteOn(NoteMatch::new(64, 0, 2)));
        processor.process_event(&InputEvent::NoteOff(NoteMatch::new(60, 0, 1)));
        processor.process_event(&InputEvent::NoteChoke(NoteMatch::new(64, -1, -1)));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                StageCall::KeyOn(60),
                StageCall::KeyOn(64),
                StageCall::KeyOff(60),
                StageCall::KeyOff(64)
            ]
        );
        assert_eq!(voices.len(), 1);
        assert!(!voices.get(0).unwrap().is_held());
    }

    #[test]
    fn wildcard_note_off_releases_matching_keys() {
        let store = ParameterStore::default();
        let mut voices = VoiceTable::default();
        let (mut stages, log) = test_stages();
        let mut processor = EventProcessor::new(&store, &mut voices, &mut stages);
        processor.process_event(&InputEvent::NoteOn(NoteMatch::new(60, 0, 1)));
        processor.process_event(&InputEvent::NoteOn(NoteMatch::new(67, 1, 2)));
        log.lock().unwrap().clear();
        processor.process_event(&InputEvent::NoteOff(NoteMatch::new(-1, 1, -1)));
        assert_eq!(*log.lock().unwrap(), vec![StageCall::KeyOff(67)]);
        assert!(voices.get(0).unwrap().is_held());
        assert!(!voices.get(1).unwrap().is_held());
    }

    #[test]
    fn parameter_values_are_recorded_and_routed() {
        let store = ParameterStore::default();
        let mut voices = VoiceTable::default();
        let (mut stages, log) = test_stages();
        let mut processor = EventProcessor::new(&store, &mut voices, &mut stages);
        processor.process_event(&value_event(ParameterId::Drawbar3, 5.6));
        processor.process_event(&value_event(ParameterId::Vibrato, 0.7));
        processor.process_event(&value_event(ParameterId::VibratoType, 4.5));
        processor.process_event(&value_event(ParameterId::Horn, 2.5));
        processor.process_event(&value_event(ParameterId::Overdrive, 1.0));
        processor.process_event(&value_event(ParameterId::Character, 0.25));
        processor.process_event(&value_event(ParameterId::Reverb, 0.5));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                StageCall::Drawbar(3, 6),
                StageCall::VibratoUpper(true),
                StageCall::VibratoType(VibratoType::C2),
                StageCall::SpeedMode(RotarySpeedMode::new(RotorSpeed::Slow, RotorSpeed::Fast)),
                StageCall::Clean(false),
                StageCall::Character(0.25),
                StageCall::ReverbMix(0.5),
            ]
        );
        assert_eq!(store.live_values()[ParameterId::Drawbar3.index()], 5.6);
        assert!(store.is_live_dirty(ParameterId::Reverb));
        assert!(!store.is_staged_dirty(ParameterId::Reverb));
    }

    #[test]
    fn halfway_values_round_to_even() {
        let (mut stages, log) = test_stages();
        let live = default_values();
        EventProcessor::route_parameter(&mut stages, ParameterId::Drawbar2, 4.5, &live);
        EventProcessor::route_parameter(&mut stages, ParameterId::Overdrive, 0.5, &live);
        assert_eq!(
            *log.lock().unwrap(),
            vec![StageCall::Drawbar(2, 4), StageCall::Clean(false)]
        );
    }

    #[test]
    fn rotary_mode_combines_drum_and_horn() {
        let (mut stages, log) = test_stages();
        let mut live = default_values();
        live[ParameterId::Drum.index()] = 2.2;
        live[ParameterId::Horn.index()] = 0.0;
        EventProcessor::route_parameter(&mut stages, ParameterId::Drum, 2.2, &live);
        match log.lock().unwrap().last() {
            Some(StageCall::SpeedMode(mode)) => assert_eq!(mode.index(), 2),
            call => panic!("unexpected call {call:?}"),
        };
    }

    #[test]
    fn modulation_events_target_voices() {
        let store = ParameterStore::default();
        let mut voices = VoiceTable::default();
        let (mut stages, log) = test_stages();
        let mut processor = EventProcessor::new(&store, &mut voices, &mut stages);
        processor.process_event(&InputEvent::NoteOn(NoteMatch::new(60, 0, 1)));
        processor.process_event(&InputEvent::ParameterModulation {
            note: NoteMatch::new(60, 0, 1),
            index: ParameterId::Reverb.index() as u32,
            amount: 0.3,
        });
        assert_eq!(voices.get(0).unwrap().modulation(ParameterId::Reverb), 0.3);
        // modulations don't touch the store or the stages
        assert!(!store.is_live_dirty(ParameterId::Reverb));
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    #[should_panic]
    fn invalid_parameter_index_fails() {
        let store = ParameterStore::default();
        let mut voices = VoiceTable::default();
        let (mut stages, _) = test_stages();
        let mut processor = EventProcessor::new(&store, &mut voices, &mut stages);
        processor.process_event(&InputEvent::ParameterValue {
            index: 16,
            value: 0.0,
        });
    }

    #[test]
    #[should_panic]
    fn wildcard_note_on_fails() {
        let store = ParameterStore::default();
        let mut voices = VoiceTable::default();
        let (mut stages, _) = test_stages();
        let mut processor = EventProcessor::new(&store, &mut voices, &mut stages);
        processor.process_event(&InputEvent::NoteOn(NoteMatch::ALL));
    }
}
