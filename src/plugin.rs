//! Host adapter: plugin life-cycle and the host facing capability extensions.

use std::{
    io::{Read, Write},
    panic::{catch_unwind, AssertUnwindSafe},
    str::FromStr,
};

use strum::{AsRefStr, Display, EnumString};

use crate::{
    controller::Controller,
    event::{push_event, EventSink, InputEvent, OutputEvent, TimedEvent},
    parameter::{ParameterFlags, ParameterId, PARAMETER_COUNT},
    pipeline::DspStages,
    processor::{ProcessStatus, Processor, ProcessorOptions},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Static description of the plugin, as presented to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub id: &'static str,
    pub name: &'static str,
    pub vendor: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

pub const PLUGIN_DESCRIPTOR: PluginDescriptor = PluginDescriptor {
    id: "tonewheel.organ",
    name: "Tonewheel Organ",
    vendor: "tonewheel",
    version: env!("CARGO_PKG_VERSION"),
    description: "Tonewheel organ with rotary speaker",
    features: &["instrument", "synthesizer", "stereo"],
};

// -------------------------------------------------------------------------------------------------

/// Capability extensions the plugin supports, identified by their host-facing string ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
pub enum Extension {
    #[strum(serialize = "clap.note-ports")]
    NotePorts,
    #[strum(serialize = "clap.audio-ports")]
    AudioPorts,
    #[strum(serialize = "clap.params")]
    Params,
    #[strum(serialize = "clap.state")]
    State,
}

/// Note event dialects a note port may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NoteDialect {
    Clap,
    Midi,
    MidiMpe,
    Midi2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotePortInfo {
    pub id: u32,
    pub name: &'static str,
    pub supported_dialects: &'static [NoteDialect],
    pub preferred_dialect: NoteDialect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPortInfo {
    pub id: u32,
    pub name: &'static str,
    pub channel_count: u32,
    pub is_main: bool,
    pub in_place_pair: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub id: u32,
    pub name: &'static str,
    pub module: &'static str,
    pub min_value: f64,
    pub max_value: f64,
    pub default_value: f64,
    pub flags: ParameterFlags,
}

// -------------------------------------------------------------------------------------------------

pub trait NotePortsExtension {
    fn note_port_count(&self, is_input: bool) -> u32;
    fn note_port_info(&self, index: u32, is_input: bool) -> Option<NotePortInfo>;
}

pub trait AudioPortsExtension {
    fn audio_port_count(&self, is_input: bool) -> u32;
    fn audio_port_info(&self, index: u32, is_input: bool) -> Option<AudioPortInfo>;
}

pub trait ParamsExtension {
    fn parameter_count(&self) -> u32;
    fn parameter_info(&self, index: u32) -> Option<ParameterInfo>;
    fn parameter_value(&self, id: u32) -> Option<f64>;
    fn value_to_text(&self, id: u32, value: f64) -> Option<String>;
    fn text_to_value(&self, id: u32, text: &str) -> Option<f64>;
    /// Apply parameter changes while the plugin is not processing.
    fn flush(&mut self, events: &[TimedEvent], out_events: &mut dyn EventSink);
}

pub trait StateExtension {
    fn save_state(&self, stream: &mut dyn Write) -> bool;
    fn load_state(&mut self, stream: &mut dyn Read) -> bool;
}

// -------------------------------------------------------------------------------------------------

/// Creates the DSP stages for a new activation.
pub type StageFactory = Box<dyn Fn() -> DspStages + Send>;

/// The organ plugin instance: owns the control thread's [`Controller`] and, while activated,
/// the audio thread's [`Processor`].
///
/// Panics in the processor are caught and logged. A panicked processor gets disabled until
/// the plugin is activated again and only outputs silence.
pub struct OrganPlugin {
    controller: Controller,
    options: ProcessorOptions,
    create_stages: StageFactory,
    processor: Option<Processor>,
    processing: bool,
    panicked: bool,
}

impl Default for OrganPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl OrganPlugin {
    /// Create a new plugin instance with the built-in DSP stages and default parameters.
    pub fn new() -> Self {
        Self::with_stages(ProcessorOptions::default(), Box::new(DspStages::default))
    }

    /// Create a new plugin instance with custom processor options and DSP stages.
    pub fn with_stages(options: ProcessorOptions, create_stages: StageFactory) -> Self {
        Self {
            controller: Controller::default(),
            options,
            create_stages,
            processor: None,
            processing: false,
            panicked: false,
        }
    }

    pub fn descriptor(&self) -> &'static PluginDescriptor {
        &PLUGIN_DESCRIPTOR
    }

    /// The control thread's handle to the plugin's parameters.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn processor(&self) -> Option<&Processor> {
        self.processor.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.processor.is_some()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Look up a supported extension by its id.
    pub fn extension(&self, id: &str) -> Option<Extension> {
        Extension::from_str(id).ok()
    }

    /// Create the processor and initialize the DSP stages for the given sample rate.
    /// Frame count limits are informational only: any number of frames can be processed.
    pub fn activate(
        &mut self,
        sample_rate: f64,
        min_frames: u32,
        max_frames: u32,
    ) -> Result<(), Error> {
        if !(1.0..=u32::MAX as f64).contains(&sample_rate) {
            return Err(Error::ParameterError(format!(
                "activate 'sample_rate' value is '{sample_rate}'"
            )));
        }
        let processor = Processor::new(
            self.controller.parameters().clone(),
            (self.create_stages)(),
            sample_rate.round() as u32,
            self.options,
        )?;
        log::info!(
            "Activated organ: {} Hz, {}..{} frames per block",
            processor.sample_rate(),
            min_frames,
            max_frames
        );
        self.processor = Some(processor);
        self.panicked = false;
        Ok(())
    }

    pub fn deactivate(&mut self) {
        if self.processor.take().is_some() {
            log::info!("Deactivated organ");
        }
        self.processing = false;
    }

    /// Returns false when the plugin is not activated.
    pub fn start_processing(&mut self) -> bool {
        self.processing = self.processor.is_some();
        self.processing
    }

    pub fn stop_processing(&mut self) {
        self.processing = false;
    }

    /// Drop all voices and pending audio.
    pub fn reset(&mut self) {
        if let Some(processor) = self.processor.as_mut() {
            processor.reset();
        }
    }

    /// Process a block of audio with the given sorted, timed events. Writes silence and
    /// returns [`ProcessStatus::Error`] when not activated, not started or when the processor
    /// panicked.
    pub fn process(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        events: &[TimedEvent],
        out_events: &mut dyn EventSink,
    ) -> ProcessStatus {
        let processor = match self.processor.as_mut() {
            Some(processor) if self.processing && !self.panicked => processor,
            _ => {
                left.fill(0.0);
                right.fill(0.0);
                return ProcessStatus::Error;
            }
        };
        match catch_unwind(AssertUnwindSafe(|| {
            processor.process(left, right, events, out_events)
        })) {
            Ok(status) => status,
            Err(payload) => {
                self.panicked = true;
                log::error!(
                    "Organ processor panicked: {}",
                    panic_message::panic_message(&payload)
                );
                left.fill(0.0);
                right.fill(0.0);
                ProcessStatus::Error
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

const NOTE_PORT: NotePortInfo = NotePortInfo {
    id: 0,
    name: "Note Port",
    supported_dialects: &[NoteDialect::Clap],
    preferred_dialect: NoteDialect::Clap,
};

const AUDIO_PORT: AudioPortInfo = AudioPortInfo {
    id: 0,
    name: "Audio Output",
    channel_count: 2,
    is_main: true,
    in_place_pair: None,
};

impl NotePortsExtension for OrganPlugin {
    fn note_port_count(&self, is_input: bool) -> u32 {
        if is_input {
            1
        } else {
            0
        }
    }

    fn note_port_info(&self, index: u32, is_input: bool) -> Option<NotePortInfo> {
        (is_input && index == 0).then_some(NOTE_PORT)
    }
}

impl AudioPortsExtension for OrganPlugin {
    fn audio_port_count(&self, is_input: bool) -> u32 {
        if is_input {
            0
        } else {
            1
        }
    }

    fn audio_port_info(&self, index: u32, is_input: bool) -> Option<AudioPortInfo> {
        (!is_input && index == 0).then_some(AUDIO_PORT)
    }
}

impl ParamsExtension for OrganPlugin {
    fn parameter_count(&self) -> u32 {
        PARAMETER_COUNT as u32
    }

    fn parameter_info(&self, index: u32) -> Option<ParameterInfo> {
        let parameter = ParameterId::from_index(index as usize)?.descriptor();
        Some(ParameterInfo {
            id: index,
            name: parameter.name(),
            module: "",
            min_value: *parameter.range().start() as f64,
            max_value: *parameter.range().end() as f64,
            default_value: parameter.default_value() as f64,
            flags: parameter.flags(),
        })
    }

    fn parameter_value(&self, id: u32) -> Option<f64> {
        self.controller.parameter_value(id as usize)
    }

    fn value_to_text(&self, id: u32, value: f64) -> Option<String> {
        let parameter = ParameterId::from_index(id as usize)?.descriptor();
        Some(parameter.value_to_string(value))
    }

    fn text_to_value(&self, id: u32, text: &str) -> Option<f64> {
        let parameter = ParameterId::from_index(id as usize)?.descriptor();
        parameter.string_to_value(text)
    }

    fn flush(&mut self, events: &[TimedEvent], out_events: &mut dyn EventSink) {
        if let Some(processor) = self.processor.as_mut() {
            processor.flush(events, out_events);
            return;
        }
        // without stages, only the parameter values get updated
        let parameters = self.controller.parameters();
        parameters.flush_staged_into_live(|id, value, _| {
            push_event(
                out_events,
                OutputEvent::ParameterValue {
                    index: id.index() as u32,
                    value: value as f64,
                },
            );
        });
        for event in events {
            if let InputEvent::ParameterValue { index, value } = event.event {
                match ParameterId::from_index(index as usize) {
                    Some(id) => parameters.apply_from_audio(id, value as f32),
                    None => panic!("Invalid parameter index {index} in event"),
                }
            }
        }
    }
}

impl StateExtension for OrganPlugin {
    fn save_state(&self, mut stream: &mut dyn Write) -> bool {
        match self.controller.save(&mut stream) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Failed to save organ state: {err}");
                false
            }
        }
    }

    fn load_state(&mut self, mut stream: &mut dyn Read) -> bool {
        match self.controller.load(&mut stream) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Failed to load organ state: {err}");
                false
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
