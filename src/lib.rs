#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod controller;
mod error;
mod event;
mod parameter;
mod pipeline;
mod plugin;
mod processor;
mod state;
mod utils;
mod voice;

// public, flat re-exports
pub use error::Error;

pub use controller::Controller;
pub use event::{
    EventSink, InputEvent, NoteMatch, NullEventSink, OutputEvent, TimedEvent, WILDCARD,
};
pub use parameter::{
    default_values, FloatParameter, ParameterFlags, ParameterId, ParameterStore, ParameterType,
    ParameterValues, DRAWBAR_COUNT, PARAMETERS, PARAMETER_COUNT,
};
pub use pipeline::{DspStages, RenderPipeline};
pub use plugin::{
    AudioPortInfo, AudioPortsExtension, Extension, NoteDialect, NotePortInfo,
    NotePortsExtension, OrganPlugin, ParameterInfo, ParamsExtension, PluginDescriptor,
    StageFactory, StateExtension, PLUGIN_DESCRIPTOR,
};
pub use processor::{ProcessStatus, Processor, ProcessorOptions};
pub use state::{decode_state, encode_state, load_state, save_state, STATE_SIZE};
pub use voice::{Voice, VoiceTable};

// public mods
pub mod stage;
