//! Audio thread side of the organ: sample-accurate event handling and rendering.

use std::{ops::Range, sync::Arc};

use crate::{
    event::{push_event, EventSink, InputEvent, OutputEvent, TimedEvent},
    parameter::ParameterStore,
    pipeline::{DspStages, RenderPipeline},
    utils::assert_no_alloc,
    voice::VoiceTable,
    Error,
};

// -------------------------------------------------------------------------------------------------

pub(crate) mod dispatch;

use dispatch::EventProcessor;

// -------------------------------------------------------------------------------------------------

/// Options for creating a [`Processor`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessorOptions {
    /// By default 128. Native block size in frames the DSP stages are run with.
    pub block_size: usize,

    /// By default 128. Number of voices which can be tracked without allocating in the
    /// audio thread. The voice table still grows beyond this when needed.
    pub voice_capacity: usize,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            block_size: 128,
            voice_capacity: 128,
        }
    }
}

impl ProcessorOptions {
    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn voice_capacity(mut self, voice_capacity: usize) -> Self {
        self.voice_capacity = voice_capacity;
        self
    }

    /// Validate all options. Returns Error::ParameterError on errors.
    pub fn validate(&self) -> Result<(), Error> {
        if self.block_size == 0 || self.block_size > 8192 {
            return Err(Error::ParameterError(format!(
                "processor options 'block_size' value is '{}'",
                self.block_size
            )));
        }
        if self.voice_capacity == 0 {
            return Err(Error::ParameterError(format!(
                "processor options 'voice_capacity' value is '{}'",
                self.voice_capacity
            )));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// Result of a [`Processor::process`] call, as reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Processing succeeded, keep processing.
    Continue,
    /// Processing failed. The output got silenced.
    Error,
}

// -------------------------------------------------------------------------------------------------

/// Applies inbound events and renders audio in between them.
pub(crate) trait InterleavedProcess {
    fn process_event(&mut self, event: &InputEvent);
    fn render(&mut self, frames: Range<usize>);
}

/// Split `frame_count` frames at the given events' offsets: all events of an offset are applied
/// before the frames starting at that offset get rendered, and no rendered range crosses an
/// event's offset.
///
/// ### Panics
/// When events are not sorted by time or lie outside of `0..frame_count`.
pub(crate) fn process_interleaved(
    frame_count: usize,
    events: &[TimedEvent],
    process: &mut impl InterleavedProcess,
) {
    let mut event_index = 0;
    let mut frame = 0;
    while frame < frame_count {
        while let Some(event) = events
            .get(event_index)
            .filter(|event| event.time as usize == frame)
        {
            process.process_event(&event.event);
            event_index += 1;
        }
        let next_event_frame = match events.get(event_index) {
            Some(event) => {
                let time = event.time as usize;
                assert!(
                    time > frame && time < frame_count,
                    "Invalid event time {time} at frame {frame} of {frame_count}: \
                    events must be sorted and within the processed frame range"
                );
                time
            }
            None => frame_count,
        };
        process.render(frame..next_event_frame);
        frame = next_event_frame;
    }
}

// -------------------------------------------------------------------------------------------------

/// Mutable state of a single [`Processor::process`] call.
struct ProcessContext<'a> {
    parameters: &'a ParameterStore,
    voices: &'a mut VoiceTable,
    pipeline: &'a mut RenderPipeline,
    left: &'a mut [f32],
    right: &'a mut [f32],
}

impl InterleavedProcess for ProcessContext<'_> {
    fn process_event(&mut self, event: &InputEvent) {
        EventProcessor::new(self.parameters, self.voices, self.pipeline.stages_mut())
            .process_event(event);
    }

    fn render(&mut self, frames: Range<usize>) {
        self.pipeline
            .fill(&mut self.left[frames.clone()], &mut self.right[frames]);
    }
}

// -------------------------------------------------------------------------------------------------

/// The organ's real-time processor, which is owned and driven by the audio thread.
///
/// Every processing call first flushes parameter values which got staged by the control thread,
/// then applies the inbound note and parameter events sample-accurately while rendering, and
/// finally removes released voices, notifying the host about their end.
pub struct Processor {
    parameters: Arc<ParameterStore>,
    voices: VoiceTable,
    pipeline: RenderPipeline,
    sample_rate: u32,
}

impl Processor {
    /// Create a new processor. Initializes the given stages for the given sample rate and
    /// configures them with the store's current live values. Called in non real-time threads.
    pub fn new(
        parameters: Arc<ParameterStore>,
        mut stages: DspStages,
        sample_rate: u32,
        options: ProcessorOptions,
    ) -> Result<Self, Error> {
        options.validate()?;
        stages.initialize(sample_rate)?;
        parameters
            .with_live_values(|live| EventProcessor::route_all_parameters(&mut stages, live));
        log::debug!(
            "Created organ processor: {} Hz, block size {}",
            sample_rate,
            options.block_size
        );
        Ok(Self {
            parameters,
            voices: VoiceTable::with_capacity(options.voice_capacity),
            pipeline: RenderPipeline::new(stages, options.block_size),
            sample_rate,
        })
    }

    /// The sample rate the stages got initialized with.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The native block size of the DSP stages.
    pub fn block_size(&self) -> usize {
        self.pipeline.block_size()
    }

    /// The shared parameter store.
    pub fn parameters(&self) -> &Arc<ParameterStore> {
        &self.parameters
    }

    /// Currently sounding or released, not yet reaped voices.
    pub fn voices(&self) -> &VoiceTable {
        &self.voices
    }

    /// Process one block of audio. `events` must be sorted by time, with times in range
    /// `0..left.len()`. Outbound events are pushed into `out_events`.
    ///
    /// ### Panics
    /// When `left` and `right` differ in length or on event contract violations.
    pub fn process(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        events: &[TimedEvent],
        out_events: &mut dyn EventSink,
    ) -> ProcessStatus {
        assert_eq!(left.len(), right.len(), "Output channel length mismatch");
        assert_no_alloc(|| {
            self.flush_parameters(out_events);
            let frame_count = left.len();
            let mut context = ProcessContext {
                parameters: &self.parameters,
                voices: &mut self.voices,
                pipeline: &mut self.pipeline,
                left,
                right,
            };
            process_interleaved(frame_count, events, &mut context);
            self.voices.reap_released_voices(out_events);
        });
        ProcessStatus::Continue
    }

    /// Flush staged parameters and apply the given events without rendering audio.
    /// Event times are ignored.
    pub fn flush(&mut self, events: &[TimedEvent], out_events: &mut dyn EventSink) {
        self.flush_parameters(out_events);
        let mut event_processor = EventProcessor::new(
            &self.parameters,
            &mut self.voices,
            self.pipeline.stages_mut(),
        );
        for event in events {
            event_processor.process_event(&event.event);
        }
    }

    /// Release all keys and drop all voices, without notifying the host, and discard pending
    /// rendered samples.
    pub fn reset(&mut self) {
        let generator = &mut self.pipeline.stages_mut().generator;
        for voice in self.voices.iter() {
            if (0..128).contains(&voice.key()) {
                generator.key_off(voice.key() as u8);
            }
        }
        self.voices.clear();
        self.pipeline.reset();
    }

    /// Copy dirty staged values into the live slot, route them to the stages and echo them to
    /// the host.
    fn flush_parameters(&mut self, out_events: &mut dyn EventSink) {
        let stages = self.pipeline.stages_mut();
        self.parameters.flush_staged_into_live(|id, value, live| {
            EventProcessor::route_parameter(stages, id, value, live);
            push_event(
                out_events,
                OutputEvent::ParameterValue {
                    index: id.index() as u32,
                    value: value as f64,
                },
            );
        });
    }
}

// -------------------------------------------------------------------------------------------------
