//! Renders a short organ chord into a wav file.

use std::path::PathBuf;

use arg::{parse_args, Args};
use hound::{SampleFormat, WavSpec, WavWriter};

use tonewheel::{
    Error, EventSink, InputEvent, NoteMatch, OrganPlugin, OutputEvent, ParameterId,
    ProcessStatus, TimedEvent,
};

// -------------------------------------------------------------------------------------------------

#[cfg(feature = "assert-allocs")]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

const DEFAULT_LOG_LEVEL: log::Level = if cfg!(debug_assertions) {
    log::Level::Debug
} else {
    log::Level::Warn
};

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_DURATION: f32 = 4.0;
const BLOCK_SIZE: usize = 256;

const CHORD: [i16; 4] = [48, 55, 60, 64];

// -------------------------------------------------------------------------------------------------

#[derive(Args, Debug, Default)]
struct Arguments {
    #[arg(short = "o", long = "output")]
    /// Path of the wav file to write. By default \"organ.wav\".
    output_path: Option<PathBuf>,
    #[arg(short = "r", long = "sample-rate")]
    /// Sample rate of the rendered file. By default 44100.
    sample_rate: Option<u32>,
    #[arg(short = "d", long = "duration")]
    /// Duration of the rendered file in seconds. By default 4.
    duration: Option<f32>,
    #[arg(long = "overdrive")]
    /// Enable the overdrive preamp.
    overdrive: bool,
    #[arg(short = "l", long = "log-level")]
    /// Set logging level to \"debug\", \"info\", \"warn\" or \"error\".
    /// By default \"debug\" in dev builds and \"warn\" in release builds.
    log_level: Option<log::Level>,
}

// -------------------------------------------------------------------------------------------------

/// Counts note end events, as a host would use them to free its note ids.
#[derive(Default)]
struct NoteEndCounter {
    ended: usize,
}

impl EventSink for NoteEndCounter {
    fn try_push(&mut self, event: OutputEvent) -> bool {
        if matches!(event, OutputEvent::NoteEnd { .. }) {
            self.ended += 1;
        }
        true
    }
}

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Error> {
    let args = parse_args::<Arguments>();

    simple_logger::SimpleLogger::new()
        .with_level(args.log_level.unwrap_or(DEFAULT_LOG_LEVEL).to_level_filter())
        .init()
        .expect("Failed to set logger");

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("organ.wav"));
    let sample_rate = args.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE);
    let duration = args.duration.unwrap_or(DEFAULT_DURATION).max(0.5);

    // create and configure the organ
    let mut plugin = OrganPlugin::new();
    plugin.activate(sample_rate as f64, 1, BLOCK_SIZE as u32)?;
    plugin.start_processing();

    let controller = plugin.controller().clone();
    for (drawbar, level) in [8.0, 8.0, 6.0, 4.0, 0.0, 0.0, 2.0, 0.0, 0.0]
        .into_iter()
        .enumerate()
    {
        if let Some(id) = ParameterId::from_index(drawbar) {
            controller.set_parameter(id, level);
        }
    }
    controller.set_parameter(ParameterId::Vibrato, 1.0);
    controller.set_parameter(ParameterId::VibratoType, 5.0);
    controller.set_parameter(ParameterId::Reverb, 0.2);
    if args.overdrive {
        controller.set_parameter(ParameterId::Overdrive, 1.0);
        controller.set_parameter(ParameterId::Character, 0.6);
    }

    // render
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&output_path, spec)
        .map_err(|err| Error::ParameterError(format!("Failed to create wav file: {err}")))?;

    let total_frames = (duration * sample_rate as f32) as usize;
    let release_frame = total_frames * 3 / 4;
    let speed_up_frame = total_frames / 3;

    let (mut left, mut right) = (vec![0.0; BLOCK_SIZE], vec![0.0; BLOCK_SIZE]);
    let mut events = Vec::with_capacity(CHORD.len());
    let mut out_events = NoteEndCounter::default();

    let mut frame = 0;
    while frame < total_frames {
        let frame_count = (total_frames - frame).min(BLOCK_SIZE);
        let block = frame..frame + frame_count;

        events.clear();
        for (note_id, key) in CHORD.into_iter().enumerate() {
            let note = NoteMatch::new(key, 0, note_id as i32);
            if block.start == 0 {
                events.push(TimedEvent::new(0, InputEvent::NoteOn(note)));
            }
            if block.contains(&release_frame) {
                let offset = (release_frame - frame) as u32;
                events.push(TimedEvent::new(offset, InputEvent::NoteOff(note)));
            }
        }
        if block.contains(&speed_up_frame) {
            // fast horn, fast drum
            controller.set_parameter(ParameterId::Drum, 2.0);
            controller.set_parameter(ParameterId::Horn, 2.0);
        }

        let status = plugin.process(
            &mut left[..frame_count],
            &mut right[..frame_count],
            &events,
            &mut out_events,
        );
        if status == ProcessStatus::Error {
            log::error!("Organ processing failed");
            break;
        }
        for (l, r) in left[..frame_count].iter().zip(&right[..frame_count]) {
            writer
                .write_sample(*l * 0.5)
                .and_then(|_| writer.write_sample(*r * 0.5))
                .map_err(|err| Error::ParameterError(format!("Failed to write wav file: {err}")))?;
        }
        frame += frame_count;
    }

    writer
        .finalize()
        .map_err(|err| Error::ParameterError(format!("Failed to finalize wav file: {err}")))?;

    plugin.stop_processing();
    plugin.deactivate();

    log::info!(
        "Rendered {:.1} seconds into '{}', {} notes ended",
        duration,
        output_path.display(),
        out_events.ended
    );
    Ok(())
}
