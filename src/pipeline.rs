//! Fixed-size block rendering of the DSP stage chain.

use crate::{
    stage::{
        OverdrivePreamp, Preamp, Reverb, RotaryOutput, RotarySpeaker, SchroederReverb,
        TonewheelGenerator, ToneGenerator, WhirlSpeaker,
    },
    Error,
};

// -------------------------------------------------------------------------------------------------

/// The organ's DSP stages, in processing order.
pub struct DspStages {
    pub generator: Box<dyn ToneGenerator>,
    pub preamp: Box<dyn Preamp>,
    pub reverb: Box<dyn Reverb>,
    pub rotary: Box<dyn RotarySpeaker>,
}

impl DspStages {
    pub fn new(
        generator: Box<dyn ToneGenerator>,
        preamp: Box<dyn Preamp>,
        reverb: Box<dyn Reverb>,
        rotary: Box<dyn RotarySpeaker>,
    ) -> Self {
        Self {
            generator,
            preamp,
            reverb,
            rotary,
        }
    }

    /// Initialize all stages for the given sample rate. Called in non real-time threads.
    pub fn initialize(&mut self, sample_rate: u32) -> Result<(), Error> {
        self.generator.initialize(sample_rate)?;
        self.preamp.initialize(sample_rate)?;
        self.reverb.initialize(sample_rate)?;
        self.rotary.initialize(sample_rate)?;
        Ok(())
    }
}

impl Default for DspStages {
    /// The built-in tonewheel, overdrive, reverb and rotary speaker stages.
    fn default() -> Self {
        Self::new(
            Box::new(TonewheelGenerator::new()),
            Box::new(OverdrivePreamp::new()),
            Box::new(SchroederReverb::new()),
            Box::new(WhirlSpeaker::new()),
        )
    }
}

// -------------------------------------------------------------------------------------------------

/// Runs the DSP stages in fixed-size native blocks and serves the rendered blocks in slices of
/// arbitrary size.
///
/// Whenever the last rendered block got consumed, a new one is rendered by running the
/// generator, preamp, reverb and rotary speaker stages on a full native block. Splitting a
/// request into multiple smaller ones thus results in exactly the same output.
pub struct RenderPipeline {
    stages: DspStages,
    block_size: usize,
    /// Read position in the last rendered block. `block_size` when exhausted.
    offset: usize,
    generator_buffer: Vec<f32>,
    preamp_buffer: Vec<f32>,
    reverb_buffer: Vec<f32>,
    output_buffers: [Vec<f32>; 2],
    drum_buffers: [Vec<f32>; 2],
}

impl RenderPipeline {
    /// Create a new pipeline with the given, already initialized, stages.
    ///
    /// ### Panics
    /// When `block_size` is 0.
    pub fn new(stages: DspStages, block_size: usize) -> Self {
        assert!(block_size > 0, "Invalid render block size");
        Self {
            stages,
            block_size,
            offset: block_size,
            generator_buffer: vec![0.0; block_size],
            preamp_buffer: vec![0.0; block_size],
            reverb_buffer: vec![0.0; block_size],
            output_buffers: [vec![0.0; block_size], vec![0.0; block_size]],
            drum_buffers: [vec![0.0; block_size], vec![0.0; block_size]],
        }
    }

    /// The native block size of the DSP stages.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Access to the stages' control inputs.
    pub fn stages_mut(&mut self) -> &mut DspStages {
        &mut self.stages
    }

    /// Discard the remaining samples of the last rendered block.
    pub fn reset(&mut self) {
        self.offset = self.block_size;
    }

    /// Fill the given stereo output slices, rendering new blocks as needed.
    ///
    /// ### Panics
    /// When `left` and `right` differ in length.
    pub fn fill(&mut self, left: &mut [f32], right: &mut [f32]) {
        assert_eq!(left.len(), right.len(), "Output channel length mismatch");
        let frame_count = left.len();
        let mut written = 0;
        while written < frame_count {
            if self.offset >= self.block_size {
                self.render_block();
                self.offset = 0;
            }
            let count = (frame_count - written).min(self.block_size - self.offset);
            let range = self.offset..self.offset + count;
            left[written..written + count].copy_from_slice(&self.output_buffers[0][range.clone()]);
            right[written..written + count].copy_from_slice(&self.output_buffers[1][range]);
            written += count;
            self.offset += count;
        }
    }

    fn render_block(&mut self) {
        let [left, right] = &mut self.output_buffers;
        let [drum_left, drum_right] = &mut self.drum_buffers;
        self.stages.generator.generate(&mut self.generator_buffer);
        self.stages
            .preamp
            .process(&self.generator_buffer, &mut self.preamp_buffer);
        self.stages
            .reverb
            .process(&self.preamp_buffer, &mut self.reverb_buffer);
        self.stages.rotary.process(
            &self.reverb_buffer,
            RotaryOutput {
                left,
                right,
                drum_left,
                drum_right,
            },
        );
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::stage::{RotarySpeedMode, VibratoType};

    /// Calls recorded by the test stages.
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum StageCall {
        KeyOn(u8),
        KeyOff(u8),
        Drawbar(usize, u8),
        VibratoUpper(bool),
        VibratoType(VibratoType),
        Clean(bool),
        Character(f32),
        ReverbMix(f32),
        SpeedMode(RotarySpeedMode),
        Generate(usize),
    }

    pub(crate) type StageLog = Arc<Mutex<Vec<StageCall>>>;

    /// Generator which emits an ascending sample counter.
    pub(crate) struct CountingGenerator {
        pub(crate) log: StageLog,
        pub(crate) counter: f32,
    }

    impl ToneGenerator for CountingGenerator {
        fn initialize(&mut self, _sample_rate: u32) -> Result<(), Error> {
            Ok(())
        }
        fn key_on(&mut self, key: u8) {
            self.log.lock().unwrap().push(StageCall::KeyOn(key));
        }
        fn key_off(&mut self, key: u8) {
            self.log.lock().unwrap().push(StageCall::KeyOff(key));
        }
        fn set_drawbar(&mut self, drawbar: usize, level: u8) {
            self.log
                .lock()
                .unwrap()
                .push(StageCall::Drawbar(drawbar, level));
        }
        fn set_vibrato_upper(&mut self, enabled: bool) {
            self.log
                .lock()
                .unwrap()
                .push(StageCall::VibratoUpper(enabled));
        }
        fn set_vibrato_type(&mut self, vibrato_type: VibratoType) {
            self.log
                .lock()
                .unwrap()
                .push(StageCall::VibratoType(vibrato_type));
        }
        fn generate(&mut self, output: &mut [f32]) {
            self.log
                .lock()
                .unwrap()
                .push(StageCall::Generate(output.len()));
            for sample in output.iter_mut() {
                *sample = self.counter;
                self.counter += 1.0;
            }
        }
    }

    pub(crate) struct PassPreamp(pub(crate) StageLog);

    impl Preamp for PassPreamp {
        fn initialize(&mut self, _sample_rate: u32) -> Result<(), Error> {
            Ok(())
        }
        fn set_clean(&mut self, clean: bool) {
            self.0.lock().unwrap().push(StageCall::Clean(clean));
        }
        fn set_character(&mut self, character: f32) {
            self.0.lock().unwrap().push(StageCall::Character(character));
        }
        fn process(&mut self, input: &[f32], output: &mut [f32]) {
            output.copy_from_slice(input);
        }
    }

    pub(crate) struct PassReverb(pub(crate) StageLog);

    impl Reverb for PassReverb {
        fn initialize(&mut self, _sample_rate: u32) -> Result<(), Error> {
            Ok(())
        }
        fn set_mix(&mut self, mix: f32) {
            self.0.lock().unwrap().push(StageCall::ReverbMix(mix));
        }
        fn process(&mut self, input: &[f32], output: &mut [f32]) {
            output.copy_from_slice(input);
        }
    }

    /// Writes the input to the left and the negated input to the right channel.
    pub(crate) struct SplitRotary(pub(crate) StageLog);

    impl RotarySpeaker for SplitRotary {
        fn initialize(&mut self, _sample_rate: u32) -> Result<(), Error> {
            Ok(())
        }
        fn set_speed_mode(&mut self, mode: RotarySpeedMode) {
            self.0.lock().unwrap().push(StageCall::SpeedMode(mode));
        }
        fn process(&mut self, input: &[f32], output: RotaryOutput) {
            output.left.copy_from_slice(input);
            for (r, x) in output.right.iter_mut().zip(input) {
                *r = -x;
            }
        }
    }

    /// Create test stages which record their calls into the given log.
    pub(crate) fn recording_stages(log: &StageLog) -> DspStages {
        DspStages::new(
            Box::new(CountingGenerator {
                log: log.clone(),
                counter: 0.0,
            }),
            Box::new(PassPreamp(log.clone())),
            Box::new(PassReverb(log.clone())),
            Box::new(SplitRotary(log.clone())),
        )
    }

    /// Create recording test stages and their shared call log.
    pub(crate) fn test_stages() -> (DspStages, StageLog) {
        let log = StageLog::default();
        (recording_stages(&log), log)
    }

    fn generate_calls(log: &StageLog) -> usize {
        log.lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, StageCall::Generate(_)))
            .count()
    }

    #[test]
    fn fill_renders_whole_blocks() {
        let (stages, log) = test_stages();
        let mut pipeline = RenderPipeline::new(stages, 8);
        let (mut left, mut right) = (vec![0.0; 20], vec![0.0; 20]);
        pipeline.fill(&mut left, &mut right);
        assert_eq!(generate_calls(&log), 3);
        assert!(log
            .lock()
            .unwrap()
            .iter()
            .all(|call| *call == StageCall::Generate(8)));
        let expected: Vec<f32> = (0..20).map(|i| i as f32).collect();
        assert_eq!(left, expected);
        assert_eq!(right, expected.iter().map(|s| -s).collect::<Vec<_>>());

        // remaining 4 samples of the third block are served before rendering again
        let (mut left, mut right) = (vec![0.0; 4], vec![0.0; 4]);
        pipeline.fill(&mut left, &mut right);
        assert_eq!(generate_calls(&log), 3);
        assert_eq!(left, vec![20.0, 21.0, 22.0, 23.0]);
    }

    #[test]
    fn empty_fill_renders_nothing() {
        let (stages, log) = test_stages();
        let mut pipeline = RenderPipeline::new(stages, 8);
        pipeline.fill(&mut [], &mut []);
        assert_eq!(generate_calls(&log), 0);
    }

    #[test]
    fn block_splitting_is_transparent() {
        let total = 100;
        let (stages, _) = test_stages();
        let mut whole = RenderPipeline::new(stages, 16);
        let (mut whole_left, mut whole_right) = (vec![0.0; total], vec![0.0; total]);
        whole.fill(&mut whole_left, &mut whole_right);

        let (stages, _) = test_stages();
        let mut single = RenderPipeline::new(stages, 16);
        let (mut single_left, mut single_right) = (vec![0.0; total], vec![0.0; total]);
        for frame in 0..total {
            single.fill(
                &mut single_left[frame..frame + 1],
                &mut single_right[frame..frame + 1],
            );
        }

        let (stages, _) = test_stages();
        let mut uneven = RenderPipeline::new(stages, 16);
        let (mut uneven_left, mut uneven_right) = (vec![0.0; total], vec![0.0; total]);
        let mut start = 0;
        for size in [3, 17, 1, 32, 0, 40, 7] {
            let end = start + size;
            uneven.fill(
                &mut uneven_left[start..end],
                &mut uneven_right[start..end],
            );
            start = end;
        }
        assert_eq!(start, total);

        assert_eq!(whole_left, single_left);
        assert_eq!(whole_right, single_right);
        assert_eq!(whole_left, uneven_left);
        assert_eq!(whole_right, uneven_right);
    }

    #[test]
    fn reset_discards_pending_samples() {
        let (stages, _) = test_stages();
        let mut pipeline = RenderPipeline::new(stages, 8);
        let (mut left, mut right) = (vec![0.0; 3], vec![0.0; 3]);
        pipeline.fill(&mut left, &mut right);
        pipeline.reset();
        pipeline.fill(&mut left, &mut right);
        assert_eq!(left, vec![8.0, 9.0, 10.0]);
    }

    #[test]
    fn default_stages_render_sound() -> Result<(), Box<Error>> {
        let mut stages = DspStages::default();
        stages.initialize(44100)?;
        stages.generator.set_drawbar(2, 8);
        stages.generator.key_on(60);
        let mut pipeline = RenderPipeline::new(stages, 128);
        let (mut left, mut right) = (vec![0.0; 1000], vec![0.0; 1000]);
        pipeline.fill(&mut left, &mut right);
        assert!(left.iter().any(|s| s.abs() > 0.0));
        assert!(right.iter().any(|s| s.abs() > 0.0));
        assert!(left.iter().chain(right.iter()).all(|s| s.is_finite()));
        Ok(())
    }
}
