use crate::{stage::Reverb, Error};

// -------------------------------------------------------------------------------------------------

const COMB_DELAYS_MS: [f32; 4] = [29.7, 37.1, 41.1, 43.7];
const ALLPASS_DELAYS_MS: [f32; 2] = [5.0, 1.7];
const ALLPASS_GAIN: f32 = 0.7;
const DECAY_SECONDS: f32 = 1.5;

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct DelayLine {
    buffer: Vec<f32>,
    pos: usize,
}

impl DelayLine {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length.max(1)],
            pos: 0,
        }
    }

    /// Read the oldest sample and replace it with `input`.
    #[inline]
    fn exchange(&mut self, input: f32) -> f32 {
        let output = self.buffer[self.pos];
        self.buffer[self.pos] = input;
        self.pos += 1;
        if self.pos >= self.buffer.len() {
            self.pos = 0;
        }
        output
    }

    #[inline]
    fn front(&self) -> f32 {
        self.buffer[self.pos]
    }
}

// -------------------------------------------------------------------------------------------------

/// Mono Schroeder reverb: 4 parallel feedback combs followed by 2 series allpass filters.
///
/// Delay lines are allocated in [`initialize`](Reverb::initialize). Until then, the reverb
/// passes its input through.
#[derive(Debug, Clone)]
pub struct SchroederReverb {
    mix: f32,
    combs: Vec<(DelayLine, f32)>,
    allpasses: Vec<DelayLine>,
}

impl SchroederReverb {
    pub fn new() -> Self {
        Self {
            mix: 0.1,
            combs: Vec::new(),
            allpasses: Vec::new(),
        }
    }

    fn delay_samples(milliseconds: f32, sample_rate: u32) -> usize {
        (milliseconds * 0.001 * sample_rate as f32) as usize
    }
}

impl Default for SchroederReverb {
    fn default() -> Self {
        Self::new()
    }
}

impl Reverb for SchroederReverb {
    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError(
                "reverb needs a valid sample rate".to_string(),
            ));
        }
        self.combs = COMB_DELAYS_MS
            .iter()
            .map(|ms| {
                let length = Self::delay_samples(*ms, sample_rate).max(1);
                let feedback =
                    10.0f32.powf(-3.0 * length as f32 / (sample_rate as f32 * DECAY_SECONDS));
                (DelayLine::new(length), feedback)
            })
            .collect();
        self.allpasses = ALLPASS_DELAYS_MS
            .iter()
            .map(|ms| DelayLine::new(Self::delay_samples(*ms, sample_rate)))
            .collect();
        Ok(())
    }

    fn set_mix(&mut self, mix: f32) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        if self.combs.is_empty() {
            output.copy_from_slice(input);
            return;
        }
        let comb_scale = 1.0 / self.combs.len() as f32;
        for (o, x) in output.iter_mut().zip(input) {
            let mut wet = 0.0;
            for (comb, feedback) in self.combs.iter_mut() {
                let delayed = comb.front();
                comb.exchange(x + *feedback * delayed);
                wet += delayed;
            }
            wet *= comb_scale;
            for allpass in self.allpasses.iter_mut() {
                let delayed = allpass.front();
                let v = wet - ALLPASS_GAIN * delayed;
                allpass.exchange(v);
                wet = delayed + ALLPASS_GAIN * v;
            }
            *o = (1.0 - self.mix) * x + self.mix * wet;
        }
    }
}

// -------------------------------------------------------------------------------------------------
