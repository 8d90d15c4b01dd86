use std::f64::consts::TAU;

use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::{
    parameter::DRAWBAR_COUNT,
    stage::{ToneGenerator, VibratoType},
    Error,
};

// -------------------------------------------------------------------------------------------------

const KEY_COUNT: usize = 128;

/// Harmonic ratios of the drawbars, relative to the 8' fundamental:
/// 16', 5 1/3', 8', 4', 2 2/3', 2', 1 3/5', 1 1/3', 1'.
const DRAWBAR_RATIOS: [f64; DRAWBAR_COUNT] = [0.5, 1.5, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0];

/// Phases wrap at 2, the common period of all drawbar ratios.
const PHASE_PERIOD: f64 = 2.0;

const MAX_DRAWBAR_LEVEL: u8 = 8;
const KEY_RAMP_SECONDS: f32 = 0.005;
const OUTPUT_GAIN: f32 = 0.08;

const VIBRATO_RATE: f64 = 6.86;
const VIBRATO_DEPTHS: [f64; 3] = [0.003, 0.006, 0.009];

// -------------------------------------------------------------------------------------------------

/// Additive drawbar organ generator with one free running tonewheel per key.
///
/// Keys fade in and out with a short linear ramp to avoid clicks. The scanner vibrato is
/// approximated by a sine LFO pitch modulation, the chorus settings mix the modulated signal
/// with the unmodulated one.
#[derive(Debug, Clone)]
pub struct TonewheelGenerator {
    sample_rate: u32,
    key_pressed: [bool; KEY_COUNT],
    key_gain: [f32; KEY_COUNT],
    phase: [f64; KEY_COUNT],
    dry_phase: [f64; KEY_COUNT],
    drawbar_gain: [f32; DRAWBAR_COUNT],
    vibrato_enabled: bool,
    vibrato_type: VibratoType,
    vibrato_phase: f64,
}

impl TonewheelGenerator {
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            key_pressed: [false; KEY_COUNT],
            key_gain: [0.0; KEY_COUNT],
            phase: [0.0; KEY_COUNT],
            dry_phase: [0.0; KEY_COUNT],
            drawbar_gain: [0.0; DRAWBAR_COUNT],
            vibrato_enabled: false,
            vibrato_type: VibratoType::default(),
            vibrato_phase: 0.0,
        }
    }

    fn key_frequency(key: usize) -> f64 {
        440.0 * 2.0f64.powf((key as f64 - 69.0) / 12.0)
    }

    #[inline]
    fn wheel_sample(drawbar_gain: &[f32; DRAWBAR_COUNT], phase: f64) -> f32 {
        let mut sum = 0.0;
        for (gain, ratio) in drawbar_gain.iter().zip(DRAWBAR_RATIOS) {
            if *gain > 0.0 {
                sum += gain * (TAU * phase * ratio).sin() as f32;
            }
        }
        sum
    }

    #[inline]
    fn advance(phase: &mut f64, increment: f64) {
        *phase += increment;
        if *phase >= PHASE_PERIOD {
            *phase -= PHASE_PERIOD;
        }
    }
}

impl Default for TonewheelGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneGenerator for TonewheelGenerator {
    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError(
                "tonewheel generator needs a valid sample rate".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        // tonewheels never are in phase on a real organ
        let mut rng = SmallRng::seed_from_u64(0x5eed_0f_b3);
        for (phase, dry_phase) in self.phase.iter_mut().zip(self.dry_phase.iter_mut()) {
            *phase = rng.random_range(0.0..PHASE_PERIOD);
            *dry_phase = *phase;
        }
        Ok(())
    }

    fn key_on(&mut self, key: u8) {
        if let Some(pressed) = self.key_pressed.get_mut(key as usize) {
            *pressed = true;
        }
    }

    fn key_off(&mut self, key: u8) {
        if let Some(pressed) = self.key_pressed.get_mut(key as usize) {
            *pressed = false;
        }
    }

    fn set_drawbar(&mut self, drawbar: usize, level: u8) {
        if let Some(gain) = self.drawbar_gain.get_mut(drawbar) {
            *gain = level.min(MAX_DRAWBAR_LEVEL) as f32 / MAX_DRAWBAR_LEVEL as f32;
        }
    }

    fn set_vibrato_upper(&mut self, enabled: bool) {
        self.vibrato_enabled = enabled;
    }

    fn set_vibrato_type(&mut self, vibrato_type: VibratoType) {
        self.vibrato_type = vibrato_type;
    }

    fn generate(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        if self.sample_rate == 0 {
            return;
        }
        let sample_rate = self.sample_rate as f64;
        let ramp_step = 1.0 / (KEY_RAMP_SECONDS * self.sample_rate as f32);
        let vibrato_depth = VIBRATO_DEPTHS[self.vibrato_type.depth() as usize - 1];
        let chorus = self.vibrato_enabled && self.vibrato_type.is_chorus();

        // vibrato lfo is shared by all keys
        let vibrato_start = self.vibrato_phase;
        let vibrato_increment = VIBRATO_RATE / sample_rate;

        for key in 0..KEY_COUNT {
            let pressed = self.key_pressed[key];
            if !pressed && self.key_gain[key] <= 0.0 {
                continue;
            }
            let increment = Self::key_frequency(key) / sample_rate;
            let mut vibrato_phase = vibrato_start;
            for sample in output.iter_mut() {
                let gain = &mut self.key_gain[key];
                *gain = if pressed {
                    (*gain + ramp_step).min(1.0)
                } else {
                    (*gain - ramp_step).max(0.0)
                };
                let mut value = if self.vibrato_enabled {
                    let modulation = 1.0 + vibrato_depth * (TAU * vibrato_phase).sin();
                    Self::advance(&mut self.phase[key], increment * modulation);
                    Self::wheel_sample(&self.drawbar_gain, self.phase[key])
                } else {
                    Self::advance(&mut self.phase[key], increment);
                    Self::wheel_sample(&self.drawbar_gain, self.phase[key])
                };
                if chorus {
                    Self::advance(&mut self.dry_phase[key], increment);
                    let dry = Self::wheel_sample(&self.drawbar_gain, self.dry_phase[key]);
                    value = 0.5 * (value + dry);
                }
                *sample += value * *gain * OUTPUT_GAIN;
                vibrato_phase = (vibrato_phase + vibrato_increment).fract();
            }
        }
        self.vibrato_phase =
            (vibrato_start + vibrato_increment * output.len() as f64).fract();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> TonewheelGenerator {
        let mut generator = TonewheelGenerator::new();
        generator.initialize(44100).unwrap();
        generator.set_drawbar(2, 8);
        generator
    }

    #[test]
    fn silent_without_keys() {
        let mut generator = generator();
        let mut output = vec![1.0; 128];
        generator.generate(&mut output);
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn key_fades_in_and_out() {
        let mut generator = generator();
        let mut output = vec![0.0; 1024];
        generator.key_on(69);
        generator.generate(&mut output);
        assert!(output.iter().any(|s| s.abs() > 0.01));
        assert!(output.iter().all(|s| s.abs() <= 1.0));

        generator.key_off(69);
        generator.generate(&mut output);
        // release ramp is shorter than one block
        generator.generate(&mut output);
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn drawbars_off_are_silent() {
        let mut generator = generator();
        generator.set_drawbar(2, 0);
        generator.key_on(60);
        let mut output = vec![0.0; 256];
        generator.generate(&mut output);
        assert!(output.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn requires_sample_rate() {
        let mut generator = TonewheelGenerator::new();
        assert!(generator.initialize(0).is_err());
        let mut output = vec![1.0; 16];
        generator.key_on(60);
        generator.generate(&mut output);
        assert!(output.iter().all(|s| *s == 0.0));
    }
}
