use std::f32::consts::TAU;

use crate::{
    stage::{RotaryOutput, RotarySpeaker, RotarySpeedMode, RotorSpeed},
    Error,
};

// -------------------------------------------------------------------------------------------------

const CROSSOVER_HZ: f32 = 800.0;

#[derive(Debug, Clone, Copy)]
struct RotorConfig {
    /// Rotations per second for stop, slow and fast.
    speeds: [f32; 3],
    /// Time constant of speed changes in seconds.
    inertia: f32,
    /// Amplitude modulation depth.
    am_depth: f32,
    /// Stereo panning depth.
    pan_depth: f32,
}

const HORN: RotorConfig = RotorConfig {
    speeds: [0.0, 0.83, 6.7],
    inertia: 0.16,
    am_depth: 0.35,
    pan_depth: 0.6,
};

const DRUM: RotorConfig = RotorConfig {
    speeds: [0.0, 0.67, 5.7],
    inertia: 1.0,
    am_depth: 0.2,
    pan_depth: 0.3,
};

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Rotor {
    config: RotorConfig,
    angle: f32,
    speed: f32,
    target_speed: f32,
    smoothing: f32,
}

impl Rotor {
    fn new(config: RotorConfig) -> Self {
        let speed = config.speeds[RotorSpeed::default() as usize];
        Self {
            config,
            angle: 0.0,
            speed,
            target_speed: speed,
            smoothing: 0.0,
        }
    }

    fn initialize(&mut self, sample_rate: u32) {
        self.smoothing = 1.0 - (-1.0 / (self.config.inertia * sample_rate as f32)).exp();
    }

    fn set_speed(&mut self, speed: RotorSpeed) {
        self.target_speed = self.config.speeds[speed as usize];
    }

    /// Advance the rotor by one sample and return the left and right gains.
    #[inline]
    fn next_gains(&mut self, sample_period: f32) -> (f32, f32) {
        self.speed += (self.target_speed - self.speed) * self.smoothing;
        self.angle = (self.angle + self.speed * sample_period).fract();
        let rotation = (TAU * self.angle).sin();
        let amplitude = 1.0 - self.config.am_depth * 0.5 * (1.0 - rotation);
        let pan = self.config.pan_depth * rotation;
        (amplitude * (1.0 - pan) * 0.5, amplitude * (1.0 + pan) * 0.5)
    }
}

// -------------------------------------------------------------------------------------------------

/// Two-rotor rotary speaker: a one-pole crossover splits the signal into a bass drum and a
/// treble horn part, each amplitude modulated and panned by its own rotor.
///
/// Rotors accelerate and decelerate smoothly towards the selected speeds.
#[derive(Debug, Clone)]
pub struct WhirlSpeaker {
    sample_rate: u32,
    crossover: f32,
    lowpass_state: f32,
    horn: Rotor,
    drum: Rotor,
}

impl WhirlSpeaker {
    pub fn new() -> Self {
        Self {
            sample_rate: 0,
            crossover: 0.0,
            lowpass_state: 0.0,
            horn: Rotor::new(HORN),
            drum: Rotor::new(DRUM),
        }
    }
}

impl Default for WhirlSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

impl RotarySpeaker for WhirlSpeaker {
    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError(
                "rotary speaker needs a valid sample rate".to_string(),
            ));
        }
        self.sample_rate = sample_rate;
        self.crossover = 1.0 - (-TAU * CROSSOVER_HZ / sample_rate as f32).exp();
        self.horn.initialize(sample_rate);
        self.drum.initialize(sample_rate);
        Ok(())
    }

    fn set_speed_mode(&mut self, mode: RotarySpeedMode) {
        self.horn.set_speed(mode.horn);
        self.drum.set_speed(mode.drum);
    }

    fn process(&mut self, input: &[f32], output: RotaryOutput) {
        let RotaryOutput {
            left,
            right,
            drum_left,
            drum_right,
        } = output;
        if self.sample_rate == 0 {
            left.copy_from_slice(input);
            right.copy_from_slice(input);
            return;
        }
        let sample_period = 1.0 / self.sample_rate as f32;

        // drum (bass) part into the scratch buffers
        let mut lowpass = self.lowpass_state;
        for ((x, dl), dr) in input.iter().zip(drum_left.iter_mut()).zip(drum_right.iter_mut()) {
            lowpass += (x - lowpass) * self.crossover;
            let (gain_left, gain_right) = self.drum.next_gains(sample_period);
            *dl = lowpass * gain_left;
            *dr = lowpass * gain_right;
        }

        // horn (treble) part, mixed with the drum
        let mut lowpass = self.lowpass_state;
        for (index, ((x, l), r)) in input
            .iter()
            .zip(left.iter_mut())
            .zip(right.iter_mut())
            .enumerate()
        {
            lowpass += (x - lowpass) * self.crossover;
            let treble = x - lowpass;
            let (gain_left, gain_right) = self.horn.next_gains(sample_period);
            *l = treble * gain_left + drum_left[index];
            *r = treble * gain_right + drum_right[index];
        }
        self.lowpass_state = lowpass;
    }
}

// -------------------------------------------------------------------------------------------------
