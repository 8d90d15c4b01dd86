//! Block processing interfaces of the organ's DSP stages.
//!
//! The render pipeline drives one stage of each kind in a fixed order: tone generator, preamp,
//! reverb and rotary speaker. Stages always process one complete native block at once.
//!
//! NB: all functions, except `initialize`, are called in the real-time audio thread, so they
//! must not block or allocate.

use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::Error;

// -------------------------------------------------------------------------------------------------

pub mod overdrive;
pub mod reverb;
pub mod tonewheel;
pub mod whirl;

pub use overdrive::OverdrivePreamp;
pub use reverb::SchroederReverb;
pub use tonewheel::TonewheelGenerator;
pub use whirl::WhirlSpeaker;

// -------------------------------------------------------------------------------------------------

/// Scanner vibrato and chorus settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumCount, EnumIter, FromRepr)]
#[repr(u8)]
pub enum VibratoType {
    #[default]
    V1 = 0,
    V2,
    V3,
    C1,
    C2,
    C3,
}

impl VibratoType {
    /// Select a type from a floored parameter value, clamping out of range values.
    pub fn from_value(value: f32) -> Self {
        let index = value.floor().clamp(0.0, (Self::COUNT - 1) as f32) as u8;
        Self::from_repr(index).unwrap_or_default()
    }

    /// True for the chorus settings, which mix the vibrato with the dry signal.
    pub fn is_chorus(self) -> bool {
        matches!(self, Self::C1 | Self::C2 | Self::C3)
    }

    /// Vibrato depth level in range `1..=3`.
    pub fn depth(self) -> u8 {
        match self {
            Self::V1 | Self::C1 => 1,
            Self::V2 | Self::C2 => 2,
            Self::V3 | Self::C3 => 3,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Rotor speed setting of the rotary speaker's drum or horn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumCount, EnumIter, FromRepr)]
#[repr(u8)]
pub enum RotorSpeed {
    Stop = 0,
    #[default]
    Slow,
    Fast,
}

impl RotorSpeed {
    /// Select a speed from a floored parameter value, clamping out of range values.
    pub fn from_value(value: f32) -> Self {
        let index = value.floor().clamp(0.0, (Self::COUNT - 1) as f32) as u8;
        Self::from_repr(index).unwrap_or_default()
    }
}

/// Combined drum and horn speed selection of the rotary speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RotarySpeedMode {
    pub drum: RotorSpeed,
    pub horn: RotorSpeed,
}

impl RotarySpeedMode {
    /// Number of distinct speed modes.
    pub const COUNT: usize = RotorSpeed::COUNT * RotorSpeed::COUNT;

    pub const fn new(drum: RotorSpeed, horn: RotorSpeed) -> Self {
        Self { drum, horn }
    }

    /// Combine the drum and horn parameter values into one mode.
    pub fn from_values(drum: f32, horn: f32) -> Self {
        Self::new(RotorSpeed::from_value(drum), RotorSpeed::from_value(horn))
    }

    /// Resolve a combined mode index as produced by [`index`](Self::index).
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= Self::COUNT {
            return None;
        }
        let drum = RotorSpeed::from_repr((index % RotorSpeed::COUNT) as u8)?;
        let horn = RotorSpeed::from_repr((index / RotorSpeed::COUNT) as u8)?;
        Some(Self::new(drum, horn))
    }

    /// Combined mode index: `drum + 3 * horn`.
    pub fn index(self) -> usize {
        self.drum as usize + RotorSpeed::COUNT * self.horn as usize
    }
}

// -------------------------------------------------------------------------------------------------

/// Generates the raw organ signal from the currently pressed keys.
pub trait ToneGenerator: Send {
    /// Prepare the generator for the given sample rate. Called in non real-time threads.
    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error>;

    fn key_on(&mut self, key: u8);
    fn key_off(&mut self, key: u8);

    /// Set a drawbar's level in range `0..=8`.
    fn set_drawbar(&mut self, drawbar: usize, level: u8);
    /// Enable or disable the vibrato of the upper manual.
    fn set_vibrato_upper(&mut self, enabled: bool);
    fn set_vibrato_type(&mut self, vibrato_type: VibratoType);

    /// Render one native block into `output`.
    fn generate(&mut self, output: &mut [f32]);
}

/// Preamp and overdrive stage.
pub trait Preamp: Send {
    /// Prepare the preamp for the given sample rate. Called in non real-time threads.
    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error>;

    /// Bypass the overdrive when `clean` is set.
    fn set_clean(&mut self, clean: bool);
    /// Set the overdrive character in range `0.0..=1.0`.
    fn set_character(&mut self, character: f32);

    /// Process one native block from `input` into `output`.
    fn process(&mut self, input: &[f32], output: &mut [f32]);
}

/// Reverb stage.
pub trait Reverb: Send {
    /// Prepare the reverb for the given sample rate. Called in non real-time threads.
    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error>;

    /// Set the wet/dry mix in range `0.0..=1.0`.
    fn set_mix(&mut self, mix: f32);

    /// Process one native block from `input` into `output`.
    fn process(&mut self, input: &[f32], output: &mut [f32]);
}

/// Output buffers of a [`RotarySpeaker`]: the stereo output and a scratch pair for the drum.
pub struct RotaryOutput<'a> {
    pub left: &'a mut [f32],
    pub right: &'a mut [f32],
    pub drum_left: &'a mut [f32],
    pub drum_right: &'a mut [f32],
}

/// Rotary speaker stage, producing the final stereo signal.
pub trait RotarySpeaker: Send {
    /// Prepare the speaker for the given sample rate. Called in non real-time threads.
    fn initialize(&mut self, sample_rate: u32) -> Result<(), Error>;

    fn set_speed_mode(&mut self, mode: RotarySpeedMode);

    /// Process one native block from `input` into the stereo `output`.
    fn process(&mut self, input: &[f32], output: RotaryOutput);
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotary_mode_index() {
        let mode = RotarySpeedMode::from_values(1.0, 1.0);
        assert_eq!(mode, RotarySpeedMode::new(RotorSpeed::Slow, RotorSpeed::Slow));
        assert_eq!(mode.index(), 4);
        assert_eq!(RotarySpeedMode::from_values(2.99, 0.0).index(), 2);
        assert_eq!(RotarySpeedMode::from_values(0.0, 2.5).index(), 6);
        for index in 0..RotarySpeedMode::COUNT {
            assert_eq!(RotarySpeedMode::from_index(index).map(|m| m.index()), Some(index));
        }
        assert_eq!(RotarySpeedMode::from_index(9), None);
    }

    #[test]
    fn vibrato_type_from_value() {
        assert_eq!(VibratoType::from_value(0.0), VibratoType::V1);
        assert_eq!(VibratoType::from_value(3.7), VibratoType::C1);
        assert_eq!(VibratoType::from_value(5.99), VibratoType::C3);
        assert_eq!(VibratoType::from_value(12.0), VibratoType::C3);
        assert!(VibratoType::C2.is_chorus());
        assert_eq!(VibratoType::V3.depth(), 3);
    }
}
