use crate::{stage::Preamp, Error};

// -------------------------------------------------------------------------------------------------

/// Tube-like preamp with a cubic soft clipper.
///
/// When clean, the input passes through unchanged. The character controls how hard the signal
/// is driven into the clipper.
#[derive(Debug, Clone)]
pub struct OverdrivePreamp {
    clean: bool,
    character: f32,
}

impl OverdrivePreamp {
    pub fn new() -> Self {
        Self {
            clean: true,
            character: 0.0,
        }
    }

    #[inline]
    fn soft_clip(sample: f32, drive: f32) -> f32 {
        const BOOST_FACTOR: f32 = 15.0;
        let gain = 1.0 + drive * drive * (BOOST_FACTOR - 1.0);
        let gain_compensation = 1.0 - (drive / 2.0).powi(2) * 2.0;
        let amplified_sample = sample * gain;
        if amplified_sample >= 1.0 {
            gain_compensation
        } else if amplified_sample > -1.0 {
            (3.0 / 2.0) * (amplified_sample - amplified_sample.powi(3) / 3.0) * gain_compensation
        } else {
            -gain_compensation
        }
    }
}

impl Default for OverdrivePreamp {
    fn default() -> Self {
        Self::new()
    }
}

impl Preamp for OverdrivePreamp {
    fn initialize(&mut self, _sample_rate: u32) -> Result<(), Error> {
        Ok(())
    }

    fn set_clean(&mut self, clean: bool) {
        self.clean = clean;
    }

    fn set_character(&mut self, character: f32) {
        self.character = character.clamp(0.0, 1.0);
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        if self.clean {
            output.copy_from_slice(input);
        } else {
            let drive = self.character;
            for (o, i) in output.iter_mut().zip(input) {
                *o = Self::soft_clip(*i, drive);
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
