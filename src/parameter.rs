//! Organ parameter descriptors and the shared parameter store.

use strum::{Display, EnumCount, EnumIter, FromRepr, IntoEnumIterator};

// -------------------------------------------------------------------------------------------------

mod float;
pub use float::{FloatParameter, ParameterFlags};

pub mod store;
pub use store::ParameterStore;

// -------------------------------------------------------------------------------------------------

/// Describes how a [`FloatParameter`]'s value gets interpreted by the DSP stages.
///
/// All parameter values are stored as floats. Discrete types only tell how the value gets
/// quantized before it's applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    /// A continuous floating-point value.
    Float,
    /// A discrete value, rounded to the nearest integer.
    Integer,
    /// A choice from a list of names, selected by flooring the value.
    Enum { values: &'static [&'static str] },
    /// A toggle, rounded to 0 or 1.
    Boolean,
}

// -------------------------------------------------------------------------------------------------

/// Dense parameter index, in declared parameter order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumCount, EnumIter,
    FromRepr,
)]
#[repr(usize)]
pub enum ParameterId {
    Drawbar0 = 0,
    Drawbar1,
    Drawbar2,
    Drawbar3,
    Drawbar4,
    Drawbar5,
    Drawbar6,
    Drawbar7,
    Drawbar8,
    Vibrato,
    VibratoType,
    Drum,
    Horn,
    Overdrive,
    Character,
    Reverb,
}

/// Number of organ parameters.
pub const PARAMETER_COUNT: usize = ParameterId::COUNT;

/// Number of drawbars, which occupy the first parameter indices.
pub const DRAWBAR_COUNT: usize = 9;

/// A full set of parameter values, indexed by [`ParameterId::index`].
pub type ParameterValues = [f32; PARAMETER_COUNT];

impl ParameterId {
    /// Resolve a raw host parameter index. Returns `None` for out of range indices.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::from_repr(index)
    }

    /// The dense index of the parameter.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The drawbar number, when this is a drawbar parameter.
    pub const fn drawbar(self) -> Option<usize> {
        if self.index() < DRAWBAR_COUNT {
            Some(self.index())
        } else {
            None
        }
    }

    /// The parameter's static descriptor.
    pub fn descriptor(self) -> &'static FloatParameter {
        &PARAMETERS[self.index()]
    }

    /// Iterate over all parameter ids in declared order.
    pub fn all() -> impl Iterator<Item = ParameterId> {
        Self::iter()
    }
}

// -------------------------------------------------------------------------------------------------

/// Scanner vibrato/chorus setting names, selected by the vibrato type parameter.
pub const VIBRATO_TYPE_NAMES: &[&str] = &["V1", "V2", "V3", "C1", "C2", "C3"];
/// Rotor speed names, selected by the drum and horn parameters.
pub const ROTOR_SPEED_NAMES: &[&str] = &["Stop", "Slow", "Fast"];

const DRAWBAR_RANGE: std::ops::RangeInclusive<f32> = 0.0..=8.0;

const fn drawbar(id: ParameterId, name: &'static str, default: f32) -> FloatParameter {
    FloatParameter::new(id, name, DRAWBAR_RANGE, default).with_type(ParameterType::Integer)
}

/// Static parameter descriptor table, in declared parameter order.
pub static PARAMETERS: [FloatParameter; PARAMETER_COUNT] = [
    drawbar(ParameterId::Drawbar0, "Drawbar 0", 7.0),
    drawbar(ParameterId::Drawbar1, "Drawbar 1", 8.0),
    drawbar(ParameterId::Drawbar2, "Drawbar 2", 8.0),
    drawbar(ParameterId::Drawbar3, "Drawbar 3", 0.0),
    drawbar(ParameterId::Drawbar4, "Drawbar 4", 0.0),
    drawbar(ParameterId::Drawbar5, "Drawbar 5", 0.0),
    drawbar(ParameterId::Drawbar6, "Drawbar 6", 0.0),
    drawbar(ParameterId::Drawbar7, "Drawbar 7", 0.0),
    drawbar(ParameterId::Drawbar8, "Drawbar 8", 0.0),
    FloatParameter::new(ParameterId::Vibrato, "Vibrato on/off", 0.0..=1.0, 0.0)
        .with_type(ParameterType::Boolean),
    FloatParameter::new(ParameterId::VibratoType, "Vibrato type", 0.0..=5.99, 0.0).with_type(
        ParameterType::Enum {
            values: VIBRATO_TYPE_NAMES,
        },
    ),
    FloatParameter::new(ParameterId::Drum, "Drum", 0.0..=2.99, 1.0).with_type(
        ParameterType::Enum {
            values: ROTOR_SPEED_NAMES,
        },
    ),
    FloatParameter::new(ParameterId::Horn, "Horn", 0.0..=2.99, 1.0).with_type(
        ParameterType::Enum {
            values: ROTOR_SPEED_NAMES,
        },
    ),
    FloatParameter::new(ParameterId::Overdrive, "Overdrive on/off", 0.0..=1.0, 0.0)
        .with_type(ParameterType::Boolean),
    FloatParameter::new(ParameterId::Character, "Character", 0.0..=1.0, 0.0),
    FloatParameter::new(ParameterId::Reverb, "Reverb wet/dry", 0.0..=1.0, 0.1),
];

/// All parameter default values, in declared parameter order.
pub fn default_values() -> ParameterValues {
    let mut values = [0.0; PARAMETER_COUNT];
    for (value, parameter) in values.iter_mut().zip(PARAMETERS.iter()) {
        *value = parameter.default_value();
    }
    values
}

// -------------------------------------------------------------------------------------------------
