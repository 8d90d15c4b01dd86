use std::ops::{BitOr, RangeInclusive};

use super::{ParameterId, ParameterType};

// -------------------------------------------------------------------------------------------------

/// Host facing capability flags of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParameterFlags(u32);

impl ParameterFlags {
    pub const NONE: Self = Self(0);
    /// The host may automate the parameter with value events.
    pub const AUTOMATABLE: Self = Self(1 << 0);
    /// The host may send per-note modulation events for the parameter.
    pub const MODULATABLE: Self = Self(1 << 1);

    /// Raw flag bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when all flags in `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for ParameterFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

// -------------------------------------------------------------------------------------------------

/// A float parameter descriptor.
///
/// Values are always stored and exchanged as plain floats within the parameter's range. The
/// [`ParameterType`] defines how a value gets quantized before it's applied to the DSP stages.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatParameter {
    id: ParameterId,
    name: &'static str,
    range: RangeInclusive<f32>,
    default: f32,
    flags: ParameterFlags,
    parameter_type: ParameterType,
}

impl FloatParameter {
    /// Create a new, automatable and modulatable continuous float parameter descriptor.
    pub const fn new(
        id: ParameterId,
        name: &'static str,
        range: RangeInclusive<f32>,
        default: f32,
    ) -> Self {
        Self {
            id,
            name,
            range,
            default,
            flags: ParameterFlags::AUTOMATABLE.union(ParameterFlags::MODULATABLE),
            parameter_type: ParameterType::Float,
        }
    }

    /// Optional discrete parameter type.
    pub const fn with_type(mut self, parameter_type: ParameterType) -> Self {
        self.parameter_type = parameter_type;
        self
    }

    /// Optional custom host flags.
    pub const fn with_flags(mut self, flags: ParameterFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The parameter's dense id.
    pub const fn id(&self) -> ParameterId {
        self.id
    }

    /// The parameter's display name.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The parameter's value range.
    pub const fn range(&self) -> &RangeInclusive<f32> {
        &self.range
    }

    /// The parameter's default value.
    pub const fn default_value(&self) -> f32 {
        self.default
    }

    /// The parameter's host flags.
    pub const fn flags(&self) -> ParameterFlags {
        self.flags
    }

    /// The parameter's type.
    pub const fn parameter_type(&self) -> ParameterType {
        self.parameter_type
    }

    /// Clamp the given plain value to the parameter's range.
    pub fn clamp_value(&self, value: f32) -> f32 {
        value.clamp(*self.range.start(), *self.range.end())
    }

    /// Normalize the given plain value to a 0.0-1.0 range.
    pub fn normalize_value(&self, value: f32) -> f32 {
        (value - *self.range.start()) / (*self.range.end() - *self.range.start())
    }

    /// Denormalize a 0.0-1.0 ranged value to the corresponding plain value.
    pub fn denormalize_value(&self, normalized: f32) -> f32 {
        assert!((0.0..=1.0).contains(&normalized));
        *self.range.start() + normalized * (*self.range.end() - *self.range.start())
    }

    /// Quantize the given plain value as the DSP stages interpret it: integers and booleans
    /// get rounded, enums floored, continuous values are passed through.
    pub fn quantize_value(&self, value: f32) -> f32 {
        match self.parameter_type {
            ParameterType::Float => value,
            ParameterType::Integer | ParameterType::Boolean => value.round_ties_even(),
            ParameterType::Enum { .. } => value.floor(),
        }
    }

    /// Convert the given plain value to a string.
    pub fn value_to_string(&self, value: f64) -> String {
        format!("{:.6}", value)
    }

    /// Convert the given string to a plain value.
    ///
    /// Parsing display strings is not supported, so this always returns `None`.
    pub fn string_to_value(&self, _string: &str) -> Option<f64> {
        None
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        let flags = ParameterFlags::AUTOMATABLE | ParameterFlags::MODULATABLE;
        assert!(flags.contains(ParameterFlags::AUTOMATABLE));
        assert!(flags.contains(ParameterFlags::MODULATABLE));
        assert!(!ParameterFlags::NONE.contains(ParameterFlags::AUTOMATABLE));
        assert_eq!(flags.bits(), 0b11);
    }

    #[test]
    fn value_conversion() {
        let parameter = FloatParameter::new(ParameterId::Drawbar3, "Test", 0.0..=8.0, 0.0)
            .with_type(ParameterType::Integer);
        assert_eq!(parameter.clamp_value(9.0), 8.0);
        assert_eq!(parameter.clamp_value(-1.0), 0.0);
        assert_eq!(parameter.normalize_value(4.0), 0.5);
        assert_eq!(parameter.denormalize_value(0.25), 2.0);
        assert_eq!(parameter.quantize_value(2.6), 3.0);
        // ties round to even
        assert_eq!(parameter.quantize_value(4.5), 4.0);
        assert_eq!(parameter.quantize_value(3.5), 4.0);
        assert_eq!(parameter.value_to_string(2.5), "2.500000");
        assert_eq!(parameter.string_to_value("2.5"), None);
    }

    #[test]
    fn enum_values_are_floored() {
        let parameter = FloatParameter::new(ParameterId::Drum, "Drum", 0.0..=2.99, 1.0).with_type(
            ParameterType::Enum {
                values: &["A", "B", "C"],
            },
        );
        assert_eq!(parameter.quantize_value(2.99), 2.0);
        assert_eq!(parameter.quantize_value(0.6), 0.0);
    }
}
