//! Control thread side of the organ: parameter edits, change polling and persistence.

use std::{
    io::{Read, Write},
    sync::Arc,
};

use crate::{
    parameter::{ParameterId, ParameterStore, ParameterValues},
    state::{load_state, save_state},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Handle to the shared [`ParameterStore`] for non real-time threads, such as the host's main
/// thread or a UI.
///
/// Values set here are picked up by the [`Processor`](crate::Processor) with its next process
/// or flush call. Changes which were made by the audio thread are observed by polling.
#[derive(Debug, Clone)]
pub struct Controller {
    parameters: Arc<ParameterStore>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(Arc::new(ParameterStore::default()))
    }
}

impl Controller {
    pub fn new(parameters: Arc<ParameterStore>) -> Self {
        Self { parameters }
    }

    /// The shared parameter store.
    pub fn parameters(&self) -> &Arc<ParameterStore> {
        &self.parameters
    }

    /// Stage a new value for the given parameter. The value gets clamped into the parameter's
    /// range.
    pub fn set_parameter(&self, id: ParameterId, value: f32) {
        let value = id.descriptor().clamp_value(value);
        self.parameters.stage(id, value);
    }

    /// The current value of the parameter with the given host index, or None when the index
    /// is invalid.
    pub fn parameter_value(&self, index: usize) -> Option<f64> {
        ParameterId::from_index(index).map(|id| self.parameters.value(id) as f64)
    }

    /// Pull in all parameter changes made by the audio thread.
    /// Returns true when anything changed since the last poll.
    pub fn poll_changes(&self) -> bool {
        self.parameters.drain_live_changes()
    }

    /// Latest known values of all parameters. Call [`poll_changes`](Self::poll_changes)
    /// before to include the audio thread's changes.
    pub fn snapshot(&self) -> ParameterValues {
        self.parameters.staged_values()
    }

    /// Write all current parameter values as state blob into the given stream.
    pub fn save(&self, stream: &mut impl Write) -> Result<(), Error> {
        self.poll_changes();
        save_state(&self.snapshot(), stream)
    }

    /// Read a state blob from the given stream and stage all of its values. Nothing gets
    /// staged when reading fails.
    pub fn load(&self, stream: &mut impl Read) -> Result<(), Error> {
        let values = load_state(stream)?;
        self.parameters.load_staged(&values);
        log::debug!("Loaded organ state");
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::{default_values, PARAMETER_COUNT};

    #[test]
    fn set_parameter_clamps_and_stages() {
        let controller = Controller::default();
        controller.set_parameter(ParameterId::Drawbar1, 12.0);
        controller.set_parameter(ParameterId::Reverb, -1.0);
        assert!(controller.parameters().is_staged_dirty(ParameterId::Drawbar1));
        assert_eq!(controller.parameter_value(ParameterId::Drawbar1.index()), Some(8.0));
        assert_eq!(controller.parameter_value(ParameterId::Reverb.index()), Some(0.0));
        assert_eq!(controller.parameter_value(PARAMETER_COUNT), None);
    }

    #[test]
    fn poll_changes_from_audio() {
        let controller = Controller::default();
        assert!(!controller.poll_changes());
        controller
            .parameters()
            .apply_from_audio(ParameterId::Horn, 2.0);
        assert_eq!(controller.snapshot()[ParameterId::Horn.index()], 1.0);
        assert!(controller.poll_changes());
        assert_eq!(controller.snapshot()[ParameterId::Horn.index()], 2.0);
        assert!(!controller.poll_changes());
    }

    #[test]
    fn save_includes_audio_changes() -> Result<(), Box<Error>> {
        let controller = Controller::default();
        controller
            .parameters()
            .apply_from_audio(ParameterId::Character, 0.5);
        let mut blob: Vec<u8> = Vec::new();
        controller.save(&mut blob)?;
        let values = load_state(&mut blob.as_slice())?;
        assert_eq!(values[ParameterId::Character.index()], 0.5);
        Ok(())
    }

    #[test]
    fn unflushed_edits_win_over_audio_changes() -> Result<(), Box<Error>> {
        let controller = Controller::default();
        controller
            .parameters()
            .apply_from_audio(ParameterId::Reverb, 0.3);
        controller.set_parameter(ParameterId::Reverb, 0.9);
        let mut blob: Vec<u8> = Vec::new();
        controller.save(&mut blob)?;
        let values = load_state(&mut blob.as_slice())?;
        assert_eq!(values[ParameterId::Reverb.index()], 0.9);
        assert_eq!(
            controller.parameter_value(ParameterId::Reverb.index()),
            Some(0.9f32 as f64)
        );
        Ok(())
    }

    #[test]
    fn save_then_load_restores_all() -> Result<(), Box<Error>> {
        let source = Controller::default();
        source.set_parameter(ParameterId::Drawbar7, 4.0);
        source.set_parameter(ParameterId::VibratoType, 3.0);
        source.set_parameter(ParameterId::Overdrive, 1.0);
        let mut blob: Vec<u8> = Vec::new();
        source.save(&mut blob)?;

        let target = Controller::default();
        target.load(&mut blob.as_slice())?;
        assert_eq!(target.snapshot(), source.snapshot());
        assert!(ParameterId::all().all(|id| target.parameters().is_staged_dirty(id)));

        // flushing then applies the whole loaded set
        let mut flushed = 0;
        target
            .parameters()
            .flush_staged_into_live(|_, _, _| flushed += 1);
        assert_eq!(flushed, PARAMETER_COUNT);
        assert_eq!(target.parameters().live_values(), source.snapshot());
        Ok(())
    }

    #[test]
    fn failed_load_commits_nothing() {
        let controller = Controller::default();
        let blob = [0u8; 10];
        assert!(controller.load(&mut blob.as_slice()).is_err());
        assert_eq!(controller.snapshot(), default_values());
        assert!(!ParameterId::all().any(|id| controller.parameters().is_staged_dirty(id)));
    }
}
