//! Script recording
//!
//! [`RecordingSession`] buffers steps for one script under construction.
//! [`TestRecorder`] wraps at most one session and enforces the
//! idle → recording → idle lifecycle. Neither performs any I/O.

use retrace_common::{Action, Metadata, ScriptMode, TestScript, TestStep};
use serde_json::Value;
use tracing::debug;

use crate::error::{RecorderError, RecorderState};

/// A script being recorded
#[derive(Debug, Clone)]
pub struct RecordingSession {
    script: TestScript,
}

impl RecordingSession {
    pub fn new(name: impl Into<String>, description: impl Into<String>, mode: ScriptMode) -> Self {
        Self {
            script: TestScript::new(name, description, mode),
        }
    }

    pub fn name(&self) -> &str {
        &self.script.name
    }

    /// Append a step, merging `extra` into its action metadata (incoming keys win)
    pub fn record(&mut self, mut step: TestStep, extra: Metadata) -> usize {
        step.action.merge_metadata(extra);
        debug!(
            "Recorded step {} of '{}': {} ({})",
            self.script.steps.len(),
            self.script.name,
            step.description,
            step.action.kind
        );
        self.script.steps.push(step);
        self.script.steps.len() - 1
    }

    pub fn record_step(&mut self, description: impl Into<String>, action: Action) -> usize {
        self.record(TestStep::new(description, action), Metadata::new())
    }

    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.script.metadata.insert(key.into(), value.into());
    }

    pub fn step_count(&self) -> usize {
        self.script.steps.len()
    }

    pub fn finish(self) -> TestScript {
        self.script
    }
}

/// Single-session recorder
#[derive(Debug, Default)]
pub struct TestRecorder {
    session: Option<RecordingSession>,
}

impl TestRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        if self.session.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// The session in progress, if any
    pub fn current(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    pub fn start_recording(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        mode: ScriptMode,
    ) -> Result<(), RecorderError> {
        if self.session.is_some() {
            return Err(self.invalid("start recording"));
        }
        let session = RecordingSession::new(name, description, mode);
        debug!("Started recording '{}'", session.name());
        self.session = Some(session);
        Ok(())
    }

    pub fn record_step(
        &mut self,
        description: impl Into<String>,
        action: Action,
    ) -> Result<usize, RecorderError> {
        self.record(TestStep::new(description, action), Metadata::new())
    }

    /// Record a fully specified step with extra action metadata
    pub fn record(&mut self, step: TestStep, extra: Metadata) -> Result<usize, RecorderError> {
        let session = self.active("record a step")?;
        Ok(session.record(step, extra))
    }

    pub fn add_metadata(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), RecorderError> {
        self.active("add metadata")?.add_metadata(key, value);
        Ok(())
    }

    pub fn stop_recording(&mut self) -> Result<TestScript, RecorderError> {
        let session = self
            .session
            .take()
            .ok_or_else(|| self.invalid("stop recording"))?;
        let script = session.finish();
        debug!(
            "Stopped recording '{}' with {} steps",
            script.name,
            script.steps.len()
        );
        Ok(script)
    }

    fn active(&mut self, operation: &'static str) -> Result<&mut RecordingSession, RecorderError> {
        let state = self.state();
        self.session.as_mut().ok_or(RecorderError::InvalidState { operation, state })
    }

    fn invalid(&self, operation: &'static str) -> RecorderError {
        RecorderError::InvalidState {
            operation,
            state: self.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_common::ActionKind;

    #[test]
    fn test_merge_extra_metadata() {
        let mut session = RecordingSession::new("s", "", ScriptMode::Smart);
        let action = Action::click("#a")
            .with_metadata("source", "rules")
            .with_metadata("keep", true);
        let mut extra = Metadata::new();
        extra.insert("source".into(), "recorder".into());

        let index = session.record(TestStep::new("click a", action), extra);
        assert_eq!(index, 0);

        let script = session.finish();
        let metadata = &script.steps[0].action.metadata;
        assert_eq!(metadata["source"], "recorder");
        assert_eq!(metadata["keep"], true);
        assert_eq!(script.mode, ScriptMode::Smart);
    }

    #[test]
    fn test_indices_follow_order() {
        let mut recorder = TestRecorder::new();
        recorder.start_recording("order", "", ScriptMode::Dumb).unwrap();
        assert_eq!(recorder.record_step("a", Action::click("#a")).unwrap(), 0);
        assert_eq!(recorder.record_step("b", Action::click("#b")).unwrap(), 1);
        assert_eq!(recorder.current().unwrap().step_count(), 2);

        let script = recorder.stop_recording().unwrap();
        assert_eq!(script.kinds(), vec![ActionKind::Click, ActionKind::Click]);
        assert_eq!(script.steps[1].description, "b");
    }

    #[test]
    fn test_error_names_operation_and_state() {
        let mut recorder = TestRecorder::new();
        let err = recorder.add_metadata("k", "v").unwrap_err();
        assert_eq!(err.to_string(), "Invalid state: cannot add metadata while idle");
    }
}
