// curator-core/src/external/mocks.rs

// --- Mocking Infrastructure (for testing) ---

// Compiled for unit tests and when the "test-mocks" feature is enabled.
#![cfg(any(test, feature = "test-mocks"))]

use super::*;
use crate::error::{CoreError, CoreResult};
use crate::media::{StreamDescriptor, StreamInventory};
use crate::processing::crop_scale::Geometry;
use crate::processing::deinterlace::FieldCounts;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::FfmpegEvent;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::rc::Rc;

/// Mock implementation of FfmpegProcess.
#[derive(Clone)]
pub struct MockFfmpegProcess {
    /// Events to emit when handle_events is called.
    pub events_to_emit: Rc<RefCell<Vec<FfmpegEvent>>>,
    /// Exit status to return when wait is called.
    pub exit_status: ExitStatus,
}

impl FfmpegProcess for MockFfmpegProcess {
    fn handle_events<F>(&mut self, mut handler: F) -> CoreResult<()>
    where
        F: FnMut(FfmpegEvent) -> CoreResult<()>,
    {
        let events = self.events_to_emit.borrow().clone();
        for event in events {
            handler(event)?;
        }
        Ok(())
    }

    fn wait(&mut self) -> CoreResult<ExitStatus> {
        Ok(self.exit_status)
    }
}

/// An expected ffmpeg command call and its mock result.
pub struct MockFfmpegExpectation {
    pub arg_pattern: String,
    pub result: CoreResult<MockFfmpegProcess>,
}

/// Mock FfmpegSpawner matching calls against queued expectations.
#[derive(Clone, Default)]
pub struct MockFfmpegSpawner {
    expectations: Rc<RefCell<Vec<MockFfmpegExpectation>>>,
    received_calls: Rc<RefCell<Vec<Vec<String>>>>,
}

impl MockFfmpegSpawner {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_expectation(&self, arg_pattern: &str, result: CoreResult<MockFfmpegProcess>) {
        self.expectations.borrow_mut().push(MockFfmpegExpectation {
            arg_pattern: arg_pattern.to_string(),
            result,
        });
    }

    pub fn add_success_expectation(&self, arg_pattern: &str, events: Vec<FfmpegEvent>) {
        let process = MockFfmpegProcess {
            events_to_emit: Rc::new(RefCell::new(events)),
            exit_status: ExitStatus::from_raw(0),
        };
        self.add_expectation(arg_pattern, Ok(process));
    }

    pub fn add_spawn_error_expectation(&self, arg_pattern: &str, error: CoreError) {
        self.add_expectation(arg_pattern, Err(error));
    }

    pub fn add_exit_error_expectation(
        &self,
        arg_pattern: &str,
        events: Vec<FfmpegEvent>,
        exit_code: i32,
    ) {
        let process = MockFfmpegProcess {
            events_to_emit: Rc::new(RefCell::new(events)),
            exit_status: ExitStatus::from_raw(exit_code << 8),
        };
        self.add_expectation(arg_pattern, Ok(process));
    }

    pub fn get_received_calls(&self) -> Vec<Vec<String>> {
        self.received_calls.borrow().clone()
    }
}

impl FfmpegSpawner for MockFfmpegSpawner {
    type Process = MockFfmpegProcess;

    fn spawn(&self, mut cmd: FfmpegCommand) -> CoreResult<Self::Process> {
        let args: Vec<String> = cmd
            .as_inner()
            .get_args()
            .map(|s| s.to_string_lossy().into_owned())
            .collect();
        self.received_calls.borrow_mut().push(args.clone());

        let mut expectations = self.expectations.borrow_mut();
        let found_index = expectations
            .iter()
            .position(|exp| args.iter().any(|arg| arg.contains(&exp.arg_pattern)));

        match found_index {
            Some(index) => {
                let expectation = expectations.remove(index);
                log::debug!(
                    "MockFfmpegSpawner: matched expectation with pattern '{}'",
                    expectation.arg_pattern
                );
                expectation.result
            }
            None => panic!("MockFfmpegSpawner: no expectation found for command args: {args:?}"),
        }
    }
}

/// Mock MediaProber returning canned inventories per path.
#[derive(Clone, Default)]
pub struct MockProber {
    inventories: Rc<RefCell<HashMap<PathBuf, StreamInventory>>>,
    /// Streams reported for any path without its own expectation
    fallback: Rc<RefCell<Option<Vec<StreamDescriptor>>>>,
    probed: Rc<RefCell<Vec<PathBuf>>>,
}

impl MockProber {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn expect_probe(&self, path: &Path, streams: Vec<StreamDescriptor>, duration_secs: Option<f64>) {
        self.inventories.borrow_mut().insert(
            path.to_path_buf(),
            StreamInventory::new(path, duration_secs, streams),
        );
    }

    /// Answers probes of unregistered paths (such as temporary outputs).
    pub fn expect_any_probe(&self, streams: Vec<StreamDescriptor>) {
        *self.fallback.borrow_mut() = Some(streams);
    }

    pub fn probed_paths(&self) -> Vec<PathBuf> {
        self.probed.borrow().clone()
    }
}

impl MediaProber for MockProber {
    fn probe(&self, path: &Path) -> CoreResult<StreamInventory> {
        self.probed.borrow_mut().push(path.to_path_buf());
        if let Some(inventory) = self.inventories.borrow().get(path) {
            return Ok(inventory.clone());
        }
        self.fallback
            .borrow()
            .as_ref()
            .map(|streams| StreamInventory::new(path, None, streams.clone()))
            .ok_or_else(|| {
                CoreError::ProbeFailed(format!(
                    "MockProber: no expectation set for {}",
                    path.display()
                ))
            })
    }
}

/// Mock FrameSampler with fixed crop and idet samples.
#[derive(Clone, Default)]
pub struct MockSampler {
    crops: Rc<RefCell<Vec<Geometry>>>,
    fields: Rc<RefCell<Vec<FieldCounts>>>,
    calls: Rc<RefCell<Vec<(&'static str, u32, usize)>>>,
}

impl MockSampler {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_crops(self, crops: Vec<Geometry>) -> Self {
        *self.crops.borrow_mut() = crops;
        self
    }

    pub fn with_field_counts(self, counts: Vec<FieldCounts>) -> Self {
        *self.fields.borrow_mut() = counts;
        self
    }

    /// Recorded `(kind, stream_index, sample_count)` calls.
    pub fn calls(&self) -> Vec<(&'static str, u32, usize)> {
        self.calls.borrow().clone()
    }
}

impl FrameSampler for MockSampler {
    fn sample_crop(&self, _source: &Path, stream_index: u32, sample_count: usize) -> CoreResult<Vec<Geometry>> {
        self.calls.borrow_mut().push(("crop", stream_index, sample_count));
        Ok(self.crops.borrow().clone())
    }

    fn sample_field_order(
        &self,
        _source: &Path,
        stream_index: u32,
        sample_count: usize,
    ) -> CoreResult<Vec<FieldCounts>> {
        self.calls.borrow_mut().push(("idet", stream_index, sample_count));
        Ok(self.fields.borrow().clone())
    }
}

/// Mock LoudnessMeter returning queued results, one queue entry per call.
#[derive(Clone, Default)]
pub struct MockLoudnessMeter {
    responses: Rc<RefCell<VecDeque<CoreResult<Vec<f64>>>>>,
    requests: Rc<RefCell<Vec<Vec<u32>>>>,
}

impl MockLoudnessMeter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push_results(&self, results: Vec<f64>) {
        self.responses.borrow_mut().push_back(Ok(results));
    }

    pub fn push_error(&self, error: CoreError) {
        self.responses.borrow_mut().push_back(Err(error));
    }

    /// Stream indices submitted on each call.
    pub fn requests(&self) -> Vec<Vec<u32>> {
        self.requests.borrow().clone()
    }
}

impl LoudnessMeter for MockLoudnessMeter {
    fn measure_loudness(&self, _source: &Path, streams: &[StreamDescriptor]) -> CoreResult<Vec<f64>> {
        self.requests
            .borrow_mut()
            .push(streams.iter().map(|s| s.index).collect());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Mock PipelineRunner recording pipelines and replaying queued outcomes.
///
/// With nothing queued a run succeeds with empty stderr. When
/// `create_outputs` is set, the last argument of the last stage is created
/// as an empty file, standing in for the encoder's output.
#[derive(Clone, Default)]
pub struct MockPipelineRunner {
    outcomes: Rc<RefCell<VecDeque<CoreResult<PipelineOutput>>>>,
    received: Rc<RefCell<Vec<CommandPipeline>>>,
    create_outputs: Rc<RefCell<bool>>,
}

impl MockPipelineRunner {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn creating_outputs(self) -> Self {
        *self.create_outputs.borrow_mut() = true;
        self
    }

    pub fn push_output(&self, stderr: &str) {
        self.outcomes.borrow_mut().push_back(Ok(PipelineOutput {
            stderr: stderr.to_string(),
        }));
    }

    pub fn push_failure(&self, stage: &str, code: i32) {
        self.outcomes
            .borrow_mut()
            .push_back(Err(CoreError::SubprocessFailed {
                stage: stage.to_string(),
                code: Some(code),
            }));
    }

    pub fn received(&self) -> Vec<CommandPipeline> {
        self.received.borrow().clone()
    }
}

impl PipelineRunner for MockPipelineRunner {
    fn run(&self, pipeline: &CommandPipeline) -> CoreResult<PipelineOutput> {
        self.received.borrow_mut().push(pipeline.clone());
        let outcome = self
            .outcomes
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(PipelineOutput::default()));

        if outcome.is_ok() && *self.create_outputs.borrow() {
            let output = pipeline
                .last()
                .and_then(|stage| stage.args.last())
                .filter(|arg| arg.as_str() != "-");
            if let Some(output) = output {
                if let Err(e) = std::fs::File::create(output) {
                    log::error!("MockPipelineRunner failed to create {output}: {e}");
                }
            }
        }
        outcome
    }
}
