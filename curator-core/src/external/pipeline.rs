// ============================================================================
// curator-core/src/external/pipeline.rs
// ============================================================================
//
// COMMAND PIPELINES: Multi-stage subprocess execution without a shell
//
// A CommandPipeline is an ordered list of stages; the stdout of every stage
// feeds the stdin of the next one. This replaces shell `a | b` strings: the
// runner wires the pipes itself and checks every stage's exit status.
//
// KEY COMPONENTS:
// - CommandStage: program + argument vector + a label for error reporting
// - CommandPipeline: ordered stages
// - PipelineRunner: trait executing a pipeline (mocked in tests)
// - ProcessPipelineRunner: std::process implementation

use std::io::Read;
use std::process::{Child, Command, Stdio};

use serde::Serialize;

use crate::error::{
    CoreError, CoreResult, command_start_error, command_wait_error, subprocess_failed_error,
};

/// One subprocess invocation in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandStage {
    /// Human-readable stage name used in logs and errors
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
}

impl CommandStage {
    pub fn new(label: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, T>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Renders the stage as a shell-like string, for logging only.
    pub fn render(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_for_display)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True when `window` appears as consecutive arguments.
    pub fn has_args(&self, window: &[&str]) -> bool {
        self.args
            .windows(window.len())
            .any(|w| w.iter().zip(window).all(|(a, b)| a == b))
    }
}

fn quote_for_display(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Ordered stages; each stage's stdout feeds the next stage's stdin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandPipeline {
    stages: Vec<CommandStage>,
}

impl CommandPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(stage: CommandStage) -> Self {
        Self {
            stages: vec![stage],
        }
    }

    pub fn push(&mut self, stage: CommandStage) {
        self.stages.push(stage);
    }

    pub fn stages(&self) -> &[CommandStage] {
        &self.stages
    }

    /// The stage whose stderr is captured.
    pub fn last(&self) -> Option<&CommandStage> {
        self.stages.last()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn render(&self) -> String {
        self.stages
            .iter()
            .map(CommandStage::render)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Captured output of a successful pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutput {
    /// stderr of the last stage
    pub stderr: String,
}

/// Executes command pipelines, blocking until every stage has exited.
pub trait PipelineRunner {
    fn run(&self, pipeline: &CommandPipeline) -> CoreResult<PipelineOutput>;
}

/// `PipelineRunner` spawning real processes with `std::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessPipelineRunner;

impl ProcessPipelineRunner {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineRunner for ProcessPipelineRunner {
    fn run(&self, pipeline: &CommandPipeline) -> CoreResult<PipelineOutput> {
        let stages = pipeline.stages();
        let Some(last_index) = stages.len().checked_sub(1) else {
            return Err(CoreError::AssemblyError(
                "cannot run an empty pipeline".to_string(),
            ));
        };
        log::debug!("Running pipeline: {}", pipeline.render());

        let mut upstream: Option<std::process::ChildStdout> = None;
        let mut children: Vec<(&CommandStage, Child)> = Vec::with_capacity(stages.len());

        for (i, stage) in stages.iter().enumerate() {
            let is_last = i == last_index;
            let mut cmd = Command::new(&stage.program);
            cmd.args(&stage.args)
                .stdin(upstream.take().map_or_else(Stdio::null, Stdio::from))
                .stdout(if is_last { Stdio::null() } else { Stdio::piped() })
                .stderr(if is_last { Stdio::piped() } else { Stdio::null() });

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    kill_all(&mut children);
                    return Err(command_start_error(stage.label.clone(), e));
                }
            };
            if !is_last {
                upstream = child.stdout.take();
            }
            children.push((stage, child));
        }

        // Drain the last stage's stderr first so a chatty encoder cannot block.
        let drained = match children.last_mut() {
            Some((stage, child)) => read_stderr(child, &stage.label),
            None => Ok(String::new()),
        };
        let stderr = match drained {
            Ok(stderr) => stderr,
            Err(e) => {
                kill_all(&mut children);
                return Err(e);
            }
        };

        let mut first_failure = None;
        for (stage, mut child) in children {
            let status = child
                .wait()
                .map_err(|e| command_wait_error(stage.label.clone(), e))?;
            if !status.success() && first_failure.is_none() {
                log::error!("Stage '{}' exited with {}", stage.label, status);
                first_failure = Some(subprocess_failed_error(stage.label.clone(), status));
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(PipelineOutput { stderr }),
        }
    }
}

fn read_stderr(child: &mut Child, label: &str) -> CoreResult<String> {
    let Some(mut pipe) = child.stderr.take() else {
        return Ok(String::new());
    };
    let mut bytes = Vec::new();
    pipe.read_to_end(&mut bytes)
        .map_err(|e| command_wait_error(label, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Stops and reaps every started stage.
fn kill_all(children: &mut [(&CommandStage, Child)]) {
    for (stage, child) in children.iter_mut() {
        if let Err(e) = child.kill() {
            log::warn!("Failed to stop stage '{}': {}", stage.label, e);
        }
        let _ = child.wait();
    }
}
