//! Implementation of the 'process' subcommand.
//!
//! Each input file runs its own sequential pipeline on a scoped thread; the
//! shared encode gate bounds how many of them encode at the same time.

use crate::cli::ProcessArgs;
use crate::commands::check_tools;
use crate::commands::plan::default_output_for;

use anyhow::{Context, Result, bail};
use curator_core::{EncodeGate, PlanConfig, ProcessOutcome, SystemCollaborators, process_file};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use log::{error, info};

/// Destination of `input` inside `output_dir`.
pub fn output_path_for(input: &Path, output_dir: &Path) -> PathBuf {
    let name = default_output_for(input)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    output_dir.join(name)
}

/// Fails when two inputs would be written to the same output file.
pub fn check_unique_outputs(inputs: &[PathBuf], output_dir: &Path) -> Result<()> {
    let mut claimed: HashMap<PathBuf, &PathBuf> = HashMap::new();
    for input in inputs {
        let output = output_path_for(input, output_dir);
        if let Some(previous) = claimed.insert(output.clone(), input) {
            bail!(
                "'{}' and '{}' would both be written to '{}'",
                previous.display(),
                input.display(),
                output.display()
            );
        }
    }
    Ok(())
}

pub fn run_process(args: &ProcessArgs, config: &PlanConfig) -> Result<()> {
    check_unique_outputs(&args.inputs, &args.output_dir)?;
    check_tools(config)?;
    fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create output directory '{}'", args.output_dir.display())
    })?;

    let mut config = config.clone();
    if let Some(jobs) = args.jobs {
        config.max_concurrent_encodes = usize::from(jobs);
    }
    let options = args.policy.to_options();
    let gate = EncodeGate::new(config.max_concurrent_encodes);
    info!(
        "Processing {} file(s), at most {} concurrent encode(s)",
        args.inputs.len(),
        config.max_concurrent_encodes
    );

    let results: Vec<(PathBuf, curator_core::CoreResult<ProcessOutcome>)> = thread::scope(|scope| {
        let handles: Vec<_> = args
            .inputs
            .iter()
            .map(|input| {
                let (config, options, gate) = (&config, &options, &gate);
                let output = output_path_for(input, &args.output_dir);
                scope.spawn(move || {
                    let collaborators = SystemCollaborators::system(config);
                    let result = process_file(config, options, input, &output, &collaborators, gate);
                    (input.clone(), result)
                })
            })
            .collect();
        handles
            .into_iter()
            .zip(&args.inputs)
            .map(|(handle, input)| {
                handle.join().unwrap_or_else(|_| {
                    (
                        input.clone(),
                        Err(curator_core::CoreError::PathError(format!(
                            "worker for '{}' panicked",
                            input.display()
                        ))),
                    )
                })
            })
            .collect()
    });

    let mut failures = 0usize;
    for (input, result) in &results {
        match result {
            Ok(outcome) => println!(
                "OK    {} -> {} ({}, {:.0}s)",
                input.display(),
                outcome.output.display(),
                outcome.plan.resolution_tier(),
                outcome.elapsed.as_secs_f64()
            ),
            Err(e) => {
                failures += 1;
                error!("{}: {e}", input.display());
                println!("FAIL  {}: {e}", input.display());
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} file(s) failed", results.len());
    }
    Ok(())
}
