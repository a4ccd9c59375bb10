//! Implementation of the 'plan' subcommand.
//!
//! Runs the decision stages for one file (probe, sampling, loudness
//! measurement) and prints the resulting plan and encode commands without
//! encoding anything.

use crate::cli::PlanArgs;
use crate::commands::check_tools;

use anyhow::{Context, Result};
use curator_core::encoding::{sidecar_path, sidecar_stage};
use curator_core::{PlanConfig, SystemCollaborators, TranscodePlan, assemble, plan_file};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use log::info;

/// Output path the plan is rendered against: the input renamed to `.mp4`.
pub fn default_output_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{stem}.mp4"))
}

pub fn run_plan(args: &PlanArgs, config: &PlanConfig) -> Result<()> {
    check_tools(config)?;
    let options = args.policy.to_options();
    let collaborators = SystemCollaborators::system(config);

    info!("Planning {}", args.input.display());
    let plan = plan_file(config, &options, &args.input, &collaborators)
        .with_context(|| format!("Failed to plan '{}'", args.input.display()))?;

    let output = default_output_for(&args.input);
    let pipeline = assemble(&plan, config, &output)?;
    let sidecar = sidecar_stage(
        &config.ffmpeg_path,
        &plan.source,
        &plan.subtitles,
        &sidecar_path(&output),
    );

    let destination = args.library.destination(plan.resolution_tier());

    if args.json {
        let document = serde_json::json!({
            "plan": plan,
            "resolution": plan.resolution_tier(),
            "encode": pipeline,
            "sidecar": sidecar,
            "destination": destination,
        });
        println!("{}", serde_json::to_string_pretty(&document)?);
    } else {
        print!("{}", describe_plan(&plan));
        println!("Encode:  {}", pipeline.render());
        if let Some(stage) = sidecar {
            println!("Sidecar: {}", stage.render());
        }
        if let Some(path) = destination {
            println!("Library: {}", path.display());
        }
    }
    Ok(())
}

/// Human-readable summary of a plan.
pub fn describe_plan(plan: &TranscodePlan) -> String {
    let mut out = String::new();
    let video = &plan.video;
    let _ = writeln!(out, "Source:  {}", plan.source.display());
    let _ = writeln!(
        out,
        "Video:   stream {} ({}) {}x{} -> {}",
        video.stream_index,
        video.codec_name,
        video.source.width,
        video.source.height,
        if video.convert { "convert" } else { "copy" }
    );
    if let Some(pad) = video.pad {
        let _ = writeln!(out, "  pad    {}:{}:{}:{}", pad.width, pad.height, pad.x, pad.y);
    }
    if let Some(crop) = video.crop {
        let _ = writeln!(out, "  crop   {}:{}:{}:{}", crop.width, crop.height, crop.x, crop.y);
    }
    if let Some(scale) = video.scale {
        let _ = writeln!(out, "  scale  {}:{}", scale.width, scale.height);
    }
    let _ = writeln!(
        out,
        "  field order {}, output tier {}",
        video.field_order,
        plan.resolution_tier()
    );

    for track in &plan.audio.tracks {
        let d = &track.decision;
        let mut actions = Vec::new();
        if d.copy {
            actions.push("copy".to_string());
        }
        if d.convert {
            actions.push(match d.gain_db {
                Some(gain) => format!("convert ({gain:+.1} dB)"),
                None => "convert".to_string(),
            });
        }
        if actions.is_empty() {
            actions.push("drop".to_string());
        }
        let _ = writeln!(
            out,
            "Audio:   stream {} ({}, {} ch, {}){} -> {}",
            track.stream.index,
            track.stream.codec_name,
            track.stream.channels,
            track.language,
            if d.is_default { " [default]" } else { "" },
            actions.join(" + ")
        );
    }
    for stream in &plan.subtitles.text {
        let _ = writeln!(out, "Subs:    stream {} ({}) -> mov_text", stream.index, stream.codec_name);
    }
    for stream in &plan.subtitles.bitmap {
        let _ = writeln!(out, "Subs:    stream {} ({}) -> sidecar", stream.index, stream.codec_name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_for(Path::new("/in/Heat.1995.mkv")),
            PathBuf::from("/in/Heat.1995.mp4")
        );
    }
}
