// ============================================================================
// curator-core/src/processing/audio_plan.rs
// ============================================================================
//
// AUDIO PLAN BUILDER: Default selection, per-stream actions, gain staging
//
// Decisions are explicit `StreamDecision` values attached next to the
// probed descriptors, recomputed from scratch on every build. The plan is
// completed in two steps: `AudioPlan::build` annotates the streams, then
// `AudioPlan::apply_loudness` folds in the measured loudness and derives
// the gain for every measured stream.
//
// KEY COMPONENTS:
// - StreamDecision: default/measure/copy/convert flags plus gain
// - AudioTrackPlan: one audio stream with its normalised language
// - AudioPlan: ordered tracks (default first) and the AC-3 pipeline flag
// - select_default: maximum channels, then AC-3/DTS, then lowest index

use serde::{Deserialize, Serialize};

use crate::config::PlanConfig;
use crate::error::{CoreError, CoreResult};
use crate::media::{StreamDescriptor, UNDETERMINED_LANGUAGE};

/// Language assumed for untagged or undetermined audio.
pub const DEFAULT_LANGUAGE: &str = "eng";

/// Derived per-stream decision.
///
/// `copy` and `convert` are independent: both set means the output carries
/// a passthrough track and a converted stereo track of the same stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamDecision {
    pub is_default: bool,
    pub measure: bool,
    pub copy: bool,
    pub convert: bool,
    pub gain_db: Option<f64>,
    pub measured_lufs: Option<f64>,
}

impl StreamDecision {
    /// Number of output tracks this decision emits.
    pub fn output_tracks(&self) -> usize {
        usize::from(self.copy) + usize::from(self.convert)
    }
}

/// An audio stream with its decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackPlan {
    pub stream: StreamDescriptor,
    /// Language written to the output track metadata
    pub language: String,
    pub decision: StreamDecision,
}

/// Ordered audio decisions for one file: default stream first, then by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPlan {
    pub tracks: Vec<AudioTrackPlan>,
    /// The default stream is multichannel AAC and needs the AC-3 hop
    pub needs_aac_to_ac3_pipeline: bool,
}

/// Normalises a probed language tag; missing and `und` become English.
pub fn normalize_language(tag: &str) -> String {
    let tag = tag.trim();
    if tag.is_empty() || tag.eq_ignore_ascii_case(UNDETERMINED_LANGUAGE) {
        DEFAULT_LANGUAGE.to_string()
    } else {
        tag.to_string()
    }
}

/// Selects the default audio stream.
///
/// Candidates are the streams with the most channels; among them AC-3/DTS
/// streams are preferred, and the lowest index wins. Codec is not ranked,
/// so an AC-3 and a DTS stream with equal channels resolve by index.
pub fn select_default(streams: &[StreamDescriptor]) -> Option<&StreamDescriptor> {
    let max_channels = streams.iter().map(|s| s.channels).max()?;
    let widest: Vec<&StreamDescriptor> = streams
        .iter()
        .filter(|s| s.channels == max_channels)
        .collect();
    let surround: Vec<&StreamDescriptor> = widest
        .iter()
        .copied()
        .filter(|s| s.is_ac3_or_dts())
        .collect();
    let pool = if surround.is_empty() { widest } else { surround };
    pool.into_iter().min_by_key(|s| s.index)
}

fn default_decision(stream: &StreamDescriptor) -> StreamDecision {
    let aac_stereo = stream.is_aac_family() && stream.is_stereo_or_less();
    StreamDecision {
        is_default: true,
        measure: true,
        copy: stream.is_ac3_or_dts() || aac_stereo,
        convert: !aac_stereo,
        gain_db: None,
        measured_lufs: None,
    }
}

fn other_decision(stream: &StreamDescriptor, keep_others: bool) -> StreamDecision {
    StreamDecision {
        is_default: false,
        measure: keep_others && stream.is_aac_family() && stream.is_stereo_or_less(),
        copy: keep_others,
        convert: false,
        gain_db: None,
        measured_lufs: None,
    }
}

impl AudioPlan {
    /// Annotates the audio streams of a file.
    ///
    /// Non-audio descriptors in `streams` are ignored.
    pub fn build(streams: &[StreamDescriptor], keep_others: bool) -> CoreResult<AudioPlan> {
        let audio: Vec<StreamDescriptor> = streams
            .iter()
            .filter(|s| s.kind == crate::media::StreamKind::Audio)
            .cloned()
            .collect();
        let default_index = select_default(&audio)
            .map(|s| s.index)
            .ok_or(CoreError::NoAudioStream)?;

        let mut tracks: Vec<AudioTrackPlan> = audio
            .into_iter()
            .map(|stream| {
                let decision = if stream.index == default_index {
                    default_decision(&stream)
                } else {
                    other_decision(&stream, keep_others)
                };
                AudioTrackPlan {
                    language: normalize_language(&stream.language),
                    stream,
                    decision,
                }
            })
            .collect();
        tracks.sort_by_key(|t| (!t.decision.is_default, t.stream.index));

        let needs_aac_to_ac3_pipeline = tracks
            .first()
            .is_some_and(|t| t.stream.is_multichannel_aac());
        if needs_aac_to_ac3_pipeline {
            log::debug!("Default audio stream is multichannel AAC; AC-3 intermediate required");
        }

        Ok(AudioPlan {
            tracks,
            needs_aac_to_ac3_pipeline,
        })
    }

    pub fn default_track(&self) -> Option<&AudioTrackPlan> {
        self.tracks.iter().find(|t| t.decision.is_default)
    }

    /// Streams to submit for loudness measurement, in plan order.
    pub fn measured_streams(&self) -> Vec<StreamDescriptor> {
        self.tracks
            .iter()
            .filter(|t| t.decision.measure)
            .map(|t| t.stream.clone())
            .collect()
    }

    /// Assigns measured loudness and derives gain.
    ///
    /// `results` must hold exactly one value per measured stream, in the
    /// order returned by `measured_streams`; any other count aborts.
    pub fn apply_loudness(&mut self, results: &[f64], config: &PlanConfig) -> CoreResult<()> {
        let expected = self.tracks.iter().filter(|t| t.decision.measure).count();
        if results.len() != expected {
            log::error!(
                "Loudness measurement returned {} values for {} streams",
                results.len(),
                expected
            );
            return Err(CoreError::MeasurementCountMismatch {
                expected,
                actual: results.len(),
            });
        }

        let measured = self.tracks.iter_mut().filter(|t| t.decision.measure);
        for (track, &lufs) in measured.zip(results) {
            let decision = &mut track.decision;
            decision.measured_lufs = Some(lufs);

            let gain = config.target_loudness_lufs - lufs;
            if gain.abs() <= config.gain_tolerance_db {
                decision.gain_db = None;
                continue;
            }
            decision.gain_db = Some(gain);
            log::info!("Stream {} needs {:+.1} dB of gain", track.stream.index, gain);

            if decision.copy && track.stream.is_aac_family() && track.stream.is_stereo_or_less() {
                decision.copy = false;
                decision.convert = true;
            }
        }
        Ok(())
    }

    /// Output audio track count once assembled.
    pub fn output_track_count(&self) -> usize {
        self.tracks.iter().map(|t| t.decision.output_tracks()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(plan: &AudioPlan, index: u32) -> StreamDecision {
        plan.tracks
            .iter()
            .find(|t| t.stream.index == index)
            .map(|t| t.decision)
            .unwrap()
    }

    #[test]
    fn test_stereo_aac_default_is_copied() {
        let streams = vec![StreamDescriptor::audio(1, "aac", 2, Some("eng"))];
        let mut plan = AudioPlan::build(&streams, false).unwrap();
        let d = decision(&plan, 1);
        assert!(d.is_default && d.measure && d.copy && !d.convert);

        plan.apply_loudness(&[-23.4], &PlanConfig::default()).unwrap();
        let d = decision(&plan, 1);
        assert_eq!(d.gain_db, None);
        assert_eq!(d.measured_lufs, Some(-23.4));
        assert!(d.copy && !d.convert);
    }

    #[test]
    fn test_multichannel_aac_default_needs_pipeline() {
        let streams = vec![
            StreamDescriptor::audio(1, "aac", 6, None),
            StreamDescriptor::audio(2, "aac", 2, None),
        ];
        let plan = AudioPlan::build(&streams, false).unwrap();
        assert!(plan.needs_aac_to_ac3_pipeline);
        let d = decision(&plan, 1);
        assert!(d.convert && !d.copy);
        let other = decision(&plan, 2);
        assert!(!other.copy && !other.convert && !other.measure);
    }

    #[test]
    fn test_loud_copied_stereo_flips_to_convert() {
        let streams = vec![StreamDescriptor::audio(1, "aac", 2, None)];
        let mut plan = AudioPlan::build(&streams, false).unwrap();
        plan.apply_loudness(&[-19.0], &PlanConfig::default()).unwrap();
        let d = decision(&plan, 1);
        assert!(d.convert && !d.copy);
        assert_eq!(d.gain_db, Some(-4.0));
    }

    #[test]
    fn test_surround_default_copies_and_converts() {
        let streams = vec![
            StreamDescriptor::audio(1, "ac3", 6, Some("und")),
            StreamDescriptor::audio(2, "aac", 2, Some("fre")),
        ];
        let mut plan = AudioPlan::build(&streams, true).unwrap();
        assert!(!plan.needs_aac_to_ac3_pipeline);

        let d = decision(&plan, 1);
        assert!(d.copy && d.convert);
        assert_eq!(plan.tracks[0].language, "eng");
        assert_eq!(plan.tracks[1].language, "fre");

        let other = decision(&plan, 2);
        assert!(other.measure && other.copy && !other.convert);

        plan.apply_loudness(&[-30.0, -21.5], &PlanConfig::default()).unwrap();
        let d = decision(&plan, 1);
        assert_eq!(d.gain_db, Some(7.0));
        assert!(d.copy && d.convert);
        let other = decision(&plan, 2);
        assert_eq!(other.gain_db, Some(-1.5));
        assert!(other.convert && !other.copy);
        assert_eq!(plan.output_track_count(), 3);
    }

    #[test]
    fn test_ac3_dts_tie_breaks_by_index() {
        let streams = vec![
            StreamDescriptor::audio(1, "aac", 6, None),
            StreamDescriptor::audio(2, "dts", 6, None),
            StreamDescriptor::audio(3, "ac3", 6, None),
        ];
        assert_eq!(select_default(&streams).map(|s| s.index), Some(2));

        let swapped = vec![
            StreamDescriptor::audio(2, "ac3", 6, None),
            StreamDescriptor::audio(3, "dts", 6, None),
        ];
        assert_eq!(select_default(&swapped).map(|s| s.index), Some(2));
    }

    #[test]
    fn test_default_is_first_then_index_order() {
        let streams = vec![
            StreamDescriptor::audio(1, "aac", 2, None),
            StreamDescriptor::audio(2, "aac", 2, None),
            StreamDescriptor::audio(3, "dts", 6, None),
        ];
        let plan = AudioPlan::build(&streams, true).unwrap();
        let order: Vec<u32> = plan.tracks.iter().map(|t| t.stream.index).collect();
        assert_eq!(order, vec![3, 1, 2]);
        assert_eq!(plan.tracks.iter().filter(|t| t.decision.is_default).count(), 1);
    }

    #[test]
    fn test_no_audio() {
        let streams = vec![StreamDescriptor::video(0, "h264", 1920, 1080)];
        assert!(matches!(
            AudioPlan::build(&streams, false),
            Err(CoreError::NoAudioStream)
        ));
    }

    #[test]
    fn test_count_mismatch_aborts() {
        let streams = vec![
            StreamDescriptor::audio(1, "aac", 2, None),
            StreamDescriptor::audio(2, "aac", 2, None),
        ];
        let mut plan = AudioPlan::build(&streams, true).unwrap();
        let before = plan.clone();
        let err = plan.apply_loudness(&[-20.0], &PlanConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::MeasurementCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(plan, before);
    }

    #[test]
    fn test_gain_tolerance_boundary() {
        let config = PlanConfig::default();
        for (measured, expected_gain) in [(-22.0, None), (-24.0, None), (-21.9, Some(-1.1)), (-30.5, Some(7.5))] {
            let streams = vec![StreamDescriptor::audio(1, "ac3", 6, None)];
            let mut plan = AudioPlan::build(&streams, false).unwrap();
            plan.apply_loudness(&[measured], &config).unwrap();
            let gain = decision(&plan, 1).gain_db;
            match expected_gain {
                None => assert_eq!(gain, None, "measured {measured}"),
                Some(g) => assert!((gain.unwrap() - g).abs() < 1e-9, "measured {measured}"),
            }
        }
    }

    #[test]
    fn test_rebuild_is_independent_of_previous_run() {
        let streams = vec![StreamDescriptor::audio(1, "aac", 2, None)];
        let mut first = AudioPlan::build(&streams, false).unwrap();
        first.apply_loudness(&[-15.0], &PlanConfig::default()).unwrap();
        let second = AudioPlan::build(&streams, false).unwrap();
        assert_eq!(second, AudioPlan::build(&streams, false).unwrap());
        assert!(decision(&second, 1).copy);
        assert_eq!(decision(&second, 1).gain_db, None);
    }
}
