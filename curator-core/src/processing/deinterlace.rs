//! Field-order classification from idet sample counts.
//!
//! The sampler reports one `FieldCounts` per sampled segment; `classify`
//! sums them and only commits to a verdict when the dominant category is
//! both frequent overall and nearly unanimous among determined frames.

use serde::{Deserialize, Serialize};

/// Minimum share of all frames the winning category must reach.
pub const MIN_TOTAL_SHARE: f64 = 0.75;

/// Minimum share of determined (non-undetermined) frames the winner must reach.
pub const MIN_DETERMINED_SHARE: f64 = 0.95;

/// Per-sample frame counts reported by the idet filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCounts {
    pub tff: u64,
    pub bff: u64,
    pub progressive: u64,
    pub undetermined: u64,
}

impl FieldCounts {
    pub fn new(tff: u64, bff: u64, progressive: u64, undetermined: u64) -> Self {
        Self {
            tff,
            bff,
            progressive,
            undetermined,
        }
    }

    pub fn determined(&self) -> u64 {
        self.tff + self.bff + self.progressive
    }

    pub fn total(&self) -> u64 {
        self.determined() + self.undetermined
    }
}

impl std::ops::Add for FieldCounts {
    type Output = FieldCounts;

    fn add(self, other: FieldCounts) -> FieldCounts {
        FieldCounts {
            tff: self.tff + other.tff,
            bff: self.bff + other.bff,
            progressive: self.progressive + other.progressive,
            undetermined: self.undetermined + other.undetermined,
        }
    }
}

/// Field-order verdict for the default video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrder {
    /// Top field first
    Tff,
    /// Bottom field first
    Bff,
    Progressive,
    /// Samples were inconclusive
    Undetermined,
    /// Deinterlacing was not requested
    NotEvaluated,
}

impl FieldOrder {
    /// True for the interlaced verdicts that trigger deinterlacing.
    pub fn is_interlaced(&self) -> bool {
        matches!(self, FieldOrder::Tff | FieldOrder::Bff)
    }

    /// `yadif` parity value for interlaced verdicts.
    pub fn yadif_parity(&self) -> Option<&'static str> {
        match self {
            FieldOrder::Tff => Some("tff"),
            FieldOrder::Bff => Some("bff"),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldOrder::Tff => "TFF",
            FieldOrder::Bff => "BFF",
            FieldOrder::Progressive => "progressive",
            FieldOrder::Undetermined => "undetermined",
            FieldOrder::NotEvaluated => "not evaluated",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for FieldOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tff" => Ok(FieldOrder::Tff),
            "bff" => Ok(FieldOrder::Bff),
            "progressive" | "prog" => Ok(FieldOrder::Progressive),
            other => Err(format!(
                "unknown field order '{other}' (expected tff, bff or progressive)"
            )),
        }
    }
}

/// Aggregates idet samples into a single verdict.
///
/// Ties between categories resolve in the order TFF, BFF, progressive.
/// An empty or all-zero sample set is `Undetermined`.
pub fn classify(samples: &[FieldCounts]) -> FieldOrder {
    let sum = samples
        .iter()
        .copied()
        .fold(FieldCounts::default(), |acc, s| acc + s);

    let total = sum.total();
    let determined = sum.determined();
    if total == 0 || determined == 0 {
        return FieldOrder::Undetermined;
    }

    let candidates = [
        (FieldOrder::Tff, sum.tff),
        (FieldOrder::Bff, sum.bff),
        (FieldOrder::Progressive, sum.progressive),
    ];
    let (verdict, count) = candidates
        .iter()
        .copied()
        .fold((FieldOrder::Tff, 0), |best, c| if c.1 > best.1 { c } else { best });

    let total_share = count as f64 / total as f64;
    let determined_share = count as f64 / determined as f64;
    log::debug!(
        "Field order samples: {sum:?}, leader {verdict} ({:.1}% of all, {:.1}% of determined)",
        total_share * 100.0,
        determined_share * 100.0
    );

    if total_share >= MIN_TOTAL_SHARE && determined_share >= MIN_DETERMINED_SHARE {
        verdict
    } else {
        FieldOrder::Undetermined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_tff() {
        let samples = [FieldCounts::new(480, 2, 10, 8), FieldCounts::new(490, 0, 5, 5)];
        assert_eq!(classify(&samples), FieldOrder::Tff);
    }

    #[test]
    fn test_progressive() {
        let samples = [FieldCounts::new(1, 0, 190, 9)];
        assert_eq!(classify(&samples), FieldOrder::Progressive);
    }

    #[test]
    fn test_too_many_undetermined_frames() {
        // 70% BFF overall, 100% of determined.
        let samples = [FieldCounts::new(0, 70, 0, 30)];
        assert_eq!(classify(&samples), FieldOrder::Undetermined);
    }

    #[test]
    fn test_mixed_determined_frames_are_undetermined() {
        // Dominant category but only 90% of determined frames.
        for undetermined in [0, 5, 50, 500] {
            let samples = [FieldCounts::new(900, 0, 100, undetermined)];
            assert_eq!(classify(&samples), FieldOrder::Undetermined);
            let samples = [FieldCounts::new(100, 0, 900, undetermined)];
            assert_eq!(classify(&samples), FieldOrder::Undetermined);
        }
    }

    #[test]
    fn test_empty_samples() {
        assert_eq!(classify(&[]), FieldOrder::Undetermined);
        assert_eq!(classify(&[FieldCounts::new(0, 0, 0, 12)]), FieldOrder::Undetermined);
    }

    #[test]
    fn test_parse_and_parity() {
        assert_eq!("TFF".parse::<FieldOrder>(), Ok(FieldOrder::Tff));
        assert!("sideways".parse::<FieldOrder>().is_err());
        assert_eq!(FieldOrder::Bff.yadif_parity(), Some("bff"));
        assert_eq!(FieldOrder::Progressive.yadif_parity(), None);
    }
}
