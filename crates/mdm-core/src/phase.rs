//! Phase descriptors and the static global-progress weighting.
//!
//! Each phase of a job owns a sub-range of [0,1]; local per-phase fractions
//! are mapped into that range so observers see one monotonic progress value.
//! The weights are a declared policy, not measured from real durations.

use serde::Serialize;

use crate::job::JobKind;

/// Which kind of work a phase performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Video,
    Audio,
    Progressive,
    Merge,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Video => "video",
            PhaseKind::Audio => "audio",
            PhaseKind::Progressive => "progressive",
            PhaseKind::Merge => "merge",
        }
    }
}

/// A phase's slice [base, base+span) of global progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSpan {
    pub base: f64,
    pub span: f64,
}

impl PhaseSpan {
    pub const fn new(base: f64, span: f64) -> Self {
        PhaseSpan { base, span }
    }

    /// Maps a local fraction (clamped to [0,1]) into this span.
    pub fn global(&self, local: f64) -> f64 {
        self.base + self.span * local.clamp(0.0, 1.0)
    }

    pub fn end(&self) -> f64 {
        self.base + self.span
    }
}

/// Merge job: video download occupies [0.00, 0.80).
pub const MERGE_VIDEO: PhaseSpan = PhaseSpan::new(0.00, 0.80);
/// Merge job: audio download occupies [0.80, 0.90).
pub const MERGE_AUDIO: PhaseSpan = PhaseSpan::new(0.80, 0.10);
/// Merge job: mux occupies [0.90, 0.99]; finalize pushes to 1.0.
pub const MERGE_MUX: PhaseSpan = PhaseSpan::new(0.90, 0.09);
/// Progressive job: the single download occupies [0.00, 0.90).
pub const PROGRESSIVE: PhaseSpan = PhaseSpan::new(0.00, 0.90);

/// Ordered phase plan for a job kind. The trailing gap up to 1.0 belongs to
/// the finalize step.
pub fn plan(kind: JobKind) -> Vec<(PhaseKind, PhaseSpan)> {
    match kind {
        JobKind::Merge => vec![
            (PhaseKind::Video, MERGE_VIDEO),
            (PhaseKind::Audio, MERGE_AUDIO),
            (PhaseKind::Merge, MERGE_MUX),
        ],
        JobKind::Progressive => vec![(PhaseKind::Progressive, PROGRESSIVE)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_partition_without_gaps_or_overlap() {
        for kind in [JobKind::Merge, JobKind::Progressive] {
            let plan = plan(kind);
            let mut cursor = 0.0f64;
            for (_, span) in &plan {
                assert!(
                    (span.base - cursor).abs() < 1e-9,
                    "{:?}: phase base {} leaves a gap after {}",
                    kind,
                    span.base,
                    cursor
                );
                assert!(span.span > 0.0);
                cursor = span.end();
            }
            assert!(cursor <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn half_done_video_maps_to_forty_percent_global() {
        let p = MERGE_VIDEO.global(0.5);
        assert!((p - 0.40).abs() < 1e-9);
    }

    #[test]
    fn local_fraction_is_clamped() {
        assert_eq!(MERGE_AUDIO.global(-0.5), 0.80);
        assert_eq!(MERGE_AUDIO.global(1.5), MERGE_AUDIO.end());
    }

    #[test]
    fn mux_span_tops_out_at_ninety_nine() {
        assert!((MERGE_MUX.global(1.0) - 0.99).abs() < 1e-9);
    }
}
