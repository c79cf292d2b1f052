//! Transcript accumulation.
//!
//! Volatile hypotheses replace one another; finalized results append and
//! clear the volatile portion. The accumulator never loses finalized text,
//! including across mid-session pipeline rebuilds.

use crate::engine::TranscriptionResult;

/// Read-only view of the accumulated transcript.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranscriptSnapshot {
    /// Text the engine has committed to.
    pub finalized: String,
    /// Current replaceable hypothesis, if any.
    pub volatile: String,
}

impl TranscriptSnapshot {
    /// Finalized text followed by the pending hypothesis.
    pub fn combined(&self) -> String {
        if self.volatile.is_empty() {
            self.finalized.clone()
        } else if self.finalized.is_empty() {
            self.volatile.clone()
        } else {
            format!("{} {}", self.finalized, self.volatile)
        }
    }
}

/// Applies engine results to a running transcript.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    finalized: String,
    volatile: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one engine result into the transcript.
    pub fn apply(&mut self, result: &TranscriptionResult) {
        if result.is_final {
            if !result.text.is_empty() {
                if !self.finalized.is_empty() {
                    self.finalized.push(' ');
                }
                self.finalized.push_str(&result.text);
            }
            self.volatile.clear();
        } else {
            self.volatile = result.text.clone();
        }
    }

    /// Drops the pending hypothesis, keeping finalized text.
    ///
    /// Used when the pipeline is rebuilt mid-session; the replaced engine
    /// stream's hypothesis no longer means anything.
    pub fn clear_volatile(&mut self) {
        self.volatile.clear();
    }

    /// Clears everything for a fresh session.
    pub fn reset(&mut self) {
        self.finalized.clear();
        self.volatile.clear();
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            finalized: self.finalized.clone(),
            volatile: self.volatile.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volatile_results_replace_each_other() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply(&TranscriptionResult::volatile("he"));
        acc.apply(&TranscriptionResult::volatile("hel"));
        acc.apply(&TranscriptionResult::volatile("hello"));

        let snapshot = acc.snapshot();
        assert_eq!(snapshot.volatile, "hello");
        assert_eq!(snapshot.finalized, "");
        assert_eq!(snapshot.combined(), "hello");
    }

    #[test]
    fn test_final_appends_and_clears_volatile() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply(&TranscriptionResult::volatile("hello wor"));
        acc.apply(&TranscriptionResult::finalized("hello world"));

        let snapshot = acc.snapshot();
        assert_eq!(snapshot.finalized, "hello world");
        assert_eq!(snapshot.volatile, "");
    }

    #[test]
    fn test_finals_join_with_single_space() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply(&TranscriptionResult::finalized("first sentence."));
        acc.apply(&TranscriptionResult::finalized("second sentence."));

        assert_eq!(
            acc.snapshot().finalized,
            "first sentence. second sentence."
        );
    }

    #[test]
    fn test_empty_final_only_clears_volatile() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply(&TranscriptionResult::finalized("kept"));
        acc.apply(&TranscriptionResult::volatile("discarded"));
        acc.apply(&TranscriptionResult::finalized(""));

        let snapshot = acc.snapshot();
        assert_eq!(snapshot.finalized, "kept");
        assert_eq!(snapshot.volatile, "");
    }

    #[test]
    fn test_clear_volatile_preserves_finalized() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply(&TranscriptionResult::finalized("stable text"));
        acc.apply(&TranscriptionResult::volatile("in flight"));

        acc.clear_volatile();

        let snapshot = acc.snapshot();
        assert_eq!(snapshot.finalized, "stable text");
        assert_eq!(snapshot.volatile, "");
    }

    #[test]
    fn test_combined_orders_finalized_before_volatile() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply(&TranscriptionResult::finalized("done"));
        acc.apply(&TranscriptionResult::volatile("pending"));

        assert_eq!(acc.snapshot().combined(), "done pending");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut acc = TranscriptAccumulator::new();
        acc.apply(&TranscriptionResult::finalized("old session"));
        acc.reset();

        assert_eq!(acc.snapshot(), TranscriptSnapshot::default());
    }
}
