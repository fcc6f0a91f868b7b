//! Checkpoint invariants and their checkers.
//!
//! A run records the stored sequence number after every operation it
//! performs; the checkers below inspect that history.

use eventide_core::SequenceNumber;

// ============================================================================
// Property Violation Types
// ============================================================================

/// A violation of a checkpoint invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyViolation {
    /// The stored sequence number went backwards.
    Regression {
        /// Position in the history where the regression was observed.
        step: usize,
        /// Stored value before the step.
        previous: i64,
        /// Stored value after the step.
        current: i64,
    },
    /// The final stored value isn't the largest value successfully written.
    NotMaximal {
        /// Value left in the store.
        stored: i64,
        /// Largest value any successful write carried.
        max_written: i64,
    },
}

impl std::fmt::Display for PropertyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regression {
                step,
                previous,
                current,
            } => write!(
                f,
                "stored sequence number regressed at step {step}: {previous} -> {current}"
            ),
            Self::NotMaximal {
                stored,
                max_written,
            } => write!(
                f,
                "stored sequence number {stored} is not the maximum written ({max_written})"
            ),
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// Observed stored sequence numbers plus the values successfully written.
#[derive(Debug, Clone, Default)]
pub struct CheckpointHistory {
    stored: Vec<SequenceNumber>,
    written: Vec<SequenceNumber>,
}

impl CheckpointHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the value found in the store after an operation.
    pub fn observe_stored(&mut self, sequence_number: SequenceNumber) {
        self.stored.push(sequence_number);
    }

    /// Records a candidate the controller reported as written.
    pub fn observe_written(&mut self, sequence_number: SequenceNumber) {
        self.written.push(sequence_number);
    }

    /// Number of stored observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stored.len()
    }

    /// Returns true if nothing has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    /// Checks that the stored value never decreased.
    ///
    /// # Errors
    ///
    /// Returns the first regression found.
    pub fn check_monotonic(&self) -> Result<(), PropertyViolation> {
        for (step, pair) in self.stored.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(PropertyViolation::Regression {
                    step: step + 1,
                    previous: pair[0].get(),
                    current: pair[1].get(),
                });
            }
        }
        Ok(())
    }

    /// Checks that the final stored value equals the largest written value.
    ///
    /// Vacuously true when nothing was written or observed.
    ///
    /// # Errors
    ///
    /// Returns `NotMaximal` if the two differ.
    pub fn check_final_is_max(&self) -> Result<(), PropertyViolation> {
        let (Some(stored), Some(max_written)) = (self.stored.last(), self.written.iter().max())
        else {
            return Ok(());
        };
        if stored != max_written {
            return Err(PropertyViolation::NotMaximal {
                stored: stored.get(),
                max_written: max_written.get(),
            });
        }
        Ok(())
    }

    /// Runs every check.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_all(&self) -> Result<(), PropertyViolation> {
        self.check_monotonic()?;
        self.check_final_is_max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(n: i64) -> SequenceNumber {
        SequenceNumber::new(n)
    }

    #[test]
    fn test_regression_detected() {
        let mut history = CheckpointHistory::new();
        for n in [0, 3, 5, 4] {
            history.observe_stored(seq(n));
        }
        assert_eq!(
            history.check_monotonic(),
            Err(PropertyViolation::Regression {
                step: 3,
                previous: 5,
                current: 4,
            })
        );
    }

    #[test]
    fn test_final_must_be_max_written() {
        let mut history = CheckpointHistory::new();
        history.observe_written(seq(7));
        history.observe_written(seq(9));
        history.observe_stored(seq(7));
        assert!(matches!(
            history.check_final_is_max(),
            Err(PropertyViolation::NotMaximal { stored: 7, max_written: 9 })
        ));

        history.observe_stored(seq(9));
        assert!(history.check_all().is_ok());
    }
}
