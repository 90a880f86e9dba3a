//! Score aggregation.
//!
//! Integer arithmetic only, so re-computing a score always yields the same
//! number that was shown before.

use serde::Serialize;

use crate::model::ExerciseId;

/// `round(100 * awarded / possible)` with halves rounded up.
///
/// Returns `None` when nothing is possible to score.
#[must_use]
pub fn aggregate_score(awarded: u64, possible: u64) -> Option<u8> {
    if possible == 0 {
        return None;
    }
    let awarded = u128::from(awarded.min(possible));
    let possible = u128::from(possible);
    let rounded = (200 * awarded + possible) / (2 * possible);
    u8::try_from(rounded.min(100)).ok()
}

/// Whole-number percentage of `part` in `whole`, halves rounded up; 0 for an empty whole.
#[must_use]
pub fn percent(part: usize, whole: usize) -> u8 {
    let (Ok(part), Ok(whole)) = (u64::try_from(part), u64::try_from(whole)) else {
        return 0;
    };
    aggregate_score(part, whole).unwrap_or(0)
}

/// Points per exercise for one attempt, resolved or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Sum of awarded points over resolved exercises.
    pub awarded: u64,
    /// Sum of maximum points over all exercises.
    pub possible: u64,
    pub resolved: usize,
    pub unresolved: Vec<ExerciseId>,
    /// Only present once nothing is unresolved.
    pub total_score: Option<u8>,
}

impl ScoreSummary {
    /// Build from `(exercise, max points, awarded points)` triples.
    pub fn from_entries(entries: impl IntoIterator<Item = (ExerciseId, u32, Option<u32>)>) -> Self {
        let mut awarded = 0_u64;
        let mut possible = 0_u64;
        let mut resolved = 0_usize;
        let mut unresolved = Vec::new();

        for (exercise_id, max_points, points) in entries {
            possible = possible.saturating_add(u64::from(max_points));
            match points {
                Some(points) => {
                    awarded = awarded.saturating_add(u64::from(points.min(max_points)));
                    resolved += 1;
                }
                None => unresolved.push(exercise_id),
            }
        }

        let total_score = if unresolved.is_empty() {
            aggregate_score(awarded, possible)
        } else {
            None
        };

        Self {
            awarded,
            possible,
            resolved,
            unresolved,
            total_score,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_thirds_rounds_to_67() {
        assert_eq!(aggregate_score(20, 30), Some(67));
    }

    #[test]
    fn halves_round_up() {
        assert_eq!(aggregate_score(1, 8), Some(13)); // 12.5
        assert_eq!(aggregate_score(1, 200), Some(1)); // 0.5
        assert_eq!(aggregate_score(1, 201), Some(0)); // 0.497..
    }

    #[test]
    fn bounds() {
        assert_eq!(aggregate_score(0, 10), Some(0));
        assert_eq!(aggregate_score(10, 10), Some(100));
        assert_eq!(aggregate_score(0, 0), None);
        assert_eq!(aggregate_score(u64::MAX, u64::MAX), Some(100));
    }

    #[test]
    fn summary_requires_every_entry_resolved() {
        let a = ExerciseId::new(1);
        let b = ExerciseId::new(2);

        let partial = ScoreSummary::from_entries([(a, 10, Some(10)), (b, 20, None)]);
        assert_eq!(partial.awarded, 10);
        assert_eq!(partial.possible, 30);
        assert_eq!(partial.unresolved, vec![b]);
        assert_eq!(partial.total_score, None);

        let full = ScoreSummary::from_entries([(a, 10, Some(10)), (b, 20, Some(10))]);
        assert_eq!(full.total_score, Some(67));
        assert!(full.is_complete());
    }

    #[test]
    fn percent_of_empty_is_zero() {
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
    }
}
