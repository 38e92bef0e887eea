//! Previous-lift matching.
//!
//! Pairs the sets of the current exercise with the sets of the most recent
//! prior performance of the same exercise. Matching is positional *within each
//! set type*: the Nth warmup set of today pairs with the Nth warmup set of last
//! time, regardless of the absolute set numbers involved. This keeps the
//! reference values meaningful when the warmup/drop-set layout changed between
//! sessions.

use crate::{PreviousLift, SetLog, SetType};
use std::collections::HashMap;

/// Match previous sets to current sets by position within the same set-type group.
///
/// `current` must be ordered by set number (the order the sets are performed in);
/// `previous` may arrive in any order and is sorted by its own set numbers here.
///
/// Returns one entry per current set, `None` where the prior exercise had no set
/// of that type at that occurrence index.
pub fn match_previous_sets(current: &[SetLog], previous: &[SetLog]) -> Vec<Option<PreviousLift>> {
    let mut ordered: Vec<&SetLog> = previous.iter().collect();
    ordered.sort_by_key(|s| s.set_number);

    let mut groups: HashMap<SetType, Vec<&SetLog>> = HashMap::new();
    for set in ordered {
        groups.entry(set.set_type).or_default().push(set);
    }

    let mut occurrence: HashMap<SetType, usize> = HashMap::new();
    current
        .iter()
        .map(|set| {
            let index = occurrence.entry(set.set_type).or_insert(0);
            let matched = groups
                .get(&set.set_type)
                .and_then(|group| group.get(*index))
                .map(|prior| PreviousLift {
                    weight: prior.weight,
                    reps: prior.reps,
                    rpe: prior.rpe,
                });
            *index += 1;
            matched
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn set(number: i64, set_type: SetType, weight: f64, reps: i64) -> SetLog {
        SetLog {
            id: Uuid::new_v4(),
            exercise_log_id: Uuid::new_v4(),
            set_number: number,
            weight,
            reps,
            rpe: None,
            completed_at: Some(Utc::now()),
            set_type,
            rest_seconds: 90,
        }
    }

    #[test]
    fn test_matches_by_type_position_not_set_number() {
        // Prior session: Regular#1, Warmup#1, Regular#2 (by set number)
        let previous = vec![
            set(1, SetType::Regular, 100.0, 5),
            set(2, SetType::Warmup, 40.0, 10),
            set(3, SetType::Regular, 105.0, 3),
        ];
        // Current exercise: Warmup#1, Regular#1, Regular#2
        let current = vec![
            set(1, SetType::Warmup, 0.0, 0),
            set(2, SetType::Regular, 0.0, 0),
            set(3, SetType::Regular, 0.0, 0),
        ];

        let matched = match_previous_sets(&current, &previous);

        // Warmup pairs with the prior warmup
        assert_eq!(matched[0].unwrap().weight, 40.0);
        // First regular pairs with the prior *first regular*, not raw set #2
        assert_eq!(matched[1].unwrap().weight, 100.0);
        assert_eq!(matched[2].unwrap().weight, 105.0);
    }

    #[test]
    fn test_unmatched_positions_are_none() {
        let previous = vec![set(1, SetType::Regular, 100.0, 5)];
        let current = vec![
            set(1, SetType::Regular, 0.0, 0),
            set(2, SetType::Regular, 0.0, 0),
            set(3, SetType::DropSet, 0.0, 0),
        ];

        let matched = match_previous_sets(&current, &previous);

        assert!(matched[0].is_some());
        assert!(matched[1].is_none()); // no second regular last time
        assert!(matched[2].is_none()); // no drop sets last time
    }

    #[test]
    fn test_previous_sorted_by_own_set_number() {
        // Previous arrives unordered; positional matching must follow its
        // set numbers, not its slice order.
        let previous = vec![
            set(2, SetType::Regular, 105.0, 3),
            set(1, SetType::Regular, 100.0, 5),
        ];
        let current = vec![
            set(1, SetType::Regular, 0.0, 0),
            set(2, SetType::Regular, 0.0, 0),
        ];

        let matched = match_previous_sets(&current, &previous);

        assert_eq!(matched[0].unwrap().weight, 100.0);
        assert_eq!(matched[1].unwrap().weight, 105.0);
    }

    #[test]
    fn test_empty_previous() {
        let current = vec![set(1, SetType::Regular, 0.0, 0)];
        let matched = match_previous_sets(&current, &[]);
        assert_eq!(matched, vec![None]);
    }
}
