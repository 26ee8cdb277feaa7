//! Reminder checkpoint planning
//!
//! Given the minutes remaining until a session's deadline, produce the
//! ordered list of "minutes before expiry" checkpoints at which to notify
//! the user. The cadence is proportional to the remaining runway:
//!
//! - 30 minutes or more: warn at 20 and 10 minutes before expiry
//! - 15 to 30 minutes: warn at 10 and 5 minutes before expiry
//! - under 15 minutes: warn at half and a fifth of the remaining time
//!
//! Every plan terminates in the `0` (expiry) checkpoint. The planner runs at
//! schedule time, not session-creation time, so a scheduler re-spawned
//! mid-session plans from what is actually left.

/// Compute the reminder checkpoints for a session.
///
/// The result is strictly decreasing and always ends in `0`; short-tier
/// values that collapse to zero, go negative, or tie an earlier checkpoint
/// are dropped rather than adjusted.
pub fn plan_checkpoints(total_minutes: f64) -> Vec<i64> {
    let tiers: [i64; 2] = if total_minutes >= 30.0 {
        [20, 10]
    } else if total_minutes >= 15.0 {
        [10, 5]
    } else {
        [(total_minutes * 0.5) as i64, (total_minutes * 0.2) as i64]
    };

    let mut checkpoints: Vec<i64> = Vec::with_capacity(3);
    for minutes in tiers {
        if minutes > 0 && checkpoints.last().map_or(true, |&prev| minutes < prev) {
            checkpoints.push(minutes);
        }
    }
    checkpoints.push(0);
    checkpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_long_sessions_use_fixed_checkpoints() {
        assert_eq!(plan_checkpoints(30.0), vec![20, 10, 0]);
        assert_eq!(plan_checkpoints(31.0), vec![20, 10, 0]);
        assert_eq!(plan_checkpoints(120.0), vec![20, 10, 0]);
        assert_eq!(plan_checkpoints(1440.0), vec![20, 10, 0]);
    }

    #[test]
    fn test_medium_sessions_use_fixed_checkpoints() {
        assert_eq!(plan_checkpoints(15.0), vec![10, 5, 0]);
        assert_eq!(plan_checkpoints(20.0), vec![10, 5, 0]);
        assert_eq!(plan_checkpoints(29.9), vec![10, 5, 0]);
    }

    #[test]
    fn test_short_sessions_scale_with_runway() {
        // 8 minutes: half is 4, a fifth is 1.6 which floors to 1
        assert_eq!(plan_checkpoints(8.0), vec![4, 1, 0]);
        // 10 minutes: 5 and 2
        assert_eq!(plan_checkpoints(10.0), vec![5, 2, 0]);
        // 14 minutes: 7 and 2
        assert_eq!(plan_checkpoints(14.0), vec![7, 2, 0]);
    }

    #[test]
    fn test_tiny_sessions_collapse_checkpoints() {
        // 4 minutes: a fifth floors to 0 and is dropped
        assert_eq!(plan_checkpoints(4.0), vec![2, 0]);
        // 2 minutes: 1 and 0
        assert_eq!(plan_checkpoints(2.0), vec![1, 0]);
        // 1 minute: both tiers floor to 0
        assert_eq!(plan_checkpoints(1.0), vec![0]);
    }

    #[test]
    fn test_ties_are_dropped() {
        // 2.5 minutes: 1.25 and 0.5 both floor to values that cannot repeat
        assert_eq!(plan_checkpoints(2.5), vec![1, 0]);
        // 3 minutes: 1.5 -> 1, 0.6 -> 0 dropped
        assert_eq!(plan_checkpoints(3.0), vec![1, 0]);
    }

    #[test]
    fn test_expired_or_empty_runway_yields_expiry_only() {
        assert_eq!(plan_checkpoints(0.0), vec![0]);
        assert_eq!(plan_checkpoints(-5.0), vec![0]);
        assert_eq!(plan_checkpoints(-120.0), vec![0]);
    }

    proptest! {
        /// The plan is strictly decreasing and ends in exactly one `0`.
        #[test]
        fn plan_is_strictly_decreasing_and_ends_in_zero(minutes in -1000.0f64..100000.0) {
            let plan = plan_checkpoints(minutes);

            prop_assert!(!plan.is_empty());
            prop_assert_eq!(*plan.last().unwrap(), 0);
            prop_assert_eq!(plan.iter().filter(|&&c| c == 0).count(), 1);
            for pair in plan.windows(2) {
                prop_assert!(pair[0] > pair[1]);
            }
            for &checkpoint in &plan {
                prop_assert!(checkpoint >= 0);
            }
        }

        /// Long runway always gets the fixed long-tier plan.
        #[test]
        fn long_tier_is_exact(minutes in 30.0f64..100000.0) {
            prop_assert_eq!(plan_checkpoints(minutes), vec![20, 10, 0]);
        }

        /// Medium runway always gets the fixed medium-tier plan.
        #[test]
        fn medium_tier_is_exact(minutes in 15.0f64..30.0) {
            prop_assert_eq!(plan_checkpoints(minutes), vec![10, 5, 0]);
        }

        /// Short runway never plans a checkpoint beyond half the remaining time.
        #[test]
        fn short_tier_fits_in_runway(minutes in 0.0f64..15.0) {
            let plan = plan_checkpoints(minutes);
            prop_assert!((*plan.first().unwrap() as f64) <= minutes / 2.0 + 1.0);
        }
    }
}
