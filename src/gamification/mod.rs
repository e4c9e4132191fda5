//! Streak and milestone tracking
//!
//! Recomputes a user's gamification state from their completed conversations:
//! consecutive-day streak, best streak, explored topics, birth-chart
//! completion, and the permanently-unlocked milestone list. All arithmetic is
//! pure; persistence happens at the route layer with a single document update.

mod milestones;

pub use milestones::{celebration_message, Milestone, MILESTONES};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Gamification state embedded in the user document.
///
/// Replaced wholesale on each recompute; only `milestones_unlocked` (monotonic
/// union) and `best_streak` (monotonic max) carry forward from the previous
/// state.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GamificationState {
    /// Current consecutive-day streak ending today or yesterday
    #[serde(default)]
    pub streak_days: u32,

    /// Highest streak ever reached
    #[serde(default)]
    pub best_streak: u32,

    /// Completed conversations, lifetime
    #[serde(default)]
    pub total_conversations: u64,

    /// Unlocked milestone ids, in unlock order, each unique
    #[serde(default)]
    pub milestones_unlocked: Vec<String>,

    /// Distinct topics seen across the cached recent conversations
    #[serde(default)]
    pub topics_explored: Vec<String>,

    /// Birth-profile completeness, one of 0/25/50/75/100
    #[serde(default)]
    pub chart_completion_percent: u8,

    /// End timestamp of the most recent completed conversation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_conversation_date: Option<DateTime<Utc>>,

    /// When this state was last recomputed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Presence flags for the four birth-profile fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BirthProfileFlags {
    pub has_birth_date: bool,
    pub has_birth_time: bool,
    pub has_birth_location: bool,
    pub has_timezone: bool,
}

impl BirthProfileFlags {
    fn present_count(&self) -> u8 {
        [
            self.has_birth_date,
            self.has_birth_time,
            self.has_birth_location,
            self.has_timezone,
        ]
        .iter()
        .filter(|f| **f)
        .count() as u8
    }
}

/// Inputs to a recompute: everything read from storage before the arithmetic runs
#[derive(Debug, Clone, Default)]
pub struct RecomputeInput {
    /// Calendar end dates of all completed conversations (duplicates allowed)
    pub completed_dates: Vec<NaiveDate>,

    /// Completed conversations, lifetime
    pub total_conversations: u64,

    /// Topic lists from the cached recent-conversation summaries only
    pub recent_topics: Vec<Vec<String>>,

    /// Birth-profile presence flags
    pub birth_profile: BirthProfileFlags,

    /// End timestamp of the most recent completed conversation
    pub last_conversation_date: Option<DateTime<Utc>>,
}

/// Result of a recompute: the full new state plus what changed in this call
#[derive(Debug, Clone)]
pub struct RecomputeOutcome {
    pub state: GamificationState,
    /// Milestone ids unlocked by this specific call, in table order
    pub new_milestones: Vec<String>,
}

/// Consecutive-day streak ending at `today` or the day before.
///
/// Collapses timestamps to unique calendar dates, walks them newest-first,
/// and stops at the first gap of more than one day. A conversation yesterday
/// with none today still counts as an active streak.
pub fn current_streak(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    // BTreeSet dedups and orders; iterate newest-first
    let unique: BTreeSet<NaiveDate> = dates.iter().copied().collect();

    let mut streak = 0u32;
    let mut cursor = today;

    for date in unique.iter().rev() {
        if *date > cursor {
            // Future-dated records never contribute
            continue;
        }
        if *date == cursor || *date == cursor - Duration::days(1) {
            streak += 1;
            cursor = *date;
        } else {
            break;
        }
    }

    streak
}

/// Birth-chart completion: 25% per present field, so always 0/25/50/75/100
pub fn chart_completion_percent(flags: BirthProfileFlags) -> u8 {
    flags.present_count() * 25
}

/// Set-union of topic lists, first-seen order preserved
fn union_topics(topic_lists: &[Vec<String>]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut topics = Vec::new();
    for list in topic_lists {
        for topic in list {
            if seen.insert(topic.clone()) {
                topics.push(topic.clone());
            }
        }
    }
    topics
}

/// Recompute the full gamification state.
///
/// `previous` is the stored state (or default for new users); `today` is the
/// day-truncated current date, passed in so the walk is deterministic under
/// test.
pub fn recompute(
    previous: &GamificationState,
    input: &RecomputeInput,
    today: NaiveDate,
) -> RecomputeOutcome {
    let streak_days = current_streak(&input.completed_dates, today);
    let best_streak = previous.best_streak.max(streak_days);
    let topics_explored = union_topics(&input.recent_topics);
    let chart_completion = chart_completion_percent(input.birth_profile);

    let mut milestones_unlocked = previous.milestones_unlocked.clone();
    let mut new_milestones = Vec::new();

    for milestone in MILESTONES {
        if milestones_unlocked.iter().any(|id| id == milestone.id) {
            continue;
        }
        let unlocked = (milestone.condition)(&MilestoneMetrics {
            streak_days,
            total_conversations: input.total_conversations,
            chart_completion_percent: chart_completion,
            topics_explored: topics_explored.len(),
        });
        if unlocked {
            milestones_unlocked.push(milestone.id.to_string());
            new_milestones.push(milestone.id.to_string());
        }
    }

    let state = GamificationState {
        streak_days,
        best_streak,
        total_conversations: input.total_conversations,
        milestones_unlocked,
        topics_explored,
        chart_completion_percent: chart_completion,
        last_conversation_date: input.last_conversation_date,
        last_updated: Some(Utc::now()),
    };

    RecomputeOutcome {
        state,
        new_milestones,
    }
}

/// Metrics the milestone predicates evaluate against
pub struct MilestoneMetrics {
    pub streak_days: u32,
    pub total_conversations: u64,
    pub chart_completion_percent: u8,
    pub topics_explored: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const TODAY: fn() -> NaiveDate = || day(2025, 6, 15);

    #[test]
    fn test_streak_today_and_yesterday() {
        let dates = vec![day(2025, 6, 15), day(2025, 6, 14)];
        assert_eq!(current_streak(&dates, TODAY()), 2);
    }

    #[test]
    fn test_streak_gap_stops_walk() {
        // Today plus three days ago: gap breaks the streak at 1
        let dates = vec![day(2025, 6, 15), day(2025, 6, 12)];
        assert_eq!(current_streak(&dates, TODAY()), 1);
    }

    #[test]
    fn test_streak_yesterday_only_still_active() {
        let dates = vec![day(2025, 6, 14)];
        assert_eq!(current_streak(&dates, TODAY()), 1);
    }

    #[test]
    fn test_streak_two_days_ago_is_broken() {
        let dates = vec![day(2025, 6, 13)];
        assert_eq!(current_streak(&dates, TODAY()), 0);
    }

    #[test]
    fn test_streak_duplicates_collapse() {
        let dates = vec![
            day(2025, 6, 15),
            day(2025, 6, 15),
            day(2025, 6, 14),
            day(2025, 6, 14),
            day(2025, 6, 13),
        ];
        assert_eq!(current_streak(&dates, TODAY()), 3);
    }

    #[test]
    fn test_streak_empty() {
        assert_eq!(current_streak(&[], TODAY()), 0);
    }

    #[test]
    fn test_streak_long_run_through_yesterday() {
        // Five consecutive days ending yesterday, none today
        let dates: Vec<NaiveDate> = (10..=14).map(|d| day(2025, 6, d)).collect();
        assert_eq!(current_streak(&dates, TODAY()), 5);
    }

    #[test]
    fn test_chart_completion_values() {
        let mut flags = BirthProfileFlags::default();
        assert_eq!(chart_completion_percent(flags), 0);
        flags.has_birth_date = true;
        assert_eq!(chart_completion_percent(flags), 25);
        flags.has_birth_time = true;
        assert_eq!(chart_completion_percent(flags), 50);
        flags.has_birth_location = true;
        assert_eq!(chart_completion_percent(flags), 75);
        flags.has_timezone = true;
        assert_eq!(chart_completion_percent(flags), 100);
    }

    #[test]
    fn test_first_conversation_and_full_chart_unlock_together() {
        let previous = GamificationState::default();
        let input = RecomputeInput {
            completed_dates: vec![TODAY()],
            total_conversations: 1,
            recent_topics: vec![vec!["love".to_string()]],
            birth_profile: BirthProfileFlags {
                has_birth_date: true,
                has_birth_time: true,
                has_birth_location: true,
                has_timezone: true,
            },
            last_conversation_date: None,
        };

        let outcome = recompute(&previous, &input, TODAY());
        assert_eq!(outcome.state.chart_completion_percent, 100);
        assert!(outcome.new_milestones.contains(&"first_conversation".to_string()));
        assert!(outcome.new_milestones.contains(&"full_chart".to_string()));
        assert_eq!(outcome.state.streak_days, 1);
    }

    #[test]
    fn test_best_streak_never_decreases() {
        let previous = GamificationState {
            best_streak: 9,
            ..Default::default()
        };
        let input = RecomputeInput {
            completed_dates: vec![TODAY()],
            total_conversations: 20,
            ..Default::default()
        };

        let outcome = recompute(&previous, &input, TODAY());
        assert_eq!(outcome.state.streak_days, 1);
        assert_eq!(outcome.state.best_streak, 9);
    }

    #[test]
    fn test_milestones_are_a_superset_of_previous() {
        let previous = GamificationState {
            milestones_unlocked: vec!["first_conversation".to_string(), "streak_7".to_string()],
            best_streak: 8,
            ..Default::default()
        };
        // Streak is now broken; streak_7 must survive
        let input = RecomputeInput {
            completed_dates: vec![],
            total_conversations: 12,
            ..Default::default()
        };

        let outcome = recompute(&previous, &input, TODAY());
        for id in &previous.milestones_unlocked {
            assert!(outcome.state.milestones_unlocked.contains(id));
        }
        // Prior order preserved, new ids appended
        assert_eq!(outcome.state.milestones_unlocked[0], "first_conversation");
        assert_eq!(outcome.state.milestones_unlocked[1], "streak_7");
        assert!(outcome.state.milestones_unlocked.contains(&"conversations_10".to_string()));
    }

    #[test]
    fn test_conversations_10_crosses_exactly_once() {
        let previous = GamificationState {
            milestones_unlocked: vec!["first_conversation".to_string()],
            ..Default::default()
        };
        let input = RecomputeInput {
            total_conversations: 10,
            ..Default::default()
        };

        let outcome = recompute(&previous, &input, TODAY());
        assert_eq!(
            outcome
                .new_milestones
                .iter()
                .filter(|id| *id == "conversations_10")
                .count(),
            1
        );

        // A second recompute with the same metrics reports nothing new
        let again = recompute(&outcome.state, &input, TODAY());
        assert!(again.new_milestones.is_empty());
        assert!(again
            .state
            .milestones_unlocked
            .contains(&"conversations_10".to_string()));
    }

    #[test]
    fn test_streak_milestones() {
        let previous = GamificationState::default();
        let dates: Vec<NaiveDate> = (9..=15).map(|d| day(2025, 6, d)).collect();
        let input = RecomputeInput {
            completed_dates: dates,
            total_conversations: 7,
            ..Default::default()
        };

        let outcome = recompute(&previous, &input, TODAY());
        assert_eq!(outcome.state.streak_days, 7);
        assert!(outcome.new_milestones.contains(&"streak_3".to_string()));
        assert!(outcome.new_milestones.contains(&"streak_7".to_string()));
    }

    #[test]
    fn test_topic_explorer_at_five_topics() {
        let previous = GamificationState::default();
        let input = RecomputeInput {
            total_conversations: 1,
            recent_topics: vec![
                vec!["love".into(), "career".into()],
                vec!["career".into(), "health".into(), "family".into()],
                vec!["travel".into()],
            ],
            ..Default::default()
        };

        let outcome = recompute(&previous, &input, TODAY());
        assert_eq!(outcome.state.topics_explored.len(), 5);
        assert!(outcome.new_milestones.contains(&"topic_explorer".to_string()));
    }

    #[test]
    fn test_topics_union_dedups_and_keeps_first_seen_order() {
        let topics = union_topics(&[
            vec!["a".into(), "b".into()],
            vec!["b".into(), "c".into()],
        ]);
        assert_eq!(topics, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    }
}
