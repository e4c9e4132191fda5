//! Milestone table
//!
//! Fixed, ordered list of achievement predicates keyed by stable ids. A
//! milestone unlocks permanently the first time its condition holds; the
//! table order is the order newly unlocked ids are appended in.

use super::MilestoneMetrics;

/// A single milestone definition
pub struct Milestone {
    /// Stable identifier stored in the user document
    pub id: &'static str,
    /// Message surfaced to the client when this milestone unlocks
    pub message: &'static str,
    /// Predicate over the freshly computed metrics
    pub condition: fn(&MilestoneMetrics) -> bool,
}

/// The milestone table, in evaluation order
pub const MILESTONES: &[Milestone] = &[
    Milestone {
        id: "first_conversation",
        message: "You had your first conversation with Astra!",
        condition: |m| m.total_conversations >= 1,
    },
    Milestone {
        id: "streak_3",
        message: "Three days in a row - your streak is taking off!",
        condition: |m| m.streak_days >= 3,
    },
    Milestone {
        id: "streak_7",
        message: "A full week of daily conversations!",
        condition: |m| m.streak_days >= 7,
    },
    Milestone {
        id: "conversations_10",
        message: "Ten conversations and counting!",
        condition: |m| m.total_conversations >= 10,
    },
    Milestone {
        id: "conversations_25",
        message: "Twenty-five conversations - Astra knows you well by now.",
        condition: |m| m.total_conversations >= 25,
    },
    Milestone {
        id: "conversations_50",
        message: "Fifty conversations - a true regular!",
        condition: |m| m.total_conversations >= 50,
    },
    Milestone {
        id: "conversations_100",
        message: "One hundred conversations - the stars salute you!",
        condition: |m| m.total_conversations >= 100,
    },
    Milestone {
        id: "full_chart",
        message: "Your birth chart is complete!",
        condition: |m| m.chart_completion_percent >= 100,
    },
    Milestone {
        id: "topic_explorer",
        message: "Five different topics explored - a curious mind!",
        condition: |m| m.topics_explored >= 5,
    },
];

/// Celebration message for a milestone id, if it exists in the table
pub fn celebration_message(id: &str) -> Option<&'static str> {
    MILESTONES.iter().find(|m| m.id == id).map(|m| m.message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_milestone_has_a_message() {
        for milestone in MILESTONES {
            assert!(!milestone.message.is_empty(), "{} missing message", milestone.id);
            assert_eq!(celebration_message(milestone.id), Some(milestone.message));
        }
    }

    #[test]
    fn test_ids_are_unique() {
        for (i, a) in MILESTONES.iter().enumerate() {
            for b in &MILESTONES[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_unknown_id_has_no_message() {
        assert_eq!(celebration_message("streak_9000"), None);
    }

    #[test]
    fn test_conversation_thresholds() {
        let metrics = |total| MilestoneMetrics {
            streak_days: 0,
            total_conversations: total,
            chart_completion_percent: 0,
            topics_explored: 0,
        };

        let conversations_10 = MILESTONES.iter().find(|m| m.id == "conversations_10").unwrap();
        assert!(!(conversations_10.condition)(&metrics(9)));
        assert!((conversations_10.condition)(&metrics(10)));
        assert!((conversations_10.condition)(&metrics(11)));
    }
}
