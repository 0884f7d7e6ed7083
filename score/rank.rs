use crate::aggregate::{DwisTable, ScoreEntry};
use crate::types::Condition;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCondition {
    /// 1-based position, 1 is the best setting.
    pub rank: usize,
    pub condition: Condition,
    pub score: f64,
}

/// Candidate conditions from best to worst.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    entries: Vec<RankedCondition>,
}

impl Ranking {
    pub fn entries(&self) -> &[RankedCondition] {
        &self.entries
    }

    /// `None` only for a hand without candidate conditions.
    pub fn best(&self) -> Option<&RankedCondition> {
        self.entries.first()
    }

    pub fn rank_of(&self, condition: &Condition) -> Option<usize> {
        self.entries
            .iter()
            .find(|entry| &entry.condition == condition)
            .map(|entry| entry.rank)
    }
}

/// Supported scores before zero-coverage ones, then higher score, then earlier
/// acquisition, then the condition key.
fn ranking_order(a: &ScoreEntry, b: &ScoreEntry) -> Ordering {
    b.is_supported()
        .cmp(&a.is_supported())
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.condition.chronological_cmp(&b.condition))
}

pub fn rank_conditions(table: &DwisTable) -> Ranking {
    let mut sorted: Vec<&ScoreEntry> = table.entries().iter().collect();
    sorted.sort_by(|a, b| ranking_order(a, b));
    let entries = sorted
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| RankedCondition {
            rank: idx + 1,
            condition: entry.condition,
            score: entry.score,
        })
        .collect();
    Ranking { entries }
}
