//! Orders matches for presentation.

use crate::domain::screener::MatchResult;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedMatch {
    /// 1-based.
    pub rank: usize,
    pub result: MatchResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenReport {
    Empty,
    /// Never empty.
    Ranked(Vec<RankedMatch>),
}

impl ScreenReport {
    pub fn len(&self) -> usize {
        match self {
            ScreenReport::Empty => 0,
            ScreenReport::Ranked(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ScreenReport::Empty)
    }

    pub fn rows(&self) -> &[RankedMatch] {
        match self {
            ScreenReport::Empty => &[],
            ScreenReport::Ranked(rows) => rows,
        }
    }
}

/// Sort by latest close, highest first. Ties keep their input order.
pub fn rank_matches(mut matches: Vec<MatchResult>) -> ScreenReport {
    if matches.is_empty() {
        return ScreenReport::Empty;
    }
    matches.sort_by(|a, b| b.close.total_cmp(&a.close));
    ScreenReport::Ranked(
        matches
            .into_iter()
            .enumerate()
            .map(|(i, result)| RankedMatch { rank: i + 1, result })
            .collect(),
    )
}
