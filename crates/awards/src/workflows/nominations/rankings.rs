use std::collections::BTreeMap;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{CycleId, Nomination, NominationStatus, UserId};

/// Ranked position of one nominee within a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub rank: u32,
    pub nominee_user_id: UserId,
    pub total_score: f64,
    pub nominations: usize,
}

/// Rankings for a cycle at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingTable {
    pub cycle_id: CycleId,
    pub computed_at: DateTime<Utc>,
    pub entries: Vec<RankingEntry>,
}

/// Rank nominees by the mean rating of their approved nominations.
///
/// Higher scores rank first. Equal scores share a rank and the next distinct
/// score skips ahead (1, 2, 2, 4). Ties are listed by nominee id.
pub fn rank_nominations(
    cycle_id: &CycleId,
    nominations: &[Nomination],
    computed_at: DateTime<Utc>,
) -> RankingTable {
    let mut totals: BTreeMap<&UserId, (f64, usize)> = BTreeMap::new();
    for nomination in nominations.iter().filter(|n| {
        &n.cycle_id == cycle_id && n.status == NominationStatus::Approved
    }) {
        let Some(rating) = nomination.rating else {
            continue;
        };
        let entry = totals.entry(&nomination.nominee_user_id).or_insert((0.0, 0));
        entry.0 += rating;
        entry.1 += 1;
    }

    let mut scored: Vec<(UserId, f64, usize)> = totals
        .into_iter()
        .map(|(user, (sum, count))| (user.clone(), sum / count as f64, count))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut entries: Vec<RankingEntry> = Vec::with_capacity(scored.len());
    for (position, (nominee_user_id, total_score, count)) in scored.into_iter().enumerate() {
        let rank = match entries.last() {
            Some(previous) if previous.total_score == total_score => previous.rank,
            _ => position as u32 + 1,
        };
        entries.push(RankingEntry {
            rank,
            nominee_user_id,
            total_score,
            nominations: count,
        });
    }

    RankingTable {
        cycle_id: cycle_id.clone(),
        computed_at,
        entries,
    }
}

impl RankingTable {
    /// Write the table as CSV with scores rounded to two decimals.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(["rank", "nominee_user_id", "total_score", "nominations"])?;
        for entry in &self.entries {
            csv_writer.write_record([
                entry.rank.to_string(),
                entry.nominee_user_id.0.clone(),
                format!("{:.2}", entry.total_score),
                entry.nominations.to_string(),
            ])?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}
