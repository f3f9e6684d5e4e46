use std::collections::BTreeMap;
use std::mem;

use chrono::NaiveDate;

use crate::types::PostArchive;

/// One completed calendar day's worth of archives, ready for the writer.
pub type FlushUnit = (NaiveDate, Vec<PostArchive>);

/// Buffers resolved archives until the pagination cursor has moved past a
/// UTC day boundary, then surrenders completed days as flush units.
///
/// Pagination runs newest-to-oldest, so once the cursor's day is older than a
/// buffered archive's day, that day can never grow again and is safe to
/// flush. Each archive leaves the buffer in exactly one flush unit.
pub struct DayAccumulator {
    current_day: NaiveDate,
    pending: Vec<PostArchive>,
}

impl DayAccumulator {
    pub fn new(start_day: NaiveDate) -> Self {
        Self {
            current_day: start_day,
            pending: Vec::new(),
        }
    }

    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }

    pub fn push_page(&mut self, archives: Vec<PostArchive>) {
        self.pending.extend(archives);
    }

    /// Move the cursor day backward to `day`, flushing every buffered day
    /// strictly newer than it. Days with nothing buffered yield no unit.
    pub fn advance_to(&mut self, day: NaiveDate) -> Vec<FlushUnit> {
        if day >= self.current_day {
            return Vec::new();
        }
        self.current_day = day;

        let (completed, still_open): (Vec<_>, Vec<_>) = mem::take(&mut self.pending)
            .into_iter()
            .partition(|archive| archive.post.created_day() > day);
        self.pending = still_open;

        group_by_day(completed)
    }

    /// End of run: everything still buffered belongs to the final partial
    /// day(s) and flushes now.
    pub fn finish(self) -> Vec<FlushUnit> {
        group_by_day(self.pending)
    }
}

fn group_by_day(archives: Vec<PostArchive>) -> Vec<FlushUnit> {
    let mut by_day: BTreeMap<NaiveDate, Vec<PostArchive>> = BTreeMap::new();
    for archive in archives {
        by_day
            .entry(archive.post.created_day())
            .or_default()
            .push(archive);
    }
    // Newest first, matching the order pagination crossed the boundaries.
    by_day.into_iter().rev().collect()
}
