/// Day/hour grid projection of a timetable
use serde::Serialize;
use std::collections::BTreeMap;

use super::Timetable;
use crate::course::Weekday;

/// Offset between a stored period and the displayed hour (period 1 → 9:00).
pub const HOUR_OFFSET: u32 = 8;

/// A cell coordinate: displayed hour (row) and weekday (column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GridSlot {
    pub hour: u32,
    pub day: Weekday,
}

impl GridSlot {
    /// `None` if the displayed hour would overflow.
    pub fn from_period(day: Weekday, period: u32) -> Option<Self> {
        let hour = period.checked_add(HOUR_OFFSET)?;
        Some(Self { hour, day })
    }

    pub fn column(&self) -> usize {
        self.day.index()
    }
}

/// What occupies a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridEntry {
    pub course_id: i64,
    pub name: String,
    pub code: String,
    pub location: String,
}

#[derive(Debug, Clone, Default)]
pub struct TimetableGrid {
    cells: BTreeMap<GridSlot, Vec<GridEntry>>,
}

impl TimetableGrid {
    pub fn from_timetable(timetable: &Timetable) -> Self {
        let mut cells: BTreeMap<GridSlot, Vec<GridEntry>> = BTreeMap::new();

        for course in timetable.courses() {
            for entry in &course.schedules {
                for &period in entry.periods() {
                    let Some(slot) = GridSlot::from_period(entry.day, period) else {
                        continue;
                    };
                    cells
                        .entry(slot)
                        .or_default()
                        .push(GridEntry {
                            course_id: course.id,
                            name: course.name.clone(),
                            code: course.code.clone(),
                            location: entry.location.clone(),
                        });
                }
            }
        }

        Self { cells }
    }

    /// Entries in the given cell. Uncovered cells yield an empty slice.
    pub fn entries_at(&self, hour: u32, day: Weekday) -> &[GridEntry] {
        self.cells
            .get(&GridSlot { hour, day })
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn occupied_cells(&self) -> impl Iterator<Item = (&GridSlot, &[GridEntry])> {
        self.cells.iter().map(|(slot, entries)| (slot, entries.as_slice()))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// First and last occupied hour, inclusive.
    pub fn hour_range(&self) -> Option<(u32, u32)> {
        let first = self.cells.keys().map(|s| s.hour).min()?;
        let last = self.cells.keys().map(|s| s.hour).max()?;
        Some((first, last))
    }
}
