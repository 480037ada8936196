//! Course values and pairwise conflict detection.
mod record;

pub use record::{CourseRecord, PeriodsField, ScheduleRecord};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Highest period a schedule entry may occupy.
pub const MAX_PERIOD: u32 = 24;

/// Highest credit value accepted for a single course.
pub const MAX_CREDITS: u32 = 30;

/// A teaching day. Only weekdays are modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
}

impl Weekday {
    pub const ALL: [Weekday; 5] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    /// Column index of the day in a weekly grid (Mon = 0 .. Fri = 4).
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Weekday::Mon => "Mon",
            Weekday::Tue => "Tue",
            Weekday::Wed => "Wed",
            Weekday::Thu => "Thu",
            Weekday::Fri => "Fri",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Weekday {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let day = match s.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" | "월" => Weekday::Mon,
            "tue" | "tuesday" | "화" => Weekday::Tue,
            "wed" | "wednesday" | "수" => Weekday::Wed,
            "thu" | "thursday" | "목" => Weekday::Thu,
            "fri" | "friday" | "금" => Weekday::Fri,
            other => return Err(format!("unsupported day: {other:?}")),
        };
        Ok(day)
    }
}

impl TryFrom<String> for Weekday {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One meeting pattern of a course: a day, the periods it occupies and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub day: Weekday,
    periods: Vec<u32>,
    pub location: String,
}

impl ScheduleEntry {
    /// Creates an entry. Periods outside `1..=MAX_PERIOD` are dropped and
    /// duplicates are collapsed, keeping the order of first occurrence.
    pub fn new(day: Weekday, periods: impl IntoIterator<Item = u32>, location: impl Into<String>) -> Self {
        let mut seen = BTreeSet::new();
        let unique = periods
            .into_iter()
            .filter(|p| (1..=MAX_PERIOD).contains(p))
            .filter(|p| seen.insert(*p))
            .collect();

        Self {
            day,
            periods: unique,
            location: location.into(),
        }
    }

    pub fn periods(&self) -> &[u32] {
        &self.periods
    }

    /// Returns true if both entries fall on the same day and share a period.
    pub fn overlaps(&self, other: &ScheduleEntry) -> bool {
        self.day == other.day && self.periods.iter().any(|p| other.periods.contains(p))
    }

    /// Periods joined with commas, e.g. `"1,2,3"`.
    pub fn periods_string(&self) -> String {
        self.periods
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One offered section of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub section: String,
    pub credits: u32,
    pub target_year: String,
    pub instructor: String,
    /// e.g. "전공필수", "교양선택"
    pub category: String,
    pub semester: String,
    pub schedules: Vec<ScheduleEntry>,
}

impl Course {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            code: String::new(),
            section: String::new(),
            credits: 0,
            target_year: String::new(),
            instructor: String::new(),
            category: String::new(),
            semester: String::new(),
            schedules: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_credits(mut self, credits: u32) -> Self {
        self.credits = credits;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_schedule(mut self, entry: ScheduleEntry) -> Self {
        self.schedules.push(entry);
        self
    }

    /// Returns true if the category name contains the major marker.
    pub fn is_major(&self, marker: &str) -> bool {
        !marker.is_empty() && self.category.contains(marker)
    }

    pub fn is_unscheduled(&self) -> bool {
        self.schedules.iter().all(|s| s.periods.is_empty())
    }

    /// Every `(day, period)` slot the course occupies.
    pub fn occupied_slots(&self) -> impl Iterator<Item = (Weekday, u32)> + '_ {
        self.schedules
            .iter()
            .flat_map(|s| s.periods.iter().map(move |p| (s.day, *p)))
    }

    pub fn conflicts_with(&self, other: &Course) -> bool {
        conflicts_with(self, other)
    }
}

/// Returns true if any schedule entry of `a` shares a day and a period with
/// any schedule entry of `b`.
pub fn conflicts_with(a: &Course, b: &Course) -> bool {
    a.schedules
        .iter()
        .any(|ea| b.schedules.iter().any(|eb| ea.overlaps(eb)))
}
