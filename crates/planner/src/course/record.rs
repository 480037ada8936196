/// Flat course records as produced by the external search and generation APIs
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;
use tracing::warn;

use super::{Course, ScheduleEntry, Weekday, MAX_CREDITS, MAX_PERIOD};
use crate::error::PlannerError;

// Matches "3-5" ranges or single numbers inside period strings such as "1,2,3"
static PERIOD_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)|(\d+)").unwrap());

/// Course record as received over the wire.
///
/// Every field is optional on input; absent values fall back to empty
/// strings, zero credits and no schedules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub section: String,
    #[serde(default, deserialize_with = "lenient_credits")]
    pub credits: u32,
    #[serde(
        rename = "targetYear",
        alias = "target_year",
        default,
        deserialize_with = "lenient_string"
    )]
    pub target_year: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub instructor: String,
    #[serde(alias = "category_name", default, deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub semester: String,
    #[serde(default, deserialize_with = "lenient_schedules")]
    pub schedules: Vec<ScheduleRecord>,
}

/// One `{day, periods, location}` triple of a course record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub day: String,
    #[serde(default)]
    pub periods: PeriodsField,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: String,
}

/// Periods arrive either as a list of integers or as a `"1,2,3"` / `"1-3"`
/// string (the form used by saved timetables).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PeriodsField {
    List(Vec<i64>),
    Single(i64),
    Text(String),
}

impl Default for PeriodsField {
    fn default() -> Self {
        PeriodsField::List(Vec::new())
    }
}

impl PeriodsField {
    /// Periods in `1..=MAX_PERIOD`, in input order; everything else is dropped.
    pub fn to_periods(&self) -> Vec<u32> {
        match self {
            PeriodsField::List(values) => values.iter().filter_map(|v| valid_period(*v)).collect(),
            PeriodsField::Single(v) => valid_period(*v).into_iter().collect(),
            PeriodsField::Text(text) => parse_period_text(text),
        }
    }
}

fn valid_period(value: i64) -> Option<u32> {
    u32::try_from(value)
        .ok()
        .filter(|p| (1..=MAX_PERIOD).contains(p))
}

fn parse_period_text(text: &str) -> Vec<u32> {
    let mut periods = Vec::new();
    for caps in PERIOD_TOKEN_REGEX.captures_iter(text) {
        if let (Some(start), Some(end)) = (caps.get(1), caps.get(2)) {
            let (Ok(start), Ok(end)) = (start.as_str().parse::<u32>(), end.as_str().parse::<u32>()) else {
                continue;
            };
            if end > MAX_PERIOD {
                warn!("Clamping period range {}-{} to {}", start, end, MAX_PERIOD);
            }
            // Ranges are expanded only within the valid period window
            periods.extend(start.max(1)..=end.min(MAX_PERIOD));
        } else if let Some(single) = caps.get(3) {
            if let Some(p) = single.as_str().parse::<i64>().ok().and_then(valid_period) {
                periods.push(p);
            }
        }
    }
    periods
}

impl ScheduleRecord {
    fn to_entry(&self) -> Result<ScheduleEntry, String> {
        let day: Weekday = self.day.parse()?;
        let periods = self.periods.to_periods();
        if periods.is_empty() {
            return Err(format!("no usable periods on {day}"));
        }
        Ok(ScheduleEntry::new(day, periods, self.location.clone()))
    }
}

impl CourseRecord {
    /// Builds a course, dropping schedule entries that can't be used.
    pub fn into_course(self) -> Course {
        let id = self.id.unwrap_or_else(|| {
            warn!("Course record '{}' has no id, defaulting to 0", self.code);
            0
        });

        let credits = if self.credits > MAX_CREDITS {
            warn!(
                "Course {} lists {} credits (max {}), treating as 0",
                id, self.credits, MAX_CREDITS
            );
            0
        } else {
            self.credits
        };

        let schedules = self
            .schedules
            .iter()
            .filter_map(|s| match s.to_entry() {
                Ok(entry) => Some(entry),
                Err(reason) => {
                    warn!("Dropping schedule entry of course {}: {}", id, reason);
                    None
                }
            })
            .collect();

        Course {
            id,
            name: self.name,
            code: self.code,
            section: self.section,
            credits,
            target_year: self.target_year,
            instructor: self.instructor,
            category: self.category,
            semester: self.semester,
            schedules,
        }
    }

    /// Strict conversion: rejects records with no id, no code, or any
    /// unusable schedule entry instead of defaulting.
    pub fn validate(self) -> Result<Course, PlannerError> {
        if self.id.is_none() {
            return Err(PlannerError::InvalidRecord {
                message: format!("record '{}' has no id", self.code),
            });
        }
        if self.code.trim().is_empty() {
            return Err(PlannerError::InvalidRecord {
                message: format!("record {:?} has no code", self.id),
            });
        }
        if self.credits > MAX_CREDITS {
            return Err(PlannerError::InvalidRecord {
                message: format!("record {:?} lists {} credits", self.id, self.credits),
            });
        }
        for schedule in &self.schedules {
            if let Err(reason) = schedule.to_entry() {
                return Err(PlannerError::InvalidRecord {
                    message: format!("record {:?}: {}", self.id, reason),
                });
            }
        }

        Ok(self.into_course())
    }
}

impl From<&Course> for CourseRecord {
    fn from(course: &Course) -> Self {
        Self {
            id: Some(course.id),
            name: course.name.clone(),
            code: course.code.clone(),
            section: course.section.clone(),
            credits: course.credits,
            target_year: course.target_year.clone(),
            instructor: course.instructor.clone(),
            category: course.category.clone(),
            semester: course.semester.clone(),
            schedules: course
                .schedules
                .iter()
                .map(|s| ScheduleRecord {
                    day: s.day.to_string(),
                    periods: PeriodsField::List(s.periods().iter().map(|p| *p as i64).collect()),
                    location: s.location.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrNumber {
    Text(String),
    Integer(i64),
    Float(f64),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(match value {
        Some(TextOrNumber::Text(s)) => s,
        Some(TextOrNumber::Integer(n)) => n.to_string(),
        Some(TextOrNumber::Float(f)) => f.to_string(),
        None => String::new(),
    })
}

fn lenient_credits<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<TextOrNumber>::deserialize(deserializer)?;
    Ok(match value {
        Some(TextOrNumber::Integer(n)) => u32::try_from(n).unwrap_or(0),
        Some(TextOrNumber::Float(f)) if f > 0.0 => f.trunc() as u32,
        Some(TextOrNumber::Text(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_schedules<'de, D>(deserializer: D) -> Result<Vec<ScheduleRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ScheduleRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_full_record_conversion() {
        let record: CourseRecord = serde_json::from_value(json!({
            "id": 42,
            "name": "운영체제",
            "code": "CSE3001",
            "section": "02",
            "credits": 3,
            "targetYear": 3,
            "instructor": "Kim",
            "category": "전공선택",
            "semester": "2024-2",
            "schedules": [
                { "day": "Mon", "periods": [1, 2], "location": "IT-101" },
                { "day": "수", "periods": [3], "location": "IT-101" }
            ]
        }))
        .unwrap();
        let course = record.into_course();

        assert_eq!(course.id, 42);
        assert_eq!(course.target_year, "3");
        assert_eq!(course.credits, 3);
        assert_eq!(course.schedules.len(), 2);
        assert_eq!(course.schedules[1].day, Weekday::Wed);
        assert!(course.is_major("전공"));
    }

    #[test]
    fn test_missing_fields_default() {
        let record: CourseRecord = serde_json::from_value(json!({ "id": 7 })).unwrap();
        let course = record.into_course();

        assert_eq!(course.name, "");
        assert_eq!(course.credits, 0);
        assert!(course.schedules.is_empty());
    }

    #[test]
    fn test_null_values_default() {
        let record: CourseRecord = serde_json::from_value(json!({
            "id": 7,
            "name": null,
            "credits": null,
            "schedules": null
        }))
        .unwrap();
        let course = record.into_course();

        assert_eq!(course.name, "");
        assert_eq!(course.credits, 0);
        assert!(course.schedules.is_empty());
    }

    #[test]
    fn test_period_strings_and_ranges() {
        let record: CourseRecord = serde_json::from_value(json!({
            "id": 1,
            "credits": "2",
            "schedules": [
                { "day": "Tue", "periods": "1,2,3" },
                { "day": "Thu", "periods": "4-6" },
                { "day": "Fri", "periods": 7 }
            ]
        }))
        .unwrap();
        let course = record.into_course();

        assert_eq!(course.credits, 2);
        assert_eq!(course.schedules[0].periods(), &[1, 2, 3]);
        assert_eq!(course.schedules[1].periods(), &[4, 5, 6]);
        assert_eq!(course.schedules[2].periods(), &[7]);
    }

    #[test]
    fn test_unusable_entries_are_dropped() {
        let record: CourseRecord = serde_json::from_value(json!({
            "id": 3,
            "code": "GEN100",
            "schedules": [
                { "day": "Sat", "periods": [1] },
                { "day": "Mon", "periods": [0, -1] },
                { "day": "Mon", "periods": [2] }
            ]
        }))
        .unwrap();

        let strict = record.clone().validate();
        let course = record.into_course();

        assert_eq!(course.schedules.len(), 1);
        assert_eq!(course.schedules[0].periods(), &[2]);
        assert!(matches!(strict, Err(PlannerError::InvalidRecord { .. })));
    }

    #[test]
    fn test_validate_requires_id_and_code() {
        let no_id: CourseRecord = serde_json::from_value(json!({ "code": "X1" })).unwrap();
        let no_code: CourseRecord = serde_json::from_value(json!({ "id": 1 })).unwrap();
        let ok: CourseRecord = serde_json::from_value(json!({ "id": 1, "code": "X1" })).unwrap();

        assert!(no_id.validate().is_err());
        assert!(no_code.validate().is_err());
        assert_eq!(ok.validate().unwrap().code, "X1");
    }

    #[test]
    fn test_out_of_range_periods_are_dropped() {
        let record: CourseRecord = serde_json::from_value(json!({
            "id": 1,
            "schedules": [
                { "day": "Mon", "periods": [4294967295u32, 3] },
                { "day": "Tue", "periods": 4294967295u32 },
                { "day": "Wed", "periods": "99,2" }
            ]
        }))
        .unwrap();
        let course = record.into_course();

        assert_eq!(course.schedules.len(), 2);
        assert_eq!(course.schedules[0].periods(), &[3]);
        assert_eq!(course.schedules[1].day, Weekday::Wed);
        assert_eq!(course.schedules[1].periods(), &[2]);
    }

    #[test]
    fn test_huge_period_range_is_clamped() {
        let record: CourseRecord = serde_json::from_value(json!({
            "id": 1,
            "schedules": [
                { "day": "Mon", "periods": "1-4000000000" },
                { "day": "Tue", "periods": "0-3" },
                { "day": "Wed", "periods": "30-60000" }
            ]
        }))
        .unwrap();
        let course = record.into_course();

        assert_eq!(course.schedules.len(), 2);
        assert_eq!(course.schedules[0].periods().len(), MAX_PERIOD as usize);
        assert_eq!(course.schedules[1].periods(), &[1, 2, 3]);
    }

    #[test]
    fn test_excessive_credits_are_zeroed() {
        let record: CourseRecord =
            serde_json::from_value(json!({ "id": 1, "code": "X1", "credits": 4294967295u32 })).unwrap();

        assert!(matches!(
            record.clone().validate(),
            Err(PlannerError::InvalidRecord { .. })
        ));
        assert_eq!(record.into_course().credits, 0);
    }

    #[test]
    fn test_record_from_course_converts_back() {
        let course = Course::new(5, "Algorithms")
            .with_code("CSE2010")
            .with_credits(3)
            .with_schedule(ScheduleEntry::new(Weekday::Mon, [1, 2], "A1"));

        let back = CourseRecord::from(&course).into_course();
        assert_eq!(back, course);
    }
}
