//! Requests to, and results from, the external timetable generator.
//!
//! The generator itself runs server-side. This module describes what is asked
//! of it, decodes its event stream and re-checks every candidate it returns.

mod cache;
mod stream;

pub use cache::{CacheStats, CandidateCache, RequestKey};
pub use stream::{CandidateCollector, CollectorState, GenerationEvent, SseDecoder};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::course::Weekday;
use crate::timetable::Timetable;

/// A `(day, periods)` window the student wants kept free.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AvoidRule {
    pub day: Weekday,
    pub periods: Vec<u32>,
}

impl AvoidRule {
    pub fn new(day: Weekday, periods: impl IntoIterator<Item = u32>) -> Self {
        Self {
            day,
            periods: periods.into_iter().collect(),
        }
    }
}

/// Constraints sent to `/generate_timetable_stream/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub min_credits: Option<u32>,
    pub max_credits: Option<u32>,
    pub min_major_credits: Option<u32>,
    pub free_days: Vec<Weekday>,
    pub required_codes: Vec<String>,
    pub excluded_codes: Vec<String>,
    pub avoid_times: Vec<AvoidRule>,
    /// Courses already fixed in the student's timetable
    pub fixed_course_ids: Vec<i64>,
}

/// Why a candidate does not satisfy a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintViolation {
    #[error("course {course_id} meets on free day {day}")]
    FreeDayUsed { course_id: i64, day: Weekday },

    #[error("course {course_id} uses avoided slot {day} period {period}")]
    AvoidedSlotUsed {
        course_id: i64,
        day: Weekday,
        period: u32,
    },

    #[error("excluded course {code} is present")]
    ExcludedCourse { code: String },

    #[error("required course {code} is missing")]
    MissingRequired { code: String },

    #[error("fixed course {course_id} is missing")]
    MissingFixed { course_id: i64 },

    #[error("{total} credits outside {min:?}..={max:?}")]
    CreditsOutOfRange {
        total: u32,
        min: Option<u32>,
        max: Option<u32>,
    },

    #[error("{major} major credits below minimum {min}")]
    MajorCreditsBelow { major: u32, min: u32 },
}

impl GenerationRequest {
    /// Copy with list fields sorted and deduplicated, so equal requests
    /// compare and hash equal regardless of input order.
    pub fn normalized(&self) -> Self {
        let mut request = self.clone();
        request.free_days.sort();
        request.free_days.dedup();
        request.required_codes.sort();
        request.required_codes.dedup();
        request.excluded_codes.sort();
        request.excluded_codes.dedup();
        for rule in &mut request.avoid_times {
            rule.periods.sort_unstable();
            rule.periods.dedup();
        }
        request.avoid_times.sort();
        request.avoid_times.dedup();
        request.fixed_course_ids.sort_unstable();
        request.fixed_course_ids.dedup();
        request
    }

    /// Cache key for this request filtered under `major_marker`.
    pub fn cache_key(&self, major_marker: &str) -> RequestKey {
        RequestKey::new(self, major_marker)
    }

    /// Query string pairs for the generation endpoint.
    ///
    /// Lists are comma separated; avoid rules are encoded as
    /// `Mon:1,2;Tue:5`.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.min_credits {
            pairs.push(("min_credits", v.to_string()));
        }
        if let Some(v) = self.max_credits {
            pairs.push(("max_credits", v.to_string()));
        }
        if let Some(v) = self.min_major_credits {
            pairs.push(("min_major_credits", v.to_string()));
        }
        if !self.free_days.is_empty() {
            pairs.push(("free_days", join(self.free_days.iter())));
        }
        if !self.required_codes.is_empty() {
            pairs.push(("required", self.required_codes.join(",")));
        }
        if !self.excluded_codes.is_empty() {
            pairs.push(("excluded", self.excluded_codes.join(",")));
        }
        if !self.avoid_times.is_empty() {
            let rules = self
                .avoid_times
                .iter()
                .map(|r| format!("{}:{}", r.day, join(r.periods.iter())))
                .collect::<Vec<_>>()
                .join(";");
            pairs.push(("avoid", rules));
        }
        if !self.fixed_course_ids.is_empty() {
            pairs.push(("fixed", join(self.fixed_course_ids.iter())));
        }
        pairs
    }

    /// Checks a candidate against every constraint of this request.
    ///
    /// Returns the first violation found.
    pub fn admits(&self, candidate: &Timetable) -> Result<(), ConstraintViolation> {
        for course in candidate.courses() {
            if self.excluded_codes.iter().any(|code| *code == course.code) {
                return Err(ConstraintViolation::ExcludedCourse {
                    code: course.code.clone(),
                });
            }

            for (day, period) in course.occupied_slots() {
                if self.free_days.contains(&day) {
                    return Err(ConstraintViolation::FreeDayUsed {
                        course_id: course.id,
                        day,
                    });
                }
                let avoided = self
                    .avoid_times
                    .iter()
                    .any(|rule| rule.day == day && rule.periods.contains(&period));
                if avoided {
                    return Err(ConstraintViolation::AvoidedSlotUsed {
                        course_id: course.id,
                        day,
                        period,
                    });
                }
            }
        }

        if let Some(code) = self
            .required_codes
            .iter()
            .find(|code| !candidate.courses().iter().any(|c| c.code == **code))
        {
            return Err(ConstraintViolation::MissingRequired { code: code.clone() });
        }

        if let Some(&course_id) = self
            .fixed_course_ids
            .iter()
            .find(|id| !candidate.contains(**id))
        {
            return Err(ConstraintViolation::MissingFixed { course_id });
        }

        let total = candidate.total_credits();
        let below = self.min_credits.is_some_and(|min| total < min);
        let above = self.max_credits.is_some_and(|max| total > max);
        if below || above {
            return Err(ConstraintViolation::CreditsOutOfRange {
                total,
                min: self.min_credits,
                max: self.max_credits,
            });
        }

        if let Some(min) = self.min_major_credits {
            if candidate.major_credits() < min {
                return Err(ConstraintViolation::MajorCreditsBelow {
                    major: candidate.major_credits(),
                    min,
                });
            }
        }

        Ok(())
    }
}

fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}
