//! Timetable assembly.
//!
//! A [`Timetable`] is an ordered set of courses in which no two courses share
//! a `(day, period)` slot. The invariant is enforced by [`Timetable::add_course`];
//! timetables built from untrusted candidate lists can be re-checked with
//! [`Timetable::has_conflicts`].

mod grid;
mod save;

pub use grid::{GridEntry, GridSlot, TimetableGrid, HOUR_OFFSET};
pub use save::{SavePayload, SavedCourse, SavedSchedule};

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::config::DEFAULT_MAJOR_MARKER;
use crate::course::{conflicts_with, Course};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timetable {
    courses: Vec<Course>,
    pinned: BTreeSet<i64>,
    major_marker: String,
    total_credits: u32,
    major_credits: u32,
    identity_key: String,
}

impl Default for Timetable {
    fn default() -> Self {
        Self::new()
    }
}

impl Timetable {
    /// Creates an empty timetable using the default major marker.
    pub fn new() -> Self {
        Self::with_major_marker(DEFAULT_MAJOR_MARKER)
    }

    pub fn with_major_marker(marker: impl Into<String>) -> Self {
        Self {
            courses: Vec::new(),
            pinned: BTreeSet::new(),
            major_marker: marker.into(),
            total_credits: 0,
            major_credits: 0,
            identity_key: String::new(),
        }
    }

    /// Builds a timetable from a candidate course list without checking for
    /// conflicts. Courses repeating an earlier id are skipped.
    pub fn from_courses(courses: impl IntoIterator<Item = Course>, marker: impl Into<String>) -> Self {
        let mut timetable = Self::with_major_marker(marker);
        for course in courses {
            if timetable.contains(course.id) {
                warn!("Skipping duplicate course {} in candidate", course.id);
                continue;
            }
            timetable.courses.push(course);
        }
        timetable.recompute();
        timetable
    }

    /// Adds a course unless it clashes with a course already present.
    ///
    /// Returns false, leaving the timetable untouched, on a time conflict or
    /// when a course with the same id is already present.
    pub fn add_course(&mut self, course: Course) -> bool {
        if self.contains(course.id) {
            return false;
        }
        if let Some(existing) = self.courses.iter().find(|c| conflicts_with(c, &course)) {
            debug!("Course {} conflicts with course {}", course.id, existing.id);
            return false;
        }

        self.courses.push(course);
        self.recompute();
        true
    }

    /// Removes the course with `course_id`, if present. Also unpins it.
    pub fn remove_course(&mut self, course_id: i64) -> Option<Course> {
        let index = self.courses.iter().position(|c| c.id == course_id)?;
        let removed = self.courses.remove(index);
        self.pinned.remove(&course_id);
        self.recompute();
        Some(removed)
    }

    /// Exhaustive pairwise conflict check.
    pub fn has_conflicts(&self) -> bool {
        self.conflicting_pairs().next().is_some()
    }

    /// Ids of every pair of conflicting courses.
    pub fn conflicting_pairs(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.courses.iter().enumerate().flat_map(move |(i, a)| {
            self.courses[i + 1..]
                .iter()
                .filter(move |b| conflicts_with(a, b))
                .map(move |b| (a.id, b.id))
        })
    }

    /// Marks a present course as fixed. Returns false if it isn't present.
    pub fn pin(&mut self, course_id: i64) -> bool {
        if !self.contains(course_id) {
            return false;
        }
        self.pinned.insert(course_id);
        true
    }

    pub fn unpin(&mut self, course_id: i64) -> bool {
        self.pinned.remove(&course_id)
    }

    pub fn is_pinned(&self, course_id: i64) -> bool {
        self.pinned.contains(&course_id)
    }

    pub fn pinned_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.pinned.iter().copied()
    }

    /// Pinned courses in timetable order.
    pub fn pinned_courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.iter().filter(move |c| self.pinned.contains(&c.id))
    }

    pub fn contains(&self, course_id: i64) -> bool {
        self.courses.iter().any(|c| c.id == course_id)
    }

    pub fn course(&self, course_id: i64) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == course_id)
    }

    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }

    pub fn major_marker(&self) -> &str {
        &self.major_marker
    }

    pub fn total_credits(&self) -> u32 {
        self.total_credits
    }

    pub fn major_credits(&self) -> u32 {
        self.major_credits
    }

    /// Credits not counted as major. Not checked against any category.
    pub fn elective_credits(&self) -> u32 {
        self.total_credits.saturating_sub(self.major_credits)
    }

    /// Course ids sorted ascending and joined with `-`, e.g. `"7-15-42"`.
    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    fn recompute(&mut self) {
        self.total_credits = self
            .courses
            .iter()
            .fold(0u32, |sum, c| sum.saturating_add(c.credits));
        self.major_credits = self
            .courses
            .iter()
            .filter(|c| c.is_major(&self.major_marker))
            .fold(0u32, |sum, c| sum.saturating_add(c.credits));

        let mut ids: Vec<i64> = self.courses.iter().map(|c| c.id).collect();
        ids.sort_unstable();
        self.identity_key = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join("-");
    }
}
