//! The per-user planning session.
//!
//! A session owns exactly one current timetable plus the candidate set from
//! the latest generation run. Callers that want change notifications take a
//! receiver from [`PlannerSession::subscribe`]; every operation still returns
//! its result directly.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::course::Course;
use crate::error::PlannerError;
use crate::generation::GenerationRequest;
use crate::timetable::{SavePayload, Timetable, TimetableGrid};

/// Notifications emitted by a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    CourseAdded { course_id: i64 },
    CourseRejected { course_id: i64 },
    CourseRemoved { course_id: i64 },
    CandidatesReplaced { count: usize },
    PreviewChanged { index: Option<usize> },
    CandidateApplied { index: usize, identity_key: String },
}

/// Result of applying a candidate to the current timetable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub added: usize,
    /// Candidate courses that clashed with pinned courses
    pub skipped: Vec<i64>,
    pub identity_key: String,
}

pub struct PlannerSession {
    id: String,
    timetable: Timetable,
    candidates: Vec<Timetable>,
    preview: Option<usize>,
    subscribers: Vec<UnboundedSender<SessionEvent>>,
    created_at: DateTime<Utc>,
    last_active: DateTime<Utc>,
}

impl PlannerSession {
    pub fn new(major_marker: impl Into<String>) -> Self {
        Self::with_id(generate_session_id(), major_marker)
    }

    pub fn with_id(id: impl Into<String>, major_marker: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            timetable: Timetable::with_major_marker(major_marker),
            candidates: Vec::new(),
            preview: None,
            subscribers: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    pub fn candidates(&self) -> &[Timetable] {
        &self.candidates
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    /// Registers a new listener for session events.
    pub fn subscribe(&mut self) -> UnboundedReceiver<SessionEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn add_course(&mut self, course: Course) -> bool {
        self.touch();
        let course_id = course.id;
        let added = self.timetable.add_course(course);
        if added {
            debug!("Session {}: added course {}", self.id, course_id);
            self.notify(SessionEvent::CourseAdded { course_id });
        } else {
            debug!("Session {}: rejected course {}", self.id, course_id);
            self.notify(SessionEvent::CourseRejected { course_id });
        }
        added
    }

    pub fn remove_course(&mut self, course_id: i64) -> bool {
        self.touch();
        let removed = self.timetable.remove_course(course_id).is_some();
        if removed {
            self.notify(SessionEvent::CourseRemoved { course_id });
        }
        removed
    }

    pub fn pin(&mut self, course_id: i64) -> bool {
        self.touch();
        self.timetable.pin(course_id)
    }

    pub fn unpin(&mut self, course_id: i64) -> bool {
        self.touch();
        self.timetable.unpin(course_id)
    }

    /// Replaces the candidate set with the result of a newer generation run.
    pub fn set_candidates(&mut self, candidates: Vec<Timetable>) {
        self.touch();
        let count = candidates.len();
        self.candidates = candidates;
        self.preview = None;
        info!("Session {}: {} candidates", self.id, count);
        self.notify(SessionEvent::CandidatesReplaced { count });
    }

    pub fn preview_candidate(&mut self, index: usize) -> Result<&Timetable, PlannerError> {
        self.touch();
        self.check_index(index)?;
        if self.preview != Some(index) {
            self.preview = Some(index);
            self.notify(SessionEvent::PreviewChanged { index: Some(index) });
        }
        Ok(&self.candidates[index])
    }

    pub fn previewed(&self) -> Option<&Timetable> {
        self.preview.and_then(|i| self.candidates.get(i))
    }

    pub fn clear_preview(&mut self) {
        if self.preview.take().is_some() {
            self.notify(SessionEvent::PreviewChanged { index: None });
        }
    }

    /// Makes a candidate the current timetable.
    ///
    /// Pinned courses stay (and stay pinned); the candidate's courses are then
    /// added one by one, skipping any that clash.
    pub fn apply_candidate(&mut self, index: usize) -> Result<ApplyOutcome, PlannerError> {
        self.touch();
        self.check_index(index)?;

        let mut next = Timetable::with_major_marker(self.timetable.major_marker());
        for course in self.timetable.pinned_courses() {
            next.add_course(course.clone());
            next.pin(course.id);
        }

        let mut added = 0;
        let mut skipped = Vec::new();
        for course in self.candidates[index].courses() {
            if next.contains(course.id) {
                continue;
            }
            if next.add_course(course.clone()) {
                added += 1;
            } else {
                skipped.push(course.id);
            }
        }

        let identity_key = next.identity_key().to_string();
        self.timetable = next;
        self.preview = None;
        info!(
            "Session {}: applied candidate {} ({} added, {} skipped)",
            self.id,
            index,
            added,
            skipped.len()
        );
        self.notify(SessionEvent::CandidateApplied {
            index,
            identity_key: identity_key.clone(),
        });

        Ok(ApplyOutcome {
            added,
            skipped,
            identity_key,
        })
    }

    pub fn grid(&self) -> TimetableGrid {
        TimetableGrid::from_timetable(&self.timetable)
    }

    pub fn save_payload(&self, title: impl Into<String>) -> SavePayload {
        SavePayload::from_timetable(&self.timetable, title)
    }

    /// Copy of `base` with the pinned courses added to its fixed set.
    pub fn generation_request(&self, base: &GenerationRequest) -> GenerationRequest {
        let fixed: BTreeSet<i64> = base
            .fixed_course_ids
            .iter()
            .copied()
            .chain(self.timetable.pinned_ids())
            .collect();
        GenerationRequest {
            fixed_course_ids: fixed.into_iter().collect(),
            ..base.clone()
        }
    }

    fn check_index(&self, index: usize) -> Result<(), PlannerError> {
        if index >= self.candidates.len() {
            return Err(PlannerError::CandidateOutOfRange {
                index,
                len: self.candidates.len(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    fn notify(&mut self, event: SessionEvent) {
        // Dropped receivers are pruned here
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// 16 random hex characters.
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| format!("{:x}", rng.gen_range(0..16u8)))
        .collect()
}
