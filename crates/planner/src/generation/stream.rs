//! Decoding of the generator's server-sent event stream.
//!
//! Each event carries one JSON object in its `data:` lines, tagged by `type`:
//!
//! ```text
//! data: {"type":"progress","percent":40,"message":"searching","candidates":[[...]]}
//!
//! data: {"type":"complete","timetables":[[...],[...]]}
//! ```

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use super::GenerationRequest;
use crate::course::CourseRecord;
use crate::error::PlannerError;
use crate::timetable::Timetable;

static SSE_FIELD_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<field>[A-Za-z]+)(?::\s?(?P<value>.*))?$").unwrap());

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationEvent {
    Progress {
        #[serde(default)]
        percent: f32,
        #[serde(default)]
        message: String,
        /// Partial candidates found so far, if the generator sends them
        #[serde(default)]
        candidates: Option<Vec<Vec<CourseRecord>>>,
    },
    Complete {
        #[serde(default)]
        timetables: Vec<Vec<CourseRecord>>,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

/// Incremental server-sent events decoder.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<GenerationEvent, PlannerError>> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        events
    }

    /// Flushes a trailing event that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<Result<GenerationEvent, PlannerError>> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<Result<GenerationEvent, PlannerError>> {
        if line.is_empty() {
            return self.dispatch();
        }
        // comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        let caps = SSE_FIELD_REGEX.captures(line)?;
        if &caps["field"] == "data" {
            let value = caps.name("value").map(|m| m.as_str()).unwrap_or("");
            self.data.push(value.to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<Result<GenerationEvent, PlannerError>> {
        if self.data.is_empty() {
            return None;
        }
        let payload = std::mem::take(&mut self.data).join("\n");
        Some(serde_json::from_str(&payload).map_err(PlannerError::from))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectorState {
    Running,
    Complete,
    Failed(String),
}

/// Accumulates candidate timetables from a generation stream.
///
/// Later progress supersedes earlier partial candidates; `complete` fixes the
/// final set and anything after it is ignored. Candidates with internal
/// conflicts, or that the request does not admit, are dropped, and duplicates
/// (same identity key) are kept once.
#[derive(Debug, Clone)]
pub struct CandidateCollector {
    request: GenerationRequest,
    major_marker: String,
    state: CollectorState,
    percent: f32,
    message: String,
    candidates: Vec<Timetable>,
    rejected: usize,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl CandidateCollector {
    pub fn new(request: GenerationRequest, major_marker: impl Into<String>) -> Self {
        Self {
            request,
            major_marker: major_marker.into(),
            state: CollectorState::Running,
            percent: 0.0,
            message: String::new(),
            candidates: Vec::new(),
            rejected: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Applies one event. Returns false if the event was ignored.
    pub fn apply(&mut self, event: GenerationEvent) -> bool {
        if self.is_finished() {
            debug!("Ignoring generation event after stream finished");
            return false;
        }

        match event {
            GenerationEvent::Progress {
                percent,
                message,
                candidates,
            } => {
                self.percent = percent.clamp(0.0, 100.0);
                self.message = message;
                if let Some(lists) = candidates {
                    self.candidates = self.build_candidates(lists);
                }
            }
            GenerationEvent::Complete { timetables } => {
                self.candidates = self.build_candidates(timetables);
                self.percent = 100.0;
                self.state = CollectorState::Complete;
                self.finished_at = Some(Utc::now());
                info!(
                    "Generation complete: {} candidates ({} rejected)",
                    self.candidates.len(),
                    self.rejected
                );
            }
            GenerationEvent::Error { message } => {
                warn!("Generator reported failure: {}", message);
                self.state = CollectorState::Failed(message);
                self.finished_at = Some(Utc::now());
            }
        }
        true
    }

    fn build_candidates(&mut self, lists: Vec<Vec<CourseRecord>>) -> Vec<Timetable> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        self.rejected = 0;

        for list in lists {
            if list.iter().any(|record| record.id.is_none()) {
                warn!("Dropping candidate with a course record missing its id");
                self.rejected += 1;
                continue;
            }
            let timetable = Timetable::from_courses(
                list.into_iter().map(CourseRecord::into_course),
                self.major_marker.clone(),
            );

            if timetable.has_conflicts() {
                warn!("Dropping candidate {} with time conflicts", timetable.identity_key());
                self.rejected += 1;
                continue;
            }
            if let Err(violation) = self.request.admits(&timetable) {
                warn!("Dropping candidate {}: {}", timetable.identity_key(), violation);
                self.rejected += 1;
                continue;
            }
            if !seen.insert(timetable.identity_key().to_string()) {
                continue;
            }
            candidates.push(timetable);
        }

        candidates
    }

    pub fn state(&self) -> &CollectorState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.state, CollectorState::Running)
    }

    pub fn percent(&self) -> f32 {
        self.percent
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn candidates(&self) -> &[Timetable] {
        &self.candidates
    }

    /// Candidates rejected in the most recent batch.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Final candidates, or the error that ended the stream.
    pub fn into_result(self) -> Result<Vec<Timetable>, PlannerError> {
        match self.state {
            CollectorState::Complete => Ok(self.candidates),
            CollectorState::Failed(message) => Err(PlannerError::GenerationFailed { message }),
            CollectorState::Running => Err(PlannerError::StreamIncomplete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::Weekday;
    use serde_json::json;

    fn record(id: i64, day: &str, periods: &[u32]) -> serde_json::Value {
        json!({
            "id": id,
            "code": format!("C{id}"),
            "credits": 3,
            "category": "전공선택",
            "schedules": [{ "day": day, "periods": periods, "location": "" }]
        })
    }

    fn complete(timetables: serde_json::Value) -> GenerationEvent {
        serde_json::from_value(json!({ "type": "complete", "timetables": timetables })).unwrap()
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::new();
        let body = format!(
            ": keep-alive\n\ndata: {}\n\nevent: done\ndata: {}\n\n",
            json!({ "type": "progress", "percent": 50, "message": "halfway" }),
            json!({ "type": "complete", "timetables": [] })
        );
        let bytes = body.as_bytes();

        let mut events = Vec::new();
        for chunk in bytes.chunks(7) {
            events.extend(decoder.push(chunk));
        }
        assert!(decoder.finish().is_none());

        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            Ok(GenerationEvent::Progress { percent, .. }) if percent == 50.0
        ));
        assert!(matches!(events[1], Ok(GenerationEvent::Complete { .. })));
    }

    #[test]
    fn test_decoder_joins_multiline_data_and_crlf() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"type\":\r\ndata: \"error\",\"message\":\"no solution\"}\r\n\r\n");

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            Ok(GenerationEvent::Error { message }) if message == "no solution"
        ));
    }

    #[test]
    fn test_decoder_reports_bad_json_and_flushes_tail() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: not json\n\ndata: {\"type\":\"complete\"}");

        assert!(matches!(events[0], Err(PlannerError::ParseError { .. })));
        assert!(matches!(decoder.finish(), Some(Ok(GenerationEvent::Complete { .. }))));
    }

    #[test]
    fn test_progress_supersedes_and_complete_finalizes() {
        let mut collector = CandidateCollector::new(GenerationRequest::default(), "전공");
        let partial: GenerationEvent = serde_json::from_value(json!({
            "type": "progress",
            "percent": 30,
            "candidates": [[record(1, "Mon", &[1])], [record(2, "Tue", &[1])]]
        }))
        .unwrap();
        let later: GenerationEvent = serde_json::from_value(json!({
            "type": "progress",
            "percent": 60,
            "candidates": [[record(3, "Wed", &[1])]]
        }))
        .unwrap();

        assert!(collector.apply(partial));
        assert_eq!(collector.candidates().len(), 2);
        assert!(collector.apply(later));
        assert_eq!(collector.candidates().len(), 1);
        assert_eq!(collector.candidates()[0].identity_key(), "3");

        assert!(collector.apply(complete(json!([
            [record(7, "Mon", &[1]), record(42, "Tue", &[2]), record(15, "Wed", &[3])],
            [record(15, "Wed", &[3]), record(7, "Mon", &[1]), record(42, "Tue", &[2])],
            [record(4, "Thu", &[1])]
        ]))));
        assert!(!collector.apply(complete(json!([]))));

        assert_eq!(collector.state(), &CollectorState::Complete);
        assert_eq!(collector.percent(), 100.0);
        assert!(collector.finished_at().is_some());
        let keys: Vec<_> = collector
            .candidates()
            .iter()
            .map(|c| c.identity_key().to_string())
            .collect();
        assert_eq!(keys, vec!["7-15-42", "4"]);
    }

    #[test]
    fn test_conflicting_and_inadmissible_candidates_dropped() {
        let request = GenerationRequest {
            free_days: vec![Weekday::Fri],
            ..Default::default()
        };
        let mut collector = CandidateCollector::new(request, "전공");

        collector.apply(complete(json!([
            [record(1, "Mon", &[1, 2]), record(2, "Mon", &[2, 3])],
            [record(3, "Fri", &[1])],
            [record(4, "Thu", &[1])]
        ])));

        assert_eq!(collector.rejected(), 2);
        let result = collector.into_result().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].identity_key(), "4");
    }

    #[test]
    fn test_candidates_with_id_less_records_dropped() {
        let mut collector = CandidateCollector::new(GenerationRequest::default(), "전공");

        collector.apply(complete(json!([
            [
                { "code": "A", "schedules": [{ "day": "Mon", "periods": [1] }] },
                { "code": "B", "schedules": [{ "day": "Tue", "periods": [1] }] }
            ],
            [record(5, "Wed", &[2])]
        ])));

        assert_eq!(collector.rejected(), 1);
        let result = collector.into_result().unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].identity_key(), "5");
    }

    #[test]
    fn test_error_and_incomplete_results() {
        let mut failed = CandidateCollector::new(GenerationRequest::default(), "전공");
        failed.apply(GenerationEvent::Error {
            message: "timeout".into(),
        });
        assert!(matches!(
            failed.into_result(),
            Err(PlannerError::GenerationFailed { message }) if message == "timeout"
        ));

        let running = CandidateCollector::new(GenerationRequest::default(), "전공");
        assert!(matches!(running.into_result(), Err(PlannerError::StreamIncomplete)));
    }
}
