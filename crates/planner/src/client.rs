//! HTTP client for the external course search, generation and save endpoints.

use futures::StreamExt;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PlannerConfig;
use crate::course::{Course, CourseRecord};
use crate::error::PlannerError;
use crate::generation::{CandidateCache, CandidateCollector, GenerationRequest, SseDecoder};
use crate::timetable::{SavePayload, Timetable};

const SEARCH_PATH: &str = "/search_courses/";
const GENERATE_PATH: &str = "/generate_timetable_stream/";
const SAVE_PATH: &str = "/save_timetable/";

pub struct PlannerClient {
    http: Client,
    base_url: Url,
    major_marker: String,
    cache: Arc<CandidateCache>,
}

impl PlannerClient {
    pub fn new(config: &PlannerConfig) -> Result<Self, PlannerError> {
        let cache = Arc::new(CandidateCache::new(config.candidate_cache_ttl()));
        Self::with_cache(config, cache)
    }

    pub fn with_cache(config: &PlannerConfig, cache: Arc<CandidateCache>) -> Result<Self, PlannerError> {
        let base_url = Url::parse(&config.generator_base_url)?;
        // No overall timeout: the generation stream can run for minutes
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PlannerError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url,
            major_marker: config.major_marker.clone(),
            cache,
        })
    }

    pub fn cache(&self) -> &Arc<CandidateCache> {
        &self.cache
    }

    fn endpoint(&self, path: &str) -> Result<Url, PlannerError> {
        Ok(self.base_url.join(path)?)
    }

    /// Searches the course catalogue. Malformed records are converted
    /// leniently rather than rejected.
    pub async fn search_courses(&self, query: &str) -> Result<Vec<Course>, PlannerError> {
        let mut url = self.endpoint(SEARCH_PATH)?;
        url.query_pairs_mut().append_pair("q", query);
        info!("Searching courses (GET {})", url);

        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlannerError::UnexpectedResponse {
                message: format!("Search failed with status {}: {}", status, error_text),
            });
        }

        let records: Vec<CourseRecord> = response.json().await?;
        Ok(records.into_iter().map(CourseRecord::into_course).collect())
    }

    /// Streams one generation run into `collector` until it completes or
    /// fails. Dropping the returned future cancels the run.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        collector: &mut CandidateCollector,
    ) -> Result<(), PlannerError> {
        let mut url = self.endpoint(GENERATE_PATH)?;
        url.query_pairs_mut().extend_pairs(request.to_query_pairs());
        info!("Starting timetable generation (GET {})", url);

        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlannerError::UnexpectedResponse {
                message: format!("Generation failed with status {}: {}", status, error_text),
            });
        }

        let mut decoder = SseDecoder::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                apply_event(collector, event);
            }
            if collector.is_finished() {
                return Ok(());
            }
        }
        if let Some(event) = decoder.finish() {
            apply_event(collector, event);
        }

        if collector.is_finished() {
            Ok(())
        } else {
            warn!("Generation stream closed at {:.0}%", collector.percent());
            Err(PlannerError::StreamIncomplete)
        }
    }

    /// Runs a generation unless an identical request completed recently.
    pub async fn generate_cached(&self, request: &GenerationRequest) -> Result<Vec<Timetable>, PlannerError> {
        let key = request.cache_key(&self.major_marker);
        if let Some(candidates) = self.cache.get(&key) {
            info!("Using cached candidates for request {}", key);
            return Ok(candidates);
        }

        let mut collector = CandidateCollector::new(request.clone(), self.major_marker.clone());
        self.generate(request, &mut collector).await?;
        let candidates = collector.into_result()?;
        self.cache.insert(key, candidates.clone());
        Ok(candidates)
    }

    /// Hands a save payload to the persistence endpoint. Only the status is
    /// interpreted.
    pub async fn save_timetable(&self, payload: &SavePayload) -> Result<(), PlannerError> {
        let url = self.endpoint(SAVE_PATH)?;
        info!(
            "Saving timetable '{}' ({} courses)",
            payload.title,
            payload.courses.len()
        );

        let response = self
            .http
            .post(url)
            .timeout(Duration::from_secs(30))
            .json(payload)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(PlannerError::UnexpectedResponse {
                message: format!("Save failed with status {}: {}", status, error_text),
            });
        }

        Ok(())
    }
}

fn apply_event(
    collector: &mut CandidateCollector,
    event: Result<crate::generation::GenerationEvent, PlannerError>,
) {
    match event {
        Ok(event) => {
            collector.apply(event);
            debug!("Generation progress {:.0}%", collector.percent());
        }
        Err(e) => warn!("Skipping undecodable generation event: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Response, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a stand-in for the external endpoints on a random port.
    async fn spawn_stub(router: Router) -> PlannerConfig {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        PlannerConfig {
            generator_base_url: format!("http://{addr}"),
            ..Default::default()
        }
    }

    fn sse_body() -> String {
        let progress = json!({ "type": "progress", "percent": 20, "message": "searching" });
        let complete = json!({
            "type": "complete",
            "timetables": [
                [{ "id": 1, "code": "A", "credits": 3, "schedules": [{ "day": "Mon", "periods": [1] }] }],
                [{ "id": 2, "code": "B", "credits": 3, "schedules": [{ "day": "Tue", "periods": [1] }] }]
            ]
        });
        format!("data: {progress}\n\ndata: {complete}\n\n")
    }

    #[tokio::test]
    async fn test_search_converts_records() {
        let router = Router::new().route(
            SEARCH_PATH,
            get(|| async {
                Json(json!([
                    { "id": 5, "name": "Compilers", "credits": 3 },
                    { "id": 6, "schedules": null }
                ]))
            }),
        );
        let client = PlannerClient::new(&spawn_stub(router).await).unwrap();

        let courses = client.search_courses("comp").await.unwrap();
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].name, "Compilers");
        assert!(courses[1].schedules.is_empty());
    }

    #[tokio::test]
    async fn test_generate_cached_hits_server_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            GENERATE_PATH,
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Response::builder()
                        .header(header::CONTENT_TYPE, "text/event-stream")
                        .body(Body::from(sse_body()))
                        .unwrap()
                }
            }),
        );
        let client = PlannerClient::new(&spawn_stub(router).await).unwrap();
        let request = GenerationRequest::default();

        let first = client.generate_cached(&request).await.unwrap();
        let second = client.generate_cached(&request).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second, first);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_truncated_stream_is_incomplete() {
        let router = Router::new().route(
            GENERATE_PATH,
            get(|| async { "data: {\"type\":\"progress\",\"percent\":10}\n\n" }),
        );
        let config = spawn_stub(router).await;
        let client = PlannerClient::new(&config).unwrap();
        let mut collector = CandidateCollector::new(GenerationRequest::default(), "전공");

        let err = client
            .generate(&GenerationRequest::default(), &mut collector)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::StreamIncomplete));
        assert_eq!(collector.percent(), 10.0);
    }

    #[tokio::test]
    async fn test_save_posts_payload() {
        let router = Router::new().route(
            SAVE_PATH,
            post(|Json(body): Json<Value>| async move {
                if body["title"] == "draft" && body["courses"].as_array().is_some() {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                }
            }),
        );
        let client = PlannerClient::new(&spawn_stub(router).await).unwrap();

        let payload = SavePayload::from_timetable(&Timetable::new(), "draft");
        client.save_timetable(&payload).await.unwrap();

        let rejected = SavePayload::from_timetable(&Timetable::new(), "other");
        assert!(matches!(
            client.save_timetable(&rejected).await,
            Err(PlannerError::UnexpectedResponse { .. })
        ));
    }
}
