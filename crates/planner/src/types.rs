//! Shared server state.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::client::PlannerClient;
use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::session::PlannerSession;

pub type SharedSession = Arc<Mutex<PlannerSession>>;

/// State shared by every request handler.
pub struct AppState {
    pub config: PlannerConfig,
    pub client: PlannerClient,
    /// One planning session per session id
    pub sessions: DashMap<String, SharedSession>,
}

impl AppState {
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        let client = PlannerClient::new(&config)?;
        Ok(Self {
            config,
            client,
            sessions: DashMap::new(),
        })
    }

    /// Creates a session and returns its id.
    pub fn create_session(&self) -> String {
        let session = PlannerSession::new(self.config.major_marker.clone());
        let id = session.id().to_string();
        self.sessions
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        id
    }

    pub fn session(&self, id: &str) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove_session(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Drops sessions idle for longer than `max_idle`. Sessions currently
    /// locked by a request are in use and are kept.
    pub fn prune_idle(&self, max_idle: Duration) -> usize {
        let max_idle = chrono::Duration::from_std(max_idle).unwrap_or(chrono::Duration::MAX);
        let now = Utc::now();
        let before = self.sessions.len();

        self.sessions.retain(|_, session| match session.try_lock() {
            Ok(guard) => now - guard.last_active() < max_idle,
            Err(_) => true,
        });

        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            info!("Pruned {} idle sessions", pruned);
        }
        pruned
    }
}
