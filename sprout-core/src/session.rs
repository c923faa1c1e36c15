//! Identification session: the shared analysis state the page observes.
//!
//! States: `idle → analyzing → has_result | has_error`, re-entered on every
//! upload. At most one analysis is in flight. Under [`InFlightPolicy::Replace`]
//! a new upload cancels the running one; under [`InFlightPolicy::Reject`] it is
//! refused. A cancelled or otherwise stale analysis never writes to the state.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::encoder::EncodedImage;
use crate::identify::{IdentifyError, Identifier};
use crate::models::PlantInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InFlightPolicy {
    /// Cancel the running analysis and start the new one.
    #[default]
    Replace,
    /// Refuse new uploads while one is running.
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Analyzing,
    HasResult,
    HasError,
}

/// Point-in-time copy of the session, as served to the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub analysis_id: Option<Uuid>,
    pub preview: Option<String>,
    pub plant: Option<PlantInfo>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("an analysis is already in progress")]
    Busy,

    #[error("analysis was superseded by a newer upload")]
    Superseded,

    #[error(transparent)]
    Identify(#[from] IdentifyError),
}

impl AnalyzeError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyzeError::Busy => "busy",
            AnalyzeError::Superseded => "superseded",
            AnalyzeError::Identify(e) => e.kind(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            AnalyzeError::Identify(e) => e.user_message(),
            other => format!("Error: {}", other),
        }
    }
}

/// A completed analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub id: Uuid,
    pub plant: PlantInfo,
}

struct Inner {
    state: SessionState,
    analysis_id: Option<Uuid>,
    preview: Option<String>,
    plant: Option<PlantInfo>,
    error: Option<String>,
    updated_at: DateTime<Utc>,
    cancel: Option<CancellationToken>,
}

impl Inner {
    fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            analysis_id: None,
            preview: None,
            plant: None,
            error: None,
            updated_at: Utc::now(),
            cancel: None,
        }
    }

    fn is_current(&self, id: Uuid) -> bool {
        self.state == SessionState::Analyzing && self.analysis_id == Some(id)
    }
}

pub struct IdentificationSession {
    policy: InFlightPolicy,
    inner: Mutex<Inner>,
}

impl IdentificationSession {
    pub fn new(policy: InFlightPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner::idle()),
        }
    }

    pub fn policy(&self) -> InFlightPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        SessionSnapshot {
            state: inner.state,
            analysis_id: inner.analysis_id,
            preview: inner.preview.clone(),
            plant: inner.plant.clone(),
            error: inner.error.clone(),
            updated_at: inner.updated_at,
        }
    }

    /// Cancel anything in flight and go back to idle.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if let Some(token) = inner.cancel.take() {
            token.cancel();
        }
        *inner = Inner::idle();
        tracing::info!("Session reset");
    }

    /// Run one upload through the state machine.
    ///
    /// The preview is published as soon as the analysis starts; on failure it
    /// stays visible next to the error.
    pub async fn analyze(
        &self,
        identifier: &Identifier,
        image: EncodedImage,
    ) -> Result<Analysis, AnalyzeError> {
        let (id, token) = self.begin(image.preview)?;
        let mut guard = InFlight {
            session: self,
            id,
            settled: false,
        };

        let outcome = tokio::select! {
            _ = token.cancelled() => {
                guard.settled = true;
                tracing::info!(analysis_id = %id, "Analysis superseded");
                return Err(AnalyzeError::Superseded);
            }
            outcome = identifier.identify(&image.payload) => outcome,
        };

        guard.settled = true;
        if !self.finish(id, &outcome) {
            tracing::info!(analysis_id = %id, "Dropping stale analysis result");
            return Err(AnalyzeError::Superseded);
        }

        match outcome {
            Ok(plant) => {
                tracing::info!(analysis_id = %id, name = %plant.name, "Plant identified");
                Ok(Analysis { id, plant })
            }
            Err(e) => {
                tracing::error!(analysis_id = %id, kind = e.kind(), error = %e, "Analysis failed");
                Err(e.into())
            }
        }
    }

    fn begin(&self, preview: String) -> Result<(Uuid, CancellationToken), AnalyzeError> {
        let mut inner = self.lock();

        if inner.state == SessionState::Analyzing {
            match self.policy {
                InFlightPolicy::Reject => {
                    tracing::warn!(
                        in_flight = ?inner.analysis_id,
                        "Upload rejected while an analysis is running"
                    );
                    return Err(AnalyzeError::Busy);
                }
                InFlightPolicy::Replace => {
                    if let Some(token) = inner.cancel.take() {
                        token.cancel();
                    }
                }
            }
        }

        let id = Uuid::new_v4();
        let token = CancellationToken::new();

        inner.state = SessionState::Analyzing;
        inner.analysis_id = Some(id);
        inner.preview = Some(preview);
        inner.plant = None;
        inner.error = None;
        inner.cancel = Some(token.clone());
        inner.updated_at = Utc::now();

        tracing::info!(analysis_id = %id, "Analysis started");
        Ok((id, token))
    }

    /// Record the outcome if `id` is still the current analysis.
    fn finish(&self, id: Uuid, outcome: &Result<PlantInfo, IdentifyError>) -> bool {
        let mut inner = self.lock();
        if !inner.is_current(id) {
            return false;
        }

        match outcome {
            Ok(plant) => {
                inner.state = SessionState::HasResult;
                inner.plant = Some(plant.clone());
            }
            Err(e) => {
                inner.state = SessionState::HasError;
                inner.error = Some(e.user_message());
            }
        }
        inner.cancel = None;
        inner.updated_at = Utc::now();
        true
    }

    /// The caller went away mid-analysis (e.g. the HTTP client disconnected).
    fn abandon(&self, id: Uuid) {
        let mut inner = self.lock();
        if inner.is_current(id) {
            tracing::warn!(analysis_id = %id, "Analysis abandoned by caller");
            *inner = Inner::idle();
        }
    }
}

/// Returns the session to idle if an analysis future is dropped before it
/// settles.
struct InFlight<'a> {
    session: &'a IdentificationSession,
    id: Uuid,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.session.abandon(self.id);
        }
    }
}
