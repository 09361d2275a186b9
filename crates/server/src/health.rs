use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use folio_agent::profile::{DocumentStatus, ProfileContext};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    summary: DocumentStatus,
    linkedin: DocumentStatus,
}

impl HealthState {
    pub fn from_profile(profile: &ProfileContext) -> Self {
        Self { summary: profile.summary.status, linkedin: profile.linkedin.status }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub profile: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// The service answers without profile documents, so missing ones only degrade the report.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let profile = profile_check(state.summary, state.linkedin);
    let ready = profile.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "folio-server dialogue runtime initialized".to_string(),
        },
        profile,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

fn profile_check(summary: DocumentStatus, linkedin: DocumentStatus) -> HealthCheck {
    let detail = format!("summary {}, linkedin {}", summary.as_str(), linkedin.as_str());
    if summary == DocumentStatus::Loaded && linkedin == DocumentStatus::Loaded {
        HealthCheck { status: "ready", detail }
    } else {
        HealthCheck { status: "degraded", detail }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use folio_agent::profile::DocumentStatus;

    use crate::chat::test_support::profile;
    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_is_ready_when_profile_documents_loaded() {
        let mut context = profile(DocumentStatus::Loaded);
        context.linkedin.status = DocumentStatus::Loaded;

        let (status, Json(payload)) = health(State(HealthState::from_profile(&context))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.profile.status, "ready");
    }

    #[tokio::test]
    async fn health_reports_missing_documents_as_degraded() {
        let context = profile(DocumentStatus::Unreadable);

        let (status, Json(payload)) = health(State(HealthState::from_profile(&context))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.profile.detail, "summary unreadable, linkedin missing");
        assert_eq!(payload.service.status, "ready");
    }
}
