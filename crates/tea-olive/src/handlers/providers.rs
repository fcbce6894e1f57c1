use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::llm::ProviderId;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSummary {
    id: ProviderId,
    label: &'static str,
    default_model: String,
    configured: bool,
}

/// GET /providers
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<ProviderSummary>> {
    Json(
        state
            .providers
            .entries()
            .map(|entry| ProviderSummary {
                id: entry.profile.id,
                label: entry.profile.label,
                default_model: entry.profile.default_model.clone(),
                configured: entry.configured,
            })
            .collect(),
    )
}
