// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP surface for the chat UI
//!
//! Errors from the runtime are reported in-band (`ok: false`) with the
//! category and its plain-language message; the technical detail stays in
//! the diagnostics log.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::{InstalledModel, ModelCatalog};
use crate::error::{ErrorCategory, Result};
use crate::hardware::{ExecutionProfile, HardwareProfile};
use crate::runtime::{ChatRequest, HealthStatus, RuntimeSupervisor};

/// Shared state behind every route
pub struct AppState {
    pub supervisor: RuntimeSupervisor,
    pub hardware: HardwareProfile,
    pub catalog: Arc<dyn ModelCatalog>,
}

type SharedState = Arc<AppState>;

/// Body of a `/chat` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ChatResponse {
    fn success(content: String) -> Self {
        Self {
            ok: true,
            content: Some(content),
            error_category: None,
            error_message: None,
        }
    }

    fn failure(category: ErrorCategory) -> Self {
        Self {
            ok: false,
            content: None,
            error_category: Some(category),
            error_message: Some(category.user_message().to_string()),
        }
    }
}

/// Body of a `/hardware-profile` response
#[derive(Debug, Clone, Serialize)]
pub struct HardwareReport {
    pub hardware: HardwareProfile,
    pub execution: ExecutionProfile,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/hardware-profile", get(hardware_profile))
        .route("/models", get(models))
        .route("/reinitialize", post(reinitialize))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: SharedState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health(State(state): State<SharedState>) -> Json<HealthStatus> {
    Json(state.supervisor.health_status())
}

async fn chat(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    match state.supervisor.chat(request).await {
        Ok(content) => Json(ChatResponse::success(content)),
        Err(e) => Json(ChatResponse::failure(e.category())),
    }
}

async fn hardware_profile(State(state): State<SharedState>) -> Json<HardwareReport> {
    Json(HardwareReport {
        hardware: state.hardware.clone(),
        execution: state.supervisor.recommended_profile().clone(),
    })
}

async fn models(State(state): State<SharedState>) -> Json<Vec<InstalledModel>> {
    Json(state.catalog.list())
}

async fn reinitialize(State(state): State<SharedState>) -> Json<HealthStatus> {
    Json(state.supervisor.reinitialize().await)
}
