//! HTTP surface for Terraform Cloud and operators.
//!
//! Public routes receive run task events and answer as soon as the
//! signature has been checked; the AWX work continues in the background.
//! Requests are authenticated before their path or query is validated, so
//! an unauthenticated caller only ever sees 401.
//!
//! The private route hands out workspace signatures and can be moved onto a
//! separate listener so it is not exposed alongside the public ones.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::{Orchestrator, SIGNATURE_HEADER};
use crate::domain::{is_valid_template_id, Action, LaunchOverrides, TaskInvocation};

/// Shared state for the handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmacRequest {
    pub workspace_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HmacResponse {
    pub workspace_id: String,
    pub hmac: String,
}

/// The bridge's HTTP API
pub struct BridgeApi;

impl BridgeApi {
    /// Run task endpoints and the health probe
    pub fn public_router(state: AppState) -> Router {
        Router::new()
            .route("/public/job/:job_template_id", post(job_template_task))
            .route(
                "/public/workflow/:workflow_template_id",
                post(workflow_template_task),
            )
            .route("/public/inventory/:organisation_id", post(inventory_task))
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Signature lookup for operators
    pub fn private_router(state: AppState) -> Router {
        Router::new()
            .route("/private/hmac", post(workspace_hmac))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Every route on one router
    pub fn router(state: AppState) -> Router {
        Self::public_router(state.clone()).merge(Self::private_router(state))
    }

    /// Bind and serve until Ctrl-C.
    ///
    /// With `private_listen` set the private route is served only there.
    pub async fn start(state: AppState, server: &ServerConfig) -> Result<()> {
        let public = bind(server.listen).await?;
        let private = match server.private_listen {
            Some(addr) => Some(bind(addr).await?),
            None => None,
        };

        Self::serve(state, public, private, server.shutdown_grace, shutdown_signal()).await
    }

    /// Serve on already-bound listeners until `shutdown` resolves, then wait
    /// up to `grace` for acknowledged attempts to finish.
    pub async fn serve<F>(
        state: AppState,
        public: TcpListener,
        private: Option<TcpListener>,
        grace: Duration,
        shutdown: F,
    ) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let stop = CancellationToken::new();
        let trigger = stop.clone();
        let watcher = tokio::spawn(async move {
            shutdown.await;
            trigger.cancel();
        });

        let served = match private {
            None => {
                info!(address = ?public.local_addr().ok(), "Listening for run task events");
                axum::serve(public, Self::router(state.clone()))
                    .with_graceful_shutdown(stop.clone().cancelled_owned())
                    .await
                    .context("HTTP server failed")
            }
            Some(private) => {
                info!(address = ?public.local_addr().ok(), "Listening for run task events");
                info!(address = ?private.local_addr().ok(), "Private routes listening");

                let public = axum::serve(public, Self::public_router(state.clone()))
                    .with_graceful_shutdown(stop.clone().cancelled_owned());
                let private = axum::serve(private, Self::private_router(state.clone()))
                    .with_graceful_shutdown(stop.clone().cancelled_owned());

                tokio::try_join!(
                    async { public.await.context("public HTTP server failed") },
                    async { private.await.context("private HTTP server failed") },
                )
                .map(|_| ())
            }
        };
        watcher.abort();

        if state.orchestrator.drain(grace).await {
            info!("All in-flight attempts finished");
        }
        served
    }
}

async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

// -- Handlers --

async fn health_check() -> &'static str {
    "ok"
}

async fn job_template_task(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let invocation = match authenticated(&state, &headers, &body) {
        Ok(invocation) => invocation,
        Err(status) => return status,
    };
    let Some(overrides) = launch_overrides(&template_id, &uri) else {
        return StatusCode::BAD_REQUEST;
    };

    accept(
        &state,
        Action::LaunchJobTemplate {
            template_id,
            overrides,
        },
        invocation,
        &headers,
    )
}

async fn workflow_template_task(
    State(state): State<AppState>,
    Path(template_id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let invocation = match authenticated(&state, &headers, &body) {
        Ok(invocation) => invocation,
        Err(status) => return status,
    };
    let Some(overrides) = launch_overrides(&template_id, &uri) else {
        return StatusCode::BAD_REQUEST;
    };

    accept(
        &state,
        Action::LaunchWorkflowTemplate {
            template_id,
            overrides,
        },
        invocation,
        &headers,
    )
}

async fn inventory_task(
    State(state): State<AppState>,
    Path(organization_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let invocation = match authenticated(&state, &headers, &body) {
        Ok(invocation) => invocation,
        Err(status) => return status,
    };
    let Ok(organization_id) = organization_id.parse::<u64>() else {
        return StatusCode::BAD_REQUEST;
    };

    accept(
        &state,
        Action::CreateInventory { organization_id },
        invocation,
        &headers,
    )
}

fn signature(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// Decode the body and check its signature before looking at the path or
/// query. The signature covers a field of the body, so a body that does not
/// decode cannot be authenticated either; both answer 401 without detail.
fn authenticated(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<TaskInvocation, StatusCode> {
    let Some(signature) = signature(headers) else {
        warn!("Run task request without signature");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let invocation: TaskInvocation = serde_json::from_slice(body).map_err(|e| {
        warn!(error = %e, "Undecodable run task body");
        StatusCode::UNAUTHORIZED
    })?;

    state
        .orchestrator
        .verifier()
        .authenticate(&invocation.workspace_id, Some(signature))
        .map_err(|e| {
            warn!(error = %e, "Run task signature rejected");
            StatusCode::UNAUTHORIZED
        })?;

    Ok(invocation)
}

/// Template id and query overrides, or `None` if either is invalid
fn launch_overrides(template_id: &str, uri: &Uri) -> Option<LaunchOverrides> {
    if !is_valid_template_id(template_id) {
        return None;
    }

    Query::<LaunchOverrides>::try_from_uri(uri)
        .ok()
        .map(|Query(overrides)| overrides)
}

/// Acknowledge an authenticated invocation and start its attempt
fn accept(
    state: &AppState,
    action: Action,
    invocation: TaskInvocation,
    headers: &HeaderMap,
) -> StatusCode {
    match state
        .orchestrator
        .accept(action, invocation, signature(headers))
    {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::UNAUTHORIZED,
    }
}

async fn workspace_hmac(
    State(state): State<AppState>,
    Json(request): Json<HmacRequest>,
) -> Json<HmacResponse> {
    let hmac = state.orchestrator.verifier().sign(&request.workspace_id);
    Json(HmacResponse {
        workspace_id: request.workspace_id,
        hmac,
    })
}
