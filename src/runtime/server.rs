// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! llama-server subprocess manager
//!
//! Launches llama-server with the parameters of one fallback tier, waits for
//! its `/health` endpoint, and talks to its OpenAI-compatible API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};

use super::failure;
use super::message::{ChatMessage, CompletionRequest};
use super::state::FallbackTier;
use crate::error::{Result, WardenError};

const HEALTH_POLL_INTERVAL_MS: u64 = 250;
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);
const STDERR_TAIL_LINES: usize = 40;
/// Offload every layer when the compute backend is in use
const ALL_GPU_LAYERS: u32 = 999;

/// Everything needed to start one server process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub binary_path: PathBuf,
    pub model_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub tier: FallbackTier,
    pub context_tokens: u32,
    pub batch_size: u32,
    pub threads: usize,
}

impl LaunchSpec {
    pub fn uses_compute_backend(&self) -> bool {
        self.tier.uses_compute_backend()
    }

    /// Command-line arguments for llama-server
    pub fn args(&self) -> Vec<String> {
        let gpu_layers = if self.uses_compute_backend() {
            ALL_GPU_LAYERS
        } else {
            0
        };
        vec![
            "--model".to_string(),
            self.model_path.display().to_string(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
            "--ctx-size".to_string(),
            self.context_tokens.to_string(),
            "--batch-size".to_string(),
            self.batch_size.to_string(),
            "--threads".to_string(),
            self.threads.to_string(),
            "--n-gpu-layers".to_string(),
            gpu_layers.to_string(),
        ]
    }

    /// Get the base URL for API calls
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// A running model server, as seen by the supervisor
#[async_trait]
pub trait ServerHandle: Send + Sync {
    /// Run one completion. No timeout of its own; the watchdog bounds it.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    fn is_alive(&self) -> bool;

    async fn shutdown(&self);
}

/// Starts server processes
#[async_trait]
pub trait ServerLauncher: Send + Sync {
    /// Launch and wait until healthy, or fail within `startup_timeout`
    async fn launch(
        &self,
        spec: &LaunchSpec,
        startup_timeout: Duration,
    ) -> Result<Arc<dyn ServerHandle>>;
}

/// HTTP client for the llama-server API
#[derive(Debug, Clone)]
pub struct LlamaClient {
    client: Client,
    base_url: String,
}

impl LlamaClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(WardenError::BackendUnhealthy(format!(
                "health check returned {}",
                response.status()
            )))
        }
    }

    pub async fn chat_completion(&self, request: &CompletionRequest) -> Result<String> {
        let body = OaiRequest {
            model: "local",
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(failure::server_error(status.as_u16(), &text));
        }

        let parsed: OaiResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                WardenError::BackendUnhealthy("server returned no completion".to_string())
            })
    }
}

fn transport_error(err: reqwest::Error) -> WardenError {
    if err.is_connect() {
        WardenError::ProcessStart(format!("server unreachable: {}", err))
    } else {
        WardenError::Http(err)
    }
}

#[derive(Debug, Serialize)]
struct OaiRequest<'a> {
    model: &'static str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
}

#[derive(Debug, Deserialize)]
struct OaiChoice {
    message: OaiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OaiResponseMessage {
    content: Option<String>,
}

/// Manages a llama-server subprocess
pub struct LlamaServer {
    process: Mutex<Option<Child>>,
    client: LlamaClient,
    stderr_tail: Arc<Mutex<VecDeque<String>>>,
    spec: LaunchSpec,
}

impl LlamaServer {
    /// Spawn the process and wait for `/health` to answer
    pub async fn start(spec: LaunchSpec, http: Client, startup_timeout: Duration) -> Result<Self> {
        let mut cmd = Command::new(&spec.binary_path);
        cmd.args(spec.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| failure::spawn_failure(&spec.binary_path, &e))?;

        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(collect_stderr(stderr, stderr_tail.clone()));
        }

        let server = Self {
            process: Mutex::new(Some(child)),
            client: LlamaClient::new(http, spec.base_url()),
            stderr_tail,
            spec,
        };

        match tokio::time::timeout(startup_timeout, server.wait_for_ready()).await {
            Ok(Ok(())) => {
                tracing::info!(
                    "llama-server started on {} ({}, ctx {}, threads {})",
                    server.client.base_url(),
                    server.spec.tier,
                    server.spec.context_tokens,
                    server.spec.threads
                );
                Ok(server)
            }
            Ok(Err(e)) => {
                server.shutdown().await;
                Err(e)
            }
            Err(_) => {
                server.shutdown().await;
                Err(failure::startup_failure(
                    &format!(
                        "not healthy within {}s",
                        startup_timeout.as_secs_f32()
                    ),
                    &server.stderr_tail(),
                ))
            }
        }
    }

    /// Wait for the server's /health endpoint to respond
    async fn wait_for_ready(&self) -> Result<()> {
        loop {
            if !self.is_alive() {
                // Let the stderr reader drain the last lines
                tokio::time::sleep(Duration::from_millis(100)).await;
                return Err(failure::startup_failure(
                    "exited during startup",
                    &self.stderr_tail(),
                ));
            }

            if self.client.health().await.is_ok() {
                return Ok(());
            }

            tokio::time::sleep(Duration::from_millis(HEALTH_POLL_INTERVAL_MS)).await;
        }
    }

    pub fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Last lines the process wrote to stderr
    pub fn stderr_tail(&self) -> String {
        match self.stderr_tail.lock() {
            Ok(tail) => tail.iter().cloned().collect::<Vec<_>>().join("\n"),
            Err(_) => String::new(),
        }
    }
}

#[async_trait]
impl ServerHandle for LlamaServer {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        if !self.is_alive() {
            return Err(failure::process_exit_failure(&self.stderr_tail()));
        }
        match self.client.chat_completion(request).await {
            Ok(content) => Ok(content),
            Err(_) if !self.is_alive() => Err(failure::process_exit_failure(&self.stderr_tail())),
            Err(e) => Err(e),
        }
    }

    /// Check if the server process is still running
    fn is_alive(&self) -> bool {
        if let Ok(mut guard) = self.process.lock() {
            if let Some(ref mut child) = *guard {
                return matches!(child.try_wait(), Ok(None));
            }
        }
        false
    }

    async fn shutdown(&self) {
        let child = match self.process.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(mut child) = child {
            let _ = child.kill().await;
            tracing::info!("llama-server on {} stopped", self.client.base_url());
        }
    }
}

async fn collect_stderr(stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "warden::llama_server", "{}", line);
        if let Ok(mut tail) = tail.lock() {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
}

/// Launches real llama-server processes
#[derive(Debug, Clone, Default)]
pub struct LlamaServerLauncher {
    http: Client,
}

impl LlamaServerLauncher {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ServerLauncher for LlamaServerLauncher {
    async fn launch(
        &self,
        spec: &LaunchSpec,
        startup_timeout: Duration,
    ) -> Result<Arc<dyn ServerHandle>> {
        let server = LlamaServer::start(spec.clone(), self.http.clone(), startup_timeout).await?;
        Ok(Arc::new(server))
    }
}
