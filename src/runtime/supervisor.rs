// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Runtime supervisor
//!
//! Owns the model server process and walks it down the fallback ladder
//! (compute backend, CPU-only, reduced CPU, failed) as launches fail or
//! calls hang. The ladder only moves forward; `reinitialize` is the one way
//! back to an optimistic start.
//!
//! State changes are serialized behind one async mutex. Chats hold it only
//! to snapshot the server handle, so the inference calls themselves run in
//! parallel. Outcomes are counted in a separate failure ledger that is never
//! held across an await; a finished call does not wait on a restart. Readers
//! get the published [`HealthStatus`] from a watch channel without locking.

use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::message::{ChatRequest, CompletionRequest};
use super::server::{LaunchSpec, ServerHandle, ServerLauncher};
use super::state::{FallbackTier, HealthStatus, RuntimeMode};
use super::watchdog::Watchdog;
use crate::catalog::{InstalledModel, ModelCatalog};
use crate::config::Settings;
use crate::diagnostics;
use crate::error::{ErrorCategory, Result, WardenError};
use crate::hardware::ExecutionProfile;

/// Supervisor tuning
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub binary_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub default_model: String,
    /// Upper bound on one chat call
    pub watchdog: Duration,
    /// Upper bound on one launch, health check included
    pub startup_timeout: Duration,
    /// Consecutive hardware-class failures before a downgrade
    pub failure_threshold: u32,
}

impl SupervisorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        let runtime = &settings.runtime;
        Self {
            binary_path: runtime.binary_path.clone(),
            host: runtime.host.clone(),
            port: runtime.port,
            default_model: runtime.default_model.clone(),
            watchdog: Duration::from_secs(runtime.watchdog_secs),
            startup_timeout: Duration::from_secs(runtime.startup_timeout_secs),
            failure_threshold: runtime.failure_threshold.max(1),
        }
    }
}

struct RuntimeState {
    mode: RuntimeMode,
    tier: FallbackTier,
    active: ExecutionProfile,
    handle: Option<Arc<dyn ServerHandle>>,
    /// Bumped on every successful launch
    generation: u64,
    restarts: u32,
    model: Option<InstalledModel>,
    notices: Vec<String>,
    failure_reason: Option<String>,
}

impl RuntimeState {
    fn fresh(recommended: &ExecutionProfile) -> Self {
        let tier = if recommended.use_compute_backend {
            FallbackTier::ComputeBackend
        } else {
            FallbackTier::CpuOnly
        };
        Self {
            mode: RuntimeMode::Uninitialized,
            tier,
            active: recommended.clone(),
            handle: None,
            generation: 0,
            restarts: 0,
            model: None,
            notices: Vec::new(),
            failure_reason: None,
        }
    }

    fn notice(&mut self, text: &str) {
        if !self.notices.iter().any(|n| n == text) {
            self.notices.push(text.to_string());
        }
    }
}

/// Failure count for the live server generation
#[derive(Debug, Default)]
struct FailureLedger {
    /// Generation whose outcomes still count; zero while none does
    live: u64,
    consecutive: u32,
}

struct Shared {
    ledger: StdMutex<FailureLedger>,
    config: SupervisorConfig,
    recommended: ExecutionProfile,
    launcher: Arc<dyn ServerLauncher>,
    catalog: Arc<dyn ModelCatalog>,
    status_tx: watch::Sender<HealthStatus>,
}

impl Shared {
    fn ledger(&self) -> MutexGuard<'_, FailureLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stop counting outcomes until the next successful launch
    fn retire(&self) {
        *self.ledger() = FailureLedger::default();
    }

    fn snapshot(&self, state: &RuntimeState) -> HealthStatus {
        let mut warnings = self.recommended.warnings.clone();
        warnings.extend(state.notices.iter().cloned());
        HealthStatus {
            mode: state.mode,
            fallback_tier: state.tier,
            active_execution_profile: state.active.clone(),
            warnings,
            consecutive_failures: self.ledger().consecutive,
            restarts: state.restarts,
            model: state.model.as_ref().map(|m| m.id.clone()),
        }
    }

    fn publish(&self, state: &RuntimeState) -> HealthStatus {
        let status = self.snapshot(state);
        self.status_tx.send_replace(status.clone());
        status
    }

    fn profile_for(&self, tier: FallbackTier) -> ExecutionProfile {
        match tier {
            FallbackTier::ComputeBackend => self.recommended.clone(),
            FallbackTier::CpuOnly => self.recommended.cpu_only(),
            FallbackTier::CpuReduced => self.recommended.reduced(),
        }
    }

    fn launch_spec(
        &self,
        model: &InstalledModel,
        profile: &ExecutionProfile,
        tier: FallbackTier,
    ) -> LaunchSpec {
        LaunchSpec {
            binary_path: self.config.binary_path.clone(),
            model_path: model.path.clone(),
            host: self.config.host.clone(),
            port: self.config.port,
            tier,
            context_tokens: profile.max_context_tokens,
            batch_size: profile.max_batch_size,
            threads: profile.thread_count,
        }
    }

    /// Move one rung down the ladder
    fn step_down(&self, state: &mut RuntimeState, next: FallbackTier, reason: &WardenError) {
        diagnostics::warn(
            "runtime",
            "falling back to a less demanding mode",
            json!({
                "from": state.tier.to_string(),
                "to": next.to_string(),
                "reason": reason.to_string(),
            }),
        );
        state.tier = next;
        state.notice(match next {
            FallbackTier::CpuReduced => {
                "Memory and processor use were reduced to keep the local model stable."
            }
            _ => ErrorCategory::BackendUnhealthy.user_message(),
        });
    }

    fn fail(&self, state: &mut RuntimeState, reason: &WardenError) -> WardenError {
        self.retire();
        state.mode = RuntimeMode::Failed;
        state.handle = None;
        state.failure_reason = Some(reason.to_string());
        state.notice(ErrorCategory::Installation.user_message());
        self.publish(state);
        diagnostics::error(
            "runtime",
            "all fallback tiers exhausted",
            json!({ "reason": reason.to_string() }),
        );
        WardenError::Installation(reason.to_string())
    }

    /// Launch at the current tier, stepping down on each failure until a
    /// server is healthy or the ladder is exhausted
    async fn launch_ladder(&self, state: &mut RuntimeState, model: &InstalledModel) -> Result<()> {
        loop {
            let tier = state.tier;
            let profile = self.profile_for(tier);
            state.mode = RuntimeMode::starting(tier);
            state.active = profile.clone();
            self.publish(state);

            let spec = self.launch_spec(model, &profile, tier);
            diagnostics::info(
                "runtime",
                "launching model server",
                json!({
                    "tier": tier.to_string(),
                    "model": model.id,
                    "contextTokens": spec.context_tokens,
                    "batchSize": spec.batch_size,
                    "threads": spec.threads,
                }),
            );

            match self
                .launcher
                .launch(&spec, self.config.startup_timeout)
                .await
            {
                Ok(handle) => {
                    state.generation += 1;
                    state.handle = Some(handle);
                    state.mode = RuntimeMode::running(tier);
                    *self.ledger() = FailureLedger {
                        live: state.generation,
                        consecutive: 0,
                    };
                    state.model = Some(model.clone());
                    self.publish(state);
                    diagnostics::info(
                        "runtime",
                        "model server running",
                        json!({ "mode": state.mode.to_string(), "generation": state.generation }),
                    );
                    return Ok(());
                }
                Err(e) => {
                    diagnostics::warn(
                        "runtime",
                        "model server launch failed",
                        json!({ "tier": tier.to_string(), "error": e.to_string() }),
                    );
                    match tier.next() {
                        Some(next) => self.step_down(state, next, &e),
                        None => return Err(self.fail(state, &e)),
                    }
                }
            }
        }
    }
}

/// Supervises one model server process. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct RuntimeSupervisor {
    shared: Arc<Shared>,
    state: Arc<Mutex<RuntimeState>>,
}

impl RuntimeSupervisor {
    /// Create a supervisor in the `Uninitialized` mode
    pub fn initialize(
        config: SupervisorConfig,
        recommended: ExecutionProfile,
        launcher: Arc<dyn ServerLauncher>,
        catalog: Arc<dyn ModelCatalog>,
    ) -> Self {
        let state = RuntimeState::fresh(&recommended);
        let (status_tx, _) = watch::channel(HealthStatus {
            mode: state.mode,
            fallback_tier: state.tier,
            active_execution_profile: recommended.clone(),
            warnings: recommended.warnings.clone(),
            consecutive_failures: 0,
            restarts: 0,
            model: None,
        });

        diagnostics::info(
            "runtime",
            "supervisor initialized",
            json!({
                "tier": recommended.tier.to_string(),
                "startTier": state.tier.to_string(),
                "watchdogSecs": config.watchdog.as_secs_f64(),
                "failureThreshold": config.failure_threshold,
            }),
        );

        Self {
            shared: Arc::new(Shared {
                ledger: StdMutex::new(FailureLedger::default()),
                config,
                recommended,
                launcher,
                catalog,
                status_tx,
            }),
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// The profile a fresh start uses
    pub fn recommended_profile(&self) -> &ExecutionProfile {
        &self.shared.recommended
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.shared.config
    }

    /// Latest published snapshot; never waits on the state lock
    pub fn health_status(&self) -> HealthStatus {
        self.shared.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<HealthStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Snapshot taken after any in-flight transition has finished
    pub async fn settled_status(&self) -> HealthStatus {
        let state = self.state.lock().await;
        self.shared.snapshot(&state)
    }

    /// Start the server with the default model unless already running
    pub async fn start(&self) -> Result<HealthStatus> {
        let mut state = self.state.lock().await;
        self.ensure_running(&mut state, None).await?;
        Ok(self.shared.snapshot(&state))
    }

    /// Run one chat completion under the watchdog
    pub async fn chat(&self, request: ChatRequest) -> Result<String> {
        let request_id = Uuid::new_v4();
        request.validate()?;

        let (handle, generation, max_context_tokens) = {
            let mut state = self.state.lock().await;
            let handle = self.ensure_running(&mut state, request.model_id()).await?;
            (handle, state.generation, state.active.max_context_tokens)
        };

        let completion = CompletionRequest::from_chat(&request, max_context_tokens);
        let watchdog = Watchdog::new(self.shared.config.watchdog);
        let outcome = watchdog.guard(handle.complete(&completion)).await;

        if let Err(e) = &outcome {
            diagnostics::warn(
                "chat",
                "chat call failed",
                json!({
                    "requestId": request_id.to_string(),
                    "category": e.category(),
                    "error": e.to_string(),
                }),
            );
        }

        self.record_outcome(generation, &outcome).await;
        outcome
    }

    /// Stop the server process. The fallback tier is kept, so a later start
    /// resumes where the ladder left off.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let Some(handle) = state.handle.take() {
            handle.shutdown().await;
        }
        if state.mode != RuntimeMode::Failed {
            state.mode = RuntimeMode::Uninitialized;
        }
        self.shared.retire();
        self.shared.publish(&state);
        diagnostics::info("runtime", "supervisor shut down", json!({}));
    }

    /// Stop the server and forget every downgrade, so the next start makes
    /// a fresh optimistic attempt with the recommended profile
    pub async fn reinitialize(&self) -> HealthStatus {
        let mut state = self.state.lock().await;
        if let Some(handle) = state.handle.take() {
            handle.shutdown().await;
        }
        self.shared.retire();
        let generation = state.generation;
        *state = RuntimeState::fresh(&self.shared.recommended);
        state.generation = generation;
        diagnostics::info(
            "runtime",
            "supervisor reinitialized",
            json!({ "startTier": state.tier.to_string() }),
        );
        self.shared.publish(&state)
    }

    async fn ensure_running(
        &self,
        state: &mut RuntimeState,
        requested: Option<&str>,
    ) -> Result<Arc<dyn ServerHandle>> {
        if state.mode == RuntimeMode::Failed {
            return Err(WardenError::Installation(
                state
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "no usable fallback tier".to_string()),
            ));
        }

        if state.mode.is_running() {
            let active = state.model.as_ref().map(|m| m.id.as_str());
            if let (Some(wanted), Some(active)) = (requested, active) {
                if wanted != active {
                    // Missing models still report as such
                    self.shared.catalog.resolve(wanted)?;
                    return Err(WardenError::InvalidRequest(format!(
                        "model '{}' is not loaded; '{}' is active",
                        wanted, active
                    )));
                }
            }
            if let Some(handle) = &state.handle {
                return Ok(handle.clone());
            }
        }

        let model_id = requested.unwrap_or(self.shared.config.default_model.as_str());
        let model = self.shared.catalog.resolve(model_id)?;
        self.shared.launch_ladder(state, &model).await?;
        state.handle.clone().ok_or_else(|| {
            WardenError::ProcessStart("server handle missing after launch".to_string())
        })
    }

    /// Count the outcome against the generation it ran on. Only the call
    /// that reaches the failure threshold goes on to take the state lock.
    async fn record_outcome(&self, generation: u64, outcome: &Result<String>) {
        let threshold = self.shared.config.failure_threshold;
        let failures = {
            let mut ledger = self.shared.ledger();
            // A restart happened or is underway since this call started
            if ledger.live != generation {
                return;
            }
            match outcome {
                Ok(_) if ledger.consecutive == 0 => return,
                Ok(_) => ledger.consecutive = 0,
                Err(e) if e.counts_toward_downgrade() => ledger.consecutive += 1,
                Err(_) => return,
            }
            let failures = ledger.consecutive;
            if failures >= threshold {
                *ledger = FailureLedger::default();
            }
            failures
        };

        if failures < threshold {
            self.shared
                .status_tx
                .send_modify(|status| status.consecutive_failures = failures);
            return;
        }
        if let Err(e) = outcome {
            self.downgrade(generation, e).await;
        }
    }

    /// Stop the failing server and relaunch one rung down. The relaunch runs
    /// in the background holding the state lock, so the next caller sees the
    /// downgraded server without holding up this one.
    async fn downgrade(&self, generation: u64, reason: &WardenError) {
        let mut state = self.state.clone().lock_owned().await;
        if state.generation != generation || !state.mode.is_running() {
            return;
        }

        let retired = state.handle.take();
        state.restarts += 1;
        let next = state.tier.next();
        match next {
            Some(next) => {
                self.shared.step_down(&mut state, next, reason);
                state.mode = RuntimeMode::starting(next);
                self.shared.publish(&state);
            }
            None => {
                self.shared.fail(&mut state, reason);
            }
        }

        let model = state.model.clone();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let mut state = state;
            if let Some(handle) = retired {
                handle.shutdown().await;
            }
            if next.is_none() {
                return;
            }
            match model {
                Some(model) => {
                    let _ = shared.launch_ladder(&mut state, &model).await;
                }
                None => {
                    state.mode = RuntimeMode::Uninitialized;
                    shared.publish(&state);
                }
            }
        });
    }
}
