// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP API server command

use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

use super::RuntimeContext;
use crate::api::{self, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Settings;
use crate::diagnostics;
use crate::error::Result;

/// Execute the serve command; returns after Ctrl+C
pub async fn execute(args: &ServeArgs, settings: &Settings) -> Result<()> {
    let context = RuntimeContext::build(settings).await?;
    let supervisor = context.supervisor.clone();

    if args.eager {
        // A failed start is already in the health status; keep serving it
        if let Err(e) = supervisor.start().await {
            eprintln!("{}", e.user_message());
        }
    }

    let host = args.host.as_deref().unwrap_or(settings.server.host.as_str());
    let port = args.port.unwrap_or(settings.server.port);
    let listener = TcpListener::bind((host, port)).await?;
    let addr = listener.local_addr()?;

    diagnostics::info(
        "api",
        "listening",
        json!({ "address": addr.to_string() }),
    );
    println!("Warden listening on http://{}", addr);

    let state = Arc::new(AppState {
        supervisor: context.supervisor,
        hardware: context.hardware,
        catalog: context.catalog,
    });

    api::serve(listener, state, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    supervisor.shutdown().await;
    Ok(())
}
