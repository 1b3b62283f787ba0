// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! One-shot prompt command

use super::RuntimeContext;
use crate::api::ChatResponse;
use crate::cli::args::{AskArgs, OutputFormat};
use crate::config::Settings;
use crate::error::Result;
use crate::runtime::{ChatMessage, ChatOptions, ChatRequest};

/// Build the chat request for a prompt
pub fn build_request(args: &AskArgs) -> ChatRequest {
    let mut messages = Vec::new();
    if let Some(system) = &args.system {
        messages.push(ChatMessage::system(system.clone()));
    }
    messages.push(ChatMessage::user(args.prompt.clone()));

    let mut request = ChatRequest::new(messages);
    if let Some(model) = &args.model {
        request = request.with_model(model.clone());
    }
    if args.max_tokens.is_some() || args.temperature.is_some() {
        request = request.with_options(ChatOptions {
            max_tokens: args.max_tokens,
            temperature: args.temperature,
        });
    }
    request
}

/// Execute the ask command
pub async fn execute(args: &AskArgs, format: &OutputFormat, settings: &Settings) -> Result<()> {
    let context = RuntimeContext::build(settings).await?;
    let outcome = context.supervisor.chat(build_request(args)).await;
    context.supervisor.shutdown().await;

    if *format == OutputFormat::Json {
        let response = match &outcome {
            Ok(content) => ChatResponse {
                ok: true,
                content: Some(content.clone()),
                error_category: None,
                error_message: None,
            },
            Err(e) => ChatResponse {
                ok: false,
                content: None,
                error_category: Some(e.category()),
                error_message: Some(e.user_message().to_string()),
            },
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let content = outcome?;
    println!("{}", content.trim());
    Ok(())
}
