// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat request types

use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOptions {
    #[serde(default, alias = "max_tokens", skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// A chat call as issued by the UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model id; the configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<ChatOptions>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: None,
            messages,
            options: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Requested model id, ignoring blank values
    pub fn model_id(&self) -> Option<&str> {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(WardenError::InvalidRequest(
                "at least one message is required".to_string(),
            ));
        }
        if self.messages.iter().all(|m| m.role == Role::System) {
            return Err(WardenError::InvalidRequest(
                "at least one user or assistant message is required".to_string(),
            ));
        }
        if let Some(options) = &self.options {
            if options.max_tokens == Some(0) {
                return Err(WardenError::InvalidRequest(
                    "maxTokens must be positive".to_string(),
                ));
            }
            if let Some(t) = options.temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(WardenError::InvalidRequest(format!(
                        "temperature {} is outside 0.0-2.0",
                        t
                    )));
                }
            }
        }
        Ok(())
    }
}

/// What is actually sent to the model server
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Build from a chat request, capping `max_tokens` at the context size
    pub fn from_chat(request: &ChatRequest, max_context_tokens: u32) -> Self {
        let options = request.options.clone().unwrap_or_default();
        Self {
            messages: request.messages.clone(),
            max_tokens: options.max_tokens.map(|n| n.min(max_context_tokens)),
            temperature: options.temperature,
        }
    }
}
