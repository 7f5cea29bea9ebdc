//! Generative model trait used to compose grounded answers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions fixing the model's behavior.
    System,
    /// The end user's turn.
    User,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

/// A text-completion model.
///
/// # Example
///
/// ```rust,ignore
/// use tupa_rag::{ChatMessage, GenerationParams, GenerativeModel};
///
/// let params = GenerationParams { max_tokens: 5, temperature: 0.0 };
/// let answer = model.complete(&[ChatMessage::user("Hola")], params).await?;
/// ```
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, for logs and health reporting.
    fn name(&self) -> &str;

    /// Complete the conversation and return the assistant's reply text.
    async fn complete(&self, messages: &[ChatMessage], params: GenerationParams) -> Result<String>;
}
