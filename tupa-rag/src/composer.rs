//! Answer composition: grounding prompt, generation, confidence, sources.
//!
//! Every path through [`AnswerComposer`] ends in a [`RagResponse`]. Failures
//! are recovered into fixed fallback answers and reported alongside the
//! response through [`QueryOutcome`], so callers can tell *why* an answer is
//! a fallback without the user-facing text changing.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::{ConfidenceWeights, RagConfig};
use crate::document::{RagResponse, RetrievedDocument};
use crate::error::RagError;
use crate::generation::{ChatMessage, GenerationParams, GenerativeModel};
use crate::prompt::{
    APOLOGY_ANSWER, NO_INFORMATION_ANSWER, SYSTEM_INSTRUCTION, build_context, build_prompt,
};

/// Marker appended to truncated source previews.
const ELLIPSIS: &str = "...";

/// Why a response is a fallback rather than a grounded answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum DegradedReason {
    /// The query could not be embedded.
    Embedding(String),
    /// The index search failed; treated as "nothing found".
    Search(String),
    /// The generative model call failed.
    Generation(String),
    /// The generative model did not answer before the deadline.
    GenerationTimeout(Duration),
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedReason::Embedding(msg) => write!(f, "embedding failed: {msg}"),
            DegradedReason::Search(msg) => write!(f, "search failed: {msg}"),
            DegradedReason::Generation(msg) => write!(f, "generation failed: {msg}"),
            DegradedReason::GenerationTimeout(after) => {
                write!(f, "generation timed out after {}ms", after.as_millis())
            }
        }
    }
}

/// The tagged result of answering one query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Grounded fragments were found and the model answered.
    Answered(RagResponse),
    /// Nothing cleared the similarity threshold; no generation call was made.
    NoGrounding(RagResponse),
    /// A stage failed and the response is a fallback.
    Degraded {
        /// What went wrong.
        reason: DegradedReason,
        /// The fallback response shown to the user.
        response: RagResponse,
    },
}

impl QueryOutcome {
    /// The user-facing response.
    pub fn response(&self) -> &RagResponse {
        match self {
            QueryOutcome::Answered(response) | QueryOutcome::NoGrounding(response) => response,
            QueryOutcome::Degraded { response, .. } => response,
        }
    }

    /// Consume the outcome, keeping only the user-facing response.
    pub fn into_response(self) -> RagResponse {
        match self {
            QueryOutcome::Answered(response) | QueryOutcome::NoGrounding(response) => response,
            QueryOutcome::Degraded { response, .. } => response,
        }
    }

    /// The failure reason, for degraded outcomes.
    pub fn degraded_reason(&self) -> Option<&DegradedReason> {
        match self {
            QueryOutcome::Degraded { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether a grounded answer was produced.
    pub fn is_answered(&self) -> bool {
        matches!(self, QueryOutcome::Answered(_))
    }
}

/// Compute `quality * mean(score) + sufficiency * min(n / top_k, 1)`,
/// clamped to `[0, 1]`. An empty set scores exactly 0.
pub fn confidence_score(
    documents: &[RetrievedDocument],
    top_k: usize,
    weights: ConfidenceWeights,
) -> f32 {
    if documents.is_empty() || top_k == 0 {
        return 0.0;
    }
    let mean = documents.iter().map(|d| d.score).sum::<f32>() / documents.len() as f32;
    let sufficiency = (documents.len() as f32 / top_k as f32).min(1.0);
    (weights.quality * mean + weights.sufficiency * sufficiency).clamp(0.0, 1.0)
}

/// Truncate `text` to `max_chars` characters, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

/// Builds grounded answers from retrieved fragments.
pub struct AnswerComposer {
    model: Arc<dyn GenerativeModel>,
    top_k: usize,
    weights: ConfidenceWeights,
    max_sources: usize,
    source_preview_chars: usize,
    params: GenerationParams,
    generation_timeout: Option<Duration>,
}

impl AnswerComposer {
    /// Create a composer calling `model`, tuned by `config`.
    pub fn new(model: Arc<dyn GenerativeModel>, config: &RagConfig) -> Self {
        Self {
            model,
            top_k: config.top_k,
            weights: config.confidence_weights,
            max_sources: config.max_sources,
            source_preview_chars: config.source_preview_chars,
            params: GenerationParams {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
            },
            generation_timeout: config.generation_timeout(),
        }
    }

    /// The generative model.
    pub fn model(&self) -> &Arc<dyn GenerativeModel> {
        &self.model
    }

    /// Confidence for a retrieval result set.
    pub fn confidence(&self, documents: &[RetrievedDocument]) -> f32 {
        confidence_score(documents, self.top_k, self.weights)
    }

    /// The top documents, with text shortened to previews.
    pub fn surface_sources(&self, documents: &[RetrievedDocument]) -> Vec<RetrievedDocument> {
        documents
            .iter()
            .take(self.max_sources)
            .map(|doc| RetrievedDocument {
                text: preview(&doc.text, self.source_preview_chars),
                ..doc.clone()
            })
            .collect()
    }

    /// Compose the response for `query` from `retrieved`.
    ///
    /// `received` is when the query arrived; it anchors `processing_time`.
    /// With no retrieved documents the model is not called.
    pub async fn compose(
        &self,
        query: &str,
        retrieved: Vec<RetrievedDocument>,
        received: Instant,
    ) -> QueryOutcome {
        if retrieved.is_empty() {
            warn!("no relevant documents found");
            return QueryOutcome::NoGrounding(no_information(received));
        }

        let context = build_context(&retrieved);
        let prompt = build_prompt(query, &context);
        let messages = [ChatMessage::system(SYSTEM_INSTRUCTION), ChatMessage::user(prompt)];

        let answer = match self.generate(&messages).await {
            Ok(answer) => answer,
            Err(reason) => {
                error!(%reason, "generation failed");
                return self.degraded(reason, received);
            }
        };

        let confidence = self.confidence(&retrieved);
        let sources = self.surface_sources(&retrieved);
        let processing_time = received.elapsed().as_secs_f64();
        info!(
            processing_time,
            confidence,
            source_count = sources.len(),
            "query answered"
        );

        QueryOutcome::Answered(RagResponse { answer, sources, confidence, processing_time })
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, DegradedReason> {
        let call = self
            .model
            .complete(messages, self.params)
            .instrument(info_span!("rag.generate", model = self.model.name()));

        let result = match self.generation_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| DegradedReason::GenerationTimeout(limit))?,
            None => call.await,
        };

        result
            .map(|answer| answer.trim().to_string())
            .map_err(|e: RagError| DegradedReason::Generation(e.to_string()))
    }

    /// A fallback response for a failed query.
    ///
    /// Search failures read as "no information"; every other failure gets
    /// the apology message. Both carry zero confidence and no sources.
    pub fn degraded(&self, reason: DegradedReason, received: Instant) -> QueryOutcome {
        let response = match reason {
            DegradedReason::Search(_) => no_information(received),
            _ => RagResponse {
                answer: APOLOGY_ANSWER.to_string(),
                sources: Vec::new(),
                confidence: 0.0,
                processing_time: received.elapsed().as_secs_f64(),
            },
        };
        QueryOutcome::Degraded { reason, response }
    }
}

fn no_information(received: Instant) -> RagResponse {
    RagResponse {
        answer: NO_INFORMATION_ANSWER.to_string(),
        sources: Vec::new(),
        confidence: 0.0,
        processing_time: received.elapsed().as_secs_f64(),
    }
}
