use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{Id, Subscriber};
use tracing_subscriber::{Layer, layer::Context, registry::LookupSpan};

/// Field that groups spans belonging to one query.
pub const QUERY_ID_FIELD: &str = "query.id";

/// A closed span as captured by [`SpanCaptureLayer`].
#[derive(Debug, Clone, Serialize)]
pub struct CapturedSpan {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Wall time between creation and close, in microseconds.
    pub duration_us: u64,
    pub fields: HashMap<String, serde_json::Value>,
}

impl CapturedSpan {
    /// The query this span belongs to, own or inherited.
    pub fn query_id(&self) -> Option<&str> {
        self.fields.get(QUERY_ID_FIELD).and_then(|v| v.as_str())
    }
}

/// Shared storage for captured spans, keyed by query ID.
///
/// Spans outside any query are kept under the empty key.
#[derive(Debug, Clone, Default)]
pub struct SpanStore {
    spans: Arc<RwLock<HashMap<String, Vec<CapturedSpan>>>>,
    order: Arc<RwLock<Vec<String>>>,
}

impl SpanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans recorded for `query_id`, in close order.
    pub fn spans_for(&self, query_id: &str) -> Vec<CapturedSpan> {
        self.spans.read().ok().and_then(|spans| spans.get(query_id).cloned()).unwrap_or_default()
    }

    /// Query IDs seen so far, in first-close order.
    pub fn query_ids(&self) -> Vec<String> {
        self.order.read().map(|order| order.clone()).unwrap_or_default()
    }

    /// Every captured span.
    pub fn all(&self) -> Vec<CapturedSpan> {
        self.spans
            .read()
            .map(|spans| spans.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut spans) = self.spans.write() {
            spans.clear();
        }
        if let Ok(mut order) = self.order.write() {
            order.clear();
        }
    }

    fn add(&self, span: CapturedSpan) {
        let key = span.query_id().unwrap_or_default().to_string();
        if let Ok(mut spans) = self.spans.write() {
            let entry = spans.entry(key.clone()).or_default();
            if entry.is_empty() && !key.is_empty() {
                if let Ok(mut order) = self.order.write() {
                    order.push(key);
                }
            }
            entry.push(span);
        }
    }
}

/// A tracing layer that records closed spans into a [`SpanStore`].
///
/// Child spans inherit `query.id` from their nearest ancestor so a whole
/// query's stages can be read back together.
pub struct SpanCaptureLayer {
    store: SpanStore,
}

impl SpanCaptureLayer {
    pub fn new(store: SpanStore) -> Self {
        Self { store }
    }
}

#[derive(Clone)]
struct SpanFields(HashMap<String, serde_json::Value>);

struct Opened(Instant);

impl<S> Layer<S> for SpanCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &tracing::span::Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };

        let mut visitor = JsonVisitor::default();
        attrs.record(&mut visitor);
        let mut fields = visitor.0;

        if !fields.contains_key(QUERY_ID_FIELD) {
            let inherited = span.parent().and_then(|parent| {
                let extensions = parent.extensions();
                extensions.get::<SpanFields>().and_then(|f| f.0.get(QUERY_ID_FIELD).cloned())
            });
            if let Some(query_id) = inherited {
                fields.insert(QUERY_ID_FIELD.to_string(), query_id);
            }
        }

        let mut extensions = span.extensions_mut();
        extensions.insert(Opened(Instant::now()));
        extensions.insert(SpanFields(fields));
    }

    fn on_record(&self, id: &Id, values: &tracing::span::Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else { return };
        let mut extensions = span.extensions_mut();
        if let Some(fields) = extensions.get_mut::<SpanFields>() {
            let mut visitor = JsonVisitor::default();
            values.record(&mut visitor);
            fields.0.extend(visitor.0);
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else { return };
        let extensions = span.extensions();
        let duration_us = extensions
            .get::<Opened>()
            .map(|opened| opened.0.elapsed().as_micros() as u64)
            .unwrap_or_default();
        let fields = extensions.get::<SpanFields>().map(|f| f.0.clone()).unwrap_or_default();

        self.store.add(CapturedSpan {
            name: span.metadata().name().to_string(),
            parent: span.parent().map(|p| p.metadata().name().to_string()),
            duration_us,
            fields,
        });
    }
}

#[derive(Default)]
struct JsonVisitor(HashMap<String, serde_json::Value>);

impl tracing::field::Visit for JsonVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), serde_json::Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), serde_json::json!(value));
    }
}
