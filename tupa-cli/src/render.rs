//! Terminal rendering of answers and reports.

use std::fmt::Write;

use tupa_rag::{HealthReport, HealthStatus, IndexStats, IngestReport, RagResponse, SettingsStatus};
use tupa_telemetry::SpanStore;

/// Format an answer with its confidence and sources.
pub fn response(response: &RagResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", response.answer);
    let _ = writeln!(
        out,
        "\nConfianza: {:.0}% · Tiempo: {:.2}s",
        response.confidence * 100.0,
        response.processing_time
    );
    if !response.sources.is_empty() {
        let _ = writeln!(out, "Fuentes:");
        for (i, source) in response.sources.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. [{}] (similitud {:.3}) {}",
                i + 1,
                source.source().unwrap_or("desconocida"),
                source.score,
                source.text.replace('\n', " ")
            );
        }
    }
    out
}

pub fn stats(index: &str, stats: &IndexStats) -> String {
    format!(
        "Índice: {index}\nVectores: {}\nDimensión: {}\nOcupación: {:.1}%",
        stats.total_vectors,
        stats.dimension,
        stats.fullness * 100.0
    )
}

pub fn health(report: &HealthReport) -> String {
    let status = match report.status {
        HealthStatus::Healthy => "saludable",
        HealthStatus::Unhealthy => "con fallas",
    };
    let mut out = format!(
        "Estado: {status}\nModelo de chat: {}\nModelo de embeddings: {}\nRevisado: {}",
        report.chat_model,
        report.embedding_model,
        report.timestamp.to_rfc3339()
    );
    if let Some(total) = report.total_vectors {
        let _ = write!(out, "\nVectores: {total}");
    }
    if let Some(error) = &report.error {
        let _ = write!(out, "\nError: {error}");
    }
    out
}

pub fn ingest(report: &IngestReport) -> String {
    format!(
        "{}: {} fragmentos, {} vectores indexados",
        report.source, report.chunks, report.upserted
    )
}

pub fn settings(status: &SettingsStatus) -> String {
    let mark = |ok: bool| if ok { "configurado" } else { "faltante" };
    format!(
        "OpenAI: {}\nPinecone: {}\nÍndice: {}\nModelo de chat: {}\nModelo de embeddings: {}",
        mark(status.openai_configured),
        mark(status.pinecone_configured),
        status.index_name,
        status.chat_model,
        status.embedding_model
    )
}

/// Stage timings of every traced query, in the order queries finished.
pub fn trace(spans: &SpanStore) -> String {
    let query_ids = spans.query_ids();
    if query_ids.is_empty() {
        return "Sin consultas registradas.".to_string();
    }
    let mut out = String::new();
    for query_id in query_ids {
        let _ = writeln!(out, "Consulta {query_id}");
        for span in spans.spans_for(&query_id) {
            let millis = span.duration_us as f64 / 1000.0;
            let _ = writeln!(out, "  {:<14} {millis:>9.1} ms", span.name);
        }
    }
    out
}
