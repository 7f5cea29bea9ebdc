//! Fixed answer templates and user-facing fallback messages.
//!
//! The instruction template is policy: callers cannot edit it.

use crate::document::RetrievedDocument;

/// Context text used when retrieval found nothing.
pub const NO_DOCUMENTS_CONTEXT: &str =
    "No se encontraron documentos relevantes en la base de datos.";

/// Answer returned when no fragment cleared the similarity threshold.
pub const NO_INFORMATION_ANSWER: &str = "Lo siento, no encontré información específica sobre tu \
consulta en la base de datos del TUPA. ¿Podrías reformular tu pregunta o ser más específico?";

/// Answer returned when the query could not be processed.
pub const APOLOGY_ANSWER: &str =
    "Lo siento, hubo un error procesando tu consulta. Por favor, intenta nuevamente.";

/// System message sent with every generation call.
pub const SYSTEM_INSTRUCTION: &str = "Eres un asistente especializado en procedimientos \
administrativos del TUPA del Gobierno Regional del Cusco. Responde basándote únicamente en la \
información proporcionada.";

/// Join retrieved fragments in ranking order, labelling each one.
pub fn build_context(documents: &[RetrievedDocument]) -> String {
    if documents.is_empty() {
        return NO_DOCUMENTS_CONTEXT.to_string();
    }

    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let source = doc.source().map(|s| format!(" (Fuente: {s})")).unwrap_or_default();
            format!("Documento {}{source}:\n{}\n", i + 1, doc.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Wrap the question and context in the answering instructions.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "Eres un asistente especializado en el TUPA (Texto Único de Procedimientos \
Administrativos) del Gobierno Regional del Cusco.

Tu trabajo es responder preguntas sobre trámites administrativos basándote ÚNICAMENTE en la \
información proporcionada en el contexto.

INSTRUCCIONES IMPORTANTES:
1. Responde SOLO basándote en la información del contexto proporcionado
2. Si la información no está en el contexto, indica claramente que no tienes esa información específica
3. Sé claro, conciso y útil en tus respuestas
4. Menciona requisitos, plazos, costos y procedimientos cuando sea relevante
5. Si hay información sobre ubicaciones u horarios, inclúyela
6. Mantén un tono profesional pero amigable

CONTEXTO (Información oficial del TUPA):
{context}

PREGUNTA DEL USUARIO:
{query}

RESPUESTA:"
    )
}
