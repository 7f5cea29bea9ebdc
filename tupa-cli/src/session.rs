//! Interactive chat session: line parsing and the reset flow.

use crate::guard::{ResetDecision, ResetGuard};

/// What the REPL should do with one input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Answer the question.
    Ask(String),
    /// Show index statistics.
    Stats,
    /// Run a health check.
    Health,
    /// Print the command list.
    Help,
    /// First `/reset`: ask for confirmation.
    ConfirmReset,
    /// Second `/reset`: delete every vector.
    Reset,
    /// Leave the session.
    Exit,
    /// Blank line or unknown command.
    Ignore(Option<String>),
}

/// Commands understood by the chat session.
pub const HELP: &str = "\
Comandos:
  /stats   estadísticas del índice
  /health  verificar el estado del sistema
  /reset   eliminar todos los vectores (pide confirmación)
  /help    mostrar esta ayuda
  /salir   terminar la sesión
Cualquier otro texto se envía como consulta.";

/// Per-session state of the chat loop.
#[derive(Debug, Default)]
pub struct ChatSession {
    guard: ResetGuard,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide what to do with `line`.
    ///
    /// Every input other than `/reset` disarms a pending reset.
    pub fn handle(&mut self, line: &str) -> Action {
        let line = line.trim();
        if line == "/reset" {
            return match self.guard.request() {
                ResetDecision::Armed => Action::ConfirmReset,
                ResetDecision::Execute => Action::Reset,
            };
        }
        self.guard.disarm();

        match line {
            "" => Action::Ignore(None),
            "/stats" => Action::Stats,
            "/health" => Action::Health,
            "/help" => Action::Help,
            "/salir" | "/exit" | "/quit" => Action::Exit,
            command if command.starts_with('/') => Action::Ignore(Some(command.to_string())),
            question => Action::Ask(question.to_string()),
        }
    }

    pub fn reset_pending(&self) -> bool {
        self.guard.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn questions_and_commands() {
        let mut session = ChatSession::new();
        assert_eq!(
            session.handle("  ¿Qué requisitos hay?  "),
            Action::Ask("¿Qué requisitos hay?".into())
        );
        assert_eq!(session.handle("/stats"), Action::Stats);
        assert_eq!(session.handle("/salir"), Action::Exit);
        assert_eq!(session.handle(""), Action::Ignore(None));
        assert_eq!(session.handle("/borrar"), Action::Ignore(Some("/borrar".into())));
    }

    #[test]
    fn reset_needs_two_consecutive_requests() {
        let mut session = ChatSession::new();
        assert_eq!(session.handle("/reset"), Action::ConfirmReset);
        assert!(session.reset_pending());
        assert_eq!(session.handle("/reset"), Action::Reset);
        assert!(!session.reset_pending());
    }

    #[test]
    fn any_other_input_disarms_reset() {
        let mut session = ChatSession::new();
        session.handle("/reset");
        session.handle("¿horario?");
        assert!(!session.reset_pending());
        assert_eq!(session.handle("/reset"), Action::ConfirmReset);

        session.handle("   ");
        assert_eq!(session.handle("/reset"), Action::ConfirmReset);
    }
}
