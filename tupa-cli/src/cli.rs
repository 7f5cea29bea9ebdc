use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Ask questions about the TUPA administrative procedures catalog.
#[derive(Debug, Parser)]
#[command(name = "tupa", version, about)]
pub struct Cli {
    /// Secrets file checked before the environment.
    #[arg(long, global = true, default_value = ".streamlit/secrets.toml")]
    pub secrets: PathBuf,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Print per-stage timings for each answered query.
    #[arg(long, global = true, conflicts_with = "json_logs")]
    pub trace: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index extracted plain-text documents.
    Ingest {
        /// Text files to index.
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Source name recorded on the chunks (defaults to each file stem).
        #[arg(long)]
        source: Option<String>,
    },
    /// Answer one question.
    Ask {
        question: String,
        /// Print the response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Show index statistics.
    Stats,
    /// Check the index and the chat model.
    Health,
    /// Show which settings are configured.
    Status,
    /// Start an interactive session.
    Chat,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_ingest_with_source() {
        let cli = Cli::parse_from(["tupa", "ingest", "tupa.txt", "--source", "tupa_2024"]);
        match cli.command {
            Command::Ingest { files, source } => {
                assert_eq!(files, vec![PathBuf::from("tupa.txt")]);
                assert_eq!(source.as_deref(), Some("tupa_2024"));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.secrets, PathBuf::from(".streamlit/secrets.toml"));
        assert!(!cli.trace);
    }

    #[test]
    fn trace_excludes_json_logs() {
        assert!(Cli::parse_from(["tupa", "ask", "¿plazo?", "--trace"]).trace);
        assert!(Cli::try_parse_from(["tupa", "--trace", "--json-logs", "stats"]).is_err());
    }

    #[test]
    fn parses_ask_json() {
        let cli = Cli::parse_from(["tupa", "--json-logs", "ask", "¿horario?", "--json"]);
        assert!(cli.json_logs);
        assert!(matches!(
            cli.command,
            Command::Ask { ref question, json: true } if question == "¿horario?"
        ));
    }
}
