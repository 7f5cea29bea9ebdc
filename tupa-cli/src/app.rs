//! Wiring of the production backends and command execution.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};
use tupa_rag::openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
use tupa_rag::pinecone::PineconeIndex;
use tupa_rag::{QueryOutcome, RagSystem, SecretsFile, Settings};

use crate::cli::{Cli, Command};
use crate::render;
use crate::session::{Action, ChatSession, HELP};

/// Connect OpenAI and Pinecone as configured by `settings`.
pub async fn build_system(settings: &Settings) -> Result<RagSystem> {
    let embedder = OpenAIEmbeddingProvider::new(settings.openai_api_key.as_str())?
        .with_model(settings.embedding_model.as_str())
        .with_dimensions(settings.rag.embedding_dimension);
    let model = OpenAIChatModel::new(settings.openai_api_key.as_str())?
        .with_model(settings.chat_model.as_str());
    let index = PineconeIndex::new(
        settings.pinecone_api_key.as_str(),
        settings.pinecone_environment.as_str(),
    )?;

    RagSystem::builder()
        .config(settings.rag.clone())
        .index_name(settings.pinecone_index_name.as_str())
        .embedding_provider(Arc::new(embedder))
        .vector_index(Arc::new(index))
        .generative_model(Arc::new(model))
        .build()
        .await
        .with_context(|| format!("failed to open index '{}'", settings.pinecone_index_name))
}

/// Resolve settings from `secrets` and the environment.
pub fn load_settings(secrets: &Path) -> Result<Settings> {
    let secrets = SecretsFile::load(secrets)?;
    Ok(Settings::from_env_with(&secrets)?)
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli.secrets)?;
    if let Command::Status = cli.command {
        println!("{}", render::settings(&settings.status()));
        return Ok(());
    }

    let system = build_system(&settings).await?;
    match cli.command {
        Command::Ingest { files, source } => {
            for file in &files {
                let report = ingest_file(&system, file, source.as_deref()).await?;
                println!("{}", render::ingest(&report));
            }
        }
        Command::Ask { question, json } => {
            let outcome = system.query(&question).await;
            log_degraded(&outcome);
            let response = outcome.into_response();
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                println!("{}", render::response(&response));
            }
        }
        Command::Stats => {
            let stats = system.stats().await?;
            println!("{}", render::stats(system.store().index_name(), &stats));
        }
        Command::Health => println!("{}", render::health(&system.health_check().await)),
        Command::Chat => chat(&system).await?,
        Command::Status => {}
    }
    Ok(())
}

/// Index one text file under `source` or the file stem.
pub async fn ingest_file(
    system: &RagSystem,
    path: &Path,
    source: Option<&str>,
) -> Result<tupa_rag::IngestReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let source = match source {
        Some(source) => source.to_string(),
        None => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(str::to_string)
            .with_context(|| format!("cannot derive a source name from {}", path.display()))?,
    };
    Ok(system.ingest_text(&text, &source).await?)
}

fn log_degraded(outcome: &QueryOutcome) {
    if let Some(reason) = outcome.degraded_reason() {
        warn!(%reason, "answered with fallback");
    }
}

/// Carry out one session action. Returns `None` when the session ends.
pub async fn execute(system: &RagSystem, action: Action) -> Result<Option<String>> {
    let output = match action {
        Action::Ask(question) => {
            let outcome = system.query(&question).await;
            log_degraded(&outcome);
            render::response(outcome.response())
        }
        Action::Stats => {
            let stats = system.stats().await?;
            render::stats(system.store().index_name(), &stats)
        }
        Action::Health => render::health(&system.health_check().await),
        Action::Help => HELP.to_string(),
        Action::ConfirmReset => format!(
            "Esto eliminará TODOS los vectores del índice '{}'. \
             Escribe /reset otra vez para confirmar.",
            system.store().index_name()
        ),
        Action::Reset => {
            system.store().delete_all().await?;
            "Base de datos vaciada.".to_string()
        }
        Action::Ignore(Some(command)) => format!("Comando desconocido: {command}. Usa /help."),
        Action::Ignore(None) => String::new(),
        Action::Exit => return Ok(None),
    };
    Ok(Some(output))
}

async fn chat(system: &RagSystem) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut session = ChatSession::new();
    println!("Asistente TUPA. Escribe tu consulta o /help.");

    loop {
        let line = match editor.readline("tupa> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        if !line.trim().is_empty() {
            let _ = editor.add_history_entry(line.as_str());
        }

        match execute(system, session.handle(&line)).await {
            Ok(Some(output)) if output.is_empty() => {}
            Ok(Some(output)) => println!("{output}\n"),
            Ok(None) => break,
            Err(e) => eprintln!("Error: {e:#}\n"),
        }
    }

    info!(processed_queries = system.processed_queries(), "chat session ended");
    Ok(())
}
