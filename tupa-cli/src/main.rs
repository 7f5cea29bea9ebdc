use clap::Parser;
use tupa_cli::{Cli, app, render};
use tupa_telemetry::SpanStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let spans = SpanStore::new();
    let trace = cli.trace;
    if trace {
        tupa_telemetry::init_with_capture("tupa-cli", spans.clone())?;
    } else if cli.json_logs {
        tupa_telemetry::init_json_telemetry("tupa-cli")?;
    } else {
        tupa_telemetry::init_telemetry("tupa-cli")?;
    }

    let result = app::run(cli).await;
    if trace {
        println!("{}", render::trace(&spans));
    }
    result
}
