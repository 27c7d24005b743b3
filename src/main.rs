use astro::agent::{Agent, ChartRequest};
use astro::config::{self, AgentConfig};
use astro::execution::DataLayer;
use astro::llm::DEFAULT_MODEL;
use astro::semantic::{load_from_file, SemanticManifest};

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const MAX_BAR_WIDTH: usize = 50;

#[derive(Parser)]
#[command(name = "astro")]
#[command(about = "Query your data warehouse using natural language.")]
#[command(version)]
struct Args {
    /// Question to ask before entering interactive chat
    #[arg(long)]
    ask: Option<String>,

    /// Path to DuckDB file (default: auto-detect warehouse/data.duckdb)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Path to the semantic manifest (or set ASTRO_MANIFEST)
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Gemini model to use
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Model calls allowed per question
    #[arg(long, default_value_t = AgentConfig::default().max_turns)]
    max_turns: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let env_file = config::load_dotenv_upwards(&cwd);

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("astro=info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    if let Some(path) = env_file {
        info!("Loaded environment from {}", path.display());
    }

    let args = Args::parse();

    let db_path = config::resolve_warehouse(args.db, &cwd)?;
    let manifest = match config::resolve_manifest(args.manifest, &cwd) {
        Some(path) => load_from_file(&path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?,
        None => {
            warn!("No semantic manifest found; running without semantic context");
            SemanticManifest::default()
        }
    };

    let api_key = config::api_key_from_env()?;
    let backend = config::backend_from_env();
    let agent_config = AgentConfig::default().with_max_turns(args.max_turns);

    let data = DataLayer::open(&db_path, Arc::new(manifest))?;
    eprintln!("\n  astro  {}  ({})", db_path.display(), args.model);

    let outcome = run(&data, api_key, args.model, backend, agent_config, args.ask).await;
    data.close()?;
    outcome
}

async fn run(
    data: &DataLayer,
    api_key: String,
    model: String,
    backend: astro::llm::Backend,
    agent_config: AgentConfig,
    first_question: Option<String>,
) -> Result<()> {
    let mut agent = Agent::new(data, api_key, model, backend, agent_config).await?;
    eprintln!("  Connected.");

    if let Some(question) = first_question {
        eprintln!("\n  Analyzing: {}\n", question);
        answer(&mut agent, &question).await;
    }

    chat_loop(&mut agent).await
}

async fn chat_loop(agent: &mut Agent<'_>) -> Result<()> {
    eprintln!("\n  Type a question, or 'quit' to exit.\n");
    let stdin = io::stdin();

    loop {
        eprint!("astro> ");
        io::stderr().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        eprintln!();
        answer(agent, question).await;
    }

    eprintln!("  Bye.");
    Ok(())
}

/// Ask one question, print the answer, sources and any queued charts.
///
/// Ctrl-C abandons the question; the agent discards the partial exchange.
async fn answer(agent: &mut Agent<'_>, question: &str) {
    let result = tokio::select! {
        result = agent.ask(question) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match result {
        Some(Ok(text)) => {
            println!("\n{}\n", text);
            for chart in agent.take_charts() {
                eprintln!("{}", render_chart(&chart));
            }
            if !agent.sources().is_empty() {
                eprintln!("  Sources:");
                for source in agent.sources() {
                    eprintln!("    - {}", source);
                }
                eprintln!();
            }
        }
        Some(Err(e)) => eprintln!("  Error: {}\n", e),
        None => eprintln!("\n  (interrupted; ask another question or 'quit')\n"),
    }
}

/// Horizontal bar rendering; every chart type falls back to bars.
fn render_chart(chart: &ChartRequest) -> String {
    let mut out = String::new();
    if !chart.title.is_empty() {
        out.push_str(&format!("  {}\n", chart.title));
    }

    let max = chart.y_data.iter().cloned().fold(0.0_f64, f64::max);
    let labels: Vec<String> = (0..chart.y_data.len())
        .map(|i| chart.x_data.get(i).cloned().unwrap_or_else(|| (i + 1).to_string()))
        .collect();
    let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    for (label, value) in labels.iter().zip(&chart.y_data) {
        let len = if max > 0.0 {
            ((value.max(0.0) / max) * MAX_BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        out.push_str(&format!(
            "  {:>width$} | {} {}\n",
            label,
            "█".repeat(len),
            value,
            width = width
        ));
    }

    if !chart.y_label.is_empty() || !chart.x_label.is_empty() {
        out.push_str(&format!("  ({} by {})\n", chart.y_label, chart.x_label));
    }
    out
}
