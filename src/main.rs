//! careline - CLI entry point

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use careline::{
    cli::{Args, Commands, Config},
    doctor::Doctor,
    graph::CareGraph,
    llm::{ChatModel, GroqClient, OfflineModel},
    logger,
    repl::{DisplayManager, ReplSession},
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.clone())?;

    let verbosity = args.verbosity();
    let level = verbosity.log_level().unwrap_or(config.logging.level.as_str());
    logger::init(level)?;

    match args.command_or_default() {
        Commands::Chat { patient } => run_chat(&config, patient, verbosity.show_details()).await?,
        Commands::Ask {
            message,
            patient,
            context,
        } => run_ask(&config, &message, patient.as_deref(), &context, verbosity.show_details()).await?,
        Commands::History { patient, limit } => show_history(&config, &patient, limit)?,
        Commands::Clear { patient } => clear_history(&config, &patient)?,
        Commands::Alerts { limit } => show_alerts(&config, limit)?,
        Commands::Patients { query } => list_patients(&config, query.as_deref())?,
        Commands::Config => show_config(&config),
        Commands::Doctor => run_doctor(&config).await,
    }

    Ok(())
}

/// Hosted model when an API key is configured, offline fallbacks otherwise
fn build_model(config: &Config) -> Result<Arc<dyn ChatModel>> {
    match &config.api_key {
        Some(key) => {
            let client = GroqClient::from_config(&config.llm, key)?;
            info!(model = client.model(), "using hosted model");
            Ok(Arc::new(client))
        }
        None => {
            warn!("GROQ_API_KEY not set, answering with built-in responses only");
            Ok(Arc::new(OfflineModel))
        }
    }
}

fn build_graph(config: &Config) -> Result<CareGraph> {
    Ok(CareGraph::from_config(build_model(config)?, config))
}

fn history_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".careline").join("history"))
}

async fn run_chat(config: &Config, patient: Option<String>, verbose: bool) -> Result<()> {
    let mut graph = build_graph(config)?;

    if let Some(id) = &patient {
        if graph.records().patient(id).is_none() {
            eprintln!("{} unknown patient '{}', chatting anyway", "Warning:".yellow(), id);
        }
    }

    let mut repl = ReplSession::new(patient, history_file(), verbose)?;
    repl.run(&mut graph, VERSION).await
}

async fn run_ask(
    config: &Config,
    message: &str,
    patient: Option<&str>,
    context: &str,
    verbose: bool,
) -> Result<()> {
    let mut graph = build_graph(config)?;
    let mut display = DisplayManager::new();

    let started = std::time::Instant::now();
    let state = graph.process_message(message, patient, context).await;
    display.show_reply(&state, started.elapsed().as_millis() as u64, verbose);

    Ok(())
}

fn show_history(config: &Config, patient: &str, limit: usize) -> Result<()> {
    let mut graph = build_graph(config)?;
    let history = graph.conversation_history(patient);
    let start = history.len().saturating_sub(limit);
    DisplayManager::new().show_history(patient, &history[start..]);
    Ok(())
}

fn clear_history(config: &Config, patient: &str) -> Result<()> {
    let mut graph = build_graph(config)?;
    graph.clear_patient(patient)?;
    println!("{} Conversation history cleared for {}", "✓".green(), patient);
    Ok(())
}

fn show_alerts(config: &Config, limit: usize) -> Result<()> {
    let graph = build_graph(config)?;
    DisplayManager::new().show_alerts(&graph.alerts().recent_alerts(limit));
    Ok(())
}

fn list_patients(config: &Config, query: Option<&str>) -> Result<()> {
    let graph = build_graph(config)?;
    let records = graph.records();
    let patients = records.search_patients(query.unwrap_or(""));

    if patients.is_empty() {
        println!("{}", "No matching patients.".yellow());
        return Ok(());
    }

    let display = DisplayManager::new();
    display.show_section(&format!("Patients ({}):", patients.len()));
    for patient in patients {
        let age = patient
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        let upcoming = records.patient_appointments(&patient.id).len();
        println!(
            "  {:<14} {:<20} age {:<4} {} appointment(s)",
            patient.id.cyan(),
            patient.name,
            age,
            upcoming
        );
    }
    println!();

    Ok(())
}

fn show_config(config: &Config) {
    let rows: Vec<(String, String)> = config
        .summary()
        .into_iter()
        .map(|(label, value)| (label.to_string(), value))
        .collect();
    let display = DisplayManager::new();
    display.show_table("careline configuration:", &rows);

    for issue in config.issues() {
        display.show_warning(&issue);
    }
}

async fn run_doctor(config: &Config) {
    let checks = Doctor::new(config).run_diagnostics().await;
    Doctor::display_results(&checks);
    std::process::exit(if Doctor::overall_status(&checks) { 0 } else { 1 });
}
