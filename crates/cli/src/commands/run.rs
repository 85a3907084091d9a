//! `convoquery run` — answer every query for every session of a message log.

use crate::{export, ingest, progress};
use convoquery_config::AppConfig;
use convoquery_engine::Orchestrator;
use convoquery_providers::OpenAiCompatService;
use std::path::PathBuf;

pub struct RunArgs {
    pub messages: PathBuf,
    pub queries: PathBuf,
    pub output: Option<PathBuf>,
    pub concurrency: Option<usize>,
    pub api_key: Option<String>,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(k) = args.concurrency {
        config.scheduler.max_concurrent = k;
        config.validate()?;
    }
    let Some(credential) = resolve_credential(args.api_key, &config) else {
        return Err(format!(
            "No API key configured. Pass --api-key, set CONVOQUERY_API_KEY or \
             OPENAI_API_KEY, or add api_key to {}",
            AppConfig::config_dir().join("config.toml").display()
        )
        .into());
    };
    let delimiter = u8::try_from(config.input.delimiter)
        .map_err(|_| "input.delimiter must be a single ASCII character")?;

    let messages = ingest::read_messages(&args.messages, config.input.delimiter)?;
    let queries = ingest::read_queries(&args.queries, config.input.delimiter)?;

    println!();
    println!("  Model:     {}", config.model);
    println!("  Endpoint:  {}", config.base_url);
    println!("  Messages:  {}", messages.len());
    println!("  Queries:   {}", queries.len());
    println!(
        "  Slots:     {} (wait {}s)",
        config.scheduler.max_concurrent,
        config.scheduler.slot_wait().as_secs()
    );
    println!();

    let orchestrator = Orchestrator::new(config.clone(), OpenAiCompatService::connector(&config));
    let printer = progress::spawn(&orchestrator.events());

    let outcome = orchestrator
        .run(messages, queries.clone(), Some(credential.as_str()))
        .await;
    // RunFinished is always published, so the printer ends either way.
    let _ = printer.await;
    let report = outcome?;

    match &args.output {
        Some(path) => {
            export::write_results_to(path, &report.results, &queries, delimiter)?;
            println!();
            println!("  Results written to {}", path.display());
        }
        None => {
            println!();
            print!("{}", export::render_table(&report.results, &queries));
        }
    }

    let stats = report.stats;
    println!();
    println!(
        "  {} session(s), {} answer(s): {} extracted, {} skipped",
        stats.sessions,
        stats.resolved(),
        stats.extracted,
        stats.skipped
    );
    println!(
        "  {} remote call(s): {} answered, {} failed",
        stats.remote_calls(),
        stats.completed,
        stats.failed
    );
    if stats.rate_limited > 0 {
        println!("  Rate limited {} time(s)", stats.rate_limited);
    }
    println!();

    Ok(())
}

/// The `--api-key` flag wins over the config, which already carries the
/// environment overrides. Blank values count as missing.
fn resolve_credential(flag: Option<String>, config: &AppConfig) -> Option<String> {
    let present = |k: &String| !k.trim().is_empty();
    flag.filter(present)
        .or_else(|| config.api_key.clone().filter(present))
}
