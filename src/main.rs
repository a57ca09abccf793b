use nlsql_engine::config::TranslatorConfig;
use nlsql_engine::orchestrator::Translator;
use nlsql_engine::schema::{SchemaCatalog, SchemaSource, TableSchema};
use nlsql_engine::translator::LlmTranslator;

use anyhow::Result;
use chrono::{Duration, Local};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_COMMANDS: [&str; 6] = ["exit", "quit", "q", ":q", ":exit", ":quit"];

#[derive(Parser)]
#[command(name = "nlsql")]
#[command(about = "Convert natural language questions to SQL queries")]
#[command(version)]
struct Args {
    /// Natural language query to convert to SQL (interactive mode when omitted)
    query: Option<String>,

    /// Path to a file containing the database schema (JSON or DDL)
    #[arg(short, long)]
    schema_file: Option<PathBuf>,

    /// Table metadata file ({"tables": [...]}) to look `--table` up in
    #[arg(long, requires = "table")]
    catalog: Option<PathBuf>,

    /// Table to use from `--catalog`
    #[arg(long, requires = "catalog")]
    table: Option<String>,

    /// Show intents, entities and date helpers alongside the SQL
    #[arg(short, long)]
    verbose: bool,

    /// Run in interactive mode
    #[arg(short, long)]
    interactive: bool,

    /// Try the LLM translator (OPENAI_API_KEY) before the rule engine
    #[arg(short = 'm', long)]
    use_llm: bool,

    /// Upper bound on the LLM call in milliseconds
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let schema = load_schema(&args)?;
    let translator = build_translator(&args);

    match (&args.query, args.interactive) {
        (Some(query), false) => {
            process_query(&translator, query, &schema, args.verbose).await;
        }
        _ => {
            interactive_mode(&translator, &schema, args.verbose).await?;
        }
    }

    Ok(())
}

fn load_schema(args: &Args) -> Result<SchemaSource> {
    if let (Some(catalog), Some(table)) = (&args.catalog, &args.table) {
        let catalog = SchemaCatalog::load(catalog)
            .map_err(|e| anyhow::anyhow!("Failed to load catalog {:?}: {}", catalog, e))?;
        return Ok(SchemaSource::Structured(catalog.table(table)?.clone()));
    }

    match &args.schema_file {
        Some(path) => SchemaSource::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load schema file {:?}: {}", path, e)),
        None => Ok(SchemaSource::Structured(TableSchema::threat_aggregates())),
    }
}

fn build_translator(args: &Args) -> Translator {
    let config = TranslatorConfig::default()
        .with_collaborator_enabled(args.use_llm)
        .with_timeout_ms(args.timeout_ms);
    let translator = Translator::new(config);

    if !args.use_llm {
        return translator;
    }

    match LlmTranslator::from_env() {
        Ok(llm) => {
            info!("Using LLM translator with rule engine fallback");
            translator.with_collaborator(Arc::new(llm))
        }
        Err(e) => {
            warn!("⚠️  {}; using the rule engine only", e);
            translator
        }
    }
}

async fn process_query(translator: &Translator, query: &str, schema: &SchemaSource, verbose: bool) -> String {
    let translation = translator.translate(query, schema).await;

    if verbose {
        let (intents, entities) = translator.analyze(query);
        println!("\nNatural Language Query:");
        println!("{}", query);
        println!("\nIntents: {}", intents);
        println!(
            "Entities: {}",
            serde_json::to_string(&entities).unwrap_or_else(|_| format!("{:?}", entities))
        );
        match &translation.fallback_reason {
            Some(reason) => println!("Source: rule engine ({})", reason),
            None => println!("Source: {:?}", translation.source),
        }
        println!("\nGenerated SQL Query:");
    }

    println!("{}", translation.sql);

    if verbose {
        let today = Local::now().date_naive();
        println!("\nCurrent date: {}", today.format("%Y-%m-%d"));
        println!("One week ago: {}", (today - Duration::days(7)).format("%Y-%m-%d"));
    }

    translation.sql
}

async fn interactive_mode(translator: &Translator, schema: &SchemaSource, verbose: bool) -> Result<()> {
    println!("Natural Language to SQL Interactive Mode");
    println!("Enter your queries, type 'exit' or 'quit' to leave");
    if let Some(table) = schema.table_name() {
        println!("Using schema for table: {}", table);
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut history: Vec<(String, String)> = Vec::new();

    loop {
        println!("\n{}", "-".repeat(50));
        print!("Enter your natural language query: ");
        io::stdout().flush()?;

        let query = match lines.next() {
            Some(line) => line?,
            None => break,
        };

        if EXIT_COMMANDS.contains(&query.trim().to_lowercase().as_str()) {
            println!("Exiting interactive mode.");
            break;
        }

        let sql = process_query(translator, &query, schema, verbose).await;
        history.push((query, sql));
    }

    if verbose && !history.is_empty() {
        println!("\nSession Summary:");
        for (i, (nl_query, sql)) in history.iter().enumerate() {
            println!("\n{}. Natural Language: {}", i + 1, nl_query);
            println!("   SQL: {}", sql);
        }
    }

    Ok(())
}
