use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};

use ledgerscan::config::Config;
use ledgerscan::storage::{FileRegistry, ModelRegistry};
use ledgerscan::{Entry, EntryEncoder, ModelTrainer, ScoringEngine, Verdict};

#[derive(Parser)]
#[command(name = "ledgerscan")]
#[command(author, version, about = "Isolation-forest anomaly scoring for ledger entries")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from a JSON file of entries
    Train {
        /// JSON file with an array of entries ("-" for stdin)
        input: PathBuf,

        /// Model identifier to save under
        #[arg(short, long, default_value = "default")]
        id: String,

        /// Number of trees (overrides config)
        #[arg(long)]
        trees: Option<usize>,

        /// Subsample size per tree (overrides config)
        #[arg(long)]
        sample_size: Option<usize>,

        /// Expected anomaly proportion (overrides config)
        #[arg(long)]
        contamination: Option<f64>,

        /// Random seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Print the training summary as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Score entries against a stored model
    Score {
        /// JSON file with one entry or an array ("-" or omitted for stdin)
        input: Option<PathBuf>,

        /// Model identifier
        #[arg(short, long, default_value = "default")]
        id: String,

        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print the feature vectors for entries
    Encode {
        /// JSON file with one entry or an array ("-" or omitted for stdin)
        input: Option<PathBuf>,

        /// Use the schema stored with this model instead of the config
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List stored models
    Models {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Delete a stored model and its backups
    Delete {
        /// Model identifier
        id: String,

        /// Confirm the action
        #[arg(long)]
        yes: bool,
    },

    /// Generate default configuration file
    GenConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Table row for stored models
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Trained")]
    trained: String,
    #[tabled(rename = "Rows")]
    rows: u64,
    #[tabled(rename = "Trees")]
    trees: usize,
    #[tabled(rename = "Schema")]
    schema: u32,
    #[tabled(rename = "Threshold")]
    threshold: String,
}

/// One line of `score` output
#[derive(Serialize)]
#[serde(untagged)]
enum ScoreOutput {
    Verdict(Verdict),
    Rejected { error: String },
}

pub fn run_command(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default()?,
    };

    match cli.command {
        Commands::Train {
            input,
            id,
            trees,
            sample_size,
            contamination,
            seed,
            json,
        } => {
            let mut model_config = config.model.clone();
            if let Some(trees) = trees {
                model_config.num_trees = trees;
            }
            if let Some(size) = sample_size {
                model_config.sample_size = Some(size);
            }
            if let Some(rate) = contamination {
                model_config.contamination = rate;
            }
            if let Some(seed) = seed {
                model_config.seed = Some(seed);
            }
            cmd_train(&config, model_config, &input, &id, json)
        }
        Commands::Score { input, id, pretty } => cmd_score(&config, input.as_deref(), &id, pretty),
        Commands::Encode { input, model } => cmd_encode(&config, input.as_deref(), model.as_deref()),
        Commands::Models { format } => cmd_models(&config, &format),
        Commands::Delete { id, yes } => cmd_delete(&config, &id, yes),
        Commands::GenConfig { output } => cmd_gen_config(output),
    }
}

fn registry(config: &Config) -> FileRegistry {
    FileRegistry::with_config(config.registry.clone())
}

/// Read entries from a file, or stdin for `None` / `-`
fn read_entries(input: Option<&Path>) -> Result<Vec<Entry>> {
    let text = match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read entries from {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read entries from stdin")?;
            buf
        }
    };

    Entry::parse_many(&text).context("Failed to parse entries JSON")
}

fn cmd_train(
    config: &Config,
    model_config: ledgerscan::ModelConfig,
    input: &Path,
    id: &str,
    json: bool,
) -> Result<()> {
    let entries = read_entries(Some(input))?;
    let schema = config.feature_schema()?;
    let trainer = ModelTrainer::new(model_config, schema);

    let registry = registry(config);
    registry.init().with_context(|| {
        format!("Failed to initialize model directory {}", registry.data_dir().display())
    })?;

    let (_, summary) = trainer
        .train_and_save(&entries, &registry, id)
        .with_context(|| format!("Training model '{}' failed", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("{} {}", "Trained model:".green().bold(), id);
    println!("Rows:           {}", summary.rows);
    println!("Trees:          {}", summary.num_trees);
    println!("Sample size:    {}", summary.sample_size);
    println!("Seed:           {}", summary.seed);
    println!("Contamination:  {}", summary.contamination);
    println!("Threshold:      {:.4}", summary.threshold);
    println!(
        "Flagged rows:   {}",
        format!("{} ({:.1}%)", summary.flagged_rows, 100.0 * summary.flagged_rows as f64 / summary.rows as f64)
            .yellow()
    );
    println!("Elapsed:        {}ms", summary.elapsed_ms);

    Ok(())
}

fn cmd_score(config: &Config, input: Option<&Path>, id: &str, pretty: bool) -> Result<()> {
    let registry = registry(config);
    let engine = ScoringEngine::load(&registry, id)
        .with_context(|| format!("Failed to load model '{}'", id))?;
    let entries = read_entries(input)?;

    let outputs: Vec<ScoreOutput> = engine
        .score_batch(&entries)
        .into_iter()
        .map(|result| match result {
            Ok(verdict) => ScoreOutput::Verdict(verdict),
            Err(e) => ScoreOutput::Rejected { error: e.to_string() },
        })
        .collect();

    let text = if pretty {
        serde_json::to_string_pretty(&outputs)?
    } else {
        serde_json::to_string(&outputs)?
    };
    println!("{}", text);

    let stats = engine.stats();
    let summary = format!(
        "{} scored, {} anomalous, {} rejected",
        stats.entries_scored, stats.anomalies_detected, stats.requests_rejected
    );
    if stats.anomalies_detected > 0 || stats.requests_rejected > 0 {
        eprintln!("{}", summary.yellow());
    } else {
        eprintln!("{}", summary.green());
    }

    Ok(())
}

fn cmd_encode(config: &Config, input: Option<&Path>, model: Option<&str>) -> Result<()> {
    let encoder = match model {
        Some(id) => registry(config)
            .load(id)
            .with_context(|| format!("Failed to load model '{}'", id))?
            .encoder(),
        None => EntryEncoder::new(config.feature_schema()?),
    };

    let entries = read_entries(input)?;
    for (i, entry) in entries.iter().enumerate() {
        let vector = encoder
            .encode(entry)
            .with_context(|| format!("Entry {} failed to encode", i))?;
        println!("{}", serde_json::to_string(&vector.features)?);
    }

    Ok(())
}

fn cmd_models(config: &Config, format: &str) -> Result<()> {
    let registry = registry(config);
    let ids = registry.list()?;

    if ids.is_empty() {
        println!("No stored models in {}", registry.data_dir().display());
        return Ok(());
    }

    let mut metadata = Vec::with_capacity(ids.len());
    for id in &ids {
        match registry.metadata(id) {
            Ok(meta) => metadata.push(meta),
            Err(e) => eprintln!("{}", format!("Skipping '{}': {}", id, e).yellow()),
        }
    }

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&metadata)?),
        _ => {
            let rows: Vec<ModelRow> = metadata
                .iter()
                .map(|m| ModelRow {
                    id: m.model_id.clone(),
                    trained: m.trained_at.format("%Y-%m-%d %H:%M").to_string(),
                    rows: m.sample_count,
                    trees: m.num_trees,
                    schema: m.schema_version,
                    threshold: format!("{:.4}", m.threshold),
                })
                .collect();
            println!("{}", Table::new(rows));
        }
    }

    Ok(())
}

fn cmd_delete(config: &Config, id: &str, yes: bool) -> Result<()> {
    if !yes {
        println!("{}", format!("This will delete model '{}' and all of its backups.", id).yellow());
        println!("Run with --yes to confirm");
        return Ok(());
    }

    registry(config)
        .delete(id)
        .with_context(|| format!("Failed to delete model '{}'", id))?;
    println!("{} {}", "Deleted model:".green().bold(), id);
    Ok(())
}

fn cmd_gen_config(output: Option<PathBuf>) -> Result<()> {
    let config = Config::default();
    match output {
        Some(path) => {
            config.save(&path)?;
            println!("{} {}", "Wrote config:".green().bold(), path.display());
        }
        None => print!("{}", toml::to_string_pretty(&config)?),
    }
    Ok(())
}
