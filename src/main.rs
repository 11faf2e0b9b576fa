use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use subscription_review::{
    parse_feedback, BatchReviewer, DecisionEngine, FeedbackLoop, RegistryStore, ResponseLog,
    ReviewConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "subscription-review", version, about = "Triage subscription questionnaires")]
struct Cli {
    /// JSON config file (defaults apply to any key it omits)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the registry path
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    /// Override the decision log path
    #[arg(long, global = true)]
    responses: Option<PathBuf>,

    /// Override the feedback log path
    #[arg(long, global = true)]
    feedback_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review every questionnaire in a JSON array or CSV file
    Review { input: PathBuf },

    /// Inspect or edit registry keywords
    Keywords {
        #[command(subcommand)]
        action: KeywordAction,
    },

    /// Inspect or edit registry patterns
    Patterns {
        #[command(subcommand)]
        action: PatternAction,
    },

    /// Submit reviewer corrections (one object or an array)
    Feedback { file: PathBuf },

    /// Show logged decisions for a questionnaire
    Decisions { questionnaire_id: String },
}

#[derive(Subcommand)]
enum KeywordAction {
    List,
    Add {
        category: String,
        term: String,
        #[arg(long)]
        description: Option<String>,
    },
    Remove {
        category: String,
        term: String,
    },
}

#[derive(Subcommand)]
enum PatternAction {
    List,
    Add { pattern: String, description: String },
    Remove { pattern: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Review { input } => run_review(&config, &input),
        Command::Keywords { action } => run_keywords(&config, action),
        Command::Patterns { action } => run_patterns(&config, action),
        Command::Feedback { file } => run_feedback(&config, &file),
        Command::Decisions { questionnaire_id } => run_decisions(&config, &questionnaire_id),
    }
}

fn load_config(cli: &Cli) -> Result<ReviewConfig> {
    let mut config = match &cli.config {
        Some(path) => ReviewConfig::from_file(path)?,
        None => ReviewConfig::default(),
    };

    if let Some(path) = &cli.registry {
        config.registry_path = path.clone();
    }
    if let Some(path) = &cli.responses {
        config.response_path = path.clone();
    }
    if let Some(path) = &cli.feedback_log {
        config.feedback_path = path.clone();
    }

    Ok(config)
}

fn run_review(config: &ReviewConfig, input: &Path) -> Result<()> {
    let engine = DecisionEngine::new(config.policy()?);
    let mut store = RegistryStore::load(&config.registry_path)?;
    let log = ResponseLog::new(&config.response_path);

    println!("📂 Reviewing {}", input.display());
    let summary = BatchReviewer::new(&engine, &mut store, &log).review_file(input)?;

    for error in &summary.errors {
        eprintln!("❌ {}: {}", error.questionnaire_id, error.message);
    }
    println!("✓ {}", summary.summary());
    println!("✓ Results saved to {}", log.path().display());

    Ok(())
}

fn run_keywords(config: &ReviewConfig, action: KeywordAction) -> Result<()> {
    let mut store = RegistryStore::load(&config.registry_path)?;

    match action {
        KeywordAction::List => {
            for (name, category) in &store.registry().keywords {
                println!("{} [{}] - {}", name, category.risk_category, category.description);
                for term in &category.examples {
                    println!("  - {}", term);
                }
            }
        }
        KeywordAction::Add {
            category,
            term,
            description,
        } => {
            if store.add_keyword(&category, &term, description.as_deref())? {
                println!("✓ Added '{}' to {}", term, category);
            } else {
                println!("'{}' already in {}", term, category);
            }
        }
        KeywordAction::Remove { category, term } => {
            if store.remove_keyword(&category, &term)? {
                println!("✓ Removed '{}' from {}", term, category);
            } else {
                println!("'{}' not found in {}", term, category);
            }
        }
    }

    Ok(())
}

fn run_patterns(config: &ReviewConfig, action: PatternAction) -> Result<()> {
    let mut store = RegistryStore::load(&config.registry_path)?;

    match action {
        PatternAction::List => {
            for entry in &store.registry().patterns {
                println!("- {}: {}", entry.pattern, entry.description);
            }
        }
        PatternAction::Add {
            pattern,
            description,
        } => {
            if store.add_pattern(&pattern, &description)? {
                println!("✓ Added pattern /{}/", pattern);
            } else {
                println!("Pattern /{}/ already registered", pattern);
            }
        }
        PatternAction::Remove { pattern } => {
            if store.remove_pattern(&pattern)? {
                println!("✓ Removed pattern /{}/", pattern);
            } else {
                println!("Pattern /{}/ not found", pattern);
            }
        }
    }

    Ok(())
}

fn run_feedback(config: &ReviewConfig, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read feedback file: {:?}", file))?;

    let feedback = parse_feedback(&content)
        .with_context(|| format!("Invalid feedback JSON in {:?}", file))?;

    let mut store = RegistryStore::load(&config.registry_path)?;
    let feedback_loop = FeedbackLoop::new(&config.feedback_path);

    for item in feedback {
        let record = feedback_loop.submit(&mut store, item)?;
        if record.learned_terms.is_empty() {
            println!("✓ {} recorded", record.feedback.questionnaire.questionnaire_id);
        } else {
            println!(
                "✓ {} recorded, learned: {}",
                record.feedback.questionnaire.questionnaire_id,
                record.learned_terms.join(", ")
            );
        }
    }

    Ok(())
}

fn run_decisions(config: &ReviewConfig, questionnaire_id: &str) -> Result<()> {
    let log = ResponseLog::new(&config.response_path);
    let decisions = log.find(questionnaire_id)?;

    if decisions.is_empty() {
        println!("No decisions logged for {}", questionnaire_id);
    }
    for decision in decisions {
        println!("{}", decision.summary());
    }

    Ok(())
}
