//! analogia CLI - generate analogies and collect student answers.

use analogia::dataset::load_questions;
use analogia::models::DatasetConfig;
use analogia::{
    AnalogyPipeline, AppConfig, ExperimentConfig, GenerateOptions, LlmModel, MethodOptions,
    ModelConfig, Registry, RunStats, StudentPipeline,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

const PING_PROMPT: &str = "Say 'OK' if you are working.";

#[derive(Parser)]
#[command(name = "analogia")]
#[command(version)]
#[command(about = "Generate LLM analogies for benchmark questions and test students with them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to deployment configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate analogies with a registered method
    Generate {
        /// Method name (see `list`)
        #[arg(long)]
        method: String,

        /// Path to the teacher model config
        #[arg(long)]
        model: PathBuf,

        /// Questions file: processed GPQA CSV or JSONL
        #[arg(short, long)]
        questions: PathBuf,

        /// Path to output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Only use the first N questions
        #[arg(short, long)]
        limit: Option<usize>,

        /// Keep only questions with this high-level domain
        #[arg(long)]
        subject: Option<String>,

        /// TOML file with method options (prompt template overrides)
        #[arg(long)]
        method_config: Option<PathBuf>,
    },

    /// Answer questions with a student model under each experiment condition
    Answer {
        /// Path to experiment config
        #[arg(short, long)]
        experiment: PathBuf,
    },

    /// Send a one-line prompt to check a model is reachable
    Ping {
        /// Path to model config
        #[arg(short, long)]
        model: PathBuf,
    },

    /// List registered methods and model backends
    List,

    /// Validate a model config and its credentials
    Validate {
        /// Path to model config
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn print_example_config() {
    let example = r#"# --- deployment.toml (passed with --config) ---
[deployment]
# API key (can also use the model's api_key_env, OPENAI_API_KEY by default)
# api_key = "${OPENAI_API_KEY}"
# base_url = "https://openrouter.ai/api/v1"
timeout_secs = 120

# --- models/teacher.toml ---
backend = "openai_chat"
name = "teacher_gpt41_mini"
model_id = "gpt-4.1-mini"
role = "teacher"
temperature = 0.7
max_tokens = 1024
# api_key_env = "OPENAI_API_KEY"
# Any other key is passed through to the backend, e.g.
# top_p = 0.9

# --- models/dry_run.toml ---
backend = "scripted"
name = "dry_run"
model_id = "none"
responses = ["1. First concept\n2. Second concept", "A short story."]
reply = "OK"

# --- experiments/student.toml ---
student_model = "models/student.toml"
output = "results/answers/student.csv"

[dataset]
path = "data/processed/gpqa_main.csv"
subject_mode = "high_level"
# subject_filter = "Physics"
limit = 5

[[conditions]]
name = "baseline"
type = "baseline"

[[conditions]]
name = "with_pag"
type = "with_analogy_csv"
analogy_csv = "results/analogies/pag.csv"
"#;
    println!("{example}");
}

fn load_model(
    registry: &Registry,
    app: &AppConfig,
    path: &Path,
) -> Result<Arc<dyn LlmModel>> {
    let config = ModelConfig::from_file(path)
        .with_context(|| format!("Failed to load model config from {path:?}"))?;
    let model = registry
        .build_model(&config, &app.deployment)
        .with_context(|| format!("Failed to build model '{}'", config.name))?;
    info!(
        model = %model.name(),
        model_id = %model.model_id(),
        role = %model.role(),
        "Using model"
    );
    Ok(Arc::from(model))
}

fn print_stats(title: &str, stats: &RunStats, output: &Path) {
    println!("\n=== {title} ===");
    println!("Questions:   {}", stats.total_questions);
    println!("Generated:   {}", stats.total_generated);
    println!("Failed:      {}", stats.total_failed);
    println!("Skipped:     {}", stats.total_skipped);
    if !stats.failed_ids.is_empty() {
        println!("Failed ids:  {}", stats.failed_ids.join(", "));
    }
    println!("Throughput:  {:.0}/hr", stats.throughput_per_hour);
    println!("Runtime:     {:.1}s", stats.runtime_secs);
    println!("Output:      {output:?}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let registry = Registry::with_builtins();
    let app = AppConfig::load_or_default(cli.config.as_deref())
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::List => {
            println!("Methods:");
            for name in registry.list_methods() {
                println!("  {name}");
            }
            println!("Model backends:");
            for name in registry.list_models() {
                println!("  {name}");
            }
        }

        Commands::Validate { model } => {
            let model = load_model(&registry, &app, &model)?;
            let profile = model.profile();

            info!("Model configuration is valid");
            info!("  Name:        {}", profile.name);
            info!("  Model id:    {}", profile.model_id);
            info!("  Role:        {}", profile.role);
            info!("  Temperature: {}", profile.temperature);
            if let Some(max_tokens) = profile.max_tokens {
                info!("  Max tokens:  {max_tokens}");
            }
        }

        Commands::Ping { model } => {
            let model = load_model(&registry, &app, &model)?;
            let reply = model
                .generate(PING_PROMPT, &GenerateOptions::default())
                .await
                .with_context(|| format!("Model '{}' did not respond", model.name()))?;
            println!("{}: {reply}", model.name());
        }

        Commands::Generate {
            method,
            model,
            questions,
            output,
            limit,
            subject,
            method_config,
        } => {
            let options = match &method_config {
                Some(path) => MethodOptions::from_file(path)
                    .with_context(|| format!("Failed to load method config from {path:?}"))?,
                None => MethodOptions::default(),
            };
            let method = registry
                .build_method(&method, &options)
                .with_context(|| format!("Failed to build method '{method}'"))?;
            let teacher = load_model(&registry, &app, &model)?;

            let mut dataset = DatasetConfig::new(questions);
            dataset.subject_filter = subject;
            dataset.limit = limit;
            let questions = load_questions(&dataset).context("Failed to load questions")?;

            let pipeline = AnalogyPipeline::new(Arc::from(method), teacher);
            let stats = pipeline.run_to_csv(&questions, &output).await?;

            print_stats("Analogy Generation Complete", &stats, &output);
        }

        Commands::Answer { experiment } => {
            let experiment = ExperimentConfig::from_file(&experiment)
                .with_context(|| format!("Failed to load experiment from {experiment:?}"))?;

            let student = load_model(&registry, &app, &experiment.student_model)?;
            let questions =
                load_questions(&experiment.dataset).context("Failed to load questions")?;

            let pipeline = StudentPipeline::new(student)?;
            let stats = pipeline
                .run_to_csv(&questions, &experiment.conditions, &experiment.output)
                .await?;

            print_stats("Student Answers Complete", &stats, &experiment.output);
        }
    }

    Ok(())
}
