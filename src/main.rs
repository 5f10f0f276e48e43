use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use skeptic::config::Config;
use skeptic::db::Database;
use skeptic::detector::{acquire_backend, artifact, Detector, ModelDirSource};
use skeptic::input::AnalysisInput;

/// Source tag stored with analyses made from the command line.
const CLI_SOURCE: &str = "cli";

/// Skeptic: signal-fusion fake news verdicts.
///
/// Scores a headline and article body for sensationalist phrasing, an
/// optional text classifier signal and token repetition, and fuses them
/// into a Real/Fake verdict that never fails the caller.
#[derive(Parser)]
#[command(name = "skeptic", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the analysis store
    Init,

    /// Download the tokenizer and classifier model files
    DownloadModel,

    /// Write a new timestamped detector bundle from the downloaded models
    Export,

    /// Analyze a single headline and article
    Analyze {
        /// The headline
        #[arg(long)]
        title: String,

        /// The article body
        #[arg(long)]
        content: String,

        /// Print the verdict as JSON instead of formatted text
        #[arg(long)]
        json: bool,

        /// Don't record the analysis in the store
        #[arg(long)]
        no_save: bool,
    },

    /// Analyze a JSONL file of {"title", "content"} objects
    Batch {
        /// Path to the JSONL file
        file: PathBuf,

        /// Number of predictions to run in parallel (default: 4)
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Don't record the analyses in the store
        #[arg(long)]
        no_save: bool,
    },

    /// List past analyses, newest first
    History {
        /// Page number (1-based)
        #[arg(long, default_value = "1")]
        page: u32,

        /// Analyses per page (default: 20)
        #[arg(long, default_value = "20")]
        per_page: u32,
    },

    /// Show running detection totals
    Stats,

    /// Show system status (store, model files, bundles)
    Status,

    /// Start the HTTP API
    #[cfg(feature = "web")]
    Serve {
        /// Port to listen on (default: 5000)
        #[arg(long, default_value = "5000")]
        port: u16,

        /// Address to bind to (default: 0.0.0.0)
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("skeptic=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            info!("Initializing Skeptic analysis store...");
            let config = Config::load()?;
            let db = init_database(&config).await?;
            let table_count = db.table_count().await?;
            println!("Store initialized at: {}", db_display(&config));
            println!("Tables created: {table_count}");
            println!("\nNext step: run `skeptic download-model` to fetch the classifier,");
            println!("or `skeptic analyze` to use lexical analysis only.");
        }

        Commands::DownloadModel => {
            let config = Config::load()?;
            let model_dir = &config.model_dir;

            println!("Downloading model files...");
            println!("  Destination: {}", model_dir.display());

            skeptic::signals::download::download_model(model_dir).await?;

            println!("\n{}", "Models downloaded successfully.".bold());
            println!("Run `skeptic export` to bundle them for faster startup.");
        }

        Commands::Export => {
            let config = Config::load()?;
            let settings = config.detector_settings()?;
            let bundle = artifact::export_bundle(
                &config.artifact_dir,
                &config.model_dir,
                &settings,
                chrono::Utc::now(),
            )?;
            println!("{} {}", "Bundle written:".green(), bundle.display());
        }

        Commands::Analyze {
            title,
            content,
            json,
            no_save,
        } => {
            let config = Config::load()?;
            let input = AnalysisInput::new(&title, &content, &config.limits)?;
            let db = if no_save {
                None
            } else {
                Some(open_database(&config).await?)
            };
            let detector = build_detector(&config).await?;

            let verdict = detector.predict(&input.title, &input.content);

            if json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                skeptic::output::terminal::display_verdict(&input.title, &verdict);
            }

            if verdict.is_error() {
                anyhow::bail!(
                    "Analysis failed: {}",
                    verdict.error.as_deref().unwrap_or("unknown error")
                );
            }

            if let Some(db) = db {
                let row = skeptic::db::models::NewAnalysis::from_verdict(
                    &input, &verdict, CLI_SOURCE,
                )?;
                let id = db.record_analysis(&row).await?;
                info!(analysis_id = id, "Analysis recorded");
            }
        }

        Commands::Batch {
            file,
            concurrency,
            no_save,
        } => {
            let config = Config::load()?;
            let db = if no_save {
                None
            } else {
                Some(open_database(&config).await?)
            };
            let detector = build_detector(&config).await?;

            println!("Analyzing {} ({concurrency} concurrent)...", file.display());
            let summary = skeptic::pipeline::batch::run(
                detector,
                db.as_ref(),
                &file,
                &config.limits,
                concurrency,
            )
            .await?;

            println!(
                "\n{} lines: {} fake, {} real, {} invalid, {} failed",
                summary.lines,
                summary.fake.to_string().red(),
                summary.real.to_string().green(),
                summary.invalid,
                summary.failed,
            );
            if !no_save {
                println!("{} analyses recorded", summary.recorded);
            }
        }

        Commands::History { page, per_page } => {
            let config = Config::load()?;
            let db = open_database(&config).await?;
            let page = page.max(1);
            let per_page = per_page.max(1);

            let total = db.count_analyses().await?;
            let records = db
                .recent_analyses(per_page, (page - 1).saturating_mul(per_page))
                .await?;
            let pages = u32::try_from((total + i64::from(per_page) - 1) / i64::from(per_page))
                .unwrap_or(u32::MAX);
            skeptic::output::terminal::display_history(&records, page, pages, total);
        }

        Commands::Stats => {
            let config = Config::load()?;
            let db = open_database(&config).await?;
            let stats = db.get_stats().await?;
            skeptic::output::terminal::display_stats(&stats);
        }

        Commands::Status => {
            let config = Config::load()?;
            let db = open_database(&config).await?;
            skeptic::status::show(
                &db,
                &db_display(&config),
                &config.model_dir,
                &config.artifact_dir,
            )
            .await?;
        }

        #[cfg(feature = "web")]
        Commands::Serve { port, bind } => {
            let config = Config::load()?;
            let db = init_database(&config).await?;
            let detector = build_detector(&config).await?;

            let state = skeptic::web::AppState {
                detector,
                db,
                limits: config.limits,
            };
            skeptic::web::run_server(state, port, &bind).await?;
        }
    }

    Ok(())
}

/// Acquire the detector backend once, off the async runtime threads.
async fn build_detector(config: &Config) -> Result<Arc<Detector>> {
    let settings = config.detector_settings()?;
    let artifact_dir = config.artifact_dir.clone();
    let model_dir = config.model_dir.clone();

    let backend = tokio::task::spawn_blocking(move || {
        acquire_backend(&artifact_dir, &ModelDirSource::new(model_dir), &settings)
    })
    .await?;

    Ok(Arc::new(Detector::new(backend)))
}

/// Display-friendly store identifier. Postgres passwords are redacted.
fn db_display(config: &Config) -> String {
    match config.database_url.as_deref() {
        Some(url) if config.uses_postgres() => match url.find('@') {
            Some(at) => {
                let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
                format!("{}****@{}", &url[..scheme_end], &url[at + 1..])
            }
            None => url.to_string(),
        },
        _ => config.db_path.clone(),
    }
}

/// Select the database backend based on configuration.
///
/// When DATABASE_URL points to PostgreSQL, uses the Postgres backend
/// (requires the `postgres` feature). Otherwise opens the SQLite file.
async fn open_database(config: &Config) -> Result<Arc<dyn Database>> {
    if let Some(url) = config.database_url.as_deref().filter(|_| config.uses_postgres()) {
        return connect_postgres(url).await;
    }
    #[cfg(feature = "sqlite")]
    return skeptic::db::open_sqlite(&config.db_path);
    #[cfg(not(feature = "sqlite"))]
    anyhow::bail!("No DATABASE_URL set and the 'sqlite' feature is not compiled in");
}

/// Initialize the database (create if needed).
async fn init_database(config: &Config) -> Result<Arc<dyn Database>> {
    if let Some(url) = config.database_url.as_deref().filter(|_| config.uses_postgres()) {
        return connect_postgres(url).await;
    }
    #[cfg(feature = "sqlite")]
    return skeptic::db::initialize_sqlite(&config.db_path);
    #[cfg(not(feature = "sqlite"))]
    anyhow::bail!("No DATABASE_URL set and the 'sqlite' feature is not compiled in");
}

#[cfg(feature = "postgres")]
async fn connect_postgres(url: &str) -> Result<Arc<dyn Database>> {
    info!("Using PostgreSQL backend");
    skeptic::db::connect_postgres(url).await
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_url: &str) -> Result<Arc<dyn Database>> {
    anyhow::bail!(
        "DATABASE_URL points to PostgreSQL but the 'postgres' feature is not compiled in.\n\
         Rebuild with: cargo build --features postgres"
    )
}
