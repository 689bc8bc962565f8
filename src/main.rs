use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use anirec::semantic::BundleStorage;
use anirec::{load_catalog, Config, Recommendation, RecommendError, Recommender};

mod cli;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("anirec=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn print_recommendations(recommendations: &[Recommendation]) -> anyhow::Result<()> {
    let response = json!({ "recommendation": recommendations });
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn open_engine(config: &Config, bundle: &Path) -> anyhow::Result<Recommender> {
    if !BundleStorage::new(bundle).exists() {
        bail!(
            "No bundle in {}, run `anirec build --catalog <file>` first",
            bundle.display()
        );
    }

    let provider = config.embedding_provider()?;
    let engine = Recommender::with_options(provider, config.engine_options());
    engine
        .load(bundle)
        .with_context(|| format!("Failed to load bundle from {}", bundle.display()))?;
    Ok(engine)
}

fn run(args: cli::Args) -> anyhow::Result<()> {
    let base_path = Config::default_base_path()?;
    let config = Config::load_with(&base_path)?;
    let bundle = args.bundle.unwrap_or_else(|| config.bundle_dir());
    tracing::debug!(model = %config.model, bundle = %bundle.display(), "Resolved configuration");

    match args.command {
        cli::Command::Build { catalog } => {
            let items = load_catalog(&catalog)?;
            let engine =
                Recommender::with_options(config.embedding_provider()?, config.engine_options());

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")?);
            spinner.set_message(format!("Embedding synopses of {} titles", items.len()));
            spinner.enable_steady_tick(Duration::from_millis(120));

            let built = engine.build(items);
            spinner.finish_and_clear();
            built?;

            engine.persist(&bundle)?;
            println!(
                "{} titles indexed ({} in catalog), bundle saved to {}",
                engine.indexed_count(),
                engine.catalog_len(),
                bundle.display()
            );
            Ok(())
        }

        cli::Command::Title { title, k } => {
            let engine = open_engine(&config, &bundle)?;
            let recommendations = engine.recommend_by_title(&title, k.unwrap_or(config.default_k))?;
            print_recommendations(&recommendations)
        }

        cli::Command::Synopsis { text, k } => {
            let engine = open_engine(&config, &bundle)?;
            let recommendations =
                engine.recommend_by_synopsis(&text, k.unwrap_or(config.default_k))?;
            print_recommendations(&recommendations)
        }

        cli::Command::Info {} => {
            let engine = open_engine(&config, &bundle)?;
            let info = json!({
                "model": engine.provider().name(),
                "dimensions": engine.provider().dimensions(),
                "base_path": config.base_path(),
                "bundle": bundle,
                "indexed": engine.indexed_count(),
                "catalog": engine.catalog_len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    init_logging();
    let args = cli::Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            // Bad input exits 2, service failures 1
            match err.downcast_ref::<RecommendError>() {
                Some(e) if e.is_client_error() => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
