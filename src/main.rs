use tracing_subscriber::EnvFilter;

use chainwatch_risk::config::Config;
use chainwatch_risk::pipeline::RiskPipeline;

const USAGE: &str = "usage: chainwatch-risk <score|train|predict> [config.toml]";

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let command = std::env::args()
        .nth(1)
        .ok_or_else(|| eyre::eyre!(USAGE))?;
    let config_path = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;

    // Initialize structured logging (set RUST_LOG=debug for per-feature output)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    tracing::info!(command = %command, "Configuration loaded from {}", config_path);

    let pipeline = RiskPipeline::new(config);

    match command.as_str() {
        "score" => {
            let records = pipeline.load_records()?;
            let (scored, _) = pipeline.score(records);
            let written = pipeline.write_output(&scored)?;
            tracing::info!(written, "Heuristic scoring complete");
        }
        "train" => {
            let records = pipeline.load_records()?;
            let (_, summary) = pipeline.score(records.clone());
            tracing::debug!(?summary, "Heuristic summary of training set");
            let artifact = pipeline.train(&records)?;
            tracing::info!(
                mean_f1 = artifact.cross_validation.mean_f1,
                std_f1 = artifact.cross_validation.std_f1,
                "Model trained"
            );
        }
        "predict" => {
            // Load the model first so a missing artifact fails before any work
            let model = pipeline.load_model()?;
            let records = pipeline.load_records()?;
            let (mut scored, _) = pipeline.score(records);
            pipeline.predict(&mut scored, &model);
            let written = pipeline.write_output(&scored)?;
            tracing::info!(written, "Scoring and inference complete");
        }
        other => return Err(eyre::eyre!("Unknown command '{}'. {}", other, USAGE)),
    }

    Ok(())
}
