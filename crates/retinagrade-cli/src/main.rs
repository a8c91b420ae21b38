mod display;
mod input;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use retinagrade_ai::{
    ModelState, OnnxLoader, install_model, installed_model, predict, resolve_model,
    self_check,
};
use retinagrade_core::{ModelConfig, PredictionResult};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::display::ClassifyReport;

#[derive(Parser)]
#[command(name = "retinagrade", version)]
#[command(about = "Diabetic retinopathy severity grading from fundus images")]
struct Cli {
    /// JSON model configuration file
    #[arg(short, long, global = true, env = "RETINAGRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the model artifacts (overrides the config file)
    #[arg(long, global = true, env = "RETINAGRADE_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Seed for the synthesized head, for reproducible fallback output
    #[arg(long, global = true, env = "RETINAGRADE_HEAD_SEED")]
    head_seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade one fundus image
    Classify {
        /// PNG, JPEG or GIF image
        image: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run model resolution and report which artifact loaded
    Resolve {
        #[arg(long)]
        json: bool,
    },

    /// List the severity grades in class-index order
    Labels,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("retinagrade v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Labels => {
            print!("{}", display::labels_text());
        }
        Commands::Resolve { json } => {
            let config = load_config(cli.config.as_deref(), cli.model_dir, cli.head_seed)?;
            let state = startup(config)?;
            let check = state.is_ready().then(|| self_check(state));
            if json {
                println!("{}", display::resolution_json(state, check.as_ref())?);
            } else {
                print!("{}", display::resolution_text(state, check.as_ref()));
            }
            anyhow::ensure!(state.is_ready(), "model not available");
            if let Some(Err(e)) = check {
                return Err(e).context("model loaded but failed its self-check");
            }
        }
        Commands::Classify { image, json } => {
            let config = load_config(cli.config.as_deref(), cli.model_dir, cli.head_seed)?;
            let model_dir = config.model_dir.clone();
            let state = startup(config)?;
            let prediction = classify_image(state, &image, &model_dir)?;
            info!(
                image = %image.display(),
                class = prediction.class_index,
                confidence = prediction.confidence,
                "classified image"
            );

            let report = ClassifyReport {
                image: image.display().to_string(),
                // `predict` only succeeds with a ready handle.
                provenance: state.provenance().context("model not available")?,
                prediction: &prediction,
            };
            if json {
                println!("{}", display::prediction_json(&report)?);
            } else {
                print!("{}", display::prediction_text(&report));
            }
        }
    }

    Ok(())
}

/// Serve one classification request against the resolved model. Requests
/// are refused before the image is read when no model is available.
fn classify_image(
    state: &ModelState,
    image: &Path,
    model_dir: &Path,
) -> anyhow::Result<PredictionResult> {
    anyhow::ensure!(
        state.is_ready(),
        "model not available: no artifact or backbone could be loaded from {} \
         (run `retinagrade resolve` for details)",
        model_dir.display()
    );
    let tensor = input::load_image_tensor(image)?;
    predict(state, &tensor).context("classification failed")
}

/// Config file (if any) with command-line overrides applied on top.
fn load_config(
    path: Option<&Path>,
    model_dir: Option<PathBuf>,
    head_seed: Option<u64>,
) -> anyhow::Result<ModelConfig> {
    let mut config = match path {
        Some(path) => ModelConfig::from_json_file(path)?,
        None => ModelConfig::default(),
    };
    if let Some(dir) = model_dir {
        config.model_dir = dir;
    }
    if head_seed.is_some() {
        config.head.seed = head_seed;
    }
    Ok(config)
}

/// Resolve the model once and install it as the process-wide state.
fn startup(config: ModelConfig) -> anyhow::Result<&'static ModelState> {
    info!(model_dir = %config.model_dir.display(), "resolving model");
    let head = config.head.clone();
    let loader = OnnxLoader::new(config);
    let state = resolve_model(&loader, &head);
    if !state.is_ready() {
        warn!("no model could be loaded; classification requests will be rejected");
    }
    if install_model(state).is_err() {
        anyhow::bail!("model state already installed");
    }
    installed_model().context("model state missing after install")
}
