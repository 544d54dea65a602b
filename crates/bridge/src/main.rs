//! edge-infer - command-line entry point
//!
//! ```bash
//! # Print a model's declared tensors
//! edge-infer inspect --model ./models/classifier.edgm
//!
//! # Classify an image
//! edge-infer run --model ./models/classifier.edgm --image cat.jpg --top-k 5
//! ```

use anyhow::Context;
use bridge::{init_logging, BridgeConfig, Completion, InferenceModule};
use clap::{Parser, Subcommand};
use session::{LoadModelRequest, RunImageRequest};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "edge-infer", about = "On-device model inference runtime", version)]
struct Cli {
    /// Configuration file (TOML or JSON), layered under EDGE_INFER__* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a model and print its info
    Inspect {
        /// Model artifact path
        #[arg(short, long)]
        model: String,

        /// Worker threads
        #[arg(short, long)]
        threads: Option<i64>,
    },

    /// Load a model and run it on one image
    Run {
        /// Model artifact path
        #[arg(short, long)]
        model: String,

        /// Image file path
        #[arg(short, long)]
        image: String,

        /// Worker threads
        #[arg(short, long)]
        threads: Option<i64>,

        /// Mean subtracted from each channel value
        #[arg(long, allow_negative_numbers = true)]
        mean: Option<f32>,

        /// Divisor applied to each channel value
        #[arg(long, allow_negative_numbers = true)]
        std: Option<f32>,

        /// Keep only the K highest scores
        #[arg(long)]
        top_k: Option<usize>,

        /// Clockwise rotation in degrees (0, 90, 180, 270)
        #[arg(long, allow_negative_numbers = true)]
        rotation: Option<i32>,

        /// Inference deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = BridgeConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging.clone().with_verbosity(cli.verbose))
        .context("Failed to set tracing subscriber")?;

    info!("=== edge-infer v{} ===", env!("CARGO_PKG_VERSION"));
    let module = InferenceModule::new(config.session);

    let completion = match cli.command {
        Commands::Inspect { model, threads } => {
            module
                .load_model(LoadModelRequest {
                    model,
                    num_threads: threads,
                })
                .await
        }
        Commands::Run {
            model,
            image,
            threads,
            mean,
            std,
            top_k,
            rotation,
            timeout_ms,
        } => {
            let loaded = module
                .load_model(LoadModelRequest {
                    model,
                    num_threads: threads,
                })
                .await;
            if loaded.is_ok() {
                module
                    .run_model_on_image_multi(RunImageRequest {
                        path: image,
                        image_mean: mean,
                        image_std: std,
                        rotation,
                        top_k,
                        timeout_ms,
                    })
                    .await
            } else {
                loaded
            }
        }
    };
    module.close().await;

    println!("{}", serde_json::to_string_pretty(&completion)?);
    if let Completion::Err { kind, message } = completion {
        anyhow::bail!("{}: {}", kind, message);
    }
    Ok(())
}
