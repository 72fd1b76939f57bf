mod config;
use clap::{Parser, Subcommand};
use config::Config;
use std::path::PathBuf;
use std::sync::Arc;
use swiftslice_core::{
    BasicPayloadSlicer, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_PART_COUNT, Payload, PutOptions,
    SlicingPlan, UploadObjectOperation, UploadObjectOperationOutcome,
    UploadObjectOperationRequest,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "swiftslice")]
#[command(about = "Segmented large object uploads for Swift object storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file, splitting it into segments when it is large
    Upload {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Destination container
        container: String,

        /// Object key to create
        key: String,

        /// Local file to upload
        file: PathBuf,

        /// Content type recorded on the object and its segments
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Print how a payload of the given size would be sliced
    Plan {
        /// Payload size in bytes
        size: u64,

        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: u64,

        #[arg(long, default_value_t = DEFAULT_MAX_PART_COUNT)]
        max_parts: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "swiftslice_cli=info,swiftslice_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            config,
            container,
            key,
            file,
            content_type,
        } => {
            tracing::info!("Loading config: {}", config);

            let cfg = match Config::from_file(&config) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to load config: {}", e);
                    std::process::exit(1);
                }
            };

            if let Err(e) = run_upload(&cfg, container, key, file, content_type).await {
                tracing::error!("Upload failed ({:?}): {}", e.kind(), e);
                std::process::exit(1);
            }
        }
        Commands::Plan {
            size,
            chunk_size,
            max_parts,
        } => match SlicingPlan::compute(size, chunk_size, max_parts) {
            Ok(plan) => match serde_json::to_string_pretty(&plan) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    tracing::error!("Failed to encode plan: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                tracing::error!("Invalid plan parameters: {}", e);
                std::process::exit(1);
            }
        },
    }
}

async fn run_upload(
    cfg: &Config,
    container: String,
    key: String,
    file: PathBuf,
    content_type: Option<String>,
) -> swiftslice_core::Result<()> {
    let store = cfg.store_builder()?.build()?;
    let operation =
        UploadObjectOperation::new(store, Arc::new(BasicPayloadSlicer), cfg.upload.clone());

    let payload = Payload::from_file(&file).await?;
    tracing::info!(
        "Uploading {} ({} bytes) to {}/{} via {} store",
        file.display(),
        payload.content_length().unwrap_or_default(),
        container,
        key,
        cfg.store.backend.as_str()
    );

    let result = operation
        .run(UploadObjectOperationRequest {
            container: container.clone(),
            object_key: key.clone(),
            payload,
            options: PutOptions {
                content_type,
                ..Default::default()
            },
        })
        .await?;

    match &result.outcome {
        UploadObjectOperationOutcome::SingleObject => {
            tracing::info!("Stored {}/{} as a single object", container, key);
        }
        UploadObjectOperationOutcome::Manifest { segments } => {
            tracing::info!(
                "Stored {}/{} as a manifest over {} segments",
                container,
                key,
                segments.len()
            );
        }
    }

    println!("{}", result.etag);
    Ok(())
}
