use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info};
use serde_json::{Map, Value};

use nima_predict::server::{DEFAULT_MAX_REQUEST_BYTES, DEFAULT_PORT};
use nima_predict::{
    client, init_logger, ArtifactPaths, ClassifierState, InferencePolicy, ModelLoader, ResponseFormat,
    RuntimeConfig, Server, ServerConfig,
};

/// Classifies academic productions as related to the environment or not
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve classification requests over TCP until Ctrl-C
    Serve {
        #[command(flatten)]
        artifacts: ArtifactArgs,
        /// Server port
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        /// Largest accepted request in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
        max_request_bytes: usize,
        /// Response layout
        #[arg(long, value_enum, default_value_t = ResponseFormat::Plain)]
        format: ResponseFormat,
        /// Let inference calls overlap instead of running them one at a time
        #[arg(long)]
        concurrent_inference: bool,
    },
    /// Score a request file offline and print the result
    Classify {
        #[command(flatten)]
        artifacts: ArtifactArgs,
        /// JSON file shaped like a server request
        input: PathBuf,
        /// Write the scores here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Send a request file to a running server
    Send {
        /// Server host
        host: String,
        /// JSON file shaped like a server request
        input: PathBuf,
        /// Server port
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Args)]
struct ArtifactArgs {
    /// Path to the trained model (.onnx or .json)
    model: PathBuf,
    /// Path to the fitted vectorizer (.json)
    vectorizer: PathBuf,
    /// Expected SHA-256 of the model file
    #[arg(long)]
    model_sha256: Option<String>,
    /// Expected SHA-256 of the vectorizer file
    #[arg(long)]
    vectorizer_sha256: Option<String>,
    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, default_value_t = 0)]
    intra_threads: usize,
}

impl ArtifactArgs {
    fn load(&self) -> Result<nima_predict::InferenceEngine> {
        let mut paths = ArtifactPaths::new(&self.model, &self.vectorizer);
        if let Some(hash) = &self.model_sha256 {
            paths = paths.with_model_sha256(hash);
        }
        if let Some(hash) = &self.vectorizer_sha256 {
            paths = paths.with_vectorizer_sha256(hash);
        }

        let start_time = Instant::now();
        let loader = ModelLoader::new(RuntimeConfig::default().with_intra_threads(self.intra_threads));
        let engine = loader.load(&paths).context("Failed to load model or vectorizer")?;
        info!("Artifacts loaded (took {:.2?})", start_time.elapsed());
        Ok(engine)
    }
}

fn read_request(path: &Path) -> Result<Map<String, Value>> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    nima_predict::classifier::parse_request(&bytes).with_context(|| format!("Invalid request in {:?}", path))
}

#[tokio::main]
async fn main() {
    init_logger();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve {
            artifacts,
            port,
            bind,
            max_request_bytes,
            format,
            concurrent_inference,
        } => {
            let engine = artifacts.load()?;
            let policy = if concurrent_inference {
                InferencePolicy::Concurrent
            } else {
                InferencePolicy::Serialized
            };
            let config = ServerConfig::default()
                .with_bind_addr(bind)
                .with_port(port)
                .with_max_request_bytes(max_request_bytes)
                .with_response_format(format)
                .with_inference_policy(policy);

            info!("=== Starting classification server ({:?}, {:?} inference) ===", format, policy);
            let server = Server::bind(ClassifierState::new(config, engine)).await?;
            server.run().await?;
        }
        Command::Classify { artifacts, input, output } => {
            let engine = artifacts.load()?;
            let request = read_request(&input)?;

            let classify_start = Instant::now();
            let scores = engine.classify_request(&request)?;
            info!(
                "Classified {} productions (took {:.2?})",
                scores.len(),
                classify_start.elapsed()
            );

            let response: Map<String, Value> = scores
                .into_iter()
                .map(|(id, score)| (id, Value::from(f64::from(score))))
                .collect();
            let rendered = serde_json::to_string_pretty(&response)?;
            match output {
                Some(path) => fs::write(&path, rendered).with_context(|| format!("Failed to write {:?}", path))?,
                None => println!("{}", rendered),
            }
        }
        Command::Send { host, input, port } => {
            let request = Value::Object(read_request(&input)?);
            let response = client::send_request((host.as_str(), port), &request).await?;
            println!("Sent:     {}", serde_json::to_string_pretty(&request)?);
            println!("Received: {}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
