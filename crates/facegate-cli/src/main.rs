use anyhow::{Context, Result};
use clap::Parser;
use facegate_core::{ModelPaths, OnnxEngine, DEFAULT_TOLERANCE};
use std::path::PathBuf;
use std::process::ExitCode;

mod verdict;
mod verify;

use verify::V4lCamera;

#[derive(Parser)]
#[command(
    name = "face-verify",
    about = "Verify a live camera frame against a user's stored photo"
)]
struct Cli {
    /// User whose reference photo lives in <PHOTOS_DIR>/<USERNAME>/
    username: String,

    /// Directory holding one sub-directory of photos per user
    #[arg(long, default_value = "user-photos")]
    photos_dir: PathBuf,

    /// Where the verdict line is written
    #[arg(long, default_value = verdict::DEFAULT_OUTPUT)]
    output: PathBuf,

    /// V4L2 capture device
    #[arg(long, default_value = facegate_hw::DEFAULT_DEVICE)]
    device: String,

    /// Directory containing the ONNX models
    #[arg(long, env = "FACEGATE_MODEL_DIR", default_value = "models")]
    model_dir: PathBuf,

    /// ONNX Runtime intra-op threads
    #[arg(long, env = "FACEGATE_INTRA_THREADS", default_value_t = 2)]
    intra_threads: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    println!("Starting face verification for user: {}", cli.username);

    let verified = match run(&cli) {
        Ok(verified) => verified,
        Err(e) => {
            println!("Error: {e:#}");
            false
        }
    };

    if let Err(e) = verdict::write_verdict(&cli.output, verified) {
        eprintln!("Error: could not write {}: {e}", cli.output.display());
        return ExitCode::FAILURE;
    }

    println!("Face verification result: {}", if verified { "SUCCESS" } else { "FAILED" });
    if verified {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let mut engine = OnnxEngine::load(&ModelPaths::in_dir(&cli.model_dir), cli.intra_threads)
        .context("loading face models")?;
    let mut camera = V4lCamera { device: cli.device.clone() };

    Ok(verify::capture_and_verify_face(
        &mut engine,
        &mut camera,
        &cli.photos_dir,
        &cli.username,
        DEFAULT_TOLERANCE,
    ))
}
