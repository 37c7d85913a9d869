//! Command implementations

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::adapters::ProgressStyle;
use crate::app::AppContainer;
use crate::cli::args::{CompressArgs, InfoArgs};
use crate::domain::errors::DomainError;
use crate::domain::model::{Outcome, QualityPreset, StrategyKind, TranscodeRequest};
use crate::engine::progress::{
    ConsoleProgressCallback, JsonProgressCallback, NoOpProgressCallback, ProgressCallback,
};

/// Exit code reported when the run was cancelled
pub const EXIT_CANCELLED: u8 = 130;

/// Stdout payload and process exit code of a command
#[derive(Debug)]
pub struct CommandReport {
    pub payload: Value,
    pub exit_code: u8,
}

/// Execute the compress command
pub async fn compress<C: AppContainer>(
    container: &C,
    args: CompressArgs,
    style: ProgressStyle,
) -> Result<CommandReport> {
    let request = build_request(&args)?;
    info!("Input: {}", request.source.display());

    let interactor = container.compress_interactor();
    let ctrl_c = {
        let interactor = Arc::clone(&interactor);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling");
                interactor.cancel();
            }
        })
    };

    let outcome = interactor.start(request, progress_sink(style)).await;
    ctrl_c.abort();

    report(outcome?)
}

/// Execute the info command
pub async fn info<C: AppContainer>(container: &C, args: InfoArgs) -> Result<CommandReport> {
    let info = container
        .compress_interactor()
        .media_info(&args.input)
        .await?;
    Ok(CommandReport {
        payload: serde_json::to_value(info).context("Failed to serialize media info")?,
        exit_code: 0,
    })
}

/// Translate parsed arguments into a request
pub fn build_request(args: &CompressArgs) -> Result<TranscodeRequest, DomainError> {
    let mut request = TranscodeRequest::new(&args.input)
        .with_quality(QualityPreset::from_level(args.quality))
        .with_audio(!args.no_audio)
        .with_delete_origin(args.delete_origin)
        .with_trim(args.start, args.duration);
    if let Some(output) = &args.output {
        request = request.with_destination(output);
    }
    if let Some(bit_rate) = args.bitrate {
        request = request.with_bit_rate(bit_rate);
    }
    if let Some(frame_rate) = args.frame_rate {
        request = request.with_frame_rate(frame_rate);
    }
    if let Some(strategy) = &args.strategy {
        request = request.with_strategy(StrategyKind::parse(strategy)?);
    }
    Ok(request)
}

/// Progress sink for the configured style
pub fn progress_sink(style: ProgressStyle) -> Arc<dyn ProgressCallback> {
    match style {
        ProgressStyle::Console => Arc::new(ConsoleProgressCallback::new()),
        ProgressStyle::Json => Arc::new(JsonProgressCallback),
        ProgressStyle::None => Arc::new(NoOpProgressCallback),
    }
}

/// `{kind, message}` payload for a failure
pub fn error_payload(error: &anyhow::Error) -> Value {
    let kind = error
        .downcast_ref::<DomainError>()
        .map(DomainError::kind)
        .unwrap_or("error");
    json!({ "kind": kind, "message": error.to_string() })
}

fn report(outcome: Outcome) -> Result<CommandReport> {
    match outcome {
        Outcome::Completed { output_path, info } => {
            info!("Wrote {}", output_path.display());
            Ok(CommandReport {
                payload: serde_json::to_value(info).context("Failed to serialize media info")?,
                exit_code: 0,
            })
        }
        Outcome::Cancelled { info } => Ok(CommandReport {
            payload: serde_json::to_value(info).context("Failed to serialize media info")?,
            exit_code: EXIT_CANCELLED,
        }),
        Outcome::Failed { error } => Ok(CommandReport {
            payload: json!({ "kind": error.kind(), "message": error.to_string() }),
            exit_code: 1,
        }),
    }
}
