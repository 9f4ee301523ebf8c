//! contest-solver - command-line entry point
//!
//! Loads tasks from the manifest, solves every selected task once and prints
//! the run report as JSON. Task names given as arguments restrict the run to
//! those tasks.

use std::sync::Arc;

use contest_solver::{
    config::Config,
    events::forward_events,
    generation::ModelFailover,
    harness::VerificationHarness,
    llm::GeminiClient,
    pipeline::{PipelineSettings, TaskPipeline},
    source::{DropDirSubmissionSink, ManifestProblemSource},
    EventBus, TaskSetController,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contest_solver=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: models={:?}, scratch={}, auto_submit={}",
        config.generation.preferred_models,
        config.harness.scratch_dir.display(),
        config.auto_submit
    );

    let shutdown = CancellationToken::new();
    let events = EventBus::default();

    // Mirror the event stream into the log as JSON lines.
    tokio::spawn(forward_events(events.subscribe(), |event| {
        if let Ok(line) = serde_json::to_string(&event) {
            tracing::debug!(target: "contest_solver::events", "{}", line);
        }
    }));

    let transport = Arc::new(GeminiClient::new(config.api_key.clone(), &config.api_base));
    let failover = ModelFailover::new(transport, config.generation.clone(), events.clone());
    let harness = VerificationHarness::new(config.harness.clone(), events.clone());
    let source = Arc::new(ManifestProblemSource::load(&config.tasks_file).await?);
    let sink = Arc::new(DropDirSubmissionSink::from_config(&config, shutdown.clone()));
    let pipeline = TaskPipeline::new(
        failover,
        harness,
        source,
        sink,
        PipelineSettings::from(&config),
        events.clone(),
    );
    let controller = TaskSetController::new(pipeline, events, shutdown.clone());

    controller.load_tasks().await?;
    let only: Vec<String> = std::env::args().skip(1).collect();
    if !only.is_empty() {
        controller.set_all_selected(false).await;
        for name in &only {
            if !controller.select(name, true).await {
                warn!("Unknown task '{}' ignored", name);
            }
        }
    }

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current task");
            signal_token.cancel();
        }
    });

    let report = controller.run().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
