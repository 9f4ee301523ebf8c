//! Compile-and-run verification against sample cases.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::compare::{normalize_output, outputs_match};
use super::process::run_shell;
use super::scratch::ScratchSlot;
use super::{HarnessError, SampleOutcome, SampleReport, VerificationVerdict};
use crate::config::HarnessConfig;
use crate::events::{EventBus, SolverEvent};
use crate::task::{ContestKind, Sample};
use crate::util::preview;

/// Verifies generated programs in the shared scratch slot.
///
/// The slot lock is held for the whole verify call (stage, build, every
/// sample run), so concurrent callers are serialized rather than
/// overwriting each other's files.
#[derive(Clone)]
pub struct VerificationHarness {
    slot: Arc<Mutex<ScratchSlot>>,
    config: HarnessConfig,
    events: EventBus,
}

impl VerificationHarness {
    pub fn new(config: HarnessConfig, events: EventBus) -> Self {
        let slot = ScratchSlot::new(&config.scratch_dir, &config.program_file, &config.problem_file);
        Self {
            slot: Arc::new(Mutex::new(slot)),
            config,
            events,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Verify `source` against `samples`.
    pub async fn verify(
        &self,
        source: &str,
        samples: &[Sample],
        kind: ContestKind,
    ) -> Result<VerificationVerdict, HarnessError> {
        self.verify_with_problem(None, source, samples, kind).await
    }

    /// Verify `source`, also staging the problem text next to it.
    ///
    /// Order of checks:
    /// 1. no samples, standard contest, compile check disabled: skip without building
    /// 2. build; failure yields `CompileFailed` and no sample runs
    /// 3. heuristic contest: `SkippedHeuristicContest`
    /// 4. no samples: `SkippedNoSamples { compiled: true }`
    /// 5. run every sample, never stopping at the first failure
    pub async fn verify_with_problem(
        &self,
        problem: Option<&str>,
        source: &str,
        samples: &[Sample],
        kind: ContestKind,
    ) -> Result<VerificationVerdict, HarnessError> {
        let slot = self.slot.lock().await;
        slot.stage(problem, source).await?;

        if samples.is_empty() && kind == ContestKind::Standard && !self.config.build_without_samples
        {
            return Ok(self.skipped(VerificationVerdict::SkippedNoSamples { compiled: false }));
        }

        let build = run_shell(
            &self.config.build_command,
            slot.dir(),
            None,
            self.config.build_timeout,
        )
        .await?;

        if !build.success() {
            tracing::warn!(
                exit_code = ?build.exit_code,
                output = %preview(&build.output, 400),
                "Build failed"
            );
            self.events.publish(SolverEvent::CompileFailed {
                output: build.output.clone(),
            });
            return Ok(VerificationVerdict::CompileFailed {
                output: build.output,
            });
        }
        tracing::debug!(elapsed_ms = build.elapsed.as_millis() as u64, "Build succeeded");

        if kind == ContestKind::Heuristic {
            return Ok(self.skipped(VerificationVerdict::SkippedHeuristicContest));
        }
        if samples.is_empty() {
            return Ok(self.skipped(VerificationVerdict::SkippedNoSamples { compiled: true }));
        }

        let mut reports = Vec::with_capacity(samples.len());
        for sample in samples {
            let run = run_shell(
                &self.config.run_command,
                slot.dir(),
                Some(sample.input()),
                self.config.run_timeout,
            )
            .await?;

            let outcome = if !run.success() {
                SampleOutcome::RuntimeError {
                    exit_code: run.exit_code,
                    output: run.output,
                }
            } else if outputs_match(sample.expected(), &run.output) {
                SampleOutcome::Passed
            } else {
                SampleOutcome::Mismatch {
                    expected: normalize_output(sample.expected()),
                    actual: normalize_output(&run.output),
                }
            };

            self.publish_sample(sample.index(), &outcome);
            reports.push(SampleReport {
                index: sample.index(),
                outcome,
                elapsed: run.elapsed,
            });
        }

        Ok(verdict_from_reports(reports))
    }

    fn skipped(&self, verdict: VerificationVerdict) -> VerificationVerdict {
        let reason = verdict.summary();
        tracing::info!(reason = %reason, "Sample verification skipped");
        self.events.publish(SolverEvent::VerificationSkipped { reason });
        verdict
    }

    fn publish_sample(&self, index: usize, outcome: &SampleOutcome) {
        let detail = match outcome {
            SampleOutcome::Passed => {
                tracing::info!(sample = index, "Sample passed");
                self.events.publish(SolverEvent::SamplePassed { index });
                return;
            }
            SampleOutcome::RuntimeError { exit_code, output } => format!(
                "runtime error (exit {:?}): {}",
                exit_code,
                preview(output, 200)
            ),
            SampleOutcome::Mismatch { expected, actual } => format!(
                "expected {:?}, got {:?}",
                preview(expected, 100),
                preview(actual, 100)
            ),
        };
        tracing::warn!(sample = index, detail = %detail, "Sample failed");
        self.events.publish(SolverEvent::SampleFailed { index, detail });
    }
}

fn verdict_from_reports(reports: Vec<SampleReport>) -> VerificationVerdict {
    let first_failure = reports
        .iter()
        .find(|r| !r.outcome.passed())
        .map(|r| (r.index, r.outcome.clone()));

    match first_failure {
        None => VerificationVerdict::AllPassed { reports },
        Some((index, SampleOutcome::RuntimeError { .. })) => {
            VerificationVerdict::RuntimeError { index, reports }
        }
        Some((index, SampleOutcome::Mismatch { expected, actual })) => {
            VerificationVerdict::Mismatch {
                index,
                expected,
                actual,
                reports,
            }
        }
        Some((_, SampleOutcome::Passed)) => VerificationVerdict::AllPassed { reports },
    }
}
