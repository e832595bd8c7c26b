//! Batch scheduler: runs every identifier of a request through the lookup
//! pipeline with bounded concurrency and forwards results to a sink.

use std::time::Duration;

use appads_core::{AppConfig, Identifier, RunState};
use appads_lookup::LookupPipeline;
use appads_match::MatchEngine;
use appads_stream::{EmitError, ResultSink};
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use uuid::Uuid;

use crate::housekeeping::MemoryMonitor;

/// Per-run state threaded through the scheduler and its sink.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub state: RunState,
    pub debug_mode: bool,
}

impl RunContext {
    pub fn new(total_expected: usize, debug_mode: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            state: RunState::new(total_expected),
            debug_mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Identifiers per housekeeping window.
    pub window_size: usize,
    /// Lookups in flight at once; also the group size.
    pub concurrency: usize,
    pub group_delay: Duration,
    pub heartbeat_interval: Duration,
    pub min_available_memory_mb: u64,
}

impl SchedulerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            window_size: config.batch_window_size,
            concurrency: config.max_concurrency,
            group_delay: Duration::from_millis(config.group_delay_ms),
            heartbeat_interval: Duration::from_millis(config.heartbeat_interval_ms),
            min_available_memory_mb: config.min_available_memory_mb,
        }
    }
}

/// Splits identifiers into windows, each window into groups of at most
/// `concurrency`, and awaits every group before starting the next.
///
/// Results are forwarded in completion order. A failed lookup is a result
/// like any other; only a sink failure ends the run early.
pub struct BatchScheduler {
    pipeline: LookupPipeline,
    settings: SchedulerSettings,
}

impl BatchScheduler {
    pub fn new(pipeline: LookupPipeline, mut settings: SchedulerSettings) -> Self {
        settings.window_size = settings.window_size.max(1);
        settings.concurrency = settings.concurrency.max(1);
        settings.heartbeat_interval = settings.heartbeat_interval.max(Duration::from_millis(1));
        Self { pipeline, settings }
    }

    /// Runs the batch to completion, writing the document into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`EmitError::Closed`] when the consumer disconnects; in-flight
    /// lookups are dropped and no further group starts. Any other emit error
    /// is written to the sink as an in-band marker before being returned.
    pub async fn run<S: ResultSink>(
        &self,
        identifiers: &[Identifier],
        engine: &MatchEngine,
        ctx: &mut RunContext,
        sink: &mut S,
    ) -> Result<(), EmitError> {
        tracing::info!(
            run_id = %ctx.run_id,
            identifiers = identifiers.len(),
            criteria_sets = engine.criteria().len(),
            concurrency = self.settings.concurrency,
            "extraction run started"
        );

        let outcome = self.drive(identifiers, engine, ctx, sink).await;

        match &outcome {
            Ok(()) => tracing::info!(
                run_id = %ctx.run_id,
                processed = ctx.state.processed,
                success = ctx.state.success,
                error = ctx.state.error,
                matched = ctx.state.matched,
                elapsed_ms = (Utc::now() - ctx.started_at).num_milliseconds(),
                "extraction run finished"
            ),
            Err(err) if err.is_closed() => tracing::warn!(
                run_id = %ctx.run_id,
                processed = ctx.state.processed,
                total = ctx.state.total_expected,
                "client disconnected; run cancelled"
            ),
            Err(err) => {
                tracing::error!(run_id = %ctx.run_id, error = %err, "extraction run failed");
                if let Err(abort_err) = sink.abort(&err.to_string()).await {
                    tracing::debug!(
                        run_id = %ctx.run_id,
                        error = %abort_err,
                        "could not write stream error marker"
                    );
                }
            }
        }
        outcome
    }

    async fn drive<S: ResultSink>(
        &self,
        identifiers: &[Identifier],
        engine: &MatchEngine,
        ctx: &mut RunContext,
        sink: &mut S,
    ) -> Result<(), EmitError> {
        sink.open().await?;

        let mut memory = MemoryMonitor::new(self.settings.min_available_memory_mb);
        let mut groups_started = 0usize;

        for (window, batch) in identifiers.chunks(self.settings.window_size).enumerate() {
            memory.check(window);

            for group in batch.chunks(self.settings.concurrency) {
                if groups_started > 0 && !self.settings.group_delay.is_zero() {
                    tokio::time::sleep(self.settings.group_delay).await;
                }
                tracing::debug!(
                    run_id = %ctx.run_id,
                    window,
                    group = groups_started,
                    size = group.len(),
                    "group started"
                );
                self.run_group(group, engine, ctx, sink).await?;
                groups_started += 1;
            }
        }

        sink.close(&ctx.state).await
    }

    async fn run_group<S: ResultSink>(
        &self,
        group: &[Identifier],
        engine: &MatchEngine,
        ctx: &mut RunContext,
        sink: &mut S,
    ) -> Result<(), EmitError> {
        let pipeline = &self.pipeline;
        let mut in_flight: FuturesUnordered<_> = group
            .iter()
            .map(|identifier| pipeline.process(identifier, engine))
            .collect();

        let period = self.settings.heartbeat_interval;
        let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                next = in_flight.next() => {
                    let Some(result) = next else { break };
                    if ctx.debug_mode {
                        tracing::info!(
                            run_id = %ctx.run_id,
                            identifier = %result.identifier,
                            success = result.is_success(),
                            matched = result.is_match(),
                            "lookup result"
                        );
                    }
                    sink.accept(&result).await?;
                    ctx.state.record(&result);
                }
                _ = heartbeat.tick() => {
                    sink.heartbeat().await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
