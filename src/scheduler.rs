//! Periodic driver for the reconciliation passes.
//!
//! One loop owns both timers and awaits each pass to completion before
//! taking the next tick, so passes never overlap. A failed pass is logged and
//! the loop carries on.

use std::future::Future;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::config::Config;
use crate::context::ServiceContext;
use crate::drift;
use crate::linking;
use crate::responses;

/// Runs the link pass, then the response pass. Errors are logged.
pub async fn link_tick(ctx: &ServiceContext, config: &Config) {
    match linking::reconcile_links(ctx, config).await {
        Ok(report) => {
            info!(
                processed = report.processed(),
                linked = report.linked.len(),
                "link pass finished"
            );
        }
        Err(e) => error!(error = %e, "link pass failed"),
    }
    match responses::reconcile_responses(ctx, config).await {
        Ok(report) => {
            info!(
                processed = report.processed(),
                completed = report.completed.len(),
                "response pass finished"
            );
        }
        Err(e) => error!(error = %e, "response pass failed"),
    }
}

/// Runs drift detection over the configured window and sends the digest.
pub async fn drift_tick(ctx: &ServiceContext, config: &Config) {
    match drift::run_drift_pass(ctx, config, config.drift.window_days).await {
        Ok(report) => info!(
            checked = report.entries.len(),
            unchanged = report.unchanged().len(),
            "drift pass finished"
        ),
        Err(e) => error!(error = %e, "error during team assigned pass"),
    }
}

/// Runs every pass once, in order.
pub async fn run_once(ctx: &ServiceContext, config: &Config) {
    link_tick(ctx, config).await;
    drift_tick(ctx, config).await;
}

/// Ticks both timers until `shutdown` completes. Both timers fire once at start.
pub async fn run_until<F>(ctx: &ServiceContext, config: &Config, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut link_timer = interval(Duration::from_secs(config.schedule.link_interval_secs));
    let mut drift_timer = interval(Duration::from_secs(config.schedule.drift_interval_secs));
    link_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    drift_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(
        link_secs = config.schedule.link_interval_secs,
        drift_secs = config.schedule.drift_interval_secs,
        "scheduler started"
    );
    loop {
        tokio::select! {
            biased;
            _ = link_timer.tick() => link_tick(ctx, config).await,
            _ = drift_timer.tick() => drift_tick(ctx, config).await,
            () = &mut shutdown => break,
        }
    }
    info!("scheduler stopped");
}

/// Ticks until Ctrl-C.
pub async fn run(ctx: &ServiceContext, config: &Config) {
    run_until(ctx, config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryServices;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn first_ticks_run_every_pass_once_then_stop() {
        let services = MemoryServices::new(Utc.with_ymd_and_hms(2024, 5, 11, 9, 0, 0).unwrap());
        let mut config = Config::default();
        config.drift.digest_recipients = vec!["lead@x.org".into()];
        config.schedule.link_interval_secs = 3600;
        config.schedule.drift_interval_secs = 3600;
        services.store(&config.cases.site_url);
        let hub = services.store(&config.hub.site_url);
        hub.insert(
            &config.hub.requests_list,
            "42",
            Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
            json!({"Title": "HR-42", "Status": "Pending"}),
        );
        let ctx = services.context();

        run_until(&ctx, &config, tokio::time::sleep(Duration::from_millis(50))).await;

        let sent = services.outbox.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, config.templates.digest_subject);
    }

    #[tokio::test]
    async fn failing_passes_do_not_stop_the_loop() {
        let services = MemoryServices::new(Utc::now());
        let config = Config::default();
        let ctx = services.context();
        // No stores are registered, so every pass fails to connect.
        run_until(&ctx, &config, tokio::time::sleep(Duration::from_millis(20))).await;
        assert!(services.outbox.sent().is_empty());
    }
}
