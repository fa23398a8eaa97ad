//! Async loops connecting the sampler to the pipeline.
//!
//! ```text
//! run_ingestion ──Reading──▶ mpsc ──▶ serve ──add──▶ Pipeline
//! ```
//!
//! Both loops stop when the shared `watch` flag turns `true`. The serve loop
//! is the only caller of [`Pipeline::add`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::reading::Reading;
use crate::sampler::Sampler;

/// Sample every `interval` and send each reading to `tx`.
///
/// The first sample is taken immediately. A failed sample is logged and
/// skipped. Returns [`PipelineError::ChannelClosed`] if the receiver goes
/// away before shutdown is signalled.
pub async fn run_ingestion(
    sampler: Arc<Sampler>,
    interval: Duration,
    tx: mpsc::Sender<Reading>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    log::info!("sampling {} every {interval:?}", sampler.name());

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => break,
            _ = ticker.tick() => {}
        }

        let s = Arc::clone(&sampler);
        let reading = match tokio::task::spawn_blocking(move || s.sample()).await? {
            Ok(reading) => reading,
            Err(failure) => {
                log::warn!("skipping sample: {failure}");
                continue;
            }
        };
        log::debug!("sampled in {:?}", reading.sample_latency);

        if tx.send(reading).await.is_err() {
            if *shutdown.borrow() {
                break;
            }
            log::error!("reading channel closed, ingestion stopped");
            return Err(PipelineError::ChannelClosed);
        }
    }

    log::info!("ingestion stopped");
    Ok(())
}

/// Feed every received reading into `pipeline`.
///
/// An `add` failure ends the loop and is returned. On shutdown or when the
/// channel closes, queued readings are drained and a final flush is
/// attempted before returning.
pub async fn serve(
    pipeline: Arc<Pipeline>,
    mut rx: mpsc::Receiver<Reading>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
    loop {
        let reading = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => break,
            received = rx.recv() => match received {
                Some(reading) => reading,
                None => break,
            },
        };
        if let Err(e) = add(&pipeline, reading).await {
            log::error!("serve loop stopped: {e}");
            return Err(e);
        }
    }

    rx.close();
    while let Ok(reading) = rx.try_recv() {
        if let Err(e) = add(&pipeline, reading).await {
            log::warn!("dropping queued readings: {e}");
            break;
        }
    }

    let p = Arc::clone(&pipeline);
    match tokio::task::spawn_blocking(move || p.flush()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("final flush failed: {e}"),
        Err(e) => log::warn!("final flush task failed: {e}"),
    }
    log::info!("serve loop stopped");
    Ok(())
}

async fn add(pipeline: &Arc<Pipeline>, reading: Reading) -> Result<(), PipelineError> {
    let p = Arc::clone(pipeline);
    tokio::task::spawn_blocking(move || p.add(reading)).await?
}
