//! `bmpmon run`: the long-running sampling service.

use std::sync::Arc;

use bmpmon_core::{Pipeline, PipelineConfig, Sampler, SensorConfig, run_ingestion, serve};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};

use super::CliResult;

pub struct RunCommandConfig {
    pub pipeline: PipelineConfig,
    pub sensor: SensorConfig,
    pub simulate: bool,
    pub host: String,
    pub port: u16,
    pub serve_http: bool,
}

type TaskOutcome = (&'static str, CliResult);

/// Run the pipeline until interrupted or until one of its tasks fails.
pub fn run(config: RunCommandConfig) -> CliResult {
    let sampler = super::make_sampler(config.sensor, config.simulate)?;
    let pipeline = Arc::new(Pipeline::open(Arc::clone(&sampler), &config.pipeline)?);

    let base = format!("http://{}:{}", config.host, config.port);
    println!("bmpmon v{}", bmpmon_core::VERSION);
    println!("   sensor    {}", sampler.name());
    println!("   database  {}", config.pipeline.db_path.display());
    println!(
        "   buffer    {} readings, sampled every {:?}",
        config.pipeline.capacity, config.pipeline.interval
    );
    if config.serve_http {
        println!();
        println!("   Endpoints:");
        println!("     GET /json            Last 10 readings plus a live one (try: curl {base}/json)");
        println!("     GET /json/{{count}}    Last `count` readings plus a live one");
        println!("     GET /health          Buffer and store status");
    }
    println!();

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(supervise(Arc::clone(&pipeline), sampler, &config));

    // Final flush happens here, after every task has stopped.
    let closed = pipeline.close();
    result?;
    closed?;
    Ok(())
}

async fn supervise(pipeline: Arc<Pipeline>, sampler: Arc<Sampler>, config: &RunCommandConfig) -> CliResult {
    let (stop, shutdown) = watch::channel(false);
    let (tx, rx) = mpsc::channel(config.pipeline.channel_bound());

    let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
    let interval = config.pipeline.interval;
    let ingest_shutdown = shutdown.clone();
    tasks.spawn(async move {
        let result = run_ingestion(sampler, interval, tx, ingest_shutdown).await;
        ("ingestion", result.map_err(Into::into))
    });
    let serve_pipeline = Arc::clone(&pipeline);
    let serve_shutdown = shutdown.clone();
    tasks.spawn(async move {
        let result = serve(serve_pipeline, rx, serve_shutdown).await;
        ("serve loop", result.map_err(Into::into))
    });
    if config.serve_http {
        let host = config.host.clone();
        let port = config.port;
        tasks.spawn(async move {
            let result = bmpmon_server::run_server(pipeline, &host, port, shutdown).await;
            ("http server", result.map_err(Into::into))
        });
    }

    let mut first_error = None;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            log::info!("interrupt received, shutting down");
        }
        Some(joined) = tasks.join_next() => record(joined, &mut first_error),
    }

    let _ = stop.send(true);
    while let Some(joined) = tasks.join_next().await {
        record(joined, &mut first_error);
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Log a finished task and keep the first failure.
fn record(
    joined: Result<TaskOutcome, JoinError>,
    first_error: &mut Option<Box<dyn std::error::Error + Send + Sync>>,
) {
    match joined {
        Ok((name, Ok(()))) => log::debug!("{name} finished"),
        Ok((name, Err(e))) => {
            log::error!("{name} failed: {e}");
            if first_error.is_none() {
                *first_error = Some(e);
            }
        }
        Err(e) => {
            log::error!("task panicked: {e}");
            if first_error.is_none() {
                *first_error = Some(Box::new(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bmpmon_core::{ReadingStore, SqliteStore};

    fn config(db: std::path::PathBuf) -> RunCommandConfig {
        RunCommandConfig {
            pipeline: PipelineConfig {
                capacity: 2,
                interval: Duration::from_millis(10),
                db_path: db,
                ..PipelineConfig::default()
            },
            sensor: SensorConfig::default(),
            simulate: true,
            host: "127.0.0.1".to_string(),
            port: 0,
            serve_http: false,
        }
    }

    #[tokio::test]
    async fn test_supervise_stops_when_a_task_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config(tmp.path().join("storage.sqlite3"));
        let sampler = super::super::make_sampler(cfg.sensor, true).unwrap();
        let pipeline = Arc::new(Pipeline::open(Arc::clone(&sampler), &cfg.pipeline).unwrap());

        // Closing the pipeline makes the serve loop's first add fail.
        pipeline.close().unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            supervise(Arc::clone(&pipeline), sampler, &cfg),
        )
        .await
        .unwrap();
        assert!(result.unwrap_err().to_string().contains("closed"));
    }

    #[tokio::test]
    async fn test_supervise_with_zero_channel_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cfg = config(tmp.path().join("storage.sqlite3"));
        cfg.pipeline.channel_capacity = 0;
        let sampler = super::super::make_sampler(cfg.sensor, true).unwrap();
        let pipeline = Arc::new(Pipeline::open(Arc::clone(&sampler), &cfg.pipeline).unwrap());

        pipeline.close().unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            supervise(Arc::clone(&pipeline), sampler, &cfg),
        )
        .await
        .unwrap();
        assert!(result.unwrap_err().to_string().contains("closed"));
    }

    #[test]
    fn test_record_keeps_first_error() {
        let mut first = None;
        record(Ok(("a", Ok(()))), &mut first);
        assert!(first.is_none());
        record(Ok(("b", Err("boom".into()))), &mut first);
        record(Ok(("c", Err("later".into()))), &mut first);
        assert_eq!(first.unwrap().to_string(), "boom");
    }

    #[test]
    fn test_readings_persist_through_store() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("storage.sqlite3");
        let cfg = config(path.clone());
        let sampler = super::super::make_sampler(cfg.sensor, true).unwrap();
        let pipeline = Pipeline::open(Arc::clone(&sampler), &cfg.pipeline).unwrap();
        pipeline.add(sampler.sample().unwrap()).unwrap();
        pipeline.close().unwrap();

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
