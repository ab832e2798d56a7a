//! CLI entry point for the station analytics tool.
//!
//! Provides subcommands for running the batch aggregation pipeline over the
//! snapshot archive and for polling the station-status API into that
//! archive.

use anyhow::Result;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use velostats::config::IngestConfig;
use velostats::fetch::{BasicClient, auth::UrlParam, fetch_bytes};
use velostats::ingest::{
    append_snapshots, parse_stations, partition_key, partition_path, to_snapshot, upload_body,
};
use velostats::loader::CsvDirLoader;
use velostats::model::RawSnapshot;
use velostats::pipeline::run::run_pipeline;
use velostats::sink::{JsonFileSink, S3Sink, Sink};

#[derive(Parser)]
#[command(name = "velostats")]
#[command(about = "Batch analytics over bike-share station snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the batch pipeline over the snapshot archive
    Run {
        /// Directory containing date-partitioned snapshot CSVs
        #[arg(short, long, default_value = "archive")]
        input_dir: String,

        /// Directory to write derived collections to
        #[arg(short, long, default_value = "out")]
        output_dir: String,

        /// Optional date (YYYY-MM-DD) to scope the run to one partition
        #[arg(long)]
        date: Option<String>,

        /// Optional: S3 bucket to write derived collections to instead of
        /// the local output directory
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Key prefix for S3 uploads
        #[arg(long, default_value = "aggregates")]
        s3_prefix: String,

        /// Gzip compress collections before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// Poll the station-status API into the snapshot archive
    Ingest {
        /// Directory to append date-partitioned snapshot CSVs to
        #[arg(short, long, default_value = "archive")]
        output_dir: String,

        /// Sample rate: poll the API every X seconds
        #[arg(short = 'r', long, default_value_t = 30)]
        sample_rate: u64,

        /// Number of samples to collect (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 1)]
        num_samples: usize,

        /// Optional: S3 bucket to upload the previous day's archive to
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Gzip compress archive files before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/velostats.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("velostats.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input_dir,
            output_dir,
            date,
            s3_bucket,
            s3_prefix,
            gzip,
        } => {
            let date = date
                .map(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d"))
                .transpose()?;

            let loader = CsvDirLoader::new(&input_dir);

            let sink: Box<dyn Sink> = match s3_bucket {
                Some(bucket) => {
                    info!(bucket = %bucket, prefix = %s3_prefix, gzip, "Writing collections to S3");
                    let config = aws_config::load_from_env().await;
                    Box::new(S3Sink::new(
                        aws_sdk_s3::Client::new(&config),
                        bucket,
                        s3_prefix,
                        gzip,
                    ))
                }
                None => Box::new(JsonFileSink::new(&output_dir)),
            };

            run_pipeline(&loader, sink.as_ref(), date).await?;
        }
        Commands::Ingest {
            output_dir,
            sample_rate,
            num_samples,
            s3_bucket,
            gzip,
        } => {
            ingest_loop(&output_dir, sample_rate, num_samples, s3_bucket, gzip).await?;
        }
    }

    Ok(())
}

/// Polls the station-status API at a fixed interval, appending each batch
/// of snapshots to the date-partitioned CSV archive and optionally
/// uploading the previous day's partition to S3 when the date rolls over.
///
/// A failed poll is logged and skipped; the loop itself carries no retry
/// state beyond waiting for the next sample.
#[tracing::instrument(skip(s3_bucket, gzip), fields(output_dir, sample_rate, num_samples))]
async fn ingest_loop(
    output_dir: &str,
    sample_rate: u64,
    num_samples: usize,
    s3_bucket: Option<String>,
    gzip: bool,
) -> Result<()> {
    let config = IngestConfig::from_env()?;

    let client = UrlParam {
        inner: BasicClient::new(),
        param_name: "apiKey".to_string(),
        key: config.api_key.clone(),
    };

    let s3_client = if s3_bucket.is_some() {
        let config = aws_config::load_from_env().await;
        Some(aws_sdk_s3::Client::new(&config))
    } else {
        None
    };

    if let Some(ref bucket) = s3_bucket {
        info!(bucket = %bucket, gzip, "S3 archive upload enabled");
    }

    std::fs::create_dir_all(output_dir)?;

    if num_samples == 0 {
        info!(sample_rate, "Sampling infinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, sample_rate, "Starting sample collection");
    }

    let mut sample_count = 0;
    let mut last_upload_date: Option<NaiveDate> = None;

    loop {
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }
        sample_count += 1;

        // Upload the previous day's partition once per calendar day.
        let today = Local::now().date_naive();
        if let (Some(bucket), Some(s3)) = (&s3_bucket, &s3_client) {
            if last_upload_date.is_none() || last_upload_date.unwrap() < today {
                if let Some(yesterday) = today.pred_opt() {
                    if let Err(e) = upload_partition(s3, bucket, output_dir, yesterday, gzip).await
                    {
                        error!(error = %e, date = %yesterday, "Failed to upload previous day's archive");
                    }
                    last_upload_date = Some(today);
                }
            }
        }

        info!(sample = sample_count, "Polling station API");

        match fetch_bytes(&client, &config.api_url).await {
            Ok(bytes) => match parse_stations(&bytes) {
                Ok(stations) => {
                    let now = Local::now().naive_local();
                    let snapshots: Vec<RawSnapshot> =
                        stations.iter().map(|s| to_snapshot(s, now)).collect();

                    let total_bikes: i64 = snapshots
                        .iter()
                        .filter_map(|s| s.num_bikes_available)
                        .sum();
                    let total_docks: i64 = snapshots
                        .iter()
                        .filter_map(|s| s.num_docks_available)
                        .sum();

                    let path = partition_path(output_dir, now.date());
                    if let Err(e) = append_snapshots(&path, &snapshots) {
                        error!(error = %e, "Failed to append snapshots to archive");
                    } else {
                        info!(
                            stations = snapshots.len(),
                            total_bikes, total_docks, "Batch archived"
                        );
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Station API response could not be parsed");
                }
            },
            Err(e) => {
                error!(error = %e, "Station API fetch failed");
            }
        }

        if num_samples == 0 || sample_count < num_samples {
            tokio::time::sleep(tokio::time::Duration::from_secs(sample_rate)).await;
        }
    }

    info!(output_dir, "Finished ingesting samples");
    Ok(())
}

/// Uploads one day's archive partition to S3, optionally gzip-compressed.
/// A day with no partition file is fine; there is nothing to upload yet.
#[tracing::instrument(skip(client), fields(bucket, output_dir, date = %date, gzip))]
async fn upload_partition(
    client: &aws_sdk_s3::Client,
    bucket: &str,
    output_dir: &str,
    date: NaiveDate,
    gzip: bool,
) -> Result<()> {
    let path = partition_path(output_dir, date);
    if !path.exists() {
        debug!(path = %path.display(), "No partition to upload");
        return Ok(());
    }

    let body = upload_body(&path, gzip)?;
    let key = partition_key("snapshots", date, gzip);

    client
        .put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(body))
        .send()
        .await?;

    info!(key, "Previous day's archive uploaded");
    Ok(())
}
