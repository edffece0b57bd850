//! Kafka Log Pager CLI
//!
//! Browses compacted Kafka partitions, or whole topics, one page at a time.

mod output;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kafka_pager_core::broker::KafkaLogReader;
use kafka_pager_core::config::{LoggingConfig, PagerConfig};
use kafka_pager_core::metrics::PagerMetrics;
use kafka_pager_core::model::{Partition, StartOffset};
use kafka_pager_core::pager::{PagerSettings, PartitionPager, TopicPager};
use kafka_pager_core::reader::LogReader;
use kafka_pager_core::watermarks::WatermarkOffsets;

/// Browse Kafka partitions page by page.
#[derive(Parser)]
#[command(name = "kafka-pager")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Override the configured page size.
    #[arg(long)]
    page_size: Option<u32>,

    /// Print Prometheus metrics after the command.
    #[arg(long)]
    print_metrics: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show one offset-linked page of a single partition.
    Partition {
        topic: String,
        partition: i32,

        /// Start offset of the page; -1 for the most recent page.
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        offset: StartOffset,

        /// Print the page as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one numbered page of several partitions merged together.
    Topic {
        topic: String,

        /// Page number, starting at 1.
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Partitions to merge; all partitions when omitted.
        #[arg(long, value_delimiter = ',')]
        partitions: Vec<i32>,

        /// Print the page as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show low and high watermarks.
    Watermarks {
        topic: String,

        /// Only this partition.
        #[arg(long)]
        partition: Option<i32>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = PagerConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config))?;

    // Apply CLI overrides
    if let Some(page_size) = args.page_size {
        config.pagination.page_size = page_size;
        config.pagination.validate()?;
    }

    // Override log level from verbosity flag
    let log_config = match args.verbose {
        0 => config.logging.clone(),
        1 => LoggingConfig {
            level: "debug".to_string(),
            ..config.logging.clone()
        },
        _ => LoggingConfig {
            level: "trace".to_string(),
            ..config.logging.clone()
        },
    };

    setup_tracing(&log_config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bootstrap_servers = ?config.kafka.bootstrap_servers,
        page_size = config.pagination.page_size,
        "starting kafka pager"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move { run(args, config).await })
}

fn setup_tracing(config: &LoggingConfig) {
    let level = match config.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Pages go to stdout, logs to stderr.
    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(args: Args, config: PagerConfig) -> anyhow::Result<()> {
    let settings = PagerSettings::from_config(&config.pagination)?;
    let reader: Arc<dyn LogReader> =
        Arc::new(KafkaLogReader::new(&config.kafka, settings.max_concurrent_reads));
    let metrics = Arc::new(PagerMetrics::new());

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("interrupt received, cancelling page request");
        cancel.cancel();
    });

    match args.command {
        Command::Partition {
            topic,
            partition,
            offset,
            json,
        } => {
            let mut pager = PartitionPager::new(Arc::clone(&reader), settings);
            if config.metrics.enabled {
                pager = pager.with_metrics(Arc::clone(&metrics));
            }

            let window = pager
                .page_cancellable(&topic, Partition(partition), offset, &token)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&window)?);
            } else {
                print!("{}", output::render_window(&window));
            }
        }

        Command::Topic {
            topic,
            page,
            partitions,
            json,
        } => {
            let mut pager = TopicPager::new(Arc::clone(&reader), settings);
            if config.metrics.enabled {
                pager = pager.with_metrics(Arc::clone(&metrics));
            }

            let result = if partitions.is_empty() {
                pager
                    .all_partitions_page_cancellable(&topic, page, &token)
                    .await?
            } else {
                let partitions: Vec<Partition> = partitions.into_iter().map(Partition).collect();
                pager
                    .topic_page_cancellable(&topic, &partitions, page, &token)
                    .await?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", output::render_topic_page(&result, page));
            }
        }

        Command::Watermarks {
            topic,
            partition,
            json,
        } => {
            let partitions = match partition {
                Some(partition) => vec![Partition(partition)],
                None => reader.partitions(&topic).await?,
            };

            let mut all = Vec::with_capacity(partitions.len());
            for partition in partitions {
                all.push(WatermarkOffsets::find(reader.as_ref(), &topic, partition).await?);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&all)?);
            } else {
                print!("{}", output::render_watermarks(&all));
            }
        }
    }

    if args.print_metrics {
        match metrics.encode() {
            Ok(text) => eprintln!("{text}"),
            Err(e) => warn!(error = %e, "failed to encode metrics"),
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
