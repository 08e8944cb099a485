use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use polars::prelude::*;
use shmem_telemetry::config::TelemetryConfig;
use shmem_telemetry::decoder_from_config;
use shmem_telemetry::poll::{Poller, SnapshotConsumer, StopHandle};
use shmem_telemetry::recorder::SnapshotRecorder;
use shmem_telemetry::source::{BufferSource, MmapSource};
use shmem_telemetry::store::ValueStore;
use shmem_telemetry::structdef::SnapshotDecoder;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Live telemetry reader for shared-memory structs described by a C header
#[derive(Parser)]
#[command(name = "shmem-telemetry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Configuration file (defaults are used if it does not exist)
    #[arg(short, long, global = true, default_value = "telemetry.toml")]
    config: PathBuf,

    /// Structure-definition header, overrides `schema.path`
    #[arg(long, global = true, value_name = "FILE")]
    header: Option<PathBuf>,

    /// Shared-memory segment or buffer dump, overrides `source.path`
    #[arg(long, global = true, value_name = "FILE")]
    buffer: Option<PathBuf>,

    /// Polling interval in milliseconds, overrides `poll.interval_ms`
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the decode plan inferred from the header
    Schema,

    /// Decode the buffer once and print every field
    Dump {
        /// Also print each field's raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Poll the buffer and print each new snapshot
    Watch {
        /// Stop after N ticks (default: run until the source is lost)
        #[arg(short = 'n', long)]
        ticks: Option<u64>,
    },

    /// Poll the buffer and save the samples as CSV or Parquet
    Record {
        /// Output file path
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Number of ticks to record
        #[arg(short = 'n', long, default_value_t = 100)]
        ticks: u64,

        /// Output format (auto-detected from extension if not specified)
        #[arg(short, long, value_enum)]
        format: Option<RecordFormat>,

        /// Compression for Parquet files
        #[arg(long, value_enum, default_value = "snappy")]
        compression: Compression,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum RecordFormat {
    Csv,
    Parquet,
}

#[derive(Debug, Clone, ValueEnum)]
enum Compression {
    Uncompressed,
    Snappy,
    Gzip,
    Lz4,
    Zstd,
}

fn to_parquet_compression(c: Compression) -> ParquetCompression {
    match c {
        Compression::Uncompressed => ParquetCompression::Uncompressed,
        Compression::Snappy => ParquetCompression::Snappy,
        Compression::Gzip => ParquetCompression::Gzip(None),
        Compression::Lz4 => ParquetCompression::Lz4Raw,
        Compression::Zstd => ParquetCompression::Zstd(None),
    }
}

/// Prints every published snapshot to stdout.
#[derive(Default)]
struct TerminalPrinter {
    updates: u64,
}

impl SnapshotConsumer for TerminalPrinter {
    fn notify(&mut self, store: &ValueStore) {
        let Some(snapshot) = store.current() else {
            return;
        };
        self.updates += 1;

        println!("--- update {} ---", self.updates);
        for (name, value) in snapshot.iter() {
            println!("  {:30} {}", name, value);
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::builder().parse_lossy(format!("shmem_telemetry={}", level))
    };

    let _ = tracing_subscriber::fmt::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn load_config(args: &CommonArgs) -> Result<TelemetryConfig> {
    let mut config = TelemetryConfig::from_file_or_default(&args.config)
        .with_context(|| format!("Failed to load config: {}", args.config.display()))?;

    if let Some(header) = &args.header {
        config.schema.path = header.clone();
    }
    if let Some(buffer) = &args.buffer {
        config.source.path = buffer.clone();
    }
    if let Some(interval_ms) = args.interval_ms {
        config.poll.interval_ms = interval_ms;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.common.verbose);

    let config = load_config(&cli.common)?;
    let decoder = decoder_from_config(&config).with_context(|| {
        format!(
            "Failed to infer layout from header: {}",
            config.schema.path.display()
        )
    })?;

    match cli.command {
        Commands::Schema => schema_command(&config, &decoder),

        Commands::Dump { hex } => dump_command(&config, &decoder, hex)?,

        Commands::Watch { ticks } => watch_command(&config, decoder, ticks)?,

        Commands::Record {
            output,
            ticks,
            format,
            compression,
        } => record_command(&config, decoder, output, ticks, format, compression)?,
    }

    Ok(())
}

fn open_source(config: &TelemetryConfig) -> Result<MmapSource> {
    MmapSource::open(&config.source.path).with_context(|| {
        format!(
            "Failed to open buffer source: {}",
            config.source.path.display()
        )
    })
}

fn schema_command(config: &TelemetryConfig, decoder: &SnapshotDecoder) {
    let plan = decoder.plan();

    println!(
        "\nSchema for {} (struct {}):",
        config.schema.path.display(),
        config.schema.struct_name
    );
    println!(
        "{} fields, {} bytes, {:?}-endian\n",
        plan.len(),
        plan.total_size(),
        decoder.endianness()
    );

    println!("  {:30} {:15} {:>8} {:>6}", "name", "type", "offset", "width");
    for entry in plan.entries() {
        println!(
            "  {:30} {:15} {:>8} {:>6}",
            entry.name,
            entry.kind.to_string(),
            entry.offset,
            entry.width()
        );
    }
}

fn dump_command(config: &TelemetryConfig, decoder: &SnapshotDecoder, hex: bool) -> Result<()> {
    let mut source = open_source(config)?;
    let bytes = source.read()?;

    println!(
        "Read {} bytes from {} (plan needs {})\n",
        bytes.len(),
        config.source.path.display(),
        decoder.plan().total_size()
    );

    for line in dump_lines(decoder, bytes, hex)? {
        println!("{}", line);
    }

    Ok(())
}

/// Decode `bytes` as a whole and format one line per snapshot field.
fn dump_lines(decoder: &SnapshotDecoder, bytes: &[u8], hex: bool) -> Result<Vec<String>> {
    let snapshot = decoder.decode(bytes).context("Failed to decode buffer")?;

    let mut lines = Vec::with_capacity(snapshot.len());
    for (name, value) in snapshot.iter() {
        match decoder.plan().entry(name).filter(|_| hex) {
            Some(entry) => {
                let raw = hex::encode(&bytes[entry.range()]);
                lines.push(format!("  {:30} {:20} {}", name, value.to_string(), raw));
            }
            None => lines.push(format!("  {:30} {}", name, value)),
        }
    }

    Ok(lines)
}

fn watch_command(
    config: &TelemetryConfig,
    decoder: SnapshotDecoder,
    ticks: Option<u64>,
) -> Result<()> {
    let source = open_source(config)?;
    let mut printer = TerminalPrinter::default();
    let stop = StopHandle::new();

    let mut poller = Poller::new(source, decoder, config.interval());
    poller.register(&mut printer);

    let stats = match ticks {
        Some(n) => poller.run_ticks(n, &stop),
        None => poller.run(&stop),
    }
    .context("Poll loop stopped")?;

    info!(
        ticks = stats.ticks,
        published = stats.published,
        "watch finished"
    );
    Ok(())
}

fn record_command(
    config: &TelemetryConfig,
    decoder: SnapshotDecoder,
    output: PathBuf,
    ticks: u64,
    format: Option<RecordFormat>,
    compression: Compression,
) -> Result<()> {
    // Determine output format before spending time polling
    let out_format = if let Some(f) = format {
        f
    } else {
        match output.extension().and_then(|s| s.to_str()) {
            Some("csv") => RecordFormat::Csv,
            Some("parquet") => RecordFormat::Parquet,
            _ => anyhow::bail!(
                "Cannot determine output format from extension. Use --format to specify."
            ),
        }
    };

    let source = open_source(config)?;
    let mut recorder = SnapshotRecorder::new(decoder.plan());

    println!(
        "Recording {} ticks from {} every {} ms...",
        ticks,
        config.source.path.display(),
        config.poll.interval_ms
    );
    let record_start = Instant::now();
    {
        let mut poller = Poller::new(source, decoder, config.interval());
        poller.register(&mut recorder);

        // Keep whatever was captured before the producer went away.
        if let Err(e) = poller.run_ticks(ticks, &StopHandle::new()) {
            if !e.is_source_loss() {
                return Err(e.into());
            }
            warn!(error = %e, "source lost, saving rows recorded so far");
        }
    }

    let mut df = recorder.build().context("Failed to build DataFrame")?;
    println!(
        "Recorded {} rows and {} columns ({:.3}s)",
        df.height(),
        df.width(),
        record_start.elapsed().as_secs_f64()
    );

    match out_format {
        RecordFormat::Csv => {
            let mut file = std::fs::File::create(&output)?;
            CsvWriter::new(&mut file).finish(&mut df)?;
            println!("Saved CSV: {}", output.display());
        }
        RecordFormat::Parquet => {
            let file = std::fs::File::create(&output)?;
            let save_start = Instant::now();
            ParquetWriter::new(file)
                .with_compression(to_parquet_compression(compression))
                .finish(&mut df)?;
            let save_duration = save_start.elapsed();
            println!(
                "Saved Parquet: {} ({:.3}s)",
                output.display(),
                save_duration.as_secs_f64()
            );
        }
    }

    Ok(())
}
