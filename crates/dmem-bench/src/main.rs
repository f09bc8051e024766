//! dmem bench - concurrent load generator for the buffer strategies.
//!
//! Runs W writers and R readers against each selected strategy, checks
//! every record a reader gets back, and prints latency distributions.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ScopedJoinHandle};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dmem_core::{DirectMemoryStrategy, StoreConfig, StrategyKind, RECORD_SIZE};
use dmem_metrics::{format_latency, ops_per_sec, OpRecorder, Stopwatch};
use dmem_proto::{Order, OrderType, Side};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Strategy to run ("all", or a name such as "optimistic")
    #[arg(short, long, default_value = "all")]
    strategy: String,

    /// Buffer capacity in bytes (overrides the config file)
    #[arg(short, long)]
    capacity: Option<usize>,

    /// Segment count for the segmented strategy (overrides the config file)
    #[arg(long)]
    segments: Option<usize>,

    /// Concurrent writer threads
    #[arg(short, long, default_value_t = 4)]
    writers: usize,

    /// Concurrent reader threads
    #[arg(short, long, default_value_t = 2)]
    readers: usize,

    /// Records each writer attempts
    #[arg(short = 'n', long, default_value_t = 4096)]
    records: u32,

    /// Write through the ring path, overwriting old records when full
    #[arg(long)]
    ring: bool,

    /// JSON file with a store configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit results as JSON lines instead of a table
    #[arg(long)]
    json: bool,

    /// Print full latency distributions per strategy
    #[arg(short, long)]
    verbose: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    Ok(())
}

fn load_config(args: &Args) -> Result<StoreConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => StoreConfig::default(),
    };
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }
    if let Some(segments) = args.segments {
        config.segment_count = segments;
    }
    config.validate()?;
    Ok(config)
}

fn selected_strategies(name: &str) -> Result<Vec<StrategyKind>> {
    if name.eq_ignore_ascii_case("all") {
        return Ok(StrategyKind::ALL.to_vec());
    }
    Ok(vec![name.parse()?])
}

/// Check every writer's id range `[w * records, (w + 1) * records)` fits in `u32`.
fn check_id_space(writers: usize, records: u32) -> Result<()> {
    u32::try_from(writers)
        .ok()
        .and_then(|writers| writers.checked_mul(records))
        .with_context(|| format!("{writers} writers x {records} records overflows the u32 order id space"))?;
    Ok(())
}

/// Join every writer, then release the readers, then report any failure.
///
/// Readers loop until `writers_done` is set, so it is set even when a
/// writer panicked; otherwise the enclosing scope would never finish.
fn join_writers(handles: Vec<ScopedJoinHandle<'_, OpRecorder>>, writers_done: &AtomicBool) -> Result<OpRecorder> {
    let joined: Vec<_> = handles.into_iter().map(ScopedJoinHandle::join).collect();
    writers_done.store(true, Ordering::Release);

    let mut writes = OpRecorder::new();
    for result in joined {
        let recorder = result.map_err(|_| anyhow::anyhow!("writer thread panicked"))?;
        writes.merge(&recorder)?;
    }
    Ok(writes)
}

/// Deterministic order for an id, so readers can verify what they decode.
fn synthetic_order(id: u32) -> Order {
    let side = if id % 2 == 0 { Side::Buy } else { Side::Sell };
    let order_type = if id % 5 == 0 { OrderType::Market } else { OrderType::Limit };
    Order::new(
        id,
        format!("SYM{:03}", id % 500),
        side,
        order_type,
        100.0 + f64::from(id % 1000) * 0.25,
        (id % 900) as i32 + 1,
        1_700_000_000_000 + i64::from(id),
    )
}

/// Outcome of one strategy run.
struct RunReport {
    strategy: StrategyKind,
    description: &'static str,
    writes: OpRecorder,
    reads: OpRecorder,
    corrupt: u64,
    elapsed_nanos: u64,
    status: String,
}

fn run(kind: StrategyKind, config: &StoreConfig, args: &Args) -> Result<RunReport> {
    let memory = kind.build(config)?;
    let memory: &dyn DirectMemoryStrategy = memory.as_ref();
    let slots = config.record_capacity();
    let watch = Stopwatch::new();
    let writers_done = AtomicBool::new(false);

    info!(
        strategy = %kind,
        description = memory.description(),
        writers = args.writers,
        readers = args.readers,
        "run started"
    );
    let started = Instant::now();

    let (writes, reads, corrupt) = thread::scope(|s| -> Result<_> {
        let writer_handles: Vec<_> = (0..args.writers)
            .map(|w| {
                let watch = watch.clone();
                s.spawn(move || {
                    let mut recorder = OpRecorder::new();
                    // Bounded by check_id_space
                    let base = w as u32 * args.records;
                    for i in 0..args.records {
                        let order = synthetic_order(base + i);
                        let (ok, nanos) = if args.ring {
                            watch.time(|| memory.serialize_ring(&order))
                        } else {
                            watch.time(|| memory.serialize(&order))
                        };
                        recorder.record(ok, nanos);
                    }
                    recorder
                })
            })
            .collect();

        let reader_handles: Vec<_> = (0..args.readers)
            .map(|r| {
                let watch = watch.clone();
                let writers_done = &writers_done;
                s.spawn(move || {
                    let mut recorder = OpRecorder::new();
                    let mut corrupt = 0u64;
                    let mut slot = r;
                    // One more sweep after writers finish so quiet buffers are read too
                    let mut last_pass = false;
                    while !last_pass {
                        last_pass = writers_done.load(Ordering::Acquire);
                        for _ in 0..slots.max(1) {
                            slot = (slot + 7919) % slots.max(1);
                            let (read, nanos) = watch.time(|| memory.deserialize_at(slot * RECORD_SIZE));
                            if let Some(order) = &read {
                                if *order != synthetic_order(order.id) {
                                    corrupt += 1;
                                }
                            }
                            recorder.record(read.is_some(), nanos);
                        }
                    }
                    (recorder, corrupt)
                })
            })
            .collect();

        let writes = join_writers(writer_handles, &writers_done)?;

        let mut reads = OpRecorder::new();
        let mut corrupt = 0;
        for handle in reader_handles {
            let (recorder, bad) = handle.join().map_err(|_| anyhow::anyhow!("reader thread panicked"))?;
            reads.merge(&recorder)?;
            corrupt += bad;
        }
        Ok((writes, reads, corrupt))
    })?;

    let elapsed_nanos = started.elapsed().as_nanos() as u64;
    if writes.failed > 0 {
        debug!(strategy = %kind, failed = writes.failed, "writes rejected (full or contended)");
    }

    Ok(RunReport {
        strategy: kind,
        description: memory.description(),
        writes,
        reads,
        corrupt,
        elapsed_nanos,
        status: memory.status().to_string(),
    })
}

fn print_table_header() {
    println!(
        "{:<12} {:>10} {:>8} {:>14} {:>12} {:>12} {:>10} {:>12} {:>8}",
        "strategy", "writes", "failed", "writes/s", "write p50", "write p99", "reads", "read p99", "corrupt"
    );
    println!("{}", "-".repeat(108));
}

fn print_row(report: &RunReport) {
    println!(
        "{:<12} {:>10} {:>8} {:>14.0} {:>12} {:>12} {:>10} {:>12} {:>8}",
        report.strategy.as_str(),
        report.writes.succeeded,
        report.writes.failed,
        ops_per_sec(report.writes.total(), report.elapsed_nanos),
        format_latency(report.writes.latency.p50()),
        format_latency(report.writes.latency.p99()),
        report.reads.succeeded,
        format_latency(report.reads.latency.p99()),
        report.corrupt,
    );
}

fn print_distributions(report: &RunReport) {
    println!();
    println!("{} - {}", report.strategy, report.description);
    report.writes.latency.print_summary("  write");
    report.reads.latency.print_summary("  read ");
}

fn print_json(report: &RunReport) -> Result<()> {
    let write = report.writes.latency.summary();
    let read = report.reads.latency.summary();
    let line = serde_json::json!({
        "strategy": report.strategy.as_str(),
        "description": report.description,
        "elapsed_nanos": report.elapsed_nanos,
        "writes": {
            "succeeded": report.writes.succeeded,
            "failed": report.writes.failed,
            "min": write.min,
            "p50": write.p50,
            "p99": write.p99,
            "p999": write.p999,
            "max": write.max,
        },
        "reads": {
            "found": report.reads.succeeded,
            "missed": report.reads.failed,
            "min": read.min,
            "p50": read.p50,
            "p99": read.p99,
            "max": read.max,
        },
        "corrupt": report.corrupt,
        "status": report.status,
    });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    check_id_space(args.writers, args.records)?;
    let config = load_config(&args)?;
    let strategies = selected_strategies(&args.strategy)?;
    info!(
        capacity = config.capacity,
        records = config.record_capacity(),
        segments = config.segment_count,
        ring = args.ring,
        "configuration loaded"
    );

    let mut reports = Vec::with_capacity(strategies.len());
    for kind in strategies {
        let report = run(kind, &config, &args)?;
        info!(
            strategy = %kind,
            status = %report.status,
            writes = %report.writes.latency.summary(),
            "run finished"
        );
        reports.push(report);
    }

    if args.json {
        for report in &reports {
            print_json(report)?;
        }
    } else {
        println!();
        print_table_header();
        for report in &reports {
            print_row(report);
        }
        if args.verbose {
            for report in &reports {
                print_distributions(report);
            }
        }
    }

    let corrupt: u64 = reports.iter().map(|r| r.corrupt).sum();
    if corrupt > 0 {
        warn!(corrupt, "readers observed inconsistent records");
        bail!("{corrupt} corrupt reads");
    }
    Ok(())
}
