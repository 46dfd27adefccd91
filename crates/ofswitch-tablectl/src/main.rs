//! ofswitch-tablectl - flow table driver
//!
//! Builds a flow table from a configuration file (or the default double
//! hash table), fills it with random exact-match flows, optionally runs a
//! wildcard delete and a timeout sweep, and reports the table's statistics.

use anyhow::{Context, Result, bail};
use clap::Parser;
use ofswitch_table::{
    Datapath, InsertOutcome, RejectReason, SwTable, TableConfig, TableStats,
};
use ofswitch_types::{ExpiryReason, Flow, FlowKey, MacAddress, Wildcards};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Number of switch ports random flows are spread over.
const N_PORTS: u16 = 48;

/// Software switch flow table driver
#[derive(Parser, Debug)]
#[command(name = "ofswitch-tablectl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Table configuration file (YAML, or JSON with a .json extension)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of random exact-match flows to insert
    #[arg(short = 'n', long, default_value = "1024")]
    flows: usize,

    /// Idle timeout of inserted flows in seconds (0 = permanent)
    #[arg(long, default_value = "0")]
    idle_timeout: u16,

    /// Hard timeout of inserted flows in seconds (0 = permanent)
    #[arg(long, default_value = "0")]
    hard_timeout: u16,

    /// Delete every flow received on this port
    #[arg(long, value_name = "IN_PORT")]
    wildcard_delete: Option<u16>,

    /// Run a timeout sweep after loading
    #[arg(long)]
    sweep: bool,

    /// Wait this many seconds before the sweep (implies --sweep)
    #[arg(long, value_name = "SECS")]
    sweep_after: Option<u64>,

    /// Seed for the flow generator
    #[arg(long)]
    seed: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

/// Datapath that logs every expiry notification.
#[derive(Debug, Default)]
struct LoggingDatapath {
    expired: usize,
}

impl Datapath<Flow> for LoggingDatapath {
    fn send_flow_expired(&mut self, flow: &Flow, reason: ExpiryReason) {
        self.expired += 1;
        info!(
            key = %flow.key,
            %reason,
            packets = flow.packet_count(),
            bytes = flow.byte_count(),
            "flow expired"
        );
    }
}

/// Insert tallies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
struct LoadSummary {
    added: usize,
    replaced: usize,
    rejected: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    #[serde(flatten)]
    stats: TableStats,
    load: LoadSummary,
    wildcard_deleted: Option<usize>,
    expired: Option<usize>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("ofswitch-tablectl: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "ofswitch-tablectl failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {e}"))
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => TableConfig::from_path(path)
            .with_context(|| format!("loading table config {}", path.display()))?,
        None => TableConfig::default(),
    };
    let mut table = config.build::<Flow>().context("building flow table")?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let load = load_flows(table.as_mut(), &mut rng, args);
    info!(
        added = load.added,
        replaced = load.replaced,
        rejected = load.rejected,
        "loaded flows"
    );
    if load.rejected > 0 {
        warn!(rejected = load.rejected, "some flows found no free bucket");
    }

    let wildcard_deleted = args.wildcard_delete.map(|in_port| {
        let query = FlowKey::exact()
            .with_in_port(in_port)
            .with_wildcards(Wildcards::ALL.without(Wildcards::IN_PORT));
        let deleted = table.delete(&query, false);
        info!(in_port, deleted, "wildcard delete");
        deleted
    });

    let expired = if args.sweep || args.sweep_after.is_some() {
        if let Some(secs) = args.sweep_after {
            debug!(secs, "waiting before sweep");
            std::thread::sleep(Duration::from_secs(secs));
        }
        let mut dp = LoggingDatapath::default();
        let expired = table.timeout(&mut dp);
        if expired != dp.expired {
            bail!("sweep reported {expired} expiries but notified {}", dp.expired);
        }
        Some(expired)
    } else {
        None
    };

    let stats = table.stats();
    let walked = table.cursor().count();
    if walked != stats.n_flows {
        bail!("cursor visited {walked} flows but the table holds {}", stats.n_flows);
    }

    let report = Report {
        stats,
        load,
        wildcard_deleted,
        expired,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    table.destroy();
    Ok(())
}

fn load_flows(table: &mut dyn SwTable<Flow>, rng: &mut impl Rng, args: &Args) -> LoadSummary {
    let mut summary = LoadSummary::default();
    for _ in 0..args.flows {
        let flow = Flow::new(random_key(rng))
            .with_idle_timeout(args.idle_timeout)
            .with_hard_timeout(args.hard_timeout);
        match table.insert(flow) {
            Ok(InsertOutcome::Added) => summary.added += 1,
            Ok(InsertOutcome::Replaced) => summary.replaced += 1,
            Err(rejected) => {
                debug_assert_eq!(rejected.reason, RejectReason::BucketOccupied);
                summary.rejected += 1;
            }
        }
    }
    summary
}

/// Random exact-match key for an IPv4 TCP or UDP flow.
fn random_key(rng: &mut impl Rng) -> FlowKey {
    let mut src = [0u8; 6];
    let mut dst = [0u8; 6];
    rng.fill(&mut src);
    rng.fill(&mut dst);
    // Locally administered unicast.
    src[0] = (src[0] & 0xfc) | 0x02;
    dst[0] = (dst[0] & 0xfc) | 0x02;

    FlowKey::exact()
        .with_in_port(rng.gen_range(1..=N_PORTS))
        .with_dl_src(MacAddress::new(src))
        .with_dl_dst(MacAddress::new(dst))
        .with_dl_type(0x0800)
        .with_nw_src(Ipv4Addr::from(rng.gen::<u32>()))
        .with_nw_dst(Ipv4Addr::from(rng.gen::<u32>()))
        .with_nw_proto(if rng.gen_bool(0.5) { 6 } else { 17 })
        .with_tp_src(rng.gen_range(1024..=u16::MAX))
        .with_tp_dst(rng.gen())
}

fn print_report(report: &Report) {
    let stats = &report.stats;
    println!("table:     {}", stats.name);
    println!("flows:     {} / {}", stats.n_flows, stats.max_flows);
    println!(
        "loaded:    {} added, {} replaced, {} rejected",
        report.load.added, report.load.replaced, report.load.rejected
    );
    if let Some(deleted) = report.wildcard_deleted {
        println!("deleted:   {deleted}");
    }
    if let Some(expired) = report.expired {
        println!("expired:   {expired}");
    }
}
