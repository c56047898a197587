//! priosim — Run the reference adaptive-priority experiment.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use prio_simulator::scenario::{parse_seed, SEED_ENV};
use prio_simulator::{
    run_sweep, HorizonPolicy, ResumePolicy, SimFormat, SimulationResult, Simulator, StreamId,
    TieBreak, NS_PER_UNIT,
};

mod experiment;

/// Tie-break between streams of equal effective priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum TieBreakArg {
    /// Longer queue wins, then the lowest stream key.
    #[default]
    LongerQueue,
    /// Lowest stream key wins.
    LowestKey,
    /// Earliest-arrived head task wins.
    OldestHead,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::LongerQueue => TieBreak::LongerQueue,
            TieBreakArg::LowestKey => TieBreak::LowestKey,
            TieBreakArg::OldestHead => TieBreak::OldestHead,
        }
    }
}

/// Service time of a task resumed after preemption.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum ResumeArg {
    /// Draw a fresh service time (default).
    #[default]
    Resample,
    /// Keep the service time left at the pause.
    Continue,
}

impl From<ResumeArg> for ResumePolicy {
    fn from(arg: ResumeArg) -> Self {
        match arg {
            ResumeArg::Resample => ResumePolicy::Resample,
            ResumeArg::Continue => ResumePolicy::Continue,
        }
    }
}

/// Where the run stops relative to the horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum HorizonArg {
    /// Never process an event past the horizon (default).
    #[default]
    Inclusive,
    /// Let the last event picked within the horizon finish past it.
    Overshoot,
}

impl From<HorizonArg> for HorizonPolicy {
    fn from(arg: HorizonArg) -> Self {
        match arg {
            HorizonArg::Inclusive => HorizonPolicy::Inclusive,
            HorizonArg::Overshoot => HorizonPolicy::Overshoot,
        }
    }
}

/// Simulate three task streams competing for one preemptive server.
#[derive(Parser)]
#[command(name = "priosim")]
struct Cli {
    /// Simulation horizon in time units.
    #[arg(long, default_value_t = 1000.0)]
    horizon: f64,

    /// PRNG seed (u64 integer or "entropy" for OS randomness).
    ///
    /// Every generator of every stream derives its own seed from this one.
    /// Falls back to PRIOSIM_SEED env var, then default (42).
    #[arg(long, env = SEED_ENV)]
    seed: Option<String>,

    /// Nanoseconds per time unit.
    #[arg(long, value_name = "NS", default_value_t = NS_PER_UNIT)]
    time_unit_ns: u64,

    #[arg(long, value_enum, default_value_t = TieBreakArg::LongerQueue)]
    tie_break: TieBreakArg,

    #[arg(long, value_enum, default_value_t = ResumeArg::Resample)]
    resume: ResumeArg,

    #[arg(long, value_enum, default_value_t = HorizonArg::Inclusive)]
    horizon_policy: HorizonArg,

    /// Stop after this many events.
    #[arg(long, value_name = "N")]
    event_limit: Option<u64>,

    /// Run one independent simulation per horizon, in parallel.
    ///
    /// Overrides --horizon. Example: --sweep 100,500,1000
    #[arg(long, value_delimiter = ',', value_name = "UNITS")]
    sweep: Vec<f64>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,

    /// Print trace events to stderr.
    #[arg(long)]
    dump_trace: bool,

    /// Print each stream's priority over time as CSV (stream,time,priority).
    #[arg(long, conflicts_with = "json")]
    priorities: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let seed = parse_seed(cli.seed.as_deref())
        .map_err(anyhow::Error::msg)
        .context("--seed")?;

    if !cli.sweep.is_empty() {
        return run_sweep_mode(cli, seed);
    }

    let scenario = experiment::builder(seed)
        .horizon_units(cli.horizon)
        .time_unit_ns(cli.time_unit_ns)
        .tie_break(cli.tie_break.into())
        .resume_policy(cli.resume.into())
        .horizon_policy(cli.horizon_policy.into())
        .event_limit(cli.event_limit)
        .build()
        .context("invalid configuration")?;

    let result = Simulator::new(scenario)
        .and_then(Simulator::run)
        .context("simulation failed")?;

    if cli.dump_trace {
        result.trace.dump();
    }

    if cli.priorities {
        print_priorities(&result);
    } else if cli.json {
        println!("{}", result.report().to_json()?);
    } else {
        print!("{}", result.report());
    }
    Ok(())
}

fn run_sweep_mode(cli: &Cli, seed: u64) -> Result<()> {
    if cli.dump_trace || cli.priorities {
        bail!("--dump-trace and --priorities are not available with --sweep");
    }
    let points = run_sweep(&cli.sweep, seed, |horizon, run_seed| {
        experiment::builder(run_seed)
            .horizon_units(horizon)
            .time_unit_ns(cli.time_unit_ns)
            .tie_break(cli.tie_break.into())
            .resume_policy(cli.resume.into())
            .horizon_policy(cli.horizon_policy.into())
            .event_limit(cli.event_limit)
            .build()
    });

    let mut reports = Vec::with_capacity(points.len());
    for point in points {
        let report = point
            .report
            .with_context(|| format!("sweep point horizon={}", point.horizon))?;
        reports.push(report);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            println!("=== horizon {} seed {} ===", report.horizon, report.seed);
            print!("{report}");
        }
    }
    Ok(())
}

fn print_priorities(result: &SimulationResult) {
    println!("stream,time,priority");
    for stream in &result.streams {
        let id: StreamId = stream.id();
        println!("{id},0,{}", stream.configured_priority());
        for (t, p) in result.trace.priority_series(id) {
            println!("{id},{},{p}", t as f64 / result.time_unit_ns as f64);
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .event_format(SimFormat)
        .with_writer(std::io::stderr)
        .try_init();
}
