//! Replay packed instruction traces through the BTB/RAS simulator and
//! write a prediction-accuracy report.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use btbsim::stats::BranchStats;
use btbsim::{BinaryTrace, Bpu, BpuConfig};

#[derive(Parser, Debug)]
#[command(
    name = "simulate-btb",
    about = "Trace-driven BTB/RAS branch prediction simulator"
)]
struct Args {
    /// Packed instruction trace files, replayed in order
    #[arg(required = true)]
    traces: Vec<PathBuf>,

    /// Output file for the simulation report
    #[arg(short, long, default_value = "btb.out")]
    output: PathBuf,

    /// Direction misprediction rate in percent
    #[arg(long, default_value_t = 20)]
    mispredict_rate: u8,

    /// Total BTB capacity in entries
    #[arg(long, default_value_t = 1024)]
    btb_capacity: usize,

    /// BTB associativity (1 = direct-mapped)
    #[arg(long, default_value_t = 4)]
    btb_assoc: usize,

    /// BTB tag width in bits
    #[arg(long, default_value_t = 12)]
    tag_bits: u32,

    /// RAS capacity in entries
    #[arg(long, default_value_t = 10)]
    ras_capacity: usize,

    /// Seed for the direction predictor's noise source
    #[arg(long)]
    seed: Option<u64>,

    /// Print the N most frequently executed branches to stdout
    #[arg(long, value_name = "N")]
    top_branches: Option<usize>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.output.as_os_str().is_empty() {
        bail!("output path must not be empty");
    }

    let cfg = BpuConfig {
        mispredict_rate: args.mispredict_rate,
        btb_capacity: args.btb_capacity,
        btb_assoc: args.btb_assoc,
        tag_bits: args.tag_bits,
        ras_capacity: args.ras_capacity,
    };
    let mut bpu = match args.seed {
        Some(seed) => Bpu::with_seed(&cfg, seed),
        None => Bpu::new(&cfg),
    }?;
    let mut stats = BranchStats::new();

    for path in &args.traces {
        let trace = BinaryTrace::from_file(path)
            .with_context(|| format!("failed to load trace {}", path.display()))?;
        for record in trace.records() {
            let pred = bpu.process(record);
            if record.is_control_flow() {
                stats.update(record, &pred);
            }
        }
    }

    let mut out = File::create(&args.output)
        .with_context(|| format!("failed to create output file {}", args.output.display()))?;
    writeln!(out, "===================================================")?;
    writeln!(out, "btbsim simulation results")?;
    write!(out, "{}", bpu.counters())?;
    let internal = bpu.report_internal();
    if !internal.is_empty() {
        write!(out, "{}", internal)?;
    }
    writeln!(out, "===================================================")?;

    if let Some(n) = args.top_branches {
        println!("Unique branches: {}", stats.num_unique_branches());
        println!(
            "  always taken: {}, never taken: {}",
            stats.num_always_taken(),
            stats.num_never_taken()
        );
        println!("{:>18} {:>12} {:>12} {:>8}", "pc", "executed", "taken", "hit%");
        for (pc, data) in stats.get_common_branches(n) {
            println!(
                "{:#018x} {:>12} {:>12} {:>7.2}%",
                pc,
                data.occ,
                data.times_taken(),
                data.hit_rate() * 100.0
            );
        }
    }

    Ok(())
}
