//! lattice-integrate - drive an integrator lattice and print its output ramp
//!
//! Builds an X×Y×Z lattice where every row integrates its input cell along the
//! X axis, writes a constant input, and samples the output face once per tick.
//!
//! # Usage
//!
//! ```bash
//! # 20 ticks of a 0.5 input at the default 0.1s timestep
//! lattice-integrate --input 0.5 --ticks 20
//!
//! # Load dimensions/timestep from JSON, print a final snapshot
//! lattice-integrate --config lattice.json --snapshot
//!
//! # Run on the real scheduler thread instead of stepping manually
//! lattice-integrate --threaded --ticks 50
//! ```
//!
//! # Exit Codes
//!
//! - 0: Run completed without warnings
//! - 1: Run completed but some tick overflowed or divided by zero
//! - 2: Invalid arguments, config or lattice error

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use analog_lattice::{ConnectWord, CoreWord, Lattice, LatticeConfig, Warnings};

struct Options {
    config: Option<String>,
    input: f32,
    ticks: u64,
    timestep: Option<f64>,
    rows: Option<usize>,
    threaded: bool,
    snapshot: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    let options = match parse_args(std::env::args().skip(1)) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}\n", e);
            print_help();
            return ExitCode::from(2);
        }
    };

    match run(&options) {
        Ok(warnings) if warnings.is_empty() => ExitCode::SUCCESS,
        Ok(warnings) => {
            eprintln!("Completed with warnings: {}", warnings);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Option<Options>> {
    let mut options = Options {
        config: None,
        input: 0.5,
        ticks: 20,
        timestep: None,
        rows: None,
        threaded: false,
        snapshot: false,
    };

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .with_context(|| format!("{} requires a value", name))
        };
        match arg.as_str() {
            "-c" | "--config" => options.config = Some(value("--config")?),
            "-i" | "--input" => {
                options.input = value("--input")?.parse().context("--input expects a number")?
            }
            "-n" | "--ticks" => {
                options.ticks = value("--ticks")?.parse().context("--ticks expects an integer")?
            }
            "-t" | "--timestep" => {
                options.timestep =
                    Some(value("--timestep")?.parse().context("--timestep expects seconds")?)
            }
            "-r" | "--rows" => {
                options.rows = Some(value("--rows")?.parse().context("--rows expects an integer")?)
            }
            "--threaded" => options.threaded = true,
            "-s" | "--snapshot" => options.snapshot = true,
            "-h" | "--help" => return Ok(None),
            other => bail!("Unknown option: {}", other),
        }
    }
    Ok(Some(options))
}

fn build_config(options: &Options) -> anyhow::Result<LatticeConfig> {
    let mut config = match &options.config {
        Some(path) => LatticeConfig::load(path)?,
        None => LatticeConfig::with_dims(2, 1, 1).with_timestep(0.1),
    };
    if let Some(ts) = options.timestep {
        config.timestep = ts;
    }
    if let Some(rows) = options.rows {
        config.y = rows;
    }
    config.validate().context("Invalid lattice configuration")?;
    Ok(config)
}

fn run(options: &Options) -> anyhow::Result<Warnings> {
    let config = build_config(options)?;
    let lattice = if options.threaded {
        Lattice::init(config.clone())?
    } else {
        Lattice::manual(config.clone())?
    };

    // every row: input → x=1 integrator → feedthrough SUM cells → output
    for y in 0..config.y {
        for z in 0..config.z {
            lattice.program_core(1, y, z, CoreWord::INTEGRATE)?;
            lattice.program_connection(1, y, z, ConnectWord::NX | ConnectWord::FLOW_POS)?;
            for x in 2..config.x {
                lattice.program_core(x, y, z, CoreWord::SUM)?;
                lattice.program_connection(x, y, z, ConnectWord::NX | ConnectWord::FLOW_POS)?;
            }
            lattice.write_input(y, z, options.input)?;
        }
    }

    println!(
        "{}x{}x{} lattice, input {}, timestep {}s",
        config.x, config.y, config.z, options.input, config.timestep
    );
    println!("{:>6}  {:>10}", "tick", "output");

    let mut warnings = Warnings::NONE;
    for _ in 0..options.ticks {
        let report = if lattice.is_threaded() {
            let timeout = Duration::from_secs_f64((config.timestep * 100.0).max(1.0));
            if !lattice.wait_ticks(1, timeout) {
                bail!("scheduler made no progress within {:?}", timeout);
            }
            lattice.last_report()
        } else {
            lattice.step_tick()?
        };
        warnings |= report.warnings;
        let marker = if report.warnings.is_empty() { "" } else { "  !" };
        println!("{:>6}  {:>10.5}{}", report.tick, lattice.read_output(0, 0)?, marker);
    }

    if lattice.is_threaded() {
        println!("poll rate: {:.1} Hz", lattice.poll_rate());
    }
    if options.snapshot {
        println!("{}", lattice.snapshot()?.to_json()?);
    }
    lattice.destroy()?;
    Ok(warnings)
}

fn print_help() {
    eprintln!("lattice-integrate - Run an integrator lattice and print its output");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    lattice-integrate [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -c, --config <PATH>      JSON lattice config (default 2x1x1, 0.1s)");
    eprintln!("    -i, --input <VALUE>      Input charge written to every row (default 0.5)");
    eprintln!("    -n, --ticks <N>          Ticks to run (default 20)");
    eprintln!("    -t, --timestep <SECS>    Override the timestep");
    eprintln!("    -r, --rows <N>           Override the Y extent");
    eprintln!("        --threaded           Use the scheduler thread instead of manual ticks");
    eprintln!("    -s, --snapshot           Print a JSON snapshot after the run");
    eprintln!("    -h, --help               Print this help message");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    Completed without warnings");
    eprintln!("    1    Completed with overflow or division warnings");
    eprintln!("    2    Invalid arguments, config or lattice error");
}
