#[macro_use]
extern crate log;

use std::process;

use anyhow::{Context, Result, bail, ensure};
use clap::{Arg, ArgMatches, Command, crate_version};
use toolkit::device_utils;
use toolkit_device::sim::SimulatedBackend;
use toolkit_device::{DeviceKind, current_precision};

mod report;

use crate::report::DeviceReport;

fn main() {
    let app = Command::new("toolkit-cli")
        .version(crate_version!())
        .about("Inspect and exercise compute device selection")
        .arg(
            Arg::new("verbosity")
                .short('v')
                .multiple_occurrences(true)
                .help("Sets the level of verbosity."),
        )
        .arg(Arg::new("simulate").long("simulate").takes_value(true).help(
            "Comma separated accelerator kinds (specialized, general) to simulate as available",
        ))
        .subcommand(
            Command::new("info")
                .about("Shows the selected device and the state of every device")
                .arg(Arg::new("json").long("json").help("Machine friendly output")),
        )
        .subcommand(
            Command::new("seed")
                .about("Seeds the default and selected device generators, then draws values")
                .arg(Arg::new("seed").required(true).takes_value(true).help("Seed value"))
                .arg(
                    Arg::new("count")
                        .short('n')
                        .long("count")
                        .takes_value(true)
                        .default_value("4")
                        .help("Number of values to draw"),
                ),
        )
        .subcommand(Command::new("empty-cache").about("Releases cached device memory"))
        .subcommand(
            Command::new("autocast").about("Shows the precision in effect inside autocast"),
        );

    let matches = app.get_matches();

    let level = match matches.occurrences_of("verbosity") {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env = env_logger::Env::default().default_filter_or(format!("toolkit={level}"));
    env_logger::Builder::from_env(env).format_timestamp_nanos().init();

    if let Err(e) = handle(&matches) {
        error!("{e:?}");
        process::exit(1)
    }
}

fn simulate(kinds: &str) -> Result<()> {
    for kind in kinds.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind: DeviceKind = kind.parse()?;
        ensure!(kind.is_accelerator(), "Only accelerators can be simulated, got {kind}");
        toolkit_device::runtime().register(Box::new(SimulatedBackend::new(kind, true)))?;
        info!("Simulating an available {kind} device");
    }
    Ok(())
}

fn handle(matches: &ArgMatches) -> Result<()> {
    // simulated backends must be in place before the real ones register
    if let Some(kinds) = matches.value_of("simulate") {
        simulate(kinds)?;
    }
    device_utils::init()?;

    match matches.subcommand() {
        Some(("info", m)) => {
            let report = DeviceReport::collect(toolkit_device::runtime())?;
            if m.is_present("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
        }
        Some(("seed", m)) => {
            let seed: u64 =
                m.value_of("seed").context("Missing seed")?.parse().context("Parsing seed")?;
            let count: usize =
                m.value_of("count").unwrap_or("4").parse().context("Parsing count")?;
            device_utils::manual_seed(seed)?;
            let generator = toolkit_device::runtime().default_generator();
            let mut values = vec![0f32; count];
            generator.fill_uniform(&mut values);
            for v in values {
                println!("{v}");
            }
        }
        Some(("empty-cache", _)) => {
            let released = device_utils::empty_cache()?;
            println!("Released {released} bytes from {}", device_utils::device_name()?);
        }
        Some(("autocast", _)) => {
            let kind = device_utils::get_device()?;
            let inside = device_utils::autocast_scope(|| current_precision(kind))?;
            println!("{kind}: {inside} inside autocast, {} outside", current_precision(kind));
        }
        Some((other, _)) => bail!("Unknown subcommand {other}"),
        None => bail!("No subcommand given, try --help"),
    }
    Ok(())
}
