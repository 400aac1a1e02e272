//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

use std::process::ExitCode;

use clap::{App, Arg};
use oxidis::instance::{Config, Instance, LinkConfig};
use oxidis::packet::LevelType;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "oxidis=debug" } else { "oxidis=info" };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_directive.parse().unwrap())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn parse_config() -> Result<(Config, bool), String> {
    let matches = App::new("oxidisd")
        .version(env!("CARGO_PKG_VERSION"))
        .about("IS-IS routing daemon for LAN circuits")
        .arg(
            Arg::with_name("sysid")
                .short("s")
                .long("sysid")
                .value_name("SYSID")
                .help("System ID in ISO notation (e.g. 1921.6800.1001)")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("areaid")
                .short("a")
                .long("areaid")
                .value_name("AREA")
                .help("Area address in ISO notation (e.g. 49.0001)")
                .default_value("00")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("is-type")
                .long("is-type")
                .possible_values(&["l1", "l2", "l12"])
                .default_value("l1")
                .help("Levels the instance runs at"),
        )
        .arg(
            Arg::with_name("priority")
                .short("p")
                .long("priority")
                .value_name("PRIORITY")
                .default_value("64")
                .help("DIS priority (0-127)"),
        )
        .arg(
            Arg::with_name("hostname")
                .long("hostname")
                .value_name("NAME")
                .takes_value(true)
                .help("Hostname advertised in LSPs (defaults to the system hostname)"),
        )
        .arg(
            Arg::with_name("overload")
                .long("overload")
                .help("Set the overload bit in originated LSPs"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .arg(
            Arg::with_name("interfaces")
                .value_name("INTF")
                .multiple(true)
                .required(true)
                .help("Interfaces to run on (append :p2p for point-to-point)"),
        )
        .get_matches();

    let mut config = Config::default();

    let sysid = matches.value_of("sysid").unwrap();
    config.system_id = sysid
        .parse()
        .map_err(|_| format!("invalid System ID: {sysid}"))?;

    let areaid = matches.value_of("areaid").unwrap();
    config.area_addr = areaid
        .parse()
        .map_err(|_| format!("invalid area address: {areaid}"))?;

    config.level_type = match matches.value_of("is-type").unwrap() {
        "l1" => LevelType::L1,
        "l2" => LevelType::L2,
        _ => LevelType::All,
    };

    let priority = matches.value_of("priority").unwrap();
    config.priority = priority
        .parse::<u8>()
        .ok()
        .filter(|priority| *priority <= 127)
        .ok_or_else(|| format!("invalid priority: {priority}"))?;

    config.hostname = matches.value_of("hostname").map(str::to_owned);
    config.overload = matches.is_present("overload");

    for interface in matches.values_of("interfaces").unwrap() {
        let (name, p2p) = match interface.strip_suffix(":p2p") {
            Some(name) => (name, true),
            None => (interface, false),
        };
        config.interfaces.push(LinkConfig {
            name: name.to_owned(),
            p2p,
        });
    }

    Ok((config, matches.is_present("verbose")))
}

fn main() -> ExitCode {
    let (config, verbose) = match parse_config() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("oxidisd: {error}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(verbose);

    let instance = match Instance::start(config) {
        Ok(instance) => instance,
        Err(error) => {
            error.log();
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = instance.run() {
        error.log();
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
