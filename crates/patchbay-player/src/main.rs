//! Patchbay player
//!
//! Loads a saved patch with the built-in plugin library and evaluates it
//! frame by frame, inspects its structure or checks that it survives a
//! save and reload unchanged.

mod config;
mod player;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use config::PlayerConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn patch_arg() -> Arg {
    Arg::new("patch")
        .long("patch")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Patch document (JSON)")
}

fn cli() -> Command {
    Command::new("patchbay-player")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs saved Patchbay patches")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Evaluate a patch for a number of frames")
                .arg(patch_arg())
                .arg(
                    Arg::new("frames")
                        .long("frames")
                        .value_parser(value_parser!(u64))
                        .help("Number of frames to evaluate"),
                )
                .arg(
                    Arg::new("dt")
                        .long("dt")
                        .value_parser(value_parser!(f64))
                        .help("Seconds between frames"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Player configuration (TOML)"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the summary as JSON"),
                ),
        )
        .subcommand(
            Command::new("inspect")
                .about("Describe a patch's structure")
                .arg(patch_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("roundtrip")
                .about("Check that a patch saves identically after reloading")
                .arg(patch_arg()),
        )
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn patch_path(args: &ArgMatches) -> anyhow::Result<&Path> {
    args.get_one::<PathBuf>("patch")
        .map(PathBuf::as_path)
        .context("missing --patch")
}

fn run(args: &ArgMatches) -> anyhow::Result<bool> {
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    }
    .with_overrides(
        args.get_one::<u64>("frames").copied(),
        args.get_one::<f64>("dt").copied(),
    );
    init_tracing(&config.log_level);

    let (graph, _) = player::load_patch(patch_path(args)?, &config)?;
    let mut player = player::Player::new(graph, &config);
    let summary = player.run(config.frames, config.delta_t)?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Nodes:         {}", player.graph().node_count());
        println!("Frames:        {}", summary.frames);
        println!("Dirty frames:  {}", summary.dirty_frames);
        println!("Flow changes:  {}", summary.flow_changes);
        println!("Time:          {:.3}s", summary.abs_t);
    }
    Ok(true)
}

fn inspect(args: &ArgMatches) -> anyhow::Result<bool> {
    let config = PlayerConfig::default();
    init_tracing(&config.log_level);
    let (graph, report) = player::load_patch(patch_path(args)?, &config)?;
    let inspection = player::inspect(&graph, &report);

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(true);
    }

    println!("Graph {}", inspection.graph);
    println!("  Nodes:       {}", inspection.nodes);
    println!("  Connections: {}", inspection.connections);
    println!("  Roots:       {}", inspection.roots.join(", "));
    println!("  Subgraphs:   {}", inspection.children.join(", "));
    println!("  Variables:   {}", inspection.variables.join(", "));
    match &inspection.evaluation_order {
        Some(order) => println!("  Order:       {}", order.join(" -> ")),
        None => println!("  Order:       cyclic"),
    }
    for issue in &inspection.issues {
        println!("  ! {issue}");
    }
    Ok(!inspection.cyclic)
}

fn roundtrip(args: &ArgMatches) -> anyhow::Result<bool> {
    let config = PlayerConfig::default();
    init_tracing(&config.log_level);
    let (graph, _) = player::load_patch(patch_path(args)?, &config)?;
    let stable = player::round_trip(&graph)?;
    println!("Round trip: {}", if stable { "STABLE" } else { "CHANGED" });
    Ok(stable)
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let passed = match matches.subcommand() {
        Some(("run", args)) => run(args)?,
        Some(("inspect", args)) => inspect(args)?,
        Some(("roundtrip", args)) => roundtrip(args)?,
        _ => true,
    };
    std::process::exit(if passed { 0 } else { 1 });
}
