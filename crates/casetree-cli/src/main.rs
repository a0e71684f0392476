//! `casetree` command-line entry point

use anyhow::{Context, Result};
use casetree_cli::{build_tree, load_case, load_replay, render, replay, IndexPreset};
use casetree_index::PumpConfig;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Command::new("casetree")
        .version(casetree_index::VERSION)
        .about("Browse grouped case results as a tree")
        .subcommand_required(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter used when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("show")
                .about("Print the tree for one grouped index")
                .arg(
                    Arg::new("case")
                        .long("case")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of case records"),
                )
                .arg(
                    Arg::new("index")
                        .long("index")
                        .default_value("interesting")
                        .value_parser(IndexPreset::NAMES)
                        .help("Grouped index to browse"),
                )
                .arg(
                    Arg::new("expand")
                        .long("expand")
                        .action(ArgAction::SetTrue)
                        .help("List the records inside every group"),
                )
                .arg(
                    Arg::new("events")
                        .long("events")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON array of ingest steps to replay after the first render"),
                )
                .arg(
                    Arg::new("channel-capacity")
                        .long("channel-capacity")
                        .default_value("64")
                        .value_parser(value_parser!(usize))
                        .help("Event pump queue depth"),
                ),
        );

    let matches = cli.get_matches();
    init_tracing(matches.get_one::<String>("log-level").map_or("info", String::as_str));

    match matches.subcommand() {
        Some(("show", args)) => show(args).await,
        _ => Ok(()),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn show(args: &ArgMatches) -> Result<()> {
    let case = args.get_one::<PathBuf>("case").context("missing --case")?;
    let preset: IndexPreset = args
        .get_one::<String>("index")
        .map_or("interesting", String::as_str)
        .parse()?;
    let expand = args.get_flag("expand");

    let store = load_case(case)?;
    let tree = build_tree(Arc::clone(&store), preset);
    print!("{}", render(&tree, expand)?);

    let Some(events) = args.get_one::<PathBuf>("events") else {
        return Ok(());
    };
    let steps = load_replay(events)?;
    let _changes = tree.on_structure_changed(|change| {
        tracing::info!(node = ?change.node, kind = ?change.kind, "tree changed");
    });

    let capacity = args.get_one::<usize>("channel-capacity").copied().unwrap_or(64);
    let config = PumpConfig::new().with_channel_capacity(capacity);
    let stats = replay(&store, Arc::clone(tree.index()), steps, config).await?;
    tracing::info!(
        events = stats.events,
        reloads = stats.reloads,
        degraded = stats.degraded,
        "replay finished"
    );

    println!();
    print!("{}", render(&tree, expand)?);
    Ok(())
}
