// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use worker_state::config::StateConfig;
use worker_state::state::{
    BundleStates, JsonStateCommitter, LifecycleState, LogDiagnostics, StateCommitter,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// State file to operate on (defaults to $WORKER_STATE_PATH)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,

    /// Write indented JSON on commit
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the committed state
    Show {
        /// JSON value to print if the record is missing or unreadable
        #[arg(short, long)]
        default: Option<String>,
    },
    /// Print record location, size and modification time
    Info,
    /// Record a bundle's lifecycle state and commit it
    Set {
        /// Bundle id
        bundle: String,
        /// One of created, staged, running, ready, failed
        state: String,
    },
    /// Replace the committed state with a JSON value
    Commit {
        /// The new state, as JSON
        value: String,
    },
}

fn open_committer<T>(config: &StateConfig) -> JsonStateCommitter<T> {
    JsonStateCommitter::from_config(config, Arc::new(LogDiagnostics))
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = match args.path {
        Some(path) => StateConfig::new(path),
        None => StateConfig::from_env()?,
    };
    config.pretty |= args.pretty;

    log::info!("Using state file: {}", config.path.display());

    match args.command {
        Commands::Show { default } => {
            let committer = open_committer::<Value>(&config);
            let fallback = default
                .map(|raw| serde_json::from_str::<Value>(&raw))
                .transpose()
                .context("--default is not valid JSON")?;

            let state = committer.load(fallback)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Commands::Info => {
            let committer = open_committer::<Value>(&config);
            println!("path: {}", committer.path().display());
            match committer.record_info() {
                Some(info) => println!("record: {}", info),
                None => println!("record: absent"),
            }
        }
        Commands::Set { bundle, state } => {
            let state: LifecycleState = state.parse()?;
            let committer = open_committer::<BundleStates>(&config);

            let mut bundles = committer.load(Some(BundleStates::new()))?;
            let previous = bundles.get(&bundle);
            bundles.record(bundle.as_str(), state)?;
            committer.commit(&bundles)?;

            match previous {
                Some(prev) => println!("{}: {} -> {}", bundle, prev, state),
                None => println!("{}: {}", bundle, state),
            }
        }
        Commands::Commit { value } => {
            let value: Value = serde_json::from_str(&value).context("value is not valid JSON")?;
            open_committer::<Value>(&config).commit(&value)?;
            println!("Committed state to {}", config.path.display());
        }
    }

    Ok(())
}
