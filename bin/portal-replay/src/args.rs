//! Command line arguments for the `portal-replay` binary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use argh::FromArgs;
use portal_db_store_sled::{SLED_NAME, SledDbConfig, SledStore, open_sled_store};
use portal_db_types::PersistenceAdapter;
use portal_params::ParamsSchedule;

/// Args.
#[derive(FromArgs)]
pub(crate) struct Args {
    #[argh(option, description = "data directory (default cwd)", short = 'd')]
    pub(crate) datadir: Option<PathBuf>,

    #[argh(
        option,
        description = "params schedule file, .toml or .json",
        short = 'p'
    )]
    pub(crate) params: PathBuf,

    #[argh(switch, description = "emit logs as JSON")]
    pub(crate) json_logs: bool,

    #[argh(subcommand)]
    pub(crate) subc: Subcommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub(crate) enum Subcommand {
    Init(SubcInit),
    Produce(SubcProduce),
    Process(SubcProcess),
    Run(SubcRun),
    Dump(SubcDump),
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "init",
    description = "stores an empty genesis snapshot"
)]
pub(crate) struct SubcInit {
    #[argh(option, description = "genesis beacon height", default = "0")]
    pub(crate) height: u64,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "produce",
    description = "decides the instructions for the next height from a JSON action list"
)]
pub(crate) struct SubcProduce {
    #[argh(positional, description = "actions file (.json)")]
    pub(crate) actions: PathBuf,

    #[argh(
        option,
        description = "output file path .json (default stdout)",
        short = 'o'
    )]
    pub(crate) output: Option<PathBuf>,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "process",
    description = "replays a JSON instruction list and stores the next snapshot"
)]
pub(crate) struct SubcProcess {
    #[argh(positional, description = "instructions file (.json)")]
    pub(crate) instructions: PathBuf,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "run",
    description = "produces and processes the next height in one step"
)]
pub(crate) struct SubcRun {
    #[argh(positional, description = "actions file (.json)")]
    pub(crate) actions: PathBuf,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "dump",
    description = "prints a stored snapshot as JSON with its digest"
)]
pub(crate) struct SubcDump {
    #[argh(option, description = "beacon height (default latest)")]
    pub(crate) height: Option<u64>,
}

/// Everything a subcommand runs against.
#[derive(Debug)]
pub(crate) struct CmdContext {
    pub(crate) db: PersistenceAdapter<SledStore>,
    pub(crate) schedule: ParamsSchedule,
}

impl CmdContext {
    pub(crate) fn open(datadir: &Path, params: &Path) -> anyhow::Result<Self> {
        let schedule = ParamsSchedule::load_from_path(params)
            .with_context(|| format!("loading params from {}", params.display()))?;
        let store = open_sled_store(datadir, SLED_NAME, SledDbConfig::production())?;
        Ok(Self {
            db: PersistenceAdapter::new(store),
            schedule,
        })
    }
}

pub(crate) fn resolve_context_and_subcommand(
    args: Args,
) -> anyhow::Result<(CmdContext, Subcommand)> {
    let datadir = args.datadir.unwrap_or_else(|| PathBuf::from("."));
    let ctx = CmdContext::open(&datadir, &args.params)?;
    Ok((ctx, args.subc))
}
