//! Subcommand implementations.

use std::{fs, io, path::Path};

use anyhow::{Context, bail};
use portal_instructions::{Instruction, RawInstruction, ShardAction};
use portal_state::PortalSnapshot;
use portal_stf::{ProcessedBlock, process_instructions, produce_instructions};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::info;

use crate::args::{CmdContext, SubcDump, SubcInit, SubcProcess, SubcProduce, SubcRun, Subcommand};

pub(crate) fn exec_subc(subc: Subcommand, ctx: &CmdContext) -> anyhow::Result<()> {
    match subc {
        Subcommand::Init(cmd) => exec_init(cmd, ctx),
        Subcommand::Produce(cmd) => exec_produce(cmd, ctx),
        Subcommand::Process(cmd) => exec_process(cmd, ctx),
        Subcommand::Run(cmd) => exec_run(cmd, ctx),
        Subcommand::Dump(cmd) => exec_dump(cmd, ctx),
    }
}

fn exec_init(cmd: SubcInit, ctx: &CmdContext) -> anyhow::Result<()> {
    if let Some(height) = ctx.db.latest_height()? {
        bail!("store already holds a snapshot at height {height}");
    }
    let snap = PortalSnapshot::genesis(cmd.height);
    ctx.db.put_snapshot(&snap)?;
    info!(height = cmd.height, "initialized portal store");
    println!("{} {}", cmd.height, hex::encode(snap.digest()?));
    Ok(())
}

fn exec_produce(cmd: SubcProduce, ctx: &CmdContext) -> anyhow::Result<()> {
    let actions: Vec<ShardAction> = read_json(&cmd.actions)?;
    let insts = produce(ctx, actions)?;
    let raw = insts
        .iter()
        .map(Instruction::to_raw)
        .collect::<Result<Vec<_>, _>>()?;

    match cmd.output {
        Some(path) => write_json(&path, &raw)?,
        None => {
            serde_json::to_writer_pretty(io::stdout(), &raw)?;
            println!();
        }
    }
    Ok(())
}

fn exec_process(cmd: SubcProcess, ctx: &CmdContext) -> anyhow::Result<()> {
    let raw: Vec<RawInstruction> = read_json(&cmd.instructions)?;
    let insts = raw
        .iter()
        .map(Instruction::from_raw)
        .collect::<Result<Vec<_>, _>>()?;
    let block = process_and_store(ctx, &insts)?;
    print_head(&block.snapshot)
}

fn exec_run(cmd: SubcRun, ctx: &CmdContext) -> anyhow::Result<()> {
    let actions: Vec<ShardAction> = read_json(&cmd.actions)?;
    let insts = produce(ctx, actions)?;
    let block = process_and_store(ctx, &insts)?;
    print_head(&block.snapshot)
}

fn exec_dump(cmd: SubcDump, ctx: &CmdContext) -> anyhow::Result<()> {
    let snap = match cmd.height {
        Some(height) => ctx
            .db
            .get_snapshot(height)?
            .with_context(|| format!("no snapshot at height {height}"))?,
        None => latest_snapshot(ctx)?,
    };
    let out = json!({
        "height": snap.beacon_height(),
        "digest": hex::encode(snap.digest()?),
        "snapshot": snap,
    });
    serde_json::to_writer_pretty(io::stdout(), &out)?;
    println!();
    Ok(())
}

fn latest_snapshot(ctx: &CmdContext) -> anyhow::Result<PortalSnapshot> {
    ctx.db
        .get_latest_snapshot()?
        .context("store is empty, run `init` first")
}

fn produce(ctx: &CmdContext, actions: Vec<ShardAction>) -> anyhow::Result<Vec<Instruction>> {
    let prev = latest_snapshot(ctx)?;
    Ok(produce_instructions(&prev, &ctx.schedule, &ctx.db, actions)?)
}

fn process_and_store(ctx: &CmdContext, insts: &[Instruction]) -> anyhow::Result<ProcessedBlock> {
    let prev = latest_snapshot(ctx)?;
    let block = process_instructions(&prev, &ctx.schedule, insts)?;
    ctx.db.put_block(&block.snapshot, &block.statuses)?;
    Ok(block)
}

fn print_head(snap: &PortalSnapshot) -> anyhow::Result<()> {
    println!("{} {}", snap.beacon_height(), hex::encode(snap.digest()?));
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use portal_primitives::NATIVE_TOKEN_ID;
    use portal_state::StatusKind;
    use serde_json::Value;
    use tempfile::TempDir;

    use super::*;

    const UNIT: u64 = 1_000_000_000;

    fn open(dir: &Path) -> CmdContext {
        let params = dir.join("params.toml");
        fs::write(&params, include_str!("../params.sample.toml")).unwrap();
        CmdContext::open(&dir.join("data"), &params).unwrap()
    }

    fn write_actions(dir: &Path, name: &str, actions: Value) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, actions.to_string()).unwrap();
        path
    }

    fn bootstrap_actions() -> Value {
        json!([
            {
                "shard_id": 0,
                "index": 0,
                "tx_id": "tx-1-0",
                "action": {
                    "type": "exchange_rates",
                    "sender": "feeder-1",
                    "rates": { NATIVE_TOKEN_ID: 100, "pBNB": 100 },
                },
            },
            {
                "shard_id": 0,
                "index": 1,
                "tx_id": "tx-1-1",
                "action": {
                    "type": "custodian_deposit",
                    "custodian": "c1",
                    "asset": NATIVE_TOKEN_ID,
                    "amount": 5 * UNIT,
                    "remote_addresses": { "pBNB": "b1" },
                },
            },
        ])
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        let ctx = open(dir.path());
        exec_init(SubcInit { height: 0 }, &ctx).unwrap();
        assert!(exec_init(SubcInit { height: 3 }, &ctx).is_err());
        assert_eq!(ctx.db.latest_height().unwrap(), Some(0));
    }

    #[test]
    fn test_run_requires_init() {
        let dir = TempDir::new().unwrap();
        let ctx = open(dir.path());
        let actions = write_actions(dir.path(), "actions.json", json!([]));
        assert!(exec_run(SubcRun { actions }, &ctx).is_err());
    }

    #[test]
    fn test_run_stores_next_height() {
        let dir = TempDir::new().unwrap();
        let ctx = open(dir.path());
        exec_init(SubcInit { height: 0 }, &ctx).unwrap();

        let actions = write_actions(dir.path(), "actions.json", bootstrap_actions());
        exec_run(SubcRun { actions }, &ctx).unwrap();

        let snap = ctx.db.get_snapshot(1).unwrap().expect("height 1");
        let c1 = snap.custodian(&"c1".into()).expect("c1 registered");
        assert_eq!(c1.total_collateral(), 5 * UNIT);
        assert!(snap.final_exchange_rates().is_some());
        assert!(
            ctx.db
                .get_status(StatusKind::CustodianDeposit, "tx-1-1")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_produce_then_process_matches_run() {
        let run_dir = TempDir::new().unwrap();
        let run_ctx = open(run_dir.path());
        exec_init(SubcInit { height: 0 }, &run_ctx).unwrap();
        let actions = write_actions(run_dir.path(), "actions.json", bootstrap_actions());
        exec_run(SubcRun { actions }, &run_ctx).unwrap();

        let dir = TempDir::new().unwrap();
        let ctx = open(dir.path());
        exec_init(SubcInit { height: 0 }, &ctx).unwrap();
        let actions = write_actions(dir.path(), "actions.json", bootstrap_actions());
        let instructions = dir.path().join("instructions.json");
        exec_produce(
            SubcProduce {
                actions,
                output: Some(instructions.clone()),
            },
            &ctx,
        )
        .unwrap();
        exec_process(SubcProcess { instructions }, &ctx).unwrap();

        let expected = run_ctx.db.get_snapshot(1).unwrap().expect("run height 1");
        let got = ctx.db.get_snapshot(1).unwrap().expect("replayed height 1");
        assert_eq!(got.digest().unwrap(), expected.digest().unwrap());
    }
}
