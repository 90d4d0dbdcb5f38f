//! Instruction processor.

use portal_instructions::Instruction;
use portal_params::{ParamsSchedule, PortalParams};
use portal_state::{PortalSnapshot, RateConverter, StatusRecord};
use tracing::{debug, info};

use crate::{
    apply::apply_instruction, errors::StfResult, exchange_rates, reward, tracking::status_records,
};

/// Snapshot and status records resulting from one processed height.
#[derive(Clone, Debug)]
pub struct ProcessedBlock {
    pub snapshot: PortalSnapshot,
    pub statuses: Vec<StatusRecord>,
}

/// Replays a decided instruction list on top of `prev`.
///
/// Instructions apply strictly in the given order. Any instruction that
/// names a record the snapshot lacks aborts the whole height.
pub fn process_instructions(
    prev: &PortalSnapshot,
    schedule: &ParamsSchedule,
    instructions: &[Instruction],
) -> StfResult<ProcessedBlock> {
    let mut state = prev.advanced();
    let height = state.beacon_height();
    let params = schedule.params_at(height)?;

    let mut statuses = Vec::new();
    for inst in instructions {
        apply_instruction(&mut state, inst)?;
        debug!(
            height,
            meta = ?inst.meta_type(),
            status = %inst.status(),
            "applied portal instruction"
        );
        statuses.extend(status_records(inst, &state, height));
    }

    finalize_height(&mut state, params)?;
    state.check_invariants()?;
    info!(height, instructions = instructions.len(), "processed portal block");

    Ok(ProcessedBlock {
        snapshot: state,
        statuses,
    })
}

/// End-of-height bookkeeping: fixes the rate table and accumulates locked
/// collateral for the reward epoch.
pub fn finalize_height(state: &mut PortalSnapshot, params: &PortalParams) -> StfResult<()> {
    exchange_rates::finalize_exchange_rates(state);
    let rates = state.final_exchange_rates().cloned().unwrap_or_default();
    let conv = RateConverter::new(&rates, params);
    reward::accumulate_locked_collateral(state, &conv)
}
