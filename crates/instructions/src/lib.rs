//! Portal actions, instructions and the instruction wire format.

mod actions;
mod content;
mod instruction;
mod reject;
mod types;

pub use actions::{Action, RelayProof, RelayTransfer, ShardAction, canonicalize};
pub use content::*;
pub use instruction::{CodecError, CodecResult, Instruction, NO_SHARD, RawInstruction};
pub use reject::RejectReason;
pub use types::{InstStatus, MetaType};
