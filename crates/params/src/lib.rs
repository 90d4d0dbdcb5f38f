//! Portal parameters and their height-scoped schedule.

mod errors;
mod params;
mod schedule;

pub use errors::{ParamsError, ParamsResult};
pub use params::PortalParams;
pub use schedule::{ParamsEntry, ParamsSchedule};
