//! End-to-end flows through the producer and the processor.

mod custodians;
mod determinism;
mod topup;
