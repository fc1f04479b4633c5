//! The two reconciliation loops.
//!
//! Each supervisor owns its pipeline pool outright and communicates with
//! the other only through the state registry, so either process can
//! restart without coordinating. Every tick derives the desired pipeline
//! set from current inputs alone; transitions are implicit.

pub mod input;
pub mod uplink;

pub use input::{INPUT_TICK, InputSupervisor};
pub use uplink::{UPLINK_TICK, UplinkSupervisor};
