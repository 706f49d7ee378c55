//! rv-stream - Streaming runtime for Rivulet
//!
//! This crate turns the trigger specs of a planned GROUP BY into live
//! triggers that decide, per grouping key, when aggregate state is emitted.
//! Trigger state is kept in an `rv-storage` transaction supplied by the
//! caller.

pub mod clock;
pub mod error;
pub mod state;
pub mod trigger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StreamError, StreamResult};
pub use trigger::{
    build_trigger, build_triggers, CountingTrigger, DelayTrigger, MultiTrigger, Trigger,
    WatermarkTrigger,
};
