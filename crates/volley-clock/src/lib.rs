//! Venue clock synchronization and deadline scheduling.
//!
//! Every deadline in volley is expressed in the venue's clock. This crate
//! measures the offset between the local clock and the venue once
//! ([`ClockSync`]), hands out [`AdjustedClock`] values carrying that offset, and
//! turns venue-clock deadlines into local sleeps ([`DeadlineScheduler`]).

pub mod clock;
pub mod error;
pub mod scheduler;
pub mod sync;
pub mod target;

pub use clock::{Clock, MockClock, SystemClock};
pub use error::{ClockError, ClockResult};
pub use scheduler::{DeadlineScheduler, SchedulerConfig, WaitOutcome};
pub use sync::{AdjustedClock, ClockOffset, ClockSync, MockTimeProbe, TimeProbe};
pub use target::{build_target_instant, format_in_offset};
