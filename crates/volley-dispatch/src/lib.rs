//! Pre-warm, burst dispatch and batch orchestration.
//!
//! # Key Components
//!
//! - [`PreWarmPlanner`]: keep-alive probes at fixed lead times before the target
//! - [`BurstDispatcher`]: per-account flood loop over a [`DispatchWindow`]
//! - [`BatchOrchestrator`]: runs one dispatcher per account, settles all of them
//! - [`stats`]: reduces per-account results into a [`BatchResult`]
//!
//! # Dispatcher phases
//!
//! `Idle -> PreWarming -> WaitingForStart -> Firing -> Done`
//!
//! Only the pre-warm and wait phases can fail. Nothing inside the flood loop
//! propagates: order requests are spawned and never awaited by the loop.
//!
//! [`DispatchWindow`]: volley_core::DispatchWindow
//! [`BatchResult`]: volley_core::BatchResult

pub mod burst;
pub mod error;
pub mod orchestrator;
pub mod prewarm;
pub mod stats;

pub use burst::{BurstConfig, BurstDispatcher, CompletionSnapshot, CompletionStats, DispatchPhase};
pub use error::{BurstResult, DispatchError};
pub use orchestrator::{AccountCompletions, BatchOrchestrator, BatchRun};
pub use prewarm::{PreWarmConfig, PreWarmEntry, PreWarmPlan, PreWarmPlanner, PreWarmReport};
pub use stats::aggregate;
