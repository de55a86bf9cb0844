//! External animation executables and the fallback chain that orders them.

pub mod chain;
pub mod runner;
pub mod tier;

pub use chain::{FallbackChain, TierSuccess};
pub use runner::{ExitReport, PipelineRunner, ProcessRunner};
pub use tier::{Invocation, Tier, default_tiers};
