pub mod achievements;
pub mod common;
pub mod log;
pub mod queue;
pub mod stats;
pub mod sync;
