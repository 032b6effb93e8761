pub mod runner;

pub use runner::{PnlRunner, RunOutcome, RunSettings};
