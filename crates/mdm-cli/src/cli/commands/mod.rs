//! CLI command handlers, one file per command.

mod formats;
mod run;

pub use formats::run_formats;
pub use run::run_job;
