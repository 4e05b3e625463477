pub mod config;
pub mod logging;

// Core engine modules
pub mod driver;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod job;
pub mod merge;
pub mod names;
pub mod phase;
pub mod publish;
pub mod retry;
pub mod storage;
pub mod store;
