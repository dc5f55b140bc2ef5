//! Terminal user interface
//!
//! Ratatui front end over the sync engine.

mod app;
mod compose;
mod debug_log;
pub mod log_capture;
mod messages;
mod ui;

pub use app::run;
