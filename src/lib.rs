//! Small ledger for tracking how much time, or how many times, you spend on activities each day.
//! Keeps one entry per activity and day, rolls entries up into weeks and exports them as CSV.
//!

pub mod cli;
pub mod ledger;
pub mod rollover;
pub mod settings;
pub mod storage;
pub mod utils;
