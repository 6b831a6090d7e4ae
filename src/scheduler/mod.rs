//! Background timeout scheduler.
//!
//! Wakes on a fixed period, fires every due timeout in date order and
//! persists the queue after each one.

pub mod runner;

pub use runner::Scheduler;
