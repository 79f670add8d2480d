//! # habit-tracker
//!
//! Habit lifecycle engine: habits with daily or weekly cycles, streaks that
//! survive only when every cycle is completed, a per-habit cycle scheduler
//! that closes cycles at midnight boundaries, and an append-only audit trail
//! of user actions.
//!
//! [`engine::HabitEngine`] is the entry point. It runs against the
//! [`store`] traits, backed in memory or by Postgres ([`db`]), and takes its
//! notion of time from an injected [`clock::Clock`].

pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod scheduler;
pub mod store;
pub mod streak;
pub mod telemetry;
