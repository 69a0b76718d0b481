//! Portfolio Race Bot
//!
//! A Telegram bot that values brokerage accounts, tracks their relative
//! performance over time and reports on schedule or on demand.
//!
//! ## Architecture
//!
//! ```text
//! Broker API → Valuation (rates, positions, stop distance)
//!                  ↓
//!           Inception P&L (cash-flow replay)
//!                  ↓
//!           Race store (daily CSV) → Race report (ranking vs baseline)
//!                  ↓
//!           Scheduler / Telegram commands → Notifier
//! ```

pub mod broker;
pub mod config;
pub mod error;
pub mod notify;
pub mod pnl;
pub mod quote;
pub mod race;
pub mod rates;
pub mod report;
pub mod scheduler;
pub mod telegram;
pub mod types;
pub mod valuation;
