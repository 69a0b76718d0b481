//! Broker data source abstraction
//!
//! The computation core only talks to the brokerage through [`BrokerData`];
//! the REST client in [`invest_api`] is the production implementation.

pub mod invest_api;

pub use invest_api::InvestApiClient;

use crate::error::Result;
use crate::types::{CashFlow, Position};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Read-only view of the brokerage used by valuation, P&L and the race.
///
/// Every method degrades rather than aborts: a missing price or rate is
/// `Ok(None)`, only transport/API failures are `Err`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerData: Send + Sync {
    /// Current holdings of one account, cash positions included
    async fn list_positions(&self, account_id: &str) -> Result<Vec<Position>>;

    /// Last trade price for an instrument, if the market has one
    async fn current_price(&self, instrument_id: &str) -> Result<Option<Decimal>>;

    /// Conversion rate of a foreign currency to the home currency
    async fn fx_rate(&self, currency: &str) -> Result<Option<Decimal>>;

    /// Sell-side stop order trigger prices keyed by instrument id
    async fn stop_losses(&self, account_id: &str) -> Result<HashMap<String, Decimal>>;

    /// Operation history normalized to home-currency cash flows
    async fn cash_flow_history(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CashFlow>>;

    /// Last value of the benchmark index
    async fn benchmark_price(&self) -> Result<Option<Decimal>>;
}
