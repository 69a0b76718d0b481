//! Core domain types
//!
//! Positions, valuations and cash flows are explicit structs rather than the
//! loose key/value payloads the broker wire format uses; wire payloads are
//! parsed into these at the client boundary.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Home currency all valuations are normalized to
pub const HOME_CURRENCY: &str = "RUB";

/// Kind of instrument behind a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Equity,
    Bond,
    Fund,
    Cash,
}

impl InstrumentKind {
    /// Cash positions are balances, everything else is valued at market
    pub fn is_tradable(&self) -> bool {
        !matches!(self, InstrumentKind::Cash)
    }
}

/// One holding in an account, as read fresh from the broker each cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Opaque instrument identifier (FIGI)
    pub instrument_id: String,
    /// Display ticker, if the instrument lookup succeeded
    pub ticker: String,
    pub kind: InstrumentKind,
    /// Quantity held; <= 0 means closed and is excluded from valuation
    pub quantity: Decimal,
    /// Average acquisition price in the instrument's native currency
    pub average_price: Decimal,
    /// Native currency code of the instrument
    pub currency: String,
}

/// Currency code -> rate to home currency; always contains HOME_CURRENCY at 1.0
pub type RateTable = HashMap<String, Decimal>;

/// Derived metrics for one valued position
#[derive(Debug, Clone, Serialize)]
pub struct PositionValuation {
    pub ticker: String,
    pub instrument_id: String,
    pub currency: String,
    pub quantity: Decimal,
    /// Average acquisition price in native currency
    pub average_price: Decimal,
    /// Average acquisition price converted to home currency
    pub average_price_home: Decimal,
    /// Current price in native currency (zero when no market data)
    pub current_price: Decimal,
    /// Current price converted to home currency
    pub current_price_home: Decimal,
    /// Current value in home currency
    pub value: Decimal,
    /// Unrealized P&L in home currency, signed
    pub pnl: Decimal,
    /// P&L as a percentage of cost basis; zero when the cost basis is zero
    pub pnl_percent: Decimal,
    /// Configured sell stop trigger, when one exists
    pub stop_loss: Option<Decimal>,
    /// Percent distance from current price down to the stop trigger;
    /// None when no stop is set or the current price is zero
    pub stop_loss_distance_percent: Option<Decimal>,
}

/// Aggregate of one valuation run; rebuilt from scratch every run
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    /// Sum of all position values (home currency)
    pub positions_value: Decimal,
    /// Sum of all unrealized P&L (home currency)
    pub total_pnl: Decimal,
    /// Cash across all currencies, converted to home currency
    pub cash_balance: Decimal,
    /// Per-currency raw cash balances
    pub cash_balances: HashMap<String, Decimal>,
    /// positions_value + cash_balance
    pub total_equity: Decimal,
    pub positions_count: usize,
}

/// Full per-account report: valuations plus the aggregate
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioReport {
    pub account_name: String,
    pub generated_at: DateTime<Utc>,
    pub rates: HashMap<String, Decimal>,
    /// True when any rate came from a fallback instead of the market
    pub rates_degraded: bool,
    pub positions: Vec<PositionValuation>,
    pub summary: PortfolioSummary,
}

/// Classification of one historical account transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Deposit,
    Withdrawal,
    /// Dividend or bond coupon income
    Dividend,
    /// Broker commission or service fee
    Commission,
    /// Buy/sell executions; ignored by the inception P&L identity
    Trade,
}

/// One entry of the account's operation history, normalized to home currency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlow {
    pub kind: FlowKind,
    /// Signed amount in home currency
    pub amount: Decimal,
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cash_is_not_tradable() {
        assert!(!InstrumentKind::Cash.is_tradable());
        assert!(InstrumentKind::Equity.is_tradable());
        assert!(InstrumentKind::Bond.is_tradable());
        assert!(InstrumentKind::Fund.is_tradable());
    }

    #[test]
    fn test_instrument_kind_serde() {
        let kind: InstrumentKind = serde_json::from_str("\"equity\"").unwrap();
        assert_eq!(kind, InstrumentKind::Equity);
        assert_eq!(serde_json::to_string(&InstrumentKind::Cash).unwrap(), "\"cash\"");
    }
}
