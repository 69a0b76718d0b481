//! Position valuation
//!
//! Turns a raw position set plus market prices and FX rates into per-position
//! metrics and the portfolio aggregate. Tolerant of partial market data:
//! a missing price values that position at zero instead of failing the run.

use crate::broker::invest_api::CASH_INSTRUMENTS;
use crate::rates::Rates;
use crate::types::{
    PortfolioSummary, Position, PositionValuation, HOME_CURRENCY,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

const PERCENT: Decimal = Decimal::ONE_HUNDRED;

/// Valuate one account's position set.
///
/// Returns per-position valuations in input order and the aggregate summary.
pub fn valuate(
    positions: &[Position],
    prices: &HashMap<String, Decimal>,
    rates: &Rates,
    stop_losses: &HashMap<String, Decimal>,
) -> (Vec<PositionValuation>, PortfolioSummary) {
    let mut valuations = Vec::new();
    let mut cash_balances: HashMap<String, Decimal> = HashMap::new();
    let mut positions_value = Decimal::ZERO;
    let mut total_pnl = Decimal::ZERO;

    for position in positions {
        if !position.kind.is_tradable() {
            // Cash shows up as currency-instrument positions; anything with
            // an unrecognized id is ignored
            if let Some(currency) = cash_currency(&position.instrument_id) {
                *cash_balances.entry(currency.to_string()).or_default() += position.quantity;
            }
            continue;
        }

        if position.quantity <= Decimal::ZERO {
            continue;
        }

        let current_price = prices
            .get(&position.instrument_id)
            .copied()
            .unwrap_or(Decimal::ZERO);

        let rate = if position.currency == HOME_CURRENCY {
            Decimal::ONE
        } else {
            rates.rate(&position.currency)
        };

        let average_price_home = position.average_price * rate;
        let current_price_home = current_price * rate;

        let value = current_price_home * position.quantity;
        let cost = average_price_home * position.quantity;
        let pnl = value - cost;
        let pnl_percent = if cost.is_zero() {
            Decimal::ZERO
        } else {
            pnl / cost * PERCENT
        };

        let stop_loss = stop_losses.get(&position.instrument_id).copied();
        let stop_loss_distance_percent = stop_loss.and_then(|stop| {
            if current_price_home > Decimal::ZERO {
                Some((current_price_home - stop) / current_price_home * PERCENT)
            } else {
                None
            }
        });

        positions_value += value;
        total_pnl += pnl;

        valuations.push(PositionValuation {
            ticker: position.ticker.clone(),
            instrument_id: position.instrument_id.clone(),
            currency: position.currency.clone(),
            quantity: position.quantity,
            average_price: position.average_price,
            average_price_home,
            current_price,
            current_price_home,
            value,
            pnl,
            pnl_percent,
            stop_loss,
            stop_loss_distance_percent,
        });
    }

    let cash_balance: Decimal = cash_balances
        .iter()
        .map(|(currency, amount)| *amount * rates.rate(currency))
        .sum();

    let summary = PortfolioSummary {
        positions_value,
        total_pnl,
        cash_balance,
        cash_balances,
        total_equity: positions_value + cash_balance,
        positions_count: valuations.len(),
    };

    (valuations, summary)
}

fn cash_currency(instrument_id: &str) -> Option<&'static str> {
    CASH_INSTRUMENTS
        .iter()
        .find(|(id, _)| *id == instrument_id)
        .map(|(_, currency)| *currency)
}
