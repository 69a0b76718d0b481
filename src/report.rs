//! Report text formatting
//!
//! Telegram-flavored HTML renderings of the portfolio valuation, the race
//! standings and the inception P&L breakdown. Pure functions over the
//! computed structures; every degraded input renders an explicit marker
//! instead of being dropped.

use crate::pnl::{InceptionPnl, PnlBasis};
use crate::race::{RaceReport, RaceSummary};
use crate::types::{PortfolioReport, HOME_CURRENCY};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Stop distance below which a position is flagged as near its stop
const NEAR_STOP_PERCENT: Decimal = dec!(5);

const MEDALS: &[&str] = &["🥇", "🥈", "🥉"];

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn signed_percent(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    if rounded.is_sign_negative() {
        format!("{:.2}%", rounded)
    } else {
        format!("+{:.2}%", rounded)
    }
}

/// Full per-position portfolio rendering
pub fn render_portfolio(report: &PortfolioReport) -> String {
    let mut text = format!(
        "💼 <b>{}</b> — {}\n",
        report.account_name,
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    );

    let mut rate_parts: Vec<String> = report
        .rates
        .iter()
        .filter(|(currency, _)| currency.as_str() != HOME_CURRENCY)
        .map(|(currency, rate)| format!("{} {}", currency, money(*rate)))
        .collect();
    rate_parts.sort();
    if !rate_parts.is_empty() {
        text.push_str(&format!("💱 {}", rate_parts.join(" | ")));
        if report.rates_degraded {
            text.push_str(" (fallback)");
        }
        text.push('\n');
    }
    text.push('\n');

    if report.positions.is_empty() {
        text.push_str("📭 No open positions\n");
    }

    for position in &report.positions {
        let emoji = if position.pnl >= Decimal::ZERO {
            "🟢"
        } else {
            "🔴"
        };
        text.push_str(&format!(
            "{} <b>{}</b>  {} × {}\n   {} {} ({})\n",
            emoji,
            position.ticker,
            position.quantity.normalize(),
            money(position.current_price_home),
            money(position.value),
            HOME_CURRENCY,
            signed_percent(position.pnl_percent),
        ));
    }

    let near_stop: Vec<_> = report
        .positions
        .iter()
        .filter(|p| {
            p.stop_loss_distance_percent
                .map(|d| d < NEAR_STOP_PERCENT)
                .unwrap_or(false)
        })
        .collect();
    if !near_stop.is_empty() {
        text.push_str("\n⚠️ <b>Near stop-loss</b>\n");
        for position in near_stop {
            let distance = position
                .stop_loss_distance_percent
                .unwrap_or(Decimal::ZERO);
            text.push_str(&format!(
                "   {} — {} to trigger\n",
                position.ticker,
                signed_percent(distance)
            ));
        }
    }

    if report.positions.len() >= 2 {
        let best = report
            .positions
            .iter()
            .max_by(|a, b| a.pnl_percent.cmp(&b.pnl_percent));
        let worst = report
            .positions
            .iter()
            .min_by(|a, b| a.pnl_percent.cmp(&b.pnl_percent));
        if let (Some(best), Some(worst)) = (best, worst) {
            text.push_str(&format!(
                "\n🏆 Best: {} {}\n💀 Worst: {} {}\n",
                best.ticker,
                signed_percent(best.pnl_percent),
                worst.ticker,
                signed_percent(worst.pnl_percent),
            ));
        }
    }

    let summary = &report.summary;
    text.push_str(&format!(
        "\n📊 Positions ({}): <code>{}</code>\n\
         💵 Cash: <code>{}</code>\n\
         💰 Total equity: <code>{}</code>\n\
         📈 Unrealized P&L: <code>{} ({})</code>",
        summary.positions_count,
        money(summary.positions_value),
        money(summary.cash_balance),
        money(summary.total_equity),
        money(summary.total_pnl),
        signed_percent(pnl_percent_of(summary.total_pnl, summary.positions_value)),
    ));

    text
}

/// One-line equity summary for /status
pub fn render_status(report: &PortfolioReport) -> String {
    let summary = &report.summary;
    format!(
        "💰 <b>{}</b>: {} {} | {} positions | P&L {}",
        report.account_name,
        money(summary.total_equity),
        HOME_CURRENCY,
        summary.positions_count,
        money(summary.total_pnl),
    )
}

/// Race standings with medals, benchmark and last-day deltas
pub fn render_race(report: &RaceReport) -> String {
    let summary = match report {
        RaceReport::NoData => return "🏁 <b>Race</b>\n\n📭 No snapshots recorded yet".to_string(),
        RaceReport::Ready(summary) => summary,
    };

    let mut text = format!(
        "🏁 <b>Race</b> {} → {} ({} snapshots)\n\n",
        summary.period.start, summary.period.end, summary.period.days
    );

    if summary.standings.is_empty() {
        text.push_str("⚠️ Not enough baseline data to rank accounts\n");
    }
    for (i, standing) in summary.standings.iter().enumerate() {
        let medal = MEDALS
            .get(i)
            .map(|m| m.to_string())
            .unwrap_or_else(|| format!("{}.", i + 1));
        text.push_str(&format!(
            "{} <b>{}</b> {} ({})\n",
            medal,
            standing.name,
            signed_percent(standing.change_percent),
            money(standing.current_value),
        ));
    }

    match summary.benchmark_change_percent {
        Some(change) => text.push_str(&format!("\n📊 Benchmark: {}\n", signed_percent(change))),
        None => text.push_str("\n📊 Benchmark: not available\n"),
    }

    if let Some(stats) = spread_and_mean(summary) {
        text.push_str(&format!(
            "📐 Spread: {} | Mean: {}\n",
            signed_percent(stats.0),
            signed_percent(stats.1)
        ));
    }

    if let Some(daily) = &summary.daily_changes {
        text.push_str("\n📅 <b>Last day</b>\n");
        for change in daily {
            match change.change_percent {
                Some(value) => {
                    text.push_str(&format!("   {} {}\n", change.name, signed_percent(value)))
                }
                None => text.push_str(&format!("   {} n/a\n", change.name)),
            }
        }
    }

    text
}

/// Detailed lifetime P&L breakdown
pub fn render_pnl(account_name: &str, pnl: &InceptionPnl) -> String {
    match pnl.basis {
        PnlBasis::Unavailable => {
            return format!(
                "📈 <b>Lifetime P&L — {}</b>\n\n⚠️ No data available",
                account_name
            );
        }
        PnlBasis::UnrealizedOnly => {
            return format!(
                "📈 <b>Lifetime P&L — {}</b>\n\n\
                 ⚠️ Operation history unavailable; unrealized P&L only\n\
                 📊 Unrealized P&L: <code>{}</code>\n\
                 💰 Current equity: <code>{}</code>",
                account_name,
                money(pnl.total_pnl),
                money(pnl.current_equity),
            );
        }
        PnlBasis::CashFlows => {}
    }

    let emoji = if pnl.total_pnl >= Decimal::ZERO {
        "📈"
    } else {
        "📉"
    };
    format!(
        "{} <b>Lifetime P&L — {}</b>\n\n\
         ➕ Deposits: <code>{}</code>\n\
         ➖ Withdrawals: <code>{}</code>\n\
         💸 Dividends & coupons: <code>{}</code>\n\
         🏦 Commissions: <code>{}</code>\n\
         💼 Net invested: <code>{}</code>\n\
         💰 Current equity: <code>{}</code>\n\n\
         <b>Total P&L: {} ({})</b>",
        emoji,
        account_name,
        money(pnl.deposits),
        money(pnl.withdrawals),
        money(pnl.dividends),
        money(pnl.commissions),
        money(pnl.net_invested),
        money(pnl.current_equity),
        money(pnl.total_pnl),
        signed_percent(pnl_percent_of(pnl.total_pnl, pnl.net_invested)),
    )
}

fn pnl_percent_of(pnl: Decimal, base: Decimal) -> Decimal {
    if base <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        pnl / base * Decimal::ONE_HUNDRED
    }
}

fn spread_and_mean(summary: &RaceSummary) -> Option<(Decimal, Decimal)> {
    let changes: Vec<Decimal> = summary
        .standings
        .iter()
        .map(|s| s.change_percent)
        .collect();
    let (first, last) = (changes.first()?, changes.last()?);
    let mean = changes.iter().sum::<Decimal>() / Decimal::from(changes.len() as u64);
    // Standings are sorted descending, so spread is first minus last
    Some((first - last, mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::race::{DailyChange, RacePeriod, RaceStanding, RaceSummary};
    use crate::types::{PortfolioSummary, PositionValuation};
    use chrono::Utc;
    use std::collections::HashMap;

    fn valuation(ticker: &str, pnl_percent: Decimal, stop_distance: Option<Decimal>) -> PositionValuation {
        PositionValuation {
            ticker: ticker.to_string(),
            instrument_id: ticker.to_string(),
            currency: HOME_CURRENCY.to_string(),
            quantity: dec!(1),
            average_price: dec!(100),
            average_price_home: dec!(100),
            current_price: dec!(100),
            current_price_home: dec!(100),
            value: dec!(100),
            pnl: pnl_percent,
            pnl_percent,
            stop_loss: stop_distance.map(|_| dec!(95)),
            stop_loss_distance_percent: stop_distance,
        }
    }

    fn portfolio(positions: Vec<PositionValuation>) -> PortfolioReport {
        let positions_value: Decimal = positions.iter().map(|p| p.value).sum();
        PortfolioReport {
            account_name: "Main".to_string(),
            generated_at: Utc::now(),
            rates: HashMap::from([
                (HOME_CURRENCY.to_string(), Decimal::ONE),
                ("USD".to_string(), dec!(90)),
            ]),
            rates_degraded: false,
            summary: PortfolioSummary {
                positions_value,
                total_pnl: positions.iter().map(|p| p.pnl).sum(),
                cash_balance: dec!(500),
                cash_balances: HashMap::new(),
                total_equity: positions_value + dec!(500),
                positions_count: positions.len(),
            },
            positions,
        }
    }

    #[test]
    fn test_portfolio_render_includes_positions_and_totals() {
        let text = render_portfolio(&portfolio(vec![
            valuation("SBER", dec!(12), None),
            valuation("GAZP", dec!(-4), None),
        ]));

        assert!(text.contains("SBER"));
        assert!(text.contains("GAZP"));
        assert!(text.contains("Best: SBER +12.00%"));
        assert!(text.contains("Worst: GAZP -4.00%"));
        assert!(text.contains("Total equity"));
        assert!(text.contains("USD 90.00"));
        assert!(!text.contains("(fallback)"));
    }

    #[test]
    fn test_portfolio_render_flags_fallback_rates() {
        let mut report = portfolio(vec![valuation("SBER", dec!(1), None)]);
        report.rates_degraded = true;
        assert!(render_portfolio(&report).contains("(fallback)"));
    }

    #[test]
    fn test_near_stop_warning_under_five_percent() {
        let text = render_portfolio(&portfolio(vec![
            valuation("TIGHT", dec!(0), Some(dec!(3))),
            valuation("LOOSE", dec!(0), Some(dec!(20))),
        ]));

        assert!(text.contains("Near stop-loss"));
        assert!(text.contains("TIGHT — +3.00% to trigger"));
        assert!(!text.contains("LOOSE —"));
    }

    #[test]
    fn test_empty_portfolio_renders_marker() {
        let text = render_portfolio(&portfolio(vec![]));
        assert!(text.contains("No open positions"));
    }

    #[test]
    fn test_race_no_data() {
        let text = render_race(&RaceReport::NoData);
        assert!(text.contains("No snapshots recorded yet"));
    }

    #[test]
    fn test_race_render_medals_and_benchmark() {
        let report = RaceReport::Ready(RaceSummary {
            period: RacePeriod {
                start: "2024-01-01".to_string(),
                end: "2024-02-01".to_string(),
                days: 30,
            },
            standings: vec![
                RaceStanding {
                    name: "Alice".to_string(),
                    current_value: dec!(1120),
                    change_percent: dec!(12),
                },
                RaceStanding {
                    name: "Bob".to_string(),
                    current_value: dec!(1050),
                    change_percent: dec!(5),
                },
            ],
            benchmark_change_percent: Some(dec!(3.5)),
            daily_changes: Some(vec![DailyChange {
                name: "Alice".to_string(),
                change_percent: None,
            }]),
        });

        let text = render_race(&report);
        assert!(text.contains("🥇 <b>Alice</b> +12.00%"));
        assert!(text.contains("🥈 <b>Bob</b> +5.00%"));
        assert!(text.contains("Benchmark: +3.50%"));
        assert!(text.contains("Spread: +7.00%"));
        assert!(text.contains("Alice n/a"));
    }

    #[test]
    fn test_race_render_missing_benchmark_is_explicit() {
        let report = RaceReport::Ready(RaceSummary {
            period: RacePeriod {
                start: "2024-01-01".to_string(),
                end: "2024-01-02".to_string(),
                days: 2,
            },
            standings: vec![],
            benchmark_change_percent: None,
            daily_changes: None,
        });

        let text = render_race(&report);
        assert!(text.contains("Benchmark: not available"));
        assert!(text.contains("Not enough baseline data"));
    }

    #[test]
    fn test_pnl_render_full_breakdown() {
        let pnl = crate::pnl::compute_lifetime_pnl(
            &[crate::types::CashFlow {
                kind: crate::types::FlowKind::Deposit,
                amount: dec!(10000),
                date: chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            }],
            dec!(10800),
        );

        let text = render_pnl("Main", &pnl);
        assert!(text.contains("Deposits: <code>10000.00</code>"));
        assert!(text.contains("Total P&L: 800.00 (+8.00%)"));
    }

    #[test]
    fn test_pnl_render_fallbacks_are_marked() {
        let degraded = InceptionPnl::unrealized_only(dec!(9000), dec!(-120));
        let text = render_pnl("Main", &degraded);
        assert!(text.contains("history unavailable"));

        let empty = InceptionPnl::unavailable();
        assert!(render_pnl("Main", &empty).contains("No data available"));
    }

    #[test]
    fn test_zero_net_invested_never_divides() {
        let pnl = crate::pnl::compute_lifetime_pnl(&[], dec!(100));
        let text = render_pnl("Main", &pnl);
        assert!(text.contains("(+0.00%)"));
    }
}
