//! Race performance engine
//!
//! Percent change of every tracked account against the first recorded day
//! (the baseline), ranked, plus the benchmark's change over the same period
//! and the last day's deltas.

use super::store::HistoryRow;
use rust_decimal::Decimal;

const PERCENT: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RacePeriod {
    pub start: String,
    pub end: String,
    pub days: usize,
}

/// One ranked account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceStanding {
    pub name: String,
    pub current_value: Decimal,
    pub change_percent: Decimal,
}

/// Change between the two most recent snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyChange {
    pub name: String,
    pub change_percent: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceSummary {
    pub period: RacePeriod,
    pub standings: Vec<RaceStanding>,
    pub benchmark_change_percent: Option<Decimal>,
    pub daily_changes: Option<Vec<DailyChange>>,
}

/// Report over the full history, or an explicit no-data marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceReport {
    NoData,
    Ready(RaceSummary),
}

/// Build the race report from rows in file order. The first row is the
/// immutable baseline; the last row is "today" even when dates repeat.
pub fn build_report(history: &[HistoryRow]) -> RaceReport {
    let (Some(baseline), Some(latest)) = (history.first(), history.last()) else {
        return RaceReport::NoData;
    };

    let account_count = latest.values.len().max(baseline.values.len());
    let names = account_names(latest, baseline, account_count);

    let mut standings = Vec::new();
    for i in 0..account_count {
        let Some(change) = change_percent(value_at(baseline, i), value_at(latest, i)) else {
            continue;
        };
        let Some(current) = value_at(latest, i) else {
            continue;
        };
        standings.push(RaceStanding {
            name: names[i].clone(),
            current_value: current,
            change_percent: change,
        });
    }
    // Stable sort keeps original account order on ties
    standings.sort_by(|a, b| b.change_percent.cmp(&a.change_percent));

    let benchmark_change_percent = change_percent(baseline.benchmark, latest.benchmark);

    let daily_changes = (history.len() >= 2).then(|| {
        let previous = &history[history.len() - 2];
        (0..account_count)
            .map(|i| DailyChange {
                name: names[i].clone(),
                change_percent: change_percent(value_at(previous, i), value_at(latest, i)),
            })
            .collect()
    });

    RaceReport::Ready(RaceSummary {
        period: RacePeriod {
            start: baseline.date.clone(),
            end: latest.date.clone(),
            days: history.len(),
        },
        standings,
        benchmark_change_percent,
        daily_changes,
    })
}

fn value_at(row: &HistoryRow, i: usize) -> Option<Decimal> {
    row.values.get(i).copied().flatten()
}

/// `None` when either endpoint is missing or the base is zero
fn change_percent(base: Option<Decimal>, current: Option<Decimal>) -> Option<Decimal> {
    let base = base?;
    let current = current?;
    if base.is_zero() {
        return None;
    }
    Some((current - base) / base * PERCENT)
}

fn account_names(latest: &HistoryRow, baseline: &HistoryRow, count: usize) -> Vec<String> {
    let source = if latest.account_names.is_empty() {
        &baseline.account_names
    } else {
        &latest.account_names
    };
    (0..count)
        .map(|i| {
            source
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Account {}", i + 1))
        })
        .collect()
}
