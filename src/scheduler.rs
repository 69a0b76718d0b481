//! Daily cycle engine and schedule
//!
//! One cycle = portfolio report, race snapshot append, race report, chart
//! hand-off. The scheduler runs it once per day at the configured wall-clock
//! time; `/report` triggers the same cycle on demand. A cycle in flight is
//! never re-entered, and a failed step aborts the remaining steps of that
//! cycle only.

use crate::broker::BrokerData;
use crate::config::Config;
use crate::error::Result;
use crate::notify::Notifier;
use crate::pnl::{compute_lifetime_pnl, InceptionPnl};
use crate::race::{build_report, AccountSnapshot, HistoryStore};
use crate::rates::RateCache;
use crate::report::{render_pnl, render_portfolio, render_race, render_status};
use crate::types::PortfolioReport;
use crate::valuation::valuate;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// How far back the operation history is queried. The broker caps history
/// anyway; 1970 just means "everything it will give us".
fn history_epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Everything a cycle needs, shared between the scheduler task and the
/// command handler
pub struct Engine {
    broker: Arc<dyn BrokerData>,
    rates: RateCache,
    store: HistoryStore,
    notifier: Notifier,
    config: Config,
    cycle_lock: Mutex<()>,
}

impl Engine {
    pub fn new(config: Config, broker: Arc<dyn BrokerData>, notifier: Notifier) -> Self {
        let rates = RateCache::new(config.rates.clone());
        let store = HistoryStore::new(&config.history.path);
        Self {
            broker,
            rates,
            store,
            notifier,
            config,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Value one account right now
    pub async fn snapshot_account(
        &self,
        account_id: &str,
        account_name: &str,
    ) -> Result<PortfolioReport> {
        let positions = self.broker.list_positions(account_id).await?;
        let rates = self.rates.get_rates(&*self.broker).await;

        let mut prices = HashMap::new();
        for position in positions.iter().filter(|p| p.kind.is_tradable()) {
            match self.broker.current_price(&position.instrument_id).await {
                Ok(Some(price)) => {
                    prices.insert(position.instrument_id.clone(), price);
                }
                Ok(None) => warn!("No market price for {}", position.ticker),
                Err(e) => warn!("Price fetch for {} failed: {}", position.ticker, e),
            }
        }

        let stop_losses = match self.broker.stop_losses(account_id).await {
            Ok(stops) => stops,
            Err(e) => {
                warn!("Stop order fetch failed: {}", e);
                HashMap::new()
            }
        };

        let (valuations, summary) = valuate(&positions, &prices, &rates, &stop_losses);
        Ok(PortfolioReport {
            account_name: account_name.to_string(),
            generated_at: Utc::now(),
            rates: rates.table.clone(),
            rates_degraded: rates.degraded,
            positions: valuations,
            summary,
        })
    }

    pub async fn portfolio_report_text(&self) -> Result<String> {
        let report = self.primary_snapshot().await?;
        Ok(render_portfolio(&report))
    }

    pub async fn status_text(&self) -> Result<String> {
        let report = self.primary_snapshot().await?;
        Ok(render_status(&report))
    }

    pub fn race_report_text(&self) -> Result<String> {
        let history = self.store.load_history()?;
        Ok(render_race(&build_report(&history)))
    }

    /// Lifetime P&L of the primary account, degrading through the fallback
    /// chain when history or the account itself is unreachable
    pub async fn pnl_report_text(&self) -> Result<String> {
        let name = self.primary_name();
        let pnl = match self.primary_snapshot().await {
            Ok(report) => {
                let equity = report.summary.total_equity;
                let today = Local::now().date_naive();
                match self
                    .broker
                    .cash_flow_history(&self.config.accounts.primary, history_epoch(), today)
                    .await
                {
                    Ok(flows) => compute_lifetime_pnl(&flows, equity),
                    Err(e) => {
                        warn!("Operation history unavailable: {}", e);
                        InceptionPnl::unrealized_only(equity, report.summary.total_pnl)
                    }
                }
            }
            Err(e) => {
                warn!("Portfolio snapshot unavailable: {}", e);
                InceptionPnl::unavailable()
            }
        };
        Ok(render_pnl(&name, &pnl))
    }

    /// Append today's equity snapshot across all race accounts
    pub async fn append_race_snapshot(&self) -> Result<()> {
        let mut entries = Vec::new();
        for account in &self.config.accounts.race {
            let report = self.snapshot_account(&account.id, &account.name).await?;
            entries.push(AccountSnapshot {
                name: account.name.clone(),
                value: report.summary.total_equity,
                positions: report.summary.positions_count,
            });
        }

        let benchmark = match self.broker.benchmark_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!("Benchmark fetch failed: {}", e);
                None
            }
        };

        self.store
            .append_snapshot(Local::now().date_naive(), &entries, benchmark)
    }

    pub fn chart_path(&self) -> Option<PathBuf> {
        let path = PathBuf::from(self.config.history.chart_path.as_ref()?);
        path.exists().then_some(path)
    }

    /// Run one full cycle unless one is already in flight
    pub async fn run_cycle(&self) -> Result<()> {
        let Ok(_guard) = self.cycle_lock.try_lock() else {
            warn!("Cycle already in flight, skipping");
            return Ok(());
        };

        info!("Starting report cycle");
        if let Err(e) = self.execute_cycle().await {
            error!("Cycle aborted: {}", e);
            let _ = self.notifier.error("Report cycle failed", &e.to_string()).await;
            return Err(e);
        }
        info!("Report cycle finished");
        Ok(())
    }

    async fn execute_cycle(&self) -> Result<()> {
        let portfolio = self.portfolio_report_text().await?;
        self.notifier.send_text(&portfolio).await?;

        self.append_race_snapshot().await?;

        let race = self.race_report_text()?;
        self.notifier.send_text(&race).await?;

        if let Some(chart) = self.chart_path() {
            self.notifier.send_photo(&chart, "🏁 Race chart").await?;
        }
        Ok(())
    }

    /// Tick forever, firing the cycle once per day at the configured time
    pub async fn run_schedule(&self) {
        let target = NaiveTime::parse_from_str(&self.config.schedule.report_time, "%H:%M")
            .unwrap_or_else(|e| {
                warn!(
                    "Invalid report_time '{}' ({}), using 11:00",
                    self.config.schedule.report_time, e
                );
                NaiveTime::from_hms_opt(11, 0, 0).unwrap_or_default()
            });
        info!("Daily report scheduled for {}", target.format("%H:%M"));

        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.schedule.tick_secs));
        let mut last_run: Option<NaiveDate> = None;

        loop {
            interval.tick().await;
            let now = Local::now().naive_local();
            if cycle_due(target, now, last_run) {
                last_run = Some(now.date());
                let _ = self.run_cycle().await;
            }
        }
    }

    async fn primary_snapshot(&self) -> Result<PortfolioReport> {
        let name = self.primary_name();
        self.snapshot_account(&self.config.accounts.primary, &name)
            .await
    }

    fn primary_name(&self) -> String {
        self.config
            .accounts
            .race
            .iter()
            .find(|a| a.id == self.config.accounts.primary)
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Main".to_string())
    }
}

fn cycle_due(target: NaiveTime, now: NaiveDateTime, last_run: Option<NaiveDate>) -> bool {
    now.time() >= target && last_run != Some(now.date())
}
