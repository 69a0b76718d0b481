//! Currency rate cache
//!
//! Process-wide FX rates with a time window, explicit about where each
//! answer came from: a fresh fetch, the previous cache, or hardcoded
//! fallbacks. The clock is injected so expiry is testable.

use crate::broker::BrokerData;
use crate::config::RatesConfig;
use crate::error::Result;
use crate::types::{RateTable, HOME_CURRENCY};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

/// Foreign currencies the bot converts from
pub const FOREIGN_CURRENCIES: &[&str] = &["USD", "EUR"];

/// Where a rate table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// Fetched from the broker on this call
    Fresh,
    /// Served from the unexpired cache
    Cached,
    /// Source unreachable and no cache; hardcoded fallbacks only
    Fallback,
}

/// Rate table plus its provenance
#[derive(Debug, Clone)]
pub struct Rates {
    pub table: RateTable,
    pub source: RateSource,
    /// True when any individual currency had to use its fallback value
    pub degraded: bool,
}

impl Rates {
    /// Rate for a currency; unknown currencies convert 1:1 so a gap in the
    /// table degrades a single position instead of failing the valuation.
    pub fn rate(&self, currency: &str) -> Decimal {
        self.table.get(currency).copied().unwrap_or(Decimal::ONE)
    }
}

struct CacheEntry {
    rates: Rates,
    fetched_at: DateTime<Utc>,
}

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Time-cached FX rates
pub struct RateCache {
    config: RatesConfig,
    cache: Mutex<Option<CacheEntry>>,
    clock: Clock,
}

impl RateCache {
    pub fn new(config: RatesConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(None),
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock (tests)
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn fallback_for(&self, currency: &str) -> Decimal {
        match currency {
            "USD" => self.config.usd_fallback,
            "EUR" => self.config.eur_fallback,
            _ => Decimal::ONE,
        }
    }

    fn fallback_table(&self) -> RateTable {
        let mut table = RateTable::new();
        table.insert(HOME_CURRENCY.to_string(), Decimal::ONE);
        for currency in FOREIGN_CURRENCIES {
            table.insert(currency.to_string(), self.fallback_for(currency));
        }
        table
    }

    /// Current rate table, fetching through `source` when the cache expired.
    ///
    /// Never returns `Err`: a dead source yields the previous cache when one
    /// exists, otherwise the fallback table.
    pub async fn get_rates<B: BrokerData + ?Sized>(&self, source: &B) -> Rates {
        let now = (self.clock)();
        let window = Duration::seconds(self.config.cache_secs as i64);

        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.as_ref() {
                if now - entry.fetched_at < window {
                    let mut rates = entry.rates.clone();
                    rates.source = RateSource::Cached;
                    return rates;
                }
            }
        }

        match self.fetch(source).await {
            Ok(rates) => {
                let mut cache = self.cache.lock();
                *cache = Some(CacheEntry {
                    rates: rates.clone(),
                    fetched_at: now,
                });
                rates
            }
            Err(e) => {
                warn!("Rate fetch failed, degrading: {}", e);
                let cache = self.cache.lock();
                match cache.as_ref() {
                    Some(entry) => {
                        let mut rates = entry.rates.clone();
                        rates.source = RateSource::Cached;
                        rates.degraded = true;
                        rates
                    }
                    None => Rates {
                        table: self.fallback_table(),
                        source: RateSource::Fallback,
                        degraded: true,
                    },
                }
            }
        }
    }

    /// One refresh attempt. A single currency failing substitutes its
    /// fallback; every currency failing is treated as a dead source.
    async fn fetch<B: BrokerData + ?Sized>(&self, source: &B) -> Result<Rates> {
        let mut table = RateTable::new();
        table.insert(HOME_CURRENCY.to_string(), Decimal::ONE);

        let mut degraded = false;
        let mut fetched = 0usize;
        let mut last_err = None;

        for currency in FOREIGN_CURRENCIES {
            match source.fx_rate(currency).await {
                Ok(Some(rate)) => {
                    table.insert(currency.to_string(), rate);
                    fetched += 1;
                }
                Ok(None) => {
                    warn!("No market rate for {}, using fallback", currency);
                    table.insert(currency.to_string(), self.fallback_for(currency));
                    degraded = true;
                }
                Err(e) => {
                    warn!("Rate fetch for {} failed: {}", currency, e);
                    table.insert(currency.to_string(), self.fallback_for(currency));
                    degraded = true;
                    last_err = Some(e);
                }
            }
        }

        if fetched == 0 {
            if let Some(e) = last_err {
                return Err(e);
            }
        }

        Ok(Rates {
            table,
            source: RateSource::Fresh,
            degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MockBrokerData;
    use crate::error::BotError;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn cache_with_shiftable_clock() -> (RateCache, Arc<AtomicI64>) {
        let offset = Arc::new(AtomicI64::new(0));
        let offset_clone = offset.clone();
        let base = Utc::now();
        let cache = RateCache::new(RatesConfig::default()).with_clock(Arc::new(move || {
            base + Duration::seconds(offset_clone.load(Ordering::SeqCst))
        }));
        (cache, offset)
    }

    fn live_source() -> MockBrokerData {
        let mut source = MockBrokerData::new();
        source
            .expect_fx_rate()
            .returning(|currency| match currency {
                "USD" => Ok(Some(dec!(92.5))),
                "EUR" => Ok(Some(dec!(101.2))),
                _ => Ok(None),
            });
        source
    }

    fn dead_source() -> MockBrokerData {
        let mut source = MockBrokerData::new();
        source
            .expect_fx_rate()
            .returning(|_| Err(BotError::Broker("unreachable".into())));
        source
    }

    #[tokio::test]
    async fn test_fresh_fetch() {
        let (cache, _) = cache_with_shiftable_clock();
        let rates = cache.get_rates(&live_source()).await;

        assert_eq!(rates.source, RateSource::Fresh);
        assert!(!rates.degraded);
        assert_eq!(rates.rate("USD"), dec!(92.5));
        assert_eq!(rates.rate("EUR"), dec!(101.2));
        assert_eq!(rates.rate(HOME_CURRENCY), Decimal::ONE);
    }

    #[tokio::test]
    async fn test_second_call_within_window_is_cached() {
        let (cache, _) = cache_with_shiftable_clock();
        let source = live_source();

        let first = cache.get_rates(&source).await;
        assert_eq!(first.source, RateSource::Fresh);

        let second = cache.get_rates(&source).await;
        assert_eq!(second.source, RateSource::Cached);
        assert_eq!(second.rate("USD"), dec!(92.5));
    }

    #[tokio::test]
    async fn test_cache_expires_after_window() {
        let (cache, offset) = cache_with_shiftable_clock();
        let source = live_source();

        cache.get_rates(&source).await;
        offset.store(3601, Ordering::SeqCst);

        let rates = cache.get_rates(&source).await;
        assert_eq!(rates.source, RateSource::Fresh);
    }

    #[tokio::test]
    async fn test_dead_source_without_cache_uses_fallbacks() {
        let (cache, _) = cache_with_shiftable_clock();
        let rates = cache.get_rates(&dead_source()).await;

        assert_eq!(rates.source, RateSource::Fallback);
        assert!(rates.degraded);
        assert_eq!(rates.rate("USD"), dec!(90));
        assert_eq!(rates.rate("EUR"), dec!(100));
        assert_eq!(rates.rate(HOME_CURRENCY), Decimal::ONE);
    }

    #[tokio::test]
    async fn test_dead_source_reuses_expired_cache() {
        let (cache, offset) = cache_with_shiftable_clock();

        cache.get_rates(&live_source()).await;
        offset.store(7200, Ordering::SeqCst);

        let rates = cache.get_rates(&dead_source()).await;
        assert_eq!(rates.source, RateSource::Cached);
        assert!(rates.degraded);
        assert_eq!(rates.rate("USD"), dec!(92.5));
    }

    #[tokio::test]
    async fn test_partial_failure_substitutes_fallback() {
        let mut source = MockBrokerData::new();
        source.expect_fx_rate().returning(|currency| match currency {
            "USD" => Ok(Some(dec!(92.5))),
            _ => Ok(None),
        });

        let (cache, _) = cache_with_shiftable_clock();
        let rates = cache.get_rates(&source).await;

        assert_eq!(rates.source, RateSource::Fresh);
        assert!(rates.degraded);
        assert_eq!(rates.rate("USD"), dec!(92.5));
        assert_eq!(rates.rate("EUR"), dec!(100));
    }

    #[tokio::test]
    async fn test_unknown_currency_defaults_to_one() {
        let (cache, _) = cache_with_shiftable_clock();
        let rates = cache.get_rates(&live_source()).await;
        assert_eq!(rates.rate("GBP"), Decimal::ONE);
    }
}
