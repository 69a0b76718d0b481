//! Invest API REST client
//!
//! Thin wire layer over the broker's public REST surface. Parses the
//! fixed-point wire payloads into domain types at this boundary and keeps
//! all business logic out.

use crate::config::BrokerConfig;
use crate::error::{BotError, Result};
use crate::quote::{money_value_to_decimal, quotation_to_decimal};
use crate::types::{CashFlow, FlowKind, InstrumentKind, Position};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::BrokerData;

/// Instrument id of the USD/home-currency pair
pub const USD_INSTRUMENT: &str = "BBG0013HGFT4";
/// Instrument id of the EUR/home-currency pair
pub const EUR_INSTRUMENT: &str = "BBG0013HJJ31";
/// Instrument id of the benchmark index (MOEX)
pub const BENCHMARK_INSTRUMENT: &str = "BBG004730ZJ9";

/// Cash-position instrument ids and the currency each represents
pub const CASH_INSTRUMENTS: &[(&str, &str)] = &[
    ("RUB000UTSTOM", "RUB"),
    ("USD000UTSTOM", "USD"),
    ("EUR000UTSTOM", "EUR"),
];

/// Invest API client
#[derive(Clone)]
pub struct InvestApiClient {
    http: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiQuotation {
    #[serde(default)]
    units: String,
    #[serde(default)]
    nano: i32,
}

#[derive(Debug, Deserialize)]
struct ApiMoneyValue {
    #[serde(default)]
    currency: String,
    #[serde(default)]
    units: String,
    #[serde(default)]
    nano: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPortfolioPosition {
    figi: String,
    instrument_type: String,
    quantity: ApiQuotation,
    average_position_price: Option<ApiMoneyValue>,
}

#[derive(Debug, Deserialize)]
struct PortfolioResponse {
    #[serde(default)]
    positions: Vec<ApiPortfolioPosition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiLastPrice {
    figi: String,
    price: Option<ApiQuotation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastPricesResponse {
    #[serde(default)]
    last_prices: Vec<ApiLastPrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiStopOrder {
    figi: String,
    direction: String,
    stop_price: Option<ApiMoneyValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StopOrdersResponse {
    #[serde(default)]
    stop_orders: Vec<ApiStopOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiOperation {
    operation_type: String,
    payment: Option<ApiMoneyValue>,
    date: String,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationsResponse {
    #[serde(default)]
    operations: Vec<ApiOperation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInstrumentBrief {
    ticker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstrumentResponse {
    instrument: Option<ApiInstrumentBrief>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountRequest<'a> {
    account_id: &'a str,
}

impl InvestApiClient {
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn call<Req: Serialize + Sync, Resp: serde::de::DeserializeOwned>(
        &self,
        service_method: &str,
        request: &Req,
    ) -> Result<Resp> {
        let url = format!("{}/{}", self.base_url, service_method);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Broker(format!("{service_method}: {status} {body}")));
        }

        Ok(response.json().await?)
    }

    async fn last_prices(&self, instrument_ids: &[&str]) -> Result<HashMap<String, Decimal>> {
        let request = serde_json::json!({ "instrumentId": instrument_ids });
        let resp: LastPricesResponse = self
            .call("tinkoff.public.invest.api.contract.v1.MarketDataService/GetLastPrices", &request)
            .await?;

        Ok(resp
            .last_prices
            .into_iter()
            .filter_map(|p| {
                let q = p.price?;
                Some((p.figi, quotation_to_decimal(parse_units(&q.units), q.nano)))
            })
            .collect())
    }

    /// Ticker lookup; a failed lookup degrades to a synthetic ticker so the
    /// valuation still lists the position.
    async fn ticker_for(&self, figi: &str, kind: InstrumentKind) -> String {
        let method = match kind {
            InstrumentKind::Equity => "tinkoff.public.invest.api.contract.v1.InstrumentsService/ShareBy",
            InstrumentKind::Bond => "tinkoff.public.invest.api.contract.v1.InstrumentsService/BondBy",
            InstrumentKind::Fund => "tinkoff.public.invest.api.contract.v1.InstrumentsService/EtfBy",
            InstrumentKind::Cash => return figi.to_string(),
        };

        let request = serde_json::json!({ "idType": "INSTRUMENT_ID_TYPE_FIGI", "id": figi });
        match self.call::<_, InstrumentResponse>(method, &request).await {
            Ok(resp) => resp
                .instrument
                .and_then(|i| i.ticker)
                .unwrap_or_else(|| unknown_ticker(figi)),
            Err(e) => {
                warn!("Instrument lookup failed for {}: {}", figi, e);
                unknown_ticker(figi)
            }
        }
    }
}

fn unknown_ticker(figi: &str) -> String {
    format!("UNKNOWN_{}", &figi[..figi.len().min(8)])
}

/// Malformed units degrade to zero, same as a missing price.
fn parse_units(units: &str) -> i64 {
    units.parse().unwrap_or(0)
}

fn instrument_kind(wire_type: &str) -> Option<InstrumentKind> {
    match wire_type {
        "share" => Some(InstrumentKind::Equity),
        "bond" => Some(InstrumentKind::Bond),
        "etf" => Some(InstrumentKind::Fund),
        "currency" => Some(InstrumentKind::Cash),
        _ => None,
    }
}

fn classify_operation(wire_type: &str) -> Option<FlowKind> {
    match wire_type {
        "OPERATION_TYPE_INPUT" => Some(FlowKind::Deposit),
        "OPERATION_TYPE_OUTPUT" => Some(FlowKind::Withdrawal),
        "OPERATION_TYPE_DIVIDEND" | "OPERATION_TYPE_COUPON" => Some(FlowKind::Dividend),
        "OPERATION_TYPE_BROKER_FEE" | "OPERATION_TYPE_SERVICE_FEE" => Some(FlowKind::Commission),
        "OPERATION_TYPE_BUY" | "OPERATION_TYPE_SELL" => Some(FlowKind::Trade),
        _ => None,
    }
}

#[async_trait]
impl BrokerData for InvestApiClient {
    async fn list_positions(&self, account_id: &str) -> Result<Vec<Position>> {
        let resp: PortfolioResponse = self
            .call(
                "tinkoff.public.invest.api.contract.v1.OperationsService/GetPortfolio",
                &AccountRequest { account_id },
            )
            .await?;

        let mut positions = Vec::with_capacity(resp.positions.len());
        for p in resp.positions {
            let Some(kind) = instrument_kind(&p.instrument_type) else {
                debug!("Skipping unsupported instrument type: {}", p.instrument_type);
                continue;
            };

            let quantity = quotation_to_decimal(parse_units(&p.quantity.units), p.quantity.nano);
            let (average_price, currency) = match p.average_position_price {
                Some(m) => {
                    let value = money_value_to_decimal(parse_units(&m.units), m.nano);
                    (value, m.currency.to_uppercase())
                }
                None => (Decimal::ZERO, crate::types::HOME_CURRENCY.to_string()),
            };

            let ticker = self.ticker_for(&p.figi, kind).await;

            positions.push(Position {
                instrument_id: p.figi,
                ticker,
                kind,
                quantity,
                average_price,
                currency,
            });
        }

        Ok(positions)
    }

    async fn current_price(&self, instrument_id: &str) -> Result<Option<Decimal>> {
        let prices = self.last_prices(&[instrument_id]).await?;
        Ok(prices.get(instrument_id).copied())
    }

    async fn fx_rate(&self, currency: &str) -> Result<Option<Decimal>> {
        let instrument = match currency {
            "USD" => USD_INSTRUMENT,
            "EUR" => EUR_INSTRUMENT,
            _ => return Ok(None),
        };
        self.current_price(instrument).await
    }

    async fn stop_losses(&self, account_id: &str) -> Result<HashMap<String, Decimal>> {
        let resp: StopOrdersResponse = self
            .call(
                "tinkoff.public.invest.api.contract.v1.StopOrdersService/GetStopOrders",
                &AccountRequest { account_id },
            )
            .await?;

        Ok(resp
            .stop_orders
            .into_iter()
            .filter(|o| o.direction == "STOP_ORDER_DIRECTION_SELL")
            .filter_map(|o| {
                let m = o.stop_price?;
                Some((o.figi, money_value_to_decimal(parse_units(&m.units), m.nano)))
            })
            .collect())
    }

    async fn cash_flow_history(
        &self,
        account_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CashFlow>> {
        let request = serde_json::json!({
            "accountId": account_id,
            "from": format!("{from}T00:00:00Z"),
            "to": format!("{to}T23:59:59Z"),
            "state": "OPERATION_STATE_EXECUTED",
        });
        let resp: OperationsResponse = self
            .call("tinkoff.public.invest.api.contract.v1.OperationsService/GetOperations", &request)
            .await?;

        let mut flows = Vec::new();
        for op in resp.operations {
            if matches!(op.state.as_deref(), Some(s) if s != "OPERATION_STATE_EXECUTED") {
                continue;
            }
            let Some(kind) = classify_operation(&op.operation_type) else {
                debug!("Skipping operation type: {}", op.operation_type);
                continue;
            };
            let Some(payment) = op.payment else { continue };
            let amount = money_value_to_decimal(parse_units(&payment.units), payment.nano);

            // Wire dates are RFC3339; only the calendar day matters here
            let Ok(date) = op.date[..op.date.len().min(10)].parse::<NaiveDate>() else {
                warn!("Unparseable operation date: {}", op.date);
                continue;
            };

            flows.push(CashFlow { kind, amount, date });
        }

        Ok(flows)
    }

    async fn benchmark_price(&self) -> Result<Option<Decimal>> {
        self.current_price(BENCHMARK_INSTRUMENT).await
    }
}
