//! Inception P&L
//!
//! Lifetime profit computed from the full cash-flow history:
//!
//! ```text
//! total_pnl = current_equity + withdrawals + dividends - deposits - commissions
//! ```
//!
//! The identity is cash-flow-complete, so instruments bought and fully sold
//! inside the window still count. Trades themselves are deliberately ignored.

use crate::types::{CashFlow, FlowKind};
use rust_decimal::Decimal;

/// How an [`InceptionPnl`] was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PnlBasis {
    /// Full cash-flow replay
    CashFlows,
    /// History unavailable; only the current unrealized P&L is known
    UnrealizedOnly,
    /// Neither history nor current equity available
    Unavailable,
}

/// Lifetime P&L breakdown. All flow fields are positive magnitudes in home
/// currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InceptionPnl {
    pub basis: PnlBasis,
    pub total_pnl: Decimal,
    pub deposits: Decimal,
    pub withdrawals: Decimal,
    pub dividends: Decimal,
    pub commissions: Decimal,
    /// deposits - withdrawals
    pub net_invested: Decimal,
    pub current_equity: Decimal,
}

impl InceptionPnl {
    /// Degraded result carrying only the unrealized P&L of current holdings
    pub fn unrealized_only(current_equity: Decimal, unrealized_pnl: Decimal) -> Self {
        Self {
            basis: PnlBasis::UnrealizedOnly,
            total_pnl: unrealized_pnl,
            deposits: Decimal::ZERO,
            withdrawals: Decimal::ZERO,
            dividends: Decimal::ZERO,
            commissions: Decimal::ZERO,
            net_invested: Decimal::ZERO,
            current_equity,
        }
    }

    /// Fallback-of-fallback: nothing is known, everything zero
    pub fn unavailable() -> Self {
        Self {
            basis: PnlBasis::Unavailable,
            total_pnl: Decimal::ZERO,
            deposits: Decimal::ZERO,
            withdrawals: Decimal::ZERO,
            dividends: Decimal::ZERO,
            commissions: Decimal::ZERO,
            net_invested: Decimal::ZERO,
            current_equity: Decimal::ZERO,
        }
    }
}

/// Replay the operation history against current equity.
pub fn compute_lifetime_pnl(flows: &[CashFlow], current_equity: Decimal) -> InceptionPnl {
    let mut deposits = Decimal::ZERO;
    let mut withdrawals = Decimal::ZERO;
    let mut dividends = Decimal::ZERO;
    let mut commissions = Decimal::ZERO;

    for flow in flows {
        match flow.kind {
            FlowKind::Deposit => deposits += flow.amount.abs(),
            // Withdrawals and fees arrive as negative payments on the wire
            FlowKind::Withdrawal => withdrawals += flow.amount.abs(),
            FlowKind::Dividend => dividends += flow.amount.abs(),
            FlowKind::Commission => commissions += flow.amount.abs(),
            FlowKind::Trade => {}
        }
    }

    let net_invested = deposits - withdrawals;
    let total_pnl = current_equity + withdrawals + dividends - deposits - commissions;

    InceptionPnl {
        basis: PnlBasis::CashFlows,
        total_pnl,
        deposits,
        withdrawals,
        dividends,
        commissions,
        net_invested,
        current_equity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn flow(kind: FlowKind, amount: Decimal) -> CashFlow {
        CashFlow {
            kind,
            amount,
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        }
    }

    #[test]
    fn test_identity() {
        let flows = vec![
            flow(FlowKind::Deposit, dec!(10000)),
            flow(FlowKind::Dividend, dec!(200)),
            flow(FlowKind::Commission, dec!(-50)),
        ];

        let pnl = compute_lifetime_pnl(&flows, dec!(10800));

        assert_eq!(pnl.basis, PnlBasis::CashFlows);
        assert_eq!(pnl.deposits, dec!(10000));
        assert_eq!(pnl.withdrawals, dec!(0));
        assert_eq!(pnl.dividends, dec!(200));
        assert_eq!(pnl.commissions, dec!(50));
        assert_eq!(pnl.net_invested, dec!(10000));
        // 10800 + 0 + 200 - 10000 - 50
        assert_eq!(pnl.total_pnl, dec!(950));
    }

    #[test]
    fn test_withdrawals_count_back_as_profit() {
        let flows = vec![
            flow(FlowKind::Deposit, dec!(5000)),
            flow(FlowKind::Withdrawal, dec!(-2000)),
        ];

        let pnl = compute_lifetime_pnl(&flows, dec!(3500));

        assert_eq!(pnl.withdrawals, dec!(2000));
        assert_eq!(pnl.net_invested, dec!(3000));
        // 3500 + 2000 - 5000
        assert_eq!(pnl.total_pnl, dec!(500));
    }

    #[test]
    fn test_trades_ignored() {
        let flows = vec![
            flow(FlowKind::Deposit, dec!(1000)),
            flow(FlowKind::Trade, dec!(-700)),
            flow(FlowKind::Trade, dec!(750)),
        ];

        let pnl = compute_lifetime_pnl(&flows, dec!(1050));

        assert_eq!(pnl.deposits, dec!(1000));
        assert_eq!(pnl.total_pnl, dec!(50));
    }

    #[test]
    fn test_empty_history() {
        let pnl = compute_lifetime_pnl(&[], dec!(1234));

        assert_eq!(pnl.basis, PnlBasis::CashFlows);
        assert_eq!(pnl.total_pnl, dec!(1234));
        assert_eq!(pnl.net_invested, dec!(0));
    }

    #[test]
    fn test_unrealized_only_fallback() {
        let pnl = InceptionPnl::unrealized_only(dec!(9000), dec!(-120));

        assert_eq!(pnl.basis, PnlBasis::UnrealizedOnly);
        assert_eq!(pnl.total_pnl, dec!(-120));
        assert_eq!(pnl.current_equity, dec!(9000));
        assert_eq!(pnl.deposits, dec!(0));
    }

    #[test]
    fn test_unavailable_is_all_zero() {
        let pnl = InceptionPnl::unavailable();
        assert_eq!(pnl.basis, PnlBasis::Unavailable);
        assert_eq!(pnl.total_pnl, dec!(0));
        assert_eq!(pnl.current_equity, dec!(0));
    }
}
