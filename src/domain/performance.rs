//! Performance aggregation over a window of paper trades.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::ledger::{PaperTrade, DEFAULT_TOTAL_CAPITAL};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationPolicy {
    /// Count trades priced by the dummy quote provider.
    pub include_degenerate: bool,
    /// Notional starting equity used to express drawdown as a rate.
    pub base_capital: f64,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            include_degenerate: false,
            base_capital: DEFAULT_TOTAL_CAPITAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub daily_pnl: f64,
    /// Cumulative PnL through `date`.
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Drawdown {
    /// Largest peak-to-trough fall of cumulative PnL, in currency. Never negative.
    pub amount: f64,
    /// `amount` relative to `base_capital + peak`.
    pub rate: f64,
    pub peak_date: Option<NaiveDate>,
    pub trough_date: Option<NaiveDate>,
    /// Longest run of points below the running peak.
    pub duration: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub trade_count: usize,
    pub invested: f64,
    pub pnl: f64,
    pub pnl_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityContribution {
    pub code: String,
    pub name: String,
    pub trade_count: usize,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PerformanceSummary {
    pub trade_count: usize,
    /// Trades dropped by the policy before any statistic was computed.
    pub excluded_count: usize,
    pub total_invested: f64,
    pub total_value: f64,
    pub total_pnl: f64,
    pub total_pnl_rate: f64,
    pub win_count: usize,
    pub loss_count: usize,
    pub draw_count: usize,
    /// Wins over all counted trades; a flat trade is not a win.
    pub win_rate: f64,
    pub equity_curve: Vec<EquityPoint>,
    pub max_drawdown: Drawdown,
    pub days: Vec<DaySummary>,
    pub best_day: Option<DaySummary>,
    pub worst_day: Option<DaySummary>,
    pub best_security: Option<SecurityContribution>,
    pub worst_security: Option<SecurityContribution>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlySummary {
    pub year: i32,
    pub month: u32,
    pub summary: PerformanceSummary,
}

pub struct Aggregator {
    policy: AggregationPolicy,
}

impl Aggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    pub fn aggregate(&self, trades: &[PaperTrade]) -> PerformanceSummary {
        // Every input date gets a curve point, even if all its trades are filtered.
        let mut by_date: BTreeMap<NaiveDate, Vec<&PaperTrade>> = BTreeMap::new();
        let mut excluded_count = 0;
        for trade in trades {
            let bucket = by_date.entry(trade.date).or_default();
            if !self.policy.include_degenerate && trade.quote_source.is_degenerate() {
                excluded_count += 1;
            } else {
                bucket.push(trade);
            }
        }
        let counted: Vec<&PaperTrade> = by_date.values().flatten().copied().collect();

        let total_invested: f64 = counted.iter().map(|t| t.invested_amount).sum();
        let total_value: f64 = counted.iter().map(|t| t.current_value).sum();
        let total_pnl: f64 = counted.iter().map(|t| t.pnl).sum();
        let total_pnl_rate = if total_invested > 0.0 {
            total_pnl / total_invested
        } else {
            0.0
        };

        let win_count = counted.iter().filter(|t| t.pnl > 0.0).count();
        let loss_count = counted.iter().filter(|t| t.pnl < 0.0).count();
        let draw_count = counted.len() - win_count - loss_count;
        let win_rate = if counted.is_empty() {
            0.0
        } else {
            win_count as f64 / counted.len() as f64
        };

        let mut equity = 0.0;
        let mut equity_curve = Vec::with_capacity(by_date.len());
        let mut days = Vec::new();
        for (date, day_trades) in &by_date {
            let daily_pnl: f64 = day_trades.iter().map(|t| t.pnl).sum();
            equity += daily_pnl;
            equity_curve.push(EquityPoint {
                date: *date,
                daily_pnl,
                equity,
            });
            if !day_trades.is_empty() {
                let invested: f64 = day_trades.iter().map(|t| t.invested_amount).sum();
                days.push(DaySummary {
                    date: *date,
                    trade_count: day_trades.len(),
                    invested,
                    pnl: daily_pnl,
                    pnl_rate: if invested > 0.0 { daily_pnl / invested } else { 0.0 },
                });
            }
        }

        let max_drawdown = compute_drawdown(&equity_curve, self.policy.base_capital);

        // Earliest date wins ties on both ends.
        let best_day = days
            .iter()
            .fold(None::<&DaySummary>, |best, d| match best {
                Some(b) if b.pnl >= d.pnl => Some(b),
                _ => Some(d),
            })
            .cloned();
        let worst_day = days
            .iter()
            .fold(None::<&DaySummary>, |worst, d| match worst {
                Some(w) if w.pnl <= d.pnl => Some(w),
                _ => Some(d),
            })
            .cloned();

        let contributions = contributions(&counted);
        let best_security = contributions
            .iter()
            .max_by(|a, b| a.pnl.total_cmp(&b.pnl).then_with(|| b.code.cmp(&a.code)))
            .cloned();
        let worst_security = contributions
            .iter()
            .min_by(|a, b| a.pnl.total_cmp(&b.pnl).then_with(|| a.code.cmp(&b.code)))
            .cloned();

        PerformanceSummary {
            trade_count: counted.len(),
            excluded_count,
            total_invested,
            total_value,
            total_pnl,
            total_pnl_rate,
            win_count,
            loss_count,
            draw_count,
            win_rate,
            equity_curve,
            max_drawdown,
            days,
            best_day,
            worst_day,
            best_security,
            worst_security,
        }
    }

    /// Aggregate only the trades dated within the given calendar month.
    pub fn monthly_summary(&self, year: i32, month: u32, trades: &[PaperTrade]) -> MonthlySummary {
        let in_month: Vec<PaperTrade> = trades
            .iter()
            .filter(|t| t.date.year() == year && t.date.month() == month)
            .cloned()
            .collect();
        MonthlySummary {
            year,
            month,
            summary: self.aggregate(&in_month),
        }
    }
}

fn contributions(trades: &[&PaperTrade]) -> Vec<SecurityContribution> {
    let mut by_code: BTreeMap<&str, SecurityContribution> = BTreeMap::new();
    for trade in trades {
        let entry = by_code
            .entry(trade.code.as_str())
            .or_insert_with(|| SecurityContribution {
                code: trade.code.clone(),
                name: trade.name.clone(),
                trade_count: 0,
                pnl: 0.0,
            });
        entry.trade_count += 1;
        entry.pnl += trade.pnl;
    }
    by_code.into_values().collect()
}

/// Largest fall from the running peak of the curve.
fn compute_drawdown(curve: &[EquityPoint], base_capital: f64) -> Drawdown {
    let Some(first) = curve.first() else {
        return Drawdown::default();
    };

    let mut peak = first.equity;
    let mut peak_date = first.date;
    let mut worst = Drawdown::default();
    let mut run = 0usize;

    for point in curve {
        if point.equity >= peak {
            peak = point.equity;
            peak_date = point.date;
            run = 0;
            continue;
        }
        run += 1;
        worst.duration = worst.duration.max(run);
        let amount = peak - point.equity;
        if amount > worst.amount {
            let reference = base_capital + peak;
            worst.amount = amount;
            worst.rate = if reference > 0.0 { amount / reference } else { 0.0 };
            worst.peak_date = Some(peak_date);
            worst.trough_date = Some(point.date);
        }
    }
    worst
}
