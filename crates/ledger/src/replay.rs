//! Ledger replay engine.
//!
//! Pure functions over an explicit transaction slice: no stored cursor, no
//! hidden state. The same fold produces the opening balance, the in-window
//! rows and the live balance, which is what makes a stock card independent of
//! the window it is requested for.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult, TransactionId};

use crate::transaction::{StockTransaction, TransactionKind};

/// Inclusive calendar window, interpreted in UTC.
///
/// `from` starts at midnight; `to` runs through the end of its day.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    from: NaiveDate,
    to: NaiveDate,
    starts_at: DateTime<Utc>,
    ends_before: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(from: NaiveDate, to: NaiveDate) -> LedgerResult<Self> {
        if from > to {
            return Err(LedgerError::validation(format!(
                "window start {from} is after window end {to}"
            )));
        }
        let next_day = to
            .succ_opt()
            .ok_or_else(|| LedgerError::validation("window end is out of range"))?;

        Ok(Self {
            from,
            to,
            starts_at: midnight(from),
            ends_before: midnight(next_day),
        })
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn is_before(&self, at: DateTime<Utc>) -> bool {
        at < self.starts_at
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at && at < self.ends_before
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// One stock card line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCardRow {
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
    pub kind: TransactionKind,
    /// Quantity as stored (target balance for ADJUST).
    pub quantity: i64,
    pub qty_in: i64,
    pub qty_out: i64,
    pub balance: i64,
    pub note: String,
    pub responsible: Option<String>,
}

/// Opening balance plus per-transaction running balance over a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockCard {
    pub window: DateWindow,
    pub opening_balance: i64,
    pub rows: Vec<StockCardRow>,
    pub total_in: i64,
    pub total_out: i64,
    pub closing_balance: i64,
}

/// Transactions in replay order: `occurred_at`, then id.
///
/// The input order is irrelevant; the slice is not modified.
pub fn ordered(transactions: &[StockTransaction]) -> Vec<&StockTransaction> {
    let mut sorted: Vec<&StockTransaction> = transactions.iter().collect();
    sorted.sort_by_key(|tx| tx.ordering_key());
    sorted
}

/// Balance after replaying the whole history from zero.
pub fn closing_balance(transactions: &[StockTransaction]) -> LedgerResult<i64> {
    ordered(transactions)
        .into_iter()
        .try_fold(0, |balance, tx| -> LedgerResult<i64> { Ok(tx.step(balance)?.balance) })
}

/// Build the stock card for `window`.
///
/// Everything strictly before the window folds into the opening balance;
/// transactions after the window are ignored.
pub fn stock_card(transactions: &[StockTransaction], window: &DateWindow) -> LedgerResult<StockCard> {
    let mut balance = 0;
    let mut rows = Vec::new();
    let mut opening_balance = 0;
    let mut total_in = 0;
    let mut total_out = 0;

    for tx in ordered(transactions) {
        if window.is_before(tx.occurred_at) {
            balance = tx.step(balance)?.balance;
            opening_balance = balance;
            continue;
        }
        if !window.contains(tx.occurred_at) {
            break;
        }

        let step = tx.step(balance)?;
        balance = step.balance;
        total_in = accumulate(total_in, step.qty_in)?;
        total_out = accumulate(total_out, step.qty_out)?;
        rows.push(StockCardRow {
            transaction_id: tx.id,
            occurred_at: tx.occurred_at,
            kind: tx.kind,
            quantity: tx.quantity,
            qty_in: step.qty_in,
            qty_out: step.qty_out,
            balance,
            note: tx.note.clone(),
            responsible: tx.responsible.clone(),
        });
    }

    let closing_balance = rows.last().map(|r| r.balance).unwrap_or(opening_balance);

    Ok(StockCard {
        window: *window,
        opening_balance,
        rows,
        total_in,
        total_out,
        closing_balance,
    })
}

fn accumulate(total: i64, quantity: i64) -> LedgerResult<i64> {
    total
        .checked_add(quantity)
        .ok_or_else(|| LedgerError::validation("stock card totals exceed the supported range"))
}
