//! Anchor-based running balance computation.
//!
//! An account's only non-derived balance fact is its anchor: a balance known
//! to be exact on a given date. Every transaction's `balance_after` is
//!
//! ```text
//! anchor_balance + running_delta(tx) - delta_at_anchor
//! ```
//!
//! where `running_delta` is the signed sum over the `(tx_date, id)`-ordered
//! chain up to and including `tx`, and `delta_at_anchor` is the signed sum of
//! everything dated strictly before the anchor date. Moving the anchor only
//! changes `delta_at_anchor`, so the recompute is always full and never drifts.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerline_shared::types::{Currency, Money, TransactionId};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{Account, Transaction};
use super::validation::is_storable;

/// An account's balance anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    /// Date on which `balance` is exact.
    pub date: NaiveDate,
    /// Known-true balance.
    pub balance: Decimal,
}

impl From<&Account> for Anchor {
    fn from(account: &Account) -> Self {
        Self {
            date: account.anchor_date,
            balance: account.anchor_balance,
        }
    }
}

/// The part of a transaction the balance chain needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEntry {
    /// Transaction ID, tiebreaker within a timestamp.
    pub id: TransactionId,
    /// Transaction timestamp.
    pub tx_date: DateTime<Utc>,
    /// Amount with the direction sign applied.
    pub signed_amount: Decimal,
}

impl From<&Transaction> for ChainEntry {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            tx_date: tx.tx_date,
            signed_amount: tx.signed_amount(),
        }
    }
}

/// True when the entry's calendar date (UTC) falls strictly before the anchor date.
#[must_use]
pub fn is_before_anchor(tx_date: DateTime<Utc>, anchor_date: NaiveDate) -> bool {
    tx_date.date_naive() < anchor_date
}

/// Signed sum of all entries dated strictly before `anchor_date`, `None` on overflow.
#[must_use]
pub fn delta_at_anchor(anchor_date: NaiveDate, entries: &[ChainEntry]) -> Option<Decimal> {
    entries
        .iter()
        .filter(|e| is_before_anchor(e.tx_date, anchor_date))
        .try_fold(Decimal::ZERO, |sum, e| sum.checked_add(e.signed_amount))
}

/// Recomputes `balance_after` for a whole account chain.
///
/// Returns `(id, balance_after)` pairs in ascending `(tx_date, id)` order.
/// Input order does not matter. Fails without side effects when any running
/// balance would not fit the store.
pub fn recompute(
    anchor: &Anchor,
    entries: &[ChainEntry],
) -> Result<Vec<(TransactionId, Decimal)>, LedgerError> {
    let mut ordered = entries.to_vec();
    ordered.sort_by_key(|e| (e.tx_date, e.id));

    let baseline = delta_at_anchor(anchor.date, &ordered)
        .and_then(|delta| anchor.balance.checked_sub(delta))
        .ok_or_else(overflowed)?;
    let mut running = Decimal::ZERO;

    ordered
        .iter()
        .map(|e| {
            running = running.checked_add(e.signed_amount).ok_or_else(overflowed)?;
            let balance_after = baseline.checked_add(running).ok_or_else(overflowed)?;
            if !is_storable(balance_after) {
                return Err(LedgerError::AmountOutOfRange(balance_after));
            }
            Ok((e.id, balance_after))
        })
        .collect()
}

fn overflowed() -> LedgerError {
    LedgerError::Validation("running balance overflowed".to_string())
}

/// Current balance of an account given its latest transaction, if any.
///
/// With no transactions the anchor balance is the balance.
#[must_use]
pub fn current_balance(account: &Account, latest: Option<&Transaction>) -> Money {
    let amount = latest.map_or(account.anchor_balance, |tx| tx.balance_after);
    Money::new(amount, account.anchor_currency)
}

/// Adds `amount` to the running total for `currency`, keeping currencies sorted.
pub(crate) fn accumulate(totals: &mut Vec<Money>, currency: Currency, amount: Decimal) {
    match totals.binary_search_by_key(&currency, |m| m.currency) {
        Ok(i) => totals[i].amount += amount,
        Err(i) => totals.insert(i, Money::new(amount, currency)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(tx_date: DateTime<Utc>, signed_amount: Decimal) -> ChainEntry {
        ChainEntry {
            id: TransactionId::new(),
            tx_date,
            signed_amount,
        }
    }

    #[test]
    fn test_anchor_scenario() {
        let anchor = Anchor {
            date: date(2025, 7, 18),
            balance: dec!(1200.50),
        };
        let deposit = entry(at(2025, 7, 20, 12), dec!(100.00));
        let purchase = entry(at(2025, 7, 19, 12), dec!(-25.50));

        let balances = recompute(&anchor, &[deposit, purchase]).unwrap();

        assert_eq!(balances, vec![(purchase.id, dec!(1175.00)), (deposit.id, dec!(1275.00))]);
    }

    #[test]
    fn test_transactions_before_anchor_are_rebased() {
        let anchor = Anchor {
            date: date(2025, 3, 1),
            balance: dec!(500),
        };
        let old = entry(at(2025, 2, 27, 8), dec!(-40));
        let older = entry(at(2025, 2, 20, 8), dec!(200));
        let new = entry(at(2025, 3, 2, 8), dec!(-10));

        let balances = recompute(&anchor, &[new, old, older]).unwrap();

        // The last pre-anchor row lands exactly on the anchor balance.
        assert_eq!(balances[0], (older.id, dec!(540)));
        assert_eq!(balances[1], (old.id, dec!(500)));
        assert_eq!(balances[2], (new.id, dec!(490)));
    }

    #[test]
    fn test_anchor_day_transactions_count_after_anchor() {
        let anchor = Anchor {
            date: date(2025, 3, 1),
            balance: dec!(100),
        };
        let same_day = entry(at(2025, 3, 1, 0), dec!(5));
        assert_eq!(delta_at_anchor(anchor.date, &[same_day]), Some(Decimal::ZERO));
        assert_eq!(recompute(&anchor, &[same_day]).unwrap(), vec![(same_day.id, dec!(105))]);
    }

    #[test]
    fn test_same_timestamp_orders_by_id() {
        let anchor = Anchor {
            date: date(2025, 1, 1),
            balance: dec!(0),
        };
        let when = at(2025, 1, 2, 10);
        let first = entry(when, dec!(1));
        let second = entry(when, dec!(2));

        let balances = recompute(&anchor, &[second, first]).unwrap();
        assert_eq!(balances, vec![(first.id, dec!(1)), (second.id, dec!(3))]);
    }

    #[rstest]
    #[case(date(2025, 1, 1), dec!(1000))]
    #[case(date(2025, 6, 15), dec!(-250.75))]
    #[case(date(2030, 1, 1), dec!(0))]
    fn test_moving_anchor_keeps_deltas(#[case] anchor_date: NaiveDate, #[case] balance: Decimal) {
        let entries = [
            entry(at(2025, 2, 1, 0), dec!(10)),
            entry(at(2025, 6, 14, 0), dec!(-3.25)),
            entry(at(2025, 6, 15, 0), dec!(7)),
        ];
        let balances = recompute(&Anchor { date: anchor_date, balance }, &entries).unwrap();

        for pair in balances.windows(2) {
            let next = entries.iter().find(|e| e.id == pair[1].0).unwrap();
            assert_eq!(pair[1].1 - pair[0].1, next.signed_amount);
        }
    }

    #[test]
    fn test_empty_chain() {
        let anchor = Anchor {
            date: date(2025, 1, 1),
            balance: dec!(10),
        };
        assert!(recompute(&anchor, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_balance_at_storable_limit() {
        let anchor = Anchor {
            date: date(2025, 1, 1),
            balance: dec!(999999999999999.9998),
        };
        let cent = entry(at(2025, 1, 2, 0), dec!(0.0001));
        assert_eq!(
            recompute(&anchor, &[cent]).unwrap(),
            vec![(cent.id, dec!(999999999999999.9999))]
        );

        let over = entry(at(2025, 1, 3, 0), dec!(0.0001));
        assert!(matches!(
            recompute(&anchor, &[cent, over]),
            Err(LedgerError::AmountOutOfRange(_))
        ));
    }

    #[test]
    fn test_running_sum_overflow_is_an_error() {
        let anchor = Anchor {
            date: date(2025, 1, 1),
            balance: dec!(0),
        };
        let entries = [entry(at(2025, 1, 2, 0), Decimal::MAX), entry(at(2025, 1, 3, 0), dec!(1))];

        let err = recompute(&anchor, &entries).unwrap_err();
        assert_eq!(err.kind(), ledgerline_shared::ErrorKind::Validation);

        let early = [entry(at(2024, 1, 2, 0), Decimal::MAX), entry(at(2024, 1, 3, 0), dec!(1))];
        assert_eq!(delta_at_anchor(anchor.date, &early), None);
        assert!(recompute(&anchor, &early).is_err());
    }

    #[test]
    fn test_accumulate_groups_by_currency() {
        let mut totals = Vec::new();
        accumulate(&mut totals, Currency::Usd, dec!(5));
        accumulate(&mut totals, Currency::Cad, dec!(1));
        accumulate(&mut totals, Currency::Usd, dec!(2));
        assert_eq!(
            totals,
            vec![Money::new(dec!(1), Currency::Cad), Money::new(dec!(7), Currency::Usd)]
        );
    }
}
