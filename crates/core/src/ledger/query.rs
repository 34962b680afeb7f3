//! Transaction listing: filters, raw filter parsing, and cursor ordering.
//!
//! Listings are ordered by `(tx_date, id)` descending. A page continues
//! strictly below the previous page's last row, so no OFFSET is involved.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use ledgerline_shared::types::{AccountId, CategoryId, Currency, Cursor, PageRequest};
use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{Direction, Transaction};

/// Typed, validated transaction filters. Empty sets mean "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Earliest UTC calendar date, inclusive.
    pub date_from: Option<NaiveDate>,
    /// Latest UTC calendar date, inclusive.
    pub date_to: Option<NaiveDate>,
    /// Minimum amount, inclusive.
    pub amount_min: Option<Decimal>,
    /// Maximum amount, inclusive.
    pub amount_max: Option<Decimal>,
    /// Only this direction.
    pub direction: Option<Direction>,
    /// Only these categories.
    pub category_ids: Vec<CategoryId>,
    /// Only this currency.
    pub currency: Option<Currency>,
    /// Case-insensitive merchant substring.
    pub merchant_contains: Option<String>,
    /// Case-insensitive description substring.
    pub description_contains: Option<String>,
    /// Only these accounts.
    pub account_ids: Vec<AccountId>,
    /// Earliest UTC wall-clock time, inclusive.
    pub time_from: Option<NaiveTime>,
    /// Latest UTC wall-clock time, inclusive. Earlier than `time_from` wraps past midnight.
    pub time_to: Option<NaiveTime>,
}

impl TransactionFilter {
    /// Rejects ranges that can never match.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(LedgerError::invalid_filter(
                    "date_range",
                    format!("start {from} is after end {to}"),
                ));
            }
        }
        for (field, bound) in [("amount_min", self.amount_min), ("amount_max", self.amount_max)] {
            if bound.is_some_and(|b| b.is_sign_negative() && !b.is_zero()) {
                return Err(LedgerError::invalid_filter(field, "amounts are unsigned"));
            }
        }
        if let (Some(min), Some(max)) = (self.amount_min, self.amount_max) {
            if min > max {
                return Err(LedgerError::invalid_filter(
                    "amount_range",
                    format!("minimum {min} exceeds maximum {max}"),
                ));
            }
        }
        Ok(())
    }

    /// Evaluates the filter against one transaction.
    #[must_use]
    pub fn matches(&self, tx: &Transaction) -> bool {
        let day = tx.tx_date.date_naive();
        if self.date_from.is_some_and(|from| day < from) || self.date_to.is_some_and(|to| day > to)
        {
            return false;
        }
        if self.amount_min.is_some_and(|min| tx.amount < min)
            || self.amount_max.is_some_and(|max| tx.amount > max)
        {
            return false;
        }
        if self.direction.is_some_and(|d| d != tx.direction)
            || self.currency.is_some_and(|c| c != tx.currency)
        {
            return false;
        }
        if !self.category_ids.is_empty()
            && !tx.category_id.is_some_and(|c| self.category_ids.contains(&c))
        {
            return false;
        }
        if !self.account_ids.is_empty() && !self.account_ids.contains(&tx.account_id) {
            return false;
        }
        if !contains_folded(self.merchant_contains.as_deref(), tx.merchant.as_deref())
            || !contains_folded(self.description_contains.as_deref(), tx.description.as_deref())
        {
            return false;
        }
        time_in_window(tx.tx_date.time(), self.time_from, self.time_to)
    }
}

fn contains_folded(needle: Option<&str>, haystack: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(needle) => haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase())),
    }
}

/// Inclusive time-of-day window check; `from > to` wraps past midnight.
#[must_use]
pub fn time_in_window(time: NaiveTime, from: Option<NaiveTime>, to: Option<NaiveTime>) -> bool {
    match (from, to) {
        (None, None) => true,
        (Some(from), None) => time >= from,
        (None, Some(to)) => time <= to,
        (Some(from), Some(to)) if from <= to => time >= from && time <= to,
        (Some(from), Some(to)) => time >= from || time <= to,
    }
}

/// Listing order: `(tx_date, id)` descending.
#[must_use]
pub fn compare_desc(a: &Transaction, b: &Transaction) -> Ordering {
    (b.tx_date, b.id).cmp(&(a.tx_date, a.id))
}

/// True when the row sorts strictly after the cursor in listing order.
#[must_use]
pub fn is_below_cursor(tx: &Transaction, cursor: &Cursor) -> bool {
    (tx.tx_date, tx.id.into_inner()) < (cursor.date, cursor.id)
}

/// A validated listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    /// Row filters.
    pub filter: TransactionFilter,
    /// Page size and position.
    pub page: PageRequest,
}

/// Listing parameters as received from a caller, every value still a string.
///
/// Blank values count as absent. Anything else that fails to parse is a
/// validation error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTransactionQuery {
    /// `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`.
    pub end_date: Option<String>,
    /// Decimal.
    pub amount_min: Option<String>,
    /// Decimal.
    pub amount_max: Option<String>,
    /// `in` or `out`.
    pub direction: Option<String>,
    /// Comma-separated category UUIDs.
    pub categories: Option<String>,
    /// ISO 4217 code.
    pub currency: Option<String>,
    /// Merchant substring.
    pub merchant: Option<String>,
    /// Description substring.
    pub description: Option<String>,
    /// Comma-separated account UUIDs.
    pub account_ids: Option<String>,
    /// `HH:MM` or `HH:MM:SS`.
    pub time_start: Option<String>,
    /// `HH:MM` or `HH:MM:SS`.
    pub time_end: Option<String>,
    /// Page size.
    pub limit: Option<String>,
    /// Opaque cursor from a previous page.
    pub cursor: Option<String>,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_date(field: &'static str, value: Option<&String>) -> Result<Option<NaiveDate>, LedgerError> {
    present(value)
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|e| LedgerError::invalid_filter(field, format!("{v:?}: {e}")))
        })
        .transpose()
}

fn parse_time(field: &'static str, value: Option<&String>) -> Result<Option<NaiveTime>, LedgerError> {
    present(value)
        .map(|v| {
            NaiveTime::parse_from_str(v, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(v, "%H:%M"))
                .map_err(|e| LedgerError::invalid_filter(field, format!("{v:?}: {e}")))
        })
        .transpose()
}

fn parse_value<T>(field: &'static str, value: Option<&String>) -> Result<Option<T>, LedgerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    present(value)
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| LedgerError::invalid_filter(field, format!("{v:?}: {e}")))
        })
        .transpose()
}

fn parse_list<T>(field: &'static str, value: Option<&String>) -> Result<Vec<T>, LedgerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    present(value).map_or_else(
        || Ok(Vec::new()),
        |v| {
            v.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<T>()
                        .map_err(|e| LedgerError::invalid_filter(field, format!("{part:?}: {e}")))
                })
                .collect()
        },
    )
}

impl TryFrom<RawTransactionQuery> for TransactionQuery {
    type Error = LedgerError;

    fn try_from(raw: RawTransactionQuery) -> Result<Self, Self::Error> {
        let direction = present(raw.direction.as_ref())
            .map(Direction::from_str)
            .transpose()?;
        let currency = present(raw.currency.as_ref())
            .map(|c| Currency::from_str(c).map_err(|e| LedgerError::invalid_filter("currency", e)))
            .transpose()?;

        let filter = TransactionFilter {
            date_from: parse_date("start_date", raw.start_date.as_ref())?,
            date_to: parse_date("end_date", raw.end_date.as_ref())?,
            amount_min: parse_value("amount_min", raw.amount_min.as_ref())?,
            amount_max: parse_value("amount_max", raw.amount_max.as_ref())?,
            direction,
            category_ids: parse_list("categories", raw.categories.as_ref())?,
            currency,
            merchant_contains: present(raw.merchant.as_ref()).map(str::to_string),
            description_contains: present(raw.description.as_ref()).map(str::to_string),
            account_ids: parse_list("account_ids", raw.account_ids.as_ref())?,
            time_from: parse_time("time_start", raw.time_start.as_ref())?,
            time_to: parse_time("time_end", raw.time_end.as_ref())?,
        };
        filter.validate()?;

        let limit = parse_value::<u32>("limit", raw.limit.as_ref())?;
        let cursor = present(raw.cursor.as_ref()).map(Cursor::decode).transpose()?;

        Ok(Self {
            filter,
            page: PageRequest::new(limit, cursor),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ledgerline_shared::types::TransactionId;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use crate::ledger::types::NewTransaction;

    fn tx(day: u32, hour: u32, amount: Decimal, direction: Direction) -> Transaction {
        NewTransaction::new(
            AccountId::new(),
            Utc.with_ymd_and_hms(2025, 7, day, hour, 30, 0).unwrap(),
            amount,
            direction,
        )
        .with_merchant("Superstore")
        .with_description("SUPERSTORE GROCERIES #123")
        .into_transaction(TransactionId::new(), Utc::now())
    }

    fn raw(f: impl FnOnce(&mut RawTransactionQuery)) -> RawTransactionQuery {
        let mut raw = RawTransactionQuery::default();
        f(&mut raw);
        raw
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(TransactionFilter::default().matches(&tx(1, 1, dec!(1), Direction::In)));
    }

    #[test]
    fn test_substring_filters_are_case_insensitive() {
        let row = tx(5, 12, dec!(55.43), Direction::Out);
        let filter = TransactionFilter {
            merchant_contains: Some("superSTORE".into()),
            description_contains: Some("groceries".into()),
            ..TransactionFilter::default()
        };
        assert!(filter.matches(&row));

        let miss = TransactionFilter {
            description_contains: Some("pharmacy".into()),
            ..TransactionFilter::default()
        };
        assert!(!miss.matches(&row));
    }

    #[test]
    fn test_date_and_amount_ranges_are_inclusive() {
        let row = tx(10, 23, dec!(20), Direction::Out);
        let filter = TransactionFilter {
            date_from: NaiveDate::from_ymd_opt(2025, 7, 10),
            date_to: NaiveDate::from_ymd_opt(2025, 7, 10),
            amount_min: Some(dec!(20)),
            amount_max: Some(dec!(20)),
            direction: Some(Direction::Out),
            ..TransactionFilter::default()
        };
        assert!(filter.matches(&row));
    }

    #[rstest]
    #[case("09:00", "17:00", 12, true)]
    #[case("09:00", "17:00", 20, false)]
    #[case("22:00", "02:00", 23, true)]
    #[case("22:00", "02:00", 1, true)]
    #[case("22:00", "02:00", 12, false)]
    fn test_time_of_day_window(
        #[case] from: &str,
        #[case] to: &str,
        #[case] hour: u32,
        #[case] expected: bool,
    ) {
        let from = NaiveTime::parse_from_str(from, "%H:%M").unwrap();
        let to = NaiveTime::parse_from_str(to, "%H:%M").unwrap();
        let time = NaiveTime::from_hms_opt(hour, 30, 0).unwrap();
        assert_eq!(time_in_window(time, Some(from), Some(to)), expected);
    }

    #[test]
    fn test_category_and_account_sets() {
        let mut row = tx(3, 3, dec!(3), Direction::In);
        let category = CategoryId::new();
        row.category_id = Some(category);

        let hit = TransactionFilter {
            category_ids: vec![CategoryId::new(), category],
            account_ids: vec![row.account_id],
            ..TransactionFilter::default()
        };
        let miss = TransactionFilter {
            category_ids: vec![CategoryId::new()],
            ..TransactionFilter::default()
        };
        assert!(hit.matches(&row));
        assert!(!miss.matches(&row));
    }

    #[test]
    fn test_raw_query_parses_all_fields() {
        let account = AccountId::new();
        let query = TransactionQuery::try_from(raw(|r| {
            r.start_date = Some("2025-07-01".into());
            r.end_date = Some(" 2025-07-31 ".into());
            r.amount_min = Some("10".into());
            r.amount_max = Some("99.95".into());
            r.direction = Some("OUT".into());
            r.currency = Some("cad".into());
            r.merchant = Some("  ".into());
            r.account_ids = Some(format!("{account},"));
            r.time_start = Some("08:00".into());
            r.time_end = Some("18:30:15".into());
            r.limit = Some("500".into());
        }))
        .unwrap();

        assert_eq!(query.filter.date_to, NaiveDate::from_ymd_opt(2025, 7, 31));
        assert_eq!(query.filter.amount_max, Some(dec!(99.95)));
        assert_eq!(query.filter.direction, Some(Direction::Out));
        assert_eq!(query.filter.currency, Some(Currency::Cad));
        assert_eq!(query.filter.merchant_contains, None);
        assert_eq!(query.filter.account_ids, vec![account]);
        assert_eq!(query.filter.time_to, NaiveTime::from_hms_opt(18, 30, 15));
        assert_eq!(query.page.limit(), 100);
        assert!(query.page.cursor.is_none());
    }

    #[rstest]
    #[case(raw(|r| r.start_date = Some("07/01/2025".into())), "start_date")]
    #[case(raw(|r| r.end_date = Some("2025-02-30".into())), "end_date")]
    #[case(raw(|r| r.amount_min = Some("ten".into())), "amount_min")]
    #[case(raw(|r| r.amount_max = Some("-5".into())), "amount_max")]
    #[case(raw(|r| r.categories = Some("not-a-uuid".into())), "categories")]
    #[case(raw(|r| r.currency = Some("DOGE".into())), "currency")]
    #[case(raw(|r| r.time_start = Some("25:00".into())), "time_start")]
    #[case(raw(|r| r.limit = Some("-1".into())), "limit")]
    #[case(raw(|r| r.cursor = Some("%%%".into())), "cursor")]
    #[case(raw(|r| { r.start_date = Some("2025-08-01".into()); r.end_date = Some("2025-07-01".into()); }), "date_range")]
    #[case(raw(|r| { r.amount_min = Some("9".into()); r.amount_max = Some("1".into()); }), "amount_range")]
    fn test_malformed_filters_are_rejected(
        #[case] raw: RawTransactionQuery,
        #[case] expected_field: &str,
    ) {
        match TransactionQuery::try_from(raw) {
            Err(LedgerError::InvalidFilter { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected invalid filter {expected_field}, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_direction_is_rejected() {
        let err = TransactionQuery::try_from(raw(|r| r.direction = Some("both".into()))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidDirection(_)));
    }

    #[test]
    fn test_cursor_ordering() {
        let newer = tx(9, 10, dec!(1), Direction::In);
        let older = tx(8, 10, dec!(1), Direction::In);
        assert_eq!(compare_desc(&newer, &older), Ordering::Less);
        assert!(is_below_cursor(&older, &newer.cursor()));
        assert!(!is_below_cursor(&newer, &newer.cursor()));
    }
}
