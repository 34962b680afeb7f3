//! Receipt-to-transaction scoring.
//!
//! Candidate search is a cheap coarse pass: unlinked outgoing transactions in a
//! 60-day window whose amount covers the receipt total plus up to 20%, then a
//! word-set Jaccard floor on the description. Survivors are scored:
//!
//! | factor   | weight | full marks              | zero                         |
//! |----------|--------|-------------------------|------------------------------|
//! | amount   | 0.45   | within one cent         | below total, or >= 20% above |
//! | date     | 0.35   | same calendar day       | 30+ days apart               |
//! | merchant | 0.20   | identical word sets     | no shared words              |
//!
//! A candidate needs 0.7 overall to be linked. Only a perfect 1.0 links as
//! `matched`; anything less asks for verification.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use ledgerline_shared::types::TransactionId;
use rust_decimal::Decimal;

use super::types::LinkStatus;
use crate::ledger::Transaction;
use crate::ledger::query::compare_desc;

/// Weight of the amount score.
pub const AMOUNT_WEIGHT: Decimal = Decimal::from_parts(45, 0, 0, false, 2);
/// Weight of the date score.
pub const DATE_WEIGHT: Decimal = Decimal::from_parts(35, 0, 0, false, 2);
/// Weight of the merchant score.
pub const MERCHANT_WEIGHT: Decimal = Decimal::from_parts(20, 0, 0, false, 2);
/// Minimum overall score for a link.
pub const MATCH_THRESHOLD: Decimal = Decimal::from_parts(7, 0, 0, false, 1);
/// Minimum merchant similarity to enter scoring.
pub const ADMISSION_FLOOR: Decimal = Decimal::from_parts(3, 0, 0, false, 1);
/// Most candidates scored per receipt.
pub const MAX_CANDIDATES: usize = 10;
/// Days before the purchase date searched for candidates.
pub const CANDIDATE_WINDOW_DAYS: i64 = 60;
/// Days apart at which the date score reaches zero.
pub const DATE_HORIZON_DAYS: i64 = 30;

const AMOUNT_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(2, 0, 0, false, 1);
const AMOUNT_CEILING: Decimal = Decimal::from_parts(12, 0, 0, false, 1);
// Any overcharge caps amount confidence below a clean match.
const OVERCHARGE_CAP: Decimal = Decimal::from_parts(9, 0, 0, false, 1);

/// The receipt fields matching depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFacts {
    /// Receipt total.
    pub total: Decimal,
    /// Purchase date.
    pub purchase_date: NaiveDate,
    /// Merchant name.
    pub merchant: String,
}

/// Coarse relational bounds for candidate search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateWindow {
    /// Earliest transaction date, inclusive.
    pub earliest: NaiveDate,
    /// Latest transaction date, inclusive.
    pub latest: NaiveDate,
    /// Lowest amount, inclusive.
    pub min_amount: Decimal,
    /// Highest amount, inclusive.
    pub max_amount: Decimal,
}

impl CandidateWindow {
    /// Search bounds for a receipt.
    #[must_use]
    pub fn for_receipt(facts: &ReceiptFacts) -> Self {
        Self {
            earliest: facts
                .purchase_date
                .checked_sub_signed(Duration::days(CANDIDATE_WINDOW_DAYS))
                .unwrap_or(NaiveDate::MIN),
            latest: facts.purchase_date,
            min_amount: facts.total,
            max_amount: facts.total.checked_mul(AMOUNT_CEILING).unwrap_or(Decimal::MAX),
        }
    }

    /// Whether a transaction passes the coarse filter.
    #[must_use]
    pub fn admits(&self, tx: &Transaction) -> bool {
        let day = tx.tx_date.date_naive();
        tx.receipt_id.is_none()
            && tx.direction == crate::ledger::Direction::Out
            && day >= self.earliest
            && day <= self.latest
            && tx.amount >= self.min_amount
            && tx.amount <= self.max_amount
    }
}

/// A transaction that passed candidate search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The transaction.
    pub transaction: Transaction,
    /// Merchant similarity against its description.
    pub similarity: Decimal,
}

/// Per-factor and weighted scores for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchScore {
    /// Amount factor.
    pub amount: Decimal,
    /// Date factor.
    pub date: Decimal,
    /// Merchant factor.
    pub merchant: Decimal,
    /// Weighted sum.
    pub total: Decimal,
}

/// Result of scoring all candidates for a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    /// Best candidate above the threshold.
    pub best: Option<(TransactionId, MatchScore)>,
    /// Link status to apply if `best` is linked.
    pub link_status: LinkStatus,
    /// Remaining survivors, best first.
    pub suggestions: Vec<TransactionId>,
}

/// Amount factor. Undercharges score zero; overcharges decay to zero at +20%.
#[must_use]
pub fn amount_score(receipt_total: Decimal, tx_amount: Decimal) -> Decimal {
    let excess = tx_amount - receipt_total;
    if excess.abs() < AMOUNT_EPSILON {
        return Decimal::ONE;
    }
    if tx_amount < receipt_total {
        return Decimal::ZERO;
    }

    let max_excess = receipt_total * AMOUNT_TOLERANCE;
    if excess >= max_excess {
        return Decimal::ZERO;
    }
    OVERCHARGE_CAP * (Decimal::ONE - excess / max_excess)
}

/// Date factor, comparing calendar days only.
#[must_use]
pub fn date_score(purchase_date: NaiveDate, tx_date: NaiveDate) -> Decimal {
    let days = (purchase_date - tx_date).num_days().abs();
    if days >= DATE_HORIZON_DAYS {
        return Decimal::ZERO;
    }
    Decimal::ONE - Decimal::from(days) / Decimal::from(DATE_HORIZON_DAYS)
}

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Word-set Jaccard index of two strings, case-folded.
#[must_use]
pub fn merchant_similarity(a: &str, b: &str) -> Decimal {
    let a = word_set(a);
    let b = word_set(b);
    let union = a.union(&b).count();
    if union == 0 {
        return Decimal::ZERO;
    }
    let shared = a.intersection(&b).count();
    Decimal::from(shared) / Decimal::from(union)
}

/// Applies the similarity floor and keeps the best [`MAX_CANDIDATES`].
///
/// Input must already satisfy the [`CandidateWindow`].
#[must_use]
pub fn shortlist(merchant: &str, transactions: Vec<Transaction>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = transactions
        .into_iter()
        .map(|tx| {
            let similarity = merchant_similarity(merchant, tx.description.as_deref().unwrap_or(""));
            Candidate {
                transaction: tx,
                similarity,
            }
        })
        .filter(|c| c.similarity > ADMISSION_FLOOR)
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity
            .cmp(&a.similarity)
            .then_with(|| compare_desc(&a.transaction, &b.transaction))
    });
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

/// Scores one candidate.
#[must_use]
pub fn score(facts: &ReceiptFacts, candidate: &Candidate) -> MatchScore {
    let amount = amount_score(facts.total, candidate.transaction.amount);
    let date = date_score(facts.purchase_date, candidate.transaction.tx_date.date_naive());
    let merchant = candidate.similarity;
    MatchScore {
        amount,
        date,
        merchant,
        total: amount * AMOUNT_WEIGHT + date * DATE_WEIGHT + merchant * MERCHANT_WEIGHT,
    }
}

/// Scores candidates and picks the link target and suggestions.
#[must_use]
pub fn select(facts: &ReceiptFacts, candidates: &[Candidate]) -> MatchOutcome {
    let mut survivors: Vec<(TransactionId, MatchScore)> = candidates
        .iter()
        .map(|c| (c.transaction.id, score(facts, c)))
        .filter(|(_, s)| s.total >= MATCH_THRESHOLD)
        .collect();
    survivors.sort_by(|a, b| b.1.total.cmp(&a.1.total));

    let mut survivors = survivors.into_iter();
    let Some(best) = survivors.next() else {
        return MatchOutcome::default();
    };

    let link_status = if best.1.total == Decimal::ONE {
        LinkStatus::Matched
    } else {
        LinkStatus::NeedsVerification
    };

    MatchOutcome {
        best: Some(best),
        link_status,
        suggestions: survivors.map(|(id, _)| id).collect(),
    }
}
