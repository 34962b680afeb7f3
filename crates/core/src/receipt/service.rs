//! Receipt ingestion: parse, archive, persist, and link.
//!
//! Ingestion never fails because a collaborator did. A parser failure yields a
//! `failed` receipt, an archive failure yields a receipt without an image key,
//! and a candidate-search failure yields an unlinked receipt. Only store
//! failures and link conflicts reach the caller.

use std::sync::Arc;

use chrono::Utc;
use ledgerline_shared::ErrorKind;
use ledgerline_shared::types::{ReceiptId, TransactionId};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use super::matcher::{self, CandidateWindow, MatchOutcome, ReceiptFacts};
use super::parser::{ParsedReceipt, ReceiptParser};
use super::types::{LinkStatus, NewReceipt, NewReceiptItem, ParseStatus, Receipt, ReceiptProvider};
use crate::ledger::validation::is_storable;
use crate::ledger::{LedgerError, LedgerStore};
use crate::storage::{ReceiptImageStore, StorageError, sha256_hex};

/// Receipt operations over a store, a parser, and an optional image archive.
pub struct ReceiptService<S: LedgerStore, P: ReceiptParser> {
    store: Arc<S>,
    parser: Arc<P>,
    images: Option<ReceiptImageStore>,
}

impl<S: LedgerStore, P: ReceiptParser> Clone for ReceiptService<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            parser: Arc::clone(&self.parser),
            images: self.images.clone(),
        }
    }
}

impl<S: LedgerStore, P: ReceiptParser> ReceiptService<S, P> {
    /// Creates a service without an image archive.
    #[must_use]
    pub fn new(store: Arc<S>, parser: Arc<P>) -> Self {
        Self {
            store,
            parser,
            images: None,
        }
    }

    /// Archives every ingested image in `images`.
    #[must_use]
    pub fn with_image_store(mut self, images: ReceiptImageStore) -> Self {
        self.images = Some(images);
        self
    }

    /// The configured image archive, if any.
    #[must_use]
    pub fn image_store(&self) -> Option<&ReceiptImageStore> {
        self.images.as_ref()
    }

    /// Ingests a receipt for a transaction the caller picked.
    ///
    /// The receipt is linked as `matched`. If the transaction already carries a
    /// receipt, the new row is deleted again and the conflict is returned.
    pub async fn link_manual(
        &self,
        transaction_id: TransactionId,
        image: &[u8],
        filename: &str,
        provider: ReceiptProvider,
    ) -> Result<Receipt, LedgerError> {
        self.store.get_transaction(transaction_id).await?;

        let (input, _) = self.ingest(image, filename, provider).await?;
        let receipt = self.store.create_receipt(input).await?;

        match self
            .store
            .link_receipt(transaction_id, receipt.id, LinkStatus::Matched)
            .await
        {
            Ok(linked) => {
                info!(
                    receipt_id = %linked.id,
                    transaction_id = %transaction_id,
                    "receipt linked manually"
                );
                Ok(linked)
            }
            Err(err) => {
                warn!(
                    receipt_id = %receipt.id,
                    transaction_id = %transaction_id,
                    error = %err,
                    "manual link failed, removing receipt"
                );
                if let Err(cleanup) = self.store.delete_receipt(receipt.id).await {
                    error!(receipt_id = %receipt.id, error = %cleanup, "compensating delete failed");
                }
                Err(err)
            }
        }
    }

    /// Ingests a receipt and links it to the best-scoring transaction, if any.
    ///
    /// Other plausible transactions are kept as `match_suggestions`. Losing a
    /// concurrent race for the chosen transaction leaves the receipt unlinked.
    pub async fn match_and_suggest(
        &self,
        image: &[u8],
        filename: &str,
        provider: ReceiptProvider,
    ) -> Result<Receipt, LedgerError> {
        let (mut input, facts) = self.ingest(image, filename, provider).await?;

        let outcome = match facts {
            Some(facts) => self.find_match(&facts).await,
            None => MatchOutcome::default(),
        };
        input.match_suggestions.clone_from(&outcome.suggestions);
        let receipt = self.store.create_receipt(input).await?;

        let Some((transaction_id, score)) = outcome.best else {
            debug!(receipt_id = %receipt.id, "no transaction cleared the match threshold");
            return Ok(receipt);
        };

        match self
            .store
            .link_receipt(transaction_id, receipt.id, outcome.link_status)
            .await
        {
            Ok(linked) => {
                info!(
                    receipt_id = %linked.id,
                    transaction_id = %transaction_id,
                    score = %score.total,
                    link_status = %linked.link_status,
                    "receipt auto-linked"
                );
                Ok(linked)
            }
            Err(err) if err.is_conflict() || err.kind() == ErrorKind::NotFound => {
                warn!(
                    receipt_id = %receipt.id,
                    transaction_id = %transaction_id,
                    error = %err,
                    "auto-link lost to a concurrent writer, receipt left unlinked"
                );
                self.store.get_receipt(receipt.id).await
            }
            Err(err) => Err(err),
        }
    }

    /// Fetches a receipt with its items.
    pub async fn get_receipt(&self, id: ReceiptId) -> Result<Receipt, LedgerError> {
        self.store.get_receipt(id).await
    }

    /// Deletes a receipt, clearing the transaction's back-reference.
    ///
    /// The archived image stays; other receipts may share its content.
    pub async fn delete_receipt(&self, id: ReceiptId) -> Result<(), LedgerError> {
        self.store.delete_receipt(id).await?;
        info!(receipt_id = %id, "receipt deleted");
        Ok(())
    }

    /// Clears both sides of a link. A no-op on an unlinked receipt.
    pub async fn unlink_receipt(&self, id: ReceiptId) -> Result<Receipt, LedgerError> {
        let receipt = self.store.unlink_receipt(id).await?;
        info!(receipt_id = %id, "receipt unlinked");
        Ok(receipt)
    }

    /// Hashes, archives, and parses the image into an insertable receipt.
    ///
    /// Returns matching facts only when the parse produced a usable total.
    async fn ingest(
        &self,
        image: &[u8],
        filename: &str,
        provider: ReceiptProvider,
    ) -> Result<(NewReceipt, Option<ReceiptFacts>), LedgerError> {
        if image.is_empty() {
            return Err(LedgerError::Validation("receipt image is empty".to_string()));
        }

        let image_sha256 = sha256_hex(image);
        let image_key = self.archive(image, filename).await?;

        let parsed = match self.parser.parse(image, filename, provider).await {
            Ok(parsed) => Some(normalize(parsed)),
            Err(err) => {
                warn!(sha256 = %image_sha256, provider = %provider, error = %err, "receipt parse failed");
                None
            }
        };

        let Some(parsed) = parsed else {
            let input = NewReceipt {
                provider,
                parse_status: ParseStatus::Failed,
                image_sha256: Some(image_sha256),
                image_key,
                ..NewReceipt::default()
            };
            return Ok((input, None));
        };

        let facts = parsed.total.map(|total| ReceiptFacts {
            total,
            purchase_date: parsed
                .purchase_date
                .unwrap_or_else(|| Utc::now().date_naive()),
            merchant: parsed.merchant.clone().unwrap_or_default(),
        });

        let input = NewReceipt {
            provider,
            parse_status: ParseStatus::Parsed,
            merchant: parsed.merchant.clone(),
            purchase_date: facts.as_ref().map(|f| f.purchase_date).or(parsed.purchase_date),
            total_amount: parsed.total,
            currency: parsed.currency.clone(),
            match_suggestions: Vec::new(),
            raw_payload: parsed.raw.clone(),
            canonical_data: serde_json::to_value(&parsed).ok(),
            image_sha256: Some(image_sha256),
            image_key,
            items: parsed
                .items
                .into_iter()
                .map(|item| NewReceiptItem {
                    line_no: item.line_no,
                    name: item.name,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    line_total: item.line_total,
                    sku: item.sku,
                    category_hint: item.category_hint,
                })
                .collect(),
        };
        Ok((input, facts))
    }

    /// Archives the image when an archive is configured.
    ///
    /// Oversized images are rejected; any other archive failure only costs the key.
    async fn archive(&self, image: &[u8], filename: &str) -> Result<Option<String>, LedgerError> {
        let Some(images) = &self.images else {
            return Ok(None);
        };
        match images.store(image, filename).await {
            Ok(archived) => Ok(Some(archived.key)),
            Err(err @ (StorageError::FileTooLarge { .. } | StorageError::EmptyImage)) => {
                Err(LedgerError::Validation(err.to_string()))
            }
            Err(err) => {
                warn!(filename = %filename, error = %err, "receipt image archive failed");
                Ok(None)
            }
        }
    }

    async fn find_match(&self, facts: &ReceiptFacts) -> MatchOutcome {
        let window = CandidateWindow::for_receipt(facts);
        let rows = match self.store.find_candidate_transactions(&window).await {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "receipt candidate search failed");
                return MatchOutcome::default();
            }
        };

        let candidates = matcher::shortlist(&facts.merchant, rows);
        debug!(candidates = candidates.len(), total = %facts.total, "receipt candidates scored");
        matcher::select(facts, &candidates)
    }
}

/// Drops non-positive or unstorable totals, drops unstorable item amounts,
/// and numbers unnumbered items in order.
fn normalize(mut parsed: ParsedReceipt) -> ParsedReceipt {
    parsed.total = parsed.total.filter(|t| *t > Decimal::ZERO && is_storable(*t));
    for (index, item) in parsed.items.iter_mut().enumerate() {
        if item.line_no.is_none() {
            item.line_no = i32::try_from(index + 1).ok();
        }
        for amount in [&mut item.quantity, &mut item.unit_price, &mut item.line_total] {
            *amount = amount.filter(|v| is_storable(*v));
        }
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, TimeZone};
    use ledgerline_shared::types::Currency;
    use rust_decimal_macros::dec;

    use crate::ledger::{
        AccountType, Direction, InMemoryLedgerStore, LedgerService, NewAccount, NewTransaction,
    };
    use crate::receipt::parser::{ParseError, ParsedItem};

    struct StubParser(Result<ParsedReceipt, String>);

    impl ReceiptParser for StubParser {
        async fn parse(
            &self,
            _image: &[u8],
            _filename: &str,
            _provider: ReceiptProvider,
        ) -> Result<ParsedReceipt, ParseError> {
            self.0.clone().map_err(ParseError::Unavailable)
        }
    }

    struct Fixture {
        store: Arc<InMemoryLedgerStore>,
        ledger: LedgerService<InMemoryLedgerStore>,
        receipts: ReceiptService<InMemoryLedgerStore, StubParser>,
    }

    fn purchase_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, 14).unwrap()
    }

    fn purchase_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 14, 17, 30, 0).unwrap()
    }

    fn superstore(total: Decimal) -> ParsedReceipt {
        ParsedReceipt {
            merchant: Some("Superstore".into()),
            purchase_date: Some(purchase_day()),
            total: Some(total),
            currency: Some("CAD".into()),
            items: vec![
                ParsedItem {
                    name: "Milk".into(),
                    line_total: Some(dec!(5.49)),
                    ..ParsedItem::default()
                },
                ParsedItem {
                    name: "Bread".into(),
                    line_total: Some(dec!(3.99)),
                    ..ParsedItem::default()
                },
            ],
            raw: Some(serde_json::json!({"vendor": "SUPERSTORE #1234"})),
        }
    }

    fn fixture(parsed: Result<ParsedReceipt, String>) -> Fixture {
        let store = Arc::new(InMemoryLedgerStore::new());
        Fixture {
            ledger: LedgerService::new(Arc::clone(&store)),
            receipts: ReceiptService::new(Arc::clone(&store), Arc::new(StubParser(parsed))),
            store,
        }
    }

    impl Fixture {
        async fn spend(&self, amount: Decimal, description: &str) -> TransactionId {
            let account = match self.ledger.list_accounts().await.unwrap().into_iter().next() {
                Some(account) => account,
                None => self
                    .ledger
                    .create_account(NewAccount {
                        name: "Visa".into(),
                        bank: "Maple Bank".into(),
                        account_type: AccountType::CreditCard,
                        alias: None,
                        anchor_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                        anchor_balance: Decimal::ZERO,
                        anchor_currency: Currency::Cad,
                    })
                    .await
                    .unwrap(),
            };
            self.ledger
                .create_transaction(
                    NewTransaction::new(account.id, purchase_time(), amount, Direction::Out)
                        .with_description(description),
                )
                .await
                .unwrap()
                .id
        }
    }

    #[tokio::test]
    async fn test_superstore_scenario_needs_verification() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        let tx_id = fx.spend(dec!(55.43), "Superstore Groceries").await;

        let receipt = fx
            .receipts
            .match_and_suggest(b"jpeg", "superstore.jpg", ReceiptProvider::Local)
            .await
            .unwrap();

        assert_eq!(receipt.transaction_id, Some(tx_id));
        assert_eq!(receipt.link_status, LinkStatus::NeedsVerification);
        assert_eq!(receipt.parse_status, ParseStatus::Parsed);
        assert_eq!(receipt.items.len(), 2);
        assert_eq!(receipt.items[1].line_no, Some(2));
        assert_eq!(receipt.image_sha256.as_deref(), Some(sha256_hex(b"jpeg").as_str()));
        assert!(receipt.raw_payload.is_some());

        let tx = fx.ledger.get_transaction(tx_id).await.unwrap();
        assert_eq!(tx.receipt_id, Some(receipt.id));
    }

    #[tokio::test]
    async fn test_perfect_score_links_as_matched_with_suggestions() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        let runner_up = fx.spend(dec!(55.43), "Superstore Groceries").await;
        let exact = fx.spend(dec!(55.43), "SUPERSTORE").await;

        let receipt = fx
            .receipts
            .match_and_suggest(b"jpeg", "r.jpg", ReceiptProvider::Gemini)
            .await
            .unwrap();

        assert_eq!(receipt.transaction_id, Some(exact));
        assert_eq!(receipt.link_status, LinkStatus::Matched);
        assert_eq!(receipt.match_suggestions, vec![runner_up]);
    }

    #[tokio::test]
    async fn test_weak_candidates_stay_unlinked() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        // Right merchant and day, but 19% over drags it under 0.7.
        let tx_id = fx.spend(dec!(65.96), "Superstore").await;

        let receipt = fx
            .receipts
            .match_and_suggest(b"jpeg", "r.jpg", ReceiptProvider::Local)
            .await
            .unwrap();

        assert_eq!(receipt.link_status, LinkStatus::Unlinked);
        assert_eq!(receipt.transaction_id, None);
        assert!(fx.ledger.get_transaction(tx_id).await.unwrap().receipt_id.is_none());
    }

    #[tokio::test]
    async fn test_parse_failure_persists_failed_receipt() {
        let fx = fixture(Err("timeout".into()));
        fx.spend(dec!(55.43), "Superstore").await;

        let receipt = fx
            .receipts
            .match_and_suggest(b"jpeg", "r.jpg", ReceiptProvider::Local)
            .await
            .unwrap();

        assert_eq!(receipt.parse_status, ParseStatus::Failed);
        assert_eq!(receipt.link_status, LinkStatus::Unlinked);
        assert_eq!(fx.store.receipt_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_total_is_not_matched() {
        let mut parsed = superstore(dec!(0));
        parsed.total = Some(dec!(-3.00));
        let fx = fixture(Ok(parsed));
        fx.spend(dec!(55.43), "Superstore").await;

        let receipt = fx
            .receipts
            .match_and_suggest(b"jpeg", "r.jpg", ReceiptProvider::Local)
            .await
            .unwrap();

        assert_eq!(receipt.parse_status, ParseStatus::Parsed);
        assert_eq!(receipt.total_amount, None);
        assert_eq!(receipt.link_status, LinkStatus::Unlinked);
    }

    #[tokio::test]
    async fn test_empty_image_rejected() {
        let fx = fixture(Ok(superstore(dec!(1))));
        let err = fx
            .receipts
            .match_and_suggest(b"", "r.jpg", ReceiptProvider::Local)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(fx.store.receipt_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_manual_link_conflict_removes_receipt() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        let tx_id = fx.spend(dec!(20.00), "Coffee").await;

        let first = fx
            .receipts
            .link_manual(tx_id, b"one", "one.jpg", ReceiptProvider::Local)
            .await
            .unwrap();
        assert_eq!(first.link_status, LinkStatus::Matched);

        let err = fx
            .receipts
            .link_manual(tx_id, b"two", "two.jpg", ReceiptProvider::Local)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::ReceiptAlreadyLinked { existing, .. } if existing == first.id));
        assert_eq!(fx.store.receipt_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_manual_link_missing_transaction() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        let err = fx
            .receipts
            .link_manual(TransactionId::new(), b"one", "one.jpg", ReceiptProvider::Local)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fx.store.receipt_count().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_manual_links_exactly_one_wins() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        let tx_id = fx.spend(dec!(55.43), "Superstore").await;

        let a = fx.receipts.clone();
        let b = fx.receipts.clone();
        let (left, right) = tokio::join!(
            tokio::spawn(async move {
                a.link_manual(tx_id, b"left", "l.jpg", ReceiptProvider::Local).await
            }),
            tokio::spawn(async move {
                b.link_manual(tx_id, b"right", "r.jpg", ReceiptProvider::Local).await
            }),
        );
        let results = [left.unwrap(), right.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(e) if e.is_conflict())));
        assert_eq!(fx.store.receipt_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unlink_then_relink() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        let tx_id = fx.spend(dec!(55.43), "Superstore").await;
        let first = fx
            .receipts
            .link_manual(tx_id, b"one", "one.jpg", ReceiptProvider::Local)
            .await
            .unwrap();

        let unlinked = fx.receipts.unlink_receipt(first.id).await.unwrap();
        assert_eq!(unlinked.link_status, LinkStatus::Unlinked);
        assert_eq!(unlinked.transaction_id, None);
        let again = fx.receipts.unlink_receipt(first.id).await.unwrap();
        assert_eq!(again.link_status, LinkStatus::Unlinked);

        let second = fx
            .receipts
            .link_manual(tx_id, b"two", "two.jpg", ReceiptProvider::Local)
            .await
            .unwrap();
        assert_eq!(fx.ledger.get_transaction(tx_id).await.unwrap().receipt_id, Some(second.id));
    }

    #[tokio::test]
    async fn test_deleting_transaction_releases_receipt() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        let tx_id = fx.spend(dec!(55.43), "Superstore").await;
        let receipt = fx
            .receipts
            .link_manual(tx_id, b"one", "one.jpg", ReceiptProvider::Local)
            .await
            .unwrap();

        fx.ledger.delete_transaction(tx_id).await.unwrap();

        let receipt = fx.receipts.get_receipt(receipt.id).await.unwrap();
        assert_eq!(receipt.link_status, LinkStatus::Unlinked);
        assert_eq!(receipt.transaction_id, None);
    }

    #[tokio::test]
    async fn test_delete_receipt_clears_back_reference() {
        let fx = fixture(Ok(superstore(dec!(55.43))));
        let tx_id = fx.spend(dec!(55.43), "Superstore").await;
        let receipt = fx
            .receipts
            .link_manual(tx_id, b"one", "one.jpg", ReceiptProvider::Local)
            .await
            .unwrap();

        fx.receipts.delete_receipt(receipt.id).await.unwrap();

        assert!(fx.ledger.get_transaction(tx_id).await.unwrap().receipt_id.is_none());
        let err = fx.receipts.get_receipt(receipt.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_image_archived_under_digest_key() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let images = ReceiptImageStore::in_memory().unwrap();
        let receipts = ReceiptService::new(
            Arc::clone(&store),
            Arc::new(StubParser(Ok(superstore(dec!(10))))),
        )
        .with_image_store(images.clone());

        let receipt = receipts
            .match_and_suggest(b"png bytes", "Lunch Receipt.png", ReceiptProvider::Local)
            .await
            .unwrap();

        let key = receipt.image_key.expect("archived");
        assert!(key.starts_with("receipts/"));
        assert!(key.ends_with("/Lunch_Receipt.png"));
        assert_eq!(images.load(&key).await.unwrap(), b"png bytes");
    }

    #[test]
    fn test_normalize_numbers_items() {
        let mut parsed = superstore(dec!(0));
        parsed.items[0].line_no = Some(7);
        let parsed = normalize(parsed);
        assert_eq!(parsed.total, None);
        assert_eq!(parsed.items[0].line_no, Some(7));
        assert_eq!(parsed.items[1].line_no, Some(2));
    }

    #[test]
    fn test_normalize_drops_unstorable_amounts() {
        let mut parsed = superstore(dec!(1000000000000000));
        parsed.items[0].unit_price = Some(Decimal::MAX);
        let parsed = normalize(parsed);
        assert_eq!(parsed.total, None);
        assert_eq!(parsed.items[0].unit_price, None);
        assert_eq!(parsed.items[0].line_total, Some(dec!(5.49)));
    }

    #[tokio::test]
    async fn test_oversized_total_is_kept_unlinked() {
        let mut parsed = superstore(Decimal::MAX);
        parsed.items.clear();
        let fx = fixture(Ok(parsed));
        let tx_id = fx.spend(dec!(25.00), "Superstore").await;

        let receipt = fx
            .receipts
            .match_and_suggest(b"img", "huge.jpg", ReceiptProvider::Local)
            .await
            .unwrap();

        assert_eq!(receipt.parse_status, ParseStatus::Parsed);
        assert_eq!(receipt.total_amount, None);
        assert_eq!(receipt.link_status, LinkStatus::Unlinked);
        assert_eq!(receipt.transaction_id, None);
        assert_eq!(fx.ledger.get_transaction(tx_id).await.unwrap().receipt_id, None);
    }
}
