//! Property-based tests for the ledger service over the in-memory store.
//!
//! - Property 1: Running balance matches the anchor formula after any mutation sequence
//! - Property 2: Anchor reset shifts every balance by one constant
//! - Property 3: Cursor pages concatenate to the filtered set without gaps or repeats
//! - Property 4: Storable amounts of any size never leave an unstorable balance behind

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use ledgerline_shared::ErrorKind;
use ledgerline_shared::types::{Currency, Cursor, PageRequest, TransactionId};
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::memory::InMemoryLedgerStore;
use super::query::{TransactionFilter, TransactionQuery, compare_desc};
use super::service::LedgerService;
use super::store::LedgerStore;
use super::types::{
    Account, AccountType, Direction, NewAccount, NewTransaction, Transaction, TransactionPatch,
};
use super::validation::is_storable;

/// Storable magnitudes in ten-thousandths: everything below 10^15.
const LIMIT_UNITS: i128 = 10_000_000_000_000_000_000;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

fn base_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

fn day(offset: i64) -> NaiveDate {
    (base_date() + Duration::days(offset)).date_naive()
}

fn direction(inflow: bool) -> Direction {
    if inflow { Direction::In } else { Direction::Out }
}

fn new_account(name: &str, anchor_day: i64, anchor_cents: i64) -> NewAccount {
    NewAccount {
        name: name.to_string(),
        bank: "Test Bank".to_string(),
        account_type: AccountType::Chequing,
        alias: None,
        anchor_date: day(anchor_day),
        anchor_balance: Decimal::new(anchor_cents, 2),
        anchor_currency: Currency::Cad,
    }
}

#[derive(Debug, Clone)]
enum Op {
    Create {
        second: bool,
        day: i64,
        hour: i64,
        cents: i64,
        inflow: bool,
    },
    Reweigh {
        pick: usize,
        cents: i64,
        inflow: bool,
    },
    Move {
        pick: usize,
        day: i64,
    },
    Annotate {
        pick: usize,
    },
    Delete {
        pick: usize,
    },
    Reanchor {
        second: bool,
        day: i64,
        cents: i64,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (any::<bool>(), 0i64..40, 0i64..24, 1i64..100_000, any::<bool>()).prop_map(
            |(second, day, hour, cents, inflow)| Op::Create { second, day, hour, cents, inflow }
        ),
        1 => (any::<usize>(), 1i64..100_000, any::<bool>())
            .prop_map(|(pick, cents, inflow)| Op::Reweigh { pick, cents, inflow }),
        1 => (any::<usize>(), 0i64..40).prop_map(|(pick, day)| Op::Move { pick, day }),
        1 => any::<usize>().prop_map(|pick| Op::Annotate { pick }),
        1 => any::<usize>().prop_map(|pick| Op::Delete { pick }),
        1 => (any::<bool>(), 0i64..40, -500_000i64..500_000)
            .prop_map(|(second, day, cents)| Op::Reanchor { second, day, cents }),
    ]
}

/// Independent, quadratic restatement of the balance formula.
fn expected_balance(account: &Account, chain: &[Transaction], tx: &Transaction) -> Decimal {
    let running: Decimal = chain
        .iter()
        .filter(|o| (o.tx_date, o.id) <= (tx.tx_date, tx.id))
        .map(Transaction::signed_amount)
        .sum();
    let before_anchor: Decimal = chain
        .iter()
        .filter(|o| o.tx_date.date_naive() < account.anchor_date)
        .map(Transaction::signed_amount)
        .sum();
    account.anchor_balance + running - before_anchor
}

async fn all_rows(store: &InMemoryLedgerStore) -> Vec<Transaction> {
    store
        .list_transactions(&TransactionFilter::default(), None, u64::MAX)
        .await
        .expect("list")
}

fn pick_live(live: &[TransactionId], pick: usize) -> Option<TransactionId> {
    (!live.is_empty()).then(|| live[pick % live.len()])
}

async fn run_ops(ops: Vec<Op>) -> Vec<(Account, Vec<Transaction>)> {
    let store = Arc::new(InMemoryLedgerStore::new());
    let svc = LedgerService::new(Arc::clone(&store));
    let first = svc.create_account(new_account("first", 10, 100_000)).await.expect("account");
    let second = svc.create_account(new_account("second", 0, 0)).await.expect("account");
    let mut live: Vec<TransactionId> = Vec::new();

    for op in ops {
        match op {
            Op::Create { second: use_second, day, hour, cents, inflow } => {
                let account_id = if use_second { second.id } else { first.id };
                let when = base_date() + Duration::days(day) + Duration::hours(hour);
                let tx = svc
                    .create_transaction(NewTransaction::new(
                        account_id,
                        when,
                        Decimal::new(cents, 2),
                        direction(inflow),
                    ))
                    .await
                    .expect("create");
                live.push(tx.id);
            }
            Op::Reweigh { pick, cents, inflow } => {
                if let Some(id) = pick_live(&live, pick) {
                    let patch = TransactionPatch {
                        amount: Some(Decimal::new(cents, 2)),
                        direction: Some(direction(inflow)),
                        ..TransactionPatch::default()
                    };
                    svc.update_transaction(id, patch).await.expect("update");
                }
            }
            Op::Move { pick, day } => {
                if let Some(id) = pick_live(&live, pick) {
                    let patch = TransactionPatch {
                        tx_date: Some(base_date() + Duration::days(day)),
                        ..TransactionPatch::default()
                    };
                    svc.update_transaction(id, patch).await.expect("move");
                }
            }
            Op::Annotate { pick } => {
                if let Some(id) = pick_live(&live, pick) {
                    let patch = TransactionPatch {
                        user_notes: Some(Some("checked".to_string())),
                        ..TransactionPatch::default()
                    };
                    svc.update_transaction(id, patch).await.expect("annotate");
                }
            }
            Op::Delete { pick } => {
                if let Some(id) = pick_live(&live, pick) {
                    svc.delete_transaction(id).await.expect("delete");
                    live.retain(|l| *l != id);
                }
            }
            Op::Reanchor { second: use_second, day: anchor_day, cents } => {
                let account_id = if use_second { second.id } else { first.id };
                svc.set_account_anchor(account_id, day(anchor_day), Decimal::new(cents, 2), None)
                    .await
                    .expect("anchor");
            }
        }
    }

    let rows = all_rows(&store).await;
    let mut out = Vec::new();
    for account in [first.id, second.id] {
        let account = store.get_account(account).await.expect("account");
        let chain = rows.iter().filter(|t| t.account_id == account.id).cloned().collect();
        out.push((account, chain));
    }
    out
}

fn seed_rows(specs: &[(i64, i64, i64, bool)]) -> Vec<NewTransaction> {
    specs
        .iter()
        .map(|&(day, hour, cents, inflow)| {
            NewTransaction::new(
                ledgerline_shared::types::AccountId::new(),
                base_date() + Duration::days(day) + Duration::hours(hour),
                Decimal::new(cents, 2),
                direction(inflow),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property 1: Running balance matches the anchor formula**
    ///
    /// *For any* sequence of creates, reweighs, moves, annotations, deletes and
    /// anchor resets across two accounts, every transaction's `balance_after`
    /// equals `anchor_balance + running_delta - delta_at_anchor`.
    #[test]
    fn prop_balances_follow_anchor_formula(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let accounts = runtime().block_on(run_ops(ops));

        for (account, chain) in &accounts {
            for tx in chain {
                prop_assert_eq!(tx.balance_after, expected_balance(account, chain, tx));
            }
        }
    }

    /// **Property 2: Anchor reset only moves the baseline**
    ///
    /// *For any* chain and any new anchor, each transaction's balance moves by
    /// the same constant, so consecutive differences still equal signed amounts.
    #[test]
    fn prop_anchor_reset_shifts_uniformly(
        rows in prop::collection::vec((0i64..30, 0i64..24, 1i64..50_000, any::<bool>()), 1..25),
        anchor_day in 0i64..30,
        anchor_cents in -1_000_000i64..1_000_000,
    ) {
        let (before, after) = runtime().block_on(async {
            let store = Arc::new(InMemoryLedgerStore::new());
            let svc = LedgerService::new(Arc::clone(&store));
            let account = svc.create_account(new_account("reset", 5, 1_000)).await.expect("account");
            for mut input in seed_rows(&rows) {
                input.account_id = account.id;
                svc.create_transaction(input).await.expect("create");
            }
            let mut before = all_rows(&store).await;
            svc.set_account_anchor(account.id, day(anchor_day), Decimal::new(anchor_cents, 2), None)
                .await
                .expect("anchor");
            let mut after = all_rows(&store).await;
            before.sort_by_key(|t| (t.tx_date, t.id));
            after.sort_by_key(|t| (t.tx_date, t.id));
            (before, after)
        });

        let shift = after[0].balance_after - before[0].balance_after;
        for (old, new) in before.iter().zip(&after) {
            prop_assert_eq!(old.id, new.id);
            prop_assert_eq!(new.balance_after - old.balance_after, shift);
        }
        for pair in after.windows(2) {
            prop_assert_eq!(pair[1].balance_after - pair[0].balance_after, pair[1].signed_amount());
        }
    }

    /// **Property 3: Cursor pagination has no gaps or duplicates**
    ///
    /// *For any* fixed dataset, filter and page size, following `next_cursor`
    /// until exhaustion yields exactly the filtered rows in strict
    /// `(tx_date, id)` descending order.
    #[test]
    fn prop_cursor_pages_cover_filtered_set(
        rows in prop::collection::vec((0i64..5, 0i64..3, 1i64..10_000, any::<bool>()), 0..60),
        page_size in 1u32..8,
        only_outgoing in any::<bool>(),
    ) {
        let filter = TransactionFilter {
            direction: only_outgoing.then_some(Direction::Out),
            ..TransactionFilter::default()
        };

        let (paged, expected) = runtime().block_on(async {
            let store = Arc::new(InMemoryLedgerStore::new());
            let svc = LedgerService::new(Arc::clone(&store));
            let account = svc.create_account(new_account("pages", 0, 0)).await.expect("account");
            for mut input in seed_rows(&rows) {
                input.account_id = account.id;
                svc.create_transaction(input).await.expect("create");
            }

            let mut expected: Vec<Transaction> = all_rows(&store)
                .await
                .into_iter()
                .filter(|t| filter.matches(t))
                .collect();
            expected.sort_by(compare_desc);

            let mut paged = Vec::new();
            let mut cursor: Option<Cursor> = None;
            loop {
                let query = TransactionQuery {
                    filter: filter.clone(),
                    page: PageRequest::new(Some(page_size), cursor),
                };
                let page = svc.list_transactions(&query).await.expect("page");
                assert!(page.items.len() <= page_size as usize);
                paged.extend(page.items);
                match page.next_cursor {
                    Some(token) => cursor = Some(Cursor::decode(&token).expect("cursor")),
                    None => break,
                }
            }
            (paged, expected)
        });

        let paged_ids: Vec<TransactionId> = paged.iter().map(|t| t.id).collect();
        let expected_ids: Vec<TransactionId> = expected.iter().map(|t| t.id).collect();
        prop_assert_eq!(paged_ids, expected_ids);
        for pair in paged.windows(2) {
            prop_assert!((pair[0].tx_date, pair[0].id) > (pair[1].tx_date, pair[1].id));
        }
    }

    /// **Property 4: Full-range amounts never corrupt the ledger**
    ///
    /// *For any* storable anchor and storable amounts, each create either keeps
    /// every running balance storable and on the anchor formula, or fails as a
    /// validation error and leaves the chain exactly as it was.
    #[test]
    fn prop_full_range_amounts_keep_ledger_consistent(
        anchor_units in (1 - LIMIT_UNITS)..LIMIT_UNITS,
        rows in prop::collection::vec((0i64..10, 1i128..LIMIT_UNITS, any::<bool>()), 1..12),
    ) {
        runtime().block_on(async {
            let store = Arc::new(InMemoryLedgerStore::new());
            let svc = LedgerService::new(Arc::clone(&store));
            let mut input = new_account("range", 3, 0);
            input.anchor_balance = Decimal::from_i128_with_scale(anchor_units, 4);
            let account = svc.create_account(input).await.expect("account");

            for (offset, units, inflow) in rows {
                let before = all_rows(&store).await;
                let input = NewTransaction::new(
                    account.id,
                    base_date() + Duration::days(offset),
                    Decimal::from_i128_with_scale(units, 4),
                    direction(inflow),
                );
                match svc.create_transaction(input).await {
                    Ok(_) => {
                        let chain = all_rows(&store).await;
                        for tx in &chain {
                            assert!(is_storable(tx.balance_after), "{}", tx.balance_after);
                            assert_eq!(tx.balance_after, expected_balance(&account, &chain, tx));
                        }
                    }
                    Err(err) => {
                        assert_eq!(err.kind(), ErrorKind::Validation, "{err}");
                        assert_eq!(all_rows(&store).await, before);
                    }
                }
            }
        });
    }
}
