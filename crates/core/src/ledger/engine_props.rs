//! Property-based tests for TransactionEngine.
//!
//! - Deposits within boundaries change the balance by exactly the amount
//! - Purchases debit price times quantity and count one usage per call
//! - Transfers move money between two users and reverting restores both
//! - Boundary violations leave the store unchanged

use std::sync::Arc;

use proptest::prelude::*;
use tally_shared::settings::{AccountSettings, Boundary, LedgerSettings, PaymentSettings};

use super::engine_tests::{article, user};
use super::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn engine(settings: LedgerSettings) -> TransactionEngine<MemoryLedgerStore> {
    TransactionEngine::new(MemoryLedgerStore::new(), Arc::new(settings))
}

fn bounded(payment: i64, account: i64) -> LedgerSettings {
    LedgerSettings {
        payment: PaymentSettings {
            boundary: Boundary {
                upper: Some(payment),
                lower: Some(-payment),
            },
        },
        account: AccountSettings {
            boundary: Boundary {
                upper: Some(account),
                lower: Some(-account),
            },
        },
        ..LedgerSettings::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_deposit_changes_balance_by_amount(
        start in -10_000i64..10_000,
        amount in -15_000i64..=15_000,
    ) {
        runtime().block_on(async {
            let engine = engine(bounded(15_000, 100_000));
            let alice = user("alice", start);
            engine.store().insert_user(alice.clone()).await;

            let stored = engine
                .process_transaction(TransactionRequest::deposit(alice.id, amount))
                .await
                .unwrap();

            prop_assert_eq!(stored.amount, amount);
            let snapshot = engine.store().snapshot().await;
            prop_assert_eq!(snapshot.user(alice.id).unwrap().balance, start + amount);
            Ok(())
        })?;
    }

    #[test]
    fn prop_purchase_debits_price_times_quantity(
        price in 1i64..5_000,
        quantity in 1i64..20,
    ) {
        runtime().block_on(async {
            let engine = engine(LedgerSettings::default());
            let alice = user("alice", 0);
            let item = article("item", price, true);
            engine.store().insert_user(alice.clone()).await;
            engine.store().insert_article(item.clone()).await;

            let stored = engine
                .process_transaction(TransactionRequest::purchase(alice.id, item.id, Some(quantity)))
                .await
                .unwrap();

            prop_assert_eq!(stored.amount, -(price * quantity));
            let snapshot = engine.store().snapshot().await;
            prop_assert_eq!(snapshot.user(alice.id).unwrap().balance, -(price * quantity));
            prop_assert_eq!(snapshot.article(item.id).unwrap().usage_count, 1);
            Ok(())
        })?;
    }

    #[test]
    fn prop_transfer_then_revert_restores_balances(
        sender_start in -5_000i64..5_000,
        recipient_start in -5_000i64..5_000,
        amount in 0i64..5_000,
    ) {
        runtime().block_on(async {
            let engine = engine(LedgerSettings::default());
            let alice = user("alice", sender_start);
            let bob = user("bob", recipient_start);
            engine.store().insert_user(alice.clone()).await;
            engine.store().insert_user(bob.clone()).await;

            let sender = engine
                .process_transaction(TransactionRequest::transfer(alice.id, bob.id, -amount))
                .await
                .unwrap();
            let snapshot = engine.store().snapshot().await;
            prop_assert_eq!(snapshot.user(alice.id).unwrap().balance, sender_start - amount);
            prop_assert_eq!(snapshot.user(bob.id).unwrap().balance, recipient_start + amount);

            engine.revert_transaction(sender.id).await.unwrap();
            let snapshot = engine.store().snapshot().await;
            prop_assert_eq!(snapshot.user(alice.id).unwrap().balance, sender_start);
            prop_assert_eq!(snapshot.user(bob.id).unwrap().balance, recipient_start);
            Ok(())
        })?;
    }

    #[test]
    fn prop_boundary_violation_leaves_store_unchanged(
        start in -1_000i64..1_000,
        amount in prop_oneof![1_001i64..50_000, -50_000i64..-1_000],
    ) {
        runtime().block_on(async {
            let engine = engine(bounded(1_000, 1_000_000));
            let alice = user("alice", start);
            engine.store().insert_user(alice.clone()).await;
            let before = engine.store().snapshot().await;

            let result = engine
                .process_transaction(TransactionRequest::deposit(alice.id, amount))
                .await;

            let is_boundary_error =
                matches!(result, Err(LedgerError::TransactionBoundaryExceeded { .. }));
            prop_assert!(is_boundary_error);
            prop_assert_eq!(engine.store().snapshot().await, before);
            Ok(())
        })?;
    }
}
