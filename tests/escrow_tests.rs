//! Integration tests for the escrow action recipes against an in-memory ledger.

mod common;

use common::*;
use etch_escrow_client::sdk::codec::{encode_address, encode_uint};
use etch_escrow_client::sdk::error::ClientError;
use etch_escrow_client::sdk::escrow::{
    DEFAULT_ACTION_FEE, build_escrow_tx, query_deposited_balance, query_status, run_action,
    sign_submit_sync,
};
use etch_escrow_client::sdk::tx::Target;
use etch_escrow_client::sdk::{EscrowAction, ScriptedPrompter, SignatorySet};
use serde_json::json;

fn contract() -> etch_escrow_client::sdk::Address {
    addr(0xc0)
}

// ---------------------------------------------------------------------------
// Deposits and plain actions
// ---------------------------------------------------------------------------

mod actions {
    use super::*;

    #[tokio::test]
    async fn deposit_moves_tokens_into_the_contract() {
        let sender = address_of(KEY_A);
        let ledger = MockLedger::new().with_balance(sender, 1_000);
        let mut p = ScriptedPrompter::new([KEY_A, "n"]);

        let digest = run_action(
            &ledger,
            &mut p,
            contract(),
            Some(sender),
            EscrowAction::Deposit(100),
            DEFAULT_ACTION_FEE,
            None,
        )
        .await
        .unwrap();

        let txs = ledger.submitted();
        assert_eq!(txs.len(), 1);
        let tx = &txs[0];
        assert_eq!(tx.action(), "deposit");
        assert_eq!(tx.from(), sender);
        assert_eq!(tx.target(), &Target::Contract(contract()));
        assert_eq!(tx.transfers().len(), 1);
        assert_eq!(tx.transfers()[0].destination, contract());
        assert_eq!(tx.transfers()[0].amount, 100);
        assert_eq!(tx.validity_window(), (ledger.height, ledger.height + 100));
        assert_eq!(tx.signatures().len(), 1);
        assert_eq!(tx.digest(), digest);
        assert_eq!(ledger.synced(), vec![digest]);
        assert_eq!(ledger.balance_of(&contract()), 100);
        assert_eq!(ledger.balance_of(&sender), 1_000 - ledger.charge - 100);
    }

    #[tokio::test]
    async fn accept_is_signed_by_every_collected_key_in_order() {
        let sender = address_of(KEY_B);
        let ledger = MockLedger::new().with_balance(sender, 1_000);
        let mut p = ScriptedPrompter::new([KEY_B, "y", KEY_A, "n"]);

        run_action(&ledger, &mut p, contract(), Some(sender), EscrowAction::Accept, 10, None)
            .await
            .unwrap();

        let tx = &ledger.submitted()[0];
        assert_eq!(tx.action(), "accept");
        assert!(tx.transfers().is_empty());
        let signers: Vec<_> = tx.signatures().iter().map(|s| s.signer).collect();
        assert_eq!(signers, vec![address_of(KEY_B), address_of(KEY_A)]);
        assert!(tx.verify_signatures());
    }

    #[tokio::test]
    async fn kill_and_cancel_reach_different_entry_points() {
        let sender = address_of(KEY_A);
        let ledger = MockLedger::new().with_balance(sender, 1_000);
        for action in [EscrowAction::Kill, EscrowAction::Cancel] {
            let mut p = ScriptedPrompter::new([KEY_A, "n"]);
            run_action(&ledger, &mut p, contract(), Some(sender), action, 10, None)
                .await
                .unwrap();
        }
        let names: Vec<String> = ledger
            .submitted()
            .iter()
            .map(|tx| tx.action().to_string())
            .collect();
        assert_eq!(names, vec!["kill", "cancel"]);
    }

    #[tokio::test]
    async fn actions_other_than_withdraw_need_a_sender() {
        let ledger = MockLedger::new();
        let mut p = ScriptedPrompter::new([KEY_A, "n"]);
        let err = run_action(&ledger, &mut p, contract(), None, EscrowAction::Accept, 10, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
        assert!(ledger.submitted().is_empty());
        assert_eq!(p.remaining(), 2);
    }

    #[tokio::test]
    async fn declining_key_re_entry_submits_nothing() {
        let sender = address_of(KEY_A);
        let ledger = MockLedger::new().with_balance(sender, 1_000);
        let mut p = ScriptedPrompter::new(["not a key", "n"]);
        let err = run_action(&ledger, &mut p, contract(), Some(sender), EscrowAction::Kill, 10, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UserAborted));
        assert!(ledger.submitted().is_empty());
        assert_eq!(ledger.validity_requests(), 0);
    }

    #[tokio::test]
    async fn ledger_rejection_is_reported_and_nothing_synced() {
        let sender = address_of(KEY_A);
        let ledger = MockLedger::rejecting().with_balance(sender, 1_000);
        let mut p = ScriptedPrompter::new([KEY_A, "n"]);
        let err = run_action(&ledger, &mut p, contract(), Some(sender), EscrowAction::Accept, 10, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Ledger(_)));
        assert!(ledger.synced().is_empty());
        assert_eq!(ledger.balance_of(&sender), 1_000);
        assert!(p.transcript.iter().all(|l| !l.contains("TOK")));
    }

    #[tokio::test]
    async fn empty_signatory_set_never_reaches_the_node() {
        let ledger = MockLedger::new();
        let signers = SignatorySet::new();
        let tx = build_escrow_tx(EscrowAction::Accept, addr(1), contract(), 10, &signers).unwrap();
        let err = sign_submit_sync(&ledger, tx, &signers).await.unwrap_err();
        assert!(matches!(err, ClientError::Signing(_)));
        assert_eq!(ledger.validity_requests(), 0);
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn committed_action_reports_its_cost_once() {
        let sender = address_of(KEY_A);
        let ledger = MockLedger::new().with_balance(sender, 1_000);
        let mut p = ScriptedPrompter::new([KEY_A, "n"]);
        run_action(&ledger, &mut p, contract(), Some(sender), EscrowAction::Accept, 10, None)
            .await
            .unwrap();

        let costs: Vec<&String> = p.transcript.iter().filter(|l| l.ends_with(" TOK")).collect();
        assert_eq!(
            costs,
            vec![&format!("Cost of accept action Tx: -{} TOK", ledger.charge)]
        );
    }

    #[tokio::test]
    async fn lost_balance_read_does_not_fail_a_committed_action() {
        let sender = address_of(KEY_A);
        let ledger = MockLedger::new()
            .with_balance(sender, 1_000)
            .with_balance_reads_failing_after(1);
        let mut p = ScriptedPrompter::new([KEY_A, "n"]);

        let digest = run_action(&ledger, &mut p, contract(), Some(sender), EscrowAction::Accept, 10, None)
            .await
            .unwrap();

        assert_eq!(ledger.submitted().len(), 1);
        assert_eq!(ledger.synced(), vec![digest]);
        assert!(p.transcript.iter().all(|l| !l.contains("TOK")));
    }
}

// ---------------------------------------------------------------------------
// withdraw-excess
// ---------------------------------------------------------------------------

mod withdraw_excess {
    use super::*;

    #[tokio::test]
    async fn failed_status_query_builds_no_transaction() {
        let ledger = MockLedger::new();
        let mut p = ScriptedPrompter::new([KEY_A, "n"]);
        let err = run_action(
            &ledger,
            &mut p,
            contract(),
            Some(address_of(KEY_A)),
            EscrowAction::WithdrawExcess,
            10,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClientError::MissingState(_)));
        assert!(ledger.submitted().is_empty());
        assert_eq!(ledger.validity_requests(), 0);
        assert!(p.transcript.is_empty());
    }

    #[tokio::test]
    async fn status_without_escrow_address_is_missing_state() {
        let ledger = MockLedger::new().with_status(contract(), json!({"sellerOk": "true"}));
        let mut p = ScriptedPrompter::new([KEY_A, "n"]);
        let err = run_action(&ledger, &mut p, contract(), None, EscrowAction::WithdrawExcess, 10, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::MissingState(_)));
        assert!(ledger.submitted().is_empty());
    }

    #[tokio::test]
    async fn is_sent_from_the_discovered_escrow_address() {
        let escrow = address_of(KEY_B);
        let ledger = MockLedger::new()
            .with_balance(escrow, 500)
            .with_status(contract(), json!({"escrow": encode_address(&escrow)}));
        let mut p = ScriptedPrompter::new([KEY_B, "n"]);

        run_action(
            &ledger,
            &mut p,
            contract(),
            Some(addr(3)),
            EscrowAction::WithdrawExcess,
            10,
            None,
        )
        .await
        .unwrap();

        let tx = &ledger.submitted()[0];
        assert_eq!(tx.from(), escrow);
        assert_eq!(tx.action(), "withdrawExcessBalance");
        assert!(tx.transfers().is_empty());
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

mod queries {
    use super::*;

    #[tokio::test]
    async fn status_query_decodes_the_snapshot() {
        let ledger = MockLedger::new().with_status(
            contract(),
            json!({"balance": encode_uint(250), "buyerOk": "TRUE"}),
        );
        let status = query_status(&ledger, &contract()).await.unwrap();
        assert_eq!(status.balance, 250);
        assert!(status.buyer_ok);
        assert!(!status.is_settled());
    }

    #[tokio::test]
    async fn deposited_balance_accepts_encoded_and_plain_numbers() {
        let ledger = MockLedger::new().with_query(
            contract(),
            "deposited_balance",
            true,
            json!({"status": "success", "result": encode_uint(1234)}),
        );
        assert_eq!(query_deposited_balance(&ledger, &contract()).await.unwrap(), 1234);

        let ledger = MockLedger::new().with_query(
            contract(),
            "deposited_balance",
            true,
            json!({"status": "success", "result": 77}),
        );
        assert_eq!(query_deposited_balance(&ledger, &contract()).await.unwrap(), 77);
    }

    #[tokio::test]
    async fn failed_deposited_balance_query_is_missing_state() {
        let ledger = MockLedger::new();
        assert!(matches!(
            query_deposited_balance(&ledger, &contract()).await,
            Err(ClientError::MissingState(_))
        ));
    }
}
