//! End-to-end ledger flows driven through the processor's submit/query
//! surface, mirroring how the external transport exercises the node:
//! gas absorption, stake/unstake lifecycle, swap execution and rejection,
//! liquidity donation, and the not-found query contract.

use amm_settlement_sdk::event_log::{EventKind, EventPayload};
use amm_settlement_sdk::pool_ledger::PoolStatus;
use amm_settlement_sdk::types::{Asset, Chain, Coin, Direction, Tx, TxId};
use amm_settlement_sdk::{Settings, TransactionProcessor};

fn processor() -> TransactionProcessor {
    TransactionProcessor::new(&Settings::default()).expect("default settings wire up")
}

fn txid(n: u64) -> TxId {
    format!("{n:064X}").parse().unwrap()
}

fn asset(s: &str) -> Asset {
    s.parse().unwrap()
}

fn coin(asset_str: &str, amount: u128) -> Coin {
    Coin::new(asset(asset_str), amount)
}

fn tx(n: u64, memo: &str, coins: Vec<Coin>, sender: &str) -> Tx {
    Tx {
        id: txid(n),
        chain: Chain::new("BNB").unwrap(),
        from_address: sender.into(),
        to_address: "bnb1vault".into(),
        coins,
        memo: memo.into(),
        height: 100 + n,
    }
}

async fn submit(p: &TransactionProcessor, t: Tx) {
    p.submit(t, Direction::Inbound).await.expect("submission succeeds");
}

#[tokio::test]
async fn ping_and_empty_state_queries() {
    let p = processor();
    assert_eq!(p.ping().ping, "pong");

    // Unknown transaction: blank fields, not an error.
    let resp = p.tx_status(&txid(999));
    assert_eq!(resp.tx.memo, "");
    assert_eq!(resp.status, "");
    assert!(resp.out_hashes.is_none());

    // No events yet, and ids past the max answer an empty list.
    assert!(p.events_since(1).is_empty());
    assert!(p.event(1).is_none());

    // Fresh node lists no pools but knows its configured chains.
    assert!(p.pool_list().is_empty());
    assert_eq!(p.chains(), vec![Chain::new("BNB").unwrap()]);
}

#[tokio::test]
async fn gas_memo_is_absorbed_and_recorded() {
    let p = processor();
    submit(&p, tx(1, "GAS", vec![coin("BNB.BNB", 20_000_000)], "bnb1sender")).await;

    let events = p.events_since(1);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, 1);
    assert_eq!(events[0].kind, EventKind::Gas);

    let resp = p.tx_status(&txid(1));
    assert_eq!(resp.tx.memo, "GAS");
    assert_eq!(resp.status, "applied");
}

#[tokio::test]
async fn malformed_memo_is_never_a_failure() {
    let p = processor();
    for (n, memo) in ["bogus", "stake:", "withdraw:Z:nope", ""].iter().enumerate() {
        submit(&p, tx(n as u64 + 1, memo, vec![coin("BNB.BNB", 5)], "bnb1sender")).await;
    }
    let events = p.events_since(1);
    assert_eq!(events.len(), 4);
    assert!(events.iter().all(|e| e.kind == EventKind::Gas));
}

#[tokio::test]
async fn stake_unstake_lifecycle_matches_the_black_box_suite() {
    let p = processor();
    let sender = "bnb1xlvns0n2mxh77mzaspn2hgav4rr4m8eerfju38";

    submit(&p, tx(1, "GAS", vec![coin("BNB.BNB", 20_000_000)], sender)).await;

    // Bootstrap stake: units equal the contributed base amount.
    submit(
        &p,
        tx(
            2,
            "stake:TCAN-014",
            vec![
                coin("BNB.RUNE-B1A", 2_349_500_000),
                coin("BNB.TCAN-014", 334_850_000),
            ],
            sender,
        ),
    )
    .await;

    let stakers = p.stakers(&asset("BNB.TCAN-014")).expect("one staker");
    assert_eq!(stakers.len(), 1);
    assert_eq!(stakers[0].units, 2_349_500_000);

    let pool = p.pool(&asset("TCAN-014")).expect("pool exists");
    assert_eq!(pool.status, PoolStatus::Enabled);
    assert_eq!(pool.balance_base, 2_349_500_000);
    assert_eq!(pool.balance_asset, 334_850_000);

    let stake_events = p.events_since(2);
    assert_eq!(stake_events[0].id, 2);
    assert_eq!(stake_events[0].kind, EventKind::Stake);

    // Sole staker withdraws 100%: position gone, pool gone, and the
    // unstake event is followed by exactly one pool(Bootstrap) event.
    submit(&p, tx(3, "withdraw:TCAN-014", vec![], sender)).await;

    assert!(p.stakers(&asset("BNB.TCAN-014")).is_none());
    assert!(p.pool(&asset("TCAN-014")).is_none());
    assert!(p.pool_list().is_empty());

    let tail = p.events_since(3);
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].kind, EventKind::Unstake);
    assert_eq!(tail[1].kind, EventKind::Pool);
    match &tail[1].event {
        EventPayload::Pool(pool_evt) => assert_eq!(pool_evt.status, PoolStatus::Bootstrap),
        other => panic!("expected pool payload, got {other:?}"),
    }

    // Event ids stay dense across all types.
    let ids: Vec<u64> = p.events_since(1).iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    // The withdraw owes the staker both legs back.
    assert_eq!(p.tx_status(&txid(3)).status, "pending");
    let work = p.pending_outbound(u64::MAX);
    let items = &work.chains.get(&Chain::new("BNB").unwrap()).unwrap().tx_array;
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.to == sender));
}

#[tokio::test]
async fn swap_executes_within_limit_and_rejects_beyond_it() {
    let p = processor();
    let sender = "bnb1xlvns0n2mxh77mzaspn2hgav4rr4m8eerfju38";

    submit(
        &p,
        tx(
            1,
            "stake:BNB.BOLT-014",
            vec![
                coin("BNB.RUNE-B1A", 2_349_500_000),
                coin("BNB.BOLT-014", 334_850_000),
            ],
            sender,
        ),
    )
    .await;

    // Within the limit: the slip-based curve emits exactly 124_958_592.
    submit(
        &p,
        tx(
            2,
            "swap:RUNE-B1A:bnb1ntqj0v0sv62ut0ehxt7jqh7lenfrd3hmfws0aq:124958592",
            vec![coin("BNB.BOLT-014", 20_000_000)],
            sender,
        ),
    )
    .await;

    let pool = p.pool(&asset("BOLT-014")).unwrap();
    assert_eq!(pool.balance_base, 2_349_500_000 - 124_958_592);
    assert_eq!(pool.balance_asset, 354_850_000);
    assert_eq!(p.tx_status(&txid(2)).status, "pending");

    let swap_events: Vec<_> = p
        .events_since(1)
        .into_iter()
        .filter(|e| e.kind == EventKind::Swap)
        .collect();
    assert_eq!(swap_events.len(), 1);
    assert_eq!(swap_events[0].in_tx, Some(txid(2)));
    assert!(swap_events[0].out_txs.is_empty(), "unsettled until confirmed");

    // Beyond the limit: rejected, and the pool only loses the fixed fee
    // from its base balance.
    let base_before = p.pool(&asset("BOLT-014")).unwrap().balance_base;
    submit(
        &p,
        tx(
            3,
            "swap:RUNE-B1A:bnb1ntqj0v0sv62ut0ehxt7jqh7lenfrd3hmfws0aq:134958590000000",
            vec![coin("BNB.BOLT-014", 20_000_000)],
            sender,
        ),
    )
    .await;

    let pool = p.pool(&asset("BOLT-014")).unwrap();
    assert_eq!(pool.balance_base, base_before - 100_000_000);
    assert_eq!(pool.balance_asset, 354_850_000, "no output leg issued");

    let refund_events: Vec<_> = p
        .events_since(1)
        .into_iter()
        .filter(|e| e.kind == EventKind::Refund)
        .collect();
    assert_eq!(refund_events.len(), 1);

    // The refused input refunds in kind, so the rejection owes an outbound.
    let work = p.pending_outbound(u64::MAX);
    let items = &work.chains.get(&Chain::new("BNB").unwrap()).unwrap().tx_array;
    let refund_item = items
        .iter()
        .find(|i| i.memo == format!("OUTBOUND:{}", txid(3)))
        .expect("refund obligation listed");
    assert_eq!(refund_item.coin, coin("BNB.BOLT-014", 20_000_000));
    assert_eq!(refund_item.to, sender);
}

#[tokio::test]
async fn replaying_a_rejected_swap_does_not_double_charge() {
    let p = processor();
    let sender = "bnb1sender";
    submit(
        &p,
        tx(
            1,
            "stake:BOLT-014",
            vec![
                coin("BNB.RUNE-B1A", 2_349_500_000),
                coin("BNB.BOLT-014", 334_850_000),
            ],
            sender,
        ),
    )
    .await;

    let reject = tx(
        2,
        "swap:RUNE-B1A:bnb1dest:134958590000000",
        vec![coin("BNB.BOLT-014", 20_000_000)],
        sender,
    );
    submit(&p, reject.clone()).await;
    let base_after_first = p.pool(&asset("BOLT-014")).unwrap().balance_base;
    let events_after_first = p.events_since(1).len();

    let receipt = p.submit(reject, Direction::Inbound).await.unwrap();
    assert!(receipt.duplicate);
    assert_eq!(p.pool(&asset("BOLT-014")).unwrap().balance_base, base_after_first);
    assert_eq!(p.events_since(1).len(), events_after_first);
}

#[tokio::test]
async fn off_ratio_stake_is_refunded() {
    let p = processor();
    submit(
        &p,
        tx(
            1,
            "stake:TCAN-014",
            vec![
                coin("BNB.RUNE-B1A", 1_000_000_000),
                coin("BNB.TCAN-014", 500_000_000),
            ],
            "bnb1alice",
        ),
    )
    .await;

    // A contribution far off the 2:1 pool price bounces.
    submit(
        &p,
        tx(
            2,
            "stake:TCAN-014",
            vec![
                coin("BNB.RUNE-B1A", 1_000_000_000),
                coin("BNB.TCAN-014", 1_000_000),
            ],
            "bnb1bob",
        ),
    )
    .await;

    let pool = p.pool(&asset("TCAN-014")).unwrap();
    assert_eq!(pool.balance_base, 1_000_000_000);
    assert_eq!(pool.pool_units, 1_000_000_000);
    assert_eq!(p.stakers(&asset("TCAN-014")).unwrap().len(), 1);

    let tail = p.events_since(2);
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].kind, EventKind::Refund);
    assert_eq!(p.tx_status(&txid(2)).status, "pending");
}

#[tokio::test]
async fn swap_against_unknown_pool_is_absorbed_as_gas() {
    let p = processor();
    submit(
        &p,
        tx(
            1,
            "swap:RUNE-B1A:bnb1dest",
            vec![coin("BNB.NOPE-999", 1_000)],
            "bnb1sender",
        ),
    )
    .await;
    let events = p.events_since(1);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Gas);
    assert_eq!(p.tx_status(&txid(1)).status, "applied");
}

#[tokio::test]
async fn add_donates_depth_without_units() {
    let p = processor();
    let sender = "bnb1sender";
    submit(
        &p,
        tx(
            1,
            "stake:BOLT-014",
            vec![
                coin("BNB.RUNE-B1A", 1_000_000_000),
                coin("BNB.BOLT-014", 500_000_000),
            ],
            sender,
        ),
    )
    .await;
    submit(
        &p,
        tx(
            2,
            "add:BOLT-014",
            vec![
                coin("BNB.RUNE-B1A", 20_000_000),
                coin("BNB.BOLT-014", 20_000_000),
            ],
            sender,
        ),
    )
    .await;

    let pool = p.pool(&asset("BOLT-014")).unwrap();
    assert_eq!(pool.balance_base, 1_020_000_000);
    assert_eq!(pool.balance_asset, 520_000_000);
    assert_eq!(pool.pool_units, 1_000_000_000);

    let tail = p.events_since(2);
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].kind, EventKind::Add);
}

#[tokio::test]
async fn pools_list_in_creation_order() {
    let p = processor();
    for (n, sym) in ["AAA-111", "BBB-222", "CCC-333"].iter().enumerate() {
        submit(
            &p,
            tx(
                n as u64 + 1,
                &format!("stake:{sym}"),
                vec![
                    coin("BNB.RUNE-B1A", 1_000_000_000),
                    Coin::new(format!("BNB.{sym}").parse().unwrap(), 500_000_000),
                ],
                "bnb1sender",
            ),
        )
        .await;
    }
    let listed: Vec<String> = p.pool_list().iter().map(|p| p.asset.to_string()).collect();
    assert_eq!(listed, vec!["BNB.AAA-111", "BNB.BBB-222", "BNB.CCC-333"]);
}
