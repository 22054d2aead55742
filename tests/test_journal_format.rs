//! The replayer's journal format is plain JSONL over the public transaction
//! types; a feed captured elsewhere must deserialize without a custom
//! schema. Round-trips one small journal through disk.

use std::fs;
use std::io::Write;

use amm_settlement_sdk::types::{Coin, Direction, Tx};

#[test]
fn journal_lines_round_trip_through_disk() {
    let lines = [
        serde_json::json!({
            "tx": {
                "id": "A1".repeat(32),
                "chain": "BNB",
                "from_address": "bnb1sender",
                "to_address": "bnb1vault",
                "coins": [{"asset": "BNB.RUNE-B1A", "amount": "2349500000"}],
                "memo": "stake:TCAN-014",
                "height": 375,
            }
        }),
        serde_json::json!({
            "direction": "outbound",
            "tx": {
                "id": "B2".repeat(32),
                "chain": "BNB",
                "from_address": "bnb1vault",
                "to_address": "bnb1sender",
                "memo": format!("OUTBOUND:{}", "A1".repeat(32)),
                "height": 376,
            }
        }),
    ];

    let mut file = tempfile::NamedTempFile::new().unwrap();
    for line in &lines {
        writeln!(file, "{line}").unwrap();
    }

    #[derive(serde::Deserialize)]
    struct Entry {
        #[serde(default)]
        direction: Direction,
        tx: Tx,
    }

    let raw = fs::read_to_string(file.path()).unwrap();
    let entries: Vec<Entry> = raw
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].direction, Direction::Inbound);
    assert_eq!(entries[0].tx.memo, "stake:TCAN-014");
    assert_eq!(
        entries[0].tx.coins,
        vec![Coin::new("BNB.RUNE-B1A".parse().unwrap(), 2_349_500_000)]
    );
    // Amount-less instruction: coins default to empty.
    assert_eq!(entries[1].direction, Direction::Outbound);
    assert!(entries[1].tx.coins.is_empty());
    assert!(entries[1].tx.memo.starts_with("OUTBOUND:"));
}
