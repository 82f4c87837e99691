//! Property tests for record id lookup conditions
//!
//! Conditions are evaluated by a real SQLite engine against ids stored
//! the same way the session stores them.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use rusqlite::Connection;
use rusqlite::types::ValueRef;
use swlcore::database::{ColumnValue, filter_exact};
use swlcore::RecordID;

fn stored_ids(conn: &Connection, ids: &[RecordID]) {
    conn.execute_batch("CREATE TABLE ids (\"id\" TEXT NOT NULL)").unwrap();
    for id in ids {
        let literal = ColumnValue::Text(id.as_bytes().to_vec()).to_literal();
        conn.execute_batch(&format!("INSERT INTO ids (\"id\") VALUES ({literal})"))
            .unwrap();
    }
}

fn matching_ids(conn: &Connection, id: &RecordID) -> Vec<RecordID> {
    let sql = format!("SELECT \"id\" FROM ids WHERE {}", id.match_condition("id"));
    let mut stmt = conn.prepare(&sql).unwrap();
    stmt.query_map([], |row| {
        let bytes = match row.get_ref(0)? {
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => bytes.to_vec(),
            _ => Vec::new(),
        };
        Ok(RecordID::new(bytes))
    })
    .unwrap()
    .collect::<Result<Vec<_>, _>>()
    .unwrap()
}

fn any_id() -> impl Strategy<Value = RecordID> {
    proptest::collection::vec(any::<u8>(), 0..16).prop_map(RecordID::from)
}

/// Ids biased towards bytes that stress the pattern: wildcards, quotes,
/// braces and runs of high bytes
fn tricky_id() -> impl Strategy<Value = RecordID> {
    let byte = prop_oneof![
        Just(b'%'),
        Just(b'_'),
        Just(b'{'),
        Just(b'\''),
        Just(0u8),
        b'a'..=b'c',
        b'A'..=b'C',
        0x80u8..=0xff,
    ];
    proptest::collection::vec(byte, 0..10).prop_map(RecordID::from)
}

proptest! {
    #[test]
    fn condition_matches_own_id(id in any_id()) {
        let conn = Connection::open_in_memory().unwrap();
        stored_ids(&conn, std::slice::from_ref(&id));
        prop_assert_eq!(matching_ids(&conn, &id).len(), 1);
    }

    #[test]
    fn exact_filter_keeps_only_target(
        ids in proptest::collection::vec(tricky_id(), 1..12),
        pick in any::<prop::sample::Index>(),
    ) {
        let conn = Connection::open_in_memory().unwrap();
        stored_ids(&conn, &ids);
        let target = pick.get(&ids).clone();
        let expected = ids.iter().filter(|id| **id == target).count();

        let raw = matching_ids(&conn, &target);
        prop_assert!(raw.len() >= expected);

        let exact = filter_exact(raw, &target, |id| Some(id.clone()));
        prop_assert_eq!(exact.len(), expected);
        prop_assert!(exact.iter().all(|id| *id == target));
    }

    #[test]
    fn pattern_is_plain_sql(id in any_id()) {
        // Every piece is a char() call or a quoted wildcard
        let pattern = id.match_pattern();
        let conn = Connection::open_in_memory().unwrap();
        let matched: bool = conn
            .query_row(&format!("SELECT typeof({pattern}) = 'text'"), [], |row| row.get(0))
            .unwrap();
        prop_assert!(matched);
    }
}
