//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data for property-based
//! testing of core database types.

use common::Row;
use proptest::prelude::*;
use types::{SqlType, Value};
use wal::LogRecord;

/// Strategy for generating random `Value` instances.
///
/// Generates a mix of `Int`, `BigInt`, `Float`, `Char`, and `DateTime`
/// values, matching the five variants `types::Value` actually has.
pub fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(Value::Int),
        any::<i64>().prop_map(Value::BigInt),
        any::<f32>().prop_map(Value::Float),
        "[a-z]{1,20}".prop_map(Value::Char),
        arb_datetime_string().prop_map(Value::DateTime),
    ]
}

/// Strategy for generating a valid `"YYYY-MM-DD HH:MM:SS"` string, per
/// `types::validate_datetime`'s calendar rules.
pub fn arb_datetime_string() -> impl Strategy<Value = String> {
    (1970..=2999i32, 1..=12u32, 1..=28u32, 0..=23u32, 0..=59u32, 0..=59u32).prop_map(
        |(year, month, day, hour, minute, second)| {
            format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}")
        },
    )
}

/// Strategy for generating random `Row` instances.
///
/// Generates rows with 1-10 columns of random values.
///
/// # Example
///
/// ```
/// use proptest::prelude::*;
/// use testsupport::proptest_generators::arb_row;
///
/// proptest! {
///     #[test]
///     fn test_row_property(row in arb_row()) {
///         // Test invariants about rows
///         assert!(!row.values.is_empty());
///     }
/// }
/// ```
pub fn arb_row() -> impl Strategy<Value = Row> {
    prop::collection::vec(arb_value(), 1..10).prop_map(Row::new)
}

/// Strategy for generating random `Row` instances with a fixed number of columns.
///
/// # Example
///
/// ```
/// use proptest::prelude::*;
/// use testsupport::proptest_generators::arb_row_with_len;
///
/// proptest! {
///     #[test]
///     fn test_fixed_row(row in arb_row_with_len(3)) {
///         assert_eq!(row.values.len(), 3);
///     }
/// }
/// ```
pub fn arb_row_with_len(len: usize) -> impl Strategy<Value = Row> {
    prop::collection::vec(arb_value(), len).prop_map(Row::new)
}

/// Strategy for generating random `SqlType` instances.
pub fn arb_sql_type() -> impl Strategy<Value = SqlType> {
    prop_oneof![
        Just(SqlType::Int),
        Just(SqlType::BigInt),
        Just(SqlType::Float),
        (1..=64u16).prop_map(SqlType::Char),
        Just(SqlType::DateTime),
    ]
}

/// Strategy for generating write-ahead log records for testing.
///
/// Generates `Insert`, `Update`, and `Delete` records with random data.
pub fn arb_wal_record() -> impl Strategy<Value = LogRecord> {
    prop_oneof![
        (any::<u64>(), any::<u64>(), arb_row(), any::<u64>(), any::<u16>()).prop_map(
            |(txn_id, table_id, row, page_id, slot)| {
                LogRecord::Insert {
                    txn: common::TxnId(txn_id),
                    table: common::TableId(table_id),
                    row: row.values,
                    rid: common::RecordId {
                        page_id: common::PageId(page_id),
                        slot,
                    },
                }
            }
        ),
        (
            any::<u64>(),
            any::<u64>(),
            arb_row(),
            arb_row(),
            any::<u64>(),
            any::<u16>()
        )
            .prop_map(|(txn_id, table_id, old_row, new_row, page_id, slot)| {
                LogRecord::Update {
                    txn: common::TxnId(txn_id),
                    table: common::TableId(table_id),
                    old_row: old_row.values,
                    new_row: new_row.values,
                    rid: common::RecordId {
                        page_id: common::PageId(page_id),
                        slot,
                    },
                }
            }),
        (any::<u64>(), any::<u64>(), arb_row(), any::<u64>(), any::<u16>()).prop_map(
            |(txn_id, table_id, row, page_id, slot)| {
                LogRecord::Delete {
                    txn: common::TxnId(txn_id),
                    table: common::TableId(table_id),
                    row: row.values,
                    rid: common::RecordId {
                        page_id: common::PageId(page_id),
                        slot,
                    },
                }
            }
        ),
    ]
}
