use super::*;
use proptest::prelude::*;
use std::cmp::Ordering::{Equal, Greater, Less};

#[test]
fn cmp_same_type_works() {
    assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
    assert_eq!(
        Value::Int(1).cmp_same_type(&Value::Char("1".into())),
        None
    );
}

#[test]
fn comparisons_require_same_type() {
    assert_eq!(Value::Int(1).cmp_same_type(&Value::Int(2)), Some(Less));
    assert_eq!(
        Value::Char("a".into()).cmp_same_type(&Value::Char("a".into())),
        Some(Equal)
    );
    assert_eq!(
        Value::BigInt(7).cmp_same_type(&Value::BigInt(5)),
        Some(Greater)
    );
    assert_eq!(
        Value::Int(1).cmp_same_type(&Value::Char("1".into())),
        None
    );
}

#[test]
fn equality_requires_same_type() {
    assert_eq!(Value::Int(1).eq_same_type(&Value::Int(1)), Some(true));
    assert_eq!(Value::Int(1).eq_same_type(&Value::Int(2)), Some(false));
    assert_eq!(
        Value::Char("abc".into()).eq_same_type(&Value::Char("abc".into())),
        Some(true)
    );
    assert_eq!(
        Value::Char("1".into()).eq_same_type(&Value::Int(1)),
        None
    );
}

#[test]
fn serde_round_trip_stability() {
    let vals = vec![
        Value::Int(-42),
        Value::BigInt(9_000_000_000),
        Value::Float(2.5),
        Value::Char("Ada".into()),
        Value::DateTime("2024-01-02 03:04:05".into()),
    ];

    let json = serde_json::to_string(&vals).unwrap();
    let back: Vec<Value> = serde_json::from_str(&json).unwrap();

    assert_eq!(vals, back);
}

#[test]
fn ordering_is_consistent() {
    let a = Value::Int(5);
    let b = Value::Int(7);
    let c = Value::Int(5);

    assert_eq!(a.cmp_same_type(&b), Some(Less));
    assert_eq!(b.cmp_same_type(&a), Some(Greater));
    assert_eq!(a.cmp_same_type(&c), Some(Equal));
}

#[test]
fn coerce_widens_int_chain() {
    let v = Value::Int(42);
    assert_eq!(v.coerce(&SqlType::BigInt).unwrap(), Value::BigInt(42));
    assert_eq!(v.coerce(&SqlType::Float).unwrap(), Value::Float(42.0));
    assert_eq!(
        Value::BigInt(42).coerce(&SqlType::Float).unwrap(),
        Value::Float(42.0)
    );
}

#[test]
fn coerce_bigint_to_int_overflow_errors() {
    let v = Value::BigInt(i64::MAX);
    assert!(matches!(
        v.coerce(&SqlType::Int),
        Err(TypeError::ResultOutOfRange(_))
    ));
}

#[test]
fn coerce_char_overflow_errors() {
    let v = Value::Char("hello world".into());
    assert!(matches!(
        v.coerce(&SqlType::Char(5)),
        Err(TypeError::StringOverflow { max: 5, actual: 11 })
    ));
}

#[test]
fn checked_add_widens_like_coerce() {
    assert_eq!(Value::Int(2).checked_add(&Value::Int(3)).unwrap(), Value::Int(5));
    assert_eq!(
        Value::Int(2).checked_add(&Value::BigInt(3)).unwrap(),
        Value::BigInt(5)
    );
    assert_eq!(
        Value::Int(2).checked_add(&Value::Float(0.5)).unwrap(),
        Value::Float(2.5)
    );
    assert!(matches!(
        Value::Int(i32::MAX).checked_add(&Value::Int(1)),
        Err(TypeError::ResultOutOfRange(_))
    ));
    assert!(matches!(
        Value::Char("a".into()).checked_add(&Value::Int(1)),
        Err(TypeError::IncompatibleType { .. })
    ));
}

#[test]
fn datetime_validation_accepts_valid_and_rejects_invalid() {
    assert!(validate_datetime("2024-02-29 12:00:00").is_ok()); // leap year
    assert!(validate_datetime("2023-02-29 12:00:00").is_err()); // not a leap year
    assert!(validate_datetime("2024-13-01 00:00:00").is_err()); // bad month
    assert!(validate_datetime("2024-04-31 00:00:00").is_err()); // april has 30 days
    assert!(validate_datetime("2024-01-01 24:00:00").is_err()); // bad hour
    assert!(validate_datetime("2024-01-01").is_err()); // too short
    assert!(validate_datetime("not-a-datetime!!!!!").is_err());
}

#[test]
fn fixed_width_round_trip() {
    let cases: Vec<(Value, SqlType)> = vec![
        (Value::Int(-7), SqlType::Int),
        (Value::BigInt(123_456_789_012), SqlType::BigInt),
        (Value::Float(3.25), SqlType::Float),
        (Value::Char("hi".into()), SqlType::Char(8)),
        (
            Value::DateTime("2024-01-02 03:04:05".into()),
            SqlType::DateTime,
        ),
    ];
    for (value, ty) in cases {
        let mut buf = vec![0u8; ty.byte_len()];
        value.encode_fixed(&ty, &mut buf).unwrap();
        let decoded = Value::decode_fixed(&ty, &buf).unwrap();
        match (&value, &decoded) {
            (Value::Char(a), Value::Char(b)) => assert_eq!(a, b),
            _ => assert_eq!(value, decoded),
        }
    }
}

proptest! {
    #[test]
    fn order_is_antisymmetric(i in any::<i32>(), j in any::<i32>()) {
        let a = Value::Int(i);
        let b = Value::Int(j);
        let ord1 = a.cmp_same_type(&b);
        let ord2 = b.cmp_same_type(&a);
        match (ord1, ord2) {
            (Some(o1), Some(o2)) => assert_eq!(o1, o2.reverse()),
            _ => prop_assert!(true),
        }
    }

    #[test]
    fn eq_reflexive(val in any::<i32>()) {
        let v = Value::Int(val);
        assert_eq!(v.eq_same_type(&v), Some(true));
    }

    #[test]
    fn int_round_trip_matches_encoding(val in any::<i32>()) {
        let v = Value::Int(val);
        let mut buf = [0u8; 4];
        v.encode_fixed(&SqlType::Int, &mut buf).unwrap();
        let decoded = Value::decode_fixed(&SqlType::Int, &buf).unwrap();
        prop_assert_eq!(decoded, v);
    }
}
