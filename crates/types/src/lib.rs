//! Column types and runtime values for the storage engine.
//!
//! The engine supports exactly five column types (`INT`, `BIGINT`, `FLOAT`,
//! `CHAR(n)`, `DATETIME`), each with a fixed on-disk width so that heap
//! records and B+tree keys can be laid out as fixed-size byte ranges. `NULL`
//! is not representable.

#[cfg(test)]
mod tests;

use std::cmp::Ordering;
use std::fmt;

/// A column's declared type, including the length parameter for `CHAR(n)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SqlType {
    Int,
    BigInt,
    Float,
    Char(u16),
    DateTime,
}

impl SqlType {
    /// Fixed on-disk width in bytes for a value of this type.
    pub fn byte_len(&self) -> usize {
        match self {
            SqlType::Int => 4,
            SqlType::BigInt => 8,
            SqlType::Float => 4,
            SqlType::Char(n) => *n as usize,
            SqlType::DateTime => DATETIME_LEN,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SqlType::Int => "INT",
            SqlType::BigInt => "BIGINT",
            SqlType::Float => "FLOAT",
            SqlType::Char(_) => "CHAR",
            SqlType::DateTime => "DATETIME",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Char(n) => write!(f, "CHAR({n})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// `"YYYY-MM-DD HH:MM:SS"` is always exactly 19 bytes.
pub const DATETIME_LEN: usize = 19;

/// A runtime value. Every variant corresponds to one [`SqlType`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Int(i32),
    BigInt(i64),
    Float(f32),
    Char(String),
    DateTime(String),
}

/// Error raised by value parsing, coercion, and fixed-width encoding.
/// Kept crate-local (no `common` dependency) to avoid a cycle; `common`
/// converts this into `DbError`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    StringOverflow { max: usize, actual: usize },
    ResultOutOfRange(String),
    IncompatibleType { from: &'static str, to: &'static str },
    DateTimeFormat(String),
    Encoding(String),
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::StringOverflow { max, actual } => {
                write!(f, "string of length {actual} exceeds CHAR({max})")
            }
            TypeError::ResultOutOfRange(msg) => write!(f, "value out of range: {msg}"),
            TypeError::IncompatibleType { from, to } => {
                write!(f, "cannot convert {from} to {to}")
            }
            TypeError::DateTimeFormat(msg) => write!(f, "invalid datetime: {msg}"),
            TypeError::Encoding(msg) => write!(f, "encoding error: {msg}"),
        }
    }
}

impl std::error::Error for TypeError {}

pub type TypeResult<T> = Result<T, TypeError>;

impl Value {
    pub fn sql_type(&self) -> SqlType {
        match self {
            Value::Int(_) => SqlType::Int,
            Value::BigInt(_) => SqlType::BigInt,
            Value::Float(_) => SqlType::Float,
            Value::Char(s) => SqlType::Char(s.len() as u16),
            Value::DateTime(_) => SqlType::DateTime,
        }
    }

    /// Compare two values of the *same* underlying type. Cross-type
    /// comparisons (even numeric-looking ones) return `None`; callers that
    /// need cross-numeric comparisons must `coerce` first.
    pub fn cmp_same_type(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::BigInt(a), Value::BigInt(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Char(a), Value::Char(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::DateTime(a), Value::DateTime(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            _ => None,
        }
    }

    pub fn eq_same_type(&self, other: &Value) -> Option<bool> {
        self.cmp_same_type(other).map(|o| o == Ordering::Equal)
    }

    /// Coerce this value to `target`, per spec.md §4.8's Insert rules:
    /// INT widens to BIGINT, INT/BIGINT widen to FLOAT, strings are
    /// length-checked (overflow is an error, never silent truncation),
    /// and DATETIME literals are format- and calendar-validated.
    pub fn coerce(&self, target: &SqlType) -> TypeResult<Value> {
        match (self, target) {
            (Value::Int(v), SqlType::Int) => Ok(Value::Int(*v)),
            (Value::Int(v), SqlType::BigInt) => Ok(Value::BigInt(*v as i64)),
            (Value::Int(v), SqlType::Float) => Ok(Value::Float(*v as f32)),
            (Value::BigInt(v), SqlType::BigInt) => Ok(Value::BigInt(*v)),
            (Value::BigInt(v), SqlType::Int) => i32::try_from(*v)
                .map(Value::Int)
                .map_err(|_| TypeError::ResultOutOfRange(format!("{v} does not fit in INT"))),
            (Value::BigInt(v), SqlType::Float) => Ok(Value::Float(*v as f32)),
            (Value::Float(v), SqlType::Float) => Ok(Value::Float(*v)),
            (Value::Char(s), SqlType::Char(n)) => {
                if s.len() > *n as usize {
                    Err(TypeError::StringOverflow {
                        max: *n as usize,
                        actual: s.len(),
                    })
                } else {
                    Ok(Value::Char(s.clone()))
                }
            }
            (Value::DateTime(s), SqlType::DateTime) => {
                validate_datetime(s)?;
                Ok(Value::DateTime(s.clone()))
            }
            (Value::Char(s), SqlType::DateTime) => {
                validate_datetime(s)?;
                Ok(Value::DateTime(s.clone()))
            }
            (v, t) => Err(TypeError::IncompatibleType {
                from: v.sql_type().name(),
                to: t.name(),
            }),
        }
    }

    /// Add two numeric values for `UPDATE t SET col += val` (spec.md §4.8).
    /// Widens like `coerce`: INT+INT stays INT (overflow is an error, not a
    /// silent wrap), any BIGINT operand widens the result to BIGINT, any
    /// FLOAT operand widens it to FLOAT. `CHAR`/`DATETIME` have no `+=`.
    pub fn checked_add(&self, other: &Value) -> TypeResult<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| TypeError::ResultOutOfRange(format!("{a} + {b} overflows INT"))),
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                Ok(Value::Float(self.as_f32()? + other.as_f32()?))
            }
            (Value::BigInt(_), _) | (_, Value::BigInt(_)) => {
                let a = self.as_i64()?;
                let b = other.as_i64()?;
                a.checked_add(b)
                    .map(Value::BigInt)
                    .ok_or_else(|| TypeError::ResultOutOfRange(format!("{a} + {b} overflows BIGINT")))
            }
            (v, other) => Err(TypeError::IncompatibleType {
                from: v.sql_type().name(),
                to: other.sql_type().name(),
            }),
        }
    }

    fn as_i64(&self) -> TypeResult<i64> {
        match self {
            Value::Int(v) => Ok(*v as i64),
            Value::BigInt(v) => Ok(*v),
            v => Err(TypeError::IncompatibleType {
                from: v.sql_type().name(),
                to: "BIGINT",
            }),
        }
    }

    fn as_f32(&self) -> TypeResult<f32> {
        match self {
            Value::Int(v) => Ok(*v as f32),
            Value::BigInt(v) => Ok(*v as f32),
            Value::Float(v) => Ok(*v),
            v => Err(TypeError::IncompatibleType {
                from: v.sql_type().name(),
                to: "FLOAT",
            }),
        }
    }

    /// Encode into a fixed-width byte slice matching `ty.byte_len()`.
    /// `CHAR(n)` values shorter than `n` are zero-padded on the right.
    pub fn encode_fixed(&self, ty: &SqlType, out: &mut [u8]) -> TypeResult<()> {
        if out.len() != ty.byte_len() {
            return Err(TypeError::Encoding(format!(
                "buffer of {} bytes does not match {} width {}",
                out.len(),
                ty,
                ty.byte_len()
            )));
        }
        match (self, ty) {
            (Value::Int(v), SqlType::Int) => out.copy_from_slice(&v.to_be_bytes()),
            (Value::BigInt(v), SqlType::BigInt) => out.copy_from_slice(&v.to_be_bytes()),
            (Value::Float(v), SqlType::Float) => out.copy_from_slice(&v.to_be_bytes()),
            (Value::Char(s), SqlType::Char(n)) => {
                if s.len() > *n as usize {
                    return Err(TypeError::StringOverflow {
                        max: *n as usize,
                        actual: s.len(),
                    });
                }
                out.fill(0);
                out[..s.len()].copy_from_slice(s.as_bytes());
            }
            (Value::DateTime(s), SqlType::DateTime) => {
                validate_datetime(s)?;
                out.copy_from_slice(s.as_bytes());
            }
            _ => {
                return Err(TypeError::IncompatibleType {
                    from: self.sql_type().name(),
                    to: ty.name(),
                });
            }
        }
        Ok(())
    }

    /// Decode a fixed-width byte slice per `ty`. Inverse of `encode_fixed`.
    pub fn decode_fixed(ty: &SqlType, bytes: &[u8]) -> TypeResult<Value> {
        if bytes.len() != ty.byte_len() {
            return Err(TypeError::Encoding(format!(
                "buffer of {} bytes does not match {} width {}",
                bytes.len(),
                ty,
                ty.byte_len()
            )));
        }
        Ok(match ty {
            SqlType::Int => Value::Int(i32::from_be_bytes(bytes.try_into().unwrap())),
            SqlType::BigInt => Value::BigInt(i64::from_be_bytes(bytes.try_into().unwrap())),
            SqlType::Float => Value::Float(f32::from_be_bytes(bytes.try_into().unwrap())),
            SqlType::Char(_) => {
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let s = String::from_utf8_lossy(&bytes[..end]).into_owned();
                Value::Char(s)
            }
            SqlType::DateTime => {
                let s = String::from_utf8_lossy(bytes).into_owned();
                Value::DateTime(s)
            }
        })
    }
}

/// Validate `"YYYY-MM-DD HH:MM:SS"`, including calendar correctness
/// (leap years, days-per-month), per spec.md §3's DATETIME column.
pub fn validate_datetime(s: &str) -> TypeResult<()> {
    let bytes = s.as_bytes();
    if bytes.len() != DATETIME_LEN {
        return Err(TypeError::DateTimeFormat(format!(
            "expected {DATETIME_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let expect_digit = |i: usize| -> TypeResult<u32> {
        let c = bytes[i];
        if c.is_ascii_digit() {
            Ok((c - b'0') as u32)
        } else {
            Err(TypeError::DateTimeFormat(format!(
                "non-digit at position {i}"
            )))
        }
    };
    let expect_lit = |i: usize, want: u8| -> TypeResult<()> {
        if bytes[i] == want {
            Ok(())
        } else {
            Err(TypeError::DateTimeFormat(format!(
                "expected '{}' at position {i}",
                want as char
            )))
        }
    };
    let year =
        expect_digit(0)? * 1000 + expect_digit(1)? * 100 + expect_digit(2)? * 10 + expect_digit(3)?;
    expect_lit(4, b'-')?;
    let month = expect_digit(5)? * 10 + expect_digit(6)?;
    expect_lit(7, b'-')?;
    let day = expect_digit(8)? * 10 + expect_digit(9)?;
    expect_lit(10, b' ')?;
    let hour = expect_digit(11)? * 10 + expect_digit(12)?;
    expect_lit(13, b':')?;
    let minute = expect_digit(14)? * 10 + expect_digit(15)?;
    expect_lit(16, b':')?;
    let second = expect_digit(17)? * 10 + expect_digit(18)?;

    if !(1..=12).contains(&month) {
        return Err(TypeError::DateTimeFormat(format!("invalid month {month}")));
    }
    let max_day = days_in_month(year, month);
    if day == 0 || day > max_day {
        return Err(TypeError::DateTimeFormat(format!(
            "invalid day {day} for {year}-{month:02}"
        )));
    }
    if hour > 23 || minute > 59 || second > 59 {
        return Err(TypeError::DateTimeFormat(format!(
            "invalid time {hour:02}:{minute:02}:{second:02}"
        )));
    }
    Ok(())
}

fn is_leap_year(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: u32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}
