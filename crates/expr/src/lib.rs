//! Expression AST and evaluation for `WHERE`/`SET` clauses (spec.md §4.8).
//!
//! `types::Value` has no `Bool`/`Null` variant, since no column type is
//! boolean-typed (spec.md §3) — so truthiness is a primitive `bool`, not a
//! storable value. `EvalContext::eval` handles the scalar expressions that
//! can appear in a projection or assignment (literals, column refs);
//! `EvalContext::eval_bool` handles predicates (comparisons and `AND`/`OR`/
//! `NOT`), recursing on logical connectives and falling back to `eval` plus
//! `cmp_same_type` at comparison leaves.


use common::{DbError, DbResult, Row};
use std::cmp::Ordering;
use types::Value;

/// Binary comparison and logical operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// Unary operators (currently just logical NOT).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UnaryOp {
    Not,
}

/// Expression abstract syntax tree.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Expr {
    Literal(Value),
    /// Column reference with optional table/alias qualifier.
    ///
    /// Examples:
    /// - `Column { table: None, name: "id" }` - unqualified column
    /// - `Column { table: Some("users"), name: "id" }` - qualified column
    /// - `Column { table: Some("u"), name: "id" }` - alias-qualified column
    Column {
        /// Optional table name or alias qualifier.
        table: Option<String>,
        /// Column name.
        name: String,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
}

/// Evaluation context consisting of the row schema (column names in order).
pub struct EvalContext<'a> {
    pub schema: &'a [String],
}

impl<'a> EvalContext<'a> {
    /// Evaluate a scalar expression (a literal or column reference) over a
    /// row. Used for projections and `SET` assignments; a logical or
    /// comparison node here is a caller error, since those only make sense
    /// as predicates — use [`EvalContext::eval_bool`] instead.
    pub fn eval(&self, expr: &Expr, row: &Row) -> DbResult<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Column { table, name } => {
                let idx = self.find_column(table.as_deref(), name)?;
                Ok(row.values[idx].clone())
            }
            Expr::Unary { .. } | Expr::Binary { .. } => Err(DbError::Executor(format!(
                "{expr:?} is a predicate, not a scalar expression"
            ))),
        }
    }

    /// Evaluate a predicate (a `WHERE`-clause expression) over a row.
    pub fn eval_bool(&self, expr: &Expr, row: &Row) -> DbResult<bool> {
        match expr {
            Expr::Unary {
                op: UnaryOp::Not,
                expr: inner,
            } => Ok(!self.eval_bool(inner, row)?),
            Expr::Binary {
                left,
                op: op @ (BinaryOp::And | BinaryOp::Or),
                right,
            } => {
                // Short-circuit: `AND` skips the right side once the left
                // is false, `OR` once the left is true.
                let lb = self.eval_bool(left, row)?;
                match op {
                    BinaryOp::And if !lb => Ok(false),
                    BinaryOp::Or if lb => Ok(true),
                    _ => self.eval_bool(right, row),
                }
            }
            Expr::Binary { left, op, right } => {
                let lv = self.eval(left, row)?;
                let rv = self.eval(right, row)?;
                self.eval_comparison(&lv, *op, &rv)
            }
            Expr::Literal(_) | Expr::Column { .. } => Err(DbError::Executor(format!(
                "{expr:?} is a scalar expression, not a predicate"
            ))),
        }
    }

    fn eval_comparison(&self, l: &Value, op: BinaryOp, r: &Value) -> DbResult<bool> {
        use BinaryOp::*;

        let ord = l.cmp_same_type(r).ok_or_else(|| {
            DbError::Executor(format!("incompatible types for {:?}: {:?}, {:?}", op, l, r))
        })?;

        Ok(match op {
            Eq => ord == Ordering::Equal,
            Ne => ord != Ordering::Equal,
            Lt => ord == Ordering::Less,
            Le => ord != Ordering::Greater,
            Gt => ord == Ordering::Greater,
            Ge => ord != Ordering::Less,
            And | Or => unreachable!("handled in eval_bool before reaching a comparison"),
        })
    }

    /// Find column index in schema, supporting qualified and unqualified references.
    ///
    /// Schema entries may be:
    /// - Simple names: `"id"`, `"name"`
    /// - Qualified names: `"users.id"`, `"orders.user_id"`
    ///
    /// Matching rules:
    /// - Qualified ref (`table.col`): Match `"table.col"` exactly
    /// - Unqualified ref (`col`): Match simple `"col"` or suffix `".col"`
    fn find_column(&self, table: Option<&str>, name: &str) -> DbResult<usize> {
        if let Some(qualifier) = table {
            // Qualified column reference: look for exact "table.column" match
            let full_name = format!("{}.{}", qualifier, name);
            self.schema
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&full_name))
                .ok_or_else(|| DbError::Executor(format!("unknown column '{}.{}'", qualifier, name)))
        } else {
            // Unqualified: try exact match first, then suffix match
            self.schema
                .iter()
                .position(|c| {
                    c.eq_ignore_ascii_case(name)
                        || c.to_lowercase().ends_with(&format!(".{}", name.to_lowercase()))
                })
                .ok_or_else(|| DbError::Executor(format!("unknown column '{}'", name)))
        }
    }
}
