//! `FilterExec`: evaluates a predicate over each row from its child and
//! passes through only the rows that satisfy it (spec.md §4.8, `WHERE`).

use crate::{ExecutionContext, Executor};
use common::{DbError, DbResult, ExecutionStats, Row};
use expr::{BinaryOp, UnaryOp};
use planner::ResolvedExpr;
use std::cmp::Ordering;
use std::time::Instant;
use types::Value;

/// Evaluate a scalar [`ResolvedExpr`] (literal or column reference) over a row.
///
/// A logical or comparison node here is a caller error — those only make
/// sense as predicates, evaluated through [`eval_bool`].
pub fn eval(expr: &ResolvedExpr, row: &Row) -> DbResult<Value> {
    match expr {
        ResolvedExpr::Literal(v) => Ok(v.clone()),
        ResolvedExpr::Column(idx) => row
            .values
            .get(*idx as usize)
            .cloned()
            .ok_or_else(|| DbError::Executor(format!("column ordinal {idx} out of range"))),
        ResolvedExpr::Unary { .. } | ResolvedExpr::Binary { .. } => Err(DbError::Executor(
            format!("{expr:?} is a predicate, not a scalar expression"),
        )),
    }
}

/// Evaluate a predicate [`ResolvedExpr`] over a row, returning a primitive bool.
///
/// Mirrors `expr::EvalContext::eval_bool`, operating on numeric column
/// ordinals rather than named columns.
pub fn eval_bool(expr: &ResolvedExpr, row: &Row) -> DbResult<bool> {
    match expr {
        ResolvedExpr::Unary {
            op: UnaryOp::Not,
            expr: inner,
        } => Ok(!eval_bool(inner, row)?),
        ResolvedExpr::Binary {
            left,
            op: op @ (BinaryOp::And | BinaryOp::Or),
            right,
        } => {
            let lb = eval_bool(left, row)?;
            match op {
                BinaryOp::And if !lb => Ok(false),
                BinaryOp::Or if lb => Ok(true),
                _ => eval_bool(right, row),
            }
        }
        ResolvedExpr::Binary { left, op, right } => {
            let lv = eval(left, row)?;
            let rv = eval(right, row)?;
            eval_comparison(&lv, *op, &rv)
        }
        ResolvedExpr::Literal(_) | ResolvedExpr::Column(_) => Err(DbError::Executor(format!(
            "{expr:?} is a scalar expression, not a predicate"
        ))),
    }
}

fn eval_comparison(l: &Value, op: BinaryOp, r: &Value) -> DbResult<bool> {
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

pub struct FilterExec {
    input: Box<dyn Executor>,
    predicate: ResolvedExpr,
    stats: ExecutionStats,
}

impl FilterExec {
    pub fn new(input: Box<dyn Executor>, predicate: ResolvedExpr) -> Self {
        Self {
            input,
            predicate,
            stats: ExecutionStats::default(),
        }
    }
}

impl Executor for FilterExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.input.open(ctx)?;
        self.stats.open_time += start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let start = Instant::now();
        loop {
            match self.input.next(ctx)? {
                Some(row) => {
                    if eval_bool(&self.predicate, &row)? {
                        self.stats.rows_produced += 1;
                        self.stats.total_next_time += start.elapsed();
                        return Ok(Some(row));
                    }
                    self.stats.rows_filtered += 1;
                }
                None => {
                    self.stats.total_next_time += start.elapsed();
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.input.close(ctx)?;
        self.stats.close_time += start.elapsed();
        Ok(())
    }

    fn schema(&self) -> &[String] {
        self.input.schema()
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}
