//! Aggregate operator: reduces its input to a single row (spec.md's
//! Projection & Aggregation module).
//!
//! Only a single aggregate is ever planned per query (`planner` rejects
//! mixing one with other select items), so this operator has no grouping
//! key and no accumulator map — it folds every input row into one running
//! value and emits it once `next()` is first called.

use crate::{ExecutionContext, Executor};
use common::{ColumnId, DbError, DbResult, ExecutionStats, Row};
use planner::PlanAggregateFunc as AggregateFunc;
use std::time::Instant;
use types::Value;

/// Aggregate operator - folds every row from its child into one of
/// `COUNT`/`SUM`/`MIN`/`MAX`, then yields a single result row.
///
/// `COUNT` returns the row count regardless of whether a column was named
/// (there's no NULL to exclude, spec.md §3). `SUM` requires a numeric
/// column and returns 0 on empty input; `MIN`/`MAX` compare with
/// `Value::cmp_same_type` and return `DbError::Executor` on empty input,
/// since there's no type-independent sentinel extremum.
pub struct AggregateExec {
    input: Box<dyn Executor>,
    func: AggregateFunc,
    column: Option<ColumnId>,
    schema: Vec<String>,
    done: bool,
    stats: ExecutionStats,
}

impl AggregateExec {
    pub fn new(input: Box<dyn Executor>, func: AggregateFunc, column: Option<ColumnId>) -> Self {
        let label = match func {
            AggregateFunc::Count => "count",
            AggregateFunc::Sum => "sum",
            AggregateFunc::Min => "min",
            AggregateFunc::Max => "max",
        };
        Self {
            input,
            func,
            column,
            schema: vec![label.into()],
            done: false,
            stats: ExecutionStats::default(),
        }
    }

    fn column_value(&self, row: &Row) -> DbResult<Value> {
        let idx = self.column.ok_or_else(|| {
            DbError::Executor(format!("{:?} requires a column, got COUNT(*)", self.func))
        })? as usize;
        row.values.get(idx).cloned().ok_or_else(|| {
            DbError::Executor(format!(
                "column index {idx} out of bounds (row has {} columns)",
                row.values.len()
            ))
        })
    }

    fn sum(&mut self, ctx: &mut ExecutionContext) -> DbResult<Value> {
        let mut int_total: i64 = 0;
        let mut float_total: f64 = 0.0;
        let mut saw_float = false;
        let mut saw_row = false;

        while let Some(row) = self.input.next(ctx)? {
            saw_row = true;
            match self.column_value(&row)? {
                Value::Int(n) => int_total += n as i64,
                Value::BigInt(n) => int_total += n,
                Value::Float(f) => {
                    saw_float = true;
                    float_total += f as f64;
                }
                other => {
                    return Err(DbError::Executor(format!(
                        "SUM over non-numeric column value {other:?}"
                    )))
                }
            }
        }

        if !saw_row {
            return Ok(Value::Int(0));
        }
        if saw_float {
            Ok(Value::Float((float_total + int_total as f64) as f32))
        } else {
            match i32::try_from(int_total) {
                Ok(n) => Ok(Value::Int(n)),
                Err(_) => Ok(Value::BigInt(int_total)),
            }
        }
    }

    fn count(&mut self, ctx: &mut ExecutionContext) -> DbResult<Value> {
        let mut n: i32 = 0;
        while self.input.next(ctx)?.is_some() {
            n += 1;
        }
        Ok(Value::Int(n))
    }

    fn min_or_max(&mut self, ctx: &mut ExecutionContext, want_min: bool) -> DbResult<Value> {
        let mut best: Option<Value> = None;
        while let Some(row) = self.input.next(ctx)? {
            let v = self.column_value(&row)?;
            best = Some(match best {
                None => v,
                Some(current) => {
                    let ordering = current.cmp_same_type(&v).ok_or_else(|| {
                        DbError::Executor(format!(
                            "{:?} cannot compare values of different types",
                            self.func
                        ))
                    })?;
                    if (want_min && ordering.is_gt()) || (!want_min && ordering.is_lt()) {
                        v
                    } else {
                        current
                    }
                }
            });
        }
        best.ok_or_else(|| {
            DbError::Executor(format!(
                "{:?} over an empty input has no well-defined result",
                self.func
            ))
        })
    }
}

impl Executor for AggregateExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.done = false;
        self.stats = ExecutionStats::default();
        self.input.open(ctx)?;
        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let start = Instant::now();
        if self.done {
            self.stats.total_next_time += start.elapsed();
            return Ok(None);
        }
        self.done = true;

        let result = match self.func {
            AggregateFunc::Count => self.count(ctx)?,
            AggregateFunc::Sum => self.sum(ctx)?,
            AggregateFunc::Min => self.min_or_max(ctx, true)?,
            AggregateFunc::Max => self.min_or_max(ctx, false)?,
        };
        self.stats.rows_produced += 1;
        self.stats.total_next_time += start.elapsed();
        Ok(Some(Row::new(vec![result])))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.input.close(ctx)?;
        self.stats.close_time = start.elapsed();
        Ok(())
    }

    fn schema(&self) -> &[String] {
        &self.schema
    }

    fn stats(&self) -> Option<&ExecutionStats> {
        Some(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::TestFixture;
    use crate::SeqScanExec;
    use common::DbError;

    fn scan_with_rows(fixture: &TestFixture, table_id: common::TableId, rows: &[i32]) {
        let txn = fixture.txn_mgr.begin().unwrap();
        let handle = &fixture.tables[&table_id];
        for &v in rows {
            fixture
                .txn_mgr
                .insert(
                    &txn,
                    table_id,
                    handle,
                    vec![Value::Int(v), Value::Char("x".into())],
                )
                .unwrap();
        }
    }

    #[test]
    fn count_star_counts_every_row() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        scan_with_rows(&fixture, table_id, &[1, 2, 3]);

        let mut ctx = fixture.ctx();
        let scan = Box::new(SeqScanExec::new(table_id, vec!["id".into(), "name".into()]));
        let mut agg = AggregateExec::new(scan, AggregateFunc::Count, None);
        agg.open(&mut ctx).unwrap();
        let row = agg.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.values, vec![Value::Int(3)]);
        assert!(agg.next(&mut ctx).unwrap().is_none());
    }

    #[test]
    fn count_on_empty_input_is_zero() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();

        let mut ctx = fixture.ctx();
        let scan = Box::new(SeqScanExec::new(table_id, vec!["id".into(), "name".into()]));
        let mut agg = AggregateExec::new(scan, AggregateFunc::Count, None);
        agg.open(&mut ctx).unwrap();
        let row = agg.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.values, vec![Value::Int(0)]);
    }

    #[test]
    fn sum_adds_up_the_column() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        scan_with_rows(&fixture, table_id, &[10, 20, 30]);

        let mut ctx = fixture.ctx();
        let scan = Box::new(SeqScanExec::new(table_id, vec!["id".into(), "name".into()]));
        let mut agg = AggregateExec::new(scan, AggregateFunc::Sum, Some(0));
        agg.open(&mut ctx).unwrap();
        let row = agg.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.values, vec![Value::Int(60)]);
    }

    #[test]
    fn sum_on_empty_input_is_zero() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();

        let mut ctx = fixture.ctx();
        let scan = Box::new(SeqScanExec::new(table_id, vec!["id".into(), "name".into()]));
        let mut agg = AggregateExec::new(scan, AggregateFunc::Sum, Some(0));
        agg.open(&mut ctx).unwrap();
        let row = agg.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.values, vec![Value::Int(0)]);
    }

    #[test]
    fn min_and_max_pick_the_extremes() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        scan_with_rows(&fixture, table_id, &[5, 1, 9, 3]);

        let mut ctx = fixture.ctx();
        let scan = Box::new(SeqScanExec::new(table_id, vec!["id".into(), "name".into()]));
        let mut min_agg = AggregateExec::new(scan, AggregateFunc::Min, Some(0));
        min_agg.open(&mut ctx).unwrap();
        assert_eq!(
            min_agg.next(&mut ctx).unwrap().unwrap().values,
            vec![Value::Int(1)]
        );

        let scan = Box::new(SeqScanExec::new(table_id, vec!["id".into(), "name".into()]));
        let mut max_agg = AggregateExec::new(scan, AggregateFunc::Max, Some(0));
        max_agg.open(&mut ctx).unwrap();
        assert_eq!(
            max_agg.next(&mut ctx).unwrap().unwrap().values,
            vec![Value::Int(9)]
        );
    }

    #[test]
    fn max_on_empty_input_is_an_error() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();

        let mut ctx = fixture.ctx();
        let scan = Box::new(SeqScanExec::new(table_id, vec!["id".into(), "name".into()]));
        let mut agg = AggregateExec::new(scan, AggregateFunc::Max, Some(0));
        agg.open(&mut ctx).unwrap();
        let err = agg.next(&mut ctx).unwrap_err();
        assert!(matches!(err, DbError::Executor(_)));
    }
}
