//! Join operators: combines rows from two child operators (spec.md §4.8).

use crate::filter::eval_bool;
use crate::{ExecutionContext, Executor};
use common::{DbResult, ExecutionStats, Row};
use expr::BinaryOp;
use hashbrown::HashMap;
use planner::ResolvedExpr;
use std::time::Instant;
use types::Value;

/// Hashable/comparable surrogate for a join key. `Value` itself isn't
/// `Eq`/`Hash` (it carries a bare `f32` for `Float`), so a hash join key
/// normalizes that one case to its bit pattern.
#[derive(Clone, PartialEq, Eq, Hash)]
enum JoinKeyPart {
    Int(i32),
    BigInt(i64),
    FloatBits(u32),
    Char(String),
    DateTime(String),
}

impl From<&Value> for JoinKeyPart {
    fn from(v: &Value) -> Self {
        match v {
            Value::Int(n) => JoinKeyPart::Int(*n),
            Value::BigInt(n) => JoinKeyPart::BigInt(*n),
            Value::Float(f) => JoinKeyPart::FloatBits(f.to_bits()),
            Value::Char(s) => JoinKeyPart::Char(s.clone()),
            Value::DateTime(s) => JoinKeyPart::DateTime(s.clone()),
        }
    }
}

fn combine_rows(left: &Row, right: &Row) -> Row {
    let mut combined_values = left.values.clone();
    combined_values.extend(right.values.clone());
    Row::new(combined_values)
}

/// Nested loop join operator - the general-purpose O(n*m) join, correct for
/// any join condition.
///
/// # Algorithm
///
/// 1. `open()`: materialize all right-side rows, fetch first left row.
/// 2. `next()`: for each left row, iterate right rows, evaluate condition.
/// 3. When right is exhausted for the current left row, advance left.
/// 4. `close()`: release materialized rows and close children.
pub struct NestedLoopJoinExec {
    left_input: Box<dyn Executor>,
    right_input: Box<dyn Executor>,
    condition: ResolvedExpr,
    schema: Vec<String>,

    current_left_row: Option<Row>,
    right_materialized: Vec<Row>,
    right_cursor: usize,
    stats: ExecutionStats,
}

impl NestedLoopJoinExec {
    pub fn new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        condition: ResolvedExpr,
        schema: Vec<String>,
    ) -> Self {
        Self {
            left_input: left,
            right_input: right,
            condition,
            schema,
            current_left_row: None,
            right_materialized: Vec::new(),
            right_cursor: 0,
            stats: ExecutionStats::default(),
        }
    }
}

impl Executor for NestedLoopJoinExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();

        self.left_input.open(ctx)?;
        self.right_input.open(ctx)?;

        self.right_materialized.clear();
        while let Some(row) = self.right_input.next(ctx)? {
            self.right_materialized.push(row);
        }

        self.current_left_row = self.left_input.next(ctx)?;
        self.right_cursor = 0;

        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let start = Instant::now();

        loop {
            let left_row = match &self.current_left_row {
                Some(r) => r.clone(),
                None => {
                    self.stats.total_next_time += start.elapsed();
                    return Ok(None);
                }
            };

            while self.right_cursor < self.right_materialized.len() {
                let right_row = &self.right_materialized[self.right_cursor];
                self.right_cursor += 1;

                let combined = combine_rows(&left_row, right_row);

                if eval_bool(&self.condition, &combined)? {
                    self.stats.rows_produced += 1;
                    self.stats.total_next_time += start.elapsed();
                    return Ok(Some(combined));
                }
            }

            self.current_left_row = self.left_input.next(ctx)?;
            self.right_cursor = 0;
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();

        self.right_materialized.clear();
        self.current_left_row = None;
        self.left_input.close(ctx)?;
        self.right_input.close(ctx)?;

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

/// Decompose a (possibly `AND`-conjoined) equality condition into the
/// left/right column ordinal pairs it tests, e.g. `l.a = r.x AND l.b = r.y`.
/// Returns `None` if any conjunct isn't a plain `left_col = right_col`
/// comparison — `builder::build_executor` falls back to `NestedLoopJoinExec`
/// in that case.
pub(crate) fn is_equi_join(condition: &ResolvedExpr, left_width: usize) -> bool {
    equi_join_columns(condition, left_width).is_some()
}

fn equi_join_columns(condition: &ResolvedExpr, left_width: usize) -> Option<Vec<(u16, u16)>> {
    match condition {
        ResolvedExpr::Binary {
            left,
            op: BinaryOp::And,
            right,
        } => {
            let mut pairs = equi_join_columns(left, left_width)?;
            pairs.extend(equi_join_columns(right, left_width)?);
            Some(pairs)
        }
        ResolvedExpr::Binary {
            left,
            op: BinaryOp::Eq,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (ResolvedExpr::Column(l), ResolvedExpr::Column(r)) => {
                let (left_col, right_col) = if (*l as usize) < left_width {
                    (*l, *r)
                } else {
                    (*r, *l)
                };
                Some(vec![(left_col, right_col - left_width as u16)])
            }
            _ => None,
        },
        _ => None,
    }
}

/// Hash join operator - equi-join specialization of [`NestedLoopJoinExec`].
///
/// Builds an in-memory hash table over the right side keyed by its join
/// columns, then probes it once per left row, turning the join into a
/// single pass over each side instead of a cross product.
pub struct HashJoinExec {
    left_input: Box<dyn Executor>,
    right_input: Box<dyn Executor>,
    left_cols: Vec<u16>,
    right_cols: Vec<u16>,
    schema: Vec<String>,

    table: HashMap<Vec<JoinKeyPart>, Vec<Row>>,
    current_matches: Vec<Row>,
    current_left_row: Option<Row>,
    match_cursor: usize,
    stats: ExecutionStats,
}

impl HashJoinExec {
    /// Build a hash join if `condition` is a pure conjunction of
    /// `left_col = right_col` equalities; otherwise `None` so the caller
    /// can fall back to `NestedLoopJoinExec`.
    pub fn try_new(
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        condition: &ResolvedExpr,
        left_width: usize,
        schema: Vec<String>,
    ) -> Option<Self> {
        let pairs = equi_join_columns(condition, left_width)?;
        let (left_cols, right_cols): (Vec<u16>, Vec<u16>) = pairs.into_iter().unzip();
        Some(Self {
            left_input: left,
            right_input: right,
            left_cols,
            right_cols,
            schema,
            table: HashMap::new(),
            current_matches: Vec::new(),
            current_left_row: None,
            match_cursor: 0,
            stats: ExecutionStats::default(),
        })
    }

    fn key_of(row: &Row, cols: &[u16]) -> Vec<JoinKeyPart> {
        cols.iter().map(|&c| JoinKeyPart::from(&row.values[c as usize])).collect()
    }
}

impl Executor for HashJoinExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();
        self.stats = ExecutionStats::default();

        self.left_input.open(ctx)?;
        self.right_input.open(ctx)?;

        self.table.clear();
        while let Some(row) = self.right_input.next(ctx)? {
            let key = Self::key_of(&row, &self.right_cols);
            self.table.entry(key).or_insert_with(Vec::new).push(row);
        }

        self.current_left_row = self.left_input.next(ctx)?;
        self.current_matches = self.lookup_matches();
        self.match_cursor = 0;

        self.stats.open_time = start.elapsed();
        Ok(())
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> DbResult<Option<Row>> {
        let start = Instant::now();

        loop {
            let left_row = match &self.current_left_row {
                Some(r) => r.clone(),
                None => {
                    self.stats.total_next_time += start.elapsed();
                    return Ok(None);
                }
            };

            if self.match_cursor < self.current_matches.len() {
                let right_row = self.current_matches[self.match_cursor].clone();
                self.match_cursor += 1;
                let combined = combine_rows(&left_row, &right_row);
                self.stats.rows_produced += 1;
                self.stats.total_next_time += start.elapsed();
                return Ok(Some(combined));
            }

            self.current_left_row = self.left_input.next(ctx)?;
            self.current_matches = self.lookup_matches();
            self.match_cursor = 0;
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> DbResult<()> {
        let start = Instant::now();

        self.table.clear();
        self.current_matches.clear();
        self.current_left_row = None;
        self.left_input.close(ctx)?;
        self.right_input.close(ctx)?;

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

impl HashJoinExec {
    fn lookup_matches(&self) -> Vec<Row> {
        match &self.current_left_row {
            Some(row) => {
                let key = Self::key_of(row, &self.left_cols);
                self.table.get(&key).cloned().unwrap_or_default()
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::*;

    fn row(vals: &[i32]) -> Row {
        Row::new(vals.iter().map(|&v| Value::Int(v)).collect())
    }

    #[test]
    fn nested_loop_cross_product_with_always_true() {
        let left = Box::new(MockExecutor::new(vec![row(&[1]), row(&[2])], vec!["a".into()]));
        let right = Box::new(MockExecutor::new(vec![row(&[10]), row(&[20])], vec!["b".into()]));
        let condition = binary(lit_int(1), BinaryOp::Eq, lit_int(1));
        let schema = vec!["left.a".into(), "right.b".into()];

        let mut join = NestedLoopJoinExec::new(left, right, condition, schema);
        let mut out = Vec::new();
        run_executor(&mut join, &mut out);

        assert_eq!(
            out,
            vec![row(&[1, 10]), row(&[1, 20]), row(&[2, 10]), row(&[2, 20])]
        );
    }

    #[test]
    fn nested_loop_equality_condition() {
        let left = Box::new(MockExecutor::new(
            vec![row(&[1, 100]), row(&[2, 200])],
            vec!["id".into(), "value".into()],
        ));
        let right = Box::new(MockExecutor::new(
            vec![row(&[101, 1]), row(&[102, 2]), row(&[103, 1])],
            vec!["order_id".into(), "user_id".into()],
        ));
        let condition = binary(col(0), BinaryOp::Eq, col(3));
        let schema = vec![
            "u.id".into(),
            "u.value".into(),
            "o.order_id".into(),
            "o.user_id".into(),
        ];

        let mut join = NestedLoopJoinExec::new(left, right, condition, schema);
        let mut out = Vec::new();
        run_executor(&mut join, &mut out);

        assert_eq!(
            out,
            vec![
                row(&[1, 100, 101, 1]),
                row(&[1, 100, 103, 1]),
                row(&[2, 200, 102, 2]),
            ]
        );
    }

    #[test]
    fn equi_join_columns_detects_simple_equality() {
        let condition = binary(col(0), BinaryOp::Eq, col(3));
        assert_eq!(equi_join_columns(&condition, 2), Some(vec![(0, 1)]));
    }

    #[test]
    fn hash_join_matches_nested_loop_on_equality() {
        let left = Box::new(MockExecutor::new(
            vec![row(&[1, 100]), row(&[2, 200])],
            vec!["id".into(), "value".into()],
        ));
        let right = Box::new(MockExecutor::new(
            vec![row(&[101, 1]), row(&[102, 2]), row(&[103, 1])],
            vec!["order_id".into(), "user_id".into()],
        ));
        let condition = binary(col(0), BinaryOp::Eq, col(3));
        let schema = vec![
            "u.id".into(),
            "u.value".into(),
            "o.order_id".into(),
            "o.user_id".into(),
        ];

        let mut join = HashJoinExec::try_new(left, right, &condition, 2, schema).unwrap();
        let mut out = Vec::new();
        run_executor(&mut join, &mut out);
        out.sort_by_key(|r| match r.values[2] {
            Value::Int(n) => n,
            _ => unreachable!(),
        });

        assert_eq!(
            out,
            vec![
                row(&[1, 100, 101, 1]),
                row(&[2, 200, 102, 2]),
                row(&[1, 100, 103, 1]),
            ]
        );
    }
}
