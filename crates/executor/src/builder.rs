//! Builder: constructs executor trees from physical plans.

use crate::{
    aggregate::AggregateExec,
    dml::{DeleteExec, InsertExec, UpdateExec},
    filter::FilterExec,
    join::{self, HashJoinExec, NestedLoopJoinExec},
    limit::LimitExec,
    project::ProjectExec,
    scan::{IndexScanExec, SeqScanExec},
    sort::{SortExec, SortKey},
    Executor,
};
use catalog::Catalog;
use common::{DbResult, TableId};
use planner::PhysicalPlan;

/// Build an executor tree from a physical plan.
///
/// Recursively constructs operator instances, wiring up child inputs. The
/// catalog is consulted for `UPDATE`/`DELETE` plans, which carry no schema
/// of their own and need one to build the `SeqScan` feeding them.
///
/// # Errors
///
/// Returns `DbError::Executor`/`DbError::Catalog` if the plan references an
/// unknown table or the catalog lookup otherwise fails.
pub fn build_executor(plan: PhysicalPlan, catalog: &Catalog) -> DbResult<Box<dyn Executor>> {
    match plan {
        PhysicalPlan::SeqScan { table_id, schema } => {
            Ok(Box::new(SeqScanExec::new(table_id, schema)))
        }

        PhysicalPlan::IndexScan {
            table_id,
            index_name,
            predicate,
            schema,
        } => Ok(Box::new(IndexScanExec::new(
            table_id, index_name, predicate, schema,
        ))),

        PhysicalPlan::Filter { input, predicate } => {
            let child = build_executor(*input, catalog)?;
            Ok(Box::new(FilterExec::new(child, predicate)))
        }

        PhysicalPlan::Project { input, columns } => {
            let child = build_executor(*input, catalog)?;
            Ok(Box::new(ProjectExec::new(child, columns)))
        }

        PhysicalPlan::Sort { input, order_by } => {
            let child = build_executor(*input, catalog)?;
            let sort_keys = order_by
                .into_iter()
                .map(|o| SortKey {
                    column_id: o.column_id,
                    direction: o.direction,
                })
                .collect();
            Ok(Box::new(SortExec::new(child, sort_keys)))
        }

        PhysicalPlan::Limit {
            input,
            limit,
            offset,
        } => {
            let child = build_executor(*input, catalog)?;
            Ok(Box::new(LimitExec::new(child, limit, offset)))
        }

        PhysicalPlan::Insert { table_id, values } => {
            let schema = table_schema(catalog, table_id)?;
            Ok(Box::new(InsertExec::new(table_id, schema, values)))
        }

        PhysicalPlan::Update {
            table_id,
            assignments,
            predicate,
        } => {
            let schema = table_schema(catalog, table_id)?;
            let mut input: Box<dyn Executor> =
                Box::new(SeqScanExec::new(table_id, schema.clone()));

            if let Some(pred) = predicate {
                input = Box::new(FilterExec::new(input, pred));
            }

            Ok(Box::new(UpdateExec::new(
                table_id,
                vec!["count".into()],
                input,
                assignments,
            )))
        }

        PhysicalPlan::Delete {
            table_id,
            predicate,
        } => {
            let schema = table_schema(catalog, table_id)?;
            let mut input: Box<dyn Executor> =
                Box::new(SeqScanExec::new(table_id, schema.clone()));

            if let Some(pred) = predicate {
                input = Box::new(FilterExec::new(input, pred));
            }

            Ok(Box::new(DeleteExec::new(
                table_id,
                vec!["count".into()],
                input,
            )))
        }

        PhysicalPlan::Aggregate {
            input,
            func,
            column,
        } => {
            let child = build_executor(*input, catalog)?;
            Ok(Box::new(AggregateExec::new(child, func, column)))
        }

        PhysicalPlan::NestedLoopJoin {
            left,
            right,
            condition,
            schema,
        } => {
            let left_width = plan_schema_width(&left);
            let use_hash_join = join::is_equi_join(&condition, left_width);

            let left_exec = build_executor(*left, catalog)?;
            let right_exec = build_executor(*right, catalog)?;

            if use_hash_join {
                let hash_join =
                    HashJoinExec::try_new(left_exec, right_exec, &condition, left_width, schema)
                        .expect("is_equi_join and try_new must agree");
                Ok(Box::new(hash_join))
            } else {
                Ok(Box::new(NestedLoopJoinExec::new(
                    left_exec, right_exec, condition, schema,
                )))
            }
        }
    }
}

/// Width (in columns) a plan's output schema would have, used to split a
/// join condition's column ordinals between its two sides before either
/// child executor has been built.
fn plan_schema_width(plan: &PhysicalPlan) -> usize {
    match plan {
        PhysicalPlan::SeqScan { schema, .. } => schema.len(),
        PhysicalPlan::IndexScan { schema, .. } => schema.len(),
        PhysicalPlan::Filter { input, .. } => plan_schema_width(input),
        PhysicalPlan::Project { columns, .. } => columns.len(),
        PhysicalPlan::Sort { input, .. } => plan_schema_width(input),
        PhysicalPlan::Limit { input, .. } => plan_schema_width(input),
        PhysicalPlan::Aggregate { .. } => 1,
        PhysicalPlan::NestedLoopJoin { schema, .. } => schema.len(),
        PhysicalPlan::Insert { .. }
        | PhysicalPlan::Update { .. }
        | PhysicalPlan::Delete { .. } => 0,
    }
}

fn table_schema(catalog: &Catalog, table_id: TableId) -> DbResult<Vec<String>> {
    let table_meta = catalog.table_by_id(table_id)?;
    Ok(table_meta
        .schema
        .columns
        .iter()
        .map(|c| c.name.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::TestFixture;
    use expr::BinaryOp;
    use planner::{AssignOp, IndexPredicate, ResolvedExpr, ResolvedOrderByExpr, SortDirection};
    use types::Value;

    #[test]
    fn build_seq_scan() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let plan = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };

        let executor = build_executor(plan, &fixture.catalog).unwrap();
        assert_eq!(executor.schema(), &["id", "name"]);
    }

    #[test]
    fn build_index_scan() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let plan = PhysicalPlan::IndexScan {
            table_id,
            index_name: "idx_users_id".into(),
            predicate: IndexPredicate::Eq {
                col: 0,
                value: ResolvedExpr::Literal(Value::Int(42)),
            },
            schema: vec!["id".into()],
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_filter_with_complex_predicate() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let input = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };

        let predicate = ResolvedExpr::Binary {
            left: Box::new(ResolvedExpr::Column(0)),
            op: BinaryOp::Eq,
            right: Box::new(ResolvedExpr::Literal(Value::Int(42))),
        };

        let plan = PhysicalPlan::Filter {
            input: Box::new(input),
            predicate,
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_project_multiple_columns() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let input = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };

        let plan = PhysicalPlan::Project {
            input: Box::new(input),
            columns: vec![("name".to_string(), 1), ("id".to_string(), 0)],
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_sort_and_limit() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let scan = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };
        let sorted = PhysicalPlan::Sort {
            input: Box::new(scan),
            order_by: vec![ResolvedOrderByExpr {
                column_id: 0,
                direction: SortDirection::Asc,
            }],
        };
        let limited = PhysicalPlan::Limit {
            input: Box::new(sorted),
            limit: Some(10),
            offset: None,
        };

        assert!(build_executor(limited, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_insert() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let plan = PhysicalPlan::Insert {
            table_id,
            values: vec![
                ResolvedExpr::Literal(Value::Int(1)),
                ResolvedExpr::Literal(Value::Char("alice".into())),
            ],
        };

        let executor = build_executor(plan, &fixture.catalog).unwrap();
        assert_eq!(executor.schema(), &["id", "name"]);
    }

    #[test]
    fn build_update_without_predicate() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let plan = PhysicalPlan::Update {
            table_id,
            assignments: vec![(0, AssignOp::Set, ResolvedExpr::Literal(Value::Int(100)))],
            predicate: None,
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_update_with_predicate() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let predicate = ResolvedExpr::Binary {
            left: Box::new(ResolvedExpr::Column(0)),
            op: BinaryOp::Gt,
            right: Box::new(ResolvedExpr::Literal(Value::Int(10))),
        };

        let plan = PhysicalPlan::Update {
            table_id,
            assignments: vec![(1, AssignOp::Set, ResolvedExpr::Literal(Value::Char("updated".into())))],
            predicate: Some(predicate),
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_delete_without_predicate() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let plan = PhysicalPlan::Delete {
            table_id,
            predicate: None,
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_delete_with_predicate() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let predicate = ResolvedExpr::Binary {
            left: Box::new(ResolvedExpr::Column(1)),
            op: BinaryOp::Eq,
            right: Box::new(ResolvedExpr::Literal(Value::Char("x".into()))),
        };

        let plan = PhysicalPlan::Delete {
            table_id,
            predicate: Some(predicate),
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_nested_project_over_filter_over_scan() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let scan = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };

        let filter = PhysicalPlan::Filter {
            input: Box::new(scan),
            predicate: ResolvedExpr::Binary {
                left: Box::new(ResolvedExpr::Column(0)),
                op: BinaryOp::Gt,
                right: Box::new(ResolvedExpr::Literal(Value::Int(0))),
            },
        };

        let project = PhysicalPlan::Project {
            input: Box::new(filter),
            columns: vec![("name".to_string(), 1)],
        };

        assert!(build_executor(project, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_aggregate_over_scan() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let scan = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };
        let plan = PhysicalPlan::Aggregate {
            input: Box::new(scan),
            func: planner::PlanAggregateFunc::Count,
            column: None,
        };

        let executor = build_executor(plan, &fixture.catalog).unwrap();
        assert_eq!(executor.schema(), &["count"]);
    }

    #[test]
    fn build_join_picks_hash_join_for_equality_condition() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let left = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };
        let right = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };

        let condition = ResolvedExpr::Binary {
            left: Box::new(ResolvedExpr::Column(0)),
            op: BinaryOp::Eq,
            right: Box::new(ResolvedExpr::Column(2)),
        };

        let plan = PhysicalPlan::NestedLoopJoin {
            left: Box::new(left),
            right: Box::new(right),
            condition,
            schema: vec!["id".into(), "name".into(), "id".into(), "name".into()],
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }

    #[test]
    fn build_join_falls_back_to_nested_loop_for_non_equality_condition() {
        let fixture = TestFixture::users();
        let table_id = fixture.table_id();
        let left = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };
        let right = PhysicalPlan::SeqScan {
            table_id,
            schema: vec!["id".into(), "name".into()],
        };

        let condition = ResolvedExpr::Binary {
            left: Box::new(ResolvedExpr::Column(0)),
            op: BinaryOp::Gt,
            right: Box::new(ResolvedExpr::Column(2)),
        };

        let plan = PhysicalPlan::NestedLoopJoin {
            left: Box::new(left),
            right: Box::new(right),
            condition,
            schema: vec!["id".into(), "name".into(), "id".into(), "name".into()],
        };

        assert!(build_executor(plan, &fixture.catalog).is_ok());
    }
}
