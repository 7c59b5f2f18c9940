mod ast;

pub use ast::*;

use common::{DbError, DbResult};
use expr::{BinaryOp, Expr, UnaryOp};
use sqlparser::ast as sqlast;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser as SqlParser;
use std::collections::HashSet;
use types::Value;

/// Parse SQL text into the internal AST statements.
///
/// Most statements are standard SQL, parsed by `sqlparser`. A handful of
/// statements in spec.md §6's SQL surface are not standard SQL at all
/// (`LOAD`, `SHOW INDEX FROM`, `DESC`, `SET output_file`, `HELP`) or use
/// non-standard syntax within an otherwise-standard statement (`col += val`
/// in `UPDATE`'s `SET` clause); those are recognized and hand-parsed before
/// falling back to `sqlparser` for everything else.
pub fn parse_sql(sql: &str) -> DbResult<Vec<Statement>> {
    split_statements(sql)
        .iter()
        .map(|text| parse_one_statement(text))
        .collect()
}

/// Split a script on top-level semicolons, treating `'...'`-quoted regions
/// as opaque so a semicolon inside a string literal (e.g. a `LOAD` path)
/// never splits a statement in two.
fn split_statements(sql: &str) -> Vec<String> {
    let mut stmts = Vec::new();
    let mut current = String::new();
    let mut in_string = false;

    for c in sql.chars() {
        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            ';' if !in_string => {
                if !current.trim().is_empty() {
                    stmts.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        stmts.push(current);
    }
    stmts
}

fn parse_one_statement(text: &str) -> DbResult<Statement> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DbError::Parser("empty statement".into()));
    }
    if let Some(stmt) = try_parse_meta_statement(trimmed)? {
        return Ok(stmt);
    }

    let (desugared, compound_cols) = desugar_compound_assignments(trimmed);
    let dialect = GenericDialect {};
    let mut stmts = SqlParser::parse_sql(&dialect, &desugared)
        .map_err(|e| DbError::Parser(format!("SQL parse error: {e}")))?;
    if stmts.len() != 1 {
        return Err(DbError::Parser("expected exactly one statement".into()));
    }
    map_statement(stmts.remove(0), &compound_cols)
}

/// Case-insensitive prefix match. Returns the remainder of `s` with the
/// original casing preserved (important for file paths and string values).
fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn normalize_table_token(s: &str) -> DbResult<String> {
    let t = s.trim().trim_matches(|c| c == '`' || c == '"');
    if t.is_empty() {
        return Err(DbError::Parser("expected a table name".into()));
    }
    Ok(t.to_lowercase())
}

/// Recognize the non-standard statements in spec.md §6: `LOAD`, transaction
/// control, `SHOW TABLES`/`SHOW INDEX FROM`, `DESC`/`DESCRIBE`, `SET
/// output_file`, and `HELP`. Returns `None` when `text` isn't one of these,
/// so the caller falls through to `sqlparser`.
fn try_parse_meta_statement(text: &str) -> DbResult<Option<Statement>> {
    let upper = text.to_uppercase();

    if upper == "BEGIN" || upper == "START TRANSACTION" {
        return Ok(Some(Statement::TxnControl(TxnControl::Begin)));
    }
    if upper == "COMMIT" {
        return Ok(Some(Statement::TxnControl(TxnControl::Commit)));
    }
    if upper == "ABORT" || upper == "ROLLBACK" {
        return Ok(Some(Statement::TxnControl(TxnControl::Abort)));
    }
    if upper == "HELP" {
        return Ok(Some(Statement::Help));
    }
    if upper == "SHOW TABLES" {
        return Ok(Some(Statement::ShowTables));
    }
    if let Some(rest) = strip_prefix_ci(text, "SHOW INDEX FROM ") {
        return Ok(Some(Statement::ShowIndex {
            table: normalize_table_token(rest)?,
        }));
    }
    if let Some(rest) = strip_prefix_ci(text, "DESCRIBE ") {
        return Ok(Some(Statement::Describe {
            table: normalize_table_token(rest)?,
        }));
    }
    if let Some(rest) = strip_prefix_ci(text, "DESC ") {
        return Ok(Some(Statement::Describe {
            table: normalize_table_token(rest)?,
        }));
    }
    if let Some(rest) = strip_prefix_ci(text, "SET OUTPUT_FILE") {
        let rest = rest.trim().trim_start_matches('=').trim();
        return match rest {
            "1" => Ok(Some(Statement::SetOutputFile(true))),
            "0" => Ok(Some(Statement::SetOutputFile(false))),
            other => Err(DbError::Parser(format!(
                "SET output_file expects 0 or 1, got: {other}"
            ))),
        };
    }
    if let Some(rest) = strip_prefix_ci(text, "LOAD ") {
        return Ok(Some(parse_load_statement(rest)?));
    }
    Ok(None)
}

fn parse_load_statement(rest: &str) -> DbResult<Statement> {
    let rest = rest.trim();
    let after_quote = rest
        .strip_prefix('\'')
        .ok_or_else(|| DbError::Parser("LOAD requires a single-quoted file path".into()))?;
    let end = after_quote
        .find('\'')
        .ok_or_else(|| DbError::Parser("unterminated string in LOAD path".into()))?;
    let path = after_quote[..end].to_string();
    let remainder = after_quote[end + 1..].trim();
    let table = strip_prefix_ci(remainder, "INTO ")
        .ok_or_else(|| DbError::Parser("LOAD requires INTO <table>".into()))?;
    normalize_table_token(table).map(|table| Statement::Load { path, table })
}

/// Desugar `col += val` in an `UPDATE`'s `SET` clause into `col = val` so
/// `sqlparser` (which has no notion of a compound assignment) can parse it
/// normally; the set of columns that used `+=` is threaded back through so
/// `map_statement` can rebuild the right `AssignOp` per assignment.
fn desugar_compound_assignments(text: &str) -> (String, HashSet<String>) {
    let mut compound = HashSet::new();
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '+' && chars.get(i + 1) == Some(&'=') {
            let trimmed = out.trim_end();
            let ident_start = trimmed
                .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
                .map(|p| p + 1)
                .unwrap_or(0);
            compound.insert(trimmed[ident_start..].to_lowercase());
            out.push('=');
            i += 2;
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }

    (out, compound)
}

fn map_statement(stmt: sqlast::Statement, compound_cols: &HashSet<String>) -> DbResult<Statement> {
    use sqlast::Statement as SqlStatement;

    match stmt {
        SqlStatement::CreateTable {
            name,
            columns,
            constraints,
            ..
        } => {
            let table = normalize_object_name(&name)?;
            let primary_key = resolve_primary_key(&columns, &constraints)?;

            let mapped_columns = columns
                .into_iter()
                .map(|col| ColumnDef {
                    name: normalize_ident_owned(col.name),
                    ty: col.data_type.to_string().to_uppercase(),
                })
                .collect();

            Ok(Statement::CreateTable {
                name: table,
                columns: mapped_columns,
                primary_key,
            })
        }
        SqlStatement::Drop {
            object_type, names, ..
        } => match object_type {
            sqlast::ObjectType::Table => Ok(Statement::DropTable {
                name: first_name(names)?,
            }),
            sqlast::ObjectType::Index => Ok(Statement::DropIndex {
                name: first_name(names)?,
            }),
            _ => Err(DbError::Parser(format!(
                "unsupported DROP type: {object_type:?}"
            ))),
        },
        SqlStatement::CreateIndex {
            name,
            table_name,
            columns,
            ..
        } => {
            let index_name = name
                .ok_or_else(|| DbError::Parser("index name required".into()))
                .map(|n| normalize_object_name(&n))??;
            let table = normalize_object_name(&table_name)?;
            let column = map_index_column(columns.first())?;
            Ok(Statement::CreateIndex {
                name: index_name,
                table,
                column,
            })
        }
        SqlStatement::Insert {
            table_name, source, ..
        } => {
            let table = normalize_object_name(&table_name)?;
            let source = source.ok_or_else(|| DbError::Parser("INSERT source missing".into()))?;
            let values = extract_values(*source)?;
            Ok(Statement::Insert { table, values })
        }
        SqlStatement::Query(query) => map_select(*query),
        SqlStatement::Update {
            table,
            assignments,
            selection,
            ..
        } => {
            let table = table_name_from_with_joins(&table)?;
            let assignments = assignments
                .into_iter()
                .map(|assign| {
                    let ident = assign
                        .id
                        .last()
                        .ok_or_else(|| DbError::Parser("invalid assignment target".into()))?;
                    let column = normalize_ident(ident);
                    let op = if compound_cols.contains(&column) {
                        AssignOp::Add
                    } else {
                        AssignOp::Set
                    };
                    Ok(Assignment {
                        column,
                        op,
                        value: map_expr(assign.value)?,
                    })
                })
                .collect::<DbResult<Vec<_>>>()?;
            let selection = selection.map(map_expr).transpose()?;
            Ok(Statement::Update {
                table,
                assignments,
                selection,
            })
        }
        SqlStatement::Delete {
            from, selection, ..
        } => {
            if from.is_empty() {
                return Err(DbError::Parser("DELETE requires FROM source".into()));
            }
            let table = table_name_from_with_joins(&from[0])?;
            if from.len() > 1 {
                return Err(DbError::Parser("multi-table DELETE not supported".into()));
            }
            let selection = selection.map(map_expr).transpose()?;
            Ok(Statement::Delete { table, selection })
        }
        SqlStatement::Explain {
            statement, analyze, ..
        } => {
            let query = Box::new(map_statement(*statement, compound_cols)?);
            Ok(Statement::Explain { query, analyze })
        }
        _ => Err(DbError::Parser("unsupported statement".into())),
    }
}

fn map_select(query: sqlast::Query) -> DbResult<Statement> {
    use sqlast::SetExpr;

    let select = match *query.body {
        SetExpr::Select(select) => select,
        SetExpr::Values(_) => {
            return Err(DbError::Parser("standalone VALUES not supported".into()))
        }
        _ => return Err(DbError::Parser("SET operations not supported".into())),
    };

    let sqlast::Select {
        projection,
        from,
        selection,
        ..
    } = *select;

    if from.is_empty() {
        return Err(DbError::Parser("SELECT requires FROM clause".into()));
    }
    if from.len() > 1 {
        return Err(DbError::Parser(
            "comma-separated FROM list not supported, use JOIN".into(),
        ));
    }
    let with_joins = &from[0];
    let from_table = table_ref_from_factor(&with_joins.relation)?;
    let joins = with_joins
        .joins
        .iter()
        .map(map_join)
        .collect::<DbResult<Vec<_>>>()?;
    let columns = projection
        .into_iter()
        .map(map_select_item)
        .collect::<DbResult<Vec<_>>>()?;
    if columns.iter().any(|c| matches!(c, SelectItem::Aggregate { .. })) && columns.len() > 1 {
        return Err(DbError::Parser(
            "an aggregate function must be the only select item (spec.md restricts queries to a single aggregate)".into(),
        ));
    }
    let selection = selection.map(map_expr).transpose()?;

    // Extract ORDER BY clauses
    let order_by = query
        .order_by
        .into_iter()
        .map(map_order_by_expr)
        .collect::<DbResult<Vec<_>>>()?;

    // Extract LIMIT
    let limit = query
        .limit
        .map(|expr| match expr {
            sqlast::Expr::Value(sqlast::Value::Number(n, _)) => n
                .parse::<u64>()
                .map_err(|_| DbError::Parser(format!("invalid LIMIT value: {}", n))),
            _ => Err(DbError::Parser(
                "LIMIT must be a non-negative integer".into(),
            )),
        })
        .transpose()?;

    // Extract OFFSET
    let offset = query
        .offset
        .map(|offset_expr| match offset_expr.value {
            sqlast::Expr::Value(sqlast::Value::Number(n, _)) => n
                .parse::<u64>()
                .map_err(|_| DbError::Parser(format!("invalid OFFSET value: {}", n))),
            _ => Err(DbError::Parser(
                "OFFSET must be a non-negative integer".into(),
            )),
        })
        .transpose()?;

    Ok(Statement::Select {
        columns,
        from: from_table,
        joins,
        selection,
        order_by,
        limit,
        offset,
    })
}

fn table_ref_from_factor(factor: &sqlast::TableFactor) -> DbResult<ast::TableRef> {
    match factor {
        sqlast::TableFactor::Table { name, alias, .. } => {
            let table_name = normalize_object_name(name)?;
            let alias = alias
                .as_ref()
                .map(|a| normalize_ident_owned(a.name.clone()));
            Ok(ast::TableRef::new(table_name, alias))
        }
        other => Err(DbError::Parser(format!(
            "unsupported table factor: {other:?}"
        ))),
    }
}

fn map_join(join: &sqlast::Join) -> DbResult<ast::JoinClause> {
    use sqlast::{JoinConstraint, JoinOperator};

    let table = table_ref_from_factor(&join.relation)?;
    let (join_type, constraint) = match &join.join_operator {
        JoinOperator::Inner(c) => (ast::JoinType::Inner, c),
        JoinOperator::LeftOuter(c) => (ast::JoinType::Left, c),
        JoinOperator::RightOuter(c) => (ast::JoinType::Right, c),
        JoinOperator::FullOuter(c) => (ast::JoinType::Full, c),
        other => {
            return Err(DbError::Parser(format!(
                "unsupported join operator: {other:?}"
            )))
        }
    };
    let condition = match constraint {
        JoinConstraint::On(expr) => map_expr(expr.clone())?,
        other => {
            return Err(DbError::Parser(format!(
                "join requires an ON condition, got: {other:?}"
            )))
        }
    };

    Ok(ast::JoinClause {
        table,
        join_type,
        condition,
    })
}

fn map_order_by_expr(expr: sqlast::OrderByExpr) -> DbResult<ast::OrderByExpr> {
    // Extract column name from expression
    let column = match expr.expr {
        sqlast::Expr::Identifier(ident) => normalize_ident(&ident),
        sqlast::Expr::CompoundIdentifier(parts) => {
            if parts.len() == 1 {
                normalize_ident(&parts[0])
            } else {
                return Err(DbError::Parser(
                    "qualified column names not supported in ORDER BY".into(),
                ));
            }
        }
        _ => {
            return Err(DbError::Parser(
                "ORDER BY supports column names only".into(),
            ))
        }
    };

    // Extract sort direction (default is ASC)
    let direction = if let Some(asc) = expr.asc {
        if asc {
            ast::SortDirection::Asc
        } else {
            ast::SortDirection::Desc
        }
    } else {
        // Default to ASC when not specified
        ast::SortDirection::Asc
    };

    Ok(ast::OrderByExpr { column, direction })
}

fn extract_values(query: sqlast::Query) -> DbResult<Vec<Expr>> {
    match *query.body {
        sqlast::SetExpr::Values(values) => {
            let mut rows = values.rows.into_iter();
            let row = rows
                .next()
                .ok_or_else(|| DbError::Parser("INSERT requires at least one row".into()))?;
            if rows.next().is_some() {
                return Err(DbError::Parser("multi-row INSERT not supported".into()));
            }
            row.into_iter().map(map_expr).collect()
        }
        _ => Err(DbError::Parser("INSERT expects VALUES list".into())),
    }
}

fn map_select_item(item: sqlast::SelectItem) -> DbResult<SelectItem> {
    match item {
        sqlast::SelectItem::Wildcard(options) => {
            ensure_plain_wildcard(&options)?;
            Ok(SelectItem::Wildcard)
        }
        sqlast::SelectItem::QualifiedWildcard(_, _) => {
            Err(DbError::Parser("qualified wildcard not supported".into()))
        }
        sqlast::SelectItem::UnnamedExpr(expr) => match expr {
            sqlast::Expr::Identifier(ident) => Ok(SelectItem::Column(normalize_ident_owned(ident))),
            sqlast::Expr::CompoundIdentifier(parts) => {
                let ident = parts
                    .last()
                    .ok_or_else(|| DbError::Parser("invalid identifier".into()))?;
                Ok(SelectItem::Column(normalize_ident(ident)))
            }
            sqlast::Expr::Function(func) => map_aggregate(func),
            other => Err(DbError::Parser(format!(
                "unsupported select item: {other:?}"
            ))),
        },
        sqlast::SelectItem::ExprWithAlias { .. } => {
            Err(DbError::Parser("select aliases not supported".into()))
        }
    }
}

fn map_aggregate(func: sqlast::Function) -> DbResult<SelectItem> {
    use sqlast::{FunctionArg, FunctionArgExpr};

    let fname = func
        .name
        .0
        .first()
        .map(|ident| ident.value.to_uppercase())
        .ok_or_else(|| DbError::Parser("invalid function name".into()))?;
    let agg_func = match fname.as_str() {
        "COUNT" => AggregateFunc::Count,
        "SUM" => AggregateFunc::Sum,
        "MIN" => AggregateFunc::Min,
        "MAX" => AggregateFunc::Max,
        other => return Err(DbError::Parser(format!("unsupported function call: {other}"))),
    };

    if func.distinct {
        return Err(DbError::Parser(
            "DISTINCT aggregates are not supported".into(),
        ));
    }
    if func.args.len() > 1 {
        return Err(DbError::Parser(
            "aggregate functions take at most one argument".into(),
        ));
    }

    let column = match func.args.into_iter().next() {
        None => None,
        Some(FunctionArg::Unnamed(FunctionArgExpr::Wildcard)) => None,
        Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(sqlast::Expr::Identifier(ident)))) => {
            Some(normalize_ident_owned(ident))
        }
        Some(FunctionArg::Unnamed(FunctionArgExpr::Expr(sqlast::Expr::CompoundIdentifier(
            parts,
        )))) => {
            let ident = parts
                .last()
                .ok_or_else(|| DbError::Parser("invalid identifier".into()))?;
            Some(normalize_ident(ident))
        }
        Some(other) => {
            return Err(DbError::Parser(format!(
                "unsupported aggregate argument: {other:?}"
            )))
        }
    };

    if column.is_none() && !matches!(agg_func, AggregateFunc::Count) {
        return Err(DbError::Parser(format!(
            "{fname}(*) is not supported; {fname} requires a column"
        )));
    }

    Ok(SelectItem::Aggregate {
        func: agg_func,
        column,
    })
}

fn map_expr(expr: sqlast::Expr) -> DbResult<Expr> {
    use sqlast::Expr as SqlExpr;

    match expr {
        SqlExpr::Identifier(ident) => Ok(Expr::Column {
            table: None,
            name: normalize_ident_owned(ident),
        }),
        SqlExpr::CompoundIdentifier(idents) => match idents.len() {
            1 => Ok(Expr::Column {
                table: None,
                name: normalize_ident(&idents[0]),
            }),
            2 => Ok(Expr::Column {
                table: Some(normalize_ident(&idents[0])),
                name: normalize_ident(&idents[1]),
            }),
            _ => Err(DbError::Parser(
                "column references support at most one table qualifier".into(),
            )),
        },
        SqlExpr::Value(value) => Ok(Expr::Literal(map_value(value)?)),
        SqlExpr::BinaryOp { left, op, right } => Ok(Expr::Binary {
            left: Box::new(map_expr(*left)?),
            op: map_binary_op(op)?,
            right: Box::new(map_expr(*right)?),
        }),
        SqlExpr::UnaryOp { op, expr } => Ok(Expr::Unary {
            op: map_unary_op(op)?,
            expr: Box::new(map_expr(*expr)?),
        }),
        SqlExpr::Nested(expr) => map_expr(*expr),
        _ => Err(DbError::Parser("unsupported expr".into())),
    }
}

fn map_value(value: sqlast::Value) -> DbResult<Value> {
    use sqlast::Value as SqlValue;

    match value {
        SqlValue::Number(num, _) => {
            if let Ok(i) = num.parse::<i32>() {
                Ok(Value::Int(i))
            } else if let Ok(i) = num.parse::<i64>() {
                Ok(Value::BigInt(i))
            } else {
                num.parse::<f32>()
                    .map(Value::Float)
                    .map_err(|_| DbError::Parser(format!("invalid numeric literal: {num}")))
            }
        }
        SqlValue::SingleQuotedString(s) | SqlValue::DoubleQuotedString(s) => Ok(Value::Char(s)),
        other => Err(DbError::Parser(format!("unsupported literal: {other:?}"))),
    }
}

fn map_binary_op(op: sqlast::BinaryOperator) -> DbResult<BinaryOp> {
    use sqlast::BinaryOperator as SqlBinary;

    Ok(match op {
        SqlBinary::Eq => BinaryOp::Eq,
        SqlBinary::NotEq => BinaryOp::Ne,
        SqlBinary::Lt => BinaryOp::Lt,
        SqlBinary::LtEq => BinaryOp::Le,
        SqlBinary::Gt => BinaryOp::Gt,
        SqlBinary::GtEq => BinaryOp::Ge,
        SqlBinary::And => BinaryOp::And,
        SqlBinary::Or => BinaryOp::Or,
        other => return Err(DbError::Parser(format!("unsupported operator: {other:?}"))),
    })
}

fn map_unary_op(op: sqlast::UnaryOperator) -> DbResult<UnaryOp> {
    use sqlast::UnaryOperator as SqlUnary;

    Ok(match op {
        SqlUnary::Not => UnaryOp::Not,
        other => {
            return Err(DbError::Parser(format!(
                "unsupported unary operator: {other:?}"
            )))
        }
    })
}

fn normalize_ident(ident: &sqlast::Ident) -> String {
    ident.value.to_lowercase()
}

fn normalize_ident_owned(ident: sqlast::Ident) -> String {
    ident.value.to_lowercase()
}

fn normalize_object_name(name: &sqlast::ObjectName) -> DbResult<String> {
    name.0
        .first()
        .map(|ident| ident.value.to_lowercase())
        .ok_or_else(|| DbError::Parser("invalid object name".into()))
}

fn first_name(mut names: Vec<sqlast::ObjectName>) -> DbResult<String> {
    if names.is_empty() {
        return Err(DbError::Parser("DROP requires a target".into()));
    }
    normalize_object_name(&names.remove(0))
}

fn table_name_from_with_joins(table: &sqlast::TableWithJoins) -> DbResult<String> {
    if !table.joins.is_empty() {
        return Err(DbError::Parser(
            "UPDATE/DELETE do not support joins".into(),
        ));
    }
    table_ref_from_factor(&table.relation).map(|t| t.name)
}

fn map_index_column(column: Option<&sqlast::OrderByExpr>) -> DbResult<String> {
    let column = column.ok_or_else(|| DbError::Parser("index column required".into()))?;
    match &column.expr {
        sqlast::Expr::Identifier(ident) => Ok(normalize_ident(ident)),
        sqlast::Expr::CompoundIdentifier(idents) => idents
            .last()
            .map(normalize_ident)
            .ok_or_else(|| DbError::Parser("invalid identifier".into())),
        other => Err(DbError::Parser(format!(
            "unsupported index column: {other:?}"
        ))),
    }
}

fn ensure_plain_wildcard(options: &sqlast::WildcardAdditionalOptions) -> DbResult<()> {
    let has_options = options.opt_exclude.is_some()
        || options.opt_except.is_some()
        || options.opt_rename.is_some()
        || options.opt_replace.is_some();
    if has_options {
        Err(DbError::Parser("wildcard options not supported".into()))
    } else {
        Ok(())
    }
}

/// Resolve primary key from inline column constraints and table-level constraints.
/// Returns error if PK defined in both places.
fn resolve_primary_key(
    columns: &[sqlast::ColumnDef],
    constraints: &[sqlast::TableConstraint],
) -> DbResult<Option<Vec<String>>> {
    let inline_pk = extract_inline_primary_key(columns)?;
    let table_pk = extract_primary_key(constraints)?;

    match (table_pk, inline_pk) {
        (Some(_), Some(_)) => Err(DbError::Parser(
            "PRIMARY KEY defined both inline and at table level".into(),
        )),
        (Some(pk), None) | (None, Some(pk)) => Ok(Some(pk)),
        (None, None) => Ok(None),
    }
}

/// Extract PRIMARY KEY constraint from table constraints.
/// Returns Some(Vec<String>) if PRIMARY KEY is found, None otherwise.
fn extract_primary_key(constraints: &[sqlast::TableConstraint]) -> DbResult<Option<Vec<String>>> {
    use sqlast::TableConstraint;

    for constraint in constraints {
        match constraint {
            TableConstraint::Unique {
                columns,
                is_primary,
                ..
            } if *is_primary => {
                let pk_columns: Vec<String> = columns.iter().map(normalize_ident).collect();

                if pk_columns.is_empty() {
                    return Err(DbError::Parser(
                        "PRIMARY KEY must include at least one column".into(),
                    ));
                }

                return Ok(Some(pk_columns));
            }
            _ => continue,
        }
    }
    Ok(None)
}

/// Extract PRIMARY KEY defined inline on column definitions.
fn extract_inline_primary_key(columns: &[sqlast::ColumnDef]) -> DbResult<Option<Vec<String>>> {
    use sqlast::ColumnOption;

    let mut pk_columns = Vec::new();
    for column in columns {
        let has_primary_key = column.options.iter().any(|opt| {
            matches!(
                opt.option,
                ColumnOption::Unique {
                    is_primary: true,
                    ..
                }
            )
        });
        if has_primary_key {
            pk_columns.push(normalize_ident(&column.name));
        }
    }

    match pk_columns.len() {
        0 => Ok(None),
        1 => Ok(Some(pk_columns)),
        _ => Err(DbError::Parser(
            "multiple PRIMARY KEY column constraints; use PRIMARY KEY (col1, col2)".into(),
        )),
    }
}
