use expr::Expr;

#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
        primary_key: Option<Vec<String>>,
    },
    DropTable {
        name: String,
    },
    CreateIndex {
        name: String,
        table: String,
        column: String,
    },
    DropIndex {
        name: String,
    },
    Insert {
        table: String,
        values: Vec<Expr>,
    },
    Select {
        columns: Vec<SelectItem>,
        from: TableRef,
        joins: Vec<JoinClause>,
        selection: Option<Expr>,
        order_by: Vec<OrderByExpr>,
        limit: Option<u64>,
        offset: Option<u64>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        selection: Option<Expr>,
    },
    Delete {
        table: String,
        selection: Option<Expr>,
    },
    Explain {
        query: Box<Statement>,
        analyze: bool,
    },
    /// `LOAD 'file' INTO t` — bulk-loads a CSV file into a table.
    Load {
        path: String,
        table: String,
    },
    /// `SHOW TABLES`.
    ShowTables,
    /// `SHOW INDEX FROM t`.
    ShowIndex {
        table: String,
    },
    /// `DESC t` / `DESCRIBE t`.
    Describe {
        table: String,
    },
    /// `SET output_file = {0|1}`.
    SetOutputFile(bool),
    /// `HELP`.
    Help,
    /// `BEGIN` / `COMMIT` / `ABORT` / `ROLLBACK`.
    TxnControl(TxnControl),
}

/// The `SET` clause's assignment operator: plain `col = val` or the
/// increment form `col += val`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
}

/// A single `SET` clause assignment.
#[derive(Clone, Debug, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub op: AssignOp,
    pub value: Expr,
}

/// Transaction-control statements, handled outside the planner/executor
/// pipeline since they manage a session's open transaction rather than
/// reading or writing table data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxnControl {
    Begin,
    Commit,
    Abort,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectItem {
    Wildcard,
    Column(String),
    /// A single aggregate function call. `column` is `None` only for
    /// `COUNT(*)`; spec.md restricts a query to at most one aggregate,
    /// which the parser enforces (no mixing with other select items,
    /// no nesting).
    Aggregate {
        func: AggregateFunc,
        column: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
}

/// A table reference in a FROM/JOIN clause, with its optional alias.
#[derive(Clone, Debug, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: String, alias: Option<String>) -> Self {
        Self { name, alias }
    }

    /// The name later plan stages should key off of: the alias if one was
    /// given, otherwise the table's own name.
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinClause {
    pub table: TableRef,
    pub join_type: JoinType,
    pub condition: Expr,
}

/// ORDER BY clause with a column name and direction.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderByExpr {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}
