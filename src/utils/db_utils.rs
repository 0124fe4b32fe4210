use chrono::NaiveDate;
use sqlx::{MySql, QueryBuilder};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I32(i32),
    Bool(bool),
    Date(NaiveDate),
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gte,
    Lte,
    IsNull,
}

impl Op {
    fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => " = ",
            Op::Gte => " >= ",
            Op::Lte => " <= ",
            Op::IsNull => " IS NULL",
        }
    }
}

/// ===============================
/// Optional WHERE filters
/// ===============================
///
/// Column names are compile-time strings; every value goes through a bind.
#[derive(Debug, Default, Clone)]
pub struct FilterSet {
    clauses: Vec<(&'static str, Op, SqlValue)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, column: &'static str, op: Op, value: Option<impl Into<SqlValue>>) -> Self {
        if let Some(value) = value {
            self.clauses.push((column, op, value.into()));
        }
        self
    }

    pub fn eq(self, column: &'static str, value: Option<impl Into<SqlValue>>) -> Self {
        self.push(column, Op::Eq, value)
    }

    pub fn gte(self, column: &'static str, value: Option<impl Into<SqlValue>>) -> Self {
        self.push(column, Op::Gte, value)
    }

    pub fn lte(self, column: &'static str, value: Option<impl Into<SqlValue>>) -> Self {
        self.push(column, Op::Lte, value)
    }

    /// Unconditional `column IS NULL`.
    pub fn is_null(mut self, column: &'static str) -> Self {
        self.clauses.push((column, Op::IsNull, SqlValue::Bool(true)));
        self
    }

    /// Appends ` WHERE a = ? AND b >= ?` (nothing when empty).
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, MySql>) {
        for (i, (column, op, value)) in self.clauses.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            qb.push(*column);
            qb.push(op.as_sql());
            if *op != Op::IsNull {
                push_value(qb, value.clone());
            }
        }
    }
}

fn push_value(qb: &mut QueryBuilder<'_, MySql>, value: SqlValue) {
    match value {
        SqlValue::String(v) => qb.push_bind(v),
        SqlValue::U64(v) => qb.push_bind(v),
        SqlValue::I32(v) => qb.push_bind(v),
        SqlValue::Bool(v) => qb.push_bind(v),
        SqlValue::Date(v) => qb.push_bind(v),
    };
}

/// Page number (1-based) and page size, clamped.
pub fn page_bounds(page: Option<u32>, per_page: Option<u32>) -> (u32, u32, u64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page as u64 - 1) * per_page as u64;
    (page, per_page, offset)
}
