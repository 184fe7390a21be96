//! WHERE / HAVING / ON conditions

use super::literal::{SqlExpr, format_string};
use super::normalise_field;
use crate::value::FieldValue;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Bool(bool),
    Compare(SqlExpr, CompareOp, SqlExpr),
    IsNull(SqlExpr),
    IsNotNull(SqlExpr),
    In(SqlExpr, Vec<SqlExpr>),
    /// `left(field, n) = 'prefix'`
    StartsWith(String, String),
    /// Neither null nor the empty string
    NotEmpty(String),

    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),

    Raw(String),
}

impl Condition {
    pub fn always() -> Self {
        Self::Bool(true)
    }

    pub fn never() -> Self {
        Self::Bool(false)
    }

    pub fn raw(cond: impl Into<String>) -> Self {
        Self::Raw(cond.into())
    }

    pub fn and(conds: Vec<Condition>) -> Self {
        Self::And(conds)
    }

    pub fn or(conds: Vec<Condition>) -> Self {
        Self::Or(conds)
    }

    pub fn not(cond: Condition) -> Self {
        Self::Not(Box::new(cond))
    }

    /// Equality with null and boolean handling: a null value becomes
    /// `is null`, `false` also matches null columns.
    pub fn eq(left: SqlExpr, right: SqlExpr) -> Self {
        match (left, right) {
            (SqlExpr::Value(FieldValue::Null), SqlExpr::Value(FieldValue::Null)) => Self::always(),
            (SqlExpr::Value(FieldValue::Null), SqlExpr::Value(FieldValue::Bool(_)))
            | (SqlExpr::Value(FieldValue::Bool(_)), SqlExpr::Value(FieldValue::Null)) => Self::never(),
            (SqlExpr::Value(FieldValue::Null), other) | (other, SqlExpr::Value(FieldValue::Null)) => {
                Self::IsNull(other)
            }
            (SqlExpr::Value(FieldValue::Bool(a)), SqlExpr::Value(FieldValue::Bool(b))) => Self::Bool(a == b),
            (SqlExpr::Value(FieldValue::Bool(b)), other) | (other, SqlExpr::Value(FieldValue::Bool(b))) => {
                if b {
                    Self::Compare(other, CompareOp::Eq, SqlExpr::Value(FieldValue::Int(1)))
                } else {
                    Self::Or(vec![
                        Self::Compare(other.clone(), CompareOp::Eq, SqlExpr::Value(FieldValue::Int(0))),
                        Self::IsNull(other),
                    ])
                }
            }
            (left, right) => Self::Compare(left, CompareOp::Eq, right),
        }
    }

    pub fn field_eq(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::eq(SqlExpr::field(field), SqlExpr::Value(value.into()))
    }

    /// `field = ?`
    pub fn field_eq_param(field: &str) -> Self {
        Self::Compare(SqlExpr::field(field), CompareOp::Eq, SqlExpr::Param)
    }

    pub fn fields_eq(field1: &str, field2: &str) -> Self {
        Self::Compare(SqlExpr::field(field1), CompareOp::Eq, SqlExpr::field(field2))
    }

    pub fn field_ne(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::Compare(SqlExpr::field(field), CompareOp::Ne, SqlExpr::Value(value.into()))
    }

    pub fn field_lt(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::Compare(SqlExpr::field(field), CompareOp::Lt, SqlExpr::Value(value.into()))
    }

    pub fn field_le(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::Compare(SqlExpr::field(field), CompareOp::Le, SqlExpr::Value(value.into()))
    }

    pub fn field_gt(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::Compare(SqlExpr::field(field), CompareOp::Gt, SqlExpr::Value(value.into()))
    }

    pub fn field_ge(field: &str, value: impl Into<FieldValue>) -> Self {
        Self::Compare(SqlExpr::field(field), CompareOp::Ge, SqlExpr::Value(value.into()))
    }

    pub fn field_is_null(field: &str) -> Self {
        Self::IsNull(SqlExpr::field(field))
    }

    pub fn field_is_not_null(field: &str) -> Self {
        Self::IsNotNull(SqlExpr::field(field))
    }

    pub fn field_in<V: Into<FieldValue>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values: Vec<SqlExpr> = values.into_iter().map(|v| SqlExpr::Value(v.into())).collect();
        Self::In(SqlExpr::field(field), values)
    }

    pub fn field_starts_with(field: &str, prefix: &str) -> Self {
        Self::StartsWith(normalise_field(field), prefix.to_string())
    }

    pub fn field_not_empty(field: &str) -> Self {
        Self::NotEmpty(normalise_field(field))
    }

    /// `from <= field < to`; an open end is unbounded.
    pub fn datetime_in_range(field: &str, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> Self {
        let mut conds = Vec::new();
        if let Some(from) = from {
            conds.push(Self::field_ge(field, from));
        }
        if let Some(to) = to {
            conds.push(Self::field_lt(field, to));
        }
        Self::And(conds)
    }

    pub fn datetime_in_day(field: &str, day: NaiveDate) -> Self {
        let start = day.and_time(chrono::NaiveTime::MIN);
        Self::datetime_in_range(field, Some(start), Some(start + Duration::days(1)))
    }

    pub fn datetime_in_month(field: &str, year: i32, month: u32) -> Self {
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let start = NaiveDate::from_ymd_opt(year, month, 1);
        let end = NaiveDate::from_ymd_opt(next_year, next_month, 1);
        match (start, end) {
            (Some(start), Some(end)) => Self::datetime_in_range(
                field,
                Some(start.and_time(chrono::NaiveTime::MIN)),
                Some(end.and_time(chrono::NaiveTime::MIN)),
            ),
            _ => Self::never(),
        }
    }

    pub fn datetime_in_year(field: &str, year: i32) -> Self {
        match NaiveDate::from_ymd_opt(year, 1, 1) {
            Some(start) => Self::datetime_in_range(
                field,
                Some(start.and_time(chrono::NaiveTime::MIN)),
                start
                    .with_year(year + 1)
                    .map(|end| end.and_time(chrono::NaiveTime::MIN)),
            ),
            None => Self::never(),
        }
    }

    pub fn is_empty_list(&self) -> bool {
        matches!(self, Condition::And(c) | Condition::Or(c) if c.is_empty())
    }

    pub fn to_sql(&self) -> String {
        match self {
            Condition::Bool(true) => "(1=1)".to_string(),
            Condition::Bool(false) => "(1=0)".to_string(),
            Condition::Compare(left, op, right) => format!("({} {} {})", left, op.as_sql(), right),
            Condition::IsNull(expr) => format!("({} is null)", expr),
            Condition::IsNotNull(expr) => format!("({} is not null)", expr),
            Condition::In(expr, values) => match values.len() {
                0 => Condition::never().to_sql(),
                1 => Condition::eq(expr.clone(), values[0].clone()).to_sql(),
                _ => {
                    let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    format!("({} in ({}))", expr, list.join(", "))
                }
            },
            Condition::StartsWith(field, prefix) => {
                if prefix.is_empty() {
                    Condition::always().to_sql()
                } else {
                    format!("(left({}, {}) = {})", field, prefix.chars().count(), format_string(prefix))
                }
            }
            Condition::NotEmpty(field) => format!("({} is not null and {} != '')", field, field),
            Condition::And(conds) => join_conditions(conds, "AND", "(1=1)"),
            Condition::Or(conds) => join_conditions(conds, "OR", "(1=0)"),
            Condition::Not(cond) => format!("(not {})", cond.to_sql()),
            Condition::Raw(cond) => cond.clone(),
        }
    }
}

fn join_conditions(conds: &[Condition], connector: &str, empty: &str) -> String {
    match conds {
        [] => empty.to_string(),
        [single] => single.to_sql(),
        _ => {
            let parts: Vec<String> = conds.iter().map(|c| c.to_sql()).collect();
            format!("({})", parts.join(&format!(" {} ", connector)))
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

impl From<&str> for Condition {
    fn from(cond: &str) -> Self {
        Condition::Raw(cond.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_handles_null_and_booleans() {
        assert_eq!(Condition::field_eq("f1", FieldValue::Null).to_sql(), "(F1 is null)");
        assert_eq!(Condition::field_eq("f1", true).to_sql(), "(F1 = 1)");
        assert_eq!(Condition::field_eq("f1", false).to_sql(), "((F1 = 0) OR (F1 is null))");
        assert_eq!(Condition::field_eq("f1", "a'b").to_sql(), "(F1 = 'a''b')");
        assert_eq!(Condition::eq(SqlExpr::Value(true.into()), SqlExpr::Value(false.into())).to_sql(), "(1=0)");
    }

    #[test]
    fn in_list_degenerates_sensibly() {
        assert_eq!(Condition::field_in("f", Vec::<i64>::new()).to_sql(), "(1=0)");
        assert_eq!(Condition::field_in("f", vec![1]).to_sql(), "(F = 1)");
        assert_eq!(Condition::field_in("f", vec!["a", "b"]).to_sql(), "(F in ('a', 'b'))");
    }

    #[test]
    fn lists_wrap_only_when_needed() {
        assert_eq!(Condition::and(vec![]).to_sql(), "(1=1)");
        assert_eq!(Condition::or(vec![]).to_sql(), "(1=0)");
        assert_eq!(Condition::and(vec![Condition::field_is_null("a")]).to_sql(), "(A is null)");
        assert_eq!(
            Condition::and(vec![
                Condition::field_ge("a", 5),
                Condition::or(vec![Condition::raw("x > 1"), Condition::field_is_not_null("b")]),
            ])
            .to_sql(),
            "((A >= 5) AND (x > 1 OR (B is not null)))"
        );
        assert_eq!(Condition::not(Condition::fields_eq("a", "t.b")).to_sql(), "(not (A = T.B))");
    }

    #[test]
    fn string_helpers() {
        assert_eq!(Condition::field_starts_with("f", "abc").to_sql(), "(left(F, 3) = 'abc')");
        assert_eq!(Condition::field_starts_with("f", "").to_sql(), "(1=1)");
        assert_eq!(Condition::field_not_empty("f").to_sql(), "(F is not null and F != '')");
        assert_eq!(Condition::field_eq_param("t.name").to_sql(), "(T.NAME = ?)");
    }

    #[test]
    fn month_range_wraps_year() {
        assert_eq!(
            Condition::datetime_in_month("d", 2022, 12).to_sql(),
            "((D >= '2022-12-01T00:00:00.000') AND (D < '2023-01-01T00:00:00.000'))"
        );
        assert_eq!(
            Condition::datetime_in_day("d", NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()).to_sql(),
            "((D >= '2023-02-28T00:00:00.000') AND (D < '2023-03-01T00:00:00.000'))"
        );
        assert_eq!(
            Condition::datetime_in_range("d", None, None).to_sql(),
            "(1=1)"
        );
    }
}
