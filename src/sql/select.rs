//! SELECT builder for fluent statement construction

use super::condition::Condition;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub on: Vec<Condition>,
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        };
        write!(f, "{} {} ON {}", kind, self.table, Condition::And(self.on.clone()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    table: String,
    top: Option<u32>,
    fields: Vec<String>,
    joins: Vec<Join>,
    conditions: Vec<Condition>,
    group_by: Vec<String>,
    having: Vec<Condition>,
    order_by: Option<String>,
}

impl Select {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            top: None,
            fields: Vec::new(),
            joins: Vec::new(),
            conditions: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: None,
        }
    }

    /// Limit number of rows (`TOP n`)
    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Fields qualified with a table alias, e.g. `w.ID`
    pub fn fields_of(mut self, alias: &str, fields: &[&str]) -> Self {
        self.fields.extend(fields.iter().map(|f| format!("{}.{}", alias, f)));
        self
    }

    pub fn inner_join(mut self, table: impl Into<String>, on: Vec<Condition>) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Inner,
            table: table.into(),
            on,
        });
        self
    }

    pub fn left_join(mut self, table: impl Into<String>, on: Vec<Condition>) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Left,
            table: table.into(),
            on,
        });
        self
    }

    /// Adds a WHERE condition; all conditions are AND-ed.
    pub fn filter(mut self, cond: impl Into<Condition>) -> Self {
        self.conditions.push(cond.into());
        self
    }

    pub fn group_by(mut self, fields: &[&str]) -> Self {
        self.group_by.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// HAVING condition; only rendered together with GROUP BY.
    pub fn having(mut self, cond: impl Into<Condition>) -> Self {
        self.having.push(cond.into());
        self
    }

    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = String::from("SELECT ");
        if let Some(top) = self.top.filter(|t| *t > 0) {
            sql.push_str(&format!("TOP {} ", top));
        }
        if self.fields.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.fields.join(", "));
        }
        sql.push_str(" FROM ");
        sql.push_str(&self.table);

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_string());
        }
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&Condition::And(self.conditions.clone()).to_sql());
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
            if !self.having.is_empty() {
                sql.push_str(" HAVING ");
                sql.push_str(&Condition::And(self.having.clone()).to_sql());
            }
        }
        if let Some(order) = &self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        sql
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}
