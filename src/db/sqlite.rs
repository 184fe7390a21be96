//! SQLite backend, used for local mirrors and tests

use super::{Database, QueryResult, log_sql};
use crate::error::{Error, Result};
use crate::value::FieldValue;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Sqlite, SqlitePool, Statement, ValueRef};
use std::collections::{BTreeMap, BTreeSet};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub async fn connect(url: &str) -> Result<Self> {
        // every pooled connection to :memory: would see its own empty database
        let in_memory = url.contains(":memory:");
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 4 });
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options
            .connect(url)
            .await
            .map_err(|e| Error::Connection {
                endpoint: url.to_string(),
                message: e.to_string(),
            })?;

        log::debug!("Connected to SQLite database: {}", url);
        Ok(Self {
            url: url.to_string(),
            pool,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn column_names(&self, sql: &str) -> Result<Vec<String>> {
        let statement = self.pool.prepare(sql).await.map_err(|e| Error::query(sql, e))?;
        Ok(statement.columns().iter().map(|c| c.name().to_string()).collect())
    }
}

fn bind_param<'q>(query: SqliteQuery<'q>, param: &FieldValue) -> SqliteQuery<'q> {
    match param {
        FieldValue::Null => query.bind(Option::<i64>::None),
        FieldValue::Bool(b) => query.bind(*b),
        FieldValue::Int(i) => query.bind(*i),
        FieldValue::Float(f) => query.bind(*f),
        FieldValue::Text(s) => query.bind(s.clone()),
        FieldValue::Blob(bytes) => query.bind(bytes.clone()),
        other => query.bind(other.to_xml_text()),
    }
}

fn map_value(row: &SqliteRow, index: usize) -> std::result::Result<FieldValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(FieldValue::Null);
    }

    if let Ok(value) = row.try_get::<i64, _>(index) {
        return Ok(FieldValue::Int(value));
    }
    if let Ok(value) = row.try_get::<f64, _>(index) {
        return Ok(FieldValue::Float(value));
    }
    if let Ok(value) = row.try_get::<String, _>(index) {
        return Ok(FieldValue::Text(value));
    }
    if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(FieldValue::Blob(value));
    }
    Ok(FieldValue::Null)
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn query(&self, sql: &str, params: &[FieldValue]) -> Result<QueryResult> {
        log_sql(sql, params);
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }

        let rows = query.fetch_all(&self.pool).await.map_err(|e| Error::query(sql, e))?;

        let columns = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => self.column_names(sql).await?,
        };
        let mut result = QueryResult::new(columns);
        for row in &rows {
            let mut values = Vec::with_capacity(row.columns().len());
            for i in 0..row.columns().len() {
                values.push(map_value(row, i).map_err(|e| Error::query(sql, e))?);
            }
            result.push_row(values);
        }
        Ok(result)
    }

    async fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<u64> {
        log_sql(sql, params);
        let mut query = sqlx::query(sql);
        for param in params {
            query = bind_param(query, param);
        }
        let done = query.execute(&self.pool).await.map_err(|e| Error::query(sql, e))?;
        Ok(done.rows_affected())
    }

    async fn table_columns(&self, table: &str, computed: Option<bool>) -> Result<BTreeSet<String>> {
        // hidden: 0 plain, 1 virtual-table hidden, 2/3 generated
        let mut sql = String::from("SELECT name FROM pragma_table_xinfo(?)");
        match computed {
            Some(true) => sql.push_str(" WHERE hidden IN (2, 3)"),
            Some(false) => sql.push_str(" WHERE hidden = 0"),
            None => {}
        }
        let result = self.query(&sql, &[table.into()]).await?;
        Ok(result
            .first_column()
            .iter()
            .filter_map(|v| v.as_str().map(crate::sql::normalise_field))
            .collect())
    }

    async fn unique_indexes(&self, table: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let sql = "SELECT il.name AS INDEX_NAME, ii.name AS COL \
                   FROM pragma_index_list(?) il JOIN pragma_index_info(il.name) ii \
                   WHERE il.\"unique\" = 1 ORDER BY il.name, ii.seqno";
        let result = self.query(sql, &[table.into()]).await?;
        let mut indexes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in result.row_maps() {
            if let (Some(FieldValue::Text(index)), Some(FieldValue::Text(col))) = (row.get("INDEX_NAME"), row.get("COL")) {
                indexes
                    .entry(index.clone())
                    .or_default()
                    .push(crate::sql::normalise_field(col));
            }
        }
        Ok(indexes)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let result = self
            .query(
                "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND upper(name) = upper(?)",
                &[table.into()],
            )
            .await?;
        Ok(result.single_value().and_then(FieldValue::as_i64).unwrap_or(0) > 0)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> SqliteDatabase {
        let db = SqliteDatabase::connect("sqlite::memory:").await.unwrap();
        db.execute(
            "CREATE TABLE ARTIKEL (ID INTEGER PRIMARY KEY, ARTIKEL TEXT NOT NULL UNIQUE, NAME TEXT, PREIS REAL, MENGE2 REAL GENERATED ALWAYS AS (PREIS * 2) VIRTUAL)",
            &[],
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn query_binds_and_decodes_values() {
        let db = memory_db().await;
        let inserted = db
            .execute(
                "INSERT INTO ARTIKEL (ARTIKEL, NAME, PREIS) VALUES (?, ?, ?)",
                &["A100".into(), FieldValue::Null, 12.5.into()],
            )
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let result = db
            .query("SELECT id, artikel, name, preis FROM ARTIKEL WHERE ARTIKEL = ?", &["A100".into()])
            .await
            .unwrap();
        assert_eq!(result.columns(), &["ID", "ARTIKEL", "NAME", "PREIS"]);
        assert_eq!(result.value(0, "ID"), Some(&FieldValue::Int(1)));
        assert_eq!(result.value(0, "NAME"), Some(&FieldValue::Null));
        assert_eq!(result.value(0, "PREIS"), Some(&FieldValue::Float(12.5)));
    }

    #[tokio::test]
    async fn empty_result_keeps_columns() {
        let db = memory_db().await;
        let result = db.query("SELECT ARTIKEL, NAME FROM ARTIKEL", &[]).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.columns(), &["ARTIKEL", "NAME"]);
    }

    #[tokio::test]
    async fn metadata_from_pragmas() {
        let db = memory_db().await;

        let plain = db.table_columns("ARTIKEL", Some(false)).await.unwrap();
        assert!(plain.contains("ARTIKEL"));
        assert!(!plain.contains("MENGE2"));
        let computed = db.table_columns("artikel", Some(true)).await.unwrap();
        assert_eq!(computed, BTreeSet::from(["MENGE2".to_string()]));

        let indexes = db.unique_indexes("ARTIKEL").await.unwrap();
        assert_eq!(indexes.values().next(), Some(&vec!["ARTIKEL".to_string()]));

        assert!(db.table_exists("artikel").await.unwrap());
        assert!(!db.table_exists("STUELI").await.unwrap());
    }

    #[tokio::test]
    async fn bad_sql_is_a_query_error() {
        let db = memory_db().await;
        let err = db.query("SELECT nope FROM ARTIKEL", &[]).await.unwrap_err();
        match err {
            Error::Query { sql, .. } => assert_eq!(sql, "SELECT nope FROM ARTIKEL"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
