//! Direct read access to the APplus database
//!
//! SQL passed to [`Database::query`] is executed as is. Tenant scoping is
//! added by completeSQL, which the session helpers call before querying.

pub mod ids;
#[cfg(feature = "odbc")]
pub mod odbc;
pub mod result;
pub mod sqlite;

pub use ids::DbTableIds;
pub use result::QueryResult;
pub use sqlite::SqliteDatabase;

use crate::config::DbSettings;
use crate::error::{Error, Result};
use crate::sql::{Condition, Select, normalise_field};
use crate::value::{FieldValue, to_hex};
use async_trait::async_trait;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub(crate) fn log_sql(sql: &str, params: &[FieldValue]) {
    if params.is_empty() {
        debug!("executing '{}'", sql);
    } else {
        debug!("executing '{}' with args {:?}", sql, params);
    }
}

/// A relational store reachable with positional `?` parameters.
#[async_trait]
pub trait Database: Send + Sync {
    async fn query(&self, sql: &str, params: &[FieldValue]) -> Result<QueryResult>;

    /// Runs a statement and returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<u64>;

    /// Column names of `table`; `computed` filters on computed columns.
    async fn table_columns(&self, table: &str, computed: Option<bool>) -> Result<BTreeSet<String>> {
        let mut on = vec![Condition::fields_eq("T.Object_ID", "C.Object_ID")];
        if let Some(computed) = computed {
            on.push(Condition::field_eq("C.is_computed", i64::from(computed)));
        }
        let sql = Select::new("SYS.TABLES T")
            .inner_join("SYS.COLUMNS C", on)
            .fields(&["C.NAME"])
            .filter(Condition::field_eq_param("T.NAME"));

        let result = self.query(&sql.to_sql(), &[table.into()]).await?;
        Ok(result
            .first_column()
            .iter()
            .filter_map(|v| v.as_str().map(normalise_field))
            .collect())
    }

    /// Unique indexes of `table`: index name to its (upper-case) columns.
    async fn unique_indexes(&self, table: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let sql = Select::new("sys.indexes AS i")
            .inner_join(
                "sys.index_columns AS ic",
                vec![
                    Condition::raw("i.OBJECT_ID = ic.OBJECT_ID"),
                    Condition::raw("i.index_id = ic.index_id"),
                ],
            )
            .fields(&["i.name AS INDEX_NAME", "COL_NAME(ic.OBJECT_ID,ic.column_id) AS COL"])
            .filter(Condition::raw("OBJECT_NAME(ic.OBJECT_ID) = ?"))
            .filter(Condition::raw("i.is_unique = 1"));

        let result = self.query(&sql.to_sql(), &[table.into()]).await?;
        let mut indexes: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in result.row_maps() {
            if let (Some(FieldValue::Text(index)), Some(FieldValue::Text(col))) = (row.get("INDEX_NAME"), row.get("COL")) {
                indexes.entry(index.clone()).or_default().push(normalise_field(col));
            }
        }
        Ok(indexes)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let sql = Select::new("SYS.TABLES T")
            .fields(&["count(*)"])
            .filter(Condition::field_eq_param("T.NAME"));
        let result = self.query(&sql.to_sql(), &[table.into()]).await?;
        Ok(result.single_value().and_then(FieldValue::as_i64).unwrap_or(0) > 0)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Target description for logs, without credentials.
    fn describe(&self) -> String;
}

/// Opens the backend named by the settings.
pub async fn connect(settings: &DbSettings) -> Result<Arc<dyn Database>> {
    if let Some(url) = settings.sqlite_url() {
        return Ok(Arc::new(SqliteDatabase::connect(url).await?));
    }
    connect_odbc(settings).await
}

#[cfg(feature = "odbc")]
async fn connect_odbc(settings: &DbSettings) -> Result<Arc<dyn Database>> {
    Ok(Arc::new(odbc::OdbcDatabase::connect(settings).await?))
}

#[cfg(not(feature = "odbc"))]
async fn connect_odbc(settings: &DbSettings) -> Result<Arc<dyn Database>> {
    Err(Error::Connection {
        endpoint: settings.describe(),
        message: "built without ODBC support; enable the `odbc` feature or configure dbserver.url".to_string(),
    })
}

pub async fn query_single_row(
    db: &dyn Database,
    sql: &str,
    params: &[FieldValue],
) -> Result<Option<BTreeMap<String, FieldValue>>> {
    Ok(db.query(sql, params).await?.row_map(0))
}

pub async fn query_single_value(db: &dyn Database, sql: &str, params: &[FieldValue]) -> Result<FieldValue> {
    Ok(db.query(sql, params).await?.single_value().cloned().unwrap_or_default())
}

/// Optimistic-lock timestamp of a row as hex, as the useXML update expects it.
pub async fn load_timestamp(db: &dyn Database, table: &str, id: i64) -> Result<String> {
    let sql = format!("select timestamp from {} where id = ?", table);
    let value = query_single_value(db, &sql, &[id.into()]).await?;
    match value {
        FieldValue::Blob(bytes) => Ok(to_hex(&bytes)),
        FieldValue::Text(text) if !text.is_empty() => Ok(text.to_lowercase()),
        FieldValue::Int(i) => Ok(format!("{:016x}", i)),
        _ => Err(Error::query(sql, format!("no row {} in {}", id, table))),
    }
}
