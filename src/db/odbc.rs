//! MS SQL Server access over ODBC
//!
//! odbc-api is blocking, so every statement runs on tokio's blocking pool
//! against a single shared connection.

use super::{Database, QueryResult, log_sql};
use crate::config::DbSettings;
use crate::error::{Error, Result};
use crate::value::FieldValue;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use odbc_api::buffers::TextRowSet;
use odbc_api::parameter::VarCharBox;
use odbc_api::{ConnectionOptions, Cursor, DataType, Environment, IntoParameter, ResultSetMetadata};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex};

static ENVIRONMENT: OnceCell<Environment> = OnceCell::new();

const BATCH_SIZE: usize = 500;
const MAX_TEXT_LEN: usize = 8192;

fn environment() -> Result<&'static Environment> {
    ENVIRONMENT.get_or_try_init(Environment::new).map_err(|e| Error::Connection {
        endpoint: "ODBC".to_string(),
        message: e.to_string(),
    })
}

pub struct OdbcDatabase {
    target: String,
    connection: Arc<Mutex<odbc_api::Connection<'static>>>,
}

#[derive(Clone, Copy)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Date,
    DateTime,
    Text,
}

impl ColumnKind {
    fn of(data_type: DataType) -> Self {
        match data_type {
            DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => ColumnKind::Int,
            DataType::Float { .. } | DataType::Real | DataType::Double => ColumnKind::Float,
            DataType::Decimal { scale, .. } | DataType::Numeric { scale, .. } => {
                if scale == 0 {
                    ColumnKind::Int
                } else {
                    ColumnKind::Float
                }
            }
            DataType::Bit => ColumnKind::Bool,
            DataType::Date => ColumnKind::Date,
            DataType::Timestamp { .. } => ColumnKind::DateTime,
            _ => ColumnKind::Text,
        }
    }

    fn decode(self, text: &str) -> FieldValue {
        let parsed = match self {
            ColumnKind::Int => text.parse().ok().map(FieldValue::Int),
            ColumnKind::Float => text.parse().ok().map(FieldValue::Float),
            ColumnKind::Bool => Some(FieldValue::Bool(text == "1")),
            ColumnKind::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().map(FieldValue::Date),
            ColumnKind::DateTime => NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(FieldValue::DateTime),
            ColumnKind::Text => None,
        };
        parsed.unwrap_or_else(|| FieldValue::Text(text.to_string()))
    }
}

fn to_parameter(value: &FieldValue) -> VarCharBox {
    match value {
        FieldValue::Null => None::<String>.into_parameter(),
        other => Some(other.to_xml_text()).into_parameter(),
    }
}

fn run_query(connection: &odbc_api::Connection<'static>, sql: &str, params: &[FieldValue]) -> std::result::Result<QueryResult, odbc_api::Error> {
    let params: Vec<VarCharBox> = params.iter().map(to_parameter).collect();
    let Some(mut cursor) = connection.execute(sql, &params[..], None)? else {
        return Ok(QueryResult::default());
    };

    let columns: Vec<String> = cursor.column_names()?.collect::<std::result::Result<_, _>>()?;
    let mut kinds = Vec::with_capacity(columns.len());
    for index in 1..=columns.len() {
        kinds.push(ColumnKind::of(cursor.col_data_type(index as u16)?));
    }

    let mut result = QueryResult::new(columns);
    let buffer = TextRowSet::for_cursor(BATCH_SIZE, &mut cursor, Some(MAX_TEXT_LEN))?;
    let mut row_set = cursor.bind_buffer(buffer)?;
    while let Some(batch) = row_set.fetch()? {
        for row in 0..batch.num_rows() {
            let values = kinds
                .iter()
                .enumerate()
                .map(|(col, kind)| match batch.at(col, row) {
                    Some(bytes) => kind.decode(&String::from_utf8_lossy(bytes)),
                    None => FieldValue::Null,
                })
                .collect();
            result.push_row(values);
        }
    }
    Ok(result)
}

impl OdbcDatabase {
    pub async fn connect(settings: &DbSettings) -> Result<Self> {
        let target = settings.describe();
        let connection_string = settings.connection_string();
        let endpoint = target.clone();

        let connection = tokio::task::spawn_blocking(move || {
            let env = environment()?;
            env.connect_with_connection_string(&connection_string, ConnectionOptions::default())
                .map_err(|e| Error::Connection {
                    endpoint,
                    message: e.to_string(),
                })
        })
        .await
        .map_err(|e| Error::Connection {
            endpoint: target.clone(),
            message: e.to_string(),
        })??;

        log::debug!("Connected to {}", target);
        Ok(Self {
            target,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    async fn blocking<T, F>(&self, sql: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&odbc_api::Connection<'static>) -> std::result::Result<T, odbc_api::Error> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        let outcome = tokio::task::spawn_blocking(move || {
            let guard = connection.lock().map_err(|e| e.to_string())?;
            f(&guard).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| Error::query(sql, e))?;
        outcome.map_err(|message| Error::query(sql, message))
    }
}

#[async_trait]
impl Database for OdbcDatabase {
    async fn query(&self, sql: &str, params: &[FieldValue]) -> Result<QueryResult> {
        log_sql(sql, params);
        let owned_sql = sql.to_string();
        let params = params.to_vec();
        self.blocking(sql, move |conn| run_query(conn, &owned_sql, &params)).await
    }

    async fn execute(&self, sql: &str, params: &[FieldValue]) -> Result<u64> {
        log_sql(sql, params);
        let owned_sql = sql.to_string();
        let params = params.to_vec();
        self.blocking(sql, move |conn| {
            let params: Vec<VarCharBox> = params.iter().map(to_parameter).collect();
            let mut prepared = conn.prepare(&owned_sql)?;
            prepared.execute(&params[..])?;
            Ok(prepared.row_count()?.unwrap_or(0) as u64)
        })
        .await
    }

    fn describe(&self) -> String {
        self.target.clone()
    }
}
