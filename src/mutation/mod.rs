//! Record changes through the application server
//!
//! Every change goes through `useXML` so that the server fills audit fields,
//! runs its validation and fires the same triggers as an interactive edit.

pub mod row;

pub use row::{RowCommand, UseXmlRow};

use crate::db;
use crate::error::{Error, RemoteFailure, Result};
use crate::session::Session;
use crate::sql::{Condition, Select, normalise_field};
use crate::value::FieldValue;
use log::{debug, info};
use std::collections::BTreeMap;

/// Field values of a record keyed by upper-case column name.
pub type Fields = BTreeMap<String, FieldValue>;

pub struct RecordMutator<'a> {
    session: &'a Session,
}

impl<'a> RecordMutator<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Sends a row document; a server fault is a rejection of the change.
    pub async fn exec(&self, row: &UseXmlRow) -> Result<Option<String>> {
        let xml = row.to_xml()?;
        debug!("useXML {} {}: {}", row.command(), row.table(), xml);
        self.session.gateway().use_xml(&xml).await.map_err(|e| match e {
            Error::RemoteCall {
                failure: RemoteFailure::Fault(message),
                ..
            } => Error::Validation {
                table: row.table().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Inserts a record and returns its new `ID`.
    pub async fn insert(&self, table: &str, fields: &Fields) -> Result<i64> {
        let mut row = UseXmlRow::new(RowCommand::Insert, table);
        for (name, value) in fields {
            row.set(name, value.clone());
        }
        self.insert_row(&row).await
    }

    pub async fn insert_row(&self, row: &UseXmlRow) -> Result<i64> {
        let answer = self.exec(row).await?;
        let id = answer
            .as_deref()
            .map(str::trim)
            .and_then(|text| text.parse::<i64>().ok())
            .ok_or_else(|| {
                Error::remote(
                    "p2core/XML",
                    "useXML",
                    RemoteFailure::Malformed(format!("insert into {} returned {:?} instead of an ID", row.table(), answer)),
                )
            })?;
        info!("Inserted {} ID {}", row.table(), id);
        Ok(id)
    }

    pub async fn update(&self, table: &str, id: i64, fields: &Fields) -> Result<()> {
        self.update_with_timestamp(table, id, fields, None).await
    }

    /// Update guarded by `timestamp`; loaded from the database when `None`.
    pub async fn update_with_timestamp(&self, table: &str, id: i64, fields: &Fields, timestamp: Option<String>) -> Result<()> {
        let mut row = self.row_for_existing(RowCommand::Update, table, id, timestamp).await?;
        for (name, value) in fields {
            row.set(name, value.clone());
        }
        self.exec(&row).await?;
        info!("Updated {} ID {}", table, id);
        Ok(())
    }

    pub async fn delete(&self, table: &str, id: i64) -> Result<()> {
        self.delete_with_timestamp(table, id, None).await
    }

    pub async fn delete_with_timestamp(&self, table: &str, id: i64, timestamp: Option<String>) -> Result<()> {
        let row = self.row_for_existing(RowCommand::Delete, table, id, timestamp).await?;
        self.exec(&row).await?;
        info!("Deleted {} ID {}", table, id);
        Ok(())
    }

    async fn row_for_existing(&self, command: RowCommand, table: &str, id: i64, timestamp: Option<String>) -> Result<UseXmlRow> {
        let timestamp = match timestamp {
            Some(ts) => ts,
            None => {
                let database = self.session.database().await?;
                db::load_timestamp(database.as_ref(), table, id).await?
            }
        };
        Ok(UseXmlRow::new(command, table).with("id", id).with("timestamp", timestamp))
    }

    /// `ID` of the row matching `fields` on any unique index whose columns are all given.
    pub async fn find_existing(&self, table: &str, fields: &Fields) -> Result<Option<i64>> {
        let database = self.session.database().await?;
        let indexes = database.unique_indexes(table).await?;

        let mut matches = Vec::new();
        for columns in indexes.values() {
            let mut conds = Vec::with_capacity(columns.len());
            for column in columns {
                let value = match fields.get(&normalise_field(column)) {
                    Some(value) => value.clone(),
                    None if column == "MANDANT" => self.session.tenant().await?.into(),
                    None => break,
                };
                conds.push(Condition::field_eq(column, value));
            }
            if conds.len() == columns.len() && !conds.is_empty() {
                matches.push(Condition::and(conds));
            }
        }
        if matches.is_empty() {
            return Ok(None);
        }

        let sql = Select::new(table).fields(&["ID"]).filter(Condition::or(matches));
        let id = self.session.query_single_value(&sql.to_sql(), &[]).await?;
        Ok(id.as_i64())
    }

    /// Updates the row found through the unique indexes, or inserts a new one.
    pub async fn insert_or_update(&self, table: &str, fields: &Fields) -> Result<i64> {
        match self.find_existing(table, fields).await? {
            Some(id) => {
                self.update(table, id, fields).await?;
                Ok(id)
            }
            None => self.insert(table, fields).await,
        }
    }
}
