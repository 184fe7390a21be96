//! Resolution of the copyable fields of a table

use super::descriptor::{BusinessObjectDescriptor, FieldSelection};
use crate::error::Result;
use crate::session::Session;
use crate::sql::normalise_field;
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Fields that identify or audit a record and are never copied.
pub const NO_COPY_FIELDS: [&str; 10] = [
    "ID",
    "ID_A",
    "GUID",
    "MANDANT",
    "TIMESTAMP",
    "TIMESTAMP_A",
    "INSDATE",
    "INSUSER",
    "UPDDATE",
    "UPDUSER",
];

pub fn is_no_copy(field: &str) -> bool {
    let field = normalise_field(field);
    NO_COPY_FIELDS.contains(&field.as_str())
}

/// Copyable field sets, resolved once per table.
#[derive(Debug, Default)]
pub struct CopyableFields {
    cache: HashMap<String, BTreeSet<String>>,
}

impl CopyableFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(&mut self, session: &Session, descriptor: &BusinessObjectDescriptor) -> Result<&BTreeSet<String>> {
        let table = descriptor.table.clone();
        if !self.cache.contains_key(&table) {
            let fields = resolve_uncached(session, descriptor).await?;
            debug!("Copyable fields of {}: {:?}", table, fields);
            self.cache.insert(table.clone(), fields);
        }
        Ok(&self.cache[&table])
    }
}

async fn plain_columns(session: &Session, table: &str) -> Result<BTreeSet<String>> {
    session.database().await?.table_columns(table, Some(false)).await
}

async fn resolve_uncached(session: &Session, descriptor: &BusinessObjectDescriptor) -> Result<BTreeSet<String>> {
    let (fields, exclude) = match &descriptor.fields {
        FieldSelection::Include(fields) => (fields.clone(), false),
        FieldSelection::Exclude(fields) => (fields.clone(), true),
        FieldSelection::FromServer => match session.script_tool().xml_definition(&descriptor.table).await? {
            Some(definition) => {
                let spec = definition.duplicate_spec();
                (spec.fields, spec.exclude)
            }
            None => (BTreeSet::new(), true),
        },
    };

    let selected = if exclude {
        plain_columns(session, &descriptor.table)
            .await?
            .difference(&fields)
            .cloned()
            .collect()
    } else {
        fields
    };
    Ok(selected.into_iter().filter(|f| !is_no_copy(f)).collect())
}
