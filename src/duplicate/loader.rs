//! Reads a business object and its dependents from the source system

use super::descriptor::{BusinessObjectDescriptor, DescriptorRegistry, DynamicAttributes};
use super::fields::CopyableFields;
use super::plan::DuplicationPlan;
use super::snapshot::{AttributeSet, NodeId, RecordSnapshot, SnapshotNode};
use crate::error::{Error, Result};
use crate::mutation::Fields;
use crate::session::Session;
use crate::sql::{Condition, Select};
use crate::value::FieldValue;
use log::debug;

pub(crate) struct Loader<'a> {
    pub session: &'a Session,
    pub registry: &'a DescriptorRegistry,
    pub fields: &'a mut CopyableFields,
    pub plan: &'a DuplicationPlan,
}

fn wrap(descriptor: &BusinessObjectDescriptor, source_id: &str) -> impl FnOnce(Error) -> Error {
    let object_type = descriptor.object_type.clone();
    let source_id = source_id.to_string();
    move |e| match e {
        Error::Duplication { .. } => e,
        other => Error::duplication(&object_type, &source_id, other),
    }
}

fn source_id_of(descriptor: &BusinessObjectDescriptor, row: &Fields) -> String {
    row.get(descriptor.lookup_field())
        .map(|v| v.to_string())
        .unwrap_or_default()
}

impl<'a> Loader<'a> {
    pub async fn load(&mut self, descriptor: &'a BusinessObjectDescriptor, source_id: &str) -> Result<RecordSnapshot> {
        let lookup_value: FieldValue = match descriptor.key_field {
            Some(_) => source_id.into(),
            None => source_id
                .trim()
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|_| Error::Plan(format!("'{}' is not a record ID", source_id)))
                .map_err(wrap(descriptor, source_id))?,
        };
        let condition = Condition::field_eq(descriptor.lookup_field(), lookup_value);
        let select = Select::new(descriptor.table.as_str()).filter(condition);
        let sql = select.to_sql();

        let rows = self.read_rows(&sql).await.map_err(wrap(descriptor, source_id))?;
        let Some(row) = rows.into_iter().next() else {
            return Err(wrap(descriptor, source_id)(Error::query(
                sql,
                format!("no {} record with {} = {}", descriptor.table, descriptor.lookup_field(), source_id),
            )));
        };

        let root = self.node(descriptor, &row).await.map_err(wrap(descriptor, source_id))?;
        let mut snapshot = RecordSnapshot::new(root);
        let mut stack: Vec<(NodeId, &'a BusinessObjectDescriptor, Fields)> = vec![(snapshot.root(), descriptor, row)];

        let registry = self.registry;
        while let Some((parent, parent_descriptor, parent_row)) = stack.pop() {
            let parent_id = source_id_of(parent_descriptor, &parent_row);
            for relation in &parent_descriptor.relations {
                if !self.plan.relations.includes(&relation.name) {
                    debug!("Skipping relation {} of {}", relation.name, parent_descriptor.object_type);
                    continue;
                }
                let child_descriptor = registry
                    .get(&relation.child)
                    .ok_or_else(|| Error::Plan(format!("unknown business object type '{}'", relation.child)))
                    .map_err(wrap(parent_descriptor, &parent_id))?;

                let mut conditions = Vec::with_capacity(relation.links.len());
                for link in &relation.links {
                    match parent_row.get(&link.parent) {
                        Some(value) if !value.is_null() => conditions.push(Condition::field_eq(&link.child, value.clone())),
                        _ => break,
                    }
                }
                if conditions.len() != relation.links.len() {
                    continue;
                }

                let sql = Select::new(child_descriptor.table.as_str())
                    .filter(Condition::and(conditions))
                    .order_by("ID")
                    .to_sql();
                let rows = self.read_rows(&sql).await.map_err(wrap(parent_descriptor, &parent_id))?;
                debug!("{} {} has {} {} records", parent_descriptor.object_type, parent_id, rows.len(), relation.name);

                for row in rows {
                    let child_id = source_id_of(child_descriptor, &row);
                    let node = self.node(child_descriptor, &row).await.map_err(wrap(child_descriptor, &child_id))?;
                    let id = snapshot.add_child(parent, &relation.name, relation.links.clone(), node);
                    stack.push((id, child_descriptor, row));
                }
            }
        }
        Ok(snapshot)
    }

    async fn read_rows(&self, sql: &str) -> Result<Vec<Fields>> {
        Ok(self.session.query(sql, &[]).await?.row_maps())
    }

    async fn node(&mut self, descriptor: &BusinessObjectDescriptor, row: &Fields) -> Result<SnapshotNode> {
        let copyable = self.fields.resolve(self.session, descriptor).await?;
        let fields: Fields = row
            .iter()
            .filter(|(name, _)| copyable.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let attributes = match &descriptor.attributes {
            Some(source) if self.plan.copy_attributes => self.attributes(descriptor, source, row).await?,
            _ => None,
        };

        Ok(SnapshotNode {
            object_type: descriptor.object_type.clone(),
            table: descriptor.table.clone(),
            source_id: source_id_of(descriptor, row),
            fields,
            attributes,
            allow_update: descriptor.allow_update,
            children: Vec::new(),
        })
    }

    /// Non-empty attribute values of the owner's class.
    async fn attributes(
        &self,
        descriptor: &BusinessObjectDescriptor,
        source: &DynamicAttributes,
        row: &Fields,
    ) -> Result<Option<AttributeSet>> {
        let class = match row.get(&source.class_field) {
            Some(class) if !class.is_blank() => class.clone(),
            _ => return Ok(None),
        };
        let owner = row.get(&source.owner_field).cloned().unwrap_or_default();
        if owner.is_blank() {
            return Ok(None);
        }

        let keys_sql = Select::new(source.class_table.as_str())
            .fields(&[source.key_field.as_str()])
            .filter(Condition::field_eq(&source.class_field, class.clone()))
            .filter(Condition::field_eq(&source.owner_table_field, descriptor.table.as_str()))
            .to_sql();
        let keys = self.session.query_single_values(&keys_sql, &[]).await?;
        if keys.is_empty() {
            return Ok(None);
        }

        let values_sql = Select::new(source.table.as_str())
            .fields(&[source.key_field.as_str(), source.value_field.as_str()])
            .filter(Condition::field_eq(&source.owner_table_field, descriptor.table.as_str()))
            .filter(Condition::field_eq(&source.instance_field, owner))
            .filter(Condition::field_eq(&source.class_field, class.clone()))
            .filter(Condition::field_in(&source.key_field, keys))
            .filter(Condition::field_not_empty(&source.value_field))
            .to_sql();

        let mut values = std::collections::BTreeMap::new();
        for value_row in self.session.query(&values_sql, &[]).await?.row_maps() {
            let key = value_row.get(&source.key_field).map(|k| k.to_string()).unwrap_or_default();
            if key.is_empty() || !self.plan.copies_attribute(&key) {
                continue;
            }
            values.insert(key, value_row.get(&source.value_field).cloned().unwrap_or_default());
        }

        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(AttributeSet {
            layout: source.clone(),
            owner_table: descriptor.table.clone(),
            class,
            values,
        }))
    }
}
