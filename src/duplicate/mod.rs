//! Copying business objects together with their dependent records
//!
//! A [`Duplicator`] reads an object tree from a source session into a
//! [`RecordSnapshot`], applies the plan's overrides and recreates the tree on
//! a target session through useXML. The snapshot can be saved in between and
//! replayed against another system.

pub mod descriptor;
pub mod fields;
mod loader;
mod materialize;
pub mod plan;
pub mod snapshot;

pub use descriptor::{BusinessObjectDescriptor, DescriptorRegistry, DynamicAttributes, FieldLink, FieldSelection, Relation};
pub use fields::{CopyableFields, NO_COPY_FIELDS};
pub use plan::{DuplicationPlan, RelationFilter};
pub use snapshot::{AttributeSet, ChildEdge, NodeId, PendingKey, RecordSnapshot, SnapshotNode};

use crate::db::DbTableIds;
use crate::error::{Error, Result};
use crate::session::Session;
use loader::Loader;
use log::info;

pub struct Duplicator<'a> {
    source: &'a Session,
    registry: DescriptorRegistry,
    fields: CopyableFields,
}

impl<'a> Duplicator<'a> {
    pub fn new(source: &'a Session) -> Self {
        Self::with_registry(source, DescriptorRegistry::builtin())
    }

    pub fn with_registry(source: &'a Session, registry: DescriptorRegistry) -> Self {
        Self {
            source,
            registry,
            fields: CopyableFields::new(),
        }
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DescriptorRegistry {
        &mut self.registry
    }

    /// Reads `object_type` `source_id` with its dependents and applies the plan.
    pub async fn snapshot(&mut self, object_type: &str, source_id: &str, plan: &DuplicationPlan) -> Result<RecordSnapshot> {
        let descriptor = self.registry.get(object_type).ok_or_else(|| {
            Error::duplication(
                object_type,
                source_id,
                Error::Plan(format!("unknown business object type '{}'", object_type)),
            )
        })?;

        let mut loader = Loader {
            session: self.source,
            registry: &self.registry,
            fields: &mut self.fields,
            plan,
        };
        let mut snapshot = loader.load(descriptor, source_id).await?;

        let root = snapshot.root();
        let copyable = &snapshot.node(root).fields;
        if let Some(field) = plan.overrides.keys().find(|f| !copyable.contains_key(*f)) {
            return Err(Error::duplication(
                object_type,
                source_id,
                Error::Plan(format!("{} is not a copied field of {}", field, descriptor.table)),
            ));
        }
        snapshot.apply_overrides(root, &plan.overrides);

        let pending = match (&descriptor.key_field, &descriptor.number_object) {
            (Some(field), Some(number_object)) if !plan.overrides.contains_key(field) => Some(PendingKey {
                field: field.clone(),
                number_object: number_object.clone(),
            }),
            _ => None,
        };
        snapshot.set_pending_key(pending);

        info!(
            "Loaded {} {} with {} dependent records",
            descriptor.object_type,
            source_id,
            snapshot.len() - 1
        );
        Ok(snapshot)
    }

    /// Creates the snapshot's records in `target`; returns their IDs by table.
    pub async fn materialize(target: &Session, snapshot: &RecordSnapshot) -> Result<DbTableIds> {
        materialize::materialize(target, snapshot).await
    }

    /// Snapshot from the source, written straight into `target`.
    pub async fn duplicate(
        &mut self,
        object_type: &str,
        source_id: &str,
        plan: &DuplicationPlan,
        target: &Session,
    ) -> Result<DbTableIds> {
        let snapshot = self.snapshot(object_type, source_id, plan).await?;
        Self::materialize(target, &snapshot).await
    }
}
