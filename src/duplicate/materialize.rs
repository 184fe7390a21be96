//! Writes a snapshot into a target system
//!
//! Nodes are created parent first, depth first. The first failure stops the
//! walk; records created up to that point stay in the target and are listed
//! in the returned error.

use super::snapshot::{AttributeSet, NodeId, RecordSnapshot};
use crate::db::DbTableIds;
use crate::error::{Error, Result};
use crate::mutation::{Fields, RecordMutator};
use crate::session::Session;
use crate::sql::{Condition, Select};
use crate::value::FieldValue;
use log::{debug, info};

pub(crate) async fn materialize(target: &Session, snapshot: &RecordSnapshot) -> Result<DbTableIds> {
    let mut work = snapshot.clone();
    let mut created = DbTableIds::new();
    let mutator = RecordMutator::new(target);

    let root = work.root();
    if let Some(pending) = work.pending_key().cloned() {
        let number = target
            .next_number(&pending.number_object)
            .await
            .map_err(|e| failure(&work, root, &created, e))?;
        info!("Allocated {} {} for the copy", pending.field, number);
        work.apply_overrides(root, &Fields::from([(pending.field, number.into())]));
    }

    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let new_id = create_node(target, &mutator, &mut work, id, &mut created)
            .await
            .map_err(|e| failure(&work, id, &created, e))?;

        let children: Vec<NodeId> = work.node(id).children.iter().map(|edge| edge.node).collect();
        stack.extend(children.into_iter().rev());
        debug!("{} {} created as ID {}", work.node(id).object_type, work.node(id).source_id, new_id);
    }

    info!("Duplication created {} records: {}", created.len(), created);
    Ok(created)
}

fn failure(work: &RecordSnapshot, id: NodeId, created: &DbTableIds, cause: Error) -> Error {
    let node = work.node(id);
    Error::Duplication {
        object_type: node.object_type.clone(),
        source_id: node.source_id.clone(),
        created: created.clone(),
        source: Box::new(cause),
    }
}

/// Inserts one node, its attributes and passes link values to its children.
async fn create_node(
    target: &Session,
    mutator: &RecordMutator<'_>,
    work: &mut RecordSnapshot,
    id: NodeId,
    created: &mut DbTableIds,
) -> Result<i64> {
    let node = work.node(id).clone();
    let new_id = if node.allow_update {
        mutator.insert_or_update(&node.table, &node.fields).await?
    } else {
        mutator.insert(&node.table, &node.fields).await?
    };
    created.add(&node.table, new_id);

    // link fields the copy does not carry (e.g. GUID) exist only after the insert
    let mut missing: Vec<String> = Vec::new();
    for edge in &node.children {
        for link in &edge.links {
            if !node.fields.contains_key(&link.parent) && !missing.contains(&link.parent) {
                missing.push(link.parent.clone());
            }
        }
    }
    if let Some(attributes) = &node.attributes {
        let owner_field = &attributes.layout.owner_field;
        if !missing.contains(owner_field) {
            missing.push(owner_field.clone());
        }
        let generated = read_generated(target, &node.table, new_id, &missing).await?;
        let owner = generated.get(owner_field).cloned().unwrap_or_default();
        write_attributes(mutator, attributes, owner, created).await?;
        apply_links(work, id, &node.fields, &generated);
    } else if !missing.is_empty() {
        let generated = read_generated(target, &node.table, new_id, &missing).await?;
        apply_links(work, id, &node.fields, &generated);
    } else {
        apply_links(work, id, &node.fields, &Fields::new());
    }
    Ok(new_id)
}

async fn read_generated(target: &Session, table: &str, id: i64, fields: &[String]) -> Result<Fields> {
    let columns: Vec<&str> = fields.iter().map(String::as_str).collect();
    let sql = Select::new(table)
        .fields(&columns)
        .filter(Condition::field_eq("ID", id))
        .to_sql();
    target
        .query_single_row(&sql, &[])
        .await?
        .ok_or_else(|| Error::query(sql, format!("created {} record {} not found", table, id)))
}

fn apply_links(work: &mut RecordSnapshot, id: NodeId, fields: &Fields, generated: &Fields) {
    let edges = work.node(id).children.clone();
    for edge in edges {
        let child = work.node_mut(edge.node);
        for link in &edge.links {
            if let Some(value) = fields.get(&link.parent).or_else(|| generated.get(&link.parent)) {
                child.fields.insert(link.child.clone(), value.clone());
            }
        }
    }
}

/// Attribute rows may already exist once the owner is inserted, hence insert-or-update.
async fn write_attributes(
    mutator: &RecordMutator<'_>,
    attributes: &AttributeSet,
    owner: FieldValue,
    created: &mut DbTableIds,
) -> Result<()> {
    let layout = &attributes.layout;
    for (key, value) in &attributes.values {
        let fields = Fields::from([
            (layout.owner_table_field.clone(), attributes.owner_table.as_str().into()),
            (layout.instance_field.clone(), owner.clone()),
            (layout.class_field.clone(), attributes.class.clone()),
            (layout.key_field.clone(), key.as_str().into()),
            (layout.value_field.clone(), value.clone()),
        ]);
        let id = mutator.insert_or_update(&layout.table, &fields).await?;
        created.add(&layout.table, id);
    }
    Ok(())
}
