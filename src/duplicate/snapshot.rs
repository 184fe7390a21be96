//! Loaded object trees, kept as an arena of nodes
//!
//! The snapshot is what gets written to the target system. It can be saved
//! as JSON and replayed later, possibly against another system.

use super::descriptor::{DynamicAttributes, FieldLink};
use crate::error::{Error, Result};
use crate::mutation::Fields;
use crate::value::FieldValue;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEdge {
    pub relation: String,
    pub node: NodeId,
    pub links: Vec<FieldLink>,
}

/// Dynamic attribute values of one node, keyed by attribute key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSet {
    pub layout: DynamicAttributes,
    pub owner_table: String,
    pub class: FieldValue,
    pub values: BTreeMap<String, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub object_type: String,
    pub table: String,
    /// Key (or ID) of the record the node was read from.
    pub source_id: String,
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeSet>,
    #[serde(default)]
    pub allow_update: bool,
    #[serde(default)]
    pub children: Vec<ChildEdge>,
}

/// Key the target system still has to allocate for the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingKey {
    pub field: String,
    pub number_object: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    pub version: u32,
    nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pending_key: Option<PendingKey>,
}

impl RecordSnapshot {
    pub fn new(root: SnapshotNode) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            nodes: vec![root],
            pending_key: None,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &SnapshotNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SnapshotNode {
        &mut self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[SnapshotNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_child(&mut self, parent: NodeId, relation: &str, links: Vec<FieldLink>, node: SnapshotNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(ChildEdge {
            relation: relation.to_string(),
            node: id,
            links,
        });
        id
    }

    /// Nodes reached through `relation` from anywhere in the tree.
    pub fn nodes_of_relation(&self, relation: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .flat_map(|n| n.children.iter())
            .filter(|edge| edge.relation == relation)
            .map(|edge| edge.node)
            .collect()
    }

    pub fn pending_key(&self) -> Option<&PendingKey> {
        self.pending_key.as_ref()
    }

    pub fn set_pending_key(&mut self, pending: Option<PendingKey>) {
        self.pending_key = pending;
    }

    /// Sets fields on `start` and carries them down every link whose parent
    /// field was changed.
    pub fn apply_overrides(&mut self, start: NodeId, overrides: &Fields) {
        let mut stack = vec![(start, overrides.clone())];
        while let Some((id, changes)) = stack.pop() {
            for (field, value) in &changes {
                self.nodes[id.0].fields.insert(field.clone(), value.clone());
            }
            for edge in &self.nodes[id.0].children {
                let child_changes: Fields = edge
                    .links
                    .iter()
                    .filter_map(|link| changes.get(&link.parent).map(|v| (link.child.clone(), v.clone())))
                    .collect();
                if !child_changes.is_empty() {
                    stack.push((edge.node, child_changes));
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: RecordSnapshot = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        snapshot.check_edges()?;
        Ok(snapshot)
    }

    fn check_edges(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Snapshot("snapshot has no root node".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            for edge in &node.children {
                if edge.node.0 <= index || edge.node.0 >= self.nodes.len() {
                    return Err(Error::Snapshot(format!(
                        "node {} has an invalid child reference {}",
                        index, edge.node.0
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)
            .map_err(|e| Error::Snapshot(format!("failed to write {:?}: {}", path, e)))?;
        info!("Snapshot with {} records written to {:?}", self.len(), path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Snapshot(format!("failed to read {:?}: {}", path, e)))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(object_type: &str, table: &str, fields: &[(&str, FieldValue)]) -> SnapshotNode {
        SnapshotNode {
            object_type: object_type.to_string(),
            table: table.to_string(),
            source_id: "A100".to_string(),
            fields: fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            attributes: None,
            allow_update: false,
            children: Vec::new(),
        }
    }

    fn article_tree() -> RecordSnapshot {
        let mut snapshot = RecordSnapshot::new(node("Artikel", "ARTIKEL", &[("ARTIKEL", "A100".into()), ("NAME", "Widget".into())]));
        let stueli = snapshot.add_child(
            snapshot.root(),
            "stueli",
            vec![FieldLink::new("ARTIKEL", "STUELI")],
            node("Stueli", "STUELI", &[("STUELI", "A100".into())]),
        );
        for pos in 1..=2 {
            snapshot.add_child(
                stueli,
                "stuelipos",
                vec![FieldLink::new("STUELI", "STUELI")],
                node("StueliPos", "STUELIPOS", &[("STUELI", "A100".into()), ("POSITION", FieldValue::Int(pos))]),
            );
        }
        snapshot
    }

    #[test]
    fn overrides_follow_links() {
        let mut snapshot = article_tree();
        let overrides = Fields::from([("ARTIKEL".to_string(), FieldValue::from("A200"))]);
        snapshot.apply_overrides(snapshot.root(), &overrides);

        for id in snapshot.nodes_of_relation("stuelipos") {
            assert_eq!(snapshot.node(id).fields["STUELI"], FieldValue::from("A200"));
        }
        assert_eq!(snapshot.node(NodeId(1)).fields["STUELI"], FieldValue::from("A200"));
        assert_eq!(snapshot.node(snapshot.root()).fields["NAME"], FieldValue::from("Widget"));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut snapshot = article_tree();
        snapshot.version = 99;
        let json = serde_json::to_string(&snapshot).unwrap();

        let err = RecordSnapshot::from_json(&json).unwrap_err();
        assert!(matches!(err, Error::Snapshot(msg) if msg.contains("version 99")));
    }

    #[test]
    fn dangling_child_reference_is_rejected() {
        let mut snapshot = article_tree();
        snapshot.node_mut(NodeId(1)).children[0].node = NodeId(42);
        let json = snapshot.to_json().unwrap();

        assert!(RecordSnapshot::from_json(&json).is_err());
    }
}
