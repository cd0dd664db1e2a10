// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat record form of a subtree, and cloning.
//!
//! ## Records
//!
//! [`Tree::flatten`] writes one [`NodeRecord`] per node in pre-order, starting
//! at a node and continuing through the siblings that follow it. Descendant
//! records name their parent by [`Uid`], which is all [`Tree::rebuild`] needs
//! to restore the structure: a parent always precedes its children, and
//! children of one group appear in sibling order. The starting node and its
//! following siblings are top-level records without a parent.
//!
//! Records are plain serde data; the persistence format is up to the caller.
//!
//! ```
//! use understory_node_tree::{LeafData, Tree};
//!
//! let mut tree = Tree::new();
//! let root = tree.create_group("root");
//! let part = tree.create_leaf("part", LeafData::default());
//! tree.add(root, &[part]).unwrap();
//!
//! let records = tree.flatten(root).unwrap();
//! assert_eq!(records.len(), 2);
//! assert_eq!(records[1].parent_id.as_ref(), tree.uid(root));
//!
//! let mut copy = Tree::new();
//! let rebuilt = copy.rebuild(&records);
//! assert!(rebuilt.warnings.is_empty());
//! assert_eq!(copy.name(rebuilt.root.unwrap()), Some("root"));
//! ```

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use kurbo::Affine;
use log::{trace, warn};
use serde::{Deserialize, Serialize};

use crate::Tree;
use crate::error::{DeserializeWarning, TreeError};
use crate::notify::Property;
use crate::types::{LeafData, NodeFlags, NodeId, NodeKind, Uid};
use crate::value::Value;

const CREATED_TIME: &str = "createdTime";

/// Node variant tag of a record.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    /// [`NodeKind::Group`].
    Group,
    /// [`NodeKind::Leaf`].
    Leaf,
}

/// One node in flat, serializable form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Persistent id of the node.
    pub id: Uid,
    /// Persistent id of the parent group; absent for top-level records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uid>,
    /// Node variant.
    pub type_tag: TypeTag,
    /// Serializable properties keyed by name (`name`, `visible`, `createdTime`,
    /// and for leaves `transform` and `materialId`).
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

/// Result of [`Tree::rebuild`].
#[derive(Clone, Debug, PartialEq)]
pub struct Rebuilt {
    /// Node built from the first record, if any.
    pub root: Option<NodeId>,
    /// Anomalies that were skipped over.
    pub warnings: Vec<DeserializeWarning>,
}

impl Tree {
    /// The record of a single node, without a parent reference.
    pub fn record(&self, id: NodeId) -> Result<NodeRecord, TreeError> {
        let node = self.live(id)?;
        let mut properties = BTreeMap::new();
        properties.insert(
            String::from(Property::Name.key()),
            Value::from(node.name.clone()),
        );
        properties.insert(
            String::from(Property::Visible.key()),
            Value::Bool(node.flags.contains(NodeFlags::VISIBLE)),
        );
        properties.insert(String::from(CREATED_TIME), Value::UInt(node.created_time));
        let type_tag = match &node.kind {
            NodeKind::Group => TypeTag::Group,
            NodeKind::Leaf(leaf) => {
                properties.insert(
                    String::from(Property::Transform.key()),
                    Value::from(leaf.transform),
                );
                properties.insert(
                    String::from(Property::MaterialId.key()),
                    Value::from(leaf.material_id.clone()),
                );
                TypeTag::Leaf
            }
        };
        Ok(NodeRecord {
            id: node.uid.clone(),
            parent_id: None,
            type_tag,
            properties,
        })
    }

    /// Records for `root`, its descendants, and every sibling after `root`
    /// with their descendants, in pre-order.
    ///
    /// The records of `root` and of each following sibling are top-level and
    /// carry no parent.
    pub fn flatten(&self, root: NodeId) -> Result<Vec<NodeRecord>, TreeError> {
        self.live(root)?;
        let mut out = Vec::new();
        let mut top = Some(root);
        while let Some(id) = top {
            self.flatten_subtree(id, &mut out)?;
            top = self.node(id).next;
        }
        Ok(out)
    }

    /// Push records for `top` and its descendants; `top` gets no parent.
    fn flatten_subtree(&self, top: NodeId, out: &mut Vec<NodeRecord>) -> Result<(), TreeError> {
        for id in self.pre_order(top) {
            let mut record = self.record(id)?;
            if id != top {
                record.parent_id = self
                    .node(id)
                    .parent
                    .map(|p| self.node(p).uid.clone());
            }
            out.push(record);
        }
        Ok(())
    }

    /// Build nodes from records produced by [`Tree::flatten`].
    ///
    /// Each record becomes one node, in order. Top-level records become
    /// detached roots. A record whose parent has been built earlier in the same
    /// batch is appended to it; otherwise the node is left detached and a
    /// warning is reported. Records whose id already exists in this tree are
    /// skipped.
    pub fn rebuild(&mut self, records: &[NodeRecord]) -> Rebuilt {
        let mut warnings = Vec::new();
        let mut built: BTreeMap<&Uid, NodeId> = BTreeMap::new();
        let mut root = None;
        for (index, record) in records.iter().enumerate() {
            if self.get(&record.id).is_some() || built.contains_key(&record.id) {
                report(
                    &mut warnings,
                    DeserializeWarning::DuplicateUid {
                        index,
                        id: record.id.clone(),
                    },
                );
                continue;
            }
            // Resolved before this record is registered, so a record can
            // never name itself as parent.
            let parent = record
                .parent_id
                .as_ref()
                .map(|p| (p, built.get(p).copied()));
            let id = self.build(index, record, &mut warnings);
            if index == 0 {
                root = Some(id);
            }
            built.insert(&record.id, id);

            let Some((parent, found)) = parent else {
                continue;
            };
            match found {
                Some(p) if self.is_group(p) => self.attach_fresh(p, id),
                Some(_) => report(
                    &mut warnings,
                    DeserializeWarning::ParentNotGroup {
                        index,
                        id: record.id.clone(),
                        parent: parent.clone(),
                    },
                ),
                None => report(
                    &mut warnings,
                    DeserializeWarning::MissingParent {
                        index,
                        id: record.id.clone(),
                        parent: parent.clone(),
                    },
                ),
            }
        }
        trace!(
            "rebuilt {} records with {} warnings",
            records.len(),
            warnings.len()
        );
        Rebuilt { root, warnings }
    }

    /// Copy a node's own state next to it.
    ///
    /// The copy gets a fresh id, the configured copy suffix on its name, and a
    /// new creation time. It is inserted right after the original in the same
    /// group, or left detached when the original is a root. Children are not copied.
    pub fn clone_node(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let record = self.copy_record(self.record(id)?, true);
        let copy = self.build(0, &record, &mut Vec::new());
        self.place_copy(id, copy)?;
        Ok(copy)
    }

    /// Copy a node and all of its descendants next to it.
    ///
    /// Like [`Tree::clone_node`], but every descendant is copied too, with a
    /// fresh id and its name unchanged.
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        let mut records = Vec::new();
        self.flatten_subtree(id, &mut records)?;
        let top = self.clone_node(id)?;
        let mut copies: BTreeMap<&Uid, NodeId> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            if index == 0 {
                copies.insert(&record.id, top);
                continue;
            }
            let fresh = self.copy_record(record.clone(), false);
            let copy = self.build(index, &fresh, &mut Vec::new());
            copies.insert(&record.id, copy);
            if let Some(parent) = record.parent_id.as_ref().and_then(|p| copies.get(p)).copied() {
                self.attach_fresh(parent, copy);
            }
        }
        Ok(top)
    }

    fn copy_record(&self, mut record: NodeRecord, rename: bool) -> NodeRecord {
        record.id = self.fresh_uid();
        record.parent_id = None;
        record.properties.remove(CREATED_TIME);
        if rename {
            let key = Property::Name.key();
            let name = record
                .properties
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default();
            let renamed = alloc::format!("{name}{}", self.config.copy_suffix);
            record.properties.insert(String::from(key), Value::String(renamed));
        }
        record
    }

    fn place_copy(&mut self, original: NodeId, copy: NodeId) -> Result<(), TreeError> {
        match self.parent(original) {
            Some(parent) => self.insert_after(parent, Some(original), copy),
            None => Ok(()),
        }
    }

    /// Instantiate a detached node from a record whose id is known to be free.
    fn build(
        &mut self,
        index: usize,
        record: &NodeRecord,
        warnings: &mut Vec<DeserializeWarning>,
    ) -> NodeId {
        let name = property(index, record, Property::Name.key(), Value::as_str, warnings)
            .map(String::from)
            .unwrap_or_default();
        let kind = match record.type_tag {
            TypeTag::Group => NodeKind::Group,
            TypeTag::Leaf => NodeKind::Leaf(LeafData {
                transform: property(
                    index,
                    record,
                    Property::Transform.key(),
                    Value::as_transform,
                    warnings,
                )
                .unwrap_or(Affine::IDENTITY),
                material_id: property(
                    index,
                    record,
                    Property::MaterialId.key(),
                    Value::as_str,
                    warnings,
                )
                .map(String::from)
                .unwrap_or_default(),
            }),
        };
        let visible = property(index, record, Property::Visible.key(), Value::as_bool, warnings)
            .unwrap_or(true);
        let created_time = property(index, record, CREATED_TIME, Value::as_u64, warnings);

        let id = self.alloc(record.id.clone(), name, kind);
        let node = self.node_mut(id);
        node.flags.set(NodeFlags::VISIBLE, visible);
        if let Some(time) = created_time {
            node.created_time = time;
        }
        id
    }
}

/// Read an optional property, reporting a value of the wrong type.
fn property<'r, T>(
    index: usize,
    record: &'r NodeRecord,
    key: &'static str,
    read: impl Fn(&'r Value) -> Option<T>,
    warnings: &mut Vec<DeserializeWarning>,
) -> Option<T> {
    let value = record.properties.get(key)?;
    let parsed = read(value);
    if parsed.is_none() {
        report(
            warnings,
            DeserializeWarning::InvalidProperty {
                index,
                id: record.id.clone(),
                key,
            },
        );
    }
    parsed
}

fn report(warnings: &mut Vec<DeserializeWarning>, warning: DeserializeWarning) {
    warn!("{warning}");
    warnings.push(warning);
}
