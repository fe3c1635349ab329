//! # Hierarchical Dataset
//!
//! A [`Dataset`] holds the caller's records as a forest. Records reference
//! their parent by [`RecordId`]; roots have no parent.
//!
//! ## Storage Order
//!
//! Records are stored in **depth-first order, parent before children**, with
//! siblings kept in input order. A record's position in that order is its
//! canonical position: filtered results are sorted by it, and the incremental
//! maintainer inserts rows at it. The structure is fixed once built; only
//! field values change afterwards ([`Dataset::set_field`]).
//!
//! ## Loading
//!
//! - [`Dataset::from_records`]: records paired with an optional parent id
//! - [`Dataset::from_json_flat`]: JSON array with primary and foreign key columns
//! - [`Dataset::from_json_nested`]: JSON array where children live under a child-data key
//!
//! A record whose parent id does not exist becomes a root. Duplicate ids and
//! parent cycles are rejected with [`FilterError::InvalidDataset`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::error::{FilterError, Result};
use crate::schema::Schema;
use crate::value::FieldValue;

static NULL: FieldValue = FieldValue::Null;

/// Primary key of a record, unique within a dataset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        RecordId(value)
    }
}

/// One row: an id plus named field values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Value of `field`, or `Null` when the record does not have it.
    pub fn get(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&NULL)
    }

    /// Writes `field` and returns the previous value (`Null` if absent).
    pub fn set(&mut self, field: impl Into<String>, value: FieldValue) -> FieldValue {
        self.fields.insert(field.into(), value).unwrap_or_default()
    }

    /// Drops `field`, returning its value if it was present.
    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// Whether `field` is stored on the record, even as an explicit null.
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone)]
struct Node {
    record: Record,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
}

/// A forest of records in canonical depth-first order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    nodes: Vec<Node>,
    roots: Vec<usize>,
    positions: HashMap<RecordId, usize>,
}

impl Dataset {
    /// Builds a dataset from records paired with their parent id.
    ///
    /// Sibling order follows input order.
    pub fn from_records(records: Vec<(Record, Option<RecordId>)>) -> Result<Self> {
        let total = records.len();
        let mut seen: HashSet<RecordId> = HashSet::with_capacity(total);
        for (record, _) in &records {
            if !seen.insert(record.id) {
                return Err(FilterError::InvalidDataset(format!(
                    "duplicate record id {}",
                    record.id
                )));
            }
        }

        // Group by parent; unknown parents are treated as roots
        let mut by_parent: HashMap<Option<RecordId>, Vec<Record>> = HashMap::new();
        for (record, parent) in records {
            let parent = parent.filter(|p| {
                let known = seen.contains(p);
                if !known {
                    debug!(
                        record = %record.id,
                        parent = %p,
                        "parent not found, treating record as root"
                    );
                }
                known
            });
            by_parent.entry(parent).or_default().push(record);
        }

        let mut dataset = Dataset {
            nodes: Vec::with_capacity(total),
            roots: Vec::new(),
            positions: HashMap::with_capacity(total),
        };
        dataset.place_all(&mut by_parent);

        if dataset.nodes.len() != total {
            let mut stranded: Vec<RecordId> = by_parent.values().flatten().map(|r| r.id).collect();
            stranded.sort();
            return Err(FilterError::InvalidDataset(format!(
                "records unreachable from any root (parent cycle): {:?}",
                stranded.iter().map(|id| id.0).collect::<Vec<_>>()
            )));
        }

        debug!(records = total, roots = dataset.roots.len(), "dataset built");
        Ok(dataset)
    }

    /// Lays out every record reachable from a root in depth-first preorder.
    ///
    /// Uses an explicit stack so deep hierarchies cannot exhaust the thread
    /// stack. Children are pushed in reverse to keep sibling order.
    fn place_all(&mut self, by_parent: &mut HashMap<Option<RecordId>, Vec<Record>>) {
        let roots = by_parent.remove(&None).unwrap_or_default();
        let mut stack: Vec<(Record, Option<usize>, usize)> =
            roots.into_iter().rev().map(|r| (r, None, 0)).collect();

        while let Some((record, parent, depth)) = stack.pop() {
            let index = self.nodes.len();
            let id = record.id;
            self.positions.insert(id, index);
            self.nodes.push(Node {
                record,
                parent,
                children: Vec::new(),
                depth,
            });
            match parent {
                Some(parent) => self.nodes[parent].children.push(index),
                None => self.roots.push(index),
            }

            let children = by_parent.remove(&Some(id)).unwrap_or_default();
            stack.extend(
                children
                    .into_iter()
                    .rev()
                    .map(|child| (child, Some(index), depth + 1)),
            );
        }
    }

    /// Loads a flat JSON array where each object names its parent through
    /// `foreign_key`. Only fields declared in `schema` are kept.
    pub fn from_json_flat(
        text: &str,
        schema: &Schema,
        primary_key: &str,
        foreign_key: &str,
    ) -> Result<Self> {
        let json: Value = serde_json::from_str(text)?;
        let rows = as_array(&json, "top level")?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let object = as_object(row)?;
            let record = record_from_object(object, schema, primary_key, None)?;
            let parent = match object.get(foreign_key) {
                None | Some(Value::Null) => None,
                Some(value) => Some(key_from_json(foreign_key, value)?),
            };
            records.push((record, parent));
        }
        Self::from_records(records)
    }

    /// Loads a nested JSON array where each object carries its children in an
    /// array under `child_key`. Only fields declared in `schema` are kept.
    pub fn from_json_nested(
        text: &str,
        schema: &Schema,
        primary_key: &str,
        child_key: &str,
    ) -> Result<Self> {
        let json: Value = serde_json::from_str(text)?;
        let mut records = Vec::new();
        collect_nested(&json, None, schema, primary_key, child_key, &mut records)?;
        Self::from_records(records)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.positions.get(&id).map(|&i| &self.nodes[i].record)
    }

    /// Root records in order.
    pub fn roots(&self) -> impl Iterator<Item = &Record> {
        self.roots.iter().map(|&i| &self.nodes[i].record)
    }

    /// Direct children of `id` in order.
    pub fn children(&self, id: RecordId) -> Result<impl Iterator<Item = &Record>> {
        let index = self.position(id)?;
        Ok(self.nodes[index]
            .children
            .iter()
            .map(|&i| &self.nodes[i].record))
    }

    pub fn parent(&self, id: RecordId) -> Result<Option<&Record>> {
        let index = self.position(id)?;
        Ok(self.nodes[index].parent.map(|p| &self.nodes[p].record))
    }

    /// Ancestor ids of `id`, nearest first.
    pub fn ancestors(&self, id: RecordId) -> Result<Vec<RecordId>> {
        let mut current = self.nodes[self.position(id)?].parent;
        let mut ancestors = Vec::new();
        while let Some(index) = current {
            ancestors.push(self.nodes[index].record.id);
            current = self.nodes[index].parent;
        }
        Ok(ancestors)
    }

    /// Nesting depth; roots are at depth 0.
    pub fn depth(&self, id: RecordId) -> Result<usize> {
        Ok(self.nodes[self.position(id)?].depth)
    }

    /// All records in canonical depth-first order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.nodes.iter().map(|n| &n.record)
    }

    /// Writes a field on record `id`, returning the previous value.
    ///
    /// Structure is never touched. Callers that keep a filtered view must
    /// notify it afterwards (the [`crate::service::FilteringService`] does).
    pub fn set_field(
        &mut self,
        id: RecordId,
        field: &str,
        value: FieldValue,
    ) -> Result<FieldValue> {
        let index = self.position(id)?;
        Ok(self.nodes[index].record.set(field, value))
    }

    /// Drops `field` from record `id`, returning its value if it was present.
    pub fn remove_field(&mut self, id: RecordId, field: &str) -> Result<Option<FieldValue>> {
        let index = self.position(id)?;
        Ok(self.nodes[index].record.remove(field))
    }

    // --- Position-based access for the strategy and maintainer ---

    pub(crate) fn position(&self, id: RecordId) -> Result<usize> {
        self.positions
            .get(&id)
            .copied()
            .ok_or(FilterError::RecordNotFound(id))
    }

    pub(crate) fn record_at(&self, index: usize) -> &Record {
        &self.nodes[index].record
    }

    pub(crate) fn child_positions(&self, index: usize) -> &[usize] {
        &self.nodes[index].children
    }

    pub(crate) fn parent_position(&self, index: usize) -> Option<usize> {
        self.nodes[index].parent
    }

    pub(crate) fn depth_at(&self, index: usize) -> usize {
        self.nodes[index].depth
    }
}

fn as_array<'a>(value: &'a Value, context: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| FilterError::InvalidDataset(format!("expected an array at {}", context)))
}

fn as_object(value: &Value) -> Result<&Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| FilterError::InvalidDataset("expected an object per record".to_string()))
}

fn key_from_json(key: &str, value: &Value) -> Result<RecordId> {
    value.as_u64().map(RecordId).ok_or_else(|| {
        FilterError::InvalidDataset(format!(
            "key '{}' must be a non-negative integer, found {}",
            key, value
        ))
    })
}

fn record_from_object(
    object: &Map<String, Value>,
    schema: &Schema,
    primary_key: &str,
    child_key: Option<&str>,
) -> Result<Record> {
    let id = match object.get(primary_key) {
        Some(value) => key_from_json(primary_key, value)?,
        None => {
            return Err(FilterError::InvalidDataset(format!(
                "record without primary key '{}'",
                primary_key
            )))
        }
    };

    let mut record = Record::new(id);
    for (field, json) in object {
        if Some(field.as_str()) == child_key {
            continue;
        }
        let Some(column) = schema.get(field) else {
            continue;
        };
        let value = FieldValue::from_json(field, json, column.data_type)?;
        record.set(field.clone(), value);
    }
    Ok(record)
}

fn collect_nested(
    json: &Value,
    parent: Option<RecordId>,
    schema: &Schema,
    primary_key: &str,
    child_key: &str,
    out: &mut Vec<(Record, Option<RecordId>)>,
) -> Result<()> {
    for row in as_array(json, child_key)? {
        let object = as_object(row)?;
        let record = record_from_object(object, schema, primary_key, Some(child_key))?;
        let id = record.id;
        out.push((record, parent));
        if let Some(children) = object.get(child_key) {
            if !children.is_null() {
                collect_nested(children, Some(id), schema, primary_key, child_key, out)?;
            }
        }
    }
    Ok(())
}
