//! In-memory gateway.
//!
//! Documents are held as JSON so field paths behave as they would against a
//! real document store. Failure injection makes it usable for sync tests.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, trace};

use kizuna_core::{OwnerId, UserDocument};

use super::traits::*;
use crate::error::GatewayError;

struct StoredDocument {
    body: Value,
    /// Operation keys already applied, with their append counts
    applied: HashMap<String, usize>,
}

/// Gateway backed by a concurrent map.
pub struct MemoryGateway {
    id: String,
    documents: DashMap<OwnerId, StoredDocument>,
    offline: AtomicBool,
    fail_next_writes: AtomicU32,
    /// Absolute write number that fails once, 0 for none
    fail_at_write: AtomicU32,
    read_count: AtomicU32,
    write_count: AtomicU32,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self {
            id: "memory".to_string(),
            documents: DashMap::new(),
            offline: AtomicBool::new(false),
            fail_next_writes: AtomicU32::new(0),
            fail_at_write: AtomicU32::new(0),
            read_count: AtomicU32::new(0),
            write_count: AtomicU32::new(0),
        }
    }

    /// Toggle offline mode. Every call fails while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `n` calls to `update_fields`.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_next_writes.store(n, Ordering::SeqCst);
    }

    /// Fail the `k`-th `update_fields` call from now (1-based) and no other.
    pub fn fail_write_number(&self, k: u32) {
        let target = self.write_count.load(Ordering::SeqCst) + k;
        self.fail_at_write.store(target, Ordering::SeqCst);
    }

    /// Number of `get_document` calls.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Number of `update_fields` calls, failed ones included.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Seed a document, replacing any existing one.
    pub fn insert_document(&self, owner: &OwnerId, document: &UserDocument) -> Result<(), GatewayError> {
        let body = serde_json::to_value(document)?;
        self.documents.insert(
            owner.clone(),
            StoredDocument {
                body,
                applied: HashMap::new(),
            },
        );
        Ok(())
    }

    /// Current document without touching the counters.
    pub fn document(&self, owner: &OwnerId) -> Option<UserDocument> {
        self.documents
            .get(owner)
            .and_then(|stored| serde_json::from_value(stored.body.clone()).ok())
    }

    pub fn raw_document(&self, owner: &OwnerId) -> Option<Value> {
        self.documents.get(owner).map(|stored| stored.body.clone())
    }

    /// Number of distinct operation keys applied for `owner`.
    pub fn applied_operations(&self, owner: &OwnerId) -> usize {
        self.documents.get(owner).map_or(0, |stored| stored.applied.len())
    }

    fn check_online(&self) -> Result<(), GatewayError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("Memory gateway is offline".to_string()));
        }
        Ok(())
    }

    fn check_injected_write_failure(&self, write_number: u32) -> Result<(), GatewayError> {
        let pending = self.fail_next_writes.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_next_writes.store(pending - 1, Ordering::SeqCst);
            return Err(GatewayError::Unavailable("Injected write failure".to_string()));
        }
        if self.fail_at_write.load(Ordering::SeqCst) == write_number {
            self.fail_at_write.store(0, Ordering::SeqCst);
            return Err(GatewayError::Unavailable(format!("Injected failure on write {write_number}")));
        }
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk to the parent object of the last path segment, creating objects on
/// the way.
fn parent_of<'a>(root: &'a mut Value, path: &str) -> Result<(&'a mut Map<String, Value>, String), GatewayError> {
    let mut segments: Vec<&str> = path.split('.').collect();
    let last = match segments.pop() {
        Some(last) if !last.is_empty() => last.to_string(),
        _ => return Err(GatewayError::InvalidPath(path.to_string())),
    };

    let mut node = root;
    for segment in segments {
        let object = node
            .as_object_mut()
            .ok_or_else(|| GatewayError::InvalidPath(path.to_string()))?;
        node = object
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let parent = node
        .as_object_mut()
        .ok_or_else(|| GatewayError::InvalidPath(path.to_string()))?;
    Ok((parent, last))
}

fn array_at<'a>(parent: &'a mut Map<String, Value>, field: String, path: &str) -> Result<&'a mut Vec<Value>, GatewayError> {
    let slot = parent.entry(field).or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    slot.as_array_mut().ok_or_else(|| GatewayError::TypeMismatch {
        path: path.to_string(),
        expected: "an array",
    })
}

/// Apply one write. Returns whether an `AppendIfAbsent` added an element.
fn apply_write(root: &mut Value, path: &str, op: &FieldOp) -> Result<bool, GatewayError> {
    let (parent, field) = parent_of(root, path)?;
    match op {
        FieldOp::Set { value } => {
            parent.insert(field, value.clone());
            Ok(false)
        }
        FieldOp::Increment { delta, max } => {
            let current = match parent.get(&field) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| GatewayError::TypeMismatch {
                    path: path.to_string(),
                    expected: "an integer",
                })?,
            };
            let mut next = current.saturating_add(*delta);
            if let Some(max) = max {
                next = next.min(*max);
            }
            parent.insert(field, Value::from(next));
            Ok(false)
        }
        FieldOp::ArrayUnion { values } => {
            let array = array_at(parent, field, path)?;
            for value in values {
                if !array.contains(value) {
                    array.push(value.clone());
                }
            }
            Ok(false)
        }
        FieldOp::AppendIfAbsent { key, value } => {
            let needle = value.get(key).cloned().ok_or_else(|| GatewayError::TypeMismatch {
                path: path.to_string(),
                expected: "an object carrying the dedup key",
            })?;
            let array = array_at(parent, field, path)?;
            if array.iter().any(|existing| existing.get(key) == Some(&needle)) {
                return Ok(false);
            }
            array.push(value.clone());
            Ok(true)
        }
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    fn id(&self) -> &str {
        &self.id
    }

    async fn get_document(&self, owner: &OwnerId) -> Result<Option<UserDocument>, GatewayError> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        match self.documents.get(owner) {
            Some(stored) => Ok(Some(serde_json::from_value(stored.body.clone())?)),
            None => Ok(None),
        }
    }

    async fn create_document(&self, owner: &OwnerId, document: &UserDocument) -> Result<bool, GatewayError> {
        self.check_online()?;
        let body = serde_json::to_value(document)?;
        let created = match self.documents.entry(owner.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(StoredDocument {
                    body,
                    applied: HashMap::new(),
                });
                true
            }
        };
        debug!(owner = %owner, created, "Create document");
        Ok(created)
    }

    async fn update_fields(&self, owner: &OwnerId, update: FieldUpdate) -> Result<WriteOutcome, GatewayError> {
        let write_number = self.write_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.check_online()?;
        self.check_injected_write_failure(write_number)?;

        let mut stored = self
            .documents
            .get_mut(owner)
            .ok_or_else(|| GatewayError::NotFound(owner.to_string()))?;

        if let Some(key) = &update.operation {
            if let Some(appended) = stored.applied.get(key) {
                trace!(owner = %owner, operation = %key, "Operation already applied");
                return Ok(WriteOutcome::Replayed { appended: *appended });
            }
        }

        // All-or-nothing: work on a copy and swap it in.
        let mut body = stored.body.clone();
        let mut appended = 0;
        for (path, op) in &update.writes {
            if apply_write(&mut body, path, op)? {
                appended += 1;
            }
        }
        stored.body = body;
        if let Some(key) = update.operation {
            stored.applied.insert(key, appended);
        }

        Ok(WriteOutcome::Applied { appended })
    }
}
