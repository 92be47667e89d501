//! # In-Memory Store
//!
//! A versioned object map implementing [`ResourceStore`] with the same
//! optimistic concurrency rules as the API server. Used by the test suites,
//! together with a few hooks to inject failures and to count writes.

use super::{kind_of, name_of, ResourceStore, StoreError, StoreResource};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    kind: String,
    namespace: Option<String>,
    name: String,
}

impl ObjectKey {
    fn new<K: StoreResource>(namespace: Option<&str>, name: &str) -> Self {
        Self {
            kind: kind_of::<K>(),
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

#[derive(Debug)]
struct StoredObject {
    resource_version: u64,
    value: Value,
}

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, StoredObject>,
    last_version: u64,
    writes: BTreeMap<ObjectKey, u32>,
    unavailable_kinds: BTreeMap<String, String>,
    pending_conflicts: BTreeMap<String, u32>,
    pending_status_conflicts: BTreeMap<String, u32>,
    pending_create_conflicts: BTreeMap<String, u32>,
    pending_deletes: BTreeMap<String, u32>,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn check_available(&self, kind: &str) -> Result<(), StoreError> {
        match self.unavailable_kinds.get(kind) {
            Some(message) => Err(StoreError::Unavailable(message.clone())),
            None => Ok(()),
        }
    }

    fn take_injected(counters: &mut BTreeMap<String, u32>, key: &ObjectKey) -> bool {
        match counters.get_mut(&key.kind) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn record_write(&mut self, key: &ObjectKey) {
        *self.writes.entry(key.clone()).or_insert(0) += 1;
    }
}

/// In-memory [`ResourceStore`]
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

/// Parse the `resourceVersion` an object was read at
fn read_version<K: StoreResource>(obj: &K) -> Option<String> {
    obj.meta().resource_version.clone()
}

/// Attach the stored version to a JSON object and decode it
fn decode<K: StoreResource>(stored: &StoredObject) -> Result<K, StoreError> {
    let mut value = stored.value.clone();
    if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
        metadata.insert(
            "resourceVersion".to_string(),
            Value::String(stored.resource_version.to_string()),
        );
    }
    Ok(serde_json::from_value(value)?)
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object without counting it as a write
    pub fn insert<K: StoreResource>(&self, obj: &K) -> Result<(), StoreError> {
        let name = name_of(obj)?;
        let key = ObjectKey::new::<K>(obj.meta().namespace.as_deref(), &name);
        let value = serde_json::to_value(obj)?;
        let mut inner = self.lock();
        let resource_version = inner.next_version();
        inner.objects.insert(
            key,
            StoredObject {
                resource_version,
                value,
            },
        );
        Ok(())
    }

    /// Read an object synchronously, for assertions
    pub fn object<K: StoreResource>(&self, namespace: Option<&str>, name: &str) -> Option<K> {
        let key = ObjectKey::new::<K>(namespace, name);
        let inner = self.lock();
        inner.objects.get(&key).and_then(|o| decode::<K>(o).ok())
    }

    /// Number of stored objects of a kind
    pub fn count<K: StoreResource>(&self) -> usize {
        let kind = kind_of::<K>();
        self.lock()
            .objects
            .keys()
            .filter(|k| k.kind == kind)
            .count()
    }

    /// Number of successful writes (create, replace, status) to one object
    pub fn write_count<K: StoreResource>(&self, namespace: Option<&str>, name: &str) -> u32 {
        let key = ObjectKey::new::<K>(namespace, name);
        self.lock().writes.get(&key).copied().unwrap_or(0)
    }

    /// Make every request for a kind fail with [`StoreError::Unavailable`]
    pub fn set_unavailable<K: StoreResource>(&self, message: &str) {
        self.lock()
            .unavailable_kinds
            .insert(kind_of::<K>(), message.to_string());
    }

    /// Undo [`InMemoryStore::set_unavailable`]
    pub fn set_available<K: StoreResource>(&self) {
        self.lock().unavailable_kinds.remove(&kind_of::<K>());
    }

    /// Reject the next `count` replace calls for a kind with a conflict
    pub fn inject_conflicts<K: StoreResource>(&self, count: u32) {
        self.lock().pending_conflicts.insert(kind_of::<K>(), count);
    }

    /// Reject the next `count` status writes for a kind with a conflict
    pub fn inject_status_conflicts<K: StoreResource>(&self, count: u32) {
        self.lock()
            .pending_status_conflicts
            .insert(kind_of::<K>(), count);
    }

    /// Reject the next `count` creates for a kind as if another writer
    /// created the object first
    pub fn inject_create_conflicts<K: StoreResource>(&self, count: u32) {
        self.lock()
            .pending_create_conflicts
            .insert(kind_of::<K>(), count);
    }

    /// Delete the object targeted by each of the next `count` replace calls
    /// for a kind just before it lands, so the replace fails with
    /// [`StoreError::NotFound`]
    pub fn inject_deletes<K: StoreResource>(&self, count: u32) {
        self.lock().pending_deletes.insert(kind_of::<K>(), count);
    }

    fn write<K: StoreResource>(&self, obj: &K, status_only: bool) -> Result<K, StoreError> {
        let name = name_of(obj)?;
        let key = ObjectKey::new::<K>(obj.meta().namespace.as_deref(), &name);
        let incoming = serde_json::to_value(obj)?;

        let mut inner = self.lock();
        inner.check_available(&key.kind)?;

        let injected = if status_only {
            Inner::take_injected(&mut inner.pending_status_conflicts, &key)
        } else {
            Inner::take_injected(&mut inner.pending_conflicts, &key)
        };
        if injected {
            return Err(StoreError::Conflict {
                kind: key.kind,
                name,
            });
        }
        if !status_only && Inner::take_injected(&mut inner.pending_deletes, &key) {
            inner.objects.remove(&key);
        }

        let Some(stored) = inner.objects.get(&key) else {
            return Err(StoreError::NotFound {
                kind: key.kind,
                name,
            });
        };

        if let Some(version) = read_version(obj) {
            if version != stored.resource_version.to_string() {
                return Err(StoreError::Conflict {
                    kind: key.kind,
                    name,
                });
            }
        }

        let mut value = stored.value.clone();
        if status_only {
            match incoming.get("status") {
                Some(status) => {
                    value["status"] = status.clone();
                }
                None => {
                    if let Some(map) = value.as_object_mut() {
                        map.remove("status");
                    }
                }
            }
        } else {
            let existing_status = value.get("status").cloned();
            value = incoming;
            if let Some(map) = value.as_object_mut() {
                match existing_status {
                    Some(status) => {
                        map.insert("status".to_string(), status);
                    }
                    None => {
                        map.remove("status");
                    }
                }
            }
        }

        let resource_version = inner.next_version();
        let stored = StoredObject {
            resource_version,
            value,
        };
        let result = decode(&stored);
        inner.objects.insert(key.clone(), stored);
        inner.record_write(&key);
        result
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get<K: StoreResource>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<K>, StoreError> {
        let key = ObjectKey::new::<K>(namespace, name);
        let inner = self.lock();
        inner.check_available(&key.kind)?;
        inner.objects.get(&key).map(decode::<K>).transpose()
    }

    async fn create<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        let name = name_of(obj)?;
        let key = ObjectKey::new::<K>(obj.meta().namespace.as_deref(), &name);
        let mut value = serde_json::to_value(obj)?;
        if let Some(metadata) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            metadata.remove("resourceVersion");
        }

        let mut inner = self.lock();
        inner.check_available(&key.kind)?;
        if inner.objects.contains_key(&key)
            || Inner::take_injected(&mut inner.pending_create_conflicts, &key)
        {
            return Err(StoreError::AlreadyExists {
                kind: key.kind,
                name,
            });
        }

        let resource_version = inner.next_version();
        let stored = StoredObject {
            resource_version,
            value,
        };
        let result = decode(&stored);
        inner.objects.insert(key.clone(), stored);
        inner.record_write(&key);
        result
    }

    async fn replace<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        self.write(obj, false)
    }

    async fn replace_status<K: StoreResource>(&self, obj: &K) -> Result<K, StoreError> {
        self.write(obj, true)
    }
}
