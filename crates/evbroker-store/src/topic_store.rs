use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use evbroker_types::{BrokerError, BrokerResult, ResourceId, Schema, Topic};

use crate::atomic::atomic_write_json;

const TOPIC_FILE: &str = "topic.json";

/// Durable topic configuration store.
///
/// Each topic's config file is guarded by its own lock, held in a lock
/// table keyed by the topic's directory path, so that concurrent publishers
/// to different topics never contend with each other while a single topic's
/// read-modify-write-fsync cycle for sequence allocation stays atomic.
pub struct TopicStore {
    data_dir: PathBuf,
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl TopicStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn topic_dir(&self, tenant: &str, namespace: &str, topic: &str) -> PathBuf {
        self.data_dir.join(tenant).join(namespace).join(topic)
    }

    fn topic_path(&self, tenant: &str, namespace: &str, topic: &str) -> PathBuf {
        self.topic_dir(tenant, namespace, topic).join(TOPIC_FILE)
    }

    fn lock_for(&self, dir: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(dir.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn read_topic(&self, path: &Path) -> BrokerResult<Option<Topic>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)
            .map_err(|e| BrokerError::EventStorageError(format!("failed to read {}: {e}", path.display())))?;
        let topic: Topic = serde_json::from_str(&content)
            .map_err(|e| BrokerError::EventStorageError(format!("failed to parse {}: {e}", path.display())))?;
        Ok(Some(topic))
    }

    pub fn create_topic(
        &self,
        tenant: &str,
        namespace: &str,
        name: &str,
        tenant_resource_id: ResourceId,
        namespace_resource_id: ResourceId,
    ) -> BrokerResult<Topic> {
        let dir = self.topic_dir(tenant, namespace, name);
        let path = dir.join(TOPIC_FILE);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().unwrap();

        if path.exists() {
            return Err(BrokerError::TopicAlreadyExists(name.to_string()));
        }

        fs::create_dir_all(&dir)
            .map_err(|e| BrokerError::EventStorageError(format!("failed to create {}: {e}", dir.display())))?;

        let topic = Topic::new(name, tenant_resource_id, namespace_resource_id);
        atomic_write_json(&path, &topic)
            .map_err(|e| BrokerError::EventStorageError(e.to_string()))?;

        Ok(topic)
    }

    pub fn get_topic(&self, tenant: &str, namespace: &str, name: &str) -> BrokerResult<Topic> {
        let path = self.topic_path(tenant, namespace, name);
        self.read_topic(&path)?
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))
    }

    pub fn topic_exists(&self, tenant: &str, namespace: &str, name: &str) -> bool {
        self.topic_path(tenant, namespace, name).exists()
    }

    pub fn get_all_topics(&self, tenant: &str, namespace: &str) -> BrokerResult<Vec<Topic>> {
        let ns_dir = self.data_dir.join(tenant).join(namespace);
        if !ns_dir.exists() {
            return Ok(Vec::new());
        }

        let mut topics = Vec::new();
        let entries = fs::read_dir(&ns_dir)
            .map_err(|e| BrokerError::EventStorageError(format!("failed to list {}: {e}", ns_dir.display())))?;

        for entry in entries {
            let entry = entry
                .map_err(|e| BrokerError::EventStorageError(format!("failed to read dir entry: {e}")))?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let path = entry.path().join(TOPIC_FILE);
            if let Some(topic) = self.read_topic(&path)? {
                topics.push(topic);
            }
        }

        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    }

    /// Replace `topic`'s schema set with `new_schemas`, additive-only: every
    /// event type already registered must still be present in `new_schemas`
    /// (the set may only grow, never shrink), and `new_schemas` must not
    /// repeat an event type. A schema for an event type that already existed
    /// is replaced wholesale — the set can grow *or* update entries (§3).
    ///
    /// Rejects with `BrokerError::InvalidRequest` before writing anything if
    /// either rule is violated.
    pub fn update_schemas(
        &self,
        tenant: &str,
        namespace: &str,
        name: &str,
        new_schemas: Vec<Schema>,
    ) -> BrokerResult<Topic> {
        let dir = self.topic_dir(tenant, namespace, name);
        let path = dir.join(TOPIC_FILE);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().unwrap();

        let mut topic = self
            .read_topic(&path)?
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;

        let mut incoming: BTreeMap<String, Schema> = BTreeMap::new();
        for schema in new_schemas {
            let event_type = schema.event_type.clone();
            if incoming.insert(event_type.clone(), schema).is_some() {
                return Err(BrokerError::InvalidRequest(format!(
                    "duplicate event type '{event_type}' in schema update"
                )));
            }
        }

        for existing_type in topic.schemas.keys() {
            if !incoming.contains_key(existing_type) {
                return Err(BrokerError::InvalidRequest(format!(
                    "updateSchemas must not remove existing event type '{existing_type}'"
                )));
            }
        }

        topic.schemas = incoming;

        atomic_write_json(&path, &topic).map_err(|e| BrokerError::EventStorageError(e.to_string()))?;
        Ok(topic)
    }

    /// Atomically allocate the next sequence number for `topic` and persist
    /// the bump. Returns the sequence assigned to the new event (1-indexed).
    pub fn get_and_increment_sequence(&self, tenant: &str, namespace: &str, name: &str) -> BrokerResult<u64> {
        let dir = self.topic_dir(tenant, namespace, name);
        let path = dir.join(TOPIC_FILE);
        let lock = self.lock_for(&dir);
        let _guard = lock.lock().unwrap();

        let mut topic = self
            .read_topic(&path)?
            .ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))?;

        topic.sequence += 1;
        let assigned = topic.sequence;

        atomic_write_json(&path, &topic).map_err(|e| BrokerError::EventStorageError(e.to_string()))?;
        Ok(assigned)
    }
}
