use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use evbroker_types::{BrokerError, BrokerResult, Event, EventId};

use crate::atomic::atomic_write_json;

/// Number of sequence numbers grouped into one directory level, keeping any
/// single directory from accumulating an unbounded number of entries.
const GROUP_SIZE: u64 = 1000;

/// Durable, append-only storage for individual events.
///
/// Events live at
/// `<data_dir>/<tenant>/<namespace>/<topic>/<YYYY-MM-DD>/<GGGG>/<topic>-<sequence>.json`,
/// grouped by the UTC day and by a zero-padded `sequence / 1000` bucket.
pub struct EventStore {
    data_dir: PathBuf,
}

impl EventStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn topic_dir(&self, tenant: &str, namespace: &str, topic: &str) -> PathBuf {
        self.data_dir.join(tenant).join(namespace).join(topic)
    }

    fn group_dir(&self, tenant: &str, namespace: &str, topic: &str, day: &str, sequence: u64) -> PathBuf {
        let group = sequence / GROUP_SIZE;
        self.topic_dir(tenant, namespace, topic)
            .join(day)
            .join(format!("{group:04}"))
    }

    fn event_path(&self, tenant: &str, namespace: &str, topic: &str, event: &Event) -> PathBuf {
        let day = event.timestamp.format("%Y-%m-%d").to_string();
        self.group_dir(tenant, namespace, topic, &day, event.sequence)
            .join(format!("{topic}-{}.json", event.sequence))
    }

    pub fn store_event(&self, tenant: &str, namespace: &str, topic: &str, event: &Event) -> BrokerResult<()> {
        let path = self.event_path(tenant, namespace, topic, event);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| BrokerError::EventStorageError(format!("failed to create {}: {e}", dir.display())))?;
        }
        atomic_write_json(&path, event).map_err(|e| BrokerError::EventStorageError(e.to_string()))
    }

    pub fn store_events(&self, tenant: &str, namespace: &str, topic: &str, events: &[Event]) -> BrokerResult<()> {
        for event in events {
            self.store_event(tenant, namespace, topic, event)?;
        }
        Ok(())
    }

    /// Locate a single event by sequence. The day directory is unknown ahead
    /// of time, so day directories are scanned newest-first.
    pub fn get_event(&self, tenant: &str, namespace: &str, topic: &str, sequence: u64) -> BrokerResult<Option<Event>> {
        for day in self.day_dirs_newest_first(tenant, namespace, topic)? {
            let path = self
                .group_dir(tenant, namespace, topic, &day, sequence)
                .join(format!("{topic}-{sequence}.json"));
            if path.exists() {
                return self.read_event(&path).map(Some);
            }
        }
        Ok(None)
    }

    /// Return every event with sequence in `(after, ..]`, in ascending
    /// sequence order. `after = None` returns from the beginning.
    pub fn get_events(
        &self,
        tenant: &str,
        namespace: &str,
        topic: &str,
        after: Option<u64>,
        limit: usize,
    ) -> BrokerResult<Vec<Event>> {
        let floor = after.unwrap_or(0);
        let mut events = Vec::new();

        for day in self.day_dirs_oldest_first(tenant, namespace, topic)? {
            let day_dir = self.topic_dir(tenant, namespace, topic).join(&day);
            let mut groups = Self::numeric_subdirs(&day_dir)?;
            Self::sort_groups_numerically(&mut groups);
            for group in groups {
                let group_dir = day_dir.join(&group);
                for file in Self::event_files(&group_dir)? {
                    let sequence = match Self::sequence_from_filename(topic, &file) {
                        Some(s) => s,
                        None => continue,
                    };
                    if sequence <= floor {
                        continue;
                    }
                    let event = self.read_event(&group_dir.join(&file))?;
                    events.push(event);
                    if events.len() >= limit {
                        events.sort_by_key(|e| e.sequence);
                        return Ok(events);
                    }
                }
            }
        }

        events.sort_by_key(|e| e.sequence);
        Ok(events)
    }

    pub fn get_latest_event_id(&self, tenant: &str, namespace: &str, topic: &str) -> BrokerResult<Option<EventId>> {
        for day in self.day_dirs_newest_first(tenant, namespace, topic)? {
            let day_dir = self.topic_dir(tenant, namespace, topic).join(&day);
            let mut groups = Self::numeric_subdirs(&day_dir)?;
            Self::sort_groups_numerically(&mut groups);
            for group in groups.into_iter().rev() {
                let group_dir = day_dir.join(&group);
                let mut max_sequence = None;
                for file in Self::event_files(&group_dir)? {
                    if let Some(sequence) = Self::sequence_from_filename(topic, &file) {
                        max_sequence = Some(max_sequence.map_or(sequence, |m: u64| m.max(sequence)));
                    }
                }
                if let Some(sequence) = max_sequence {
                    return Ok(Some(EventId::canonical(topic, sequence)));
                }
            }
        }
        Ok(None)
    }

    fn read_event(&self, path: &PathBuf) -> BrokerResult<Event> {
        let content = fs::read_to_string(path)
            .map_err(|e| BrokerError::EventStorageError(format!("failed to read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| BrokerError::EventStorageError(format!("failed to parse {}: {e}", path.display())))
    }

    fn day_dirs_oldest_first(&self, tenant: &str, namespace: &str, topic: &str) -> BrokerResult<Vec<String>> {
        let mut days = Self::date_named_subdirs(&self.topic_dir(tenant, namespace, topic))?;
        days.sort();
        Ok(days)
    }

    fn day_dirs_newest_first(&self, tenant: &str, namespace: &str, topic: &str) -> BrokerResult<Vec<String>> {
        let mut days = self.day_dirs_oldest_first(tenant, namespace, topic)?;
        days.reverse();
        Ok(days)
    }

    fn date_named_subdirs(dir: &PathBuf) -> BrokerResult<Vec<String>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)
            .map_err(|e| BrokerError::EventStorageError(format!("failed to list {}: {e}", dir.display())))?
        {
            let entry = entry.map_err(|e| BrokerError::EventStorageError(e.to_string()))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn numeric_subdirs(dir: &PathBuf) -> BrokerResult<Vec<String>> {
        Self::date_named_subdirs(dir)
    }

    /// Sort `GGGG` group directory names by their numeric value, not
    /// lexically: `read_dir` order is unspecified, and a zero-padded-to-4
    /// name is only guaranteed to sort correctly against same-width names
    /// (a topic with more than 9999 groups would otherwise put `10000`
    /// before `9999`).
    fn sort_groups_numerically(groups: &mut [String]) {
        groups.sort_by_key(|g| g.parse::<u64>().unwrap_or(u64::MAX));
    }

    fn event_files(dir: &PathBuf) -> BrokerResult<Vec<String>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)
            .map_err(|e| BrokerError::EventStorageError(format!("failed to list {}: {e}", dir.display())))?
        {
            let entry = entry.map_err(|e| BrokerError::EventStorageError(e.to_string()))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    if name.ends_with(".json") {
                        names.push(name.to_string());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn sequence_from_filename(topic: &str, filename: &str) -> Option<u64> {
        let stem = filename.strip_suffix(".json")?;
        let seq_str = stem.strip_prefix(topic)?.strip_prefix('-')?;
        seq_str.parse().ok()
    }
}

/// Single timestamp shared by an entire publish batch, so a batch spanning a
/// midnight boundary (wall-clock) still lands all its events in the same
/// day directory.
pub fn batch_timestamp() -> DateTime<Utc> {
    Utc::now()
}
