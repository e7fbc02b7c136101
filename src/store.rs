use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredParticipant {
    pub id: String,
    #[serde(default)]
    pub joined_times: u32,
    #[serde(default)]
    pub hand_raised: bool,
}

impl StoredParticipant {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            joined_times: 0,
            hand_raised: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingData {
    /// Correlation payload set at meeting creation; never mutated here.
    #[serde(default)]
    pub incident: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    /// Call id, assigned once when the call is first observed.
    pub id: Option<String>,
    pub thread_id: String,
    pub participants: Vec<StoredParticipant>,
    pub active_participants: usize,
    #[serde(default)]
    pub recording: bool,
    #[serde(default)]
    pub data: MeetingData,
}

impl Meeting {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            id: None,
            thread_id: thread_id.into(),
            participants: Vec::new(),
            active_participants: 0,
            recording: false,
            data: MeetingData::default(),
        }
    }
}

/// In-memory meeting store, keyed by thread id with a call-id index.
///
/// Updates go through `update_by_call_id`, which runs the caller's closure
/// while holding the meeting's map entry, so concurrent updates to the same
/// meeting are serialized while distinct meetings proceed in parallel.
#[derive(Clone)]
pub struct MeetingStore {
    inner: Arc<Inner>,
}

struct Inner {
    by_thread: DashMap<String, Meeting>,
    call_index: DashMap<String, String>,
}

impl MeetingStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                by_thread: DashMap::new(),
                call_index: DashMap::new(),
            }),
        }
    }

    pub fn add(&self, meeting: Meeting) {
        if let Some(call_id) = &meeting.id {
            self.inner
                .call_index
                .insert(call_id.clone(), meeting.thread_id.clone());
        }
        self.inner
            .by_thread
            .insert(meeting.thread_id.clone(), meeting);
    }

    pub fn get_by_thread_id(&self, thread_id: &str) -> Option<Meeting> {
        self.inner.by_thread.get(thread_id).map(|m| m.clone())
    }

    pub fn get_by_call_id(&self, call_id: &str) -> Option<Meeting> {
        let thread_id = self.inner.call_index.get(call_id)?.clone();
        self.get_by_thread_id(&thread_id)
    }

    /// First-sighting linking: assign `call_id` to the meeting tracked
    /// under `thread_id`. The id is written at most once; a meeting that
    /// already carries one keeps it. Returns the linked meeting, if any.
    pub fn link_call_id(&self, thread_id: &str, call_id: &str) -> Option<Meeting> {
        let mut entry = self.inner.by_thread.get_mut(thread_id)?;
        if entry.id.is_none() {
            entry.id = Some(call_id.to_string());
        }
        let linked = entry.clone();
        drop(entry);
        if let Some(id) = &linked.id {
            self.inner
                .call_index
                .insert(id.clone(), thread_id.to_string());
        }
        Some(linked)
    }

    /// Atomic read-modify-write for the meeting linked to `call_id`.
    /// Returns the post-update meeting, or None when the call is unknown.
    pub fn update_by_call_id(
        &self,
        call_id: &str,
        f: impl FnOnce(&mut Meeting),
    ) -> Option<Meeting> {
        let thread_id = self.inner.call_index.get(call_id)?.clone();
        let mut entry = self.inner.by_thread.get_mut(&thread_id)?;
        f(&mut entry);
        Some(entry.clone())
    }
}

impl Default for MeetingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_call_id_exactly_once() {
        let store = MeetingStore::new();
        store.add(Meeting::new("thread-a"));

        let linked = store.link_call_id("thread-a", "call-1").unwrap();
        assert_eq!(linked.id.as_deref(), Some("call-1"));

        // A second sighting under a different call id must not relink.
        let relinked = store.link_call_id("thread-a", "call-2").unwrap();
        assert_eq!(relinked.id.as_deref(), Some("call-1"));

        assert!(store.get_by_call_id("call-1").is_some());
        assert!(store.get_by_call_id("call-2").is_none());
    }

    #[test]
    fn resolvable_by_either_key_after_linking() {
        let store = MeetingStore::new();
        store.add(Meeting::new("thread-b"));
        assert!(store.get_by_call_id("call-9").is_none());

        store.link_call_id("thread-b", "call-9");
        let by_call = store.get_by_call_id("call-9").unwrap();
        let by_thread = store.get_by_thread_id("thread-b").unwrap();
        assert_eq!(by_call.thread_id, by_thread.thread_id);
    }

    #[test]
    fn update_by_call_id_mutates_in_place() {
        let store = MeetingStore::new();
        store.add(Meeting::new("thread-c"));
        store.link_call_id("thread-c", "call-3");

        let updated = store
            .update_by_call_id("call-3", |m| {
                m.active_participants = 4;
                m.recording = true;
            })
            .unwrap();
        assert_eq!(updated.active_participants, 4);
        assert!(store.get_by_thread_id("thread-c").unwrap().recording);

        assert!(store.update_by_call_id("no-such-call", |_| {}).is_none());
    }
}
