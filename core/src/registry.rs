use crate::task::TaskBody;
use dashmap::DashMap;

/// One registry slot. `Missing` is the placeholder left behind when a claimed
/// task turned out to have no body on this instance, so the warning fires
/// once per uid rather than once per revolution
pub(crate) enum RegistryEntry {
    Present(TaskBody),
    Missing,
}

/// The per-instance map from internal uid to task body. Purely local state:
/// other instances keep their own registries and never see this one
pub(crate) struct TaskRegistry {
    entries: DashMap<String, RegistryEntry>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        TaskRegistry {
            entries: DashMap::new(),
        }
    }

    /// Registers (or replaces) the body for a uid, clearing any `Missing`
    /// placeholder in the process
    ///
    /// # Arguments
    /// - **uid** The internal task identifier to register under
    /// - **body** The [`TaskBody`] this instance will run for it
    pub(crate) fn insert(&self, uid: String, body: TaskBody) {
        self.entries.insert(uid, RegistryEntry::Present(body));
    }

    pub(crate) fn remove(&self, uid: &str) {
        self.entries.remove(uid);
    }

    /// The registered body for a uid, if this instance has one. `Missing`
    /// placeholders answer `None` like absent entries do
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the internal task
    /// identifier as ``uid``
    pub(crate) fn body(&self, uid: &str) -> Option<TaskBody> {
        self.entries.get(uid).and_then(|entry| match entry.value() {
            RegistryEntry::Present(body) => Some(body.clone()),
            RegistryEntry::Missing => None,
        })
    }

    /// Marks a uid as known-missing. Answers `true` only on the first
    /// marking, which is the caller's cue to warn
    ///
    /// # Argument(s)
    /// This method accepts one argument, that being the internal task
    /// identifier as ``uid``
    pub(crate) fn mark_missing(&self, uid: &str) -> bool {
        let already_marked = self
            .entries
            .get(uid)
            .map(|entry| matches!(entry.value(), RegistryEntry::Missing))
            .unwrap_or(false);
        if already_marked {
            return false;
        }
        self.entries.insert(uid.to_string(), RegistryEntry::Missing);
        true
    }
}
