use log::info;

/// What happened to a set of entities in a successful batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Archived,
    Restored,
    Updated,
    Deleted,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Archived => "archived",
            ChangeAction::Restored => "restored",
            ChangeAction::Updated => "updated",
            ChangeAction::Deleted => "deleted",
        }
    }
}

/// Collaborator notified after each successful batch operation.
/// Fire-and-forget: no return value is consumed.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, entity_kind: &str, action: ChangeAction, uids: &[String]);
}

/// Default notifier; downstream consumers tail the log.
pub struct LogNotifier;

impl ChangeNotifier for LogNotifier {
    fn notify(&self, entity_kind: &str, action: ChangeAction, uids: &[String]) {
        info!("{}: {} {:?}", entity_kind, action.as_str(), uids);
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every event for assertions.
    pub struct RecordingNotifier {
        pub events: Mutex<Vec<(String, ChangeAction, Vec<String>)>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            RecordingNotifier {
                events: Mutex::new(Vec::new()),
            }
        }

        pub fn take(&self) -> Vec<(String, ChangeAction, Vec<String>)> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    impl ChangeNotifier for RecordingNotifier {
        fn notify(&self, entity_kind: &str, action: ChangeAction, uids: &[String]) {
            self.events
                .lock()
                .unwrap()
                .push((entity_kind.to_string(), action, uids.to_vec()));
        }
    }
}
