//! User-visible, transient notifications.
//!
//! Every failure that reaches the orchestrator boundary ends up here instead
//! of escaping as an error, along with the "step N/2" progress messages.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How long a notification stays visible unless dismissed earlier.
pub const DEFAULT_AUTO_DISMISS: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Progress or success.
    Info,
    /// A failure scoped to the current submission.
    Destructive,
}

/// A message shown to the user for a short time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
    /// `None` keeps the notification until the next submission.
    #[serde(with = "auto_dismiss_ms")]
    pub auto_dismiss: Option<Duration>,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: title.into(),
            description: description.into(),
            auto_dismiss: None,
        }
    }

    /// A failure notification that dismisses itself after five seconds.
    pub fn failure(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Destructive,
            title: title.into(),
            description: description.into(),
            auto_dismiss: Some(DEFAULT_AUTO_DISMISS),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.kind == NotificationKind::Destructive
    }
}

mod auto_dismiss_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
