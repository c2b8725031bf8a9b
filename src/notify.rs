//! User-facing notifications emitted by mutations.
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: title.into(),
            description,
        }
    }

    pub fn error(title: impl Into<String>, description: Option<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            description,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Routes notifications through the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, n: Notification) {
        match n.kind {
            NotificationKind::Info => {
                info!(title = %n.title, description = n.description.as_deref(), "notification")
            }
            NotificationKind::Error => {
                warn!(title = %n.title, description = n.description.as_deref(), "notification")
            }
        }
    }
}

/// Prints notifications for the terminal views.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermNotifier;

impl Notifier for TermNotifier {
    fn notify(&self, n: Notification) {
        match (n.kind, n.description) {
            (NotificationKind::Info, Some(desc)) => println!("{}: {desc}", n.title),
            (NotificationKind::Info, None) => println!("{}", n.title),
            (NotificationKind::Error, Some(desc)) => eprintln!("error: {}: {desc}", n.title),
            (NotificationKind::Error, None) => eprintln!("error: {}", n.title),
        }
    }
}
