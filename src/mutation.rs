//! Per-action mutation lifecycle: run one write, invalidate affected cache
//! keys on success, emit exactly one user-facing notification either way.
use crate::cache::{QueryCache, QueryKey};
use crate::error::ApiError;
use crate::notify::{Notification, Notifier};
use std::future::Future;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// Normalized user-facing failure derived from an [`ApiError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("'{0}' is already running")]
    AlreadyRunning(String),
    #[error(transparent)]
    Failed(#[from] ApiError),
}

/// Cache keys a mutation must invalidate after a successful write.
#[derive(Debug, Clone)]
pub enum Affected {
    Key(QueryKey),
    Resource(&'static str),
}

const GENERIC_DETAIL: &str = "The request could not be completed.";

struct State {
    status: MutationStatus,
    last_failure: Option<Failure>,
}

/// One named write action with an `idle → pending → success | error` cycle.
pub struct Mutation {
    name: &'static str,
    state: Mutex<State>,
}

impl Mutation {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State {
                status: MutationStatus::Idle,
                last_failure: None,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> MutationStatus {
        self.state.lock().expect("mutation lock poisoned").status
    }

    pub fn last_failure(&self) -> Option<Failure> {
        self.state
            .lock()
            .expect("mutation lock poisoned")
            .last_failure
            .clone()
    }

    /// Reset a consumed `Success`/`Error` outcome back to `Idle`.
    pub fn acknowledge(&self) {
        let mut state = self.state.lock().expect("mutation lock poisoned");
        if matches!(state.status, MutationStatus::Success | MutationStatus::Error) {
            state.status = MutationStatus::Idle;
            state.last_failure = None;
        }
    }

    /// Run the write. Re-entry while pending is rejected with no side effects.
    /// On success every affected key is invalidated before the success
    /// notification is emitted and before the result is returned, so a
    /// dependent read never observes a stale cached copy afterwards.
    pub async fn run<T, F>(
        &self,
        cache: &QueryCache,
        notifier: &dyn Notifier,
        affected: &[Affected],
        op: F,
    ) -> Result<T, MutationError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        {
            let mut state = self.state.lock().expect("mutation lock poisoned");
            if state.status == MutationStatus::Pending {
                return Err(MutationError::AlreadyRunning(self.name.to_string()));
            }
            state.status = MutationStatus::Pending;
            state.last_failure = None;
        }

        match op.await {
            Ok(value) => {
                for target in affected {
                    match target {
                        Affected::Key(key) => cache.invalidate(key),
                        Affected::Resource(resource) => cache.invalidate_resource(resource),
                    }
                }
                notifier.notify(Notification::info(self.name, None));
                info!(action = self.name, "mutation succeeded");
                let mut state = self.state.lock().expect("mutation lock poisoned");
                state.status = MutationStatus::Success;
                Ok(value)
            }
            Err(err) => {
                let failure = normalize(self.name, &err);
                notifier.notify(Notification::error(
                    failure.title.clone(),
                    Some(failure.detail.clone()),
                ));
                warn!(action = self.name, error = %err, "mutation failed");
                let mut state = self.state.lock().expect("mutation lock poisoned");
                state.status = MutationStatus::Error;
                state.last_failure = Some(failure);
                Err(MutationError::Failed(err))
            }
        }
    }
}

/// Derive the user-facing failure text: the server-provided detail string
/// when present, a generic message otherwise.
fn normalize(action: &str, err: &ApiError) -> Failure {
    Failure {
        title: format!("{action} failed"),
        detail: err
            .detail()
            .map(str::to_string)
            .unwrap_or_else(|| GENERIC_DETAIL.to_string()),
    }
}
