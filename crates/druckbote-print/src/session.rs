// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Control-channel sessions.
//
// A session is a registered local client (the console, an embedding shell).
// The most recently registered session that is still alive is the active one:
// it receives unsolicited events, and its presence is what allows printer and
// interface enumeration.  Dropping a `Session` deregisters it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use druckbote_core::error::{DruckboteError, Result};
use druckbote_core::{JobOutcome, ServerStatus};
use tokio::sync::mpsc;
use tracing::debug;

/// Identifier of a registered session.
pub type SessionId = u64;

/// Notifications pushed to the active session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The network listener started or stopped.
    ServerStateChanged(ServerStatus),
    /// A job finished, successfully or not.
    JobFinished { printer: String, outcome: JobOutcome },
}

#[derive(Default)]
struct Registry {
    next_id: SessionId,
    /// Registration order; the last live entry is active.
    sessions: Vec<(SessionId, mpsc::UnboundedSender<SessionEvent>)>,
}

impl Registry {
    fn prune(&mut self) {
        self.sessions.retain(|(_, tx)| !tx.is_closed());
    }
}

/// Shared registry of live sessions.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<Registry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new session; it becomes the active one.
    pub fn register(&self) -> Session {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.lock();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.sessions.push((id, tx));
        debug!(session = id, "session registered");

        Session {
            id,
            events: rx,
            registry: Arc::clone(&self.inner),
        }
    }

    /// The active session, if any is alive.
    pub fn active(&self) -> Option<SessionId> {
        let mut registry = self.lock();
        registry.prune();
        registry.sessions.last().map(|(id, _)| *id)
    }

    /// The active session, or `NoActivePrinterContext`.
    pub fn require_active(&self) -> Result<SessionId> {
        self.active().ok_or(DruckboteError::NoActivePrinterContext)
    }

    /// Push `event` to the active session.  Returns whether anyone received it.
    pub fn notify(&self, event: SessionEvent) -> bool {
        let mut registry = self.lock();
        registry.prune();
        match registry.sessions.last() {
            Some((id, tx)) => {
                let delivered = tx.send(event).is_ok();
                debug!(session = *id, delivered, "event pushed");
                delivered
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        let mut registry = self.lock();
        registry.prune();
        registry.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered session.  Deregisters on drop.
pub struct Session {
    id: SessionId,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    registry: Arc<Mutex<Registry>>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait for the next event pushed to this session.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Take an already-delivered event without waiting.
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.sessions.retain(|(id, _)| *id != self.id);
        debug!(session = self.id, "session deregistered");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}
