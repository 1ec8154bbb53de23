//! Per-user update dispatcher
//!
//! Every user gets a mailbox drained by one task, so updates from the same
//! user run strictly one after another in arrival order while different users
//! proceed in parallel. A job covers the whole read, handle, write cycle for
//! one update. A mailbox left idle retires itself, so the table only holds
//! users with recent traffic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use teloxide::types::UserId;
use tokio::sync::{mpsc, oneshot};

use super::bot::{parse_command, Command};
use crate::core::config;
use super::format;
use super::handlers::{handle_command, CommandContext, CommandOutcome, HandlerDeps, InboundUpdate};

/// How the dispatcher finished one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a command, unknown command, or no sender
    Ignored,
    /// Handler ran; `saved` tells whether the session was written back
    Completed {
        command: Command,
        outcome: CommandOutcome,
        saved: bool,
    },
    /// Session could not be loaded, handler not run
    StoreUnavailable(Command),
    /// Handler ran but the changed session could not be written
    NotSaved { command: Command, outcome: CommandOutcome },
    /// Handler panicked
    Panicked(Command),
    /// Dispatcher shut down before the update was processed
    Dropped,
}

struct Job {
    update: InboundUpdate,
    command: Command,
    done: oneshot::Sender<DispatchOutcome>,
}

/// Map entry for one user's queue. `id` tells a retiring task whether the
/// entry is still its own.
struct Mailbox {
    id: u64,
    sender: mpsc::UnboundedSender<Job>,
}

struct Inner {
    deps: HandlerDeps,
    mailboxes: DashMap<UserId, Mailbox>,
    next_mailbox_id: AtomicU64,
    idle_timeout: Duration,
}

/// Routes updates into per-user mailboxes. Cheap to clone.
#[derive(Clone)]
pub struct UpdateDispatcher {
    inner: Arc<Inner>,
}

impl UpdateDispatcher {
    pub fn new(deps: HandlerDeps) -> Self {
        Self::with_idle_timeout(deps, config::dispatcher::mailbox_idle())
    }

    /// Like [`UpdateDispatcher::new`] with a custom idle timeout for mailboxes.
    pub fn with_idle_timeout(deps: HandlerDeps, idle_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                deps,
                mailboxes: DashMap::new(),
                next_mailbox_id: AtomicU64::new(0),
                idle_timeout,
            }),
        }
    }

    pub fn deps(&self) -> &HandlerDeps {
        &self.inner.deps
    }

    /// Number of users that currently own a mailbox.
    pub fn mailbox_count(&self) -> usize {
        self.inner.mailboxes.len()
    }

    /// Queues an update and returns a receiver for its outcome.
    ///
    /// Queueing is synchronous: two calls for the same user are processed in
    /// call order, whether or not the caller awaits the receiver. Must be
    /// called from within a Tokio runtime.
    pub fn submit(&self, update: InboundUpdate) -> oneshot::Receiver<DispatchOutcome> {
        let (done, receiver) = oneshot::channel();

        let Some(user_id) = update.user_id else {
            tracing::debug!(update_id = update.update_id, "Update without sender ignored");
            let _ = done.send(DispatchOutcome::Ignored);
            return receiver;
        };

        let Some(command) = update.text.as_deref().and_then(parse_command) else {
            tracing::trace!(update_id = update.update_id, user_id = user_id.0, "No command in update");
            let _ = done.send(DispatchOutcome::Ignored);
            return receiver;
        };

        tracing::debug!(update_id = update.update_id, user_id = user_id.0, ?command, "Queueing update");
        self.enqueue(user_id, Job { update, command, done });
        receiver
    }

    /// Queues an update and waits until it has been fully processed.
    pub async fn dispatch(&self, update: InboundUpdate) -> DispatchOutcome {
        self.submit(update).await.unwrap_or(DispatchOutcome::Dropped)
    }

    /// Sends while holding the map entry, so a retiring mailbox can never
    /// miss a job queued behind its back.
    fn enqueue(&self, user_id: UserId, job: Job) {
        let mut mailbox = self
            .inner
            .mailboxes
            .entry(user_id)
            .or_insert_with(|| spawn_mailbox(&self.inner, user_id));

        let Err(mpsc::error::SendError(job)) = mailbox.sender.send(job) else {
            return;
        };

        // The mailbox task is gone (only during runtime shutdown); start a fresh one.
        tracing::warn!(user_id = user_id.0, "Mailbox closed, restarting");
        *mailbox = spawn_mailbox(&self.inner, user_id);
        if let Err(mpsc::error::SendError(job)) = mailbox.sender.send(job) {
            let _ = job.done.send(DispatchOutcome::Dropped);
        }
    }
}

fn spawn_mailbox(inner: &Arc<Inner>, user_id: UserId) -> Mailbox {
    let id = inner.next_mailbox_id.fetch_add(1, Ordering::Relaxed);
    let (sender, receiver) = mpsc::unbounded_channel();
    tokio::spawn(run_mailbox(
        Arc::downgrade(inner),
        inner.deps.clone(),
        user_id,
        id,
        inner.idle_timeout,
        receiver,
    ));
    Mailbox { id, sender }
}

async fn run_mailbox(
    inner: Weak<Inner>,
    deps: HandlerDeps,
    user_id: UserId,
    id: u64,
    idle_timeout: Duration,
    mut receiver: mpsc::UnboundedReceiver<Job>,
) {
    tracing::debug!(user_id = user_id.0, "Mailbox started");

    loop {
        let Job { update, command, done } = match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(job)) => job,
            Ok(None) => break,
            Err(_) => {
                if retire(&inner, user_id, id, &receiver) {
                    tracing::debug!(user_id = user_id.0, "Mailbox idle, retired");
                    return;
                }
                continue;
            }
        };

        let chat_id = update.chat_id;
        let update_id = update.update_id;

        // Own task per job so a panic stays inside this update.
        let task = tokio::spawn(process(deps.clone(), update, user_id, command));
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_panic() {
                    tracing::error!(update_id, user_id = user_id.0, ?command, "Handler panicked: {}", e);
                } else {
                    tracing::warn!(update_id, user_id = user_id.0, ?command, "Handler task cancelled: {}", e);
                }
                deps.reply_text(chat_id, format::INTERNAL_ERROR).await;
                DispatchOutcome::Panicked(command)
            }
        };

        tracing::debug!(update_id, user_id = user_id.0, ?outcome, "Update processed");
        let _ = done.send(outcome);
    }

    tracing::debug!(user_id = user_id.0, "Mailbox closed");
}

/// Removes this mailbox from the table if nothing is queued. Returns whether
/// the task should stop: removed, replaced, or the dispatcher is gone.
fn retire(inner: &Weak<Inner>, user_id: UserId, id: u64, receiver: &mpsc::UnboundedReceiver<Job>) -> bool {
    let Some(inner) = inner.upgrade() else {
        return receiver.is_empty();
    };

    // Runs under the entry lock that `enqueue` sends under.
    if inner
        .mailboxes
        .remove_if(&user_id, |_, mailbox| mailbox.id == id && receiver.is_empty())
        .is_some()
    {
        return true;
    }

    !inner.mailboxes.get(&user_id).is_some_and(|mailbox| mailbox.id == id)
}

/// Read session, run handler, write back if changed.
async fn process(deps: HandlerDeps, update: InboundUpdate, user_id: UserId, command: Command) -> DispatchOutcome {
    let key = user_id.0.to_string();

    let original = match deps.store.read(&key).await {
        Ok(session) => session.unwrap_or_default(),
        Err(e) => {
            tracing::error!(user_id = %key, error = %e, "Failed to load session");
            deps.reply_text(update.chat_id, format::SESSION_UNAVAILABLE).await;
            return DispatchOutcome::StoreUnavailable(command);
        }
    };

    let mut session = original.clone();
    let ctx = CommandContext {
        deps: &deps,
        user_id,
        chat_id: update.chat_id,
        now: Utc::now(),
    };
    let outcome = handle_command(&ctx, command, &mut session).await;

    if session == original {
        return DispatchOutcome::Completed {
            command,
            outcome,
            saved: false,
        };
    }

    match deps.store.write(&key, &session).await {
        Ok(()) => DispatchOutcome::Completed {
            command,
            outcome,
            saved: true,
        },
        Err(e) => {
            // The upstream side effect already happened and cannot be undone.
            tracing::error!(user_id = %key, error = %e, "Failed to save session");
            deps.reply_text(update.chat_id, format::SAVE_FAILED).await;
            DispatchOutcome::NotSaved { command, outcome }
        }
    }
}
