// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory collaborators backed by tokio channels and plain vectors.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::engine::{InputMessage, OutputMessage};
use crate::errors::CollaboratorResult;
use crate::traits::{Input, Output};

/// Source fed through a bounded channel.
///
/// `consume` never blocks: an empty channel reports "nothing yet" and the
/// pipeline backs off. Committed sequence numbers are kept in commit order.
#[derive(Debug)]
pub struct ChannelInput<M> {
    receiver: tokio::sync::Mutex<mpsc::Receiver<M>>,
    committed: Mutex<Vec<u64>>,
    commits: Notify,
    closed: AtomicBool,
}

impl<M> ChannelInput<M> {
    /// Create the input and the sender that feeds it.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<M>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let input = Self {
            receiver: tokio::sync::Mutex::new(receiver),
            committed: Mutex::new(Vec::new()),
            commits: Notify::new(),
            closed: AtomicBool::new(false),
        };
        (input, sender)
    }

    /// Sequence numbers committed so far, in commit order.
    pub fn committed(&self) -> Vec<u64> {
        self.lock_committed().clone()
    }

    /// Wait until at least `count` records have been committed.
    pub async fn wait_for_commits(&self, count: usize) {
        loop {
            let notified = self.commits.notified();
            tokio::pin!(notified);
            // Register before checking so a commit in between still wakes us.
            notified.as_mut().enable();
            if self.lock_committed().len() >= count {
                return;
            }
            notified.await;
        }
    }

    fn lock_committed(&self) -> std::sync::MutexGuard<'_, Vec<u64>> {
        self.committed.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<M> Input<M> for ChannelInput<M>
where
    M: Send + Sync + 'static,
{
    async fn consume(&self, _ctx: &CancellationToken) -> CollaboratorResult<Option<M>> {
        match self.receiver.lock().await.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => Ok(None),
        }
    }

    async fn commit_progress(&self, _ctx: &CancellationToken, message: &InputMessage<M>) -> CollaboratorResult<()> {
        self.lock_committed().push(message.sequence());
        self.commits.notify_waiters();
        Ok(())
    }

    async fn close(&self, _ctx: &CancellationToken) -> CollaboratorResult<()> {
        self.receiver.lock().await.close();
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// Output that keeps every message it is sent.
#[derive(Debug)]
pub struct CollectingOutput<P> {
    messages: Mutex<Vec<OutputMessage<P>>>,
    closed: AtomicBool,
}

impl<P> CollectingOutput<P> {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.lock_messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn lock_messages(&self) -> std::sync::MutexGuard<'_, Vec<OutputMessage<P>>> {
        self.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<P: Clone> CollectingOutput<P> {
    /// Messages in delivery order, which need not match arrival order.
    pub fn messages(&self) -> Vec<OutputMessage<P>> {
        self.lock_messages().clone()
    }
}

impl<P> Default for CollectingOutput<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P> Output<P> for CollectingOutput<P>
where
    P: Clone + Send + Sync + 'static,
{
    async fn send(&self, _ctx: &CancellationToken, message: &OutputMessage<P>) -> CollaboratorResult<()> {
        self.lock_messages().push(message.clone());
        Ok(())
    }

    async fn close(&self, _ctx: &CancellationToken) -> CollaboratorResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
