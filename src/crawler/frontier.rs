//! Work queue shared by the crawl workers
//!
//! The frontier also decides when a crawl is over. A worker that finds the
//! queue empty cannot conclude anything on its own, because a page still being
//! rendered elsewhere may yet push new entries. The crawl is drained only once
//! the queue is empty *and* no leased entry is outstanding.
//!
//! Every popped entry is handed out as a [`Lease`]; dropping the lease marks
//! the entry finished. Workers push discovered links while still holding the
//! lease, so the frontier cannot look drained between a page's completion and
//! the arrival of its children.

use crate::url::VisitedKey;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use url::Url;

/// A URL admitted to the crawl, waiting to be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Absolute URL to render
    pub url: Url,
    /// Normalized identity, already admitted to the visited set
    pub key: VisitedKey,
    /// Hops from the nearest starter URL
    pub depth: u32,
}

/// Outcome of a non-blocking [`Frontier::pop`]
#[derive(Debug)]
pub enum Pop<'a> {
    /// Work to do
    Entry(Lease<'a>),
    /// Nothing queued, but in-flight work may still add entries
    Empty,
    /// Nothing queued and nothing in flight, or the frontier was closed
    Drained,
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<FrontierEntry>,
    in_flight: usize,
    closed: bool,
}

impl State {
    fn is_drained(&self) -> bool {
        self.closed || (self.queue.is_empty() && self.in_flight == 0)
    }
}

/// FIFO frontier with in-flight accounting
#[derive(Debug, Default)]
pub struct Frontier {
    state: Mutex<State>,
    notify: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry
    ///
    /// Returns false, dropping the entry, once the frontier has been closed.
    pub fn push(&self, entry: FrontierEntry) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.queue.push_back(entry);
        }
        self.notify.notify_one();
        true
    }

    /// Takes the oldest entry without waiting
    pub fn pop(&self) -> Pop<'_> {
        let mut state = self.lock();
        if state.closed {
            return Pop::Drained;
        }
        match state.queue.pop_front() {
            Some(entry) => {
                state.in_flight += 1;
                Pop::Entry(Lease {
                    frontier: self,
                    entry,
                })
            }
            None if state.in_flight == 0 => Pop::Drained,
            None => Pop::Empty,
        }
    }

    /// Waits for the next entry
    ///
    /// Returns `None` once the frontier is drained or closed; every waiting
    /// worker observes that together.
    pub async fn next(&self) -> Option<Lease<'_>> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Registered before checking so a push or completion racing with
            // the check still wakes us.
            notified.as_mut().enable();

            match self.pop() {
                Pop::Entry(lease) => return Some(lease),
                Pop::Drained => {
                    self.notify.notify_waiters();
                    return None;
                }
                Pop::Empty => notified.await,
            }
        }
    }

    /// Stops the crawl: pending entries are discarded, later pushes rejected
    ///
    /// Entries already leased finish normally.
    pub fn close(&self) {
        let discarded = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.queue).len()
        };
        if discarded > 0 {
            tracing::debug!("Discarded {} queued URLs", discarded);
        }
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// True when no entry is queued or leased
    pub fn is_drained(&self) -> bool {
        self.lock().is_drained()
    }

    fn complete(&self) {
        let drained = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.is_drained()
        };
        if drained {
            self.notify.notify_waiters();
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An entry checked out of the frontier
///
/// The entry counts as in flight until the lease is dropped.
#[derive(Debug)]
pub struct Lease<'a> {
    frontier: &'a Frontier,
    entry: FrontierEntry,
}

impl Lease<'_> {
    pub fn entry(&self) -> &FrontierEntry {
        &self.entry
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.frontier.complete();
    }
}
