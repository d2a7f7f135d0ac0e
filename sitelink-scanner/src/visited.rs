use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    /// URL -> number of times it was sighted.
    seen: HashMap<String, usize>,
    outstanding: usize,
}

/// Visited URLs and outstanding traversal tasks behind one lock.
///
/// The lock is only taken for the check-mark-increment sequence and is never
/// held across an `.await`.
#[derive(Debug, Default)]
pub struct VisitedSet {
    state: Mutex<State>,
    idle: Notify,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `url` as seen without dispatching anything for it.
    pub fn seed(&self, url: &str) {
        let mut state = self.lock();
        *state.seen.entry(url.to_string()).or_insert(0) += 1;
    }

    /// Atomically marks `url` and reports whether this was its first sighting.
    ///
    /// When `dispatch` is set and the URL is new, the outstanding-task counter
    /// is bumped inside the same critical section, so the caller owns exactly
    /// one pending [`VisitedSet::task_finished`].
    pub fn claim(&self, url: &str, dispatch: bool) -> bool {
        let mut state = self.lock();
        let sightings = state.seen.entry(url.to_string()).or_insert(0);
        *sightings += 1;
        let first = *sightings == 1;
        if first && dispatch {
            state.outstanding += 1;
        }
        first
    }

    /// Registers a task that was not produced by [`VisitedSet::claim`] (the root).
    pub fn task_started(&self) {
        self.lock().outstanding += 1;
    }

    pub fn task_finished(&self) {
        let mut state = self.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.idle.notify_waiters();
        }
    }

    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Resolves once no task is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a notify between the check
            // and the await is not lost.
            notified.as_mut().enable();

            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Total sightings beyond the first, across all URLs.
    pub fn duplicate_sightings(&self) -> usize {
        self.lock().seen.values().map(|n| n.saturating_sub(1)).sum()
    }

    /// Sorted copy of every URL seen so far.
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.lock().seen.keys().cloned().collect()
    }
}

/// Calls [`VisitedSet::task_finished`] when dropped, including on panic.
pub(crate) struct TaskGuard<'a> {
    visited: &'a VisitedSet,
}

impl<'a> TaskGuard<'a> {
    pub(crate) fn new(visited: &'a VisitedSet) -> Self {
        Self { visited }
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.visited.task_finished();
    }
}
