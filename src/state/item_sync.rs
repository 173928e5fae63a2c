use crate::api::{ApiClient, ApiError, UpdateItemRequest};
use crate::util::{clear_timeout, set_timeout_once};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// A remote change to one persisted menu item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Update(UpdateItemRequest),
    Delete,
}

#[derive(Debug, Default)]
struct ItemLane {
    in_flight: bool,
    deleted: bool,
    pending: VecDeque<Mutation>,
}

/// Per-item serial queues of remote mutations.
///
/// - at most one request per item is in flight
/// - queued updates coalesce (later values win)
/// - a delete drops queued updates; anything enqueued after it is discarded
#[derive(Debug, Default)]
pub struct MutationQueue {
    lanes: HashMap<i64, ItemLane>,
}

impl MutationQueue {
    /// Returns false when the mutation was discarded.
    pub fn enqueue(&mut self, id: i64, mutation: Mutation) -> bool {
        let lane = self.lanes.entry(id).or_default();
        if lane.deleted {
            return false;
        }

        match mutation {
            Mutation::Delete => {
                lane.pending.retain(|m| !matches!(m, Mutation::Update(_)));
                lane.pending.push_back(Mutation::Delete);
                lane.deleted = true;
            }
            Mutation::Update(req) => {
                if req.is_empty() {
                    return false;
                }
                match lane.pending.back_mut() {
                    Some(Mutation::Update(last)) => last.merge(req),
                    _ => lane.pending.push_back(Mutation::Update(req)),
                }
            }
        }
        true
    }

    /// Drops everything queued for `id` without a request of its own.
    /// Used for descendants removed along with a deleted parent.
    pub fn discard(&mut self, id: i64) {
        let lane = self.lanes.entry(id).or_default();
        lane.pending.clear();
        lane.deleted = true;
    }

    /// Takes the next mutation for `id` unless one is already in flight.
    pub fn start_next(&mut self, id: i64) -> Option<Mutation> {
        let lane = self.lanes.get_mut(&id)?;
        if lane.in_flight {
            return None;
        }
        let next = lane.pending.pop_front()?;
        lane.in_flight = true;
        Some(next)
    }

    /// Marks the in-flight request for `id` as finished (success or failure).
    pub fn settle(&mut self, id: i64) {
        let Some(lane) = self.lanes.get_mut(&id) else {
            return;
        };
        lane.in_flight = false;
        // Deleted lanes stay so late updates keep being discarded.
        if lane.pending.is_empty() && !lane.deleted {
            self.lanes.remove(&id);
        }
    }

    #[cfg(test)]
    pub fn is_in_flight(&self, id: i64) -> bool {
        self.lanes.get(&id).map(|l| l.in_flight).unwrap_or(false)
    }

    #[cfg(test)]
    pub fn pending_len(&self, id: i64) -> usize {
        self.lanes.get(&id).map(|l| l.pending.len()).unwrap_or(0)
    }
}

/// Sends remote-mode edits to the backend, one item lane at a time.
///
/// Text edits are debounced per item before they enter the queue.
#[derive(Clone)]
pub(crate) struct ItemSyncController {
    api: ApiClient,
    queue: Arc<Mutex<MutationQueue>>,

    /// Requests currently in flight (drives the "Saving…" indicator).
    in_flight: RwSignal<usize>,
    on_error: Callback<ApiError>,

    debounce_ms: i32,
    staged: Arc<Mutex<HashMap<i64, (UpdateItemRequest, i32)>>>,
}

impl ItemSyncController {
    pub fn new(api: ApiClient, on_error: Callback<ApiError>) -> Self {
        Self {
            api,
            queue: Arc::new(Mutex::new(MutationQueue::default())),
            in_flight: RwSignal::new(0),
            on_error,
            debounce_ms: 400,
            staged: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.get() > 0
    }

    pub fn submit(&self, id: i64, mutation: Mutation) {
        if mutation == Mutation::Delete {
            self.drop_staged(id);
        }

        let accepted = match self.queue.lock() {
            Ok(mut q) => q.enqueue(id, mutation),
            Err(_) => false,
        };
        if !accepted {
            tracing::debug!(item = id, "mutation discarded");
            return;
        }
        self.pump(id);
    }

    /// Cancels staged and queued work for an item whose row went away with its parent.
    pub fn discard(&self, id: i64) {
        self.drop_staged(id);
        if let Ok(mut q) = self.queue.lock() {
            q.discard(id);
        }
        tracing::debug!(item = id, "pending mutations discarded");
    }

    /// Debounced update; successive calls for the same item merge.
    pub fn submit_debounced(&self, id: i64, req: UpdateItemRequest) {
        let Ok(mut staged) = self.staged.lock() else {
            return;
        };

        let merged = match staged.remove(&id) {
            Some((mut prev, timer)) => {
                clear_timeout(timer);
                prev.merge(req);
                prev
            }
            None => req,
        };

        let s2 = self.clone();
        let timer = set_timeout_once(self.debounce_ms, move || s2.flush_staged(id));
        match timer {
            Some(timer) => {
                staged.insert(id, (merged, timer));
            }
            None => {
                drop(staged);
                self.submit(id, Mutation::Update(merged));
            }
        }
    }

    fn flush_staged(&self, id: i64) {
        let req = match self.staged.lock() {
            Ok(mut staged) => staged.remove(&id).map(|(req, _)| req),
            Err(_) => None,
        };
        if let Some(req) = req {
            self.submit(id, Mutation::Update(req));
        }
    }

    fn drop_staged(&self, id: i64) {
        if let Ok(mut staged) = self.staged.lock() {
            if let Some((_, timer)) = staged.remove(&id) {
                clear_timeout(timer);
            }
        }
    }

    fn pump(&self, id: i64) {
        let next = match self.queue.lock() {
            Ok(mut q) => q.start_next(id),
            Err(_) => None,
        };
        let Some(mutation) = next else {
            return;
        };

        self.in_flight.update(|n| *n += 1);
        let s2 = self.clone();
        spawn_local(async move {
            let result = match &mutation {
                Mutation::Update(req) => s2.api.update_item(req).await,
                Mutation::Delete => s2.api.delete_item(id).await,
            };

            match result {
                Ok(()) => tracing::debug!(item = id, ?mutation, "item saved"),
                Err(e) => {
                    tracing::error!(item = id, error = %e, "item sync failed");
                    s2.on_error.run(e);
                }
            }

            if let Ok(mut q) = s2.queue.lock() {
                q.settle(id);
            }
            s2.in_flight.update(|n| *n = n.saturating_sub(1));
            s2.pump(id);
        });
    }
}
