//! # Buffer Pools
//!
//! This module provides the bounded, frame-slot based scheduler that moves
//! chunk work off the main thread. One generic [`BufferPool`] serves every
//! pipeline stage; a [`PoolStrategy`] supplies what differs between stages.
//!
//! ## Architecture Overview
//!
//! - `BufferPool`: Fixed array of frame slots plus a queue of pending requests
//! - `FrameSlot`: One reusable worker and the chunk it currently serves
//! - `PoolStrategy`: Spawns workers, builds the `initialize` message and
//!   classifies responses
//!
//! ## Slot Lifecycle
//!
//! ```text
//! Free ──▶ Sending ──▶ Busy ──▶ Free
//!              │                 ▲
//!              └── send failed ──┘
//! ```
//!
//! 1. Requests are queued with `BufferPool::add()`, keyed by chunk; re-adding a
//!    chunk replaces its queued request but keeps its place in line
//! 2. `update_workers()` pairs free slots (round robin) with pending requests in
//!    arrival order, spawning each slot's worker lazily on first use
//! 3. `process_completed()` drains responses on the main thread, hands each
//!    result to the caller and only then frees the slot
//!
//! ## Backpressure
//!
//! A pool never has more requests in flight than it has slots. Anything else
//! waits in the pending queue until a slot frees up.
//!
//! ## Example Usage
//! ```ignore
//! let mut pool = BufferPool::new(TerrainStrategy::new(params), 2);
//! pool.add(coord, TerrainRequest::generate(coord));
//!
//! // In the main loop:
//! pool.process_completed(|chunk, response| world.on_terrain(chunk, response));
//! pool.update_workers();
//! ```

pub mod worker;

use std::collections::{HashMap, VecDeque};

use log::{debug, error, warn};

use crate::engine_state::voxels::chunk::ChunkCoord;

pub use worker::{
    PoolError, PoolStrategy, RequestContext, ResponseKind, WorkerError, WorkerHandle, WorkerService,
};

/// State of a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Idle and available.
    Free,
    /// Reserved; the request is being handed to the worker.
    Sending,
    /// The worker holds a request and the slot awaits its reply.
    Busy,
}

/// One reusable worker slot.
///
/// # Fields
/// - `state`: Where the slot is in its lifecycle
/// - `chunk`: The chunk whose request the slot is serving
/// - `worker`: The slot's long-lived worker, spawned on first use
struct FrameSlot<Req, Resp> {
    state: FrameState,
    chunk: Option<ChunkCoord>,
    worker: Option<WorkerHandle<Req, Resp>>,
}

impl<Req, Resp> FrameSlot<Req, Resp> {
    fn free(&mut self) {
        self.state = FrameState::Free;
        self.chunk = None;
    }
}

/// A bounded pool of worker slots for one pipeline stage.
pub struct BufferPool<S: PoolStrategy> {
    strategy: S,
    slots: Vec<FrameSlot<S::Request, S::Response>>,
    pending: HashMap<ChunkCoord, S::Request>,
    order: VecDeque<ChunkCoord>,
    pool_offset: usize,
}

impl<S: PoolStrategy> BufferPool<S> {
    /// Creates a pool with `slot_count` slots. No worker is started yet.
    pub fn new(strategy: S, slot_count: usize) -> Self {
        let slots = (0..slot_count)
            .map(|_| FrameSlot {
                state: FrameState::Free,
                chunk: None,
                worker: None,
            })
            .collect();
        BufferPool {
            strategy,
            slots,
            pending: HashMap::new(),
            order: VecDeque::new(),
            pool_offset: 0,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Queues a request for `chunk`.
    ///
    /// If a request for the same chunk is already queued it is replaced (last
    /// request wins) and keeps its original position in line.
    ///
    /// # Returns
    /// `true` if the request was queued as a new entry, `false` if it replaced
    /// a queued request.
    pub fn add(&mut self, chunk: ChunkCoord, request: S::Request) -> bool {
        if self.pending.insert(chunk, request).is_some() {
            debug!("{} request for chunk {} replaced", S::NAME, chunk);
            return false;
        }
        self.order.push_back(chunk);
        true
    }

    /// Finds a free slot, scanning from the slot after the last one used.
    pub fn find_free_frame(&self) -> Option<usize> {
        let len = self.slots.len();
        (0..len)
            .map(|step| (self.pool_offset + step) % len)
            .find(|&frameno| self.slots[frameno].state == FrameState::Free)
    }

    /// Pairs free slots with pending requests in arrival order.
    ///
    /// # Returns
    /// The number of requests handed to workers.
    pub fn update_workers(&mut self) -> usize {
        let mut dispatched = 0;

        while !self.order.is_empty() {
            let Some(frameno) = self.find_free_frame() else {
                break;
            };
            let Some(chunk) = self.order.pop_front() else {
                break;
            };
            let Some(mut request) = self.pending.remove(&chunk) else {
                continue;
            };

            if let Err(error) = self.ensure_worker(frameno) {
                warn!("{}", error);
                self.requeue_front(chunk, request);
                break;
            }

            S::assign_frame(&mut request, frameno);
            let slot = &mut self.slots[frameno];
            slot.state = FrameState::Sending;
            slot.chunk = Some(chunk);

            let sent = match slot.worker.as_ref() {
                Some(worker) => worker.send(request),
                None => Err(request),
            };
            match sent {
                Ok(()) => {
                    slot.state = FrameState::Busy;
                    self.pool_offset = (frameno + 1) % self.slots.len();
                    dispatched += 1;
                    debug!("{} request for chunk {} sent to frame {}", S::NAME, chunk, frameno);
                }
                Err(request) => {
                    warn!(
                        "{} worker for frame {} is gone, requeueing chunk {}",
                        S::NAME,
                        frameno,
                        chunk
                    );
                    slot.free();
                    slot.worker = None;
                    self.requeue_front(chunk, request);
                    break;
                }
            }
        }

        dispatched
    }

    /// Spawns and initializes the worker of `frameno` if it has none.
    fn ensure_worker(&mut self, frameno: usize) -> Result<(), PoolError> {
        if self.slots[frameno].worker.is_some() {
            return Ok(());
        }
        let worker = self.strategy.spawn(frameno)?;
        if worker.send(self.strategy.initialize_request()).is_err() {
            return Err(PoolError::Disconnected {
                pool: S::NAME,
                frameno,
            });
        }
        self.slots[frameno].worker = Some(worker);
        Ok(())
    }

    fn requeue_front(&mut self, chunk: ChunkCoord, request: S::Request) {
        if self.pending.insert(chunk, request).is_none() {
            self.order.push_front(chunk);
        }
    }

    /// Drains every response that has arrived.
    ///
    /// For each completed or failed request `on_result` is called with the
    /// chunk the slot was serving, and the slot is freed afterwards. Responses
    /// for a slot that no longer serves a chunk are logged and dropped. A
    /// worker that hung up is discarded, and its chunk receives the stage's
    /// failure response so the caller can retry it.
    ///
    /// # Returns
    /// The number of results handed to `on_result`.
    pub fn process_completed<F>(&mut self, mut on_result: F) -> usize
    where
        F: FnMut(ChunkCoord, S::Response),
    {
        let mut handled = 0;

        for (frameno, slot) in self.slots.iter_mut().enumerate() {
            loop {
                let received = match slot.worker.as_ref() {
                    Some(worker) => worker.try_recv(),
                    None => break,
                };

                match received {
                    Ok(Some(response)) => match S::classify(&response) {
                        ResponseKind::Initialized => {
                            debug!("{} worker for frame {} initialized", S::NAME, frameno);
                        }
                        ResponseKind::Notice => {}
                        kind @ (ResponseKind::Completed | ResponseKind::Failed) => {
                            let Some(chunk) = slot.chunk else {
                                warn!(
                                    "Dropping stale {} result on frame {} with no chunk",
                                    S::NAME,
                                    frameno
                                );
                                slot.free();
                                continue;
                            };
                            if kind == ResponseKind::Failed {
                                error!("{} request for chunk {} failed on frame {}", S::NAME, chunk, frameno);
                            }
                            on_result(chunk, response);
                            slot.free();
                            handled += 1;
                        }
                    },
                    Ok(None) => break,
                    Err(_) => {
                        let error = PoolError::Disconnected {
                            pool: S::NAME,
                            frameno,
                        };
                        error!("{}", error);
                        slot.worker = None;
                        if let Some(chunk) = slot.chunk {
                            on_result(chunk, S::failure_response(chunk, frameno, error.to_string()));
                            handled += 1;
                        }
                        slot.free();
                        break;
                    }
                }
            }
        }

        handled
    }

    /// Sends a message to every spawned worker, outside of slot bookkeeping.
    ///
    /// # Returns
    /// The number of workers the message reached.
    pub fn broadcast<F>(&mut self, mut make_request: F) -> usize
    where
        F: FnMut() -> S::Request,
    {
        self.slots
            .iter()
            .filter_map(|slot| slot.worker.as_ref())
            .filter(|worker| worker.send(make_request()).is_ok())
            .count()
    }

    /// Drops the queued request of `chunk`, if any.
    pub fn cancel_pending(&mut self, chunk: ChunkCoord) -> bool {
        if self.pending.remove(&chunk).is_none() {
            return false;
        }
        self.order.retain(|queued| *queued != chunk);
        true
    }

    pub fn is_pending(&self, chunk: ChunkCoord) -> bool {
        self.pending.contains_key(&chunk)
    }

    /// Whether a slot currently serves `chunk`.
    pub fn is_in_flight(&self, chunk: ChunkCoord) -> bool {
        self.slots.iter().any(|slot| slot.chunk == Some(chunk))
    }

    /// Queued chunks in the order they will be dispatched.
    pub fn pending_chunks(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.order.iter().copied()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn busy_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.state != FrameState::Free)
            .count()
    }

    pub fn free_count(&self) -> usize {
        self.slots.len() - self.busy_count()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// State and chunk of every slot, in slot order.
    pub fn frames(&self) -> Vec<(FrameState, Option<ChunkCoord>)> {
        self.slots.iter().map(|slot| (slot.state, slot.chunk)).collect()
    }

    /// Drops queued work and stops every worker.
    pub fn shutdown(&mut self) {
        self.pending.clear();
        self.order.clear();
        for slot in self.slots.iter_mut() {
            slot.free();
            if let Some(worker) = slot.worker.take() {
                worker.shutdown();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::mpsc::{channel, Receiver, Sender};

    /// Request: (chunk x, assigned frame). Response: (chunk x, ok).
    type Peer = (Receiver<(i32, Option<usize>)>, Sender<Option<(i32, bool)>>);

    struct ManualStrategy {
        peers: Rc<RefCell<Vec<Peer>>>,
    }

    impl PoolStrategy for ManualStrategy {
        type Request = (i32, Option<usize>);
        type Response = Option<(i32, bool)>;

        const NAME: &'static str = "manual";

        fn spawn(&mut self, _frameno: usize) -> Result<WorkerHandle<Self::Request, Self::Response>, PoolError> {
            let (request_tx, request_rx) = channel();
            let (response_tx, response_rx) = channel();
            self.peers.borrow_mut().push((request_rx, response_tx));
            Ok(WorkerHandle::from_channels(request_tx, response_rx))
        }

        fn initialize_request(&self) -> Self::Request {
            (i32::MIN, None)
        }

        fn assign_frame(request: &mut Self::Request, frameno: usize) {
            request.1 = Some(frameno);
        }

        fn classify(response: &Self::Response) -> ResponseKind {
            match response {
                None => ResponseKind::Initialized,
                Some((_, true)) => ResponseKind::Completed,
                Some((_, false)) => ResponseKind::Failed,
            }
        }

        fn failure_response(chunk: ChunkCoord, _frameno: usize, _error: String) -> Self::Response {
            Some((chunk.x, false))
        }
    }

    fn pool(slots: usize) -> (BufferPool<ManualStrategy>, Rc<RefCell<Vec<Peer>>>) {
        let peers = Rc::new(RefCell::new(Vec::new()));
        let strategy = ManualStrategy {
            peers: Rc::clone(&peers),
        };
        (BufferPool::new(strategy, slots), peers)
    }

    fn coord(x: i32) -> ChunkCoord {
        ChunkCoord::new(x, 0)
    }

    #[test]
    fn workers_are_spawned_lazily_and_initialized_first() {
        let (mut pool, peers) = pool(2);
        assert!(peers.borrow().is_empty());

        pool.add(coord(1), (1, None));
        assert_eq!(pool.update_workers(), 1);
        let peers = peers.borrow();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].0.try_recv().unwrap(), (i32::MIN, None));
        assert_eq!(peers[0].0.try_recv().unwrap(), (1, Some(0)));
    }

    #[test]
    fn re_adding_keeps_position_and_last_request_wins() {
        let (mut pool, _peers) = pool(1);
        assert!(pool.add(coord(1), (1, None)));
        assert!(pool.add(coord(2), (2, None)));
        assert!(!pool.add(coord(1), (10, None)));
        assert_eq!(pool.pending_chunks().collect::<Vec<_>>(), vec![coord(1), coord(2)]);
        assert_eq!(pool.pending_len(), 2);
    }

    #[test]
    fn slots_rotate_round_robin() {
        let (mut pool, peers) = pool(3);
        pool.add(coord(1), (1, None));
        pool.update_workers();
        {
            let peers = peers.borrow();
            peers[0].0.try_recv().unwrap();
            peers[0].0.try_recv().unwrap();
            peers[0].1.send(Some((1, true))).unwrap();
        }
        assert_eq!(pool.process_completed(|_, _| {}), 1);
        assert_eq!(pool.find_free_frame(), Some(1));

        pool.add(coord(2), (2, None));
        pool.update_workers();
        assert_eq!(pool.frames()[1], (FrameState::Busy, Some(coord(2))));
    }

    #[test]
    fn send_failure_reverts_slot_and_requeues() {
        let (mut pool, peers) = pool(1);
        pool.add(coord(1), (1, None));
        pool.update_workers();
        {
            let peers = peers.borrow();
            peers[0].1.send(Some((1, true))).unwrap();
        }
        pool.process_completed(|_, _| {});
        peers.borrow_mut().clear();

        pool.add(coord(2), (2, None));
        assert_eq!(pool.update_workers(), 0);
        assert_eq!(pool.free_count(), 1);
        assert!(pool.is_pending(coord(2)));

        // The dead worker was dropped; the next pump spawns a fresh one.
        assert_eq!(pool.update_workers(), 1);
        assert_eq!(pool.busy_count(), 1);
    }

    #[test]
    fn slot_is_freed_after_the_callback() {
        let (mut pool, peers) = pool(1);
        pool.add(coord(4), (4, None));
        pool.update_workers();
        peers.borrow()[0].1.send(None).unwrap();
        peers.borrow()[0].1.send(Some((4, false))).unwrap();

        let mut seen = Vec::new();
        pool.process_completed(|chunk, response| seen.push((chunk, response)));
        assert_eq!(seen, vec![(coord(4), Some((4, false)))]);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn duplicate_reply_is_dropped_as_stale() {
        let (mut pool, peers) = pool(1);
        pool.add(coord(5), (5, None));
        pool.update_workers();
        peers.borrow()[0].1.send(Some((5, true))).unwrap();
        peers.borrow()[0].1.send(Some((5, true))).unwrap();

        let mut seen = Vec::new();
        assert_eq!(pool.process_completed(|chunk, _| seen.push(chunk)), 1);
        assert_eq!(seen, vec![coord(5)]);
        assert_eq!(pool.free_count(), 1);
        assert!(!pool.is_in_flight(coord(5)));
    }

    #[test]
    fn hung_up_worker_reports_failure() {
        let (mut pool, peers) = pool(1);
        pool.add(coord(6), (6, None));
        pool.update_workers();
        peers.borrow_mut().clear();

        let mut seen = Vec::new();
        pool.process_completed(|chunk, response| seen.push((chunk, response)));
        assert_eq!(seen, vec![(coord(6), Some((6, false)))]);
        assert_eq!(pool.free_count(), 1);
    }
}
