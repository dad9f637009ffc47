//! # Buffer Pool Tests
//!
//! Drives a pool through manual in-process workers so slot timing is fully
//! deterministic.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, Sender};

use voxel_world::engine_state::task_management::{
    BufferPool, FrameState, PoolError, PoolStrategy, ResponseKind, WorkerHandle,
};
use voxel_world::ChunkCoord;

/// Requests are `(label, frame)`; responses are `Some(label)` or `None` for `initialized`.
type Request = (&'static str, usize);
type Response = Option<&'static str>;

#[derive(Default)]
struct Workers {
    inboxes: Vec<Receiver<Request>>,
    outboxes: Vec<Sender<Response>>,
}

impl Workers {
    /// Reads every request a worker received, `initialize` included.
    fn drain(&self, worker: usize) -> Vec<Request> {
        self.inboxes[worker].try_iter().collect()
    }

    fn reply(&self, worker: usize, label: &'static str) {
        self.outboxes[worker].send(Some(label)).unwrap();
    }
}

struct ManualStrategy {
    workers: Rc<RefCell<Workers>>,
}

impl PoolStrategy for ManualStrategy {
    type Request = Request;
    type Response = Response;

    const NAME: &'static str = "manual";

    fn spawn(&mut self, _frameno: usize) -> Result<WorkerHandle<Request, Response>, PoolError> {
        let (request_tx, request_rx) = channel();
        let (response_tx, response_rx) = channel();
        let mut workers = self.workers.borrow_mut();
        workers.inboxes.push(request_rx);
        workers.outboxes.push(response_tx);
        Ok(WorkerHandle::from_channels(request_tx, response_rx))
    }

    fn initialize_request(&self) -> Request {
        ("initialize", usize::MAX)
    }

    fn assign_frame(request: &mut Request, frameno: usize) {
        request.1 = frameno;
    }

    fn classify(response: &Response) -> ResponseKind {
        match response {
            None => ResponseKind::Initialized,
            Some(_) => ResponseKind::Completed,
        }
    }

    fn failure_response(_chunk: ChunkCoord, _frameno: usize, _error: String) -> Response {
        Some("failed")
    }
}

fn coord(x: i32) -> ChunkCoord {
    ChunkCoord::new(x, 0)
}

fn pool(slots: usize) -> (BufferPool<ManualStrategy>, Rc<RefCell<Workers>>) {
    let workers = Rc::new(RefCell::new(Workers::default()));
    let strategy = ManualStrategy {
        workers: Rc::clone(&workers),
    };
    (BufferPool::new(strategy, slots), workers)
}

/// Test: With every slot busy, requests wait and are served in arrival order.
#[test]
fn test_queue_order_with_all_slots_busy() {
    let (mut pool, workers) = pool(2);
    for (x, label) in [(1, "one"), (2, "two"), (3, "three"), (4, "four"), (5, "five")] {
        assert!(pool.add(coord(x), (label, 0)));
    }

    assert_eq!(pool.update_workers(), 2);
    assert_eq!(
        workers.borrow().drain(0),
        vec![("initialize", usize::MAX), ("one", 0)]
    );
    assert_eq!(
        workers.borrow().drain(1),
        vec![("initialize", usize::MAX), ("two", 1)]
    );
    assert_eq!(pool.free_count(), 0);

    // Nothing moves while both slots are busy; a re-add keeps its place.
    assert!(!pool.add(coord(4), ("four again", 0)));
    assert_eq!(pool.update_workers(), 0);
    assert_eq!(
        pool.pending_chunks().collect::<Vec<_>>(),
        vec![coord(3), coord(4), coord(5)]
    );

    // Freeing slot 1 hands it the oldest pending request.
    workers.borrow().reply(1, "two");
    let mut completed = Vec::new();
    pool.process_completed(|chunk, response| completed.push((chunk, response)));
    assert_eq!(completed, vec![(coord(2), Some("two"))]);

    assert_eq!(pool.update_workers(), 1);
    assert_eq!(workers.borrow().drain(1), vec![("three", 1)]);
    assert_eq!(pool.frames()[1], (FrameState::Busy, Some(coord(3))));

    // The replaced request is the one that gets sent.
    workers.borrow().reply(0, "one");
    pool.process_completed(|_, _| {});
    pool.update_workers();
    assert_eq!(workers.borrow().drain(0), vec![("four again", 0)]);
    assert_eq!(pool.pending_chunks().collect::<Vec<_>>(), vec![coord(5)]);
}

/// Test: Each completion frees its slot exactly once, making room for the next request.
#[test]
fn test_completion_frees_the_slot() {
    let (mut pool, workers) = pool(1);
    pool.add(coord(1), ("one", 0));
    pool.add(coord(2), ("two", 0));
    pool.update_workers();
    workers.borrow().reply(0, "one");

    let mut seen = Vec::new();
    assert_eq!(pool.process_completed(|chunk, _| seen.push(chunk)), 1);
    assert_eq!(seen, vec![coord(1)]);
    assert_eq!(pool.busy_count(), 0);

    assert_eq!(pool.update_workers(), 1);
    assert!(pool.is_in_flight(coord(2)));
    assert!(!pool.is_in_flight(coord(1)));
}

/// Test: Broadcasts reach every spawned worker without touching slot state.
#[test]
fn test_broadcast_reaches_spawned_workers() {
    let (mut pool, workers) = pool(3);
    pool.add(coord(1), ("one", 0));
    pool.add(coord(2), ("two", 0));
    pool.update_workers();

    assert_eq!(pool.broadcast(|| ("unload", usize::MAX)), 2);
    assert_eq!(pool.busy_count(), 2);
    for worker in 0..2 {
        let received = workers.borrow().drain(worker);
        assert_eq!(received.last(), Some(&("unload", usize::MAX)));
    }
}
