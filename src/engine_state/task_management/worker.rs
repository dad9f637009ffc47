//! # Workers
//!
//! This module defines the building blocks a [`BufferPool`](super::BufferPool)
//! is assembled from.
//!
//! ## Core Components
//! - `WorkerService`: The computation a worker performs, one request at a time
//! - `WorkerHandle`: The main thread's end of a worker (request sender, response receiver)
//! - `PoolStrategy`: Per-stage behavior of a pool (spawning, initialize payload, result kinds)
//!
//! ## Worker Lifecycle
//! 1. A pool slot needs a worker and calls `PoolStrategy::spawn()`
//! 2. `WorkerHandle::spawn()` starts a thread running the service loop
//! 3. The loop handles requests in order and sends one response per request
//! 4. Handler errors and panics are turned into the stage's error response
//! 5. The loop ends when the handle is dropped
//!
//! ## Platform-Specific Behavior
//! Native targets run each worker on a `std::thread`; browser targets use
//! `wasm_thread`, which backs threads with Web Workers.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, RecvError, Sender, TryRecvError};

use thiserror::Error;

use crate::engine_state::voxels::chunk::ChunkCoord;

cfg_if::cfg_if! {
    if #[cfg(target_family = "wasm")] {
        use wasm_thread as thread;
    } else {
        use std::thread;
    }
}

/// Errors of the pool machinery itself.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The operating system refused to start a worker thread.
    #[error("failed to spawn {pool} worker for frame {frameno}: {source}")]
    Spawn {
        pool: &'static str,
        frameno: usize,
        #[source]
        source: std::io::Error,
    },

    /// The worker's channel closed, usually because its thread died.
    #[error("{pool} worker for frame {frameno} disconnected")]
    Disconnected { pool: &'static str, frameno: usize },
}

/// Errors a worker reports back for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkerError {
    /// A request arrived before `initialize`.
    #[error("worker has not been initialized")]
    NotInitialized,

    /// The request names a chunk the worker does not hold.
    #[error("unknown chunk {0}")]
    UnknownChunk(ChunkCoord),

    /// The request payload is inconsistent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Identifies the request an error response belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub chunk_id: Option<ChunkCoord>,
    pub frameno: Option<usize>,
}

/// The computation performed by a worker.
///
/// A service owns all of its state; requests and responses are moved across
/// channels, so nothing is shared with the main thread.
pub trait WorkerService: Send + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Handles one request.
    fn handle(&mut self, request: Self::Request) -> Result<Self::Response, WorkerError>;

    /// Extracts the chunk and frame a request refers to, for error reporting.
    fn context(request: &Self::Request) -> RequestContext;

    /// Builds the protocol error response for a failed request.
    fn error_response(context: RequestContext, error: String) -> Self::Response;
}

/// How a pool interprets a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// The worker finished its `initialize` handshake.
    Initialized,
    /// The slot's request completed successfully.
    Completed,
    /// The slot's request failed.
    Failed,
    /// A response to a broadcast message; not tied to the slot's request.
    Notice,
}

/// Per-stage behavior of a [`BufferPool`](super::BufferPool).
pub trait PoolStrategy {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Stage name used in logs and errors.
    const NAME: &'static str;

    /// Starts the worker serving slot `frameno`.
    fn spawn(&mut self, frameno: usize) -> Result<WorkerHandle<Self::Request, Self::Response>, PoolError>;

    /// The `initialize` message sent to a freshly spawned worker.
    fn initialize_request(&self) -> Self::Request;

    /// Stamps the slot number on a request before it is sent.
    fn assign_frame(request: &mut Self::Request, frameno: usize);

    /// Classifies a response.
    fn classify(response: &Self::Response) -> ResponseKind;

    /// The failure response reported for `chunk` when its worker dies mid-request.
    fn failure_response(chunk: ChunkCoord, frameno: usize, error: String) -> Self::Response;
}

/// The main thread's end of a worker.
///
/// # Fields
/// - `sender`: Sends requests to the worker
/// - `receiver`: Receives the worker's responses
/// - `join_handle`: The worker thread, absent for in-process handles
pub struct WorkerHandle<Req, Resp> {
    sender: Sender<Req>,
    receiver: Receiver<Resp>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl<Req: Send + 'static, Resp: Send + 'static> WorkerHandle<Req, Resp> {
    /// Wraps existing channel ends. The caller plays the worker by reading
    /// requests from the other end of `sender` and answering on `receiver`.
    pub fn from_channels(sender: Sender<Req>, receiver: Receiver<Resp>) -> Self {
        WorkerHandle {
            sender,
            receiver,
            join_handle: None,
        }
    }

    /// Starts `service` on a new named thread.
    ///
    /// # Arguments
    /// * `pool` - Stage name, used for the thread name and errors
    /// * `frameno` - Slot the worker serves
    /// * `service` - The computation to run
    pub fn spawn<S>(pool: &'static str, frameno: usize, service: S) -> Result<Self, PoolError>
    where
        S: WorkerService<Request = Req, Response = Resp>,
    {
        let (request_tx, request_rx) = channel::<Req>();
        let (response_tx, response_rx) = channel::<Resp>();

        let join_handle = thread::Builder::new()
            .name(format!("{pool}-worker-{frameno}"))
            .spawn(move || run_service(service, request_rx, response_tx))
            .map_err(|source| PoolError::Spawn {
                pool,
                frameno,
                source,
            })?;

        log::info!("Spawned {} worker for frame {}", pool, frameno);

        Ok(WorkerHandle {
            sender: request_tx,
            receiver: response_rx,
            join_handle: Some(join_handle),
        })
    }

    /// Sends a request.
    ///
    /// # Returns
    /// - `Ok(())` if the request was handed to the worker
    /// - `Err(request)` if the worker is gone, returning the request for requeueing
    pub fn send(&self, request: Req) -> Result<(), Req> {
        self.sender.send(request).map_err(|error| error.0)
    }

    /// Polls for a response without blocking.
    ///
    /// # Returns
    /// `Ok(None)` when no response is ready, `Err(RecvError)` when the worker hung up.
    pub fn try_recv(&self) -> Result<Option<Resp>, RecvError> {
        match self.receiver.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(RecvError),
        }
    }

    /// Closes the request channel and waits for the worker thread to finish.
    pub fn shutdown(self) {
        let WorkerHandle {
            sender,
            receiver,
            join_handle,
        } = self;
        drop(sender);
        drop(receiver);
        if let Some(handle) = join_handle {
            join_worker(handle);
        }
    }
}

#[cfg(not(target_family = "wasm"))]
fn join_worker(handle: thread::JoinHandle<()>) {
    if handle.join().is_err() {
        log::warn!("Worker thread panicked during shutdown");
    }
}

// Blocking joins are not allowed on the browser's main thread.
#[cfg(target_family = "wasm")]
fn join_worker(handle: thread::JoinHandle<()>) {
    drop(handle);
}

/// The worker loop: one response per request until the request channel closes.
fn run_service<S: WorkerService>(mut service: S, requests: Receiver<S::Request>, responses: Sender<S::Response>) {
    while let Ok(request) = requests.recv() {
        let context = S::context(&request);
        let response = match catch_unwind(AssertUnwindSafe(|| service.handle(request))) {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => S::error_response(context, error.to_string()),
            Err(panic) => S::error_response(context, panic_message(panic.as_ref())),
        };
        if responses.send(response).is_err() {
            break;
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("worker panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("worker panicked: {message}")
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl WorkerService for Doubler {
        type Request = i32;
        type Response = Result<i32, String>;

        fn handle(&mut self, request: i32) -> Result<Self::Response, WorkerError> {
            match request {
                0 => Err(WorkerError::InvalidRequest("zero".into())),
                13 => panic!("unlucky"),
                n => Ok(Ok(n * 2)),
            }
        }

        fn context(_: &i32) -> RequestContext {
            RequestContext::default()
        }

        fn error_response(_: RequestContext, error: String) -> Self::Response {
            Err(error)
        }
    }

    fn recv_blocking<Req: Send + 'static, Resp: Send + 'static>(handle: &WorkerHandle<Req, Resp>) -> Resp {
        for _ in 0..2000 {
            if let Ok(Some(response)) = handle.try_recv() {
                return response;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        panic!("worker did not answer");
    }

    #[test]
    fn errors_and_panics_become_responses() {
        let handle = WorkerHandle::spawn("test", 0, Doubler).unwrap();
        handle.send(4).unwrap();
        assert_eq!(recv_blocking(&handle), Ok(8));
        handle.send(0).unwrap();
        assert_eq!(recv_blocking(&handle), Err("invalid request: zero".to_string()));
        handle.send(13).unwrap();
        assert_eq!(recv_blocking(&handle), Err("worker panicked: unlucky".to_string()));
        handle.send(5).unwrap();
        assert_eq!(recv_blocking(&handle), Ok(10));
        handle.shutdown();
    }

    #[test]
    fn dropped_peer_is_reported() {
        let (request_tx, request_rx) = channel::<i32>();
        let (response_tx, response_rx) = channel::<i32>();
        let handle = WorkerHandle::from_channels(request_tx, response_rx);
        drop(request_rx);
        assert_eq!(handle.send(1), Err(1));
        assert_eq!(handle.try_recv(), Ok(None));
        drop(response_tx);
        assert_eq!(handle.try_recv(), Err(RecvError));
    }
}
