//! Generic producer/consumer session, grounded on
//! `include/cheferd/session/session.hpp`: a submission queue (rules headed
//! toward the peer) paired with a completion queue (responses coming back),
//! with a liveness flag a caller can use to stop blocking on either queue.
//!
//! The original pairs a `std::queue` + mutex + condvar for each direction;
//! `tokio::sync::mpsc` gives us the same bounded producer/consumer shape
//! without hand-rolled wait/notify. The channel bound is deliberately finite
//! (see `DESIGN.md`): an unbounded queue behind a slow or wedged stage would
//! let a core's admin thread run arbitrarily far ahead of what the data
//! plane can absorb.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bounded capacity of both the submission and completion queues. Matches
/// the "generous capacity" trade-off recorded for the re-architected
/// session in `DESIGN.md`.
pub const SESSION_QUEUE_CAPACITY: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A generic session between a controller and a peer (a data-plane stage
/// from the local controller's side, or a local controller from the core's
/// side), parameterized over the request/response pair it carries.
pub struct Session<Req, Resp> {
    session_id: u64,
    submission_tx: mpsc::Sender<Req>,
    submission_rx: parking_lot::Mutex<mpsc::Receiver<Req>>,
    completion_tx: mpsc::Sender<Resp>,
    completion_rx: parking_lot::Mutex<mpsc::Receiver<Resp>>,
    liveness: CancellationToken,
}

impl<Req, Resp> Session<Req, Resp> {
    pub fn new() -> Self {
        Self::with_id(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn with_id(session_id: u64) -> Self {
        let (submission_tx, submission_rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        Self {
            session_id,
            submission_tx,
            submission_rx: parking_lot::Mutex::new(submission_rx),
            completion_tx,
            completion_rx: parking_lot::Mutex::new(completion_rx),
            liveness: CancellationToken::new(),
        }
    }

    pub fn session_identifier(&self) -> u64 {
        self.session_id
    }

    pub fn is_active(&self) -> bool {
        !self.liveness.is_cancelled()
    }

    /// Ends the session: both queues' blocked dequeuers wake with `None`.
    pub fn shut_down(&self) {
        self.liveness.cancel();
    }

    /// `SubmitRule`: enqueue a request for the session's consumer-side
    /// worker to pick up and forward to the peer.
    pub async fn submit(&self, request: Req) -> Result<(), SessionClosed> {
        self.submission_tx
            .send(request)
            .await
            .map_err(|_| SessionClosed)
    }

    /// Consumer-side counterpart of [`Session::submit`]: the worker that owns
    /// the peer connection calls this to get the next rule to send.
    /// Resolves to `None` once the session is shut down and the queue has
    /// drained.
    pub async fn next_submission(&self) -> Option<Req> {
        let mut rx = self.submission_rx.lock();
        tokio::select! {
            biased;
            _ = self.liveness.cancelled(), if rx.is_empty() => None,
            item = rx.recv() => item,
        }
    }

    /// `EnqueueResponseInCompletionQueue`: the peer-facing worker calls this
    /// once it has decoded a response off the wire.
    pub async fn complete(&self, response: Resp) -> Result<(), SessionClosed> {
        self.completion_tx
            .send(response)
            .await
            .map_err(|_| SessionClosed)
    }

    /// `GetResult`: the caller that submitted a rule polls this to retrieve
    /// the matching response. Correspondence with [`Session::submit`] is
    /// FIFO by construction — both queues are drained in submission order.
    pub async fn get_result(&self) -> Option<Resp> {
        let mut rx = self.completion_rx.lock();
        tokio::select! {
            biased;
            _ = self.liveness.cancelled(), if rx.is_empty() => None,
            item = rx.recv() => item,
        }
    }
}

impl<Req, Resp> Default for Session<Req, Resp> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("session is closed")]
pub struct SessionClosed;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_and_get_result_round_trips_in_order() {
        let session: Session<u32, u32> = Session::new();
        session.submit(1).await.unwrap();
        session.submit(2).await.unwrap();

        assert_eq!(session.next_submission().await, Some(1));
        assert_eq!(session.next_submission().await, Some(2));

        session.complete(10).await.unwrap();
        session.complete(20).await.unwrap();

        assert_eq!(session.get_result().await, Some(10));
        assert_eq!(session.get_result().await, Some(20));
    }

    #[tokio::test]
    async fn shut_down_wakes_blocked_dequeue() {
        let session: Session<u32, u32> = Session::new();
        assert!(session.is_active());
        session.shut_down();
        assert!(!session.is_active());
        assert_eq!(session.next_submission().await, None);
        assert_eq!(session.get_result().await, None);
    }

    #[test]
    fn session_ids_are_unique() {
        let a: Session<u32, u32> = Session::new();
        let b: Session<u32, u32> = Session::new();
        assert_ne!(a.session_identifier(), b.session_identifier());
    }
}
