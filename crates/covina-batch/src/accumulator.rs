//! A single `(adapter, op-kind)` accumulator: collects submissions behind
//! one mutex-free channel, dispatches them as a store-native batch, and
//! feeds the result back through per-submission oneshot futures.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use covina_core::{Error, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::adaptive::{AdaptiveSizer, SizingConfig};

/// Exponential backoff applied when a whole batch fails transport-level
/// (not per-item `bad_request`/`conflict`, which never retry).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retry attempts after the first failed dispatch.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Multiplier applied to the backoff after each retry.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(50),
            multiplier: 2.0,
        }
    }
}

type DispatchFut<Outcome> = Pin<Box<dyn Future<Output = Result<Vec<Result<Outcome>>>> + Send>>;
type DispatchFn<Item, Outcome> = Arc<dyn Fn(Vec<Item>) -> DispatchFut<Outcome> + Send + Sync>;

struct Pending<Item, Outcome> {
    item: Item,
    reply: oneshot::Sender<Result<Outcome>>,
}

enum Msg<Item, Outcome> {
    Submit(Pending<Item, Outcome>),
    Flush(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
}

/// Handle to a running accumulator. Cloning shares the same background
/// worker; dropping the last handle lets the worker drain and exit.
pub struct Accumulator<Item, Outcome> {
    sender: mpsc::UnboundedSender<Msg<Item, Outcome>>,
}

impl<Item, Outcome> Clone for Accumulator<Item, Outcome> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<Item, Outcome> Accumulator<Item, Outcome>
where
    Item: Clone + Send + 'static,
    Outcome: Send + 'static,
{
    /// Spawn a new accumulator backed by `dispatch`, the store-native batch
    /// call for this `(adapter, op-kind)` pair.
    pub fn spawn(
        label: String,
        sizing: SizingConfig,
        retry: RetryConfig,
        coalesce_delay: Duration,
        dispatch: DispatchFn<Item, Outcome>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(
            label,
            sizing,
            retry,
            coalesce_delay,
            dispatch,
            receiver,
        ));
        Self { sender }
    }

    /// Submit one item, returning a future that resolves once its batch has
    /// been dispatched (and retried, if needed).
    pub async fn submit(&self, item: Item) -> Result<Outcome> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Msg::Submit(Pending { item, reply }))
            .map_err(|_| Error::Cancelled)?;
        rx.await.map_err(|_| Error::Cancelled)?
    }

    /// Force dispatch of whatever is currently pending.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Msg::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Flush, then stop accepting submissions. Any item still queued after
    /// the final flush completes with `Error::Cancelled`.
    pub async fn stop(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Msg::Stop(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

async fn run_worker<Item, Outcome>(
    label: String,
    sizing: SizingConfig,
    retry: RetryConfig,
    coalesce_delay: Duration,
    dispatch: DispatchFn<Item, Outcome>,
    mut receiver: mpsc::UnboundedReceiver<Msg<Item, Outcome>>,
) where
    Item: Clone + Send + 'static,
    Outcome: Send + 'static,
{
    let mut sizer = AdaptiveSizer::new(sizing);
    let mut pending: Vec<Pending<Item, Outcome>> = Vec::new();
    let mut oldest_at: Option<Instant> = None;

    loop {
        let sleep = match oldest_at {
            Some(started) => {
                let deadline = started + coalesce_delay;
                Box::pin(tokio::time::sleep_until(deadline.into()))
                    as Pin<Box<dyn Future<Output = ()> + Send>>
            }
            None => Box::pin(std::future::pending()),
        };

        tokio::select! {
            msg = receiver.recv() => {
                match msg {
                    Some(Msg::Submit(item)) => {
                        if pending.is_empty() {
                            oldest_at = Some(Instant::now());
                        }
                        pending.push(item);
                        if pending.len() >= sizer.current_size() {
                            dispatch_batch(&label, &dispatch, &retry, &mut sizer, &mut pending).await;
                            oldest_at = None;
                        }
                    }
                    Some(Msg::Flush(ack)) => {
                        dispatch_batch(&label, &dispatch, &retry, &mut sizer, &mut pending).await;
                        oldest_at = None;
                        let _ = ack.send(());
                    }
                    Some(Msg::Stop(ack)) => {
                        dispatch_batch(&label, &dispatch, &retry, &mut sizer, &mut pending).await;
                        while let Ok(Msg::Submit(item)) = receiver.try_recv() {
                            let _ = item.reply.send(Err(Error::Cancelled));
                        }
                        debug!(accumulator = %label, "accumulator stopped");
                        let _ = ack.send(());
                        return;
                    }
                    None => {
                        dispatch_batch(&label, &dispatch, &retry, &mut sizer, &mut pending).await;
                        return;
                    }
                }
            }
            () = sleep => {
                dispatch_batch(&label, &dispatch, &retry, &mut sizer, &mut pending).await;
                oldest_at = None;
            }
        }
    }
}

async fn dispatch_batch<Item, Outcome>(
    label: &str,
    dispatch: &DispatchFn<Item, Outcome>,
    retry: &RetryConfig,
    sizer: &mut AdaptiveSizer,
    pending: &mut Vec<Pending<Item, Outcome>>,
) where
    Item: Clone + Send + 'static,
    Outcome: Send + 'static,
{
    if pending.is_empty() {
        return;
    }
    let batch = std::mem::take(pending);
    let size = batch.len();
    let items: Vec<Item> = batch.iter().map(|p| p.item.clone()).collect();
    let replies: Vec<_> = batch.into_iter().map(|p| p.reply).collect();

    let started = Instant::now();
    let outcome = dispatch_with_retry(dispatch, items, retry).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(results) => {
            let successes = results.iter().filter(|r| r.is_ok()).count();
            let ratio = successes as f64 / size as f64;
            sizer.record(size, elapsed, ratio);
            debug!(accumulator = %label, size, ?elapsed, successes, "batch dispatched");
            for (reply, result) in replies.into_iter().zip(results) {
                let _ = reply.send(result);
            }
        }
        Err(err) => {
            warn!(accumulator = %label, size, error = %err, "batch dispatch failed after retries");
            sizer.record(size, elapsed, 0.0);
            for reply in replies {
                let _ = reply.send(Err(err.clone()));
            }
        }
    }
}

async fn dispatch_with_retry<Item, Outcome>(
    dispatch: &DispatchFn<Item, Outcome>,
    items: Vec<Item>,
    retry: &RetryConfig,
) -> Result<Vec<Result<Outcome>>>
where
    Item: Clone,
{
    let mut backoff = retry.initial_backoff;
    let mut attempt = 0;
    loop {
        match dispatch(items.clone()).await {
            Ok(results) => return Ok(results),
            Err(err) if attempt < retry.max_retries && err.is_retryable() => {
                attempt += 1;
                tokio::time::sleep(backoff).await;
                backoff = backoff.mul_f64(retry.multiplier);
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn always_succeeds() -> DispatchFn<u32, u32> {
        Arc::new(|items: Vec<u32>| {
            Box::pin(async move { Ok(items.into_iter().map(Ok).collect()) })
        })
    }

    #[tokio::test]
    async fn submit_resolves_after_dispatch() {
        let acc = Accumulator::spawn(
            "test".into(),
            SizingConfig {
                initial_size: 1,
                ..Default::default()
            },
            RetryConfig::default(),
            Duration::from_millis(50),
            always_succeeds(),
        );
        let outcome = acc.submit(7).await.unwrap();
        assert_eq!(outcome, 7);
        acc.stop().await;
    }

    #[tokio::test]
    async fn coalesces_by_size() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let dispatch: DispatchFn<u32, u32> = Arc::new(move |items: Vec<u32>| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(items.into_iter().map(Ok).collect()) })
        });
        let acc = Accumulator::spawn(
            "test".into(),
            SizingConfig {
                initial_size: 4,
                ..Default::default()
            },
            RetryConfig::default(),
            Duration::from_secs(10),
            dispatch,
        );
        let futs: Vec<_> = (0..4).map(|i| acc.submit(i)).collect();
        let results = futures::future::join_all(futs).await;
        for r in results {
            r.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        acc.stop().await;
    }

    #[tokio::test]
    async fn flush_dispatches_partial_batch() {
        let acc = Accumulator::spawn(
            "test".into(),
            SizingConfig {
                initial_size: 100,
                ..Default::default()
            },
            RetryConfig::default(),
            Duration::from_secs(10),
            always_succeeds(),
        );
        let fut = acc.submit(1);
        acc.flush().await;
        assert_eq!(fut.await.unwrap(), 1);
        acc.stop().await;
    }

    #[tokio::test]
    async fn stop_cancels_unflushed_backlog() {
        let acc = Accumulator::spawn(
            "test".into(),
            SizingConfig {
                initial_size: 100,
                ..Default::default()
            },
            RetryConfig::default(),
            Duration::from_secs(10),
            always_succeeds(),
        );
        acc.stop().await;
        let err = acc.submit(1).await.unwrap_err();
        assert_eq!(err, Error::Cancelled);
    }
}
