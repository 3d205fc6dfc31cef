//! Batching pump between an event producer and a batch consumer.
//!
//! Amortizes conversion and send costs by grouping events into batches,
//! while a ticker bounds how long a partial batch may sit in the buffer.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, AgentResult};

/// Default number of events per batch
const DEFAULT_BATCH_SIZE: usize = 5;

/// Default interval after which a partial batch is flushed
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(200);

/// Size- and time-triggered batching pump.
///
/// The consumer returns `Ok(true)` to keep going, `Ok(false)` to stop the
/// loop cleanly, or an error to stop with that error. The loop ends when the
/// producer closes its channel, the consumer stops it, or the cancellation
/// token fires.
#[derive(Debug, Clone, Copy)]
pub struct EventTunnel {
    batch_size: usize,
    flush_interval: Duration,
}

impl Default for EventTunnel {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl EventTunnel {
    /// Create a tunnel. Zero values fall back to the defaults of 5 events
    /// and 200 ms.
    pub fn new(batch_size: usize, flush_interval: Duration) -> Self {
        Self {
            batch_size: if batch_size == 0 {
                DEFAULT_BATCH_SIZE
            } else {
                batch_size
            },
            flush_interval: if flush_interval.is_zero() {
                DEFAULT_FLUSH_INTERVAL
            } else {
                flush_interval
            },
        }
    }

    /// Batch size in effect
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Flush interval in effect
    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    /// Drive the pump until the producer finishes, the consumer stops it,
    /// or `cancel` fires.
    ///
    /// On cancellation the buffered remainder is flushed best-effort and
    /// [`AgentError::Canceled`] is returned.
    pub async fn run<T, C, Fut>(
        &self,
        mut events: mpsc::Receiver<T>,
        cancel: CancellationToken,
        mut consume: C,
    ) -> AgentResult<()>
    where
        T: Send,
        C: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = AgentResult<bool>>,
    {
        let mut buffer: Vec<T> = Vec::with_capacity(self.batch_size);
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick resolves immediately; it flushes an empty buffer,
        // which is a no-op.

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if !buffer.is_empty() {
                        let _ = consume(std::mem::take(&mut buffer)).await;
                    }
                    return Err(AgentError::Canceled);
                }
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => {
                            buffer.push(event);
                            if buffer.len() >= self.batch_size {
                                match consume(std::mem::take(&mut buffer)).await {
                                    Ok(true) => {}
                                    Ok(false) => return Ok(()),
                                    Err(e) => return Err(e),
                                }
                            }
                        }
                        None => {
                            // Producer finished: flush the remainder once and
                            // surface that flush's error, if any.
                            if buffer.is_empty() {
                                return Ok(());
                            }
                            return consume(std::mem::take(&mut buffer)).await.map(|_| ());
                        }
                    }
                }
                _ = ticker.tick() => {
                    if !buffer.is_empty() {
                        match consume(std::mem::take(&mut buffer)).await {
                            Ok(true) => {}
                            Ok(false) => return Ok(()),
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn collector() -> (
        Arc<Mutex<Vec<Vec<u32>>>>,
        impl FnMut(Vec<u32>) -> std::pin::Pin<Box<dyn Future<Output = AgentResult<bool>> + Send>>,
    ) {
        let batches: Arc<Mutex<Vec<Vec<u32>>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        let consume = move |batch: Vec<u32>| {
            let sink = Arc::clone(&sink);
            Box::pin(async move {
                sink.lock().await.push(batch);
                Ok(true)
            }) as std::pin::Pin<Box<dyn Future<Output = AgentResult<bool>> + Send>>
        };
        (batches, consume)
    }

    #[test]
    fn test_zero_values_fall_back_to_defaults() {
        let tunnel = EventTunnel::new(0, Duration::ZERO);
        assert_eq!(tunnel.batch_size(), 5);
        assert_eq!(tunnel.flush_interval(), Duration::from_millis(200));

        let tunnel = EventTunnel::new(3, Duration::from_millis(50));
        assert_eq!(tunnel.batch_size(), 3);
        assert_eq!(tunnel.flush_interval(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_flush_on_batch_size() {
        let tunnel = EventTunnel::new(2, Duration::from_secs(60));
        let (tx, rx) = mpsc::channel(8);
        let (batches, consume) = collector();

        for i in 0..5u32 {
            tx.send(i).await.unwrap();
        }
        drop(tx);

        tunnel
            .run(rx, CancellationToken::new(), consume)
            .await
            .unwrap();

        let batches = batches.lock().await;
        assert_eq!(*batches, vec![vec![0, 1], vec![2, 3], vec![4]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_flushes_partial_batch() {
        let tunnel = EventTunnel::new(10, Duration::from_millis(200));
        let (tx, rx) = mpsc::channel(8);
        let (batches, consume) = collector();

        let pump = tokio::spawn(async move {
            tunnel.run(rx, CancellationToken::new(), consume).await
        });

        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        // Let the ticker fire with a partial buffer.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(batches.lock().await.as_slice(), &[vec![1, 2]]);

        drop(tx);
        pump.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_consumer_false_stops_cleanly() {
        let tunnel = EventTunnel::new(1, Duration::from_secs(60));
        let (tx, rx) = mpsc::channel(16);
        let consumed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&consumed);

        for i in 0..10u32 {
            tx.send(i).await.unwrap();
        }

        let result = tunnel
            .run(rx, CancellationToken::new(), move |batch: Vec<u32>| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(batch.len(), Ordering::SeqCst);
                    // Stop after the third batch.
                    Ok(counter.load(Ordering::SeqCst) < 3)
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(consumed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_consumer_error_propagates() {
        let tunnel = EventTunnel::new(1, Duration::from_secs(60));
        let (tx, rx) = mpsc::channel(8);
        tx.send(1u32).await.unwrap();

        let result = tunnel
            .run(rx, CancellationToken::new(), |_batch: Vec<u32>| async {
                Err(AgentError::agent("sink failed"))
            })
            .await;

        assert!(matches!(result, Err(AgentError::Agent(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_flushes_remainder() {
        let tunnel = EventTunnel::new(10, Duration::from_secs(60));
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let (batches, consume) = collector();

        tx.send(7).await.unwrap();
        let pump = tokio::spawn({
            let cancel = cancel.clone();
            async move { tunnel.run(rx, cancel, consume).await }
        });

        // Let the pump buffer the event before cancelling.
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let result = pump.await.unwrap();
        assert!(matches!(result, Err(AgentError::Canceled)));
        assert_eq!(batches.lock().await.as_slice(), &[vec![7]]);
        drop(tx);
    }

    #[tokio::test]
    async fn test_producer_close_flushes_remainder() {
        let tunnel = EventTunnel::new(10, Duration::from_secs(60));
        let (tx, rx) = mpsc::channel(8);
        let (batches, consume) = collector();

        tx.send(1).await.unwrap();
        tx.send(2).await.unwrap();
        drop(tx);

        tunnel
            .run(rx, CancellationToken::new(), consume)
            .await
            .unwrap();
        assert_eq!(batches.lock().await.as_slice(), &[vec![1, 2]]);
    }

    #[tokio::test]
    async fn test_final_flush_error_is_returned() {
        let tunnel = EventTunnel::new(10, Duration::from_secs(60));
        let (tx, rx) = mpsc::channel(8);
        tx.send(1u32).await.unwrap();
        drop(tx);

        let result = tunnel
            .run(rx, CancellationToken::new(), |_batch: Vec<u32>| async {
                Err(AgentError::transport("send failed"))
            })
            .await;
        assert!(matches!(result, Err(AgentError::Transport(_))));
    }
}
