use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;

use crate::models::error::CaptureError;
use crate::models::sample::SampleEvent;

/// Create a sample channel.
///
/// `capacity` bounds the number of queued media events; when the queue is
/// full the oldest event is dropped so the producer never waits. `None`
/// queues without bound. The terminal event never counts against capacity
/// and is never dropped.
pub fn sample_channel(capacity: Option<usize>) -> (SampleSender, SampleReceiver) {
    let capacity = capacity.map(|c| c.max(1));
    let (tx, rx) = match capacity {
        // One extra slot keeps room for the terminal event.
        Some(capacity) => flume::bounded(capacity + 1),
        None => flume::unbounded(),
    };

    let shared = Arc::new(Shared {
        closed: Mutex::new(false),
        dropped: AtomicU64::new(0),
        capacity,
        evict: capacity.map(|_| rx.clone()),
    });

    (
        SampleSender {
            tx,
            shared: Arc::clone(&shared),
        },
        SampleReceiver {
            rx,
            shared,
            done: false,
        },
    )
}

struct Shared {
    /// Held across every send so the terminal event is always last.
    closed: Mutex<bool>,
    dropped: AtomicU64,
    capacity: Option<usize>,
    /// Receiver clone used to pop the oldest event of a bounded channel.
    evict: Option<flume::Receiver<SampleEvent>>,
}

/// Producer half. Cheap to clone; safe to call from OS callback threads.
#[derive(Clone)]
pub struct SampleSender {
    tx: flume::Sender<SampleEvent>,
    shared: Arc<Shared>,
}

impl SampleSender {
    /// Queue an event without blocking.
    ///
    /// Terminal events close the channel. Returns `false` if the channel was
    /// already closed and the event was discarded.
    pub fn send(&self, event: SampleEvent) -> bool {
        if event.is_terminal() {
            return self.close_with(event);
        }

        let closed = self.shared.closed.lock();
        if *closed || self.receiver_gone() {
            return false;
        }
        if let Some(capacity) = self.shared.capacity {
            while self.tx.len() >= capacity && self.evict_oldest() {}
        }
        self.push(event)
    }

    /// Close the channel cleanly.
    pub fn finish(&self) -> bool {
        self.close_with(SampleEvent::Finished)
    }

    /// Close the channel with a failure the consumer will see as its last event.
    pub fn fail(&self, error: CaptureError) -> bool {
        self.close_with(SampleEvent::Failed(error))
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.lock() || self.receiver_gone()
    }

    /// Media events discarded because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    fn close_with(&self, terminal: SampleEvent) -> bool {
        let mut closed = self.shared.closed.lock();
        if *closed {
            return false;
        }
        *closed = true;
        !self.receiver_gone() && self.push(terminal)
    }

    fn push(&self, mut event: SampleEvent) -> bool {
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return true,
                Err(flume::TrySendError::Full(back)) if self.evict_oldest() => event = back,
                Err(_) => return false,
            }
        }
    }

    fn evict_oldest(&self) -> bool {
        let evicted = self
            .shared
            .evict
            .as_ref()
            .is_some_and(|evict| evict.try_recv().is_ok());
        if evicted {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        evicted
    }

    /// The consumer's receiver is gone; only the eviction clone remains.
    fn receiver_gone(&self) -> bool {
        self.tx.receiver_count() <= usize::from(self.shared.evict.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// Nothing queued yet, but more may arrive.
    Empty,
    /// The channel is closed and fully drained.
    Closed,
}

/// Consumer half.
///
/// Yields queued media events in order, then the terminal event (if any),
/// then `None` forever. Dropping it closes the channel for every sender.
pub struct SampleReceiver {
    rx: flume::Receiver<SampleEvent>,
    shared: Arc<Shared>,
    done: bool,
}

impl SampleReceiver {
    pub async fn recv(&mut self) -> Option<SampleEvent> {
        if self.done {
            return None;
        }
        match self.rx.recv_async().await {
            Ok(event) => {
                self.done = event.is_terminal();
                Some(event)
            }
            Err(flume::RecvError::Disconnected) => {
                self.done = true;
                None
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<SampleEvent, TryRecvError> {
        if self.done {
            return Err(TryRecvError::Closed);
        }
        match self.rx.try_recv() {
            Ok(event) => {
                self.done = event.is_terminal();
                Ok(event)
            }
            Err(flume::TryRecvError::Empty) => Err(TryRecvError::Empty),
            Err(flume::TryRecvError::Disconnected) => {
                self.done = true;
                Err(TryRecvError::Closed)
            }
        }
    }

    /// Number of events currently waiting, terminal included.
    pub fn len(&self) -> usize {
        if self.done {
            0
        } else {
            self.rx.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn into_stream(self) -> impl Stream<Item = SampleEvent> + Send {
        self.rx.into_stream().scan(self.done, |done, event| {
            let item = if *done {
                None
            } else {
                *done = event.is_terminal();
                Some(event)
            };
            futures::future::ready(item)
        })
    }
}

impl fmt::Debug for SampleReceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleReceiver")
            .field("len", &self.len())
            .field("dropped", &self.dropped())
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;
    use crate::models::sample::SampleBuffer;

    fn audio(n: u8) -> SampleEvent {
        SampleEvent::Audio(SampleBuffer::new(vec![n], Duration::from_millis(n as u64), 1))
    }

    #[tokio::test]
    async fn delivers_in_order_then_terminal() {
        let (tx, mut rx) = sample_channel(None);
        assert!(tx.send(audio(1)));
        assert!(tx.send(audio(2)));
        assert!(tx.finish());

        assert_eq!(rx.recv().await, Some(audio(1)));
        assert_eq!(rx.recv().await, Some(audio(2)));
        assert_eq!(rx.recv().await, Some(SampleEvent::Finished));
        assert_eq!(rx.recv().await, None);
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn overflow_drops_oldest() {
        let (tx, mut rx) = sample_channel(Some(2));
        tx.send(audio(1));
        tx.send(audio(2));
        tx.send(audio(3));

        assert_eq!(tx.dropped(), 1);
        assert_eq!(rx.try_recv(), Ok(audio(2)));
        assert_eq!(rx.try_recv(), Ok(audio(3)));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn terminal_is_never_dropped_and_only_first_wins() {
        let (tx, mut rx) = sample_channel(Some(1));
        tx.send(audio(1));
        assert!(tx.fail(CaptureError::StreamStopped("display removed".into())));
        assert!(!tx.finish());
        assert!(!tx.send(audio(2)));

        assert_eq!(rx.len(), 2);
        assert_eq!(rx.try_recv(), Ok(audio(1)));
        assert_eq!(
            rx.try_recv(),
            Ok(SampleEvent::Failed(CaptureError::StreamStopped(
                "display removed".into()
            )))
        );
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }

    #[tokio::test]
    async fn dropping_all_senders_ends_the_stream() {
        let (tx, mut rx) = sample_channel(None);
        let tx2 = tx.clone();
        tx.send(audio(1));
        drop(tx);
        assert!(!tx2.is_closed());
        drop(tx2);

        assert_eq!(rx.recv().await, Some(audio(1)));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn dropping_receiver_closes_for_senders() {
        for capacity in [None, Some(4)] {
            let (tx, rx) = sample_channel(capacity);
            assert!(!tx.is_closed());
            drop(rx);
            assert!(tx.is_closed());
            assert!(!tx.send(audio(1)));
            assert!(!tx.finish());
        }
    }

    #[test]
    fn bounded_overflow_keeps_room_for_terminal() {
        let (tx, mut rx) = sample_channel(Some(2));
        for n in 1..=5 {
            tx.send(audio(n));
        }
        assert!(tx.finish());

        assert_eq!(rx.dropped(), 3);
        assert_eq!(rx.try_recv(), Ok(audio(4)));
        assert_eq!(rx.try_recv(), Ok(audio(5)));
        assert_eq!(rx.try_recv(), Ok(SampleEvent::Finished));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    }

    #[test]
    fn debug_reports_queue_state() {
        let (tx, rx) = sample_channel(None);
        tx.send(audio(1));
        let rendered = format!("{:?}", rx);
        assert!(rendered.contains("len: 1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn producer_thread_wakes_waiting_consumer() {
        let (tx, rx) = sample_channel(None);

        let producer = std::thread::spawn(move || {
            for n in 0..50u8 {
                tx.send(audio(n));
                if n % 10 == 0 {
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
            tx.finish();
        });

        let events: Vec<SampleEvent> = rx.into_stream().collect().await;
        producer.join().unwrap();

        assert_eq!(events.len(), 51);
        assert_eq!(events.last(), Some(&SampleEvent::Finished));
        for (n, event) in events.iter().take(50).enumerate() {
            assert_eq!(event, &audio(n as u8));
        }
    }
}
