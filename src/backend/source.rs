//! Lazy, cancellable event streams.
//!
//! Every backend builds its stream with [`event_source`]: the producer runs
//! on first poll and gets an [`EventSink`]; it hands back an abort hook that
//! runs once if the consumer drops the stream before a terminal event.

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::backend::{EventResult, EventStream};
use crate::http::{HttpError, HttpEvent};

/// Teardown run when a stream is dropped before it finished.
pub type AbortHook = Box<dyn FnOnce() + Send>;

type Subscribe = Box<dyn FnOnce(EventSink) -> AbortHook + Send>;

enum Signal {
    Item(EventResult),
    Complete,
}

/// Producer side of an event stream.
///
/// Emissions after a terminal event, or after the consumer went away, are
/// discarded.
#[derive(Clone)]
pub struct EventSink {
    tx: UnboundedSender<Signal>,
    terminated: Arc<AtomicBool>,
}

impl EventSink {
    fn new(tx: UnboundedSender<Signal>) -> Self {
        Self {
            tx,
            terminated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Emit an event. A `Response` event terminates the stream.
    pub fn next(&self, event: HttpEvent) {
        if event.is_terminal() {
            if self.terminated.swap(true, Ordering::AcqRel) {
                return;
            }
        } else if self.terminated.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(Signal::Item(Ok(event)));
    }

    /// Terminate the stream with an error.
    pub fn error(&self, error: HttpError) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(Signal::Item(Err(error)));
    }

    /// End the stream without a terminal event.
    pub fn complete(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(Signal::Complete);
    }

    /// `true` once the stream has terminated or the consumer dropped it.
    pub fn is_closed(&self) -> bool {
        self.terminated.load(Ordering::Acquire) || self.tx.is_closed()
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct EventSource {
    subscribe: Option<Subscribe>,
    rx: Option<UnboundedReceiver<Signal>>,
    abort: Option<AbortHook>,
    finished: bool,
}

impl EventSource {
    fn finish(&mut self) {
        self.finished = true;
        self.rx = None;
        // Completed normally: the hook is dropped without running.
        self.abort = None;
    }
}

impl Stream for EventSource {
    type Item = EventResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        if let Some(subscribe) = this.subscribe.take() {
            let (tx, rx) = mpsc::unbounded_channel();
            this.rx = Some(rx);
            this.abort = Some(subscribe(EventSink::new(tx)));
        }

        let Some(rx) = this.rx.as_mut() else {
            this.finish();
            return Poll::Ready(None);
        };

        match ready!(rx.poll_recv(cx)) {
            Some(Signal::Item(Ok(event))) => {
                if event.is_terminal() {
                    this.finish();
                }
                Poll::Ready(Some(Ok(event)))
            }
            Some(Signal::Item(Err(error))) => {
                this.finish();
                Poll::Ready(Some(Err(error)))
            }
            Some(Signal::Complete) | None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }
}

impl Drop for EventSource {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Some(abort) = self.abort.take() {
            tracing::trace!("Event stream dropped before completion, aborting");
            abort();
        }
    }
}

/// Build a lazy event stream around `subscribe`.
///
/// `subscribe` runs on first poll. The returned hook runs exactly once if the
/// stream is dropped before a `Response`, an error, or completion.
pub fn event_source<F>(subscribe: F) -> EventStream
where
    F: FnOnce(EventSink) -> AbortHook + Send + 'static,
{
    Box::pin(EventSource {
        subscribe: Some(Box::new(subscribe)),
        rx: None,
        abort: None,
        finished: false,
    })
}

/// Abort hook that does nothing.
pub fn noop_abort() -> AbortHook {
    Box::new(|| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, ResponseBody, ResponseInit};
    use futures_util::StreamExt;
    use std::sync::atomic::AtomicUsize;

    fn response() -> HttpEvent {
        HttpEvent::Response(HttpResponse::new(ResponseInit::default(), ResponseBody::Null))
    }

    #[tokio::test]
    async fn test_subscribe_is_lazy() {
        let subscribed = Arc::new(AtomicBool::new(false));
        let flag = subscribed.clone();
        let stream = event_source(move |sink| {
            flag.store(true, Ordering::SeqCst);
            sink.next(HttpEvent::Sent);
            sink.next(response());
            noop_abort()
        });

        assert!(!subscribed.load(Ordering::SeqCst));
        let events: Vec<_> = stream.collect().await;
        assert!(subscribed.load(Ordering::SeqCst));
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_ends_after_terminal_event() {
        let stream = event_source(|sink| {
            sink.next(response());
            sink.next(HttpEvent::Sent);
            sink.error(HttpError::NoResponse);
            noop_abort()
        });

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(HttpEvent::Response(_))));
    }

    #[tokio::test]
    async fn test_error_terminates() {
        let stream = event_source(|sink| {
            sink.next(HttpEvent::Sent);
            sink.error(HttpError::NoResponse);
            sink.next(response());
            noop_abort()
        });

        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(HttpError::NoResponse)));
    }

    #[tokio::test]
    async fn test_drop_runs_abort_once() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let counter = aborts.clone();
        let (sink_tx, sink_rx) = std::sync::mpsc::channel();
        let mut stream = event_source(move |sink| {
            sink.next(HttpEvent::Sent);
            let _ = sink_tx.send(sink);
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        assert!(matches!(stream.next().await, Some(Ok(HttpEvent::Sent))));
        let sink = sink_rx.recv().unwrap();
        drop(stream);

        assert_eq!(aborts.load(Ordering::SeqCst), 1);
        assert!(sink.is_closed());
        sink.next(response());
        assert_eq!(aborts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_completed_stream_does_not_abort() {
        let aborts = Arc::new(AtomicUsize::new(0));
        let counter = aborts.clone();
        let stream = event_source(move |sink| {
            sink.next(response());
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });

        let _: Vec<_> = stream.collect().await;
        assert_eq!(aborts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unpolled_stream_never_subscribes() {
        let subscribed = Arc::new(AtomicBool::new(false));
        let flag = subscribed.clone();
        let stream = event_source(move |_sink| {
            flag.store(true, Ordering::SeqCst);
            noop_abort()
        });
        drop(stream);
        assert!(!subscribed.load(Ordering::SeqCst));
    }
}
