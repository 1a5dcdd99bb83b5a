//! Latest-wins rate limiting for telemetry streams.

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior, interval};

/// Extension trait to add latest-wins rate limiting to any Stream.
pub trait ThrottleExt: Stream {
    /// Emit at most one item per `duration`.
    ///
    /// If several frames arrive within an interval only the newest survives;
    /// telemetry consumers want the latest state, not a backlog.
    fn throttle(self, duration: Duration) -> Throttle<Self>
    where
        Self: Sized,
    {
        Throttle::new(self, duration)
    }
}

impl<T: Stream> ThrottleExt for T {}

pin_project! {
    /// Stream combinator produced by [`ThrottleExt::throttle`].
    pub struct Throttle<S: Stream> {
        #[pin]
        stream: S,
        interval: Interval,
        pending: Option<S::Item>,
        source_done: bool,
    }
}

impl<S: Stream> Throttle<S> {
    pub fn new(stream: S, duration: Duration) -> Self {
        let mut interval = interval(duration);
        // Skip missed ticks instead of bursting to catch up.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { stream, interval, pending: None, source_done: false }
    }
}

impl<S: Stream> Stream for Throttle<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain whatever the source has ready, keeping only the newest item.
        while !*this.source_done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => *this.pending = Some(item),
                Poll::Ready(None) => *this.source_done = true,
                Poll::Pending => break,
            }
        }

        if this.pending.is_some() {
            // Gate emission on the interval. The first tick completes
            // immediately, so the first frame is never delayed.
            ready!(this.interval.poll_tick(cx));
            return Poll::Ready(this.pending.take());
        }

        if *this.source_done {
            return Poll::Ready(None);
        }

        Poll::Pending
    }
}
