//! Heartbeat timer of the connection engine

use std::{task::Poll, time::Duration};

use futures_util::Stream;
use pin_project_lite::pin_project;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

pin_project! {
    /// Ticks at a fixed period, or never if heartbeats are disabled
    #[derive(Debug)]
    pub struct HeartBeat {
        #[pin]
        interval: Option<IntervalStream>
    }
}

impl HeartBeat {
    /// A [`HeartBeat`] that never ticks
    pub fn never() -> Self {
        Self { interval: None }
    }

    /// A [`HeartBeat`] that ticks every `period`, starting one period from now
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval: Some(IntervalStream::new(interval)),
        }
    }

    /// Builds the timer for a negotiated heartbeat of `seconds`. The timer ticks at half
    /// the interval so that a frame goes out at least once per interval.
    pub fn negotiated(seconds: u16) -> Self {
        match seconds {
            0 => Self::never(),
            s => Self::new(Duration::from_millis(s as u64 * 500)),
        }
    }

    /// Returns whether the timer ever ticks
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }
}

impl Stream for HeartBeat {
    type Item = Instant;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.project();
        match this.interval.as_pin_mut() {
            Some(stream) => stream.poll_next(cx),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::StreamExt;

    use super::HeartBeat;

    #[tokio::test(start_paused = true)]
    async fn test_negotiated_ticks_at_half_interval() {
        let mut heartbeat = HeartBeat::negotiated(10);
        assert!(heartbeat.is_enabled());

        let start = tokio::time::Instant::now();
        heartbeat.next().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_ticks() {
        let mut heartbeat = HeartBeat::negotiated(0);
        assert!(!heartbeat.is_enabled());
        let result = tokio::time::timeout(Duration::from_secs(3600), heartbeat.next()).await;
        assert!(result.is_err());
    }
}
