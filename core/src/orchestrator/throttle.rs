use tokio::time::{Duration, Instant};

/// Lets an action through at most once per `min_gap`.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_gap: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_gap: Duration) -> Self {
        Self { min_gap, last: None }
    }

    /// Returns `true` and records the attempt when the gap has elapsed.
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        let open = self
            .last
            .map_or(true, |last| now.duration_since(last) >= self.min_gap);
        if open {
            self.last = Some(now);
        }
        open
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn gap_is_enforced_on_paused_clock() {
        let mut throttle = Throttle::new(Duration::from_secs(30));
        assert!(throttle.ready());
        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(!throttle.ready());
        tokio::time::advance(Duration::from_secs(15)).await;
        assert!(throttle.ready());
        throttle.reset();
        assert!(throttle.ready());
    }
}
