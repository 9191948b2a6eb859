use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, retries: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay for the next attempt, or `MaxRetriesExceeded` once retries are used up
    pub fn next_delay(&mut self) -> Result<Duration, MaxRetriesExceeded> {
        if self.current_attempt >= self.max_retries {
            return Err(MaxRetriesExceeded);
        }

        let factor = 2_u32.saturating_pow(self.current_attempt);
        let delay = self.initial_delay.saturating_mul(factor).min(self.max_delay);
        self.current_attempt += 1;
        Ok(delay)
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        let delay = self.next_delay()?;

        log::warn!(
            "⏳ Retry attempt {} of {} in {:.1}s",
            self.current_attempt,
            self.max_retries,
            delay.as_secs_f64()
        );

        sleep(delay).await;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_up_to_max() {
        let mut backoff = ExponentialBackoff::new(Duration::from_secs(2), Duration::from_secs(10), 5);

        let delays: Vec<u64> = std::iter::from_fn(|| backoff.next_delay().ok())
            .map(|d| d.as_secs())
            .collect();

        assert_eq!(delays, vec![2, 4, 8, 10, 10]);
        assert_eq!(backoff.next_delay(), Err(MaxRetriesExceeded));
    }

    #[test]
    fn test_reset() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1), 1);
        assert!(backoff.next_delay().is_ok());
        assert!(backoff.next_delay().is_err());

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next_delay(), Ok(Duration::from_millis(100)));
    }
}
