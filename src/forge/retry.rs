//! Retry policy for transient failures.

use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::error::{GfError, Result};

const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 500;
const MAX_ANTI_BOT_RETRIES: u32 = 1;

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Wait before the first retry; doubles for each one after.
    pub base_delay: Duration,
    /// How many times an anti-bot block is retried after a cookie reset.
    pub anti_bot_retries: u32,
}

impl RetryPolicy {
    #[cfg(test)]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Wait before retry `attempt` (1-based): base, 2x base, 4x base, ...
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Runs `op` until it succeeds, fails definitively, or retries run out.
    ///
    /// Network failures are retried up to `max_retries` times. Anti-bot blocks
    /// share that budget but are only retried `anti_bot_retries` times; the op
    /// is expected to have reset cookies before reporting the block.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut anti_bot_retries = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(GfError::Cancelled);
            }

            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let retry = err.is_retriable()
                && attempt < self.max_retries
                && (!err.is_anti_bot_block() || anti_bot_retries < self.anti_bot_retries);
            if !retry {
                return Err(err);
            }
            if err.is_anti_bot_block() {
                anti_bot_retries += 1;
            }

            attempt += 1;
            let delay = self.delay_for_attempt(attempt);
            debug!(
                "{err}; retrying in {}ms ({attempt}/{})",
                delay.as_millis(),
                self.max_retries
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Retry wait interrupted by cancellation");
                    return Err(GfError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
            anti_bot_retries: MAX_ANTI_BOT_RETRIES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Mutex, OnceLock};
    use std::time::Instant;

    use log::{Level, LevelFilter, Log, Metadata, Record};

    /// Keeps every record so tests can check what a default filter would show.
    struct Recorder(Mutex<Vec<(Level, String)>>);

    impl Log for Recorder {
        fn enabled(&self, _: &Metadata<'_>) -> bool {
            true
        }

        fn log(&self, record: &Record<'_>) {
            if let Ok(mut records) = self.0.lock() {
                records.push((record.level(), record.args().to_string()));
            }
        }

        fn flush(&self) {}
    }

    fn recorder() -> &'static Recorder {
        static RECORDER: OnceLock<&'static Recorder> = OnceLock::new();
        RECORDER.get_or_init(|| {
            let recorder: &'static Recorder = Box::leak(Box::new(Recorder(Mutex::new(Vec::new()))));
            log::set_logger(recorder).unwrap();
            log::set_max_level(LevelFilter::Trace);
            recorder
        })
    }

    fn fast() -> RetryPolicy {
        RetryPolicy::default().with_base_delay(Duration::from_millis(1))
    }

    async fn fail_n_times(policy: &RetryPolicy, failures: u32, err: fn() -> GfError) -> (Result<&'static str>, u32) {
        let calls = AtomicU32::new(0);
        let result = policy
            .run(&CancellationToken::new(), |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < failures {
                        Err(err())
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[test]
    fn default_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn recovers_from_fewer_than_four_network_failures() {
        for k in 0..4 {
            let (result, calls) =
                fail_n_times(&fast(), k, || GfError::Network("reset".into())).await;
            assert_eq!(result.unwrap(), "ok", "k = {k}");
            assert_eq!(calls, k + 1);
        }
    }

    #[tokio::test]
    async fn gives_up_after_four_network_failures() {
        let (result, calls) = fail_n_times(&fast(), 4, || GfError::Network("reset".into())).await;
        assert!(result.unwrap_err().is_network());
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn anti_bot_block_is_retried_once() {
        let (result, calls) = fail_n_times(&fast(), 1, || GfError::AntiBotBlock).await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 2);

        let (result, calls) = fail_n_times(&fast(), 2, || GfError::AntiBotBlock).await;
        assert!(result.unwrap_err().is_anti_bot_block());
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn retries_stay_below_the_warning_level() {
        let recorder = recorder();
        let (result, _) = fail_n_times(&fast(), 2, || GfError::Network("flaky".into())).await;
        assert_eq!(result.unwrap(), "ok");

        let records = recorder.0.lock().unwrap();
        let retries: Vec<_> = records
            .iter()
            .filter(|(_, message)| message.contains("flaky; retrying"))
            .collect();
        assert_eq!(retries.len(), 2);
        assert!(retries.iter().all(|(level, _)| *level == Level::Debug));
    }

    #[tokio::test]
    async fn http_errors_are_not_retried() {
        let (result, calls) = fail_n_times(&fast(), 1, || GfError::api(500, None)).await;
        assert_eq!(result.unwrap_err().status(), Some(500));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_secs(30));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: Result<()> = policy
            .run(&cancel, |_| async { Err(GfError::Network("down".into())) })
            .await;

        assert!(result.unwrap_err().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
