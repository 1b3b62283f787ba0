// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-call hang detection

use std::future::Future;
use std::time::Duration;

use crate::error::{Result, WardenError};

/// Races a call against a fixed deadline.
///
/// On expiry the call's future is dropped, which aborts any in-flight HTTP
/// exchange. Whatever the server was doing keeps running until the process
/// is restarted.
#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    limit: Duration,
}

impl Watchdog {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub async fn guard<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.limit, call).await {
            Ok(result) => result,
            Err(_) => Err(WardenError::CallTimeout(self.limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let watchdog = Watchdog::new(Duration::from_secs(1));
        let value = watchdog.guard(async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_call_error_passes_through() {
        let watchdog = Watchdog::new(Duration::from_secs(1));
        let err = watchdog
            .guard(async { Err::<(), _>(WardenError::InvalidRequest("empty".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_hung_call_returns_within_bound() {
        let watchdog = Watchdog::new(Duration::from_millis(100));
        let start = Instant::now();

        let err = watchdog
            .guard(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WardenError::CallTimeout(d) if d == Duration::from_millis(100)));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_hung_call_is_cancelled() {
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = DropFlag(dropped.clone());
        let watchdog = Watchdog::new(Duration::from_millis(50));

        let _ = watchdog
            .guard(async move {
                let _flag = flag;
                std::future::pending::<()>().await;
                Ok(())
            })
            .await;

        assert!(dropped.load(Ordering::SeqCst));
    }
}
