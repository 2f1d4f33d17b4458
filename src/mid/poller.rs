use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, instrument};

use super::{MidConnector, MidError, SessionKind, SessionState, SessionStatus};

/// Polls a session until it reaches a final state.
#[derive(Debug, Clone)]
pub struct SessionStatusPoller {
    long_poll_timeout: Duration,
    poll_interval: Duration,
    session_timeout: Duration,
}

impl SessionStatusPoller {
    pub fn new(long_poll_timeout: Duration, session_timeout: Duration) -> Self {
        Self {
            long_poll_timeout,
            poll_interval: Duration::ZERO,
            session_timeout,
        }
    }

    /// Waits between two consecutive status queries.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Fetches the final status of a session.
    ///
    /// Returns the status of a successful session or the error matching its
    /// result code. A session still running after the session timeout is
    /// reported as [`MidError::SessionTimeout`].
    #[instrument(skip(self, connector))]
    pub async fn fetch_final_session_status(
        &self,
        connector: &dyn MidConnector,
        kind: SessionKind,
        session_id: &str,
    ) -> Result<SessionStatus, MidError> {
        let deadline = Instant::now() + self.session_timeout;

        loop {
            let status = connector
                .get_session_status(kind, session_id, self.long_poll_timeout)
                .await?;

            if status.state == SessionState::Complete {
                debug!(result = ?status.result, "Session completed");
                return status.into_final_result();
            }

            if Instant::now() >= deadline {
                return Err(MidError::SessionTimeout);
            }
            debug!("Session still running");
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mid::SessionResult;
    use crate::mid::testing::StubConnector;

    fn poller() -> SessionStatusPoller {
        SessionStatusPoller::new(Duration::from_secs(1), Duration::from_secs(10))
            .with_poll_interval(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_polls_until_complete() {
        let connector = StubConnector::new()
            .with_status(SessionStatus::running())
            .with_status(SessionStatus::running())
            .with_status(SessionStatus::complete(SessionResult::Ok));

        let status = poller()
            .fetch_final_session_status(&connector, SessionKind::Authentication, "session")
            .await
            .unwrap();

        assert_eq!(status.result, Some(SessionResult::Ok));
        assert_eq!(connector.status_queries(), 3);
    }

    #[tokio::test]
    async fn test_maps_final_result() {
        let connector =
            StubConnector::new().with_status(SessionStatus::complete(SessionResult::UserCancelled));

        let result = poller()
            .fetch_final_session_status(&connector, SessionKind::Signature, "session")
            .await;

        assert!(matches!(result, Err(MidError::UserCancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_session_times_out() {
        // The stub repeats its last status forever
        let connector = StubConnector::new().with_status(SessionStatus::running());

        let result = poller()
            .fetch_final_session_status(&connector, SessionKind::Authentication, "session")
            .await;

        assert!(matches!(result, Err(MidError::SessionTimeout)));
        assert!(connector.status_queries() > 1);
    }
}
