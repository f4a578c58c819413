//! Shared, incrementally updated view of a running session.

use std::sync::Arc;

use probe_proto::{CriticalIssue, Session, Suite, TestCase};
use tokio::sync::RwLock;

/// Cloneable handle to the session the engine is filling in.
///
/// Readers get consistent snapshots while the engine is still writing;
/// the engine holds the write lock only for the duration of one update.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// Point-in-time copy of the session.
    ///
    /// Metrics of suites still running are recomputed on the copy, since
    /// [`SessionHandle::update_case`] only stores the case outcome.
    pub async fn snapshot(&self) -> Session {
        let mut session = self.inner.read().await.clone();
        let mut stale = false;
        for suite in session.suites.values_mut().filter(|s| !s.finalized) {
            suite.refresh_metrics();
            stale = true;
        }
        if stale {
            session.refresh_results();
        }
        session
    }

    pub async fn id(&self) -> String {
        self.inner.read().await.id.clone()
    }

    /// Stores the suite's current state and refreshes the overall results.
    pub async fn upsert_suite(&self, mut suite: Suite) {
        suite.refresh_metrics();
        let mut session = self.inner.write().await;
        session.upsert_suite(suite);
        session.refresh_results();
    }

    /// Stores one finished case of a suite already in the session.
    ///
    /// Returns false when the suite or index is unknown.
    pub async fn update_case(&self, suite: &str, index: usize, case: TestCase) -> bool {
        let mut session = self.inner.write().await;
        match session
            .suites
            .get_mut(suite)
            .and_then(|stored| stored.cases.get_mut(index))
        {
            Some(slot) => {
                *slot = case;
                true
            }
            None => false,
        }
    }

    pub async fn record_issue(&self, issue: CriticalIssue) {
        self.inner.write().await.record_issue(issue);
    }

    /// Freezes the session and returns the final copy.
    pub async fn finalize(&self) -> Session {
        let mut session = self.inner.write().await;
        session.finalize();
        session.clone()
    }

    pub async fn is_finalized(&self) -> bool {
        self.inner.read().await.is_finalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probe_proto::{CaseStatus, Environment, ErrorKind, SessionStatus};

    #[tokio::test]
    async fn test_snapshot_sees_incremental_updates() {
        let handle = SessionHandle::new(Session::new("s1", Environment::new("dev", "http://x")));
        let reader = handle.clone();

        handle.upsert_suite(Suite::new("catalog")).await;
        let snapshot = reader.snapshot().await;
        assert_eq!(snapshot.plan, vec!["catalog".to_string()]);
        assert!(!snapshot.is_finalized());

        handle
            .record_issue(CriticalIssue::new(ErrorKind::SuiteSetup, "catalog", "boom"))
            .await;
        let done = handle.finalize().await;
        assert!(reader.is_finalized().await);
        assert_eq!(done.critical_issues.len(), 1);
        // Nothing executed.
        assert_eq!(done.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn test_update_case_replaces_single_case() {
        let handle = SessionHandle::new(Session::new("s1", Environment::new("dev", "http://x")));
        let suite = Suite::new("catalog")
            .with_case(TestCase::get("list", "/produtos"))
            .with_case(TestCase::get("detail", "/produtos/1"));
        handle.upsert_suite(suite).await;

        let mut done = TestCase::get("detail", "/produtos/1");
        done.status = CaseStatus::Passed;
        assert!(handle.update_case("catalog", 1, done).await);
        assert!(!handle.update_case("catalog", 5, TestCase::get("x", "/x")).await);
        assert!(!handle.update_case("missing", 0, TestCase::get("x", "/x")).await);

        let snapshot = handle.snapshot().await;
        let stored = &snapshot.suites["catalog"];
        assert_eq!(stored.cases[0].status, CaseStatus::Pending);
        assert_eq!(stored.cases[1].status, CaseStatus::Passed);
        assert_eq!(stored.metrics.passed, 1);
        assert_eq!(snapshot.results.passed, 1);
    }
}
