use crate::db::TallyStore;
use crate::error::{RemoteError, TransportError};
use crate::handlers::{Resolution, SubmissionOutcome, SubmissionState};
use crate::models::{Ballot, BallotForm, Notice, NoticeKind, RankedResult, SubmissionRecord, Tally};
use crate::remote::{SubmissionClient, SubmissionStrategy};
use crate::voting::{self, ballot, ranked};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const THANKS: &str = "Thank you for your vote!";

/// One voter-facing survey session: holds the local tally and drives
/// submissions through the configured strategy.
///
/// `submit` takes `&mut self`, so a session never has two submissions in flight.
pub struct SurveySession {
    store: Arc<dyn TallyStore>,
    client: Option<Arc<dyn SubmissionClient>>,
    strategy: SubmissionStrategy,
    timeout: Duration,
    tally: Tally,
    // Ballots already merged into the local tally
    merged: HashSet<Uuid>,
    state: SubmissionState,
}

impl SurveySession {
    pub async fn open(
        store: Arc<dyn TallyStore>,
        client: Option<Arc<dyn SubmissionClient>>,
        strategy: SubmissionStrategy,
        timeout: Duration,
    ) -> Result<Self, crate::error::StoreError> {
        let tally = store.load_tally().await?;
        info!("Loaded local tally with {} flavor(s)", tally.len());

        Ok(Self {
            store,
            client,
            strategy,
            timeout,
            tally,
            merged: HashSet::new(),
            state: SubmissionState::Idle,
        })
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn current_results(&self) -> Vec<RankedResult> {
        voting::leaderboard(&self.tally)
    }

    /// Validates the form and submits the resulting ballot.
    pub async fn submit(&mut self, form: &BallotForm) -> SubmissionOutcome {
        match ballot::validate(form) {
            Ok(ballot) => self.submit_ballot(&ballot).await,
            Err(e) => {
                info!("Ballot rejected: {}", e);
                SubmissionOutcome::rejected(&e)
            }
        }
    }

    /// Sends an already validated ballot. Safe to call again for the same
    /// ballot after a failure: the local tally counts each ballot id once.
    pub async fn submit_ballot(&mut self, ballot: &Ballot) -> SubmissionOutcome {
        self.transition(SubmissionState::Submitting, ballot.id);

        let client = self.client.clone().filter(|_| self.strategy.needs_endpoint());
        let Some(client) = client else {
            return self.finish_locally(ballot).await;
        };

        let record = SubmissionRecord::from(ballot);
        let response = self.bounded(client.submit(&record)).await;

        match response {
            Ok(response) if !response.success => {
                let message = response.message.unwrap_or_else(|| "submission was refused".to_string());
                self.finish_failed(ballot, TransportError::new(None, message)).await
            }
            Ok(response) => {
                let resolution = match response.tally() {
                    Some(tally) => Resolution::Remote(tally),
                    None => {
                        debug!("Submission acknowledged without results, fetching aggregate");
                        self.secondary_fetch(client.as_ref()).await
                    }
                };
                self.finish_succeeded(ballot, resolution).await
            }
            Err(RemoteError::Parse(e)) => {
                warn!("Submission response for ballot {} unreadable: {}", ballot.id, e);
                let resolution = self.secondary_fetch(client.as_ref()).await;
                self.finish_succeeded(ballot, resolution).await
            }
            Err(RemoteError::Transport(e)) => self.finish_failed(ballot, e).await,
        }
    }

    async fn secondary_fetch(&self, client: &dyn SubmissionClient) -> Resolution {
        match self.bounded(client.fetch_results()).await {
            Ok(response) => match response.tally() {
                Some(tally) => Resolution::Remote(tally),
                None => {
                    warn!("Results fetch returned no numbers");
                    Resolution::Acknowledged
                }
            },
            Err(e) => {
                warn!("Results fetch failed: {}", e);
                Resolution::Acknowledged
            }
        }
    }

    async fn finish_locally(&mut self, ballot: &Ballot) -> SubmissionOutcome {
        let saved = self.merge_locally(ballot).await;
        self.transition(SubmissionState::Succeeded, ballot.id);

        SubmissionOutcome {
            ballot_id: Some(ballot.id),
            state: self.state,
            resolution: Some(Resolution::Local(self.tally.clone())),
            notice: saved_notice(saved, NoticeKind::Success, THANKS),
        }
    }

    async fn finish_succeeded(&mut self, ballot: &Ballot, resolution: Resolution) -> SubmissionOutcome {
        let saved = self.merge_locally(ballot).await;
        self.transition(SubmissionState::Succeeded, ballot.id);

        let message = match resolution {
            Resolution::Acknowledged => "Thank you for your vote! Live results are not available right now.",
            _ => THANKS,
        };

        SubmissionOutcome {
            ballot_id: Some(ballot.id),
            state: self.state,
            resolution: Some(resolution),
            notice: saved_notice(saved, NoticeKind::Success, message),
        }
    }

    // The remote never got the vote: keep it locally and warn, never error
    async fn finish_failed(&mut self, ballot: &Ballot, err: TransportError) -> SubmissionOutcome {
        warn!("Submission of ballot {} failed: {}", ballot.id, err);
        let saved = self.merge_locally(ballot).await;
        self.transition(SubmissionState::FailedRemote, ballot.id);

        SubmissionOutcome {
            ballot_id: Some(ballot.id),
            state: self.state,
            resolution: Some(Resolution::Local(self.tally.clone())),
            notice: saved_notice(
                saved,
                NoticeKind::Warning,
                "Could not reach the survey server. Your vote was counted locally.",
            ),
        }
    }

    // Returns false only when the merged tally could not be persisted
    async fn merge_locally(&mut self, ballot: &Ballot) -> bool {
        if !self.merged.insert(ballot.id) {
            debug!("Ballot {} already merged locally, skipping", ballot.id);
            return true;
        }

        self.tally = ranked::merge(std::mem::take(&mut self.tally), ballot);

        match self.store.save_tally(&self.tally).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to persist tally after ballot {}: {}", ballot.id, e);
                false
            }
        }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::new(None, format!("no response after {:?}", self.timeout)).into()),
        }
    }

    fn transition(&mut self, next: SubmissionState, ballot_id: Uuid) {
        info!("Ballot {}: {:?} -> {:?}", ballot_id, self.state, next);
        self.state = next;
    }
}

fn saved_notice(saved: bool, kind: NoticeKind, message: &str) -> Notice {
    if saved {
        Notice::new(kind, message)
    } else {
        Notice::new(
            NoticeKind::Warning,
            format!("{} (the local results could not be saved)", message),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::{ParseError, StoreError};
    use crate::models::{RemoteResponse, RemoteResult};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Reply = Result<RemoteResponse, RemoteError>;

    // Replays canned replies in order; an exhausted script hangs forever
    #[derive(Default)]
    struct ScriptedClient {
        submits: Mutex<VecDeque<Reply>>,
        fetches: Mutex<VecDeque<Reply>>,
        submit_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(submits: Vec<Reply>, fetches: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                submits: Mutex::new(submits.into()),
                fetches: Mutex::new(fetches.into()),
                ..Default::default()
            })
        }
    }

    async fn next_reply(queue: &Mutex<VecDeque<Reply>>) -> Reply {
        let reply = queue.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply,
            None => std::future::pending().await,
        }
    }

    #[async_trait]
    impl SubmissionClient for ScriptedClient {
        async fn submit(&self, _record: &SubmissionRecord) -> Result<RemoteResponse, RemoteError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            next_reply(&self.submits).await
        }

        async fn fetch_results(&self) -> Result<RemoteResponse, RemoteError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            next_reply(&self.fetches).await
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl TallyStore for BrokenStore {
        async fn load_tally(&self) -> Result<Tally, StoreError> {
            Ok(Tally::new())
        }

        async fn save_tally(&self, _tally: &Tally) -> Result<(), StoreError> {
            Err(serde_json::from_str::<u8>("disk full").unwrap_err().into())
        }
    }

    fn ack() -> Reply {
        Ok(RemoteResponse {
            success: true,
            results: None,
            message: None,
        })
    }

    fn aggregate(rows: &[(&str, u64)]) -> Reply {
        Ok(RemoteResponse {
            success: true,
            results: Some(
                rows.iter()
                    .map(|(flavor, points)| RemoteResult {
                        flavor: flavor.to_string(),
                        points: *points,
                    })
                    .collect(),
            ),
            message: None,
        })
    }

    fn transport_failure() -> Reply {
        Err(TransportError::new(Some(503), "Service Unavailable").into())
    }

    fn form(first: &str, second: &str, third: &str) -> BallotForm {
        BallotForm {
            name: Some("Sam".to_string()),
            first_choice: Some(first.to_string()),
            second_choice: Some(second.to_string()),
            third_choice: Some(third.to_string()),
            suggestion: None,
        }
    }

    async fn memory_store() -> Arc<Database> {
        Arc::new(Database::new("sqlite::memory:").await.unwrap())
    }

    async fn remote_session(store: Arc<Database>, client: Arc<ScriptedClient>) -> SurveySession {
        SurveySession::open(store, Some(client), SubmissionStrategy::JsonPost, Duration::from_millis(50))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn local_strategy_merges_and_persists() {
        let store = memory_store().await;
        let mut session = SurveySession::open(store.clone(), None, SubmissionStrategy::LocalOnly, Duration::from_secs(1))
            .await
            .unwrap();

        let outcome = session.submit(&form("Tiramisu", "Parmesan", "Spruce Tips")).await;

        assert_eq!(outcome.state, SubmissionState::Succeeded);
        assert_eq!(outcome.notice.kind, NoticeKind::Success);
        let results = outcome.results().unwrap();
        let rows: Vec<(&str, u64, u32)> = results.iter().map(|r| (r.flavor.as_str(), r.points, r.percentage)).collect();
        assert_eq!(rows, vec![("Tiramisu", 3, 50), ("Parmesan", 2, 33), ("Spruce Tips", 1, 17)]);

        let stored = store.load_tally().await.unwrap();
        assert_eq!(&stored, session.tally());
    }

    #[tokio::test]
    async fn invalid_ballot_never_leaves_idle() {
        let client = ScriptedClient::new(vec![], vec![]);
        let mut session = remote_session(memory_store().await, client.clone()).await;

        let outcome = session.submit(&form("", "Parmesan", "")).await;
        assert_eq!(outcome.state, SubmissionState::Idle);
        assert_eq!(outcome.notice.kind, NoticeKind::Error);
        assert!(outcome.resolution.is_none());

        let outcome = session.submit(&form("Parmesan", "Parmesan", "")).await;
        assert!(outcome.notice.message.contains("Parmesan"));
        assert_eq!(client.submit_calls.load(Ordering::SeqCst), 0);
        assert!(session.tally().is_empty());
    }

    #[tokio::test]
    async fn remote_aggregate_is_authoritative() {
        let client = ScriptedClient::new(vec![aggregate(&[("Salted Caramel", 40), ("Tiramisu", 12)])], vec![]);
        let mut session = remote_session(memory_store().await, client.clone()).await;

        let outcome = session.submit(&form("Tiramisu", "", "")).await;

        assert_eq!(outcome.state, SubmissionState::Succeeded);
        match outcome.resolution {
            Some(Resolution::Remote(ref tally)) => assert_eq!(tally.points("Salted Caramel"), 40),
            ref other => panic!("expected remote resolution, got {:?}", other),
        }
        // Local tally still records the vote
        assert_eq!(session.tally().points("Tiramisu"), 3);
        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn acknowledgement_triggers_secondary_fetch() {
        let client = ScriptedClient::new(vec![ack()], vec![aggregate(&[("Parmesan", 7)])]);
        let mut session = remote_session(memory_store().await, client.clone()).await;

        let outcome = session.submit(&form("Parmesan", "", "")).await;

        assert_eq!(client.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.results().unwrap()[0].points, 7);
    }

    #[tokio::test]
    async fn unreadable_response_and_failed_fetch_end_acknowledged() {
        let client = ScriptedClient::new(
            vec![Err(ParseError::new("expected value").into())],
            vec![transport_failure()],
        );
        let mut session = remote_session(memory_store().await, client).await;

        let outcome = session.submit(&form("Spruce Tips", "", "")).await;

        assert_eq!(outcome.state, SubmissionState::Succeeded);
        assert_eq!(outcome.resolution, Some(Resolution::Acknowledged));
        assert!(outcome.results().is_none());
        assert_eq!(outcome.notice.kind, NoticeKind::Success);
        assert_eq!(session.tally().points("Spruce Tips"), 3);
    }

    #[tokio::test]
    async fn transport_failure_falls_back_to_local_with_warning() {
        let store = memory_store().await;
        let client = ScriptedClient::new(vec![transport_failure()], vec![]);
        let mut session = remote_session(store.clone(), client).await;

        let outcome = session.submit(&form("Tiramisu", "Parmesan", "")).await;

        assert_eq!(outcome.state, SubmissionState::FailedRemote);
        assert_eq!(outcome.notice.kind, NoticeKind::Warning);
        assert_eq!(session.tally().points("Tiramisu"), 3);
        assert_eq!(session.tally().points("Parmesan"), 2);
        assert_eq!(store.load_tally().await.unwrap().points("Tiramisu"), 3);
    }

    #[tokio::test]
    async fn refused_submission_counts_as_remote_failure() {
        let refused = Ok(RemoteResponse {
            success: false,
            results: None,
            message: Some("sheet is locked".to_string()),
        });
        let client = ScriptedClient::new(vec![refused], vec![]);
        let mut session = remote_session(memory_store().await, client).await;

        let outcome = session.submit(&form("Salty Vanilla", "", "")).await;
        assert_eq!(outcome.state, SubmissionState::FailedRemote);
        assert_eq!(session.tally().points("Salty Vanilla"), 3);
    }

    #[tokio::test]
    async fn hung_endpoint_times_out_into_fallback() {
        // Empty script: every call hangs
        let client = ScriptedClient::new(vec![], vec![]);
        let mut session = remote_session(memory_store().await, client).await;

        let outcome = session.submit(&form("Orange-Szechuan", "", "")).await;

        assert_eq!(outcome.state, SubmissionState::FailedRemote);
        assert_eq!(session.state(), SubmissionState::FailedRemote);
        assert_eq!(session.tally().points("Orange-Szechuan"), 3);
    }

    #[tokio::test]
    async fn retrying_a_ballot_does_not_double_count_locally() {
        let client = ScriptedClient::new(vec![transport_failure(), aggregate(&[("Tiramisu", 30)])], vec![]);
        let mut session = remote_session(memory_store().await, client.clone()).await;

        let ballot = ballot::validate(&form("Tiramisu", "", "")).unwrap();
        let first = session.submit_ballot(&ballot).await;
        assert_eq!(first.state, SubmissionState::FailedRemote);

        let retry = session.submit_ballot(&ballot).await;
        assert_eq!(retry.state, SubmissionState::Succeeded);
        assert_eq!(session.tally().points("Tiramisu"), 3);
        assert_eq!(client.submit_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_ballots_with_same_choice_both_count() {
        let store = memory_store().await;
        let mut session = SurveySession::open(store, None, SubmissionStrategy::LocalOnly, Duration::from_secs(1))
            .await
            .unwrap();

        session.submit(&form("Tiramisu", "", "")).await;
        session.submit(&form("Tiramisu", "", "")).await;
        assert_eq!(session.tally().points("Tiramisu"), 6);
    }

    #[tokio::test]
    async fn persistence_failure_downgrades_notice_to_warning() {
        let mut session = SurveySession::open(Arc::new(BrokenStore), None, SubmissionStrategy::LocalOnly, Duration::from_secs(1))
            .await
            .unwrap();

        let outcome = session.submit(&form("Parmesan", "", "")).await;
        assert_eq!(outcome.state, SubmissionState::Succeeded);
        assert_eq!(outcome.notice.kind, NoticeKind::Warning);
        assert_eq!(session.tally().points("Parmesan"), 3);
    }

    #[tokio::test]
    async fn session_resumes_from_stored_tally() {
        let store = memory_store().await;
        let mut seeded = Tally::new();
        seeded.add("Salted Caramel", 9);
        store.save_tally(&seeded).await.unwrap();

        let session = SurveySession::open(store, None, SubmissionStrategy::LocalOnly, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(session.current_results()[0].flavor, "Salted Caramel");
    }
}
