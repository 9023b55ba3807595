use async_trait::async_trait;
use futures::FutureExt;
use futures::StreamExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, broadcast};
use uuid::Uuid;

use crate::auth::provider::SessionVerifier;
use crate::models::session::AuthenticatedSession;

/// Redis pub/sub channel carrying session notices between processes.
pub const SESSION_EVENTS_CHANNEL: &str = "auth:session-events";

/// Buffered notices per subscriber before the slowest one starts lagging.
const EVENT_BUFFER: usize = 16;

/// Seconds between bridge reconnect attempts.
const BRIDGE_RETRY_SECS: u64 = 5;

/// A change in session state, published to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "subject", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A session was established for the subject.
    SignedIn(String),
    /// The session ended or was invalidated.
    SignedOut,
    /// The cached session was re-confirmed for the subject.
    Refreshed(String),
}

/// A [`SessionEvent`] tagged with the store that produced it, so a process
/// never re-applies its own notice when it echoes back over the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionNotice {
    pub origin: Uuid,
    pub event: SessionEvent,
}

/// How a stale cached session gets re-confirmed.
///
/// Returning `None` means the session could not be confirmed; the store
/// fails closed and drops it from the cache.
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self, current: Option<AuthenticatedSession>) -> Option<AuthenticatedSession>;
}

/// `SessionRefresher` that re-presents the cached token to the provider.
pub struct VerifierRefresher {
    verifier: Arc<dyn SessionVerifier>,
}

impl VerifierRefresher {
    pub fn new(verifier: Arc<dyn SessionVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl SessionRefresher for VerifierRefresher {
    async fn refresh(&self, current: Option<AuthenticatedSession>) -> Option<AuthenticatedSession> {
        let current = current?;
        match self.verifier.verify(&current.access_token).await {
            Ok(_) => Some(current),
            Err(e) => {
                tracing::debug!("🔄 Refresh could not confirm the session: {}", e);
                None
            }
        }
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Option<AuthenticatedSession>>>;

struct StoreInner {
    /// Identifies this store in cross-process notices.
    origin: Uuid,
    refresher: Arc<dyn SessionRefresher>,
    cached: RwLock<Option<AuthenticatedSession>>,
    /// The one in-flight refresh concurrent callers attach to.
    in_flight: Mutex<Option<RefreshFuture>>,
    events: broadcast::Sender<SessionNotice>,
}

/// The session-state owner.
///
/// Caches at most one [`AuthenticatedSession`], deduplicates concurrent
/// refreshes onto a single in-flight call, and fans state changes out to
/// subscribers. Event delivery is best-effort everywhere; a dropped notice
/// only costs another refresh later.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl SessionStore {
    pub fn new(refresher: Arc<dyn SessionRefresher>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(StoreInner {
                origin: Uuid::new_v4(),
                refresher,
                cached: RwLock::new(None),
                in_flight: Mutex::new(None),
                events,
            }),
        }
    }

    /// The cached session, while it is still usable at `now_secs`.
    pub async fn get(&self, now_secs: i64) -> Option<AuthenticatedSession> {
        self.inner
            .cached
            .read()
            .await
            .clone()
            .filter(|session| session.is_usable(now_secs))
    }

    /// Caches a freshly established session and announces it.
    pub async fn signed_in(&self, session: AuthenticatedSession) {
        let subject = session.subject_id.clone();
        *self.inner.cached.write().await = Some(session);
        self.publish(SessionEvent::SignedIn(subject));
    }

    /// Drops the cached session and announces the sign-out.
    pub async fn signed_out(&self) {
        *self.inner.cached.write().await = None;
        self.publish(SessionEvent::SignedOut);
    }

    /// Re-confirms the cached session, deduplicating concurrent callers.
    ///
    /// The first caller starts the refresher; everyone arriving while it is
    /// in flight awaits the same shared future. The cache is updated (or
    /// cleared, failing closed) before any caller observes the result.
    pub async fn refresh(&self) -> Option<AuthenticatedSession> {
        let fut = {
            let mut in_flight = self.inner.in_flight.lock().await;
            if let Some(fut) = in_flight.as_ref() {
                fut.clone()
            } else {
                let store = self.clone();
                let fut: RefreshFuture = async move {
                    let current = store.inner.cached.read().await.clone();
                    let refreshed = store.inner.refresher.refresh(current).await;
                    *store.inner.cached.write().await = refreshed.clone();
                    match &refreshed {
                        Some(session) => {
                            store.publish(SessionEvent::Refreshed(session.subject_id.clone()));
                        }
                        None => store.publish(SessionEvent::SignedOut),
                    }
                    *store.inner.in_flight.lock().await = None;
                    refreshed
                }
                .boxed()
                .shared();
                *in_flight = Some(fut.clone());
                fut
            }
        };

        fut.await
    }

    /// Subscribes to session notices (this process's and bridged ones).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.inner.events.subscribe()
    }

    /// Publishes a notice to subscribers. Send errors mean nobody is
    /// listening right now and are ignored.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.inner.events.send(SessionNotice {
            origin: self.inner.origin,
            event,
        });
    }

    /// Applies a notice that arrived over the bridge.
    ///
    /// Our own notices echo back from the channel and are skipped by origin.
    /// A remote sign-out or sign-in invalidates the cache (the identity
    /// changed elsewhere; the token we hold may no longer be current); a
    /// remote refresh confirms what we already have.
    pub async fn apply_remote(&self, notice: SessionNotice) {
        if notice.origin == self.inner.origin {
            return;
        }
        match notice.event {
            SessionEvent::SignedOut | SessionEvent::SignedIn(_) => {
                *self.inner.cached.write().await = None;
            }
            SessionEvent::Refreshed(_) => {}
        }
    }
}

/// Bridges the store's events over Redis pub/sub to other processes.
///
/// Best-effort by contract: every failure is swallowed at debug level and
/// the connection is rebuilt after a short pause. Session validity never
/// depends on the bridge being up.
pub fn spawn_redis_bridge(store: SessionStore, redis_url: String) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = run_bridge(&store, &redis_url).await {
                tracing::debug!("📡 Session bridge interrupted: {}", e);
            }
            tokio::time::sleep(Duration::from_secs(BRIDGE_RETRY_SECS)).await;
        }
    })
}

async fn run_bridge(store: &SessionStore, redis_url: &str) -> redis::RedisResult<()> {
    let client = redis::Client::open(redis_url)?;
    let mut publish_conn = client.get_multiplexed_async_connection().await?;
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(SESSION_EVENTS_CHANNEL).await?;

    let mut local = store.subscribe();
    let mut messages = pubsub.on_message();

    tracing::debug!("📡 Session bridge connected on {}", SESSION_EVENTS_CHANNEL);

    loop {
        tokio::select! {
            notice = local.recv() => match notice {
                Ok(notice) => {
                    let Ok(payload) = sonic_rs::to_string(&notice) else {
                        continue;
                    };
                    let sent: redis::RedisResult<()> = redis::cmd("PUBLISH")
                        .arg(SESSION_EVENTS_CHANNEL)
                        .arg(payload)
                        .query_async(&mut publish_conn)
                        .await;
                    if let Err(e) = sent {
                        tracing::debug!("📡 Dropped outbound session notice: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("📡 Session bridge lagged, skipped {} notices", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            message = messages.next() => match message {
                Some(message) => {
                    let Ok(payload) = message.get_payload::<String>() else {
                        continue;
                    };
                    match sonic_rs::from_str::<SessionNotice>(&payload) {
                        Ok(notice) => store.apply_remote(notice).await,
                        Err(e) => tracing::debug!("📡 Unreadable session notice: {}", e),
                    }
                }
                // Subscription dropped; reconnect from the outer loop.
                None => return Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
        result: Option<AuthenticatedSession>,
    }

    impl CountingRefresher {
        fn returning(result: Option<AuthenticatedSession>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result,
            })
        }
    }

    #[async_trait]
    impl SessionRefresher for CountingRefresher {
        async fn refresh(
            &self,
            _current: Option<AuthenticatedSession>,
        ) -> Option<AuthenticatedSession> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.result.clone()
        }
    }

    fn session(subject: &str, expires_at: i64) -> AuthenticatedSession {
        AuthenticatedSession {
            access_token: "header.payload.sig".to_string(),
            subject_id: subject.to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn get_honors_the_usability_window() {
        let store = SessionStore::new(CountingRefresher::returning(None));
        let now = 1_700_000_000;

        store.signed_in(session("user-1", now + 3600)).await;
        assert!(store.get(now).await.is_some());

        // Inside the skew buffer counts as unusable.
        assert!(store.get(now + 3600 - 10).await.is_none());
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_in_flight_call() {
        let now = 1_700_000_000;
        let refresher = CountingRefresher::returning(Some(session("user-1", now + 3600)));
        let store = SessionStore::new(refresher.clone());
        store.signed_in(session("user-1", now + 3600)).await;

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.refresh().await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_some());
        }
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_second_refresh_after_completion_runs_again() {
        let refresher = CountingRefresher::returning(None);
        let store = SessionStore::new(refresher.clone());

        store.refresh().await;
        store.refresh().await;
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn a_failed_refresh_clears_the_cache_and_signs_out() {
        let now = 1_700_000_000;
        let store = SessionStore::new(CountingRefresher::returning(None));
        store.signed_in(session("user-1", now + 3600)).await;

        let mut events = store.subscribe();
        assert!(store.refresh().await.is_none());
        assert!(store.get(now).await.is_none());

        let notice = events.recv().await.unwrap();
        assert_eq!(notice.event, SessionEvent::SignedOut);
    }

    #[tokio::test]
    async fn subscribers_see_sign_in_and_sign_out() {
        let store = SessionStore::new(CountingRefresher::returning(None));
        let mut events = store.subscribe();

        store.signed_in(session("user-1", i64::MAX)).await;
        store.signed_out().await;

        assert_eq!(
            events.recv().await.unwrap().event,
            SessionEvent::SignedIn("user-1".to_string())
        );
        assert_eq!(events.recv().await.unwrap().event, SessionEvent::SignedOut);
    }

    #[tokio::test]
    async fn publishing_with_no_subscribers_is_silent() {
        let store = SessionStore::new(CountingRefresher::returning(None));
        store.publish(SessionEvent::SignedOut);
    }

    #[tokio::test]
    async fn remote_sign_out_invalidates_the_cache() {
        let now = 1_700_000_000;
        let store = SessionStore::new(CountingRefresher::returning(None));
        store.signed_in(session("user-1", now + 3600)).await;

        store
            .apply_remote(SessionNotice {
                origin: Uuid::new_v4(),
                event: SessionEvent::SignedOut,
            })
            .await;
        assert!(store.get(now).await.is_none());
    }

    #[tokio::test]
    async fn own_notices_echoing_back_are_ignored() {
        let now = 1_700_000_000;
        let store = SessionStore::new(CountingRefresher::returning(None));
        store.signed_in(session("user-1", now + 3600)).await;

        // Fabricate the echo with our own origin.
        store
            .apply_remote(SessionNotice {
                origin: store.inner.origin,
                event: SessionEvent::SignedOut,
            })
            .await;

        assert!(store.get(now).await.is_some());
    }

    #[tokio::test]
    async fn notices_round_trip_through_json() {
        let notice = SessionNotice {
            origin: Uuid::new_v4(),
            event: SessionEvent::SignedIn("user-9".to_string()),
        };
        let json = sonic_rs::to_string(&notice).unwrap();
        let parsed: SessionNotice = sonic_rs::from_str(&json).unwrap();
        assert_eq!(parsed.origin, notice.origin);
        assert_eq!(parsed.event, notice.event);
    }
}
