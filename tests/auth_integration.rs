//! Auth flow integration tests: online login, credential caching, and the
//! offline fallback with its TTL.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use herblock_field::auth::{hash_pin, AuthError, AuthService};
use herblock_field::remote::{LoginResponse, RemoteError, SubmissionClient, SubmitVerdict};
use herblock_field::store::{EventStore, MemoryEventStore};
use herblock_field::types::{CollectionEvent, CollectorCredential, CollectorProfile};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const MODE_ONLINE: u8 = 0;
const MODE_DOWN: u8 = 1;
const MODE_REJECT: u8 = 2;

/// Auth endpoint double with three behaviors: accept, reject, unreachable.
struct MockAuthority {
    mode: AtomicU8,
}

impl MockAuthority {
    fn new(mode: u8) -> Arc<Self> {
        Arc::new(Self {
            mode: AtomicU8::new(mode),
        })
    }

    fn set_mode(&self, mode: u8) {
        self.mode.store(mode, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubmissionClient for MockAuthority {
    async fn submit(&self, _: &CollectionEvent) -> Result<SubmitVerdict, RemoteError> {
        Err(RemoteError::Transient("not under test".to_string()))
    }

    async fn login(&self, collector_id: &str, _pin: &str) -> Result<LoginResponse, RemoteError> {
        match self.mode.load(Ordering::SeqCst) {
            MODE_ONLINE => Ok(LoginResponse {
                token: "session-token".to_string(),
                collector: CollectorProfile {
                    id: collector_id.to_string(),
                    name: "Asha Verma".to_string(),
                    region: "Madhya Pradesh".to_string(),
                },
            }),
            MODE_REJECT => Err(RemoteError::CredentialsRejected),
            _ => Err(RemoteError::Transient("request timed out".to_string())),
        }
    }

    async fn health_check(&self) -> bool {
        self.mode.load(Ordering::SeqCst) == MODE_ONLINE
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}

#[tokio::test]
async fn online_login_then_offline_fallback() {
    init_tracing();
    let store = Arc::new(MemoryEventStore::new());
    let authority = MockAuthority::new(MODE_ONLINE);
    let auth = AuthService::new(
        Arc::clone(&store) as Arc<dyn EventStore>,
        Arc::clone(&authority) as Arc<dyn SubmissionClient>,
    );

    let session = auth.login("COLL-001", "1234").await.unwrap();
    assert!(!session.is_offline());
    assert_eq!(session.profile.name, "Asha Verma");

    // The authority goes dark; the cached credential carries the login.
    authority.set_mode(MODE_DOWN);
    let offline = auth.login("COLL-001", "1234").await.unwrap();
    assert!(offline.is_offline());
    assert_eq!(offline.profile.region, "Madhya Pradesh");
}

#[tokio::test]
async fn offline_login_requires_the_right_pin() {
    let store = Arc::new(MemoryEventStore::new());
    let authority = MockAuthority::new(MODE_ONLINE);
    let auth = AuthService::new(
        Arc::clone(&store) as Arc<dyn EventStore>,
        Arc::clone(&authority) as Arc<dyn SubmissionClient>,
    );

    auth.login("COLL-001", "1234").await.unwrap();
    authority.set_mode(MODE_DOWN);

    let err = auth.login("COLL-001", "9999").await.unwrap_err();
    assert!(matches!(err, AuthError::OfflineCacheMiss));
}

#[tokio::test]
async fn never_logged_in_means_no_offline_access() {
    let store = Arc::new(MemoryEventStore::new());
    let authority = MockAuthority::new(MODE_DOWN);
    let auth = AuthService::new(
        store as Arc<dyn EventStore>,
        authority as Arc<dyn SubmissionClient>,
    );

    let err = auth.login("COLL-404", "1234").await.unwrap_err();
    assert!(matches!(err, AuthError::OfflineCacheMiss));
}

#[tokio::test]
async fn explicit_rejection_never_falls_back_to_cache() {
    let store = Arc::new(MemoryEventStore::new());
    // A valid cached credential exists...
    store
        .cache_credential(&CollectorCredential {
            collector_id: "COLL-001".to_string(),
            pin_hash: hash_pin("1234"),
            name: "Asha Verma".to_string(),
            region: "Madhya Pradesh".to_string(),
            last_login: Utc::now(),
        })
        .unwrap();

    // ...but the authority definitively rejects, and that verdict is final.
    let authority = MockAuthority::new(MODE_REJECT);
    let auth = AuthService::new(
        Arc::clone(&store) as Arc<dyn EventStore>,
        authority as Arc<dyn SubmissionClient>,
    );

    let err = auth.login("COLL-001", "1234").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn expired_cached_credential_is_refused() {
    let store = Arc::new(MemoryEventStore::new());
    store
        .cache_credential(&CollectorCredential {
            collector_id: "COLL-001".to_string(),
            pin_hash: hash_pin("1234"),
            name: "Asha Verma".to_string(),
            region: "Madhya Pradesh".to_string(),
            last_login: Utc::now() - ChronoDuration::days(40),
        })
        .unwrap();

    let authority = MockAuthority::new(MODE_DOWN);
    let auth = AuthService::new(
        Arc::clone(&store) as Arc<dyn EventStore>,
        authority as Arc<dyn SubmissionClient>,
    );

    // Default TTL is 30 days; a 40-day-old entry behaves as "not found".
    let err = auth.login("COLL-001", "1234").await.unwrap_err();
    assert!(matches!(err, AuthError::OfflineCacheMiss));
}

#[tokio::test]
async fn relogin_overwrites_the_cached_credential() {
    let store = Arc::new(MemoryEventStore::new());
    let authority = MockAuthority::new(MODE_ONLINE);
    let auth = AuthService::new(
        Arc::clone(&store) as Arc<dyn EventStore>,
        Arc::clone(&authority) as Arc<dyn SubmissionClient>,
    );

    auth.login("COLL-001", "1234").await.unwrap();
    // Collector changes their PIN server-side and logs in again online.
    auth.login("COLL-001", "5678").await.unwrap();

    authority.set_mode(MODE_DOWN);
    assert!(auth.login("COLL-001", "5678").await.is_ok());
    assert!(matches!(
        auth.login("COLL-001", "1234").await.unwrap_err(),
        AuthError::OfflineCacheMiss
    ));
}
