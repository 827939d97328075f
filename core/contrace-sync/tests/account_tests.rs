use contrace_storage::Preferences;
use contrace_sync::remote::mock::MockRemote;
use contrace_sync::{Account, Onboarding, SyncError};
use contrace_types::{ManualClock, Timestamp};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    preferences: Arc<Preferences>,
    remote: Arc<MockRemote>,
    account: Account,
}

fn fixture() -> Fixture {
    let preferences = Arc::new(Preferences::open_in_memory().unwrap());
    let remote = Arc::new(MockRemote::new());
    let account = Account::new(
        preferences.clone(),
        remote.clone(),
        Arc::new(ManualClock::new(Timestamp::from_millis(1_650_000_000_123))),
        Duration::from_secs(5),
    );
    Fixture {
        preferences,
        remote,
        account,
    }
}

// ── initialize ──────────────────────────────────────────────────

#[tokio::test]
async fn first_run_creates_and_registers() {
    let fx = fixture();

    let outcome = fx.account.initialize(Some("tok-1".into())).await.unwrap();

    let Onboarding::Registered(identity) = outcome else {
        panic!("expected registration, got {outcome:?}");
    };
    assert_eq!(fx.preferences.identity().unwrap(), Some(identity));
    assert_eq!(fx.preferences.push_token().unwrap().as_deref(), Some("tok-1"));
    assert_eq!(fx.remote.token_of(identity.user_id).as_deref(), Some("tok-1"));
    assert_ne!(identity.user_id.as_uuid(), identity.device_id.as_uuid());
}

#[tokio::test]
async fn second_run_reuses_identity() {
    let fx = fixture();
    let first = fx.account.initialize(Some("tok-1".into())).await.unwrap();

    let second = fx.account.initialize(Some("tok-2".into())).await.unwrap();

    assert_eq!(second, Onboarding::Existing(first.identity()));
    assert_eq!(fx.remote.token_of(first.identity().user_id).as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn missing_token_falls_back_to_offline_placeholder() {
    let fx = fixture();

    let outcome = fx.account.initialize(None).await.unwrap();

    let expected = "offline_token_1650000000123";
    assert_eq!(fx.preferences.push_token().unwrap().as_deref(), Some(expected));
    assert_eq!(fx.remote.token_of(outcome.identity().user_id).as_deref(), Some(expected));
}

#[tokio::test]
async fn registration_failure_keeps_identity() {
    let fx = fixture();
    fx.remote
        .fail_registration(Some(SyncError::Network("offline".into())));

    let outcome = fx.account.initialize(Some("tok".into())).await.unwrap();

    match outcome {
        Onboarding::Offline(identity, err) => {
            assert_eq!(err, SyncError::Network("offline".into()));
            assert_eq!(fx.preferences.identity().unwrap(), Some(identity));
        }
        other => panic!("expected offline onboarding, got {other:?}"),
    }
}

// ── on_new_token ────────────────────────────────────────────────

#[tokio::test]
async fn new_token_before_onboarding_is_only_stored() {
    let fx = fixture();

    fx.account.on_new_token("early").await.unwrap();

    assert_eq!(fx.preferences.push_token().unwrap().as_deref(), Some("early"));
    assert_eq!(fx.preferences.user_id().unwrap(), None);
}

#[tokio::test]
async fn new_token_is_forwarded() {
    let fx = fixture();
    let user = fx.account.initialize(Some("old".into())).await.unwrap().identity().user_id;

    fx.account.on_new_token("new").await.unwrap();

    assert_eq!(fx.remote.token_of(user).as_deref(), Some("new"));
    assert_eq!(fx.preferences.push_token().unwrap().as_deref(), Some("new"));
}

#[tokio::test]
async fn failed_token_update_surfaces_but_persists() {
    let fx = fixture();
    fx.account.initialize(Some("old".into())).await.unwrap();
    fx.remote
        .fail_token_updates(Some(SyncError::Remote { status: 502, message: "bad gateway".into() }));

    let err = fx.account.on_new_token("new").await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(fx.preferences.push_token().unwrap().as_deref(), Some("new"));
}

#[tokio::test(start_paused = true)]
async fn slow_registration_times_out_to_offline() {
    let fx = fixture();
    fx.remote.set_latency(Duration::from_secs(10));

    let outcome = fx.account.initialize(Some("tok".into())).await.unwrap();

    assert!(matches!(outcome, Onboarding::Offline(_, SyncError::Timeout)));
}
