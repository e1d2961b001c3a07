mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use common::{date, TestGym};
use gymkeeper::models::{PassKind, Principal};
use gymkeeper::GymError;

#[tokio::test]
async fn sequential_consumption_succeeds_exactly_balance_times() {
    let gym = TestGym::new();
    let zone = gym.add_zone("Pool", 10).await;
    let client = Uuid::new_v4();
    gym.give_visits(client, zone.id, 3).await;

    for expected_remaining in [2, 1, 0] {
        let consumed = gym.passes.consume(client, zone.id).await.unwrap();
        assert_eq!(consumed.remaining_visits, expected_remaining);
    }

    let err = gym.passes.consume(client, zone.id).await.unwrap_err();
    assert_matches!(err, GymError::InsufficientBalance { .. });
}

#[tokio::test]
async fn concurrent_consumption_never_exceeds_balance() {
    let gym = TestGym::new();
    let zone = gym.add_zone("Pool", 10).await;
    let client = Uuid::new_v4();
    gym.give_visits(client, zone.id, 3).await;

    let outcomes =
        futures::future::join_all((0..8).map(|_| gym.passes.consume(client, zone.id))).await;

    let mut successes = 0;
    let mut insufficient = 0;
    for outcome in outcomes {
        match outcome {
            Ok(_) => successes += 1,
            Err(GymError::InsufficientBalance { .. }) => insufficient += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(successes, 3);
    assert_eq!(insufficient, 5);

    let balances = gym
        .passes
        .balances(&gym.admin, client)
        .await
        .unwrap();
    assert_eq!(balances[0].remaining_visits, 0);
}

#[tokio::test]
async fn credit_creates_missing_balance_at_zero_first() {
    let gym = TestGym::new();
    let zone = gym.add_zone("Pool", 10).await;
    let client = Uuid::new_v4();

    let pass = gym.passes.credit(client, zone.id, 5).await.unwrap();
    assert_eq!(pass.remaining_visits, 5);
    assert_eq!(pass.kind, PassKind::VisitBased);

    // A second credit tops up the same row instead of adding one.
    let pass = gym.passes.credit(client, zone.id, 2).await.unwrap();
    assert_eq!(pass.remaining_visits, 7);
    assert_eq!(gym.passes.balances(&gym.admin, client).await.unwrap().len(), 1);
}

#[tokio::test]
async fn visit_based_consumed_before_time_based() {
    let gym = TestGym::new();
    let zone = gym.add_zone("Pool", 10).await;
    let client = Uuid::new_v4();

    gym.give_time_pass(client, zone.id, None).await;
    gym.give_visits(client, zone.id, 1).await;

    let consumed = gym.passes.consume(client, zone.id).await.unwrap();
    assert_eq!(consumed.kind, PassKind::VisitBased);
    assert_eq!(consumed.remaining_visits, 0);

    // Visit balance exhausted; the unlimited pass takes over.
    let consumed = gym.passes.consume(client, zone.id).await.unwrap();
    assert_eq!(consumed.kind, PassKind::TimeBased);
}

#[tokio::test]
async fn expired_time_pass_does_not_admit() {
    let gym = TestGym::new();
    let zone = gym.add_zone("Pool", 10).await;
    let client = Uuid::new_v4();

    gym.give_time_pass(client, zone.id, Some(date(2000, 1, 1))).await;

    let err = gym.passes.consume(client, zone.id).await.unwrap_err();
    assert_matches!(err, GymError::InsufficientBalance { .. });
}

#[tokio::test]
async fn time_pass_admits_without_decrement() {
    let gym = TestGym::new();
    let zone = gym.add_zone("Pool", 10).await;
    let client = Uuid::new_v4();

    gym.give_time_pass(client, zone.id, Some(date(2099, 1, 1))).await;

    for _ in 0..3 {
        let consumed = gym.passes.consume(client, zone.id).await.unwrap();
        assert_eq!(consumed.kind, PassKind::TimeBased);
    }
}

#[tokio::test]
async fn top_up_requires_admin() {
    let gym = TestGym::new();
    let zone = gym.add_zone("Pool", 10).await;
    let client = Principal::client(Uuid::new_v4(), None);

    let err = gym
        .passes
        .top_up(&client, client.id, zone.id, 5)
        .await
        .unwrap_err();
    assert_matches!(err, GymError::Forbidden { .. });

    gym.passes
        .top_up(&gym.admin, client.id, zone.id, 5)
        .await
        .unwrap();
}

#[tokio::test]
async fn clients_cannot_read_others_balances() {
    let gym = TestGym::new();
    let other = Uuid::new_v4();
    let client = Principal::client(Uuid::new_v4(), None);

    let err = gym.passes.balances(&client, other).await.unwrap_err();
    assert_matches!(err, GymError::Forbidden { .. });
}

#[tokio::test]
async fn credit_for_unknown_zone_fails() {
    let gym = TestGym::new();
    let err = gym
        .passes
        .credit(Uuid::new_v4(), 999, 5)
        .await
        .unwrap_err();
    assert_matches!(err, GymError::NotFound { .. });
}
