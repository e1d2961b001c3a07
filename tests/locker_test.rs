mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use uuid::Uuid;

use common::TestGym;
use gymkeeper::models::{LockerRoom, LockerStatus, Principal};
use gymkeeper::GymError;

#[tokio::test]
async fn assigns_lowest_numbered_free_locker() {
    let gym = TestGym::new();
    let provisioned = gym.add_lockers(LockerRoom::Men, 3).await;
    let client = Principal::client(Uuid::new_v4(), None);

    let locker = gym
        .lockers
        .assign(&client, LockerRoom::Men)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(locker.id, provisioned[0].id);
    assert_eq!(locker.status, LockerStatus::Occupied);
    assert_eq!(locker.occupied_by, Some(client.id));
}

#[tokio::test]
async fn client_cannot_hold_two_lockers() {
    let gym = TestGym::new();
    gym.add_lockers(LockerRoom::Men, 3).await;
    let client = Principal::client(Uuid::new_v4(), None);

    let held = gym
        .lockers
        .assign(&client, LockerRoom::Men)
        .await
        .unwrap()
        .unwrap();

    let err = gym
        .lockers
        .assign(&client, LockerRoom::Men)
        .await
        .unwrap_err();
    assert_matches!(err, GymError::AlreadyHoldingResource { locker_id, .. } if locker_id == held.id);
}

#[tokio::test]
async fn exhausted_room_yields_none_not_error() {
    let gym = TestGym::new();
    gym.add_lockers(LockerRoom::Women, 1).await;

    let first = Principal::client(Uuid::new_v4(), None);
    let second = Principal::client(Uuid::new_v4(), None);

    assert!(gym
        .lockers
        .assign(&first, LockerRoom::Women)
        .await
        .unwrap()
        .is_some());
    assert!(gym
        .lockers
        .assign(&second, LockerRoom::Women)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn rooms_are_partitioned() {
    let gym = TestGym::new();
    gym.add_lockers(LockerRoom::Men, 1).await;
    let client = Principal::client(Uuid::new_v4(), None);

    // No women's lockers exist, even though a men's one is free.
    assert!(gym
        .lockers
        .assign(&client, LockerRoom::Women)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn release_frees_and_rotates_the_code() {
    let gym = TestGym::new();
    gym.add_lockers(LockerRoom::Men, 1).await;
    let client = Principal::client(Uuid::new_v4(), None);

    let locker = gym
        .lockers
        .assign(&client, LockerRoom::Men)
        .await
        .unwrap()
        .unwrap();

    let released = gym.lockers.release(&client, locker.id).await.unwrap();
    assert_eq!(released.status, LockerStatus::Free);
    assert_eq!(released.occupied_by, None);

    // Releasing again is allowed and keeps the locker free.
    let again = gym.lockers.release(&gym.admin, locker.id).await.unwrap();
    assert_eq!(again.status, LockerStatus::Free);
}

#[tokio::test]
async fn release_is_holder_or_admin_only() {
    let gym = TestGym::new();
    gym.add_lockers(LockerRoom::Men, 1).await;
    let holder = Principal::client(Uuid::new_v4(), None);
    let stranger = Principal::client(Uuid::new_v4(), None);

    let locker = gym
        .lockers
        .assign(&holder, LockerRoom::Men)
        .await
        .unwrap()
        .unwrap();

    let err = gym.lockers.release(&stranger, locker.id).await.unwrap_err();
    assert_matches!(err, GymError::Forbidden { .. });
}

#[tokio::test]
async fn concurrent_claims_get_distinct_lockers() {
    let gym = TestGym::new();
    gym.add_lockers(LockerRoom::Men, 4).await;

    let claims: Vec<_> = (0..8)
        .map(|_| {
            let lockers = gym.lockers.clone();
            let client = Principal::client(Uuid::new_v4(), None);
            tokio::spawn(async move { lockers.assign(&client, LockerRoom::Men).await })
        })
        .collect();

    let mut assigned = Vec::new();
    for claim in claims {
        if let Some(locker) = claim.await.unwrap().unwrap() {
            assigned.push(locker.id);
        }
    }

    // Four clients got a locker, nobody shares one.
    assert_eq!(assigned.len(), 4);
    let distinct: HashSet<_> = assigned.iter().collect();
    assert_eq!(distinct.len(), 4);
}

#[tokio::test]
async fn held_locker_query_finds_the_assignment() {
    let gym = TestGym::new();
    gym.add_lockers(LockerRoom::Men, 2).await;
    let client = Principal::client(Uuid::new_v4(), None);

    assert!(gym.lockers.held_by(&client, client.id).await.unwrap().is_none());

    let locker = gym
        .lockers
        .assign(&client, LockerRoom::Men)
        .await
        .unwrap()
        .unwrap();

    let held = gym
        .lockers
        .held_by(&client, client.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(held.id, locker.id);
}
