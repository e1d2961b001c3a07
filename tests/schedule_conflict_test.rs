mod common;

use assert_matches::assert_matches;
use uuid::Uuid;

use common::{date, time, TestGym};
use gymkeeper::models::{CreateTrainerSchedule, CreateTrainingSession, Principal, UpdateTrainerSchedule};
use gymkeeper::GymError;

fn session(
    d: chrono::NaiveDate,
    start: chrono::NaiveTime,
    end: chrono::NaiveTime,
    zone: Option<i32>,
) -> CreateTrainingSession {
    CreateTrainingSession {
        session_date: d,
        start_time: start,
        end_time: end,
        gym_zone_id: zone,
    }
}

#[tokio::test]
async fn overlapping_session_rejected_with_blocking_id() {
    let gym = TestGym::new();
    let trainer = Principal::trainer(Uuid::new_v4());
    let d = date(2024, 3, 4);

    let first = gym
        .sessions
        .create(&trainer, session(d, time(9, 0), time(10, 0), None))
        .await
        .unwrap();

    let err = gym
        .sessions
        .create(&trainer, session(d, time(9, 30), time(10, 30), None))
        .await
        .unwrap_err();
    assert_matches!(err, GymError::ScheduleConflict { blocking_id } if blocking_id == first.id.to_string());
}

#[tokio::test]
async fn back_to_back_sessions_allowed() {
    let gym = TestGym::new();
    let trainer = Principal::trainer(Uuid::new_v4());
    let d = date(2024, 3, 4);

    gym.sessions
        .create(&trainer, session(d, time(9, 0), time(10, 0), None))
        .await
        .unwrap();
    gym.sessions
        .create(&trainer, session(d, time(10, 0), time(11, 0), None))
        .await
        .unwrap();
}

#[tokio::test]
async fn cancelled_session_does_not_block() {
    let gym = TestGym::new();
    let trainer = Principal::trainer(Uuid::new_v4());
    let d = date(2024, 3, 4);

    let first = gym
        .sessions
        .create(&trainer, session(d, time(9, 0), time(10, 0), None))
        .await
        .unwrap();
    gym.sessions
        .cancel(&trainer, first.id, "sick day")
        .await
        .unwrap();

    gym.sessions
        .create(&trainer, session(d, time(9, 0), time(10, 0), None))
        .await
        .unwrap();
}

#[tokio::test]
async fn different_dates_do_not_conflict() {
    let gym = TestGym::new();
    let trainer = Principal::trainer(Uuid::new_v4());

    gym.sessions
        .create(&trainer, session(date(2024, 3, 4), time(9, 0), time(10, 0), None))
        .await
        .unwrap();
    gym.sessions
        .create(&trainer, session(date(2024, 3, 5), time(9, 0), time(10, 0), None))
        .await
        .unwrap();
}

#[tokio::test]
async fn zone_axis_conflicts_across_trainers() {
    let gym = TestGym::new();
    let zone = gym.add_zone("Group room", 15).await;
    let d = date(2024, 3, 4);

    let first_trainer = Principal::trainer(Uuid::new_v4());
    let other_trainer = Principal::trainer(Uuid::new_v4());

    let first = gym
        .sessions
        .create(&first_trainer, session(d, time(9, 0), time(10, 0), Some(zone.id)))
        .await
        .unwrap();

    // Different trainer, same room, same time.
    let err = gym
        .sessions
        .create(&other_trainer, session(d, time(9, 30), time(10, 30), Some(zone.id)))
        .await
        .unwrap_err();
    assert_matches!(err, GymError::ScheduleConflict { blocking_id } if blocking_id == first.id.to_string());
}

#[tokio::test]
async fn invalid_times_rejected() {
    let gym = TestGym::new();
    let trainer = Principal::trainer(Uuid::new_v4());
    let d = date(2024, 3, 4);

    let err = gym
        .sessions
        .create(&trainer, session(d, time(10, 0), time(10, 0), None))
        .await
        .unwrap_err();
    assert_matches!(err, GymError::InvalidInput(_));

    let err = gym
        .sessions
        .create(&trainer, session(d, time(11, 0), time(10, 0), None))
        .await
        .unwrap_err();
    assert_matches!(err, GymError::InvalidInput(_));
}

#[tokio::test]
async fn client_cannot_schedule_sessions() {
    let gym = TestGym::new();
    let client = Principal::client(Uuid::new_v4(), None);

    let err = gym
        .sessions
        .create(&client, session(date(2024, 3, 4), time(9, 0), time(10, 0), None))
        .await
        .unwrap_err();
    assert_matches!(err, GymError::Forbidden { .. });
}

#[tokio::test]
async fn weekly_slot_conflicts_per_day() {
    let gym = TestGym::new();
    let trainer = Principal::trainer(Uuid::new_v4());

    let monday_morning = gym
        .schedule
        .create_slot(
            &trainer,
            CreateTrainerSchedule {
                day_of_week: 0,
                start_time: time(9, 0),
                end_time: time(12, 0),
                gym_zone_id: None,
            },
        )
        .await
        .unwrap();

    // Same trainer, same day, overlapping hours.
    let err = gym
        .schedule
        .create_slot(
            &trainer,
            CreateTrainerSchedule {
                day_of_week: 0,
                start_time: time(11, 0),
                end_time: time(13, 0),
                gym_zone_id: None,
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, GymError::ScheduleConflict { blocking_id } if blocking_id == monday_morning.id.to_string());

    // Same hours on another weekday are fine.
    gym.schedule
        .create_slot(
            &trainer,
            CreateTrainerSchedule {
                day_of_week: 1,
                start_time: time(9, 0),
                end_time: time(12, 0),
                gym_zone_id: None,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn slot_update_rechecks_against_other_slots_only() {
    let gym = TestGym::new();
    let trainer = Principal::trainer(Uuid::new_v4());

    let slot = gym
        .schedule
        .create_slot(
            &trainer,
            CreateTrainerSchedule {
                day_of_week: 2,
                start_time: time(9, 0),
                end_time: time(10, 0),
                gym_zone_id: None,
            },
        )
        .await
        .unwrap();

    // Growing the slot overlaps itself, which must not count.
    let updated = gym
        .schedule
        .update_slot(
            &trainer,
            slot.id,
            UpdateTrainerSchedule {
                end_time: Some(time(11, 0)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.end_time, time(11, 0));

    let other = gym
        .schedule
        .create_slot(
            &trainer,
            CreateTrainerSchedule {
                day_of_week: 2,
                start_time: time(11, 0),
                end_time: time(12, 0),
                gym_zone_id: None,
            },
        )
        .await
        .unwrap();

    // But colliding with the second slot does.
    let err = gym
        .schedule
        .update_slot(
            &trainer,
            slot.id,
            UpdateTrainerSchedule {
                end_time: Some(time(11, 30)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, GymError::ScheduleConflict { blocking_id } if blocking_id == other.id.to_string());
}

#[tokio::test]
async fn available_slots_follow_the_dates_weekday() {
    let gym = TestGym::new();
    let trainer = Principal::trainer(Uuid::new_v4());

    gym.schedule
        .create_slot(
            &trainer,
            CreateTrainerSchedule {
                day_of_week: 0,
                start_time: time(9, 0),
                end_time: time(10, 0),
                gym_zone_id: None,
            },
        )
        .await
        .unwrap();
    let cancelled = gym
        .schedule
        .create_slot(
            &trainer,
            CreateTrainerSchedule {
                day_of_week: 0,
                start_time: time(10, 0),
                end_time: time(11, 0),
                gym_zone_id: None,
            },
        )
        .await
        .unwrap();
    gym.schedule
        .cancel_slot(&trainer, cancelled.id, "holiday")
        .await
        .unwrap();

    // 2024-03-04 is a Monday.
    let monday = gym
        .schedule
        .available_slots_for_date(date(2024, 3, 4), None)
        .await
        .unwrap();
    assert_eq!(monday.len(), 1);
    assert_eq!(monday[0].start_time, time(9, 0));

    let tuesday = gym
        .schedule
        .available_slots_for_date(date(2024, 3, 5), None)
        .await
        .unwrap();
    assert!(tuesday.is_empty());
}
