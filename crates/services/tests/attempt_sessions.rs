mod common;

use std::collections::BTreeMap;

use assess_core::model::{AttemptError, AttemptStatus, Direction, Draft, StudentId};
use assess_core::time::{fixed_now, manual_clock};
use chrono::Duration;
use serde_json::json;
use services::{Clock, Engine, SessionError};
use storage::repository::{AttemptRepository, DraftStore, Storage};

use common::{seed, ESSAY, ESSAY_TEST, MC, QUIZ, SHORT};

async fn engine(clock: Clock) -> (Storage, Engine) {
    let storage = Storage::in_memory();
    seed(&storage).await;
    let engine = Engine::new(&storage, clock);
    (storage, engine)
}

#[tokio::test]
async fn start_resumes_the_open_attempt_for_a_student() {
    let (_storage, engine) = engine(manual_clock()).await;
    let sessions = engine.sessions();

    let first = sessions.start(QUIZ, StudentId::new(7)).await.unwrap();
    assert!(!first.resumed);

    let again = sessions.start(QUIZ, StudentId::new(7)).await.unwrap();
    assert!(again.resumed);
    assert_eq!(again.attempt_id, first.attempt_id);

    let other = sessions.start(QUIZ, StudentId::new(8)).await.unwrap();
    assert_ne!(other.attempt_id, first.attempt_id);
}

#[tokio::test]
async fn submitted_attempt_is_not_resumed() {
    let (_storage, engine) = engine(manual_clock()).await;
    let sessions = engine.sessions();

    let first = sessions.start(QUIZ, StudentId::new(7)).await.unwrap();
    sessions.submit(first.attempt_id).await.unwrap();

    let second = sessions.start(QUIZ, StudentId::new(7)).await.unwrap();
    assert!(!second.resumed);
    assert_ne!(second.attempt_id, first.attempt_id);
}

#[tokio::test]
async fn record_answer_rejects_malformed_payloads() {
    let (_storage, engine) = engine(manual_clock()).await;
    let sessions = engine.sessions();
    let started = sessions.start(QUIZ, StudentId::new(7)).await.unwrap();

    let out_of_range = sessions.record_answer(started.attempt_id, MC, json!(4)).await;
    assert!(matches!(
        out_of_range,
        Err(SessionError::InvalidAnswer { exercise_id, .. }) if exercise_id == MC
    ));
    let wrong_shape = sessions
        .record_answer(started.attempt_id, MC, json!("two"))
        .await;
    assert!(matches!(wrong_shape, Err(SessionError::InvalidAnswer { .. })));

    let outside = sessions
        .record_answer(started.attempt_id, common::ESSAY, json!("text"))
        .await;
    assert!(matches!(
        outside,
        Err(SessionError::Attempt(AttemptError::UnknownExercise(_)))
    ));

    let progress = sessions.progress(started.attempt_id).await.unwrap();
    assert_eq!(progress.answered, 0);
}

#[tokio::test]
async fn null_clears_a_buffered_answer() {
    let (_storage, engine) = engine(manual_clock()).await;
    let sessions = engine.sessions();
    let started = sessions.start(QUIZ, StudentId::new(7)).await.unwrap();

    sessions
        .record_answer(started.attempt_id, MC, json!(1))
        .await
        .unwrap();
    assert_eq!(sessions.progress(started.attempt_id).await.unwrap().answered, 1);

    sessions
        .record_answer(started.attempt_id, MC, json!(null))
        .await
        .unwrap();
    let progress = sessions.progress(started.attempt_id).await.unwrap();
    assert_eq!(progress.answered, 0);
    assert_eq!(progress.percent_answered, 0);
}

#[tokio::test]
async fn advance_accumulates_time_across_visits() {
    let clock = manual_clock();
    let (_storage, engine) = engine(clock.clone()).await;
    let sessions = engine.sessions();
    let id = sessions.start(QUIZ, StudentId::new(7)).await.unwrap().attempt_id;

    clock.advance(Duration::seconds(20));
    let slot = sessions.advance(id, Direction::Next).await.unwrap();
    assert_eq!(slot.index, 1);
    assert!(slot.is_last());

    clock.advance(Duration::seconds(5));
    sessions.advance(id, Direction::Previous).await.unwrap();

    clock.advance(Duration::seconds(10));
    sessions.advance(id, Direction::Next).await.unwrap();

    let draft = sessions.snapshot_draft(id).await.unwrap().expect("in progress");
    assert_eq!(draft.time_spent().get(&MC).copied(), Some(30));
    assert_eq!(draft.time_spent().get(&SHORT).copied(), Some(5));
    assert_eq!(draft.pointer(), 1);

    let stay = sessions.advance(id, Direction::Next).await.unwrap();
    assert_eq!(stay.index, 1);
    assert!(matches!(
        sessions.advance(id, Direction::To(5)).await,
        Err(SessionError::Attempt(AttemptError::Timer(_)))
    ));
}

#[tokio::test]
async fn current_question_hides_the_solution_and_counts_down() {
    let clock = manual_clock();
    let (_storage, engine) = engine(clock.clone()).await;
    let sessions = engine.sessions();
    let id = sessions.start(QUIZ, StudentId::new(7)).await.unwrap().attempt_id;

    sessions.record_answer(id, MC, json!(2)).await.unwrap();
    clock.advance(Duration::seconds(45));

    let slot = sessions.current_question(id).await.unwrap();
    assert_eq!(slot.index, 0);
    assert_eq!(slot.total, 2);
    assert!(slot.is_first());
    assert_eq!(slot.question.exercise_id, MC);
    assert_eq!(slot.answer, Some(json!(2)));
    assert_eq!(slot.time_remaining_secs, Some(555));

    let rendered = serde_json::to_value(&slot).unwrap();
    assert!(!rendered.to_string().contains("correctAnswer"));

    let untimed = sessions.start(ESSAY_TEST, StudentId::new(7)).await.unwrap();
    let slot = sessions.current_question(untimed.attempt_id).await.unwrap();
    assert_eq!(slot.time_remaining_secs, None);
}

#[tokio::test]
async fn draft_survives_a_reload() {
    let clock = manual_clock();
    let storage = Storage::in_memory();
    seed(&storage).await;

    let before = Engine::new(&storage, clock.clone());
    let id = before
        .sessions()
        .start(QUIZ, StudentId::new(7))
        .await
        .unwrap()
        .attempt_id;
    before.sessions().record_answer(id, MC, json!(2)).await.unwrap();
    clock.advance(Duration::seconds(12));
    before.sessions().advance(id, Direction::Next).await.unwrap();
    before
        .sessions()
        .record_answer(id, SHORT, json!("Paris"))
        .await
        .unwrap();
    let saved = before.sessions().leave(id).await.unwrap().expect("draft");

    // a fresh process sees only the persisted attempt and the draft store
    let after = Engine::new(&storage, clock.clone());
    let resumed = after.sessions().start(QUIZ, StudentId::new(7)).await.unwrap();
    assert!(resumed.resumed);
    assert_eq!(resumed.attempt_id, id);
    assert_eq!(after.sessions().progress(id).await.unwrap().answered, 2);

    let restored = after.sessions().restore_draft(id).await.unwrap().expect("draft");
    assert_eq!(restored, saved);

    let slot = after.sessions().current_question(id).await.unwrap();
    assert_eq!(slot.index, 1);
    assert_eq!(slot.answer, Some(json!("Paris")));
    assert_eq!(after.sessions().progress(id).await.unwrap().answered, 2);

    let again = after.sessions().snapshot_draft(id).await.unwrap().expect("draft");
    assert_eq!(again.answers(), saved.answers());
    assert_eq!(again.time_spent(), saved.time_spent());
    assert_eq!(again.pointer(), saved.pointer());
}

#[tokio::test]
async fn corrupt_or_missing_draft_means_no_draft() {
    let (storage, engine) = engine(manual_clock()).await;
    let sessions = engine.sessions();
    let id = sessions.start(QUIZ, StudentId::new(7)).await.unwrap().attempt_id;

    assert!(sessions.restore_draft(id).await.unwrap().is_none());

    storage.drafts.save_draft(id, b"{not json").await.unwrap();
    assert!(sessions.restore_draft(id).await.unwrap().is_none());
    assert!(storage.drafts.load_draft(id).await.unwrap().is_none());

    // a draft written for another attempt is ignored as well
    let other = sessions.start(QUIZ, StudentId::new(8)).await.unwrap().attempt_id;
    let foreign = sessions.snapshot_draft(other).await.unwrap().expect("draft");
    storage
        .drafts
        .save_draft(id, &foreign.encode().unwrap())
        .await
        .unwrap();
    assert!(sessions.restore_draft(id).await.unwrap().is_none());
}

#[tokio::test]
async fn restored_answers_are_validated_like_recorded_ones() {
    let clock = manual_clock();
    let (storage, engine) = engine(clock.clone()).await;
    let id = engine
        .sessions()
        .start(QUIZ, StudentId::new(7))
        .await
        .unwrap()
        .attempt_id;
    assert!(matches!(
        engine.sessions().record_answer(id, MC, json!(99)).await,
        Err(SessionError::InvalidAnswer { .. })
    ));

    let mut answers = BTreeMap::new();
    answers.insert(MC, json!(99));
    answers.insert(SHORT, json!("Paris"));
    answers.insert(ESSAY, json!("not in this quiz"));
    let tampered = Draft::new(id, answers, BTreeMap::new(), 1, clock.now());
    storage
        .drafts
        .save_draft(id, &tampered.encode().unwrap())
        .await
        .unwrap();

    // reloading applies the draft, keeping only what the catalog accepts
    let after = Engine::new(&storage, clock.clone());
    let slot = after.sessions().current_question(id).await.unwrap();
    assert_eq!(slot.index, 1);
    assert_eq!(slot.answer, Some(json!("Paris")));
    assert_eq!(after.sessions().progress(id).await.unwrap().answered, 1);

    let restored = after.sessions().restore_draft(id).await.unwrap().expect("draft");
    assert_eq!(restored.answers().len(), 1);
    assert_eq!(restored.answers().get(&SHORT), Some(&json!("Paris")));

    let mut shapeless = BTreeMap::new();
    shapeless.insert(SHORT, json!({ "x": 1 }));
    let tampered = Draft::new(id, shapeless, BTreeMap::new(), 0, clock.now());
    storage
        .drafts
        .save_draft(id, &tampered.encode().unwrap())
        .await
        .unwrap();
    let restored = after.sessions().restore_draft(id).await.unwrap().expect("draft");
    assert!(restored.answers().is_empty());

    after.sessions().submit(id).await.unwrap();
    let persisted = storage.attempts.get_attempt(id).await.unwrap();
    assert_eq!(persisted.status(), AttemptStatus::Submitted);
    assert!(persisted.answer(MC).unwrap().response().is_null());
    assert_eq!(persisted.answer(SHORT).unwrap().response(), &json!("Paris"));
}

#[tokio::test]
async fn stale_buffer_cannot_resubmit_over_a_closed_attempt() {
    let clock = manual_clock();
    let (storage, first) = engine(clock.clone()).await;
    let id = first
        .sessions()
        .start(QUIZ, StudentId::new(7))
        .await
        .unwrap()
        .attempt_id;
    first.sessions().record_answer(id, MC, json!(1)).await.unwrap();

    // a second process picks the attempt up and submits it
    let second = Engine::new(&storage, clock.clone());
    second.sessions().start(QUIZ, StudentId::new(7)).await.unwrap();
    second.sessions().record_answer(id, MC, json!(2)).await.unwrap();
    clock.advance(Duration::seconds(10));
    assert!(second.sessions().submit(id).await.unwrap().newly_submitted);
    let closed = storage.attempts.get_attempt(id).await.unwrap();

    // the first process still holds its in-progress copy
    clock.advance(Duration::seconds(10));
    let outcome = first.sessions().submit(id).await.unwrap();
    assert!(!outcome.newly_submitted);
    assert_eq!(storage.attempts.get_attempt(id).await.unwrap(), closed);
    assert_eq!(closed.answer(MC).unwrap().response(), &json!(2));

    assert!(first.sessions().snapshot_draft(id).await.unwrap().is_none());
    assert!(storage.drafts.load_draft(id).await.unwrap().is_none());
    assert!(matches!(
        first.sessions().record_answer(id, SHORT, json!("Paris")).await,
        Err(SessionError::Attempt(AttemptError::NotInProgress(_)))
    ));
}

#[tokio::test]
async fn submit_twice_is_the_same_as_once() {
    let clock = manual_clock();
    let (storage, engine) = engine(clock.clone()).await;
    let sessions = engine.sessions();
    let id = sessions.start(QUIZ, StudentId::new(7)).await.unwrap().attempt_id;
    sessions.record_answer(id, MC, json!(2)).await.unwrap();
    sessions.snapshot_draft(id).await.unwrap();

    clock.advance(Duration::seconds(30));
    let first = sessions.submit(id).await.unwrap();
    assert!(first.newly_submitted);
    let stored = storage.attempts.get_attempt(id).await.unwrap();

    clock.advance(Duration::seconds(30));
    let second = sessions.submit(id).await.unwrap();
    assert!(!second.newly_submitted);
    assert_eq!(second.summary, first.summary);
    assert_eq!(storage.attempts.get_attempt(id).await.unwrap(), stored);

    assert_eq!(stored.status(), AttemptStatus::Submitted);
    assert_eq!(stored.submitted_at(), Some(fixed_now() + Duration::seconds(30)));
    assert!(storage.drafts.load_draft(id).await.unwrap().is_none());

    assert!(matches!(
        sessions.record_answer(id, SHORT, json!("Paris")).await,
        Err(SessionError::Attempt(AttemptError::NotInProgress(
            AttemptStatus::Submitted
        )))
    ));
}
