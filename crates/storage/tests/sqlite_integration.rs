use assess_core::model::{
    Assessment, AssessmentId, Attempt, AttemptId, AttemptStatus, Difficulty, Direction,
    ExerciseDraft, ExerciseId, LocalizedText, StudentId,
};
use assess_core::time::fixed_now;
use assess_core::{ExerciseCatalog, ExerciseType};
use chrono::Duration;
use serde_json::json;
use storage::repository::{
    AssessmentRepository, AttemptRepository, DraftStore, ExerciseRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn seed_assessment() -> Assessment {
    Assessment::new(
        AssessmentId::new(1),
        "Capitals",
        vec![ExerciseId::new(1), ExerciseId::new(2)],
        Some(600),
        Some(50),
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_exercises_keep_payloads() {
    let repo = connect("memdb_exercises").await;
    let exercise = ExerciseDraft {
        id: ExerciseId::new(1),
        exercise_type: ExerciseType::MultipleChoice,
        title: LocalizedText::single("en", "Capital of France"),
        instructions: LocalizedText::single("en", "Pick one"),
        points: 10,
        difficulty: Difficulty::Easy,
        content: json!({ "options": ["Paris", "Lyon", "Nice"] }),
        solution: json!({ "correctAnswer": 0 }),
    }
    .validate(&ExerciseCatalog::new())
    .unwrap();
    repo.upsert_exercise(&exercise).await.unwrap();

    let fetched = repo.get_exercise(ExerciseId::new(1)).await.unwrap();
    assert_eq!(fetched, exercise);

    assert!(matches!(
        repo.get_exercises(&[ExerciseId::new(1), ExerciseId::new(7)]).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_attempt_lifecycle_persists_answers_and_time() {
    let repo = connect("memdb_attempts").await;
    let assessment = seed_assessment();
    repo.upsert_assessment(&assessment).await.unwrap();
    assert_eq!(repo.get_assessment(assessment.id()).await.unwrap(), assessment);

    let t0 = fixed_now();
    let mut attempt = Attempt::start(AttemptId::generate(), &assessment, StudentId::new(5), t0);
    repo.create_attempt(&attempt).await.unwrap();

    attempt.record_answer(ExerciseId::new(1), json!(0)).unwrap();
    attempt
        .advance(Direction::Next, t0 + Duration::seconds(20))
        .unwrap();
    attempt.submit(t0 + Duration::seconds(50));
    repo.save_attempt(&attempt).await.unwrap();

    let fetched = repo.get_attempt(attempt.id()).await.unwrap();
    assert_eq!(fetched, attempt);
    assert_eq!(fetched.status(), AttemptStatus::Submitted);
    assert_eq!(fetched.timer().seconds_on(ExerciseId::new(1)), 20);
    assert_eq!(fetched.timer().seconds_on(ExerciseId::new(2)), 30);

    let listed = repo.list_attempts(assessment.id()).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn sqlite_rejects_second_open_attempt() {
    let repo = connect("memdb_open_unique").await;
    let assessment = seed_assessment();
    repo.upsert_assessment(&assessment).await.unwrap();

    let first = Attempt::start(AttemptId::generate(), &assessment, StudentId::new(5), fixed_now());
    repo.create_attempt(&first).await.unwrap();

    let second = Attempt::start(AttemptId::generate(), &assessment, StudentId::new(5), fixed_now());
    assert!(matches!(
        repo.create_attempt(&second).await,
        Err(StorageError::Conflict)
    ));

    let open = repo
        .find_open_attempt(assessment.id(), StudentId::new(5))
        .await
        .unwrap()
        .expect("open attempt");
    assert_eq!(open.id(), first.id());

    let other_student =
        Attempt::start(AttemptId::generate(), &assessment, StudentId::new(6), fixed_now());
    repo.create_attempt(&other_student).await.unwrap();
}

#[tokio::test]
async fn sqlite_save_requires_existing_attempt() {
    let repo = connect("memdb_save_missing").await;
    let assessment = seed_assessment();
    repo.upsert_assessment(&assessment).await.unwrap();
    let attempt = Attempt::start(AttemptId::generate(), &assessment, StudentId::new(5), fixed_now());
    assert!(matches!(
        repo.save_attempt(&attempt).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_submit_never_overwrites_a_closed_attempt() {
    let repo = connect("memdb_submit_once").await;
    let assessment = seed_assessment();
    repo.upsert_assessment(&assessment).await.unwrap();

    let open = Attempt::start(AttemptId::generate(), &assessment, StudentId::new(5), fixed_now());
    repo.create_attempt(&open).await.unwrap();

    let mut submitted = open.clone();
    submitted.record_answer(ExerciseId::new(1), json!(0)).unwrap();
    submitted.submit(fixed_now() + Duration::seconds(40));
    repo.submit_attempt(&submitted).await.unwrap();

    let mut stale = open;
    stale.submit(fixed_now() + Duration::seconds(90));
    assert!(matches!(
        repo.submit_attempt(&stale).await,
        Err(StorageError::Conflict)
    ));
    assert_eq!(repo.get_attempt(submitted.id()).await.unwrap(), submitted);

    let missing = Attempt::start(AttemptId::generate(), &assessment, StudentId::new(6), fixed_now());
    assert!(matches!(
        repo.submit_attempt(&missing).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn sqlite_drafts_overwrite_and_delete() {
    let repo = connect("memdb_drafts").await;
    let id = AttemptId::generate();

    assert!(repo.load_draft(id).await.unwrap().is_none());
    repo.save_draft(id, b"first").await.unwrap();
    repo.save_draft(id, b"second").await.unwrap();
    assert_eq!(repo.load_draft(id).await.unwrap(), Some(b"second".to_vec()));

    repo.delete_draft(id).await.unwrap();
    assert!(repo.load_draft(id).await.unwrap().is_none());
}
