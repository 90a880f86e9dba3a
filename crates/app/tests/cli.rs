//! CLI integration tests using assert_cmd.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONTENT: &str = r#"{
  "exercises": [
    {
      "id": 1,
      "type": "MULTIPLE_CHOICE",
      "title": { "en": "6 + 2" },
      "points": 10,
      "content": { "options": ["6", "7", "8", "9"] },
      "solution": { "correctAnswer": 2 }
    },
    {
      "id": 2,
      "type": "LONG_ANSWER",
      "title": { "en": "Explain carrying" },
      "points": 20,
      "content": { "maxWords": 150 },
      "solution": { "rubric": "Mentions place value" }
    }
  ],
  "assessments": [
    { "id": 4, "title": "Arithmetic", "exerciseIds": [1, 2], "passingScore": 60 }
  ]
}"#;

const BROKEN: &str = r#"{
  "exercises": [
    {
      "id": 7,
      "type": "ORDERING",
      "title": { "en": "Sort" },
      "points": 3,
      "content": { "items": ["b", "a"] },
      "solution": { "order": [0, 0] }
    }
  ]
}"#;

fn assess(db: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("assess").unwrap();
    cmd.env("ASSESS_DB_URL", format!("sqlite://{}?mode=rwc", db.display()))
        .env("RUST_LOG", "warn");
    cmd
}

fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn check_exercises_accepts_valid_content_without_touching_the_database() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("data").join("assess.sqlite3");
    let file = write(&dir, "content.json", CONTENT);

    assess(&db)
        .arg("check-exercises")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 exercise(s) and 1 assessment(s) valid"));
    assert!(!db.exists());
}

#[test]
fn check_exercises_reports_rejections() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("assess.sqlite3");
    let file = write(&dir, "broken.json", BROKEN);

    assess(&db)
        .arg("check-exercises")
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("[7] INVALID"))
        .stderr(predicate::str::contains("1 of 1 exercise(s) rejected"));
}

#[test]
fn imported_content_shows_up_in_progress() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("data").join("assess.sqlite3");
    let file = write(&dir, "content.json", CONTENT);

    assess(&db)
        .arg("check-exercises")
        .arg(&file)
        .arg("--import")
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported into"));

    assess(&db)
        .args(["progress", "4", "--roster", "12"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rosterSize\": 12"))
        .stdout(predicate::str::contains("\"started\": 0"));

    assess(&db)
        .args(["progress", "5", "--roster", "12"])
        .assert()
        .failure();
}

#[test]
fn unknown_attempt_cannot_be_finalized() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("assess.sqlite3");

    assess(&db)
        .args(["finalize", "67e55044-10b1-426f-9247-bb680e5fe0c8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("finalizing attempt"));
}

#[test]
fn invalid_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("assess.sqlite3");
    let config = write(&dir, "assess.toml", "autosave = 3\n");

    assess(&db)
        .arg("--config")
        .arg(&config)
        .args(["progress", "1", "--roster", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading configuration"));
}
