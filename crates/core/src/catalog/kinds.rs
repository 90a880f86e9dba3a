//! Typed schemas for each exercise kind.
//!
//! Every kind declares its content, solution and answer shapes and the checks
//! that tie them together. The dispatch table in the parent module turns these
//! into one row per `ExerciseType`.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::ExerciseCategory;
use super::error::ValidationError;

pub(crate) trait ExerciseKind {
    type Content: DeserializeOwned;
    type Solution: DeserializeOwned;
    type Answer: DeserializeOwned;

    const CATEGORY: ExerciseCategory;
    const AUTOGRADABLE: bool;

    fn check_content(content: &Self::Content) -> Result<(), ValidationError>;

    fn check_solution(
        content: &Self::Content,
        solution: &Self::Solution,
    ) -> Result<(), ValidationError>;

    fn check_answer(content: &Self::Content, answer: &Self::Answer) -> Result<(), ValidationError>;

    /// Only consulted when `AUTOGRADABLE` is true.
    fn is_correct(
        _content: &Self::Content,
        _solution: &Self::Solution,
        _answer: &Self::Answer,
    ) -> bool {
        false
    }
}

//
// ─── SHARED CHECKS ─────────────────────────────────────────────────────────────
//

fn non_empty_options(field: &'static str, options: &[String]) -> Result<(), ValidationError> {
    if options.len() < 2 {
        return Err(ValidationError::Invalid {
            field,
            reason: format!("needs at least 2 entries, got {}", options.len()),
        });
    }
    if options.iter().any(|o| o.trim().is_empty()) {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

fn index_in_range(field: &'static str, index: usize, len: usize) -> Result<(), ValidationError> {
    if index >= len {
        return Err(ValidationError::IndexOutOfRange { field, index, len });
    }
    Ok(())
}

fn distinct_indices(field: &'static str, indices: &[usize], len: usize) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for &index in indices {
        index_in_range(field, index, len)?;
        if !seen.insert(index) {
            return Err(ValidationError::Duplicate { field, index });
        }
    }
    Ok(())
}

fn exact_len(field: &'static str, expected: usize, actual: usize) -> Result<(), ValidationError> {
    if expected != actual {
        return Err(ValidationError::LengthMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

fn permutation(field: &'static str, order: &[usize], len: usize) -> Result<(), ValidationError> {
    exact_len(field, len, order.len())?;
    distinct_indices(field, order, len)
}

fn absolute_url(field: &'static str, raw: &str) -> Result<(), ValidationError> {
    Url::parse(raw.trim())
        .map(|_| ())
        .map_err(|e| ValidationError::Invalid {
            field,
            reason: e.to_string(),
        })
}

fn normalize(text: &str, case_sensitive: bool) -> String {
    let trimmed = text.trim();
    if case_sensitive {
        trimmed.to_owned()
    } else {
        trimmed.to_lowercase()
    }
}

fn matches_any(answer: &str, accepted: &[String], case_sensitive: bool) -> bool {
    let answer = normalize(answer, case_sensitive);
    accepted
        .iter()
        .any(|candidate| normalize(candidate, case_sensitive) == answer)
}

fn acceptable_list(field: &'static str, accepted: &[String]) -> Result<(), ValidationError> {
    if accepted.iter().all(|a| a.trim().is_empty()) {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}

//
// ─── CHOICE ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OptionsContent {
    pub options: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SingleChoiceSolution {
    pub correct_answer: usize,
}

pub(crate) struct MultipleChoice;

impl ExerciseKind for MultipleChoice {
    type Content = OptionsContent;
    type Solution = SingleChoiceSolution;
    type Answer = usize;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Choice;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &OptionsContent) -> Result<(), ValidationError> {
        non_empty_options("options", &content.options)
    }

    fn check_solution(
        content: &OptionsContent,
        solution: &SingleChoiceSolution,
    ) -> Result<(), ValidationError> {
        index_in_range("correctAnswer", solution.correct_answer, content.options.len())
    }

    fn check_answer(content: &OptionsContent, answer: &usize) -> Result<(), ValidationError> {
        index_in_range("selected option", *answer, content.options.len())
    }

    fn is_correct(_: &OptionsContent, solution: &SingleChoiceSolution, answer: &usize) -> bool {
        *answer == solution.correct_answer
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MultiChoiceSolution {
    pub correct_answers: Vec<usize>,
}

pub(crate) struct MultipleSelect;

impl ExerciseKind for MultipleSelect {
    type Content = OptionsContent;
    type Solution = MultiChoiceSolution;
    type Answer = Vec<usize>;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Choice;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &OptionsContent) -> Result<(), ValidationError> {
        non_empty_options("options", &content.options)
    }

    fn check_solution(
        content: &OptionsContent,
        solution: &MultiChoiceSolution,
    ) -> Result<(), ValidationError> {
        if solution.correct_answers.is_empty() {
            return Err(ValidationError::Empty {
                field: "correctAnswers",
            });
        }
        distinct_indices("correctAnswers", &solution.correct_answers, content.options.len())
    }

    fn check_answer(content: &OptionsContent, answer: &Vec<usize>) -> Result<(), ValidationError> {
        distinct_indices("selected options", answer, content.options.len())
    }

    fn is_correct(_: &OptionsContent, solution: &MultiChoiceSolution, answer: &Vec<usize>) -> bool {
        let expected: BTreeSet<_> = solution.correct_answers.iter().collect();
        let given: BTreeSet<_> = answer.iter().collect();
        expected == given
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatementContent {
    pub statement: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TrueFalseSolution {
    pub correct_answer: bool,
}

pub(crate) struct TrueFalse;

impl ExerciseKind for TrueFalse {
    type Content = StatementContent;
    type Solution = TrueFalseSolution;
    type Answer = bool;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Choice;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &StatementContent) -> Result<(), ValidationError> {
        if content.statement.trim().is_empty() {
            return Err(ValidationError::Empty { field: "statement" });
        }
        Ok(())
    }

    fn check_solution(_: &StatementContent, _: &TrueFalseSolution) -> Result<(), ValidationError> {
        Ok(())
    }

    fn check_answer(_: &StatementContent, _: &bool) -> Result<(), ValidationError> {
        Ok(())
    }

    fn is_correct(_: &StatementContent, solution: &TrueFalseSolution, answer: &bool) -> bool {
        *answer == solution.correct_answer
    }
}

//
// ─── TEXT ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct ShortAnswerContent {
    pub max_length: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShortAnswerSolution {
    pub acceptable_answers: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

pub(crate) struct ShortAnswer;

impl ExerciseKind for ShortAnswer {
    type Content = ShortAnswerContent;
    type Solution = ShortAnswerSolution;
    type Answer = String;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Text;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &ShortAnswerContent) -> Result<(), ValidationError> {
        if content.max_length == Some(0) {
            return Err(ValidationError::Invalid {
                field: "maxLength",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    fn check_solution(
        _: &ShortAnswerContent,
        solution: &ShortAnswerSolution,
    ) -> Result<(), ValidationError> {
        acceptable_list("acceptableAnswers", &solution.acceptable_answers)
    }

    fn check_answer(content: &ShortAnswerContent, answer: &String) -> Result<(), ValidationError> {
        match content.max_length {
            Some(max) if answer.chars().count() > max => Err(ValidationError::TooLong {
                field: "answer",
                max,
            }),
            _ => Ok(()),
        }
    }

    fn is_correct(_: &ShortAnswerContent, solution: &ShortAnswerSolution, answer: &String) -> bool {
        matches_any(answer, &solution.acceptable_answers, solution.case_sensitive)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlanksContent {
    pub text: String,
    pub blanks: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlanksSolution {
    pub blanks: Vec<Vec<String>>,
    #[serde(default)]
    pub case_sensitive: bool,
}

pub(crate) struct FillInTheBlank;

impl ExerciseKind for FillInTheBlank {
    type Content = BlanksContent;
    type Solution = BlanksSolution;
    type Answer = Vec<String>;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Text;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &BlanksContent) -> Result<(), ValidationError> {
        if content.text.trim().is_empty() {
            return Err(ValidationError::Empty { field: "text" });
        }
        if content.blanks == 0 {
            return Err(ValidationError::Empty { field: "blanks" });
        }
        Ok(())
    }

    fn check_solution(
        content: &BlanksContent,
        solution: &BlanksSolution,
    ) -> Result<(), ValidationError> {
        exact_len("blanks", content.blanks, solution.blanks.len())?;
        for accepted in &solution.blanks {
            acceptable_list("blanks", accepted)?;
        }
        Ok(())
    }

    fn check_answer(content: &BlanksContent, answer: &Vec<String>) -> Result<(), ValidationError> {
        exact_len("answer", content.blanks, answer.len())
    }

    fn is_correct(_: &BlanksContent, solution: &BlanksSolution, answer: &Vec<String>) -> bool {
        answer
            .iter()
            .zip(&solution.blanks)
            .all(|(given, accepted)| matches_any(given, accepted, solution.case_sensitive))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct NumericContent {
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NumericSolution {
    pub value: f64,
    #[serde(default)]
    pub tolerance: f64,
}

pub(crate) struct Numeric;

impl ExerciseKind for Numeric {
    type Content = NumericContent;
    type Solution = NumericSolution;
    type Answer = f64;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Text;
    const AUTOGRADABLE: bool = true;

    fn check_content(_: &NumericContent) -> Result<(), ValidationError> {
        Ok(())
    }

    fn check_solution(_: &NumericContent, solution: &NumericSolution) -> Result<(), ValidationError> {
        if !solution.value.is_finite() {
            return Err(ValidationError::Invalid {
                field: "value",
                reason: "must be finite".into(),
            });
        }
        if !solution.tolerance.is_finite() || solution.tolerance < 0.0 {
            return Err(ValidationError::Invalid {
                field: "tolerance",
                reason: "must be a non-negative number".into(),
            });
        }
        Ok(())
    }

    fn check_answer(_: &NumericContent, answer: &f64) -> Result<(), ValidationError> {
        if !answer.is_finite() {
            return Err(ValidationError::Invalid {
                field: "answer",
                reason: "must be finite".into(),
            });
        }
        Ok(())
    }

    fn is_correct(_: &NumericContent, solution: &NumericSolution, answer: &f64) -> bool {
        (answer - solution.value).abs() <= solution.tolerance
    }
}

//
// ─── ARRANGEMENT ───────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MatchingContent {
    pub left: Vec<String>,
    pub right: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MatchingSolution {
    pub pairs: Vec<usize>,
}

pub(crate) struct Matching;

impl Matching {
    fn check_pairs(content: &MatchingContent, pairs: &[usize]) -> Result<(), ValidationError> {
        exact_len("pairs", content.left.len(), pairs.len())?;
        for &right in pairs {
            index_in_range("pairs", right, content.right.len())?;
        }
        Ok(())
    }
}

impl ExerciseKind for Matching {
    type Content = MatchingContent;
    type Solution = MatchingSolution;
    type Answer = Vec<usize>;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Arrangement;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &MatchingContent) -> Result<(), ValidationError> {
        if content.left.is_empty() {
            return Err(ValidationError::Empty { field: "left" });
        }
        if content.right.is_empty() {
            return Err(ValidationError::Empty { field: "right" });
        }
        Ok(())
    }

    fn check_solution(
        content: &MatchingContent,
        solution: &MatchingSolution,
    ) -> Result<(), ValidationError> {
        Self::check_pairs(content, &solution.pairs)
    }

    fn check_answer(content: &MatchingContent, answer: &Vec<usize>) -> Result<(), ValidationError> {
        Self::check_pairs(content, answer)
    }

    fn is_correct(_: &MatchingContent, solution: &MatchingSolution, answer: &Vec<usize>) -> bool {
        *answer == solution.pairs
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ItemsContent {
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderingSolution {
    pub order: Vec<usize>,
}

pub(crate) struct Ordering;

impl ExerciseKind for Ordering {
    type Content = ItemsContent;
    type Solution = OrderingSolution;
    type Answer = Vec<usize>;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Arrangement;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &ItemsContent) -> Result<(), ValidationError> {
        non_empty_options("items", &content.items)
    }

    fn check_solution(
        content: &ItemsContent,
        solution: &OrderingSolution,
    ) -> Result<(), ValidationError> {
        permutation("order", &solution.order, content.items.len())
    }

    fn check_answer(content: &ItemsContent, answer: &Vec<usize>) -> Result<(), ValidationError> {
        permutation("answer", answer, content.items.len())
    }

    fn is_correct(_: &ItemsContent, solution: &OrderingSolution, answer: &Vec<usize>) -> bool {
        *answer == solution.order
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DragDropContent {
    pub items: Vec<String>,
    pub zones: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DragDropSolution {
    pub placements: Vec<usize>,
}

pub(crate) struct DragAndDrop;

impl ExerciseKind for DragAndDrop {
    type Content = DragDropContent;
    type Solution = DragDropSolution;
    /// Zone per item; `null` while an item has not been placed yet.
    type Answer = Vec<Option<usize>>;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Arrangement;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &DragDropContent) -> Result<(), ValidationError> {
        if content.items.is_empty() {
            return Err(ValidationError::Empty { field: "items" });
        }
        if content.zones.is_empty() {
            return Err(ValidationError::Empty { field: "zones" });
        }
        Ok(())
    }

    fn check_solution(
        content: &DragDropContent,
        solution: &DragDropSolution,
    ) -> Result<(), ValidationError> {
        exact_len("placements", content.items.len(), solution.placements.len())?;
        for &zone in &solution.placements {
            index_in_range("placements", zone, content.zones.len())?;
        }
        Ok(())
    }

    fn check_answer(
        content: &DragDropContent,
        answer: &Vec<Option<usize>>,
    ) -> Result<(), ValidationError> {
        exact_len("answer", content.items.len(), answer.len())?;
        for zone in answer.iter().flatten() {
            index_in_range("answer", *zone, content.zones.len())?;
        }
        Ok(())
    }

    fn is_correct(
        _: &DragDropContent,
        solution: &DragDropSolution,
        answer: &Vec<Option<usize>>,
    ) -> bool {
        answer
            .iter()
            .zip(&solution.placements)
            .all(|(given, expected)| *given == Some(*expected))
    }
}

//
// ─── MEDIA ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListeningContent {
    pub audio_url: String,
    pub options: Vec<String>,
}

pub(crate) struct Listening;

impl ExerciseKind for Listening {
    type Content = ListeningContent;
    type Solution = SingleChoiceSolution;
    type Answer = usize;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Media;
    const AUTOGRADABLE: bool = true;

    fn check_content(content: &ListeningContent) -> Result<(), ValidationError> {
        absolute_url("audioUrl", &content.audio_url)?;
        non_empty_options("options", &content.options)
    }

    fn check_solution(
        content: &ListeningContent,
        solution: &SingleChoiceSolution,
    ) -> Result<(), ValidationError> {
        index_in_range("correctAnswer", solution.correct_answer, content.options.len())
    }

    fn check_answer(content: &ListeningContent, answer: &usize) -> Result<(), ValidationError> {
        index_in_range("selected option", *answer, content.options.len())
    }

    fn is_correct(_: &ListeningContent, solution: &SingleChoiceSolution, answer: &usize) -> bool {
        *answer == solution.correct_answer
    }
}

//
// ─── OPEN (MANUAL) ─────────────────────────────────────────────────────────────
//

/// Reference material for a human grader. Never used to score automatically.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct GraderNotes {
    pub sample_answer: Option<String>,
    pub rubric: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct LongAnswerContent {
    pub min_words: Option<usize>,
    pub max_words: Option<usize>,
}

pub(crate) struct LongAnswer;

impl ExerciseKind for LongAnswer {
    type Content = LongAnswerContent;
    type Solution = GraderNotes;
    type Answer = String;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Open;
    const AUTOGRADABLE: bool = false;

    fn check_content(content: &LongAnswerContent) -> Result<(), ValidationError> {
        if let (Some(min), Some(max)) = (content.min_words, content.max_words) {
            if min > max {
                return Err(ValidationError::Invalid {
                    field: "minWords",
                    reason: format!("{min} is greater than maxWords {max}"),
                });
            }
        }
        Ok(())
    }

    fn check_solution(_: &LongAnswerContent, _: &GraderNotes) -> Result<(), ValidationError> {
        Ok(())
    }

    fn check_answer(content: &LongAnswerContent, answer: &String) -> Result<(), ValidationError> {
        match content.max_words {
            Some(max) if answer.split_whitespace().count() > max => Err(ValidationError::TooLong {
                field: "answer words",
                max,
            }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpeakingContent {
    pub prompt: String,
    #[serde(default)]
    pub max_seconds: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordingAnswer {
    pub recording_url: String,
}

pub(crate) struct Speaking;

impl ExerciseKind for Speaking {
    type Content = SpeakingContent;
    type Solution = GraderNotes;
    type Answer = RecordingAnswer;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Open;
    const AUTOGRADABLE: bool = false;

    fn check_content(content: &SpeakingContent) -> Result<(), ValidationError> {
        if content.prompt.trim().is_empty() {
            return Err(ValidationError::Empty { field: "prompt" });
        }
        Ok(())
    }

    fn check_solution(_: &SpeakingContent, _: &GraderNotes) -> Result<(), ValidationError> {
        Ok(())
    }

    fn check_answer(_: &SpeakingContent, answer: &RecordingAnswer) -> Result<(), ValidationError> {
        absolute_url("recordingUrl", &answer.recording_url)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct UploadContent {
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadAnswer {
    pub file_name: String,
    pub url: String,
}

pub(crate) struct FileUpload;

impl ExerciseKind for FileUpload {
    type Content = UploadContent;
    type Solution = GraderNotes;
    type Answer = UploadAnswer;

    const CATEGORY: ExerciseCategory = ExerciseCategory::Open;
    const AUTOGRADABLE: bool = false;

    fn check_content(content: &UploadContent) -> Result<(), ValidationError> {
        if content.allowed_extensions.iter().any(|e| e.trim().is_empty()) {
            return Err(ValidationError::Empty {
                field: "allowedExtensions",
            });
        }
        Ok(())
    }

    fn check_solution(_: &UploadContent, _: &GraderNotes) -> Result<(), ValidationError> {
        Ok(())
    }

    fn check_answer(content: &UploadContent, answer: &UploadAnswer) -> Result<(), ValidationError> {
        if answer.file_name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "fileName" });
        }
        absolute_url("url", &answer.url)?;
        if content.allowed_extensions.is_empty() {
            return Ok(());
        }
        let extension = answer
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        let allowed = content
            .allowed_extensions
            .iter()
            .any(|e| e.trim().trim_start_matches('.').to_lowercase() == extension);
        if !allowed {
            return Err(ValidationError::Invalid {
                field: "fileName",
                reason: format!("extension `{extension}` is not allowed"),
            });
        }
        Ok(())
    }
}
