//! Questionnaire configuration
//!
//! This module defines the questions a quiz session walks through. The
//! content is plain data: it is deserialized (or built in code), validated
//! once with `garde`, and then handed to the engine, which never mutates it.

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::constants::quiz::{
    MAX_ID_LENGTH, MAX_LABEL_LENGTH, MAX_OPTION_VALUE, MAX_PROMPT_LENGTH, MAX_QUESTION_COUNT,
    MAX_TITLE_LENGTH, MIN_OPTION_VALUE, OPTION_COUNT,
};

type ValidationResult = garde::Result;

/// A stable identifier for a question
///
/// Answers are keyed by this identifier rather than by position, so a
/// questionnaire can be reordered without invalidating recorded answers.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Validate,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct QuestionId(#[garde(length(min = 1, max = MAX_ID_LENGTH))] String);

impl QuestionId {
    /// Creates an identifier from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QuestionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A single selectable answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AnswerOption {
    /// Text shown to the respondent
    #[garde(length(min = 1, max = MAX_LABEL_LENGTH))]
    pub label: String,
    /// Maturity rank this option scores
    #[garde(range(min = MIN_OPTION_VALUE, max = MAX_OPTION_VALUE))]
    pub value: u8,
}

impl AnswerOption {
    /// Creates an option with the given label and rank
    pub fn new(label: impl Into<String>, value: u8) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Checks that option values climb strictly, so every question spans the same
/// rank range and totals stay comparable across questions.
#[allow(clippy::ptr_arg)]
fn validate_option_values(options: &Vec<AnswerOption>, _ctx: &()) -> ValidationResult {
    let ascending = options
        .iter()
        .tuple_windows()
        .all(|(a, b)| a.value < b.value);

    if ascending {
        Ok(())
    } else {
        Err(garde::Error::new("option values must be strictly increasing"))
    }
}

/// A multiple-choice question in the questionnaire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Question {
    /// Stable identifier answers are recorded against
    #[garde(dive)]
    pub id: QuestionId,
    /// The question text
    #[garde(length(min = 1, max = MAX_PROMPT_LENGTH))]
    pub prompt: String,
    /// Ordered options, lowest rank first
    #[garde(length(equal = OPTION_COUNT), custom(validate_option_values), dive)]
    pub options: Vec<AnswerOption>,
}

impl Question {
    /// Creates a question from its parts
    pub fn new(
        id: impl Into<QuestionId>,
        prompt: impl Into<String>,
        options: Vec<AnswerOption>,
    ) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            options,
        }
    }

    /// Finds the option carrying `value`
    pub fn option(&self, value: u8) -> Option<&AnswerOption> {
        self.options.iter().find(|option| option.value == value)
    }
}

#[allow(clippy::ptr_arg)]
fn validate_unique_ids(questions: &Vec<Question>, _ctx: &()) -> ValidationResult {
    match questions.iter().duplicates_by(|q| q.id.clone()).next() {
        Some(duplicate) => Err(garde::Error::new(format!(
            "question id `{}` is used more than once",
            duplicate.id
        ))),
        None => Ok(()),
    }
}

/// A complete questionnaire: the fixed, ordered question set of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Questionnaire {
    /// Display title
    #[garde(length(max = MAX_TITLE_LENGTH))]
    pub title: String,

    /// The questions, in presentation order
    #[garde(length(min = 1, max = MAX_QUESTION_COUNT), custom(validate_unique_ids), dive)]
    pub questions: Vec<Question>,
}

impl Questionnaire {
    /// Creates a questionnaire from a title and questions
    pub fn new(title: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            title: title.into(),
            questions,
        }
    }

    /// Returns the number of questions
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks if this questionnaire contains any questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns the question at `index`
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Finds a question and its position by identifier
    pub fn find(&self, id: &QuestionId) -> Option<(usize, &Question)> {
        self.questions.iter().enumerate().find(|(_, q)| &q.id == id)
    }

    /// Highest achievable total score
    pub fn max_score(&self) -> u32 {
        self.questions
            .iter()
            .filter_map(|q| q.options.iter().map(|o| u32::from(o.value)).max())
            .sum()
    }

    /// Parses and validates a questionnaire from JSON
    ///
    /// # Errors
    ///
    /// Returns [`crate::settings::Error`] if the text is not valid JSON or the
    /// content breaks a questionnaire invariant.
    pub fn from_json(text: &str) -> Result<Self, crate::settings::Error> {
        let questionnaire: Self = serde_json::from_str(text)?;
        questionnaire.validate()?;
        Ok(questionnaire)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn ranked_options() -> Vec<AnswerOption> {
        (1..=4)
            .map(|v| AnswerOption::new(format!("Level {v}"), v))
            .collect()
    }

    fn create_test_questionnaire() -> Questionnaire {
        Questionnaire::new(
            "Test",
            vec![
                Question::new("a", "First?", ranked_options()),
                Question::new("b", "Second?", ranked_options()),
            ],
        )
    }

    #[test]
    fn test_questionnaire_validation() {
        let questionnaire = create_test_questionnaire();
        assert!(questionnaire.validate().is_ok());
        assert_eq!(questionnaire.len(), 2);
        assert!(!questionnaire.is_empty());
        assert_eq!(questionnaire.max_score(), 8);
    }

    #[test]
    fn test_questionnaire_empty_is_invalid() {
        let questionnaire = Questionnaire::new("Empty", vec![]);
        assert!(questionnaire.validate().is_err());
    }

    #[test]
    fn test_questionnaire_duplicate_ids() {
        let mut questionnaire = create_test_questionnaire();
        questionnaire.questions[1].id = QuestionId::from("a");
        assert!(questionnaire.validate().is_err());
    }

    #[test]
    fn test_question_wrong_option_count() {
        let mut options = ranked_options();
        options.pop();
        let question = Question::new("a", "Three options?", options);
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_question_values_out_of_range() {
        let options = (2..=5).map(|v| AnswerOption::new("x", v)).collect();
        let question = Question::new("a", "Out of range?", options);
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_question_values_not_ascending() {
        let options = [1, 3, 2, 4]
            .into_iter()
            .map(|v| AnswerOption::new("x", v))
            .collect();
        let question = Question::new("a", "Shuffled?", options);
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_question_empty_id() {
        let question = Question::new("", "No id?", ranked_options());
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_find_and_option() {
        let questionnaire = create_test_questionnaire();
        let (index, question) = questionnaire.find(&QuestionId::from("b")).unwrap();
        assert_eq!(index, 1);
        assert!(question.option(4).is_some());
        assert!(question.option(0).is_none());
        assert!(question.option(5).is_none());
        assert_eq!(question.option(2).unwrap().label, "Level 2");
        assert!(questionnaire.find(&QuestionId::from("missing")).is_none());
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::to_string(&create_test_questionnaire()).unwrap();
        let parsed = Questionnaire::from_json(&json).unwrap();
        assert_eq!(parsed, create_test_questionnaire());
    }

    #[test]
    fn test_from_json_rejects_invalid_content() {
        let json = r#"{"title":"Bad","questions":[]}"#;
        assert!(Questionnaire::from_json(json).is_err());
        assert!(Questionnaire::from_json("not json").is_err());
    }

    #[test]
    fn test_question_id_serializes_transparently() {
        let id = QuestionId::from("pipeline");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"pipeline\"");
        assert_eq!(id.to_string(), "pipeline");
    }
}
