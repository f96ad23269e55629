//! Collected answers and scoring
//!
//! This module tracks the value selected for each question in a session and
//! derives the running total from it.

use std::collections::{HashMap, hash_map::Entry};

use serde::{Deserialize, Serialize};

use crate::quiz::config::QuestionId;

/// The selected option value per question
///
/// Each question holds at most one value. Recording a second value for the
/// same question replaces the first.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet {
    values: HashMap<QuestionId, u8>,
}

impl AnswerSet {
    /// Records `value` for `question`, returning the value it replaced
    pub fn record(&mut self, question: QuestionId, value: u8) -> Option<u8> {
        match self.values.entry(question) {
            Entry::Occupied(mut o) => Some(o.insert(value)),
            Entry::Vacant(v) => {
                v.insert(value);
                None
            }
        }
    }

    /// Returns the value recorded for `question`
    pub fn get(&self, question: &QuestionId) -> Option<u8> {
        self.values.get(question).copied()
    }

    /// Whether `question` has been answered
    pub fn contains(&self, question: &QuestionId) -> bool {
        self.values.contains_key(question)
    }

    /// Number of distinct questions answered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks if no question has been answered yet
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Sum of all recorded values
    ///
    /// Partial sets are fine; the total simply covers what has been answered.
    pub fn total(&self) -> u32 {
        self.iter().map(|(_, value)| u32::from(value)).sum()
    }

    /// Iterates over answered questions and their values
    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, u8)> {
        self.values.iter().map(|(id, value)| (id, *value))
    }
}
