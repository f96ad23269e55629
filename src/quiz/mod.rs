//! Questionnaire content and scoring bands
//!
//! This module contains the static, injectable side of the quiz: the
//! question set, the reference content, and the categories a total score
//! maps onto.

pub mod category;
pub mod config;
pub mod content;
