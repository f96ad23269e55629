//! # Growth Score Library
//!
//! This library provides the core logic of the Growth Score quiz: a short
//! self-assessment that walks a respondent through fixed multiple-choice
//! questions, totals the picked option values, maps the total to one of four
//! growth categories and captures a contact email for a detailed follow-up.
//! It handles questionnaire content, the answering session, the form relay
//! the results are sent to, and an async driver that ties them together.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::ignored_unit_patterns)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
use serde::{Deserialize, Serialize};

pub mod answers;
pub mod capture;
pub mod constants;
pub mod driver;
pub mod engine;
pub mod quiz;
pub mod session;
pub mod settings;
pub mod validation;

use session::SessionId;

/// Alarm messages for timed events in a session
///
/// The engine asks for these through its `schedule_message` callback and
/// expects them back once the delay has passed. Each alarm names the session
/// and the auto-advance it belongs to, so one that arrives after it was
/// superseded or cancelled is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// Move on from question `from` after an answer was picked
    AutoAdvance {
        /// Session that scheduled the alarm
        session: SessionId,
        /// Cursor position when the answer was recorded
        from: usize,
        /// Distinguishes successive auto-advances within a session
        generation: u64,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_message_round_trip() {
        let alarm = AlarmMessage::AutoAdvance {
            session: SessionId::new(),
            from: 3,
            generation: 7,
        };

        let json = serde_json::to_string(&alarm).unwrap();
        assert!(json.contains("AutoAdvance"));

        let back: AlarmMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alarm);
    }

    #[test]
    fn test_alarm_messages_differ_by_generation() {
        let session = SessionId::new();
        let first = AlarmMessage::AutoAdvance {
            session,
            from: 0,
            generation: 1,
        };
        let second = AlarmMessage::AutoAdvance {
            session,
            from: 0,
            generation: 2,
        };
        assert_ne!(first, second);
    }
}
