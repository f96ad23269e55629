//! Configuration constants for the Growth Score quiz
//!
//! This module contains the limits and default timings used throughout the
//! crate to keep questionnaire content well-formed and give the engine and
//! relay consistent boundaries.

/// Questionnaire content limits
pub mod quiz {
    /// Number of options every question must offer
    pub const OPTION_COUNT: usize = 4;
    /// Lowest rank value an option can carry
    pub const MIN_OPTION_VALUE: u8 = 1;
    /// Highest rank value an option can carry
    pub const MAX_OPTION_VALUE: u8 = 4;
    /// Maximum number of questions in a single questionnaire
    pub const MAX_QUESTION_COUNT: usize = 50;
    /// Maximum length of a questionnaire title
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum length of a question prompt
    pub const MAX_PROMPT_LENGTH: usize = 200;
    /// Maximum length of an option label
    pub const MAX_LABEL_LENGTH: usize = 200;
    /// Maximum length of a question identifier
    pub const MAX_ID_LENGTH: usize = 64;
    /// Maximum length of a category advisory message
    pub const MAX_ADVICE_LENGTH: usize = 500;
}

/// Category thresholds, as a percentage of the maximum score
pub mod category {
    /// Lower bound of the "Growth Ready" band
    pub const READY_PERCENT: u32 = 75;
    /// Lower bound of the "Growth Potential" band
    pub const POTENTIAL_PERCENT: u32 = 50;
    /// Lower bound of the "Growth Opportunity" band
    pub const OPPORTUNITY_PERCENT: u32 = 25;
}

/// Timing defaults in milliseconds
pub mod timing {
    /// Pause between answering a question and moving to the next one
    pub const AUTO_ADVANCE_DELAY: u64 = 300;
    /// Simulated round trip of a demo-mode submission
    pub const DEMO_SUBMIT_DELAY: u64 = 1_000;
    /// Minimum configurable delay
    pub const MIN_DELAY: u64 = 0;
    /// Maximum configurable delay
    pub const MAX_DELAY: u64 = 10_000;
    /// Timeout applied to relay requests
    pub const REQUEST_TIMEOUT: u64 = 10_000;
    /// Shortest configurable request timeout
    pub const MIN_REQUEST_TIMEOUT: u64 = 1;
    /// Longest configurable request timeout
    pub const MAX_REQUEST_TIMEOUT: u64 = 60_000;
}

/// Contact capture configuration
pub mod capture {
    /// Placeholder left in unconfigured endpoint URLs; selects demo mode
    pub const DEMO_SENTINEL: &str = "[[FORM_ID]]";
    /// Maximum length of a submitted email address
    pub const MAX_EMAIL_LENGTH: usize = 254;
}

/// Contact form field limits
pub mod contact {
    /// Minimum length of the sender's name
    pub const MIN_NAME_LENGTH: usize = 2;
    /// Minimum length of the free-form message
    pub const MIN_MESSAGE_LENGTH: usize = 10;
    /// Maximum length of any single-line field
    pub const MAX_FIELD_LENGTH: usize = 200;
    /// Maximum length of the free-form message
    pub const MAX_MESSAGE_LENGTH: usize = 5_000;
}
