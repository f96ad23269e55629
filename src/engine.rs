//! Quiz engine and state management
//!
//! This module contains the engine that drives a respondent through a fixed
//! questionnaire: it records answers, moves the cursor, computes the score,
//! derives the result category and tracks the follow-up contact submission.
//!
//! The engine performs no I/O. Delays are requested through a
//! `schedule_message` callback and come back as [`AlarmMessage`]s, display
//! changes are pushed through a [`Tunnel`], and delivery of the contact
//! submission is left to the caller (see [`crate::driver`]).

use std::fmt::Debug;

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;
use tracing::{debug, warn};
use web_time::Duration;

use crate::{
    AlarmMessage,
    answers::AnswerSet,
    capture::{self, CapturePayload},
    constants::timing::{AUTO_ADVANCE_DELAY, MAX_DELAY, MIN_DELAY},
    quiz::{
        category::{AdviceTable, Category},
        config::{AnswerOption, QuestionId, Questionnaire},
    },
    session::{SessionId, Tunnel},
    settings::validate_duration,
    validation::EmailValidator,
};

/// The coarse lifecycle stage of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Walking through the questions
    #[default]
    Answering,
    /// Showing the score and category
    Results,
    /// The contact submission went through
    Submitted,
}

/// Engine tuning options
#[serde_with::serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Options {
    /// Pause between answering the current question and moving on
    #[garde(custom(validate_duration::<MIN_DELAY, MAX_DELAY>))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub auto_advance: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            auto_advance: Duration::from_millis(AUTO_ADVANCE_DELAY),
        }
    }
}

/// Errors that can occur while driving a session
///
/// Everything except [`Error::Capture`] is a contract violation: the caller
/// asked for something the current state does not allow.
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The questionnaire handed to the engine breaks a content invariant
    #[error("questionnaire is invalid: {0}")]
    InvalidContent(String),
    /// No question has this identifier
    #[error("unknown question `{0}`")]
    UnknownQuestion(QuestionId),
    /// The value is not one of the question's option values
    #[error("`{value}` is not an option of question `{question}`")]
    InvalidValue {
        /// The question being answered
        question: QuestionId,
        /// The rejected value
        value: u8,
    },
    /// Results were requested before every question was answered
    #[error("only {answered} of {total} questions answered")]
    Incomplete {
        /// Questions answered so far
        answered: usize,
        /// Questions in the questionnaire
        total: usize,
    },
    /// The operation is not available in the current phase
    #[error("not allowed while in the {0:?} phase")]
    WrongPhase(Phase),
    /// The email is empty or not structurally valid
    #[error("email address is invalid")]
    InvalidEmail,
    /// A submission is already waiting on the relay
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    /// A submission outcome arrived with no submission in flight
    #[error("no submission is in flight")]
    NoSubmissionInFlight,
    /// The relay did not accept the submission; the user may retry
    #[error(transparent)]
    Capture(capture::Error),
}

impl Error {
    /// Whether the user can recover by trying again
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Capture(_))
    }
}

/// Events a rendering surface can feed into the engine
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    /// An option was picked for a question
    Answer {
        /// The question answered
        question: QuestionId,
        /// The picked option's value
        value: u8,
    },
    /// The "Previous" control
    Previous,
    /// The "Next" control
    Next,
    /// The "See My Score" control
    ShowResults,
}

/// A question as presented to the respondent
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct QuestionView {
    /// Position of the question (0-based)
    pub index: usize,
    /// Total number of questions
    pub count: usize,
    /// Identifier to answer against
    pub id: QuestionId,
    /// Question text
    pub prompt: String,
    /// Options, lowest rank first
    pub options: Vec<AnswerOption>,
    /// Value currently selected for this question, if any
    pub selected: Option<u8>,
}

/// How far through the questionnaire the respondent is
#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Questions answered
    pub answered: usize,
    /// Questions in the questionnaire
    pub total: usize,
    /// Share of questions answered, rounded to a whole percent
    pub percent_complete: u8,
    /// Cursor position as a fraction, `(index + 1) / total`
    pub position: f64,
}

/// The outcome shown once results are entered
#[skip_serializing_none]
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ResultView {
    /// Total score
    pub score: u32,
    /// Highest achievable score
    pub max_score: u32,
    /// Result category
    pub category: Category,
    /// Display label of the category
    pub label: String,
    /// Advisory message for the category
    pub advice: String,
    /// Whether a contact submission is waiting on the relay
    pub submitting: bool,
    /// Address the results were sent to, once submitted
    pub contact_email: Option<String>,
}

/// Incremental updates pushed to the rendering surface
#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum UpdateMessage {
    /// An answer was stored
    AnswerRecorded {
        /// The question answered
        question: QuestionId,
        /// The stored value
        value: u8,
        /// Progress after recording
        progress: Progress,
        /// Whether results can now be requested
        complete: bool,
    },
    /// The cursor moved to another question
    QuestionChanged(QuestionView),
    /// Results were entered
    Results(ResultView),
    /// A contact submission was handed to the relay
    Submitting,
    /// The contact submission went through
    Submitted {
        /// Address the results were sent to
        email: String,
    },
    /// The contact submission failed and may be retried
    SubmissionFailed {
        /// Human-readable reason
        reason: String,
    },
}

/// Full snapshots of a session for the rendering surface
#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum SyncMessage {
    /// Answering phase
    Question {
        /// The current question
        question: QuestionView,
        /// Completion and cursor position
        progress: Progress,
        /// Whether the "Previous" control is enabled
        can_go_back: bool,
        /// Whether the "Next" control is enabled
        can_go_next: bool,
        /// Whether "See My Score" is offered
        can_show_results: bool,
    },
    /// Results phase, before a successful submission
    Results(ResultView),
    /// Submission complete
    Submitted(ResultView),
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// A single respondent's pass through the questionnaire
///
/// Sessions are ephemeral and never go back from results to answering;
/// retaking the quiz means starting a fresh engine with [`QuizEngine::restarted`].
#[derive(Clone, Serialize)]
pub struct QuizEngine {
    /// Identifies this session in scheduled alarms
    id: SessionId,
    /// The fixed question set
    questionnaire: Questionnaire,
    /// Advisory copy per category
    advice: AdviceTable,
    /// Timing options
    options: Options,
    /// Values picked so far
    answers: AnswerSet,
    /// Cursor into the questions
    current_index: usize,
    /// Lifecycle stage
    phase: Phase,
    /// Address given for the follow-up
    contact_email: Option<String>,
    /// Whether a submission has gone through
    submitted: bool,
    /// Whether a submission is waiting on the relay
    submitting: bool,
    /// The auto-advance alarm currently honored, if any
    pending_advance: Option<AlarmMessage>,
    /// Bumped for every auto-advance so older alarms never match
    generation: u64,
}

impl Debug for QuizEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuizEngine")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("current_index", &self.current_index)
            .field("answered", &self.answers.len())
            .finish_non_exhaustive()
    }
}

impl QuizEngine {
    /// Creates a fresh session over validated content
    ///
    /// The session starts on the first question with no answers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContent`] if the questionnaire, advice table or
    /// options break their invariants.
    pub fn new(
        questionnaire: Questionnaire,
        advice: AdviceTable,
        options: Options,
    ) -> Result<Self, Error> {
        questionnaire
            .validate()
            .map_err(|report| Error::InvalidContent(report.to_string()))?;
        advice
            .validate()
            .map_err(|report| Error::InvalidContent(report.to_string()))?;
        options
            .validate()
            .map_err(|report| Error::InvalidContent(report.to_string()))?;

        Ok(Self {
            id: SessionId::new(),
            questionnaire,
            advice,
            options,
            answers: AnswerSet::default(),
            current_index: 0,
            phase: Phase::Answering,
            contact_email: None,
            submitted: false,
            submitting: false,
            pending_advance: None,
            generation: 0,
        })
    }

    /// A brand new session over the same content
    ///
    /// The returned engine has a new [`SessionId`], so alarms scheduled by
    /// this one are ignored by it.
    pub fn restarted(&self) -> Self {
        Self {
            id: SessionId::new(),
            questionnaire: self.questionnaire.clone(),
            advice: self.advice.clone(),
            options: self.options,
            answers: AnswerSet::default(),
            current_index: 0,
            phase: Phase::Answering,
            contact_email: None,
            submitted: false,
            submitting: false,
            pending_advance: None,
            generation: 0,
        }
    }

    // Read-only state

    /// This session's identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The question set
    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    /// Answers recorded so far
    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    /// Cursor position
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Lifecycle stage
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Address given for the follow-up, if any
    pub fn contact_email(&self) -> Option<&str> {
        self.contact_email.as_deref()
    }

    /// Whether the contact submission has gone through
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    /// Whether a contact submission is waiting on the relay
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// The auto-advance alarm the engine will currently honor
    pub fn pending_alarm(&self) -> Option<&AlarmMessage> {
        self.pending_advance.as_ref()
    }

    /// Whether every question has an answer, regardless of cursor position
    pub fn is_complete(&self) -> bool {
        self.answers.len() == self.questionnaire.len()
    }

    /// Sum of recorded values; partial while answers are missing
    pub fn compute_score(&self) -> u32 {
        self.answers.total()
    }

    /// Highest achievable score
    pub fn max_score(&self) -> u32 {
        self.questionnaire.max_score()
    }

    /// Maps a score onto a category against this questionnaire's maximum
    pub fn categorize(&self, score: u32) -> Category {
        Category::from_score(score, self.max_score())
    }

    /// Advisory message for `category`
    pub fn advice(&self, category: Category) -> &str {
        self.advice.get(category)
    }

    /// Completion and cursor position
    pub fn progress(&self) -> Progress {
        let answered = self.answers.len();
        let total = self.questionnaire.len();

        let (percent_complete, position) = if total == 0 {
            (0, 0.)
        } else {
            (
                ((answered * 100 + total / 2) / total) as u8,
                (self.current_index + 1) as f64 / total as f64,
            )
        };

        Progress {
            answered,
            total,
            percent_complete,
            position,
        }
    }

    /// The question under the cursor as presented to the respondent
    pub fn current_question(&self) -> Option<QuestionView> {
        self.question_view(self.current_index)
    }

    fn question_view(&self, index: usize) -> Option<QuestionView> {
        let question = self.questionnaire.get(index)?;

        Some(QuestionView {
            index,
            count: self.questionnaire.len(),
            id: question.id.clone(),
            prompt: question.prompt.clone(),
            options: question.options.clone(),
            selected: self.answers.get(&question.id),
        })
    }

    /// The current score, category and submission status
    pub fn result_view(&self) -> ResultView {
        let score = self.compute_score();
        let category = self.categorize(score);

        ResultView {
            score,
            max_score: self.max_score(),
            category,
            label: category.label().to_owned(),
            advice: self.advice(category).to_owned(),
            submitting: self.submitting,
            contact_email: self.contact_email.clone(),
        }
    }

    fn can_go_back(&self) -> bool {
        matches!(self.phase, Phase::Answering) && self.current_index > 0
    }

    fn can_go_next(&self) -> bool {
        matches!(self.phase, Phase::Answering) && self.current_index + 1 < self.questionnaire.len()
    }

    // Mutations

    /// Records `value` as the answer to `question`
    ///
    /// A repeat answer replaces the earlier one. When the answered question is
    /// the current one and not the last, an auto-advance alarm is scheduled
    /// after the configured delay; the answer itself is stored immediately.
    ///
    /// # Errors
    ///
    /// * [`Error::WrongPhase`] - Results have already been entered
    /// * [`Error::UnknownQuestion`] - No question has this identifier
    /// * [`Error::InvalidValue`] - The value is not one of the question's options
    pub fn record_answer<S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        question: &QuestionId,
        value: u8,
        mut schedule_message: S,
    ) -> Result<(), Error> {
        if self.phase != Phase::Answering {
            return Err(Error::WrongPhase(self.phase));
        }

        let Some((index, config)) = self.questionnaire.find(question) else {
            return Err(Error::UnknownQuestion(question.clone()));
        };

        let Some(option) = config.option(value) else {
            return Err(Error::InvalidValue {
                question: question.clone(),
                value,
            });
        };
        debug!(session = %self.id, %question, value, label = %option.label, "answer picked");

        let replaced = self.answers.record(question.clone(), value);
        if replaced.is_some() {
            debug!(session = %self.id, %question, ?replaced, "answer replaced");
        }

        if index == self.current_index && index + 1 < self.questionnaire.len() {
            self.generation += 1;

            let alarm = AlarmMessage::AutoAdvance {
                session: self.id,
                from: index,
                generation: self.generation,
            };

            self.pending_advance = Some(alarm.clone());
            schedule_message(alarm, self.options.auto_advance);
        }

        Ok(())
    }

    /// Moves the cursor back one question
    ///
    /// Cancels any pending auto-advance. Returns whether the cursor moved;
    /// at the first question, or outside the answering phase, this is a no-op.
    pub fn go_to_previous(&mut self) -> bool {
        if self.phase != Phase::Answering {
            return false;
        }

        self.pending_advance = None;

        if self.can_go_back() {
            self.current_index -= 1;
            true
        } else {
            false
        }
    }

    /// Moves the cursor forward one question
    ///
    /// Cancels any pending auto-advance. Returns whether the cursor moved;
    /// at the last question, or outside the answering phase, this is a no-op.
    pub fn go_to_next(&mut self) -> bool {
        if self.phase != Phase::Answering {
            return false;
        }

        self.pending_advance = None;

        if self.can_go_next() {
            self.current_index += 1;
            true
        } else {
            false
        }
    }

    /// Switches from answering to results
    ///
    /// # Errors
    ///
    /// * [`Error::WrongPhase`] - Results were already entered
    /// * [`Error::Incomplete`] - Some question is still unanswered
    pub fn enter_results(&mut self) -> Result<(), Error> {
        if self.phase != Phase::Answering {
            return Err(Error::WrongPhase(self.phase));
        }

        if !self.is_complete() {
            return Err(Error::Incomplete {
                answered: self.answers.len(),
                total: self.questionnaire.len(),
            });
        }

        self.pending_advance = None;
        self.phase = Phase::Results;

        let score = self.compute_score();
        debug!(session = %self.id, score, category = %self.categorize(score), "results entered");

        Ok(())
    }

    /// Starts a contact submission and returns the payload to deliver
    ///
    /// The email is checked with `validator` before anything else happens;
    /// nothing is marked in flight unless it passes. Resending after a
    /// successful submission is allowed.
    ///
    /// # Errors
    ///
    /// * [`Error::WrongPhase`] - Results have not been entered yet
    /// * [`Error::InvalidEmail`] - The email is empty or rejected by `validator`
    /// * [`Error::SubmissionInFlight`] - An earlier submission has not completed
    pub fn begin_submission<V: EmailValidator + ?Sized>(
        &mut self,
        email: &str,
        validator: &V,
    ) -> Result<CapturePayload, Error> {
        if self.phase == Phase::Answering {
            return Err(Error::WrongPhase(self.phase));
        }

        let email = email.trim();
        if email.is_empty() || !validator.is_valid(email) {
            return Err(Error::InvalidEmail);
        }

        if self.submitting {
            return Err(Error::SubmissionInFlight);
        }

        self.submitting = true;
        self.contact_email = Some(email.to_owned());

        let score = self.compute_score();

        Ok(CapturePayload {
            email: email.to_owned(),
            score,
            max_score: self.max_score(),
            category: self.categorize(score),
            answers: self.answers.clone(),
        })
    }

    /// Applies the relay's verdict on the in-flight submission
    ///
    /// # Errors
    ///
    /// * [`Error::NoSubmissionInFlight`] - [`Self::begin_submission`] was not called
    /// * [`Error::Capture`] - Delivery failed; `submitted` is unchanged and the
    ///   user may retry
    pub fn complete_submission(&mut self, outcome: Result<(), capture::Error>) -> Result<(), Error> {
        if !self.submitting {
            return Err(Error::NoSubmissionInFlight);
        }

        self.submitting = false;

        match outcome {
            Ok(()) => {
                self.submitted = true;
                self.phase = Phase::Submitted;
                debug!(session = %self.id, "contact submission delivered");
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "contact submission failed");
                Err(Error::Capture(e))
            }
        }
    }

    /// Abandons the in-flight submission without a verdict
    ///
    /// Used when delivery is cancelled before the relay answered. `submitted`
    /// is unchanged and the user may submit again. Returns whether a
    /// submission was in flight.
    pub fn abort_submission(&mut self) -> bool {
        if !self.submitting {
            return false;
        }

        self.submitting = false;
        debug!(session = %self.id, "contact submission abandoned");
        true
    }

    /// Drops any pending auto-advance and in-flight submission, for when the
    /// surface goes away
    pub fn dispose(&mut self) {
        self.pending_advance = None;
        self.abort_submission();
    }

    // Events

    /// Handles an event from the rendering surface
    ///
    /// Successful events push an [`UpdateMessage`] describing the change
    /// through `tunnel`. Navigation that changes nothing sends nothing.
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying operation; nothing is sent then.
    pub fn receive_message<T: Tunnel, S: FnMut(AlarmMessage, Duration)>(
        &mut self,
        message: IncomingMessage,
        schedule_message: S,
        tunnel: &T,
    ) -> Result<(), Error> {
        match message {
            IncomingMessage::Answer { question, value } => {
                self.record_answer(&question, value, schedule_message)?;
                tunnel.send_message(&UpdateMessage::AnswerRecorded {
                    question,
                    value,
                    progress: self.progress(),
                    complete: self.is_complete(),
                });
            }
            IncomingMessage::Previous => {
                if self.go_to_previous() {
                    self.announce_question(tunnel);
                }
            }
            IncomingMessage::Next => {
                if self.go_to_next() {
                    self.announce_question(tunnel);
                }
            }
            IncomingMessage::ShowResults => {
                self.enter_results()?;
                tunnel.send_message(&UpdateMessage::Results(self.result_view()));
            }
        }

        Ok(())
    }

    /// Handles a fired alarm
    ///
    /// Only the alarm matching the currently pending auto-advance is honored;
    /// alarms from another session, superseded alarms and alarms cancelled by
    /// manual navigation are ignored. Returns whether the cursor moved.
    pub fn receive_alarm<T: Tunnel>(&mut self, message: AlarmMessage, tunnel: &T) -> bool {
        if self.pending_advance.as_ref() != Some(&message) {
            debug!(session = %self.id, ?message, "ignoring stale alarm");
            return false;
        }

        self.pending_advance = None;

        match message {
            AlarmMessage::AutoAdvance { from, .. } if from == self.current_index => {
                if self.go_to_next() {
                    self.announce_question(tunnel);
                    true
                } else {
                    false
                }
            }
            AlarmMessage::AutoAdvance { .. } => false,
        }
    }

    fn announce_question<T: Tunnel>(&self, tunnel: &T) {
        if let Some(view) = self.current_question() {
            tunnel.send_message(&UpdateMessage::QuestionChanged(view));
        }
    }

    /// Returns the snapshot needed to draw the session from scratch
    pub fn state_message(&self) -> SyncMessage {
        match self.phase {
            Phase::Answering => match self.current_question() {
                Some(question) => SyncMessage::Question {
                    question,
                    progress: self.progress(),
                    can_go_back: self.can_go_back(),
                    can_go_next: self.can_go_next(),
                    can_show_results: self.is_complete(),
                },
                None => SyncMessage::Results(self.result_view()),
            },
            Phase::Results => SyncMessage::Results(self.result_view()),
            Phase::Submitted => SyncMessage::Submitted(self.result_view()),
        }
    }
}
