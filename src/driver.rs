//! Async driver for a quiz session
//!
//! [`QuizEngine`] never sleeps or talks to the network; it asks for alarms
//! and hands back payloads. The driver binds one engine to a tokio runtime:
//! requested alarms become spawned sleep tasks feeding an mpsc channel, and
//! contact submissions go out through a [`Relay`].
//!
//! Timer tasks whose alarm the engine no longer honors are aborted as soon as
//! the driver notices, and every remaining one is aborted on restart and drop.

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};
use web_time::Duration;

use crate::{
    AlarmMessage,
    capture::{Relay, Submission},
    engine::{Error, IncomingMessage, QuizEngine, UpdateMessage},
    session::Tunnel,
    validation::{EmailValidator, StructuralEmail},
};

/// Runs a [`QuizEngine`] with real timers and a capture relay
///
/// All methods that may schedule timers spawn tokio tasks.
///
/// # Panics
///
/// [`QuizDriver::handle`] panics if called outside a tokio runtime.
pub struct QuizDriver<R: Relay, V: EmailValidator = StructuralEmail> {
    engine: QuizEngine,
    relay: R,
    validator: V,
    alarm_sender: mpsc::UnboundedSender<AlarmMessage>,
    alarm_receiver: mpsc::UnboundedReceiver<AlarmMessage>,
    timers: Vec<(AlarmMessage, JoinHandle<()>)>,
}

impl<R: Relay> QuizDriver<R> {
    /// Creates a driver that checks emails with [`StructuralEmail`]
    pub fn new(engine: QuizEngine, relay: R) -> Self {
        Self::with_validator(engine, relay, StructuralEmail)
    }
}

impl<R: Relay, V: EmailValidator> QuizDriver<R, V> {
    /// Creates a driver with a custom email check
    pub fn with_validator(engine: QuizEngine, relay: R, validator: V) -> Self {
        let (alarm_sender, alarm_receiver) = mpsc::unbounded_channel();

        Self {
            engine,
            relay,
            validator,
            alarm_sender,
            alarm_receiver,
            timers: Vec::new(),
        }
    }

    /// The engine being driven
    pub fn engine(&self) -> &QuizEngine {
        &self.engine
    }

    /// The relay submissions go through
    pub fn relay(&self) -> &R {
        &self.relay
    }

    /// Feeds an event from the rendering surface into the engine
    ///
    /// # Errors
    ///
    /// Returns the engine's [`Error`] if the event is not allowed.
    pub fn handle<T: Tunnel>(&mut self, message: IncomingMessage, tunnel: &T) -> Result<(), Error> {
        let mut scheduled = Vec::new();

        let result = self.engine.receive_message(
            message,
            |alarm, delay| scheduled.push((alarm, delay)),
            tunnel,
        );

        self.sync_timers(scheduled);

        result
    }

    /// Waits for the pending auto-advance and applies it
    ///
    /// Returns `false` straight away when nothing is pending, and `false` if
    /// the pending advance is cancelled while waiting. Returns `true` once
    /// the cursor has moved.
    pub async fn next_alarm<T: Tunnel>(&mut self, tunnel: &T) -> bool {
        while self.engine.pending_alarm().is_some() {
            let Some(alarm) = self.alarm_receiver.recv().await else {
                break;
            };

            if self.engine.receive_alarm(alarm, tunnel) {
                self.sync_timers(Vec::new());
                return true;
            }
        }

        false
    }

    /// Sends the results to `email` through the relay
    ///
    /// Pushes [`UpdateMessage::Submitting`] once the email is accepted, then
    /// either [`UpdateMessage::Submitted`] or [`UpdateMessage::SubmissionFailed`].
    ///
    /// # Errors
    ///
    /// Returns the engine's [`Error`]; [`Error::Capture`] means delivery
    /// failed and the call may be retried.
    pub async fn submit_contact<T: Tunnel>(&mut self, email: &str, tunnel: &T) -> Result<(), Error> {
        let payload = self.engine.begin_submission(email, &self.validator)?;
        let email = payload.email.clone();

        // dropping this future before the relay answers releases the session
        let mut in_flight = InFlight(&mut self.engine);

        tunnel.send_message(&UpdateMessage::Submitting);

        let outcome = self.relay.deliver(&Submission::Quiz(payload)).await;

        match in_flight.0.complete_submission(outcome) {
            Ok(()) => {
                info!(session = %in_flight.0.id(), "results sent");
                tunnel.send_message(&UpdateMessage::Submitted { email });
                Ok(())
            }
            Err(e) => {
                tunnel.send_message(&UpdateMessage::SubmissionFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Throws the session away and starts over on the first question
    pub fn restart<T: Tunnel>(&mut self, tunnel: &T) {
        self.engine.dispose();
        self.abort_timers();
        self.engine = self.engine.restarted();

        debug!(session = %self.engine.id(), "session restarted");

        tunnel.send_state(&self.engine.state_message());
    }

    /// Cancels any pending auto-advance and in-flight submission
    pub fn dispose(&mut self) {
        self.engine.dispose();
        self.abort_timers();
    }

    fn sync_timers(&mut self, scheduled: Vec<(AlarmMessage, Duration)>) {
        let pending = self.engine.pending_alarm().cloned();

        self.timers.retain(|(alarm, handle)| {
            let live = pending.as_ref() == Some(alarm) && !handle.is_finished();
            if !live {
                handle.abort();
            }
            live
        });

        for (alarm, delay) in scheduled {
            if pending.as_ref() != Some(&alarm) {
                continue;
            }

            let sender = self.alarm_sender.clone();
            let message = alarm.clone();

            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                // the receiver lives as long as the driver
                let _ = sender.send(message);
            });

            self.timers.push((alarm, handle));
        }
    }

    fn abort_timers(&mut self) {
        for (_, handle) in self.timers.drain(..) {
            handle.abort();
        }
    }
}

/// Abandons the engine's in-flight submission unless it was completed
struct InFlight<'a>(&'a mut QuizEngine);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.abort_submission();
    }
}

impl<R: Relay, V: EmailValidator> Drop for QuizDriver<R, V> {
    fn drop(&mut self) {
        self.abort_timers();
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::{
        cell::RefCell,
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, Ordering},
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        capture::{self, CaptureClient, Endpoint},
        engine::{Options, Phase, SyncMessage},
        quiz::{category::AdviceTable, config::Questionnaire},
    };

    #[derive(Default)]
    struct RecordingTunnel {
        messages: RefCell<Vec<UpdateMessage>>,
        states: RefCell<Vec<SyncMessage>>,
    }

    impl Tunnel for RecordingTunnel {
        fn send_message(&self, message: &UpdateMessage) {
            self.messages.borrow_mut().push(message.clone());
        }

        fn send_state(&self, state: &SyncMessage) {
            self.states.borrow_mut().push(state.clone());
        }
    }

    /// Answers every delivery with the next scripted outcome, then succeeds
    #[derive(Clone, Default)]
    struct ScriptedRelay {
        outcomes: Arc<Mutex<Vec<Result<(), capture::Error>>>>,
        delivered: Arc<Mutex<Vec<Submission>>>,
    }

    impl ScriptedRelay {
        fn failing_once(error: capture::Error) -> Self {
            let relay = Self::default();
            relay.outcomes.lock().unwrap().push(Err(error));
            relay
        }

        fn delivered(&self) -> Vec<Submission> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Relay for ScriptedRelay {
        async fn deliver(&self, submission: &Submission) -> Result<(), capture::Error> {
            self.delivered.lock().unwrap().push(submission.clone());
            self.outcomes.lock().unwrap().pop().unwrap_or(Ok(()))
        }
    }

    /// Hangs on the first delivery, then succeeds
    #[derive(Default)]
    struct StallingRelay {
        stalled: AtomicBool,
    }

    #[async_trait]
    impl Relay for StallingRelay {
        async fn deliver(&self, _submission: &Submission) -> Result<(), capture::Error> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            }
            Ok(())
        }
    }

    const IDS: [&str; 8] = [
        "pipeline",
        "data",
        "automation",
        "kpis",
        "tech",
        "ai",
        "marketing",
        "playbooks",
    ];

    fn create_test_engine(auto_advance: Duration) -> QuizEngine {
        QuizEngine::new(
            Questionnaire::staffing_growth(),
            AdviceTable::default(),
            Options { auto_advance },
        )
        .unwrap()
    }

    fn answer(question: &str, value: u8) -> IncomingMessage {
        IncomingMessage::Answer {
            question: question.into(),
            value,
        }
    }

    #[tokio::test]
    async fn test_answer_auto_advances() {
        let mut driver = QuizDriver::new(
            create_test_engine(Duration::from_millis(5)),
            ScriptedRelay::default(),
        );
        let tunnel = RecordingTunnel::default();

        driver.handle(answer("pipeline", 3), &tunnel).unwrap();
        assert_eq!(driver.engine().current_index(), 0);
        assert_eq!(driver.timers.len(), 1);

        assert!(driver.next_alarm(&tunnel).await);
        assert_eq!(driver.engine().current_index(), 1);
        assert!(driver.timers.is_empty());
    }

    #[tokio::test]
    async fn test_manual_navigation_aborts_timer() {
        let mut driver = QuizDriver::new(
            create_test_engine(Duration::from_millis(5)),
            ScriptedRelay::default(),
        );
        let tunnel = RecordingTunnel::default();

        driver.handle(answer("pipeline", 3), &tunnel).unwrap();
        driver.handle(IncomingMessage::Next, &tunnel).unwrap();

        assert!(driver.timers.is_empty());
        assert!(!driver.next_alarm(&tunnel).await);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(driver.engine().current_index(), 1);
    }

    #[tokio::test]
    async fn test_input_during_advance_delay_cancels_it() {
        let mut driver = QuizDriver::new(
            create_test_engine(Duration::from_millis(50)),
            ScriptedRelay::default(),
        );
        let tunnel = RecordingTunnel::default();

        driver.handle(answer("pipeline", 3), &tunnel).unwrap();

        let typed_first = tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(5)) => true,
            _ = driver.next_alarm(&tunnel) => false,
        };
        assert!(typed_first);
        assert_eq!(driver.engine().current_index(), 0);

        driver.handle(IncomingMessage::Next, &tunnel).unwrap();
        driver.handle(IncomingMessage::Next, &tunnel).unwrap();
        assert!(driver.timers.is_empty());

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(!driver.next_alarm(&tunnel).await);
        assert_eq!(driver.engine().current_index(), 2);
    }

    #[tokio::test]
    async fn test_reanswer_replaces_timer() {
        let mut driver = QuizDriver::new(
            create_test_engine(Duration::from_millis(5)),
            ScriptedRelay::default(),
        );
        let tunnel = RecordingTunnel::default();

        driver.handle(answer("pipeline", 1), &tunnel).unwrap();
        driver.handle(answer("pipeline", 4), &tunnel).unwrap();
        assert_eq!(driver.timers.len(), 1);

        assert!(driver.next_alarm(&tunnel).await);
        assert_eq!(driver.engine().current_index(), 1);
        assert_eq!(driver.engine().answers().get(&"pipeline".into()), Some(4));
    }

    #[tokio::test]
    async fn test_rejected_event_keeps_state() {
        let mut driver = QuizDriver::new(create_test_engine(Duration::ZERO), ScriptedRelay::default());
        let tunnel = RecordingTunnel::default();

        let result = driver.handle(answer("pipeline", 9), &tunnel);
        assert!(matches!(result, Err(Error::InvalidValue { .. })));
        assert!(driver.timers.is_empty());
        assert!(tunnel.messages.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_restart_resets_session() {
        let mut driver = QuizDriver::new(
            create_test_engine(Duration::from_millis(50)),
            ScriptedRelay::default(),
        );
        let tunnel = RecordingTunnel::default();
        let first_id = driver.engine().id();

        driver.handle(answer("pipeline", 2), &tunnel).unwrap();
        driver.restart(&tunnel);

        assert!(driver.timers.is_empty());
        assert_ne!(driver.engine().id(), first_id);
        assert!(driver.engine().answers().is_empty());
        assert!(!driver.next_alarm(&tunnel).await);
        assert!(matches!(
            tunnel.states.borrow().as_slice(),
            [SyncMessage::Question { .. }]
        ));
    }

    #[tokio::test]
    async fn test_dispose_cancels_pending_advance() {
        let mut driver = QuizDriver::new(
            create_test_engine(Duration::from_millis(5)),
            ScriptedRelay::default(),
        );
        let tunnel = RecordingTunnel::default();

        driver.handle(answer("pipeline", 2), &tunnel).unwrap();
        driver.dispose();

        assert!(driver.timers.is_empty());
        assert!(!driver.next_alarm(&tunnel).await);
        assert_eq!(driver.engine().current_index(), 0);
    }

    async fn complete_quiz<R: Relay>(driver: &mut QuizDriver<R>, tunnel: &RecordingTunnel) {
        for (id, value) in IDS.iter().zip([2, 3, 1, 4, 2, 3, 1, 2]) {
            driver.handle(answer(id, value), tunnel).unwrap();
            driver.next_alarm(tunnel).await;
        }
        driver.handle(IncomingMessage::ShowResults, tunnel).unwrap();
    }

    #[tokio::test]
    async fn test_submit_contact_delivers_payload() {
        let relay = ScriptedRelay::default();
        let mut driver = QuizDriver::new(create_test_engine(Duration::ZERO), relay.clone());
        let tunnel = RecordingTunnel::default();

        complete_quiz(&mut driver, &tunnel).await;
        assert_eq!(driver.engine().current_index(), 7);

        driver.submit_contact("a@b.com", &tunnel).await.unwrap();

        assert!(driver.engine().is_submitted());
        assert_eq!(driver.engine().phase(), Phase::Submitted);

        let delivered = relay.delivered();
        let [Submission::Quiz(payload)] = delivered.as_slice() else {
            panic!("expected one quiz submission, got {delivered:?}");
        };
        assert_eq!(payload.score, 18);
        assert_eq!(payload.email, "a@b.com");

        let messages = tunnel.messages.borrow();
        assert!(matches!(
            messages.as_slice(),
            [.., UpdateMessage::Submitting, UpdateMessage::Submitted { .. }]
        ));
    }

    #[tokio::test]
    async fn test_submit_contact_bad_email_skips_relay() {
        let relay = ScriptedRelay::default();
        let mut driver = QuizDriver::new(create_test_engine(Duration::ZERO), relay.clone());
        let tunnel = RecordingTunnel::default();

        complete_quiz(&mut driver, &tunnel).await;

        let result = driver.submit_contact("bad-email", &tunnel).await;

        assert_eq!(result, Err(Error::InvalidEmail));
        assert!(relay.delivered().is_empty());
        assert!(!driver.engine().is_submitted());
    }

    #[tokio::test]
    async fn test_submit_contact_failure_then_retry() {
        let relay = ScriptedRelay::failing_once(capture::Error::Status(503));
        let mut driver = QuizDriver::new(create_test_engine(Duration::ZERO), relay.clone());
        let tunnel = RecordingTunnel::default();

        complete_quiz(&mut driver, &tunnel).await;

        let error = driver.submit_contact("a@b.com", &tunnel).await.unwrap_err();
        assert!(error.is_recoverable());
        assert!(!driver.engine().is_submitted());
        assert!(!driver.engine().is_submitting());
        assert!(matches!(
            tunnel.messages.borrow().last(),
            Some(UpdateMessage::SubmissionFailed { .. })
        ));

        driver.submit_contact("a@b.com", &tunnel).await.unwrap();
        assert!(driver.engine().is_submitted());
        assert_eq!(relay.delivered().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_submission_can_be_retried() {
        let mut driver = QuizDriver::new(
            create_test_engine(Duration::ZERO),
            StallingRelay::default(),
        );
        let tunnel = RecordingTunnel::default();

        complete_quiz(&mut driver, &tunnel).await;

        let cancelled = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            driver.submit_contact("a@b.com", &tunnel),
        )
        .await;

        assert!(cancelled.is_err());
        assert!(!driver.engine().is_submitting());
        assert!(!driver.engine().is_submitted());

        driver.submit_contact("a@b.com", &tunnel).await.unwrap();
        assert!(driver.engine().is_submitted());
        assert_eq!(driver.engine().phase(), Phase::Submitted);
    }

    #[tokio::test]
    async fn test_dispose_releases_submission() {
        let mut driver = QuizDriver::new(
            create_test_engine(Duration::ZERO),
            StallingRelay::default(),
        );
        let tunnel = RecordingTunnel::default();

        complete_quiz(&mut driver, &tunnel).await;

        let _ = tokio::time::timeout(
            std::time::Duration::from_millis(5),
            driver.submit_contact("a@b.com", &tunnel),
        )
        .await;
        driver.dispose();

        assert!(!driver.engine().is_submitting());
        assert!(driver.submit_contact("a@b.com", &tunnel).await.is_ok());
    }

    #[tokio::test]
    async fn test_custom_validator() {
        let relay = ScriptedRelay::default();
        let mut driver = QuizDriver::with_validator(
            create_test_engine(Duration::ZERO),
            relay.clone(),
            |email: &str| email.ends_with("@agency.com"),
        );
        let tunnel = RecordingTunnel::default();

        for id in IDS {
            driver.handle(answer(id, 4), &tunnel).unwrap();
        }
        driver.handle(IncomingMessage::ShowResults, &tunnel).unwrap();

        assert_eq!(
            driver.submit_contact("a@b.com", &tunnel).await,
            Err(Error::InvalidEmail)
        );
        assert!(driver.submit_contact("ops@agency.com", &tunnel).await.is_ok());
    }

    #[tokio::test]
    async fn test_demo_relay_end_to_end() {
        let client = CaptureClient::new(
            Endpoint::parse("https://formspree.io/f/[[FORM_ID]]").unwrap(),
            Duration::from_millis(5),
            Duration::from_secs(1),
        )
        .unwrap();
        let mut driver = QuizDriver::new(create_test_engine(Duration::ZERO), client);
        let tunnel = RecordingTunnel::default();

        complete_quiz(&mut driver, &tunnel).await;
        driver.submit_contact("a@b.com", &tunnel).await.unwrap();

        assert!(driver.engine().is_submitted());
        assert_eq!(driver.engine().contact_email(), Some("a@b.com"));
    }
}
