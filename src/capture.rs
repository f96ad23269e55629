//! Contact capture relay
//!
//! Finished quizzes and contact enquiries are handed to a third-party form
//! relay with a single JSON `POST`. Any 2xx response counts as delivered;
//! everything else is a recoverable failure the caller may retry.
//!
//! When no real endpoint has been configured the relay runs in demo mode: it
//! waits a fixed delay and reports success without touching the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Url, header::ACCEPT};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    answers::AnswerSet, constants::capture::DEMO_SENTINEL, quiz::category::Category,
    validation::ContactForm,
};

/// Errors that can occur while delivering a submission
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configured endpoint is not a usable URL
    #[error("capture endpoint `{0}` is not a valid URL")]
    InvalidEndpoint(String),
    /// The HTTP client could not be constructed
    #[error("could not set up the HTTP client: {0}")]
    Client(String),
    /// The request never got a response
    #[error("could not reach the capture endpoint: {0}")]
    Transport(String),
    /// The endpoint answered with a non-success status
    #[error("capture endpoint responded with status {0}")]
    Status(u16),
}

/// Where submissions go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Simulate delivery without a network call
    Demo,
    /// POST to a real form relay
    Relay(Url),
}

impl Endpoint {
    /// Interprets a configured endpoint string
    ///
    /// An empty value, or one still containing the `[[FORM_ID]]` placeholder,
    /// selects demo mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if a non-placeholder value is not a
    /// valid URL.
    pub fn parse(configured: &str) -> Result<Self, Error> {
        let configured = configured.trim();

        if configured.is_empty() || configured.contains(DEMO_SENTINEL) {
            return Ok(Self::Demo);
        }

        Url::parse(configured)
            .map(Self::Relay)
            .map_err(|_| Error::InvalidEndpoint(configured.to_owned()))
    }

    /// Whether this endpoint only simulates delivery
    pub fn is_demo(&self) -> bool {
        matches!(self, Self::Demo)
    }
}

/// The quiz result handed to the relay
#[serde_with::serde_as]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePayload {
    /// Address the detailed breakdown goes to
    pub email: String,
    /// Total score
    pub score: u32,
    /// Highest achievable score
    pub max_score: u32,
    /// Result category, serialized by its label
    #[serde_as(as = "serde_with::DisplayFromStr")]
    pub category: Category,
    /// Raw answers by question id
    pub answers: AnswerSet,
}

/// Anything the relay can deliver
#[derive(Debug, Clone, PartialEq, Serialize, derive_more::From)]
#[serde(untagged)]
pub enum Submission {
    /// A finished growth score quiz
    Quiz(CapturePayload),
    /// A contact page enquiry
    Contact(ContactForm),
}

impl Submission {
    /// The reply address carried by the submission
    pub fn email(&self) -> &str {
        match self {
            Self::Quiz(payload) => &payload.email,
            Self::Contact(form) => &form.email,
        }
    }
}

/// The contact-capture collaborator
#[async_trait]
pub trait Relay: Send + Sync {
    /// Delivers a submission
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the submission did not go through. Failures
    /// are recoverable; the same submission may be delivered again.
    async fn deliver(&self, submission: &Submission) -> Result<(), Error>;
}

/// HTTP relay client, with demo mode for unconfigured deployments
#[derive(Debug, Clone)]
pub struct CaptureClient {
    endpoint: Endpoint,
    demo_delay: Duration,
    client: reqwest::Client,
}

impl CaptureClient {
    /// Creates a client for `endpoint`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Client`] if the underlying HTTP client cannot be built.
    pub fn new(endpoint: Endpoint, demo_delay: Duration, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;

        Ok(Self {
            endpoint,
            demo_delay,
            client,
        })
    }

    /// Creates a client from application settings
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the endpoint is not a valid URL or the HTTP
    /// client cannot be built.
    pub fn from_settings(settings: &crate::settings::Settings) -> Result<Self, Error> {
        Self::new(
            Endpoint::parse(&settings.capture_url)?,
            settings.demo_delay,
            settings.request_timeout,
        )
    }

    /// The endpoint this client delivers to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Relay for CaptureClient {
    async fn deliver(&self, submission: &Submission) -> Result<(), Error> {
        let url = match &self.endpoint {
            Endpoint::Demo => {
                info!(
                    email = submission.email(),
                    delay_ms = self.demo_delay.as_millis() as u64,
                    "capture endpoint not configured, simulating delivery"
                );
                tokio::time::sleep(self.demo_delay).await;
                return Ok(());
            }
            Endpoint::Relay(url) => url,
        };

        debug!(%url, email = submission.email(), "posting submission to capture endpoint");

        let response = self
            .client
            .post(url.clone())
            .header(ACCEPT, "application/json")
            .json(submission)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "capture request failed");
                Error::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "capture endpoint rejected submission");
            return Err(Error::Status(status.as_u16()));
        }

        info!(%status, "submission delivered");
        Ok(())
    }
}

/// Errors from sending a contact page enquiry
#[derive(Error, Debug)]
pub enum ContactFormError {
    /// The form failed its schema check; nothing was sent
    #[error("contact form is invalid: {0}")]
    Invalid(#[from] garde::Report),
    /// The relay did not accept the form
    #[error(transparent)]
    Capture(#[from] Error),
}

/// Validates a contact form and delivers it through `relay`
///
/// # Errors
///
/// Returns [`ContactFormError::Invalid`] before any delivery attempt if the
/// form breaks its schema, or [`ContactFormError::Capture`] if delivery fails.
pub async fn send_contact_form<R: Relay + ?Sized>(
    relay: &R,
    form: ContactForm,
) -> Result<(), ContactFormError> {
    garde::Validate::validate(&form)?;
    relay.deliver(&Submission::Contact(form)).await?;
    Ok(())
}
