//! Email and contact form validation
//!
//! The quiz treats email checking as a collaborator: it only needs a boolean
//! predicate over a string. [`StructuralEmail`] is the stock predicate, backed
//! by `garde`'s email rule. The contact form schema lives here as well, since
//! it goes out through the same capture relay.

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::constants::{
    capture::MAX_EMAIL_LENGTH,
    contact::{MAX_FIELD_LENGTH, MAX_MESSAGE_LENGTH, MIN_MESSAGE_LENGTH, MIN_NAME_LENGTH},
};

/// A structural email-format check
pub trait EmailValidator {
    /// Whether `email` looks like a deliverable address
    fn is_valid(&self, email: &str) -> bool;
}

impl<F> EmailValidator for F
where
    F: Fn(&str) -> bool,
{
    fn is_valid(&self, email: &str) -> bool {
        self(email)
    }
}

#[derive(Validate)]
struct EmailAddress {
    #[garde(email, length(max = MAX_EMAIL_LENGTH))]
    email: String,
}

/// The default email check, using `garde`'s email rule
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralEmail;

impl EmailValidator for StructuralEmail {
    fn is_valid(&self, email: &str) -> bool {
        EmailAddress {
            email: email.to_owned(),
        }
        .validate()
        .is_ok()
    }
}

/// A general enquiry from the contact page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ContactForm {
    /// Sender's name
    #[garde(length(min = MIN_NAME_LENGTH, max = MAX_FIELD_LENGTH))]
    pub name: String,
    /// Reply address
    #[garde(email, length(max = MAX_EMAIL_LENGTH))]
    pub email: String,
    /// Sender's company
    #[garde(length(min = 1, max = MAX_FIELD_LENGTH))]
    pub company: String,
    /// Sender's role at the company
    #[garde(length(min = 1, max = MAX_FIELD_LENGTH))]
    pub role: String,
    /// Headcount bracket picked from the form
    #[garde(length(min = 1, max = MAX_FIELD_LENGTH))]
    pub company_size: String,
    /// Area of interest picked from the form
    #[garde(length(min = 1, max = MAX_FIELD_LENGTH))]
    pub interest: String,
    /// Free-form message
    #[garde(length(min = MIN_MESSAGE_LENGTH, max = MAX_MESSAGE_LENGTH))]
    pub message: String,
}
