//! # Portico Validate
//!
//! The gate between a raw request and a handler. Each route may carry a
//! [`RequestShape`]; the [`RequestGate`] parses the body against it and
//! produces either a [`DomainRequest`] or tagged [`ValidationErrors`]:
//!
//! | Failure | [`FailureKind`] | Status | Body |
//! |---------|-----------------|--------|------|
//! | body cannot be parsed | `Malformed` | 400 | `{"error": "Malformed JSON"}` |
//! | field rules broken | `Unprocessable` | 422 | `{"validationError": {"name": ["..."]}}` |
//!
//! Messages come from a [`MessageResolver`]; [`DefaultMessages`] ships
//! the `en-US` catalogue.

#![doc(html_root_url = "https://docs.rs/portico-validate/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod gate;
mod messages;
mod outcome;
mod request;
mod shape;

pub use gate::RequestGate;
pub use messages::{DefaultMessages, MessageResolver};
pub use outcome::{FailureKind, ValidationErrors, ValidationOutcome};
pub use request::DomainRequest;
pub use shape::{Field, RequestShape, Rule};
