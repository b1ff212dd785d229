// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors a step handler may fail with.

use derive_more::{Display, Error, From};

use crate::{browser, plugin::script};

/// Error of a step execution.
///
/// Every variant is converted into a failed step outcome by the [`Runner`],
/// except the [cancellation](Error::is_cancelled) ones turning into skipped.
///
/// [`Runner`]: crate::Runner
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Asserted expectation doesn't hold.
    #[display("{message}")]
    #[from(ignore)]
    Assertion {
        /// Description of the mismatch.
        #[error(not(source))]
        message: String,
    },

    /// No step definition matches the step text.
    #[display("No matching step definition for: \"{text}\"")]
    #[from(ignore)]
    Unmatched {
        /// Text of the unmatched step.
        #[error(not(source))]
        text: String,
    },

    /// Handler expected an argument the step doesn't provide.
    #[display("Missing argument: {what}")]
    #[from(ignore)]
    MissingArgument {
        /// Description of the missing argument.
        #[error(not(source))]
        what: String,
    },

    /// HTTP request failed to complete.
    #[display("HTTP request failed: {_0}")]
    Http(reqwest::Error),

    /// Browser automation failed.
    #[display("{_0}")]
    Browser(browser::Error),

    /// Script evaluation failed.
    #[display("{_0}")]
    Script(script::Error),

    /// JSON (de)serialization failed.
    #[display("Invalid JSON: {_0}")]
    Json(serde_json::Error),

    /// Handler panicked.
    #[display("Step panicked: {message}")]
    #[from(ignore)]
    Panicked {
        /// Panic message, if it could be extracted.
        #[error(not(source))]
        message: String,
    },

    /// Execution was cancelled while the step was running.
    #[display("Cancelled")]
    #[from(ignore)]
    Cancelled,

    /// Any other failure.
    #[display("{_0}")]
    #[from(ignore)]
    Other(#[error(not(source))] String),
}

impl Error {
    /// Creates a new [`Error::Assertion`].
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion { message: message.into() }
    }

    /// Creates a new [`Error::MissingArgument`].
    #[must_use]
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingArgument { what: what.into() }
    }

    /// Creates a new [`Error::Other`].
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Indicates whether this [`Error`] originates from a cancellation rather
    /// than a genuine failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Browser(e) => matches!(e, browser::Error::Cancelled),
            Self::Script(e) => matches!(e, script::Error::Cancelled),
            Self::Assertion { .. }
            | Self::Unmatched { .. }
            | Self::MissingArgument { .. }
            | Self::Http(_)
            | Self::Json(_)
            | Self::Panicked { .. }
            | Self::Other(_) => false,
        }
    }
}
