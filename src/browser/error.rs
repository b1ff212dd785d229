// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Errors of the browser automation [`Client`].
//!
//! [`Client`]: super::Client

use std::time::Duration;

use derive_more::{Display, Error, From};
use tokio_tungstenite::tungstenite;

use super::selector;

/// Error of a browser automation operation.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// No target is attached.
    #[display("No debugger session, use 'browser open' first")]
    NotAttached,

    /// Remote end rejected a command.
    #[display("CDP error {code}: {message}")]
    #[from(ignore)]
    Protocol {
        /// Error code reported by the browser.
        code: i64,

        /// Error message reported by the browser.
        #[error(not(source))]
        message: String,
    },

    /// Evaluated script threw.
    #[display("JS error: {_0}")]
    #[from(ignore)]
    Evaluation(#[error(not(source))] String),

    /// Selector didn't resolve to an element in time.
    #[display(
        "Timeout waiting for element: {selector}{}",
        last_error.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default(),
    )]
    #[from(ignore)]
    Timeout {
        /// Selector being waited for.
        #[error(not(source))]
        selector: String,

        /// Time waited.
        timeout: Duration,

        /// Last error observed while polling.
        last_error: Option<String>,
    },

    /// Page failed to navigate.
    #[display("Navigation failed: {_0}")]
    #[from(ignore)]
    Navigation(#[error(not(source))] String),

    /// Element has no layout box to click on.
    #[display("Could not get bounding box for: {selector}")]
    #[from(ignore)]
    BoundingBox {
        /// Selector of the element.
        #[error(not(source))]
        selector: String,
    },

    /// Selector is malformed.
    #[display("{_0}")]
    Selector(selector::ParseError),

    /// Connection to the browser is gone.
    #[display("Connection to the browser closed")]
    Closed,

    /// WebSocket transport failed.
    #[display("WebSocket error: {_0}")]
    WebSocket(tungstenite::Error),

    /// Endpoint discovery failed.
    #[display("Endpoint discovery failed: {_0}")]
    Http(reqwest::Error),

    /// Malformed protocol message.
    #[display("Malformed CDP message: {_0}")]
    Json(serde_json::Error),

    /// Command got no reply in time.
    #[display("CDP command {method} timed out after {}", humantime::format_duration(*timeout))]
    #[from(ignore)]
    CommandTimeout {
        /// Method of the command.
        #[error(not(source))]
        method: String,

        /// Time waited.
        timeout: Duration,
    },

    /// Operation was aborted by a cancellation.
    #[display("Cancelled")]
    #[from(ignore)]
    Cancelled,
}

impl Error {
    /// Creates a new [`Error::Protocol`] out of a CDP `error` object.
    #[must_use]
    pub fn protocol(error: &serde_json::Value) -> Self {
        Self::Protocol {
            code: error.get("code").and_then(serde_json::Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_owned(),
        }
    }
}
