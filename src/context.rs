// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Per-scenario mutable state threaded through step handlers.

use std::mem;

use derive_more::with_trait::Debug;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{
    browser,
    http::{Request, Response},
    value::{self, Variables},
};

/// State of a single scenario run.
///
/// A fresh [`Context`] is created for every concrete scenario and dropped once
/// it finishes. An attached [`browser::Client`] is not detached on drop: that
/// is the job of the browser plugin's after-scenario hook.
#[derive(Debug)]
pub struct Context {
    /// Variable bindings.
    pub variables: Variables,

    /// Pending HTTP [`Request`].
    pub request: Request,

    /// Last HTTP [`Response`].
    response: Option<Response>,

    /// Whether the [`Context::response`] was set by the currently executing
    /// step.
    fresh_response: bool,

    /// Lines printed by the currently executing step.
    prints: Vec<String>,

    /// Screenshot taken by the currently executing step.
    #[debug(skip)]
    screenshot: Option<String>,

    /// Cancellation signal of the whole run.
    cancel: CancellationToken,

    /// Attached browser session, if any.
    pub browser: Option<browser::Client>,
}

impl Context {
    /// Creates a new empty [`Context`] observing the given `cancel` token.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            variables: Variables::new(),
            request: Request::default(),
            response: None,
            fresh_response: false,
            prints: Vec::new(),
            screenshot: None,
            cancel,
            browser: None,
        }
    }

    /// Cancellation signal of the run.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Indicates whether the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Last HTTP [`Response`], if any.
    #[must_use]
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Stores the given [`Response`] as the last one.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
        self.fresh_response = true;
    }

    /// Returns a copy of the last [`Response`] if it was produced since the
    /// previous call.
    pub fn take_fresh_response(&mut self) -> Option<Response> {
        mem::take(&mut self.fresh_response)
            .then(|| self.response.clone())
            .flatten()
    }

    /// Resolves the given `path` against [`Context::variables`] and the last
    /// [`Response`] body.
    #[must_use]
    pub fn lookup(&self, path: &str) -> Option<Value> {
        value::lookup(&self.variables, self.response.as_ref().map(|r| &r.body), path)
    }

    /// Substitutes `#{path}` tokens in the given `text` with variable values.
    #[must_use]
    pub fn interpolate(&self, text: &str) -> String {
        value::interpolate(text, &self.variables)
    }

    /// Records a printed line.
    pub fn print(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::info!(target: "stepdriver::print", "{line}");
        self.prints.push(line);
    }

    /// Drains lines printed since the previous call.
    pub fn take_prints(&mut self) -> Vec<String> {
        mem::take(&mut self.prints)
    }

    /// Stores a base64-encoded PNG screenshot.
    pub fn set_screenshot(&mut self, data: String) {
        self.screenshot = Some(data);
    }

    /// Takes the screenshot stored since the previous call.
    pub fn take_screenshot(&mut self) -> Option<String> {
        self.screenshot.take()
    }

    /// Returns the attached [`browser::Client`].
    ///
    /// # Errors
    ///
    /// If no browser session has been opened.
    pub fn browser(&mut self) -> Result<&mut browser::Client, browser::Error> {
        self.browser.as_mut().ok_or(browser::Error::NotAttached)
    }
}
