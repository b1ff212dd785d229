// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scripted in-memory browser shared by the integration tests.

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use stepdriver::browser::{self, Transport};

/// Command received by a [`FakeBrowser`].
#[derive(Clone, Debug)]
pub struct Call {
    pub session: Option<String>,
    pub method: String,
    pub params: Value,
}

/// Script throwing whenever an evaluated expression contains `needle`.
#[derive(Clone, Debug)]
pub struct Throw {
    pub needle: String,
    pub message: String,
    pub times: usize,
}

/// [`Transport`] answering CDP commands from a tiny in-memory page model.
///
/// Evaluated expressions are recognized by the shape of the scripts the
/// client generates, so a single element stands for whatever any selector
/// resolves to.
///
/// `urls` and `ready_states` are consumed one per read, falling back to
/// `url` and `"complete"` once exhausted.
#[derive(Debug)]
pub struct FakeBrowser {
    pub calls: RefCell<Vec<Call>>,
    pub present: Cell<bool>,
    pub visible: Cell<bool>,
    pub checked: Cell<bool>,
    pub text: RefCell<String>,
    pub value: RefCell<String>,
    pub url: RefCell<String>,
    pub urls: RefCell<VecDeque<String>>,
    pub ready_states: RefCell<VecDeque<String>>,
    pub throws: RefCell<Vec<Throw>>,
    pub bbox: RefCell<Value>,
    pub probe: RefCell<Value>,
    pub screenshot: RefCell<String>,
    pub reject: RefCell<Option<String>>,
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            present: Cell::new(true),
            visible: Cell::new(true),
            checked: Cell::new(false),
            text: RefCell::new(String::new()),
            value: RefCell::new(String::new()),
            url: RefCell::new("https://example.com/".into()),
            urls: RefCell::new(VecDeque::new()),
            ready_states: RefCell::new(VecDeque::new()),
            throws: RefCell::new(Vec::new()),
            bbox: RefCell::new(json!({"x": 50.0, "y": 20.0, "w": 100.0, "h": 40.0})),
            probe: RefCell::new(json!({"count": 1, "found": true})),
            screenshot: RefCell::new("iVBORw0KGgo=".into()),
            reject: RefCell::new(None),
        }
    }
}

impl FakeBrowser {
    /// Methods of the received commands, in order.
    pub fn methods(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.method.clone()).collect()
    }

    /// Received commands of the given `method`.
    pub fn calls_of(&self, method: &str) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Makes the next `times` evaluations of expressions containing `needle`
    /// throw with the given `message`.
    pub fn throw_on(&self, needle: &str, message: &str, times: usize) {
        self.throws.borrow_mut().push(Throw {
            needle: needle.into(),
            message: message.into(),
            times,
        });
    }

    /// Queues URLs reported by the following `window.location.href` reads.
    pub fn script_urls(&self, urls: &[&str]) {
        self.urls.borrow_mut().extend(urls.iter().map(|&u| u.to_owned()));
    }

    /// Queues states reported by the following `document.readyState` reads.
    pub fn script_ready_states(&self, states: &[&str]) {
        self.ready_states
            .borrow_mut()
            .extend(states.iter().map(|&s| s.to_owned()));
    }

    /// Number of evaluated expressions equal to the given one.
    pub fn evaluations_of(&self, expr: &str) -> usize {
        self.calls_of("Runtime.evaluate")
            .iter()
            .filter(|c| c.params["expression"] == expr)
            .count()
    }

    fn exception(&self, expr: &str) -> Option<String> {
        let mut throws = self.throws.borrow_mut();
        let t = throws
            .iter_mut()
            .find(|t| t.times > 0 && expr.contains(&t.needle))?;
        t.times -= 1;
        Some(t.message.clone())
    }

    fn evaluate(&self, expr: &str) -> Value {
        if expr == "document.readyState" {
            let next = self.ready_states.borrow_mut().pop_front();
            json!(next.unwrap_or_else(|| "complete".into()))
        } else if expr == "window.location.href" {
            let next = self.urls.borrow_mut().pop_front();
            json!(next.unwrap_or_else(|| self.url.borrow().clone()))
        } else if expr.contains("getComputedStyle") {
            json!(self.present.get() && self.visible.get())
        } else if expr.contains("getBoundingClientRect") {
            self.bbox.borrow().clone()
        } else if expr.contains("scopedCount") {
            self.probe.borrow().clone()
        } else if expr.ends_with(") !== null") {
            json!(self.present.get())
        } else if expr.ends_with(".textContent || '').trim())()") {
            json!(*self.text.borrow())
        } else if expr.ends_with(".value ?? ''))()") {
            json!(*self.value.borrow())
        } else if expr.ends_with(".checked)()") {
            json!(self.checked.get())
        } else {
            json!(true)
        }
    }
}

#[async_trait(?Send)]
impl Transport for FakeBrowser {
    async fn send(
        &self,
        session: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, browser::Error> {
        self.calls.borrow_mut().push(Call {
            session: session.map(ToOwned::to_owned),
            method: method.to_owned(),
            params: params.clone(),
        });

        if self.reject.borrow().as_deref() == Some(method) {
            return Err(browser::Error::protocol(&json!({
                "code": -32000,
                "message": format!("{method} rejected"),
            })));
        }

        Ok(match method {
            "Target.createTarget" => json!({"targetId": "T1"}),
            "Target.attachToTarget" => json!({"sessionId": "S1"}),
            "Page.navigate" => json!({"frameId": "F1"}),
            "Page.captureScreenshot" => json!({"data": *self.screenshot.borrow()}),
            "Runtime.evaluate" => {
                let expr = params["expression"].as_str().unwrap_or_default();
                match self.exception(expr) {
                    Some(message) => json!({
                        "result": {"type": "object", "subtype": "error"},
                        "exceptionDetails": {
                            "text": "Uncaught",
                            "exception": {"description": message},
                        },
                    }),
                    None => json!({
                        "result": {"type": "object", "value": self.evaluate(expr)},
                    }),
                }
            }
            _ => json!({}),
        })
    }
}

/// [`browser::Config`] with waits short enough for tests.
pub fn quick_config() -> browser::Config {
    browser::Config {
        endpoint: "ws://fake".into(),
        element_timeout: Duration::from_millis(200),
        poll_interval: Duration::from_millis(10),
        load_poll_interval: Duration::from_millis(10),
        navigation_settle: Duration::from_millis(1),
        command_timeout: Duration::from_secs(1),
    }
}
