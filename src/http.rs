// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! HTTP [`Request`] state and its execution.

use std::time::{Duration, Instant};

use linked_hash_map::LinkedHashMap;
use once_cell::sync::Lazy;
use reqwest::{header::CONTENT_TYPE, Method};
use serde::{Serialize, Serializer};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::step;

/// Shared client, so connections are pooled across scenarios.
static CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Pending HTTP request being built by the steps of a scenario.
#[derive(Clone, Debug)]
pub struct Request {
    /// Target URL.
    pub url: String,

    /// HTTP [`Method`].
    pub method: Method,

    /// Headers in insertion order.
    pub headers: LinkedHashMap<String, String>,

    /// Query parameters appended to the [`Request::url`].
    pub params: LinkedHashMap<String, String>,

    /// Body: JSON values are sent serialized, strings are sent as-is.
    pub body: Option<Value>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: Method::GET,
            headers: LinkedHashMap::new(),
            params: LinkedHashMap::new(),
            body: None,
        }
    }
}

impl Request {
    /// Indicates whether a `Content-Type` header has been set already.
    fn has_content_type(&self) -> bool {
        self.headers
            .keys()
            .any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE.as_str()))
    }

    /// Sends this [`Request`], aborting it once the given `cancel` token
    /// fires.
    ///
    /// A JSON body sets the `Content-Type: application/json` header unless
    /// one is present already. Bodies are never sent with `GET`/`HEAD`.
    ///
    /// # Errors
    ///
    /// - [`step::Error::Http`] if the request fails.
    /// - [`step::Error::Cancelled`] if the `cancel` token fires first.
    pub async fn send(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Response, step::Error> {
        let mut builder = CLIENT.request(self.method.clone(), self.url.as_str());
        if !self.params.is_empty() {
            let query = self.params.iter().collect::<Vec<_>>();
            builder = builder.query(&query);
        }

        let bodiless = matches!(self.method, Method::GET | Method::HEAD);
        if let (Some(body), false) = (&self.body, bodiless) {
            let payload = match body {
                Value::String(s) => s.clone(),
                v => {
                    if !self.has_content_type() {
                        _ = self.headers.insert(
                            CONTENT_TYPE.as_str().to_owned(),
                            "application/json".to_owned(),
                        );
                    }
                    serde_json::to_string(v)?
                }
            };
            builder = builder.body(payload);
        }
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        tracing::debug!(method = %self.method, url = %self.url, "sending request");
        let start = Instant::now();
        let resp = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(step::Error::Cancelled),
            r = builder.send() => r?,
        };

        let status = resp.status();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| {
                (k.as_str().to_owned(), String::from_utf8_lossy(v.as_bytes()).into_owned())
            })
            .collect::<LinkedHashMap<_, _>>();
        let is_json = headers
            .get(CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.contains("application/json"));

        let text = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(step::Error::Cancelled),
            t = resp.text() => t?,
        };
        let body = if is_json {
            serde_json::from_str(&text)?
        } else {
            Value::String(text)
        };

        let response = Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
            time: start.elapsed(),
        };
        tracing::debug!(status = response.status, "received response");
        Ok(response)
    }
}

/// Captured HTTP response.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Status code.
    pub status: u16,

    /// Canonical reason phrase of the [`Response::status`].
    pub status_text: String,

    /// Headers with lowercase names.
    pub headers: LinkedHashMap<String, String>,

    /// Body parsed as JSON when the `Content-Type` says so, or a JSON string
    /// otherwise.
    pub body: Value,

    /// Time it took to receive the response headers and body.
    #[serde(rename = "responseTime", serialize_with = "millis")]
    pub time: Duration,
}

fn millis<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
    ser.serialize_f64(d.as_secs_f64() * 1000.0)
}
