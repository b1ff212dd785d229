// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! [`Client`] driving a single browser tab.

use std::{
    future::Future,
    rc::Rc,
    time::{Duration, Instant},
};

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{Config, Error, Key, Resolution, Selector, Transport};

/// Attachment state of a [`Client`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum State {
    /// No target attached.
    #[default]
    Detached,

    /// Attached to a target over a flattened session.
    Attached {
        /// Id of the attached target.
        target_id: String,

        /// Id of the CDP session.
        session_id: String,
    },
}

/// Browser automation client attached to at most one tab at a time.
///
/// Every element action waits for its [`Selector`] to resolve first, polling
/// every [`Config::poll_interval`] up to [`Config::element_timeout`].
#[derive(Debug)]
pub struct Client {
    /// [`Transport`] carrying commands.
    transport: Rc<dyn Transport>,

    /// [`Config`] of waits and timeouts.
    config: Config,

    /// Current attachment [`State`].
    state: State,

    /// Cancellation aborting any in-flight command or wait.
    cancel: CancellationToken,
}

impl Client {
    /// Creates a new detached [`Client`] over the given [`Transport`].
    #[must_use]
    pub fn new(transport: Rc<dyn Transport>, config: Config) -> Self {
        Self {
            transport,
            config,
            state: State::Detached,
            cancel: CancellationToken::new(),
        }
    }

    /// Makes this [`Client`] observe the given cancellation `token`.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Current attachment [`State`].
    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Indicates whether a target is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        matches!(self.state, State::Attached { .. })
    }

    /// [`Config`] of this [`Client`].
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            r = fut => r,
        }
    }

    async fn pause(&self, dur: Duration) -> Result<(), Error> {
        self.cancellable(async {
            tokio::time::sleep(dur).await;
            Ok(())
        })
        .await
    }

    /// Sends a browser-level command.
    async fn browser_command(&self, method: &str, params: Value) -> Result<Value, Error> {
        self.cancellable(self.transport.send(None, method, params)).await
    }

    /// Sends a command to the attached target.
    ///
    /// # Errors
    ///
    /// [`Error::NotAttached`] if no target is attached, or whatever the
    /// [`Transport`] fails with.
    pub async fn command(&self, method: &str, params: Value) -> Result<Value, Error> {
        let State::Attached { session_id, .. } = &self.state else {
            return Err(Error::NotAttached);
        };
        self.cancellable(self.transport.send(Some(session_id.as_str()), method, params))
            .await
    }

    /// Opens a new tab with the given `url`, attaches to it and waits for it
    /// to load.
    ///
    /// A tab that cannot be attached to is closed again.
    ///
    /// # Errors
    ///
    /// If the tab cannot be created or attached to.
    pub async fn open_tab(&mut self, url: &str) -> Result<String, Error> {
        let created = self
            .browser_command("Target.createTarget", json!({ "url": url }))
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Navigation(format!("no target created for {url}")))?
            .to_owned();
        tracing::debug!(%target_id, %url, "opened tab");

        if let Err(e) = self.attach(&target_id).await {
            self.detach().await;
            if let Err(close) = self
                .transport
                .send(None, "Target.closeTarget", json!({ "targetId": target_id }))
                .await
            {
                tracing::debug!(%target_id, "closing unattached tab failed: {close}");
            }
            return Err(e);
        }
        self.wait_for_load().await?;
        Ok(target_id)
    }

    /// Attaches to the given target, detaching from the current one first.
    ///
    /// # Errors
    ///
    /// If attaching or enabling the required domains fails.
    pub async fn attach(&mut self, target_id: &str) -> Result<(), Error> {
        self.detach().await;

        let attached = self
            .browser_command(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
            )
            .await?;
        let session_id = attached
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Protocol {
                code: 0,
                message: format!("no session attached to target {target_id}"),
            })?
            .to_owned();
        self.state = State::Attached {
            target_id: target_id.to_owned(),
            session_id,
        };

        for domain in ["Page.enable", "DOM.enable", "Runtime.enable"] {
            _ = self.command(domain, json!({})).await?;
        }
        tracing::debug!(%target_id, "attached");
        Ok(())
    }

    /// Detaches from the current target, if any.
    ///
    /// Failures are ignored, as the session may be gone already.
    pub async fn detach(&mut self) {
        let State::Attached { session_id, target_id } = std::mem::take(&mut self.state)
        else {
            return;
        };
        if let Err(e) = self
            .transport
            .send(None, "Target.detachFromTarget", json!({ "sessionId": session_id }))
            .await
        {
            tracing::debug!(%target_id, "detaching failed: {e}");
        }
    }

    /// Detaches from the current target and closes its tab.
    ///
    /// # Errors
    ///
    /// If the tab cannot be closed.
    pub async fn close_tab(&mut self) -> Result<(), Error> {
        let State::Attached { target_id, .. } = self.state.clone() else {
            return Ok(());
        };
        self.detach().await;
        _ = self
            .browser_command("Target.closeTarget", json!({ "targetId": target_id }))
            .await?;
        tracing::debug!(%target_id, "closed tab");
        Ok(())
    }

    /// Navigates the attached tab to the given `url` and waits for it to load.
    ///
    /// # Errors
    ///
    /// If the navigation is rejected.
    pub async fn navigate(&self, url: &str) -> Result<(), Error> {
        let res = self.command("Page.navigate", json!({ "url": url })).await?;
        if let Some(err) = res.get("errorText").and_then(Value::as_str) {
            return Err(Error::Navigation(format!("{url}: {err}")));
        }
        self.wait_for_load().await
    }

    /// Evaluates the given JS `expression` in the attached tab, awaiting a
    /// returned promise.
    ///
    /// # Errors
    ///
    /// [`Error::Evaluation`] if the script throws.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, Error> {
        let res = self
            .command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = res.get("exceptionDetails") {
            let message = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("unknown exception");
            return Err(Error::Evaluation(message.to_owned()));
        }
        Ok(res.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    /// URL of the attached tab.
    ///
    /// # Errors
    ///
    /// If evaluation fails.
    pub async fn url(&self) -> Result<String, Error> {
        let url = self.evaluate("window.location.href").await?;
        Ok(url.as_str().unwrap_or_default().to_owned())
    }

    async fn ready_state(&self) -> Result<String, Error> {
        let state = self.evaluate("document.readyState").await?;
        Ok(state.as_str().unwrap_or_default().to_owned())
    }

    /// Waits for the document to become `interactive` or `complete`.
    ///
    /// Evaluation errors are retried, and running out of time is not an
    /// error: the following actions wait for their elements anyway.
    ///
    /// # Errors
    ///
    /// If cancelled or detached.
    pub async fn wait_for_load(&self) -> Result<(), Error> {
        let deadline = Instant::now() + self.config.element_timeout;
        loop {
            match self.ready_state().await {
                Ok(s) if s == "complete" || s == "interactive" => return Ok(()),
                Ok(_) => {}
                Err(e @ (Error::Cancelled | Error::NotAttached | Error::Closed)) => {
                    return Err(e);
                }
                Err(e) => tracing::debug!("ready state check failed: {e}"),
            }
            if Instant::now() >= deadline {
                tracing::warn!("page didn't finish loading in time");
                return Ok(());
            }
            self.pause(self.config.load_poll_interval).await?;
        }
    }

    /// Polls the given JS `expression` until it evaluates to `expected`.
    async fn poll_until(
        &self,
        what: &str,
        expression: &str,
        expected: &Value,
    ) -> Result<(), Error> {
        let deadline = Instant::now() + self.config.element_timeout;
        let mut last_error = None;
        loop {
            match self.evaluate(expression).await {
                Ok(v) if &v == expected => return Ok(()),
                Ok(_) => {}
                Err(e @ (Error::Evaluation(_) | Error::Protocol { .. })) => {
                    tracing::debug!(selector = what, "lookup failed, retrying: {e}");
                    last_error = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout {
                    selector: what.to_owned(),
                    timeout: self.config.element_timeout,
                    last_error,
                });
            }
            self.pause(self.config.poll_interval).await?;
        }
    }

    /// Waits for the given `selector` to resolve to an element and returns
    /// its compiled lookup expression.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the element doesn't appear in time.
    pub async fn wait_for(&self, selector: &str) -> Result<String, Error> {
        let sel = Selector::parse(selector)?;
        let lookup = sel.compile();
        self.poll_until(selector, &format!("({lookup}) !== null"), &Value::Bool(true))
            .await?;

        if sel.may_be_ambiguous() {
            match self.evaluate(&sel.probe()).await {
                Ok(probe) => {
                    if let Resolution::Ambiguous { count, rewrite } = sel.resolution(&probe) {
                        tracing::warn!(
                            selector,
                            count,
                            "selector is ambiguous, using the innermost match; \
                             `{rewrite}` would be unique",
                        );
                    }
                }
                Err(e @ (Error::Cancelled | Error::NotAttached | Error::Closed)) => {
                    return Err(e);
                }
                Err(e) => tracing::debug!(selector, "ambiguity check failed: {e}"),
            }
        }
        Ok(lookup)
    }

    /// Describes how the given `selector` resolves on the current page,
    /// without waiting.
    ///
    /// # Errors
    ///
    /// If the selector is malformed or evaluation fails.
    pub async fn resolve(&self, selector: &str) -> Result<Resolution, Error> {
        let sel = Selector::parse(selector)?;
        let probe = self.evaluate(&sel.probe()).await?;
        Ok(sel.resolution(&probe))
    }

    /// Clicks the center of the element, waiting for a navigation it may
    /// trigger.
    ///
    /// # Errors
    ///
    /// If the element doesn't appear in time or has no layout box.
    pub async fn click(&self, selector: &str) -> Result<(), Error> {
        let lookup = self.wait_for(selector).await?;
        let bbox = self
            .evaluate(&format!(
                "(() => {{
                  const el = {lookup};
                  if (!el) return null;
                  el.scrollIntoView({{ block: 'center', inline: 'center' }});
                  const r = el.getBoundingClientRect();
                  return {{ x: r.left + r.width / 2, y: r.top + r.height / 2,
                            w: r.width, h: r.height }};
                }})()",
            ))
            .await?;
        let coord = |k: &str| bbox.get(k).and_then(Value::as_f64);
        let (Some(x), Some(y)) = (coord("x"), coord("y")) else {
            return Err(Error::BoundingBox { selector: selector.to_owned() });
        };
        if coord("w") == Some(0.0) && coord("h") == Some(0.0) {
            return Err(Error::BoundingBox { selector: selector.to_owned() });
        }

        let url_before = self.url().await.ok();
        for kind in ["mousePressed", "mouseReleased"] {
            _ = self
                .command(
                    "Input.dispatchMouseEvent",
                    json!({
                        "type": kind,
                        "x": x,
                        "y": y,
                        "button": "left",
                        "clickCount": 1,
                    }),
                )
                .await?;
        }
        self.settle_navigation(url_before).await
    }

    /// Waits for a navigation possibly started by an action.
    async fn settle_navigation(&self, url_before: Option<String>) -> Result<(), Error> {
        self.pause(self.config.navigation_settle).await?;
        match self.url().await {
            Ok(now) if url_before.as_deref() != Some(now.as_str()) => {
                tracing::debug!(url = %now, "navigation detected");
                self.wait_for_load().await
            }
            Ok(_) => match self.ready_state().await {
                Ok(s) if s == "loading" => self.wait_for_load().await,
                Ok(_) => Ok(()),
                Err(Error::Cancelled) => Err(Error::Cancelled),
                Err(_) => self.wait_for_load().await,
            },
            Err(e @ (Error::Cancelled | Error::NotAttached | Error::Closed)) => Err(e),
            Err(_) => self.wait_for_load().await,
        }
    }

    /// Replaces the value of the element by typing the given `value`.
    ///
    /// # Errors
    ///
    /// If the element doesn't appear in time.
    pub async fn fill(&self, selector: &str, value: &str) -> Result<(), Error> {
        let lookup = self.wait_for(selector).await?;
        _ = self
            .evaluate(&format!(
                "(() => {{
                  const el = {lookup};
                  el.focus();
                  if ('value' in el) el.value = '';
                  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                  return true;
                }})()",
            ))
            .await?;

        for ch in value.chars() {
            let text = ch.to_string();
            _ = self
                .command(
                    "Input.dispatchKeyEvent",
                    json!({ "type": "keyDown", "key": text, "text": text }),
                )
                .await?;
            _ = self
                .command("Input.dispatchKeyEvent", json!({ "type": "keyUp", "key": text }))
                .await?;
        }

        _ = self
            .evaluate(&format!(
                "(() => {{
                  const el = {lookup};
                  if (!el) return false;
                  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                  return true;
                }})()",
            ))
            .await?;
        Ok(())
    }

    /// Trimmed text content of the element.
    ///
    /// # Errors
    ///
    /// If the element doesn't appear in time.
    pub async fn text(&self, selector: &str) -> Result<String, Error> {
        let lookup = self.wait_for(selector).await?;
        let text = self
            .evaluate(&format!("(() => ((({lookup}) || {{}}).textContent || '').trim())()"))
            .await?;
        Ok(text.as_str().unwrap_or_default().to_owned())
    }

    /// Current `value` of the form element.
    ///
    /// # Errors
    ///
    /// If the element doesn't appear in time.
    pub async fn value(&self, selector: &str) -> Result<String, Error> {
        let lookup = self.wait_for(selector).await?;
        let value = self
            .evaluate(&format!("(() => String((({lookup}) || {{}}).value ?? ''))()"))
            .await?;
        Ok(value.as_str().unwrap_or_default().to_owned())
    }

    /// Selects the option with the given `value` of the `<select>` element.
    ///
    /// # Errors
    ///
    /// If the element doesn't appear in time or has no such option.
    pub async fn select(&self, selector: &str, value: &str) -> Result<(), Error> {
        let lookup = self.wait_for(selector).await?;
        let literal = Value::from(value);
        let selected = self
            .evaluate(&format!(
                "(() => {{
                  const el = {lookup};
                  el.value = {literal};
                  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                  return el.value === {literal};
                }})()",
            ))
            .await?;
        if selected != Value::Bool(true) {
            return Err(Error::Evaluation(format!(
                "no option with value '{value}' in {selector}",
            )));
        }
        Ok(())
    }

    /// Clicks the checkbox unless it's checked already.
    ///
    /// # Errors
    ///
    /// If the element doesn't appear in time.
    pub async fn check(&self, selector: &str) -> Result<(), Error> {
        self.set_checked(selector, true).await
    }

    /// Clicks the checkbox if it's checked.
    ///
    /// # Errors
    ///
    /// If the element doesn't appear in time.
    pub async fn uncheck(&self, selector: &str) -> Result<(), Error> {
        self.set_checked(selector, false).await
    }

    async fn set_checked(&self, selector: &str, checked: bool) -> Result<(), Error> {
        let lookup = self.wait_for(selector).await?;
        let current = self
            .evaluate(&format!("(() => !!(({lookup}) || {{}}).checked)()"))
            .await?;
        if current != Value::Bool(checked) {
            self.click(selector).await?;
        }
        Ok(())
    }

    /// Presses and releases the given key in the focused element.
    ///
    /// # Errors
    ///
    /// If dispatching fails.
    pub async fn press(&self, key: &str) -> Result<(), Error> {
        let key = Key::named(key);
        let mut down = json!({
            "type": "keyDown",
            "key": key.key,
            "code": key.code,
            "windowsVirtualKeyCode": key.key_code,
            "nativeVirtualKeyCode": key.key_code,
        });
        if let Some(text) = &key.text {
            down["text"] = text.as_str().into();
        }
        _ = self.command("Input.dispatchKeyEvent", down).await?;
        _ = self
            .command(
                "Input.dispatchKeyEvent",
                json!({
                    "type": "keyUp",
                    "key": key.key,
                    "code": key.code,
                    "windowsVirtualKeyCode": key.key_code,
                    "nativeVirtualKeyCode": key.key_code,
                }),
            )
            .await?;
        Ok(())
    }

    fn visibility_check(lookup: &str) -> String {
        format!(
            "(() => {{
              const el = {lookup};
              if (!el) return false;
              const s = getComputedStyle(el);
              if (s.display === 'none' || s.visibility === 'hidden') return false;
              if (parseFloat(s.opacity) === 0) return false;
              return el.offsetParent !== null || s.position === 'fixed';
            }})()",
        )
    }

    /// Checks whether the element is rendered visibly right now.
    ///
    /// # Errors
    ///
    /// If the selector is malformed or evaluation fails.
    pub async fn is_visible(&self, selector: &str) -> Result<bool, Error> {
        let lookup = Selector::parse(selector)?.compile();
        let visible = self.evaluate(&Self::visibility_check(&lookup)).await?;
        Ok(visible == Value::Bool(true))
    }

    /// Waits for the element to become visible, or hidden (a missing element
    /// counts as hidden).
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if that doesn't happen in time.
    pub async fn wait_for_visibility(&self, selector: &str, visible: bool) -> Result<(), Error> {
        let lookup = Selector::parse(selector)?.compile();
        let what = format!("{selector} to be {}", if visible { "visible" } else { "hidden" });
        self.poll_until(&what, &Self::visibility_check(&lookup), &Value::Bool(visible))
            .await
    }

    /// Captures the visible part of the page as a base64-encoded PNG.
    ///
    /// # Errors
    ///
    /// If capturing fails.
    pub async fn screenshot(&self) -> Result<String, Error> {
        let shot = self
            .command("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        shot.get("data")
            .and_then(Value::as_str)
            .map(ToOwned::to_owned)
            .ok_or_else(|| Error::Protocol {
                code: 0,
                message: "screenshot returned no data".into(),
            })
    }
}
