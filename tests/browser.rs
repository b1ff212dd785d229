// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

mod common;

use std::rc::Rc;

use serde_json::json;
use stepdriver::browser::{self, Client, Launcher, Resolution, State, Transport};
use tokio_util::sync::CancellationToken;

use self::common::{quick_config, FakeBrowser};

fn client(fake: &Rc<FakeBrowser>) -> Client {
    let transport: Rc<dyn Transport> = fake.clone();
    Client::new(transport, quick_config())
}

async fn attached(fake: &Rc<FakeBrowser>) -> Client {
    let mut client = client(fake);
    _ = client.open_tab("https://example.com/").await.unwrap();
    fake.calls.borrow_mut().clear();
    client
}

#[tokio::test]
async fn opens_tab_over_flattened_session() {
    let fake = Rc::new(FakeBrowser::default());
    let mut client = client(&fake);

    let target = client.open_tab("https://example.com/").await.unwrap();

    assert_eq!(target, "T1");
    assert_eq!(
        client.state(),
        &State::Attached {
            target_id: "T1".into(),
            session_id: "S1".into(),
        },
    );
    assert_eq!(
        fake.methods(),
        [
            "Target.createTarget",
            "Target.attachToTarget",
            "Page.enable",
            "DOM.enable",
            "Runtime.enable",
            "Runtime.evaluate",
        ],
    );
    let calls = fake.calls.borrow();
    assert_eq!(calls[0].session, None);
    assert_eq!(calls[0].params["url"], "https://example.com/");
    assert_eq!(calls[1].params, json!({"targetId": "T1", "flatten": true}));
    assert!(calls[2..].iter().all(|c| c.session.as_deref() == Some("S1")));
}

#[tokio::test]
async fn actions_need_attached_tab() {
    let fake = Rc::new(FakeBrowser::default());
    let client = client(&fake);

    let err = client.text("h1").await.unwrap_err();

    assert!(matches!(err, browser::Error::NotAttached), "got: {err}");
    assert!(fake.calls.borrow().is_empty());
}

#[tokio::test]
async fn click_presses_center_of_element() {
    let fake = Rc::new(FakeBrowser::default());
    let client = attached(&fake).await;

    client.click("#go").await.unwrap();

    let clicks = fake.calls_of("Input.dispatchMouseEvent");
    assert_eq!(clicks.len(), 2);
    assert_eq!(clicks[0].params["type"], "mousePressed");
    assert_eq!(clicks[1].params["type"], "mouseReleased");
    assert!(clicks.iter().all(|c| c.params["x"] == 50.0 && c.params["y"] == 20.0));
    assert!(clicks.iter().all(|c| c.session.as_deref() == Some("S1")));
}

#[tokio::test]
async fn click_without_layout_box_fails() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.bbox.borrow_mut() = json!({"x": 0.0, "y": 0.0, "w": 0.0, "h": 0.0});
    let client = attached(&fake).await;

    let err = client.click("#hidden").await.unwrap_err();

    assert_eq!(err.to_string(), "Could not get bounding box for: #hidden");
    assert!(fake.calls_of("Input.dispatchMouseEvent").is_empty());
}

#[tokio::test]
async fn fill_types_every_character() {
    let fake = Rc::new(FakeBrowser::default());
    let client = attached(&fake).await;

    client.fill("#name", "hi").await.unwrap();

    let keys = fake.calls_of("Input.dispatchKeyEvent");
    assert_eq!(keys.len(), 4);
    let typed = keys
        .iter()
        .filter(|c| c.params["type"] == "keyDown")
        .map(|c| c.params["text"].as_str().unwrap().to_owned())
        .collect::<Vec<_>>();
    assert_eq!(typed, ["h", "i"]);
}

#[tokio::test]
async fn reads_text_and_value() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.text.borrow_mut() = "Hello".into();
    *fake.value.borrow_mut() = "ann@example.com".into();
    let client = attached(&fake).await;

    assert_eq!(client.text("h1").await.unwrap(), "Hello");
    assert_eq!(client.value("#email").await.unwrap(), "ann@example.com");
}

#[tokio::test]
async fn missing_element_times_out() {
    let fake = Rc::new(FakeBrowser::default());
    fake.present.set(false);
    let client = attached(&fake).await;

    let err = client.text("#nope").await.unwrap_err();

    assert!(
        matches!(&err, browser::Error::Timeout { selector, .. } if selector == "#nope"),
        "got: {err}",
    );
    assert_eq!(err.to_string(), "Timeout waiting for element: #nope");
    assert!(fake.calls_of("Runtime.evaluate").len() > 1, "lookup is polled");
}

#[tokio::test]
async fn waits_for_visibility_state() {
    let fake = Rc::new(FakeBrowser::default());
    fake.visible.set(false);
    let client = attached(&fake).await;

    assert!(!client.is_visible("#spinner").await.unwrap());
    client.wait_for_visibility("#spinner", false).await.unwrap();

    let err = client.wait_for_visibility("#spinner", true).await.unwrap_err();
    assert!(
        matches!(
            &err,
            browser::Error::Timeout { selector, .. } if selector == "#spinner to be visible",
        ),
        "got: {err}",
    );
}

#[tokio::test]
async fn checkbox_is_clicked_only_when_state_differs() {
    let fake = Rc::new(FakeBrowser::default());
    fake.checked.set(true);
    let client = attached(&fake).await;

    client.check("#terms").await.unwrap();
    assert!(fake.calls_of("Input.dispatchMouseEvent").is_empty());

    client.uncheck("#terms").await.unwrap();
    assert_eq!(fake.calls_of("Input.dispatchMouseEvent").len(), 2);
}

#[tokio::test]
async fn presses_named_key() {
    let fake = Rc::new(FakeBrowser::default());
    let client = attached(&fake).await;

    client.press("Enter").await.unwrap();

    let keys = fake.calls_of("Input.dispatchKeyEvent");
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].params["type"], "keyDown");
    assert_eq!(keys[0].params["key"], "Enter");
    assert_eq!(keys[0].params["windowsVirtualKeyCode"], 13);
    assert_eq!(keys[1].params["type"], "keyUp");
}

#[tokio::test]
async fn captures_screenshot() {
    let fake = Rc::new(FakeBrowser::default());
    let client = attached(&fake).await;

    assert_eq!(client.screenshot().await.unwrap(), "iVBORw0KGgo=");
    assert_eq!(
        fake.calls_of("Page.captureScreenshot")[0].params,
        json!({"format": "png"}),
    );
}

#[tokio::test]
async fn rejected_command_is_protocol_error() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.reject.borrow_mut() = Some("Page.navigate".into());
    let client = attached(&fake).await;

    let err = client.navigate("https://example.com/next").await.unwrap_err();

    assert_eq!(err.to_string(), "CDP error -32000: Page.navigate rejected");
}

#[tokio::test]
async fn close_tab_detaches_then_closes() {
    let fake = Rc::new(FakeBrowser::default());
    let mut client = attached(&fake).await;

    client.close_tab().await.unwrap();

    assert_eq!(fake.methods(), ["Target.detachFromTarget", "Target.closeTarget"]);
    let calls = fake.calls.borrow();
    assert_eq!(calls[0].params, json!({"sessionId": "S1"}));
    assert_eq!(calls[1].params, json!({"targetId": "T1"}));
    assert_eq!(client.state(), &State::Detached);
}

#[tokio::test]
async fn cancellation_aborts_pending_wait() {
    let fake = Rc::new(FakeBrowser::default());
    fake.present.set(false);
    let token = CancellationToken::new();
    let mut client = client(&fake).with_cancellation(token.clone());
    _ = client.open_tab("https://example.com/").await.unwrap();

    token.cancel();
    let err = client.text("#late").await.unwrap_err();

    assert!(matches!(err, browser::Error::Cancelled), "got: {err}");
}

#[tokio::test]
async fn ambiguous_role_selector_suggests_rewrite() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.probe.borrow_mut() = json!({"count": 3, "found": true, "index": 2});
    let client = attached(&fake).await;

    _ = client.wait_for(r#"button "Save""#).await.unwrap();
    let probes = fake
        .calls_of("Runtime.evaluate")
        .into_iter()
        .filter(|c| c.params["expression"].as_str().unwrap().contains("scopedCount"))
        .count();
    assert_eq!(probes, 1);

    assert_eq!(
        client.resolve(r#"button "Save""#).await.unwrap(),
        Resolution::Ambiguous {
            count: 3,
            rewrite: r#"button "Save" [2]"#.into(),
        },
    );
}

#[tokio::test]
async fn launcher_reuses_transport() {
    let fake = Rc::new(FakeBrowser::default());
    let transport: Rc<dyn Transport> = fake.clone();
    let launcher = Launcher::with_transport(quick_config(), transport);

    let mut first = launcher.launch(CancellationToken::new()).await.unwrap();
    let second = launcher.launch(CancellationToken::new()).await.unwrap();
    _ = first.open_tab("https://example.com/").await.unwrap();

    assert!(first.is_attached());
    assert!(!second.is_attached());
    assert_eq!(second.config().element_timeout, quick_config().element_timeout);
}

#[tokio::test]
async fn attaching_detaches_from_current_target_first() {
    let fake = Rc::new(FakeBrowser::default());
    let mut client = attached(&fake).await;

    client.attach("T2").await.unwrap();

    assert_eq!(
        fake.methods(),
        [
            "Target.detachFromTarget",
            "Target.attachToTarget",
            "Page.enable",
            "DOM.enable",
            "Runtime.enable",
        ],
    );
    let calls = fake.calls.borrow();
    assert_eq!(calls[0].params, json!({"sessionId": "S1"}));
    assert_eq!(calls[1].params, json!({"targetId": "T2", "flatten": true}));
    assert_eq!(
        client.state(),
        &State::Attached {
            target_id: "T2".into(),
            session_id: "S1".into(),
        },
    );
}

#[tokio::test]
async fn unattachable_tab_is_closed() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.reject.borrow_mut() = Some("Target.attachToTarget".into());
    let mut client = client(&fake);

    let err = client.open_tab("https://example.com/").await.unwrap_err();

    assert_eq!(err.to_string(), "CDP error -32000: Target.attachToTarget rejected");
    assert_eq!(
        fake.methods(),
        ["Target.createTarget", "Target.attachToTarget", "Target.closeTarget"],
    );
    assert_eq!(fake.calls_of("Target.closeTarget")[0].params, json!({"targetId": "T1"}));
    assert_eq!(client.state(), &State::Detached);
}

#[tokio::test]
async fn click_waits_for_navigation_it_starts() {
    let fake = Rc::new(FakeBrowser::default());
    let client = attached(&fake).await;
    fake.script_urls(&["https://example.com/", "https://example.com/next"]);
    fake.script_ready_states(&["loading", "loading", "complete"]);

    client.click("#next").await.unwrap();

    assert_eq!(fake.evaluations_of("document.readyState"), 3);
    assert!(fake.ready_states.borrow().is_empty());
}

#[tokio::test]
async fn click_waits_while_document_reloads() {
    let fake = Rc::new(FakeBrowser::default());
    let client = attached(&fake).await;

    client.click("#stay").await.unwrap();
    assert_eq!(fake.evaluations_of("document.readyState"), 1);

    fake.calls.borrow_mut().clear();
    fake.script_ready_states(&["loading", "loading", "complete"]);

    client.click("#reload").await.unwrap();
    assert_eq!(fake.evaluations_of("document.readyState"), 3);
    assert!(fake.ready_states.borrow().is_empty());
}

#[tokio::test]
async fn lookup_errors_are_retried() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.text.borrow_mut() = "Hello".into();
    let client = attached(&fake).await;
    fake.throw_on(") !== null", "Error: Execution context was destroyed.", 2);

    assert_eq!(client.text("h1").await.unwrap(), "Hello");

    let lookups = fake
        .calls_of("Runtime.evaluate")
        .into_iter()
        .filter(|c| c.params["expression"].as_str().unwrap().ends_with(") !== null"))
        .count();
    assert_eq!(lookups, 3);
}

#[tokio::test]
async fn timeout_reports_last_lookup_error() {
    let fake = Rc::new(FakeBrowser::default());
    let client = attached(&fake).await;
    fake.throw_on(") !== null", "Error: Execution context was destroyed.", usize::MAX);

    let err = client.text("#late").await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Timeout waiting for element: #late \
         (last error: JS error: Error: Execution context was destroyed.)",
    );
}

#[tokio::test]
async fn failed_ambiguity_check_keeps_resolved_element() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.text.borrow_mut() = "Saved".into();
    let client = attached(&fake).await;
    fake.throw_on("scopedCount", "Error: Execution context was destroyed.", usize::MAX);

    assert_eq!(client.text(r#"button "Save""#).await.unwrap(), "Saved");

    let probes = fake
        .calls_of("Runtime.evaluate")
        .into_iter()
        .filter(|c| c.params["expression"].as_str().unwrap().contains("scopedCount"))
        .count();
    assert_eq!(probes, 1);
}
