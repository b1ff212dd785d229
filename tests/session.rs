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

use std::{cell::RefCell, fs, rc::Rc};

use async_trait::async_trait;
use futures::{future::LocalBoxFuture, FutureExt as _};
use gherkin::tagexpr::TagOperation;
use regex::Regex;
use serde_json::{json, Value};
use stepdriver::{
    browser::{Launcher, Transport},
    plugin::{
        self,
        script::{self, Engine, Script},
    },
    step::{self, Args, Definition},
    BrowserPlugin, BuiltinPlugin, Context, Event, Filter, Plugin, ScriptPlugin, Session,
    Status,
};
use tokio::sync::mpsc;

use self::common::{quick_config, FakeBrowser};

fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    events
}

fn kind(ev: &Event) -> String {
    match ev {
        Event::ParseFailed { .. } => "parse-failed".into(),
        Event::Started { .. } => "started".into(),
        Event::ScenarioStarted { index, .. } => format!("scenario {index}"),
        Event::Step { scenario_index, result } => {
            format!("step {scenario_index} {}", result.status)
        }
        Event::Done { .. } => "done".into(),
        Event::Error { .. } => "error".into(),
        Event::Cancelled => "cancelled".into(),
    }
}

const VARIABLES: &str = "\
Feature: Variables
  Background:
    Given def greeting = 'hello'

  Scenario: matching
    When def user = { \"name\": \"Ann\", \"tags\": [\"a\", \"b\"] }
    Then match user.name == 'Ann'
    And match user.tags contains ['b']
    And print greeting

  Scenario: mismatching
    Then match greeting == 'bye'
    And print greeting
";

#[tokio::test]
async fn events_follow_execution_order() {
    let mut session = Session::new();
    session.load_plugin(BuiltinPlugin).await.unwrap();
    let mut rx = session.subscribe();

    let result = session.execute(VARIABLES).await.unwrap();

    assert_eq!(
        drain(&mut rx).iter().map(kind).collect::<Vec<_>>(),
        [
            "started",
            "scenario 0",
            "step 0 passed",
            "step 0 passed",
            "step 0 passed",
            "step 0 passed",
            "step 0 passed",
            "scenario 1",
            "step 1 passed",
            "step 1 failed",
            "step 1 skipped",
            "done",
        ],
    );
    assert_eq!(result.status, Status::Failed);
    assert_eq!(result.scenarios[0].status, Status::Passed);
    assert_eq!(
        result.scenarios[0].steps[4].print_output.as_deref(),
        Some("hello"),
    );
    assert!(result.scenarios[1].steps[1].error.is_some());
}

#[tokio::test]
async fn unmatched_step_fails_scenario() {
    let mut session = Session::new();
    session.load_plugin(BuiltinPlugin).await.unwrap();

    let result = session
        .execute(
            "\
Feature: Unknown
  Scenario: typo
    Given def x = 1
    When fly to the moon
    Then print x
",
        )
        .await
        .unwrap();

    let steps = &result.scenarios[0].steps;
    assert_eq!(
        steps.iter().map(|s| s.status).collect::<Vec<_>>(),
        [Status::Passed, Status::Failed, Status::Skipped],
    );
    assert_eq!(
        steps[1].error.as_deref(),
        Some("No matching step definition for: \"fly to the moon\""),
    );
}

/// [`Plugin`] with a step cancelling the run it's executed in.
#[derive(Debug)]
struct Canceller;

fn cancel_run<'a>(
    ctx: &'a mut Context,
    _: Args,
) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        ctx.cancellation().cancel();
        Ok(())
    }
    .boxed_local()
}

#[async_trait(?Send)]
impl Plugin for Canceller {
    fn id(&self) -> &str {
        "canceller"
    }

    fn name(&self) -> &str {
        "Canceller"
    }

    fn step_definitions(&self) -> Vec<Definition> {
        vec![Definition::new(&Regex::new("^stop everything$").unwrap(), cancel_run)]
    }
}

#[tokio::test]
async fn cancelled_run_ends_with_cancelled_event() {
    let mut session = Session::new();
    session.load_plugin(Canceller).await.unwrap();
    session.load_plugin(BuiltinPlugin).await.unwrap();
    let mut rx = session.subscribe();

    let result = session
        .execute(
            "\
Feature: Cancel
  Scenario: first
    Given def x = 1
    When stop everything
    Then print x

  Scenario: second
    Given print 'never'
",
        )
        .await
        .unwrap();

    let kinds = drain(&mut rx).iter().map(kind).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        [
            "started",
            "scenario 0",
            "step 0 passed",
            "step 0 passed",
            "step 0 skipped",
            "cancelled",
        ],
    );
    assert_eq!(result.scenarios.len(), 2);
    assert_eq!(result.scenarios[1].steps[0].status, Status::Skipped);

    // The next run gets a fresh cancellation token.
    let next = session
        .execute("Feature: Again\n  Scenario: ok\n    Given print 'again'\n")
        .await
        .unwrap();
    assert_eq!(next.status, Status::Passed);
    assert!(matches!(drain(&mut rx).last(), Some(Event::Done { .. })));
}

#[tokio::test]
async fn unreadable_path_emits_error() {
    let mut session = Session::new();
    let mut rx = session.subscribe();

    let result = session
        .execute_path("/definitely/not/here.feature", &Filter::default())
        .await;

    assert!(result.is_none());
    match drain(&mut rx).as_slice() {
        [Event::Error { message }] => {
            assert!(message.starts_with("Could not read /definitely/not/here.feature"));
        }
        other => panic!("unexpected events: {other:?}"),
    }
}

#[tokio::test]
async fn executes_filtered_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tagged.feature");
    fs::write(
        &path,
        "\
Feature: Tagged
  @smoke
  Scenario: quick
    Given print 'quick'

  Scenario: slow
    Given print 'slow'
",
    )
    .unwrap();
    let mut session = Session::new();
    session.load_plugin(BuiltinPlugin).await.unwrap();
    let filter = Filter {
        tags: Some("@smoke".parse::<TagOperation>().unwrap()),
        ..Filter::default()
    };

    let result = session.execute_path(&path, &filter).await.unwrap();

    assert_eq!(
        result.scenarios.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        ["quick"],
    );
}

const BROWSING: &str = "\
Feature: Browsing
  Scenario: sign in
    Given browser open 'https://example.com/login'
    When browser fill '#user' with 'ann'
    And browser click button \"Sign in\"
    Then browser text 'h1' == 'Welcome'
    And def title = browser text 'h1'
    And match title == 'Welcome'
    And browser screenshot
    And browser close

  Scenario: left open
    Given browser open 'https://example.com/'
    Then browser visible '#main'
";

#[tokio::test]
async fn drives_browser_through_steps() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.text.borrow_mut() = "Welcome".into();
    let transport: Rc<dyn Transport> = fake.clone();
    let mut session = Session::new();
    session
        .load_plugin(BrowserPlugin::with_launcher(Launcher::with_transport(
            quick_config(),
            transport,
        )))
        .await
        .unwrap();
    session.load_plugin(BuiltinPlugin).await.unwrap();

    let result = session.execute(BROWSING).await.unwrap();

    for sc in &result.scenarios {
        for st in &sc.steps {
            assert_eq!(st.status, Status::Passed, "{}: {:?}", st.step.text, st.error);
        }
    }
    assert_eq!(
        result.scenarios[0].steps[6].screenshot.as_deref(),
        Some("iVBORw0KGgo="),
    );
    assert_eq!(fake.calls_of("Target.closeTarget").len(), 1);
    // The tab left open by the second scenario gets detached after it.
    assert_eq!(fake.calls_of("Target.detachFromTarget").len(), 2);
}

#[tokio::test]
async fn browser_assertion_failure_is_reported() {
    let fake = Rc::new(FakeBrowser::default());
    *fake.text.borrow_mut() = "Oops".into();
    fake.visible.set(true);
    let transport: Rc<dyn Transport> = fake.clone();
    let mut session = Session::new();
    session
        .load_plugin(BrowserPlugin::with_launcher(Launcher::with_transport(
            quick_config(),
            transport,
        )))
        .await
        .unwrap();

    let result = session
        .execute(
            "\
Feature: Failing
  Scenario: wrong text
    Given browser open 'https://example.com/'
    Then browser text 'h1' contains 'Welcome'

  Scenario: still visible
    Given browser open 'https://example.com/'
    Then browser not visible '#spinner'
",
        )
        .await
        .unwrap();

    assert_eq!(
        result.scenarios[0].steps[1].error.as_deref(),
        Some("Expected text to contain \"Welcome\" but got \"Oops\""),
    );
    assert_eq!(
        result.scenarios[1].steps[1].error.as_deref(),
        Some("Element should not be visible: #spinner"),
    );
}

/// [`Engine`] treating code as JSON, except for a few commands.
#[derive(Debug, Default)]
struct JsonEngine {
    custom: RefCell<Vec<Definition>>,
}

fn greet<'a>(ctx: &'a mut Context, args: Args) -> LocalBoxFuture<'a, Result<(), step::Error>> {
    async move {
        ctx.print(format!("hello {}", args.group(0)?));
        Ok(())
    }
    .boxed_local()
}

#[async_trait(?Send)]
impl Engine for JsonEngine {
    async fn execute(&self, code: &str, _: &mut Context) -> Result<Value, script::Error> {
        match code.trim() {
            "register greet" => {
                self.custom
                    .borrow_mut()
                    .push(Definition::new(&Regex::new(r"^greet (\w+)$").unwrap(), greet));
                Ok(Value::Null)
            }
            "throw" => Err(script::Error::Runtime {
                message: "thrown".into(),
            }),
            code => serde_json::from_str(code).map_err(|e| script::Error::Syntax {
                message: e.to_string(),
            }),
        }
    }

    fn take_custom_steps(&self) -> Vec<Definition> {
        self.custom.take()
    }
}

const SCRIPTING: &str = "\
Feature: Scripting
  Scenario: scripted
    Given greet Ann
    And def answer = eval
      \"\"\"
      {\"value\": 42}
      \"\"\"
    Then match answer.value == 42
    And script 'setup'

  Scenario: failing scripts
    Given eval
      \"\"\"
      throw
      \"\"\"

  Scenario: missing script
    Given script 'nope'
";

#[tokio::test]
async fn scripts_provide_steps_and_values() {
    let mut session = Session::new();
    session
        .load_plugin(ScriptPlugin::new(
            JsonEngine::default(),
            vec![
                Script {
                    name: "setup".into(),
                    code: "register greet".into(),
                    enabled: true,
                },
                Script {
                    name: "off".into(),
                    code: "throw".into(),
                    enabled: false,
                },
            ],
        ))
        .await
        .unwrap();
    session.load_plugin(BuiltinPlugin).await.unwrap();

    let result = session.execute(SCRIPTING).await.unwrap();

    let scripted = &result.scenarios[0];
    assert_eq!(scripted.status, Status::Passed, "{:?}", scripted.steps);
    assert_eq!(scripted.steps[0].print_output.as_deref(), Some("hello Ann"));
    assert_eq!(
        result.scenarios[1].steps[0].error.as_deref(),
        Some("Script error: thrown"),
    );
    assert_eq!(
        result.scenarios[2].steps[0].error.as_deref(),
        Some("Script not found: nope"),
    );
    assert!(
        session
            .registry()
            .iter()
            .all(|d| d.source.as_deref() != Some(script::CUSTOM_SOURCE)),
        "custom steps are removed after the scenario",
    );
}

#[tokio::test]
async fn generic_def_cannot_eval_without_engine() {
    let mut session = Session::new();
    session.load_plugin(BuiltinPlugin).await.unwrap();

    let result = session
        .execute("Feature: No engine\n  Scenario: s\n    Given def x = eval\n")
        .await
        .unwrap();

    assert_eq!(
        result.scenarios[0].steps[0].error.as_deref(),
        Some("'def x = eval' requires a script engine"),
    );
}

#[tokio::test]
async fn duplicate_plugin_is_rejected() {
    let mut session = Session::new();
    session.load_plugin(BuiltinPlugin).await.unwrap();
    let registered = session.registry().len();

    let err = session.load_plugin(BuiltinPlugin).await.unwrap_err();

    assert!(matches!(err, plugin::Error::AlreadyLoaded { .. }), "got: {err}");
    assert_eq!(session.registry().len(), registered);
    session.destroy().await.unwrap();
    assert_eq!(session.plugins().count(), 0);
    assert_eq!(json!(session.parse(VARIABLES).unwrap())["scenarioCount"], 2);
}
