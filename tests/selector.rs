// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use serde_json::json;
use stepdriver::browser::{Resolution, Selector};

fn resolve(selector: &str, probe: serde_json::Value) -> Resolution {
    Selector::parse(selector).unwrap().resolution(&probe)
}

#[test]
fn duplicate_names_get_positional_fallback() {
    assert_eq!(
        resolve(r#"button "Save""#, json!({"count": 2, "found": true, "index": 1})),
        Resolution::Ambiguous {
            count: 2,
            rewrite: r#"button "Save" [1]"#.into(),
        },
    );
}

#[test]
fn duplicate_names_prefer_ancestor_scope() {
    assert_eq!(
        resolve(
            r#"button "Save""#,
            json!({
                "count": 2,
                "found": true,
                "anchor": {"css": "#billing"},
                "scopedCount": 1,
                "scopedIndex": 1,
            }),
        ),
        Resolution::Ambiguous {
            count: 2,
            rewrite: r#"#billing >> button "Save""#.into(),
        },
    );

    assert_eq!(
        resolve(
            r#"button "Save""#,
            json!({
                "count": 3,
                "found": true,
                "anchor": {"role": "region", "name": "Billing"},
                "scopedCount": 2,
                "scopedIndex": 2,
            }),
        ),
        Resolution::Ambiguous {
            count: 3,
            rewrite: r#"region "Billing" >> button "Save" [2]"#.into(),
        },
    );
}

#[test]
fn chain_prefix_is_kept_in_rewrite() {
    assert_eq!(
        resolve(
            r#"form "Login" >> button "Save""#,
            json!({"count": 2, "found": true, "index": 2}),
        ),
        Resolution::Ambiguous {
            count: 2,
            rewrite: r#"form "Login" >> button "Save" [2]"#.into(),
        },
    );
}

#[test]
fn explicit_index_and_single_match_are_unique() {
    assert_eq!(
        resolve(r#"button "Save" [2]"#, json!({"count": 2, "found": true})),
        Resolution::Unique,
    );
    assert_eq!(
        resolve(r#"button "Save""#, json!({"count": 1, "found": true})),
        Resolution::Unique,
    );
    assert_eq!(
        resolve("#missing", json!({"count": 0, "found": false})),
        Resolution::NotFound,
    );
    assert_eq!(resolve("#garbled", json!(null)), Resolution::NotFound);
}

#[test]
fn compiled_lookup_carries_every_segment() {
    let sel = Selector::parse(r#"form "Login" >> input.email [2]"#).unwrap();

    let js = sel.compile();

    assert!(js.contains(r#""role":"form""#), "{js}");
    assert!(js.contains(r#""css":"input.email","index":2"#), "{js}");
    assert!(js.contains("if (!el) return null;"), "chain fails fast");
}

#[test]
fn probe_knows_role_candidates() {
    let probe = Selector::parse(r#"button "Save""#).unwrap().probe();

    assert!(probe.contains(r#""button":["button","[role=\"button\"]","#), "{probe}");
    assert!(!probe.contains(r#""StaticText":"#), "partial roles never anchor");
}

#[test]
fn only_unindexed_role_targets_may_be_ambiguous() {
    let ambiguous = |s: &str| Selector::parse(s).unwrap().may_be_ambiguous();

    assert!(ambiguous(r#"button "Save""#));
    assert!(ambiguous(r#"#billing >> button "Save""#));
    assert!(!ambiguous(r#"button "Save" [1]"#));
    assert!(!ambiguous(r#"button "Save" >> .icon"#));
}
