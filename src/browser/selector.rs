// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Selector language and its compilation into element lookup scripts.
//!
//! ```text
//! selector := segment (' >> ' segment)*
//! segment  := (css | role '"' name '"') (' [' index ']')?
//! ```
//!
//! A `role "name"` segment matches elements carrying the role whose
//! [accessible name](super::a11y) equals `name` (or contains it, for the
//! `text`/`StaticText` roles), falling back to a plain CSS query when nothing
//! matches. An index suffix picks the N-th (1-based) match. Each chained
//! segment is resolved inside the subtree of the previous segment's match.

use std::{fmt, str::FromStr};

use derive_more::with_trait::{Display, Error};
use itertools::Itertools as _;
use lazy_regex::regex_captures;
use serde_json::{json, Value};

use super::a11y;

/// Error of parsing a [`Selector`].
#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
pub enum ParseError {
    /// Selector is blank.
    #[display("Empty selector")]
    Empty,

    /// One of the `>>` chained segments is blank.
    #[display("Empty segment in selector: {selector}")]
    EmptySegment {
        /// Whole selector.
        #[error(not(source))]
        selector: String,
    },

    /// Index suffix of a segment is out of range.
    #[display("Invalid index in selector segment: {segment}")]
    Index {
        /// Offending segment.
        #[error(not(source))]
        segment: String,
    },
}

/// What a [`Segment`] matches by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// Plain CSS selector.
    Css(String),

    /// Accessibility role and name.
    Role {
        /// Role, like `button`.
        role: String,

        /// Accessible name.
        name: String,
    },
}

/// Single `>>` separated part of a [`Selector`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// What this [`Segment`] matches by.
    pub kind: Kind,

    /// 1-based position among the matches, if given.
    pub index: Option<usize>,

    /// Source text without the index suffix.
    pub base: String,
}

impl Segment {
    fn parse(s: &str) -> Result<Self, ParseError> {
        let s = s.trim();
        let (base, index) = match regex_captures!(r"^(.+?)\s+\[(\d+)\]$", s) {
            Some((_, base, idx)) => {
                let idx = idx
                    .parse()
                    .map_err(|_| ParseError::Index { segment: s.to_owned() })?;
                (base, Some(idx))
            }
            None => (s, None),
        };
        let kind = match regex_captures!(
            r#"^(button|textbox|link|heading|checkbox|radio|combobox|listbox|option|menuitem|tab|dialog|alert|img|list|navigation|search|region|form|text|StaticText)\s+"(.+)"$"#,
            base,
        ) {
            Some((_, role, name)) => Kind::Role {
                role: role.to_owned(),
                name: name.to_owned(),
            },
            None => Kind::Css(base.to_owned()),
        };
        Ok(Self {
            kind,
            index,
            base: base.to_owned(),
        })
    }

    /// JSON description of this [`Segment`] consumed by the lookup script.
    fn to_json(&self) -> Value {
        match &self.kind {
            Kind::Css(css) => json!({ "css": css, "index": self.index }),
            Kind::Role { role, name } => json!({
                "role": role,
                "name": name,
                "candidates": a11y::css_for(role),
                "partial": a11y::is_partial(role),
                "css": self.base,
                "index": self.index,
            }),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{} [{i}]", self.base),
            None => write!(f, "{}", self.base),
        }
    }
}

/// Parsed selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    /// Chained [`Segment`]s, outermost first.
    pub segments: Vec<Segment>,
}

impl FromStr for Selector {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let parts = s.split(" >> ").collect::<Vec<_>>();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(ParseError::EmptySegment { selector: s.to_owned() });
        }
        Ok(Self {
            segments: parts
                .into_iter()
                .map(Segment::parse)
                .collect::<Result<_, _>>()?,
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.iter().format(" >> "))
    }
}

/// Shared JS helpers of the lookup scripts.
const HELPERS: &str = r#"
  function __role(scope, seg) {
    const seen = new Set();
    const out = [];
    for (const css of seg.candidates) {
      for (const el of scope.querySelectorAll(css)) {
        if (seen.has(el)) continue;
        seen.add(el);
        const n = __name(el);
        if (seg.partial ? n.includes(seg.name) : n === seg.name) out.push(el);
      }
    }
    if (!seg.partial) return out;
    return out.filter((el) => !out.some((o) => o !== el && el.contains(o)));
  }
  function __all(scope, seg) {
    if (seg.role === undefined) return Array.from(scope.querySelectorAll(seg.css));
    const found = __role(scope, seg);
    if (found.length) return found;
    try { return Array.from(scope.querySelectorAll(seg.css)); } catch (e) { return []; }
  }
  function __pick(found, seg) {
    if (seg.index !== null) return found[seg.index - 1] ?? null;
    if (seg.role === undefined || found.length < 2) return found[0] ?? null;
    let best = found[0];
    let len = (best.textContent || '').length;
    for (const el of found) {
      const l = (el.textContent || '').length;
      if (l < len) { best = el; len = l; }
    }
    return best;
  }
"#;

impl Selector {
    /// Parses the given selector text.
    ///
    /// # Errors
    ///
    /// If the selector or any of its segments is blank.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        s.parse()
    }

    /// Last [`Segment`], the one an action targets.
    #[must_use]
    pub fn target(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Indicates whether resolving this [`Selector`] may silently pick one of
    /// several equally named elements.
    #[must_use]
    pub fn may_be_ambiguous(&self) -> bool {
        self.target().is_some_and(|last| {
            last.index.is_none() && matches!(last.kind, Kind::Role { .. })
        })
    }

    fn segments_json(&self) -> String {
        Value::Array(self.segments.iter().map(Segment::to_json).collect()).to_string()
    }

    /// Compiles this [`Selector`] into a JS expression evaluating to the
    /// matched element, or `null`.
    ///
    /// A chain stops at the first segment resolving to nothing. Out-of-range
    /// indices resolve to `null`.
    #[must_use]
    pub fn compile(&self) -> String {
        format!(
            r"(() => {{
  {name}
  {HELPERS}
  let scope = document;
  let el = null;
  for (const seg of {segs}) {{
    el = __pick(__all(scope, seg), seg);
    if (!el) return null;
    scope = el;
  }}
  return el;
}})()",
            name = a11y::NAME_FN,
            segs = self.segments_json(),
        )
    }

    /// Compiles this [`Selector`] into a JS expression describing how its
    /// last segment resolves, to be interpreted by [`Selector::resolution`].
    #[must_use]
    pub fn probe(&self) -> String {
        let roles = a11y::ROLES
            .iter()
            .filter(|r| !a11y::is_partial(r))
            .map(|&r| (r.to_owned(), Value::from(a11y::css_for(r))))
            .collect::<serde_json::Map<_, _>>();
        format!(
            r"(() => {{
  {name}
  {HELPERS}
  const roles = {roles};
  function __roleOf(el) {{
    const explicit = el.getAttribute('role');
    if (explicit && roles[explicit]) return explicit;
    for (const [role, candidates] of Object.entries(roles)) {{
      if (candidates.some((c) => !c.startsWith('[role=') && el.matches(c))) return role;
    }}
    return null;
  }}
  const segs = {segs};
  let scope = document;
  for (const seg of segs.slice(0, -1)) {{
    const el = __pick(__all(scope, seg), seg);
    if (!el) return {{ count: 0, found: false }};
    scope = el;
  }}
  const last = segs[segs.length - 1];
  const found = __all(scope, last);
  const target = __pick(found, last);
  if (!target || found.length < 2 || last.index !== null) {{
    return {{ count: found.length, found: !!target }};
  }}
  for (let a = target.parentElement; a && a !== scope; a = a.parentElement) {{
    if (a === document.documentElement || a === document.body) break;
    if (found.every((f) => a.contains(f))) continue;
    let anchor = null;
    if (a.id && document.querySelectorAll('#' + CSS.escape(a.id)).length === 1) {{
      anchor = {{ css: '#' + CSS.escape(a.id) }};
    }} else {{
      const role = __roleOf(a);
      const name = role ? __name(a) : '';
      if (name && name.length < 60
          && __role(document, {{ candidates: roles[role], name, partial: false }}).length === 1) {{
        anchor = {{ role, name }};
      }}
    }}
    if (anchor) {{
      const within = __all(a, last);
      return {{
        count: found.length,
        found: true,
        anchor,
        scopedCount: within.length,
        scopedIndex: within.indexOf(target) + 1,
      }};
    }}
  }}
  return {{ count: found.length, found: true, index: found.indexOf(target) + 1 }};
}})()",
            name = a11y::NAME_FN,
            roles = Value::Object(roles),
            segs = self.segments_json(),
        )
    }

    /// Interprets the outcome of evaluating the [`Selector::probe`] script.
    #[must_use]
    pub fn resolution(&self, probe: &Value) -> Resolution {
        let count = probe
            .get("count")
            .and_then(Value::as_u64)
            .and_then(|c| usize::try_from(c).ok())
            .unwrap_or_default();
        let found = probe.get("found").and_then(Value::as_bool).unwrap_or_default();
        let Some((target, outer)) = self.segments.split_last() else {
            return Resolution::NotFound;
        };
        if !found {
            return Resolution::NotFound;
        }
        if count < 2 || target.index.is_some() {
            return Resolution::Unique;
        }

        let last = &target.base;
        let prefix = outer
            .iter()
            .map(|s| format!("{s} >> "))
            .join("");
        let as_usize = |key: &str| {
            probe
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|v| usize::try_from(v).ok())
        };

        let anchor = probe.get("anchor").and_then(|a| {
            if let Some(css) = a.get("css").and_then(Value::as_str) {
                return Some(css.to_owned());
            }
            let role = a.get("role").and_then(Value::as_str)?;
            let name = a.get("name").and_then(Value::as_str)?;
            Some(format!("{role} \"{name}\""))
        });
        let rewrite = match anchor {
            Some(anchor) => {
                let scoped = as_usize("scopedCount").unwrap_or(1);
                let index = as_usize("scopedIndex").unwrap_or(1);
                if scoped > 1 {
                    format!("{prefix}{anchor} >> {last} [{index}]")
                } else {
                    format!("{prefix}{anchor} >> {last}")
                }
            }
            None => {
                let index = as_usize("index").unwrap_or(1);
                format!("{prefix}{last} [{index}]")
            }
        };
        Resolution::Ambiguous { count, rewrite }
    }
}

/// How a [`Selector`] resolves on the current page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Nothing matches.
    NotFound,

    /// Exactly one element matches, or an index picks one explicitly.
    Unique,

    /// Several elements match.
    Ambiguous {
        /// Number of matches.
        count: usize,

        /// Selector resolving to the same element unambiguously.
        rewrite: String,
    },
}
