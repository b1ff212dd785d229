// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Helpers over [`serde_json::Value`]: path resolution, `#{path}`
//! interpolation and quoting.

use lazy_regex::regex;
use linked_hash_map::LinkedHashMap;
use sealed::sealed;
use serde_json::Value;

/// Variable bindings of a [`Context`].
///
/// [`Context`]: crate::Context
pub type Variables = LinkedHashMap<String, Value>;

/// Extension of a [`Value`] allowing to navigate and describe it.
#[sealed]
pub trait ValueExt {
    /// Resolves the given `path` (like `a.b[0].c` or `[1]`) inside this
    /// [`Value`].
    ///
    /// Returns [`None`] as soon as any path segment is absent.
    #[must_use]
    fn at(&self, path: &str) -> Option<&Value>;

    /// Name of this [`Value`]'s JSON type.
    #[must_use]
    fn type_name(&self) -> &'static str;

    /// Renders this [`Value`] for humans: strings as-is, everything else as
    /// JSON.
    #[must_use]
    fn to_display(&self) -> String;
}

#[sealed]
impl ValueExt for Value {
    fn at(&self, path: &str) -> Option<&Value> {
        regex!(r"\w+|\[(\d+)\]").captures_iter(path).try_fold(
            self,
            |current, token| match token.get(1) {
                Some(idx) => current.as_array()?.get(idx.as_str().parse::<usize>().ok()?),
                None => current.as_object()?.get(&token[0]),
            },
        )
    }

    fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
        }
    }

    fn to_display(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            v => v.to_string(),
        }
    }
}

/// Strips a single pair of matching `'` or `"` quotes around the given `s`.
#[must_use]
pub fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['\'', '"'] {
        if let Some(inner) =
            s.strip_prefix(q).and_then(|rest| rest.strip_suffix(q))
        {
            return inner;
        }
    }
    s
}

/// Looks up a `path` rooted either at `response` (the last HTTP response
/// body) or at a variable name.
///
/// `response`, `response.a[0]`, `response[1]`, `name` and `name.a[0].b`
/// forms are supported.
#[must_use]
pub fn lookup(vars: &Variables, response: Option<&Value>, path: &str) -> Option<Value> {
    let path = path.trim();
    if path == "response" {
        return response.cloned();
    }
    if let Some(rest) = path.strip_prefix("response") {
        if rest.starts_with(['.', '[']) {
            return response?.at(rest).cloned();
        }
    }
    if let Some(v) = vars.get(path) {
        return Some(v.clone());
    }
    let sep = path.find(['.', '['])?;
    if sep == 0 {
        return None;
    }
    vars.get(&path[..sep])?.at(&path[sep..]).cloned()
}

/// Substitutes `#{path}` tokens in the given `text` with the values of the
/// resolved variable paths.
///
/// Unresolvable tokens are left untouched.
#[must_use]
pub fn interpolate(text: &str, vars: &Variables) -> String {
    regex!(r"#\{([^}]+)\}")
        .replace_all(text, |cap: &regex::Captures<'_>| {
            lookup(vars, None, &cap[1])
                .map_or_else(|| cap[0].to_owned(), |v| v.to_display())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn vars() -> Variables {
        let mut vars = Variables::new();
        _ = vars.insert("user".into(), json!({"name": "Ann", "ids": [4, 5]}));
        _ = vars.insert("token".into(), json!("abc"));
        vars
    }

    #[test]
    fn resolves_paths() {
        let v = json!({"a": [{"b": 1}, {"b": 2}], "c": null});

        assert_eq!(v.at("a[1].b"), Some(&json!(2)));
        assert_eq!(v.at("c"), Some(&Value::Null));
        assert_eq!(v.at("a[7].b"), None);
        assert_eq!(v.at("a.b"), None);
        assert_eq!(json!([1, 2]).at("[0]"), Some(&json!(1)));
    }

    #[test]
    fn looks_up_response_and_variables() {
        let body = json!({"id": 7, "tags": ["x"]});

        assert_eq!(lookup(&vars(), Some(&body), "response"), Some(body.clone()));
        assert_eq!(lookup(&vars(), Some(&body), "response.id"), Some(json!(7)));
        assert_eq!(lookup(&vars(), Some(&body), "response.tags[0]"), Some(json!("x")));
        assert_eq!(lookup(&vars(), None, "user.ids[1]"), Some(json!(5)));
        assert_eq!(lookup(&vars(), None, "token"), Some(json!("abc")));
        assert_eq!(lookup(&vars(), None, "missing.x"), None);
        assert_eq!(lookup(&vars(), None, "response.id"), None);
    }

    #[test]
    fn interpolates_known_tokens_only() {
        assert_eq!(
            interpolate("#{user.name} has #{token} and #{nope}", &vars()),
            "Ann has abc and #{nope}",
        );
        assert_eq!(interpolate("ids: #{user.ids}", &vars()), "ids: [4,5]");
    }

    #[test]
    fn unquotes() {
        assert_eq!(unquote("'a b'"), "a b");
        assert_eq!(unquote("\"x\""), "x");
        assert_eq!(unquote("'mixed\""), "'mixed\"");
        assert_eq!(unquote(" plain "), "plain");
    }
}
