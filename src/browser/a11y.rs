// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Accessibility roles and accessible name resolution.

/// Roles recognized in `role "name"` selector segments.
pub const ROLES: &[&str] = &[
    "button",
    "textbox",
    "link",
    "heading",
    "checkbox",
    "radio",
    "combobox",
    "listbox",
    "option",
    "menuitem",
    "tab",
    "dialog",
    "alert",
    "img",
    "list",
    "navigation",
    "search",
    "region",
    "form",
    "text",
    "StaticText",
];

/// Returns the CSS selectors whose matches may carry the given `role`, in the
/// order they're tried.
#[must_use]
pub fn css_for(role: &str) -> Vec<String> {
    let known: &[&str] = match role {
        "button" => &[
            "button",
            "[role=\"button\"]",
            "input[type=\"button\"]",
            "input[type=\"submit\"]",
            "input[type=\"reset\"]",
        ],
        "textbox" => &[
            "input:not([type])",
            "input[type=\"text\"]",
            "input[type=\"email\"]",
            "input[type=\"password\"]",
            "input[type=\"search\"]",
            "input[type=\"tel\"]",
            "input[type=\"url\"]",
            "input[type=\"number\"]",
            "textarea",
            "[role=\"textbox\"]",
        ],
        "link" => &["a[href]", "[role=\"link\"]"],
        "heading" => &["h1", "h2", "h3", "h4", "h5", "h6", "[role=\"heading\"]"],
        "checkbox" => &["input[type=\"checkbox\"]", "[role=\"checkbox\"]"],
        "radio" => &["input[type=\"radio\"]", "[role=\"radio\"]"],
        "combobox" => &["select", "[role=\"combobox\"]", "[role=\"listbox\"]"],
        "listbox" => &["select[multiple]", "[role=\"listbox\"]"],
        "option" => &["option", "[role=\"option\"]"],
        "menuitem" => &[
            "[role=\"menuitem\"]",
            "[role=\"menuitemcheckbox\"]",
            "[role=\"menuitemradio\"]",
        ],
        "tab" => &["[role=\"tab\"]"],
        "dialog" => &["dialog", "[role=\"dialog\"]", "[role=\"alertdialog\"]"],
        "alert" => &["[role=\"alert\"]"],
        "img" => &["img", "[role=\"img\"]"],
        "list" => &["ul", "ol", "[role=\"list\"]"],
        "navigation" => &["nav", "[role=\"navigation\"]"],
        "search" => &["[role=\"search\"]", "search"],
        "region" => &["section[aria-label]", "[role=\"region\"]"],
        "form" => &["form", "[role=\"form\"]"],
        "text" | "StaticText" => &["*"],
        _ => return vec![format!("[role=\"{role}\"]")],
    };
    known.iter().map(|&s| s.to_owned()).collect()
}

/// Indicates whether names of the given `role` match by substring rather than
/// by equality.
#[must_use]
pub fn is_partial(role: &str) -> bool {
    matches!(role, "text" | "StaticText")
}

/// JS function `__name(el)` computing the accessible name of an element.
///
/// The first non-empty source wins: `aria-label`, `aria-labelledby` target,
/// `<label for>`, `placeholder`, `value` of button inputs, `alt`, `title` and,
/// finally, the trimmed text content.
pub(crate) const NAME_FN: &str = r#"
  function __name(el) {
    const aria = el.getAttribute('aria-label');
    if (aria && aria.trim()) return aria.trim();
    const by = el.getAttribute('aria-labelledby');
    if (by) {
      const l = document.getElementById(by);
      if (l && (l.textContent || '').trim()) return l.textContent.trim();
    }
    if (el.id) {
      const l = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
      if (l && (l.textContent || '').trim()) return l.textContent.trim();
    }
    if (el.placeholder && el.placeholder.trim()) return el.placeholder.trim();
    if ((el.type === 'submit' || el.type === 'button') && (el.value || '').trim()) {
      return el.value.trim();
    }
    if (el.alt && el.alt.trim()) return el.alt.trim();
    if (el.title && el.title.trim()) return el.title.trim();
    return (el.textContent || '').trim();
  }
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_roles() {
        assert_eq!(css_for("link"), ["a[href]", "[role=\"link\"]"]);
        assert_eq!(css_for("switch"), ["[role=\"switch\"]"]);
        assert!(ROLES.iter().all(|r| !css_for(r).is_empty()));
    }

    #[test]
    fn partial_roles() {
        assert!(is_partial("text"));
        assert!(is_partial("StaticText"));
        assert!(!is_partial("button"));
    }
}
