// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Key names understood by `browser press`.

/// Key as dispatched by `Input.dispatchKeyEvent`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Key {
    /// DOM `key` value.
    pub key: String,

    /// DOM `code` value.
    pub code: String,

    /// Legacy `keyCode`.
    pub key_code: u32,

    /// Text inserted by the key, if any.
    pub text: Option<String>,
}

impl Key {
    /// Resolves the given key `name`.
    ///
    /// Named keys (`Enter`, `Tab`, `Escape`, `Backspace`, `Delete`, arrows and
    /// `Space`) map to their DOM values; anything else is typed as is.
    #[must_use]
    pub fn named(name: &str) -> Self {
        let named = |key: &str, code: u32| Self {
            key: key.to_owned(),
            code: key.to_owned(),
            key_code: code,
            text: None,
        };
        match name {
            "Enter" => Self {
                text: Some("\r".into()),
                ..named("Enter", 13)
            },
            "Tab" => named("Tab", 9),
            "Escape" => named("Escape", 27),
            "Backspace" => named("Backspace", 8),
            "Delete" => named("Delete", 46),
            "ArrowUp" => named("ArrowUp", 38),
            "ArrowDown" => named("ArrowDown", 40),
            "ArrowLeft" => named("ArrowLeft", 37),
            "ArrowRight" => named("ArrowRight", 39),
            "Space" | " " => Self {
                key: " ".into(),
                code: "Space".into(),
                key_code: 32,
                text: Some(" ".into()),
            },
            other => {
                let upper = other.to_uppercase();
                Self {
                    key: other.to_owned(),
                    code: format!("Key{upper}"),
                    key_code: upper.chars().next().map_or(0, u32::from),
                    text: (other.chars().count() == 1).then(|| other.to_owned()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys() {
        let enter = Key::named("Enter");
        assert_eq!(enter.key_code, 13);
        assert_eq!(enter.code, "Enter");

        let space = Key::named("Space");
        assert_eq!(space.key, " ");
        assert_eq!(space.code, "Space");
        assert_eq!(space.key_code, 32);
    }

    #[test]
    fn plain_keys() {
        let a = Key::named("a");
        assert_eq!(a.code, "KeyA");
        assert_eq!(a.key_code, 65);
        assert_eq!(a.text.as_deref(), Some("a"));
    }
}
