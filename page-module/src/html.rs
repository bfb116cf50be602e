// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Targeted rewrites of the HTML shell: rendering empty elements and inserting them into the
//! document head.
//!
//! No HTML parsing happens here. The document is expected to contain a single `<html>` opening
//! tag and a single `</head>` closing tag.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::fmt::{Display, Formatter};

static HEAD_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head>").expect("valid regex"));
static HTML_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(<html(\s+([^>]+)?)?)(>)").expect("valid regex"));

/// An attribute value, either a string or an integer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// A string value
    Str(String),
    /// An integer value
    Int(i64),
}

impl Display for AttrValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(value) => f.write_str(value),
            Self::Int(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Element attributes, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, AttrValue)>,
}

impl Attributes {
    /// Creates an empty attribute list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an attribute. Setting an existing attribute replaces its value but keeps its
    /// position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(key, _)| *key == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Sets an attribute and returns the list, for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Iterates over the attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for Attributes
where
    K: Into<String>,
    V: Into<AttrValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut attributes = Self::new();
        for (name, value) in iter {
            attributes.insert(name, value);
        }
        attributes
    }
}

/// Escapes `&`, `<`, `>`, `"` and `'` for use in attribute values.
pub fn escape(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }

    let mut result = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            c => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Renders an empty element like `<img src="x.jpg" />`. Tag and attribute names are lowercased,
/// attribute values escaped.
pub fn render_empty(tag: &str, attributes: &Attributes) -> String {
    let attributes = attributes
        .iter()
        .map(|(name, value)| {
            format!(
                "{}=\"{}\"",
                name.to_lowercase(),
                escape(&value.to_string())
            )
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("<{} {attributes} />", tag.to_lowercase())
}

/// Renders a `<meta>` element.
pub fn meta(attributes: &Attributes) -> String {
    render_empty("meta", attributes)
}

/// Inserts the elements before the closing `</head>` tag, one per line.
pub fn append_to_head(html: &str, elements: &[impl AsRef<str>]) -> String {
    elements.iter().fold(html.to_owned(), |html, element| {
        HEAD_END
            .replacen(&html, 1, |captures: &Captures<'_>| {
                format!("  {}\n  {}", element.as_ref(), &captures[0])
            })
            .into_owned()
    })
}

/// Adds a `prefix="prefix: uri"` attribute to the `<html>` opening tag.
pub fn add_doc_prefix(html: &str, prefix: &str, uri: &str) -> String {
    HTML_START
        .replacen(html, 1, |captures: &Captures<'_>| {
            format!("{} prefix=\"{prefix}: {uri}\">", &captures[1])
        })
        .into_owned()
}
