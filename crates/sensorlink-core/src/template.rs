//! Streaming placeholder substitution for served documents.
//!
//! Placeholders have the form `{{NAME}}` where `NAME` is ASCII letters,
//! digits and underscores. Each line is scanned once, left to right;
//! substituted text is never rescanned, so a value that itself looks like a
//! placeholder is emitted as-is.

use std::borrow::Cow;
use std::collections::HashMap;
use std::io::{self, BufRead};
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{([A-Za-z0-9_]+)\}\}").expect("placeholder pattern"))
}

/// Values available to a render pass.
///
/// A name bound to `None` is recognized but absent and renders as the empty
/// string. A name that was never bound is unrecognized and its placeholder
/// is left verbatim.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, Option<String>>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(name.into(), Some(value.into()));
        self
    }

    /// Bind `name` to a value that may be absent.
    pub fn set_optional(&mut self, name: impl Into<String>, value: Option<String>) -> &mut Self {
        self.values.insert(name.into(), value);
        self
    }

    /// `None` if unrecognized, `Some("")` if recognized but absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|value| value.as_deref().unwrap_or(""))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Render a single line. Borrows the input when nothing was substituted.
pub fn render_line<'a>(line: &'a str, variables: &Variables) -> Cow<'a, str> {
    placeholder().replace_all(line, |caps: &Captures<'_>| {
        match variables.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        }
    })
}

/// Render a sequence of lines.
///
/// Each line is rendered as it is pulled, so memory use is bounded by the
/// longest line. Terminators are part of the lines and pass through
/// untouched.
pub fn render<'v, I>(lines: I, variables: &'v Variables) -> impl Iterator<Item = String> + 'v
where
    I: IntoIterator,
    I::Item: AsRef<str>,
    I::IntoIter: 'v,
{
    lines
        .into_iter()
        .map(move |line| render_line(line.as_ref(), variables).into_owned())
}

/// Render a whole document into one string.
pub fn render_to_string(document: &str, variables: &Variables) -> String {
    render(document.split_inclusive('\n'), variables).collect()
}

/// Read lines from `reader`, keeping their terminators.
///
/// Invalid UTF-8 yields an [`io::ErrorKind::InvalidData`] error and ends
/// the sequence.
pub fn read_lines<R: BufRead>(reader: R) -> ReadLines<R> {
    ReadLines {
        reader,
        done: false,
    }
}

/// Iterator returned by [`read_lines`].
#[derive(Debug)]
pub struct ReadLines<R> {
    reader: R,
    done: bool,
}

impl<R: BufRead> Iterator for ReadLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(Ok(line)),
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Escape text for use inside HTML element content or a quoted attribute.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}
