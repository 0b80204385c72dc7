//! Transformation capability for a stage.
//!
//! The [`Transform`] trait decouples the stage loop from the concrete
//! string-to-string algorithm. The production implementation is
//! [`RegexTransform`] (replace every match of a compiled pattern); tests use
//! closures, which implement the trait directly.

use anyhow::{Context, Result};
use regex::Regex;

/// A fallible string-to-string transformation.
///
/// The stage treats the capability as stateless: each `apply` call receives
/// the full current text and returns the full next text. A failure propagates
/// unchanged to the caller of the stage.
pub trait Transform {
    fn apply(&self, input: &str) -> Result<String>;
}

impl<F> Transform for F
where
    F: Fn(&str) -> Result<String>,
{
    fn apply(&self, input: &str) -> Result<String> {
        self(input)
    }
}

/// Replace every match of a regex pattern with a replacement string.
///
/// The replacement may reference capture groups using the `regex` crate's
/// `$1` / `${name}` syntax. The pattern is compiled once at construction;
/// an invalid pattern fails there, never inside the loop.
#[derive(Debug)]
pub struct RegexTransform {
    pattern: Regex,
    replacement: String,
}

impl RegexTransform {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let pattern =
            Regex::new(pattern).with_context(|| format!("compile pattern {pattern:?}"))?;
        Ok(Self {
            pattern,
            replacement: replacement.to_string(),
        })
    }
}

impl Transform for RegexTransform {
    fn apply(&self, input: &str) -> Result<String> {
        Ok(self
            .pattern
            .replace_all(input, self.replacement.as_str())
            .into_owned())
    }
}
