//! Output normalization applied to hook-produced text before it is sent.

use std::sync::LazyLock;

use regex::Regex;

/// Post-processing step for produced text.
pub trait OutputFilter: Send + Sync {
    fn apply(&self, text: &str) -> String;
}

/// Leaves text untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl OutputFilter for Identity {
    fn apply(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Upper-cases the first letter of every sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capitalize;

impl OutputFilter for Capitalize {
    fn apply(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut sentence_start = true;
        for c in text.chars() {
            if sentence_start && c.is_alphabetic() {
                out.extend(c.to_uppercase());
                sentence_start = false;
            } else {
                if matches!(c, '.' | '!' | '?') {
                    sentence_start = true;
                } else if !c.is_whitespace() {
                    sentence_start = false;
                }
                out.push(c);
            }
        }
        out
    }
}

/// Removes space before punctuation and collapses whitespace runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixSpacing;

static SPACE_BEFORE_PUNCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+([.,!?;:])").expect("SPACE_BEFORE_PUNCT regex should compile")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("WHITESPACE_RUN regex should compile"));

impl OutputFilter for FixSpacing {
    fn apply(&self, text: &str) -> String {
        let collapsed = WHITESPACE_RUN.replace_all(text.trim(), " ");
        SPACE_BEFORE_PUNCT
            .replace_all(&collapsed, "$1")
            .into_owned()
    }
}

/// Filters applied in insertion order.
#[derive(Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn OutputFilter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spacing fix followed by sentence capitalization.
    pub fn standard() -> Self {
        Self::new().with(FixSpacing).with(Capitalize)
    }

    pub fn with(mut self, filter: impl OutputFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl OutputFilter for FilterPipeline {
    fn apply(&self, text: &str) -> String {
        self.filters
            .iter()
            .fold(text.to_string(), |acc, filter| filter.apply(&acc))
    }
}
