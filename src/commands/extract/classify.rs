use anyhow::{Context, Result};
use regex::Regex;

/// Semantic class of a single token or whole line. Classification is total:
/// every token receives exactly one tag, with `Label` as the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Tag {
    Currency,
    CountList,
    Identifier,
    Percent,
    DateLike,
    Label,
}

#[derive(Debug)]
pub(crate) struct Classifier {
    dollar_lead: Regex,
    grouped_amount: Regex,
    percent: Regex,
    form_code: Regex,
    numeric_code: Regex,
    date_like: Regex,
}

impl Classifier {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            dollar_lead: Regex::new(r"^\$\s*\d")
                .context("failed to compile dollar-lead regex")?,
            grouped_amount: Regex::new(r"^\$?\d{1,3}(?:,\d{3})*(?:\.\d+)?$")
                .context("failed to compile grouped-amount regex")?,
            percent: Regex::new(r"^\d+(?:\.\d+)?%$").context("failed to compile percent regex")?,
            form_code: Regex::new(r"^[A-Za-z]{2}\d{4}$")
                .context("failed to compile form-code regex")?,
            numeric_code: Regex::new(r"^\d{4,5}$")
                .context("failed to compile numeric-code regex")?,
            date_like: Regex::new(r"^\d{1,4}(?:[/-]\d{1,4}){1,2}$")
                .context("failed to compile date-like regex")?,
        })
    }

    /// Tags one token. The rule order is the tie-break policy: an explicit
    /// currency mark wins outright; the count-list shape (every comma group
    /// 1-2 digits) beats the grouped-thousands shape, which always carries
    /// 3-digit groups after the first; percent, code, and date shapes follow;
    /// anything else is free text.
    pub(crate) fn classify(&self, token: &str) -> Tag {
        let token = token.trim();
        if token.is_empty() {
            return Tag::Label;
        }

        if self.dollar_lead.is_match(token) {
            return Tag::Currency;
        }
        if is_count_list(token) {
            return Tag::CountList;
        }
        if self.grouped_amount.is_match(token) {
            return Tag::Currency;
        }
        if self.percent.is_match(token) {
            return Tag::Percent;
        }
        if self.form_code.is_match(token) || self.numeric_code.is_match(token) {
            return Tag::Identifier;
        }
        if self.date_like.is_match(token) {
            return Tag::DateLike;
        }

        Tag::Label
    }
}

/// A covered-item list is comma-separated 1-2 digit numbers ("7, 8"), never
/// the 3-digit groups of a monetary figure ("8,818").
pub(crate) fn is_count_list(token: &str) -> bool {
    let mut elements = 0usize;
    for part in token.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if part.len() > 2 || !part.chars().all(|ch| ch.is_ascii_digit()) {
            return false;
        }
        elements += 1;
    }

    elements > 0
}
