//! Extraction of directive invocations from model source text.
//!
//! Model files embed calls such as
//! `{{ dbt_metric_utils_materialize(metrics=['revenue'], group_by=['region']) }}`
//! inside otherwise free-form SQL and template text. This module finds every
//! such call and returns the exact substring `name(...)`, matching nested
//! parentheses and skipping over quoted strings so that parentheses inside
//! `"{{ Dimension('x') }}"` never count as structure.
//!
//! # Matching Rules
//!
//! Inside the argument list the scanner accepts, in any order:
//! - runs of characters other than parentheses, quotes and backslash
//! - double-quoted strings with backslash escapes
//! - single-quoted strings with backslash escapes
//! - nested parenthesized groups (recursively, same rules)
//!
//! A candidate that runs off the end of the text, contains a stray backslash
//! outside a string, or leaves a quote unterminated produces no match; the
//! scanner then resumes at the next candidate. Extraction is total: it never
//! fails, it only yields fewer matches.
//!
//! # Usage
//!
//! ```rust
//! use metricmat::extract::CallExtractor;
//!
//! let extractor = CallExtractor::new("materialize");
//! let sql = r#"select * from {{ materialize(metrics=['m'], where="{{Dimension('d')}}=1") }}"#;
//!
//! let calls: Vec<&str> = extractor.extract(sql).map(|m| m.as_str()).collect();
//! assert_eq!(calls, vec![r#"materialize(metrics=['m'], where="{{Dimension('d')}}=1")"#]);
//! ```

use regex::Regex;

use crate::constants::DEFAULT_DIRECTIVE;

/// One extracted invocation, borrowed from the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallMatch<'t> {
    text: &'t str,
    start: usize,
    end: usize,
}

impl<'t> CallMatch<'t> {
    /// Byte offset where the directive name starts.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Byte offset one past the closing parenthesis.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// The raw invocation text, whitespace preserved.
    #[must_use]
    pub fn as_str(&self) -> &'t str {
        &self.text[self.start..self.end]
    }
}

/// Scanner for calls to a single directive name.
///
/// The extractor is immutable and cheap to clone; every call to
/// [`extract`](Self::extract) starts a fresh scan, so the same text always
/// yields the same ordered list.
#[derive(Debug, Clone)]
pub struct CallExtractor {
    directive: String,
    head: Regex,
}

impl CallExtractor {
    /// Build an extractor for `directive`.
    ///
    /// The name is matched literally at an identifier boundary and may be
    /// followed by whitespace before the opening parenthesis.
    #[must_use]
    pub fn new(directive: &str) -> Self {
        let pattern = format!(r"\b{}\s*\(", regex::escape(directive));
        // The pattern is built from an escaped literal, so it always compiles.
        let head = Regex::new(&pattern).unwrap_or_else(|_| unreachable!("escaped directive pattern"));
        Self {
            directive: directive.to_string(),
            head,
        }
    }

    /// The directive name this extractor scans for.
    #[must_use]
    pub fn directive(&self) -> &str {
        &self.directive
    }

    /// Lazily scan `text` for invocations, in source order.
    #[must_use]
    pub fn extract<'e, 't>(&'e self, text: &'t str) -> CallMatches<'e, 't> {
        CallMatches {
            extractor: self,
            text,
            pos: 0,
        }
    }
}

impl Default for CallExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_DIRECTIVE)
    }
}

/// Iterator over the invocations found in one text.
///
/// Matches never overlap: after a match the scan resumes past its closing
/// parenthesis, so a directive call nested inside another call's arguments is
/// part of the outer match only.
#[derive(Debug)]
pub struct CallMatches<'e, 't> {
    extractor: &'e CallExtractor,
    text: &'t str,
    pos: usize,
}

impl<'t> Iterator for CallMatches<'_, 't> {
    type Item = CallMatch<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos <= self.text.len() {
            let head = self.extractor.head.find_at(self.text, self.pos)?;
            match balanced_end(self.text, head.end()) {
                Some(end) => {
                    self.pos = end;
                    return Some(CallMatch {
                        text: self.text,
                        start: head.start(),
                        end,
                    });
                }
                None => {
                    // Resume right after this candidate's first character
                    self.pos = head.start() + next_char_len(self.text, head.start());
                }
            }
        }
        None
    }
}

/// Extract every invocation of `directive` in `text` as owned strings.
///
/// Convenience wrapper over [`CallExtractor::extract`].
#[must_use]
pub fn extract_calls(directive: &str, text: &str) -> Vec<String> {
    CallExtractor::new(directive).extract(text).map(|m| m.as_str().to_string()).collect()
}

/// Find the end of a parenthesized group whose opening `(` ends at `open_end`.
///
/// Returns the byte offset just past the matching `)`, or `None` when the
/// group is unterminated or contains a token the grammar does not allow.
fn balanced_end(text: &str, open_end: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = open_end;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => {
                depth += 1;
                i += 1;
            }
            b')' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            quote @ (b'"' | b'\'') => {
                i = quoted_end(bytes, i + 1, quote)?;
            }
            // A bare backslash is only legal inside a quoted string
            b'\\' => return None,
            _ => i += 1,
        }
    }

    None
}

/// Skip a quoted string whose body starts at `i`; returns the offset past the closing quote.
fn quoted_end(bytes: &[u8], mut i: usize, quote: u8) -> Option<usize> {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn next_char_len(text: &str, at: usize) -> usize {
    text[at..].chars().next().map_or(1, char::len_utf8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECTIVE: &str = "dbt_metric_utils_materialize";

    #[test]
    fn test_dimension_in_call() {
        let input_sql = r#"

    select * from {{ dbt_metric_utils_materialize(
      metrics=['metric']
      , where="{{Dimension('dim')}}=1"
    ) }}

    "#;

        let expected = r#"dbt_metric_utils_materialize(
      metrics=['metric']
      , where="{{Dimension('dim')}}=1"
    )"#;

        assert_eq!(extract_calls(DIRECTIVE, input_sql), vec![expected.to_string()]);
    }

    #[test]
    fn test_multiple_calls_in_source_order() {
        let input_sql = "
    select * from {{ dbt_metric_utils_materialize(
      metrics=['metric_1']
    ) }}

    select * from {{ dbt_metric_utils_materialize(
      metrics=['metric_2']
    ) }}
    ";

        let calls = extract_calls(DIRECTIVE, input_sql);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], "dbt_metric_utils_materialize(\n      metrics=['metric_1']\n    )");
        assert_eq!(calls[1], "dbt_metric_utils_materialize(\n      metrics=['metric_2']\n    )");
    }

    #[test]
    fn test_nested_parentheses_are_structural() {
        let text = "x m(a=(1, (2)), b=')') y";
        assert_eq!(extract_calls("m", text), vec!["m(a=(1, (2)), b=')')".to_string()]);
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let text = r#"m(where='it\'s (here)', other="say \"hi\")")"#;
        assert_eq!(extract_calls("m", text), vec![text.to_string()]);
    }

    #[test]
    fn test_unterminated_call_yields_nothing() {
        assert!(extract_calls("m", "select m(metrics=['a'] from t").is_empty());
        assert!(extract_calls("m", "m(where='open)").is_empty());
    }

    #[test]
    fn test_unterminated_candidate_does_not_hide_later_call() {
        let text = "m('open  m(metrics=['b'])";
        // The first candidate never closes its quote; the second is well formed
        // but sits inside that quote, so the scan recovers at the inner head.
        assert_eq!(extract_calls("m", text), vec!["m(metrics=['b'])".to_string()]);
    }

    #[test]
    fn test_backslash_outside_string_rejects_candidate() {
        assert!(extract_calls("m", r"m(a=\n)").is_empty());
    }

    #[test]
    fn test_whitespace_between_name_and_paren() {
        assert_eq!(extract_calls("m", "m  \n(a=1)"), vec!["m  \n(a=1)".to_string()]);
    }

    #[test]
    fn test_identifier_boundary() {
        assert!(extract_calls("m", "mm(a=1)").is_empty());
        assert!(extract_calls("materialize", "my_materialize(a=1)").is_empty());
    }

    #[test]
    fn test_nested_directive_is_part_of_outer_match() {
        let text = "m(a=m(b=1))";
        assert_eq!(extract_calls("m", text), vec![text.to_string()]);
    }

    #[test]
    fn test_extraction_is_restartable() {
        let extractor = CallExtractor::new("m");
        let text = "m(a=1) and m(b=2)";
        let first: Vec<_> = extractor.extract(text).map(|c| c.as_str()).collect();
        let second: Vec<_> = extractor.extract(text).map(|c| c.as_str()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["m(a=1)", "m(b=2)"]);
    }

    #[test]
    fn test_match_offsets() {
        let text = "ab m(x=1) cd";
        let found = CallExtractor::new("m").extract(text).next().unwrap();
        assert_eq!(found.start(), 3);
        assert_eq!(found.end(), 9);
        assert_eq!(&text[found.start()..found.end()], "m(x=1)");
    }

    #[test]
    fn test_non_ascii_content_is_preserved() {
        let text = "é m(where='ünïcode ✓') ✓";
        assert_eq!(extract_calls("m", text), vec!["m(where='ünïcode ✓')".to_string()]);
    }
}
