//! Metric queries, signatures and invocations.
//!
//! A parsed directive call becomes a [`MetricQuery`]: the fixed set of fields
//! the renderer understands. The query's [`Signature`] is the canonical string
//! the host template looks its variable up by, so its format is a contract:
//!
//! ```text
//! metrics=['revenue'],dimensions=,group_by=['region'],limit=,time_start=,time_end=,where=,order_by=
//! ```
//!
//! Fields appear in that fixed order. A field that is absent or falsy renders
//! as the empty string (never `None`); lists and quoted values use the template
//! language's repr, top-level strings are written raw.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::{MaterializeError, Result};
use crate::parser::{self, Literal};

/// Field names in signature order.
pub const QUERY_FIELDS: [&str; 8] =
    ["metrics", "dimensions", "group_by", "limit", "time_start", "time_end", "where", "order_by"];

/// Structured parameters of one materialized metric query.
///
/// Values are kept as the literals written in the invocation so the signature
/// reproduces exactly what the template computes on its side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricQuery {
    /// Metric names (list of strings, or a single string)
    pub metrics: Option<Literal>,
    /// Dimension names
    pub dimensions: Option<Literal>,
    /// Group-by names
    pub group_by: Option<Literal>,
    /// Row limit
    pub limit: Option<Literal>,
    /// Inclusive start of the time constraint
    pub time_start: Option<Literal>,
    /// End of the time constraint
    pub time_end: Option<Literal>,
    /// Filter expression
    #[serde(rename = "where")]
    pub where_clause: Option<Literal>,
    /// Order-by names
    pub order_by: Option<Literal>,
}

impl MetricQuery {
    /// Build a query from parsed keyword arguments.
    ///
    /// `text` is the invocation text, used for error messages only.
    ///
    /// # Errors
    ///
    /// [`MaterializeError::InvalidArguments`] when `metrics` is missing or
    /// empty, a keyword is unknown, or a field holds the wrong kind of literal.
    pub fn from_arguments(text: &str, arguments: &BTreeMap<String, Literal>) -> Result<Self> {
        let invalid = |reason: String| MaterializeError::InvalidArguments {
            text: text.to_string(),
            reason,
        };

        let mut query = Self::default();
        for (name, value) in arguments {
            let slot = match name.as_str() {
                "metrics" => &mut query.metrics,
                "dimensions" => &mut query.dimensions,
                "group_by" => &mut query.group_by,
                "limit" => &mut query.limit,
                "time_start" => &mut query.time_start,
                "time_end" => &mut query.time_end,
                "where" => &mut query.where_clause,
                "order_by" => &mut query.order_by,
                other => return Err(invalid(format!("unexpected keyword argument '{other}'"))),
            };
            check_field_kind(name, value).map_err(invalid)?;
            *slot = Some(value.clone());
        }

        if query.metric_names().is_empty() {
            return Err(invalid("at least one metric is required in 'metrics'".to_string()));
        }

        Ok(query)
    }

    /// Metric names referenced by this query.
    #[must_use]
    pub fn metric_names(&self) -> Vec<&str> {
        string_items(self.metrics.as_ref())
    }

    /// Row limit, if one was given.
    #[must_use]
    pub fn limit_value(&self) -> Option<i64> {
        match self.limit {
            Some(Literal::Int(n)) => Some(n),
            _ => None,
        }
    }

    /// The canonical signature of this query.
    #[must_use]
    pub fn signature(&self) -> Signature {
        let fields = [
            &self.metrics,
            &self.dimensions,
            &self.group_by,
            &self.limit,
            &self.time_start,
            &self.time_end,
            &self.where_clause,
            &self.order_by,
        ];

        let rendered: Vec<String> = QUERY_FIELDS
            .iter()
            .zip(fields)
            .map(|(name, value)| {
                let value = match value {
                    Some(v) if !v.is_falsy() => v.to_plain_string(),
                    _ => String::new(),
                };
                format!("{name}={value}")
            })
            .collect();

        Signature(rendered.join(","))
    }
}

fn string_items(value: Option<&Literal>) -> Vec<&str> {
    match value {
        Some(Literal::Str(s)) => vec![s.as_str()],
        Some(Literal::List(items)) => items.iter().filter_map(Literal::as_str).collect(),
        _ => Vec::new(),
    }
}

fn check_field_kind(name: &str, value: &Literal) -> std::result::Result<(), String> {
    let ok = match (name, value) {
        (_, Literal::None) => true,
        ("metrics" | "dimensions" | "group_by" | "order_by", Literal::Str(_)) => true,
        ("metrics" | "dimensions" | "group_by" | "order_by", Literal::List(items)) => {
            items.iter().all(|i| matches!(i, Literal::Str(_)))
        }
        ("limit", Literal::Int(n)) => *n >= 0,
        ("time_start" | "time_end" | "where", Literal::Str(_)) => true,
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        let expected = match name {
            "limit" => "a non-negative integer",
            "time_start" | "time_end" | "where" => "a string",
            _ => "a list of strings",
        };
        Err(format!("'{name}' must be {expected}, got {} `{value}`", value.kind_name()))
    }
}

/// Canonical string derived from a query's parameters.
///
/// Used as the externally visible variable key and as half of the cache key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// The signature text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-canonical signature string, as read back from storage.
    #[must_use]
    pub fn from_canonical(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Signature> for String {
    fn from(sig: Signature) -> Self {
        sig.0
    }
}

/// One directive call found in a consumer node.
///
/// Immutable once parsed; lives for a single orchestration pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Id of the consuming node
    pub node_id: String,
    /// Extracted call text, whitespace preserved
    pub raw_text: String,
    /// Literal keyword arguments
    pub parameters: BTreeMap<String, Literal>,
    /// Structured query built from the parameters
    pub query: MetricQuery,
}

impl Invocation {
    /// Parse `raw_text` into an invocation owned by `node_id`.
    ///
    /// # Errors
    ///
    /// Propagates [`MaterializeError::Syntax`], [`MaterializeError::Parse`] and
    /// [`MaterializeError::InvalidArguments`] unwrapped; the orchestrator adds
    /// node context.
    pub fn parse(node_id: &str, raw_text: &str) -> Result<Self> {
        let call = parser::parse_call(raw_text)?;
        let query = MetricQuery::from_arguments(raw_text, &call.arguments)?;
        Ok(Self {
            node_id: node_id.to_string(),
            raw_text: raw_text.to_string(),
            parameters: call.arguments,
            query,
        })
    }

    /// Signature of this invocation's query.
    #[must_use]
    pub fn signature(&self) -> Signature {
        self.query.signature()
    }
}
