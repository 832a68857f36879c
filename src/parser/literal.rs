//! Literal values accepted as directive arguments.
//!
//! The grammar is deliberately small: strings, integers, floats, booleans,
//! none, and (possibly nested) lists of those. Nothing is ever evaluated.
//!
//! | Literal          | Accepted spellings                         |
//! |------------------|--------------------------------------------|
//! | string           | `'text'`, `"text"` with backslash escapes  |
//! | integer          | `42`, `-7`, `+3`                           |
//! | float            | `1.5`, `-0.25`, `1e3`, `.5`                 |
//! | boolean          | `True`, `False`, `true`, `false`           |
//! | none             | `None`, `none`                             |
//! | list             | `[literal, literal, ...]` (trailing comma ok) |
//!
//! Adjacent strings concatenate (`'a' 'b'` is `'ab'`) and a literal may be
//! wrapped in parentheses (`(5)`).
//!
//! Malformed literal text (`[1 2]`, `[1,,2]`, `12abc`) fails with
//! [`nom::Err::Failure`] carrying a context message, so callers can tell it
//! apart from well-formed expressions that are simply not literals.
//!
//! Lowercase booleans and `none` are accepted because invocations live in
//! template files whose own literal syntax uses those spellings.
//!
//! # Display
//!
//! [`Literal`]'s [`Display`](std::fmt::Display) implementation produces the
//! template language's *repr* form (`['a', 'b']`, `None`, `True`), which is the
//! form used inside signatures. [`Literal::to_plain_string`] produces the
//! *str* form (strings unquoted) used for top-level signature fields.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{map, not, opt, recognize, value},
    error::{ErrorKind, ParseError, VerboseError, VerboseErrorKind, context},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
};
use serde::Serialize;
use std::fmt;

/// A literal argument value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    /// `None` / `none`
    None,
    /// `True` / `False`
    Bool(bool),
    /// Integer literal that fits in an `i64`
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// Quoted string, escapes resolved
    Str(String),
    /// Ordered list of literals
    List(Vec<Literal>),
}

impl Literal {
    /// Whether the value counts as "false" in the template language.
    ///
    /// Falsy values render as the empty string in signatures.
    #[must_use]
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::None => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Float(f) => *f == 0.0,
            Self::Str(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    /// Borrow the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable name of the literal kind, for error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
        }
    }

    /// The *str* form: strings unquoted, everything else as [`Display`](fmt::Display).
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => f.write_str(&format_float(*x)),
            Self::Str(s) => f.write_str(&quote_string(s)),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Quote a string the way the template language's repr does.
///
/// Single quotes are preferred; double quotes are used when the text contains
/// a single quote but no double quote.
fn quote_string(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Shortest round-trip float formatting with the template language's conventions.
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // `{:e}` gives e.g. "1e16" / "1.5e-7"; normalise the exponent to "e+16" / "e-07"
        let formatted = format!("{x:e}");
        if let Some((mantissa, exponent)) = formatted.split_once('e') {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exponent),
            };
            return format!("{mantissa}e{sign}{digits:0>2}");
        }
        return formatted;
    }

    let formatted = format!("{x}");
    if formatted.contains('.') { formatted } else { format!("{formatted}.0") }
}

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Failure reason for an integer that does not fit in an `i64`.
pub(crate) const INTEGER_OUT_OF_RANGE: &str = "integer out of range";
const MALFORMED_NUMBER: &str = "malformed number literal";
const MALFORMED_LIST: &str = "expected `,` or `]` in list";
const UNTERMINATED_STRING: &str = "unterminated string literal";

/// Parse one literal at the start of `input`.
///
/// Leading whitespace is not skipped; trailing input is returned untouched.
pub(crate) fn literal(input: &str) -> Res<'_, Literal> {
    alt((
        context("list", list_literal),
        context("parenthesized", paren_literal),
        context("string", map(string_literal, Literal::Str)),
        context("constant", keyword_literal),
        context("number", number_literal),
    ))(input)
}

/// The innermost context message of a literal failure.
pub(crate) fn failure_reason(err: &VerboseError<&str>) -> &'static str {
    err.errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(reason) => Some(*reason),
            _ => None,
        })
        .unwrap_or("malformed literal")
}

/// Whether `rest`, the text following a literal, continues a well-formed
/// expression (`+ 1`, `.upper()`, `if x else y`) rather than breaking syntax.
///
/// `after_item` is true when `rest` directly follows a value, where another
/// bare name can only be an operator keyword.
pub(crate) fn continues_expression(rest: &str, after_item: bool) -> bool {
    const OPERATOR_WORDS: [&str; 7] = ["if", "for", "and", "or", "not", "in", "is"];

    match rest.chars().next() {
        Some(c) if "+-*/%@&|^<>=!~.([".contains(c) => true,
        Some(c) if c.is_alphabetic() || c == '_' => {
            let word: String = rest.chars().take_while(|c| is_ident_char(*c)).collect();
            !after_item || OPERATOR_WORDS.contains(&word.as_str())
        }
        _ => false,
    }
}

fn failure<'a>(input: &'a str, reason: &'static str) -> nom::Err<VerboseError<&'a str>> {
    nom::Err::Failure(VerboseError {
        errors: vec![(input, VerboseErrorKind::Context(reason))],
    })
}

fn list_literal(input: &str) -> Res<'_, Literal> {
    let (input, _) = pair(char('['), multispace0)(input)?;
    let (input, items) =
        separated_list0(tuple((multispace0, char(','), multispace0)), literal)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, comma) = opt(pair(char(','), multispace0))(input)?;

    if let Ok((input, _)) = char::<_, VerboseError<&str>>(']')(input) {
        if items.is_empty() && comma.is_some() {
            return Err(failure(input, MALFORMED_LIST));
        }
        return Ok((input, Literal::List(items)));
    }

    let after_item = !items.is_empty() && comma.is_none();
    if (items.is_empty() && comma.is_some()) || !continues_expression(input, after_item) {
        return Err(failure(input, MALFORMED_LIST));
    }
    Err(nom::Err::Error(VerboseError::from_error_kind(input, ErrorKind::Char)))
}

fn paren_literal(input: &str) -> Res<'_, Literal> {
    delimited(pair(char('('), multispace0), literal, pair(multispace0, char(')')))(input)
}

/// One or more adjacent quoted strings, concatenated.
fn string_literal(input: &str) -> Res<'_, String> {
    let (input, first) = quoted_string(input)?;
    let (input, more) = many0(preceded(multispace0, quoted_string))(input)?;
    Ok((input, more.into_iter().fold(first, |acc, s| acc + &s)))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword_literal(input: &str) -> Res<'_, Literal> {
    terminated(
        alt((
            value(Literal::Bool(true), alt((tag("True"), tag("true")))),
            value(Literal::Bool(false), alt((tag("False"), tag("false")))),
            value(Literal::None, alt((tag("None"), tag("none")))),
        )),
        not(satisfy(is_ident_char)),
    )(input)
}

fn number_literal(input: &str) -> Res<'_, Literal> {
    let exponent = tuple((one_of("eE"), opt(one_of("+-")), digit1));
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(tuple((digit1, opt(pair(char('.'), digit0))))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(exponent),
    )))(input)?;

    // `1.2.3`, `12abc`: the token keeps going past a complete number
    if rest.starts_with(|c: char| is_ident_char(c) || c == '.') {
        return Err(failure(input, MALFORMED_NUMBER));
    }

    let value = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().map(Literal::Float).map_err(|_| failure(input, MALFORMED_NUMBER))?
    } else {
        text.parse::<i64>().map(Literal::Int).map_err(|_| failure(input, INTEGER_OUT_OF_RANGE))?
    };
    Ok((rest, value))
}

/// Parse a single- or double-quoted string with backslash escapes.
///
/// Known escapes (`\\`, `\'`, `\"`, `\n`, `\r`, `\t`) are resolved; any other
/// escape is kept verbatim, backslash included.
fn quoted_string(input: &str) -> Res<'_, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q @ ('\'' | '"'))) => q,
        _ => {
            return Err(nom::Err::Error(VerboseError::from_error_kind(input, ErrorKind::Char)));
        }
    };

    let mut out = String::new();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, e @ ('\\' | '\'' | '"'))) => out.push(e),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            c if c == quote => return Ok((&input[i + c.len_utf8()..], out)),
            c => out.push(c),
        }
    }

    Err(failure(input, UNTERMINATED_STRING))
}
