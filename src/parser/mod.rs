//! Parsing of extracted invocations into literal keyword arguments.
//!
//! Takes one call string produced by the [`extract`](crate::extract) module and
//! returns its keyword arguments as a name → [`Literal`] mapping. Nothing is
//! evaluated: an argument is either a literal or the call is rejected.
//!
//! # Error Classification
//!
//! - [`MaterializeError::Syntax`]: the text is not a call expression at all:
//!   missing callee or parentheses, unbalanced brackets or quotes, empty
//!   arguments (`f(a=1,,b=2)`), trailing text after the closing parenthesis,
//!   repeated keywords, malformed literals (`1.2.3`, `12abc`, `[1 2]`,
//!   `[1,,2]`).
//! - [`MaterializeError::Parse`]: the call is well formed but an argument is
//!   not a literal (identifier, arithmetic, nested call), is an integer that
//!   does not fit in 64 bits, or is positional.
//!
//! # Example
//!
//! ```rust
//! use metricmat::parser::{parse_call, Literal};
//!
//! let call = parse_call("materialize(metrics=['m1', 'm2'], limit=5)").unwrap();
//! assert_eq!(call.callee, "materialize");
//! assert_eq!(call.arguments["limit"], Literal::Int(5));
//! ```

pub mod literal;

pub use literal::Literal;

use nom::{
    IResult,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{not, recognize},
    error::VerboseError,
    multi::many0,
    sequence::{pair, preceded, terminated, tuple},
};
use std::collections::BTreeMap;

use crate::core::{MaterializeError, Result};

/// A parsed invocation: callee name plus keyword arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    /// Dotted callee name as written (`materialize`, `pkg.materialize`)
    pub callee: String,
    /// Keyword arguments, sorted by name
    pub arguments: BTreeMap<String, Literal>,
}

/// Parse a call expression whose arguments are all literal keyword arguments.
///
/// # Errors
///
/// Returns [`MaterializeError::Syntax`] for text that is not a valid call and
/// [`MaterializeError::Parse`] for non-literal or positional arguments. The
/// `text` of the error is the offending argument, or the whole call for
/// structural problems.
pub fn parse_call(text: &str) -> Result<ParsedCall> {
    let (after_head, callee) = call_head(text).map_err(|_| syntax(text, "expected `name(`"))?;
    let (segments, rest) = split_arguments(text, after_head)?;

    if !rest.trim().is_empty() {
        return Err(syntax(text, &format!("unexpected text after call: `{}`", rest.trim())));
    }

    let mut arguments = BTreeMap::new();
    let last = segments.len().saturating_sub(1);
    for (i, segment) in segments.iter().enumerate() {
        if segment.trim().is_empty() {
            // A single trailing comma leaves an empty last segment; f() has one empty segment
            if i == last && (i > 0 || segments.len() == 1) {
                continue;
            }
            return Err(syntax(text, "empty argument"));
        }

        let (name, value) = parse_argument(segment)?;
        if arguments.insert(name.clone(), value).is_some() {
            return Err(syntax(text, &format!("keyword argument repeated: {name}")));
        }
    }

    Ok(ParsedCall {
        callee: callee.to_string(),
        arguments,
    })
}

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        nom::bytes::complete::take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// `ws name(.name)* ws (`, returning the input after the opening parenthesis.
fn call_head(input: &str) -> Res<'_, &str> {
    let (input, _) = multispace0(input)?;
    let (input, callee) = recognize(pair(identifier, many0(preceded(char('.'), identifier))))(input)?;
    let (input, _) = tuple((multispace0, char('(')))(input)?;
    Ok((input, callee))
}

/// `ws name ws =` (but not `==`), returning the keyword.
fn keyword(input: &str) -> Res<'_, &str> {
    let (input, _) = multispace0(input)?;
    terminated(identifier, tuple((multispace0, char('='), not(char('=')))))(input)
}

/// Split the argument list at top-level commas.
///
/// `body` starts right after the opening parenthesis. Returns the raw argument
/// segments and the text following the closing parenthesis.
fn split_arguments<'a>(call: &str, body: &'a str) -> Result<(Vec<&'a str>, &'a str)> {
    let mut closers: Vec<char> = vec![')'];
    let mut segments = Vec::new();
    let mut seg_start = 0;
    let mut chars = body.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '(' => closers.push(')'),
            '[' => closers.push(']'),
            '{' => closers.push('}'),
            ')' | ']' | '}' => {
                if closers.pop() != Some(c) {
                    return Err(syntax(call, &format!("unbalanced `{c}`")));
                }
                if closers.is_empty() {
                    segments.push(&body[seg_start..i]);
                    return Ok((segments, &body[i + 1..]));
                }
            }
            ',' if closers.len() == 1 => {
                segments.push(&body[seg_start..i]);
                seg_start = i + 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut closed = false;
                while let Some((_, s)) = chars.next() {
                    if s == '\\' {
                        chars.next();
                    } else if s == quote {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(syntax(call, "unterminated string literal"));
                }
            }
            _ => {}
        }
    }

    Err(syntax(call, "missing closing parenthesis"))
}

/// Parse one `name=literal` segment.
fn parse_argument(segment: &str) -> Result<(String, Literal)> {
    let arg_text = segment.trim();
    let Ok((value_text, name)) = keyword(segment) else {
        return Err(MaterializeError::Parse {
            text: arg_text.to_string(),
            reason: "positional arguments are not supported, use name=value".to_string(),
        });
    };

    let value_text = value_text.trim();
    if value_text.is_empty() {
        return Err(syntax(arg_text, "missing value after `=`"));
    }

    match literal::literal(value_text) {
        Ok((rest, value)) if rest.trim().is_empty() => Ok((name.to_string(), value)),
        Ok((rest, _)) if !literal::continues_expression(rest.trim_start(), true) => {
            Err(syntax(arg_text, &format!("unexpected `{}` after literal", rest.trim())))
        }
        Err(nom::Err::Failure(e)) => {
            let reason = literal::failure_reason(&e);
            if reason == literal::INTEGER_OUT_OF_RANGE {
                Err(MaterializeError::Parse {
                    text: arg_text.to_string(),
                    reason: format!("{reason}: `{value_text}`"),
                })
            } else {
                Err(syntax(arg_text, &format!("{reason}: `{value_text}`")))
            }
        }
        _ => Err(MaterializeError::Parse {
            text: arg_text.to_string(),
            reason: format!("`{value_text}` is not a literal expression"),
        }),
    }
}

fn syntax(text: &str, reason: &str) -> MaterializeError {
    MaterializeError::Syntax {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}
