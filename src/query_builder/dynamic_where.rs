//! Dynamic predicates from method names.
//!
//! `whereNameAndAgeOrEmail` reads as three equality predicates on `name`,
//! `age` and `email`, the second joined with AND and the third with OR. The
//! name is parsed by a small fixed grammar:
//!
//! ```text
//! method    := "where" segment (connector segment)*
//! connector := ("And" | "Or") followed by an uppercase letter
//! segment   := one or more characters, none starting a connector
//! ```
//!
//! A connector token only splits when the next character opens a new
//! capitalised segment, so `whereOrderId` is the single column `order_id`
//! and `whereBrandAndModel` is `brand` AND `model`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{anychar, satisfy},
    combinator::{all_consuming, not, peek, recognize, value},
    multi::{many0, many1},
    sequence::{pair, preceded, terminated},
    IResult, Parser,
};
use serde_json::Value;

use super::{errors::QueryBuilderError, operand::Boolean, Builder, Result};

const PREFIX: &str = "where";

/// One column of a dynamic predicate.
#[derive(Debug, PartialEq, Clone)]
pub struct DynamicSegment {
    pub column: String,
    pub boolean: Boolean,
}

fn connector(input: &str) -> IResult<&str, Boolean> {
    terminated(
        alt((value(Boolean::And, tag("And")), value(Boolean::Or, tag("Or")))),
        peek(satisfy(|c: char| c.is_ascii_uppercase())),
    )
    .parse(input)
}

fn segment(input: &str) -> IResult<&str, &str> {
    recognize(many1(preceded(not(connector), anychar))).parse(input)
}

fn segments(input: &str) -> IResult<&str, (&str, Vec<(Boolean, &str)>)> {
    all_consuming(pair(segment, many0(pair(connector, segment)))).parse(input)
}

/// `FirstName` → `first_name`.
pub fn snake_case(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len() + 4);
    for (i, c) in segment.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn is_dynamic_where(method: &str) -> bool {
    method
        .strip_prefix(PREFIX)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

/// Splits a dynamic method name into its columns and connectors.
pub fn parse_dynamic_where(method: &str) -> Result<Vec<DynamicSegment>> {
    let unsupported = || QueryBuilderError::UnsupportedOperation(method.to_string());
    if !is_dynamic_where(method) {
        return Err(unsupported());
    }
    let finder = &method[PREFIX.len()..];
    let (_, (first, rest)) = segments(finder).map_err(|_| unsupported())?;

    let mut parsed = vec![DynamicSegment {
        column: snake_case(first),
        boolean: Boolean::And,
    }];
    parsed.extend(rest.into_iter().map(|(boolean, segment)| DynamicSegment {
        column: snake_case(segment),
        boolean,
    }));
    Ok(parsed)
}

impl Builder {
    /// Applies a dynamic predicate such as `whereNameAndAge`, consuming one
    /// positional argument per column.
    pub fn dynamic_where(self, method: &str, args: Vec<Value>) -> Result<Self> {
        let segments = parse_dynamic_where(method)?;
        if args.len() < segments.len() {
            return Err(QueryBuilderError::DynamicArgumentCount {
                method: method.to_string(),
                expected: segments.len(),
                given: args.len(),
            });
        }
        log::trace!("dynamic predicate {} → {:?}", method, segments);

        let mut query = self;
        for (segment, arg) in segments.into_iter().zip(args) {
            query = query.add_where(&segment.column, Some("="), arg.into(), segment.boolean)?;
        }
        Ok(query)
    }
}
