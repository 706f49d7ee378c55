//! `TRIGGER` clause of a grouped query
//!
//! ```sql
//! SELECT ... GROUP BY ... TRIGGER COUNTING 100, DELAY INTERVAL '5' SECOND, ON WATERMARK
//! ```
//!
//! sqlparser has no grammar for it, so the clause is cut out of the token
//! stream of the outermost query before the rest is parsed.

use super::expr::ExprBuilder;
use crate::error::{PlanError, PlanResult};
use crate::logical::{LogicalNode, LogicalTrigger};
use crate::registry::Catalog;
use sqlparser::ast::{Expr, Value as SqlValue};
use sqlparser::dialect::Dialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

/// Statement tokens with the top-level `TRIGGER` clause removed, plus the
/// clause split into its comma-separated items.
pub(super) struct SplitStatement {
    pub tokens: Vec<Token>,
    pub triggers: Option<Vec<Vec<Token>>>,
}

/// Cut the `TRIGGER` clause out of a token stream.
///
/// The clause starts at a `TRIGGER` keyword outside any parentheses and ends
/// before `ORDER`, `LIMIT`, `OFFSET`, `FETCH`, `;`, or the end of input.
pub(super) fn split_trigger_clause(tokens: Vec<Token>) -> SplitStatement {
    let mut depth = 0usize;
    let mut start = None;
    let mut end = tokens.len();
    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Word(word) if depth == 0 => match (start, word.keyword) {
                (None, Keyword::TRIGGER) => start = Some(index),
                (Some(_), Keyword::ORDER | Keyword::LIMIT | Keyword::OFFSET | Keyword::FETCH) => {
                    end = index;
                    break;
                }
                _ => {}
            },
            Token::SemiColon if depth == 0 && start.is_some() => {
                end = index;
                break;
            }
            _ => {}
        }
    }

    let Some(start) = start else {
        return SplitStatement {
            tokens,
            triggers: None,
        };
    };
    let mut tokens = tokens;
    let clause: Vec<Token> = tokens.drain(start..end).skip(1).collect();
    SplitStatement {
        tokens,
        triggers: Some(split_items(clause)),
    }
}

/// Split on top-level commas, dropping whitespace
fn split_items(clause: Vec<Token>) -> Vec<Vec<Token>> {
    let mut items = vec![Vec::new()];
    let mut depth = 0usize;
    for token in clause {
        match &token {
            Token::Whitespace(_) => continue,
            Token::Comma if depth == 0 => {
                items.push(Vec::new());
                continue;
            }
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            _ => {}
        }
        if let Some(current) = items.last_mut() {
            current.push(token);
        }
    }
    items
}

/// Build the logical triggers of a `TRIGGER` clause
pub(super) fn build_triggers(
    items: Vec<Vec<Token>>,
    dialect: &dyn Dialect,
    catalog: &Catalog,
) -> PlanResult<Vec<LogicalTrigger>> {
    items
        .into_iter()
        .map(|item| build_trigger(item, dialect, catalog))
        .collect()
}

fn build_trigger(
    item: Vec<Token>,
    dialect: &dyn Dialect,
    catalog: &Catalog,
) -> PlanResult<LogicalTrigger> {
    let words: Vec<String> = item
        .iter()
        .map(|token| match token {
            Token::Word(word) if word.quote_style.is_none() => word.value.to_uppercase(),
            other => other.to_string(),
        })
        .collect();
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    match words.as_slice() {
        ["ON", "WATERMARK"] => Ok(LogicalTrigger::Watermark),
        ["ON", "END", "OF", "STREAM"] => Ok(LogicalTrigger::EndOfStream),
        ["COUNTING", _, ..] => {
            let count = parse_argument(&item[1..], dialect)?;
            Ok(LogicalTrigger::Counting(constant_count(&count)?))
        }
        ["DELAY", _, ..] => {
            let delay = parse_argument(&item[1..], dialect)?;
            Ok(LogicalTrigger::Delay(ExprBuilder::new(catalog).build(&delay)?))
        }
        [] => Err(PlanError::SqlParse("empty item in TRIGGER clause".to_string())),
        _ => Err(PlanError::SqlParse(format!(
            "unknown trigger '{}'",
            words.join(" ")
        ))),
    }
}

/// Parse the tokens after a trigger keyword as one expression
fn parse_argument(tokens: &[Token], dialect: &dyn Dialect) -> PlanResult<Expr> {
    let mut parser = Parser::new(dialect).with_tokens(tokens.to_vec());
    let expr = parser
        .parse_expr()
        .map_err(|e| PlanError::SqlParse(e.to_string()))?;
    let next = parser.next_token();
    if next.token != Token::EOF {
        return Err(PlanError::SqlParse(format!(
            "unexpected '{}' in TRIGGER clause",
            next.token
        )));
    }
    Ok(expr)
}

/// `COUNTING` takes an integer literal
fn constant_count(count: &Expr) -> PlanResult<u64> {
    if let Expr::Value(value) = count {
        if let SqlValue::Number(number, _) = &value.value {
            return number.parse::<u64>().map_err(|_| {
                malformed("COUNTING", format!("count must be an integer, got {number}"))
            });
        }
    }
    Err(malformed(
        "COUNTING",
        format!("count must be an integer constant, got {count}"),
    ))
}

fn malformed(function: &str, message: String) -> PlanError {
    PlanError::MalformedArgument {
        function: function.to_string(),
        message,
    }
}

/// Attach triggers to the GroupBy of the outermost query
pub(super) fn attach_triggers(
    plan: LogicalNode,
    triggers: Vec<LogicalTrigger>,
) -> PlanResult<LogicalNode> {
    match plan {
        LogicalNode::With { ctes, source } => Ok(LogicalNode::With {
            ctes,
            source: Box::new(attach_triggers(*source, triggers)?),
        }),
        LogicalNode::Limit { source, limit } => Ok(LogicalNode::Limit {
            source: Box::new(attach_triggers(*source, triggers)?),
            limit,
        }),
        LogicalNode::Map { items, source } => Ok(LogicalNode::Map {
            items,
            source: Box::new(attach_triggers(*source, triggers)?),
        }),
        LogicalNode::GroupBy {
            source,
            key,
            aggregates,
            ..
        } => Ok(LogicalNode::GroupBy {
            source,
            key,
            aggregates,
            triggers,
        }),
        _ => Err(PlanError::UnsupportedConstruct {
            construct: "TRIGGER without GROUP BY".to_string(),
        }),
    }
}
