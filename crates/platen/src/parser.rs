// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Node tree builder.
//!
//! Consumes [`Scanner`] tokens and builds a [`Document`] by recursive
//! descent. Each block (`if`, `elif`, `else`, `for`, `def`) keeps requesting
//! the next [`Step`] and appends nodes to its body until a terminator shows
//! up. Reaching the end of input inside a block is a structural error that
//! points at the block's opening directive.
//!
//! Directives are classified by a leading keyword matched as a whole word
//! (`if elif else for exec def call end`). Anything else is an
//! interpolation. Expression bodies are not compiled here; they are kept as
//! source text for the runtime to compile through the cache.

use crate::ast::{Alternate, Call, Conditional, Directive, Document, Function, Loop, Node};
use crate::error::{PlatenError, Result};
use crate::scanner::{RawDirective, Scanner, Token};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref KEYWORD: Regex =
        Regex::new(r"^(?s)(if|elif|else|for|exec|def|call|end)\b\s*(.*)$").unwrap();
    static ref FOR_LOOP: Regex = Regex::new(r"^(?s)(.+?)\s+in\b\s*(.+)$").unwrap();
    static ref SIGNATURE: Regex = Regex::new(r"^(?s)([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)$").unwrap();
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Parses template source into a node tree.
pub fn parse(source: &str) -> Result<Document> {
    let mut parser = Parser {
        scanner: Scanner::new(source),
        document: Document::default(),
    };
    parser.top_level()?;
    tracing::debug!(
        nodes = parser.document.body.len(),
        functions = parser.document.functions.len(),
        "parsed template"
    );
    Ok(parser.document)
}

/// What the builder produced on one request.
enum Step<'s> {
    Node(Node),
    End(RawDirective<'s>),
    Elif(RawDirective<'s>, &'s str),
    Else(RawDirective<'s>),
    Exhausted,
}

/// How a block body was closed.
enum Terminator<'s> {
    End,
    Elif(RawDirective<'s>, &'s str),
    Else(RawDirective<'s>),
}

struct Parser<'s> {
    scanner: Scanner<'s>,
    document: Document,
}

impl<'s> Parser<'s> {
    fn top_level(&mut self) -> Result<()> {
        loop {
            match self.step()? {
                Step::Node(node) => self.document.body.push(node),
                Step::Exhausted => return Ok(()),
                Step::End(d) => return Err(unmatched(&d, "[[end]] without an open block")),
                Step::Elif(d, _) | Step::Else(d) => {
                    return Err(unmatched(&d, format!("[[{}]] without a matching [[if]]", d.text)))
                }
            }
        }
    }

    fn step(&mut self) -> Result<Step<'s>> {
        loop {
            let directive = match self.scanner.next() {
                None => return Ok(Step::Exhausted),
                Some(Token::Literal(text)) => return Ok(Step::Node(Node::Literal(text.to_string()))),
                Some(Token::Comment(_)) => return Ok(Step::Node(Node::Comment)),
                Some(Token::Directive(d)) => d,
            };

            let Some(caps) = KEYWORD.captures(directive.text) else {
                return Ok(Step::Node(Node::Interpolation(located(directive.text, &directive))));
            };
            let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
            let keyword = caps.get(1).map_or("", |m| m.as_str());

            return Ok(match keyword {
                "end" => {
                    no_argument(&directive, rest)?;
                    Step::End(directive)
                }
                "else" => {
                    no_argument(&directive, rest)?;
                    Step::Else(directive)
                }
                "elif" => Step::Elif(directive, required(&directive, rest, "condition")?),
                "if" => {
                    let condition = required(&directive, rest, "condition")?;
                    Step::Node(Node::Conditional(self.conditional(directive, condition)?))
                }
                "for" => Step::Node(Node::Loop(self.for_loop(directive, rest)?)),
                "exec" => {
                    let statement = required(&directive, rest, "statement")?;
                    Step::Node(Node::Statement(located(statement, &directive)))
                }
                "call" => Step::Node(Node::Call(call(&directive, rest)?)),
                "def" => {
                    self.define(directive, rest)?;
                    continue;
                }
                _ => Step::Node(Node::Interpolation(located(directive.text, &directive))),
            });
        }
    }

    /// Collects nodes until the block opened by `opener` is closed.
    fn block(&mut self, opener: &RawDirective<'s>, allow_alternate: bool) -> Result<(Vec<Node>, Terminator<'s>)> {
        let mut body = Vec::new();
        loop {
            match self.step()? {
                Step::Node(node) => body.push(node),
                Step::End(_) => return Ok((body, Terminator::End)),
                Step::Elif(d, condition) if allow_alternate => {
                    return Ok((body, Terminator::Elif(d, condition)))
                }
                Step::Else(d) if allow_alternate => return Ok((body, Terminator::Else(d))),
                Step::Elif(d, _) | Step::Else(d) => {
                    return Err(unmatched(
                        &d,
                        format!("[[{}]] is not allowed inside [[{}]]", d.text, opener.text),
                    ))
                }
                Step::Exhausted => {
                    return Err(unmatched(
                        opener,
                        format!("[[{}]] does not have a matching [[end]]", opener.text),
                    ))
                }
            }
        }
    }

    fn conditional(&mut self, opener: RawDirective<'s>, condition: &str) -> Result<Conditional> {
        let (body, terminator) = self.block(&opener, true)?;
        let alternate = match terminator {
            Terminator::End => None,
            Terminator::Elif(d, next) => Some(Alternate::Elif(Box::new(self.conditional(d, next)?))),
            Terminator::Else(d) => {
                let (body, _) = self.block(&d, false)?;
                Some(Alternate::Else(body))
            }
        };
        Ok(Conditional {
            condition: located(condition, &opener),
            body,
            alternate,
        })
    }

    fn for_loop(&mut self, opener: RawDirective<'s>, rest: &str) -> Result<Loop> {
        let caps = FOR_LOOP
            .captures(rest)
            .ok_or_else(|| syntax(&opener, "is not a valid for-loop expression"))?;
        let names = caps.get(1).map_or("", |m| m.as_str()).trim();
        let iterable = caps.get(2).map_or("", |m| m.as_str()).trim();

        let names = names
            .strip_prefix('(')
            .and_then(|n| n.strip_suffix(')'))
            .unwrap_or(names);
        let targets = identifiers(&opener, names)?;
        if targets.is_empty() {
            return Err(syntax(&opener, "has no loop variables"));
        }

        let (body, _) = self.block(&opener, false)?;
        Ok(Loop {
            targets,
            iterable: located(iterable, &opener),
            body,
        })
    }

    fn define(&mut self, opener: RawDirective<'s>, rest: &str) -> Result<()> {
        let caps = SIGNATURE
            .captures(rest)
            .ok_or_else(|| syntax(&opener, "is not a valid function definition"))?;
        let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let params = identifiers(&opener, caps.get(2).map_or("", |m| m.as_str()))?;

        let (body, _) = self.block(&opener, false)?;
        tracing::debug!(function = %name, params = params.len(), "defined template function");
        self.document.functions.insert(
            name.clone(),
            Function {
                name,
                params,
                body,
                line: opener.line,
            },
        );
        Ok(())
    }
}

fn call(directive: &RawDirective<'_>, rest: &str) -> Result<Call> {
    let caps = SIGNATURE
        .captures(rest)
        .ok_or_else(|| syntax(directive, "is not a valid function call"))?;
    let name = caps.get(1).map_or("", |m| m.as_str()).to_string();
    let args = caps.get(2).map_or("", |m| m.as_str()).trim();
    let args = if args.is_empty() {
        "()".to_string()
    } else if args.ends_with(',') {
        format!("({})", args)
    } else {
        format!("({},)", args)
    };
    Ok(Call {
        name,
        args: located(args, directive),
    })
}

/// Splits a comma separated list of identifiers; a trailing comma is allowed.
fn identifiers(directive: &RawDirective<'_>, list: &str) -> Result<Vec<String>> {
    let list = list.trim();
    let list = list.strip_suffix(',').unwrap_or(list);
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.split(',')
        .map(str::trim)
        .map(|name| {
            if IDENTIFIER.is_match(name) {
                Ok(name.to_string())
            } else {
                Err(syntax(directive, format!("`{}` is not a valid name", name)))
            }
        })
        .collect()
}

fn located(source: impl Into<String>, directive: &RawDirective<'_>) -> Directive {
    Directive::new(source, directive.line, directive.column)
}

fn required<'a>(directive: &RawDirective<'_>, rest: &'a str, what: &str) -> Result<&'a str> {
    if rest.is_empty() {
        Err(syntax(directive, format!("is missing its {}", what)))
    } else {
        Ok(rest)
    }
}

fn no_argument(directive: &RawDirective<'_>, rest: &str) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(syntax(directive, "takes no argument"))
    }
}

fn syntax(directive: &RawDirective<'_>, message: impl Into<String>) -> PlatenError {
    PlatenError::DirectiveSyntax {
        message: message.into(),
        directive: directive.text.to_string(),
        line: directive.line,
        column: directive.column,
        template: None,
        source_context: None,
    }
}

fn unmatched(directive: &RawDirective<'_>, message: impl Into<String>) -> PlatenError {
    PlatenError::StructuralParse {
        message: message.into(),
        directive: directive.text.to_string(),
        line: directive.line,
        column: directive.column,
        template: None,
        source_context: None,
    }
}
