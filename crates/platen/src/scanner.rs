// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Directive scanner.
//!
//! Splits template source into literal spans and `[[ ... ]]` directives,
//! tracking the 1-based line and column where each directive starts.
//!
//! A directive ends at the first `]]` that is not inside nested square
//! brackets or a quoted string, so `[[for x in [1, 2]]]` and
//! `[[ 'a]]b' ]]` scan as single directives. Comments (`[[# ... #]]`) are
//! recognised before general scanning and end at the first closing `#]]`.
//! An opening `[[` that is never closed is literal text.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COMMENT: Regex = Regex::new(r"^(?s)\[\[\s*#.*?#\s*\]\]").unwrap();
}

const OPEN: &str = "[[";

/// A directive as found in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDirective<'s> {
    /// Inner text with delimiters and surrounding whitespace removed.
    pub text: &'s str,
    /// Line of the opening `[[`.
    pub line: usize,
    /// Column of the opening `[[`.
    pub column: usize,
}

/// One unit of scanner output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'s> {
    /// Text copied verbatim to the output.
    Literal(&'s str),
    /// A `[[# ... #]]` comment.
    Comment(RawDirective<'s>),
    /// Any other directive.
    Directive(RawDirective<'s>),
}

/// Cursor over template source.
#[derive(Debug, Clone)]
pub struct Scanner<'s> {
    rest: &'s str,
    line: usize,
    column: usize,
}

impl<'s> Scanner<'s> {
    /// Creates a scanner positioned at the start of `source`.
    pub fn new(source: &'s str) -> Self {
        Self {
            rest: source,
            line: 1,
            column: 1,
        }
    }

    /// Current line (1-based).
    pub fn line(&self) -> usize {
        self.line
    }

    fn eat(&mut self, len: usize) -> &'s str {
        let (consumed, rest) = self.rest.split_at(len);
        match consumed.rfind('\n') {
            Some(last) => {
                self.line += consumed.matches('\n').count();
                self.column = consumed[last + 1..].chars().count() + 1;
            }
            None => self.column += consumed.chars().count(),
        }
        self.rest = rest;
        consumed
    }
}

impl<'s> Iterator for Scanner<'s> {
    type Item = Token<'s>;

    fn next(&mut self) -> Option<Token<'s>> {
        if self.rest.is_empty() {
            return None;
        }

        let Some((start, len)) = find_directive(self.rest) else {
            return Some(Token::Literal(self.eat(self.rest.len())));
        };
        if start > 0 {
            return Some(Token::Literal(self.eat(start)));
        }

        let (line, column) = (self.line, self.column);
        let raw = self.eat(len);
        let comment = COMMENT.is_match(raw);
        let directive = RawDirective {
            text: raw[OPEN.len()..raw.len() - 2].trim(),
            line,
            column,
        };
        Some(if comment {
            Token::Comment(directive)
        } else {
            Token::Directive(directive)
        })
    }
}

/// Finds the first terminated directive; returns its offset and length.
fn find_directive(text: &str) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(offset) = text[from..].find(OPEN) {
        let start = from + offset;
        let candidate = &text[start..];
        if let Some(m) = COMMENT.find(candidate) {
            return Some((start, m.end()));
        }
        if let Some(len) = directive_len(candidate) {
            return Some((start, len));
        }
        from = start + OPEN.len();
    }
    None
}

/// Length of the directive at the start of `text`, including both
/// delimiters, or `None` when it is never closed.
fn directive_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = OPEN.len();

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'[' => depth += 1,
                b']' if depth == 0 && bytes.get(i + 1) == Some(&b']') => return Some(i + 2),
                b']' => depth = depth.saturating_sub(1),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        Scanner::new(source).collect()
    }

    fn directive(text: &str, line: usize, column: usize) -> RawDirective<'_> {
        RawDirective { text, line, column }
    }

    #[test]
    fn test_literal_only() {
        assert_eq!(tokens("plain text\n"), vec![Token::Literal("plain text\n")]);
        assert!(tokens("").is_empty());
    }

    #[test]
    fn test_directives_and_positions() {
        let toks = tokens("a [[ x ]]\n  [[if y]]b[[end]]");
        assert_eq!(
            toks,
            vec![
                Token::Literal("a "),
                Token::Directive(directive("x", 1, 3)),
                Token::Literal("\n  "),
                Token::Directive(directive("if y", 2, 3)),
                Token::Literal("b"),
                Token::Directive(directive("end", 2, 12)),
            ]
        );
    }

    #[test]
    fn test_nested_brackets_and_quotes() {
        assert_eq!(
            tokens("[[for x in [1,2,3]]][[x]]"),
            vec![
                Token::Directive(directive("for x in [1,2,3]", 1, 1)),
                Token::Directive(directive("x", 1, 21)),
            ]
        );
        assert_eq!(
            tokens("[[ 'a]]b' ]]"),
            vec![Token::Directive(directive("'a]]b'", 1, 1))]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            tokens("[[# it's ]] here #]]x"),
            vec![
                Token::Comment(directive("# it's ]] here #", 1, 1)),
                Token::Literal("x"),
            ]
        );
    }

    #[test]
    fn test_unterminated_open_is_literal() {
        assert_eq!(tokens("a [[ b"), vec![Token::Literal("a [[ b")]);
        assert_eq!(
            tokens("a [[ b [[c]]"),
            vec![
                Token::Literal("a [[ b "),
                Token::Directive(directive("c", 1, 8)),
            ]
        );
    }

    #[test]
    fn test_multiline_directive_advances_line() {
        let mut scanner = Scanner::new("[[ a +\n b ]]\n[[c]]");
        assert_eq!(scanner.next(), Some(Token::Directive(directive("a +\n b", 1, 1))));
        assert_eq!(scanner.next(), Some(Token::Literal("\n")));
        assert_eq!(scanner.next(), Some(Token::Directive(directive("c", 3, 1))));
        assert_eq!(scanner.line(), 3);
        assert_eq!(scanner.next(), None);
    }
}
