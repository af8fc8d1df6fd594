//! One instruction line of a `luac -l` listing.
//!
//! ```text
//! \t1\t[1]\tGETGLOBAL\t0 -1\t; print
//! \t2\t[-]\tSETTABUP \t0 -1 -2\t; _ENV "x" 1
//! ```
//!
//! The columns are the 1-based instruction index, the source line in
//! brackets (`[-]` when unknown), the mnemonic, one to three integer
//! operands, and an optional comment decoding constant and upvalue operands.

use crate::dialect::OpCode;
use crate::error::ListingError;
use serde::Serialize;

/// A parsed instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Instruction {
    /// 1-based position within its function.
    pub index: u32,
    /// Source line, 0 when the listing prints `[-]`.
    pub line: u32,
    pub op: OpCode,
    pub a: i32,
    pub b: Option<i32>,
    pub c: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Result of parsing a listing line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Line {
    Instruction(Instruction),
    /// Anything that is not an instruction: headers, section entries, blanks.
    Boundary,
}

/// A token of an instruction comment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommentToken {
    /// A quoted string constant, unescaped.
    Str(String),
    /// Anything else: names, numbers, `-`, `to`.
    Word(String),
}

impl Instruction {
    /// Parse one listing line. `line_no` is the 1-based position of the line
    /// in the listing and is only used for errors.
    ///
    /// A line that starts with an index followed by a `[` column is an
    /// instruction and must parse completely; any other line is a boundary.
    pub fn parse_line(text: &str, line_no: usize) -> Result<Line, ListingError> {
        let rest = text.trim_start();
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Ok(Line::Boundary);
        }
        let after_index = &rest[digits..];
        let after_ws = after_index.trim_start();
        if after_ws.len() == after_index.len() || !after_ws.starts_with('[') {
            return Ok(Line::Boundary);
        }

        let malformed = |message: &str| ListingError::Malformed {
            line: line_no,
            message: message.to_string(),
        };

        let index: u32 = rest[..digits]
            .parse()
            .map_err(|_| malformed("instruction index out of range"))?;
        let close = after_ws
            .find(']')
            .ok_or_else(|| malformed("unterminated source line column"))?;
        let line = match &after_ws[1..close] {
            "-" => 0,
            n => n
                .parse()
                .map_err(|_| malformed("source line is not a number"))?,
        };

        let (body, comment) = match after_ws[close + 1..].split_once(';') {
            Some((body, comment)) => (body, Some(comment.trim().to_string())),
            None => (&after_ws[close + 1..], None),
        };
        let mut fields = body.split_whitespace();
        let name = fields.next().ok_or_else(|| malformed("missing opcode"))?;
        let op = OpCode::from_name(name).ok_or_else(|| ListingError::UnknownOpcode {
            line: line_no,
            name: name.to_string(),
        })?;
        let operands = fields
            .map(|f| f.parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| malformed("operand is not an integer"))?;
        let (a, b, c) = match operands[..] {
            [a] => (a, None, None),
            [a, b] => (a, Some(b), None),
            [a, b, c] => (a, Some(b), Some(c)),
            _ => return Err(malformed("expected 1 to 3 operands")),
        };

        Ok(Line::Instruction(Instruction {
            index,
            line,
            op,
            a,
            b,
            c,
            comment: comment.filter(|c| !c.is_empty()),
        }))
    }

    pub fn comment_tokens(&self) -> Vec<CommentToken> {
        self.comment.as_deref().map(comment_tokens).unwrap_or_default()
    }

    /// The first comment token if it is a quoted string: the constant of a
    /// `LOADK`, or the key of a table access.
    pub fn string_constant(&self) -> Option<String> {
        match self.comment_tokens().into_iter().next()? {
            CommentToken::Str(s) => Some(s),
            CommentToken::Word(_) => None,
        }
    }

    /// The first comment token if it is a bare word: the upvalue name of a
    /// `GETUPVAL`/`SETUPVAL`.
    pub fn upvalue_name(&self) -> Option<String> {
        match self.comment_tokens().into_iter().next()? {
            CommentToken::Word(s) => Some(s),
            CommentToken::Str(_) => None,
        }
    }

    /// Target index of a jump (`; to N`).
    pub fn jump_target(&self) -> Option<u32> {
        let tokens = self.comment_tokens();
        match tokens.as_slice() {
            [CommentToken::Word(to), CommentToken::Word(n), ..] if to == "to" => n.parse().ok(),
            _ => None,
        }
    }
}

/// Split a comment into quoted strings and bare words.
pub fn comment_tokens(comment: &str) -> Vec<CommentToken> {
    let mut tokens = Vec::new();
    let mut chars = comment.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if ch == '"' {
            chars.next();
            let mut s = String::new();
            while let Some(ch) = chars.next() {
                match ch {
                    '"' => break,
                    '\\' => match chars.next() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some('a') => s.push('\u{7}'),
                        Some('b') => s.push('\u{8}'),
                        Some('f') => s.push('\u{c}'),
                        Some('v') => s.push('\u{b}'),
                        Some(d) if d.is_ascii_digit() => {
                            let mut code = d.to_digit(10).unwrap_or(0);
                            for _ in 0..2 {
                                match chars.peek().and_then(|c| c.to_digit(10)) {
                                    Some(digit) => {
                                        code = code * 10 + digit;
                                        chars.next();
                                    }
                                    None => break,
                                }
                            }
                            s.push(char::from_u32(code).unwrap_or('?'));
                        }
                        Some(other) => s.push(other),
                        None => break,
                    },
                    other => s.push(other),
                }
            }
            tokens.push(CommentToken::Str(s));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            tokens.push(CommentToken::Word(word));
        }
    }
    tokens
}
