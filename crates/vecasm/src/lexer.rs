//! Lexer for vecasm source text.
//!
//! The lexer tokenizes source into a stream of [`Token`]s, each carrying
//! its [`Span`] so that parse and encode errors can point back to the
//! exact location in the input.

use alloc::string::String;
use alloc::vec::Vec;
use core::str;

use crate::error::{EncodeError, Span};

/// A token produced by the lexer. Text is borrowed from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'src> {
    /// Token classification.
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: &'src str,
    /// Source location.
    pub span: Span,
}

/// The type of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Mnemonic (dots included), register name, or label reference.
    Ident,
    /// Integer literal, with an optional leading `#` or `-`.
    Number(i64),
    /// Label definition (`name:`).
    LabelDef,
    /// `,`
    Comma,
    /// `[`
    OpenBracket,
    /// `]`
    CloseBracket,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// Statement separator: newline or `;`.
    Newline,
    /// End of input.
    Eof,
}

/// Tokenize source text.
///
/// Recognizes identifiers, decimal / `0x` / `0b` integers, label
/// definitions, the punctuation `, [ ] + - *`, `//` comments, and `#`
/// comments. A `#` directly followed by a digit or `-digit` is an
/// immediate prefix instead of a comment.
///
/// # Errors
///
/// `Syntax` on an unexpected character or a malformed number.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, EncodeError> {
    let mut tokens = Vec::with_capacity(source.len() / 3 + 1);
    let bytes = source.as_bytes();
    let len = bytes.len();
    let mut pos = 0;
    let mut line: u32 = 1;
    let mut line_start = 0usize;

    let col = |pos: usize, line_start: usize| (pos - line_start) as u32 + 1;

    while pos < len {
        let ch = bytes[pos];

        if ch == b' ' || ch == b'\t' || ch == b'\r' {
            pos += 1;
            continue;
        }

        if ch == b'\n' || ch == b';' {
            tokens.push(Token {
                kind: TokenKind::Newline,
                text: &source[pos..pos + 1],
                span: Span::new(line, col(pos, line_start), pos, 1),
            });
            pos += 1;
            if ch == b'\n' {
                line += 1;
                line_start = pos;
            }
            continue;
        }

        // `#` immediate prefix, else a comment to end of line.
        if ch == b'#' {
            let digit_at = |i: usize| i < len && bytes[i].is_ascii_digit();
            if digit_at(pos + 1) || (pos + 1 < len && bytes[pos + 1] == b'-' && digit_at(pos + 2)) {
                let start = pos;
                pos += 1;
                let negative = bytes[pos] == b'-';
                if negative {
                    pos += 1;
                }
                let value = number_at(bytes, &mut pos, line, col(start, line_start), start)?;
                tokens.push(Token {
                    kind: TokenKind::Number(if negative { -value } else { value }),
                    text: &source[start..pos],
                    span: Span::new(line, col(start, line_start), start, pos - start),
                });
                continue;
            }
            while pos < len && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }

        if ch == b'/' && pos + 1 < len && bytes[pos + 1] == b'/' {
            while pos < len && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }

        let punct = match ch {
            b',' => Some(TokenKind::Comma),
            b'[' => Some(TokenKind::OpenBracket),
            b']' => Some(TokenKind::CloseBracket),
            b'+' => Some(TokenKind::Plus),
            b'*' => Some(TokenKind::Star),
            _ => None,
        };
        if let Some(kind) = punct {
            tokens.push(Token {
                kind,
                text: &source[pos..pos + 1],
                span: Span::new(line, col(pos, line_start), pos, 1),
            });
            pos += 1;
            continue;
        }

        if ch == b'-' {
            // Unary minus folds into the number after a separator.
            let is_unary = matches!(
                tokens.last().map(|t: &Token<'_>| t.kind),
                None | Some(
                    TokenKind::Comma | TokenKind::OpenBracket | TokenKind::Newline
                )
            );
            if is_unary && pos + 1 < len && bytes[pos + 1].is_ascii_digit() {
                let start = pos;
                pos += 1;
                let value = number_at(bytes, &mut pos, line, col(start, line_start), start)?;
                tokens.push(Token {
                    kind: TokenKind::Number(-value),
                    text: &source[start..pos],
                    span: Span::new(line, col(start, line_start), start, pos - start),
                });
                continue;
            }
            tokens.push(Token {
                kind: TokenKind::Minus,
                text: &source[pos..pos + 1],
                span: Span::new(line, col(pos, line_start), pos, 1),
            });
            pos += 1;
            continue;
        }

        if ch.is_ascii_digit() {
            let start = pos;
            let value = number_at(bytes, &mut pos, line, col(start, line_start), start)?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                text: &source[start..pos],
                span: Span::new(line, col(start, line_start), start, pos - start),
            });
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == b'_' {
            let start = pos;
            while pos < len
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'.')
            {
                pos += 1;
            }
            let text = &source[start..pos];
            if pos < len && bytes[pos] == b':' {
                pos += 1;
                tokens.push(Token {
                    kind: TokenKind::LabelDef,
                    text,
                    span: Span::new(line, col(start, line_start), start, pos - start),
                });
                continue;
            }
            tokens.push(Token {
                kind: TokenKind::Ident,
                text,
                span: Span::new(line, col(start, line_start), start, pos - start),
            });
            continue;
        }

        let c = source[pos..].chars().next().unwrap_or('?');
        return Err(EncodeError::Syntax {
            msg: alloc::format!("unexpected character '{}'", c),
            span: Span::new(line, col(pos, line_start), pos, c.len_utf8()),
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: "",
        span: Span::new(line, col(pos, line_start), pos, 0),
    });
    Ok(tokens)
}

/// Parse an unsigned number at `pos`, advancing past it.
fn number_at(
    bytes: &[u8],
    pos: &mut usize,
    line: u32,
    col: u32,
    start: usize,
) -> Result<i64, EncodeError> {
    let len = bytes.len();
    let (radix, digits_from) = if *pos + 1 < len && bytes[*pos] == b'0' {
        match bytes[*pos + 1] {
            b'x' | b'X' => (16, *pos + 2),
            b'b' | b'B' => (2, *pos + 2),
            _ => (10, *pos),
        }
    } else {
        (10, *pos)
    };
    let mut end = digits_from;
    while end < len && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    *pos = end;
    let text: String = str::from_utf8(&bytes[digits_from..end])
        .unwrap_or("")
        .chars()
        .filter(|&c| c != '_')
        .collect();
    i64::from_str_radix(&text, radix).map_err(|_| EncodeError::Syntax {
        msg: alloc::format!(
            "invalid number '{}'",
            str::from_utf8(&bytes[start..end]).unwrap_or("")
        ),
        span: Span::new(line, col, start, end - start),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input() {
        assert_eq!(kinds(""), [TokenKind::Eof]);
    }

    #[test]
    fn instruction_with_dotted_mnemonic() {
        let toks = tokenize("add.f32.w256 v0, v1, v2").unwrap();
        assert_eq!(toks[0].kind, TokenKind::Ident);
        assert_eq!(toks[0].text, "add.f32.w256");
        assert_eq!(toks[1].text, "v0");
        assert_eq!(toks[2].kind, TokenKind::Comma);
        assert_eq!(toks.len(), 7);
    }

    #[test]
    fn hash_immediate_versus_comment() {
        assert_eq!(
            kinds("shl.i32 v0, #3 # shift"),
            [
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Comma,
                TokenKind::Number(3),
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("# only a comment"), [TokenKind::Eof]);
        assert_eq!(kinds("#-4"), [TokenKind::Number(-4), TokenKind::Eof]);
    }

    #[test]
    fn slash_comment() {
        assert_eq!(kinds("ret // done"), [TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn number_radixes() {
        assert_eq!(kinds("0x1F")[0], TokenKind::Number(31));
        assert_eq!(kinds("0b101")[0], TokenKind::Number(5));
        assert_eq!(kinds("1_000")[0], TokenKind::Number(1000));
        assert_eq!(kinds(", -8")[1], TokenKind::Number(-8));
    }

    #[test]
    fn memory_operand_keeps_binary_minus() {
        assert_eq!(
            kinds("[r1 + r2*4 - 16]"),
            [
                TokenKind::OpenBracket,
                TokenKind::Ident,
                TokenKind::Plus,
                TokenKind::Ident,
                TokenKind::Star,
                TokenKind::Number(4),
                TokenKind::Minus,
                TokenKind::Number(16),
                TokenKind::CloseBracket,
                TokenKind::Eof
            ]
        );
        assert_eq!(kinds("[r1 -16]")[2], TokenKind::Minus);
    }

    #[test]
    fn label_and_separators() {
        assert_eq!(
            kinds("top: ret; ret\n"),
            [
                TokenKind::LabelDef,
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn spans_track_lines() {
        let toks = tokenize("ret\n  jmp out").unwrap();
        let jmp = &toks[2];
        assert_eq!(jmp.span.line, 2);
        assert_eq!(jmp.span.col, 3);
        assert_eq!(jmp.span.offset, 6);
    }

    #[test]
    fn unexpected_character() {
        let err = tokenize("add.f32 v0, v1 @").unwrap_err();
        assert!(matches!(err, EncodeError::Syntax { span, .. } if span.col == 16));
    }

    #[test]
    fn bad_number() {
        assert!(matches!(
            tokenize("0xZZ").unwrap_err(),
            EncodeError::Syntax { .. }
        ));
    }
}
