//! Parser for vecasm source text.
//!
//! Converts the lexer's token stream into a [`Statement`] list. Register
//! tokens are written `v<n>` and `r<n>`; the role of each vector token is
//! inferred from its position in the mnemonic's arity, so
//! `add.f32 v0, v1, v2` yields `[Dst, Src, Src2]` and the destructive
//! `add.f32 v0, v1` yields `[DstSrc, Src2]`.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{EncodeError, Span};
use crate::ir::{Arity, Cond, Instr, Mnemonic, OperandList, Width};
use crate::lexer::{self, Token, TokenKind};
use crate::operand::{GReg, Mem, Operand, Role, Scale, VReg};

/// One parsed source statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement<'src> {
    /// `name:`
    Label {
        /// Label name.
        name: &'src str,
        /// Source location.
        span: Span,
    },
    /// An instruction macro.
    Instr {
        /// The macro.
        instr: Instr,
        /// Source location of the mnemonic.
        span: Span,
    },
    /// `jall[.wN] vM, label` / `jnone[.wN] vM, label`
    Branch {
        /// Mask token.
        mask: VReg,
        /// Logical width of the mask.
        width: Width,
        /// Branch condition.
        cond: Cond,
        /// Target label name.
        target: &'src str,
        /// Source location of the mnemonic.
        span: Span,
    },
    /// `jmp label`
    Jump {
        /// Target label name.
        target: &'src str,
        /// Source location of the mnemonic.
        span: Span,
    },
    /// `ret`
    Ret {
        /// Source location.
        span: Span,
    },
}

impl Statement<'_> {
    /// Source location of the statement.
    pub fn span(&self) -> Span {
        match *self {
            Statement::Label { span, .. }
            | Statement::Instr { span, .. }
            | Statement::Branch { span, .. }
            | Statement::Jump { span, .. }
            | Statement::Ret { span } => span,
        }
    }
}

/// Tokenize and parse `source`.
///
/// # Errors
///
/// `Syntax` for malformed input and `UnknownMnemonic` for an unrecognised
/// mnemonic or element suffix.
pub fn parse_str(source: &str) -> Result<Vec<Statement<'_>>, EncodeError> {
    let tokens = lexer::tokenize(source)?;
    parse(&tokens)
}

/// Parse a token stream.
///
/// # Errors
///
/// `Syntax` for an unexpected token and `UnknownMnemonic` for an
/// unrecognised mnemonic.
pub fn parse<'src>(tokens: &[Token<'src>]) -> Result<Vec<Statement<'src>>, EncodeError> {
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_program()
}

// ── Raw operands ─────────────────────────────────────────────

/// An operand before roles are assigned.
#[derive(Clone, Copy)]
enum Raw {
    V(u8),
    M(Mem),
    Imm(i64),
}

/// Roles of the vector tokens at each position for `arity` with `count`
/// operands. Counts the arity does not accept fall back to sources and are
/// rejected later by [`Instr::form`].
fn roles(arity: Arity, count: usize) -> [Role; 3] {
    use Role::{Dst, DstSrc, Src, Src2};
    match (arity, count) {
        (Arity::Binary, 2) => [DstSrc, Src2, Src2],
        (Arity::Binary, _) => [Dst, Src, Src2],
        (Arity::Unary | Arity::Mov | Arity::Load, _) => [Dst, Src, Src2],
        (Arity::Fused, _) => [DstSrc, Src, Src2],
        (Arity::Shift, 2) => [DstSrc, Src, Src],
        (Arity::Shift, _) => [Dst, Src, Src],
        (Arity::Store, _) => [Src, Src, Src],
    }
}

/// `v<n>` / `r<n>` register index, or `None` if `text` is not a register.
fn register(text: &str, prefix: u8) -> Option<u8> {
    let bytes = text.as_bytes();
    if bytes.len() < 2 || !bytes[0].eq_ignore_ascii_case(&prefix) {
        return None;
    }
    let digits = &text[1..];
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

struct Parser<'a, 'src> {
    tokens: &'a [Token<'src>],
    pos: usize,
}

impl<'a, 'src> Parser<'a, 'src> {
    #[inline]
    fn peek(&self) -> &'a Token<'src> {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[inline]
    fn advance(&mut self) -> &'a Token<'src> {
        let tok = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len() || self.peek().kind == TokenKind::Eof
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn unexpected(tok: &Token<'_>, wanted: &str) -> EncodeError {
        let found = if tok.kind == TokenKind::Eof {
            "end of input"
        } else if tok.kind == TokenKind::Newline {
            "end of statement"
        } else {
            tok.text
        };
        EncodeError::Syntax {
            msg: format!("expected {}, found '{}'", wanted, found),
            span: tok.span,
        }
    }

    fn expect(&mut self, kind: TokenKind, wanted: &str) -> Result<&'a Token<'src>, EncodeError> {
        let tok = self.advance();
        if tok.kind == kind {
            Ok(tok)
        } else {
            Err(Self::unexpected(tok, wanted))
        }
    }

    fn parse_program(&mut self) -> Result<Vec<Statement<'src>>, EncodeError> {
        let mut stmts = Vec::with_capacity(self.tokens.len() / 4 + 1);
        while !self.at_end() {
            let tok = self.advance();
            match tok.kind {
                TokenKind::Newline => {}
                TokenKind::LabelDef => stmts.push(Statement::Label {
                    name: tok.text,
                    span: tok.span,
                }),
                TokenKind::Ident => {
                    stmts.push(self.parse_statement(tok)?);
                    if !self.at_statement_end() {
                        return Err(Self::unexpected(self.peek(), "end of statement"));
                    }
                }
                _ => return Err(Self::unexpected(tok, "mnemonic or label")),
            }
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self, head: &'a Token<'src>) -> Result<Statement<'src>, EncodeError> {
        let text = head.text.to_ascii_lowercase();
        let span = head.span;
        let (stem, width) = match text.split_once('.') {
            Some((stem, rest)) if stem == "jall" || stem == "jnone" => {
                let width = rest
                    .strip_prefix('w')
                    .and_then(|w| w.parse().ok())
                    .and_then(Width::from_bits)
                    .ok_or_else(|| unknown(head))?;
                (stem, width)
            }
            _ => (text.as_str(), Width::Native),
        };
        match stem {
            "ret" => Ok(Statement::Ret { span }),
            "jmp" => {
                let target = self.expect(TokenKind::Ident, "label")?.text;
                Ok(Statement::Jump { target, span })
            }
            "jall" | "jnone" => {
                let reg = self.expect(TokenKind::Ident, "mask register")?;
                let index = register(reg.text, b'v').ok_or_else(|| Self::unexpected(reg, "mask register"))?;
                self.expect(TokenKind::Comma, "','")?;
                let target = self.expect(TokenKind::Ident, "label")?.text;
                let cond = if stem == "jall" {
                    Cond::AllLanes
                } else {
                    Cond::NoLanes
                };
                Ok(Statement::Branch {
                    mask: VReg::src(index),
                    width,
                    cond,
                    target,
                    span,
                })
            }
            _ => {
                let mnemonic = Mnemonic::parse(&text).ok_or_else(|| unknown(head))?;
                let instr = self.parse_operands(mnemonic)?;
                Ok(Statement::Instr { instr, span })
            }
        }
    }

    fn parse_operands(&mut self, m: Mnemonic) -> Result<Instr, EncodeError> {
        let mut raw: Vec<(Raw, Span)> = Vec::with_capacity(OperandList::MAX_LEN);
        if !self.at_statement_end() {
            loop {
                let at = self.peek().span;
                if raw.len() == OperandList::MAX_LEN {
                    return Err(EncodeError::Syntax {
                        msg: format!("{}: at most {} operands", m, OperandList::MAX_LEN),
                        span: at,
                    });
                }
                raw.push((self.parse_operand()?, at));
                if self.peek().kind != TokenKind::Comma {
                    break;
                }
                self.advance();
            }
        }
        let roles = roles(m.op.arity(), raw.len());
        let mut operands = OperandList::new();
        for (i, &(op, _)) in raw.iter().enumerate() {
            operands.push(match op {
                Raw::V(index) => Operand::V(VReg {
                    role: roles[i],
                    index,
                }),
                Raw::M(mem) => Operand::M(mem),
                Raw::Imm(v) => Operand::Imm(v),
            });
        }
        Ok(Instr {
            op: m.op,
            elem: m.elem,
            width: m.width,
            operands,
        })
    }

    fn parse_operand(&mut self) -> Result<Raw, EncodeError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Number(v) => Ok(Raw::Imm(v)),
            TokenKind::OpenBracket => self.parse_memory().map(Raw::M),
            TokenKind::Ident => register(tok.text, b'v')
                .map(Raw::V)
                .ok_or_else(|| Self::unexpected(tok, "vector register, memory, or immediate")),
            _ => Err(Self::unexpected(tok, "operand")),
        }
    }

    /// `[rB (+ rI[*S])? ((+|-) disp)*]`, the opening bracket consumed.
    fn parse_memory(&mut self) -> Result<Mem, EncodeError> {
        let base = self.gpr()?;
        let mut index = None;
        let mut disp: i64 = 0;
        loop {
            let tok = self.advance();
            let negative = match tok.kind {
                TokenKind::CloseBracket => break,
                TokenKind::Plus => false,
                TokenKind::Minus => true,
                _ => return Err(Self::unexpected(tok, "'+', '-', or ']'")),
            };
            let term = self.advance();
            match term.kind {
                TokenKind::Number(v) => {
                    let v = if negative { -v } else { v };
                    disp = add_disp(disp, v, term)?;
                }
                TokenKind::Ident if !negative && index.is_none() => {
                    let r = register(term.text, b'r')
                        .ok_or_else(|| Self::unexpected(term, "index register"))?;
                    let scale = if self.peek().kind == TokenKind::Star {
                        self.advance();
                        let f = self.advance();
                        match f.kind {
                            TokenKind::Number(n) => u8::try_from(n)
                                .ok()
                                .and_then(Scale::from_factor)
                                .ok_or_else(|| EncodeError::Syntax {
                                    msg: format!("invalid scale {}; expected 1, 2, 4, or 8", n),
                                    span: f.span,
                                })?,
                            _ => return Err(Self::unexpected(f, "scale")),
                        }
                    } else {
                        Scale::S1
                    };
                    index = Some((GReg(r), scale));
                }
                _ => return Err(Self::unexpected(term, "displacement")),
            }
        }
        Ok(Mem { base, index, disp })
    }

    fn gpr(&mut self) -> Result<GReg, EncodeError> {
        let tok = self.advance();
        match tok.kind {
            TokenKind::Ident => register(tok.text, b'r')
                .map(GReg)
                .ok_or_else(|| Self::unexpected(tok, "base register")),
            _ => Err(Self::unexpected(tok, "base register")),
        }
    }
}

fn add_disp(acc: i64, v: i64, tok: &Token<'_>) -> Result<i64, EncodeError> {
    acc.checked_add(v).ok_or_else(|| EncodeError::Syntax {
        msg: "displacement overflows 64 bits".to_string(),
        span: tok.span,
    })
}

fn unknown(tok: &Token<'_>) -> EncodeError {
    EncodeError::UnknownMnemonic {
        mnemonic: String::from(tok.text),
        span: tok.span,
    }
}
