//! Compile-time SIMD encoding proc-macros for [`vecasm`](https://crates.io/crates/vecasm).
//!
//! Provides [`simd_bytes!`] and [`simd_array!`], which encode portable
//! vector source text for one target profile at compile time. The result is
//! a constant with no runtime encoder in the final binary.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vecasm_macros::simd_bytes;
//!
//! // AVX2 kernel body
//! const ADD: &[u8] = simd_bytes!(x64_avx256, "add.f32 v0, v1, v2\nret");
//!
//! // The same body for AArch64 and POWER10
//! const ADD_A64: &[u8] = simd_bytes!(a64_neon, "add.f32 v0, v1, v2\nret");
//! const ADD_P10: &[u8] = simd_bytes!(power10, "add.f32 v0, v1, v2\nret");
//! ```

use proc_macro::{Delimiter, Group, Ident, Literal, Punct, Spacing, Span, TokenStream, TokenTree};
use vecasm::{
    assemble, A64Neon, EncodeError, Power10, Power8, TargetId, X64Avx128, X64Avx256, X64Avx512,
};

/// Encode source text at compile time, producing a `&'static [u8]` slice.
///
/// # Syntax
///
/// ```rust,ignore
/// simd_bytes!(TARGET, "vector source")
/// ```
///
/// where `TARGET` is one of: `a64_neon`, `power8`, `power10`,
/// `x64_avx128`, `x64_avx256`, `x64_avx512`.
///
/// # Examples
///
/// ```rust,ignore
/// use vecasm_macros::simd_bytes;
///
/// const RET: &[u8] = simd_bytes!(x64_avx256, "ret");
/// assert_eq!(RET, &[0xC3]);
///
/// // Labels and mask branches
/// const CODE: &[u8] = simd_bytes!(a64_neon, "
///     top:
///         cmplt.f32 v2, v0, v1
///         jall v2, top
///         ret
/// ");
/// ```
///
/// # Compile-time errors
///
/// If the source fails to encode, the macro emits a compile-time error with
/// the full `EncodeError` message.
#[proc_macro]
pub fn simd_bytes(input: TokenStream) -> TokenStream {
    match simd_impl(input, Shape::Slice) {
        Ok(ts) => ts,
        Err(err) => err.into_compile_error(),
    }
}

/// Encode source text at compile time, producing a fixed-size `[u8; N]`.
///
/// # Examples
///
/// ```rust,ignore
/// use vecasm_macros::simd_array;
///
/// const RET: [u8; 4] = simd_array!(a64_neon, "ret");
/// ```
#[proc_macro]
pub fn simd_array(input: TokenStream) -> TokenStream {
    match simd_impl(input, Shape::Array) {
        Ok(ts) => ts,
        Err(err) => err.into_compile_error(),
    }
}

// ─── Implementation ─────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Shape {
    Slice,
    Array,
}

struct MacroInput {
    target: TargetId,
    source: String,
    /// Span of the source literal for error reporting.
    source_span: Span,
}

const TARGETS: &str = "a64_neon, power8, power10, x64_avx128, x64_avx256, x64_avx512";

fn parse_input(input: TokenStream) -> Result<MacroInput, Error> {
    let mut tokens = input.into_iter();

    let target_tt = tokens
        .next()
        .ok_or_else(|| Error::new(format!("expected target identifier ({TARGETS})")))?;
    let target = parse_target(&target_tt)?;

    match tokens.next() {
        Some(TokenTree::Punct(p)) if p.as_char() == ',' => {}
        Some(other) => return Err(Error::with_span(other.span(), "expected `,`")),
        None => return Err(Error::new("expected `,`")),
    }

    let source_tt = tokens
        .next()
        .ok_or_else(|| Error::new("expected source string"))?;
    let source = parse_string_literal(&source_tt)?;

    // A single trailing comma is accepted.
    match tokens.next() {
        None => {}
        Some(TokenTree::Punct(p)) if p.as_char() == ',' && tokens.next().is_none() => {}
        Some(other) => {
            return Err(Error::with_span(
                other.span(),
                "unexpected extra tokens after source string",
            ))
        }
    }

    Ok(MacroInput {
        target,
        source,
        source_span: source_tt.span(),
    })
}

fn parse_target(tt: &TokenTree) -> Result<TargetId, Error> {
    let TokenTree::Ident(id) = tt else {
        return Err(Error::with_span(
            tt.span(),
            format!("expected target identifier ({TARGETS})"),
        ));
    };
    let ident = id.to_string();
    TargetId::from_name(&ident.replace('_', "-")).ok_or_else(|| {
        Error::with_span(
            tt.span(),
            format!("unknown target `{ident}`, expected: {TARGETS}"),
        )
    })
}

fn encode(mi: &MacroInput) -> Result<Vec<u8>, Error> {
    let result: Result<Vec<u8>, EncodeError> = match mi.target {
        TargetId::A64Neon => assemble::<A64Neon>(&mi.source),
        TargetId::Power8 => assemble::<Power8>(&mi.source),
        TargetId::Power10 => assemble::<Power10>(&mi.source),
        TargetId::X64Avx128 => assemble::<X64Avx128>(&mi.source),
        TargetId::X64Avx256 => assemble::<X64Avx256>(&mi.source),
        TargetId::X64Avx512 => assemble::<X64Avx512>(&mi.source),
    };
    result.map_err(|e| Error::with_span(mi.source_span, format!("{}: {e}", mi.target)))
}

fn simd_impl(input: TokenStream, shape: Shape) -> Result<TokenStream, Error> {
    let mi = parse_input(input)?;
    let bytes = encode(&mi)?;
    Ok(const_block(&bytes, shape))
}

fn parse_string_literal(tt: &TokenTree) -> Result<String, Error> {
    let TokenTree::Literal(lit) = tt else {
        return Err(Error::with_span(tt.span(), "expected string literal"));
    };
    let raw = lit.to_string();
    let malformed = || Error::with_span(tt.span(), "malformed string literal");

    if let Some(rest) = raw.strip_prefix('r') {
        let hashes = rest.len() - rest.trim_start_matches('#').len();
        let fence = "#".repeat(hashes);
        return rest
            .strip_prefix(&format!("{fence}\""))
            .and_then(|s| s.strip_suffix(&format!("\"{fence}")))
            .map(String::from)
            .ok_or_else(malformed);
    }
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| Error::with_span(tt.span(), "expected string literal"))?;
    Ok(unescape(inner))
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('0') => out.push('\0'),
            // Line continuation: skip the newline and leading whitespace.
            Some('\n') => chars = chars.as_str().trim_start().chars(),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// `{ const BYTES: <ty> = [..]; BYTES }`
fn const_block(bytes: &[u8], shape: Shape) -> TokenStream {
    let mut elems = TokenStream::new();
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            elems.extend([TokenTree::Punct(Punct::new(',', Spacing::Alone))]);
        }
        elems.extend([TokenTree::Literal(Literal::u8_suffixed(*b))]);
    }
    let array = TokenTree::Group(Group::new(Delimiter::Bracket, elems));
    let u8_ty = || TokenTree::Ident(Ident::new("u8", Span::call_site()));

    let (ty, value): (Vec<TokenTree>, Vec<TokenTree>) = match shape {
        Shape::Slice => (
            vec![
                TokenTree::Punct(Punct::new('&', Spacing::Alone)),
                TokenTree::Group(Group::new(Delimiter::Bracket, u8_ty().into())),
            ],
            vec![TokenTree::Punct(Punct::new('&', Spacing::Alone)), array],
        ),
        Shape::Array => {
            let mut inner = TokenStream::from(u8_ty());
            inner.extend([
                TokenTree::Punct(Punct::new(';', Spacing::Alone)),
                TokenTree::Literal(Literal::usize_unsuffixed(bytes.len())),
            ]);
            (
                vec![TokenTree::Group(Group::new(Delimiter::Bracket, inner))],
                vec![array],
            )
        }
    };

    let name = || TokenTree::Ident(Ident::new("BYTES", Span::call_site()));
    let mut body = TokenStream::new();
    body.extend([
        TokenTree::Ident(Ident::new("const", Span::call_site())),
        name(),
        TokenTree::Punct(Punct::new(':', Spacing::Alone)),
    ]);
    body.extend(ty);
    body.extend([TokenTree::Punct(Punct::new('=', Spacing::Alone))]);
    body.extend(value);
    body.extend([TokenTree::Punct(Punct::new(';', Spacing::Alone)), name()]);
    TokenStream::from(TokenTree::Group(Group::new(Delimiter::Brace, body)))
}

// ─── Minimal syn-free error type ─────────────────────────────────────────────

struct Error {
    message: String,
    span: Span,
}

impl Error {
    fn new(message: impl Into<String>) -> Self {
        Self::with_span(Span::call_site(), message)
    }

    fn with_span(span: Span, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// `compile_error!("...")` with every token at the error span.
    fn into_compile_error(self) -> TokenStream {
        let mut bang = Punct::new('!', Spacing::Alone);
        bang.set_span(self.span);
        let mut msg = Literal::string(&self.message);
        msg.set_span(self.span);
        let mut args = Group::new(Delimiter::Parenthesis, TokenTree::Literal(msg).into());
        args.set_span(self.span);
        [
            TokenTree::Ident(Ident::new("compile_error", self.span)),
            TokenTree::Punct(bang),
            TokenTree::Group(args),
        ]
        .into_iter()
        .collect()
    }
}
