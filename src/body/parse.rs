//! Recursive-descent parser for rpc bodies.
//!
//! Grammar (whitespace between tokens is ignored):
//!
//! ```text
//! start    := value [opts] EOF          value must be an object
//! value    := object | bracket | STRING | IDENT | NUMBER | true | false
//! object   := "{" [pair ("," pair)*] "}"
//! bracket  := "[" [value ("," value)*] "]"      a sequence
//!           | "[" pair ("," pair)* "]"          an object in list clothing
//! opts     := object | "[" [pair ("," pair)*] "]"
//! pair     := IDENT ":" value
//! ```
//!
//! Example:
//! {job_id: 42, nodes: ["n1", "n2"]} [op_id: 7]

use crate::body::value::{Body, Number, Object, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {offset}")]
pub struct BodyError {
    pub offset: usize,
    pub message: String,
}

impl BodyError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

type PResult<T> = std::result::Result<T, BodyError>;

/// Parse the text following `body:` into the main object and the optional
/// options block.
pub fn parse_body(text: &str) -> PResult<Body> {
    let tokens = tokenize(text)?;
    let mut p = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    let start = p.offset();
    let body = match p.value()? {
        Value::Object(o) => o,
        other => {
            return Err(BodyError::new(
                start,
                format!("body must be an object, found {}", other),
            ));
        }
    };

    let opts = if p.at(&Tok::Eof) {
        Object::new()
    } else {
        p.opts()?
    };

    if !p.at(&Tok::Eof) {
        return Err(BodyError::new(
            p.offset(),
            format!("unexpected {} after body", p.peek().describe()),
        ));
    }

    Ok(Body { body, opts })
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Ident(String),
    Str(String),
    Num(Number),
    Bool(bool),
    Eof,
}

impl Tok {
    fn describe(&self) -> String {
        match self {
            Tok::LBrace => "'{'".to_string(),
            Tok::RBrace => "'}'".to_string(),
            Tok::LBracket => "'['".to_string(),
            Tok::RBracket => "']'".to_string(),
            Tok::Comma => "','".to_string(),
            Tok::Colon => "':'".to_string(),
            Tok::Ident(s) => format!("identifier '{}'", s),
            Tok::Str(s) => format!("string {:?}", s),
            Tok::Num(n) => format!("number {}", n),
            Tok::Bool(b) => format!("'{}'", b),
            Tok::Eof => "end of input".to_string(),
        }
    }

    /// Keys are bare identifiers; the keyword spellings are allowed as keys.
    fn as_key(&self) -> Option<String> {
        match self {
            Tok::Ident(s) => Some(s.clone()),
            Tok::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Spanned {
    tok: Tok,
    offset: usize,
}

fn tokenize(text: &str) -> PResult<Vec<Spanned>> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let single = match c {
            b'{' => Some(Tok::LBrace),
            b'}' => Some(Tok::RBrace),
            b'[' => Some(Tok::LBracket),
            b']' => Some(Tok::RBracket),
            b',' => Some(Tok::Comma),
            b':' => Some(Tok::Colon),
            _ => None,
        };
        if let Some(tok) = single {
            out.push(Spanned { tok, offset: start });
            i += 1;
            continue;
        }

        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'"' {
            let (s, next) = lex_string(text, i)?;
            out.push(Spanned {
                tok: Tok::Str(s),
                offset: start,
            });
            i = next;
        } else if c == b'_' || c.is_ascii_alphabetic() {
            while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
                i += 1;
            }
            let tok = match &text[start..i] {
                "true" => Tok::Bool(true),
                "false" => Tok::Bool(false),
                word => Tok::Ident(word.to_string()),
            };
            out.push(Spanned { tok, offset: start });
        } else if c.is_ascii_digit() || c == b'+' || c == b'-' || c == b'.' {
            let (n, next) = lex_number(text, i)?;
            out.push(Spanned {
                tok: Tok::Num(n),
                offset: start,
            });
            i = next;
        } else {
            let ch = text[i..].chars().next().unwrap_or('?');
            return Err(BodyError::new(i, format!("unexpected character {:?}", ch)));
        }
    }

    out.push(Spanned {
        tok: Tok::Eof,
        offset: text.len(),
    });
    Ok(out)
}

/// Lex a double-quoted string starting at `start`; returns the unescaped
/// contents and the offset just past the closing quote.
fn lex_string(text: &str, start: usize) -> PResult<(String, usize)> {
    let mut out = String::new();
    let mut chars = text[start + 1..].char_indices();

    while let Some((rel, c)) = chars.next() {
        let at = start + 1 + rel;
        match c {
            '"' => return Ok((out, at + 1)),
            '\\' => {
                let (_, esc) = chars
                    .next()
                    .ok_or_else(|| BodyError::new(at, "unterminated escape sequence"))?;
                match esc {
                    '"' => out.push('"'),
                    '\\' => out.push('\\'),
                    '/' => out.push('/'),
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'u' => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let digit = chars
                                .next()
                                .and_then(|(_, h)| h.to_digit(16))
                                .ok_or_else(|| BodyError::new(at, "bad \\u escape"))?;
                            code = code * 16 + digit;
                        }
                        let ch = char::from_u32(code)
                            .ok_or_else(|| BodyError::new(at, "bad \\u escape"))?;
                        out.push(ch);
                    }
                    // Unknown escapes are kept verbatim.
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
            }
            c => out.push(c),
        }
    }

    Err(BodyError::new(start, "unterminated string"))
}

/// Lex a signed number: `[+-]? (INT ("." INT?)? | "." INT) ([eE] [+-]? INT)?`.
fn lex_number(text: &str, start: usize) -> PResult<(Number, usize)> {
    let bytes = text.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = start;
    if bytes[i] == b'+' || bytes[i] == b'-' {
        i += 1;
    }

    let int_end = digits(i);
    let has_int = int_end > i;
    i = int_end;

    let mut is_float = false;
    let mut has_frac = false;
    if i < bytes.len() && bytes[i] == b'.' {
        let frac_end = digits(i + 1);
        has_frac = frac_end > i + 1;
        is_float = true;
        i = frac_end;
    }
    if !has_int && !has_frac {
        return Err(BodyError::new(start, "malformed number"));
    }

    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_end = digits(j);
        if exp_end == j {
            return Err(BodyError::new(start, "malformed exponent"));
        }
        is_float = true;
        i = exp_end;
    }

    let lexeme = &text[start..i];
    let n = if is_float {
        let x = lexeme
            .parse::<f64>()
            .map_err(|_| BodyError::new(start, format!("bad number {}", lexeme)))?;
        if !x.is_finite() {
            return Err(BodyError::new(start, format!("number out of range: {}", lexeme)));
        }
        Number::Float(x)
    } else {
        Number::Integer(
            lexeme
                .parse::<i128>()
                .map_err(|_| BodyError::new(start, format!("integer out of range: {}", lexeme)))?,
        )
    };
    Ok((n, i))
}

/// Deepest nesting of objects and sequences a body may use.
const MAX_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_at(&self, ahead: usize) -> &Tok {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn bump(&mut self) -> Tok {
        let tok = self.tokens[self.pos].tok.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, tok: Tok) -> PResult<()> {
        if self.at(&tok) {
            self.bump();
            Ok(())
        } else {
            Err(BodyError::new(
                self.offset(),
                format!("expected {}, found {}", tok.describe(), self.peek().describe()),
            ))
        }
    }

    /// Run `f` one nesting level deeper; `offset` is where the level opens.
    fn nested<T>(&mut self, offset: usize, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(BodyError::new(
                offset,
                format!("nesting deeper than {} levels", MAX_DEPTH),
            ));
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        out
    }

    fn value(&mut self) -> PResult<Value> {
        let offset = self.offset();
        match self.bump() {
            Tok::LBrace => self.nested(offset, |p| Ok(Value::Object(p.pairs(Tok::RBrace)?))),
            Tok::LBracket => self.nested(offset, |p| {
                if p.pair_follows() {
                    Ok(Value::Object(p.pairs(Tok::RBracket)?))
                } else {
                    Ok(Value::Sequence(p.items()?))
                }
            }),
            Tok::Str(s) | Tok::Ident(s) => Ok(Value::Text(s)),
            Tok::Num(n) => Ok(Value::Number(n)),
            Tok::Bool(b) => Ok(Value::Boolean(b)),
            other => Err(BodyError::new(
                offset,
                format!("expected a value, found {}", other.describe()),
            )),
        }
    }

    fn opts(&mut self) -> PResult<Object> {
        let offset = self.offset();
        match self.bump() {
            Tok::LBrace => self.pairs(Tok::RBrace),
            Tok::LBracket => self.pairs(Tok::RBracket),
            other => Err(BodyError::new(
                offset,
                format!("expected an options block, found {}", other.describe()),
            )),
        }
    }

    fn pair_follows(&self) -> bool {
        self.peek().as_key().is_some() && self.peek_at(1) == &Tok::Colon
    }

    /// Comma-separated `key: value` pairs up to `close`; the opening
    /// delimiter is already consumed.
    fn pairs(&mut self, close: Tok) -> PResult<Object> {
        let mut out = Object::new();
        if self.at(&close) {
            self.bump();
            return Ok(out);
        }
        loop {
            let offset = self.offset();
            let key = self.peek().as_key().ok_or_else(|| {
                BodyError::new(
                    offset,
                    format!("expected a key, found {}", self.peek().describe()),
                )
            })?;
            self.bump();
            self.expect(Tok::Colon)?;
            let value = self.value()?;
            if out.insert(key.clone(), value).is_some() {
                return Err(BodyError::new(offset, format!("duplicate key '{}'", key)));
            }

            if self.at(&Tok::Comma) {
                self.bump();
                continue;
            }
            self.expect(close)?;
            return Ok(out);
        }
    }

    fn items(&mut self) -> PResult<Vec<Value>> {
        let mut out = Vec::new();
        if self.at(&Tok::RBracket) {
            self.bump();
            return Ok(out);
        }
        loop {
            out.push(self.value()?);
            if self.at(&Tok::Comma) {
                self.bump();
                continue;
            }
            self.expect(Tok::RBracket)?;
            return Ok(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::strategy;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn int(n: i128) -> Value {
        Value::Number(Number::Integer(n))
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn obj(pairs: Vec<(&str, Value)>) -> Object {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn empty_body_has_no_opts() {
        let b = parse_body("{}").unwrap();
        assert!(b.body.is_empty());
        assert!(b.opts.is_empty());
    }

    #[test]
    fn nested_values() {
        let b = parse_body(
            r#"{job_id: 42, nodes: ["n1", node2], limits: {walltime: 3.5e2, retries: -1}, ok: true, dry: false}"#,
        )
        .unwrap();
        assert_eq!(
            b.body,
            obj(vec![
                ("job_id", int(42)),
                ("nodes", Value::Sequence(vec![text("n1"), text("node2")])),
                (
                    "limits",
                    Value::Object(obj(vec![
                        ("walltime", Value::Number(Number::Float(350.0))),
                        ("retries", int(-1)),
                    ]))
                ),
                ("ok", Value::Boolean(true)),
                ("dry", Value::Boolean(false)),
            ])
        );
    }

    #[test]
    fn bracketed_opts_block() {
        let b = parse_body("{retval: 0} [op_id: 42]").unwrap();
        assert_eq!(b.body, obj(vec![("retval", int(0))]));
        assert_eq!(b.opts, obj(vec![("op_id", int(42))]));
    }

    #[test]
    fn braced_opts_block_and_empty_opts() {
        let b = parse_body("{} {op_id: 3}").unwrap();
        assert_eq!(b.opts, obj(vec![("op_id", int(3))]));

        let b = parse_body("{} []").unwrap();
        assert!(b.opts.is_empty());
    }

    #[test]
    fn bracketed_pairs_inside_body_are_objects() {
        let b = parse_body("{qos: [class: gold, bw: 10], empty: []}").unwrap();
        assert_eq!(
            b.body,
            obj(vec![
                (
                    "qos",
                    Value::Object(obj(vec![("class", text("gold")), ("bw", int(10))]))
                ),
                ("empty", Value::Sequence(vec![])),
            ])
        );
    }

    #[test]
    fn numbers_keep_integer_or_float_form() {
        let b = parse_body("{a: 7, b: +7, c: 7., d: .5, e: 1e3, f: -2.25E-1}").unwrap();
        assert!(matches!(b.body["a"], Value::Number(Number::Integer(7))));
        assert!(matches!(b.body["b"], Value::Number(Number::Integer(7))));
        assert!(matches!(b.body["c"], Value::Number(Number::Float(x)) if x == 7.0));
        assert!(matches!(b.body["d"], Value::Number(Number::Float(x)) if x == 0.5));
        assert!(matches!(b.body["e"], Value::Number(Number::Float(x)) if x == 1000.0));
        assert!(matches!(b.body["f"], Value::Number(Number::Float(x)) if x == -0.225));
    }

    #[test]
    fn string_escapes_are_resolved() {
        let b = parse_body(r#"{p: "a\"b\\c\n\u0041"}"#).unwrap();
        assert_eq!(b.body["p"], text("a\"b\\c\nA"));
    }

    #[test]
    fn keyword_spelled_keys_are_accepted() {
        let b = parse_body("{true: false}").unwrap();
        assert_eq!(b.body, obj(vec![("true", Value::Boolean(false))]));
    }

    #[test]
    fn whitespace_is_insignificant() {
        let a = parse_body("{a:1,b:[x,y]}[op_id:2]").unwrap();
        let b = parse_body("  {  a : 1 ,\tb : [ x , y ] }   [ op_id : 2 ]  ").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        for bad in [
            "",
            "{",
            "{a 1}",
            "{a: 1,}",
            "{a: \"open}",
            "{a: 1} junk",
            "{a: 1} [op_id: 1] {}",
            "[1, 2]",
            "{a: 1, a: 2}",
            "{a: -}",
            "{a: 1e}",
            "{a: @}",
        ] {
            assert!(parse_body(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn integers_beyond_i64_stay_exact() {
        let b = parse_body("{a: 18446744073709551617, b: -18446744073709551617}").unwrap();
        assert_eq!(b.body["a"], Value::Number(Number::Integer(18_446_744_073_709_551_617)));
        assert_eq!(b.body["b"], Value::Number(Number::Integer(-18_446_744_073_709_551_617)));
        assert_ne!(
            parse_body("{a: 18446744073709551617}").unwrap(),
            parse_body("{a: 18446744073709551616}").unwrap()
        );
    }

    #[test]
    fn numbers_out_of_range_are_rejected() {
        for bad in [
            "{a: 1e400}",
            "{a: -1e400}",
            "{a: 1000000000000000000000000000000000000000000}",
        ] {
            let err = parse_body(bad).unwrap_err();
            assert_eq!(err.offset, 4, "{}", bad);
            assert!(err.message.contains("out of range"), "{}", err);
        }
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let deep = format!("{{a: {}}}", "[".repeat(100_000));
        let err = parse_body(&deep).unwrap_err();
        assert!(err.message.contains("nesting deeper than"), "{}", err);

        let ok = format!("{{a: {}{}}}", "[".repeat(100), "]".repeat(100));
        assert!(parse_body(&ok).is_ok());
    }

    #[test]
    fn error_reports_offset() {
        let err = parse_body("{a: 1} junk").unwrap_err();
        assert_eq!(err.offset, 7);
        assert!(err.message.contains("options block"));
    }

    #[test]
    fn reserialized_values_reparse_equal() {
        for src in [
            "{}",
            r#"{a: 1, b: -2.5, c: "quote \" and \\ slash", d: [true, false, [], {}], e: bare}"#,
            "{nested: {deeper: {deepest: [1, [2, [3e-7]]]}}}",
            "{big: 12345678901234567890}",
            "{tab: \"a\\tb\", ctl: \"\\u0001\"}",
        ] {
            let first = parse_body(src).unwrap();
            let again = parse_body(&first.to_string()).unwrap();
            assert_eq!(first, again, "round trip of {}", src);
        }
    }

    proptest! {
        #[test]
        fn written_bodies_parse_back_equal(body in strategy::body()) {
            let text = body.to_string();
            let again = parse_body(&text);
            prop_assert_eq!(again, Ok(body), "text: {}", text);
        }
    }
}
