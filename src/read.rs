use tap::Pipe;
pub use types::*;

use anyhow::{anyhow, Context};
use reedline::Signal;
use regex::Regex;

use crate::{expr, lazy::Lazy, Term};

use self::stream::TokenStream;

mod stream;

pub mod expr_macro;
pub mod types;

static RE: Lazy<Regex, regex::Error> =
    Lazy::new(|| Regex::new(r#"[\s]*([()']|"(?:\\.|[^\\"])*"?|;.*|[^\s('"`,;)]*)"#));

fn regex() -> QResult<&'static Regex> {
    RE.force()
        .map_err(|err| QnErr::Any(anyhow!("Tokenizer failed to build: {err}")))
}

/// Split input into tokens
/// for reader macros:
///   - ' : quote
///   - ; : comment until the end of the line
pub fn tokenize(input: &str) -> QResult<TokenStream> {
    Ok(regex()?
        .find_iter(input)
        .map(|it| it.as_str().trim())
        .filter(|it| !it.is_empty() && !it.starts_with(';'))
        .collect())
}

pub fn tokenize_with_whitespace(input: &str) -> QResult<TokenStream> {
    Ok(regex()?
        .find_iter(input)
        .map(|it| it.as_str())
        .filter(|it| !it.is_empty())
        .collect())
}

fn get_inp(ctx: &mut Term) -> QResult<String> {
    match ctx.reedline.read_line(&ctx.prompt) {
        Ok(Signal::Success(line)) => Ok(line),
        Ok(Signal::CtrlD | Signal::CtrlC) => Err(QnErr::Stop)?,
        any => Err(anyhow!("REPL Err: {any:?}"))?,
    }
}

/// Read every form of a script.
pub fn read_all(input: &str) -> QResult<Vec<Expr>> {
    let mut stream = tokenize(input)?;
    let mut forms = vec![];

    while !stream.is_eof() {
        forms.push(stream.parse_atom(0)?);
    }

    Ok(forms)
}

impl TryFrom<TokenStream<'_>> for Expr {
    type Error = QnErr;
    fn try_from(value: TokenStream<'_>) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl core::str::FromStr for Expr {
    type Err = QnErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        tokenize(s)?.try_into()
    }
}

/// `Owner::NAME`, both parts non-empty, exactly one separator
fn parse_path(token: &str) -> QResult<Expr> {
    match token.split_once("::") {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains("::") => {
            Ok(expr!(path owner, name))
        }
        _ => Err(QnErr::Any(anyhow!("Malformed constant path: {token}"))),
    }
}

/// How deeply lists and quotes may nest in one form.
pub const MAX_NESTING: usize = 512;

impl TokenStream<'_> {
    fn parse(mut self) -> Result<Expr, QnErr> {
        self.parse_atom(0).and_then(|it| {
            if self.is_eof() {
                Ok(it)
            } else {
                Err(QnErr::MismatchedParen(ParenType::Open))
            }
        })
    }

    fn parse_atom(&mut self, depth: usize) -> Result<Expr, QnErr> {
        let raw_token = self.next().context("Didnt expect EOF")?;

        if depth >= MAX_NESTING && matches!(raw_token, "(" | "'") {
            return Err(QnErr::NestingTooDeep(MAX_NESTING));
        }

        match raw_token {
            "(" => Expr::List(self.parse_list(depth + 1)?.into()),
            // if this is encountered, it's a syntax error,
            // because it should be consumed in `parse_list`
            ")" => Err(QnErr::MismatchedParen(ParenType::Close))?,

            "'" => expr!(list expr!(quote), self.parse_atom(depth + 1)?),

            "nil" => Expr::Nil,
            "true" => expr!(bool true),
            "false" => expr!(bool false),

            int if int.parse::<i64>().is_ok() => Expr::Int(int.parse().context("Integer")?),

            string if string.starts_with('"') => {
                if string.len() == 1 || !string.ends_with('"') {
                    return Err(QnErr::MissingToken(anyhow!("Second String delimiter")));
                }

                Expr::String(
                    unescaper::unescape(&string[1..string.len() - 1])
                        .map_err(|err| {
                            QnErr::Any(anyhow!("Failed to unescape string: {string:?}, Err: {err}"))
                        })?
                        .into(),
                )
            }

            path if path.contains("::") => parse_path(path)?,
            sym => expr!(sym sym),
        }
        .pipe(Ok)
    }

    fn parse_list(&mut self, depth: usize) -> Result<Vec<Expr>, QnErr> {
        let mut list = Vec::new();

        loop {
            match self.peek() {
                Some(")") => {
                    self.next();
                    break;
                }
                None => return Err(QnErr::MismatchedParen(ParenType::Open)),
                Some(_) => list.push(self.parse_atom(depth)?),
            }
        }

        Ok(list)
    }
}
