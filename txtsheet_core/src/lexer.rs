use std::collections::BTreeMap;
use std::ops::Range;

use logos::Logos;
use snailquote::unescape;

use crate::FormulaError;

/// Tokens of a boolean condition. Token boundaries come from character
/// classes, so `a&&!b` and `a && !b` lex identically.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub(crate) enum FormulaToken {
	#[token("||")]
	Or,
	#[token("&&")]
	And,
	#[token("!")]
	Not,
	#[token("(")]
	OpenParen,
	#[token(")")]
	CloseParen,
	#[token("true")]
	True,
	#[token("false")]
	False,
	#[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
	Ident,
}

pub(crate) type Spanned<T> = (T, Range<usize>);

pub(crate) fn tokenize_formula(source: &str) -> Result<Vec<Spanned<FormulaToken>>, FormulaError> {
	let mut tokens = Vec::new();

	for (result, span) in FormulaToken::lexer(source).spanned() {
		let Ok(token) = result else {
			return Err(FormulaError::UnexpectedCharacter {
				found: source[span.clone()].to_string(),
				offset: span.start,
			});
		};

		tokens.push((token, span));
	}

	Ok(tokens)
}

/// Raw tokens of an include parameter literal such as
/// `key:"value", other:'x', count:3`.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
enum ParamToken {
	#[token(":")]
	Colon,
	#[token(",")]
	Comma,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuotedString,
	#[regex(r#"[^\s:,'"]+"#)]
	Word,
}

/// What the walker expects next.
#[derive(Clone, Copy)]
enum ParamContext {
	Key,
	Colon,
	Value,
	Separator,
}

/// Walks the parameter token stream, building the flat string map.
struct ParamWalker<'a> {
	source: &'a str,
	raw_tokens: Vec<Spanned<Result<ParamToken, ()>>>,
	cursor: usize,
	context: ParamContext,
	pending_key: Option<String>,
	params: BTreeMap<String, String>,
}

impl<'a> ParamWalker<'a> {
	fn new(source: &'a str) -> Self {
		let raw_tokens = ParamToken::lexer(source)
			.spanned()
			.collect::<Vec<_>>();

		Self {
			source,
			raw_tokens,
			cursor: 0,
			context: ParamContext::Key,
			pending_key: None,
			params: BTreeMap::new(),
		}
	}

	fn current_slice(&self) -> &'a str {
		let (_, span) = &self.raw_tokens[self.cursor];
		&self.source[span.clone()]
	}

	/// Strip the surrounding quotes of the current token and unescape it if
	/// needed.
	fn current_string(&self) -> Result<String, String> {
		let slice = self.current_slice();
		let inner = &slice[1..slice.len() - 1];

		if inner.contains('\\') {
			unescape(inner).map_err(|e| format!("invalid escape in {slice}: {e}"))
		} else {
			Ok(inner.to_string())
		}
	}

	fn process(mut self) -> Result<BTreeMap<String, String>, String> {
		while self.cursor < self.raw_tokens.len() {
			let (result, span) = &self.raw_tokens[self.cursor];
			let offset = span.start;
			let Ok(raw) = *result else {
				return Err(format!("unexpected character at offset {offset}"));
			};

			match (self.context, raw) {
				(
					ParamContext::Key,
					ParamToken::Word | ParamToken::DoubleQuotedString | ParamToken::SingleQuotedString,
				) => {
					let key = match raw {
						ParamToken::Word => self.current_slice().to_string(),
						_ => self.current_string()?,
					};
					self.pending_key = Some(key);
					self.context = ParamContext::Colon;
				}
				// Empty entries such as a trailing comma are allowed.
				(ParamContext::Key, ParamToken::Comma) => {}
				(ParamContext::Colon, ParamToken::Colon) => {
					self.context = ParamContext::Value;
				}
				(
					ParamContext::Value,
					ParamToken::Word | ParamToken::DoubleQuotedString | ParamToken::SingleQuotedString,
				) => {
					let value = match raw {
						ParamToken::Word => self.current_slice().to_string(),
						_ => self.current_string()?,
					};
					if let Some(key) = self.pending_key.take() {
						self.params.insert(key, value);
					}
					self.context = ParamContext::Separator;
				}
				(ParamContext::Separator, ParamToken::Comma) => {
					self.context = ParamContext::Key;
				}
				_ => {
					return Err(format!(
						"unexpected `{}` at offset {offset}",
						self.current_slice()
					));
				}
			}

			self.cursor += 1;
		}

		match self.context {
			ParamContext::Key | ParamContext::Separator => Ok(self.params),
			ParamContext::Colon | ParamContext::Value => {
				Err("unexpected end of parameters".to_string())
			}
		}
	}
}

/// Parse an include parameter literal into a flat string map. The error is a
/// human readable reason; callers attach the source location.
pub(crate) fn parse_params(source: &str) -> Result<BTreeMap<String, String>, String> {
	ParamWalker::new(source).process()
}
