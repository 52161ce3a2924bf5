use std::collections::BTreeSet;

use thiserror::Error;

use crate::lexer::FormulaToken;
use crate::lexer::Spanned;
use crate::lexer::tokenize_formula;

/// Failure while lexing or evaluating a boolean condition. Offsets are byte
/// offsets into the expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
	#[error("unexpected character `{found}` at offset {offset}")]
	UnexpectedCharacter { found: String, offset: usize },
	#[error("unexpected token `{found}` at offset {offset}")]
	UnexpectedToken { found: String, offset: usize },
	#[error("unmatched parenthesis at offset {offset}")]
	UnmatchedParenthesis { offset: usize },
	#[error("unexpected end of expression")]
	UnexpectedEnd,
}

/// Recursive descent evaluator for `@if` and `@elif` conditions.
///
/// ```text
/// expr    := or
/// or      := and ('||' and)*
/// and     := not ('&&' not)*
/// not     := '!' not | primary
/// primary := '(' expr ')' | 'true' | 'false' | IDENT
/// ```
///
/// Both operands of a binary operator are always evaluated so the cursor
/// walks every token of the expression.
pub struct FormulaEvaluator<'a> {
	source: &'a str,
	tokens: Vec<Spanned<FormulaToken>>,
	cursor: usize,
	defines: &'a BTreeSet<String>,
}

impl<'a> FormulaEvaluator<'a> {
	pub fn new(source: &'a str, defines: &'a BTreeSet<String>) -> Result<Self, FormulaError> {
		let tokens = tokenize_formula(source)?;

		Ok(Self {
			source,
			tokens,
			cursor: 0,
			defines,
		})
	}

	/// Evaluate the whole expression. Tokens left over after a complete
	/// expression are an error.
	pub fn evaluate(&mut self) -> Result<bool, FormulaError> {
		let value = self.parse_or()?;

		if let Some((token, span)) = self.tokens.get(self.cursor) {
			if *token == FormulaToken::CloseParen {
				return Err(FormulaError::UnmatchedParenthesis { offset: span.start });
			}

			return Err(FormulaError::UnexpectedToken {
				found: self.source[span.clone()].to_string(),
				offset: span.start,
			});
		}

		Ok(value)
	}

	/// Index of the next unread token.
	pub fn cursor(&self) -> usize {
		self.cursor
	}

	pub fn token_count(&self) -> usize {
		self.tokens.len()
	}

	fn peek(&self) -> Option<FormulaToken> {
		self.tokens.get(self.cursor).map(|(token, _)| *token)
	}

	fn parse_or(&mut self) -> Result<bool, FormulaError> {
		let mut value = self.parse_and()?;

		while self.peek() == Some(FormulaToken::Or) {
			self.cursor += 1;
			let rhs = self.parse_and()?;
			value |= rhs;
		}

		Ok(value)
	}

	fn parse_and(&mut self) -> Result<bool, FormulaError> {
		let mut value = self.parse_not()?;

		while self.peek() == Some(FormulaToken::And) {
			self.cursor += 1;
			let rhs = self.parse_not()?;
			value &= rhs;
		}

		Ok(value)
	}

	fn parse_not(&mut self) -> Result<bool, FormulaError> {
		if self.peek() == Some(FormulaToken::Not) {
			self.cursor += 1;
			return Ok(!self.parse_not()?);
		}

		self.parse_primary()
	}

	fn parse_primary(&mut self) -> Result<bool, FormulaError> {
		let Some((token, span)) = self.tokens.get(self.cursor).cloned() else {
			return Err(FormulaError::UnexpectedEnd);
		};
		self.cursor += 1;

		match token {
			FormulaToken::True => Ok(true),
			FormulaToken::False => Ok(false),
			FormulaToken::Ident => Ok(self.defines.contains(&self.source[span])),
			FormulaToken::OpenParen => {
				let value = self.parse_or()?;

				match self.peek() {
					Some(FormulaToken::CloseParen) => {
						self.cursor += 1;
						Ok(value)
					}
					_ => Err(FormulaError::UnmatchedParenthesis { offset: span.start }),
				}
			}
			FormulaToken::CloseParen => Err(FormulaError::UnmatchedParenthesis { offset: span.start }),
			FormulaToken::Or | FormulaToken::And | FormulaToken::Not => {
				Err(FormulaError::UnexpectedToken {
					found: self.source[span.clone()].to_string(),
					offset: span.start,
				})
			}
		}
	}
}

/// Evaluate `expression` against the set of defined names.
pub fn evaluate_formula(expression: &str, defines: &BTreeSet<String>) -> Result<bool, FormulaError> {
	FormulaEvaluator::new(expression, defines)?.evaluate()
}
