use std::collections::BTreeSet;

use derive_more::Deref;
use derive_more::DerefMut;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::SourceLocation;
use crate::TxtsheetError;
use crate::TxtsheetResult;
use crate::evaluate_formula;

static DIRECTIVE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^@(\w+)(\s+(.*))?$").unwrap());

static IDENTIFIER_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());

/// Names that `@undef` never removes. `@define` accepts them.
pub const RESERVED_NAMES: [&str; 30] = [
	"break",
	"case",
	"catch",
	"continue",
	"debugger",
	"default",
	"delete",
	"do",
	"else",
	"finally",
	"for",
	"function",
	"if",
	"in",
	"instanceof",
	"new",
	"return",
	"switch",
	"this",
	"throw",
	"try",
	"typeof",
	"var",
	"void",
	"while",
	"with",
	"true",
	"false",
	"undefined",
	"null",
];

pub fn is_identifier(name: &str) -> bool {
	IDENTIFIER_REGEX.is_match(name)
}

pub fn is_reserved(name: &str) -> bool {
	RESERVED_NAMES.contains(&name)
}

/// The set of currently defined names. Each file works on its own copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref, DerefMut)]
pub struct DefineSet(
	#[deref]
	#[deref_mut]
	BTreeSet<String>,
);

impl DefineSet {
	pub fn new() -> Self {
		Self::default()
	}
}

impl<S: Into<String>> FromIterator<S> for DefineSet {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self(iter.into_iter().map(Into::into).collect())
	}
}

/// A parsed `@name argument` line. Arguments are trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
	Define(&'a str),
	Undef(&'a str),
	If(&'a str),
	Elif(&'a str),
	Else,
	End,
	Error(Option<&'a str>),
}

impl<'a> Directive<'a> {
	/// Returns `None` when the line is not a directive at all and an error
	/// when the directive word is unknown.
	pub fn parse(text: &'a str, location: &SourceLocation) -> Option<TxtsheetResult<Self>> {
		let captures = DIRECTIVE_REGEX.captures(text)?;
		let name = captures.get(1).map_or("", |m| m.as_str());
		let argument = captures.get(3).map_or("", |m| m.as_str().trim());

		let directive = match name {
			"define" => Self::Define(argument),
			"undef" => Self::Undef(argument),
			"if" => Self::If(argument),
			"elif" => Self::Elif(argument),
			"else" => Self::Else,
			"end" => Self::End,
			"error" => Self::Error((!argument.is_empty()).then_some(argument)),
			_ => {
				return Some(Err(TxtsheetError::UnknownDirective {
					name: name.to_string(),
					location: location.clone(),
				}));
			}
		};

		Some(Ok(directive))
	}

	pub fn name(&self) -> &'static str {
		match self {
			Self::Define(_) => "define",
			Self::Undef(_) => "undef",
			Self::If(_) => "if",
			Self::Elif(_) => "elif",
			Self::Else => "else",
			Self::End => "end",
			Self::Error(_) => "error",
		}
	}
}

/// One open `@if` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	/// Whether the current branch of this block is visible.
	pub condition_true: bool,
	pub else_seen: bool,
	/// Set once any branch of the block has been taken, or when the block
	/// opened inside an inactive region.
	pub branch_decided: bool,
	pub opened_at: SourceLocation,
}

/// Stack machine for the conditional compilation directives of one file.
#[derive(Debug, Clone, Default)]
pub struct DirectiveEngine {
	defines: DefineSet,
	frames: Vec<Frame>,
}

impl DirectiveEngine {
	pub fn new(defines: DefineSet) -> Self {
		Self {
			defines,
			frames: Vec::new(),
		}
	}

	/// Lines are visible only when every open frame is on a taken branch.
	pub fn is_active(&self) -> bool {
		self.frames.iter().all(|frame| frame.condition_true)
	}

	pub fn defines(&self) -> &DefineSet {
		&self.defines
	}

	pub fn frames(&self) -> &[Frame] {
		&self.frames
	}

	/// Apply a directive. Directives are processed in inactive regions too so
	/// nesting stays balanced, but only the conditional ones have an effect
	/// there.
	pub fn apply(&mut self, directive: Directive<'_>, location: &SourceLocation) -> TxtsheetResult<()> {
		match directive {
			Directive::Define(name) => self.define(name, location),
			Directive::Undef(name) => self.undef(name, location),
			Directive::If(expression) => {
				let frame = if self.is_active() {
					let result = self.evaluate(expression, location)?;
					Frame {
						condition_true: result,
						else_seen: false,
						branch_decided: result,
						opened_at: location.clone(),
					}
				} else {
					Frame {
						condition_true: false,
						else_seen: false,
						branch_decided: true,
						opened_at: location.clone(),
					}
				};

				debug!(%location, condition = frame.condition_true, "@if");
				self.frames.push(frame);
				Ok(())
			}
			Directive::Elif(expression) => {
				let Some(frame) = self.frames.last() else {
					return Err(unmatched(directive, location));
				};

				if frame.else_seen {
					return Err(TxtsheetError::ElifAfterElse {
						location: location.clone(),
					});
				}

				let result = if frame.branch_decided {
					None
				} else {
					Some(self.evaluate(expression, location)?)
				};

				if let Some(frame) = self.frames.last_mut() {
					match result {
						Some(result) => {
							frame.condition_true = result;
							frame.branch_decided = result;
						}
						None => frame.condition_true = false,
					}
					debug!(%location, condition = frame.condition_true, "@elif");
				}

				Ok(())
			}
			Directive::Else => {
				let Some(frame) = self.frames.last_mut() else {
					return Err(unmatched(directive, location));
				};

				frame.condition_true = !frame.branch_decided;
				frame.else_seen = true;
				debug!(%location, condition = frame.condition_true, "@else");
				Ok(())
			}
			Directive::End => {
				if self.frames.pop().is_none() {
					return Err(unmatched(directive, location));
				}

				Ok(())
			}
			Directive::Error(message) => {
				if !self.is_active() {
					return Ok(());
				}

				Err(TxtsheetError::User {
					message: message.unwrap_or("@error directive reached").to_string(),
					location: location.clone(),
				})
			}
		}
	}

	/// Check that every `@if` of the file was closed. The innermost open block
	/// is reported.
	pub fn finish(&self) -> TxtsheetResult<()> {
		match self.frames.last() {
			Some(frame) => {
				Err(TxtsheetError::UnclosedIf {
					location: frame.opened_at.clone(),
				})
			}
			None => Ok(()),
		}
	}

	fn define(&mut self, name: &str, location: &SourceLocation) -> TxtsheetResult<()> {
		if !self.is_active() {
			return Ok(());
		}

		validate_name("define", name, location)?;

		if self.defines.contains(name) {
			return Err(TxtsheetError::AlreadyDefined {
				name: name.to_string(),
				location: location.clone(),
			});
		}

		debug!(%location, name, "@define");
		self.defines.insert(name.to_string());
		Ok(())
	}

	fn undef(&mut self, name: &str, location: &SourceLocation) -> TxtsheetResult<()> {
		if !self.is_active() {
			return Ok(());
		}

		validate_name("undef", name, location)?;

		if !self.defines.contains(name) {
			return Err(TxtsheetError::NotDefined {
				name: name.to_string(),
				location: location.clone(),
			});
		}

		if is_reserved(name) {
			debug!(%location, name, "@undef ignored for reserved name");
		} else {
			debug!(%location, name, "@undef");
			self.defines.remove(name);
		}

		Ok(())
	}

	fn evaluate(&self, expression: &str, location: &SourceLocation) -> TxtsheetResult<bool> {
		evaluate_formula(expression, &self.defines).map_err(|source| {
			TxtsheetError::InvalidFormula {
				expression: expression.to_string(),
				source,
				location: location.clone(),
			}
		})
	}
}

fn validate_name(directive: &str, name: &str, location: &SourceLocation) -> TxtsheetResult<()> {
	if is_identifier(name) {
		return Ok(());
	}

	Err(TxtsheetError::InvalidDirectiveArgument {
		directive: directive.to_string(),
		argument: name.to_string(),
		location: location.clone(),
	})
}

fn unmatched(directive: Directive<'_>, location: &SourceLocation) -> TxtsheetError {
	TxtsheetError::UnmatchedDirective {
		directive: directive.name().to_string(),
		location: location.clone(),
	}
}
