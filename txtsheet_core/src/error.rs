use miette::Diagnostic;
use thiserror::Error;

use crate::FormulaError;
use crate::SourceLocation;

/// Broad classification of a [`TxtsheetError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
	/// Malformed directive, expression, include path or line grammar.
	Syntax,
	/// Unbalanced conditional blocks and define bookkeeping.
	Scope,
	/// Missing include targets and unresolved template variables.
	Resolution,
	/// Heading, indentation, uid and text rules of the document tree.
	Validation,
	/// Raised deliberately by an `@error` directive.
	User,
	/// Reading files from disk.
	Io,
	/// The seed configuration handed to the pipeline.
	Config,
}

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum TxtsheetError {
	#[error("failed to read `{path}`: {source}")]
	#[diagnostic(code(txtsheet::io_error))]
	Io {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid configuration: {0}")]
	#[diagnostic(
		code(txtsheet::config),
		help("check the `$rootDirectory`, `$templateValues` and `$input` keys of the config file")
	)]
	Config(String),

	#[error("`{path}` is not inside a project source directory")]
	#[diagnostic(
		code(txtsheet::entry_outside_source_tree),
		help("entry files must live at `<root>/<project>/source/<path>`")
	)]
	EntryOutsideSourceTree { path: String },

	#[error("invalid condition `{expression}` at {location}: {source}")]
	#[diagnostic(
		code(txtsheet::invalid_formula),
		help("conditions support identifiers, `true`, `false`, `!`, `&&`, `||` and parentheses")
	)]
	InvalidFormula {
		expression: String,
		#[source]
		source: FormulaError,
		location: SourceLocation,
	},

	#[error("unknown directive `@{name}` at {location}")]
	#[diagnostic(
		code(txtsheet::unknown_directive),
		help("available directives: define, undef, if, elif, else, end, error")
	)]
	UnknownDirective {
		name: String,
		location: SourceLocation,
	},

	#[error("invalid argument `{argument}` for `@{directive}` at {location}")]
	#[diagnostic(
		code(txtsheet::invalid_directive_argument),
		help("names must start with a letter or `_` followed by letters, digits or `_`")
	)]
	InvalidDirectiveArgument {
		directive: String,
		argument: String,
		location: SourceLocation,
	},

	#[error("invalid include path `{path}` at {location}: {reason}")]
	#[diagnostic(code(txtsheet::invalid_include_path))]
	InvalidIncludePath {
		path: String,
		reason: String,
		location: SourceLocation,
	},

	#[error("invalid include parameters `{params}` at {location}: {reason}")]
	#[diagnostic(
		code(txtsheet::invalid_include_params),
		help("parameters are written as `key:\"value\", other:'value'`")
	)]
	InvalidIncludeParams {
		params: String,
		reason: String,
		location: SourceLocation,
	},

	#[error("missing space after list or heading marker at {location}")]
	#[diagnostic(code(txtsheet::missing_space_after_marker))]
	MissingSpaceAfterMarker { location: SourceLocation },

	#[error("invalid yaml block starting at {location}: {reason}")]
	#[diagnostic(code(txtsheet::invalid_yaml_block))]
	InvalidYamlBlock {
		reason: String,
		location: SourceLocation,
	},

	#[error("yaml block starting at {location} is never closed")]
	#[diagnostic(
		code(txtsheet::unclosed_yaml_block),
		help("close the block with a line containing only ```")
	)]
	UnclosedYamlBlock { location: SourceLocation },

	#[error("`@{directive}` at {location} has no matching `@if`")]
	#[diagnostic(code(txtsheet::unmatched_directive))]
	UnmatchedDirective {
		directive: String,
		location: SourceLocation,
	},

	#[error("`@elif` at {location} appears after `@else`")]
	#[diagnostic(code(txtsheet::elif_after_else))]
	ElifAfterElse { location: SourceLocation },

	#[error("unclosed `@if` opened at {location}")]
	#[diagnostic(code(txtsheet::unclosed_if), help("add a matching `@end`"))]
	UnclosedIf { location: SourceLocation },

	#[error("`{name}` is already defined ({location})")]
	#[diagnostic(code(txtsheet::already_defined))]
	AlreadyDefined {
		name: String,
		location: SourceLocation,
	},

	#[error("`{name}` is not defined ({location})")]
	#[diagnostic(code(txtsheet::not_defined))]
	NotDefined {
		name: String,
		location: SourceLocation,
	},

	#[error("include file `{file_name}` not found in `{source_directory}` ({location})")]
	#[diagnostic(code(txtsheet::include_not_found))]
	IncludeNotFound {
		source_directory: String,
		file_name: String,
		location: SourceLocation,
	},

	#[error("template variable `{key}` is not set ({location})")]
	#[diagnostic(
		code(txtsheet::variable_not_found),
		help("pass the value as an include parameter or through `$templateValues`")
	)]
	VariableNotFound {
		key: String,
		location: SourceLocation,
	},

	#[error("circular include `{chain}` at {location}")]
	#[diagnostic(code(txtsheet::circular_include))]
	CircularInclude {
		chain: String,
		location: SourceLocation,
	},

	#[error("{feature} is not implemented ({location})")]
	#[diagnostic(
		code(txtsheet::not_implemented),
		help("prefix the path with `/` to read the project from the root directory only")
	)]
	NotImplemented {
		feature: String,
		location: SourceLocation,
	},

	#[error("sheet name `{name}` is {length} characters long (limit: 31) at {location}")]
	#[diagnostic(code(txtsheet::sheet_name_too_long))]
	SheetNameTooLong {
		name: String,
		length: usize,
		location: SourceLocation,
	},

	#[error("sheet name `{name}` contains a forbidden character at {location}")]
	#[diagnostic(
		code(txtsheet::invalid_sheet_name_char),
		help("sheet names cannot contain `:` `\\` `?` `[` `]` `/` `*` or their full-width forms")
	)]
	InvalidSheetNameChar {
		name: String,
		location: SourceLocation,
	},

	#[error("sheet name `{name}` is already used ({location})")]
	#[diagnostic(code(txtsheet::duplicate_sheet_name))]
	DuplicateSheetName {
		name: String,
		location: SourceLocation,
	},

	#[error("duplicate id `#{uid}`: first defined at {first}, defined again at {second}")]
	#[diagnostic(
		code(txtsheet::duplicate_uid),
		help("ids must be unique within a top level section")
	)]
	DuplicateUid {
		uid: String,
		first: SourceLocation,
		second: SourceLocation,
	},

	#[error("text contains a tab character at {location}")]
	#[diagnostic(code(txtsheet::tab_in_text))]
	TabInText { location: SourceLocation },

	#[error("list items must be indented with half-width spaces ({location})")]
	#[diagnostic(code(txtsheet::invalid_indent_character))]
	InvalidIndentCharacter { location: SourceLocation },

	#[error("list item indented by {indent} without a parent item at {location}")]
	#[diagnostic(code(txtsheet::unexpected_indent))]
	UnexpectedIndent {
		indent: usize,
		location: SourceLocation,
	},

	#[error(
		"list item indent {indent} must exceed its parent's indent {parent_indent} by at least 2 \
		 ({location})"
	)]
	#[diagnostic(code(txtsheet::insufficient_indent))]
	InsufficientIndent {
		indent: usize,
		parent_indent: usize,
		location: SourceLocation,
	},

	#[error("column header line at {location} must directly follow a top level heading")]
	#[diagnostic(code(txtsheet::misplaced_column_header))]
	MisplacedColumnHeader { location: SourceLocation },

	#[error("invalid column settings for the section at {location}: {reason}")]
	#[diagnostic(code(txtsheet::invalid_column_settings))]
	InvalidColumnSettings {
		reason: String,
		location: SourceLocation,
	},

	#[error("@error: {message} ({location})")]
	#[diagnostic(code(txtsheet::user_error))]
	User {
		message: String,
		location: SourceLocation,
	},
}

impl TxtsheetError {
	pub fn category(&self) -> ErrorCategory {
		match self {
			Self::Io { .. } => ErrorCategory::Io,
			Self::Config(_) => ErrorCategory::Config,
			Self::InvalidFormula { .. }
			| Self::UnknownDirective { .. }
			| Self::InvalidDirectiveArgument { .. }
			| Self::InvalidIncludePath { .. }
			| Self::InvalidIncludeParams { .. }
			| Self::MissingSpaceAfterMarker { .. }
			| Self::InvalidYamlBlock { .. }
			| Self::UnclosedYamlBlock { .. } => ErrorCategory::Syntax,
			Self::UnmatchedDirective { .. }
			| Self::ElifAfterElse { .. }
			| Self::UnclosedIf { .. }
			| Self::AlreadyDefined { .. }
			| Self::NotDefined { .. } => ErrorCategory::Scope,
			Self::EntryOutsideSourceTree { .. }
			| Self::IncludeNotFound { .. }
			| Self::VariableNotFound { .. }
			| Self::CircularInclude { .. }
			| Self::NotImplemented { .. } => ErrorCategory::Resolution,
			Self::SheetNameTooLong { .. }
			| Self::InvalidSheetNameChar { .. }
			| Self::DuplicateSheetName { .. }
			| Self::DuplicateUid { .. }
			| Self::TabInText { .. }
			| Self::InvalidIndentCharacter { .. }
			| Self::UnexpectedIndent { .. }
			| Self::InsufficientIndent { .. }
			| Self::MisplacedColumnHeader { .. }
			| Self::InvalidColumnSettings { .. } => ErrorCategory::Validation,
			Self::User { .. } => ErrorCategory::User,
		}
	}

	/// The source line the error originated from, when there is one. For a
	/// duplicate uid this is the second definition.
	pub fn location(&self) -> Option<&SourceLocation> {
		match self {
			Self::Io { .. } | Self::Config(_) | Self::EntryOutsideSourceTree { .. } => None,
			Self::DuplicateUid { second, .. } => Some(second),
			Self::InvalidFormula { location, .. }
			| Self::UnknownDirective { location, .. }
			| Self::InvalidDirectiveArgument { location, .. }
			| Self::InvalidIncludePath { location, .. }
			| Self::InvalidIncludeParams { location, .. }
			| Self::MissingSpaceAfterMarker { location }
			| Self::InvalidYamlBlock { location, .. }
			| Self::UnclosedYamlBlock { location }
			| Self::UnmatchedDirective { location, .. }
			| Self::ElifAfterElse { location }
			| Self::UnclosedIf { location }
			| Self::AlreadyDefined { location, .. }
			| Self::NotDefined { location, .. }
			| Self::IncludeNotFound { location, .. }
			| Self::VariableNotFound { location, .. }
			| Self::CircularInclude { location, .. }
			| Self::NotImplemented { location, .. }
			| Self::SheetNameTooLong { location, .. }
			| Self::InvalidSheetNameChar { location, .. }
			| Self::DuplicateSheetName { location, .. }
			| Self::TabInText { location }
			| Self::InvalidIndentCharacter { location }
			| Self::UnexpectedIndent { location, .. }
			| Self::InsufficientIndent { location, .. }
			| Self::MisplacedColumnHeader { location }
			| Self::InvalidColumnSettings { location, .. }
			| Self::User { location, .. } => Some(location),
		}
	}

	pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.as_ref().display().to_string(),
			source,
		}
	}
}

pub type TxtsheetResult<T> = Result<T, TxtsheetError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
