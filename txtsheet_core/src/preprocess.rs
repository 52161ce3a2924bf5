use std::collections::BTreeMap;

use tracing::debug;
use tracing::trace;

use crate::DefineSet;
use crate::Directive;
use crate::DirectiveEngine;
use crate::IncludeDirective;
use crate::IncludePath;
use crate::ProjectLayout;
use crate::SourceFile;
use crate::SourceLine;
use crate::SourceLocation;
use crate::TemplateVariables;
use crate::TxtsheetError;
use crate::TxtsheetResult;
use crate::include_variables;
use crate::parse_include_params;
use crate::strip_comments;
use crate::substitute_variables;

/// Runs comment stripping, conditional directives and inclusion over a file
/// and everything it includes, producing the ordered line stream.
pub struct Preprocessor<'a> {
	layout: &'a ProjectLayout,
	/// Files currently being processed, outermost first.
	chain: Vec<SourceFile>,
}

impl<'a> Preprocessor<'a> {
	pub fn new(layout: &'a ProjectLayout) -> Self {
		Self {
			layout,
			chain: Vec::new(),
		}
	}

	/// Preprocess the entry file with the given top level defines and
	/// variables.
	pub fn run(
		&mut self,
		entry: &SourceFile,
		defines: DefineSet,
		variables: &TemplateVariables,
	) -> TxtsheetResult<Vec<SourceLine>> {
		self.chain.clear();
		self.process_file(entry, defines, variables)
	}

	/// Read `file` from disk, strip its comments and process its lines.
	pub fn process_file(
		&mut self,
		file: &SourceFile,
		defines: DefineSet,
		variables: &TemplateVariables,
	) -> TxtsheetResult<Vec<SourceLine>> {
		let lines = self.layout.read_source(file)?;
		self.process_lines(file, strip_comments(lines), defines, variables)
	}

	/// Process already comment-stripped lines belonging to `file`. The file
	/// gets its own directive stack, which must be balanced at the end.
	pub fn process_lines(
		&mut self,
		file: &SourceFile,
		lines: Vec<SourceLine>,
		defines: DefineSet,
		variables: &TemplateVariables,
	) -> TxtsheetResult<Vec<SourceLine>> {
		self.chain.push(file.clone());
		let result = self.process_chained(file, lines, defines, variables);
		self.chain.pop();

		result
	}

	fn process_chained(
		&mut self,
		file: &SourceFile,
		lines: Vec<SourceLine>,
		defines: DefineSet,
		variables: &TemplateVariables,
	) -> TxtsheetResult<Vec<SourceLine>> {
		let mut engine = DirectiveEngine::new(defines);
		let mut output = Vec::with_capacity(lines.len());

		for line in lines {
			if let Some(directive) = Directive::parse(&line.text, &line.location) {
				engine.apply(directive?, &line.location)?;
				continue;
			}

			if !engine.is_active() {
				trace!(location = %line.location, "skipping inactive line");
				continue;
			}

			if let Some(include) = IncludeDirective::parse(&line.text) {
				let included = self.include(
					file,
					include,
					engine.defines().clone(),
					variables,
					&line.location,
				)?;
				output.extend(included);
				continue;
			}

			output.push(line);
		}

		engine.finish()?;

		Ok(output)
	}

	fn include(
		&mut self,
		file: &SourceFile,
		include: IncludeDirective<'_>,
		defines: DefineSet,
		variables: &TemplateVariables,
		location: &SourceLocation,
	) -> TxtsheetResult<Vec<SourceLine>> {
		let path_text = substitute_variables(include.path, variables, location)?;
		let path = IncludePath::parse(&path_text).map_err(|reason| {
			TxtsheetError::InvalidIncludePath {
				path: path_text.clone(),
				reason,
				location: location.clone(),
			}
		})?;

		let params = match include.params {
			Some(params) => {
				let params = substitute_variables(params, variables, location)?;
				parse_include_params(&params, location)?
			}
			None => BTreeMap::new(),
		};

		let target = path.resolve(file, self.layout, location)?;

		if self.chain.contains(&target) {
			let chain = self
				.chain
				.iter()
				.chain(std::iter::once(&target))
				.map(ToString::to_string)
				.collect::<Vec<_>>()
				.join(" -> ");

			return Err(TxtsheetError::CircularInclude {
				chain,
				location: location.clone(),
			});
		}

		debug!(%location, %target, "including");
		let variables = include_variables(variables, params, &target);

		self.process_file(&target, defines, &variables)
	}
}
