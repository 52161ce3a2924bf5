use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;

use derive_more::Deref;
use derive_more::DerefMut;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::trace;

use crate::ColumnGroup;
use crate::Document;
use crate::HeaderData;
use crate::ItemData;
use crate::Mapping;
use crate::Node;
use crate::NodeId;
use crate::NodeKind;
use crate::SeedConfig;
use crate::SourceLine;
use crate::SourceLocation;
use crate::TxtsheetError;
use crate::TxtsheetResult;
use crate::Value;
use crate::merge_mappings;

static HEADING_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#+)\s+(.*)$").unwrap());
static COLUMN_GROUP_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([*+-])\.\s+(.*)$").unwrap());
static ITEM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*)([*+-])\s+(.*)$").unwrap());
static MISSING_SPACE_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^\s*(#+|[*+-]|\d+\.)\S").unwrap());
static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\[([^\]]+)\]:\s+(.*)$").unwrap());

static HEADING_UID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[#([\w-]+)\]\s*(.+)$").unwrap());
static ITEM_UID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^\[#([\w-]+)\]\s*(.*)$").unwrap());
static LINK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[(.+)\]\((.+)\)$").unwrap());
static TRAILING_LINK_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?s)^(.*)\[([^\]]*)\]\(([^)]*)\)$").unwrap());
static ATTRIBUTE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^<([\w-]+)>\(([^)]*)\)\s*").unwrap());
static COMMENT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)^(.*?)\s*\[\^(.*)\]$").unwrap());
static LINE_BREAK_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r" *(?:<br>|\\n) *").unwrap());

static HEADING_REWRITE_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^(#+)(?: \[#[\w-]+\])?(.*)$").unwrap());
static ITEM_REWRITE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\s*[*+-])(.*)$").unwrap());

const YAML_FENCE_OPEN: &str = "```yaml";
const YAML_FENCE_CLOSE: &str = "```";
const SHEET_NAME_LIMIT: usize = 31;
const FORBIDDEN_SHEET_CHARACTERS: [char; 14] = [
	':', '\\', '?', '[', ']', '/', '*', '：', '￥', '？', '［', '］', '／', '＊',
];

/// A line that should get a generated id. `replacement` holds a literal
/// `{uid}` placeholder where the id goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UidRewrite {
	pub line_number: usize,
	pub original: String,
	pub replacement: String,
}

/// Rewrites grouped by `project:file`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deref, DerefMut)]
pub struct UidRewrites(
	#[deref]
	#[deref_mut]
	BTreeMap<String, Vec<UidRewrite>>,
);

impl UidRewrites {
	fn push(&mut self, line: &SourceLine, replacement: String) {
		self.0
			.entry(line.location.file_key())
			.or_default()
			.push(UidRewrite {
				line_number: line.location.line_number,
				original: line.text.clone(),
				replacement,
			});
	}
}

#[derive(Debug, Clone)]
pub struct ParseOutput {
	pub document: Document,
	pub rewrites: UidRewrites,
}

/// Build the document tree from a preprocessed line stream.
pub fn parse_lines(lines: &[SourceLine], config: &SeedConfig) -> TxtsheetResult<ParseOutput> {
	DocumentParser::new(lines, config).parse()
}

struct YamlBlock {
	start: SourceLocation,
	body: Vec<String>,
}

/// Stack based tree builder. The stack holds the chain of open nodes with
/// the root at the bottom.
struct DocumentParser<'a> {
	lines: &'a [SourceLine],
	cursor: usize,
	document: Document,
	stack: Vec<NodeId>,
	rewrites: UidRewrites,
	yaml: Option<YamlBlock>,
}

impl<'a> DocumentParser<'a> {
	fn new(lines: &'a [SourceLine], config: &SeedConfig) -> Self {
		let mut document = Document::new(config.settings.clone());
		let root = &mut document[NodeId::ROOT];
		root.variables = config.template_values.clone();
		root.meta.columns = Some(config.input.clone());

		Self {
			lines,
			cursor: 0,
			document,
			stack: vec![NodeId::ROOT],
			rewrites: UidRewrites::default(),
			yaml: None,
		}
	}

	fn parse(mut self) -> TxtsheetResult<ParseOutput> {
		while let Some(line) = self.next_line() {
			let start = self.cursor - 1;
			self.parse_line(line)?;
			self.hash_lines(start);
		}

		if let Some(block) = self.yaml.take() {
			return Err(TxtsheetError::UnclosedYamlBlock {
				location: block.start,
			});
		}

		self.finish_hashes();

		Ok(ParseOutput {
			document: self.document,
			rewrites: self.rewrites,
		})
	}

	fn next_line(&mut self) -> Option<&'a SourceLine> {
		let lines = self.lines;
		let line = lines.get(self.cursor)?;
		self.cursor += 1;
		Some(line)
	}

	fn top(&self) -> NodeId {
		self.stack.last().copied().unwrap_or(NodeId::ROOT)
	}

	fn parse_line(&mut self, line: &'a SourceLine) -> TxtsheetResult<()> {
		let text = line.text.as_str();
		let location = &line.location;

		if self.yaml.is_some() {
			if text.trim() == YAML_FENCE_CLOSE {
				return self.close_yaml_block();
			}

			if let Some(block) = &mut self.yaml {
				block.body.push(text.to_string());
			}
			return Ok(());
		}

		if let Some(captures) = HEADING_REGEX.captures(text) {
			trace!(%location, "heading");
			let level = captures[1].len();
			return self.parse_heading(line, level, &captures[2]);
		}

		if let Some(captures) = COLUMN_GROUP_REGEX.captures(text) {
			trace!(%location, "column header");
			let marker = captures[1].chars().next().unwrap_or('-');
			return self.parse_column_group(location, marker, &captures[2]);
		}

		if let Some(captures) = ITEM_REGEX.captures(text) {
			trace!(%location, "list item");
			let indent = &captures[1];
			if indent.contains(['\t', '\u{3000}']) {
				return Err(TxtsheetError::InvalidIndentCharacter {
					location: location.clone(),
				});
			}

			let marker = captures[2].chars().next().unwrap_or('-');
			return self.parse_item(line, indent.chars().count(), marker, &captures[3]);
		}

		if MISSING_SPACE_REGEX.is_match(text) {
			return Err(TxtsheetError::MissingSpaceAfterMarker {
				location: location.clone(),
			});
		}

		if text.trim() == YAML_FENCE_OPEN {
			trace!(%location, "yaml block");
			self.yaml = Some(YamlBlock {
				start: location.clone(),
				body: Vec::new(),
			});
			return Ok(());
		}

		if let Some(captures) = VARIABLE_REGEX.captures(text) {
			trace!(%location, "variable");
			let top = self.top();
			self.document[top]
				.variables
				.insert(captures[1].to_string(), Value::String(captures[2].to_string()));
		}

		Ok(())
	}

	/// Pop open nodes while `predicate` holds for the top. The root is never
	/// popped.
	fn close_while(&mut self, predicate: impl Fn(&Node) -> bool) {
		while let Some(&top) = self.stack.last() {
			if top == NodeId::ROOT || !predicate(&self.document[top]) {
				break;
			}
			self.stack.pop();
		}
	}

	fn parse_heading(&mut self, line: &SourceLine, level: usize, rest: &str) -> TxtsheetResult<()> {
		let location = &line.location;

		self.close_while(|node| {
			!(matches!(node.kind, NodeKind::Root(_) | NodeKind::Header(_)) && node.level < level)
		});

		let mut text = rest.to_string();
		let mut uid = None;
		let mut url = None;

		if level == 1 {
			if let Some(captures) = HEADING_UID_REGEX.captures(rest) {
				let id = captures[1].to_string();
				let scope = self.top();
				self.register_uid(scope, &id, location)?;
				text = captures[2].to_string();
				uid = Some(id);
			}
		} else if let Some(captures) = LINK_REGEX.captures(rest.trim()) {
			text = captures[1].trim().to_string();
			url = Some(captures[2].trim().to_string());
		}

		let text = text.trim();
		self.validate_sheet_name(text, location)?;

		let mut node = Node::new(
			NodeKind::Header(HeaderData {
				column_groups: Vec::new(),
				url,
				content_hash: None,
			}),
			level,
			text,
		);
		node.meta.source = Some(location.clone());

		if level == 1 {
			node.meta.uid_registry = Some(BTreeMap::new());
			node.meta.params = Some(Mapping::new());
			node.meta.hasher = Some(DefaultHasher::new());

			if uid.is_none() {
				if let Some(captures) = HEADING_REWRITE_REGEX.captures(&line.text) {
					let replacement = format!("{} [#{{uid}}]{}", &captures[1], &captures[2]);
					self.rewrites.push(line, replacement);
				}
			}
		}
		node.id = uid;

		let parent = self.top();
		let id = self.document.push_child(parent, node);
		self.stack.push(id);

		Ok(())
	}

	fn validate_sheet_name(&self, name: &str, location: &SourceLocation) -> TxtsheetResult<()> {
		let length = name.chars().count();
		if length > SHEET_NAME_LIMIT {
			return Err(TxtsheetError::SheetNameTooLong {
				name: name.to_string(),
				length,
				location: location.clone(),
			});
		}

		if name.contains(FORBIDDEN_SHEET_CHARACTERS) {
			return Err(TxtsheetError::InvalidSheetNameChar {
				name: name.to_string(),
				location: location.clone(),
			});
		}

		if self
			.document
			.children(NodeId::ROOT)
			.any(|sibling| sibling.text == name)
		{
			return Err(TxtsheetError::DuplicateSheetName {
				name: name.to_string(),
				location: location.clone(),
			});
		}

		Ok(())
	}

	fn parse_column_group(
		&mut self,
		location: &SourceLocation,
		marker: char,
		rest: &str,
	) -> TxtsheetResult<()> {
		let top = self.top();
		let node = &mut self.document[top];
		let misplaced = || {
			TxtsheetError::MisplacedColumnHeader {
				location: location.clone(),
			}
		};

		if node.level != 1 {
			return Err(misplaced());
		}
		let NodeKind::Header(header) = &mut node.kind else {
			return Err(misplaced());
		};

		let (name, comment) = match COMMENT_REGEX.captures(rest) {
			Some(captures) => (captures[1].trim().to_string(), Some(captures[2].to_string())),
			None => (rest.trim().to_string(), None),
		};

		match header.column_groups.last_mut() {
			Some(previous) if name.is_empty() || previous.name == name => {
				previous.size += 1;
			}
			previous => {
				let group = match previous {
					Some(previous) if previous.marker == marker => previous.group,
					Some(previous) => previous.group + 1,
					None => 0,
				};

				header.column_groups.push(ColumnGroup {
					marker,
					group,
					name,
					comment,
					size: 1,
				});
			}
		}

		Ok(())
	}

	fn parse_item(
		&mut self,
		line: &SourceLine,
		indent: usize,
		marker: char,
		body: &str,
	) -> TxtsheetResult<()> {
		let location = &line.location;

		self.close_while(|node| matches!(&node.kind, NodeKind::Item(item) if item.indent >= indent));

		let parent = self.top();
		let parent_node = &self.document[parent];
		let level = match &parent_node.kind {
			NodeKind::Item(item) => {
				if indent - item.indent < 2 {
					return Err(TxtsheetError::InsufficientIndent {
						indent,
						parent_indent: item.indent,
						location: location.clone(),
					});
				}
				parent_node.level + 1
			}
			_ => {
				if indent > 0 {
					return Err(TxtsheetError::UnexpectedIndent {
						indent,
						location: location.clone(),
					});
				}
				1
			}
		};

		let mut body = body.to_string();
		while body.trim_end().ends_with(" +") {
			let trimmed = body.trim_end();
			body = trimmed[..trimmed.len() - 2].to_string();

			let Some(next) = self.next_line() else {
				break;
			};
			body.push('\n');
			body.push_str(next.text.trim_start());
		}

		let mut rest = body.as_str();
		let mut uid = None;
		if let Some(captures) = ITEM_UID_REGEX.captures(rest) {
			let id = captures[1].to_string();
			self.register_uid(parent, &id, location)?;
			uid = Some(id);
			rest = captures.get(2).map_or("", |m| m.as_str());
		}

		let mut attributes = BTreeMap::new();
		while let Some(captures) = ATTRIBUTE_REGEX.captures(rest) {
			attributes.insert(captures[1].to_string(), captures[2].to_string());
			rest = &rest[captures[0].len()..];
		}

		let mut text = rest.to_string();
		let mut comment = None;
		let mut image_file_path = None;
		let mut url = None;

		if let Some(captures) = COMMENT_REGEX.captures(rest) {
			text = captures[1].to_string();
			let raw = LINE_BREAK_REGEX.replace_all(&captures[2], "\n").into_owned();

			match raw.strip_prefix('!').and_then(|inner| inner.strip_suffix('!')) {
				Some(path) => image_file_path = Some(path.to_string()),
				None => comment = Some(raw),
			}
		} else if let Some(captures) = TRAILING_LINK_REGEX.captures(rest) {
			text = format!("{}{}", &captures[1], &captures[2]);
			url = Some(captures[3].to_string());
		}

		if text.contains('\t') || comment.as_deref().is_some_and(|comment| comment.contains('\t')) {
			return Err(TxtsheetError::TabInText {
				location: location.clone(),
			});
		}

		let mut node = Node::new(
			NodeKind::Item(ItemData {
				indent,
				marker,
				comment,
				image_file_path,
				initial_values: None,
				attributes,
				url,
			}),
			level,
			text.trim(),
		);
		node.meta.source = Some(location.clone());

		if uid.is_none() {
			if let Some(captures) = ITEM_REWRITE_REGEX.captures(&line.text) {
				let replacement = format!("{} [#{{uid}}]{}", &captures[1], &captures[2]);
				self.rewrites.push(line, replacement);
			}
		}
		node.id = uid;

		let id = self.document.push_child(parent, node);
		self.stack.push(id);

		Ok(())
	}

	/// Record `uid` in the registry of the closest scope above `from`: the
	/// enclosing top level section, or the root.
	fn register_uid(&mut self, from: NodeId, uid: &str, location: &SourceLocation) -> TxtsheetResult<()> {
		let scope = self
			.document
			.find_ancestor(from, |node| node.meta.uid_registry.is_some())
			.unwrap_or(NodeId::ROOT);

		let Some(registry) = self.document[scope].meta.uid_registry.as_mut() else {
			return Ok(());
		};

		if let Some(first) = registry.get(uid) {
			return Err(TxtsheetError::DuplicateUid {
				uid: uid.to_string(),
				first: first.clone(),
				second: location.clone(),
			});
		}

		registry.insert(uid.to_string(), location.clone());
		Ok(())
	}

	/// Parse the finished yaml block and merge it into the parameters of the
	/// enclosing top level section, or the root.
	fn close_yaml_block(&mut self) -> TxtsheetResult<()> {
		let Some(block) = self.yaml.take() else {
			return Ok(());
		};

		let invalid = |reason: String| {
			TxtsheetError::InvalidYamlBlock {
				reason,
				location: block.start.clone(),
			}
		};

		let yaml: serde_yaml_ng::Value =
			serde_yaml_ng::from_str(&block.body.join("\n")).map_err(|e| invalid(e.to_string()))?;

		let mapping = match Value::from(yaml) {
			Value::Null => Mapping::new(),
			Value::Mapping(mapping) => mapping,
			_ => return Err(invalid("expected a mapping".to_string())),
		};

		let target = self
			.document
			.find_ancestor(self.top(), |node| node.meta.params.is_some())
			.unwrap_or(NodeId::ROOT);

		if let Some(params) = self.document[target].meta.params.as_mut() {
			merge_mappings(params, mapping);
		}

		Ok(())
	}

	/// Feed the lines consumed since `start` into the open top level
	/// section's hash.
	fn hash_lines(&mut self, start: usize) {
		let Some(section) = self.document.find_ancestor(self.top(), |node| node.meta.hasher.is_some()) else {
			return;
		};

		let lines = self.lines;
		if let Some(hasher) = self.document[section].meta.hasher.as_mut() {
			for line in &lines[start..self.cursor] {
				line.text.hash(hasher);
			}
		}
	}

	fn finish_hashes(&mut self) {
		let sections = self
			.document
			.iter()
			.filter(|(_, node)| node.meta.hasher.is_some())
			.map(|(id, _)| id)
			.collect::<Vec<_>>();

		for id in sections {
			let node = &mut self.document[id];
			let Some(hasher) = node.meta.hasher.take() else {
				continue;
			};

			if let NodeKind::Header(header) = &mut node.kind {
				header.content_hash = Some(format!("{:016x}", hasher.finish()));
			}
		}
	}
}
