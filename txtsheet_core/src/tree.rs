use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::ops::Index;
use std::ops::IndexMut;

use derive_more::Deref;
use derive_more::DerefMut;
use serde::Serialize;
use serde::ser::SerializeMap;

use crate::ColumnSettings;
use crate::Mapping;
use crate::RootSettings;
use crate::SourceLocation;
use crate::Value;

/// Index of a node in its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
	pub const ROOT: Self = Self(0);

	pub fn index(self) -> usize {
		self.0
	}
}

/// One entry of a section's column header list (`-. name` lines).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnGroup {
	pub marker: char,
	/// Increments whenever the marker character changes.
	pub group: usize,
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
	/// Number of consecutive lines merged into this entry.
	pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderData {
	pub column_groups: Vec<ColumnGroup>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	/// Hex hash of the source lines of a top level section.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitialValue {
	pub column: String,
	pub value: Value,
}

/// Resolved column values of an item, in column order. Serializes as an
/// ordered map.
#[derive(Debug, Clone, Default, PartialEq, Deref, DerefMut)]
pub struct InitialValues(
	#[deref]
	#[deref_mut]
	Vec<InitialValue>,
);

impl InitialValues {
	pub fn new(values: Vec<InitialValue>) -> Self {
		Self(values)
	}

	pub fn get(&self, column: &str) -> Option<&Value> {
		self.0
			.iter()
			.find(|entry| entry.column == column)
			.map(|entry| &entry.value)
	}

	pub fn columns(&self) -> impl Iterator<Item = &str> {
		self.0.iter().map(|entry| entry.column.as_str())
	}
}

impl Serialize for InitialValues {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.0.len()))?;
		for entry in &self.0 {
			map.serialize_entry(&entry.column, &entry.value)?;
		}
		map.end()
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemData {
	pub indent: usize,
	pub marker: char,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub comment: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub image_file_path: Option<String>,
	/// `None` until resolved, and when no column receives a value.
	pub initial_values: Option<InitialValues>,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub attributes: BTreeMap<String, String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
	Root(RootSettings),
	Header(HeaderData),
	Item(ItemData),
}

impl NodeKind {
	pub fn name(&self) -> &'static str {
		match self {
			Self::Root(_) => "root",
			Self::Header(_) => "header",
			Self::Item(_) => "item",
		}
	}
}

/// Per-node state used while building and resolving the tree. Never
/// serialized.
#[derive(Debug, Clone, Default)]
pub(crate) struct NodeMeta {
	/// Uid to first definition, on the root and on top level headers.
	pub uid_registry: Option<BTreeMap<String, SourceLocation>>,
	/// Merged yaml blocks, on the root and on top level headers.
	pub params: Option<Mapping>,
	pub source: Option<SourceLocation>,
	/// Column settings taken from the configuration, on the root only.
	pub columns: Option<ColumnSettings>,
	/// Running hash of a top level section's lines.
	pub hasher: Option<DefaultHasher>,
}

#[derive(Debug, Clone)]
pub struct Node {
	pub kind: NodeKind,
	/// 0 for the root; the heading depth for headers; the nesting depth below
	/// the closest header for items.
	pub level: usize,
	pub id: Option<String>,
	pub text: String,
	pub variables: Mapping,
	pub children: Vec<NodeId>,
	/// Used for upward scope lookups only.
	pub parent: Option<NodeId>,
	pub(crate) meta: NodeMeta,
}

impl Node {
	pub(crate) fn new(kind: NodeKind, level: usize, text: impl Into<String>) -> Self {
		Self {
			kind,
			level,
			id: None,
			text: text.into(),
			variables: Mapping::new(),
			children: Vec::new(),
			parent: None,
			meta: NodeMeta::default(),
		}
	}

	pub fn is_root(&self) -> bool {
		matches!(self.kind, NodeKind::Root(_))
	}

	pub fn header(&self) -> Option<&HeaderData> {
		match &self.kind {
			NodeKind::Header(header) => Some(header),
			_ => None,
		}
	}

	pub fn item(&self) -> Option<&ItemData> {
		match &self.kind {
			NodeKind::Item(item) => Some(item),
			_ => None,
		}
	}

	pub fn root_settings(&self) -> Option<&RootSettings> {
		match &self.kind {
			NodeKind::Root(settings) => Some(settings),
			_ => None,
		}
	}

	/// The source line that created this node.
	pub fn source(&self) -> Option<&SourceLocation> {
		self.meta.source.as_ref()
	}

	/// Merged yaml parameters of the root or a top level section.
	pub fn params(&self) -> Option<&Mapping> {
		self.meta.params.as_ref()
	}
}

/// The document tree, stored as an arena. The root is always [`NodeId::ROOT`].
#[derive(Debug, Clone)]
pub struct Document {
	nodes: Vec<Node>,
}

impl Document {
	pub fn new(settings: RootSettings) -> Self {
		let mut root = Node::new(NodeKind::Root(settings), 0, "");
		root.meta.uid_registry = Some(BTreeMap::new());
		root.meta.params = Some(Mapping::new());

		Self { nodes: vec![root] }
	}

	pub fn root(&self) -> &Node {
		&self.nodes[NodeId::ROOT.0]
	}

	pub fn get(&self, id: NodeId) -> Option<&Node> {
		self.nodes.get(id.0)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Every node with its id, in creation order (which is document order).
	pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
		self.nodes
			.iter()
			.enumerate()
			.map(|(index, node)| (NodeId(index), node))
	}

	pub fn children(&self, id: NodeId) -> impl Iterator<Item = &Node> {
		self.nodes[id.0]
			.children
			.iter()
			.map(|child| &self.nodes[child.0])
	}

	pub(crate) fn push_child(&mut self, parent: NodeId, mut node: Node) -> NodeId {
		let id = NodeId(self.nodes.len());
		node.parent = Some(parent);
		self.nodes.push(node);
		self.nodes[parent.0].children.push(id);
		id
	}

	/// `id` followed by each of its ancestors up to the root.
	pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
		std::iter::successors(Some(id), |current| self.nodes[current.0].parent)
	}

	pub fn find_ancestor(&self, id: NodeId, predicate: impl Fn(&Node) -> bool) -> Option<NodeId> {
		self.ancestors(id).find(|ancestor| predicate(&self.nodes[ancestor.0]))
	}

	fn view(&self, id: NodeId) -> NodeView<'_> {
		let node = &self.nodes[id.0];
		let data = match &node.kind {
			NodeKind::Root(settings) => NodeDataView::Root(settings),
			NodeKind::Header(header) => NodeDataView::Header(header),
			NodeKind::Item(item) => NodeDataView::Item(item),
		};

		NodeView {
			kind: node.kind.name(),
			level: node.level,
			id: node.id.as_deref(),
			text: &node.text,
			variables: &node.variables,
			data,
			children: node.children.iter().map(|child| self.view(*child)).collect(),
		}
	}
}

impl Index<NodeId> for Document {
	type Output = Node;

	fn index(&self, id: NodeId) -> &Self::Output {
		&self.nodes[id.0]
	}
}

impl IndexMut<NodeId> for Document {
	fn index_mut(&mut self, id: NodeId) -> &mut Self::Output {
		&mut self.nodes[id.0]
	}
}

impl Serialize for Document {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.view(NodeId::ROOT).serialize(serializer)
	}
}

/// Nested form of a node used for output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeView<'a> {
	kind: &'static str,
	level: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	id: Option<&'a str>,
	text: &'a str,
	variables: &'a Mapping,
	#[serde(flatten)]
	data: NodeDataView<'a>,
	children: Vec<NodeView<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum NodeDataView<'a> {
	Root(&'a RootSettings),
	Header(&'a HeaderData),
	Item(&'a ItemData),
}
