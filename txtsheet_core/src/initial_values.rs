use tracing::trace;

use crate::ColumnRule;
use crate::ColumnSettings;
use crate::Document;
use crate::InitialValue;
use crate::InitialValues;
use crate::Mapping;
use crate::Node;
use crate::NodeId;
use crate::NodeKind;
use crate::TxtsheetError;
use crate::TxtsheetResult;
use crate::Value;

/// Key of a section's yaml parameters holding its column settings.
pub const INPUT_KEY: &str = "$input";

/// Fill the initial values of every leaf item from the column settings of
/// the root and of the enclosing top level section.
pub fn resolve_initial_values(document: &mut Document) -> TxtsheetResult<()> {
	ColumnScopes::default().visit(document, NodeId::ROOT)
}

/// Settings in effect at the node being visited, outermost first.
#[derive(Default)]
struct ColumnScopes {
	orders: Vec<Vec<String>>,
	/// Each entry already includes the defaults of the scopes above it.
	defaults: Vec<Mapping>,
	rules: Vec<Vec<ColumnRule>>,
}

impl ColumnScopes {
	fn visit(&mut self, document: &mut Document, id: NodeId) -> TxtsheetResult<()> {
		let settings = column_settings(&document[id])?;
		let scoped = settings.is_some();

		if let Some(settings) = settings {
			let mut defaults = self.defaults.last().cloned().unwrap_or_default();
			defaults.extend(settings.default_values);

			self.orders.push(settings.order);
			self.defaults.push(defaults);
			self.rules.push(settings.rules);
		}

		let children = document[id].children.clone();
		if children.is_empty() {
			let node = &mut document[id];
			let values = self.values_for(&node.text);
			if let NodeKind::Item(item) = &mut node.kind {
				trace!(text = %node.text, columns = values.as_ref().map_or(0, |values| values.len()), "initial values");
				item.initial_values = values;
			}
		} else {
			for child in children {
				self.visit(document, child)?;
			}
		}

		if scoped {
			self.orders.pop();
			self.defaults.pop();
			self.rules.pop();
		}

		Ok(())
	}

	fn values_for(&self, text: &str) -> Option<InitialValues> {
		let mut values = Mapping::new();

		for rule in self.rules.iter().rev().flatten() {
			if !rule.pattern.is_match(text) {
				continue;
			}

			for (column, value) in &rule.values {
				values
					.entry(column.clone())
					.or_insert_with(|| value.clone());
			}
		}

		if let Some(defaults) = self.defaults.last() {
			for (column, value) in defaults {
				values
					.entry(column.clone())
					.or_insert_with(|| value.clone());
			}
		}

		values.retain(|_, value| !value.is_empty_string());

		if values.is_empty() {
			return None;
		}

		let order = self
			.orders
			.iter()
			.rev()
			.find(|order| !order.is_empty())
			.map(Vec::as_slice)
			.unwrap_or_default();

		let mut ordered = Vec::with_capacity(values.len());
		for column in order {
			if let Some(value) = values.remove(column) {
				ordered.push(InitialValue {
					column: column.clone(),
					value,
				});
			}
		}
		ordered.extend(
			values
				.into_iter()
				.map(|(column, value)| InitialValue { column, value }),
		);

		Some(InitialValues::new(ordered))
	}
}

/// The column settings a node introduces: the configuration's for the root,
/// the `$input` parameter for top level sections.
fn column_settings(node: &Node) -> TxtsheetResult<Option<ColumnSettings>> {
	if node.is_root() {
		return Ok(node.meta.columns.clone());
	}

	if node.level != 1 || node.header().is_none() {
		return Ok(None);
	}

	let Some(input) = node.params().and_then(|params| params.get(INPUT_KEY)) else {
		return Ok(None);
	};

	if matches!(input, Value::Null) {
		return Ok(None);
	}

	ColumnSettings::from_value(input).map(Some).map_err(|reason| {
		TxtsheetError::InvalidColumnSettings {
			reason,
			location: node.source().cloned().unwrap_or_default(),
		}
	})
}
