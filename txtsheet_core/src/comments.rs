use tracing::warn;

use crate::SourceLine;

const LINE_COMMENT: &str = "//";
const BLOCK_OPEN: &str = "/*";
const BLOCK_CLOSE: &str = "*/";

/// Remove `//` comments and then `/* */` comments from a file's lines.
/// Surviving lines keep their original location.
pub fn strip_comments(lines: Vec<SourceLine>) -> Vec<SourceLine> {
	strip_block_comments(strip_line_comments(lines))
}

/// The first `//` on a line starts a comment. A comment at column 0 drops the
/// line, otherwise the text is cut and right trimmed. A line left blank by the
/// cut is dropped as well.
///
/// Note that `//` inside a url is also treated as a comment.
pub fn strip_line_comments(lines: Vec<SourceLine>) -> Vec<SourceLine> {
	lines
		.into_iter()
		.filter_map(|mut line| {
			let Some(index) = line.text.find(LINE_COMMENT) else {
				return Some(line);
			};

			if index == 0 {
				return None;
			}

			let kept = line.text[..index].trim_end();
			if kept.is_empty() {
				return None;
			}

			line.text = kept.to_string();
			Some(line)
		})
		.collect()
}

/// Drop lines covered by `/* */` comments using a single depth counter.
///
/// - a line opening a comment without closing it increments the depth
/// - a line closing a comment without opening one decrements the depth, or
///   is dropped with a warning at depth zero
/// - a line that opens and then closes a comment is dropped
/// - every line is dropped while the depth is positive
///
/// Opening lines are dropped themselves. A closing line is kept once the
/// depth is back to zero. Nesting is counted and never structurally
/// validated.
pub fn strip_block_comments(lines: Vec<SourceLine>) -> Vec<SourceLine> {
	let mut depth: usize = 0;
	let mut kept = Vec::with_capacity(lines.len());

	for line in lines {
		let open = line.text.find(BLOCK_OPEN);
		let close = line.text.find(BLOCK_CLOSE);

		match (open, close) {
			(Some(_), None) => {
				depth += 1;
			}
			(None, Some(_)) => {
				if depth == 0 {
					warn!(location = %line.location, "ignoring `*/` without a matching `/*`");
				} else {
					depth -= 1;
					if depth == 0 {
						kept.push(line);
					}
				}
			}
			(Some(open), Some(close)) if open < close => {}
			_ => {
				if depth == 0 {
					kept.push(line);
				}
			}
		}
	}

	kept
}
