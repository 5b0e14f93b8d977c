//! Depth-first extraction of leaf work items from a structured document.
//!
//! Every heading below the document title opens a grouping; the first
//! checklist after it is that grouping's task tree. Nodes with a nested
//! checklist only contribute to the title chain; nodes without one become
//! [`WorkItem`]s in document order.

use std::collections::{BTreeMap, HashSet};

use crate::annotate::{parse_annotations, FieldValue};
use crate::markup::{Block, Document, ListItem, MarkupConverter};

pub const TITLE_SEPARATOR: &str = ": ";

/// A leaf unit of work, ready for creation on the remote tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// Ancestor labels and the leaf label, cleaned and joined by `": "`.
    pub title: String,
    /// Nearest enclosing section heading, casing preserved.
    pub grouping: String,
    /// Lower-cased canonical field keys from the leaf's annotations.
    pub fields: BTreeMap<String, FieldValue>,
    pub body: String,
}

/// Lazily walks `document`, yielding work items in document order. Single
/// forward pass; walking again requires a fresh iterator.
pub fn work_items<'a, C: MarkupConverter>(
    document: &'a Document,
    converter: &'a C,
) -> WorkItems<'a, C> {
    WorkItems {
        converter,
        blocks: document.blocks.iter(),
        grouping: None,
        consumed: false,
        stack: Vec::new(),
    }
}

pub struct WorkItems<'a, C: MarkupConverter> {
    converter: &'a C,
    blocks: std::slice::Iter<'a, Block>,
    grouping: Option<String>,
    /// Whether the current grouping's checklist has already been taken.
    consumed: bool,
    stack: Vec<(&'a ListItem, String)>,
}

impl<'a, C: MarkupConverter> Iterator for WorkItems<'a, C> {
    type Item = WorkItem;

    fn next(&mut self) -> Option<WorkItem> {
        loop {
            if let Some((node, prefix)) = self.stack.pop() {
                let (cleaned, fields) = parse_annotations(&node.text);
                let title = if prefix.is_empty() {
                    cleaned
                } else {
                    format!("{prefix}{TITLE_SEPARATOR}{cleaned}")
                };
                if let Some(children) = node.nested.iter().find(|list| list.is_checklist()) {
                    // Branch node: extends the title chain, emits nothing.
                    for child in children.items.iter().rev() {
                        self.stack.push((child, title.clone()));
                    }
                    continue;
                }
                let grouping = self.grouping.clone().unwrap_or_default();
                let body = extract_body(node, self.converter);
                return Some(WorkItem {
                    title,
                    grouping,
                    fields,
                    body,
                });
            }

            match self.blocks.next()? {
                Block::Heading { level, text } => {
                    // The document's own title heading opens no grouping.
                    self.grouping = (*level >= 2).then(|| text.clone());
                    self.consumed = false;
                }
                Block::List(list) => {
                    if self.grouping.is_some() && !self.consumed && list.is_checklist() {
                        self.consumed = true;
                        for item in list.items.iter().rev() {
                            self.stack.push((item, String::new()));
                        }
                    }
                }
            }
        }
    }
}

/// Derives a leaf's body from its first nested non-checklist list: one item
/// collapses to plain text, several render back to native markup.
fn extract_body<C: MarkupConverter>(node: &ListItem, converter: &C) -> String {
    let Some(list) = node.nested.iter().find(|list| !list.is_checklist()) else {
        return String::new();
    };
    match list.items.as_slice() {
        [] => String::new(),
        [only] => only.text.clone(),
        _ => converter.render_list(list),
    }
}

/// Distinct grouping labels in document order, first-seen casing preserved.
pub fn grouping_labels(document: &Document) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut labels = Vec::new();
    for block in &document.blocks {
        if let Block::Heading { level, text } = block {
            if *level >= 2 && seen.insert(text.to_lowercase()) {
                labels.push(text.clone());
            }
        }
    }
    labels
}
