//! Structured document tree and the markup converter boundary.
//!
//! The import engine never touches raw markdown itself: it consumes a
//! [`Document`] produced by a [`MarkupConverter`] and hands list subtrees
//! back to the converter when a body needs re-rendering. The production
//! implementation is backed by pulldown-cmark; tests may substitute their
//! own converter or feed an already-structured JSON tree.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parsed document: the flat block sequence the walker iterates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Heading { level: u8, text: String },
    List(List),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct List {
    #[serde(default)]
    pub ordered: bool,
    #[serde(default)]
    pub items: Vec<ListItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub text: String,
    /// Whether the item carried a task marker (`[ ]` / `[x]`).
    #[serde(default)]
    pub task: bool,
    #[serde(default)]
    pub nested: Vec<List>,
}

impl List {
    /// A checklist is any list carrying at least one task marker.
    pub fn is_checklist(&self) -> bool {
        self.items.iter().any(|item| item.task)
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("input is neither markdown text nor a structured document tree")]
    UnsupportedInput,
}

/// Conversion between the document's native textual form and the structured
/// tree. Implementations must be pure: same bytes in, same tree out.
pub trait MarkupConverter {
    /// Parses raw input into a [`Document`]. Accepts native markup or an
    /// already-structured (JSON) tree.
    fn to_tree(&self, input: &[u8]) -> Result<Document, ConvertError>;

    /// Renders a list subtree back into the document's native markup.
    fn render_list(&self, list: &List) -> String;
}

/// CommonMark converter with task-list support.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkConverter;

impl CmarkConverter {
    pub fn new() -> Self {
        Self
    }
}

impl MarkupConverter for CmarkConverter {
    fn to_tree(&self, input: &[u8]) -> Result<Document, ConvertError> {
        let text = std::str::from_utf8(input).map_err(|_| ConvertError::UnsupportedInput)?;
        if text.trim_start().starts_with('{') {
            // Already-structured form: a JSON-serialised tree is taken verbatim.
            if let Ok(document) = serde_json::from_str(text) {
                return Ok(document);
            }
        }
        Ok(parse_markdown(text))
    }

    fn render_list(&self, list: &List) -> String {
        let mut rendered = String::new();
        render_into(list, 0, &mut rendered);
        rendered
    }
}

fn parse_markdown(text: &str) -> Document {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TASKLISTS);

    let mut blocks = Vec::new();
    let mut lists: Vec<List> = Vec::new();
    let mut items: Vec<ListItem> = Vec::new();
    let mut heading: Option<(u8, String)> = None;

    for event in Parser::new_ext(text, options) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level as u8, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = heading.take() {
                    blocks.push(Block::Heading {
                        level,
                        text: text.trim().to_string(),
                    });
                }
            }
            Event::Start(Tag::List(start)) => {
                lists.push(List {
                    ordered: start.is_some(),
                    items: Vec::new(),
                });
            }
            Event::End(TagEnd::List(_)) => {
                if let Some(list) = lists.pop() {
                    match items.last_mut() {
                        Some(parent) => parent.nested.push(list),
                        None => blocks.push(Block::List(list)),
                    }
                }
            }
            Event::Start(Tag::Item) => items.push(ListItem::default()),
            Event::End(TagEnd::Item) => {
                if let Some(mut item) = items.pop() {
                    item.text = item.text.trim().to_string();
                    if let Some(list) = lists.last_mut() {
                        list.items.push(item);
                    }
                }
            }
            Event::TaskListMarker(_) => {
                if let Some(item) = items.last_mut() {
                    item.task = true;
                }
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, buffer)) = heading.as_mut() {
                    buffer.push_str(&text);
                } else if let Some(item) = items.last_mut() {
                    item.text.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some(item) = items.last_mut() {
                    if !item.text.is_empty() {
                        item.text.push(' ');
                    }
                }
            }
            _ => {}
        }
    }

    Document { blocks }
}

fn render_into(list: &List, depth: usize, out: &mut String) {
    for (index, item) in list.items.iter().enumerate() {
        for _ in 0..depth {
            out.push_str("  ");
        }
        if list.ordered {
            out.push_str(&format!("{}. {}\n", index + 1, item.text));
        } else {
            out.push_str(&format!("- {}\n", item.text));
        }
        for nested in &item.nested {
            render_into(nested, depth + 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# Plan

## Sprint 1

- [ ] Fix bug
  - See root cause
- [ ] Epic
  - [ ] Subtask
";

    #[test]
    fn markdown_parses_into_headings_and_lists() {
        let document = CmarkConverter::new().to_tree(DOC.as_bytes()).unwrap();
        assert_eq!(document.blocks.len(), 3);
        assert_eq!(
            document.blocks[0],
            Block::Heading {
                level: 1,
                text: "Plan".into()
            }
        );
        assert_eq!(
            document.blocks[1],
            Block::Heading {
                level: 2,
                text: "Sprint 1".into()
            }
        );
        let Block::List(list) = &document.blocks[2] else {
            panic!("expected list block");
        };
        assert!(list.is_checklist());
        assert_eq!(list.items.len(), 2);
        assert_eq!(list.items[0].text, "Fix bug");
        // The body line nests as a plain (non-checklist) list.
        assert_eq!(list.items[0].nested.len(), 1);
        assert!(!list.items[0].nested[0].is_checklist());
        // The subtask nests as a checklist.
        assert!(list.items[1].nested[0].is_checklist());
    }

    #[test]
    fn plain_list_is_not_a_checklist() {
        let document = CmarkConverter::new().to_tree(b"- one\n- two\n").unwrap();
        let Block::List(list) = &document.blocks[0] else {
            panic!("expected list block");
        };
        assert!(!list.is_checklist());
    }

    #[test]
    fn structured_json_tree_is_accepted() {
        let original = CmarkConverter::new().to_tree(DOC.as_bytes()).unwrap();
        let encoded = serde_json::to_vec(&original).unwrap();
        let decoded = CmarkConverter::new().to_tree(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn non_utf8_input_is_unsupported() {
        let error = CmarkConverter::new().to_tree(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(error, ConvertError::UnsupportedInput));
    }

    #[test]
    fn renders_unordered_list() {
        let list = List {
            ordered: false,
            items: vec![
                ListItem {
                    text: "one".into(),
                    ..Default::default()
                },
                ListItem {
                    text: "two".into(),
                    ..Default::default()
                },
            ],
        };
        assert_eq!(CmarkConverter::new().render_list(&list), "- one\n- two\n");
    }

    #[test]
    fn renders_ordered_list_with_nesting() {
        let list = List {
            ordered: true,
            items: vec![ListItem {
                text: "outer".into(),
                task: false,
                nested: vec![List {
                    ordered: false,
                    items: vec![ListItem {
                        text: "inner".into(),
                        ..Default::default()
                    }],
                }],
            }],
        };
        assert_eq!(
            CmarkConverter::new().render_list(&list),
            "1. outer\n  - inner\n"
        );
    }
}
