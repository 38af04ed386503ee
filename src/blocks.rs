//! Content blocks written to vocabulary entries.
//!
//! [`Block`] models only what entries need; [`Block::to_wire`] converts it
//! into the workspace's JSON block format. Keeping the two apart lets the
//! resolver be exercised against [`memory`](crate::memory) without any
//! JSON handling.

use serde_json::{json, Value};

use crate::models::Sense;

/// Heading of the section cross-references are appended under.
pub const CONTEXTS_HEADING: &str = "Contexts";

/// A run of text inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RichText {
    pub content: String,
    pub link: Option<String>,
    pub bold: bool,
    pub italic: bool,
}

impl RichText {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn linked(content: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            link: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn to_wire(&self) -> Value {
        let mut text = json!({ "content": self.content });
        if let Some(url) = &self.link {
            text["link"] = json!({ "url": url });
        }
        json!({
            "type": "text",
            "text": text,
            "annotations": { "bold": self.bold, "italic": self.italic },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading {
        level: u8,
        text: Vec<RichText>,
        /// Toggle headings may nest children.
        children: Vec<Block>,
    },
    Paragraph(Vec<RichText>),
    BulletedItem(Vec<RichText>),
    Embed { url: String },
    Divider,
}

impl Block {
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Block::Heading {
            level,
            text: vec![RichText::plain(text)],
            children: Vec::new(),
        }
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph(vec![RichText::plain(text)])
    }

    /// Serialize into the workspace block format.
    pub fn to_wire(&self) -> Value {
        match self {
            Block::Heading {
                level,
                text,
                children,
            } => {
                let key = format!("heading_{}", (*level).clamp(1, 3));
                let mut body = json!({
                    "rich_text": rich_text_wire(text),
                    "color": "default",
                    "is_toggleable": !children.is_empty(),
                });
                if !children.is_empty() {
                    body["children"] = Value::Array(children.iter().map(Block::to_wire).collect());
                }
                let mut wire = json!({ "object": "block", "type": key.clone() });
                wire[key.as_str()] = body;
                wire
            }
            Block::Paragraph(text) => json!({
                "object": "block",
                "type": "paragraph",
                "paragraph": { "rich_text": rich_text_wire(text) },
            }),
            Block::BulletedItem(text) => json!({
                "object": "block",
                "type": "bulleted_list_item",
                "bulleted_list_item": { "rich_text": rich_text_wire(text) },
            }),
            Block::Embed { url } => json!({
                "object": "block",
                "type": "embed",
                "embed": { "url": url },
            }),
            Block::Divider => json!({
                "object": "block",
                "type": "divider",
                "divider": {},
            }),
        }
    }
}

fn rich_text_wire(runs: &[RichText]) -> Value {
    Value::Array(runs.iter().map(RichText::to_wire).collect())
}

/// Serialize a block list for a request body.
pub fn to_wire_list(blocks: &[Block]) -> Value {
    Value::Array(blocks.iter().map(Block::to_wire).collect())
}

/// The cross-reference appended to an entry for each unit occurrence.
pub fn cross_reference(text: &str, url: &str) -> Block {
    Block::Paragraph(vec![RichText::linked(text, url)])
}

/// Body of a new entry: one group per sense, then the contexts section.
pub fn entry_body(senses: &[Sense]) -> Vec<Block> {
    let mut blocks = Vec::new();

    for (i, sense) in senses.iter().enumerate() {
        if i > 0 {
            blocks.push(Block::Divider);
        }
        blocks.push(Block::heading(2, sense.headword.clone()));

        for pr in &sense.pronunciations {
            if let Some(phonetic) = &pr.phonetic {
                blocks.push(Block::Paragraph(vec![RichText::plain(format!(
                    "\\{}\\",
                    phonetic
                ))
                .italic()]));
            }
            if let Some(url) = &pr.audio_url {
                blocks.push(Block::Embed { url: url.clone() });
            }
        }

        if !sense.part_of_speech.is_empty() {
            blocks.push(Block::Paragraph(vec![
                RichText::plain(sense.part_of_speech.clone()).bold()
            ]));
        }

        for definition in &sense.definitions {
            blocks.push(Block::BulletedItem(vec![RichText::plain(definition.clone())]));
        }
    }

    blocks.push(Block::heading(1, CONTEXTS_HEADING));
    blocks
}
