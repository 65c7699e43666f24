use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Ordered text blocks produced by a tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolText(Vec<String>);

impl ToolText {
    #[must_use]
    pub fn single(text: impl Into<String>) -> Self {
        Self(vec![text.into()])
    }

    #[must_use]
    pub const fn from_blocks(blocks: Vec<String>) -> Self {
        Self(blocks)
    }

    pub fn push(&mut self, block: impl Into<String>) {
        self.0.push(block.into());
    }

    #[must_use]
    pub fn blocks(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn into_blocks(self) -> Vec<String> {
        self.0
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All blocks joined by newlines.
    #[must_use]
    pub fn joined(&self) -> String {
        self.0.join("\n")
    }
}

/// Serializes as `[{"type": "text", "text": ...}]`, the content shape both surfaces emit.
impl Serialize for ToolText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(serde::Serialize)]
        struct TextBlock<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            text: &'a str,
        }

        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for block in &self.0 {
            seq.serialize_element(&TextBlock {
                kind: "text",
                text: block,
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::ToolText;

    #[test]
    fn serializes_as_text_content_list() {
        let mut text = ToolText::single("header");
        text.push("body");

        let value = serde_json::to_value(&text).expect("tool text should serialize");
        assert_eq!(
            value,
            serde_json::json!([
                {"type": "text", "text": "header"},
                {"type": "text", "text": "body"}
            ])
        );
        assert_eq!(text.joined(), "header\nbody");
    }
}
