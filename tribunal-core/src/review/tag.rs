//! Structured vote tags embedded in tracker comments
//!
//! Reviewers answer by posting a comment that carries an HTML comment block:
//!
//! ```markdown
//! Looks good overall.
//!
//! <!-- tribunal:vote
//! { "value": "ACCEPT", "reviewer": "agent-7" }
//! -->
//! ```
//!
//! Only these blocks are read. The surrounding prose is never interpreted.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::VoteValue;

const START_MARKER: &str = "<!-- tribunal:vote";
const END_MARKER: &str = "-->";

/// Vote payload carried in a tracker comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTag {
    pub value: VoteValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl VoteTag {
    /// Create a tag with just a verdict
    pub fn new(value: VoteValue) -> Self {
        Self {
            value,
            reviewer: None,
            note: None,
        }
    }

    /// Parse the first valid vote tag in a comment
    pub fn parse(comment: &str) -> Option<Self> {
        Self::parse_all(comment).into_iter().next()
    }

    /// Parse every valid vote tag in a comment
    ///
    /// Blocks with invalid JSON are logged and skipped.
    pub fn parse_all(comment: &str) -> Vec<Self> {
        extract_blocks(comment)
            .into_iter()
            .filter_map(|block| match serde_json::from_str::<Self>(block) {
                Ok(tag) => {
                    debug!(?tag, "Parsed vote tag");
                    Some(tag)
                }
                Err(e) => {
                    warn!(?e, block = %block, "Failed to parse vote tag");
                    None
                }
            })
            .collect()
    }

    /// Render the tag as a comment block
    pub fn render(&self) -> String {
        // Serializing two enums and strings cannot fail
        let json = serde_json::to_string(self).unwrap_or_default();
        // `>` only occurs inside JSON strings; escaped, a note cannot close the block
        let json = json.replace('>', "\\u003e");
        format!("{}\n{}\n{}", START_MARKER, json, END_MARKER)
    }
}

/// Extract the JSON bodies of all vote blocks
fn extract_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut search_pos = 0;

    while let Some(start) = text[search_pos..].find(START_MARKER) {
        let body_start = search_pos + start + START_MARKER.len();

        let Some(end) = text[body_start..].find(END_MARKER) else {
            break;
        };

        let body = text[body_start..body_start + end].trim();
        if !body.is_empty() {
            blocks.push(body);
        }
        search_pos = body_start + end + END_MARKER.len();
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vote_tag() {
        let comment = r#"
Reviewed the test plan, fixtures are shared.

<!-- tribunal:vote
{ "value": "ACCEPT", "reviewer": "agent-b" }
-->
"#;
        let tag = VoteTag::parse(comment).unwrap();
        assert_eq!(tag.value, VoteValue::Accept);
        assert_eq!(tag.reviewer.as_deref(), Some("agent-b"));
        assert!(tag.note.is_none());
    }

    #[test]
    fn test_free_text_is_not_a_vote() {
        assert!(VoteTag::parse("ACCEPT. Looks great, approve!").is_none());
        assert!(VoteTag::parse("I would REVISE the API").is_none());
    }

    #[test]
    fn test_malformed_tag_is_skipped() {
        let comment = r#"<!-- tribunal:vote
{ "value": "MAYBE" }
-->
<!-- tribunal:vote
{ "value": "REVISE" }
-->"#;
        let tags = VoteTag::parse_all(comment);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].value, VoteValue::Revise);
    }

    #[test]
    fn test_unterminated_tag() {
        assert!(VoteTag::parse("<!-- tribunal:vote {\"value\":\"ACCEPT\"}").is_none());
    }

    #[test]
    fn test_render_parses_back() {
        let tag = VoteTag {
            value: VoteValue::Revise,
            reviewer: None,
            note: Some("split the trait".to_string()),
        };
        let rendered = tag.render();
        assert!(rendered.starts_with("<!-- tribunal:vote"));
        assert!(!rendered.contains("reviewer"));
        assert_eq!(VoteTag::parse(&rendered), Some(tag));
    }

    #[test]
    fn test_note_with_comment_terminator() {
        let tag = VoteTag {
            value: VoteValue::Revise,
            reviewer: Some("agent-c".to_string()),
            note: Some("cache --> index is wrong, and a > b".to_string()),
        };
        let rendered = tag.render();
        assert_eq!(rendered.matches("-->").count(), 1);
        assert!(rendered.ends_with("-->"));
        assert_eq!(VoteTag::parse(&rendered), Some(tag));
    }
}
