pub mod flatten;
pub mod types;

use serde_yaml::Value;
use types::Header;

pub struct FrontmatterParser;

impl FrontmatterParser {
    /// Split a markdown document into its raw frontmatter block and the body
    pub fn split(content: &str) -> (Option<&str>, &str) {
        let content = content.trim_start_matches('\u{feff}');
        if !content.starts_with("---") {
            return (None, content);
        }

        // Find the closing ---
        match content[3..].find("\n---") {
            Some(end_idx) => {
                let yaml_str = &content[3..end_idx + 3];
                let body_start = end_idx + 3 + 4; // skip "\n---"
                let body = if body_start < content.len() {
                    content[body_start..].trim_start_matches(['\r', '\n'])
                } else {
                    ""
                };
                (Some(yaml_str), body)
            }
            // No closing ---, treat as no frontmatter
            None => (None, content),
        }
    }

    /// Parse a markdown file into its header and body.
    /// A document without a frontmatter block yields `None`.
    pub fn parse(content: &str) -> Result<(Option<Header>, String), String> {
        let (yaml_str, body) = Self::split(content);
        let header = match yaml_str {
            Some(raw) => Self::parse_yaml(raw)?,
            None => None,
        };
        Ok((header, body.to_string()))
    }

    /// Parse only the frontmatter from YAML string.
    /// Blank or non-mapping frontmatter (a bare scalar or list) is not a header.
    pub fn parse_yaml(yaml_str: &str) -> Result<Option<Header>, String> {
        let value: Value = serde_yaml::from_str(yaml_str)
            .map_err(|e| format!("Failed to parse frontmatter: {}", e))?;

        match value {
            Value::Mapping(mapping) => Ok(Some(Header::from_mapping(mapping))),
            Value::Tagged(tagged) => match tagged.value {
                Value::Mapping(mapping) => Ok(Some(Header::from_mapping(mapping))),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }
}
