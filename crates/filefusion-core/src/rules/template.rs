//! Destination path templates such as `Images/{date}` or `Archive/{$type}`.

use std::fmt;

use crate::attributes::{Attribute, FileAttributes};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(Attribute),
}

/// A compiled destination template. `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(format!("unclosed placeholder '{{{}'", name)),
                        }
                    }
                    let attribute = Attribute::from_name(name.trim())
                        .ok_or_else(|| format!("unknown placeholder '{{{}}}'", name))?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(attribute));
                }
                '}' => return Err("single '}' in template".to_string()),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn render(&self, attrs: &FileAttributes) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Placeholder(attribute) => attrs.render(*attribute),
            })
            .collect()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> FileAttributes {
        FileAttributes::from_parts(
            1024 * 1024,
            ".mov".to_string(),
            "2024-03-10".to_string(),
            "video/quicktime".to_string(),
        )
    }

    #[test]
    fn test_render_placeholders() {
        let template = Template::parse("Images/{date}").unwrap();
        assert_eq!(template.render(&attrs()), "Images/2024-03-10");

        let template = Template::parse("Archive/{$type}/{app}").unwrap();
        assert_eq!(template.render(&attrs()), "Archive/.mov/video/quicktime");
    }

    #[test]
    fn test_render_escaped_braces() {
        let template = Template::parse("{{raw}}/{size}").unwrap();
        assert_eq!(template.render(&attrs()), "{raw}/1.0");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Template::parse("Docs/{owner}").is_err());
        assert!(Template::parse("Docs/{date").is_err());
        assert!(Template::parse("Docs}").is_err());
    }

    #[test]
    fn test_plain_template() {
        let template = Template::parse("Documents").unwrap();
        assert_eq!(template.render(&attrs()), "Documents");
        assert_eq!(template.to_string(), "Documents");
    }
}
