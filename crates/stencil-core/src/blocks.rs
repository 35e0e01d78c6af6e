//! Block and deviation markers in generated files
//!
//! Generated files may carry marker comments that survive re-rendering:
//!
//! ```text
//! ///Block(imports)
//! custom content kept across renders
//! ///EndBlock(imports)
//! ```
//!
//! Recognised comment prefixes are `///`, `###`, and `<!---`. A
//! `deviation` marker anywhere in a file tells the renderer to leave the
//! whole file untouched.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::{CoreError, Result};

fn marker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(///|###|<!---)\s*([a-zA-Z]+)\(([a-zA-Z0-9_\- ]+)\)")
            .expect("marker pattern is valid")
    })
}

/// Parse the preserved blocks out of a previously generated file
///
/// Returns a map of block name to body. Nested blocks and mismatched
/// `EndBlock` markers are fatal and name the file and line.
pub fn parse_blocks(file: &str, contents: &str) -> Result<BTreeMap<String, String>> {
    let mut blocks = BTreeMap::new();
    let mut current: Option<String> = None;

    for (i, line) in contents.lines().enumerate() {
        let line_number = i + 1;
        let mut is_command = false;

        if let Some(captures) = marker_pattern().captures(line) {
            let command = &captures[2];
            let name = captures[3].to_string();

            match command {
                "Block" => {
                    if let Some(open) = &current {
                        return Err(CoreError::BlockSyntax {
                            message: format!(
                                "invalid Block({name}) when already inside of block {open:?}"
                            ),
                            file: file.to_string(),
                            line: line_number,
                        });
                    }
                    current = Some(name);
                    is_command = true;
                }
                "EndBlock" => {
                    match current.take() {
                        Some(open) if open == name => {}
                        Some(open) => {
                            return Err(CoreError::BlockSyntax {
                                message: format!(
                                    "invalid EndBlock, found EndBlock with name {name:?} while inside of block with name {open:?}"
                                ),
                                file: file.to_string(),
                                line: line_number,
                            });
                        }
                        None => {
                            return Err(CoreError::BlockSyntax {
                                message: "invalid EndBlock when not inside of a block".to_string(),
                                file: file.to_string(),
                                line: line_number,
                            });
                        }
                    }
                    is_command = true;
                }
                _ => {}
            }
        }

        if is_command {
            continue;
        }

        if let Some(name) = &current {
            let body: &mut String = blocks.entry(name.clone()).or_default();
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(line);
        }
    }

    Ok(blocks)
}

/// Whether a file carries a deviation marker
pub fn has_deviation(contents: &str) -> bool {
    contents.lines().any(|line| {
        marker_pattern()
            .captures(line)
            .map(|c| c[2].eq_ignore_ascii_case("deviation"))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blocks_basic() {
        let contents = "\
package main

///Block(imports)
import \"fmt\"
///EndBlock(imports)

### Block(config)
key: value
other: line
### EndBlock(config)
";
        let blocks = parse_blocks("main.go", contents).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks["imports"], "import \"fmt\"");
        assert_eq!(blocks["config"], "key: value\nother: line");
    }

    #[test]
    fn test_parse_blocks_html_comment_form() {
        let contents = "<!--- Block(body)\nhello\n<!--- EndBlock(body)\n";
        let blocks = parse_blocks("index.html", contents).unwrap();
        assert_eq!(blocks["body"], "hello");
    }

    #[test]
    fn test_parse_blocks_empty_for_plain_file() {
        let blocks = parse_blocks("notes.txt", "no markers here\n").unwrap();
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_nested_block_is_fatal() {
        let contents = "///Block(a)\n///Block(b)\n///EndBlock(b)\n///EndBlock(a)\n";
        let err = parse_blocks("file.go", contents).unwrap_err();
        match err {
            CoreError::BlockSyntax { file, line, .. } => {
                assert_eq!(file, "file.go");
                assert_eq!(line, 2);
            }
            other => panic!("expected BlockSyntax, got {other:?}"),
        }
    }

    #[test]
    fn test_mismatched_endblock_is_fatal() {
        let contents = "///Block(a)\n///EndBlock(b)\n";
        let err = parse_blocks("file.go", contents).unwrap_err();
        assert!(err.to_string().contains("file.go:2"));
        assert!(err.to_string().contains("EndBlock"));
    }

    #[test]
    fn test_endblock_outside_block_is_fatal() {
        let err = parse_blocks("file.go", "///EndBlock(a)\n").unwrap_err();
        assert!(err
            .to_string()
            .contains("invalid EndBlock when not inside of a block"));
    }

    #[test]
    fn test_deviation_detection() {
        assert!(has_deviation("fn main() {}\n///deviation(keep my edits)\n"));
        assert!(has_deviation("### Deviation(handled manually)\n"));
        assert!(!has_deviation("///Block(a)\n///EndBlock(a)\n"));
        assert!(!has_deviation("plain file\n"));
    }
}
