//! Block markup parser and serializer.
//!
//! Documents store blocks as HTML comments delimiting ordinary markup:
//!
//! ```text
//! <!-- wp:custom/card {"title":"T"} -->
//! <li><div class="card"><p>T</p></div></li>
//! <!-- /wp:custom/card -->
//! <!-- wp:separator /-->
//! ```
//!
//! Names without a namespace belong to `core`. Markup found between
//! top-level blocks becomes a nameless freeform node. Blocks still open at
//! the end of input are closed implicitly.
//!
//! Attribute JSON is matched lazily up to the first `}` followed by
//! whitespace and `-->`, so attribute strings must not contain that
//! sequence. The serializer escapes `--`, `<`, `>` and `&` inside attribute
//! JSON, which keeps its own output parseable.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::BlockNode;

static DELIMITER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<!--\s+(?P<closer>/)?wp:(?P<ns>[a-z][a-z0-9_-]*/)?(?P<name>[a-z][a-z0-9_-]*)\s+(?P<attrs>\{.*?\}\s+)?(?P<void>/)?-->",
    )
    .expect("block delimiter pattern is valid")
});

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid attributes for block {block} at byte {offset}: {source}")]
    InvalidAttributes {
        block: String,
        offset: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("closing delimiter for {found} at byte {offset} does not match open block {expected}")]
    MismatchedCloser {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("closing delimiter for {found} at byte {offset} has no open block")]
    UnexpectedCloser { found: String, offset: usize },
}

/// Parse a document's raw markup into its top-level blocks.
pub fn parse_blocks(document: &str) -> Result<Vec<BlockNode>, ParseError> {
    let mut output: Vec<BlockNode> = Vec::new();
    let mut stack: Vec<BlockNode> = Vec::new();
    let mut cursor = 0usize;

    for caps in DELIMITER.captures_iter(document) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        push_text(&mut stack, &mut output, &document[cursor..whole.start()]);
        cursor = whole.end();

        let name = format!(
            "{}{}",
            caps.name("ns").map_or("core/", |m| m.as_str()),
            caps.name("name").map_or("", |m| m.as_str()),
        );

        if caps.name("closer").is_some() {
            let Some(open) = stack.pop() else {
                return Err(ParseError::UnexpectedCloser {
                    found: name,
                    offset: whole.start(),
                });
            };
            if open.block_name() != name {
                return Err(ParseError::MismatchedCloser {
                    expected: open.block_name().to_string(),
                    found: name,
                    offset: whole.start(),
                });
            }
            attach(&mut stack, &mut output, open);
            continue;
        }

        let attrs = match caps.name("attrs") {
            Some(raw) => serde_json::from_str::<Map<String, Value>>(raw.as_str().trim()).map_err(
                |source| ParseError::InvalidAttributes {
                    block: name.clone(),
                    offset: whole.start(),
                    source,
                },
            )?,
            None => Map::new(),
        };

        let node = BlockNode::named(name, attrs);
        if caps.name("void").is_some() {
            attach(&mut stack, &mut output, node);
        } else {
            stack.push(node);
        }
    }

    push_text(&mut stack, &mut output, &document[cursor..]);

    while let Some(open) = stack.pop() {
        tracing::debug!(block = open.block_name(), "closing unterminated block at end of input");
        attach(&mut stack, &mut output, open);
    }

    Ok(output)
}

fn push_text(stack: &mut [BlockNode], output: &mut Vec<BlockNode>, text: &str) {
    if text.is_empty() {
        return;
    }
    match stack.last_mut() {
        Some(open) => {
            open.inner_html.push_str(text);
            open.inner_content.push(Some(text.to_string()));
        }
        None if !text.trim().is_empty() => output.push(BlockNode::freeform(text)),
        None => {}
    }
}

fn attach(stack: &mut [BlockNode], output: &mut Vec<BlockNode>, node: BlockNode) {
    match stack.last_mut() {
        Some(parent) => {
            parent.inner_blocks.push(node);
            parent.inner_content.push(None);
        }
        None => output.push(node),
    }
}

/// Serialize blocks back into stored markup.
///
/// Adjacent top-level blocks are separated by a blank line. Freeform nodes
/// already carry their surrounding whitespace and are written verbatim with
/// no separator, so repeated parse and serialize cycles are stable.
pub fn serialize_blocks(blocks: &[BlockNode]) -> String {
    let mut out = String::new();
    let mut previous: Option<&BlockNode> = None;
    for block in blocks {
        if previous.is_some_and(|prev| !prev.is_freeform()) && !block.is_freeform() {
            out.push_str("\n\n");
        }
        serialize_block(block, &mut out);
        previous = Some(block);
    }
    out
}

fn serialize_block(block: &BlockNode, out: &mut String) {
    if block.is_freeform() {
        out.push_str(&block.inner_html);
        return;
    }

    let name = block
        .block_name()
        .strip_prefix("core/")
        .unwrap_or(block.block_name());
    let attrs = if block.attrs.is_empty() {
        String::new()
    } else {
        format!("{} ", escape_attrs(&Value::Object(block.attrs.clone()).to_string()))
    };

    if block.inner_content.is_empty() {
        out.push_str(&format!("<!-- wp:{name} {attrs}/-->"));
        return;
    }

    out.push_str(&format!("<!-- wp:{name} {attrs}-->"));
    let mut children = block.inner_blocks.iter();
    for fragment in &block.inner_content {
        match fragment {
            Some(markup) => out.push_str(markup),
            None => {
                if let Some(child) = children.next() {
                    serialize_block(child, out);
                }
            }
        }
    }
    out.push_str(&format!("<!-- /wp:{name} -->"));
}

fn escape_attrs(json: &str) -> String {
    json.replace("--", "\\u002d\\u002d")
        .replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_blocks_with_placeholders() {
        let doc = r#"<!-- wp:group {"layout":{"type":"flex"}} -->
<div class="wp-block-group"><!-- wp:paragraph -->
<p>Hello</p>
<!-- /wp:paragraph --></div>
<!-- /wp:group -->"#;
        let blocks = parse_blocks(doc).unwrap();
        assert_eq!(blocks.len(), 1);

        let group = &blocks[0];
        assert_eq!(group.block_name(), "core/group");
        assert_eq!(group.attrs["layout"]["type"], "flex");
        assert_eq!(group.inner_blocks.len(), 1);
        assert_eq!(group.inner_content.len(), 3);
        assert!(group.inner_content[1].is_none());
        assert_eq!(group.stored_markup(), "<div class=\"wp-block-group\"></div>");

        let paragraph = &group.inner_blocks[0];
        assert_eq!(paragraph.block_name(), "core/paragraph");
        assert_eq!(paragraph.stored_markup(), "<p>Hello</p>");
    }

    #[test]
    fn void_blocks_have_no_inner_content() {
        let blocks = parse_blocks(r#"<!-- wp:custom/latest {"count":3} /-->"#).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_name(), "custom/latest");
        assert_eq!(blocks[0].attrs["count"], 3);
        assert!(blocks[0].inner_content.is_empty());
    }

    #[test]
    fn freeform_gaps_become_nameless_nodes() {
        let doc = "<p>legacy</p>\n<!-- wp:separator /-->\n\n";
        let blocks = parse_blocks(doc).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].is_freeform());
        assert_eq!(blocks[0].inner_html, "<p>legacy</p>\n");
        assert_eq!(blocks[1].block_name(), "core/separator");
    }

    #[test]
    fn unterminated_blocks_close_at_end() {
        let blocks = parse_blocks("<!-- wp:quote --><blockquote>x</blockquote>").unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].stored_markup(), "<blockquote>x</blockquote>");
    }

    #[test]
    fn invalid_attribute_json_is_an_error() {
        let err = parse_blocks("<!-- wp:custom/card {\"a\": } --><p></p><!-- /wp:custom/card -->")
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidAttributes { .. }));
    }

    #[test]
    fn mismatched_and_stray_closers_are_errors() {
        let err = parse_blocks("<!-- wp:group --><!-- /wp:column -->").unwrap_err();
        assert!(matches!(err, ParseError::MismatchedCloser { .. }));

        let err = parse_blocks("<p>x</p><!-- /wp:group -->").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedCloser { .. }));
    }

    #[test]
    fn serializer_output_parses_to_the_same_tree() {
        let doc = r#"<!-- wp:group -->
<div><!-- wp:custom/card {"title":"a -- <b>"} -->
<li>T</li>
<!-- /wp:custom/card --></div>
<!-- /wp:group -->

<!-- wp:separator /-->"#;
        let first = parse_blocks(doc).unwrap();
        let written = serialize_blocks(&first);
        assert!(written.contains("\\u002d\\u002d"));
        let second = parse_blocks(&written).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn freeform_gaps_do_not_grow_across_cycles() {
        let doc = "<p>legacy</p>\n<!-- wp:separator /-->\n<p>tail</p>\n\n<!-- wp:separator /-->";
        let once = serialize_blocks(&parse_blocks(doc).unwrap());
        assert_eq!(once, doc);
        let twice = serialize_blocks(&parse_blocks(&once).unwrap());
        assert_eq!(twice, once);
    }
}
