//! Small HTML traversal helpers shared by the static-page extractors.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

pub(crate) static PARAGRAPH: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("Failed to parse paragraph selector"));

static H3: Lazy<Selector> = Lazy::new(|| Selector::parse("h3").expect("Failed to parse h3 selector"));

/// Text chunks of an element, trimmed and joined with newlines.
pub(crate) fn lines_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trimmed text of an element.
pub(crate) fn trimmed_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Non-empty trimmed `<p>` texts below `element`, in document order.
pub(crate) fn paragraphs(element: ElementRef<'_>) -> Vec<String> {
    element
        .select(&PARAGRAPH)
        .map(trimmed_text)
        .filter(|text| !text.is_empty())
        .collect()
}

/// First element that follows (in document order) the first text node
/// containing `marker`.
pub(crate) fn element_after_text<'a>(document: &'a Html, marker: &str) -> Option<ElementRef<'a>> {
    let mut nodes = document.root_element().descendants();
    nodes
        .by_ref()
        .find(|node| matches!(node.value(), Node::Text(text) if text.contains(marker)))?;
    nodes.find_map(ElementRef::wrap)
}

/// Nearest element ancestor of the first text node containing `marker`
/// that matches `tag`.
pub(crate) fn ancestor_of_text<'a>(
    document: &'a Html,
    marker: &str,
    tag: &str,
) -> Option<ElementRef<'a>> {
    let text_node = document
        .root_element()
        .descendants()
        .find(|node| matches!(node.value(), Node::Text(text) if text.contains(marker)))?;
    text_node
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().name() == tag)
}

/// Text of whatever follows the first `<h3>` mentioning `heading`.
///
/// Whitespace-only text siblings are skipped; a text sibling yields its
/// own trimmed text, an element sibling its [`lines_text`].
pub(crate) fn text_after_heading(document: &Html, heading: &str) -> Option<String> {
    let h3 = document
        .select(&H3)
        .find(|h| h.text().collect::<String>().contains(heading))?;
    for sibling in h3.next_siblings() {
        match sibling.value() {
            Node::Text(text) if text.trim().is_empty() => continue,
            Node::Text(text) => return Some(text.trim().to_string()),
            Node::Element(_) => return ElementRef::wrap(sibling).map(lines_text),
            _ => continue,
        }
    }
    None
}
