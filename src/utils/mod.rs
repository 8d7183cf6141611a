//! Utility functions and helpers.

pub mod http;

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};

/// Parse a CSS selector.
pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AppError::parse(format!("invalid selector '{css}': {e}")))
}

/// Text content of an element with whitespace runs (including non-breaking
/// spaces) collapsed to single spaces.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Content of the document's `<title>`, if any.
pub fn page_title(document: &Html) -> Option<String> {
    let title = Selector::parse("title").ok()?;
    document.select(&title).next().map(|t| element_text(&t))
}

/// Value of `attr` on the first element matching `css`.
pub fn first_attr(document: &Html, css: &str, attr: &str) -> Result<Option<String>> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .next()
        .and_then(|e| e.value().attr(attr))
        .map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_title() {
        let doc = Html::parse_document(
            "<html><head><title> Note din  sesiunea curenta </title></head></html>",
        );
        assert_eq!(
            page_title(&doc),
            Some("Note din sesiunea curenta".to_string())
        );
        assert_eq!(page_title(&Html::parse_document("<p>x</p>")), None);
    }

    #[test]
    fn test_element_text_collapses_nbsp() {
        let doc = Html::parse_fragment("<span>Baze&nbsp;de   date</span>");
        let sel = selector("span").unwrap();
        let span = doc.select(&sel).next().unwrap();
        assert_eq!(element_text(&span), "Baze de date");
    }

    #[test]
    fn test_first_attr() {
        let doc = Html::parse_document(
            r#"<form name="frmData"><input name="sid" value="ABC123"></form>"#,
        );
        assert_eq!(
            first_attr(&doc, r#"input[name="sid"]"#, "value").unwrap(),
            Some("ABC123".to_string())
        );
        assert_eq!(first_attr(&doc, "input[name=\"x\"]", "value").unwrap(), None);
    }

    #[test]
    fn test_invalid_selector() {
        assert!(matches!(selector("td[["), Err(AppError::Parse(_))));
    }
}
