//! OCR engine result shapes.
//!
//! Engines report text in one of two layouts depending on their generation:
//!
//! * structured: a list of page objects, each with a `rec_texts` array
//!   (optionally wrapped as `{"res": {...}}`);
//! * legacy: a list of pages, each `null` or a list of
//!   `[region, [text, confidence]]` lines. Single-page engines may return the
//!   lines without the page list.
//!
//! The JSON kind of the first element decides which layout is parsed. Anything
//! else is rejected instead of being read as empty text.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum OcrResult {
    /// The engine returned no pages at all.
    Empty,
    Structured(Vec<StructuredPage>),
    Legacy(Vec<Vec<LegacyLine>>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredPage {
    pub rec_texts: Vec<String>,
    pub rec_scores: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyLine {
    pub region: Value,
    pub text: String,
    pub confidence: Option<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum OcrShapeError {
    #[error("expected a list of pages, got {0}")]
    NotAList(&'static str),

    #[error("page {index} is {found}, expected {expected}")]
    UnexpectedPage {
        index: usize,
        found: &'static str,
        expected: &'static str,
    },

    #[error("page {0} has no `rec_texts` field")]
    MissingRecTexts(usize),

    #[error("page {page}, fragment {index} is not a string")]
    BadFragment { page: usize, index: usize },

    #[error("page {page}, line {index} has no `[text, confidence]` pair")]
    BadLegacyLine { page: usize, index: usize },
}

impl OcrResult {
    /// Classify a raw engine result.
    pub fn from_value(value: Value) -> Result<Self, OcrShapeError> {
        let pages = match value {
            Value::Null => return Ok(OcrResult::Empty),
            Value::Array(pages) => pages,
            // A single structured page returned without the outer list.
            obj @ Value::Object(_) => vec![obj],
            other => return Err(OcrShapeError::NotAList(kind_of(&other))),
        };

        let Some(first) = pages.first() else {
            return Ok(OcrResult::Empty);
        };

        if is_legacy_line(first) {
            return parse_legacy_page(0, Value::Array(pages)).map(|lines| OcrResult::Legacy(vec![lines]));
        }

        match first {
            Value::Object(_) => pages
                .into_iter()
                .enumerate()
                .map(|(index, page)| parse_structured_page(index, page))
                .collect::<Result<Vec<_>, _>>()
                .map(OcrResult::Structured),
            Value::Array(_) | Value::Null => pages
                .into_iter()
                .enumerate()
                .map(|(index, page)| parse_legacy_page(index, page))
                .collect::<Result<Vec<_>, _>>()
                .map(OcrResult::Legacy),
            other => Err(OcrShapeError::UnexpectedPage {
                index: 0,
                found: kind_of(other),
                expected: "an object or a list",
            }),
        }
    }

    /// All recognised fragments, in engine order.
    pub fn fragments(&self) -> Vec<&str> {
        match self {
            OcrResult::Empty => Vec::new(),
            OcrResult::Structured(pages) => pages
                .iter()
                .flat_map(|page| page.rec_texts.iter().map(String::as_str))
                .collect(),
            OcrResult::Legacy(pages) => pages
                .iter()
                .flat_map(|lines| lines.iter().map(|line| line.text.as_str()))
                .collect(),
        }
    }

    /// Fragments joined with single spaces, trimmed.
    pub fn text(&self) -> String {
        self.fragments().join(" ").trim().to_string()
    }

    pub fn shape(&self) -> &'static str {
        match self {
            OcrResult::Empty => "empty",
            OcrResult::Structured(_) => "structured",
            OcrResult::Legacy(_) => "legacy",
        }
    }
}

fn parse_structured_page(index: usize, page: Value) -> Result<StructuredPage, OcrShapeError> {
    let Value::Object(mut map) = page else {
        return Err(OcrShapeError::UnexpectedPage {
            index,
            found: kind_of(&page),
            expected: "an object",
        });
    };

    if !map.contains_key("rec_texts") {
        if let Some(Value::Object(inner)) = map.remove("res") {
            map = inner;
        }
    }

    let texts = match map.remove("rec_texts") {
        Some(Value::Array(texts)) => texts,
        _ => return Err(OcrShapeError::MissingRecTexts(index)),
    };

    let rec_texts = texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| match text {
            Value::String(s) => Ok(s),
            _ => Err(OcrShapeError::BadFragment { page: index, index: i }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let rec_scores = match map.get("rec_scores") {
        Some(Value::Array(scores)) => scores.iter().filter_map(Value::as_f64).collect(),
        _ => Vec::new(),
    };

    Ok(StructuredPage {
        rec_texts,
        rec_scores,
    })
}

fn parse_legacy_page(index: usize, page: Value) -> Result<Vec<LegacyLine>, OcrShapeError> {
    let lines = match page {
        Value::Null => return Ok(Vec::new()),
        Value::Array(lines) => lines,
        other => {
            return Err(OcrShapeError::UnexpectedPage {
                index,
                found: kind_of(&other),
                expected: "a list of lines",
            })
        }
    };

    let mut parsed = Vec::with_capacity(lines.len());
    for (i, line) in lines.into_iter().enumerate() {
        let Value::Array(mut parts) = line else {
            return Err(OcrShapeError::BadLegacyLine { page: index, index: i });
        };
        if parts.len() < 2 {
            continue;
        }
        let recognition = parts.swap_remove(1);
        let region = parts.swap_remove(0);
        let (text, confidence) = match recognition {
            Value::Array(pair) => match pair.first() {
                Some(Value::String(text)) => (text.clone(), pair.get(1).and_then(Value::as_f64)),
                _ => return Err(OcrShapeError::BadLegacyLine { page: index, index: i }),
            },
            _ => return Err(OcrShapeError::BadLegacyLine { page: index, index: i }),
        };
        parsed.push(LegacyLine {
            region,
            text,
            confidence,
        });
    }
    Ok(parsed)
}

/// `[region, [text, confidence]]`: a line rather than a page of lines.
fn is_legacy_line(value: &Value) -> bool {
    let Some(recognition) = value.get(1).and_then(Value::as_array) else {
        return false;
    };
    matches!(
        recognition.as_slice(),
        [Value::String(_), Value::Number(_), ..]
    )
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn structured_fragments_join_with_spaces() {
        let raw = json!([{ "rec_texts": ["Invoice", "#123"], "rec_scores": [0.99, 0.97] }]);
        let result = OcrResult::from_value(raw).unwrap();
        assert_eq!(result.shape(), "structured");
        assert_eq!(result.text(), "Invoice #123");
    }

    #[test]
    fn legacy_line_extracts_text() {
        let region = json!([[0, 0], [10, 0], [10, 5], [0, 5]]);
        let raw = json!([[[region, ["Total: $50", 0.98]]]]);
        let result = OcrResult::from_value(raw).unwrap();
        assert_eq!(result.shape(), "legacy");
        assert_eq!(result.text(), "Total: $50");
        if let OcrResult::Legacy(pages) = result {
            assert_eq!(pages[0][0].confidence, Some(0.98));
        }
    }

    #[test]
    fn single_page_lines_without_page_list() {
        let raw = json!([[[[0, 0], [10, 0], [10, 5], [0, 5]], ["Total: $50", 0.98]]]);
        let result = OcrResult::from_value(raw).unwrap();
        assert_eq!(result.shape(), "legacy");
        assert_eq!(result.text(), "Total: $50");

        let raw = json!([
            [[[0, 0]], ["Invoice", 0.9]],
            [[[0, 9]], ["#123", 0.8]]
        ]);
        let result = OcrResult::from_value(raw).unwrap();
        assert_eq!(result.text(), "Invoice #123");
        if let OcrResult::Legacy(pages) = result {
            assert_eq!(pages.len(), 1);
            assert_eq!(pages[0].len(), 2);
        }
    }

    #[test]
    fn legacy_line_that_is_not_a_list_is_rejected() {
        let raw = json!([[[[[0, 0]], ["kept", 0.5]], "stray"]]);
        assert_eq!(
            OcrResult::from_value(raw).unwrap_err(),
            OcrShapeError::BadLegacyLine { page: 0, index: 1 }
        );
    }

    #[test]
    fn structured_page_wrapped_in_res() {
        let raw = json!([{ "res": { "rec_texts": ["A", "B"] } }]);
        assert_eq!(OcrResult::from_value(raw).unwrap().text(), "A B");
    }

    #[test]
    fn empty_and_null_results_give_empty_text() {
        assert_eq!(OcrResult::from_value(json!([])).unwrap(), OcrResult::Empty);
        assert_eq!(OcrResult::from_value(Value::Null).unwrap(), OcrResult::Empty);
        assert_eq!(OcrResult::from_value(json!([null])).unwrap().text(), "");
    }

    #[test]
    fn legacy_skips_short_lines() {
        let raw = json!([[[[0, 0]], ["kept", 0.5]], ["short"], []]);
        let raw = json!([raw]);
        assert_eq!(OcrResult::from_value(raw).unwrap().text(), "kept");
    }

    #[test]
    fn text_is_trimmed() {
        let raw = json!([{ "rec_texts": ["  leading", "trailing  "] }]);
        assert_eq!(OcrResult::from_value(raw).unwrap().text(), "leading trailing");
    }

    #[test]
    fn rejects_object_without_rec_texts() {
        let err = OcrResult::from_value(json!([{ "boxes": [] }])).unwrap_err();
        assert_eq!(err, OcrShapeError::MissingRecTexts(0));
    }

    #[test]
    fn rejects_scalar_results() {
        assert!(matches!(
            OcrResult::from_value(json!("text")),
            Err(OcrShapeError::NotAList(_))
        ));
        assert!(matches!(
            OcrResult::from_value(json!([42])),
            Err(OcrShapeError::UnexpectedPage { index: 0, .. })
        ));
    }

    #[test]
    fn rejects_mixed_page_kinds() {
        let raw = json!([{ "rec_texts": ["a"] }, [["box", ["b", 0.1]]]]);
        assert!(OcrResult::from_value(raw).is_err());
    }
}
