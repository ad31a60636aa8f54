//! Dynamic index templates.
//!
//! A template is literal text interleaved with `${...}` references. Only two
//! reference forms exist:
//!
//! - `${source}` expands to the configured source name.
//! - `${record['a']['b']}` walks nested keys of the record mapping. Keys may
//!   be quoted with single or double quotes.
//!
//! Patterns are parsed once into a list of [`Segment`]s and rendered per
//! event. Nothing in a pattern is ever executed.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::record::RawRecord;

/// Errors raised while parsing or rendering a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// `${` without a matching `}`.
    #[error("unterminated reference starting at byte {0}")]
    Unterminated(usize),
    /// A reference names something other than `source` or `record[...]`.
    #[error("unknown reference `{name}` at byte {offset}")]
    UnknownReference { name: String, offset: usize },
    /// A `record` reference with broken bracket syntax.
    #[error("malformed record path at byte {offset}: {reason}")]
    MalformedPath { offset: usize, reason: &'static str },
    /// The record does not contain the referenced field.
    #[error("record has no field {0}")]
    MissingField(String),
    /// The referenced field holds an object or array.
    #[error("record field {0} is not a scalar")]
    NotScalar(String),
}

/// One parsed piece of a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Text copied verbatim.
    Literal(String),
    /// The configured source name.
    Source,
    /// A nested lookup into the record mapping.
    RecordPath(Vec<String>),
}

/// A parsed index template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexTemplate {
    segments: Vec<Segment>,
}

impl IndexTemplate {
    /// Parse `pattern` into segments.
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        Parser::new(pattern).parse()
    }

    /// The parsed segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Render the template for one record.
    pub fn render(&self, source: &str, record: &RawRecord) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Source => out.push_str(source),
                Segment::RecordPath(path) => push_scalar(&mut out, lookup(record, path)?, path)?,
            }
        }
        Ok(out)
    }
}

impl fmt::Display for IndexTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Source => f.write_str("${source}")?,
                Segment::RecordPath(path) => write!(f, "${{{}}}", describe(path))?,
            }
        }
        Ok(())
    }
}

fn describe(path: &[String]) -> String {
    let mut out = String::from("record");
    for key in path {
        out.push_str("['");
        out.push_str(key);
        out.push_str("']");
    }
    out
}

fn lookup<'a>(record: &'a RawRecord, path: &[String]) -> Result<&'a Value, TemplateError> {
    let missing = || TemplateError::MissingField(describe(path));
    let (first, rest) = path.split_first().ok_or_else(missing)?;
    let mut current = record.field(first).ok_or_else(missing)?;
    for key in rest {
        current = current.get(key.as_str()).ok_or_else(missing)?;
    }
    Ok(current)
}

fn push_scalar(out: &mut String, value: &Value, path: &[String]) -> Result<(), TemplateError> {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => {}
        Value::Array(_) | Value::Object(_) => {
            return Err(TemplateError::NotScalar(describe(path)));
        }
    }
    Ok(())
}

/// Recursive-descent parser over the template grammar.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn parse(mut self) -> Result<IndexTemplate, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        while !self.rest().is_empty() {
            if self.rest().starts_with("${") {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(self.reference()?);
            } else if let Some(c) = self.rest().chars().next() {
                literal.push(c);
                self.pos += c.len_utf8();
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(IndexTemplate { segments })
    }

    /// reference := "${" ( "source" | "record" path ) "}"
    fn reference(&mut self) -> Result<Segment, TemplateError> {
        let start = self.pos;
        self.pos += 2;
        self.skip_ws();
        let name_len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        let name = &self.rest()[..name_len];
        self.pos += name_len;
        let segment = match name {
            "source" => Segment::Source,
            "record" => Segment::RecordPath(self.path()?),
            _ => {
                return Err(TemplateError::UnknownReference {
                    name: name.to_owned(),
                    offset: start,
                });
            }
        };
        self.skip_ws();
        if self.rest().starts_with('}') {
            self.pos += 1;
            Ok(segment)
        } else if self.rest().is_empty() || !self.input[start..].contains('}') {
            Err(TemplateError::Unterminated(start))
        } else {
            Err(TemplateError::MalformedPath {
                offset: self.pos,
                reason: "unexpected characters before `}`",
            })
        }
    }

    /// path := ( "[" quoted "]" )+
    fn path(&mut self) -> Result<Vec<String>, TemplateError> {
        let mut keys = Vec::new();
        while self.rest().starts_with('[') {
            self.pos += 1;
            keys.push(self.quoted()?);
            if !self.rest().starts_with(']') {
                return Err(self.malformed("expected `]`"));
            }
            self.pos += 1;
        }
        if keys.is_empty() {
            return Err(self.malformed("expected at least one `['key']`"));
        }
        Ok(keys)
    }

    fn quoted(&mut self) -> Result<String, TemplateError> {
        let quote = match self.rest().chars().next() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.malformed("expected a quoted key")),
        };
        self.pos += 1;
        let Some(len) = self.rest().find(quote) else {
            return Err(self.malformed("unterminated key"));
        };
        let key = self.rest()[..len].to_owned();
        self.pos += len + 1;
        Ok(key)
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn malformed(&self, reason: &'static str) -> TemplateError {
        TemplateError::MalformedPath {
            offset: self.pos,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn pod_record() -> RawRecord {
        RawRecord::from(json!({
            "message": "data",
            "level": 3,
            "kubernetes": {"pod_name": "mypod", "labels": {"app": "web"}},
        }))
    }

    #[rstest]
    fn resolves_source_and_nested_record_path(pod_record: RawRecord) {
        let template =
            IndexTemplate::parse("prefix_${source}_${record['kubernetes']['pod_name']}")
                .expect("parse");
        let index = template.render("fluentd", &pod_record).expect("render");
        assert_eq!(index, "prefix_fluentd_mypod");
    }

    #[rstest]
    #[case("${record[\"kubernetes\"][\"labels\"][\"app\"]}", "web")]
    #[case("lvl_${record['level']}", "lvl_3")]
    #[case("${ source }-x", "fluentd-x")]
    #[case("plain_index", "plain_index")]
    #[case("cost$5", "cost$5")]
    fn renders_supported_forms(
        pod_record: RawRecord,
        #[case] pattern: &str,
        #[case] expected: &str,
    ) {
        let template = IndexTemplate::parse(pattern).expect("parse");
        assert_eq!(template.render("fluentd", &pod_record).expect("render"), expected);
    }

    #[rstest]
    fn parses_into_segments() {
        let template = IndexTemplate::parse("a_${source}_${record['k']}").expect("parse");
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("a_".into()),
                Segment::Source,
                Segment::Literal("_".into()),
                Segment::RecordPath(vec!["k".into()]),
            ]
        );
        assert_eq!(template.to_string(), "a_${source}_${record['k']}");
    }

    #[rstest]
    #[case("idx_${source")]
    #[case("idx_${record['a']")]
    fn rejects_unterminated_reference(#[case] pattern: &str) {
        assert!(matches!(
            IndexTemplate::parse(pattern),
            Err(TemplateError::Unterminated(4))
        ));
    }

    #[rstest]
    #[case("${system('rm -rf /')}")]
    #[case("${ENV['HOME']}")]
    #[case("${record.keys}")]
    #[case("${record}")]
    #[case("${record[kubernetes]}")]
    #[case("${record['a'}")]
    #[case("${source + 'x'}")]
    fn rejects_anything_outside_the_grammar(#[case] pattern: &str) {
        assert!(IndexTemplate::parse(pattern).is_err(), "{pattern} should fail");
    }

    #[rstest]
    fn missing_field_is_a_lookup_error(pod_record: RawRecord) {
        let template = IndexTemplate::parse("${record['kubernetes']['namespace']}").expect("parse");
        assert_eq!(
            template.render("fluentd", &pod_record),
            Err(TemplateError::MissingField(
                "record['kubernetes']['namespace']".into()
            ))
        );
    }

    #[rstest]
    fn non_object_record_has_no_fields() {
        let template = IndexTemplate::parse("${record['a']}").expect("parse");
        assert!(matches!(
            template.render("fluentd", &RawRecord::from(5_i64)),
            Err(TemplateError::MissingField(_))
        ));
    }

    #[rstest]
    fn nested_object_is_not_a_scalar(pod_record: RawRecord) {
        let template = IndexTemplate::parse("${record['kubernetes']}").expect("parse");
        assert!(matches!(
            template.render("fluentd", &pod_record),
            Err(TemplateError::NotScalar(_))
        ));
    }
}
