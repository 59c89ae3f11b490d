//! Best-effort extraction of fleet records from agent replies.
//!
//! The agent answers in prose and sometimes embeds the JSON its tools
//! returned, e.g. `Here are results: {"vehicles":[...]} Let me know...`.
//! Interpretation never fails: anything that cannot be read as a records
//! payload is shown as plain text.

use std::collections::BTreeMap;

use fd_protocol::{AgentReply, FleetRecord, InterpretedReply};
use log::debug;
use serde_json::{Map, Value};

/// Keys recognized as carrying a record list when none are configured.
pub const DEFAULT_RECORD_KEYS: &[&str] = &["vehicles", "records"];

/// The set of object keys whose array value is taken as fleet records.
/// Replies that use any other key degrade to plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordKeyMatcher {
    keys: Vec<String>,
}

impl Default for RecordKeyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_KEYS.iter().copied())
    }
}

impl RecordKeyMatcher {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// First recognized key, in configured order, whose value is an array.
    pub fn find<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Vec<Value>> {
        self.keys
            .iter()
            .find_map(|key| object.get(key).and_then(Value::as_array))
    }

    /// Like [`find`](Self::find), then depth-first through nested objects
    /// and arrays.
    pub fn find_nested<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Vec<Value>> {
        self.find(object)
            .or_else(|| object.values().find_map(|value| self.find_in_value(value)))
    }

    fn find_in_value<'a>(&self, value: &'a Value) -> Option<&'a Vec<Value>> {
        match value {
            Value::Object(object) => self.find_nested(object),
            Value::Array(items) => items.iter().find_map(|item| self.find_in_value(item)),
            _ => None,
        }
    }
}

/// Turns raw agent replies into display text plus optional records.
#[derive(Debug, Clone, Default)]
pub struct ResponseInterpreter {
    matcher: RecordKeyMatcher,
}

impl ResponseInterpreter {
    pub fn new(matcher: RecordKeyMatcher) -> Self {
        Self { matcher }
    }

    pub fn interpret(&self, reply: &AgentReply) -> InterpretedReply {
        let session_id = reply.session_id().map(str::to_string);

        if let AgentReply::Object(object) = reply {
            if let Some(items) = self.matcher.find(object) {
                let text = object
                    .get("response")
                    .and_then(Value::as_str)
                    .map(normalize_text)
                    .unwrap_or_default();
                return InterpretedReply {
                    text,
                    records: Some(records_from(items)),
                    session_id,
                };
            }
        }

        let raw = match reply {
            AgentReply::Text(text) => text.clone(),
            AgentReply::Object(object) => match object.get("response").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => Value::Object(object.clone()).to_string(),
            },
        };

        InterpretedReply {
            session_id,
            ..self.interpret_text(&raw)
        }
    }

    /// Interpret free text alone.
    pub fn interpret_text(&self, raw: &str) -> InterpretedReply {
        match self.extract(raw) {
            Some(found) => {
                debug!(
                    "extracted embedded records (count={}, span={}..{})",
                    found.records.len(),
                    found.start,
                    found.end
                );
                let prose = join_prose(&raw[..found.start], &raw[found.end..]);
                InterpretedReply {
                    text: normalize_text(&prose),
                    records: Some(found.records),
                    session_id: None,
                }
            }
            None => InterpretedReply::text(normalize_text(raw)),
        }
    }

    /// Find the first `{` whose balanced span parses as a JSON object holding
    /// a recognized records key at any depth. The whole outer object is taken.
    fn extract(&self, text: &str) -> Option<Extracted> {
        let mut searched_to = 0;
        for (start, end) in object_spans(text) {
            let Some(end) = end else {
                continue;
            };
            // Objects inside one already parsed were searched with it.
            if start < searched_to {
                continue;
            }
            let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&text[start..end]) else {
                continue;
            };
            if let Some(items) = self.matcher.find_nested(&object) {
                return Some(Extracted {
                    start,
                    end,
                    records: records_from(items),
                });
            }
            searched_to = end;
        }
        None
    }
}

struct Extracted {
    start: usize,
    end: usize,
    records: Vec<FleetRecord>,
}

/// Maps each `{` to the byte offset one past its closing `}`, or `None`
/// when the text ends first.
///
/// Braces inside JSON strings are ignored; a backslash escapes the next
/// character inside a string. One scan resolves every brace it passes
/// outside a string, so a new scan starts only from a brace that an earlier
/// scan saw inside a string. All delimiters are ASCII, so byte offsets are
/// always char boundaries.
fn object_spans(text: &str) -> BTreeMap<usize, Option<usize>> {
    let bytes = text.as_bytes();
    let mut spans = BTreeMap::new();

    for (seed, _) in text.match_indices('{') {
        if spans.contains_key(&seed) {
            continue;
        }
        let mut open: Vec<usize> = Vec::new();
        let mut in_string = false;
        let mut escaped = false;

        for (offset, byte) in bytes[seed..].iter().enumerate() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if *byte == b'\\' {
                    escaped = true;
                } else if *byte == b'"' {
                    in_string = false;
                }
                continue;
            }

            match byte {
                b'"' => in_string = true,
                b'{' => open.push(seed + offset),
                b'}' => {
                    if let Some(start) = open.pop() {
                        spans.insert(start, Some(seed + offset + 1));
                    }
                    if open.is_empty() {
                        break;
                    }
                }
                _ => {}
            }
        }
        for start in open {
            spans.insert(start, None);
        }
    }
    spans
}

fn records_from(items: &[Value]) -> Vec<FleetRecord> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<FleetRecord>(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("skipping unreadable record: {e}");
                None
            }
        })
        .collect()
}

fn join_prose(before: &str, after: &str) -> String {
    let before = before.trim_end();
    let after = after.trim_start();
    match (before.is_empty(), after.is_empty()) {
        (false, false) => format!("{before}\n{after}"),
        (false, true) => before.to_string(),
        (true, _) => after.to_string(),
    }
}

/// Cosmetic cleanup of reply text: trim, drop one pair of enclosing quotes,
/// and turn literal `\n` sequences into line breaks.
pub fn normalize_text(text: &str) -> String {
    let trimmed = text.trim();
    let unquoted = strip_enclosing_quotes(trimmed);
    unquoted.replace("\\n", "\n")
}

fn strip_enclosing_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}
