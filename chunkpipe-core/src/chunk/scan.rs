//! Record recovery over a byte window cut at arbitrary offsets.
//!
//! The window is scanned for `{`. At each candidate one complete JSON value is
//! decoded; on success the cursor jumps past it, on failure the cursor moves one
//! byte and the search resumes. Records cut by either edge of the window never
//! decode and are dropped.
//!
//! Records may nest up to [`MAX_DEPTH`] levels. A complete record nested deeper
//! than that is skipped whole; its inner objects are not reported as records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const OPEN: u8 = b'{';

/// Deepest nesting of objects and arrays a record may have. Decoding recurses
/// once per level, so worker threads need stack in proportion.
pub const MAX_DEPTH: usize = 512;

#[derive(Clone, Debug, PartialEq)]
pub struct ScannedRecord {
    /// Offset of the opening `{` within the window.
    pub start: usize,
    /// One past the closing byte.
    pub end: usize,
    pub value: Value,
}

pub struct RecordScanner<'a> {
    buf: &'a [u8],
    cursor: usize,
}

impl<'a> RecordScanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, cursor: 0 }
    }
}

enum Decoded {
    Record(Value, usize),
    /// Well-formed up to the point where nesting passed serde_json's default limit.
    TooDeepForDefault,
    Invalid,
}

fn decode_with(window: &[u8], unbounded: bool) -> Decoded {
    let mut de = serde_json::Deserializer::from_slice(window);
    if unbounded {
        de.disable_recursion_limit();
    }
    let mut stream = de.into_iter::<Value>();
    match stream.next() {
        Some(Ok(v)) => Decoded::Record(v, stream.byte_offset()),
        // serde_json has no public code for this case
        Some(Err(e)) if e.to_string().starts_with("recursion limit exceeded") => {
            Decoded::TooDeepForDefault
        }
        _ => Decoded::Invalid,
    }
}

/// Extent and deepest nesting of the bracket-balanced span opening `window`,
/// or `None` if the window ends first.
fn balanced_span(window: &[u8]) -> Option<(usize, usize)> {
    let (mut depth, mut deepest) = (0usize, 0usize);
    let (mut in_str, mut escaped) = (false, false);
    for (i, &b) in window.iter().enumerate() {
        if in_str {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_str = false;
            }
            continue;
        }
        match b {
            b'"' => in_str = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some((i + 1, deepest));
                }
            }
            _ => {}
        }
    }
    None
}

enum Candidate {
    Record(Value, usize),
    /// Complete but deeper than `MAX_DEPTH`; skip this many bytes.
    Skip(usize),
    Invalid,
}

/// Decodes exactly one value at the start of `window`.
fn decode_one(window: &[u8]) -> Candidate {
    match decode_with(window, false) {
        Decoded::Record(v, len) => Candidate::Record(v, len),
        Decoded::Invalid => Candidate::Invalid,
        Decoded::TooDeepForDefault => match balanced_span(window) {
            Some((len, deepest)) if deepest > MAX_DEPTH => Candidate::Skip(len),
            Some((len, _)) => match decode_with(&window[..len], true) {
                Decoded::Record(v, n) => Candidate::Record(v, n),
                _ => Candidate::Invalid,
            },
            None => Candidate::Invalid,
        },
    }
}

impl Iterator for RecordScanner<'_> {
    type Item = ScannedRecord;

    fn next(&mut self) -> Option<ScannedRecord> {
        while self.cursor < self.buf.len() {
            let Some(rel) = self.buf[self.cursor..].iter().position(|&b| b == OPEN) else {
                self.cursor = self.buf.len();
                break;
            };
            let start = self.cursor + rel;
            match decode_one(&self.buf[start..]) {
                Candidate::Record(value, len) => {
                    self.cursor = start + len;
                    return Some(ScannedRecord {
                        start,
                        end: start + len,
                        value,
                    });
                }
                Candidate::Skip(len) => {
                    debug!(offset = start, bytes = len, "record nested too deep, skipped");
                    self.cursor = start + len;
                }
                Candidate::Invalid => self.cursor = start + 1,
            }
        }
        None
    }
}

/// Records recovered from one chunk, in order of their opening byte.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordSet {
    records: Vec<Value>,
}

impl RecordSet {
    pub fn scan(buf: &[u8]) -> Self {
        Self {
            records: RecordScanner::new(buf).map(|r| r.value).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    /// Serialized form persisted to the blob store: a JSON array.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.records)
    }

    /// Inverse of [`RecordSet::to_bytes`]; accepts the same nesting the scanner does.
    pub fn from_bytes(raw: &[u8]) -> serde_json::Result<Self> {
        let mut de = serde_json::Deserializer::from_slice(raw);
        de.disable_recursion_limit();
        let set = Self::deserialize(&mut de)?;
        de.end()?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_two_records_with_noise_between() {
        let set = RecordSet::scan(br#"{"a":1}xyz{"b":2}"#);
        assert_eq!(set.records(), &[json!({"a": 1}), json!({"b": 2})]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_offsets_follow_input_order() {
        let buf = br#"  {"a":1} , {"b":{"c":[1,2]}}"#;
        let got: Vec<_> = RecordScanner::new(buf).map(|r| (r.start, r.end)).collect();
        assert_eq!(got, vec![(2, 9), (12, 29)]);
    }

    #[test]
    fn test_record_cut_at_tail_is_dropped() {
        let set = RecordSet::scan(br#"{"a":1},{"b":"unfinish"#);
        assert_eq!(set.records(), &[json!({"a": 1})]);
    }

    #[test]
    fn test_record_cut_at_head_is_dropped() {
        // window starts inside a string of the previous record
        let set = RecordSet::scan(br#"ame":"x"},{"id":9}"#);
        assert_eq!(set.records(), &[json!({"id": 9})]);
    }

    #[test]
    fn test_nested_record_is_not_double_counted() {
        let set = RecordSet::scan(br#"{"outer":{"inner":{"x":1}}}"#);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_inner_objects_of_cut_record_are_recovered() {
        // the outer record lost its head; its complete inner objects still decode
        let set = RecordSet::scan(br#"1,"items":[{"q":1},{"q":2}]}"#);
        assert_eq!(set.records(), &[json!({"q": 1}), json!({"q": 2})]);
    }

    #[test]
    fn test_no_candidates() {
        assert!(RecordSet::scan(b"no braces here").is_empty());
        assert!(RecordSet::scan(b"").is_empty());
        assert!(RecordSet::scan(b"{{{{").is_empty());
    }

    #[test]
    fn test_invalid_utf8_around_records() {
        let mut buf = vec![0xff, 0xfe];
        buf.extend_from_slice(br#"{"ok":true}"#);
        buf.push(0xc3); // half of a two-byte sequence
        let set = RecordSet::scan(&buf);
        assert_eq!(set.records(), &[json!({"ok": true})]);
    }

    fn nested(levels: usize) -> Vec<u8> {
        let mut buf = br#"{"a":"#.to_vec();
        buf.extend(std::iter::repeat_n(b'[', levels));
        buf.extend_from_slice(br#"{"x":1}"#);
        buf.extend(std::iter::repeat_n(b']', levels));
        buf.push(b'}');
        buf
    }

    #[test]
    fn test_deeply_nested_record_is_recovered_whole() {
        let set = RecordSet::scan(&nested(130));
        assert_eq!(set.len(), 1);
        assert!(set.records()[0]["a"].is_array());

        let back = RecordSet::from_bytes(&set.to_bytes().unwrap()).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_record_past_depth_limit_is_skipped_whole() {
        let mut buf = nested(MAX_DEPTH + 10);
        buf.extend_from_slice(br#" {"ok":1}"#);
        let set = RecordSet::scan(&buf);
        assert_eq!(set.records(), &[json!({"ok": 1})]);
    }

    #[test]
    fn test_braces_inside_strings_do_not_unbalance_span() {
        assert_eq!(balanced_span(br#"{"s":"}]\"{"}x"#), Some((13, 1)));
        assert_eq!(balanced_span(br#"{"open":["#), None);
    }

    #[test]
    fn test_big_integers_survive_round_trip() {
        let raw = br#"{"id":123456789012345678901234567890,"f":0.10000000000000000001}"#;
        let set = RecordSet::scan(raw);
        let bytes = set.to_bytes().unwrap();
        assert_eq!(
            bytes,
            br#"[{"id":123456789012345678901234567890,"f":0.10000000000000000001}]"#
        );
    }

    #[test]
    fn test_bytes_are_a_json_array() {
        let set = RecordSet::scan(br#"{"a":1}{"b":2}"#);
        let raw = set.to_bytes().unwrap();
        assert_eq!(raw, br#"[{"a":1},{"b":2}]"#);
        assert_eq!(RecordSet::from_bytes(&raw).unwrap(), set);
    }
}
