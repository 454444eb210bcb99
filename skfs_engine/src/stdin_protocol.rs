// Copyright 2026 the Skfs Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The stdin write protocol: `key\t"value"\n` records, parsed incrementally.
//!
//! `StdinParser` is an explicit state machine, not a generator or an async stream: it holds
//! exactly the lexer position and partial key/value buffers needed to resume correctly no matter
//! how the caller chunks the input, so every call to [`StdinParser::feed`] advances the same state
//! and the parse result is independent of where a chunk boundary falls.

use alloc::string::String;
use alloc::vec::Vec;

use skfs_core::BaseName;

/// One thing observed while feeding bytes to a [`StdinParser`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StdinEvent {
    /// A fully parsed `key\t"value"\n` record.
    Entry {
        /// The record's key, always an `SID` ("it is the `BaseName` (SID) of the target
        /// entry").
        key: BaseName,
        /// The record's unescaped value.
        value: String,
    },
    /// A blank-key line: the separator between logical write batches.
    Batch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Key,
    KeyEscape,
    ExpectQuote,
    Value,
    ValueEscape,
}

/// An incremental parser for the stdin write protocol.
///
/// Holds just enough state — which field it's in the middle of, and the bytes accumulated so far
/// — to resume correctly no matter how the input stream is chunked across [`StdinParser::feed`]
/// calls.
#[derive(Debug)]
pub struct StdinParser {
    state: State,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Default for StdinParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StdinParser {
    /// Creates a parser positioned at the start of a key.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: State::Key,
            key: Vec::new(),
            value: Vec::new(),
        }
    }

    /// Feeds `chunk` into the parser, returning every record completed by it, in order.
    ///
    /// `chunk` may end mid-key, mid-escape, or mid-value; the parser carries the partial state
    /// forward to the next `feed` call rather than requiring the caller to buffer whole lines.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StdinEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            self.feed_byte(byte, &mut events);
        }
        events
    }

    fn feed_byte(&mut self, byte: u8, events: &mut Vec<StdinEvent>) {
        match self.state {
            State::Key => match byte {
                b'\\' => self.state = State::KeyEscape,
                b'\t' => self.state = State::ExpectQuote,
                b'\n' => {
                    if self.key.is_empty() {
                        events.push(StdinEvent::Batch);
                    } else {
                        // No tab ever arrived for this key: drop it and resynchronize on the next
                        // line rather than getting stuck waiting for a value that isn't coming.
                        self.key.clear();
                    }
                }
                other => self.key.push(other),
            },
            State::KeyEscape => {
                push_escaped(&mut self.key, byte);
                self.state = State::Key;
            }
            State::ExpectQuote => {
                if byte == b'"' {
                    self.value.clear();
                    self.state = State::Value;
                }
                // Anything else before the opening quote is malformed input; stay put and drop it
                // rather than emitting a bogus record.
            }
            State::Value => match byte {
                b'\\' => self.state = State::ValueEscape,
                b'\n' => {
                    // The grammar places the closing `"` immediately before this newline.
                    if self.value.last() == Some(&b'"') {
                        self.value.pop();
                    }
                    let key = String::from_utf8_lossy(&self.key).into_owned();
                    let value = String::from_utf8_lossy(&self.value).into_owned();
                    events.push(StdinEvent::Entry {
                        key: BaseName::sid(key),
                        value,
                    });
                    self.key.clear();
                    self.value.clear();
                    self.state = State::Key;
                }
                other => self.value.push(other),
            },
            State::ValueEscape => {
                push_escaped(&mut self.value, byte);
                self.state = State::Value;
            }
        }
    }
}

fn push_escaped(buf: &mut Vec<u8>, byte: u8) {
    match byte {
        b'\\' => buf.push(b'\\'),
        b't' => buf.push(b'\t'),
        b'n' => buf.push(b'\n'),
        b'"' => buf.push(b'"'),
        // Any other `\` is literal: keep the backslash and the byte that followed it.
        other => {
            buf.push(b'\\');
            buf.push(other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_whole(stream: &[u8]) -> Vec<StdinEvent> {
        StdinParser::new().feed(stream)
    }

    #[test]
    fn parses_two_values_for_the_same_key() {
        let events = parse_whole(b"k\t\"v1\"\nk\t\"v2\"\n");
        assert_eq!(
            events,
            alloc::vec![
                StdinEvent::Entry {
                    key: BaseName::sid("k"),
                    value: "v1".into(),
                },
                StdinEvent::Entry {
                    key: BaseName::sid("k"),
                    value: "v2".into(),
                },
            ]
        );
    }

    #[test]
    fn escape_sequences_decode_inside_keys_and_values() {
        let events = parse_whole(b"a\\tb\t\"line1\\nline2 \\\"quoted\\\"\"\n");
        assert_eq!(
            events,
            alloc::vec![StdinEvent::Entry {
                key: BaseName::sid("a\tb"),
                value: "line1\nline2 \"quoted\"".into(),
            }]
        );
    }

    #[test]
    fn blank_key_line_emits_a_batch_separator() {
        let events = parse_whole(b"\n");
        assert_eq!(events, alloc::vec![StdinEvent::Batch]);
    }

    #[test]
    fn arbitrary_chunk_boundaries_reach_the_same_result_as_feeding_it_whole() {
        let stream = b"k\t\"v1\"\nk\t\"v2\"\n\nk2\t\"v3\"\n";
        let whole = parse_whole(stream);

        for split in 0..=stream.len() {
            let mut parser = StdinParser::new();
            let mut chunked = parser.feed(&stream[..split]);
            chunked.extend(parser.feed(&stream[split..]));
            assert_eq!(chunked, whole, "split at byte {split} diverged");
        }
    }
}
