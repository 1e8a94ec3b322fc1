//! Header storage and incremental header assembly.

/// Insertion-ordered header mapping with unique keys.
///
/// Inserting an existing key overwrites its value in place, so iteration
/// order is the order in which each name was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites; an existing name (ignoring ASCII case) keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Looks up a header by name, ignoring ASCII case.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Where the accumulator is between header chunk events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PendingHeader {
    /// No header bytes seen since the last finalize.
    #[default]
    Empty,
    /// Name bytes seen, no value event yet.
    Field(Vec<u8>),
    /// A value event (possibly empty) has been seen for `field`.
    Value { field: Vec<u8>, value: Vec<u8> },
}

/// Turns alternating field/value chunk events into a finalized [`HeaderMap`].
///
/// A pending pair is finalized when the next field chunk arrives after a value
/// event for it, and once more by [`finish`](Self::finish) at the end of the
/// header block. Names and values are stored ASCII-lowercased. A value event
/// with no bytes still counts, so `X-Empty:` is kept as `"x-empty" => ""`.
/// Pairs with an empty name are dropped.
#[derive(Debug, Clone, Default)]
pub struct HeaderAccumulator {
    pending: PendingHeader,
    headers: HeaderMap,
}

impl HeaderAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_field(&mut self, chunk: &[u8]) {
        self.pending = match std::mem::take(&mut self.pending) {
            PendingHeader::Empty => PendingHeader::Field(chunk.to_vec()),
            PendingHeader::Field(mut field) => {
                field.extend_from_slice(chunk);
                PendingHeader::Field(field)
            }
            PendingHeader::Value { field, value } => {
                self.commit(&field, &value);
                PendingHeader::Field(chunk.to_vec())
            }
        };
    }

    pub fn on_value(&mut self, chunk: &[u8]) {
        self.pending = match std::mem::take(&mut self.pending) {
            PendingHeader::Empty => PendingHeader::Value {
                field: Vec::new(),
                value: chunk.to_vec(),
            },
            PendingHeader::Field(field) => PendingHeader::Value {
                field,
                value: chunk.to_vec(),
            },
            PendingHeader::Value { field, mut value } => {
                value.extend_from_slice(chunk);
                PendingHeader::Value { field, value }
            }
        };
    }

    /// Finalizes the last pending pair and hands out the mapping, leaving the
    /// accumulator empty for the next message.
    pub fn finish(&mut self) -> HeaderMap {
        match std::mem::take(&mut self.pending) {
            PendingHeader::Empty => {}
            PendingHeader::Field(field) => self.commit(&field, &[]),
            PendingHeader::Value { field, value } => self.commit(&field, &value),
        }
        std::mem::take(&mut self.headers)
    }

    pub fn reset(&mut self) {
        self.pending = PendingHeader::Empty;
        self.headers.clear();
    }

    pub fn pending(&self) -> &PendingHeader {
        &self.pending
    }

    /// Headers finalized so far, excluding the pending pair.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn commit(&mut self, field: &[u8], value: &[u8]) {
        if field.is_empty() {
            return;
        }
        self.headers.insert(lowercase(field), lowercase(value));
    }
}

/// Bytes map one-to-one onto chars (latin1), so obs-text survives intact.
fn lowercase(bytes: &[u8]) -> String {
    bytes.iter().map(|b| b.to_ascii_lowercase() as char).collect()
}
