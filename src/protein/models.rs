use std::sync::Arc;

/// One entry of a reference database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub ordinal: u64, // 1-based position in the stream it was read from.
    pub id: String,
    pub description: String,
    pub sequence: Arc<str>,
}

impl SequenceRecord {
    pub fn new(ordinal: u64, id: &str, sequence: &str) -> Self {
        Self {
            ordinal,
            id: id.to_string(),
            description: String::new(),
            sequence: sequence.into(),
        }
    }
}

#[derive(Debug)]
pub struct SequenceRecordBuilder {
    pub ordinal: u64,
    pub header: Option<String>,
    pub sequence: String,
}

impl SequenceRecordBuilder {
    pub fn new(ordinal: u64) -> Self {
        Self {
            ordinal,
            header: None,
            sequence: String::new(),
        }
    }

    pub fn with_header(mut self, header: &str) -> Self {
        self.header = Some(header.to_string());
        self
    }

    pub fn append_sequence(mut self, sequence: &str) -> Self {
        self.sequence.push_str(sequence);
        self
    }

    /// Splits the header into identifier (first token) and description.
    pub fn build(self) -> SequenceRecord {
        let header = self.header.unwrap_or_default();
        let (id, description) = match header.split_once(char::is_whitespace) {
            Some((id, rest)) => (id.to_string(), rest.trim().to_string()),
            None => (header, String::new()),
        };
        SequenceRecord {
            ordinal: self.ordinal,
            id,
            description,
            sequence: self.sequence.into(),
        }
    }
}
