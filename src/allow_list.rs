use csv::ReaderBuilder;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{ResponderError, Result};

const EMAIL_COLUMN: &str = "email";

/// Reduces a `From` header value to the bare, lower-cased address.
///
/// `"Jane Doe <Jane@Example.com>"` becomes `"jane@example.com"`; a value
/// without angle brackets is only trimmed and lower-cased. The address is
/// the last bracketed part, since a display name may itself contain `<`.
pub fn normalize_sender(raw: &str) -> String {
    let address = match raw.rsplit_once('<') {
        Some((_, rest)) => rest.split('>').next().unwrap_or(rest),
        None => raw,
    };
    address.trim().to_lowercase()
}

/// Senders allowed to trigger a reply. Immutable once loaded.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    senders: HashSet<String>,
}

impl AllowList {
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading allowed senders from {:?}", path);

        let content = std::fs::read(path)?;
        Self::from_csv(&content)
    }

    /// Parses CSV content with a header row containing an `email` column.
    pub fn from_csv(content: &[u8]) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content);

        let column = reader
            .headers()?
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(EMAIL_COLUMN))
            .ok_or_else(|| {
                ResponderError::Data(format!("no '{}' column in allowed senders file", EMAIL_COLUMN))
            })?;

        let mut senders = HashSet::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let Some(value) = record.get(column) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            if !value.contains('@') {
                warn!("Ignoring row {}: '{}' is not an email address", row + 2, value);
                continue;
            }
            senders.insert(normalize_sender(value));
        }

        debug!("{} distinct allowed sender(s)", senders.len());
        Ok(AllowList { senders })
    }

    pub fn contains(&self, sender: &str) -> bool {
        self.senders.contains(&normalize_sender(sender))
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        AllowList {
            senders: iter
                .into_iter()
                .map(|s| normalize_sender(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}
