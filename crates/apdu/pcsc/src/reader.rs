//! Reader representation for PC/SC devices

use pcsc::{ReaderState, State};

/// Representation of a PC/SC card reader
#[derive(Debug, Clone)]
pub struct PcscReader {
    name: String,
    has_card: bool,
    atr: Option<Vec<u8>>,
}

impl PcscReader {
    /// Create a new reader
    pub const fn new(name: String, has_card: bool, atr: Option<Vec<u8>>) -> Self {
        Self {
            name,
            has_card,
            atr,
        }
    }

    /// Get the reader name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a card is present in the reader
    pub const fn has_card(&self) -> bool {
        self.has_card
    }

    /// Get the ATR of the card if present
    pub fn atr(&self) -> Option<&[u8]> {
        self.atr.as_deref()
    }

    /// Whether this reader can serve a connection for the given filter
    ///
    /// A reader matches when its name contains the filter string and a
    /// card is present; the empty filter accepts any reader with a card.
    pub fn matches(&self, filter: &str) -> bool {
        self.has_card && self.name.contains(filter)
    }

    pub(crate) fn from_reader_state(reader_state: &ReaderState) -> Self {
        let has_card = reader_state.event_state().contains(State::PRESENT)
            && !reader_state.event_state().contains(State::EMPTY);

        let atr = has_card.then(|| reader_state.atr().to_vec());

        Self {
            name: reader_state.name().to_string_lossy().into_owned(),
            has_card,
            atr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matching() {
        let reader = PcscReader::new("Ledger Nano S".into(), true, None);
        assert!(reader.matches("Ledger"));
        assert!(reader.matches(""));
        assert!(!reader.matches("Yubico"));

        let empty = PcscReader::new("Ledger Nano S".into(), false, None);
        assert!(!empty.matches("Ledger"));
    }
}
