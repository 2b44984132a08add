//! Obstacle notification payloads.
//!
//! The cane sends a UTF-8 description of what is in front of it, or the
//! sentinel `CLEAR` when the path is free.

/// Payload meaning "no obstacle".
pub const CLEAR_SENTINEL: &str = "CLEAR";

/// A decoded obstacle notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObstacleReport {
    /// Empty payload.
    Empty,
    /// The path is clear.
    Clear,
    /// Description to announce verbatim.
    Obstacle(String),
}

impl ObstacleReport {
    /// Decode a raw notification value.
    ///
    /// Invalid UTF-8 sequences are replaced rather than rejected. The
    /// sentinel comparison is exact and case-sensitive.
    pub fn decode(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        if text.is_empty() {
            Self::Empty
        } else if text == CLEAR_SENTINEL {
            Self::Clear
        } else {
            Self::Obstacle(text.into_owned())
        }
    }

    /// Text to speak, if any.
    pub fn announcement(&self) -> Option<&str> {
        match self {
            Self::Obstacle(text) => Some(text),
            Self::Empty | Self::Clear => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_decode_obstacle() {
        let report = ObstacleReport::decode(b"ROCK AHEAD");
        assert_eq!(report, ObstacleReport::Obstacle("ROCK AHEAD".to_string()));
        assert_eq!(report.announcement(), Some("ROCK AHEAD"));
    }

    #[test]
    fn test_decode_clear_and_empty() {
        assert_eq!(ObstacleReport::decode(b"CLEAR"), ObstacleReport::Clear);
        assert_eq!(ObstacleReport::decode(b""), ObstacleReport::Empty);
        assert_eq!(ObstacleReport::decode(b"CLEAR").announcement(), None);
    }

    #[test]
    fn test_sentinel_is_case_sensitive() {
        assert_eq!(
            ObstacleReport::decode(b"clear"),
            ObstacleReport::Obstacle("clear".to_string())
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let report = ObstacleReport::decode(&[0x57, 0x41, 0x4c, 0x4c, 0xff]);
        assert_eq!(report.announcement(), Some("WALL\u{fffd}"));
    }

    proptest! {
        #[test]
        fn prop_non_sentinel_text_is_announced(text in ".+") {
            prop_assume!(text != CLEAR_SENTINEL);
            let report = ObstacleReport::decode(text.as_bytes());
            prop_assert_eq!(report.announcement(), Some(text.as_str()));
        }
    }
}
