//! Sensor Frame Parser
//!
//! The sensor firmware prints one frame per line as whitespace-separated
//! ASCII floats:
//!
//! ```text
//! <red raw> <blue raw> <red highpass> <blue highpass> <position> <pressure>
//! ```
//!
//! Partial reads and startup garbage are common at the stream boundary, so a
//! bad line is an ordinary `ParseError` that the caller skips.

use crate::types::{Sample, SAMPLE_CHANNELS};
use thiserror::Error;

/// Frame parse failures. Always recoverable: drop the line and keep reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Incomplete frame: expected 6 values, found {found}")]
    Incomplete { found: usize },

    #[error("Value {index} is not a finite number: '{token}'")]
    NotNumeric { index: usize, token: String },
}

/// Parse one text line into a `Sample`.
///
/// Tokens beyond the sixth are ignored.
pub fn parse_frame(line: &str) -> Result<Sample, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().take(SAMPLE_CHANNELS).collect();
    if tokens.len() < SAMPLE_CHANNELS {
        return Err(ParseError::Incomplete { found: tokens.len() });
    }

    let mut channels = [0.0_f64; SAMPLE_CHANNELS];
    for (index, (slot, token)) in channels.iter_mut().zip(&tokens).enumerate() {
        // `f64::from_str` accepts "NaN" and "inf"; those are not usable readings.
        *slot = token
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseError::NotNumeric {
                index,
                token: (*token).to_string(),
            })?;
    }

    Ok(Sample::from_channels(channels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_frame() {
        let sample = parse_frame("512.0 498.5 0.31 0.29 -0.12 505.25\r\n").unwrap();
        assert_eq!(sample.electrode_a, 512.0);
        assert_eq!(sample.electrode_b, 498.5);
        assert_eq!(sample.highpass_a, 0.31);
        assert_eq!(sample.highpass_b, 0.29);
        assert_eq!(sample.position, -0.12);
        assert_eq!(sample.pressure, 505.25);
    }

    #[test]
    fn test_extra_tokens_ignored() {
        let sample = parse_frame("1 2 3 4 5 6 7 garbage").unwrap();
        assert_eq!(sample.pressure, 6.0);
    }

    #[test]
    fn test_short_frame_is_incomplete() {
        assert_eq!(parse_frame("1.0 2.0 3.0"), Err(ParseError::Incomplete { found: 3 }));
        assert_eq!(parse_frame(""), Err(ParseError::Incomplete { found: 0 }));
        assert_eq!(parse_frame("   \t "), Err(ParseError::Incomplete { found: 0 }));
    }

    #[test]
    fn test_non_numeric_token() {
        let err = parse_frame("1.0 2.0 abc 3.0 4.0 5.0").unwrap_err();
        assert_eq!(
            err,
            ParseError::NotNumeric {
                index: 2,
                token: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            parse_frame("1 2 NaN 4 5 6"),
            Err(ParseError::NotNumeric { index: 2, .. })
        ));
        assert!(matches!(
            parse_frame("1 2 3 4 inf 6"),
            Err(ParseError::NotNumeric { index: 4, .. })
        ));
    }

    #[test]
    fn test_bad_token_after_sixth_is_ignored() {
        assert!(parse_frame("1 2 3 4 5 6 abc").is_ok());
    }
}
