//! Signal report: the marker-delimited text block consumed downstream.

use std::fmt;

use serde::{Deserialize, Serialize};

use anchorline_core::domain::ZoneColor;

pub const START_MARKER: &str = "----- Trade Signals -----";
pub const END_MARKER: &str = "----- End of Trade Signals -----";

/// Instruments currently flagged BUY/SELL, plus the latest market zone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalReport {
    pub buy: Vec<String>,
    pub sell: Vec<String>,
    pub zone: ZoneColor,
}

impl SignalReport {
    pub fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }
}

impl fmt::Display for SignalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{START_MARKER}")?;
        if self.buy.is_empty() {
            writeln!(f, "No Buy Signals.")?;
        } else {
            writeln!(f, "Potential Green Arrow Signals ({}):", self.buy.len())?;
            for symbol in &self.buy {
                writeln!(f, " - {symbol}")?;
            }
        }
        if self.sell.is_empty() {
            writeln!(f, "No Sell Signals.")?;
        } else {
            writeln!(f, "Potential Red Arrow Signals ({}):", self.sell.len())?;
            for symbol in &self.sell {
                writeln!(f, " - {symbol}")?;
            }
        }
        writeln!(f, "Most Recent Market Zone: {}", self.zone)?;
        writeln!(f, "{END_MARKER}")
    }
}

/// Marker block carrying a fatal error instead of signals.
pub fn render_error(message: &str) -> String {
    format!("{START_MARKER}\nERROR: {message}\n{END_MARKER}\n")
}

/// Lines strictly between the first start marker and the following end
/// marker, joined with newlines.
///
/// A `timestamp - LEVEL - ` prefix is stripped when a line came through a
/// logger. Returns `None` when no start marker is present or nothing sits
/// between the markers.
pub fn extract_between_markers(text: &str) -> Option<String> {
    let mut collecting = false;
    let mut collected = Vec::new();

    for line in text.lines() {
        if line.contains(START_MARKER) {
            collecting = true;
            continue;
        }
        if line.contains(END_MARKER) {
            break;
        }
        if collecting {
            let parts: Vec<&str> = line.splitn(3, " - ").collect();
            let content = match parts.as_slice() {
                [_, _, message] => message.trim(),
                _ => line.trim(),
            };
            collected.push(content);
        }
    }

    let joined = collected.join("\n");
    let joined = joined.trim();
    (!joined.is_empty()).then(|| joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_both_lists() {
        let report = SignalReport {
            buy: vec!["AAPL".into(), "MSFT".into()],
            sell: vec!["TSLA".into()],
            zone: ZoneColor::Green,
        };
        let expected = "\
----- Trade Signals -----
Potential Green Arrow Signals (2):
 - AAPL
 - MSFT
Potential Red Arrow Signals (1):
 - TSLA
Most Recent Market Zone: green
----- End of Trade Signals -----
";
        assert_eq!(report.to_string(), expected);
    }

    #[test]
    fn renders_empty_lists() {
        let text = SignalReport::default().to_string();
        assert!(text.contains("No Buy Signals.\nNo Sell Signals.\n"));
        assert!(text.contains("Most Recent Market Zone: red"));
    }

    #[test]
    fn extraction_recovers_report_body() {
        let report = SignalReport {
            buy: vec!["AAPL".into()],
            sell: vec![],
            zone: ZoneColor::Red,
        };
        let text = format!("preamble\n{report}trailing\n");
        assert_eq!(
            extract_between_markers(&text).unwrap(),
            "Potential Green Arrow Signals (1):\n- AAPL\nNo Sell Signals.\nMost Recent Market Zone: red"
        );
    }

    #[test]
    fn extraction_strips_log_prefix() {
        let text = "\
2024-06-03 10:00:00 - INFO - ----- Trade Signals -----
2024-06-03 10:00:00 - INFO - No Buy Signals.
2024-06-03 10:00:00 - INFO - ----- End of Trade Signals -----
";
        assert_eq!(extract_between_markers(text).unwrap(), "No Buy Signals.");
    }

    #[test]
    fn extraction_without_markers_is_none() {
        assert_eq!(extract_between_markers("nothing here"), None);
        assert_eq!(
            extract_between_markers(&format!("{START_MARKER}\n{END_MARKER}\n")),
            None
        );
    }

    #[test]
    fn error_block_is_extractable() {
        let text = render_error("database unreachable");
        assert_eq!(
            extract_between_markers(&text).unwrap(),
            "ERROR: database unreachable"
        );
    }
}
