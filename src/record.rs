//! Module that contains the record type written to the data log.
use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

/// Format of the receipt timestamp, ISO-8601 local time with microseconds and without offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
/// Reasons a payload cannot become a record.
pub enum RecordError {
    #[error("payload is empty")]
    Empty,
    #[error("payload contains a line break")]
    LineBreak,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
/// Struct representing one line of sensor data received from a device.
///
/// A record always holds a non empty, single line payload.
pub struct Record
{
    /// Timestamp the record was accepted by the server.
    pub receipt_timestamp: DateTime<Local>,
    /// The comma separated sensor fields as sent by the device.
    pub payload: String,
}

impl Record {
    /// Creates a record from a raw payload.
    ///
    /// Surrounding whitespace is trimmed from the payload. The individual fields are not inspected.
    ///
    /// # Errors
    ///
    /// * `RecordError::Empty` - The payload is empty after trimming.
    ///
    /// * `RecordError::LineBreak` - The payload would span more than one line.
    pub fn new(receipt_timestamp: DateTime<Local>, payload: &str) -> Result<Record, RecordError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Err(RecordError::Empty);
        }
        if payload.contains(|c: char| c == '\n' || c == '\r') {
            return Err(RecordError::LineBreak);
        }

        Ok(Record {
            receipt_timestamp,
            payload: String::from(payload),
        })
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.receipt_timestamp.format(TIMESTAMP_FORMAT), self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
    }

    #[test]
    fn serializes_timestamp_then_payload() {
        let payload = "1712,Uid,42,G,1,SDA,0,SCL,1,415,21.5,40.2,1013.2,14:05:08";
        let record = Record::new(timestamp(), payload).unwrap();

        assert_eq!(
            record.to_string(),
            "2024-03-07T14:05:09.000000,1712,Uid,42,G,1,SDA,0,SCL,1,415,21.5,40.2,1013.2,14:05:08"
        );
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let record = Record::new(timestamp(), "  \t a,b,c \n").unwrap();
        assert_eq!(record.payload, "a,b,c");
    }

    #[test]
    fn rejects_blank_payloads() {
        assert_eq!(Record::new(timestamp(), ""), Err(RecordError::Empty));
        assert_eq!(Record::new(timestamp(), "   "), Err(RecordError::Empty));
        assert_eq!(Record::new(timestamp(), "\r\n\t"), Err(RecordError::Empty));
    }

    #[test]
    fn rejects_embedded_line_breaks() {
        assert_eq!(Record::new(timestamp(), "a,b\nc,d"), Err(RecordError::LineBreak));
        assert_eq!(Record::new(timestamp(), "a,b\rc,d"), Err(RecordError::LineBreak));
    }
}
