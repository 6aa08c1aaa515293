//! Splitting a GRIB file into messages and decoding their records.

use bytes::Bytes;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{GribError, GribResult};
use crate::octets::{u24_at, u64_at};
use crate::record::GribRecord;
use crate::{edition1, sections};

/// An in-memory GRIB file holding any mix of edition 1 and 2 messages.
#[derive(Debug, Clone)]
pub struct GribFile {
    data: Bytes,
}

impl GribFile {
    /// Read a whole file. The handle is closed before this returns.
    pub fn open<P: AsRef<Path>>(path: P) -> GribResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        info!(path = %path.display(), size = data.len(), "Opened GRIB file");
        Ok(Self::from_bytes(Bytes::from(data)))
    }

    pub fn from_bytes(data: Bytes) -> Self {
        Self { data }
    }

    /// Split the file into raw messages.
    ///
    /// Bytes between messages (padding, record headers written by some
    /// archive tools) are skipped by searching for the next `GRIB` marker.
    pub fn messages(&self) -> GribResult<Vec<Bytes>> {
        let data = &self.data;
        let mut messages = Vec::new();
        let mut offset = 0;

        while let Some(start) = find_marker(data, offset) {
            if start + 8 > data.len() {
                return Err(GribError::InvalidFormat(
                    "Truncated indicator section".to_string(),
                ));
            }

            let length = match data[start + 7] {
                1 => u24_at(data, start + 4) as usize,
                2 => {
                    if start + 16 > data.len() {
                        return Err(GribError::InvalidFormat(
                            "Truncated indicator section".to_string(),
                        ));
                    }
                    usize::try_from(u64_at(data, start + 8)).unwrap_or(usize::MAX)
                }
                other => {
                    return Err(GribError::InvalidFormat(format!(
                        "Unsupported GRIB edition {} at offset {}",
                        other, start
                    )))
                }
            };

            let end = start
                .checked_add(length)
                .filter(|&end| length >= 8 && end <= data.len())
                .ok_or_else(|| {
                    GribError::InvalidFormat(format!(
                        "Message at offset {} claims {} bytes, file has {}",
                        start,
                        length,
                        data.len() - start
                    ))
                })?;
            if &data[end - 4..end] != b"7777" {
                return Err(GribError::InvalidFormat(format!(
                    "Message at offset {} is missing its end marker",
                    start
                )));
            }

            messages.push(data.slice(start..end));
            offset = end;
        }

        if messages.is_empty() {
            return Err(GribError::InvalidFormat("No GRIB messages found".to_string()));
        }
        Ok(messages)
    }

    /// Decode every record header in file order.
    pub fn records(&self) -> GribResult<Vec<GribRecord>> {
        let mut records = Vec::new();

        for message in self.messages()? {
            let next_number = records.len() + 1;
            match message[7] {
                1 => records.push(edition1::decode_message(&message, next_number)?),
                _ => records.extend(sections::decode_message(&message, next_number)?),
            }
        }

        debug!(records = records.len(), "Decoded GRIB records");
        Ok(records)
    }
}

fn find_marker(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(4)
        .position(|window| window == b"GRIB")
        .map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_has_no_messages() {
        let file = GribFile::from_bytes(Bytes::from_static(b"not a grib file"));
        assert!(matches!(file.messages(), Err(GribError::InvalidFormat(_))));
    }

    #[test]
    fn test_truncated_message_is_rejected() {
        // Edition 1 header claiming 100 bytes with only 12 present
        let file = GribFile::from_bytes(Bytes::from_static(b"GRIB\x00\x00\x64\x01abcd"));
        assert!(matches!(file.messages(), Err(GribError::InvalidFormat(_))));
    }

    #[test]
    fn test_oversized_edition2_length_is_rejected() {
        let mut bytes = b"xGRIB\x00\x00\x00\x02".to_vec();
        bytes.extend_from_slice(&u64::MAX.to_be_bytes());
        bytes.extend_from_slice(b"padding7777");
        let file = GribFile::from_bytes(Bytes::from(bytes));
        match file.messages() {
            Err(GribError::InvalidFormat(message)) => assert!(message.contains("offset 1")),
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_length_shorter_than_indicator_is_rejected() {
        let file = GribFile::from_bytes(Bytes::from_static(b"GRIB\x00\x00\x04\x017777"));
        assert!(matches!(file.messages(), Err(GribError::InvalidFormat(_))));
    }
}
