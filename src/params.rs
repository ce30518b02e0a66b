//! Persisted calibration parameters.
//!
//! # Block Format
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Magic: [u8; 4] = b"CALB"                     │  Offset: 0
//! ├──────────────────────────────────────────────┤
//! │ Version: u8 = 1                              │  Offset: 4
//! ├──────────────────────────────────────────────┤
//! │ Entry count: u8                              │  Offset: 5
//! ├──────────────────────────────────────────────┤
//! │ Entries: [(name, value)]                     │  Offset: 6
//! │   name: [u8; 16] (NUL padded)                │
//! │   value: i16 little-endian                   │
//! ├──────────────────────────────────────────────┤
//! │ CRC-16/CCITT-FALSE over all bytes above, LE  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! An erased page fails the magic check and reads as "nothing stored".

use core::convert::Infallible;

use crc16::{State, CCITT_FALSE};
use heapless::{FnvIndexMap, String};

use crate::calibration::ParamSource;

pub const BLOCK_MAGIC: [u8; 4] = *b"CALB";
pub const BLOCK_VERSION: u8 = 1;
pub const PARAM_NAME_LEN: usize = 16;
pub const MAX_PARAMS: usize = 16;

const HEADER_LEN: usize = 6;
const ENTRY_LEN: usize = PARAM_NAME_LEN + 2;

pub type ParamName = String<PARAM_NAME_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BlockError {
    Truncated,
    BadMagic,
    UnsupportedVersion(u8),
    BadChecksum,
    BadName,
    TooManyEntries,
}

/// In-memory parameter table decoded from a persisted block.
#[derive(Debug, Default)]
pub struct ParamTable {
    entries: FnvIndexMap<ParamName, i16, MAX_PARAMS>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<i16> {
        let key = ParamName::try_from(name).ok()?;
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, name: &str, value: i16) -> Result<(), BlockError> {
        let key = ParamName::try_from(name).map_err(|_| BlockError::BadName)?;
        self.entries
            .insert(key, value)
            .map_err(|_| BlockError::TooManyEntries)?;
        Ok(())
    }

    /// Decode and validate a block read from storage.
    pub fn from_block(bytes: &[u8]) -> Result<Self, BlockError> {
        if bytes.len() < HEADER_LEN + 2 {
            return Err(BlockError::Truncated);
        }
        if bytes[0..4] != BLOCK_MAGIC {
            return Err(BlockError::BadMagic);
        }
        if bytes[4] != BLOCK_VERSION {
            return Err(BlockError::UnsupportedVersion(bytes[4]));
        }

        let count = bytes[5] as usize;
        if count > MAX_PARAMS {
            return Err(BlockError::TooManyEntries);
        }
        let body_len = HEADER_LEN + count * ENTRY_LEN;
        if bytes.len() < body_len + 2 {
            return Err(BlockError::Truncated);
        }

        let stored_crc = u16::from_le_bytes([bytes[body_len], bytes[body_len + 1]]);
        if State::<CCITT_FALSE>::calculate(&bytes[..body_len]) != stored_crc {
            return Err(BlockError::BadChecksum);
        }

        let mut table = Self::new();
        for entry in bytes[HEADER_LEN..body_len].chunks_exact(ENTRY_LEN) {
            let name = decode_name(&entry[..PARAM_NAME_LEN])?;
            let value = i16::from_le_bytes([entry[PARAM_NAME_LEN], entry[PARAM_NAME_LEN + 1]]);
            table.insert(name, value)?;
        }
        Ok(table)
    }

    /// Decode a block, falling back to an empty table when nothing valid is
    /// stored. The device defaults then apply to every field.
    pub fn load_or_empty(bytes: &[u8]) -> Self {
        match Self::from_block(bytes) {
            Ok(table) => {
                log_info!("Loaded {} stored calibration parameters", table.len());
                table
            }
            Err(BlockError::BadMagic) => {
                log_info!("No stored calibration parameters");
                Self::new()
            }
            Err(e) => {
                log_warn!("Stored calibration block rejected: {:?}", e);
                Self::new()
            }
        }
    }
}

fn decode_name(raw: &[u8]) -> Result<&str, BlockError> {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    if end == 0 {
        return Err(BlockError::BadName);
    }
    core::str::from_utf8(&raw[..end]).map_err(|_| BlockError::BadName)
}

impl ParamSource for ParamTable {
    type Error = Infallible;

    fn read_i16(&mut self, name: &str) -> Result<Option<i16>, Infallible> {
        Ok(self.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out a block the way the host-side tool writes it.
    fn block(entries: &[(&str, i16)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&BLOCK_MAGIC);
        out.push(BLOCK_VERSION);
        out.push(entries.len() as u8);
        for (name, value) in entries {
            let mut raw = [0u8; PARAM_NAME_LEN];
            raw[..name.len()].copy_from_slice(name.as_bytes());
            out.extend_from_slice(&raw);
            out.extend_from_slice(&value.to_le_bytes());
        }
        let crc = State::<CCITT_FALSE>::calculate(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    #[test]
    fn test_decode_valid_block() {
        let bytes = block(&[("accel_radius", 1000), ("mag_offset_z", -12)]);
        let table = ParamTable::from_block(&bytes).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("accel_radius"), Some(1000));
        assert_eq!(table.get("mag_offset_z"), Some(-12));
        assert_eq!(table.get("gyro_offset_x"), None);
    }

    #[test]
    fn test_trailing_flash_bytes_are_ignored() {
        let mut bytes = block(&[("mag_radius", 480)]);
        bytes.resize(512, 0xFF);
        let table = ParamTable::from_block(&bytes).unwrap();
        assert_eq!(table.get("mag_radius"), Some(480));
    }

    #[test]
    fn test_erased_flash_reads_as_empty() {
        let erased = [0xFFu8; 64];
        assert_eq!(ParamTable::from_block(&erased).unwrap_err(), BlockError::BadMagic);
        assert!(ParamTable::load_or_empty(&erased).is_empty());
    }

    #[test]
    fn test_corrupted_block_rejected() {
        let mut bytes = block(&[("accel_offset_x", 5)]);
        bytes[HEADER_LEN + PARAM_NAME_LEN] ^= 0x01;
        assert_eq!(
            ParamTable::from_block(&bytes).unwrap_err(),
            BlockError::BadChecksum
        );
        assert!(ParamTable::load_or_empty(&bytes).is_empty());
    }

    #[test]
    fn test_version_and_length_checks() {
        let mut bytes = block(&[("accel_offset_x", 5)]);
        bytes[4] = 9;
        assert_eq!(
            ParamTable::from_block(&bytes).unwrap_err(),
            BlockError::UnsupportedVersion(9)
        );

        let bytes = block(&[("accel_offset_x", 5), ("accel_offset_y", 6)]);
        assert_eq!(
            ParamTable::from_block(&bytes[..bytes.len() - 3]).unwrap_err(),
            BlockError::Truncated
        );
    }

    #[test]
    fn test_empty_name_rejected() {
        let bytes = block(&[("", 1)]);
        assert_eq!(ParamTable::from_block(&bytes).unwrap_err(), BlockError::BadName);
    }

    #[test]
    fn test_param_source_lookup() {
        let mut table = ParamTable::new();
        table.insert("gyro_offset_z", -7).unwrap();

        assert_eq!(table.read_i16("gyro_offset_z"), Ok(Some(-7)));
        assert_eq!(table.read_i16("gyro_offset_y"), Ok(None));
        // longer than any storable name
        assert_eq!(table.read_i16("a_name_that_does_not_fit"), Ok(None));
    }
}
