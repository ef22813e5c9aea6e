/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Stanchion detection records written by the vision process.
//!
//! The vision process overwrites a small file (normally on `/dev/shm`) with
//! one fixed-layout record per camera frame: seven little-endian `i32`s.
//!
//! ```text
//! offset  0  frame_count
//!         4  found            0 = none, 1 = red, 2 = yellow
//!         8  box_width
//!        12  box_height
//!        16  x_mid
//!        20  y_bot
//!        24  safety_frame_count
//! ```
//!
//! The writer updates `frame_count` first and `safety_frame_count` last, so a
//! record whose two counters differ was read while being rewritten.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use super::{HardwareError, VisionSource};
use crate::timer::Timer;

/// Size of one encoded record in bytes.
pub const RECORD_LEN: usize = 28;

const WORD: usize = 4;

// ── Found ─────────────────────────────────────────────────────────────────────

/// Kind of stanchion in the most recent frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Found {
    #[default]
    None,
    /// Course-side marker.
    Red,
    /// Corner marker.
    Yellow,
}

impl Found {
    /// Decode the wire value.  Unknown values read as [`Found::None`].
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Found::Red,
            2 => Found::Yellow,
            _ => Found::None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Found::None => 0,
            Found::Red => 1,
            Found::Yellow => 2,
        }
    }
}

// ── VisionRecord ──────────────────────────────────────────────────────────────

/// One decoded detection record.  The default value is the cleared record
/// (all zero, nothing found).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisionRecord {
    pub frame_count: i32,
    pub found: Found,
    pub box_width: i32,
    pub box_height: i32,
    pub x_mid: i32,
    pub y_bot: i32,
    pub safety_frame_count: i32,
}

impl VisionRecord {
    /// Decode the first [`RECORD_LEN`] bytes of `buf`.
    ///
    /// # Errors
    /// [`HardwareError::ShortRecord`] when `buf` is too short.
    pub fn decode(buf: &[u8]) -> Result<Self, HardwareError> {
        if buf.len() < RECORD_LEN {
            return Err(HardwareError::ShortRecord {
                len: buf.len(),
                expected: RECORD_LEN,
            });
        }
        let word = |index: usize| {
            let at = index * WORD;
            i32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
        };
        Ok(Self {
            frame_count: word(0),
            found: Found::from_raw(word(1)),
            box_width: word(2),
            box_height: word(3),
            x_mid: word(4),
            y_bot: word(5),
            safety_frame_count: word(6),
        })
    }

    /// Encode into the on-disk layout.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let words = [
            self.frame_count,
            self.found.as_raw(),
            self.box_width,
            self.box_height,
            self.x_mid,
            self.y_bot,
            self.safety_frame_count,
        ];
        let mut out = [0u8; RECORD_LEN];
        for (chunk, word) in out.chunks_exact_mut(WORD).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// `true` when both frame counters agree, i.e. the record was not torn.
    pub fn is_consistent(&self) -> bool {
        self.frame_count == self.safety_frame_count
    }

    /// Reset to the cleared record.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

// ── FileVision ────────────────────────────────────────────────────────────────

/// [`VisionSource`] reading the record file shared with the vision process.
///
/// Each read rewinds to offset 0.  A torn or short record is retried after a
/// short pause; the read fails once all attempts are used up.
#[derive(Debug)]
pub struct FileVision {
    path: PathBuf,
    attempts: u32,
    retry_delay: Duration,

    /// Opened on first use and dropped after an I/O error so the next read
    /// reopens the file.
    file: Option<File>,
}

impl FileVision {
    pub const DEFAULT_ATTEMPTS: u32 = 2;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1);

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attempts: Self::DEFAULT_ATTEMPTS,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
            file: None,
        }
    }

    /// Number of reads per [`read_detection`](VisionSource::read_detection)
    /// call (at least one).
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_once(&mut self) -> Result<VisionRecord, HardwareError> {
        if self.file.is_none() {
            let opened = File::open(&self.path).map_err(|e| HardwareError::io(&self.path, e))?;
            self.file = Some(opened);
        }

        let mut buf = Vec::with_capacity(RECORD_LEN);
        let read = match self.file.as_mut() {
            Some(file) => read_record_bytes(file, &mut buf),
            None => return Err(HardwareError::Unavailable(self.path.display().to_string())),
        };
        if let Err(e) = read {
            self.file = None;
            return Err(HardwareError::io(&self.path, e));
        }

        VisionRecord::decode(&buf)
    }
}

/// Rewind and read at most one record's worth of bytes.
fn read_record_bytes(file: &mut File, buf: &mut Vec<u8>) -> io::Result<usize> {
    file.seek(SeekFrom::Start(0))?;
    file.take(RECORD_LEN as u64).read_to_end(buf)
}

impl VisionSource for FileVision {
    fn read_detection(&mut self) -> Result<VisionRecord, HardwareError> {
        let mut failure = None;

        for attempt in 1..=self.attempts {
            let err = match self.read_once() {
                Ok(record) if record.is_consistent() => return Ok(record),
                Ok(record) => HardwareError::TornRecord {
                    attempts: attempt,
                    frame_count: record.frame_count,
                    safety_frame_count: record.safety_frame_count,
                },
                Err(e @ HardwareError::ShortRecord { .. }) => e,
                Err(e) => return Err(e),
            };

            warn!(
                path = %self.path.display(),
                attempt,
                of = self.attempts,
                "vision record rejected: {err}"
            );
            failure = Some(err);

            if attempt < self.attempts {
                Timer::sleep_duration(self.retry_delay);
            }
        }

        Err(failure.unwrap_or_else(|| {
            HardwareError::Unavailable(format!("no read attempted on {}", self.path.display()))
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn record(frame: i32, found: Found, height: i32) -> VisionRecord {
        VisionRecord {
            frame_count: frame,
            found,
            box_width: 20,
            box_height: height,
            x_mid: 160,
            y_bot: 200,
            safety_frame_count: frame,
        }
    }

    fn record_file(bytes: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    // ── Decoding ──────────────────────────────────────────────────────────────

    #[test]
    fn decode_reads_little_endian_fields_in_order() {
        let mut bytes = Vec::new();
        for word in [7i32, 2, 30, 45, -12, 240, 7] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        let r = VisionRecord::decode(&bytes).unwrap();

        assert_eq!(r.frame_count, 7);
        assert_eq!(r.found, Found::Yellow);
        assert_eq!(r.box_width, 30);
        assert_eq!(r.box_height, 45);
        assert_eq!(r.x_mid, -12);
        assert_eq!(r.y_bot, 240);
        assert_eq!(r.safety_frame_count, 7);
        assert!(r.is_consistent());
    }

    #[test]
    fn encode_matches_decode_layout() {
        let r = record(3, Found::Red, 50);
        let bytes = r.encode();
        assert_eq!(&bytes[0..4], &3i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1i32.to_le_bytes());
        assert_eq!(VisionRecord::decode(&bytes).unwrap(), r);
    }

    #[test]
    fn short_buffer_is_rejected() {
        let err = VisionRecord::decode(&[0u8; 27]).unwrap_err();
        assert!(matches!(
            err,
            HardwareError::ShortRecord { len: 27, expected: RECORD_LEN }
        ));
    }

    #[test]
    fn unknown_found_value_reads_as_none() {
        assert_eq!(Found::from_raw(9), Found::None);
        assert_eq!(Found::from_raw(-1), Found::None);
    }

    #[test]
    fn clear_resets_to_nothing_found() {
        let mut r = record(11, Found::Red, 40);
        r.clear();
        assert_eq!(r, VisionRecord::default());
        assert_eq!(r.found, Found::None);
    }

    // ── FileVision ────────────────────────────────────────────────────────────

    #[test]
    fn reads_consistent_record_from_file() {
        let wanted = record(42, Found::Yellow, 55);
        let f = record_file(&wanted.encode());
        let mut vision = FileVision::new(f.path());
        assert_eq!(vision.read_detection().unwrap(), wanted);
    }

    #[test]
    fn rereads_from_start_after_file_is_rewritten() {
        let f = record_file(&record(1, Found::Red, 40).encode());
        let mut vision = FileVision::new(f.path());
        assert_eq!(vision.read_detection().unwrap().frame_count, 1);

        std::fs::write(f.path(), record(2, Found::None, 0).encode()).unwrap();
        assert_eq!(vision.read_detection().unwrap().frame_count, 2);
    }

    #[test]
    fn torn_record_fails_after_all_attempts() {
        let mut torn = record(5, Found::Red, 40);
        torn.safety_frame_count = 4;
        let f = record_file(&torn.encode());

        let err = FileVision::new(f.path())
            .with_attempts(3)
            .read_detection()
            .unwrap_err();
        assert!(matches!(
            err,
            HardwareError::TornRecord {
                attempts: 3,
                frame_count: 5,
                safety_frame_count: 4
            }
        ));
    }

    #[test]
    fn truncated_file_is_reported_as_short_record() {
        let f = record_file(&[1, 0, 0, 0]);
        let err = FileVision::new(f.path()).read_detection().unwrap_err();
        assert!(matches!(err, HardwareError::ShortRecord { len: 4, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FileVision::new("/nonexistent/stanchions")
            .read_detection()
            .unwrap_err();
        assert!(matches!(err, HardwareError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/stanchions"));
    }

    #[test]
    fn zero_attempts_still_reads_once() {
        let f = record_file(&record(9, Found::None, 0).encode());
        let mut vision = FileVision::new(f.path()).with_attempts(0);
        assert_eq!(vision.read_detection().unwrap().frame_count, 9);
    }
}
