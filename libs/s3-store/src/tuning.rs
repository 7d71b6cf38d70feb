// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Upload tuning

/// Default multipart part size (16 MiB)
pub const DEFAULT_PART_SIZE: u64 = 16 * 1024 * 1024;

/// Default number of parts uploaded in parallel
pub const DEFAULT_NUM_THREADS: u32 = 4;

/// Smallest part size S3 accepts for anything but the final part
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Tuning knobs applied to every `put`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferTuning {
    /// Size of each multipart part in bytes
    pub part_size: u64,
    /// Number of parts allowed in flight when concurrent parts are enabled
    pub num_threads: u32,
    /// Allow several parts to be buffered in memory and uploaded at once.
    /// Memory use grows to roughly `part_size * num_threads`.
    pub concurrent_stream_parts: bool,
    /// Upload with a single request whenever the body fits in one part,
    /// including bodies of unknown length
    pub disable_multipart: bool,
    /// Sign requests with `UNSIGNED-PAYLOAD` instead of hashing the body
    pub disable_content_hash: bool,
}

impl Default for TransferTuning {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            num_threads: DEFAULT_NUM_THREADS,
            concurrent_stream_parts: false,
            disable_multipart: true,
            disable_content_hash: true,
        }
    }
}

impl TransferTuning {
    /// Check the values are usable against a real S3 endpoint
    pub fn validate(&self) -> Result<(), String> {
        if self.num_threads == 0 {
            return Err("num_threads must be at least 1".to_string());
        }
        // Oversized bodies go multipart even when it is disabled.
        if self.part_size < MIN_PART_SIZE {
            return Err(format!(
                "part size {} is below the S3 minimum of {} bytes",
                self.part_size, MIN_PART_SIZE
            ));
        }
        Ok(())
    }

    /// Number of multipart parts that may be in flight at once
    pub fn parts_in_flight(&self) -> usize {
        if self.concurrent_stream_parts {
            self.num_threads.max(1) as usize
        } else {
            1
        }
    }

    /// Whether to attempt a single request for a body of the given size
    ///
    /// The single-request path still spills to multipart past `part_size`.
    pub fn single_request(&self, size: Option<u64>) -> bool {
        self.disable_multipart || size.is_some_and(|s| s <= self.part_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_configuration() {
        let tuning = TransferTuning::default();
        assert_eq!(tuning.part_size, 16 * 1024 * 1024);
        assert_eq!(tuning.num_threads, 4);
        assert!(!tuning.concurrent_stream_parts);
        assert!(tuning.disable_multipart);
        assert!(tuning.disable_content_hash);
        assert!(tuning.validate().is_ok());
    }

    #[test]
    fn validate_rejects_tiny_parts() {
        let mut tuning = TransferTuning {
            part_size: 1024,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());

        tuning.disable_multipart = false;
        assert!(tuning.validate().is_err());

        tuning.part_size = MIN_PART_SIZE;
        tuning.num_threads = 0;
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn single_request_decision() {
        let tuning = TransferTuning {
            disable_multipart: false,
            part_size: 100,
            ..Default::default()
        };
        assert!(tuning.single_request(Some(100)));
        assert!(!tuning.single_request(Some(101)));
        assert!(!tuning.single_request(None));

        let tuning = TransferTuning::default();
        assert!(tuning.single_request(None));
    }

    #[test]
    fn parts_in_flight_follows_mem_cache_toggle() {
        let mut tuning = TransferTuning::default();
        assert_eq!(tuning.parts_in_flight(), 1);
        tuning.concurrent_stream_parts = true;
        assert_eq!(tuning.parts_in_flight(), 4);
    }
}
