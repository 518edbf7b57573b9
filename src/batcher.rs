//! Accelerometer batch assembly
//!
//! The platform delivers accelerometer samples in variable-length batches;
//! the sink wants one fixed-size record per append. [`AccelBatcher`] bridges
//! the two: accepted samples are encoded back to back from the start of the
//! buffer and the unused tail is zero-filled, so the output is always exactly
//! [`ACCELERATION_RECORD_SIZE`] bytes.
//!
//! Samples captured while the vibration motor ran are excluded entirely, not
//! zero-filled in place: later samples shift left, so output slot `i` does
//! not necessarily correspond to input slot `i`.

use crate::channels::{ACCELERATION_BATCH, ACCELERATION_RECORD_SIZE};
use crate::codec;
use crate::sensors::AccelSample;

/// Reusable fixed-size encoder for one acceleration append per cycle.
///
/// The buffer is allocated once and reused every cycle. Callbacks run to
/// completion on the background queue, so no locking is needed around the
/// encode pass.
#[derive(Debug)]
pub struct AccelBatcher {
    buf: Vec<u8>,
}

impl Default for AccelBatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AccelBatcher {
    pub fn new() -> Self {
        Self {
            buf: vec![0u8; ACCELERATION_RECORD_SIZE],
        }
    }

    /// Encode one callback's samples into the batch buffer.
    ///
    /// Samples with `did_vibrate` set are skipped. Encoding stops once
    /// [`ACCELERATION_BATCH`](crate::channels::ACCELERATION_BATCH) samples
    /// have been accepted. The returned slice is the whole buffer, ready to
    /// append to the acceleration channel.
    pub fn encode(&mut self, samples: &[AccelSample]) -> &[u8] {
        let mut at = 0;
        for sample in samples {
            if sample.did_vibrate {
                continue;
            }
            if at == self.buf.len() {
                break;
            }
            at = codec::put_u64(&mut self.buf, at, sample.timestamp);
            at = codec::put_i16(&mut self.buf, at, sample.x);
            at = codec::put_i16(&mut self.buf, at, sample.y);
            at = codec::put_i16(&mut self.buf, at, sample.z);
        }
        // zero everything not written this cycle
        self.buf[at..].fill(0);
        &self.buf
    }
}

/// Last sample of a batch that survives the vibration filter, if any.
///
/// This is the sample the device-state mirror reflects after the batch.
pub fn last_accepted(samples: &[AccelSample]) -> Option<&AccelSample> {
    samples
        .iter()
        .filter(|s| !s.did_vibrate)
        .take(ACCELERATION_BATCH)
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ACCELERATION_SAMPLE_SIZE;

    fn make_sample(n: u64) -> AccelSample {
        AccelSample {
            timestamp: 1000 + n,
            x: n as i16,
            y: -(n as i16),
            z: 100 + n as i16,
            did_vibrate: false,
        }
    }

    fn decode_sample(record: &[u8]) -> (u64, i16, i16, i16) {
        (
            u64::from_be_bytes(record[0..8].try_into().unwrap()),
            i16::from_be_bytes(record[8..10].try_into().unwrap()),
            i16::from_be_bytes(record[10..12].try_into().unwrap()),
            i16::from_be_bytes(record[12..14].try_into().unwrap()),
        )
    }

    #[test]
    fn test_output_is_always_full_record_size() {
        let mut batcher = AccelBatcher::new();
        for k in [0usize, 1, 7, ACCELERATION_BATCH] {
            let samples: Vec<AccelSample> = (0..k as u64).map(make_sample).collect();
            assert_eq!(batcher.encode(&samples).len(), ACCELERATION_RECORD_SIZE);
        }
    }

    #[test]
    fn test_accepted_samples_keep_relative_order() {
        let mut batcher = AccelBatcher::new();
        let samples: Vec<AccelSample> = (0..5).map(make_sample).collect();
        let out = batcher.encode(&samples);
        for (i, sample) in samples.iter().enumerate() {
            let slot = &out[i * ACCELERATION_SAMPLE_SIZE..(i + 1) * ACCELERATION_SAMPLE_SIZE];
            assert_eq!(
                decode_sample(slot),
                (sample.timestamp, sample.x, sample.y, sample.z)
            );
        }
    }

    #[test]
    fn test_tail_is_zero_filled() {
        let mut batcher = AccelBatcher::new();
        // dirty the buffer with a full batch first
        let full: Vec<AccelSample> = (0..ACCELERATION_BATCH as u64).map(make_sample).collect();
        batcher.encode(&full);

        let samples: Vec<AccelSample> = (0..3).map(make_sample).collect();
        let out = batcher.encode(&samples);
        assert!(out[3 * ACCELERATION_SAMPLE_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_input_yields_all_zero_record() {
        let mut batcher = AccelBatcher::new();
        batcher.encode(&[make_sample(9)]);
        let out = batcher.encode(&[]);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_vibration_samples_are_packed_out() {
        let mut batcher = AccelBatcher::new();
        let mut samples: Vec<AccelSample> = (0..4).map(make_sample).collect();
        samples[1].did_vibrate = true;
        samples[2].did_vibrate = true;

        let out = batcher.encode(&samples);
        // accepted samples 0 and 3 land in slots 0 and 1, no gap
        assert_eq!(
            decode_sample(&out[0..ACCELERATION_SAMPLE_SIZE]),
            (1000, 0, 0, 100)
        );
        assert_eq!(
            decode_sample(&out[ACCELERATION_SAMPLE_SIZE..2 * ACCELERATION_SAMPLE_SIZE]),
            (1003, 3, -3, 103)
        );
        assert!(out[2 * ACCELERATION_SAMPLE_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_all_vibrating_batch_is_all_zero() {
        let mut batcher = AccelBatcher::new();
        let samples: Vec<AccelSample> = (0..4)
            .map(|n| AccelSample {
                did_vibrate: true,
                ..make_sample(n)
            })
            .collect();
        let out = batcher.encode(&samples);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_excess_input_stops_at_batch_capacity() {
        let mut batcher = AccelBatcher::new();
        let samples: Vec<AccelSample> = (0..ACCELERATION_BATCH as u64 + 10)
            .map(make_sample)
            .collect();
        let out = batcher.encode(&samples);
        let last_slot = &out[(ACCELERATION_BATCH - 1) * ACCELERATION_SAMPLE_SIZE..];
        assert_eq!(
            decode_sample(last_slot).0,
            samples[ACCELERATION_BATCH - 1].timestamp
        );
    }

    #[test]
    fn test_last_accepted_skips_vibration() {
        let mut samples: Vec<AccelSample> = (0..4).map(make_sample).collect();
        samples[3].did_vibrate = true;
        assert_eq!(last_accepted(&samples).unwrap().timestamp, 1002);
        assert!(last_accepted(&[]).is_none());
    }
}
