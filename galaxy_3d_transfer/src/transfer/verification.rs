/// VerificationHarness - end to end check of the host -> device -> host copy path
///
/// A single pass writes a known pattern into a host-visible source buffer,
/// copies it on the device into a zero-filled destination, reads it back
/// and compares every byte. Mismatches are a result (`Failed`), not an error.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::{BufferUsageFlags, GraphicsDevice, MemoryPropertyFlags};
use crate::transfer::{copy_buffer, BufferConfig, BufferResource, ResourceBuilder, TransferRequest};
use crate::{engine_debug, engine_error, engine_info, engine_warn};

/// Default size of the verification buffers
pub const TEST_BUFFER_SIZE: u64 = 4096;

/// Default number of mismatches kept (and logged) per comparison
pub const MAX_REPORTED_MISMATCHES: usize = 128;

const LOG_SOURCE: &str = "galaxy3d::transfer";

/// Deterministic pattern `byte[i] = (i mod 250) + 1`
///
/// Never contains 0, so a zero-filled destination the copy did not reach
/// mismatches on every byte.
pub fn test_pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 250) as u8 + 1).collect()
}

// ============================================================================
// Comparison
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteMismatch {
    pub index: usize,
    pub expected: u8,
    pub actual: u8,
}

/// Outcome of a byte comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparisonReport {
    /// Total number of mismatching bytes
    pub mismatch_count: usize,
    /// First mismatches in index order, at most `max_reported`
    pub mismatches: Vec<ByteMismatch>,
}

impl ComparisonReport {
    pub fn is_match(&self) -> bool {
        self.mismatch_count == 0
    }

    /// True when more mismatches were counted than kept
    pub fn is_truncated(&self) -> bool {
        self.mismatch_count > self.mismatches.len()
    }
}

/// Compare `actual` against `expected`
///
/// Every differing byte is counted; the first `max_reported` are kept. Bytes
/// past the end of the shorter slice count as mismatches but have no entry.
pub fn compare_bytes(expected: &[u8], actual: &[u8], max_reported: usize) -> ComparisonReport {
    let mut report = ComparisonReport::default();

    for (index, (&expected, &actual)) in expected.iter().zip(actual).enumerate() {
        if expected != actual {
            report.mismatch_count += 1;
            if report.mismatches.len() < max_reported {
                report.mismatches.push(ByteMismatch { index, expected, actual });
            }
        }
    }
    report.mismatch_count += expected.len().abs_diff(actual.len());

    report
}

// ============================================================================
// State machine
// ============================================================================

/// Progress of a verification pass
///
/// `Idle -> SourcePrepared -> SourceFlushed -> TransferComplete ->
/// DestinationInvalidated -> Verified | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationState {
    /// Nothing allocated yet
    Idle,
    /// Source mapped and filled with the pattern
    SourcePrepared,
    /// Source flushed and unmapped
    SourceFlushed,
    /// Device copy finished
    TransferComplete,
    /// Destination mapped and invalidated
    DestinationInvalidated,
    /// Every byte matched
    Verified,
    /// At least one byte differed
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationConfig {
    /// Size of both buffers in bytes
    pub buffer_size: u64,
    /// Mismatches kept and logged per comparison
    pub max_reported_mismatches: usize,
    /// Memory properties requested for both buffers (must include HOST_VISIBLE)
    pub memory_properties: MemoryPropertyFlags,
    /// Read the source back before the copy and report it separately
    pub source_self_check: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            buffer_size: TEST_BUFFER_SIZE,
            max_reported_mismatches: MAX_REPORTED_MISMATCHES,
            memory_properties: MemoryPropertyFlags::HOST_VISIBLE,
            source_self_check: true,
        }
    }
}

/// Result of a completed pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    /// `Verified` or `Failed`
    pub state: VerificationState,
    pub buffer_size: u64,
    pub mismatch_count: usize,
    pub mismatches: Vec<ByteMismatch>,
    /// Source read-back before the copy, when enabled
    pub self_check: Option<ComparisonReport>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.state == VerificationState::Verified
    }
}

// ============================================================================
// CopyVerification
// ============================================================================

/// Runs the copy verification on a device
pub struct CopyVerification {
    device: Arc<dyn GraphicsDevice>,
    config: VerificationConfig,
    state: VerificationState,
}

impl CopyVerification {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self::with_config(device, VerificationConfig::default())
    }

    pub fn with_config(device: Arc<dyn GraphicsDevice>, config: VerificationConfig) -> Self {
        Self {
            device,
            config,
            state: VerificationState::Idle,
        }
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Last state reached, also after a fatal error
    pub fn state(&self) -> VerificationState {
        self.state
    }

    /// Run one verification pass
    ///
    /// Each call starts again from `Idle` with fresh buffers, which are
    /// released before returning.
    ///
    /// # Errors
    ///
    /// Allocation, mapping, synchronization and transfer errors are returned
    /// as-is; `state()` then tells how far the pass got.
    pub fn run(&mut self) -> Result<VerificationReport> {
        self.state = VerificationState::Idle;
        engine_info!(LOG_SOURCE, "Copy verification started ({} bytes, memory {:?})",
            self.config.buffer_size, self.config.memory_properties);

        self.execute().inspect_err(|e| engine_error!(LOG_SOURCE,
            "Copy verification aborted after state {:?}: {}", self.state, e))
    }

    fn execute(&mut self) -> Result<VerificationReport> {
        let size = self.config.buffer_size;
        let properties = self.config.memory_properties;
        let pattern = test_pattern(size as usize);
        let builder = ResourceBuilder::new(Arc::clone(&self.device));

        // Source: write pattern, flush while mapped, unmap
        let mut source = builder.build(
            &BufferConfig::new(size, BufferUsageFlags::TRANSFER_SRC, properties)
                .with_name("verification_source"),
        )?;
        {
            let mut mapped = source.map()?;
            mapped.write(0, &pattern)?;
            self.advance(VerificationState::SourcePrepared);
            mapped.flush()?;
        }
        self.advance(VerificationState::SourceFlushed);

        let self_check = if self.config.source_self_check {
            Some(self.check_source(&mut source, &pattern)?)
        } else {
            None
        };

        // Destination: zero-fill so an unreached byte never matches the pattern
        let mut destination = builder.build(
            &BufferConfig::new(size, BufferUsageFlags::TRANSFER_DST, properties)
                .with_name("verification_destination"),
        )?;
        {
            let mut mapped = destination.map()?;
            mapped.fill(0);
            mapped.flush()?;
        }

        copy_buffer(&TransferRequest::whole(&source, &destination))?;
        self.advance(VerificationState::TransferComplete);

        let comparison = {
            let mapped = destination.map()?;
            mapped.invalidate()?;
            self.advance(VerificationState::DestinationInvalidated);
            compare_bytes(&pattern, mapped.as_slice(), self.config.max_reported_mismatches)
        };

        if comparison.is_match() {
            self.advance(VerificationState::Verified);
            engine_info!(LOG_SOURCE, "Copy verification PASSED: all {} bytes match", size);
        } else {
            self.advance(VerificationState::Failed);
            log_mismatches(&comparison, size);
            engine_error!(LOG_SOURCE, "Copy verification FAILED: {} mismatched bytes out of {}",
                comparison.mismatch_count, size);
        }

        Ok(VerificationReport {
            state: self.state,
            buffer_size: size,
            mismatch_count: comparison.mismatch_count,
            mismatches: comparison.mismatches,
            self_check,
        })
    }

    /// Read the flushed source back and compare it with the pattern
    fn check_source(&self, source: &mut BufferResource, pattern: &[u8]) -> Result<ComparisonReport> {
        let mapped = source.map()?;
        mapped.invalidate()?;
        let report = compare_bytes(pattern, mapped.as_slice(), self.config.max_reported_mismatches);

        if report.is_match() {
            engine_debug!(LOG_SOURCE, "Source self-check passed ({} bytes)", pattern.len());
        } else {
            engine_warn!(LOG_SOURCE, "Source self-check FAILED: flushed source differs from the pattern");
            log_mismatches(&report, pattern.len() as u64);
        }
        Ok(report)
    }

    fn advance(&mut self, state: VerificationState) {
        engine_debug!(LOG_SOURCE, "Copy verification: {:?} -> {:?}", self.state, state);
        self.state = state;
    }
}

fn log_mismatches(report: &ComparisonReport, size: u64) {
    for mismatch in &report.mismatches {
        engine_warn!(LOG_SOURCE, "byte {}: expected 0x{:02X}, actual 0x{:02X}",
            mismatch.index, mismatch.expected, mismatch.actual);
    }
    engine_warn!(LOG_SOURCE, "{} mismatched bytes out of {}", report.mismatch_count, size);
    if report.is_truncated() {
        engine_warn!(LOG_SOURCE, "further mismatches not printed ({} shown)", report.mismatches.len());
    }
}

#[cfg(test)]
#[path = "verification_tests.rs"]
mod tests;
