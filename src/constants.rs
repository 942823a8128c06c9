//! Shared driver constants.
//!
//! Segment bounds come from the DMA engine's job format: a transmit job is a
//! list of segments, each at most [`SEG_SIZE`] bytes, and the engine rejects
//! trailing segments shorter than [`MIN_LAST_SEG_SIZE`].

/// Number of physical lanes per MAC block.
pub const LANE_NB: usize = 4;

/// Maximum segment size sent to the DMA engine, in bytes.
pub const SEG_SIZE: usize = 1024;

/// Minimum size accepted for the last segment of a transmit job.
pub const MIN_LAST_SEG_SIZE: usize = 32;

/// Maximum size targeted for the last segment of a transmit job.
///
/// When a split would leave a remainder below [`MIN_LAST_SEG_SIZE`], the
/// boundary moves backward so both resulting segments stay within bounds.
pub const MAX_LAST_SEG_SIZE: usize = 220;

/// Upper bound on DMA segments per submitted packet.
pub const MAX_TX_SEGMENTS: usize = 18;

/// Upper bound on upstream fragments per outbound packet.
pub const MAX_TX_FRAGS: usize = 8;

/// Upper bound on page fragments per received packet.
pub const MAX_RX_SEGMENTS: usize = 17;

/// Size of the per-job transmit metadata slot, in bytes.
pub const TX_HEADER_SIZE: usize = 16;

/// Size of the receive metadata header prepended by first-revision
/// hardware.
pub const RX_HEADER_SIZE_V1: usize = 32;

/// Size of the receive metadata header prepended by second-revision
/// hardware.
pub const RX_HEADER_SIZE_V2: usize = 16;

/// Ethernet header size (dst + src + ethertype), in bytes.
pub const ETH_HEADER_SIZE: usize = 14;

/// Delay between link configuration retries, in milliseconds.
///
/// **Sensitive**: also covers the lag between link cfg done and the actual
/// link-up status from hardware.
pub const LINK_RETRY_DELAY_MS: u32 = 1000;

/// Delay before the first link-health poll after link up, in milliseconds.
pub const POST_LINK_UP_DELAY_MS: u32 = 3000;

/// Step between MAC link-up status reads during bring-up, in microseconds.
pub const LINK_UP_POLL_STEP_US: u32 = 1000;

/// Total window for confirming MAC link-up status, in microseconds.
///
/// Avoids false detection: the MAC status must hold over this period.
pub const LINK_UP_POLL_WINDOW_US: u32 = 10_000;

/// Bounded wait for pending TX descriptors when quiescing a queue, in
/// microseconds.
pub const TX_QUIESCE_TIMEOUT_US: u32 = 10_000;

/// Polling step while waiting for TX descriptors to drain, in microseconds.
pub const TX_QUIESCE_STEP_US: u32 = 15;

/// Default number of completed RX descriptors handled per poll call.
pub const DEFAULT_RX_POLL_BUDGET: usize = 64;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_bounds_are_consistent() {
        assert!(MIN_LAST_SEG_SIZE < MAX_LAST_SEG_SIZE);
        assert!(MAX_LAST_SEG_SIZE < SEG_SIZE);
        // The backward shift must always be able to produce a valid pair.
        assert!(SEG_SIZE + MIN_LAST_SEG_SIZE > MAX_LAST_SEG_SIZE);
    }

    #[test]
    fn tx_segment_bound_covers_fragment_bound() {
        assert!(MAX_TX_SEGMENTS > MAX_TX_FRAGS);
    }

    #[test]
    fn rx_headers_fit_in_first_segment() {
        assert!(RX_HEADER_SIZE_V1 < SEG_SIZE);
        assert!(RX_HEADER_SIZE_V2 < RX_HEADER_SIZE_V1);
    }
}
