//! Per-interface datapath counters.

/// Counters updated by the TX and RX paths. One instance per
/// interface; callers aggregate across queues if they need totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RingStats {
    /// Packets whose transmission the DMA engine completed
    pub tx_packets: u64,
    /// Bytes of completed transmissions, job headers excluded
    pub tx_bytes: u64,
    /// Packets delivered upstream
    pub rx_packets: u64,
    /// Bytes received, leading metadata included
    pub rx_bytes: u64,
    /// Frames flagged with a frame check sequence mismatch
    pub rx_fcs_errors: u64,
    /// Frames flagged with a payload CRC mismatch
    pub rx_crc_errors: u64,
    /// Frames flagged with a MAC-level reception error
    pub rx_mac_errors: u64,
    /// RX buffer allocations that failed
    pub rx_alloc_errors: u64,
    /// Transmit attempts refused because the ring was full
    pub tx_ring_full: u64,
    /// Packets dropped before submission
    pub tx_dropped: u64,
}

impl RingStats {
    /// Fresh zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tx_packets: 0,
            tx_bytes: 0,
            rx_packets: 0,
            rx_bytes: 0,
            rx_fcs_errors: 0,
            rx_crc_errors: 0,
            rx_mac_errors: 0,
            rx_alloc_errors: 0,
            tx_ring_full: 0,
            tx_dropped: 0,
        }
    }

    /// Total frames the hardware flagged with a reception error.
    #[must_use]
    pub const fn rx_errors(&self) -> u64 {
        self.rx_fcs_errors + self.rx_crc_errors + self.rx_mac_errors
    }
}
