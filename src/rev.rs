//! Chip revision capability model.
//!
//! The two silicon revisions differ in RX metadata layout, link-down
//! interrupt wiring, SerDes RX adaptation support, and coherency
//! behaviour. Revision-dependent code paths consult a [`RevData`]
//! capability record instead of matching on the revision directly, so
//! each difference is named once.

use crate::constants::{RX_HEADER_SIZE_V1, RX_HEADER_SIZE_V2};
use crate::hdr::RxMetadata;

/// Silicon revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipRev {
    /// First revision
    V1,
    /// Second revision
    V2,
}

/// Per-revision capabilities and quirks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RevData {
    /// Silicon revision the record describes
    pub revision: ChipRev,
    /// Link-down events are signalled through a dedicated interrupt
    pub link_down_irq: bool,
    /// SerDes performs RX adaptation; without it the link worker must
    /// restart the SerDes between bring-up retries
    pub rx_adaptation: bool,
    /// Link state is readable from the MAC status register
    pub mac_link_status: bool,
    /// Only a fixed single-lane mode is supported; autonegotiation is
    /// forced off during configuration
    pub forced_single_mode: bool,
    /// DMA writes land coherently; no cache maintenance needed before
    /// the CPU reads a completed buffer
    pub cache_shoot_through: bool,
}

impl RevData {
    /// Capability record for the first revision.
    #[must_use]
    pub const fn v1() -> Self {
        Self {
            revision: ChipRev::V1,
            link_down_irq: true,
            rx_adaptation: false,
            mac_link_status: true,
            forced_single_mode: false,
            cache_shoot_through: false,
        }
    }

    /// Capability record for the second revision.
    #[must_use]
    pub const fn v2() -> Self {
        Self {
            revision: ChipRev::V2,
            link_down_irq: true,
            rx_adaptation: true,
            mac_link_status: true,
            forced_single_mode: false,
            cache_shoot_through: true,
        }
    }

    /// Leading RX metadata size for this revision.
    #[must_use]
    pub const fn rx_header_len(&self) -> usize {
        match self.revision {
            ChipRev::V1 => RX_HEADER_SIZE_V1,
            ChipRev::V2 => RX_HEADER_SIZE_V2,
        }
    }

    /// Parse the leading RX metadata using this revision's layout.
    #[must_use]
    pub fn parse_rx_metadata(&self, block: &[u8]) -> Option<RxMetadata> {
        match self.revision {
            ChipRev::V1 => RxMetadata::parse_v1(block),
            ChipRev::V2 => RxMetadata::parse_v2(block),
        }
    }
}
