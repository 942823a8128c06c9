//! On-wire metadata headers.
//!
//! Transmit jobs are prefixed with a 16-byte header describing the
//! packet and the checksum offload request. Received packets carry a
//! leading metadata block whose layout depends on the chip revision:
//! 32 bytes on V1 with FCS/CRC error flags, 16 bytes on V2 with
//! MAC/CRC error flags. All fields are little-endian.

use crate::checksum::{CrcMode, IpMode};
use crate::constants::{RX_HEADER_SIZE_V1, RX_HEADER_SIZE_V2, TX_HEADER_SIZE};

// =============================================================================
// TX header
// =============================================================================

const TX_FLAG_HEADER_EN: u8 = 1 << 0;
const TX_FLAG_NOCX: u8 = 1 << 1;

/// Transmit job header, prepended to the first segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxHeader {
    /// Total packet size in bytes, header excluded
    pub pkt_size: u16,
    /// First lane the packet egresses on
    pub lane: u8,
    /// Header parsing enabled on the egress pipeline
    pub header_en: bool,
    /// Route through the NoC extension
    pub nocx: bool,
    /// IP layer the hardware should checksum
    pub ip_mode: IpMode,
    /// Transport layer the hardware should checksum
    pub crc_mode: CrcMode,
    /// Job index, echoed back in completion notifications
    pub index: u16,
    /// Precomputed pseudo-header checksum seed
    pub udp_tcp_cksum: u16,
}

impl TxHeader {
    /// Encode into the fixed wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; TX_HEADER_SIZE] {
        let mut buf = [0u8; TX_HEADER_SIZE];
        buf[0..2].copy_from_slice(&self.pkt_size.to_le_bytes());
        buf[2] = self.lane;
        let mut flags = 0u8;
        if self.header_en {
            flags |= TX_FLAG_HEADER_EN;
        }
        if self.nocx {
            flags |= TX_FLAG_NOCX;
        }
        buf[3] = flags;
        buf[4] = self.ip_mode as u8;
        buf[5] = self.crc_mode as u8;
        buf[6..8].copy_from_slice(&self.index.to_le_bytes());
        buf[8..10].copy_from_slice(&self.udp_tcp_cksum.to_le_bytes());
        buf
    }

    /// Decode from the fixed wire layout.
    #[must_use]
    pub fn decode(buf: &[u8; TX_HEADER_SIZE]) -> Self {
        Self {
            pkt_size: u16::from_le_bytes([buf[0], buf[1]]),
            lane: buf[2],
            header_en: buf[3] & TX_FLAG_HEADER_EN != 0,
            nocx: buf[3] & TX_FLAG_NOCX != 0,
            ip_mode: IpMode::from_raw(buf[4]),
            crc_mode: CrcMode::from_raw(buf[5]),
            index: u16::from_le_bytes([buf[6], buf[7]]),
            udp_tcp_cksum: u16::from_le_bytes([buf[8], buf[9]]),
        }
    }
}

// =============================================================================
// RX metadata
// =============================================================================

const RX_V1_FLAG_FCS_ERROR: u32 = 1 << 0;
const RX_V1_FLAG_CRC_ERROR: u32 = 1 << 1;

const RX_V2_FLAG_MAC_ERROR: u32 = 1 << 0;
const RX_V2_FLAG_CRC_ERROR: u32 = 1 << 1;

/// Revision-independent view of the leading RX metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxMetadata {
    /// Frame check sequence mismatch (V1 only)
    pub fcs_error: bool,
    /// Payload CRC mismatch
    pub crc_error: bool,
    /// MAC-level reception error (V2 only)
    pub mac_error: bool,
    /// Ingress lane the packet arrived on
    pub lane: u8,
    /// Hardware-verified transport checksum
    pub checksum_ok: bool,
}

impl RxMetadata {
    /// True when any error flag is raised.
    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.fcs_error || self.crc_error || self.mac_error
    }

    /// Parse the 32-byte V1 metadata block.
    #[must_use]
    pub fn parse_v1(buf: &[u8]) -> Option<Self> {
        if buf.len() < RX_HEADER_SIZE_V1 {
            return None;
        }
        let flags = u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]);
        Some(Self {
            fcs_error: flags & RX_V1_FLAG_FCS_ERROR != 0,
            crc_error: flags & RX_V1_FLAG_CRC_ERROR != 0,
            mac_error: false,
            lane: buf[28] & 0x03,
            checksum_ok: !Self::raw_error(flags, RX_V1_FLAG_FCS_ERROR | RX_V1_FLAG_CRC_ERROR),
        })
    }

    /// Parse the 16-byte V2 metadata block.
    #[must_use]
    pub fn parse_v2(buf: &[u8]) -> Option<Self> {
        if buf.len() < RX_HEADER_SIZE_V2 {
            return None;
        }
        let flags = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
        Some(Self {
            fcs_error: false,
            crc_error: flags & RX_V2_FLAG_CRC_ERROR != 0,
            mac_error: flags & RX_V2_FLAG_MAC_ERROR != 0,
            lane: buf[8] & 0x03,
            checksum_ok: !Self::raw_error(flags, RX_V2_FLAG_MAC_ERROR | RX_V2_FLAG_CRC_ERROR),
        })
    }

    const fn raw_error(flags: u32, mask: u32) -> bool {
        flags & mask != 0
    }
}

// =============================================================================
// Tests
// =============================================================================
