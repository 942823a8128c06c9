//! Transmit checksum offload helpers.
//!
//! The egress pipeline can finish a TCP or UDP checksum in hardware
//! when the job header carries the folded pseudo-header seed. Packets
//! the hardware cannot handle fall back to a full software checksum
//! written in place before submission.

use crate::constants::ETH_HEADER_SIZE;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

// =============================================================================
// Header field enums
// =============================================================================

/// IP layer announced to the checksum engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum IpMode {
    /// No IP checksum assistance
    #[default]
    None = 0,
    /// IPv4 packet
    V4 = 1,
    /// IPv6 packet
    V6 = 2,
}

impl IpMode {
    /// Decode from the wire value, unknown values map to `None`.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => IpMode::V4,
            2 => IpMode::V6,
            _ => IpMode::None,
        }
    }
}

/// Transport layer announced to the checksum engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CrcMode {
    /// No transport checksum assistance
    #[default]
    None = 0,
    /// UDP datagram
    Udp = 1,
    /// TCP segment
    Tcp = 2,
}

impl CrcMode {
    /// Decode from the wire value, unknown values map to `None`.
    #[must_use]
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => CrcMode::Udp,
            2 => CrcMode::Tcp,
            _ => CrcMode::None,
        }
    }
}

// =============================================================================
// One's-complement arithmetic
// =============================================================================

/// Fold a 32-bit accumulator down to 16 bits.
#[must_use]
pub const fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    sum as u16
}

/// Accumulate `data` into a one's-complement sum. Bytes are taken as
/// big-endian 16-bit words; a trailing odd byte is padded with zero.
#[must_use]
pub fn partial(data: &[u8], mut sum: u32) -> u32 {
    let mut chunks = data.chunks_exact(2);
    for pair in &mut chunks {
        sum += u32::from(u16::from_be_bytes([pair[0], pair[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(u16::from_be_bytes([*last, 0]));
    }
    sum
}

/// Folded pseudo-header checksum over addresses, protocol, and
/// transport length. `src` and `dst` are 4 bytes for IPv4, 16 for
/// IPv6.
#[must_use]
pub fn pseudo_header(src: &[u8], dst: &[u8], proto: u8, transport_len: u16) -> u16 {
    let mut sum = partial(src, 0);
    sum = partial(dst, sum);
    sum += u32::from(proto);
    sum += u32::from(transport_len);
    fold(sum)
}

// =============================================================================
// Offload decision
// =============================================================================

/// What to put in the job header for a packet requesting checksum
/// assistance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OffloadPlan {
    /// IP layer for the header
    pub ip_mode: IpMode,
    /// Transport layer for the header
    pub crc_mode: CrcMode,
    /// Folded pseudo-header seed for the header
    pub pseudo_cksum: u16,
    /// Offset of the transport header from the frame start
    pub csum_start: usize,
    /// Offset of the checksum field within the transport header
    pub csum_offset: usize,
}

/// Inspect an Ethernet frame and decide whether the hardware can
/// finish its transport checksum. Returns `None` for frames the
/// engine does not understand; those take the software path.
#[must_use]
pub fn plan_offload(frame: &[u8]) -> Option<OffloadPlan> {
    if frame.len() < ETH_HEADER_SIZE {
        return None;
    }
    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);
    let ip = &frame[ETH_HEADER_SIZE..];
    match ethertype {
        ETHERTYPE_IPV4 => plan_ipv4(ip),
        ETHERTYPE_IPV6 => plan_ipv6(ip),
        _ => None,
    }
}

fn plan_ipv4(ip: &[u8]) -> Option<OffloadPlan> {
    if ip.len() < 20 {
        return None;
    }
    let ihl = usize::from(ip[0] & 0x0F) * 4;
    if ihl < 20 || ip.len() < ihl {
        return None;
    }
    let total_len = u16::from_be_bytes([ip[2], ip[3]]);
    let proto = ip[9];
    let (crc_mode, csum_offset) = transport_mode(proto)?;
    let transport_len = total_len.checked_sub(ihl as u16)?;
    Some(OffloadPlan {
        ip_mode: IpMode::V4,
        crc_mode,
        pseudo_cksum: pseudo_header(&ip[12..16], &ip[16..20], proto, transport_len),
        csum_start: ETH_HEADER_SIZE + ihl,
        csum_offset,
    })
}

fn plan_ipv6(ip: &[u8]) -> Option<OffloadPlan> {
    // Extension headers are not walked; packets carrying them take the
    // software path.
    if ip.len() < 40 {
        return None;
    }
    let payload_len = u16::from_be_bytes([ip[4], ip[5]]);
    let next_header = ip[6];
    let (crc_mode, csum_offset) = transport_mode(next_header)?;
    Some(OffloadPlan {
        ip_mode: IpMode::V6,
        crc_mode,
        pseudo_cksum: pseudo_header(&ip[8..24], &ip[24..40], next_header, payload_len),
        csum_start: ETH_HEADER_SIZE + 40,
        csum_offset,
    })
}

const fn transport_mode(proto: u8) -> Option<(CrcMode, usize)> {
    match proto {
        IPPROTO_TCP => Some((CrcMode::Tcp, 16)),
        IPPROTO_UDP => Some((CrcMode::Udp, 6)),
        _ => None,
    }
}

/// Software fallback: compute the full transport checksum over
/// `frame[csum_start..]` and write its complement into the checksum
/// field. The field must be zeroed by the stack beforehand.
pub fn finish_in_software(frame: &mut [u8], csum_start: usize, csum_offset: usize) {
    let field = csum_start + csum_offset;
    if field + 2 > frame.len() {
        return;
    }
    let sum = fold(partial(&frame[csum_start..], 0));
    let cksum = !sum;
    // An all-zero result is transmitted as 0xFFFF.
    let cksum = if cksum == 0 { 0xFFFF } else { cksum };
    frame[field..field + 2].copy_from_slice(&cksum.to_be_bytes());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_udp_frame() -> [u8; 64] {
        let mut f = [0u8; 64];
        f[12] = 0x08; // IPv4
        let ip = &mut f[ETH_HEADER_SIZE..];
        ip[0] = 0x45; // version 4, ihl 5
        ip[2..4].copy_from_slice(&50u16.to_be_bytes()); // total length
        ip[9] = IPPROTO_UDP;
        ip[12..16].copy_from_slice(&[192, 168, 0, 1]);
        ip[16..20].copy_from_slice(&[192, 168, 0, 2]);
        f
    }

    #[test]
    fn fold_reduces_carries() {
        assert_eq!(fold(0x0001_FFFF), 1);
        assert_eq!(fold(0xFFFF), 0xFFFF);
        assert_eq!(fold(0x0002_0001), 3);
    }

    #[test]
    fn partial_pads_odd_byte() {
        // 0x0102 + 0x0300
        assert_eq!(fold(partial(&[1, 2, 3], 0)), 0x0402);
    }

    #[test]
    fn rfc1071_reference_vector() {
        // Example bytes from RFC 1071 section 3.
        let data = [0x00, 0x01, 0xF2, 0x03, 0xF4, 0xF5, 0xF6, 0xF7];
        assert_eq!(fold(partial(&data, 0)), 0xDDF2);
    }

    #[test]
    fn plans_ipv4_udp() {
        let frame = ipv4_udp_frame();
        let plan = plan_offload(&frame).unwrap();
        assert_eq!(plan.ip_mode, IpMode::V4);
        assert_eq!(plan.crc_mode, CrcMode::Udp);
        assert_eq!(plan.csum_start, ETH_HEADER_SIZE + 20);
        assert_eq!(plan.csum_offset, 6);
        // 30 bytes of UDP follow the 20-byte IP header.
        let expected = pseudo_header(&[192, 168, 0, 1], &[192, 168, 0, 2], IPPROTO_UDP, 30);
        assert_eq!(plan.pseudo_cksum, expected);
    }

    #[test]
    fn plans_ipv6_tcp() {
        let mut f = [0u8; 80];
        f[12] = 0x86;
        f[13] = 0xDD;
        let ip = &mut f[ETH_HEADER_SIZE..];
        ip[4..6].copy_from_slice(&26u16.to_be_bytes());
        ip[6] = IPPROTO_TCP;
        let plan = plan_offload(&f).unwrap();
        assert_eq!(plan.ip_mode, IpMode::V6);
        assert_eq!(plan.crc_mode, CrcMode::Tcp);
        assert_eq!(plan.csum_start, ETH_HEADER_SIZE + 40);
        assert_eq!(plan.csum_offset, 16);
    }

    #[test]
    fn rejects_non_ip_and_unknown_transport() {
        let mut arp = [0u8; 60];
        arp[12] = 0x08;
        arp[13] = 0x06;
        assert!(plan_offload(&arp).is_none());

        let mut frame = ipv4_udp_frame();
        frame[ETH_HEADER_SIZE + 9] = 1; // ICMP
        assert!(plan_offload(&frame).is_none());
    }

    #[test]
    fn rejects_truncated_frames() {
        let frame = ipv4_udp_frame();
        assert!(plan_offload(&frame[..10]).is_none());
        assert!(plan_offload(&frame[..20]).is_none());
    }

    #[test]
    fn software_checksum_verifies_to_ffff() {
        let mut frame = ipv4_udp_frame();
        let plan = plan_offload(&frame).unwrap();
        finish_in_software(&mut frame, plan.csum_start, plan.csum_offset);
        // Re-summing data that includes a correct checksum yields all
        // ones.
        let sum = fold(partial(&frame[plan.csum_start..], 0));
        assert_eq!(sum, 0xFFFF);
    }

    #[test]
    fn software_checksum_ignores_out_of_bounds_field() {
        let mut frame = [0u8; 16];
        let before = frame;
        finish_in_software(&mut frame, 10, 8);
        assert_eq!(frame, before);
    }
}
