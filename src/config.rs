//! Lane and link configuration types.
//!
//! A [`LaneConfig`] describes one logical interface: which lane it starts
//! on, the requested speed/duplex, and whether autonegotiation is wanted.
//! Aggregated speeds span multiple consecutive lanes; [`Speed::nb_lanes`]
//! gives the mapping.

use crate::constants::LANE_NB;
use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Speed / Duplex
// =============================================================================

/// Link speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    /// 1 Gbit/s (single lane)
    Gbps1,
    /// 10 Gbit/s (single lane)
    Gbps10,
    /// 25 Gbit/s (single lane)
    Gbps25,
    /// 40 Gbit/s (4 x 10G lanes)
    Gbps40,
    /// 50 Gbit/s (2 x 25G lanes)
    Gbps50,
    /// 100 Gbit/s (4 x 25G lanes)
    Gbps100,
    /// Not yet negotiated or configured
    #[default]
    Unknown,
}

impl Speed {
    /// Number of physical lanes the speed aggregates, with the per-lane
    /// speed. Returns `None` for [`Speed::Unknown`].
    #[must_use]
    pub const fn nb_lanes(&self) -> Option<(u8, Speed)> {
        match self {
            Speed::Gbps100 => Some((LANE_NB as u8, Speed::Gbps25)),
            Speed::Gbps40 => Some((LANE_NB as u8, Speed::Gbps10)),
            Speed::Gbps50 => Some((2, Speed::Gbps25)),
            Speed::Gbps25 => Some((1, Speed::Gbps25)),
            Speed::Gbps10 => Some((1, Speed::Gbps10)),
            Speed::Gbps1 => Some((1, Speed::Gbps1)),
            Speed::Unknown => None,
        }
    }

    /// Speed in megabits per second, 0 when unknown.
    #[must_use]
    pub const fn mbps(&self) -> u32 {
        match self {
            Speed::Gbps1 => 1_000,
            Speed::Gbps10 => 10_000,
            Speed::Gbps25 => 25_000,
            Speed::Gbps40 => 40_000,
            Speed::Gbps50 => 50_000,
            Speed::Gbps100 => 100_000,
            Speed::Unknown => 0,
        }
    }
}

/// Duplex mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Duplex {
    /// Full duplex
    Full,
    /// Half duplex
    Half,
    /// Not yet negotiated or configured
    #[default]
    Unknown,
}

// =============================================================================
// Retimer channel mapping
// =============================================================================

/// Static per-lane mapping onto external retimer channels.
///
/// Parsed once from platform configuration; read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetimerParams {
    /// Retimer channel per lane, RX direction
    pub rx_channels: [u8; LANE_NB],
    /// Retimer channel per lane, TX direction
    pub tx_channels: [u8; LANE_NB],
}

impl RetimerParams {
    /// Identity mapping: lane `i` sits on retimer channel `i`.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            rx_channels: [0, 1, 2, 3],
            tx_channels: [0, 1, 2, 3],
        }
    }
}

impl Default for RetimerParams {
    fn default() -> Self {
        Self::identity()
    }
}

// =============================================================================
// Lane configuration
// =============================================================================

/// Configuration of one logical interface and the lanes it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LaneConfig {
    /// First lane owned by this interface (0..[`LANE_NB`])
    pub lane: u8,
    /// Requested or negotiated speed
    pub speed: Speed,
    /// Requested or negotiated duplex
    pub duplex: Duplex,
    /// Autonegotiation requested
    pub autoneg: bool,
    /// RX/TX lanes physically crossed on this board
    pub crossed_lanes: bool,
    /// Prefix transmit jobs with the metadata header
    pub header_en: bool,
    /// Route transmit traffic through the NoC extension
    pub nocx_en: bool,
    /// RX queue id reported upstream for this interface
    pub rx_queue: u8,
}

impl LaneConfig {
    /// Create a configuration for the given first lane, with
    /// everything else at bring-up defaults (speed/duplex unknown,
    /// autonegotiation enabled).
    #[must_use]
    pub const fn new(lane: u8) -> Self {
        Self {
            lane,
            speed: Speed::Unknown,
            duplex: Duplex::Unknown,
            autoneg: true,
            crossed_lanes: false,
            header_en: true,
            nocx_en: false,
            rx_queue: 0,
        }
    }

    /// Set the requested speed.
    #[must_use]
    pub const fn with_speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }

    /// Set the requested duplex.
    #[must_use]
    pub const fn with_duplex(mut self, duplex: Duplex) -> Self {
        self.duplex = duplex;
        self
    }

    /// Enable or disable autonegotiation.
    #[must_use]
    pub const fn with_autoneg(mut self, autoneg: bool) -> Self {
        self.autoneg = autoneg;
        self
    }

    /// Mark the board's RX/TX lanes as physically crossed.
    #[must_use]
    pub const fn with_crossed_lanes(mut self, crossed: bool) -> Self {
        self.crossed_lanes = crossed;
        self
    }

    /// Set the RX queue id reported upstream.
    #[must_use]
    pub const fn with_rx_queue(mut self, queue: u8) -> Self {
        self.rx_queue = queue;
        self
    }

    /// Validate the configuration at interface creation time.
    ///
    /// Crossed lanes plus autonegotiation is a hard configuration error;
    /// it is also re-checked on every configuration attempt since
    /// autonegotiation can be toggled later.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.lane as usize >= LANE_NB {
            return Err(ConfigError::InvalidLane);
        }
        if self.autoneg && self.crossed_lanes {
            return Err(ConfigError::AutonegCrossedLanes);
        }
        if usize::from(self.lane) + usize::from(self.nb_lanes()) > LANE_NB {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(())
    }

    /// Number of lanes this interface aggregates (1 while unconfigured).
    #[must_use]
    pub fn nb_lanes(&self) -> u8 {
        self.speed.nb_lanes().map_or(1, |(n, _)| n)
    }

    /// Bitmask of the lanes held by this interface.
    pub fn lane_mask(&self) -> u32 {
        let nb = self.nb_lanes() as u32;
        ((1 << nb) - 1) << self.lane
    }
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

// =============================================================================
// Tests
// =============================================================================
