//! Error types for the driver core.
//!
//! Errors are organized by domain for better diagnostics:
//! - [`ConfigError`]: bring-up and configuration failures, fatal to the
//!   resource being configured
//! - [`DmaError`]: descriptor ring and buffer exhaustion, recovered locally
//! - [`LinkError`]: transient link negotiation failures, retried by the
//!   link worker
//!
//! The unified [`Error`] enum wraps all domain errors and is returned
//! by the driver facade.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and bring-up errors.
///
/// These are fatal to the interface or lane being configured; they are never
/// retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Lane index out of range for this MAC block
    InvalidLane,
    /// Ring capacity must hold at least two descriptors
    InvalidRingSize,
    /// Autonegotiation requested while RX/TX lanes are physically crossed
    AutonegCrossedLanes,
    /// Invalid configuration parameter
    InvalidConfig,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::InvalidLane => "invalid lane index",
            ConfigError::InvalidRingSize => "invalid ring size",
            ConfigError::AutonegCrossedLanes => "autonegotiation not supported with crossed lanes",
            ConfigError::InvalidConfig => "invalid configuration",
        }
    }
}

// =============================================================================
// DMA Errors
// =============================================================================

/// Descriptor-ring and buffer errors.
///
/// All of these are resource exhaustion: the packet is dropped or deferred,
/// a counter is incremented, and nothing escalates to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// No unused descriptor slots in the ring
    RingFull,
    /// DMA address mapping failed
    MapFailed,
    /// The engine rejected the prepared job
    SubmitFailed,
    /// A computed segment fell below the engine's minimum size
    SegmentTooSmall,
    /// Segment count would exceed the per-packet bound
    TooManySegments,
    /// Buffer allocation failed
    AllocFailed,
    /// Completed buffer larger than one page
    BufferOverflow,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DmaError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DmaError::RingFull => "descriptor ring full",
            DmaError::MapFailed => "DMA mapping failed",
            DmaError::SubmitFailed => "DMA job submission failed",
            DmaError::SegmentTooSmall => "segment below minimum size",
            DmaError::TooManySegments => "too many segments for one packet",
            DmaError::AllocFailed => "buffer allocation failed",
            DmaError::BufferOverflow => "completed buffer exceeds page size",
        }
    }
}

// =============================================================================
// Link Errors
// =============================================================================

/// Link negotiation and status errors.
///
/// Except for [`LinkError::Unsupported`], these are transient: the link
/// worker retries until cancelled and never reports them to the caller of
/// a link request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// MAC reported no link within the poll window
    NoLink,
    /// Hardware link negotiation did not complete
    NegotiationFailed,
    /// Requested mode combination is not supported by this hardware
    Unsupported,
}

impl core::fmt::Display for LinkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl LinkError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LinkError::NoLink => "no link detected",
            LinkError::NegotiationFailed => "link negotiation failed",
            LinkError::Unsupported => "unsupported link mode",
        }
    }

    /// Whether the link worker should retry after this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, LinkError::Unsupported)
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// This enum wraps all domain-specific errors for unified error handling.
///
/// Match on the inner domain error for specific handling:
/// ```ignore
/// match result {
///     Err(Error::Config(ConfigError::AutonegCrossedLanes)) => { /* ... */ }
///     Err(Error::Dma(DmaError::RingFull)) => { /* ... */ }
///     Err(Error::Link(LinkError::NoLink)) => { /* ... */ }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// DMA error
    Dma(DmaError),
    /// Link error
    Link(LinkError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {}", e.as_str()),
            Error::Dma(e) => write!(f, "dma: {}", e.as_str()),
            Error::Link(e) => write!(f, "link: {}", e.as_str()),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Error::Link(e)
    }
}

/// Result type alias for driver operations
pub type Result<T> = core::result::Result<T, Error>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type alias for DMA operations
pub type DmaResult<T> = core::result::Result<T, DmaError>;

/// Result type alias for link operations
pub type LinkResult<T> = core::result::Result<T, LinkError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    use super::*;

    #[test]
    fn config_error_as_str_non_empty() {
        let variants = [
            ConfigError::InvalidLane,
            ConfigError::InvalidRingSize,
            ConfigError::AutonegCrossedLanes,
            ConfigError::InvalidConfig,
        ];

        for variant in variants {
            assert!(
                !variant.as_str().is_empty(),
                "ConfigError::{:?} has empty string",
                variant
            );
        }
    }

    #[test]
    fn dma_error_as_str_non_empty() {
        let variants = [
            DmaError::RingFull,
            DmaError::MapFailed,
            DmaError::SubmitFailed,
            DmaError::SegmentTooSmall,
            DmaError::TooManySegments,
            DmaError::AllocFailed,
            DmaError::BufferOverflow,
        ];

        for variant in variants {
            assert!(
                !variant.as_str().is_empty(),
                "DmaError::{:?} has empty string",
                variant
            );
        }
    }

    #[test]
    fn link_error_transience() {
        assert!(LinkError::NoLink.is_transient());
        assert!(LinkError::NegotiationFailed.is_transient());
        assert!(!LinkError::Unsupported.is_transient());
    }

    #[test]
    fn error_display_includes_domain() {
        let display = format!("{}", Error::Dma(DmaError::RingFull));
        assert!(display.contains("dma"));
        assert!(display.contains("ring full"));

        let display = format!("{}", Error::Link(LinkError::NoLink));
        assert!(display.contains("link"));

        let display = format!("{}", Error::Config(ConfigError::AutonegCrossedLanes));
        assert!(display.contains("config"));
        assert!(display.contains("crossed"));
    }

    #[test]
    fn error_from_domain_errors() {
        let err: Error = DmaError::MapFailed.into();
        assert_eq!(err, Error::Dma(DmaError::MapFailed));

        let err: Error = ConfigError::InvalidLane.into();
        assert_eq!(err, Error::Config(ConfigError::InvalidLane));

        let err: Error = LinkError::Unsupported.into();
        assert_eq!(err, Error::Link(LinkError::Unsupported));
    }

    #[test]
    fn result_aliases_work() {
        fn dma_fn() -> DmaResult<u32> {
            Err(DmaError::RingFull)
        }
        fn link_fn() -> LinkResult<u32> {
            Ok(7)
        }

        assert!(dma_fn().is_err());
        assert_eq!(link_fn().unwrap(), 7);
    }
}
