//! Firmware revision negotiation.
//!
//! The device exposes its firmware revision as a free-form string in the
//! Device Information service. It is decoded once per connection into a
//! single packed byte (`major << 4 | minor`) which gates the protocol
//! dialect: revisions below [`FirmwareRevision::BINARY_DIALECT_MIN`] only
//! understand the legacy ASCII frames, everything at or above it speaks the
//! checksum-framed binary protocol.

use tracing::debug;

/// Packed firmware revision byte (`major << 4 | minor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FirmwareRevision(pub u8);

impl FirmwareRevision {
    /// Sentinel for devices that report the placeholder string or a legacy
    /// string with no "Revision" marker at all.
    pub const LEGACY: FirmwareRevision = FirmwareRevision(0x15);

    /// Sentinel for revision strings that could not be parsed as `X.Y`.
    pub const UNPARSED: FirmwareRevision = FirmwareRevision(0x23);

    /// First revision that speaks the binary opcode dialect.
    pub const BINARY_DIALECT_MIN: u8 = 0x20;

    pub fn major(self) -> u8 {
        self.0 >> 4
    }

    pub fn minor(self) -> u8 {
        self.0 & 0x0F
    }

    /// Whether this revision uses the checksum-framed binary dialect.
    pub fn is_binary_dialect(self) -> bool {
        self.0 >= Self::BINARY_DIALECT_MIN
    }

    /// Decode a Device Information revision string.
    ///
    /// `"Firmware Revision"` is the shield's unprogrammed placeholder and
    /// maps to [`Self::LEGACY`]. A string containing `"Revision X.Y"` packs
    /// the two numeric components; anything else containing `"Revision"`
    /// maps to [`Self::UNPARSED`]. Strings without the marker come from
    /// first-generation devices and also map to [`Self::LEGACY`].
    ///
    /// A packed value of zero ("Revision 0.0") means the shield never set
    /// the characteristic; callers should reconnect and re-query instead of
    /// trusting it.
    pub fn from_revision_string(s: &str) -> FirmwareRevision {
        if s == "Firmware Revision" {
            return Self::LEGACY;
        }
        if !s.contains("Revision") {
            return Self::LEGACY;
        }

        let version = s.replace("Revision ", "");
        let components: Vec<&str> = version.split('.').collect();
        if let [major, minor] = components.as_slice() {
            if let (Ok(major), Ok(minor)) = (major.parse::<u8>(), minor.parse::<u8>()) {
                return FirmwareRevision((major << 4) | (minor & 0x0F));
            }
        }
        debug!("Couldn't parse firmware version: {:?}", s);
        Self::UNPARSED
    }
}
