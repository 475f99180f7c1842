//! Close codes carried on socket close frames.

use std::fmt;

/// Numeric close reason (RFC 6455 section 7.4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Orderly shutdown requested by the application
    pub const NORMAL: CloseCode = CloseCode(1000);

    /// Endpoint is going away
    pub const GOING_AWAY: CloseCode = CloseCode(1001);

    /// Abnormal shutdown, used when the host suspends the process.
    ///
    /// 1006 is reserved and never sent on the wire, so protocol-error is used.
    pub const ABNORMAL: CloseCode = CloseCode(1002);

    /// Raw numeric value
    pub fn as_u16(self) -> u16 {
        self.0
    }

    /// Whether this is the normal close code
    pub fn is_normal(self) -> bool {
        self == Self::NORMAL
    }
}

impl Default for CloseCode {
    fn default() -> Self {
        Self::NORMAL
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NORMAL => write!(f, "1000 (normal)"),
            Self::GOING_AWAY => write!(f, "1001 (going away)"),
            Self::ABNORMAL => write!(f, "1002 (abnormal)"),
            CloseCode(other) => write!(f, "{}", other),
        }
    }
}
