//! Queue domain bitmasks.

/// Queue-family membership mask.
///
/// [`DomainMask::ANY`] and [`DomainMask::DEVICE`] are wildcard values
/// the queue-inference pass narrows to a concrete queue.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct DomainMask(u32);

impl DomainMask {
    /// No domain.
    pub const NONE: Self = Self(0);
    /// Host access.
    pub const HOST: Self = Self(1);
    /// Graphics queue.
    pub const GRAPHICS: Self = Self(1 << 1);
    /// Compute queue.
    pub const COMPUTE: Self = Self(1 << 2);
    /// Transfer queue.
    pub const TRANSFER: Self = Self(1 << 3);
    /// Any device queue.
    pub const DEVICE: Self = Self(Self::GRAPHICS.0 | Self::COMPUTE.0 | Self::TRANSFER.0);
    /// Anywhere.
    pub const ANY: Self = Self(Self::DEVICE.0 | Self::HOST.0);

    /// Returns `true` if `self` contains all bits in `other`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no bits are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bitwise intersection.
    pub fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Returns `true` if the mask names a concrete scheduling target
    /// rather than a wildcard.
    pub fn is_resolved(self) -> bool {
        self != Self::ANY && self != Self::DEVICE && !self.is_empty()
    }

    /// The lowest set queue bit, used when inference has to commit to
    /// one queue out of several allowed ones.
    pub fn first_domain(self) -> Self {
        if self.0 == 0 {
            return Self::NONE;
        }
        Self(1 << self.0.trailing_zeros())
    }
}

impl Default for DomainMask {
    fn default() -> Self {
        Self::ANY
    }
}

impl std::ops::BitOr for DomainMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for DomainMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for DomainMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ANY => return f.write_str("any"),
            Self::DEVICE => return f.write_str("device"),
            Self::NONE => return f.write_str("none"),
            _ => {}
        }
        let mut first = true;
        let mut put = |f: &mut std::fmt::Formatter<'_>, s: &str| -> std::fmt::Result {
            if !first {
                f.write_str("|")?;
            }
            first = false;
            f.write_str(s)
        };
        if self.contains(Self::HOST) {
            put(f, "host")?;
        }
        if self.contains(Self::GRAPHICS) {
            put(f, "graphics")?;
        }
        if self.contains(Self::COMPUTE) {
            put(f, "compute")?;
        }
        if self.contains(Self::TRANSFER) {
            put(f, "transfer")?;
        }
        Ok(())
    }
}
