//! 3D positions for spatial sources
//!
//! A [`Position`] is stored in Cartesian form and answers spherical queries
//! on demand. Conventions:
//! - azimuth: degrees counter-clockwise from +x towards +y, `atan2(y, x)`
//! - elevation: degrees above the xy plane, `atan2(z, hypot(x, y))`
//! - radius: Euclidean distance from the origin

/// A 3D point convertible between Cartesian and spherical coordinates
///
/// [`Position::INVALID`] marks "no recorded sample" or "channel not yet
/// positioned". Any two invalid positions compare equal so that change
/// detection does not see a new value on every tick.
#[derive(Debug, Clone, Copy)]
pub struct Position {
    x: f32,
    y: f32,
    z: f32,
}

impl Position {
    /// Sentinel for "no position"
    pub const INVALID: Position = Position {
        x: f32::NAN,
        y: f32::NAN,
        z: f32::NAN,
    };

    /// The origin
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a position from Cartesian coordinates
    #[inline]
    pub const fn from_cartesian(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Create a position from spherical coordinates (degrees)
    pub fn from_spherical(azimuth: f32, elevation: f32, radius: f32) -> Self {
        let az = azimuth.to_radians();
        let el = elevation.to_radians();
        let planar = radius * el.cos();
        Self {
            x: planar * az.cos(),
            y: planar * az.sin(),
            z: radius * el.sin(),
        }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.y
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.z
    }

    /// Azimuth in degrees, in (-180, 180]
    pub fn azimuth(&self) -> f32 {
        self.y.atan2(self.x).to_degrees()
    }

    /// Elevation in degrees, in [-90, 90]
    pub fn elevation(&self) -> f32 {
        self.z.atan2(self.x.hypot(self.y)).to_degrees()
    }

    /// Distance from the origin
    pub fn radius(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Spherical triple `(azimuth, elevation, radius)`
    pub fn to_spherical(&self) -> (f32, f32, f32) {
        (self.azimuth(), self.elevation(), self.radius())
    }

    /// False for [`Position::INVALID`] or any non-finite component
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Straight-line interpolation, `t` in [0, 1]
    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// Euclidean distance to another position
    pub fn distance(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::INVALID
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_valid(), other.is_valid()) {
            (true, true) => self.x == other.x && self.y == other.y && self.z == other.z,
            (false, false) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
        } else {
            write!(f, "(invalid)")
        }
    }
}
