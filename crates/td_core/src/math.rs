//! Fixed-point math utilities for deterministic simulation.
//!
//! All simulation quantities (positions, speeds, timers, hitpoints) use
//! fixed-point arithmetic so that two runs with the same seed and the same
//! command stream produce bit-identical state on every platform.
//!
//! Angles are expressed in degrees. Bearings and unit vectors are computed
//! with CORDIC iterations over a small table of arctangents, so no
//! platform `libm` call is involved.

use fixed::types::I32F32;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Serializes optional fixed-point numbers via their raw bit representation,
/// preserving `None` as a serialized `None` value.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(Fixed::to_bits).serialize(serializer)
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<i64>::deserialize(deserializer)?;
        Ok(opt.map(Fixed::from_bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Build a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Calculate Manhattan distance.
    #[must_use]
    pub fn manhattan_distance(self, other: Self) -> Fixed {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Step from `self` toward `target` by at most `max_step`.
    ///
    /// Returns the new position and whether the target was reached.
    #[must_use]
    pub fn move_towards(self, target: Self, max_step: Fixed) -> (Self, bool) {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_step || dist == Fixed::ZERO {
            return (target, true);
        }

        (self + delta.scale(max_step / dist), false)
    }

    /// Bearing from `self` to `other` in degrees, in `[0, 360)`.
    #[must_use]
    pub fn bearing_to(self, other: Self) -> Fixed {
        let delta = other - self;
        atan2_deg(delta.y, delta.x)
    }

    /// Unit vector pointing along `degrees`.
    #[must_use]
    pub fn from_bearing(degrees: Fixed) -> Self {
        let (sin, cos) = sin_cos_deg(degrees);
        Self::new(cos, sin)
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// `atan(2^-i)` in degrees, for CORDIC iterations.
const CORDIC_ANGLES_DEG: [f64; 24] = [
    45.0,
    26.565_051_177_077_99,
    14.036_243_467_926_479,
    7.125_016_348_901_798,
    3.576_334_374_997_351,
    1.789_910_608_246_069,
    0.895_173_710_211_074,
    0.447_614_170_860_553,
    0.223_810_500_368_538,
    0.111_905_677_066_207,
    0.055_952_891_893_804,
    0.027_976_452_617_004,
    0.013_988_227_142_265,
    0.006_994_113_675_353,
    0.003_497_056_850_704,
    0.001_748_528_426_980,
    0.000_874_264_213_694,
    0.000_437_132_106_872,
    0.000_218_566_053_439,
    0.000_109_283_026_720,
    0.000_054_641_513_360,
    0.000_027_320_756_680,
    0.000_013_660_378_340,
    0.000_006_830_189_170,
];

/// Reciprocal of the CORDIC gain after 24 iterations.
const CORDIC_INV_GAIN: f64 = 0.607_252_935_008_881_3;

fn cordic_angle(i: usize) -> Fixed {
    Fixed::from_num(CORDIC_ANGLES_DEG[i])
}

/// Wrap an angle in degrees into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(degrees: Fixed) -> Fixed {
    let full = Fixed::from_num(360);
    let wrapped = degrees % full;
    if wrapped < Fixed::ZERO {
        wrapped + full
    } else {
        wrapped
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]` degrees.
#[must_use]
pub fn angle_difference(from: Fixed, to: Fixed) -> Fixed {
    let half = Fixed::from_num(180);
    let diff = normalize_degrees(to - from);
    if diff > half {
        diff - Fixed::from_num(360)
    } else {
        diff
    }
}

/// Four-quadrant arctangent in degrees, in `[0, 360)`.
///
/// `atan2_deg(0, 0)` is defined as 0.
#[must_use]
pub fn atan2_deg(y: Fixed, x: Fixed) -> Fixed {
    // Exact results on the axes.
    match (x.signum().to_num::<i32>(), y.signum().to_num::<i32>()) {
        (0, 0) | (1, 0) => return Fixed::ZERO,
        (0, 1) => return Fixed::from_num(90),
        (-1, 0) => return Fixed::from_num(180),
        (0, -1) => return Fixed::from_num(270),
        _ => {}
    }

    // Rotate into the right half-plane first; CORDIC vectoring only
    // converges for |angle| < ~99 degrees.
    let (mut x, mut y, mut angle) = if x < Fixed::ZERO {
        (-x, -y, Fixed::from_num(180))
    } else {
        (x, y, Fixed::ZERO)
    };

    for i in 0..CORDIC_ANGLES_DEG.len() {
        let shift = i as u32;
        let (x_shift, y_shift) = (x >> shift, y >> shift);
        if y > Fixed::ZERO {
            x += y_shift;
            y -= x_shift;
            angle += cordic_angle(i);
        } else {
            x -= y_shift;
            y += x_shift;
            angle -= cordic_angle(i);
        }
    }

    normalize_degrees(angle)
}

/// Sine and cosine of an angle in degrees, as `(sin, cos)`.
#[must_use]
pub fn sin_cos_deg(degrees: Fixed) -> (Fixed, Fixed) {
    let mut angle = normalize_degrees(degrees);
    let mut flip = false;
    if angle > Fixed::from_num(90) && angle <= Fixed::from_num(270) {
        angle -= Fixed::from_num(180);
        flip = true;
    } else if angle > Fixed::from_num(270) {
        angle -= Fixed::from_num(360);
    }

    let mut x = Fixed::from_num(CORDIC_INV_GAIN);
    let mut y = Fixed::ZERO;
    let mut z = angle;

    for i in 0..CORDIC_ANGLES_DEG.len() {
        let shift = i as u32;
        let (x_shift, y_shift) = (x >> shift, y >> shift);
        if z >= Fixed::ZERO {
            x -= y_shift;
            y += x_shift;
            z -= cordic_angle(i);
        } else {
            x += y_shift;
            y -= x_shift;
            z += cordic_angle(i);
        }
    }

    if flip {
        (-y, -x)
    } else {
        (y, x)
    }
}

/// Uniform draw from `[low, high)`; an empty range yields `low`.
pub fn random_fixed<R: Rng>(rng: &mut R, low: Fixed, high: Fixed) -> Fixed {
    if low >= high {
        return low;
    }
    Fixed::from_bits(rng.gen_range(low.to_bits()..high.to_bits()))
}

/// Uniform draw from `[0, 1)`.
pub fn random_unit<R: Rng>(rng: &mut R) -> Fixed {
    random_fixed(rng, Fixed::ZERO, Fixed::ONE)
}

/// Uniform integer draw from `[low, high)`; an empty range yields `low`.
pub fn random_u32<R: Rng>(rng: &mut R, low: u32, high: u32) -> u32 {
    if low >= high {
        return low;
    }
    rng.gen_range(low..high)
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2Fixed {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn close(a: Fixed, b: Fixed, epsilon: Fixed) -> bool {
        (a - b).abs() <= epsilon
    }

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::from_ints(3, 0);
        let b = Vec2Fixed::from_ints(0, 4);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), fixed(25));
        assert!(close(a.distance(b), fixed(5), Fixed::from_num(0.0001)));
    }

    #[test]
    fn test_fixed_determinism() {
        let a = fixed(1) / fixed(3);
        let b = fixed(1) / fixed(3);
        assert_eq!(a, b);
        assert_eq!(a * fixed(7), b * fixed(7));
    }

    #[test]
    fn test_vec2_lerp() {
        let a = Vec2Fixed::ZERO;
        let b = Vec2Fixed::from_ints(10, 20);
        let mid = a.lerp(b, Fixed::from_num(0.5));
        assert_eq!(mid, Vec2Fixed::from_ints(5, 10));
    }

    #[test]
    fn test_vec2_normalize() {
        let norm = Vec2Fixed::from_ints(3, 4).normalize();
        let len_sq = norm.dot(norm);
        let epsilon = Fixed::ONE / fixed(10000);
        assert!(close(len_sq, Fixed::ONE, epsilon), "got {len_sq:?}");
        assert!(close(norm.x * fixed(4), norm.y * fixed(3), epsilon));
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_move_towards_reaches_and_steps() {
        let start = Vec2Fixed::ZERO;
        let target = Vec2Fixed::from_ints(10, 0);

        let (pos, reached) = start.move_towards(target, fixed(4));
        assert!(!reached);
        assert!(close(pos.x, fixed(4), Fixed::from_num(0.0001)));
        assert_eq!(pos.y, Fixed::ZERO);

        let (pos, reached) = pos.move_towards(target, fixed(100));
        assert!(reached);
        assert_eq!(pos, target);
    }

    #[test]
    fn test_atan2_cardinal_directions() {
        let eps = Fixed::from_num(0.001);
        assert!(close(atan2_deg(fixed(0), fixed(1)), fixed(0), eps));
        assert!(close(atan2_deg(fixed(1), fixed(0)), fixed(90), eps));
        assert!(close(atan2_deg(fixed(0), fixed(-1)), fixed(180), eps));
        assert!(close(atan2_deg(fixed(-1), fixed(0)), fixed(270), eps));
        assert!(close(atan2_deg(fixed(1), fixed(1)), fixed(45), eps));
        assert!(close(atan2_deg(fixed(-3), fixed(-3)), fixed(225), eps));
        assert_eq!(atan2_deg(Fixed::ZERO, Fixed::ZERO), Fixed::ZERO);
    }

    #[test]
    fn test_sin_cos_known_angles() {
        let eps = Fixed::from_num(0.0001);
        let (s, c) = sin_cos_deg(fixed(0));
        assert!(close(s, fixed(0), eps) && close(c, fixed(1), eps));
        let (s, c) = sin_cos_deg(fixed(90));
        assert!(close(s, fixed(1), eps) && close(c, fixed(0), eps));
        let (s, c) = sin_cos_deg(fixed(180));
        assert!(close(s, fixed(0), eps) && close(c, fixed(-1), eps));
        let (s, c) = sin_cos_deg(fixed(-90));
        assert!(close(s, fixed(-1), eps) && close(c, fixed(0), eps));
        let (s, _) = sin_cos_deg(fixed(30));
        assert!(close(s, Fixed::from_num(0.5), eps));
    }

    #[test]
    fn test_bearing_round_trip() {
        let eps = Fixed::from_num(0.01);
        for deg in [0, 17, 90, 133, 200, 271, 359] {
            let dir = Vec2Fixed::from_bearing(fixed(deg));
            let back = Vec2Fixed::ZERO.bearing_to(dir);
            assert!(
                close(angle_difference(back, fixed(deg)), Fixed::ZERO, eps),
                "{deg} came back as {back:?}"
            );
        }
    }

    #[test]
    fn test_random_draws_stay_in_range() {
        use rand::SeedableRng;
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(9);
        for _ in 0..200 {
            let v = random_fixed(&mut rng, Fixed::from_num(0.7), Fixed::ONE);
            assert!(v >= Fixed::from_num(0.7) && v < Fixed::ONE);
            assert!(random_unit(&mut rng) < Fixed::ONE);
            assert!((3..6).contains(&random_u32(&mut rng, 3, 6)));
        }
        assert_eq!(random_u32(&mut rng, 7, 7), 7);
        assert_eq!(random_fixed(&mut rng, Fixed::ONE, Fixed::ONE), Fixed::ONE);
    }

    #[test]
    fn test_angle_difference_wraps() {
        assert_eq!(angle_difference(fixed(350), fixed(10)), fixed(20));
        assert_eq!(angle_difference(fixed(10), fixed(350)), fixed(-20));
        assert_eq!(angle_difference(fixed(0), fixed(180)), fixed(180));
        assert_eq!(normalize_degrees(fixed(-30)), fixed(330));
        assert_eq!(normalize_degrees(fixed(720)), fixed(0));
    }
}
