//! Seeded 2-D gradient noise for terrain generation.
//!
//! Map generation runs once per match, so this module works in `f64`.
//! Only IEEE basic arithmetic and `floor` are used, which keeps the output
//! identical on every platform.

use rand::seq::SliceRandom;
use rand::Rng;

/// Gradient directions indexed by the low three bits of a lattice hash.
const GRADIENTS: [(f64, f64); 8] = [
    (1.0, 1.0),
    (-1.0, 1.0),
    (1.0, -1.0),
    (-1.0, -1.0),
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
];

/// Classic improved Perlin noise over a shuffled permutation table.
#[derive(Debug, Clone)]
pub struct PerlinNoise {
    perm: [u8; 512],
}

impl PerlinNoise {
    /// Build a noise field whose permutation is drawn from `rng`.
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        table.shuffle(rng);

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm }
    }

    /// Sample the field. Output is roughly in `[0, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let xf = x.floor();
        let yf = y.floor();
        let xi = (xf as i64 & 255) as usize;
        let yi = (yf as i64 & 255) as usize;
        let dx = x - xf;
        let dy = y - yf;

        let u = fade(dx);
        let v = fade(dy);

        let aa = self.hash(xi, yi);
        let ab = self.hash(xi, yi + 1);
        let ba = self.hash(xi + 1, yi);
        let bb = self.hash(xi + 1, yi + 1);

        let x1 = lerp(u, grad(aa, dx, dy), grad(ba, dx - 1.0, dy));
        let x2 = lerp(u, grad(ab, dx, dy - 1.0), grad(bb, dx - 1.0, dy - 1.0));

        let value = (lerp(v, x1, x2) + 1.0) * 0.5;
        value.clamp(0.0, 1.0)
    }

    fn hash(&self, x: usize, y: usize) -> u8 {
        self.perm[self.perm[x] as usize + y]
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}

fn grad(hash: u8, x: f64, y: f64) -> f64 {
    let (gx, gy) = GRADIENTS[(hash & 7) as usize];
    gx * x + gy * y
}
