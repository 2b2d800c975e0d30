use serde::{Deserialize, Serialize};

/// Axis-aligned 3D bounding box, as stored in `metadata.json`'s
/// `boundingBox` field: two 3-vectors, `min` and `max`.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct Bounds {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }
}

impl Bounds {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Bounds {
        Bounds { min, max }
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Bounds::default();
    }

    pub fn sum(mut a: Bounds, b: &Bounds) -> Bounds {
        a.expand(b);
        a
    }

    #[inline]
    pub fn expand(&mut self, r: &Bounds) {
        for i in 0..3 {
            if r.min[i] < self.min[i] {
                self.min[i] = r.min[i];
            }
            if r.max[i] > self.max[i] {
                self.max[i] = r.max[i];
            }
        }
    }

    #[inline]
    pub fn expand_xyz(&mut self, x: f64, y: f64, z: f64) {
        let p = [x, y, z];
        for i in 0..3 {
            if p[i] < self.min[i] {
                self.min[i] = p[i];
            }
            if p[i] > self.max[i] {
                self.max[i] = p[i];
            }
        }
    }

    pub fn intersects(&self, r: &Bounds) -> bool {
        for i in 0..3 {
            if self.max[i] < r.min[i] || self.min[i] > r.max[i] {
                return false;
            }
        }
        true
    }
}
