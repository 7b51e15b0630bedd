//! Math types for Aural

pub use glam::Vec3;

/// Listener orientation in the 3D audio space: a forward ("at") vector and an
/// up vector, flushed to the backend as six floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub forward: Vec3,
    pub up: Vec3,
}

impl Orientation {
    pub fn new(forward: Vec3, up: Vec3) -> Self {
        Self { forward, up }
    }

    pub fn to_array(self) -> [f32; 6] {
        [
            self.forward.x,
            self.forward.y,
            self.forward.z,
            self.up.x,
            self.up.y,
            self.up.z,
        ]
    }

    pub fn from_array(values: [f32; 6]) -> Self {
        Self {
            forward: Vec3::new(values[0], values[1], values[2]),
            up: Vec3::new(values[3], values[4], values[5]),
        }
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            forward: -Vec3::Z,
            up: Vec3::Y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_array_roundtrip() {
        let o = Orientation::new(Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(o.to_array(), [0.0, 0.0, -1.0, 0.0, 1.0, 0.0]);
        assert_eq!(Orientation::from_array(o.to_array()), o);
    }
}
