use std::f32::consts::{PI, TAU};

use glam::Vec2;

/// Wrap an angle into (-PI, PI].
pub fn normalize_angle(angle: f32) -> f32 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Signed shortest rotation from `from` to `to`.
pub fn angle_diff(from: f32, to: f32) -> f32 {
    normalize_angle(to - from)
}

/// Bearing in radians from `from` toward `to`.
pub fn bearing(from: Vec2, to: Vec2) -> f32 {
    let d = to - from;
    d.y.atan2(d.x)
}

/// Unit vector pointing along `angle`.
pub fn heading_vec(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

/// Rotate a local-frame offset by `angle`.
pub fn rotate_offset(offset: Vec2, angle: f32) -> Vec2 {
    let (s, c) = angle.sin_cos();
    Vec2::new(c * offset.x - s * offset.y, s * offset.x + c * offset.y)
}

/// Rectangular toroidal arena.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }

    /// Edge wrap used for bodies: leaving one side re-enters on the far side.
    pub fn wrap_edge(&self, mut pos: Vec2) -> Vec2 {
        if pos.x < 0.0 {
            pos.x = self.width;
        } else if pos.x > self.width {
            pos.x = 0.0;
        }
        if pos.y < 0.0 {
            pos.y = self.height;
        } else if pos.y > self.height {
            pos.y = 0.0;
        }
        pos
    }

    /// Edge wrap with an overhang margin, so large bodies slide fully off-screen first.
    pub fn wrap_with_margin(&self, mut pos: Vec2, margin: f32) -> Vec2 {
        if pos.x < -margin {
            pos.x = self.width + margin;
        } else if pos.x > self.width + margin {
            pos.x = -margin;
        }
        if pos.y < -margin {
            pos.y = self.height + margin;
        } else if pos.y > self.height + margin {
            pos.y = -margin;
        }
        pos
    }

    /// Euclidean modulo into [0, width) x [0, height). Used for predicted points.
    pub fn wrap_point(&self, pos: Vec2) -> Vec2 {
        Vec2::new(pos.x.rem_euclid(self.width), pos.y.rem_euclid(self.height))
    }

    /// Distance from the centre to a corner.
    pub fn half_diagonal(&self) -> f32 {
        self.center().length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_stays_in_half_open_range() {
        for i in -200..200 {
            let a = normalize_angle(i as f32 * 0.37);
            assert!(a > -PI - 1e-6 && a <= PI + 1e-6, "{a}");
        }
        assert!((normalize_angle(-PI) - PI).abs() < 1e-6);
        assert!((normalize_angle(3.0 * PI) - PI).abs() < 1e-4);
        assert_eq!(normalize_angle(f32::NAN), 0.0);
    }

    #[test]
    fn angle_diff_takes_short_way_round() {
        let d = angle_diff(PI - 0.1, -PI + 0.1);
        assert!((d - 0.2).abs() < 1e-5);
    }

    #[test]
    fn wrap_edge_jumps_to_far_side() {
        let b = Bounds::new(1200.0, 600.0);
        assert_eq!(b.wrap_edge(Vec2::new(-1.0, 300.0)), Vec2::new(1200.0, 300.0));
        assert_eq!(b.wrap_edge(Vec2::new(50.0, 601.0)), Vec2::new(50.0, 0.0));
    }

    #[test]
    fn wrap_point_is_euclidean() {
        let b = Bounds::new(100.0, 50.0);
        let p = b.wrap_point(Vec2::new(-10.0, 120.0));
        assert!((p.x - 90.0).abs() < 1e-4);
        assert!((p.y - 20.0).abs() < 1e-4);
    }

    #[test]
    fn rotate_offset_quarter_turn() {
        let r = rotate_offset(Vec2::new(1.0, 0.0), PI / 2.0);
        assert!(r.x.abs() < 1e-6 && (r.y - 1.0).abs() < 1e-6);
    }
}
