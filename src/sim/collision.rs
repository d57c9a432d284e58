//! Collision detection and response for pegs and side walls
//!
//! Everything is a circle or a segment, so detection is a distance check and
//! the response splits velocity into normal and tangential parts.

use glam::Vec2;

use super::lattice::Segment;

/// Result of a collision check
#[derive(Debug, Clone)]
pub struct CollisionResult {
    /// Whether a collision occurred
    pub hit: bool,
    /// Collision point (if hit)
    pub point: Vec2,
    /// Surface normal at collision (pointing toward ball center, for reflection)
    pub normal: Vec2,
    /// Penetration depth (for position correction)
    pub penetration: f32,
}

impl CollisionResult {
    pub fn miss() -> Self {
        Self {
            hit: false,
            point: Vec2::ZERO,
            normal: Vec2::ZERO,
            penetration: 0.0,
        }
    }
}

/// Check collision between a ball and a peg
///
/// A ball whose centre sits exactly on the peg centre gets an upward normal so
/// it is pushed out instead of producing a NaN.
pub fn ball_peg_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    peg: Vec2,
    peg_radius: f32,
) -> CollisionResult {
    let delta = ball_pos - peg;
    let combined = ball_radius + peg_radius;
    let dist_sq = delta.length_squared();

    if dist_sq >= combined * combined {
        return CollisionResult::miss();
    }

    let dist = dist_sq.sqrt();
    let normal = if dist > 0.0001 {
        delta / dist
    } else {
        Vec2::new(0.0, -1.0)
    };

    CollisionResult {
        hit: true,
        point: peg + normal * peg_radius,
        normal,
        penetration: combined - dist,
    }
}

/// Check collision between a ball and a wall segment
///
/// `inside` is any point on the playable side; the normal always points toward
/// it, even if the ball centre has already crossed the wall line.
pub fn ball_wall_collision(
    ball_pos: Vec2,
    ball_radius: f32,
    wall: &Segment,
    inside: Vec2,
) -> CollisionResult {
    let closest = wall.closest_point(ball_pos);
    let line = wall.b - wall.a;
    let mut normal = Vec2::new(-line.y, line.x).normalize_or_zero();
    if normal.dot(inside - wall.a) < 0.0 {
        normal = -normal;
    }

    // Signed distance: positive on the playable side
    let signed = (ball_pos - closest).dot(normal);
    if signed >= ball_radius {
        return CollisionResult::miss();
    }

    CollisionResult {
        hit: true,
        point: closest,
        normal,
        penetration: ball_radius - signed,
    }
}

/// Reflect velocity off a surface
///
/// Standard reflection: v' = v - 2(v·n)n
#[inline]
pub fn reflect_velocity(velocity: Vec2, normal: Vec2) -> Vec2 {
    velocity - 2.0 * velocity.dot(normal) * normal
}

/// Bounce with energy loss
///
/// The normal component is reversed and scaled by `restitution`; the
/// tangential component is scaled by `1 - friction`. With `restitution = 1`
/// and `friction = 0` this equals [`reflect_velocity`].
pub fn bounce_velocity(velocity: Vec2, normal: Vec2, restitution: f32, friction: f32) -> Vec2 {
    let vn = velocity.dot(normal) * normal;
    let vt = velocity - vn;
    vt * (1.0 - friction) - vn * restitution
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ball_peg_collision_hit_and_miss() {
        let peg = Vec2::new(100.0, 100.0);

        let miss = ball_peg_collision(Vec2::new(100.0, 80.0), 8.0, peg, 4.0);
        assert!(!miss.hit);

        let hit = ball_peg_collision(Vec2::new(100.0, 90.0), 8.0, peg, 4.0);
        assert!(hit.hit);
        assert!((hit.penetration - 2.0).abs() < 0.001);
        // Normal points from peg toward ball (upward in screen space)
        assert!(hit.normal.y < -0.99);
    }

    #[test]
    fn test_ball_peg_collision_concentric() {
        let peg = Vec2::new(50.0, 50.0);
        let hit = ball_peg_collision(peg, 8.0, peg, 4.0);
        assert!(hit.hit);
        assert!(hit.normal.is_finite());
        assert!((hit.normal.length() - 1.0).abs() < 0.001);
        assert!((hit.penetration - 12.0).abs() < 0.001);
    }

    #[test]
    fn test_wall_collision_normal_points_inside() {
        // Vertical wall at x = 10, playable side to the right
        let wall = Segment {
            a: Vec2::new(10.0, 0.0),
            b: Vec2::new(10.0, 100.0),
        };
        let inside = Vec2::new(50.0, 50.0);

        let far = ball_wall_collision(Vec2::new(30.0, 50.0), 8.0, &wall, inside);
        assert!(!far.hit);

        let touching = ball_wall_collision(Vec2::new(15.0, 50.0), 8.0, &wall, inside);
        assert!(touching.hit);
        assert!(touching.normal.x > 0.99);
        assert!((touching.penetration - 3.0).abs() < 0.001);

        // Centre already past the wall line
        let crossed = ball_wall_collision(Vec2::new(5.0, 50.0), 8.0, &wall, inside);
        assert!(crossed.hit);
        assert!(crossed.normal.x > 0.99);
        assert!((crossed.penetration - 13.0).abs() < 0.001);
    }

    #[test]
    fn test_reflect_velocity() {
        // Ball moving right, hits vertical wall (normal pointing left)
        let velocity = Vec2::new(100.0, 0.0);
        let normal = Vec2::new(-1.0, 0.0);

        let reflected = reflect_velocity(velocity, normal);
        assert!((reflected.x - (-100.0)).abs() < 0.001);
        assert!(reflected.y.abs() < 0.001);
    }

    #[test]
    fn test_bounce_velocity_restitution() {
        let velocity = Vec2::new(30.0, 100.0);
        let normal = Vec2::new(0.0, -1.0);

        let bounced = bounce_velocity(velocity, normal, 0.5, 0.0);
        assert!((bounced.x - 30.0).abs() < 0.001);
        assert!((bounced.y - (-50.0)).abs() < 0.001);

        let elastic = bounce_velocity(velocity, normal, 1.0, 0.0);
        assert!((elastic - reflect_velocity(velocity, normal)).length() < 0.001);
    }
}
