//! Fixed timestep simulation tick
//!
//! Advances every ball in flight by one step and hands back the ones that
//! reached the floor (or had to be forced there).

use glam::Vec2;

use super::collision::{ball_peg_collision, ball_wall_collision, bounce_velocity};
use super::lattice::Lattice;
use super::state::{Ball, DropWorld};
use crate::consts::*;

/// How a ball left the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingKind {
    /// Crossed the floor normally
    Settled,
    /// Failed to settle within `MAX_BALL_TICKS` or went numerically unstable
    Forced,
}

/// A ball that has left the simulation, ready for bin resolution
#[derive(Debug)]
pub struct Landing {
    pub ball: Ball,
    /// Final x position used for bin lookup
    pub x: f32,
    pub kind: LandingKind,
}

/// Advance all balls by one fixed timestep
///
/// Landings are returned in ball-id order for the tick in which they happen.
pub fn step(world: &mut DropWorld, dt: f32) -> Vec<Landing> {
    world.time_ticks += 1;

    let lattice = world.lattice;
    let balls = std::mem::take(&mut world.balls);
    let mut remaining = Vec::with_capacity(balls.len());
    let mut landings = Vec::new();

    for mut ball in balls {
        match advance_ball(world, lattice, &mut ball, dt) {
            Some(kind) => {
                let x = ball.pos.x;
                landings.push(Landing { ball, x, kind });
            }
            None => remaining.push(ball),
        }
    }

    world.balls = remaining;
    // Ensure deterministic ordering
    world.normalize_order();
    landings
}

fn advance_ball(
    world: &mut DropWorld,
    lattice: &Lattice,
    ball: &mut Ball,
    dt: f32,
) -> Option<LandingKind> {
    ball.ticks += 1;
    let scale = lattice.peg_spacing;

    // --- INTEGRATE ---
    ball.vel.y += GRAVITY * scale * dt;
    ball.vel *= (1.0 - AIR_DRAG * dt).max(0.0);
    clamp_speed(ball, scale);
    let lateral = MAX_LATERAL_SPEED * scale;
    ball.vel.x = ball.vel.x.clamp(-lateral, lateral);
    ball.pos += ball.vel * dt;

    // --- PEGS ---
    for row in lattice.rows_near(ball.pos.y) {
        for &peg in row {
            let hit = ball_peg_collision(ball.pos, ball.radius, peg, lattice.peg_radius);
            if !hit.hit {
                continue;
            }

            ball.pos += hit.normal * hit.penetration;

            let vn = ball.vel.dot(hit.normal);
            if vn < -MIN_IMPACT_SPEED * scale {
                ball.vel = bounce_velocity(ball.vel, hit.normal, RESTITUTION, PEG_FRICTION);
                ball.vel.x = ball.vel.x * LATERAL_DAMPING + world.jitter(MAX_PERTURBATION * scale);
                ball.bounces += 1;

                // Near-centre hit: no sideways component to roll off with
                if hit.normal.x.abs() < CENTER_HIT_EPSILON {
                    ball.vel.x += world.coin() * NUDGE_SPEED * scale;
                }
            } else if vn < 0.0 {
                // Rolling contact: drop the inward component only
                ball.vel -= vn * hit.normal;
            }
        }
    }

    // --- WALLS ---
    let inside = Vec2::new(lattice.drop_center(), lattice.floor_y * 0.5);
    for wall in &lattice.walls {
        let hit = ball_wall_collision(ball.pos, ball.radius, wall, inside);
        if hit.hit {
            ball.pos += hit.normal * hit.penetration;
            if ball.vel.dot(hit.normal) < 0.0 {
                ball.vel = bounce_velocity(ball.vel, hit.normal, WALL_RESTITUTION, 0.0);
            }
        }
    }
    ball.pos.x = ball.pos.x.clamp(ball.radius, lattice.width - ball.radius);

    // --- RESTING ---
    if ball.pos.distance(ball.anchor) < REST_DISTANCE {
        ball.rest_ticks += 1;
        if ball.rest_ticks >= REST_TICKS_LIMIT {
            let push = world.coin() * NUDGE_SPEED * scale;
            log::debug!("Ball {} resting at {:?}, nudging {}", ball.id, ball.pos, push);
            ball.vel.x += push;
            ball.rest_ticks = 0;
        }
    } else {
        ball.anchor = ball.pos;
        ball.rest_ticks = 0;
    }

    clamp_speed(ball, scale);

    if !ball.pos.is_finite() || !ball.vel.is_finite() {
        log::warn!("Ball {} went unstable at tick {}, forcing landing", ball.id, ball.ticks);
        ball.pos = Vec2::new(lattice.drop_center(), lattice.floor_y);
        ball.vel = Vec2::ZERO;
        return Some(LandingKind::Forced);
    }

    // --- SETTLE ---
    if ball.pos.y + ball.radius >= lattice.floor_y {
        return Some(LandingKind::Settled);
    }

    if ball.ticks >= MAX_BALL_TICKS {
        log::warn!(
            "Ball {} did not settle after {} ticks, forcing landing at x={}",
            ball.id,
            ball.ticks,
            ball.pos.x
        );
        return Some(LandingKind::Forced);
    }

    None
}

fn clamp_speed(ball: &mut Ball, scale: f32) {
    let max = BALL_MAX_SPEED * scale;
    let speed = ball.vel.length();
    if speed > max {
        ball.vel = ball.vel / speed * max;
    }
}
