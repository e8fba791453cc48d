//! Two-body joints
//!
//! Joints run once per step, after integration and before relaxation. They
//! never take part in the relaxation loop.

use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::body::{Body, BodyId};
use crate::error::{PhysicsError, PhysicsResult};

/// Separations shorter than this have no usable direction
const MIN_SEPARATION: f32 = 1e-6;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct JointId(pub u32);

impl fmt::Display for JointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JointId({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum JointKind {
    /// Moves both bodies toward `rest_length` apart. `stiffness` is the
    /// fraction of the error removed per step, in (0, 1].
    Distance { rest_length: f32, stiffness: f32 },
    /// Hooke spring with damping along the line between the bodies
    Spring {
        rest_length: f32,
        stiffness: f32,
        damping: f32,
    },
}

/// Position and velocity nudges for one body
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Correction {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Correction {
    pub fn apply(&self, body: &mut Body) {
        body.position += self.position;
        body.velocity += self.velocity;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub body_a: BodyId,
    pub body_b: BodyId,
    kind: JointKind,
}

impl Joint {
    pub fn distance(body_a: BodyId, body_b: BodyId, rest_length: f32, stiffness: f32) -> PhysicsResult<Self> {
        Self::new(
            body_a,
            body_b,
            JointKind::Distance {
                rest_length,
                stiffness,
            },
        )
    }

    pub fn spring(
        body_a: BodyId,
        body_b: BodyId,
        rest_length: f32,
        stiffness: f32,
        damping: f32,
    ) -> PhysicsResult<Self> {
        Self::new(
            body_a,
            body_b,
            JointKind::Spring {
                rest_length,
                stiffness,
                damping,
            },
        )
    }

    pub fn new(body_a: BodyId, body_b: BodyId, kind: JointKind) -> PhysicsResult<Self> {
        if body_a == body_b {
            return Err(PhysicsError::InvalidJoint("a joint needs two different bodies"));
        }
        let rest_length = match kind {
            JointKind::Distance { rest_length, stiffness } => {
                if !(stiffness.is_finite() && stiffness > 0.0 && stiffness <= 1.0) {
                    return Err(PhysicsError::InvalidJoint("distance stiffness must be in (0, 1]"));
                }
                rest_length
            }
            JointKind::Spring {
                rest_length,
                stiffness,
                damping,
            } => {
                if !(stiffness.is_finite() && stiffness > 0.0) {
                    return Err(PhysicsError::InvalidJoint("spring stiffness must be finite and positive"));
                }
                if !(damping.is_finite() && damping >= 0.0) {
                    return Err(PhysicsError::InvalidJoint("spring damping must be finite and non-negative"));
                }
                rest_length
            }
        };
        if !(rest_length.is_finite() && rest_length >= 0.0) {
            return Err(PhysicsError::InvalidJoint("rest length must be finite and non-negative"));
        }
        Ok(Self { body_a, body_b, kind })
    }

    pub fn kind(&self) -> JointKind {
        self.kind
    }

    pub fn involves(&self, body: BodyId) -> bool {
        self.body_a == body || self.body_b == body
    }

    /// Corrections for (a, b) after one step of `dt`; static bodies get none
    pub fn solve(&self, a: &Body, b: &Body, dt: f32) -> (Correction, Correction) {
        let delta = b.position - a.position;
        let distance = delta.length();
        let (wa, wb) = (a.inverse_mass(), b.inverse_mass());
        let w_sum = wa + wb;
        if distance < MIN_SEPARATION || w_sum == 0.0 {
            return (Correction::default(), Correction::default());
        }
        let normal = delta / distance;

        match self.kind {
            JointKind::Distance {
                rest_length,
                stiffness,
            } => {
                let shift = normal * ((distance - rest_length) * stiffness);
                (
                    Correction {
                        position: shift * (wa / w_sum),
                        velocity: Vec2::ZERO,
                    },
                    Correction {
                        position: -shift * (wb / w_sum),
                        velocity: Vec2::ZERO,
                    },
                )
            }
            JointKind::Spring {
                rest_length,
                stiffness,
                damping,
            } => {
                let stretch = distance - rest_length;
                let closing = (b.velocity - a.velocity).dot(normal);
                let impulse = normal * ((stiffness * stretch + damping * closing) * dt);
                (
                    Correction {
                        position: Vec2::ZERO,
                        velocity: impulse * wa,
                    },
                    Correction {
                        position: Vec2::ZERO,
                        velocity: -impulse * wb,
                    },
                )
            }
        }
    }

    /// Apply one step of the constraint to both bodies
    pub fn update(&self, a: &mut Body, b: &mut Body, dt: f32) {
        let (ca, cb) = self.solve(a, b, dt);
        ca.apply(a);
        cb.apply(b);
    }
}
