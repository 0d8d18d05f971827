//! Rigid body kernel for colliding and fusing rotating bodies.
//!
//! All angular velocities are in degrees per timestep at the boundary.
//! Lever arms are passed already turned by a quarter rotation
//! (`r_perp = (p - center).rotate_quarter_ccw()`), so the velocity of a body
//! at the contact point is `vel - r_perp * angular_vel_rad`.
//!
//! Bodies whose angular mass is within `ALIEN_PRECISION` are treated as
//! points without rotational inertia.

use crate::math::{Vec2, ALIEN_PRECISION, DEG_TO_RAD, RAD_TO_DEG};

/// State of one body at the contact point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyContact {
    pub vel: Vec2,
    pub r_perp: Vec2,
    pub angular_vel: f64,
    pub angular_mass: f64,
    pub mass: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionOutcome {
    pub vel_a: Vec2,
    pub vel_b: Vec2,
    pub angular_vel_a: f64,
    pub angular_vel_b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionOutcome {
    pub vel: Vec2,
    pub angular_vel: f64,
}

fn is_negligible(angular_mass: f64) -> bool {
    angular_mass.abs() <= ALIEN_PRECISION
}

/// Elastic collision of two rotating bodies along `normal`.
///
/// `normal` points from body B towards body A. When the bodies are already
/// separating along the normal they are returned unchanged.
pub fn collision(a: BodyContact, b: BodyContact, normal: Vec2) -> CollisionOutcome {
    let rotating_a = !is_negligible(a.angular_mass);
    let rotating_b = !is_negligible(b.angular_mass);

    let angular_vel_a = if rotating_a { a.angular_vel * DEG_TO_RAD } else { 0.0 };
    let angular_vel_b = if rotating_b { b.angular_vel * DEG_TO_RAD } else { 0.0 };

    let v_ab = a.vel - a.r_perp * angular_vel_a - (b.vel - b.r_perp * angular_vel_b);
    let unchanged = CollisionOutcome {
        vel_a: a.vel,
        vel_b: b.vel,
        angular_vel_a: if rotating_a { a.angular_vel } else { 0.0 },
        angular_vel_b: if rotating_b { b.angular_vel } else { 0.0 },
    };
    let approach = v_ab.dot(&normal);
    if approach > 0.0 {
        return unchanged;
    }

    let arm_a = a.r_perp.dot(&normal);
    let arm_b = b.r_perp.dot(&normal);

    let mut denominator = normal.length_squared() * (1.0 / a.mass + 1.0 / b.mass);
    if rotating_a {
        denominator += arm_a * arm_a / a.angular_mass;
    }
    if rotating_b {
        denominator += arm_b * arm_b / b.angular_mass;
    }
    // zero normal: no direction to exchange momentum along
    if denominator <= ALIEN_PRECISION {
        return unchanged;
    }
    let j = -2.0 * approach / denominator;

    let vel_a = a.vel + normal * (j / a.mass);
    let vel_b = b.vel - normal * (j / b.mass);
    let new_angular_a = if rotating_a {
        angular_vel_a - arm_a * j / a.angular_mass
    } else {
        angular_vel_a
    };
    let new_angular_b = if rotating_b {
        angular_vel_b + arm_b * j / b.angular_mass
    } else {
        angular_vel_b
    };

    CollisionOutcome {
        vel_a,
        vel_b,
        angular_vel_a: new_angular_a * RAD_TO_DEG,
        angular_vel_b: new_angular_b * RAD_TO_DEG,
    }
}

/// Merge two bodies into one after they collide.
///
/// `combined_angular_mass` is the moment of inertia of the merged shape and
/// has to be computed by the caller from the new geometry.
pub fn fusion(
    a: BodyContact,
    b: BodyContact,
    normal: Vec2,
    combined_angular_mass: f64,
) -> FusionOutcome {
    let outcome = collision(a, b, normal);
    let vel = (outcome.vel_a * a.mass + outcome.vel_b * b.mass) / (a.mass + b.mass);
    let angular_vel = if is_negligible(combined_angular_mass) {
        0.0
    } else {
        (outcome.angular_vel_a * a.angular_mass + outcome.angular_vel_b * b.angular_mass)
            / combined_angular_mass
    };
    FusionOutcome { vel, angular_vel }
}

/// Velocity and angular velocity of a body after its center of mass moved by
/// `center_diff`, keeping the kinetic energy budget of the old motion.
pub fn change_center_of_mass(
    mass: f64,
    vel: Vec2,
    angular_vel: f64,
    old_angular_mass: f64,
    new_angular_mass: f64,
    center_diff: Vec2,
) -> (Vec2, f64) {
    let mut new_vel = tangential_velocity(center_diff, vel, angular_vel);
    let w = angular_vel * DEG_TO_RAD;
    let kin_energy = vel.length_squared() * mass + (old_angular_mass - new_angular_mass) * w * w;
    if kin_energy >= ALIEN_PRECISION {
        new_vel = new_vel.normalized() * (kin_energy / mass).sqrt();
    }
    (new_vel, angular_vel)
}

/// Velocity of the point at lever `r` of a body moving with `vel` and
/// rotating with `angular_vel`.
pub fn tangential_velocity(r: Vec2, vel: Vec2, angular_vel: f64) -> Vec2 {
    vel - r.rotate_quarter_ccw() * (angular_vel * DEG_TO_RAD)
}

pub fn kinetic_energy(mass: f64, vel: Vec2, angular_mass: f64, angular_vel: f64) -> f64 {
    let w = angular_vel * DEG_TO_RAD;
    0.5 * angular_mass * w * w + 0.5 * mass * vel.length_squared()
}

/// Angular velocity keeping the rotational energy when the angular mass
/// changes. The sense of rotation is preserved.
pub fn new_angular_velocity(old_angular_mass: f64, new_angular_mass: f64, old_angular_vel: f64) -> f64 {
    if is_negligible(new_angular_mass) {
        return 0.0;
    }
    let w = old_angular_vel * DEG_TO_RAD;
    let rot_energy_double = old_angular_mass * w * w;
    let new_w = (rot_energy_double / new_angular_mass).sqrt() * RAD_TO_DEG;
    if old_angular_vel < 0.0 {
        -new_w
    } else {
        new_w
    }
}

/// Angular velocity from the rotational share `e_kin - e_trans` of a kinetic
/// energy budget. No rotational energy left means no rotation.
pub fn new_angular_velocity2(e_kin: f64, e_trans: f64, angular_mass: f64, old_angular_vel: f64) -> f64 {
    let e_rot = e_kin - e_trans;
    if e_rot <= 0.0 || is_negligible(angular_mass) {
        return 0.0;
    }
    let new_w = (2.0 * e_rot / angular_mass).sqrt() * RAD_TO_DEG;
    if old_angular_vel > 0.0 {
        new_w.abs()
    } else {
        -new_w.abs()
    }
}

/// Angular momentum of a unit point at lever `r` moving with `v` (z
/// component of the cross product).
pub fn angular_momentum(r: Vec2, v: Vec2) -> f64 {
    r.cross(&v)
}

pub fn angular_velocity(angular_momentum: f64, angular_mass: f64) -> f64 {
    if angular_mass.abs() < ALIEN_PRECISION {
        0.0
    } else {
        angular_momentum / angular_mass * RAD_TO_DEG
    }
}

/// Apply a point impulse with quarter-turned lever `r_perp` to a body.
pub fn apply_impulse(
    impulse: Vec2,
    r_perp: Vec2,
    mass: f64,
    vel: Vec2,
    angular_mass: f64,
    angular_vel: f64,
) -> (Vec2, f64) {
    let new_vel = vel + impulse / mass;
    let new_angular_vel = if is_negligible(angular_mass) {
        angular_vel
    } else {
        angular_vel - r_perp.dot(&impulse) / angular_mass * RAD_TO_DEG
    };
    (new_vel, new_angular_vel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn point(vel: Vec2, mass: f64) -> BodyContact {
        BodyContact {
            vel,
            r_perp: Vec2::ZERO,
            angular_vel: 0.0,
            angular_mass: 0.0,
            mass,
        }
    }

    fn assert_vec_close(a: Vec2, b: Vec2) {
        assert!((a - b).length() < 1e-9, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_head_on_elastic_bounce() {
        // A sits left of B, so the normal from B towards A points to -x
        let a = point(Vec2::new(1.0, 0.0), 1.0);
        let b = point(Vec2::new(-1.0, 0.0), 1.0);
        let out = collision(a, b, Vec2::new(-1.0, 0.0));
        assert_vec_close(out.vel_a, Vec2::new(-1.0, 0.0));
        assert_vec_close(out.vel_b, Vec2::new(1.0, 0.0));
        assert_eq!(out.angular_vel_a, 0.0);
        assert_eq!(out.angular_vel_b, 0.0);
    }

    #[test]
    fn test_separating_pair_is_untouched() {
        let a = point(Vec2::new(1.0, 0.0), 1.0);
        let b = point(Vec2::new(-1.0, 0.0), 1.0);
        let out = collision(a, b, Vec2::new(1.0, 0.0));
        assert_eq!(out.vel_a, a.vel);
        assert_eq!(out.vel_b, b.vel);
    }

    #[test]
    fn test_fusion_halves_velocity() {
        let a = point(Vec2::ZERO, 1.0);
        let b = point(Vec2::new(2.0, 0.0), 1.0);
        let out = fusion(a, b, Vec2::new(1.0, 0.0), 0.5);
        assert_vec_close(out.vel, Vec2::new(1.0, 0.0));
        assert_eq!(out.angular_vel, 0.0);
    }

    #[test]
    fn test_fusion_without_combined_inertia_does_not_rotate() {
        let a = point(Vec2::ZERO, 1.0);
        let b = point(Vec2::new(2.0, 0.0), 1.0);
        let out = fusion(a, b, Vec2::new(1.0, 0.0), 0.0);
        assert_eq!(out.angular_vel, 0.0);
        assert!(out.vel.x.is_finite());
    }

    #[test]
    fn test_zero_normal_is_a_no_op() {
        let a = point(Vec2::new(1.0, 0.0), 1.0);
        let b = point(Vec2::new(-1.0, 0.0), 1.0);
        let out = collision(a, b, Vec2::ZERO);
        assert_eq!(out.vel_a, a.vel);
        assert_eq!(out.vel_b, b.vel);
    }

    #[test]
    fn test_off_center_hit_spins_body() {
        let a = BodyContact {
            vel: Vec2::ZERO,
            r_perp: Vec2::new(1.0, 0.0).rotate_quarter_ccw(),
            angular_vel: 0.0,
            angular_mass: 2.0,
            mass: 2.0,
        };
        let b = point(Vec2::new(0.0, -1.0), 1.0);
        let out = collision(a, b, Vec2::new(0.0, -1.0));
        assert!(out.angular_vel_a.abs() > 0.0);
        assert!(out.vel_a.y < 0.0);
    }

    #[test]
    fn test_change_center_of_mass_without_rotation_keeps_velocity() {
        let (vel, angular_vel) =
            change_center_of_mass(3.0, Vec2::new(0.5, 0.0), 0.0, 2.0, 1.0, Vec2::new(1.0, 1.0));
        assert_vec_close(vel, Vec2::new(0.5, 0.0));
        assert_eq!(angular_vel, 0.0);
    }

    #[test]
    fn test_new_angular_velocity2_collapses_without_rotational_energy() {
        assert_eq!(new_angular_velocity2(1.0, 1.0, 2.0, 10.0), 0.0);
        assert_eq!(new_angular_velocity2(1.0, 2.0, 2.0, 10.0), 0.0);
        assert!(new_angular_velocity2(2.0, 1.0, 2.0, 10.0) > 0.0);
        assert!(new_angular_velocity2(2.0, 1.0, 2.0, -10.0) < 0.0);
    }

    #[test]
    fn test_new_angular_velocity_keeps_rotational_energy() {
        let old = 30.0;
        let new = new_angular_velocity(2.0, 8.0, old);
        let e_old = kinetic_energy(0.0, Vec2::ZERO, 2.0, old);
        let e_new = kinetic_energy(0.0, Vec2::ZERO, 8.0, new);
        assert!((e_old - e_new).abs() < 1e-9);
        assert!(new_angular_velocity(2.0, 8.0, -old) < 0.0);
        assert_eq!(new_angular_velocity(2.0, 0.0, old), 0.0);
    }

    #[test]
    fn test_apply_impulse() {
        let (vel, angular_vel) = apply_impulse(
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.0),
            2.0,
            Vec2::ZERO,
            1.0,
            0.0,
        );
        assert_vec_close(vel, Vec2::new(1.0, 0.0));
        assert!((angular_vel + 2.0 * RAD_TO_DEG).abs() < 1e-9);
    }

    #[test]
    fn test_angular_velocity_roundtrip() {
        let r = Vec2::new(2.0, 0.0);
        let w = 10.0;
        let v = tangential_velocity(r, Vec2::ZERO, w);
        let l = angular_momentum(r, v);
        assert!((angular_velocity(l, r.length_squared()) - w).abs() < 1e-9);
        assert_eq!(angular_velocity(5.0, 0.0), 0.0);
    }

    fn vec_strategy(range: f64) -> impl Strategy<Value = Vec2> {
        (-range..range, -range..range).prop_map(|(x, y)| Vec2::new(x, y))
    }

    fn normal_strategy() -> impl Strategy<Value = Vec2> {
        (0.0..360.0f64).prop_map(crate::math::unit_vector_of_angle)
    }

    fn body_strategy() -> impl Strategy<Value = BodyContact> {
        (vec_strategy(3.0), vec_strategy(2.0), -20.0..20.0f64, 0.5..10.0f64, 0.5..10.0f64).prop_map(
            |(vel, r_perp, angular_vel, angular_mass, mass)| BodyContact {
                vel,
                r_perp,
                angular_vel,
                angular_mass,
                mass,
            },
        )
    }

    fn contact_velocity(body: &BodyContact) -> Vec2 {
        let w = if is_negligible(body.angular_mass) { 0.0 } else { body.angular_vel * DEG_TO_RAD };
        body.vel - body.r_perp * w
    }

    proptest! {
        #[test]
        fn prop_collision_conserves_momentum(a in body_strategy(), b in body_strategy(), n in normal_strategy()) {
            prop_assume!((contact_velocity(&a) - contact_velocity(&b)).dot(&n) < 0.0);
            let out = collision(a, b, n);
            let before = a.vel * a.mass + b.vel * b.mass;
            let after = out.vel_a * a.mass + out.vel_b * b.mass;
            prop_assert!((before - after).length() < 1e-9);
        }

        #[test]
        fn prop_fusion_conserves_momentum(a in body_strategy(), b in body_strategy(), n in normal_strategy()) {
            prop_assume!((contact_velocity(&a) - contact_velocity(&b)).dot(&n) < 0.0);
            let out = fusion(a, b, n, a.angular_mass + b.angular_mass);
            let before = a.vel * a.mass + b.vel * b.mass;
            let after = out.vel * (a.mass + b.mass);
            prop_assert!((before - after).length() < 1e-9);
        }

        #[test]
        fn prop_elastic_collision_conserves_kinetic_energy(a in body_strategy(), b in body_strategy(), n in normal_strategy()) {
            prop_assume!((contact_velocity(&a) - contact_velocity(&b)).dot(&n) < 0.0);
            let out = collision(a, b, n);
            let before = kinetic_energy(a.mass, a.vel, a.angular_mass, a.angular_vel)
                + kinetic_energy(b.mass, b.vel, b.angular_mass, b.angular_vel);
            let after = kinetic_energy(a.mass, out.vel_a, a.angular_mass, out.angular_vel_a)
                + kinetic_energy(b.mass, out.vel_b, b.angular_mass, out.angular_vel_b);
            prop_assert!((before - after).abs() < 1e-6 * before.max(1.0));
        }

        #[test]
        fn prop_separating_pairs_are_untouched(a in body_strategy(), b in body_strategy(), n in normal_strategy()) {
            prop_assume!((contact_velocity(&a) - contact_velocity(&b)).dot(&n) > 0.0);
            let out = collision(a, b, n);
            prop_assert_eq!(out.vel_a, a.vel);
            prop_assert_eq!(out.vel_b, b.vel);
        }

        #[test]
        fn prop_point_masses_use_classic_impulse(
            va in vec_strategy(3.0), vb in vec_strategy(3.0),
            ra in vec_strategy(2.0), rb in vec_strategy(2.0),
            wa in -20.0..20.0f64, wb in -20.0..20.0f64,
            ma in 0.5..10.0f64, mb in 0.5..10.0f64,
            n in normal_strategy(),
        ) {
            let a = BodyContact { vel: va, r_perp: ra, angular_vel: wa, angular_mass: 0.0, mass: ma };
            let b = BodyContact { vel: vb, r_perp: rb, angular_vel: wb, angular_mass: 0.0, mass: mb };
            prop_assume!((va - vb).dot(&n) < 0.0);
            let out = collision(a, b, n);
            let j = -2.0 * (va - vb).dot(&n) / (1.0 / ma + 1.0 / mb);
            prop_assert!((out.vel_a - (va + n * (j / ma))).length() < 1e-9);
            prop_assert!((out.vel_b - (vb - n * (j / mb))).length() < 1e-9);
            prop_assert_eq!(out.angular_vel_a, 0.0);
            prop_assert_eq!(out.angular_vel_b, 0.0);
        }
    }
}
