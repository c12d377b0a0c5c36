// body.rs — ragdoll construction: bind matrices, body/joint planning, instantiation
// Converted from: ref_gl/r_ragdoll.c
//
// Planning is pure math and may fail on bad source data. Instantiation takes a
// finished plan and pushes it into the physics world; it cannot fail.

use crx_common::matrix::{vector_sanitize, Matrix3x4};
use crx_common::q_shared::{
    cross_product, dot_product, perpendicular_vector, vector_add, vector_length, vector_ma,
    vector_normalize, vector_scale, vector_subtract, Vec3, PRINT_ALL,
};
use rapier3d::prelude::*;

use super::anatomy::{
    joints, part_for_joint_name, segments, BodyPart, HingeParams, JointId, JointKind,
    JointTemplate, UniversalParams, MAX_RAGDOLL_JOINTS, MAX_RAGDOLL_OBJECTS,
};
use super::dims::RagdollDims;
use super::world::{iso_to_matrix, matrix_to_iso, to_vector, RigidBodyWorld};
use super::{RagdollConfig, RagdollError, RagdollSource};
use crate::r_model_types::SkinnedMesh;
use crate::vid_printf;

/// Capsules never get shorter than this.
pub const MIN_CAPSULE_LENGTH: f32 = 0.1;

const AXIS_EPSILON: f32 = 1e-6;

// ============================================================
// Bind matrices
// ============================================================

/// Average the pose of every skeleton joint bound to each body part and
/// move it into world space. Parts nothing binds to take the entity matrix.
pub fn compute_bind_matrices(
    mesh: &SkinnedMesh,
    pose: &[Matrix3x4],
    entity_matrix: &Matrix3x4,
) -> [Matrix3x4; MAX_RAGDOLL_OBJECTS] {
    let mut sums = [Matrix3x4::ZERO; MAX_RAGDOLL_OBJECTS];
    let mut weights = [0.0f32; MAX_RAGDOLL_OBJECTS];

    for (joint, m) in mesh.joints.iter().zip(pose) {
        if let Some(part) = part_for_joint_name(&joint.name) {
            sums[part.index()] = sums[part.index()].add(m);
            weights[part.index()] += 1.0;
        }
    }

    let mut out = [*entity_matrix; MAX_RAGDOLL_OBJECTS];
    for i in 0..MAX_RAGDOLL_OBJECTS {
        if weights[i] > 0.0 {
            let mut avg = sums[i].scale(1.0 / weights[i]);
            avg.orthonormalize();
            out[i] = entity_matrix.multiply(&avg);
        }
    }
    out
}

// ============================================================
// Plans
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPlan {
    pub part: BodyPart,
    /// World transform; local z runs along the capsule.
    pub transform: Matrix3x4,
    pub radius: f32,
    /// Cylinder length between the cap centres.
    pub length: f32,
}

#[derive(Debug, Clone)]
pub struct RagdollPlan {
    pub bodies: [BodyPlan; MAX_RAGDOLL_OBJECTS],
    /// Joint anchors and axes in world space.
    pub joints: [JointTemplate; MAX_RAGDOLL_JOINTS],
    pub bind: [Matrix3x4; MAX_RAGDOLL_OBJECTS],
    pub linvel: Vec3,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Non-finite components that were zeroed while planning.
    pub repaired: usize,
}

/// Check that the mesh and pose can be bound at all.
pub fn validate_source(mesh: &SkinnedMesh, pose: &[Matrix3x4]) -> Result<(), RagdollError> {
    if mesh.num_joints() == 0 {
        return Err(RagdollError::NoSkeleton);
    }
    if pose.len() != mesh.num_joints() {
        return Err(RagdollError::PoseMismatch {
            joints: mesh.num_joints(),
            frames: pose.len(),
        });
    }
    for (i, j) in mesh.joints.iter().enumerate() {
        if j.parent < -1 || j.parent >= i as i32 {
            return Err(RagdollError::BadParent {
                joint: i,
                parent: j.parent,
            });
        }
    }
    Ok(())
}

/// Capsule frame for a segment: z along p1->p2, origin at the midpoint.
fn segment_frame(p1: &Vec3, p2: &Vec3) -> Matrix3x4 {
    let mut za = vector_subtract(p2, p1);
    vector_normalize(&mut za);

    let reference = if dot_product(&za, &[1.0, 0.0, 0.0]).abs() < 0.7 {
        [1.0, 0.0, 0.0]
    } else {
        [0.0, 1.0, 0.0]
    };
    let mut ya = cross_product(&za, &reference);
    let mut xa = cross_product(&ya, &za);
    vector_normalize(&mut xa);
    ya = cross_product(&za, &xa);

    let mid = vector_scale(&vector_add(p1, p2), 0.5);
    Matrix3x4::from_columns(&xa, &ya, &za, &mid)
}

/// Capsule length between cap centres, clamped away from zero.
pub fn capsule_length(p1: &Vec3, p2: &Vec3, radius: f32) -> f32 {
    let length = vector_length(&vector_subtract(p1, p2)) - radius;
    if length > 0.0 {
        length
    } else {
        MIN_CAPSULE_LENGTH
    }
}

/// Carry a model-space axis through both parts' rotations and average.
/// Collapsing averages fall back to the first part's axis, then to any unit vector.
pub fn joint_axis(bind1: &Matrix3x4, bind2: &Matrix3x4, axis: &Vec3) -> Vec3 {
    let a1 = bind1.transform_vector(axis);
    let a2 = bind2.transform_vector(axis);

    let mut sum = vector_add(&a1, &a2);
    vector_sanitize(&mut sum);
    if vector_normalize(&mut sum) > AXIS_EPSILON {
        return sum;
    }

    let mut first = a1;
    vector_sanitize(&mut first);
    if vector_normalize(&mut first) > AXIS_EPSILON {
        return first;
    }

    perpendicular_vector(&[0.0, 0.0, 1.0])
}

/// Average of the template anchor as seen by both parts.
pub fn joint_anchor(bind1: &Matrix3x4, bind2: &Matrix3x4, anchor: &Vec3) -> Vec3 {
    let w1 = bind1.transform_point(anchor);
    let w2 = bind2.transform_point(anchor);
    vector_scale(&vector_add(&w1, &w2), 0.5)
}

fn plan_joint(
    template: &JointTemplate,
    bind: &[Matrix3x4; MAX_RAGDOLL_OBJECTS],
    offset: &Vec3,
    repaired: &mut usize,
) -> JointTemplate {
    let b1 = &bind[template.part1.index()];
    let b2 = &bind[template.part2.index()];

    let mut anchor_at = |anchor: &Vec3| {
        let mut a = joint_anchor(b1, b2, &vector_add(anchor, offset));
        *repaired += vector_sanitize(&mut a);
        a
    };

    let kind = match template.kind {
        JointKind::Fixed => JointKind::Fixed,
        JointKind::Hinge(h) => JointKind::Hinge(HingeParams {
            anchor: anchor_at(&h.anchor),
            axis: joint_axis(b1, b2, &h.axis),
            ..h
        }),
        JointKind::Universal(u) => JointKind::Universal(UniversalParams {
            anchor: anchor_at(&u.anchor),
            axis1: joint_axis(b1, b2, &u.axis1),
            axis2: joint_axis(b1, b2, &u.axis2),
            ..u
        }),
    };

    JointTemplate { kind, ..*template }
}

/// Work out every body and joint of a ragdoll without touching the physics world.
pub fn plan_ragdoll(
    source: &RagdollSource,
    dims: &RagdollDims,
    config: &RagdollConfig,
) -> Result<RagdollPlan, RagdollError> {
    validate_source(source.mesh, source.pose)?;

    let mut repaired = 0;
    let entity = Matrix3x4::for_entity(&source.angles, &source.origin);
    let mut bind = compute_bind_matrices(source.mesh, source.pose, &entity);
    for m in bind.iter_mut() {
        repaired += m.sanitize();
    }

    let offset = dims.global_offset();
    let templates = segments(dims);
    let bodies = templates.map(|seg| {
        let p1 = vector_add(&seg.p1, &offset);
        let p2 = vector_add(&seg.p2, &offset);
        let mut transform = bind[seg.part.index()].multiply(&segment_frame(&p1, &p2));
        repaired += transform.sanitize();
        BodyPlan {
            part: seg.part,
            transform,
            radius: seg.radius,
            length: capsule_length(&p1, &p2, seg.radius),
        }
    });

    let joints = joints(dims).map(|t| plan_joint(&t, &bind, &offset, &mut repaired));

    let mut linvel = source.velocity.unwrap_or(config.initial_velocity);
    repaired += vector_sanitize(&mut linvel);

    if repaired > 0 && config.debug {
        vid_printf(
            PRINT_ALL,
            &format!("ragdoll: zeroed {} non-finite components\n", repaired),
        );
    }

    Ok(RagdollPlan {
        bodies,
        joints,
        bind,
        linvel,
        density: config.density,
        friction: config.friction,
        restitution: config.restitution,
        repaired,
    })
}

// ============================================================
// Instantiation
// ============================================================

/// The physics handles owned by one ragdoll.
#[derive(Debug, Clone, Default)]
pub struct RagdollBodies {
    bodies: [Option<RigidBodyHandle>; MAX_RAGDOLL_OBJECTS],
    colliders: [Option<ColliderHandle>; MAX_RAGDOLL_OBJECTS],
    joints: [Option<ImpulseJointHandle>; MAX_RAGDOLL_JOINTS],
    /// Inverse of each body's transform at creation.
    init_inverse: [Matrix3x4; MAX_RAGDOLL_OBJECTS],
}

impl RagdollBodies {
    pub fn body(&self, part: BodyPart) -> Option<RigidBodyHandle> {
        self.bodies[part.index()]
    }

    pub fn joint(&self, id: JointId) -> Option<ImpulseJointHandle> {
        self.joints[id.index()]
    }

    pub fn init_inverse(&self, part: BodyPart) -> &Matrix3x4 {
        &self.init_inverse[part.index()]
    }

    pub fn is_released(&self) -> bool {
        self.bodies.iter().all(Option::is_none) && self.joints.iter().all(Option::is_none)
    }

    /// Remove every joint, body and collider from the world. Handles are
    /// cleared as they go, so a second call does nothing.
    pub fn release(&mut self, world: &mut RigidBodyWorld) {
        for joint in self.joints.iter_mut() {
            if let Some(h) = joint.take() {
                world.remove_joint(h);
            }
        }
        for (body, collider) in self.bodies.iter_mut().zip(self.colliders.iter_mut()) {
            // attached colliders go with the body
            collider.take();
            if let Some(h) = body.take() {
                world.remove_body(h);
            }
        }
    }
}

/// Orthonormal joint frame whose x axis is `x`.
fn frame_with_x(x: &Vec3, origin: &Vec3) -> Matrix3x4 {
    let y = perpendicular_vector(x);
    let z = cross_product(x, &y);
    Matrix3x4::from_columns(x, &y, &z, origin)
}

/// Universal frame: y is the first axis, z the second made perpendicular to it.
fn universal_frame(axis1: &Vec3, axis2: &Vec3, origin: &Vec3) -> Matrix3x4 {
    let y = *axis1;
    let mut z = vector_ma(axis2, -dot_product(axis2, &y), &y);
    if vector_normalize(&mut z) <= AXIS_EPSILON {
        z = perpendicular_vector(&y);
    }
    let x = cross_product(&y, &z);
    Matrix3x4::from_columns(&x, &y, &z, origin)
}

fn build_joint(
    template: &JointTemplate,
    frame1: &Isometry<Real>,
    frame2: &Isometry<Real>,
) -> GenericJoint {
    let world_frame = match &template.kind {
        JointKind::Fixed => {
            // any frame works; lock the parts where they stand
            let t = frame2.translation.vector;
            let mut m = Matrix3x4::IDENTITY;
            m.set_origin(&[t.x, t.y, t.z]);
            matrix_to_iso(&m)
        }
        JointKind::Hinge(h) => matrix_to_iso(&frame_with_x(&h.axis, &h.anchor)),
        JointKind::Universal(u) => {
            matrix_to_iso(&universal_frame(&u.axis1, &u.axis2, &u.anchor))
        }
    };

    let locked = match &template.kind {
        JointKind::Fixed => JointAxesMask::LOCKED_FIXED_AXES,
        JointKind::Hinge(_) => JointAxesMask::LOCKED_REVOLUTE_AXES,
        JointKind::Universal(_) => JointAxesMask::LOCKED_SPHERICAL_AXES | JointAxesMask::ANG_X,
    };

    let mut builder = GenericJointBuilder::new(locked)
        .local_frame1(frame1.inverse() * world_frame)
        .local_frame2(frame2.inverse() * world_frame)
        .contacts_enabled(false);

    match &template.kind {
        JointKind::Fixed => {}
        JointKind::Hinge(h) => {
            builder = builder.limits(JointAxis::AngX, [h.lo, h.hi]);
        }
        JointKind::Universal(u) => {
            builder = builder
                .limits(JointAxis::AngY, [u.lo1, u.hi1])
                .limits(JointAxis::AngZ, [u.lo2, u.hi2]);
        }
    }

    builder.build()
}

/// Create the bodies, capsules and joints of a plan.
pub fn instantiate(plan: &RagdollPlan, world: &mut RigidBodyWorld) -> RagdollBodies {
    let mut out = RagdollBodies::default();
    let mut isos = [Isometry::identity(); MAX_RAGDOLL_OBJECTS];

    for (i, body) in plan.bodies.iter().enumerate() {
        let iso = matrix_to_iso(&body.transform);
        isos[i] = iso;

        let rb = RigidBodyBuilder::dynamic()
            .position(iso)
            .linvel(to_vector(&plan.linvel))
            .angvel(vector![0.0, 0.0, 0.0])
            .ccd_enabled(true)
            .build();
        let handle = world.insert_body(rb);

        let collider = ColliderBuilder::capsule_z(body.length * 0.5, body.radius)
            .density(plan.density)
            .friction(plan.friction)
            .friction_combine_rule(CoefficientCombineRule::Max)
            .restitution(plan.restitution)
            .restitution_combine_rule(CoefficientCombineRule::Max)
            .build();

        out.colliders[i] = Some(world.insert_body_collider(collider, handle));
        out.bodies[i] = Some(handle);
        out.init_inverse[i] = iso_to_matrix(&iso).invert();
    }

    for (i, template) in plan.joints.iter().enumerate() {
        let p1 = template.part1.index();
        let p2 = template.part2.index();
        let (Some(b1), Some(b2)) = (out.bodies[p1], out.bodies[p2]) else {
            continue;
        };
        let joint = build_joint(template, &isos[p1], &isos[p2]);
        out.joints[i] = Some(world.insert_joint(b1, b2, joint));
    }

    out
}
