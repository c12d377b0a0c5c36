// render.rs — culling, pose derivation and debug marks for live ragdolls
// Converted from: ref_gl/r_ragdoll.c

use crx_common::matrix::Matrix3x4;
use crx_common::q_shared::{
    angle_vectors, dot_product, vector_length, vector_subtract, RenderFlags, Trace, Vec3, YAW,
    MASK_OPAQUE,
};
use rayon::prelude::*;

use super::anatomy::{part_for_joint_name, BodyPart, MAX_RAGDOLL_OBJECTS};
use super::world::RigidBodyWorld;
use super::Ragdoll;
use crate::r_model_types::SkinnedMesh;
use crate::r_view::{r_cull_points, ViewState};

/// Skeletons with at least this many joints are posed on the rayon pool.
pub const POSE_PARALLEL_THRESHOLD: usize = 64;

/// Ragdolls closer than this to the view are never frustum culled.
pub const CULL_NEAR_DIST: f32 = 150.0;

/// Full-size debug mark radius; typed marks are drawn at a quarter of it.
pub const MARK_SIZE: f32 = 16.0;

/// Occlusion queries against the level.
pub trait LevelTrace {
    fn box_trace(&self, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3, mask: i32) -> Trace;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMark {
    Red,
    Green,
    Blue,
}

/// One skinned draw call for a ragdoll.
#[derive(Debug)]
pub struct RagdollDraw<'a> {
    pub mesh: &'a SkinnedMesh,
    pub skin: i32,
    pub flags: RenderFlags,
    pub origin: Vec3,
    pub angles: Vec3,
    /// World-space joint matrices, one per skeleton joint.
    pub joints: &'a [Matrix3x4],
}

pub trait RagdollDrawer {
    fn draw_ragdoll(&mut self, draw: &RagdollDraw);
    fn draw_mark(&mut self, origin: &Vec3, size: f32, mark: DebugMark);
}

// ============================================================
// Culling
// ============================================================

/// True when the ragdoll can't be seen: the line from the eye to its chest
/// is blocked, or its rotated bounds sit behind one frustum plane and it is
/// not right next to the view.
pub fn cull_ragdoll(
    ragdoll: &Ragdoll,
    view: &ViewState,
    tracer: &dyn LevelTrace,
    nocull: bool,
) -> bool {
    let mesh = &ragdoll.mesh;
    let trace = tracer.box_trace(&view.vieworg, &mesh.mins, &mesh.maxs, &ragdoll.cur_pos, MASK_OPAQUE);
    if trace.fraction != 1.0 {
        return true;
    }

    if nocull {
        return false;
    }

    let mut angles = ragdoll.angles;
    angles[YAW] = -angles[YAW];
    let (forward, right, up) = angle_vectors(&angles);

    let corners = mesh.bbox().map(|c| {
        [
            dot_product(&forward, &c) + ragdoll.cur_pos[0],
            -dot_product(&right, &c) + ragdoll.cur_pos[1],
            dot_product(&up, &c) + ragdoll.cur_pos[2],
        ]
    });

    let dist = vector_length(&vector_subtract(&view.vieworg, &ragdoll.cur_pos));
    r_cull_points(&view.frustum, &corners) && dist > CULL_NEAR_DIST
}

// ============================================================
// Pose derivation
// ============================================================

/// Each body's motion since spawn, as a world-space transform.
fn part_deltas(ragdoll: &Ragdoll, world: &RigidBodyWorld) -> [Matrix3x4; MAX_RAGDOLL_OBJECTS] {
    BodyPart::ALL.map(|part| {
        ragdoll
            .bodies
            .body(part)
            .and_then(|h| world.body_transform(h))
            .map_or(Matrix3x4::IDENTITY, |t| {
                t.multiply(ragdoll.bodies.init_inverse(part))
            })
    })
}

/// World-space skeleton driven by the simulated bodies.
pub fn derive_pose(ragdoll: &Ragdoll, world: &RigidBodyWorld) -> Vec<Matrix3x4> {
    let deltas = part_deltas(ragdoll, world);
    let pose_joint = |(rest, part): (&Matrix3x4, &BodyPart)| {
        let mut m = deltas[part.index()].multiply(rest);
        m.sanitize();
        m
    };

    if ragdoll.rest_pose.len() >= POSE_PARALLEL_THRESHOLD {
        ragdoll
            .rest_pose
            .par_iter()
            .zip(ragdoll.joint_parts.par_iter())
            .map(pose_joint)
            .collect()
    } else {
        ragdoll
            .rest_pose
            .iter()
            .zip(ragdoll.joint_parts.iter())
            .map(pose_joint)
            .collect()
    }
}

/// Which body part drives each skeleton joint. Unbound joints follow their
/// nearest bound ancestor; a chain with none follows the chest.
pub fn joint_parts(mesh: &SkinnedMesh) -> Vec<BodyPart> {
    let mut parts: Vec<BodyPart> = Vec::with_capacity(mesh.num_joints());
    for joint in &mesh.joints {
        let part = part_for_joint_name(&joint.name)
            .or_else(|| {
                usize::try_from(joint.parent)
                    .ok()
                    .and_then(|p| parts.get(p).copied())
            })
            .unwrap_or(BodyPart::Chest);
        parts.push(part);
    }
    parts
}

// ============================================================
// Debug marks
// ============================================================

pub fn draw_debug_marks(ragdoll: &Ragdoll, world: &RigidBodyWorld, drawer: &mut dyn RagdollDrawer) {
    for part in BodyPart::ALL {
        let Some(origin) = ragdoll.bodies.body(part).and_then(|h| world.body_origin(h)) else {
            continue;
        };
        drawer.draw_mark(&origin, MARK_SIZE * 0.25, part.debug_mark());
    }
}
