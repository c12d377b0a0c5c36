// world.rs — the rigid-body simulation context shared by every ragdoll
// Converted from: ref_gl/r_ragdoll.c
//
// Wraps a rapier pipeline. Engine code talks to it in `Vec3`/`Matrix3x4`;
// nalgebra isometries only appear at this boundary.

use std::num::NonZeroUsize;

use crx_common::matrix::Matrix3x4;
use crx_common::q_shared::Vec3;
use rapier3d::na::{Matrix3, Translation3, UnitQuaternion};
use rapier3d::prelude::*;

use super::RagdollError;

pub struct RigidBodyWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    pub(crate) rigid_body_set: RigidBodySet,
    pub(crate) collider_set: ColliderSet,
    pub(crate) impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    alive: bool,
}

impl RigidBodyWorld {
    pub fn new(gravity: Vec3) -> Result<Self, RagdollError> {
        if !gravity.iter().all(|g| g.is_finite()) {
            return Err(RagdollError::InvalidGravity);
        }

        Ok(Self {
            gravity: vector![gravity[0], gravity[1], gravity[2]],
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            alive: true,
        })
    }

    /// Drop every body, collider and joint. Calling it again does nothing.
    pub fn shutdown(&mut self) {
        if !self.alive {
            return;
        }
        self.rigid_body_set = RigidBodySet::new();
        self.collider_set = ColliderSet::new();
        self.impulse_joint_set = ImpulseJointSet::new();
        self.multibody_joint_set = MultibodyJointSet::new();
        self.island_manager = IslandManager::new();
        self.broad_phase = DefaultBroadPhase::new();
        self.narrow_phase = NarrowPhase::new();
        self.ccd_solver = CCDSolver::new();
        self.query_pipeline = QueryPipeline::new();
        self.alive = false;
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn gravity(&self) -> Vec3 {
        [self.gravity.x, self.gravity.y, self.gravity.z]
    }

    /// Advance the simulation by `dt` seconds. Contacts are regenerated by
    /// the narrow phase on every call; none survive between steps.
    pub fn step(&mut self, dt: f32, iterations: usize) {
        if !self.alive || dt.is_nan() || dt <= 0.0 {
            return;
        }

        self.integration_parameters.dt = dt;
        self.integration_parameters.num_solver_iterations =
            NonZeroUsize::new(iterations).unwrap_or(NonZeroUsize::MIN);

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
    }

    /// Number of collider pairs currently touching.
    pub fn active_contact_pairs(&self) -> usize {
        self.narrow_phase
            .contact_pairs()
            .filter(|pair| pair.has_any_active_contact)
            .count()
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    pub fn joint_count(&self) -> usize {
        self.impulse_joint_set.len()
    }

    // ============================================================
    // Object management
    // ============================================================

    pub(crate) fn insert_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(body)
    }

    pub(crate) fn insert_body_collider(
        &mut self,
        collider: Collider,
        parent: RigidBodyHandle,
    ) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    pub(crate) fn insert_static_collider(&mut self, collider: Collider) -> ColliderHandle {
        self.collider_set.insert(collider)
    }

    pub(crate) fn insert_joint(
        &mut self,
        body1: RigidBodyHandle,
        body2: RigidBodyHandle,
        joint: GenericJoint,
    ) -> ImpulseJointHandle {
        self.impulse_joint_set.insert(body1, body2, joint, true)
    }

    /// Removes the body along with its attached colliders and joints.
    pub(crate) fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    pub(crate) fn remove_collider(&mut self, handle: ColliderHandle) {
        self.collider_set
            .remove(handle, &mut self.island_manager, &mut self.rigid_body_set, true);
    }

    pub(crate) fn remove_joint(&mut self, handle: ImpulseJointHandle) {
        self.impulse_joint_set.remove(handle, true);
    }

    pub fn body_transform(&self, handle: RigidBodyHandle) -> Option<Matrix3x4> {
        self.rigid_body_set
            .get(handle)
            .map(|b| iso_to_matrix(b.position()))
    }

    pub fn body_origin(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set.get(handle).map(|b| {
            let t = b.translation();
            [t.x, t.y, t.z]
        })
    }

    pub fn body_linvel(&self, handle: RigidBodyHandle) -> Option<Vec3> {
        self.rigid_body_set.get(handle).map(|b| {
            let v = b.linvel();
            [v.x, v.y, v.z]
        })
    }
}

// ============================================================
// Conversions
// ============================================================

/// Rotation of `m` snapped to the nearest proper rotation, plus its origin.
pub fn matrix_to_iso(m: &Matrix3x4) -> Isometry<Real> {
    let rot = Matrix3::new(
        m.a[0], m.a[1], m.a[2], //
        m.b[0], m.b[1], m.b[2], //
        m.c[0], m.c[1], m.c[2],
    );
    Isometry::from_parts(
        Translation3::new(m.a[3], m.b[3], m.c[3]),
        UnitQuaternion::from_matrix(&rot),
    )
}

pub fn iso_to_matrix(iso: &Isometry<Real>) -> Matrix3x4 {
    let r = iso.rotation.to_rotation_matrix();
    let t = &iso.translation.vector;
    Matrix3x4 {
        a: [r[(0, 0)], r[(0, 1)], r[(0, 2)], t.x],
        b: [r[(1, 0)], r[(1, 1)], r[(1, 2)], t.y],
        c: [r[(2, 0)], r[(2, 1)], r[(2, 2)], t.z],
    }
}

#[inline]
pub fn to_point(v: &Vec3) -> Point<Real> {
    point![v[0], v[1], v[2]]
}

#[inline]
pub fn to_vector(v: &Vec3) -> Vector<Real> {
    vector![v[0], v[1], v[2]]
}
