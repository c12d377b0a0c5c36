// ragdoll — articulated rigid-body corpses driven by the physics world
// Converted from: ref_gl/r_ragdoll.c
//
// A `RagdollSystem` owns the physics world, the level collision snapshot and
// a fixed pool of ragdoll slots. The refresh calls `spawn` on a death event
// and `tick_and_render` once per frame; `clear_all` runs on level changes.

pub mod anatomy;
pub mod body;
pub mod dims;
pub mod render;
pub mod trimesh;
pub mod world;

use crx_common::cvar::{cvar_get, with_cvar_ctx};
use crx_common::matrix::Matrix3x4;
use crx_common::q_shared::{
    vector_length, vector_subtract, RenderFlags, Vec3, CVAR_ARCHIVE, CVAR_ZERO, PRINT_ALL,
};

use crate::r_model_types::{SkinnedMesh, WorldModel};
use crate::r_view::ViewState;
use crate::vid_printf;

pub use anatomy::{BodyPart, JointId, JointKind, MAX_RAGDOLL_JOINTS, MAX_RAGDOLL_OBJECTS};
pub use body::{compute_bind_matrices, instantiate, plan_ragdoll, RagdollBodies, RagdollPlan};
pub use dims::RagdollDims;
pub use render::{cull_ragdoll, derive_pose, DebugMark, LevelTrace, RagdollDraw, RagdollDrawer};
pub use trimesh::{LevelCollisionSnapshot, TriSoup};
pub use world::RigidBodyWorld;

pub const MAX_RAGDOLLS: usize = 64;

// ============================================================
// Errors
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub enum RagdollError {
    /// The source mesh has no joints.
    NoSkeleton,
    /// The pose doesn't have one matrix per joint.
    PoseMismatch { joints: usize, frames: usize },
    /// A joint's parent does not come before it.
    BadParent { joint: usize, parent: i32 },
    /// Gravity with a non-finite component.
    InvalidGravity,
    /// Malformed ragdoll dimension file.
    DimsParse { line: usize, message: String },
}

impl std::fmt::Display for RagdollError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RagdollError::NoSkeleton => write!(f, "Mesh has no skeleton"),
            RagdollError::PoseMismatch { joints, frames } => {
                write!(f, "Pose has {} matrices for {} joints", frames, joints)
            }
            RagdollError::BadParent { joint, parent } => {
                write!(f, "Joint {} has bad parent {}", joint, parent)
            }
            RagdollError::InvalidGravity => write!(f, "Gravity must be finite"),
            RagdollError::DimsParse { line, message } => {
                write!(f, "Ragdoll dims line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for RagdollError {}

// ============================================================
// Configuration
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RagdollConfig {
    pub enabled: bool,
    pub debug: bool,
    pub nocull: bool,
    pub gravity: Vec3,
    pub iterations: usize,
    /// Longest single step, in seconds.
    pub max_step: f32,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    /// Linear velocity given to every body when the source has none.
    pub initial_velocity: Vec3,
    pub dedup_radius: f32,
    pub lifetime_ms: i32,
}

impl Default for RagdollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            nocull: false,
            gravity: [0.0, 0.0, -256.0],
            iterations: 20,
            max_step: 0.1,
            friction: 1.0,
            restitution: 0.2,
            density: 1.0,
            initial_velocity: [0.0, 40.0, 150.0],
            dedup_radius: 64.0,
            lifetime_ms: 10000,
        }
    }
}

impl RagdollConfig {
    /// Create the ragdoll cvars if they don't exist yet.
    pub fn register() {
        cvar_get("r_ragdolls", "1", CVAR_ARCHIVE);
        cvar_get("r_ragdoll_debug", "0", CVAR_ZERO);
        cvar_get("r_nocull", "0", CVAR_ZERO);
    }

    /// Defaults overridden by whichever ragdoll cvars are registered.
    pub fn from_cvars() -> Self {
        let mut config = Self::default();
        let flag = |name: &str, default: bool| {
            with_cvar_ctx(|c| c.find_var(name).map(|v| v.value != 0.0))
                .flatten()
                .unwrap_or(default)
        };
        config.enabled = flag("r_ragdolls", config.enabled);
        config.debug = flag("r_ragdoll_debug", config.debug);
        config.nocull = flag("r_nocull", config.nocull);
        config
    }
}

// ============================================================
// Ragdolls
// ============================================================

/// A dying entity as seen by the refresh at the moment of death.
#[derive(Debug, Clone)]
pub struct RagdollSource<'a> {
    pub mesh: &'a SkinnedMesh,
    /// Model-space pose, one matrix per mesh joint.
    pub pose: &'a [Matrix3x4],
    pub origin: Vec3,
    pub angles: Vec3,
    pub skin: i32,
    pub flags: RenderFlags,
    pub velocity: Option<Vec3>,
    pub dims: Option<&'a RagdollDims>,
}

/// One live ragdoll. Owns deep copies of everything it needs from its source.
#[derive(Debug)]
pub struct Ragdoll {
    pub mesh: SkinnedMesh,
    /// Model-space pose at spawn.
    pub pose: Vec<Matrix3x4>,
    /// World-space pose at spawn; bodies move it from here.
    pub rest_pose: Vec<Matrix3x4>,
    pub joint_parts: Vec<BodyPart>,
    pub bodies: RagdollBodies,
    pub skin: i32,
    pub flags: RenderFlags,
    pub origin: Vec3,
    pub angles: Vec3,
    /// Chest position, refreshed every frame.
    pub cur_pos: Vec3,
    pub spawn_time: i32,
}

impl Ragdoll {
    fn new(source: &RagdollSource, bodies: RagdollBodies, world: &RigidBodyWorld, now: i32) -> Self {
        let entity = Matrix3x4::for_entity(&source.angles, &source.origin);
        let cur_pos = bodies
            .body(BodyPart::Chest)
            .and_then(|h| world.body_origin(h))
            .unwrap_or(source.origin);

        Ragdoll {
            mesh: source.mesh.clone(),
            pose: source.pose.to_vec(),
            rest_pose: source.pose.iter().map(|m| entity.multiply(m)).collect(),
            joint_parts: render::joint_parts(source.mesh),
            bodies,
            skin: source.skin,
            flags: source.flags,
            origin: source.origin,
            angles: source.angles,
            cur_pos,
            spawn_time: now,
        }
    }

    pub fn age(&self, now: i32) -> i32 {
        now.wrapping_sub(self.spawn_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// A ragdoll now occupies `slot`; `evicted` is set when the oldest
    /// ragdoll had to make room.
    Spawned { slot: usize, evicted: bool },
    /// Another ragdoll is already lying within the dedup radius.
    Duplicate,
    /// Ragdolls are switched off.
    Disabled,
}

/// What one `tick_and_render` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub active: usize,
    pub drawn: usize,
    pub culled: usize,
    pub expired: usize,
    /// Seconds simulated; zero when the world didn't step.
    pub dt: f32,
    /// Touching collider pairs after the step.
    pub contacts: usize,
}

/// Elapsed seconds between two millisecond stamps, clamped to `max_step`.
/// Non-positive spans give zero.
pub fn frame_seconds(now: i32, last: i32, max_step: f32) -> f32 {
    let ms = now.wrapping_sub(last);
    if ms <= 0 {
        return 0.0;
    }
    (ms as f32 / 1000.0).min(max_step)
}

// ============================================================
// RagdollSystem
// ============================================================

pub struct RagdollSystem {
    config: RagdollConfig,
    world: RigidBodyWorld,
    snapshot: LevelCollisionSnapshot,
    slots: Vec<Option<Ragdoll>>,
    last_update: i32,
}

impl RagdollSystem {
    pub fn new(config: RagdollConfig) -> Result<Self, RagdollError> {
        Self::with_capacity(config, MAX_RAGDOLLS)
    }

    pub fn with_capacity(config: RagdollConfig, capacity: usize) -> Result<Self, RagdollError> {
        let world = RigidBodyWorld::new(config.gravity)?;
        Ok(Self {
            config,
            world,
            snapshot: LevelCollisionSnapshot::new(),
            slots: (0..capacity).map(|_| None).collect(),
            last_update: 0,
        })
    }

    pub fn config(&self) -> &RagdollConfig {
        &self.config
    }

    /// Swap in a fresh configuration, normally `RagdollConfig::from_cvars()`
    /// once per frame. Gravity is fixed at construction.
    pub fn set_config(&mut self, config: RagdollConfig) {
        self.config = config;
    }

    pub fn world(&self) -> &RigidBodyWorld {
        &self.world
    }

    pub fn snapshot(&self) -> &LevelCollisionSnapshot {
        &self.snapshot
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_active(&self, slot: usize) -> bool {
        self.slots.get(slot).is_some_and(Option::is_some)
    }

    pub fn ragdoll(&self, slot: usize) -> Option<&Ragdoll> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    /// Current world position of one part of the ragdoll in `slot`.
    pub fn body_position(&self, slot: usize, part: BodyPart) -> Option<Vec3> {
        let handle = self.ragdoll(slot)?.bodies.body(part)?;
        self.world.body_origin(handle)
    }

    // release the slot's bodies and mark it free
    fn destroy_slot(&mut self, slot: usize) {
        if let Some(mut ragdoll) = self.slots.get_mut(slot).and_then(Option::take) {
            ragdoll.bodies.release(&mut self.world);
        }
    }

    fn oldest_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|r| (i, r.spawn_time)))
            .min_by_key(|&(_, t)| t)
            .map(|(i, _)| i)
    }

    /// Turn a dying entity into a ragdoll.
    pub fn spawn(
        &mut self,
        now: i32,
        origin: &Vec3,
        source: &RagdollSource,
        world_model: &WorldModel,
        view: &ViewState,
    ) -> Result<SpawnOutcome, RagdollError> {
        if !self.config.enabled || !self.world.is_alive() || self.slots.is_empty() {
            return Ok(SpawnOutcome::Disabled);
        }

        let duplicate = self.slots.iter().flatten().any(|r| {
            vector_length(&vector_subtract(origin, &r.origin)) < self.config.dedup_radius
        });
        if duplicate {
            return Ok(SpawnOutcome::Duplicate);
        }

        let default_dims = RagdollDims::default();
        let dims = source.dims.unwrap_or(&default_dims);
        let plan = plan_ragdoll(source, dims, &self.config)?;

        let was_idle = self.active_count() == 0;
        let (slot, evicted) = match self.slots.iter().position(Option::is_none) {
            Some(free) => (free, false),
            None => {
                let Some(oldest) = self.oldest_slot() else {
                    return Ok(SpawnOutcome::Disabled);
                };
                self.destroy_slot(oldest);
                if self.config.debug {
                    vid_printf(PRINT_ALL, &format!("ragdoll: pool full, evicted slot {}\n", oldest));
                }
                (oldest, true)
            }
        };

        let bodies = instantiate(&plan, &mut self.world);
        self.slots[slot] = Some(Ragdoll::new(source, bodies, &self.world, now));
        if was_idle {
            self.last_update = now;
        }

        // r_nocull also opens the frustum for the level walk
        let mut walk_view = view.clone();
        walk_view.nocull |= self.config.nocull;
        self.snapshot.build(world_model, &walk_view, origin, &mut self.world);

        if self.config.debug {
            vid_printf(
                PRINT_ALL,
                &format!(
                    "added a ragdoll @ {:.1},{:.1},{:.1}\n",
                    origin[0], origin[1], origin[2]
                ),
            );
            vid_printf(
                PRINT_ALL,
                &format!(
                    "ragdoll: level snapshot has {} triangles, {} vertices\n",
                    self.snapshot.triangle_count(),
                    self.snapshot.vertex_count()
                ),
            );
        }

        Ok(SpawnOutcome::Spawned { slot, evicted })
    }

    /// Destroy every ragdoll older than the configured lifetime.
    /// Returns how many were removed.
    pub fn tick(&mut self, now: i32) -> usize {
        let lifetime = self.config.lifetime_ms;
        let expired: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().filter(|r| r.age(now) > lifetime).map(|_| i))
            .collect();

        for &slot in &expired {
            self.destroy_slot(slot);
            if self.config.debug {
                vid_printf(PRINT_ALL, "Destroyed a ragdoll\n");
            }
        }
        expired.len()
    }

    /// The per-frame update: expire, cull and draw, then step the world.
    pub fn tick_and_render(
        &mut self,
        now: i32,
        view: &ViewState,
        tracer: &dyn LevelTrace,
        drawer: &mut dyn RagdollDrawer,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        if !self.config.enabled {
            return stats;
        }

        stats.expired = self.tick(now);

        let nocull = self.config.nocull || view.nocull;
        for ragdoll in self.slots.iter_mut().flatten() {
            if let Some(pos) = ragdoll
                .bodies
                .body(BodyPart::Chest)
                .and_then(|h| self.world.body_origin(h))
            {
                ragdoll.cur_pos = pos;
            }
            stats.active += 1;

            if cull_ragdoll(ragdoll, view, tracer, nocull) {
                stats.culled += 1;
                continue;
            }

            let joints = derive_pose(ragdoll, &self.world);
            drawer.draw_ragdoll(&RagdollDraw {
                mesh: &ragdoll.mesh,
                skin: ragdoll.skin,
                flags: ragdoll.flags,
                origin: ragdoll.origin,
                angles: ragdoll.angles,
                joints: &joints,
            });
            stats.drawn += 1;

            if self.config.debug {
                render::draw_debug_marks(ragdoll, &self.world, drawer);
            }
        }

        if stats.active == 0 {
            self.snapshot.destroy(&mut self.world);
        } else {
            let dt = frame_seconds(now, self.last_update, self.config.max_step);
            if dt > 0.0 {
                self.world.step(dt, self.config.iterations);
                stats.dt = dt;
                stats.contacts = self.world.active_contact_pairs();
            }
        }

        self.last_update = now;
        stats
    }

    /// Drop every ragdoll and the level snapshot. Safe to repeat.
    pub fn clear_all(&mut self) {
        for slot in 0..self.slots.len() {
            self.destroy_slot(slot);
        }
        self.snapshot.destroy(&mut self.world);
    }

    pub fn shutdown(&mut self) {
        self.clear_all();
        self.world.shutdown();
    }
}
