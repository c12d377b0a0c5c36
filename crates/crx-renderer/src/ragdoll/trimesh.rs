// trimesh.rs — static collision mesh built from the visible level surfaces
// Converted from: ref_gl/r_ragdoll.c
//
// The world tree is walked the same way the surface renderer walks it:
// leafs in the current PVS mark their surfaces, then nodes emit the marked
// surfaces that face the ragdoll. Only one snapshot exists at a time.

use crx_common::q_shared::{box_on_plane_side, dot_product, Vec3, CONTENTS_SOLID, SURF_WARP};
use rapier3d::prelude::{ColliderBuilder, ColliderHandle, Point, Real};

use super::world::{to_point, RigidBodyWorld};
use crate::r_model_types::{MSurface, NodeRef, SurfFlags, WorldModel, SIDE_BACK, SIDE_FRONT};
use crate::r_view::ViewState;
use crate::vid_printf;
use crx_common::q_shared::{PRINT_ALL, PLANE_X, PLANE_Y, PLANE_Z};

/// Flat vertex and triangle buffers gathered during a tree walk.
#[derive(Debug, Clone, Default)]
pub struct TriSoup {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
}

impl TriSoup {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Fan-triangulate a convex polygon around its first vertex.
    /// Returns the number of triangles added.
    pub fn add_polygon(&mut self, points: &[Vec3]) -> usize {
        if points.len() < 3 {
            return 0;
        }
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(points);
        // One winding for every triangle; trimesh colliders are two-sided,
        // so it only has to be consistent, not match the plane side.
        for k in 0..(points.len() as u32 - 2) {
            self.indices.push([base + k + 2, base + k + 1, base]);
        }
        points.len() - 2
    }

    /// Gather every drawable, non-liquid, non-sky surface visible from
    /// `view`, choosing sides relative to `origin`.
    pub fn collect(model: &WorldModel, view: &ViewState, origin: &Vec3) -> TriSoup {
        let mut walk = SurfaceWalk {
            model,
            view,
            origin: *origin,
            marked: vec![false; model.surfaces.len()],
            soup: TriSoup::new(),
        };
        if !model.leafs.is_empty() || !model.nodes.is_empty() {
            walk.recurse(model.root(), 0b1111);
        }
        walk.soup
    }
}

struct SurfaceWalk<'a> {
    model: &'a WorldModel,
    view: &'a ViewState,
    origin: Vec3,
    marked: Vec<bool>,
    soup: TriSoup,
}

impl SurfaceWalk<'_> {
    // Returns the remaining clip flags, or None when the box is fully outside.
    fn clip(&self, minmaxs: &[f32; 6], mut clipflags: u32) -> Option<u32> {
        if self.view.nocull {
            return Some(clipflags);
        }
        let mins = [minmaxs[0], minmaxs[1], minmaxs[2]];
        let maxs = [minmaxs[3], minmaxs[4], minmaxs[5]];
        for (i, plane) in self.view.frustum.iter().enumerate() {
            if clipflags & (1 << i) == 0 {
                continue;
            }
            match box_on_plane_side(&mins, &maxs, plane) {
                1 => clipflags &= !(1 << i),
                2 => return None,
                _ => {}
            }
        }
        Some(clipflags)
    }

    fn recurse(&mut self, node: NodeRef, clipflags: u32) {
        let model = self.model;

        let node_index = match node {
            NodeRef::Leaf(l) => {
                let Some(leaf) = model.leafs.get(l) else {
                    return;
                };
                if leaf.contents == CONTENTS_SOLID || leaf.visframe != self.view.visframecount {
                    return;
                }
                if self.clip(&leaf.minmaxs, clipflags).is_none() {
                    return;
                }
                if !self.view.area_visible(leaf.area) {
                    return;
                }
                for &s in model.leaf_surfaces(l) {
                    if let Some(m) = self.marked.get_mut(s) {
                        *m = true;
                    }
                }
                return;
            }
            NodeRef::Node(n) => n,
        };

        let Some(n) = model.nodes.get(node_index) else {
            return;
        };
        if n.contents == CONTENTS_SOLID || n.visframe != self.view.visframecount {
            return;
        }
        let Some(clipflags) = self.clip(&n.minmaxs, clipflags) else {
            return;
        };

        let Some(plane) = model.planes.get(n.plane) else {
            return;
        };
        let dot = match plane.plane_type {
            PLANE_X => self.origin[0] - plane.dist,
            PLANE_Y => self.origin[1] - plane.dist,
            PLANE_Z => self.origin[2] - plane.dist,
            _ => dot_product(&self.origin, &plane.normal) - plane.dist,
        };
        let (side, sidebit) = if dot >= 0.0 {
            (SIDE_FRONT, SurfFlags::empty())
        } else {
            (SIDE_BACK, SurfFlags::PLANEBACK)
        };

        // front side first
        self.recurse(model.child(node_index, side), clipflags);

        let first = n.firstsurface;
        let surfaces = model
            .surfaces
            .get(first..first + n.numsurfaces)
            .unwrap_or(&[]);
        for (i, surf) in surfaces.iter().enumerate() {
            if !self.marked[first + i] {
                continue;
            }
            if (surf.flags & SurfFlags::PLANEBACK) != sidebit {
                continue; // wrong side
            }
            if model.surface_is_sky(surf) || is_liquid(model, surf) {
                continue;
            }
            for poly in &surf.polys {
                let points: Vec<Vec3> = (0..poly.numverts()).map(|v| poly.position(v)).collect();
                self.soup.add_polygon(&points);
            }
        }

        self.recurse(model.child(node_index, side ^ 1), clipflags);
    }
}

fn is_liquid(model: &WorldModel, surf: &MSurface) -> bool {
    surf.flags.contains(SurfFlags::DRAWTURB)
        || model
            .texinfo
            .get(surf.texinfo)
            .is_some_and(|ti| ti.flags & SURF_WARP != 0)
}

// ============================================================
// LevelCollisionSnapshot
// ============================================================

/// The static level collider ragdolls rest on.
#[derive(Debug, Default)]
pub struct LevelCollisionSnapshot {
    collider: Option<ColliderHandle>,
    triangles: usize,
    vertices: usize,
}

impl LevelCollisionSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot with the surfaces visible around
    /// `origin_hint`. An empty walk leaves no collider behind.
    pub fn build(
        &mut self,
        world_model: &WorldModel,
        view: &ViewState,
        origin_hint: &Vec3,
        world: &mut RigidBodyWorld,
    ) {
        self.destroy(world);

        let soup = TriSoup::collect(world_model, view, origin_hint);
        self.triangles = soup.triangle_count();
        self.vertices = soup.vertex_count();

        if soup.is_empty() {
            vid_printf(
                PRINT_ALL,
                &format!(
                    "ragdoll: no level geometry around {:.0} {:.0} {:.0}\n",
                    origin_hint[0], origin_hint[1], origin_hint[2]
                ),
            );
            return;
        }

        let points: Vec<Point<Real>> = soup.vertices.iter().map(to_point).collect();
        let collider = ColliderBuilder::trimesh(points, soup.indices).build();
        self.collider = Some(world.insert_static_collider(collider));
    }

    pub fn destroy(&mut self, world: &mut RigidBodyWorld) {
        if let Some(handle) = self.collider.take() {
            world.remove_collider(handle);
        }
        self.triangles = 0;
        self.vertices = 0;
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.collider.is_none()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::r_model_types::{GlPoly, MLeaf, MNode, MTexInfo};
    use crx_common::q_shared::{CPlane, SURF_SKY};

    /// One node splitting at z=0, an empty leaf above and a solid leaf below.
    /// Surface 0 is a floor quad of half-size `half` facing up.
    pub(crate) fn floor_world(half: f32, visframe: i32) -> WorldModel {
        let h = half;
        let floor = MSurface {
            plane: 0,
            flags: SurfFlags::empty(),
            texinfo: 0,
            polys: vec![GlPoly::from_points(&[
                [-h, -h, 0.0],
                [h, -h, 0.0],
                [h, h, 0.0],
                [-h, h, 0.0],
            ])],
        };
        WorldModel {
            name: "maps/floor.bsp".into(),
            planes: vec![CPlane::new([0.0, 0.0, 1.0], 0.0)],
            nodes: vec![MNode {
                visframe,
                minmaxs: [-h, -h, -h, h, h, h],
                plane: 0,
                children: [NodeRef::Leaf(0).to_child(), NodeRef::Leaf(1).to_child()],
                firstsurface: 0,
                numsurfaces: 1,
                ..Default::default()
            }],
            leafs: vec![
                MLeaf {
                    contents: 0,
                    visframe,
                    minmaxs: [-h, -h, 0.0, h, h, h],
                    firstmarksurface: 0,
                    nummarksurfaces: 1,
                    ..Default::default()
                },
                MLeaf {
                    contents: CONTENTS_SOLID,
                    visframe,
                    minmaxs: [-h, -h, -h, h, h, 0.0],
                    ..Default::default()
                },
            ],
            surfaces: vec![floor],
            marksurfaces: vec![0],
            texinfo: vec![MTexInfo::default()],
        }
    }

    /// A camera high above the origin looking straight down.
    pub(crate) fn overhead_view(visframe: i32) -> ViewState {
        ViewState::new([0.0, 0.0, 400.0], [90.0, 0.0, 0.0], 90.0, 90.0, visframe)
    }

    #[test]
    fn test_fan_triangulation() {
        let mut soup = TriSoup::new();
        assert_eq!(soup.add_polygon(&[[0.0; 3], [1.0, 0.0, 0.0]]), 0);
        let pentagon = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.5, 1.0, 0.0],
            [0.5, 2.0, 0.0],
            [-0.5, 1.0, 0.0],
        ];
        assert_eq!(soup.add_polygon(&pentagon), 3);
        assert_eq!(soup.indices, vec![[2, 1, 0], [3, 2, 0], [4, 3, 0]]);

        // a second polygon is offset by the vertices already present
        soup.add_polygon(&pentagon[..3]);
        assert_eq!(soup.indices[3], [7, 6, 5]);
        assert_eq!(soup.vertex_count(), 8);
    }

    #[test]
    fn test_collect_floor() {
        let model = floor_world(64.0, 3);
        let soup = TriSoup::collect(&model, &overhead_view(3), &[0.0, 0.0, 30.0]);
        assert_eq!(soup.triangle_count(), 2);
        assert_eq!(soup.vertex_count(), 4);
    }

    #[test]
    fn test_collect_skips_stale_visframe() {
        let model = floor_world(64.0, 2);
        let soup = TriSoup::collect(&model, &overhead_view(3), &[0.0, 0.0, 30.0]);
        assert!(soup.is_empty());
    }

    #[test]
    fn test_collect_from_behind_skips_front_facing_surface() {
        let model = floor_world(64.0, 1);
        let soup = TriSoup::collect(&model, &overhead_view(1), &[0.0, 0.0, -30.0]);
        assert!(soup.is_empty());
    }

    #[test]
    fn test_collect_skips_sky_and_liquid() {
        let mut model = floor_world(64.0, 1);
        model.texinfo[0].flags = SURF_SKY;
        assert!(TriSoup::collect(&model, &overhead_view(1), &[0.0, 0.0, 30.0]).is_empty());

        let mut model = floor_world(64.0, 1);
        model.surfaces[0].flags = SurfFlags::DRAWTURB;
        assert!(TriSoup::collect(&model, &overhead_view(1), &[0.0, 0.0, 30.0]).is_empty());
    }

    #[test]
    fn test_collect_respects_frustum_and_nocull() {
        let model = floor_world(64.0, 1);
        // looking up, away from the floor
        let mut view = ViewState::new([0.0, 0.0, 400.0], [-90.0, 0.0, 0.0], 90.0, 90.0, 1);
        assert!(TriSoup::collect(&model, &view, &[0.0, 0.0, 30.0]).is_empty());
        view.nocull = true;
        assert_eq!(TriSoup::collect(&model, &view, &[0.0, 0.0, 30.0]).triangle_count(), 2);
    }

    #[test]
    fn test_collect_respects_areabits() {
        let model = floor_world(64.0, 1);
        let mut view = overhead_view(1);
        view.areabits = Some(vec![0]);
        assert!(TriSoup::collect(&model, &view, &[0.0, 0.0, 30.0]).is_empty());
    }

    #[test]
    fn test_snapshot_build_and_destroy() {
        let mut world = RigidBodyWorld::new([0.0, 0.0, -256.0]).unwrap();
        let mut snap = LevelCollisionSnapshot::new();
        let model = floor_world(64.0, 1);

        snap.build(&model, &overhead_view(1), &[0.0, 0.0, 30.0], &mut world);
        assert!(!snap.is_empty());
        assert_eq!(snap.triangle_count(), 2);
        assert_eq!(world.collider_count(), 1);

        // rebuilding replaces rather than accumulates
        snap.build(&model, &overhead_view(1), &[0.0, 0.0, 30.0], &mut world);
        assert_eq!(world.collider_count(), 1);

        snap.destroy(&mut world);
        snap.destroy(&mut world);
        assert!(snap.is_empty());
        assert_eq!(snap.vertex_count(), 0);
        assert_eq!(world.collider_count(), 0);
    }

    #[test]
    fn test_snapshot_empty_world_has_no_collider() {
        let mut world = RigidBodyWorld::new([0.0, 0.0, -256.0]).unwrap();
        let mut snap = LevelCollisionSnapshot::new();
        snap.build(&WorldModel::default(), &overhead_view(1), &[0.0; 3], &mut world);
        assert!(snap.is_empty());
        assert_eq!(world.collider_count(), 0);
    }
}
