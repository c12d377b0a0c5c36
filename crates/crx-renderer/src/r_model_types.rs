// Copyright (C) 1997-2001 Id Software, Inc.
// GPL-2.0-or-later
//
// r_model_types.rs — in-memory world and skinned mesh representations
//
// The world BSP is index-based: nodes, leafs, surfaces and planes live in
// flat arrays on `WorldModel` and refer to each other by index. A node child
// that is >= 0 names another node; a negative child `c` names leaf `-(c + 1)`.

use crx_common::q_shared::{CPlane, Vec3, CONTENTS_NODE};

// ============================================================================
// BRUSH MODELS
// ============================================================================

pub const SIDE_FRONT: usize = 0;
pub const SIDE_BACK: usize = 1;

/// xyz s1t1 s2t2
pub const VERTEXSIZE: usize = 7;

bitflags::bitflags! {
    /// Per-surface draw flags assigned at load time.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SurfFlags: i32 {
        const PLANEBACK      = 0x02;
        const DRAWSKY        = 0x04;
        const DRAWTURB       = 0x10;
        const DRAWBACKGROUND = 0x40;
        const UNDERWATER     = 0x80;
    }
}

#[derive(Debug, Clone, Default)]
pub struct MTexInfo {
    pub vecs: [[f32; 4]; 2],
    /// SURF_* content flags from the map (sky, warp, nodraw...)
    pub flags: i32,
}

/// One polygon of a surface. Warped surfaces carry several.
#[derive(Debug, Clone, Default)]
pub struct GlPoly {
    pub verts: Vec<[f32; VERTEXSIZE]>,
}

impl GlPoly {
    /// Polygon with zeroed texture coordinates.
    pub fn from_points(points: &[Vec3]) -> Self {
        let verts = points
            .iter()
            .map(|p| [p[0], p[1], p[2], 0.0, 0.0, 0.0, 0.0])
            .collect();
        Self { verts }
    }

    #[inline]
    pub fn numverts(&self) -> usize {
        self.verts.len()
    }

    #[inline]
    pub fn position(&self, i: usize) -> Vec3 {
        let v = &self.verts[i];
        [v[0], v[1], v[2]]
    }
}

#[derive(Debug, Clone, Default)]
pub struct MSurface {
    pub plane: usize,
    pub flags: SurfFlags,
    pub texinfo: usize,
    pub polys: Vec<GlPoly>,
}

#[derive(Debug, Clone)]
pub struct MNode {
    /// Always CONTENTS_NODE for interior nodes.
    pub contents: i32,
    /// Node needs to be traversed if current.
    pub visframe: i32,
    pub minmaxs: [f32; 6],
    pub plane: usize,
    pub children: [i32; 2],
    pub firstsurface: usize,
    pub numsurfaces: usize,
}

impl Default for MNode {
    fn default() -> Self {
        Self {
            contents: CONTENTS_NODE,
            visframe: 0,
            minmaxs: [0.0; 6],
            plane: 0,
            children: [0; 2],
            firstsurface: 0,
            numsurfaces: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MLeaf {
    pub contents: i32,
    pub visframe: i32,
    pub minmaxs: [f32; 6],
    pub cluster: i32,
    pub area: i32,
    pub firstmarksurface: usize,
    pub nummarksurfaces: usize,
}

/// A resolved node child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Node(usize),
    Leaf(usize),
}

impl NodeRef {
    pub fn from_child(child: i32) -> Self {
        if child >= 0 {
            NodeRef::Node(child as usize)
        } else {
            NodeRef::Leaf((-(child + 1)) as usize)
        }
    }

    pub fn to_child(self) -> i32 {
        match self {
            NodeRef::Node(n) => n as i32,
            NodeRef::Leaf(l) => -(l as i32) - 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorldModel {
    pub name: String,
    pub planes: Vec<CPlane>,
    pub nodes: Vec<MNode>,
    pub leafs: Vec<MLeaf>,
    pub surfaces: Vec<MSurface>,
    /// Leaf -> surface index lists, addressed by firstmarksurface.
    pub marksurfaces: Vec<usize>,
    pub texinfo: Vec<MTexInfo>,
}

impl WorldModel {
    /// Entry point of the tree. A world with no nodes is a single leaf.
    pub fn root(&self) -> NodeRef {
        if self.nodes.is_empty() {
            NodeRef::Leaf(0)
        } else {
            NodeRef::Node(0)
        }
    }

    pub fn child(&self, node: usize, side: usize) -> NodeRef {
        NodeRef::from_child(self.nodes[node].children[side])
    }

    pub fn leaf_surfaces(&self, leaf: usize) -> &[usize] {
        let l = &self.leafs[leaf];
        self.marksurfaces
            .get(l.firstmarksurface..l.firstmarksurface + l.nummarksurfaces)
            .unwrap_or(&[])
    }

    pub fn surface_is_sky(&self, surf: &MSurface) -> bool {
        surf.flags.contains(SurfFlags::DRAWSKY)
            || self
                .texinfo
                .get(surf.texinfo)
                .is_some_and(|ti| ti.flags & crx_common::q_shared::SURF_SKY != 0)
    }
}

// ============================================================================
// SKINNED MESHES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshJoint {
    pub name: String,
    /// Index of the parent joint, or -1 for a root.
    pub parent: i32,
}

/// Skeleton topology and bounds of an animated model.
#[derive(Debug, Clone, Default)]
pub struct SkinnedMesh {
    pub name: String,
    pub joints: Vec<MeshJoint>,
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl SkinnedMesh {
    #[inline]
    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn find_joint(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name == name)
    }

    /// The eight corners of the model-space bounding box.
    pub fn bbox(&self) -> [Vec3; 8] {
        let mut corners = [[0.0f32; 3]; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            corner[0] = if i & 1 != 0 { self.maxs[0] } else { self.mins[0] };
            corner[1] = if i & 2 != 0 { self.maxs[1] } else { self.mins[1] };
            corner[2] = if i & 4 != 0 { self.maxs[2] } else { self.mins[2] };
        }
        corners
    }
}
