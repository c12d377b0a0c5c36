// r_view.rs — per-frame view state, frustum setup and point culling

use crx_common::q_shared::{
    angle_vectors, dot_product, rotate_point_around_vector, CPlane, Vec3,
    PLANE_ANYZ, signbits_for_plane,
};

/// Everything the ragdoll code needs from the current refresh view.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub vieworg: Vec3,
    pub viewangles: Vec3,
    pub fov_x: f32,
    pub fov_y: f32,
    pub frustum: [CPlane; 4],
    /// Nodes and leafs marked with this value are in the current PVS.
    pub visframecount: i32,
    /// Area visibility bits; None means every area is open.
    pub areabits: Option<Vec<u8>>,
    pub nocull: bool,
}

impl ViewState {
    pub fn new(vieworg: Vec3, viewangles: Vec3, fov_x: f32, fov_y: f32, visframecount: i32) -> Self {
        let (vpn, vright, vup) = angle_vectors(&viewangles);
        Self {
            vieworg,
            viewangles,
            fov_x,
            fov_y,
            frustum: r_set_frustum(&vieworg, &vpn, &vright, &vup, fov_x, fov_y),
            visframecount,
            areabits: None,
            nocull: false,
        }
    }

    /// Door-connected area check for a leaf.
    pub fn area_visible(&self, area: i32) -> bool {
        match &self.areabits {
            None => true,
            Some(bits) => {
                let byte = (area >> 3) as usize;
                bits.get(byte).is_some_and(|b| b & (1 << (area & 7)) != 0)
            }
        }
    }
}

// ============================================================
// R_SetFrustum
// ============================================================

pub fn r_set_frustum(
    origin: &Vec3,
    vpn: &Vec3,
    vright: &Vec3,
    vup: &Vec3,
    fov_x: f32,
    fov_y: f32,
) -> [CPlane; 4] {
    let normals = [
        // rotate VPN right by FOV_X/2 degrees
        rotate_point_around_vector(vup, vpn, -(90.0 - fov_x / 2.0)),
        // rotate VPN left by FOV_X/2 degrees
        rotate_point_around_vector(vup, vpn, 90.0 - fov_x / 2.0),
        // rotate VPN up by FOV_Y/2 degrees
        rotate_point_around_vector(vright, vpn, 90.0 - fov_y / 2.0),
        // rotate VPN down by FOV_Y/2 degrees
        rotate_point_around_vector(vright, vpn, -(90.0 - fov_y / 2.0)),
    ];

    normals.map(|normal| CPlane {
        normal,
        dist: dot_product(origin, &normal),
        plane_type: PLANE_ANYZ,
        signbits: signbits_for_plane(&normal),
        pad: [0; 2],
    })
}

// ============================================================
// Point culling
// ============================================================

/// Returns true if every point lies behind one single frustum plane.
pub fn r_cull_points(frustum: &[CPlane; 4], points: &[Vec3]) -> bool {
    frustum
        .iter()
        .any(|p| points.iter().all(|pt| dot_product(&p.normal, pt) < p.dist))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn looking_down_x() -> ViewState {
        ViewState::new([0.0, 0.0, 0.0], [0.0, 0.0, 0.0], 90.0, 90.0, 1)
    }

    #[test]
    fn test_frustum_planes_face_inward() {
        let view = looking_down_x();
        for p in &view.frustum {
            // a point straight ahead is in front of every plane
            assert!(dot_product(&p.normal, &[100.0, 0.0, 0.0]) - p.dist > 0.0);
            assert!((crx_common::q_shared::vector_length(&p.normal) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_cull_points() {
        let view = looking_down_x();
        let behind = [[-50.0, 0.0, 0.0], [-60.0, 5.0, 5.0]];
        let ahead = [[-50.0, 0.0, 0.0], [60.0, 0.0, 0.0]];
        assert!(r_cull_points(&view.frustum, &behind));
        assert!(!r_cull_points(&view.frustum, &ahead));
    }

    #[test]
    fn test_area_visible() {
        let mut view = looking_down_x();
        assert!(view.area_visible(9));
        view.areabits = Some(vec![0b0000_0010, 0b0000_0001]);
        assert!(view.area_visible(1));
        assert!(!view.area_visible(0));
        assert!(view.area_visible(8));
        assert!(!view.area_visible(40));
    }
}
