// q_shared.rs — foundational types and functions shared by all modules

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

// angle indexes
pub const PITCH: usize = 0; // up / down
pub const YAW: usize = 1; // left / right
pub const ROLL: usize = 2; // fall over

pub const MAX_TOKEN_CHARS: usize = 128;

// print levels
pub const PRINT_ALL: i32 = 0;
pub const PRINT_DEVELOPER: i32 = 1;

// ============================================================
// Contents and surface flags
// ============================================================

pub const CONTENTS_SOLID: i32 = 1;
pub const CONTENTS_LAVA: i32 = 8;
pub const CONTENTS_SLIME: i32 = 16;

/// Node marker: interior BSP nodes carry -1 in their contents slot.
pub const CONTENTS_NODE: i32 = -1;

pub const SURF_SKY: i32 = 0x4;
pub const SURF_WARP: i32 = 0x8;

pub const MASK_OPAQUE: i32 = CONTENTS_SOLID | CONTENTS_SLIME | CONTENTS_LAVA;

// plane types, 0-2 are axial planes
pub const PLANE_X: u8 = 0;
pub const PLANE_Y: u8 = 1;
pub const PLANE_Z: u8 = 2;
pub const PLANE_ANYZ: u8 = 5;

// ============================================================
// Console variable flags
// ============================================================

pub const CVAR_ZERO: i32 = 0;
pub const CVAR_ARCHIVE: i32 = 1;

// ============================================================
// Entity render flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RenderFlags: i32 {
        const MINLIGHT    = 0x00000001;
        const VIEWERMODEL = 0x00000002;
        const WEAPONMODEL = 0x00000004;
        const FULLBRIGHT  = 0x00000008;
        const DEPTHHACK   = 0x00000010;
        const TRANSLUCENT = 0x00000020;
        const FRAMELERP   = 0x00000040;
        const NOSHADOWS   = 0x00020000;
        const SHELL_RED   = 0x00000400;
        const SHELL_GREEN = 0x00000800;
        const SHELL_BLUE  = 0x00001000;
    }
}

// ============================================================
// Plane
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: u8,
    pub signbits: u8,
    pub pad: [u8; 2],
}

impl Default for CPlane {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            dist: 0.0,
            plane_type: 0,
            signbits: 0,
            pad: [0; 2],
        }
    }
}

impl CPlane {
    /// Build a plane, classifying its type and signbits from the normal.
    pub fn new(normal: Vec3, dist: f32) -> Self {
        let plane_type = if normal[0] == 1.0 {
            PLANE_X
        } else if normal[1] == 1.0 {
            PLANE_Y
        } else if normal[2] == 1.0 {
            PLANE_Z
        } else {
            PLANE_ANYZ
        };
        Self {
            normal,
            dist,
            plane_type,
            signbits: signbits_for_plane(&normal),
            pad: [0; 2],
        }
    }
}

/// Bit i is set when normal component i is negative.
pub fn signbits_for_plane(normal: &Vec3) -> u8 {
    let mut bits = 0u8;
    for (j, &n) in normal.iter().enumerate() {
        if n < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

// ============================================================
// Trace
// ============================================================

#[derive(Debug, Clone)]
pub struct Trace {
    pub allsolid: bool,
    pub startsolid: bool,
    pub fraction: f32,
    pub endpos: Vec3,
    pub plane: CPlane,
    pub contents: i32,
    pub ent_index: i32,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            fraction: 1.0,
            endpos: [0.0; 3],
            plane: CPlane::default(),
            contents: 0,
            ent_index: -1,
        }
    }
}

// ============================================================
// MATHLIB — Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// veca + scale * vecb
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_negate(v: &Vec3) -> Vec3 {
    [-v[0], -v[1], -v[2]]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

// ============================================================
// Matrix operations
// ============================================================

pub fn r_concat_rotations(in1: &[[f32; 3]; 3], in2: &[[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut out = [[0.0f32; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = in1[i][0] * in2[0][j] + in1[i][1] * in2[1][j] + in1[i][2] * in2[2][j];
        }
    }
    out
}

// ============================================================
// Angle functions
// ============================================================

/// Returns (forward, right, up) for a pitch/yaw/roll triple in degrees.
pub fn angle_vectors(angles: &Vec3) -> (Vec3, Vec3, Vec3) {
    let (sy, cy) = angles[YAW].to_radians().sin_cos();
    let (sp, cp) = angles[PITCH].to_radians().sin_cos();
    let (sr, cr) = angles[ROLL].to_radians().sin_cos();

    let forward = [cp * cy, cp * sy, -sp];
    let right = [
        -sr * sp * cy + -cr * -sy,
        -sr * sp * sy + -cr * cy,
        -sr * cp,
    ];
    let up = [
        cr * sp * cy + -sr * -sy,
        cr * sp * sy + -sr * cy,
        cr * cp,
    ];
    (forward, right, up)
}

/// Returns 1 (front), 2 (back), or 3 (crossing) for a box vs. plane test.
pub fn box_on_plane_side(emins: &Vec3, emaxs: &Vec3, p: &CPlane) -> i32 {
    // fast axial cases
    if (p.plane_type as usize) < 3 {
        let t = p.plane_type as usize;
        if p.dist <= emins[t] {
            return 1;
        }
        if p.dist >= emaxs[t] {
            return 2;
        }
        return 3;
    }

    // general case: pick the corner nearest and farthest along the normal
    let mut near = [0.0f32; 3];
    let mut far = [0.0f32; 3];
    for i in 0..3 {
        if p.signbits & (1 << i) != 0 {
            far[i] = emins[i];
            near[i] = emaxs[i];
        } else {
            far[i] = emaxs[i];
            near[i] = emins[i];
        }
    }
    let dist1 = dot_product(&p.normal, &far);
    let dist2 = dot_product(&p.normal, &near);

    let mut sides = 0;
    if dist1 >= p.dist {
        sides = 1;
    }
    if dist2 < p.dist {
        sides |= 2;
    }
    sides
}

pub fn project_point_on_plane(p: &Vec3, normal: &Vec3) -> Vec3 {
    let inv_denom = 1.0 / dot_product(normal, normal);
    let d = dot_product(normal, p) * inv_denom;
    let n = vector_scale(normal, inv_denom);
    vector_ma(p, -d, &n)
}

/// Find a unit vector perpendicular to `src` (assumed normalized).
pub fn perpendicular_vector(src: &Vec3) -> Vec3 {
    let mut min_elem: f32 = 1.0;
    let mut pos = 0;
    for (i, &c) in src.iter().enumerate() {
        if c.abs() < min_elem {
            pos = i;
            min_elem = c.abs();
        }
    }
    let mut tempvec = [0.0f32; 3];
    tempvec[pos] = 1.0;

    let mut dst = project_point_on_plane(&tempvec, src);
    vector_normalize(&mut dst);
    dst
}

pub fn rotate_point_around_vector(dir: &Vec3, point: &Vec3, degrees: f32) -> Vec3 {
    let vf = *dir;
    let vr = perpendicular_vector(dir);
    let vup = cross_product(&vr, &vf);

    let m = [
        [vr[0], vup[0], vf[0]],
        [vr[1], vup[1], vf[1]],
        [vr[2], vup[2], vf[2]],
    ];
    let im = [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ];

    let (s, c) = degrees.to_radians().sin_cos();
    let zrot = [[c, s, 0.0], [-s, c, 0.0], [0.0, 0.0, 1.0]];

    let rot = r_concat_rotations(&r_concat_rotations(&m, &zrot), &im);

    let mut dst = [0.0f32; 3];
    for i in 0..3 {
        dst[i] = rot[i][0] * point[0] + rot[i][1] * point[1] + rot[i][2] * point[2];
    }
    dst
}

// ============================================================
// Parsing
// ============================================================

/// Parse one whitespace-delimited token, skipping `//` comments.
/// Returns the token and the unparsed remainder (None at end of input).
pub fn com_parse(data: &str) -> (String, Option<&str>) {
    let mut chars = data.as_bytes();
    let mut token = String::new();

    // skip whitespace
    loop {
        while !chars.is_empty() && chars[0] <= b' ' {
            chars = &chars[1..];
        }
        if chars.is_empty() {
            return (String::new(), None);
        }

        // skip // comments
        if chars.len() >= 2 && chars[0] == b'/' && chars[1] == b'/' {
            while !chars.is_empty() && chars[0] != b'\n' {
                chars = &chars[1..];
            }
            continue;
        }
        break;
    }

    // handle quoted strings
    if chars[0] == b'"' {
        chars = &chars[1..];
        while !chars.is_empty() && chars[0] != b'"' {
            if token.len() < MAX_TOKEN_CHARS {
                token.push(chars[0] as char);
            }
            chars = &chars[1..];
        }
        if !chars.is_empty() {
            chars = &chars[1..];
        }
    } else {
        while !chars.is_empty() && chars[0] > b' ' {
            if token.len() < MAX_TOKEN_CHARS {
                token.push(chars[0] as char);
            }
            chars = &chars[1..];
        }
    }

    let offset = data.len() - chars.len();
    let remaining = if chars.is_empty() {
        None
    } else {
        Some(&data[offset..])
    };
    (token, remaining)
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_product() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0, 6.0];
        assert_eq!(dot_product(&a, &b), 32.0);
    }

    #[test]
    fn test_vector_normalize() {
        let mut v = [3.0, 0.0, 4.0];
        let len = vector_normalize(&mut v);
        assert!((len - 5.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_vector_normalize_zero_is_untouched() {
        let mut v = [0.0, 0.0, 0.0];
        assert_eq!(vector_normalize(&mut v), 0.0);
        assert_eq!(v, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cross_product() {
        let c = cross_product(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert_eq!(c, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_plane_classification() {
        let p = CPlane::new([0.0, 0.0, 1.0], 4.0);
        assert_eq!(p.plane_type, PLANE_Z);
        assert_eq!(p.signbits, 0);

        let q = CPlane::new([-0.6, 0.0, -0.8], 0.0);
        assert_eq!(q.plane_type, PLANE_ANYZ);
        assert_eq!(q.signbits, 0b101);
    }

    #[test]
    fn test_box_on_plane_side_axial() {
        let mins = [-1.0, -1.0, -1.0];
        let maxs = [1.0, 1.0, 1.0];
        let plane = CPlane::new([1.0, 0.0, 0.0], 5.0);
        assert_eq!(box_on_plane_side(&mins, &maxs, &plane), 2);
        let plane = CPlane::new([1.0, 0.0, 0.0], -5.0);
        assert_eq!(box_on_plane_side(&mins, &maxs, &plane), 1);
    }

    #[test]
    fn test_box_on_plane_side_general() {
        let mut n = [1.0, 1.0, 0.0];
        vector_normalize(&mut n);
        let mins = [-1.0, -1.0, -1.0];
        let maxs = [1.0, 1.0, 1.0];
        assert_eq!(box_on_plane_side(&mins, &maxs, &CPlane::new(n, 0.0)), 3);
        assert_eq!(box_on_plane_side(&mins, &maxs, &CPlane::new(n, 10.0)), 2);
        assert_eq!(box_on_plane_side(&mins, &maxs, &CPlane::new(n, -10.0)), 1);

        let neg = vector_negate(&n);
        assert_eq!(box_on_plane_side(&mins, &maxs, &CPlane::new(neg, 10.0)), 2);
    }

    #[test]
    fn test_angle_vectors_zero_angles() {
        let (forward, right, up) = angle_vectors(&[0.0, 0.0, 0.0]);
        assert!((forward[0] - 1.0).abs() < 1e-5);
        assert!((right[1] + 1.0).abs() < 1e-5);
        assert!((up[2] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_angle_vectors_pitch_90() {
        // pitch 90 looks straight down
        let (forward, _, _) = angle_vectors(&[90.0, 0.0, 0.0]);
        assert!(forward[0].abs() < 1e-5);
        assert!((forward[2] + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_perpendicular_vector_axes() {
        for src in [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]] {
            let dst = perpendicular_vector(&src);
            assert!(dot_product(&dst, &src).abs() < 1e-5);
            assert!((vector_length(&dst) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_rotate_90_around_z() {
        let dst = rotate_point_around_vector(&[0.0, 0.0, 1.0], &[1.0, 0.0, 0.0], 90.0);
        assert!(dst[0].abs() < 1e-4, "x: {}", dst[0]);
        assert!((dst[1] - 1.0).abs() < 1e-4, "y: {}", dst[1]);
        assert!(dst[2].abs() < 1e-4, "z: {}", dst[2]);
    }

    #[test]
    fn test_rotate_360_returns_original() {
        let point = [0.3, -2.0, 1.5];
        let dst = rotate_point_around_vector(&[1.0, 0.0, 0.0], &point, 360.0);
        for i in 0..3 {
            assert!((dst[i] - point[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_com_parse() {
        let (token, rest) = com_parse("hello world");
        assert_eq!(token, "hello");
        assert_eq!(rest, Some(" world"));

        let (token, rest) = com_parse("\"quoted string\" next");
        assert_eq!(token, "quoted string");
        assert!(rest.is_some());

        let (token, _) = com_parse("// comment\nvalue");
        assert_eq!(token, "value");

        let (token, rest) = com_parse("   ");
        assert!(token.is_empty());
        assert!(rest.is_none());
    }

    #[test]
    fn test_render_flags_bits() {
        let f = RenderFlags::from_bits_truncate(0x21);
        assert!(f.contains(RenderFlags::MINLIGHT));
        assert!(f.contains(RenderFlags::TRANSLUCENT));
        assert!(!f.contains(RenderFlags::FULLBRIGHT));
    }
}
