// anatomy.rs — the fixed humanoid template: sixteen capsules, fifteen joints
// Converted from: ref_gl/r_ragdoll.c
//
// Everything here is in model space (z up, toes along +y, the model's right
// side on -x). The body builder moves it into the world.

use crx_common::q_shared::Vec3;

use super::dims::RagdollDims;

pub const MAX_RAGDOLL_OBJECTS: usize = 16;
pub const MAX_RAGDOLL_JOINTS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Chest,
    Belly,
    Pelvis,
    Head,
    RightUpperLeg,
    LeftUpperLeg,
    RightLowerLeg,
    LeftLowerLeg,
    RightFoot,
    LeftFoot,
    RightUpperArm,
    LeftUpperArm,
    RightForearm,
    LeftForearm,
    RightHand,
    LeftHand,
}

impl BodyPart {
    pub const ALL: [BodyPart; MAX_RAGDOLL_OBJECTS] = [
        BodyPart::Chest,
        BodyPart::Belly,
        BodyPart::Pelvis,
        BodyPart::Head,
        BodyPart::RightUpperLeg,
        BodyPart::LeftUpperLeg,
        BodyPart::RightLowerLeg,
        BodyPart::LeftLowerLeg,
        BodyPart::RightFoot,
        BodyPart::LeftFoot,
        BodyPart::RightUpperArm,
        BodyPart::LeftUpperArm,
        BodyPart::RightForearm,
        BodyPart::LeftForearm,
        BodyPart::RightHand,
        BodyPart::LeftHand,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Option<BodyPart> {
        Self::ALL.get(i).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            BodyPart::Chest => "chest",
            BodyPart::Belly => "belly",
            BodyPart::Pelvis => "pelvis",
            BodyPart::Head => "head",
            BodyPart::RightUpperLeg => "right upper leg",
            BodyPart::LeftUpperLeg => "left upper leg",
            BodyPart::RightLowerLeg => "right lower leg",
            BodyPart::LeftLowerLeg => "left lower leg",
            BodyPart::RightFoot => "right foot",
            BodyPart::LeftFoot => "left foot",
            BodyPart::RightUpperArm => "right upper arm",
            BodyPart::LeftUpperArm => "left upper arm",
            BodyPart::RightForearm => "right forearm",
            BodyPart::LeftForearm => "left forearm",
            BodyPart::RightHand => "right hand",
            BodyPart::LeftHand => "left hand",
        }
    }

    /// Debug marker class: head green, arms and hands blue, everything else red.
    pub fn debug_mark(self) -> super::render::DebugMark {
        use super::render::DebugMark;
        if self == BodyPart::Head {
            DebugMark::Green
        } else if self.index() > BodyPart::LeftFoot.index() {
            DebugMark::Blue
        } else {
            DebugMark::Red
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointId {
    MidSpine,
    LowSpine,
    Neck,
    RightHip,
    LeftHip,
    RightKnee,
    LeftKnee,
    RightAnkle,
    LeftAnkle,
    RightShoulder,
    LeftShoulder,
    RightElbow,
    LeftElbow,
    RightWrist,
    LeftWrist,
}

impl JointId {
    pub const ALL: [JointId; MAX_RAGDOLL_JOINTS] = [
        JointId::MidSpine,
        JointId::LowSpine,
        JointId::Neck,
        JointId::RightHip,
        JointId::LeftHip,
        JointId::RightKnee,
        JointId::LeftKnee,
        JointId::RightAnkle,
        JointId::LeftAnkle,
        JointId::RightShoulder,
        JointId::LeftShoulder,
        JointId::RightElbow,
        JointId::LeftElbow,
        JointId::RightWrist,
        JointId::LeftWrist,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HingeParams {
    pub anchor: Vec3,
    pub axis: Vec3,
    pub lo: f32,
    pub hi: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniversalParams {
    pub anchor: Vec3,
    pub axis1: Vec3,
    pub axis2: Vec3,
    pub lo1: f32,
    pub hi1: f32,
    pub lo2: f32,
    pub hi2: f32,
}

/// Anchors and axes are model space for templates and world space once planned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointKind {
    Fixed,
    Hinge(HingeParams),
    Universal(UniversalParams),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTemplate {
    pub part: BodyPart,
    pub p1: Vec3,
    pub p2: Vec3,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTemplate {
    pub id: JointId,
    pub part1: BodyPart,
    pub part2: BodyPart,
    pub kind: JointKind,
}

pub const RIGHT_AXIS: Vec3 = [1.0, 0.0, 0.0];
pub const LEFT_AXIS: Vec3 = [-1.0, 0.0, 0.0];
pub const UP_AXIS: Vec3 = [0.0, 1.0, 0.0];
pub const DOWN_AXIS: Vec3 = [0.0, -1.0, 0.0];
pub const BKWD_AXIS: Vec3 = [0.0, 0.0, 1.0];
pub const FWD_AXIS: Vec3 = [0.0, 0.0, -1.0];

/// Skeleton joint names and the body part that carries them.
pub const BIND_TABLE: &[(&str, BodyPart)] = &[
    ("hip.l", BodyPart::Pelvis),
    ("hip.r", BodyPart::Pelvis),
    ("Spine", BodyPart::Chest),
    ("Spine.001", BodyPart::Chest),
    ("Head", BodyPart::Head),
    ("thigh.r", BodyPart::RightUpperLeg),
    ("thigh.l", BodyPart::LeftUpperLeg),
    ("shin.r", BodyPart::RightLowerLeg),
    ("shin.l", BodyPart::LeftLowerLeg),
    ("bicep.r", BodyPart::RightUpperArm),
    ("bicep.l", BodyPart::LeftUpperArm),
    ("forearm.r", BodyPart::RightForearm),
    ("forearm.l", BodyPart::LeftForearm),
    ("hand01.r", BodyPart::RightHand),
    ("hand02.r", BodyPart::RightHand),
    ("hand03.r", BodyPart::RightHand),
    ("hand01.l", BodyPart::LeftHand),
    ("hand02.l", BodyPart::LeftHand),
    ("hand03.l", BodyPart::LeftHand),
    ("foot.r", BodyPart::RightFoot),
    ("foot.l", BodyPart::LeftFoot),
];

pub fn part_for_joint_name(name: &str) -> Option<BodyPart> {
    BIND_TABLE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, part)| part)
}

// Key points of one side of the body. `side` is +1 for the left, -1 for the right.
struct Limb {
    shoulder: Vec3,
    elbow: Vec3,
    wrist: Vec3,
    fingers: Vec3,
    hip: Vec3,
    knee: Vec3,
    ankle: Vec3,
    heel: Vec3,
    toes: Vec3,
}

impl Limb {
    fn new(d: &RagdollDims, side: f32) -> Self {
        let ankle = [side * d.leg_w / 2.0, 0.0, d.ankle_h];
        let wrist = [side * d.wrist_x_off, d.wrist_y_off, d.wrist_z_off];
        Limb {
            shoulder: [side * d.shoulder_w / 2.0, 0.0, d.shoulder_h],
            elbow: [side * d.elbow_x_off, d.elbow_y_off, d.elbow_z_off],
            wrist,
            fingers: [wrist[0] + side * d.hand_len, wrist[1], wrist[2]],
            hip: [side * d.leg_w / 2.0, 0.0, d.hip_h],
            knee: [side * d.leg_w / 2.0, 0.0, d.knee_h],
            ankle,
            heel: [ankle[0], ankle[1] - d.heel_len, ankle[2]],
            toes: [ankle[0], ankle[1] + d.foot_len, ankle[2]],
        }
    }
}

// Nudge a point along x or z so neighbouring capsules don't start out
// sharing an endpoint. Hips and shoulders move outward, away from x = 0.
fn nudge(p: Vec3, dx: f32, dz: f32) -> Vec3 {
    [p[0] + dx, p[1], p[2] + dz]
}

/// The sixteen capsules, indexed by `BodyPart::index`.
pub fn segments(d: &RagdollDims) -> [SegmentTemplate; MAX_RAGDOLL_OBJECTS] {
    let r = Limb::new(d, -1.0);
    let l = Limb::new(d, 1.0);
    let seg = |part, p1, p2, radius| SegmentTemplate { part, p1, p2, radius };

    [
        seg(
            BodyPart::Chest,
            [-d.chest_w / 2.0, 0.0, d.chest_h],
            [d.chest_w / 2.0, 0.0, d.chest_h],
            d.chest_w / 2.0,
        ),
        seg(
            BodyPart::Belly,
            [0.0, 0.0, d.chest_h - 0.1],
            [0.0, 0.0, d.hip_h + 0.1],
            d.chest_w / 2.5,
        ),
        seg(
            BodyPart::Pelvis,
            [-(d.pelvis_w / 2.0 + 0.1), 0.0, d.hip_h],
            [d.pelvis_w / 2.0 + 0.1, 0.0, d.hip_h],
            d.pelvis_w / 2.0,
        ),
        seg(BodyPart::Head, [0.0, 0.0, d.head_h], [0.0, 0.0, d.neck_h], d.head_w / 2.0),
        seg(BodyPart::RightUpperLeg, nudge(r.hip, -0.1, 0.0), nudge(r.knee, 0.0, 0.1), d.thigh_w / 2.0),
        seg(BodyPart::LeftUpperLeg, nudge(l.hip, 0.1, 0.0), nudge(l.knee, 0.0, 0.1), d.thigh_w / 2.0),
        seg(BodyPart::RightLowerLeg, nudge(r.knee, 0.0, -0.1), r.ankle, d.shin_w / 2.0),
        seg(BodyPart::LeftLowerLeg, nudge(l.knee, 0.0, -0.1), l.ankle, d.shin_w / 2.0),
        seg(BodyPart::RightFoot, r.toes, r.heel, d.foot_w / 2.0),
        seg(BodyPart::LeftFoot, l.toes, l.heel, d.foot_w / 2.0),
        seg(BodyPart::RightUpperArm, nudge(r.shoulder, -0.1, 0.0), nudge(r.elbow, 0.0, 0.1), d.bicep_w / 2.0),
        seg(BodyPart::LeftUpperArm, nudge(l.shoulder, 0.1, 0.0), nudge(l.elbow, 0.0, 0.1), d.bicep_w / 2.0),
        seg(BodyPart::RightForearm, nudge(r.elbow, 0.0, -0.1), nudge(r.wrist, 0.0, 0.1), d.forearm_w / 2.0),
        seg(BodyPart::LeftForearm, nudge(l.elbow, 0.0, -0.1), nudge(l.wrist, 0.0, 0.1), d.forearm_w / 2.0),
        seg(BodyPart::RightHand, nudge(r.wrist, 0.0, -0.1), r.fingers, d.hand_w / 2.0),
        seg(BodyPart::LeftHand, nudge(l.wrist, 0.0, -0.1), l.fingers, d.hand_w / 2.0),
    ]
}

/// The fifteen joints, indexed by `JointId::index`.
pub fn joints(d: &RagdollDims) -> [JointTemplate; MAX_RAGDOLL_JOINTS] {
    let r = Limb::new(d, -1.0);
    let l = Limb::new(d, 1.0);

    let fixed = |id, part1, part2| JointTemplate { id, part1, part2, kind: JointKind::Fixed };
    let hinge = |id, part1, part2, anchor, axis, lo, hi| JointTemplate {
        id,
        part1,
        part2,
        kind: JointKind::Hinge(HingeParams { anchor, axis, lo, hi }),
    };
    let universal = |id, part1, part2, anchor, axis1, axis2, stops: [f32; 4]| JointTemplate {
        id,
        part1,
        part2,
        kind: JointKind::Universal(UniversalParams {
            anchor,
            axis1,
            axis2,
            lo1: stops[0],
            hi1: stops[1],
            lo2: stops[2],
            hi2: stops[3],
        }),
    };

    let hip_stops = [d.hip_lostop1, d.hip_histop1, d.hip_lostop2, d.hip_histop2];
    let shoulder_stops = [
        d.shoulder_lostop1,
        d.shoulder_histop1,
        d.shoulder_lostop2,
        d.shoulder_histop2,
    ];
    let head_stops = [d.head_lostop1, d.head_histop1, d.head_lostop2, d.head_histop2];

    [
        fixed(JointId::MidSpine, BodyPart::Chest, BodyPart::Belly),
        fixed(JointId::LowSpine, BodyPart::Belly, BodyPart::Pelvis),
        universal(
            JointId::Neck,
            BodyPart::Chest,
            BodyPart::Head,
            [0.0, 0.0, d.neck_h],
            UP_AXIS,
            RIGHT_AXIS,
            head_stops,
        ),
        universal(
            JointId::RightHip,
            BodyPart::Pelvis,
            BodyPart::RightUpperLeg,
            r.hip,
            BKWD_AXIS,
            RIGHT_AXIS,
            hip_stops,
        ),
        universal(
            JointId::LeftHip,
            BodyPart::Pelvis,
            BodyPart::LeftUpperLeg,
            l.hip,
            FWD_AXIS,
            RIGHT_AXIS,
            hip_stops,
        ),
        hinge(
            JointId::RightKnee,
            BodyPart::RightUpperLeg,
            BodyPart::RightLowerLeg,
            r.knee,
            LEFT_AXIS,
            d.knee_lostop,
            d.knee_histop,
        ),
        hinge(
            JointId::LeftKnee,
            BodyPart::LeftUpperLeg,
            BodyPart::LeftLowerLeg,
            l.knee,
            LEFT_AXIS,
            d.knee_lostop,
            d.knee_histop,
        ),
        hinge(
            JointId::RightAnkle,
            BodyPart::RightLowerLeg,
            BodyPart::RightFoot,
            r.ankle,
            RIGHT_AXIS,
            d.ankle_lostop,
            d.ankle_histop,
        ),
        hinge(
            JointId::LeftAnkle,
            BodyPart::LeftLowerLeg,
            BodyPart::LeftFoot,
            l.ankle,
            RIGHT_AXIS,
            d.ankle_lostop,
            d.ankle_histop,
        ),
        universal(
            JointId::RightShoulder,
            BodyPart::Chest,
            BodyPart::RightUpperArm,
            r.shoulder,
            BKWD_AXIS,
            RIGHT_AXIS,
            shoulder_stops,
        ),
        universal(
            JointId::LeftShoulder,
            BodyPart::Chest,
            BodyPart::LeftUpperArm,
            l.shoulder,
            FWD_AXIS,
            RIGHT_AXIS,
            shoulder_stops,
        ),
        hinge(
            JointId::RightElbow,
            BodyPart::RightUpperArm,
            BodyPart::RightForearm,
            r.elbow,
            DOWN_AXIS,
            d.elbow_lostop,
            d.elbow_histop,
        ),
        hinge(
            JointId::LeftElbow,
            BodyPart::LeftUpperArm,
            BodyPart::LeftForearm,
            l.elbow,
            UP_AXIS,
            d.elbow_lostop,
            d.elbow_histop,
        ),
        hinge(
            JointId::RightWrist,
            BodyPart::RightForearm,
            BodyPart::RightHand,
            r.wrist,
            FWD_AXIS,
            d.wrist_lostop,
            d.wrist_histop,
        ),
        hinge(
            JointId::LeftWrist,
            BodyPart::LeftForearm,
            BodyPart::LeftHand,
            l.wrist,
            BKWD_AXIS,
            d.wrist_lostop,
            d.wrist_histop,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ragdoll::render::DebugMark;
    use std::collections::HashSet;

    #[test]
    fn test_indices_match_tables() {
        for (i, part) in BodyPart::ALL.iter().enumerate() {
            assert_eq!(part.index(), i);
            assert_eq!(BodyPart::from_index(i), Some(*part));
        }
        assert_eq!(BodyPart::from_index(MAX_RAGDOLL_OBJECTS), None);
        for (i, id) in JointId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
        }

        let d = RagdollDims::default();
        for (i, s) in segments(&d).iter().enumerate() {
            assert_eq!(s.part.index(), i);
        }
        for (i, j) in joints(&d).iter().enumerate() {
            assert_eq!(j.id.index(), i);
        }
    }

    #[test]
    fn test_joint_graph_is_a_tree() {
        // 16 parts, 15 joints, every part reachable from the chest
        let d = RagdollDims::default();
        let mut reached = HashSet::from([BodyPart::Chest]);
        let js = joints(&d);
        loop {
            let before = reached.len();
            for j in &js {
                if reached.contains(&j.part1) {
                    reached.insert(j.part2);
                }
            }
            if reached.len() == before {
                break;
            }
        }
        assert_eq!(reached.len(), MAX_RAGDOLL_OBJECTS);
    }

    #[test]
    fn test_right_side_is_negative_x() {
        let d = RagdollDims::default();
        let segs = segments(&d);
        assert!(segs[BodyPart::RightUpperArm.index()].p2[0] < 0.0);
        assert!(segs[BodyPart::LeftUpperArm.index()].p2[0] > 0.0);
        assert!(segs[BodyPart::RightFoot.index()].p1[1] > segs[BodyPart::RightFoot.index()].p2[1]);
    }

    #[test]
    fn test_hips_and_shoulders_nudged_outward() {
        let d = RagdollDims::default();
        let segs = segments(&d);
        let hip = d.leg_w / 2.0;
        let shoulder = d.shoulder_w / 2.0;
        assert!((segs[BodyPart::RightUpperLeg.index()].p1[0] + hip + 0.1).abs() < 1e-5);
        assert!((segs[BodyPart::LeftUpperLeg.index()].p1[0] - hip - 0.1).abs() < 1e-5);
        assert!((segs[BodyPart::RightUpperArm.index()].p1[0] + shoulder + 0.1).abs() < 1e-5);
        assert!((segs[BodyPart::LeftUpperArm.index()].p1[0] - shoulder - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_segments_have_length_and_radius() {
        let d = RagdollDims::default();
        for s in segments(&d) {
            assert!(s.p1 != s.p2, "{}", s.part.name());
            assert!(s.radius > 0.0);
        }
    }

    #[test]
    fn test_bind_table_lookup() {
        assert_eq!(part_for_joint_name("Spine.001"), Some(BodyPart::Chest));
        assert_eq!(part_for_joint_name("hand02.l"), Some(BodyPart::LeftHand));
        assert_eq!(part_for_joint_name("foot.r"), Some(BodyPart::RightFoot));
        assert_eq!(part_for_joint_name("tail"), None);
    }

    #[test]
    fn test_debug_marks() {
        assert_eq!(BodyPart::Head.debug_mark(), DebugMark::Green);
        assert_eq!(BodyPart::LeftFoot.debug_mark(), DebugMark::Red);
        assert_eq!(BodyPart::RightUpperArm.debug_mark(), DebugMark::Blue);
        assert_eq!(BodyPart::Pelvis.debug_mark(), DebugMark::Red);
    }
}
