// dims.rs — per-model ragdoll proportions and joint stops
// Converted from: ref_gl/r_ragdoll.c
//
// All lengths are in model units before the global offset is applied.
// Angular stops are radians. A model may ship a `.rgd` text file of
// `key value` pairs overriding any subset of these.

use std::f32::consts::PI;

use crx_common::q_shared::{com_parse, Vec3, PRINT_ALL};

use super::RagdollError;
use crate::vid_printf;

macro_rules! ragdoll_dims {
    ($($field:ident = $default:expr),* $(,)?) => {
        #[derive(Debug, Clone, PartialEq)]
        pub struct RagdollDims {
            $(pub $field: f32,)*
        }

        impl Default for RagdollDims {
            fn default() -> Self {
                Self { $($field: $default,)* }
            }
        }

        impl RagdollDims {
            /// Every key accepted by `parse`, in declaration order.
            pub const KEYS: &'static [&'static str] = &[$(stringify!($field),)*];

            fn field_mut(&mut self, key: &str) -> Option<&mut f32> {
                match key {
                    $(stringify!($field) => Some(&mut self.$field),)*
                    _ => None,
                }
            }
        }
    };
}

ragdoll_dims! {
    // arm joints, left side; the right side mirrors x
    elbow_x_off = 17.0,
    elbow_y_off = 0.0,
    elbow_z_off = 34.0,
    wrist_x_off = 26.0,
    wrist_y_off = 0.0,
    wrist_z_off = 34.0,
    hand_len = 5.0,
    // ankle to ball of foot
    foot_len = 5.0,
    heel_len = 2.0,

    head_h = 46.0,
    neck_h = 38.0,
    shoulder_h = 34.0,
    chest_h = 31.0,
    hip_h = 16.0,
    knee_h = 2.0,
    ankle_h = -10.0,

    head_w = 8.0,
    shoulder_w = 16.0,
    // narrower than the shoulders so the arms clear the chest capsule
    chest_w = 9.0,
    bicep_w = 4.0,
    forearm_w = 3.5,
    hand_w = 3.0,
    // between the middles of the upper legs
    leg_w = 12.0,
    pelvis_w = 8.0,
    thigh_w = 4.5,
    shin_w = 4.0,
    foot_w = 3.0,

    // model space to physics space
    global_x_off = 0.0,
    global_y_off = 12.0,
    global_z_off = -12.0,

    hip_lostop1 = -0.1 * PI,
    hip_histop1 = 0.3 * PI,
    hip_lostop2 = -0.15 * PI,
    hip_histop2 = 0.75 * PI,
    knee_lostop = 0.0,
    knee_histop = 0.75 * PI,
    ankle_lostop = -0.1 * PI,
    ankle_histop = 0.05 * PI,
    shoulder_lostop1 = -0.1 * PI,
    shoulder_histop1 = 0.3 * PI,
    shoulder_lostop2 = -0.15 * PI,
    shoulder_histop2 = 0.75 * PI,
    elbow_lostop = 0.0,
    elbow_histop = 0.6 * PI,
    wrist_lostop = -0.1 * PI,
    wrist_histop = 0.1 * PI,
    head_lostop1 = -0.2 * PI,
    head_histop1 = 0.2 * PI,
    head_lostop2 = -0.2 * PI,
    head_histop2 = 0.2 * PI,
}

impl RagdollDims {
    pub fn global_offset(&self) -> Vec3 {
        [self.global_x_off, self.global_y_off, self.global_z_off]
    }

    /// Parse a `.rgd` file body. Unknown keys are reported and skipped;
    /// a key without a numeric value is an error.
    pub fn parse(text: &str) -> Result<Self, RagdollError> {
        let mut dims = Self::default();

        for (lineno, line) in text.lines().enumerate() {
            let line_no = lineno + 1;
            let (key, rest) = com_parse(line);
            if key.is_empty() {
                continue;
            }

            let (value, _) = rest.map(com_parse).unwrap_or_default();
            let parsed = value.parse::<f32>().ok().filter(|v| v.is_finite());

            match (dims.field_mut(&key), parsed) {
                (Some(slot), Some(v)) => *slot = v,
                (Some(_), None) => {
                    return Err(RagdollError::DimsParse {
                        line: line_no,
                        message: format!("expected a number after \"{}\"", key),
                    });
                }
                (None, _) => {
                    vid_printf(
                        PRINT_ALL,
                        &format!("ragdoll dims: unknown key \"{}\" on line {}\n", key, line_no),
                    );
                }
            }
        }

        Ok(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_plausible() {
        let d = RagdollDims::default();
        assert!(d.head_h > d.neck_h);
        assert!(d.neck_h > d.shoulder_h);
        assert!(d.shoulder_h > d.chest_h);
        assert!(d.chest_h > d.hip_h);
        assert!(d.hip_h > d.knee_h);
        assert!(d.knee_h > d.ankle_h);
        assert!(d.shoulder_w > d.chest_w);
        assert_eq!(d.global_offset(), [0.0, 12.0, -12.0]);
        assert!(d.hip_lostop1 < d.hip_histop1);
        assert!(d.knee_lostop < d.knee_histop);
    }

    #[test]
    fn test_parse_overrides_subset() {
        let text = "// martian proportions\n\
                    head_h 50\n\
                    \n\
                    leg_w 14.5 // wider stance\n\
                    knee_histop \"2.0\"\n";
        let d = RagdollDims::parse(text).unwrap();
        assert_eq!(d.head_h, 50.0);
        assert_eq!(d.leg_w, 14.5);
        assert_eq!(d.knee_histop, 2.0);
        assert_eq!(d.neck_h, RagdollDims::default().neck_h);
    }

    #[test]
    fn test_parse_missing_value_reports_line() {
        let err = RagdollDims::parse("head_h 50\nneck_h\n").unwrap_err();
        match err {
            RagdollError::DimsParse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(RagdollDims::parse("chest_w wide").is_err());
        assert!(RagdollDims::parse("chest_w nan").is_err());
    }

    #[test]
    fn test_parse_skips_unknown_keys() {
        let d = RagdollDims::parse("tail_len 12\nhip_h 18").unwrap();
        assert_eq!(d.hip_h, 18.0);
    }

    #[test]
    fn test_keys_cover_every_field() {
        let mut d = RagdollDims::default();
        for key in RagdollDims::KEYS {
            assert!(d.field_mut(key).is_some(), "{}", key);
        }
        assert_eq!(RagdollDims::KEYS.len(), 50);
    }
}
