#![allow(clippy::needless_range_loop, clippy::float_cmp, clippy::too_many_arguments)]

pub mod q_shared;
pub mod matrix;
pub mod common;
pub mod cvar;
