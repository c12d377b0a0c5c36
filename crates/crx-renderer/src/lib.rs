#![allow(clippy::needless_range_loop, clippy::float_cmp, clippy::too_many_arguments)]
// Refresh-side model data, view state and ragdoll physics

pub mod r_model_types;
pub mod r_view;
pub mod ragdoll;

use crx_common::q_shared::PRINT_DEVELOPER;

pub fn vid_printf(level: i32, msg: &str) {
    if level == PRINT_DEVELOPER {
        crx_common::common::com_dprintf(msg);
    } else {
        crx_common::common::com_printf(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crx_common::common::{com_begin_redirect, com_end_redirect};
    use crx_common::q_shared::PRINT_ALL;

    #[test]
    fn test_vid_printf_routes_to_console() {
        com_begin_redirect();
        vid_printf(PRINT_ALL, "ragdoll: hello\n");
        let out = com_end_redirect().unwrap();
        assert!(out.contains("ragdoll: hello"));
    }
}
