// cvar.rs — dynamic variable tracking

use parking_lot::Mutex;
use std::collections::HashMap;

/// A console variable.
#[derive(Clone, Debug)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub flags: i32,
    pub value: f32,
}

impl Cvar {
    fn assign(&mut self, value: &str) {
        self.string = value.to_string();
        self.value = value.parse::<f32>().unwrap_or(0.0);
    }
}

/// The cvar system context.
#[derive(Default)]
pub struct CvarContext {
    vars: HashMap<String, Cvar>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.vars.get(name)
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get or create a cvar. An existing cvar keeps its value; flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> &Cvar {
        let var = self.vars.entry(name.to_string()).or_insert_with(|| {
            let mut var = Cvar {
                name: name.to_string(),
                string: String::new(),
                flags: 0,
                value: 0.0,
            };
            var.assign(value);
            var
        });
        var.flags |= flags;
        var
    }

    /// Set a cvar, creating it with no flags if it doesn't exist.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.vars.get_mut(name) {
            Some(var) => var.assign(value),
            None => {
                self.get(name, value, 0);
            }
        }
    }
}

// ============================================================
// Global singleton and free-function wrappers
// ============================================================

static CVAR_CTX: Mutex<Option<CvarContext>> = Mutex::new(None);

pub fn cvar_init() {
    let mut g = CVAR_CTX.lock();
    if g.is_none() {
        *g = Some(CvarContext::new());
    }
}

/// Returns the cvar's current value, or None before `cvar_init`.
pub fn cvar_get(name: &str, value: &str, flags: i32) -> Option<f32> {
    with_cvar_ctx(|c| c.get(name, value, flags).value)
}

pub fn cvar_set(name: &str, value: &str) {
    with_cvar_ctx(|c| c.set(name, value));
}

pub fn cvar_variable_value(name: &str) -> f32 {
    CVAR_CTX.lock().as_ref().map_or(0.0, |c| c.variable_value(name))
}

/// Access the global context with a closure. Returns None if not initialized.
pub fn with_cvar_ctx<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&mut CvarContext) -> R,
{
    CVAR_CTX.lock().as_mut().map(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::q_shared::CVAR_ARCHIVE;

    #[test]
    fn test_cvar_get_and_find() {
        let mut ctx = CvarContext::new();
        assert_eq!(ctx.get("r_ragdolls", "1", CVAR_ARCHIVE).value, 1.0);
        let var = ctx.find_var("r_ragdolls").unwrap();
        assert_eq!(var.string, "1");
        assert_eq!(var.flags, CVAR_ARCHIVE);
    }

    #[test]
    fn test_cvar_get_keeps_value_and_merges_flags() {
        let mut ctx = CvarContext::new();
        ctx.get("r_nocull", "0", 0);
        let var = ctx.get("r_nocull", "1", CVAR_ARCHIVE);
        assert_eq!(var.value, 0.0);
        assert_eq!(var.flags, CVAR_ARCHIVE);
    }

    #[test]
    fn test_cvar_set() {
        let mut ctx = CvarContext::new();
        ctx.get("r_ragdoll_debug", "0", 0);
        ctx.set("r_ragdoll_debug", "1");
        assert_eq!(ctx.variable_value("r_ragdoll_debug"), 1.0);

        ctx.set("developer", "2");
        assert_eq!(ctx.variable_value("developer"), 2.0);
        ctx.set("developer", "junk");
        assert_eq!(ctx.variable_value("developer"), 0.0);
    }

    #[test]
    fn test_cvar_not_found() {
        let ctx = CvarContext::new();
        assert_eq!(ctx.variable_value("nonexistent"), 0.0);
        assert!(ctx.find_var("nonexistent").is_none());
    }
}
