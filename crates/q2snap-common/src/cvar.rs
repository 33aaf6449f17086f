// cvar.rs — dynamic variable tracking

use std::collections::HashMap;

use crate::common::com_printf;

pub const CVAR_ARCHIVE: i32 = 1; // set to cause it to be saved to vars.rc
pub const CVAR_NOSET: i32 = 8; // don't allow change from console at all

/// A console variable.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub default_string: String,
    pub flags: i32,
    pub modified: bool,
    pub value: f32,
}

/// The cvar store. Owned by whoever needs configuration; there is no
/// process-wide instance.
#[derive(Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    /// O(1) cvar lookup by name -> index in cvar_vars
    cvar_index: HashMap<String, usize>,
}

fn parse_value(s: &str) -> f32 {
    s.trim().parse::<f32>().unwrap_or(0.0)
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Get the floating-point value of a cvar. Returns 0 if not found.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Get the string value of a cvar. Returns "" if not found.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a cvar. If it already exists, the value is not changed
    /// but flags are OR'd in.
    pub fn get(&mut self, name: &str, value: &str, flags: i32) -> &Cvar {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => {
                self.cvar_vars[idx].flags |= flags;
                idx
            }
            None => {
                let idx = self.cvar_vars.len();
                self.cvar_vars.push(Cvar {
                    name: name.to_string(),
                    string: value.to_string(),
                    default_string: value.to_string(),
                    flags,
                    modified: true,
                    value: parse_value(value),
                });
                self.cvar_index.insert(name.to_string(), idx);
                idx
            }
        };
        &self.cvar_vars[idx]
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => idx,
            None => {
                self.get(name, value, 0);
                return;
            }
        };

        let var = &mut self.cvar_vars[idx];
        if !force && var.flags & CVAR_NOSET != 0 {
            com_printf(&format!("{} is write protected.\n", name));
            return;
        }

        if var.string == value {
            return;
        }

        var.modified = true;
        var.string = value.to_string();
        var.value = parse_value(value);
    }

    pub fn set(&mut self, name: &str, value: &str) {
        self.set2(name, value, false);
    }

    pub fn force_set(&mut self, name: &str, value: &str) {
        self.set2(name, value, true);
    }

    pub fn set_value(&mut self, name: &str, value: f32) {
        let s = if value == value.trunc() {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &s);
    }

    /// Returns the modified flag and clears it.
    pub fn take_modified(&mut self, name: &str) -> bool {
        match self.cvar_index.get(name) {
            Some(&idx) => std::mem::replace(&mut self.cvar_vars[idx].modified, false),
            None => false,
        }
    }
}
