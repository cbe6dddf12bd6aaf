//! Elaboration settings.
//!
//! Defaults suit ordinary use. A few can be overridden from the
//! environment for debugging:
//!
//! - `URD_NO_GENERALIZE`: when set, declarations are not generalized and
//!   unsolved metavariables are reported instead.
//! - `URD_MAX_INSTANCE_DEPTH`: bound on nested instance premises.

/// Knobs for one elaboration run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ElabConfig {
    /// Quantify over metavariables left in a declaration's type.
    pub generalize: bool,
    /// Default unresolved kind metavariables at the end of each group.
    pub default_kinds: bool,
    /// Upper bound on forcing rounds at a generalization boundary.
    pub max_wake_rounds: u32,
    /// Upper bound on nested instance premises during resolution.
    pub max_instance_depth: u32,
}

impl Default for ElabConfig {
    fn default() -> Self {
        Self {
            generalize: true,
            default_kinds: true,
            max_wake_rounds: 64,
            max_instance_depth: 32,
        }
    }
}

impl ElabConfig {
    /// Defaults, overridden by `URD_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if lookup("URD_NO_GENERALIZE").is_some() {
            config.generalize = false;
        }
        if let Some(raw) = lookup("URD_MAX_INSTANCE_DEPTH") {
            match raw.trim().parse::<u32>() {
                Ok(depth) => config.max_instance_depth = depth,
                Err(err) => {
                    tracing::warn!(%raw, %err, "ignoring invalid URD_MAX_INSTANCE_DEPTH");
                }
            }
        }
        config
    }
}

#[cfg(test)]
mod tests;
