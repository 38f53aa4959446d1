//! Privilege escalation configuration.
//!
//! This module provides [`Sudo`], the elevation options applied to a single
//! command, and [`Privilege`], the manifest-level setting that can inherit
//! from the manifest defaults when a command does not specify its own.

use serde::Deserialize;

/// Program used for privilege escalation.
pub const SUDO_COMMAND: &str = "sudo";

/// `sudo` flag that keeps the caller's environment instead of resetting it.
pub const PRESERVE_ENV_FLAG: &str = "-E";

/// Options for running a command through `sudo`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sudo {
    /// Pass `-E` so the elevated command sees the caller's environment.
    #[serde(default)]
    pub preserve_env: bool,
}

impl Sudo {
    /// Returns the arguments that are prepended to the elevated command.
    pub fn prefix(&self) -> Vec<String> {
        let mut prefix = vec![SUDO_COMMAND.to_string()];
        if self.preserve_env {
            prefix.push(PRESERVE_ENV_FLAG.to_string());
        }
        prefix
    }
}

/// Privilege escalation setting for a manifest command.
///
/// This type supports the following YAML representations:
/// - Absent (field not specified) → `Inherit` (use defaults if available)
/// - `sudo: true` → `Enabled(Sudo::default())`
/// - `sudo: false` → `Disabled` (no privilege escalation, even if defaults enable it)
/// - `sudo: { preserve_env: true }` → `Enabled(Sudo { preserve_env: true })`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Privilege {
    /// YAML field not specified: inherit from defaults if available.
    #[default]
    Inherit,
    /// `sudo: false`: no privilege escalation.
    Disabled,
    /// `sudo: true` or `sudo: { ... }`: escalate with the given options.
    Enabled(Sudo),
}

impl Privilege {
    /// Resolves the setting against the manifest defaults.
    ///
    /// Returns `Some(sudo)` if privilege escalation should be applied,
    /// or `None` if the command runs unprivileged.
    pub fn resolve(&self, defaults: Option<Sudo>) -> Option<Sudo> {
        match self {
            Self::Inherit => defaults,
            Self::Disabled => None,
            Self::Enabled(sudo) => Some(*sudo),
        }
    }
}

impl<'de> Deserialize<'de> for Privilege {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;

        struct PrivilegeVisitor;

        impl<'de> de::Visitor<'de> for PrivilegeVisitor {
            type Value = Privilege;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a boolean or a map with a 'preserve_env' field")
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(Privilege::Inherit)
            }

            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if v {
                    Ok(Privilege::Enabled(Sudo::default()))
                } else {
                    Ok(Privilege::Disabled)
                }
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: de::MapAccess<'de>,
            {
                let sudo = Sudo::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(Privilege::Enabled(sudo))
            }
        }

        deserializer.deserialize_any(PrivilegeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sudo_prefix_without_preserve_env() {
        assert_eq!(Sudo::default().prefix(), vec!["sudo"]);
    }

    #[test]
    fn sudo_prefix_with_preserve_env() {
        let sudo = Sudo { preserve_env: true };
        assert_eq!(sudo.prefix(), vec!["sudo", "-E"]);
    }

    // =========================================================================
    // Privilege deserialization tests
    // =========================================================================

    #[test]
    fn privilege_deserialize_true() {
        let p: Privilege = serde_yaml::from_str("true").unwrap();
        assert_eq!(p, Privilege::Enabled(Sudo::default()));
    }

    #[test]
    fn privilege_deserialize_false() {
        let p: Privilege = serde_yaml::from_str("false").unwrap();
        assert_eq!(p, Privilege::Disabled);
    }

    #[test]
    fn privilege_deserialize_preserve_env() {
        let p: Privilege = serde_yaml::from_str("preserve_env: true").unwrap();
        assert_eq!(p, Privilege::Enabled(Sudo { preserve_env: true }));
    }

    #[test]
    fn privilege_deserialize_empty_map() {
        let p: Privilege = serde_yaml::from_str("{}").unwrap();
        assert_eq!(p, Privilege::Enabled(Sudo::default()));
    }

    #[test]
    fn privilege_deserialize_null_returns_inherit() {
        let p: Privilege = serde_yaml::from_str("~").unwrap();
        assert_eq!(p, Privilege::Inherit);
    }

    #[test]
    fn privilege_deserialize_unknown_field_rejected() {
        let result: Result<Privilege, _> = serde_yaml::from_str("preserve_env: true\nextra: bad");
        assert!(result.is_err());
    }

    #[test]
    fn privilege_rejects_plain_string() {
        let result: Result<Privilege, _> = serde_yaml::from_str("\"sudo\"");
        assert!(result.is_err(), "plain string should not be valid for Privilege");
    }

    #[test]
    fn privilege_rejects_numeric_value() {
        let result: Result<Privilege, _> = serde_yaml::from_str("42");
        assert!(result.is_err(), "numeric value should not be valid for Privilege");
    }

    #[test]
    fn privilege_default_is_inherit() {
        assert_eq!(Privilege::default(), Privilege::Inherit);
    }

    // =========================================================================
    // Privilege::resolve tests
    // =========================================================================

    #[test]
    fn resolve_inherit_with_defaults() {
        let defaults = Sudo { preserve_env: true };
        assert_eq!(Privilege::Inherit.resolve(Some(defaults)), Some(defaults));
    }

    #[test]
    fn resolve_inherit_without_defaults() {
        assert_eq!(Privilege::Inherit.resolve(None), None);
    }

    #[test]
    fn resolve_disabled_overrides_defaults() {
        assert_eq!(Privilege::Disabled.resolve(Some(Sudo::default())), None);
    }

    #[test]
    fn resolve_enabled_overrides_defaults() {
        let defaults = Sudo { preserve_env: true };
        let own = Sudo { preserve_env: false };
        assert_eq!(Privilege::Enabled(own).resolve(Some(defaults)), Some(own));
    }
}
