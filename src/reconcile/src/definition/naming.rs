//! Deterministic role naming

use apim_access_core::PrincipalKind;

/// Default prefix of every synthesized role name
pub const DEFAULT_PREFIX: &str = "APIM";

/// Derives role names from `(kind, display name, resource name)`
///
/// The name is the only key used to find a previously synthesized role, so
/// derivation must stay a pure function of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleNamer {
    prefix: String,
}

impl RoleNamer {
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = normalize(&prefix.into());
        Self {
            prefix: if prefix.is_empty() {
                DEFAULT_PREFIX.to_string()
            } else {
                prefix.to_uppercase()
            },
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `{prefix}-{Kind}-{display}-{resource}`, with empty segments left out
    pub fn derive(&self, kind: PrincipalKind, display_name: &str, resource_name: &str) -> String {
        let display = normalize(display_name);
        let resource = normalize(resource_name);
        [self.prefix.as_str(), kind.label(), display.as_str(), resource.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl Default for RoleNamer {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

/// Lowercase, keep `[a-z0-9._-]`, map everything else to `-`, collapse
/// dash runs and trim dashes at both ends
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        let ch = if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            ch
        } else {
            '-'
        };
        if ch == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(ch);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Alice@Contoso.com"), "alice-contoso.com");
        assert_eq!(normalize("  API  Editors (EU) "), "api-editors-eu");
        assert_eq!(normalize("--a//b--"), "a-b");
        assert_eq!(normalize("Ünïcode"), "n-code");
        assert_eq!(normalize("@@@"), "");
    }

    #[test]
    fn test_derive_includes_confirmed_kind() {
        let namer = RoleNamer::default();
        assert_eq!(
            namer.derive(PrincipalKind::User, "alice@contoso.com", "contoso-apim"),
            "APIM-User-alice-contoso.com-contoso-apim"
        );
        assert_eq!(
            namer.derive(PrincipalKind::Group, "alice@contoso.com", "contoso-apim"),
            "APIM-Group-alice-contoso.com-contoso-apim"
        );
    }

    #[test]
    fn test_empty_segments_are_left_out() {
        let namer = RoleNamer::new("apim access");
        assert_eq!(namer.prefix(), "APIM-ACCESS");
        assert_eq!(namer.derive(PrincipalKind::Group, "@@", "svc"), "APIM-ACCESS-Group-svc");
        assert_eq!(RoleNamer::new("***").prefix(), DEFAULT_PREFIX);
    }
}
