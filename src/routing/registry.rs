//! Category registry: ordered prefix → lookup target table.

use std::path::PathBuf;

use crate::config::LaunchConfig;
use crate::error::RegistryError;

pub const PREFIX_SERIE: &str = "serie:";
pub const PREFIX_PELI: &str = "peli:";
pub const PREFIX_LIBRO: &str = "libro:";
pub const PREFIX_JUEGO: &str = "juego:";

/// The external process a category hands its item name to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    /// Interpreter or executable.
    pub program: String,
    /// Script passed as the first positional argument.
    pub script: PathBuf,
}

impl LaunchTarget {
    pub fn new(program: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
        }
    }
}

/// One prefix category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    /// Prefix as typed by users, e.g. `serie:`. Matched case-insensitively.
    pub prefix: String,
    /// Human-facing label used in replies, e.g. `Serie`.
    pub item_type: String,
    pub target: LaunchTarget,
}

impl CategoryRule {
    pub fn new(prefix: impl Into<String>, item_type: impl Into<String>, target: LaunchTarget) -> Self {
        Self {
            prefix: prefix.into(),
            item_type: item_type.into(),
            target,
        }
    }
}

/// Ordered, read-only-after-startup list of category rules.
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    rules: Vec<CategoryRule>,
}

impl CategoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The four stock categories, wired to the configured scripts.
    pub fn with_default_categories(launch: &LaunchConfig) -> Self {
        let target = |script: &PathBuf| LaunchTarget::new(launch.program.clone(), script.clone());
        Self {
            rules: vec![
                CategoryRule::new(PREFIX_SERIE, "Serie", target(&launch.serie_script)),
                CategoryRule::new(PREFIX_PELI, "Película", target(&launch.pelicula_script)),
                CategoryRule::new(PREFIX_LIBRO, "Libro", target(&launch.libro_script)),
                CategoryRule::new(PREFIX_JUEGO, "Juego", target(&launch.juego_script)),
            ],
        }
    }

    /// Append a rule. Prefixes must be non-empty and unique ignoring case.
    pub fn register(&mut self, rule: CategoryRule) -> Result<(), RegistryError> {
        if rule.prefix.is_empty() {
            return Err(RegistryError::EmptyPrefix);
        }
        let folded = rule.prefix.to_lowercase();
        if self.rules.iter().any(|r| r.prefix.to_lowercase() == folded) {
            return Err(RegistryError::DuplicatePrefix(rule.prefix));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// First rule, in registration order, whose prefix `text` starts with.
    pub fn lookup(&self, text: &str) -> Option<&CategoryRule> {
        self.match_prefix(text).map(|(rule, _)| rule)
    }

    /// Like [`lookup`](Self::lookup), also returning the text after the
    /// prefix with its original casing.
    pub fn match_prefix<'t>(&self, text: &'t str) -> Option<(&CategoryRule, &'t str)> {
        self.rules.iter().find_map(|rule| {
            strip_prefix_ignore_case(text, &rule.prefix).map(|rest| (rule, rest))
        })
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Strip `prefix` from `text` comparing lowercased characters.
pub fn strip_prefix_ignore_case<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let mut chars = text.char_indices();
    let mut end = 0;
    for p in prefix.chars() {
        let (idx, c) = chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
        end = idx + c.len_utf8();
    }
    Some(&text[end..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CategoryRegistry {
        CategoryRegistry::with_default_categories(&LaunchConfig::default())
    }

    #[test]
    fn default_registry_order() {
        let binding = registry();
        let prefixes: Vec<&str> = binding.rules().iter().map(|r| r.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["serie:", "peli:", "libro:", "juego:"]);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = registry();
        assert_eq!(reg.lookup("SERIE: Dark").unwrap().item_type, "Serie");
        assert_eq!(reg.lookup("Peli:Dune").unwrap().item_type, "Película");
        assert_eq!(reg.lookup("libro:").unwrap().item_type, "Libro");
        assert_eq!(reg.lookup("jUeGo: Celeste").unwrap().item_type, "Juego");
    }

    #[test]
    fn lookup_requires_prefix_at_start() {
        let reg = registry();
        assert!(reg.lookup("quiero la serie: Dark").is_none());
        assert!(reg.lookup("serie Dark").is_none());
        assert!(reg.lookup("").is_none());
        assert!(reg.lookup("peli").is_none());
    }

    #[test]
    fn match_prefix_preserves_remainder_casing() {
        let reg = registry();
        let (rule, rest) = reg.match_prefix("PELI: The Dark Knight").unwrap();
        assert_eq!(rule.prefix, "peli:");
        assert_eq!(rest, " The Dark Knight");
    }

    #[test]
    fn first_registered_wins_on_overlap() {
        let mut reg = CategoryRegistry::new();
        reg.register(CategoryRule::new("pe", "Corto", LaunchTarget::new("sh", "a.sh")))
            .unwrap();
        reg.register(CategoryRule::new("peli:", "Película", LaunchTarget::new("sh", "b.sh")))
            .unwrap();
        assert_eq!(reg.lookup("peli: Dune").unwrap().item_type, "Corto");
    }

    #[test]
    fn duplicate_prefix_rejected_ignoring_case() {
        let mut reg = registry();
        let err = reg
            .register(CategoryRule::new("SERIE:", "Otra", LaunchTarget::new("sh", "x.sh")))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicatePrefix(ref p) if p == "SERIE:"));
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn empty_prefix_rejected() {
        let mut reg = CategoryRegistry::new();
        assert!(matches!(
            reg.register(CategoryRule::new("", "Nada", LaunchTarget::new("sh", "x.sh"))),
            Err(RegistryError::EmptyPrefix)
        ));
        assert!(reg.is_empty());
    }

    #[test]
    fn strip_handles_multibyte_text() {
        assert_eq!(strip_prefix_ignore_case("ÉL: ñandú", "él:"), Some(" ñandú"));
        assert_eq!(strip_prefix_ignore_case("ñ", "ña"), None);
    }

    #[test]
    fn targets_follow_launch_config() {
        let config = LaunchConfig {
            program: "/usr/bin/python3".to_string(),
            serie_script: PathBuf::from("/opt/lookup/serie.py"),
            ..LaunchConfig::default()
        };
        let reg = CategoryRegistry::with_default_categories(&config);
        let serie = reg.lookup("serie:x").unwrap();
        assert_eq!(serie.target.program, "/usr/bin/python3");
        assert_eq!(serie.target.script, PathBuf::from("/opt/lookup/serie.py"));
    }
}
