use std::collections::HashMap;

/// In-memory repository configuration.
///
/// The config file parser is an external collaborator; this core only
/// consumes boolean lookups (notably `core.filemode`), so the facade keeps
/// a plain map that callers populate.
#[derive(Clone, Default)]
pub struct Config {
    values: HashMap<ConfigKey, bool>,
}

type ConfigKey = (String, Option<String>, String);

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a boolean value, falling back to `default` when unset.
    ///
    /// Section and name match case-insensitively; the subsection is
    /// matched verbatim, as git does.
    pub fn get_bool(
        &self,
        section: &str,
        subsection: Option<&str>,
        name: &str,
        default: bool,
    ) -> bool {
        self.values
            .get(&Self::key(section, subsection, name))
            .copied()
            .unwrap_or(default)
    }

    /// Set a boolean value.
    pub fn set_bool(&mut self, section: &str, subsection: Option<&str>, name: &str, value: bool) {
        self.values
            .insert(Self::key(section, subsection, name), value);
    }

    fn key(section: &str, subsection: Option<&str>, name: &str) -> ConfigKey {
        (
            section.to_ascii_lowercase(),
            subsection.map(str::to_owned),
            name.to_ascii_lowercase(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_when_unset() {
        let config = Config::new();
        assert!(config.get_bool("core", None, "filemode", true));
        assert!(!config.get_bool("core", None, "filemode", false));
    }

    #[test]
    fn set_and_get() {
        let mut config = Config::new();
        config.set_bool("core", None, "filemode", false);
        assert!(!config.get_bool("core", None, "filemode", true));
    }

    #[test]
    fn section_and_name_case_insensitive() {
        let mut config = Config::new();
        config.set_bool("Core", None, "FileMode", false);
        assert!(!config.get_bool("core", None, "filemode", true));
    }

    #[test]
    fn subsection_is_verbatim() {
        let mut config = Config::new();
        config.set_bool("branch", Some("Main"), "rebase", true);
        assert!(config.get_bool("branch", Some("Main"), "rebase", false));
        assert!(!config.get_bool("branch", Some("main"), "rebase", false));
    }
}
