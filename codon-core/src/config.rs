use serde::Deserialize;

/// When automatic completion sessions may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoTrigger {
    /// Trigger on word characters and on source trigger patterns.
    #[default]
    Always,
    /// Only trigger on source trigger patterns and characters.
    Trigger,
    /// Never trigger automatically.
    None,
}

/// Tie-break ordering applied after match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    Alphabetical,
    #[default]
    Length,
    None,
}

/// Engine configuration. Every field has a default so a partial (or empty)
/// config file deserializes; the struct is swapped wholesale on config
/// change without restarting a live session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub auto_trigger: AutoTrigger,
    pub min_trigger_input_length: usize,
    pub accept_suggestion_on_commit_character: bool,
    pub noselect: bool,
    pub number_select: bool,
    pub keep_completeopt: bool,
    pub enable_preview: bool,
    pub enable_preselect: bool,
    pub label_max_length: usize,
    pub max_item_count: usize,
    pub disable_kind: bool,
    pub disable_menu: bool,
    pub disable_menu_shortcut: bool,
    pub remove_duplicate_items: bool,
    pub locality_bonus: bool,
    pub default_sort_method: SortMethod,
    pub trigger_after_insert_enter: bool,
    /// Per-source completion timeout in milliseconds.
    pub timeout: u64,
    pub high_priority_source_limit: Option<usize>,
    pub low_priority_source_limit: Option<usize>,
    pub ascii_characters_only: bool,
    pub snippet_indicator: String,
    pub fix_inserted_word: bool,
    /// `iskeyword` value applied to the documentation float.
    pub preview_is_keyword: String,
    /// Settle delay in milliseconds between a commit and the post-accept
    /// round-trip, long enough to swallow the editor's own late change
    /// event.
    pub post_commit_wait: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            auto_trigger: AutoTrigger::Always,
            min_trigger_input_length: 1,
            accept_suggestion_on_commit_character: false,
            noselect: true,
            number_select: false,
            keep_completeopt: false,
            enable_preview: false,
            enable_preselect: false,
            label_max_length: 200,
            max_item_count: 50,
            disable_kind: false,
            disable_menu: false,
            disable_menu_shortcut: false,
            remove_duplicate_items: false,
            locality_bonus: true,
            default_sort_method: SortMethod::Length,
            trigger_after_insert_enter: false,
            timeout: 500,
            high_priority_source_limit: None,
            low_priority_source_limit: None,
            ascii_characters_only: false,
            snippet_indicator: "~".into(),
            fix_inserted_word: true,
            preview_is_keyword: "@,48-57,_192-255".into(),
            post_commit_wait: 50,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(text)
    }

    /// The `completeopt` value pushed while a session is live.
    pub fn completeopt(&self) -> String {
        let select = if self.noselect { "noselect" } else { "noinsert" };
        let preview = if self.enable_preview { ",preview" } else { "" };
        format!("{select},menuone{preview}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_parses_to_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parsing_partial_config_file() {
        let sample = r#"
            auto-trigger = "trigger"
            min-trigger-input-length = 2
            number-select = true
            default-sort-method = "alphabetical"
            timeout = 200
        "#;
        let config = Config::from_toml(sample).unwrap();
        assert_eq!(config.auto_trigger, AutoTrigger::Trigger);
        assert_eq!(config.min_trigger_input_length, 2);
        assert!(config.number_select);
        assert_eq!(config.default_sort_method, SortMethod::Alphabetical);
        assert_eq!(config.timeout, 200);
        // untouched fields keep their defaults
        assert_eq!(config.max_item_count, 50);
    }

    #[test]
    fn completeopt_composition() {
        let mut config = Config::default();
        assert_eq!(config.completeopt(), "noselect,menuone");
        config.noselect = false;
        config.enable_preview = true;
        assert_eq!(config.completeopt(), "noinsert,menuone,preview");
    }
}
