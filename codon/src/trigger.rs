//! The trigger policy: whether a cursor prefix should start a session.

use std::sync::Arc;

use codon_core::{AutoTrigger, Config, KeywordClass};

use crate::source::Source;

/// Decides whether completion should start for the prefix `pre`.
///
/// The decision is a pure function of its inputs: the prefix, the buffer's
/// filetype and keyword table, the live config, whether a session is
/// already active, and the trigger sets of the registered sources.
pub fn should_trigger(
    pre: &str,
    filetype: &str,
    keyword: &KeywordClass,
    config: &Config,
    sources: &[Arc<dyn Source>],
    activated: bool,
) -> bool {
    let Some(last) = pre.chars().last() else {
        return false;
    };
    if last.is_whitespace() {
        return false;
    }
    if config.auto_trigger == AutoTrigger::None {
        return false;
    }
    if sources
        .iter()
        .any(|source| source.triggers(filetype).matches(pre))
    {
        return true;
    }
    if config.auto_trigger != AutoTrigger::Always || activated {
        return false;
    }
    // the implicit "typing a word" rule, using the buffer's own word class
    if !keyword.is_word(last) {
        return false;
    }
    let input = keyword.word_suffix(pre);
    input.chars().count() >= config.min_trigger_input_length
}

#[cfg(test)]
mod tests {
    use futures_util::future::BoxFuture;
    use quickcheck::QuickCheck;

    use crate::source::{CompleteRequest, SourceResponse, Triggers};

    use super::*;

    struct DotSource;

    impl Source for DotSource {
        fn name(&self) -> &str {
            "dot"
        }

        fn triggers(&self, filetype: &str) -> Triggers {
            if filetype == "rust" {
                Triggers::characters(["."])
            } else {
                Triggers::none()
            }
        }

        fn do_complete(
            &self,
            _request: CompleteRequest,
        ) -> BoxFuture<'static, anyhow::Result<SourceResponse>> {
            Box::pin(async { Ok(SourceResponse::default()) })
        }
    }

    fn sources() -> Vec<Arc<dyn Source>> {
        vec![Arc::new(DotSource)]
    }

    fn keyword() -> KeywordClass {
        KeywordClass::standard()
    }

    #[test]
    fn empty_or_whitespace_prefix_never_triggers() {
        let config = Config::default();
        assert!(!should_trigger("", "rust", &keyword(), &config, &sources(), false));
        assert!(!should_trigger("foo ", "rust", &keyword(), &config, &sources(), false));
        assert!(!should_trigger("\t", "rust", &keyword(), &config, &sources(), false));
    }

    #[test]
    fn auto_trigger_none_disables_everything() {
        let config = Config {
            auto_trigger: AutoTrigger::None,
            ..Config::default()
        };
        assert!(!should_trigger("foo.", "rust", &keyword(), &config, &sources(), false));
        assert!(!should_trigger("fo", "rust", &keyword(), &config, &sources(), false));
    }

    #[test]
    fn source_trigger_wins_even_when_active() {
        let config = Config::default();
        assert!(should_trigger("foo.", "rust", &keyword(), &config, &sources(), true));
        // but only for the filetype the source triggers in
        assert!(!should_trigger("foo.", "python", &keyword(), &config, &sources(), true));
    }

    #[test]
    fn word_rule_respects_min_length_and_activation() {
        let config = Config {
            min_trigger_input_length: 2,
            ..Config::default()
        };
        assert!(!should_trigger("f", "rust", &keyword(), &config, &sources(), false));
        assert!(should_trigger("fo", "rust", &keyword(), &config, &sources(), false));
        // an active session re-filters instead of re-triggering
        assert!(!should_trigger("fo", "rust", &keyword(), &config, &sources(), true));
    }

    #[test]
    fn word_rule_needs_always_mode() {
        let config = Config {
            auto_trigger: AutoTrigger::Trigger,
            ..Config::default()
        };
        assert!(!should_trigger("fo", "rust", &keyword(), &config, &sources(), false));
        assert!(should_trigger("foo.", "rust", &keyword(), &config, &sources(), false));
    }

    #[test]
    fn multibyte_tail_counts_as_word() {
        let config = Config::default();
        assert!(should_trigger("日", "rust", &keyword(), &config, &sources(), false));
    }

    #[test]
    fn non_word_tail_does_not_trigger() {
        let config = Config::default();
        assert!(!should_trigger("foo(", "rust", &keyword(), &config, &sources(), false));
    }

    #[test]
    fn deterministic_over_arbitrary_prefixes() {
        fn prop(pre: String, activated: bool, min_len: u8) -> bool {
            let config = Config {
                min_trigger_input_length: min_len as usize % 4,
                ..Config::default()
            };
            let keyword = KeywordClass::standard();
            let sources = sources();
            let first = should_trigger(&pre, "rust", &keyword, &config, &sources, activated);
            let second = should_trigger(&pre, "rust", &keyword, &config, &sources, activated);
            first == second
        }
        QuickCheck::new()
            .tests(300)
            .quickcheck(prop as fn(String, bool, u8) -> bool);
    }
}
