//! The popup driver: a stateless transform from ranked items to the rows
//! handed to the editor's popup RPC. Ordering is the filter engine's
//! business; this module only drops, trims and decorates.

use std::collections::HashSet;

use codon_core::{CompleteOption, Config, Item, KeywordClass};

use crate::bridge::PumItem;
use crate::source::HIGH_PRIORITY;

/// The rendered popup: wire rows, the preselect index (-1 for none), and
/// whether number-select is in effect for this show.
#[derive(Debug, Default)]
pub struct PumView {
    pub rows: Vec<PumItem>,
    pub preselect: i32,
    pub number_select: bool,
}

/// Renders ranked `items` into popup rows under the current config.
/// Number-select prefixing runs last, after ranking and truncation.
pub fn render(
    items: &[Item],
    option: &CompleteOption,
    keyword: &KeywordClass,
    config: &Config,
) -> PumView {
    let follow_word: String = option
        .following()
        .chars()
        .take_while(|&ch| keyword.is_word(ch))
        .collect();

    let number_select =
        config.number_select && !option.input.chars().next().is_some_and(|ch| ch.is_ascii_digit());

    let mut seen: HashSet<String> = HashSet::new();
    let mut high_count = 0usize;
    let mut low_count = 0usize;
    let mut kept: Vec<(PumItem, bool)> = Vec::new();

    for item in items {
        if kept.len() >= config.max_item_count {
            break;
        }
        if item.word.is_empty() && !item.empty {
            continue;
        }
        if config.ascii_characters_only && !item.word.is_ascii() {
            continue;
        }
        if config.remove_duplicate_items && !item.dup && !seen.insert(item.word.clone()) {
            continue;
        }
        let (count, limit) = if item.priority >= HIGH_PRIORITY {
            (&mut high_count, config.high_priority_source_limit)
        } else {
            (&mut low_count, config.low_priority_source_limit)
        };
        if limit.is_some_and(|limit| *count >= limit) {
            continue;
        }
        *count += 1;

        let mut word = item.word.clone();
        if config.fix_inserted_word
            && !follow_word.is_empty()
            && word.len() > follow_word.len()
            && word.ends_with(follow_word.as_str())
        {
            word.truncate(word.len() - follow_word.len());
        }

        let mut abbr = if item.abbr.is_empty() {
            item.word.clone()
        } else {
            item.abbr.clone()
        };
        if item.snippet && !config.snippet_indicator.is_empty() {
            abbr.push_str(&config.snippet_indicator);
        }
        if abbr.chars().count() > config.label_max_length {
            abbr = abbr.chars().take(config.label_max_length).collect();
        }

        let mut menu = if config.disable_menu {
            String::new()
        } else {
            item.menu.clone()
        };
        if config.disable_menu_shortcut {
            menu = strip_menu_shortcut(&menu);
        }

        let kind = if config.disable_kind {
            String::new()
        } else {
            item.kind.clone()
        };

        kept.push((
            PumItem {
                word,
                abbr,
                menu,
                kind,
                info: item.info.clone(),
                dup: item.dup.into(),
                empty: item.empty.into(),
                icase: item.icase.into(),
                user_data: item.user_data.clone(),
            },
            item.preselect,
        ));
    }

    let preselect = if config.enable_preselect {
        kept.iter()
            .position(|(_, preselect)| *preselect)
            .map_or(-1, |idx| idx as i32)
    } else {
        -1
    };

    let mut rows: Vec<PumItem> = kept.into_iter().map(|(row, _)| row).collect();
    if number_select {
        for (idx, row) in rows.iter_mut().take(9).enumerate() {
            row.abbr = format!("{} {}", idx + 1, row.abbr);
        }
    }

    PumView {
        rows,
        preselect,
        number_select,
    }
}

/// Drops a trailing `[..]` shortcut from a menu string.
fn strip_menu_shortcut(menu: &str) -> String {
    let trimmed = menu.trim_end();
    if trimmed.ends_with(']') {
        if let Some(open) = trimmed.rfind('[') {
            return trimmed[..open].trim_end().to_string();
        }
    }
    menu.to_string()
}
