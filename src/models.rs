use phf::phf_map;
use serde::Serialize;

use crate::utils::warn_once;

/// Display metadata for one hosted model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelMeta {
    pub display_name: &'static str,
    pub provider: &'static str,
}

/// The models a comparison can be fanned out to. Ids match what the
/// completion provider accepts; display names are what the dashboard shows.
static MODEL_CATALOG: phf::Map<&'static str, ModelMeta> = phf_map! {
    "gpt-4o" => ModelMeta {
        display_name: "GPT-4o",
        provider: "OpenAI",
    },
    "gpt-4o-mini" => ModelMeta {
        display_name: "GPT-4o mini",
        provider: "OpenAI",
    },
    "o3-mini" => ModelMeta {
        display_name: "o3-mini",
        provider: "OpenAI",
    },
    "claude-sonnet-4" => ModelMeta {
        display_name: "Claude Sonnet 4",
        provider: "Anthropic",
    },
    "claude-3-5-haiku" => ModelMeta {
        display_name: "Claude 3.5 Haiku",
        provider: "Anthropic",
    },
    "gemini-2.0-flash" => ModelMeta {
        display_name: "Gemini 2.0 Flash",
        provider: "Google",
    },
    "gemini-1.5-pro" => ModelMeta {
        display_name: "Gemini 1.5 Pro",
        provider: "Google",
    },
    "llama-3.3-70b" => ModelMeta {
        display_name: "Llama 3.3 70B",
        provider: "Meta",
    },
    "mistral-large" => ModelMeta {
        display_name: "Mistral Large",
        provider: "Mistral",
    },
    "deepseek-v3" => ModelMeta {
        display_name: "DeepSeek V3",
        provider: "DeepSeek",
    },
    "grok-2" => ModelMeta {
        display_name: "Grok 2",
        provider: "xAI",
    },
    "qwen-2.5-72b" => ModelMeta {
        display_name: "Qwen 2.5 72B",
        provider: "Alibaba",
    },
};

/// Chart series colors, assigned to models in first-seen order. Ten entries,
/// of which the last repeats the first: nine distinct colors before
/// wrap-around. Downstream index arithmetic assumes length 10.
pub const CHART_PALETTE: [&str; 10] = [
    "#6366f1", "#8b5cf6", "#ec4899", "#f59e0b", "#10b981", "#3b82f6", "#ef4444", "#14b8a6",
    "#f97316", "#6366f1",
];

/// Human-readable label for a model id. Unknown ids fall back to the raw id,
/// warned once per id.
pub fn display_name(id: &str) -> String {
    match MODEL_CATALOG.get(id) {
        Some(meta) => meta.display_name.to_string(),
        None => {
            warn_once(format!("⚠️  Unknown model id: {id}"));
            id.to_string()
        }
    }
}

/// Catalog entries sorted by id, for `fiesta models` and validation output.
pub fn catalog_entries() -> Vec<(&'static str, &'static ModelMeta)> {
    let mut entries: Vec<_> = MODEL_CATALOG.entries().map(|(k, v)| (*k, v)).collect();
    entries.sort_by_key(|(id, _)| *id);
    entries
}

pub fn is_known_model(id: &str) -> bool {
    MODEL_CATALOG.contains_key(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_known_and_unknown() {
        assert_eq!(display_name("gpt-4o"), "GPT-4o");
        assert_eq!(display_name("not-a-model"), "not-a-model");
    }

    #[test]
    fn palette_has_ten_entries_nine_distinct() {
        assert_eq!(CHART_PALETTE.len(), 10);
        let distinct: std::collections::HashSet<_> = CHART_PALETTE.iter().collect();
        assert_eq!(distinct.len(), 9);
    }

    #[test]
    fn catalog_entries_sorted() {
        let entries = catalog_entries();
        assert!(!entries.is_empty());
        assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(is_known_model(entries[0].0));
    }
}
