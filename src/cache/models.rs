//! Model catalogue and caching capabilities.

// Author: kelexine (https://github.com/kelexine)

use phf::phf_map;

/// Models offered by the interactive model picker, with a short note.
pub static MODEL_CATALOG: phf::Map<&'static str, &'static str> = phf_map! {
    "models/gemini-2.0-flash-001" => "explicit caching (versioned)",
    "models/gemini-1.5-pro-001" => "explicit caching (versioned)",
    "models/gemini-2.5-flash" => "implicit caching enabled",
    "models/gemini-2.5-pro" => "implicit caching enabled",
};

/// Catalogue order for pickers (phf maps are unordered).
pub const CATALOG_ORDER: [&str; 4] = [
    "models/gemini-2.0-flash-001",
    "models/gemini-1.5-pro-001",
    "models/gemini-2.5-flash",
    "models/gemini-2.5-pro",
];

/// Normalize a model id to the `models/` resource form.
pub fn normalize_model(model: &str) -> String {
    let model = model.trim();
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// What a model supports, derived from its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelProfile {
    /// Id carries an explicit version suffix such as `-001`.
    pub explicit_versioned: bool,
    /// Provider applies implicit prefix caching automatically (2.5 and later).
    pub implicit_caching: bool,
}

impl ModelProfile {
    pub fn for_model(model_id: &str) -> Self {
        let id = model_id.to_ascii_lowercase();
        Self {
            explicit_versioned: has_version_suffix(&id),
            implicit_caching: is_implicit_family(&id),
        }
    }

    /// Warning to show before explicit cache creation, if any.
    pub fn explicit_warning(&self, model_id: &str) -> Option<String> {
        if self.explicit_versioned || self.implicit_caching {
            return None;
        }
        Some(format!(
            "'{}' has no explicit version suffix. Explicit caching needs a versioned model, \
             e.g. 'models/gemini-2.0-flash-001' (not '-latest').",
            model_id
        ))
    }

    /// Warning to show before implicit-mode queries, if any.
    pub fn implicit_warning(&self, model_id: &str) -> Option<String> {
        if self.implicit_caching {
            return None;
        }
        Some(format!(
            "Implicit caching is automatically enabled on Gemini 2.5 models; '{}' may not reuse \
             prompt prefixes. Consider switching to a 2.5 model.",
            model_id
        ))
    }
}

fn has_version_suffix(id: &str) -> bool {
    id.rsplit('-')
        .next()
        .map(|tail| tail.len() == 3 && tail.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

fn is_implicit_family(id: &str) -> bool {
    let name = id.trim_start_matches("models/");
    let Some(version) = name
        .strip_prefix("gemini-")
        .and_then(|rest| rest.split('-').next())
    else {
        return false;
    };

    let mut nums = version.split('.').map(|n| n.parse::<u32>().ok());
    match (nums.next().flatten(), nums.next().flatten()) {
        (Some(major), Some(minor)) => major > 2 || (major == 2 && minor >= 5),
        (Some(major), None) => major > 2,
        _ => false,
    }
}
