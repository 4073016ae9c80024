use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PRESET_NAME_LEN: usize = 64;

pub const TRANSLATE_PROMPT: &str = "Translate the user's text. If it is written in Japanese, \
translate it into natural English; otherwise translate it into natural Japanese. Reply with the \
translation only.";
pub const COMPLETE_PROMPT: &str = "Continue the user's text in the same language, tone and \
format. Reply with the continuation only.";
pub const SUMMARIZE_PROMPT: &str = "Summarize the user's text concisely in the language it is \
written in. Keep the key facts and drop filler.";
pub const PROOFREAD_PROMPT: &str = "Proofread the user's text. Fix spelling, grammar and \
awkward phrasing while keeping its meaning and language. Reply with the corrected text only.";
pub const EXPLAIN_PROMPT: &str = "Explain the user's text in plain language, step by step if it \
is technical. Answer in the language of the text.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    pub system_prompt: String,
}

impl Preset {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

pub fn builtin_presets() -> Vec<Preset> {
    vec![
        Preset::new("Translate", TRANSLATE_PROMPT),
        Preset::new("Complete", COMPLETE_PROMPT),
        Preset::new("Summarize", SUMMARIZE_PROMPT),
        Preset::new("Proofread", PROOFREAD_PROMPT),
        Preset::new("Explain", EXPLAIN_PROMPT),
    ]
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PresetError {
    #[error("preset name is required")]
    EmptyName,
    #[error("preset name is too long ({0} > 64 chars)")]
    NameTooLong(usize),
    #[error("a preset named \"{0}\" already exists")]
    DuplicateName(String),
    #[error("no preset named \"{0}\"")]
    NotFound(String),
    #[error("built-in preset \"{0}\" cannot be removed")]
    BuiltIn(String),
}

/// Built-in presets followed by user-added ones, in insertion order.
///
/// Names are unique ignoring case and surrounding whitespace.
#[derive(Debug, Clone)]
pub struct PresetBook {
    presets: Vec<Preset>,
    builtin_count: usize,
}

impl Default for PresetBook {
    fn default() -> Self {
        let presets = builtin_presets();
        Self {
            builtin_count: presets.len(),
            presets,
        }
    }
}

impl PresetBook {
    /// Builds the book from persisted custom presets. Entries that collide with an existing name
    /// or are unnamed are skipped.
    pub fn with_custom(custom: &[Preset]) -> Self {
        let mut book = Self::default();
        for preset in custom {
            if let Err(err) = book.add(preset.clone()) {
                tracing::warn!(name = %preset.name, "skipping saved preset: {err}");
            }
        }
        book
    }

    pub fn add(&mut self, preset: Preset) -> Result<(), PresetError> {
        let name = preset.name.trim();
        if name.is_empty() {
            return Err(PresetError::EmptyName);
        }
        if name.chars().count() > MAX_PRESET_NAME_LEN {
            return Err(PresetError::NameTooLong(name.chars().count()));
        }
        if self.position(name).is_some() {
            return Err(PresetError::DuplicateName(name.to_owned()));
        }

        self.presets.push(Preset {
            name: name.to_owned(),
            system_prompt: preset.system_prompt,
        });
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Preset, PresetError> {
        let index = self
            .position(name)
            .ok_or_else(|| PresetError::NotFound(name.trim().to_owned()))?;
        if index < self.builtin_count {
            return Err(PresetError::BuiltIn(self.presets[index].name.clone()));
        }
        Ok(self.presets.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Preset> {
        self.position(name).map(|index| &self.presets[index])
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.position(name)
            .is_some_and(|index| index < self.builtin_count)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter()
    }

    pub fn custom(&self) -> &[Preset] {
        &self.presets[self.builtin_count..]
    }

    fn position(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.presets
            .iter()
            .position(|p| p.name.to_lowercase() == wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_come_first_in_fixed_order() {
        let book = PresetBook::default();
        let names: Vec<&str> = book.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            ["Translate", "Complete", "Summarize", "Proofread", "Explain"]
        );
        assert!(book.custom().is_empty());
    }

    #[test]
    fn custom_presets_keep_insertion_order() {
        let mut book = PresetBook::default();
        book.add(Preset::new("Zeta", "z")).expect("add zeta");
        book.add(Preset::new("Alpha", "a")).expect("add alpha");

        let custom: Vec<&str> = book.custom().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(custom, ["Zeta", "Alpha"]);
    }

    #[test]
    fn duplicate_names_are_rejected_ignoring_case() {
        let mut book = PresetBook::default();
        let err = book
            .add(Preset::new("  translate ", "other"))
            .expect_err("duplicate of builtin");
        assert_eq!(err, PresetError::DuplicateName("translate".to_owned()));

        book.add(Preset::new("Mine", "x")).expect("add");
        assert!(book.add(Preset::new("MINE", "y")).is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut book = PresetBook::default();
        assert_eq!(
            book.add(Preset::new("   ", "x")),
            Err(PresetError::EmptyName)
        );
    }

    #[test]
    fn builtins_cannot_be_removed_but_custom_can() {
        let mut book = PresetBook::default();
        assert!(matches!(
            book.remove("Explain"),
            Err(PresetError::BuiltIn(_))
        ));

        book.add(Preset::new("Haiku", "Reply in haiku.")).expect("add");
        let removed = book.remove("haiku").expect("remove custom");
        assert_eq!(removed.system_prompt, "Reply in haiku.");
        assert!(book.get("Haiku").is_none());
    }

    #[test]
    fn with_custom_skips_collisions() {
        let book = PresetBook::with_custom(&[
            Preset::new("Summarize", "shadow"),
            Preset::new("Tone", "Make it friendlier."),
            Preset::new("tone", "dup"),
        ]);
        assert_eq!(book.custom().len(), 1);
        assert_eq!(
            book.get("Summarize").map(|p| p.system_prompt.as_str()),
            Some(SUMMARIZE_PROMPT)
        );
    }
}
