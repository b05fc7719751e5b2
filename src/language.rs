use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// The closed set of languages the application stores content in.
///
/// Every localized field is keyed by one of these codes. Adding a language
/// here is the only change needed for it to be picked up by the producer's
/// target-language computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    De,
    Fr,
}

impl Language {
    /// All supported languages, in stable order.
    pub const ALL: [Language; 4] = [Language::En, Language::Es, Language::De, Language::Fr];

    /// The language used as the last fallback when resolving display values.
    pub const FALLBACK: Language = Language::En;

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::De => "de",
            Language::Fr => "fr",
        }
    }

    /// Every supported language except `source`: the set a translation task
    /// has to populate.
    pub fn targets_for(source: Language) -> Vec<Language> {
        Language::ALL.iter().copied().filter(|l| *l != source).collect()
    }

    pub fn is_supported_code(code: &str) -> bool {
        Language::from_str(code).is_ok()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "en" => Ok(Language::En),
            "es" => Ok(Language::Es),
            "de" => Ok(Language::De),
            "fr" => Ok(Language::Fr),
            other => Err(TaskError::UnsupportedLanguage(other.to_string())),
        }
    }
}

type LabelTable = HashMap<&'static str, HashMap<Language, &'static str>>;

fn labels(entries: &[(&'static str, [&'static str; 4])]) -> LabelTable {
    entries
        .iter()
        .map(|(key, [en, es, de, fr])| {
            (
                *key,
                HashMap::from([
                    (Language::En, *en),
                    (Language::Es, *es),
                    (Language::De, *de),
                    (Language::Fr, *fr),
                ]),
            )
        })
        .collect()
}

/// Static display labels for fixed-vocabulary values, per language.
///
/// These are not user-generated and never flow through the translation queue.
static VOCABULARY_LABELS: Lazy<HashMap<&'static str, LabelTable>> = Lazy::new(|| {
    HashMap::from([
        (
            "muscle_group",
            labels(&[
                ("chest", ["Chest", "Pecho", "Brust", "Pectoraux"]),
                ("back", ["Back", "Espalda", "Rücken", "Dos"]),
                ("shoulders", ["Shoulders", "Hombros", "Schultern", "Épaules"]),
                ("biceps", ["Biceps", "Bíceps", "Bizeps", "Biceps"]),
                ("triceps", ["Triceps", "Tríceps", "Trizeps", "Triceps"]),
                ("legs", ["Legs", "Piernas", "Beine", "Jambes"]),
                ("glutes", ["Glutes", "Glúteos", "Gesäß", "Fessiers"]),
                ("core", ["Core", "Core", "Rumpf", "Tronc"]),
                ("full_body", ["Full body", "Cuerpo completo", "Ganzkörper", "Corps entier"]),
            ]),
        ),
        (
            "equipment",
            labels(&[
                ("barbell", ["Barbell", "Barra", "Langhantel", "Barre"]),
                ("dumbbell", ["Dumbbell", "Mancuerna", "Kurzhantel", "Haltère"]),
                ("kettlebell", ["Kettlebell", "Pesa rusa", "Kettlebell", "Kettlebell"]),
                ("machine", ["Machine", "Máquina", "Maschine", "Machine"]),
                ("cable", ["Cable", "Polea", "Kabelzug", "Poulie"]),
                ("bodyweight", ["Bodyweight", "Peso corporal", "Körpergewicht", "Poids du corps"]),
                (
                    "resistance_band",
                    ["Resistance band", "Banda elástica", "Widerstandsband", "Bande élastique"],
                ),
            ]),
        ),
    ])
});

/// Looks up the display label for a fixed-vocabulary value (muscle group,
/// equipment, ...) in the viewer's language.
///
/// Falls back to the `en` label, then to the raw key when the vocabulary has
/// no entry at all. Shares the fallback contract of localized-field
/// resolution so call sites can treat both uniformly.
pub fn enum_label(category: &str, key: &str, viewer: Language) -> String {
    VOCABULARY_LABELS
        .get(category)
        .and_then(|table| table.get(key))
        .and_then(|entry| entry.get(&viewer).or_else(|| entry.get(&Language::FALLBACK)))
        .map(|label| (*label).to_string())
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_exclude_the_source_language() {
        let targets = Language::targets_for(Language::En);
        assert_eq!(targets, vec![Language::Es, Language::De, Language::Fr]);
        assert!(!targets.contains(&Language::En));
    }

    #[test]
    fn every_language_round_trips_through_its_code() {
        for lang in Language::ALL {
            assert_eq!(Language::from_str(lang.code()).unwrap(), lang);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert!(Language::from_str("xx").is_err());
        assert!(!Language::is_supported_code("pt"));
    }

    #[test]
    fn serde_uses_lowercase_codes() {
        assert_eq!(serde_json::to_string(&Language::De).unwrap(), "\"de\"");
        let lang: Language = serde_json::from_str("\"es\"").unwrap();
        assert_eq!(lang, Language::Es);
    }

    #[test]
    fn enum_label_resolves_viewer_language() {
        assert_eq!(enum_label("muscle_group", "chest", Language::Es), "Pecho");
        assert_eq!(enum_label("equipment", "barbell", Language::De), "Langhantel");
    }

    #[test]
    fn enum_label_falls_back_to_english_then_raw_key() {
        // Known key: every language is populated, so English only shows up
        // for the fallback language itself.
        assert_eq!(enum_label("muscle_group", "chest", Language::En), "Chest");
        // Unknown key: the raw key is returned unchanged.
        assert_eq!(enum_label("muscle_group", "forearms", Language::Fr), "forearms");
        assert_eq!(enum_label("no_such_category", "chest", Language::En), "chest");
    }
}
