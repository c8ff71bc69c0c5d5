use serde::{Deserialize, Serialize};

/// A canonical crop name and the words farmers use for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropSynonyms {
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl CropSynonyms {
    fn new(name: &str, synonyms: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matches(&self, token: &str) -> bool {
        self.name.eq_ignore_ascii_case(token)
            || self.synonyms.iter().any(|s| s.eq_ignore_ascii_case(token))
    }
}

pub fn default_crops() -> Vec<CropSynonyms> {
    vec![
        CropSynonyms::new("rice", &["paddy", "dhan"]),
        CropSynonyms::new("wheat", &["gehun"]),
        CropSynonyms::new("cotton", &["kapas"]),
        CropSynonyms::new("maize", &["corn", "makka"]),
        CropSynonyms::new("sugarcane", &["cane"]),
        CropSynonyms::new("groundnut", &["peanut"]),
        CropSynonyms::new("soybean", &["soya", "soybeans"]),
        CropSynonyms::new("chilli", &["chili", "chillies", "mirchi"]),
        CropSynonyms::new("redgram", &["tur", "arhar", "pigeonpea"]),
        CropSynonyms::new("bengalgram", &["chana", "chickpea"]),
        CropSynonyms::new("jowar", &["sorghum"]),
        CropSynonyms::new("bajra", &["sajje"]),
        CropSynonyms::new("turmeric", &["haldi"]),
        CropSynonyms::new("tomato", &["tomatoes"]),
        CropSynonyms::new("onion", &["onions"]),
    ]
}

/// Best-effort crop spotting in free text.
#[derive(Debug, Clone)]
pub struct CropVocabulary {
    crops: Vec<CropSynonyms>,
}

impl Default for CropVocabulary {
    fn default() -> Self {
        Self::new(default_crops())
    }
}

impl CropVocabulary {
    pub fn new(crops: Vec<CropSynonyms>) -> Self {
        Self { crops }
    }

    /// Canonical name of the first token in `question` that names a known crop.
    pub fn extract(&self, question: &str) -> Option<String> {
        question
            .split(|c: char| c.is_whitespace() || c == ',')
            .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|token| !token.is_empty())
            .find_map(|token| {
                self.crops
                    .iter()
                    .find(|crop| crop.matches(token))
                    .map(|crop| crop.name.to_lowercase())
            })
    }
}
