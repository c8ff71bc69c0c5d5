pub const FALLBACK_CATEGORY: &str = "other";

pub fn default_categories() -> Vec<String> {
    [
        "weather",
        "irrigation",
        "seed variety",
        "soil health",
        "fertilizers",
        "pesticides",
        "pest management",
        "disease management",
        "weed control",
        "crop selection",
        "sowing and planting",
        "harvesting",
        "post-harvest handling",
        "storage",
        "market prices",
        "finance and loans",
        "insurance",
        "government schemes",
        "subsidies",
        "machinery",
        "labour",
        "transport",
        "export",
        "organic farming",
        "horticulture",
        "livestock",
        "dairy",
        "poultry",
        "fisheries",
        "water management",
        "climate change",
        "land records",
        "training and extension",
        "agri technology",
        FALLBACK_CATEGORY,
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Closed set of question categories. Always contains the fallback label.
#[derive(Debug, Clone)]
pub struct CategorySet {
    labels: Vec<String>,
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::new(default_categories())
    }
}

impl CategorySet {
    pub fn new(labels: Vec<String>) -> Self {
        let mut labels: Vec<String> = labels
            .into_iter()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect();
        if !labels.iter().any(|l| l == FALLBACK_CATEGORY) {
            labels.push(FALLBACK_CATEGORY.to_string());
        }
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Map raw model output onto the set; anything unrecognised becomes "other".
    pub fn normalize(&self, raw: &str) -> String {
        let label = raw
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
            .trim()
            .to_lowercase();
        if self.contains(&label) {
            label
        } else {
            FALLBACK_CATEGORY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_is_closed_and_has_other() {
        let set = CategorySet::default();
        assert_eq!(set.labels().len(), 35);
        assert!(set.contains("market prices"));
        assert_eq!(set.labels().last().map(String::as_str), Some("other"));
    }

    #[test]
    fn test_normalize() {
        let set = CategorySet::default();
        assert_eq!(set.normalize("  Irrigation\n"), "irrigation");
        assert_eq!(set.normalize("\"Market Prices.\""), "market prices");
        assert_eq!(set.normalize("The category is irrigation"), "other");
        assert_eq!(set.normalize(""), "other");
    }

    #[test]
    fn test_fallback_is_always_present() {
        let set = CategorySet::new(vec!["Weather".to_string(), " ".to_string()]);
        assert_eq!(set.labels(), &["weather".to_string(), "other".to_string()]);
    }
}
