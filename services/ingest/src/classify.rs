//! Flags derived from free-text tenant and suite fields.
//!
//! All matching is lowercase substring matching against phrase lists taken
//! from configuration, so English and Spanish labels work side by side.

use crate::records::Building;

#[derive(Debug, Clone)]
pub struct TextClassifier {
    vacancy_phrases: Vec<String>,
    own_use_phrases: Vec<String>,
}

impl TextClassifier {
    pub fn new(vacancy_phrases: &[String], own_use_phrases: &[String]) -> Self {
        Self {
            vacancy_phrases: lowered(vacancy_phrases),
            own_use_phrases: lowered(own_use_phrases),
        }
    }

    /// Blank tenants count as vacant.
    pub fn is_vacant(&self, tenant: Option<&str>) -> bool {
        let tenant = match tenant.map(str::trim) {
            None | Some("") => return true,
            Some(t) => t.to_lowercase(),
        };
        self.vacancy_phrases.iter().any(|p| tenant.contains(p.as_str()))
    }

    /// Matches against "tenant suite", so a phrase naming a suite id marks
    /// that suite whatever its tenant says.
    pub fn is_own_use(&self, tenant: Option<&str>, suite_id: &str) -> bool {
        let combined = format!("{} {}", tenant.unwrap_or(""), suite_id)
            .trim()
            .to_lowercase();
        self.own_use_phrases.iter().any(|p| combined.contains(p.as_str()))
    }
}

fn lowered(phrases: &[String]) -> Vec<String> {
    phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}

/// First `A` or `B` anywhere in the suite id, case-insensitive.
pub fn extract_building(suite_id: &str) -> Option<Building> {
    suite_id.chars().find_map(|c| match c.to_ascii_uppercase() {
        'A' => Some(Building::A),
        'B' => Some(Building::B),
        _ => None,
    })
}
