use chrono::Datelike;
use tracing::debug;

use crate::domain::ParsedName;
use crate::sink::Category;

/// Earliest accepted year: Linnaeus' Species Plantarum.
pub const FIRST_YEAR: i32 = 1753;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordRow {
    pub category: Category,
    pub word: String,
    pub name_id: String,
}

impl WordRow {
    pub fn into_record(self) -> (Category, Vec<String>) {
        (self.category, vec![self.word, self.name_id])
    }
}

pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

pub fn word_rows(parsed: &ParsedName, current_year: i32) -> Vec<WordRow> {
    let chars: Vec<char> = parsed.name.chars().collect();
    let mut rows = Vec::new();
    for position in &parsed.positions {
        let Some(category) = category_for(&position.meaning) else {
            continue;
        };
        if position.start > position.end || position.end > chars.len() {
            debug!(
                name = %parsed.name,
                start = position.start,
                end = position.end,
                "span outside name, skipped"
            );
            continue;
        }
        let span: String = chars[position.start..position.end].iter().collect();
        let word = span.to_uppercase().trim_matches(' ').to_string();
        if category == Category::Year && !is_valid_year(&word, current_year) {
            continue;
        }
        rows.push(WordRow {
            category,
            word,
            name_id: parsed.id.clone(),
        });
    }
    rows
}

pub fn is_valid_year(word: &str, current_year: i32) -> bool {
    match word.parse::<i32>() {
        Ok(year) => (FIRST_YEAR..=current_year + 2).contains(&year),
        Err(_) => false,
    }
}

fn category_for(meaning: &str) -> Option<Category> {
    match meaning {
        "uninomial" => Some(Category::Uninomial),
        "genus" => Some(Category::Genus),
        "specific_epithet" => Some(Category::Species),
        "infraspecific_epithet" => Some(Category::Subspecies),
        "author_word" => Some(Category::AuthorWord),
        "year" => Some(Category::Year),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParsedRecord, Position};

    #[test]
    fn unknown_meanings_are_ignored() {
        let parsed = ParsedRecord::parsed(
            "Aus var. bus",
            "Aus bus",
            "Aus var. bus",
            false,
            vec![Position::new("rank", 4, 8), Position::new("genus", 0, 3)],
        )
        .with_original("1");
        let rows = word_rows(&parsed, 2026);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].word, "AUS");
    }

    #[test]
    fn year_window_edges() {
        assert!(is_valid_year("1753", 2026));
        assert!(is_valid_year("2028", 2026));
        assert!(!is_valid_year("2029", 2026));
        assert!(!is_valid_year("", 2026));
    }
}
