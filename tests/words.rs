use gnidump::domain::{ParsedRecord, Position, name_uuid};
use gnidump::sink::Category;
use gnidump::words::{WordRow, is_valid_year, word_rows};

fn words_of(name: &str, positions: Vec<Position>, year: i32) -> Vec<(Category, String)> {
    let parsed = ParsedRecord::parsed(name, name, name, false, positions).with_original("1");
    word_rows(&parsed, year)
        .into_iter()
        .map(|row| (row.category, row.word))
        .collect()
}

#[test]
fn binomial_words_are_uppercased() {
    let parsed = ParsedRecord::parsed(
        "Homo sapiens",
        "Homo sapiens",
        "Homo sapiens",
        false,
        vec![
            Position::new("genus", 0, 4),
            Position::new("specific_epithet", 5, 12),
        ],
    )
    .with_original("7");
    let rows = word_rows(&parsed, 2026);
    assert_eq!(
        rows,
        vec![
            WordRow {
                category: Category::Genus,
                word: "HOMO".to_string(),
                name_id: name_uuid("Homo sapiens"),
            },
            WordRow {
                category: Category::Species,
                word: "SAPIENS".to_string(),
                name_id: name_uuid("Homo sapiens"),
            },
        ]
    );
}

#[test]
fn year_window_filters_tokens() {
    let name = "Aus bus Smith 1752 3000 abcd 1850 2027";
    let positions = vec![
        Position::new("year", 14, 18),
        Position::new("year", 19, 23),
        Position::new("year", 24, 28),
        Position::new("year", 29, 33),
        Position::new("year", 34, 38),
    ];
    let years: Vec<String> = words_of(name, positions, 2026)
        .into_iter()
        .map(|(_, word)| word)
        .collect();
    assert_eq!(years, vec!["1850".to_string(), "2027".to_string()]);
}

#[test]
fn offsets_count_characters_not_bytes() {
    let name = "Abies alba Müller 1768";
    let rows = words_of(
        name,
        vec![
            Position::new("author_word", 11, 17),
            Position::new("year", 18, 22),
        ],
        2026,
    );
    assert_eq!(
        rows,
        vec![
            (Category::AuthorWord, "MÜLLER".to_string()),
            (Category::Year, "1768".to_string()),
        ]
    );
}

#[test]
fn infraspecific_and_uninomial_categories() {
    let rows = words_of(
        "Aus bus cus",
        vec![
            Position::new("uninomial", 0, 3),
            Position::new("infraspecific_epithet", 8, 11),
        ],
        2026,
    );
    assert_eq!(
        rows,
        vec![
            (Category::Uninomial, "AUS".to_string()),
            (Category::Subspecies, "CUS".to_string()),
        ]
    );
}

#[test]
fn out_of_range_span_is_skipped() {
    let parsed = gnidump::domain::ParsedName {
        id: name_uuid("Aus"),
        id_canonical: String::new(),
        id_original: "1".to_string(),
        name: "Aus".to_string(),
        canonical: String::new(),
        canonical_with_rank: String::new(),
        surrogate: false,
        positions: vec![Position::new("genus", 0, 10)],
    };
    assert!(word_rows(&parsed, 2026).is_empty());
}

#[test]
fn next_year_is_accepted() {
    assert!(is_valid_year("2027", 2026));
    assert!(!is_valid_year("1752", 2026));
}
