use std::sync::LazyLock;

use regex::Regex;

static TITLE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\((\d{4})\)").expect("Invalid title year pattern"));

/// Release year of a title: the leading four digits of the release date, else a `(YYYY)`
/// found in the name.
pub fn release_year(release_date: Option<&str>, title: &str) -> Option<i32> {
    release_date
        .and_then(|date| date.trim().get(..4))
        .filter(|prefix| prefix.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|prefix| prefix.parse().ok())
        .or_else(|| {
            TITLE_YEAR
                .captures(title)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
        .filter(|year| (1870..=2999).contains(year))
}
