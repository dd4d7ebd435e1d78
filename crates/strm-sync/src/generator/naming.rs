//! File and folder names for library trees.

use std::sync::LazyLock;

use regex::Regex;

static LANGUAGE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2,3} - ").expect("Invalid language prefix pattern"));

static QUALITY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:4K-D\.-|(?:4K|UHD|FHD|HD|SD)\.-|(?:4K|UHD|FHD|HD|SD)\s*-\s*|(?:4K|UHD|FHD|HD|SD)\b)\s*")
        .expect("Invalid quality prefix pattern")
});

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)").expect("Invalid bracket pattern"));

static DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.+").expect("Invalid dot pattern"));

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_\- ]").expect("Invalid character pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace pattern"));

/// Reduce a provider title to a name usable on every filesystem.
///
/// Returns an empty string when nothing usable is left.
pub fn sanitize_name(raw: &str) -> String {
    let name = LANGUAGE_PREFIX.replace(raw.trim(), "");
    let name = QUALITY_PREFIX.replace(&name, "");
    let name = BRACKETED.replace_all(&name, " ");
    let name = DOTS.replace_all(&name, " ");
    let name = DISALLOWED.replace_all(&name, "");
    WHITESPACE.replace_all(&name, " ").trim().to_string()
}

/// `Title (Year)`, or just `Title` without a year.
pub fn titled(name: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => format!("{name} ({year})"),
        None => name.to_string(),
    }
}

pub fn season_folder(season: i32) -> String {
    format!("Season {season:02}")
}

/// `Show S01E03`
pub fn episode_stem(show: &str, season: i32, episode: i32) -> String {
    format!("{show} S{season:02}E{episode:02}")
}

/// Name given to the later of two items that land on the same path.
pub fn disambiguate(base: &str, remote_id: &str) -> String {
    format!("{base} [{remote_id}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("EN - The Matrix", "The Matrix")]
    #[case("4K - Dune Part Two", "Dune Part Two")]
    #[case("FHD.-Heat", "Heat")]
    #[case("HD Alien", "Alien")]
    #[case("Hdtv Special", "Hdtv Special")]
    #[case("[Multi-Sub] Spirited Away (2001)", "Spirited Away")]
    #[case("The.Big.Lebowski", "The Big Lebowski")]
    #[case("Amélie: Le Fabuleux Destin", "Amlie Le Fabuleux Destin")]
    #[case("  Spaced   Out  ", "Spaced Out")]
    #[case("Mission: Impossible / Fallout", "Mission Impossible Fallout")]
    #[case("EN - FHD - Se7en", "Se7en")]
    fn test_sanitize_name(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_name(raw), expected);
    }

    #[test]
    fn test_sanitize_never_leaves_path_separators() {
        let name = sanitize_name("../../etc/passwd");
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
    }

    #[test]
    fn test_sanitize_can_come_out_empty() {
        assert_eq!(sanitize_name("★★★"), "");
    }

    #[test]
    fn test_layout_names() {
        assert_eq!(titled("Heat", Some(1995)), "Heat (1995)");
        assert_eq!(titled("Heat", None), "Heat");
        assert_eq!(season_folder(1), "Season 01");
        assert_eq!(season_folder(12), "Season 12");
        assert_eq!(episode_stem("Show", 1, 3), "Show S01E03");
        assert_eq!(disambiguate("Heat (1995)", "77"), "Heat (1995) [77]");
    }
}
