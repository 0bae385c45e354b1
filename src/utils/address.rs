//! Street address normalization for record linkage.
//!
//! County sites disagree on abbreviations ("St" vs "Street", "N" vs
//! "North"), casing, and punctuation. Normalization expands the common
//! abbreviations and strips noise so two renderings of the same address
//! compare equal, and fuzzy comparison only has to absorb genuine typos.

/// USPS-style suffix and directional abbreviations, expanded during
/// normalization. Keep sorted by abbreviation for readability.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("APT", "APARTMENT"),
    ("AVE", "AVENUE"),
    ("BLVD", "BOULEVARD"),
    ("CIR", "CIRCLE"),
    ("CT", "COURT"),
    ("DR", "DRIVE"),
    ("E", "EAST"),
    ("EXPY", "EXPRESSWAY"),
    ("HWY", "HIGHWAY"),
    ("LN", "LANE"),
    ("N", "NORTH"),
    ("NE", "NORTHEAST"),
    ("NW", "NORTHWEST"),
    ("PKWY", "PARKWAY"),
    ("PL", "PLACE"),
    ("RD", "ROAD"),
    ("S", "SOUTH"),
    ("SE", "SOUTHEAST"),
    ("SQ", "SQUARE"),
    ("ST", "STREET"),
    ("STE", "SUITE"),
    ("SW", "SOUTHWEST"),
    ("TER", "TERRACE"),
    ("TRL", "TRAIL"),
    ("W", "WEST"),
];

/// A street address broken into the fields linkage matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub street_num: String,
    pub street_name: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl ParsedAddress {
    /// Stable signature used for skip-list lookups and owner fingerprints.
    pub fn signature(&self) -> String {
        format!("{}|{}|{}", self.street_num, self.street_name, self.zip)
    }
}

/// Uppercase, strip punctuation, collapse whitespace, and expand known
/// abbreviations.
pub fn normalize_street(raw: &str) -> String {
    let cleaned: String = raw
        .to_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .map(expand_abbreviation)
        .collect::<Vec<_>>()
        .join(" ")
}

fn expand_abbreviation(word: &str) -> &str {
    ABBREVIATIONS
        .iter()
        .find(|(abbr, _)| *abbr == word)
        .map(|(_, full)| *full)
        .unwrap_or(word)
}

/// Parse a denormalized capture address of the form
/// "123 Main St, Dallas, TX 75201" (commas optional after the street).
///
/// Returns None when no leading street number can be found; such captures
/// go to quarantine rather than being guessed at.
pub fn parse_address(raw: &str) -> Option<ParsedAddress> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let mut parts = raw.splitn(2, ',');
    let street_part = parts.next()?.trim();
    let rest = parts.next().unwrap_or("").trim();

    let mut street_words = street_part.split_whitespace();
    let street_num = street_words.next()?.to_string();
    if !street_num.chars().next()?.is_ascii_digit() {
        return None;
    }
    let street_name = normalize_street(&street_words.collect::<Vec<_>>().join(" "));
    if street_name.is_empty() {
        return None;
    }

    // "Dallas, TX 75201" or "Dallas TX 75201" or nothing at all
    let tail: Vec<&str> = rest
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();

    let (city, state, zip) = match tail.as_slice() {
        [] => (String::new(), String::new(), String::new()),
        [zip] if is_zip(zip) => (String::new(), String::new(), (*zip).to_string()),
        [.., state, zip] if is_zip(zip) => {
            let city = tail[..tail.len() - 2].join(" ");
            (city, state.to_uppercase(), (*zip).to_string())
        }
        _ => (tail.join(" "), String::new(), String::new()),
    };

    Some(ParsedAddress {
        street_num,
        street_name,
        city: city.to_uppercase(),
        state,
        zip,
    })
}

fn is_zip(s: &str) -> bool {
    s.len() == 5 && s.chars().all(|c| c.is_ascii_digit())
}

/// Normalize an owner name for fingerprinting: uppercase, alphanumerics
/// only, collapsed whitespace.
pub fn normalize_name(raw: &str) -> String {
    raw.to_uppercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_street_expands_abbreviations() {
        assert_eq!(normalize_street("Main St"), "MAIN STREET");
        assert_eq!(normalize_street("N. Elm Ave"), "NORTH ELM AVENUE");
        assert_eq!(normalize_street("oak   blvd"), "OAK BOULEVARD");
        // Unknown words pass through
        assert_eq!(normalize_street("Quail Hollow"), "QUAIL HOLLOW");
    }

    #[test]
    fn test_parse_full_address() {
        let parsed = parse_address("123 Main St, Dallas, TX 75201").unwrap();
        assert_eq!(parsed.street_num, "123");
        assert_eq!(parsed.street_name, "MAIN STREET");
        assert_eq!(parsed.city, "DALLAS");
        assert_eq!(parsed.state, "TX");
        assert_eq!(parsed.zip, "75201");
    }

    #[test]
    fn test_parse_address_without_city() {
        let parsed = parse_address("55 Oak Blvd, 75001").unwrap();
        assert_eq!(parsed.street_num, "55");
        assert_eq!(parsed.street_name, "OAK BOULEVARD");
        assert_eq!(parsed.zip, "75001");
        assert!(parsed.city.is_empty());
    }

    #[test]
    fn test_parse_address_rejects_no_street_number() {
        assert!(parse_address("Main Street, Dallas, TX 75201").is_none());
        assert!(parse_address("").is_none());
        assert!(parse_address("   ").is_none());
    }

    #[test]
    fn test_signature_is_stable_across_renderings() {
        let a = parse_address("123 Main St, Dallas, TX 75201").unwrap();
        let b = parse_address("123 MAIN STREET, Dallas TX 75201").unwrap();
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Smith, John  Q."), "SMITH JOHN Q");
        assert_eq!(normalize_name("o'brien"), "O BRIEN");
    }
}
