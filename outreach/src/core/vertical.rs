//! Vertical inference from a domain name.

use crate::core::types::Vertical;

/// Keyword sets checked in priority order; the first hit wins.
const KEYWORDS: [(Vertical, &[&str]); 2] = [
    (Vertical::Sleep, &["bed", "sleep", "mattress", "pillow"]),
    (Vertical::Ai, &["ai", "tech", "cloud", "data", "bot"]),
];

/// Fallback when no keyword matches.
pub const DEFAULT_VERTICAL: Vertical = Vertical::Local;

/// Infer a vertical by case-insensitive substring match on `domain_name`.
pub fn detect_vertical(domain_name: &str) -> Vertical {
    let domain = domain_name.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|word| domain.contains(word)))
        .map_or(DEFAULT_VERTICAL, |(vertical, _)| *vertical)
}

/// Use the supplied vertical if present, otherwise infer one.
pub fn resolve_vertical(supplied: Option<Vertical>, domain_name: &str) -> Vertical {
    supplied.unwrap_or_else(|| detect_vertical(domain_name))
}
