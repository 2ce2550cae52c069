//! Leitungsnummern-Tags: `<Bereich>-<Laufnummer>-<Spec>` (z.B. "25-100-CS300").

use regex::Regex;

/// Zerlegtes Leitungsnummern-Tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTag {
    /// Anlagenbereich
    pub area: u32,
    /// Laufnummer innerhalb des Bereichs
    pub sequence: u32,
    /// Spec-Name
    pub spec: String,
}

/// Parst ein Leitungsnummern-Tag; `None` bei abweichendem Schema.
pub fn parse_line_tag(tag: &str) -> Option<LineTag> {
    let re = Regex::new(r"^(\d+)-(\d+)-([A-Za-z][A-Za-z0-9]*)$").ok()?;
    let caps = re.captures(tag.trim())?;
    Some(LineTag {
        area: caps.get(1)?.as_str().parse().ok()?,
        sequence: caps.get(2)?.as_str().parse().ok()?,
        spec: caps.get(3)?.as_str().to_string(),
    })
}

/// Formatiert ein Tag in kanonischer Form.
pub fn format_line_tag(tag: &LineTag) -> String {
    format!("{}-{}-{}", tag.area, tag.sequence, tag.spec)
}
