//! Nenndurchmesser (Katalog-Größenklasse, nicht die geometrische Abmessung).

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Nenndurchmesser einer Komponente: Einheit + Wert.
///
/// Zwei Nenndurchmesser sind gleich, wenn Einheit (case-insensitiv) und
/// Wert exakt übereinstimmen — Katalogwerte stammen aus derselben Quelle,
/// ein Toleranzvergleich würde Größenklassen vermischen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NominalDiameter {
    /// Einheit der Größenklasse ("in" oder "mm")
    pub units: String,
    /// Wert der Größenklasse (z.B. 6.0 für 6")
    pub value: f64,
}

impl NominalDiameter {
    /// Erstellt einen Nenndurchmesser aus Einheit und Wert.
    pub fn new(units: impl Into<String>, value: f64) -> Self {
        Self {
            units: units.into(),
            value,
        }
    }

    /// Parst einen Anzeige-String wie `6in`, `6 in`, `6"` oder `150mm`.
    ///
    /// Gibt `None` zurück wenn der String keinem bekannten Format entspricht.
    pub fn from_display_string(s: &str) -> Option<Self> {
        let re = Regex::new(r#"^\s*(\d+(?:\.\d+)?)\s*(in|mm|")\s*$"#).ok()?;
        let caps = re.captures(s)?;
        let value: f64 = caps.get(1)?.as_str().parse().ok()?;
        let units = match caps.get(2)?.as_str() {
            "\"" => "in",
            u => u,
        };
        Some(Self::new(units, value))
    }

    /// Anzeige-String in kanonischer Form (`6in`, `150mm`).
    pub fn display(&self) -> String {
        if (self.value - self.value.round()).abs() < 1e-9 {
            format!("{}{}", self.value.round() as i64, self.units)
        } else {
            format!("{}{}", self.value, self.units)
        }
    }
}

impl PartialEq for NominalDiameter {
    fn eq(&self, other: &Self) -> bool {
        self.units.eq_ignore_ascii_case(&other.units) && self.value == other.value
    }
}

impl std::fmt::Display for NominalDiameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_inch_variants() {
        let a = NominalDiameter::from_display_string("6in").expect("6in erwartet");
        let b = NominalDiameter::from_display_string("6 in").expect("6 in erwartet");
        let c = NominalDiameter::from_display_string("6\"").expect("6\" erwartet");
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.value, 6.0);
        assert_eq!(a.units, "in");
    }

    #[test]
    fn parse_metric() {
        let nd = NominalDiameter::from_display_string("150mm").expect("150mm erwartet");
        assert_eq!(nd.value, 150.0);
        assert_eq!(nd.units, "mm");
        assert_eq!(nd.display(), "150mm");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(NominalDiameter::from_display_string("Zoll").is_none());
        assert!(NominalDiameter::from_display_string("").is_none());
        assert!(NominalDiameter::from_display_string("6ft").is_none());
    }

    #[test]
    fn equality_is_unit_aware() {
        let inch = NominalDiameter::new("in", 6.0);
        let metric = NominalDiameter::new("mm", 6.0);
        assert_ne!(inch, metric);
        assert_eq!(inch, NominalDiameter::new("IN", 6.0));
    }
}
