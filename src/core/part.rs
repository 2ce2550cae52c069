//! Bauteile: Katalog-Eigenschaften und platzierte Parts mit Geometrie.

use glam::DVec3;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{NominalDiameter, Port};

/// Stabile Identität eines platzierten Bauteils im Modell.
pub type PartId = u64;

/// Beschreibender Datensatz eines Katalog-Bauteils.
///
/// Read-only nach dem Abruf aus dem Katalog. Beliebige benannte
/// Eigenschaften (z.B. `PressureClass`, `Facing`, `SizeRecordId`)
/// liegen in `props`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSizeProperties {
    /// Name der Spezifikation (z.B. "CS300")
    pub spec: String,
    /// Bauteiltyp (z.B. "Pipe", "Elbow", "Reducer", "Tee", "Buttweld")
    pub part_type: String,
    /// Nenndurchmesser der Größenklasse
    pub nominal_diameter: NominalDiameter,
    /// Benannte Zusatz-Eigenschaften in deterministischer Reihenfolge
    pub props: IndexMap<String, String>,
}

impl PartSizeProperties {
    /// Erstellt einen neuen Eigenschafts-Datensatz ohne Zusatz-Props.
    pub fn new(
        spec: impl Into<String>,
        part_type: impl Into<String>,
        nominal_diameter: NominalDiameter,
    ) -> Self {
        Self {
            spec: spec.into(),
            part_type: part_type.into(),
            nominal_diameter,
            props: IndexMap::new(),
        }
    }

    /// Liest eine benannte Eigenschaft.
    pub fn prop_value(&self, name: &str) -> Option<&str> {
        self.props.get(name).map(String::as_str)
    }

    /// Setzt eine benannte Eigenschaft (Builder-Stil).
    pub fn with_prop(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Liest eine benannte Eigenschaft als f64.
    pub fn prop_f64(&self, name: &str) -> Option<f64> {
        self.prop_value(name)?.parse().ok()
    }

    /// Prüft ob zwei Datensätze denselben Katalog-Größeneintrag bezeichnen
    /// (gleiche Spec case-insensitiv + gleiche `SizeRecordId`).
    pub fn same_size_record(&self, other: &PartSizeProperties) -> bool {
        if !self.spec.eq_ignore_ascii_case(&other.spec) {
            return false;
        }
        match (
            self.prop_value("SizeRecordId"),
            other.prop_value("SizeRecordId"),
        ) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            // Ohne Record-Id bleibt nur Typ + Größe als Identität
            _ => {
                self.part_type.eq_ignore_ascii_case(&other.part_type)
                    && self.nominal_diameter == other.nominal_diameter
            }
        }
    }
}

/// Geometrie eines platzierten Bauteils als explizite Variante.
///
/// Ersetzt Laufzeit-Typprüfung auf Bauteilklassen durch eine
/// Diskriminante: Lauf (gerades Rohr), Fixture (Fitting mit festen
/// Ports) oder Joint (Verbinder zwischen genau zwei Ports).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartGeometry {
    /// Gerader Rohrlauf
    Run {
        /// Startpunkt der Mittellinie
        start: DVec3,
        /// Endpunkt der Mittellinie
        end: DVec3,
        /// Außendurchmesser
        outer_diameter: f64,
        /// Zulässige Mindestlänge
        min_length: f64,
        /// Maximallänge, falls Festlängen-Bauteil
        fixed_max: Option<f64>,
    },
    /// Fitting mit festen Ports (Bogen, Reduzierung, Abzweig)
    Fixture {
        /// Ports in Weltkoordinaten
        ports: Vec<Port>,
    },
    /// Verbinder zwischen genau zwei Ports (Schweißnaht, Flanschpaket)
    Joint {
        /// Beide Seiten des Verbinders
        ports: [Port; 2],
        /// Maximal still absorbierte Winkelabweichung (Radiant)
        slope_tolerance: f64,
        /// Maximal still absorbierter Versatz
        offset_tolerance: f64,
        /// Spaltbreite (z.B. Schweißspalt)
        gap: f64,
    },
}

/// Ein im Modell platziertes Bauteil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedPart {
    /// Stabile Identität
    pub id: PartId,
    /// Katalog-Eigenschaften
    pub props: PartSizeProperties,
    /// Geometrie-Variante
    pub geometry: PartGeometry,
    /// Zugehörige Leitungsgruppe
    pub group: super::LineGroupId,
}

impl PlacedPart {
    /// Gibt die statischen Ports des Bauteils in Weltkoordinaten zurück.
    ///
    /// Für Läufe werden S1/S2 aus Start-/Endpunkt abgeleitet; die
    /// Richtungen zeigen nach außen.
    pub fn ports(&self) -> Vec<Port> {
        match &self.geometry {
            PartGeometry::Run { start, end, .. } => {
                let axis = (*end - *start).try_normalize().unwrap_or(DVec3::X);
                vec![
                    Port::new("S1", *start, -axis),
                    Port::new("S2", *end, axis),
                ]
            }
            PartGeometry::Fixture { ports } => ports.clone(),
            PartGeometry::Joint { ports, .. } => ports.to_vec(),
        }
    }

    /// Findet einen Port über seinen Namen.
    pub fn port(&self, name: &str) -> Option<Port> {
        self.ports().into_iter().find(|p| p.name == name)
    }

    /// Länge des Laufs; `None` für Nicht-Läufe.
    pub fn run_length(&self) -> Option<f64> {
        match &self.geometry {
            PartGeometry::Run { start, end, .. } => Some((*end - *start).length()),
            _ => None,
        }
    }

    /// Prüft ob das Bauteil ein gerader Rohrlauf ist.
    pub fn is_run(&self) -> bool {
        matches!(self.geometry, PartGeometry::Run { .. })
    }
}
