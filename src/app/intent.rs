//! Eingabe-Intents der Routing-Session.
//!
//! Die Eingabequelle (Jig/Prompt-Schicht des Hosts oder der
//! Skript-Treiber) liefert genau diese diskreten Ereignisse, eines nach
//! dem anderen.

use glam::DVec3;
use serde::Deserialize;

use crate::routing::SettingChange;

/// Ein diskretes Eingabe-Ereignis.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteIntent {
    /// Routing an einem Punkt beginnen (Snap auf Port/Körper, sonst frei)
    StartAt(DVec3),
    /// Cursor-Sample: die schwebende Kette neu ableiten
    CursorMoved(DVec3),
    /// Schwebende Kette übernehmen; das Ende wird neuer Anker
    Accept,
    /// Auto-Routing zu einem gesnappten Endpunkt versuchen
    ConnectTo(DVec3),
    /// Einstellungs-Änderung (Größe, Spec, Schalter, Leitungsnummer)
    Toggle(SettingChange),
    /// Routing abbrechen; die Kette wird spurlos verworfen
    Cancel,
}

/// Serialisierbare Form eines Intents für Skript-Dateien.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScriptedIntent {
    /// `{"op": "start", "at": [x, y, z]}`
    Start { at: [f64; 3] },
    /// `{"op": "cursor", "at": [x, y, z]}`
    Cursor { at: [f64; 3] },
    /// `{"op": "accept"}`
    Accept,
    /// `{"op": "connect", "at": [x, y, z]}`
    Connect { at: [f64; 3] },
    /// `{"op": "size", "value": "6in"}`
    Size { value: String },
    /// `{"op": "spec", "value": "CS300"}`
    Spec { value: String },
    /// `{"op": "cutback", "value": true}`
    Cutback { value: bool },
    /// `{"op": "bend", "value": true}`
    Bend { value: bool },
    /// `{"op": "stub_in", "value": true}`
    StubIn { value: bool },
    /// `{"op": "tolerance", "value": true}`
    Tolerance { value: bool },
    /// `{"op": "line_number", "value": "25-101-CS300"}`
    LineNumber { value: String },
    /// `{"op": "cancel"}`
    Cancel,
}

impl ScriptedIntent {
    /// Übersetzt die Skript-Form in den Session-Intent.
    pub fn into_intent(self) -> anyhow::Result<RouteIntent> {
        use crate::core::NominalDiameter;
        Ok(match self {
            ScriptedIntent::Start { at } => RouteIntent::StartAt(DVec3::from_array(at)),
            ScriptedIntent::Cursor { at } => RouteIntent::CursorMoved(DVec3::from_array(at)),
            ScriptedIntent::Accept => RouteIntent::Accept,
            ScriptedIntent::Connect { at } => RouteIntent::ConnectTo(DVec3::from_array(at)),
            ScriptedIntent::Size { value } => {
                let nd = NominalDiameter::from_display_string(&value)
                    .ok_or_else(|| anyhow::anyhow!("Ungültige Größenklasse: {value}"))?;
                RouteIntent::Toggle(SettingChange::Size(nd))
            }
            ScriptedIntent::Spec { value } => RouteIntent::Toggle(SettingChange::Spec(value)),
            ScriptedIntent::Cutback { value } => RouteIntent::Toggle(SettingChange::Cutback(value)),
            ScriptedIntent::Bend { value } => RouteIntent::Toggle(SettingChange::PipeBend(value)),
            ScriptedIntent::StubIn { value } => RouteIntent::Toggle(SettingChange::StubIn(value)),
            ScriptedIntent::Tolerance { value } => {
                RouteIntent::Toggle(SettingChange::ToleranceRouting(value))
            }
            ScriptedIntent::LineNumber { value } => {
                RouteIntent::Toggle(SettingChange::LineNumber(value))
            }
            ScriptedIntent::Cancel => RouteIntent::Cancel,
        })
    }
}
