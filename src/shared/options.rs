//! Zentrale Konfiguration für den Routing-Editor.
//!
//! `RouterOptions` enthält alle zur Laufzeit änderbaren Werte.
//! Die `const`-Werte bleiben als Fallback/Default erhalten.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ── Routing ─────────────────────────────────────────────────────────

/// Unterhalb dieses Umlenkwinkels wird kein Bogen gesetzt (3°).
pub const MIN_ELBOW_ANGLE: f64 = std::f64::consts::PI / 60.0;
/// Winkel unterhalb dieser Schwelle gelten als null.
pub const ANGLE_EPSILON: f64 = 1e-10;
/// Distanzen unterhalb dieser Schwelle gelten als null.
pub const DISTANCE_EPSILON: f64 = 1e-10;
/// Standard-Winkeltoleranz eines Verbinders (Radiant).
pub const DEFAULT_SLOPE_TOLERANCE: f64 = 0.1;
/// Standard-Snap-Radius in Modelleinheiten.
pub const DEFAULT_SNAP_RADIUS: f64 = 25.0;

// ── Laufzeit-Optionen (serialisierbar) ─────────────────────────────

/// Alle zur Laufzeit änderbaren Routing-Optionen.
/// Wird als `pipe_routing_editor.toml` neben der Binary gespeichert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterOptions {
    /// Aktive Spezifikation
    pub spec: String,
    /// Aktive Größenklasse als Anzeige-String (z.B. "6in")
    pub size: String,
    /// Cutback-Bögen verwenden
    pub cutback_elbow: bool,
    /// Biegungen statt Katalog-Bögen verwenden
    pub bent_pipe: bool,
    /// Abzweige als Stutzen (Stub-in) statt T-Stück ausführen
    pub stub_in: bool,
    /// Toleranz-Routing: Verbinder absorbiert kleine Umlenkungen
    pub tolerance_routing: bool,
    /// Aktuelle Leitungsnummer
    pub line_number: String,
    /// Schweißspalt zwischen Verbinder-Seiten
    pub weld_gap: f64,
    /// Winkeltoleranz neuer Verbinder (Radiant)
    pub slope_tolerance: f64,
    /// Versatztoleranz neuer Verbinder
    pub offset_tolerance: f64,
    /// Snap-Radius in Modelleinheiten
    pub snap_radius: f64,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            spec: "CS300".to_string(),
            size: "6in".to_string(),
            cutback_elbow: false,
            bent_pipe: false,
            stub_in: false,
            tolerance_routing: false,
            line_number: "25-100-CS300".to_string(),
            weld_gap: 0.0,
            slope_tolerance: DEFAULT_SLOPE_TOLERANCE,
            offset_tolerance: 0.0,
            snap_radius: DEFAULT_SNAP_RADIUS,
        }
    }
}

impl RouterOptions {
    /// Pfad der Optionsdatei neben der Binary.
    pub fn config_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pipe_routing_editor.toml")
    }

    /// Lädt Optionen aus einer TOML-Datei; bei Fehlern Standardwerte.
    pub fn load_from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(options) => options,
                Err(err) => {
                    log::warn!("Optionsdatei nicht lesbar ({err}); Standardwerte aktiv");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Speichert die Optionen als TOML-Datei.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
