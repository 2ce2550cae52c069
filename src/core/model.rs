//! Der persistente Modell-Store: Parts, Port-Verbindungen, Leitungsgruppen.
//!
//! Einzige Stelle, an der dauerhafter Zustand mutiert wird. Mutationen
//! laufen über `run_unit` als Alles-oder-Nichts-Arbeitseinheit mit
//! Snapshot-Rollback.

use std::collections::HashMap;

use anyhow::{bail, Result};
use glam::DVec3;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Pair, PartGeometry, PartId, PartSizeProperties, PlacedPart, Port};

/// Identität einer Leitungsgruppe (alle Parts eines Leitungszugs).
pub type LineGroupId = u32;

/// Persistenter Container für alle platzierten Parts und Verbindungen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipingModel {
    /// Alle Parts, indexiert nach ihrer ID (deterministische Reihenfolge)
    parts: IndexMap<PartId, PlacedPart>,
    /// Port-zu-Port-Verbindungen; jeder Eintrag ist in beide Richtungen
    /// abgelegt, der Schlüssel erzwingt Port-Exklusivität
    connections: HashMap<(PartId, String), (PartId, String)>,
    /// Leitungsgruppen: ID → Leitungsnummern-Tag
    line_groups: IndexMap<LineGroupId, String>,
    next_part_id: PartId,
    next_group_id: LineGroupId,
}

impl PipingModel {
    /// Erstellt ein leeres Modell.
    pub fn new() -> Self {
        Self {
            parts: IndexMap::new(),
            connections: HashMap::new(),
            line_groups: IndexMap::new(),
            next_part_id: 1,
            next_group_id: 1,
        }
    }

    // ── Parts ───────────────────────────────────────────────────────

    /// Fügt ein Bauteil hinzu und vergibt die nächste freie ID.
    pub fn add_part(
        &mut self,
        props: PartSizeProperties,
        geometry: PartGeometry,
        group: LineGroupId,
    ) -> PartId {
        let id = self.next_part_id;
        self.next_part_id += 1;
        self.parts.insert(
            id,
            PlacedPart {
                id,
                props,
                geometry,
                group,
            },
        );
        id
    }

    /// Liest ein Bauteil.
    pub fn part(&self, id: PartId) -> Option<&PlacedPart> {
        self.parts.get(&id)
    }

    /// Anzahl der Parts.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Iterator über alle Parts (Einfüge-Reihenfolge).
    pub fn parts_iter(&self) -> impl Iterator<Item = &PlacedPart> {
        self.parts.values()
    }

    /// Verlängert einen Lauf in-place bis zum neuen Endpunkt.
    pub fn extend_run(&mut self, id: PartId, new_end: DVec3) -> Result<()> {
        let Some(part) = self.parts.get_mut(&id) else {
            bail!("Bauteil {} existiert nicht", id);
        };
        match &mut part.geometry {
            PartGeometry::Run {
                start,
                end,
                min_length,
                fixed_max,
                ..
            } => {
                let new_len = (new_end - *start).length();
                if new_len < *min_length {
                    bail!("Lauf {} würde unter Mindestlänge fallen", id);
                }
                if let Some(max) = fixed_max {
                    if new_len > *max {
                        bail!("Festlängen-Lauf {} würde Maximallänge überschreiten", id);
                    }
                }
                *end = new_end;
                Ok(())
            }
            _ => bail!("Bauteil {} ist kein Lauf", id),
        }
    }

    /// Kürzt einen Lauf am Ende um `distance` entlang seiner Achse.
    pub fn cutback_run(&mut self, id: PartId, distance: f64) -> Result<()> {
        let Some(part) = self.parts.get_mut(&id) else {
            bail!("Bauteil {} existiert nicht", id);
        };
        match &mut part.geometry {
            PartGeometry::Run {
                start,
                end,
                min_length,
                ..
            } => {
                let axis = (*end - *start).try_normalize().unwrap_or(DVec3::X);
                let new_len = (*end - *start).length() - distance;
                if new_len + 1e-9 < *min_length {
                    bail!("Cutback würde Lauf {} unter Mindestlänge kürzen", id);
                }
                *end = *start + axis * new_len;
                Ok(())
            }
            _ => bail!("Bauteil {} ist kein Lauf", id),
        }
    }

    // ── Verbindungen ────────────────────────────────────────────────

    /// Prüft ob der Port eines Pairs bereits verbunden ist.
    pub fn is_connected(&self, pair: &Pair) -> bool {
        match (&pair.part, pair.port.name.as_str()) {
            (Some(id), name) if !name.is_empty() => {
                self.connections.contains_key(&(*id, name.to_string()))
            }
            _ => false,
        }
    }

    /// Gibt die Gegenseite einer Verbindung zurück.
    pub fn connected_peer(&self, part: PartId, port: &str) -> Option<(PartId, String)> {
        self.connections.get(&(part, port.to_string())).cloned()
    }

    /// Verbindet zwei Ports über ihre (Part, Portname)-Schlüssel.
    ///
    /// Schlägt fehl wenn ein Part fehlt, ein Portname unbekannt ist oder
    /// eine Seite bereits verbunden ist (Port-Exklusivität).
    pub fn connect(&mut self, a: (PartId, &str), b: (PartId, &str)) -> Result<()> {
        for (id, port) in [a, b] {
            let Some(part) = self.parts.get(&id) else {
                bail!("Verbindung auf unbekanntes Bauteil {}", id);
            };
            if part.port(port).is_none() {
                bail!("Bauteil {} hat keinen Port '{}'", id, port);
            }
            if self.connections.contains_key(&(id, port.to_string())) {
                bail!("Port {}:{} ist bereits verbunden", id, port);
            }
        }
        if a.0 == b.0 && a.1 == b.1 {
            bail!("Port {}:{} kann nicht mit sich selbst verbunden werden", a.0, a.1);
        }
        self.connections
            .insert((a.0, a.1.to_string()), (b.0, b.1.to_string()));
        self.connections
            .insert((b.0, b.1.to_string()), (a.0, a.1.to_string()));
        Ok(())
    }

    /// Verbindet einen Körper-Abzweig: der Host bekommt einen synthetisch
    /// benannten Anschlag am Abzweigpunkt, der Abzweig-Port dockt daran an.
    pub fn connect_tap(
        &mut self,
        host: PartId,
        at: DVec3,
        branch: (PartId, &str),
    ) -> Result<()> {
        if !self.parts.contains_key(&host) {
            bail!("Abzweig auf unbekanntes Bauteil {}", host);
        }
        // Synthetischer, eindeutiger Portname am Host
        let mut n = 1;
        let tap_name = loop {
            let candidate = format!("T{n}");
            if !self.connections.contains_key(&(host, candidate.clone())) {
                break candidate;
            }
            n += 1;
        };
        if self.connections.contains_key(&(branch.0, branch.1.to_string())) {
            bail!("Port {}:{} ist bereits verbunden", branch.0, branch.1);
        }
        log::debug!(
            "Abzweig an Bauteil {} bei ({:.1}, {:.1}, {:.1}) als Port {}",
            host,
            at.x,
            at.y,
            at.z,
            tap_name
        );
        self.connections
            .insert((host, tap_name.clone()), (branch.0, branch.1.to_string()));
        self.connections
            .insert((branch.0, branch.1.to_string()), (host, tap_name));
        Ok(())
    }

    /// Stellt eine Verbindung beim Projekt-Import wieder her.
    ///
    /// Prüft Existenz der Parts und Port-Exklusivität, aber keine
    /// Portnamen — Abzweig-Anschläge tragen synthetische Namen.
    pub fn restore_connection(&mut self, a: (PartId, String), b: (PartId, String)) -> Result<()> {
        for (id, port) in [&a, &b] {
            if !self.parts.contains_key(id) {
                bail!("Verbindung auf unbekanntes Bauteil {}", id);
            }
            if self.connections.contains_key(&(*id, port.clone())) {
                bail!("Port {}:{} ist bereits verbunden", id, port);
            }
        }
        self.connections.insert(a.clone(), b.clone());
        self.connections.insert(b, a);
        Ok(())
    }

    /// Anzahl der Verbindungen (Paare, nicht Richtungs-Einträge).
    pub fn connection_count(&self) -> usize {
        self.connections.len() / 2
    }

    /// Iterator über alle Verbindungen, jede genau einmal.
    pub fn connections_iter(&self) -> impl Iterator<Item = (&(PartId, String), &(PartId, String))> {
        self.connections.iter().filter(|(a, b)| *a < *b)
    }

    /// Alle offenen (unverbundenen) benannten Ports des Modells.
    pub fn open_ports(&self) -> Vec<(PartId, Port)> {
        let mut open = Vec::new();
        for part in self.parts.values() {
            for port in part.ports() {
                if port.is_unnamed() {
                    continue;
                }
                if !self.connections.contains_key(&(part.id, port.name.clone())) {
                    open.push((part.id, port));
                }
            }
        }
        open
    }

    // ── Leitungsgruppen ─────────────────────────────────────────────

    /// Findet die Gruppe zum Tag oder legt sie neu an.
    pub fn find_or_create_line_group(&mut self, tag: &str) -> LineGroupId {
        if let Some((id, _)) = self.line_groups.iter().find(|(_, t)| t.as_str() == tag) {
            return *id;
        }
        if super::parse_line_tag(tag).is_none() {
            log::warn!("Leitungsnummer '{}' entspricht nicht dem Tag-Schema", tag);
        }
        let id = self.next_group_id;
        self.next_group_id += 1;
        self.line_groups.insert(id, tag.to_string());
        id
    }

    /// Gibt das Leitungsnummern-Tag einer Gruppe zurück.
    pub fn group_tag(&self, id: LineGroupId) -> Option<&str> {
        self.line_groups.get(&id).map(String::as_str)
    }

    /// Gibt die Gruppe eines Bauteils zurück.
    pub fn line_group_of(&self, part: PartId) -> Option<LineGroupId> {
        self.parts.get(&part).map(|p| p.group)
    }

    /// Iterator über alle Gruppen.
    pub fn groups_iter(&self) -> impl Iterator<Item = (LineGroupId, &str)> {
        self.line_groups.iter().map(|(id, tag)| (*id, tag.as_str()))
    }

    // ── Arbeitseinheit ──────────────────────────────────────────────

    /// Führt `f` als Alles-oder-Nichts-Arbeitseinheit aus.
    ///
    /// Vor dem Aufruf wird ein Snapshot gezogen; schlägt `f` fehl, wird
    /// der Snapshot zurückgespielt und kein Teilzustand bleibt erhalten.
    pub fn run_unit<T>(&mut self, f: impl FnOnce(&mut PipingModel) -> Result<T>) -> Result<T> {
        let snapshot = self.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self = snapshot;
                log::warn!("Arbeitseinheit zurückgerollt: {:#}", err);
                Err(err)
            }
        }
    }
}

impl Default for PipingModel {
    fn default() -> Self {
        Self::new()
    }
}
