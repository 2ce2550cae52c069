//! Spatial-Index (KD-Tree) über offenen Ports für Snap-Auflösung.

use glam::DVec3;
use kiddo::{KdTree, SquaredEuclidean};

use super::{Pair, PartGeometry, PartId, PartSizeProperties, PipingModel, Port};

/// Ergebnis einer Snap-Auflösung gegen das Modell.
#[derive(Debug, Clone)]
pub struct SnapMatch {
    /// Aufgelöstes Pair (benannter offener Port oder unbenannter Körperpunkt)
    pub pair: Pair,
    /// Eigenschaften des getroffenen Bauteils
    pub props: PartSizeProperties,
    /// Euklidische Distanz zum Abfragepunkt
    pub distance: f64,
}

/// Read-only Index über alle offenen benannten Ports eines Modells.
///
/// Körper-Treffer (Punkt auf einer Lauf-Mittellinie) werden per linearem
/// Scan über die Läufe aufgelöst; die Anzahl der Läufe ist klein gegen
/// die Anzahl der Ports.
#[derive(Debug, Clone)]
pub struct PortIndex {
    tree: KdTree<f64, 3>,
    entries: Vec<(PartId, Port)>,
}

impl PortIndex {
    /// Baut den Index aus den offenen Ports des Modells.
    pub fn from_model(model: &PipingModel) -> Self {
        let entries = model.open_ports();
        let positions: Vec<[f64; 3]> = entries
            .iter()
            .map(|(_, port)| [port.position.x, port.position.y, port.position.z])
            .collect();
        let tree: KdTree<f64, 3> = (&positions).into();
        Self { tree, entries }
    }

    /// Anzahl indexierter Ports.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Prüft ob der Index leer ist.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Findet den nächsten offenen Port innerhalb des Radius.
    pub fn nearest_port(&self, model: &PipingModel, query: DVec3, radius: f64) -> Option<SnapMatch> {
        if self.is_empty() || radius <= 0.0 {
            return None;
        }
        let hit = self
            .tree
            .nearest_one::<SquaredEuclidean>(&[query.x, query.y, query.z]);
        let distance = hit.distance.sqrt();
        if distance > radius {
            return None;
        }
        let (part_id, port) = self.entries.get(hit.item as usize)?.clone();
        let props = model.part(part_id)?.props.clone();
        Some(SnapMatch {
            pair: Pair::new(part_id, port),
            props,
            distance,
        })
    }

    /// Löst einen Abfragepunkt gegen das Modell auf.
    ///
    /// Bevorzugt wird ein offener Port in Reichweite; sonst ein Punkt auf
    /// der Mittellinie eines Laufs, der als unbenannter (abzweigbarer)
    /// Port mit der Lauf-Richtung zurückkommt.
    pub fn resolve(&self, model: &PipingModel, query: DVec3, radius: f64) -> Option<SnapMatch> {
        if let Some(hit) = self.nearest_port(model, query, radius) {
            return Some(hit);
        }

        // Körper-Snap: nächster Punkt auf einer Lauf-Mittellinie
        let mut best: Option<SnapMatch> = None;
        for part in model.parts_iter() {
            let PartGeometry::Run { start, end, .. } = &part.geometry else {
                continue;
            };
            let (start, end) = (*start, *end);
            let axis = end - start;
            let len_sq = axis.length_squared();
            if len_sq < 1e-12 {
                continue;
            }
            let t = ((query - start).dot(axis) / len_sq).clamp(0.0, 1.0);
            let on_line = start + axis * t;
            let distance = (query - on_line).length();
            if distance > radius {
                continue;
            }
            if best.as_ref().is_some_and(|b| b.distance <= distance) {
                continue;
            }
            best = Some(SnapMatch {
                pair: Pair {
                    part: Some(part.id),
                    port: Port::unnamed(on_line, axis.normalize()),
                },
                props: part.props.clone(),
                distance,
            });
        }
        best
    }
}
