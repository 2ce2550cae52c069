//! Der inkrementelle Routing-Kern: Ausrichtung, Bogen-Auswahl,
//! Ketten-Aufbau pro Cursor-Sample, Auto-Routing und Commit.
//!
//! Die schwebende Kette (`PendingChain`) ist ein expliziter Wert im
//! Besitz genau eines Builders; sie wird pro Sample neu aufgebaut und
//! erst durch den Commit dauerhaft.

/// Starrkörper-Ausrichtung von Ports (Andocken, Zwei-Port-Ausrichtung).
pub mod align;
/// Automatisches Verbinden zweier fixer Endpunkte über Versatz-Etagen.
pub mod auto_route;
/// Bogen-Auswahl für einen geforderten Umlenkwinkel.
pub mod elbow;
/// Atomare Persistierung einer akzeptierten Kette.
pub mod commit;
/// Schwebende Bauteile der Kette.
pub mod parts;
/// Zustandsmaschine des interaktiven Ketten-Aufbaus.
pub mod segment;

pub use auto_route::{AutoRouter, PreviewGuard, PreviewSink, RoutePreview};
pub use commit::{commit_chain, CommitReceipt};
pub use elbow::{select_elbow, ElbowChoice};
pub use segment::{BuilderState, RouteSegmentBuilder, RoutingSettings, SettingChange};

use crate::core::Pair;
use parts::{BranchPart, ConnectorPart, ElbowPart, PipeRunPart, ReducerPart};

/// Ein Element der schwebenden Kette mit expliziter Diskriminante.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingElement {
    /// Abzweig von einem unbenannten Körperpunkt
    Branch(BranchPart),
    /// Reduzierung samt Verbinder zur Vorgängerseite
    Reducer {
        /// Verbinder zwischen Kette und Reduzierung
        connector: ConnectorPart,
        /// Die Reduzierung selbst
        reducer: ReducerPart,
    },
    /// Bogen samt Verbinder zur Vorgängerseite
    Elbow {
        /// Verbinder zwischen Kette und Bogen
        connector: ConnectorPart,
        /// Der Bogen selbst
        elbow: ElbowPart,
    },
    /// Rohrlauf, optional mit Verbinder (ohne beim Fortführen/Freistart)
    Run {
        /// Verbinder zwischen Kette und Lauf
        connector: Option<ConnectorPart>,
        /// Der Lauf selbst
        pipe: PipeRunPart,
    },
}

/// Die schwebende, unpersistierte Kette zwischen Anker und Cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChain {
    /// Committeter Anker am festen Ende
    pub anchor: Pair,
    /// Elemente in Ketten-Reihenfolge
    pub elements: Vec<PendingElement>,
    /// Kürzung des Anker-Laufs (Bogen-Ecke rückt an den Ankerpunkt)
    pub cutback: Option<f64>,
}

impl PendingChain {
    /// Anzahl der Elemente.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Prüft ob die Kette leer ist.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Der Lauf am freien Ende, falls vorhanden.
    pub fn tail_run(&self) -> Option<&PipeRunPart> {
        self.elements.iter().rev().find_map(|e| match e {
            PendingElement::Run { pipe, .. } => Some(pipe),
            _ => None,
        })
    }
}
