//! Ports (gerichtete Anschlusspunkte) und Pairs (Part+Port-Referenzen).

use glam::{DMat4, DVec3};
use serde::{Deserialize, Serialize};

use super::PartId;

/// Ein benannter, gerichteter Anschlusspunkt eines Bauteils.
///
/// Die Richtung zeigt vom Bauteil weg (nach außen). Ein leerer Name
/// kennzeichnet einen unbenannten Punkt auf dem Bauteilkörper, an dem
/// abgezweigt werden kann.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Weltposition des Anschlusspunkts
    pub position: DVec3,
    /// Richtung nach außen (nicht zwingend normiert)
    pub direction: DVec3,
    /// Name, eindeutig innerhalb des Bauteils ("" = unbenannt/abzweigbar)
    pub name: String,
}

impl Port {
    /// Erstellt einen benannten Port.
    pub fn new(name: impl Into<String>, position: DVec3, direction: DVec3) -> Self {
        Self {
            position,
            direction,
            name: name.into(),
        }
    }

    /// Erstellt einen unbenannten Port (Abzweigpunkt auf einem Körper).
    pub fn unnamed(position: DVec3, direction: DVec3) -> Self {
        Self::new("", position, direction)
    }

    /// Prüft ob der Port unbenannt ist.
    pub fn is_unnamed(&self) -> bool {
        self.name.is_empty()
    }

    /// Gibt den Port nach Anwendung einer Starrkörper-Transformation zurück.
    pub fn transformed(&self, mat: &DMat4) -> Port {
        Port {
            position: mat.transform_point3(self.position),
            direction: mat.transform_vector3(self.direction),
            name: self.name.clone(),
        }
    }

    /// Normierte Richtung; `None` bei degenerierter (Null-)Richtung.
    pub fn unit_direction(&self) -> Option<DVec3> {
        self.direction.try_normalize()
    }
}

/// Referenz "dieser Port dieses Bauteils" — der universelle Anker-Typ.
///
/// `part == None` bezeichnet einen freien Anker im Raum (Routing-Start
/// ohne existierendes Bauteil).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    /// Stabile Identität des besitzenden Bauteils (None = freier Raum)
    pub part: Option<PartId>,
    /// Der referenzierte Port
    pub port: Port,
}

impl Pair {
    /// Erstellt ein Pair für einen Port eines existierenden Bauteils.
    pub fn new(part: PartId, port: Port) -> Self {
        Self {
            part: Some(part),
            port,
        }
    }

    /// Erstellt ein freies Pair (nur Punkt, kein Bauteil).
    pub fn free(position: DVec3) -> Self {
        Self {
            part: None,
            port: Port::unnamed(position, DVec3::ZERO),
        }
    }

    /// Prüft ob das Pair an ein Bauteil gebunden ist.
    pub fn is_attached(&self) -> bool {
        self.part.is_some()
    }
}
