//! Core-Domänentypen: Ports, Parts, Katalog, Modell-Store und Spatial-Index.
//!
//! Dieses Modul definiert die Haupt-Datenstrukturen:
//! - PipingModel: persistenter Container für alle Parts und Port-Verbindungen
//! - PlacedPart: einzelnes Bauteil mit Geometrie und Katalog-Eigenschaften
//! - Port/Pair: gerichtete Anschlusspunkte und deren Referenzen
//! - SpecCatalog: Schnittstelle zum Spec-/Bauteilkatalog

pub mod catalog;
pub mod model;
pub mod part;
pub mod port;
pub mod spatial;
pub mod tag;
pub mod units;

pub use catalog::{ElbowCandidate, InMemoryCatalog, PipeTemplate, ReducerTemplate, SpecCatalog};
pub use model::{LineGroupId, PipingModel};
pub use part::{PartGeometry, PartId, PartSizeProperties, PlacedPart};
pub use port::{Pair, Port};
pub use spatial::{PortIndex, SnapMatch};
pub use tag::{format_line_tag, parse_line_tag, LineTag};
pub use units::NominalDiameter;
