//! XML Import/Export für Rohrleitungs-Projekte.
//!
//! Dieses Modul implementiert das Schreiben und Parsen des
//! Projekt-Formats: Leitungsgruppen, Parts mit Geometrie-Variante und
//! Port-Verbindungen.

mod parser;
mod writer;

pub use parser::parse_piping_project;
pub use writer::write_piping_project;
