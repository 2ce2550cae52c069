//! Spec-Katalog: Bauteil-Suche nach Spezifikation, Typ und Größenklasse.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::{NominalDiameter, PartSizeProperties};

/// Katalog-Eintrag für einen Bogen.
#[derive(Debug, Clone, PartialEq)]
pub struct ElbowCandidate {
    /// Nennwinkel (Radiant)
    pub angle: f64,
    /// Darf auf einen exakten Winkel gekürzt werden (Cutback)
    pub can_cutback: bool,
    /// Abstand Port → geometrische Ecke
    pub corner_size: f64,
    /// Katalog-Eigenschaften des Bogens
    pub props: PartSizeProperties,
}

/// Aufgelöste Rohr-Vorlage einer Spec/Größe.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeTemplate {
    /// Katalog-Eigenschaften
    pub props: PartSizeProperties,
    /// Außendurchmesser
    pub outer_diameter: f64,
    /// Zulässige Mindestlänge eines Laufs
    pub min_length: f64,
    /// Maximallänge, falls Festlängen-Rohr
    pub fixed_max: Option<f64>,
}

/// Aufgelöste Reduzierungs-Vorlage (von → nach).
#[derive(Debug, Clone, PartialEq)]
pub struct ReducerTemplate {
    /// Katalog-Eigenschaften (Nenngröße = Eingangsseite)
    pub props: PartSizeProperties,
    /// Zielgröße der Ausgangsseite
    pub reduce_to: NominalDiameter,
    /// Baulänge zwischen den Ports
    pub body_length: f64,
}

/// Schnittstelle zum Spec-/Bauteilkatalog des Projekts.
///
/// `fetch_part` und `find_elbows` bilden die Kernabfragen; die
/// Vorlagen-Abfragen sind Komfortmethoden darüber und lesen bekannte
/// Eigenschaftsnamen (`MatchingPipeOd`, `MinLength`, …).
pub trait SpecCatalog {
    /// Sucht ein Bauteil nach Spec, Typ, Größe und optionalen Filtern.
    ///
    /// Filter sind (Eigenschaftsname, Wert)-Paare; alle müssen passen.
    fn fetch_part(
        &self,
        spec: &str,
        part_type: &str,
        nd: &NominalDiameter,
        filters: &[(&str, &str)],
    ) -> Option<PartSizeProperties>;

    /// Liefert alle Bögen der Spec/Größe, aufsteigend nach Nennwinkel.
    ///
    /// `include_bend` schließt Biegungen (gebogene Rohre) mit ein.
    fn find_elbows(
        &self,
        nd: &NominalDiameter,
        spec: &str,
        include_bend: bool,
    ) -> Vec<ElbowCandidate>;

    /// Löst die Rohr-Vorlage der Spec/Größe auf.
    fn pipe_template(&self, spec: &str, nd: &NominalDiameter) -> Option<PipeTemplate> {
        let props = self.fetch_part(spec, "Pipe", nd, &[])?;
        let outer_diameter = props.prop_f64("MatchingPipeOd")?;
        let min_length = props.prop_f64("MinLength").unwrap_or(outer_diameter);
        let fixed_max = props.prop_f64("FixedLengthMax").filter(|v| *v > 0.0);
        Some(PipeTemplate {
            props,
            outer_diameter,
            min_length,
            fixed_max,
        })
    }

    /// Löst eine Reduzierung von `from` nach `to` auf.
    fn reducer_template(
        &self,
        spec: &str,
        from: &NominalDiameter,
        to: &NominalDiameter,
    ) -> Option<ReducerTemplate> {
        let to_display = to.display();
        let props = self.fetch_part(spec, "Reducer", from, &[("ReduceTo", &to_display)])?;
        let body_length = props.prop_f64("BodyLength").unwrap_or(from.value.max(to.value));
        Some(ReducerTemplate {
            props,
            reduce_to: to.clone(),
            body_length,
        })
    }

    /// Löst das Abzweig-Fitting auf (Stutzen bei Stub-in, sonst T-Stück).
    fn branch_fitting(
        &self,
        spec: &str,
        host_nd: &NominalDiameter,
        branch_nd: &NominalDiameter,
        stub_in: bool,
    ) -> Option<PartSizeProperties> {
        let part_type = if stub_in { "Olet" } else { "Tee" };
        let branch_display = branch_nd.display();
        self.fetch_part(spec, part_type, host_nd, &[("BranchSize", &branch_display)])
            .or_else(|| self.fetch_part(spec, part_type, host_nd, &[]))
    }
}

// ── In-Memory-Katalog ───────────────────────────────────────────────

/// Einfacher In-Memory-Katalog, ladbar aus einer TOML-Datei.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    parts: Vec<PartSizeProperties>,
}

/// TOML-Wurzel eines Katalogs.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    part: Vec<CatalogEntry>,
}

/// Einzelner Katalog-Eintrag in TOML-Form.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    spec: String,
    part_type: String,
    size: String,
    #[serde(default)]
    props: indexmap::IndexMap<String, String>,
}

impl InMemoryCatalog {
    /// Erstellt einen leeren Katalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fügt einen fertigen Eigenschafts-Datensatz hinzu.
    pub fn add_part(&mut self, props: PartSizeProperties) {
        self.parts.push(props);
    }

    /// Fügt ein Rohr hinzu.
    pub fn add_pipe(&mut self, spec: &str, nd: NominalDiameter, outer_diameter: f64, min_length: f64) {
        let record = format!("P-{}-{}", spec, nd.display());
        self.add_part(
            PartSizeProperties::new(spec, "Pipe", nd)
                .with_prop("MatchingPipeOd", format!("{outer_diameter}"))
                .with_prop("MinLength", format!("{min_length}"))
                .with_prop("SizeRecordId", record),
        );
    }

    /// Fügt ein Festlängen-Rohr hinzu.
    pub fn add_fixed_length_pipe(
        &mut self,
        spec: &str,
        nd: NominalDiameter,
        outer_diameter: f64,
        min_length: f64,
        max_length: f64,
    ) {
        let record = format!("PF-{}-{}", spec, nd.display());
        self.add_part(
            PartSizeProperties::new(spec, "Pipe", nd)
                .with_prop("MatchingPipeOd", format!("{outer_diameter}"))
                .with_prop("MinLength", format!("{min_length}"))
                .with_prop("FixedLengthMax", format!("{max_length}"))
                .with_prop("SizeRecordId", record),
        );
    }

    /// Fügt einen Bogen hinzu (Winkel in Grad).
    pub fn add_elbow(
        &mut self,
        spec: &str,
        nd: NominalDiameter,
        angle_deg: f64,
        can_cutback: bool,
        corner_size: f64,
    ) {
        let record = format!("E-{}-{}-{}", spec, nd.display(), angle_deg);
        self.add_part(
            PartSizeProperties::new(spec, "Elbow", nd)
                .with_prop("Angle", format!("{angle_deg}"))
                .with_prop("CanCutback", if can_cutback { "true" } else { "false" })
                .with_prop("CornerSize", format!("{corner_size}"))
                .with_prop("SizeRecordId", record),
        );
    }

    /// Fügt eine Reduzierung hinzu.
    pub fn add_reducer(
        &mut self,
        spec: &str,
        from: NominalDiameter,
        to: &NominalDiameter,
        body_length: f64,
    ) {
        let record = format!("R-{}-{}-{}", spec, from.display(), to.display());
        self.add_part(
            PartSizeProperties::new(spec, "Reducer", from)
                .with_prop("ReduceTo", to.display())
                .with_prop("BodyLength", format!("{body_length}"))
                .with_prop("SizeRecordId", record),
        );
    }

    /// Fügt ein Abzweig-Fitting hinzu (`Tee` oder `Olet`).
    pub fn add_branch_fitting(
        &mut self,
        spec: &str,
        part_type: &str,
        host_nd: NominalDiameter,
        branch_nd: &NominalDiameter,
    ) {
        let record = format!("B-{}-{}-{}", spec, host_nd.display(), branch_nd.display());
        self.add_part(
            PartSizeProperties::new(spec, part_type, host_nd)
                .with_prop("BranchSize", branch_nd.display())
                .with_prop("SizeRecordId", record),
        );
    }

    /// Lädt einen Katalog aus TOML-Text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(text).context("Katalog-TOML nicht lesbar")?;
        let mut catalog = Self::new();
        for entry in file.part {
            let nd = NominalDiameter::from_display_string(&entry.size)
                .with_context(|| format!("Ungültige Größe im Katalog: {}", entry.size))?;
            let mut props = PartSizeProperties::new(entry.spec, entry.part_type, nd);
            props.props = entry.props;
            catalog.add_part(props);
        }
        Ok(catalog)
    }

    /// Lädt einen Katalog aus einer TOML-Datei.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Katalogdatei nicht lesbar: {}", path.display()))?;
        Self::from_toml_str(&text)
    }

    /// Anzahl der Katalog-Einträge.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Prüft ob der Katalog leer ist.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl SpecCatalog for InMemoryCatalog {
    fn fetch_part(
        &self,
        spec: &str,
        part_type: &str,
        nd: &NominalDiameter,
        filters: &[(&str, &str)],
    ) -> Option<PartSizeProperties> {
        self.parts
            .iter()
            .find(|p| {
                p.spec.eq_ignore_ascii_case(spec)
                    && p.part_type.eq_ignore_ascii_case(part_type)
                    && p.nominal_diameter == *nd
                    && filters
                        .iter()
                        .all(|&(k, v)| p.prop_value(k).is_some_and(|pv| pv.eq_ignore_ascii_case(v)))
            })
            .cloned()
    }

    fn find_elbows(
        &self,
        nd: &NominalDiameter,
        spec: &str,
        include_bend: bool,
    ) -> Vec<ElbowCandidate> {
        let mut elbows: Vec<ElbowCandidate> = self
            .parts
            .iter()
            .filter(|p| {
                p.spec.eq_ignore_ascii_case(spec)
                    && p.nominal_diameter == *nd
                    && (p.part_type.eq_ignore_ascii_case("Elbow")
                        || (include_bend && p.part_type.eq_ignore_ascii_case("PipeBend")))
            })
            .filter_map(|p| {
                let angle_deg = p.prop_f64("Angle")?;
                Some(ElbowCandidate {
                    angle: angle_deg.to_radians(),
                    can_cutback: p
                        .prop_value("CanCutback")
                        .is_some_and(|v| v.eq_ignore_ascii_case("true")),
                    corner_size: p.prop_f64("CornerSize").unwrap_or(0.0),
                    props: p.clone(),
                })
            })
            .collect();
        elbows.sort_by(|a, b| a.angle.total_cmp(&b.angle));
        elbows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> InMemoryCatalog {
        let nd = NominalDiameter::new("in", 6.0);
        let mut catalog = InMemoryCatalog::new();
        catalog.add_pipe("CS300", nd.clone(), 168.3, 50.0);
        catalog.add_elbow("CS300", nd.clone(), 90.0, true, 229.0);
        catalog.add_elbow("CS300", nd.clone(), 45.0, false, 95.0);
        catalog.add_reducer("CS300", nd, &NominalDiameter::new("in", 4.0), 140.0);
        catalog
    }

    #[test]
    fn fetch_part_matches_filters() {
        let catalog = sample_catalog();
        let nd = NominalDiameter::new("in", 6.0);
        let reducer = catalog
            .fetch_part("CS300", "Reducer", &nd, &[("ReduceTo", "4in")])
            .expect("Reduzierung erwartet");
        assert_eq!(reducer.prop_value("BodyLength"), Some("140"));

        assert!(catalog
            .fetch_part("CS300", "Reducer", &nd, &[("ReduceTo", "2in")])
            .is_none());
    }

    #[test]
    fn find_elbows_sorted_ascending() {
        let catalog = sample_catalog();
        let elbows = catalog.find_elbows(&NominalDiameter::new("in", 6.0), "CS300", false);
        assert_eq!(elbows.len(), 2);
        assert!(elbows[0].angle < elbows[1].angle);
        assert!(!elbows[0].can_cutback);
        assert!(elbows[1].can_cutback);
    }

    #[test]
    fn pipe_template_reads_known_props() {
        let catalog = sample_catalog();
        let template = catalog
            .pipe_template("CS300", &NominalDiameter::new("in", 6.0))
            .expect("Rohr-Vorlage erwartet");
        assert_eq!(template.outer_diameter, 168.3);
        assert_eq!(template.min_length, 50.0);
        assert!(template.fixed_max.is_none());
    }

    #[test]
    fn toml_round_trip() {
        let text = r#"
[[part]]
spec = "CS300"
part_type = "Pipe"
size = "6in"

[part.props]
MatchingPipeOd = "168.3"
MinLength = "50"

[[part]]
spec = "CS300"
part_type = "Elbow"
size = "6in"

[part.props]
Angle = "90"
CanCutback = "true"
CornerSize = "229"
"#;
        let catalog = InMemoryCatalog::from_toml_str(text).expect("Katalog erwartet");
        assert_eq!(catalog.len(), 2);
        let nd = NominalDiameter::new("in", 6.0);
        assert!(catalog.pipe_template("CS300", &nd).is_some());
        assert_eq!(catalog.find_elbows(&nd, "CS300", false).len(), 1);
    }
}
