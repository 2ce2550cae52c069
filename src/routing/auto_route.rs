//! Auto-Routing: verbindet zwei fixe Endpunkte über Versatz-Etagen.
//!
//! Der Pfad verlässt den Startport entlang seiner Richtung und kommt am
//! Endport entlang dessen Richtung an. Kandidaten: direkter Lauf,
//! einzelne Ecke am Strahlschnittpunkt, oder die beiden Etagen-Anordnungen
//! (Start-Strahl bzw. End-Strahl nimmt den Längsversatz auf).

use anyhow::{anyhow, Result};
use glam::DVec3;

use crate::core::{ElbowCandidate, LineGroupId, Pair, PipeTemplate, PipingModel, Port, SpecCatalog};
use crate::routing::align::align_matrix;
use crate::routing::commit::{commit_chain, CommitReceipt};
use crate::routing::elbow::{select_elbow, ElbowChoice};
use crate::routing::parts::{ConnectorPart, ElbowPart, PipeRunPart};
use crate::routing::segment::RoutingSettings;
use crate::routing::{PendingChain, PendingElement};
use crate::shared::DISTANCE_EPSILON;

/// Winkel gelten als katalog-gleich unterhalb dieser Toleranz (Radiant).
const ANGLE_MATCH_TOLERANCE: f64 = 1e-6;
/// Strahlen gelten als schneidend unterhalb dieses Abstands.
const INTERSECT_TOLERANCE: f64 = 1e-6;

/// Vorschau-Geometrie eines Kandidaten (reine Daten für das Rendering).
#[derive(Debug, Clone, Default)]
pub struct RoutePreview {
    /// Polylinien-Punkte: Start, Ecken, Ende
    pub points: Vec<DVec3>,
    /// Umlenkwinkel je Ecke (Radiant)
    pub corner_angles: Vec<f64>,
    /// Außendurchmesser der Läufe
    pub outer_diameter: f64,
}

/// Abnehmer der Vorschau-Geometrie (Render-Schicht des Hosts).
pub trait PreviewSink {
    /// Beginnt einen Vorschau-Zyklus mit der Kandidaten-Geometrie.
    fn begin_frame(&mut self, preview: &RoutePreview);
    /// Beendet den Zyklus und gibt alle Vorschau-Ressourcen frei.
    fn end_frame(&mut self);
}

/// Scope-Guard eines Vorschau-Zyklus: `end_frame` läuft garantiert beim
/// Drop, Vorschau-Ressourcen können Aufrufe nicht überleben.
pub struct PreviewGuard<'a> {
    sink: &'a mut dyn PreviewSink,
}

impl Drop for PreviewGuard<'_> {
    fn drop(&mut self) {
        self.sink.end_frame();
    }
}

/// Ein realisierbarer Kandidaten-Pfad.
#[derive(Debug, Clone)]
struct CandidatePath {
    chain: PendingChain,
    preview: RoutePreview,
}

/// Auto-Router zwischen zwei fixen Endpunkten.
pub struct AutoRouter {
    end: Pair,
    line_number: String,
    candidates: Vec<CandidatePath>,
    current: usize,
}

impl AutoRouter {
    /// Enumeriert alle realisierbaren Pfade zwischen `start` und `end`.
    ///
    /// Schlägt fehl, wenn Portrichtungen degeneriert sind oder die Spec
    /// kein Rohr liefert; null Kandidaten sind kein Fehler — der Aufrufer
    /// prüft `path_count`.
    pub fn new(
        start: Pair,
        end: Pair,
        settings: &RoutingSettings,
        catalog: &dyn SpecCatalog,
    ) -> Result<Self> {
        let d1 = start
            .port
            .unit_direction()
            .ok_or_else(|| anyhow!("Startport ohne Richtung"))?;
        let d2 = end
            .port
            .unit_direction()
            .ok_or_else(|| anyhow!("Endport ohne Richtung"))?;
        let template = catalog
            .pipe_template(&settings.spec, &settings.size)
            .ok_or_else(|| {
                anyhow!(
                    "Kein Rohr {} in Spec {} gefunden",
                    settings.size,
                    settings.spec
                )
            })?;
        let elbows = catalog.find_elbows(&settings.size, &settings.spec, settings.bent_pipe);

        let enumerator = Enumerator {
            p1: start.port.position,
            d1,
            p2: end.port.position,
            d2,
            start: start.clone(),
            template,
            elbows,
            settings: settings.clone(),
        };
        let candidates = enumerator.enumerate();
        log::info!("Auto-Routing: {} Kandidaten", candidates.len());

        Ok(Self {
            end,
            line_number: settings.line_number.clone(),
            candidates,
            current: 0,
        })
    }

    /// Anzahl realisierbarer Pfade.
    pub fn path_count(&self) -> usize {
        self.candidates.len()
    }

    /// Index des aktuell gewählten Pfads.
    pub fn current_path(&self) -> usize {
        self.current
    }

    /// Wählt einen Kandidaten-Pfad.
    pub fn set_current_path(&mut self, index: usize) -> Result<()> {
        if index >= self.candidates.len() {
            return Err(anyhow!(
                "Pfad {} existiert nicht ({} Kandidaten)",
                index,
                self.candidates.len()
            ));
        }
        self.current = index;
        Ok(())
    }

    /// Vorschau-Geometrie des aktuellen Kandidaten.
    pub fn preview_data(&self) -> Result<&RoutePreview> {
        self.candidates
            .get(self.current)
            .map(|c| &c.preview)
            .ok_or_else(|| anyhow!("Keine realisierbaren Pfade"))
    }

    /// Beginnt einen Vorschau-Zyklus; der Guard beendet ihn beim Drop.
    pub fn preview<'a>(&self, sink: &'a mut dyn PreviewSink) -> Result<PreviewGuard<'a>> {
        let preview = self.preview_data()?;
        sink.begin_frame(preview);
        Ok(PreviewGuard { sink })
    }

    /// Übernimmt den aktuellen Kandidaten in das Modell.
    pub fn append(
        &self,
        model: &mut PipingModel,
        group_hint: Option<LineGroupId>,
    ) -> Result<CommitReceipt> {
        let candidate = self
            .candidates
            .get(self.current)
            .ok_or_else(|| anyhow!("Keine realisierbaren Pfade"))?;
        commit_chain(
            model,
            &candidate.chain,
            &self.line_number,
            group_hint,
            Some(&self.end),
        )
    }
}

// ── Kandidaten-Aufzählung ───────────────────────────────────────────

struct Enumerator {
    p1: DVec3,
    d1: DVec3,
    p2: DVec3,
    d2: DVec3,
    start: Pair,
    template: PipeTemplate,
    elbows: Vec<ElbowCandidate>,
    settings: RoutingSettings,
}

impl Enumerator {
    fn enumerate(&self) -> Vec<CandidatePath> {
        let w = self.p2 - self.p1;

        // Direkter Lauf: gleiche Richtung, Versatz liegt auf dem Strahl
        let collinear = self.d1.dot(self.d2) > 1.0 - ANGLE_MATCH_TOLERANCE;
        let lateral = w - self.d1 * w.dot(self.d1);
        if collinear && lateral.length() < INTERSECT_TOLERANCE {
            let along = w.dot(self.d1);
            if along >= self.template.min_length {
                return self.direct_run().into_iter().collect();
            }
            return Vec::new();
        }

        // Einzelne Ecke am Schnittpunkt von Start-Strahl und End-Gegenstrahl
        if let Some(candidate) = self.single_corner() {
            return vec![candidate];
        }

        // Versatz-Etage in beiden Anordnungen
        let mut candidates = Vec::new();
        if let Some(a) = self.offset_jog(JogOrder::CornerNearEnd) {
            candidates.push(a);
        }
        if let Some(b) = self.offset_jog(JogOrder::CornerNearStart) {
            candidates.push(b);
        }
        candidates
    }

    /// Wählt einen Bogen für einen Etagen-Winkel; diskrete Bögen müssen
    /// exakt passen — ein Auto-Pfad muss geometrisch schließen.
    fn elbow_for(&self, angle: f64) -> Option<ElbowChoice> {
        let choice = select_elbow(
            angle,
            &self.elbows,
            self.settings.cutback_elbow,
            self.settings.bent_pipe,
        );
        match &choice {
            ElbowChoice::None => None,
            ElbowChoice::Bend(_) | ElbowChoice::Cutback(_, _) => Some(choice),
            ElbowChoice::Fixed(candidate) => {
                ((candidate.angle - angle).abs() < ANGLE_MATCH_TOLERANCE).then_some(choice)
            }
        }
    }

    /// Lauf-Längen unterhalb der Epsilon-Schwelle entfallen; dazwischen
    /// gilt die Mindestlänge.
    fn leg_ok(&self, length: f64) -> bool {
        length < DISTANCE_EPSILON || length >= self.template.min_length
    }

    fn direct_run(&self) -> Option<CandidatePath> {
        let mut walker = ChainWalker::new(&self.start, &self.template, &self.settings);
        walker.push_run(self.p2);
        Some(CandidatePath {
            chain: walker.finish(),
            preview: self.preview_of(&[self.p1, self.p2], &[]),
        })
    }

    /// Einzelner Bogen dort, wo sich Start-Strahl und End-Gegenstrahl
    /// treffen.
    fn single_corner(&self) -> Option<CandidatePath> {
        // Nächste Punkte der Geraden (p1 + t·d1) und (p2 − u·d2)
        let a = self.d1;
        let b = -self.d2;
        let r = self.p1 - self.p2;
        let a_dot_b = a.dot(b);
        let denom = 1.0 - a_dot_b * a_dot_b;
        if denom.abs() < 1e-12 {
            return None;
        }
        let t = (a_dot_b * b.dot(r) - a.dot(r)) / denom;
        let u = (b.dot(r) - a_dot_b * a.dot(r)) / denom;
        if t <= DISTANCE_EPSILON || u <= DISTANCE_EPSILON {
            return None;
        }
        let on_start = self.p1 + a * t;
        let on_end = self.p2 + b * u;
        if (on_start - on_end).length() > INTERSECT_TOLERANCE {
            return None;
        }

        let corner = on_start;
        let angle = self.d1.angle_between(self.d2);
        let choice = self.elbow_for(angle)?;
        let corner_size = elbow_corner_size(&choice, &self.template);

        let leg_in = t - corner_size;
        let leg_out = u - corner_size;
        if leg_in < -DISTANCE_EPSILON || leg_out < -DISTANCE_EPSILON {
            return None;
        }
        if !self.leg_ok(leg_in.max(0.0)) || !self.leg_ok(leg_out.max(0.0)) {
            return None;
        }

        let mut walker = ChainWalker::new(&self.start, &self.template, &self.settings);
        walker.push_run(corner - self.d1 * corner_size);
        walker.push_elbow(&choice, self.d1, self.d2, &self.template);
        walker.push_run(self.p2);
        Some(CandidatePath {
            chain: walker.finish(),
            preview: self.preview_of(&[self.p1, corner, self.p2], &[angle]),
        })
    }

    fn offset_jog(&self, order: JogOrder) -> Option<CandidatePath> {
        let w = self.p2 - self.p1;

        // Etagen-Richtung: Restversatz senkrecht zum absorbierenden Strahl
        let absorber = match order {
            JogOrder::CornerNearEnd => self.d1,
            JogOrder::CornerNearStart => self.d2,
        };
        let mid = (w - absorber * w.dot(absorber)).try_normalize()?;

        let angle_in = self.d1.angle_between(mid);
        let angle_out = mid.angle_between(self.d2);
        let choice_in = self.elbow_for(angle_in)?;
        let choice_out = self.elbow_for(angle_out)?;
        let c1 = elbow_corner_size(&choice_in, &self.template);
        let c2 = elbow_corner_size(&choice_out, &self.template);

        match order {
            JogOrder::CornerNearEnd => {
                // Bogen 2 dockt am Endport: rückwärts von p2 konstruieren
                let corner2 = self.p2 - self.d2 * c2;
                let near2 = corner2 - mid * c2;
                let reach = near2 - self.p1;
                let t = reach.dot(self.d1);
                let rise = reach.dot(mid);
                // Geometrie muss exakt schließen
                let residual = reach - self.d1 * t - mid * rise;
                if residual.length() > INTERSECT_TOLERANCE {
                    return None;
                }
                let leg_start = t - c1;
                let leg_mid = rise - c1;
                if leg_start < -DISTANCE_EPSILON || leg_mid <= DISTANCE_EPSILON {
                    return None;
                }
                if !self.leg_ok(leg_start.max(0.0)) || !self.leg_ok(leg_mid) {
                    return None;
                }
                let corner1 = self.p1 + self.d1 * t;

                let mut walker = ChainWalker::new(&self.start, &self.template, &self.settings);
                walker.push_run(corner1 - self.d1 * c1);
                walker.push_elbow(&choice_in, self.d1, mid, &self.template);
                walker.push_run(near2);
                walker.push_elbow(&choice_out, mid, self.d2, &self.template);
                Some(CandidatePath {
                    chain: walker.finish(),
                    preview: self.preview_of(
                        &[self.p1, corner1, corner2, self.p2],
                        &[angle_in, angle_out],
                    ),
                })
            }
            JogOrder::CornerNearStart => {
                // Bogen 1 dockt am Startport: vorwärts von p1 konstruieren
                let corner1 = self.p1 + self.d1 * c1;
                let far1 = corner1 + mid * c1;
                let reach = self.p2 - far1;
                let run_end = reach.dot(self.d2);
                let rise = reach.dot(mid);
                let residual = reach - self.d2 * run_end - mid * rise;
                if residual.length() > INTERSECT_TOLERANCE {
                    return None;
                }
                let leg_mid = rise - c2;
                let leg_end = run_end - c2;
                if leg_mid <= DISTANCE_EPSILON || leg_end < -DISTANCE_EPSILON {
                    return None;
                }
                if !self.leg_ok(leg_mid) || !self.leg_ok(leg_end.max(0.0)) {
                    return None;
                }
                let corner2 = far1 + mid * leg_mid + mid * c2;

                let mut walker = ChainWalker::new(&self.start, &self.template, &self.settings);
                walker.push_elbow(&choice_in, self.d1, mid, &self.template);
                walker.push_run(corner2 - mid * c2);
                walker.push_elbow(&choice_out, mid, self.d2, &self.template);
                walker.push_run(self.p2);
                Some(CandidatePath {
                    chain: walker.finish(),
                    preview: self.preview_of(
                        &[self.p1, corner1, corner2, self.p2],
                        &[angle_in, angle_out],
                    ),
                })
            }
        }
    }

    fn preview_of(&self, points: &[DVec3], angles: &[f64]) -> RoutePreview {
        RoutePreview {
            points: points.to_vec(),
            corner_angles: angles.to_vec(),
            outer_diameter: self.template.outer_diameter,
        }
    }
}

/// Anordnung der Versatz-Etage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JogOrder {
    /// Start-Strahl absorbiert den Längsversatz, Etage am Ende
    CornerNearEnd,
    /// End-Strahl absorbiert den Längsversatz, Etage am Start
    CornerNearStart,
}

/// Eckenabstand der Bogen-Auswahl.
fn elbow_corner_size(choice: &ElbowChoice, template: &PipeTemplate) -> f64 {
    ElbowPart::from_choice(choice, template)
        .map(|e| e.corner_size)
        .unwrap_or(0.0)
}

// ── Sequenzieller Ketten-Aufbau ─────────────────────────────────────

/// Baut die Kette eines Kandidaten sequenziell vom Startport aus auf.
struct ChainWalker {
    anchor: Pair,
    elements: Vec<PendingElement>,
    last_port: Port,
    template: PipeTemplate,
    settings: RoutingSettings,
}

impl ChainWalker {
    fn new(start: &Pair, template: &PipeTemplate, settings: &RoutingSettings) -> Self {
        Self {
            anchor: start.clone(),
            elements: Vec::new(),
            last_port: start.port.clone(),
            template: template.clone(),
            settings: settings.clone(),
        }
    }

    fn make_connector(&self) -> ConnectorPart {
        // Auto-Pfade schließen exakt; Spalt 0 hält die Geometrie dicht
        ConnectorPart::new(
            &self.settings.spec,
            self.settings.size.clone(),
            self.settings.slope_tolerance,
            self.settings.offset_tolerance,
            0.0,
        )
    }

    /// Lauf vom aktuellen Ende bis `to`; entfällt bei Null-Länge.
    fn push_run(&mut self, to: DVec3) {
        if (to - self.last_port.position).length() < DISTANCE_EPSILON {
            return;
        }
        let mut connector = self.make_connector();
        connector.attach_to(&self.last_port);
        let start = connector.end().position;
        let mut pipe = PipeRunPart::from_template(&self.template, start, to - start);
        pipe.start = start;
        pipe.end = to;
        self.last_port = pipe.end_port();
        self.elements.push(PendingElement::Run {
            connector: Some(connector),
            pipe,
        });
    }

    /// Bogen am aktuellen Ende: dockt an, ferner Schenkel zeigt in `out_dir`.
    fn push_elbow(&mut self, choice: &ElbowChoice, in_dir: DVec3, out_dir: DVec3, template: &PipeTemplate) {
        let Some(mut elbow) = ElbowPart::from_choice(choice, template) else {
            return;
        };
        let mut connector = self.make_connector();
        connector.attach_to(&self.last_port);
        let dock = Port::unnamed(connector.end().position, in_dir);
        let reference = Port::unnamed(dock.position + out_dir, -out_dir);
        let mat = align_matrix(elbow.near(), elbow.far(), &dock, &reference);
        elbow.transform_by(&mat);
        self.last_port = elbow.far().clone();
        self.elements.push(PendingElement::Elbow { connector, elbow });
    }

    fn finish(self) -> PendingChain {
        PendingChain {
            anchor: self.anchor,
            elements: self.elements,
            cutback: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InMemoryCatalog, NominalDiameter};

    fn nd6() -> NominalDiameter {
        NominalDiameter::new("in", 6.0)
    }

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_pipe("CS300", nd6(), 168.3, 10.0);
        catalog.add_elbow("CS300", nd6(), 90.0, false, 5.0);
        catalog
    }

    fn settings() -> RoutingSettings {
        RoutingSettings {
            spec: "CS300".to_string(),
            size: nd6(),
            cutback_elbow: false,
            bent_pipe: false,
            stub_in: false,
            tolerance_routing: false,
            line_number: "25-100-CS300".to_string(),
            weld_gap: 0.0,
            slope_tolerance: 0.1,
            offset_tolerance: 0.0,
        }
    }

    fn pair(pos: [f64; 3], dir: [f64; 3]) -> Pair {
        Pair {
            part: Some(1),
            port: Port::new("S2", DVec3::from_array(pos), DVec3::from_array(dir)),
        }
    }

    #[test]
    fn parallel_offset_ports_yield_two_jog_orderings() {
        let start = pair([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let end = pair([50.0, 50.0, 0.0], [1.0, 0.0, 0.0]);

        let router =
            AutoRouter::new(start, end, &settings(), &catalog()).expect("Router erwartet");
        assert_eq!(router.path_count(), 2);
    }

    #[test]
    fn collinear_ports_yield_direct_run() {
        let start = pair([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let end = pair([200.0, 0.0, 0.0], [1.0, 0.0, 0.0]);

        let router =
            AutoRouter::new(start, end, &settings(), &catalog()).expect("Router erwartet");
        assert_eq!(router.path_count(), 1);
        let preview = router.preview_data().expect("Vorschau erwartet");
        assert!(preview.corner_angles.is_empty());
        assert_eq!(preview.points.len(), 2);
    }

    #[test]
    fn intersecting_rays_yield_single_corner() {
        // Start nach +X, Ende bei (100, -80) nach -Y: Gegenstrahl +Y
        // schneidet den Start-Strahl bei (100, 0)
        let start = pair([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let end = pair([100.0, -80.0, 0.0], [0.0, -1.0, 0.0]);

        let router =
            AutoRouter::new(start, end, &settings(), &catalog()).expect("Router erwartet");
        assert_eq!(router.path_count(), 1);
        let preview = router.preview_data().expect("Vorschau erwartet");
        assert_eq!(preview.points.len(), 3);
        assert!((preview.points[1] - DVec3::new(100.0, 0.0, 0.0)).length() < 1e-6);
        assert!((preview.corner_angles[0] - 90.0_f64.to_radians()).abs() < 1e-9);
    }

    #[test]
    fn infeasible_angles_yield_zero_paths() {
        // Nur 90°-Bögen im Katalog, aber 45°-Versatz nötig
        let start = pair([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let end = pair([100.0, 50.0, 0.0], [0.70710678, 0.70710678, 0.0]);

        let router =
            AutoRouter::new(start, end, &settings(), &catalog()).expect("Router erwartet");
        assert_eq!(router.path_count(), 0);
        assert!(router.preview_data().is_err());
    }

    #[test]
    fn short_legs_exclude_candidates() {
        // Versatz kleiner als die Mindestlänge der Läufe
        let start = pair([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let end = pair([50.0, 4.0, 0.0], [1.0, 0.0, 0.0]);

        let router =
            AutoRouter::new(start, end, &settings(), &catalog()).expect("Router erwartet");
        assert_eq!(router.path_count(), 0);
    }

    #[test]
    fn set_current_path_bounds_checked() {
        let start = pair([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let end = pair([50.0, 50.0, 0.0], [1.0, 0.0, 0.0]);
        let mut router =
            AutoRouter::new(start, end, &settings(), &catalog()).expect("Router erwartet");
        assert!(router.set_current_path(1).is_ok());
        assert!(router.set_current_path(2).is_err());
    }

    struct CountingSink {
        begun: usize,
        ended: usize,
    }

    impl PreviewSink for CountingSink {
        fn begin_frame(&mut self, _preview: &RoutePreview) {
            self.begun += 1;
        }
        fn end_frame(&mut self) {
            self.ended += 1;
        }
    }

    #[test]
    fn preview_guard_releases_on_drop() {
        let start = pair([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let end = pair([50.0, 50.0, 0.0], [1.0, 0.0, 0.0]);
        let router =
            AutoRouter::new(start, end, &settings(), &catalog()).expect("Router erwartet");

        let mut sink = CountingSink { begun: 0, ended: 0 };
        {
            let _guard = router.preview(&mut sink).expect("Vorschau erwartet");
        }
        assert_eq!(sink.begun, 1);
        assert_eq!(sink.ended, 1);
    }
}
