//! Zustandsmaschine des interaktiven Ketten-Aufbaus.
//!
//! Pro Cursor-Sample wird die schwebende Kette vollständig neu
//! abgeleitet: optionaler Abzweig, optionale Reduzierung, optionaler
//! Bogen, Verbinder und Rohrlauf. Zustand hält der Builder nur für
//! Anker, Einstellungen und Katalog-Caches.

use anyhow::{anyhow, Context, Result};
use glam::{DMat4, DVec3};

use crate::core::{
    ElbowCandidate, LineGroupId, NominalDiameter, Pair, PartSizeProperties, PipeTemplate,
    PipingModel, Port, SpecCatalog,
};
use crate::routing::align::align_matrix;
use crate::routing::commit::{commit_chain, CommitReceipt};
use crate::routing::elbow::select_elbow;
use crate::routing::parts::{BranchPart, ConnectorPart, ElbowPart, PipeRunPart, ReducerPart};
use crate::routing::{PendingChain, PendingElement};
use crate::shared::options::RouterOptions;
use crate::shared::{ANGLE_EPSILON, DISTANCE_EPSILON};

/// Zustände des Builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// Kein Anker gesetzt
    Idle,
    /// Anker gesetzt, noch keine Vorschau
    AnchorSet,
    /// Schwebende Kette folgt dem Cursor
    Previewing,
}

/// Aktive Routing-Einstellungen des Builders.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingSettings {
    /// Aktive Spezifikation
    pub spec: String,
    /// Aktive Größenklasse
    pub size: NominalDiameter,
    /// Cutback-Bögen verwenden
    pub cutback_elbow: bool,
    /// Biegungen statt Katalog-Bögen verwenden
    pub bent_pipe: bool,
    /// Abzweige als Stutzen ausführen
    pub stub_in: bool,
    /// Toleranz-Routing aktiv
    pub tolerance_routing: bool,
    /// Aktuelle Leitungsnummer
    pub line_number: String,
    /// Schweißspalt
    pub weld_gap: f64,
    /// Winkeltoleranz neuer Verbinder
    pub slope_tolerance: f64,
    /// Versatztoleranz neuer Verbinder
    pub offset_tolerance: f64,
}

impl RoutingSettings {
    /// Übernimmt die Laufzeit-Optionen; die Größe wird geparst.
    pub fn from_options(options: &RouterOptions) -> Result<Self> {
        let size = NominalDiameter::from_display_string(&options.size)
            .with_context(|| format!("Ungültige Größenklasse: {}", options.size))?;
        Ok(Self {
            spec: options.spec.clone(),
            size,
            cutback_elbow: options.cutback_elbow,
            bent_pipe: options.bent_pipe,
            stub_in: options.stub_in,
            tolerance_routing: options.tolerance_routing,
            line_number: options.line_number.clone(),
            weld_gap: options.weld_gap,
            slope_tolerance: options.slope_tolerance,
            offset_tolerance: options.offset_tolerance,
        })
    }
}

/// Einzelne Einstellungs-Änderung während des Routings.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    /// Neue Spezifikation (invalidiert Katalog-Caches)
    Spec(String),
    /// Neue Größenklasse (invalidiert Katalog-Caches)
    Size(NominalDiameter),
    /// Cutback-Bögen ein/aus
    Cutback(bool),
    /// Biegungen ein/aus
    PipeBend(bool),
    /// Stub-in ein/aus
    StubIn(bool),
    /// Toleranz-Routing ein/aus
    ToleranceRouting(bool),
    /// Neue Leitungsnummer (löst die Gruppe neu auf)
    LineNumber(String),
}

/// Beim Anker-Setzen erfasste Daten des Anker-Laufs.
#[derive(Debug, Clone)]
struct AnchorRunInfo {
    length: f64,
    min_length: f64,
    fixed_max: Option<f64>,
    props: PartSizeProperties,
}

/// Die Zustandsmaschine des interaktiven Routings.
pub struct RouteSegmentBuilder {
    settings: RoutingSettings,
    state: BuilderState,
    anchor: Option<Pair>,
    anchor_props: Option<PartSizeProperties>,
    anchor_run: Option<AnchorRunInfo>,
    branch: Option<BranchPart>,
    group: Option<LineGroupId>,
    pipe_template: Option<PipeTemplate>,
    elbow_candidates: Option<Vec<ElbowCandidate>>,
    chain: Option<PendingChain>,
    warnings: Vec<String>,
}

impl RouteSegmentBuilder {
    /// Erstellt einen Builder ohne Anker.
    pub fn new(settings: RoutingSettings) -> Self {
        Self {
            settings,
            state: BuilderState::Idle,
            anchor: None,
            anchor_props: None,
            anchor_run: None,
            branch: None,
            group: None,
            pipe_template: None,
            elbow_candidates: None,
            chain: None,
            warnings: Vec::new(),
        }
    }

    /// Aktueller Zustand.
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Aktive Einstellungen.
    pub fn settings(&self) -> &RoutingSettings {
        &self.settings
    }

    /// Die schwebende Kette des letzten Samples.
    pub fn chain(&self) -> Option<&PendingChain> {
        self.chain.as_ref()
    }

    /// Der aktuelle Anker.
    pub fn anchor(&self) -> Option<&Pair> {
        self.anchor.as_ref()
    }

    /// Beim letzten Sample gesammelte Warnungen (degradierte Elemente).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Aufgelöste Leitungsgruppe, falls bereits bekannt.
    pub fn group(&self) -> Option<LineGroupId> {
        self.group
    }

    // ── Anker ───────────────────────────────────────────────────────

    /// Setzt den committeten Anker.
    ///
    /// Bei einem unbenannten Port wird ein Abzweig aufgebaut (Stutzen im
    /// Stub-in-Modus, sonst T-Stück); scheitert das, läuft das Routing
    /// degradiert ohne Abzweig weiter. Für Anker auf einem Lauf wird die
    /// Fortführungs-/Cutback-Analyse erfasst, und die Leitungsgruppe des
    /// Bauteils wird übernommen.
    pub fn set_anchor(
        &mut self,
        pair: Pair,
        props: Option<PartSizeProperties>,
        model: &PipingModel,
        catalog: &dyn SpecCatalog,
    ) {
        self.chain = None;
        self.branch = None;
        self.anchor_run = None;
        self.warnings.clear();

        // Leitungsgruppe vom Bauteil übernehmen
        if let Some(part_id) = pair.part {
            if let Some(group) = model.line_group_of(part_id) {
                self.group = Some(group);
                if let Some(tag) = model.group_tag(group) {
                    self.settings.line_number = tag.to_string();
                }
            }
        }

        // Abzweig für unbenannte Ports
        if pair.is_attached() && pair.port.is_unnamed() {
            if let Some(host_props) = &props {
                match catalog.branch_fitting(
                    &self.settings.spec,
                    &host_props.nominal_diameter,
                    &self.settings.size,
                    self.settings.stub_in,
                ) {
                    Some(fitting) => {
                        self.branch = Some(BranchPart::new(
                            pair.clone(),
                            fitting,
                            self.settings.size.clone(),
                        ));
                    }
                    None => {
                        self.warn(format!(
                            "Kein Abzweig-Fitting für {} in Spec {} gefunden",
                            host_props.nominal_diameter, self.settings.spec
                        ));
                    }
                }
            }
        }

        // Fortführungs-/Cutback-Analyse für Anker auf einem Lauf
        if let (Some(part_id), false) = (pair.part, pair.port.is_unnamed()) {
            if let Some(part) = model.part(part_id) {
                if let crate::core::PartGeometry::Run {
                    min_length,
                    fixed_max,
                    ..
                } = part.geometry
                {
                    self.anchor_run = Some(AnchorRunInfo {
                        length: part.run_length().unwrap_or(0.0),
                        min_length,
                        fixed_max,
                        props: part.props.clone(),
                    });
                }
            }
        }

        self.anchor = Some(pair);
        self.anchor_props = props;
        self.state = BuilderState::AnchorSet;
    }

    /// Verwirft Kette und Anker; kein dauerhafter Zustand wurde berührt.
    pub fn cancel(&mut self) {
        self.chain = None;
        self.branch = None;
        self.anchor = None;
        self.anchor_props = None;
        self.anchor_run = None;
        self.warnings.clear();
        self.state = BuilderState::Idle;
    }

    // ── Einstellungen ───────────────────────────────────────────────

    /// Wendet eine Einstellungs-Änderung an.
    ///
    /// Spec/Größe invalidieren die Katalog-Caches; die übrigen Schalter
    /// ändern nur Policy-Zweige und erhalten den Anker.
    pub fn apply_setting(&mut self, change: SettingChange) {
        match change {
            SettingChange::Spec(spec) => {
                self.settings.spec = spec;
                self.invalidate_catalog_caches();
            }
            SettingChange::Size(size) => {
                self.settings.size = size;
                self.invalidate_catalog_caches();
            }
            SettingChange::Cutback(value) => self.settings.cutback_elbow = value,
            SettingChange::PipeBend(value) => self.settings.bent_pipe = value,
            SettingChange::StubIn(value) => self.settings.stub_in = value,
            SettingChange::ToleranceRouting(value) => self.settings.tolerance_routing = value,
            SettingChange::LineNumber(tag) => {
                self.settings.line_number = tag;
                self.group = None;
            }
        }
    }

    fn invalidate_catalog_caches(&mut self) {
        self.pipe_template = None;
        self.elbow_candidates = None;
    }

    // ── Recompute pro Sample ────────────────────────────────────────

    /// Verarbeitet ein Cursor-Sample: die Kette wird vollständig neu
    /// abgeleitet. Gibt die neue Kette zurück; `None` ohne Anker.
    pub fn on_cursor_move(
        &mut self,
        cursor: DVec3,
        catalog: &dyn SpecCatalog,
    ) -> Option<&PendingChain> {
        let anchor = self.anchor.clone()?;
        self.warnings.clear();

        let chain = self.derive_chain(&anchor, cursor, catalog);
        self.chain = Some(chain);
        self.state = BuilderState::Previewing;
        self.chain.as_ref()
    }

    fn derive_chain(
        &mut self,
        anchor: &Pair,
        cursor: DVec3,
        catalog: &dyn SpecCatalog,
    ) -> PendingChain {
        let mut elements: Vec<PendingElement> = Vec::new();
        let mut cutback: Option<f64> = None;

        // Freistart: kein Bauteil, oder unbenannter Port ohne Abzweig
        let free_start = !anchor.is_attached() || (anchor.port.is_unnamed() && self.branch.is_none());
        if free_start {
            if let Some(template) = self.ensure_pipe_template(catalog) {
                let dir = (cursor - anchor.port.position)
                    .try_normalize()
                    .unwrap_or(DVec3::X);
                let mut pipe = PipeRunPart::from_template(&template, anchor.port.position, dir);
                pipe.align_to(&Port::unnamed(anchor.port.position, dir), cursor);
                elements.push(PendingElement::Run {
                    connector: None,
                    pipe,
                });
            }
            return PendingChain {
                anchor: anchor.clone(),
                elements,
                cutback,
            };
        }

        let mut last_props = self.anchor_props.clone();
        let mut last_port = anchor.port.clone();

        // Abzweig auf den Cursor ausrichten
        if let Some(branch) = self.branch.as_mut() {
            branch.update(cursor);
            last_props = Some(branch.props.clone());
            last_port = branch.end_port.clone();
            elements.push(PendingElement::Branch(branch.clone()));
        }

        // Reduzierung, falls die Größenklasse wechselt
        if let Some(props) = last_props {
            if props.nominal_diameter != self.settings.size {
                match catalog.reducer_template(
                    &self.settings.spec,
                    &props.nominal_diameter,
                    &self.settings.size,
                ) {
                    Some(template) => {
                        let mut connector = self.make_connector(props.nominal_diameter.clone());
                        connector.attach_to(&last_port);
                        let mut reducer = ReducerPart::new(
                            template.props,
                            template.reduce_to,
                            template.body_length,
                        );
                        reducer.attach_to(connector.end());
                        last_port = reducer.end().clone();
                        elements.push(PendingElement::Reducer { connector, reducer });
                    }
                    None => {
                        self.warn(format!(
                            "Keine Reduzierung {} → {} in Spec {}",
                            props.nominal_diameter, self.settings.size, self.settings.spec
                        ));
                    }
                }
            }
        }

        let Some(template) = self.ensure_pipe_template(catalog) else {
            return PendingChain {
                anchor: anchor.clone(),
                elements,
                cutback,
            };
        };

        // Umlenkwinkel zwischen Port-Richtung und Cursor-Vektor
        let to_cursor = cursor - last_port.position;
        let theta = match last_port.unit_direction() {
            Some(dir) if to_cursor.length() > DISTANCE_EPSILON => dir.angle_between(to_cursor),
            _ => 0.0,
        };

        let mut elbow_placed = false;
        let mut run_connector: Option<ConnectorPart> = None;

        if theta > ANGLE_EPSILON {
            // Toleranz-Routing: Verbinder nimmt die Umlenkung selbst auf
            if self.settings.tolerance_routing && theta <= self.settings.slope_tolerance {
                let mut connector = self.make_connector(self.settings.size.clone());
                connector.attach_to(&last_port);
                let aim = to_cursor.normalize();
                connector.override_end_direction(aim);
                last_port = connector.end().clone();
                run_connector = Some(connector);
            } else {
                let candidates = self.ensure_elbow_candidates(catalog);
                let choice = select_elbow(
                    theta,
                    &candidates,
                    self.settings.cutback_elbow,
                    self.settings.bent_pipe,
                );
                if let Some(mut elbow) = ElbowPart::from_choice(&choice, &template) {
                    let mut connector = self.make_connector(self.settings.size.clone());
                    connector.attach_to(&last_port);
                    let dock_port = connector.end().clone();

                    // Referenz-Port am Cursor: Richtung zeigt zurück zum Dock
                    let ref_dir = if (dock_port.position - cursor).length() < DISTANCE_EPSILON {
                        -dock_port.direction
                    } else {
                        dock_port.position - cursor
                    };
                    let reference = Port::unnamed(cursor, ref_dir);
                    let mat = align_matrix(elbow.near(), elbow.far(), &dock_port, &reference);
                    elbow.transform_by(&mat);

                    // Anker-Lauf kürzen: Bogen-Ecke rückt an den Ankerpunkt
                    if elements.is_empty() {
                        if let Some(shift) = self.cutback_shift(&elbow, &connector) {
                            let translation = DMat4::from_translation(
                                elbow
                                    .near()
                                    .direction
                                    .try_normalize()
                                    .unwrap_or(DVec3::X)
                                    * shift,
                            );
                            elbow.transform_by(&translation);
                            connector.transform_by(&translation);
                            cutback = Some(shift);
                        }
                    }

                    last_port = elbow.far().clone();
                    elements.push(PendingElement::Elbow { connector, elbow });
                    elbow_placed = true;
                }
            }
        }

        // Rohrlauf: Fortführung des Anker-Laufs oder neuer Lauf mit Verbinder
        let continue_pipe =
            !elbow_placed && run_connector.is_none() && elements.is_empty() && self.can_continue(&template);

        let connector = if continue_pipe {
            None
        } else {
            Some(match run_connector.take() {
                // Toleranz-Routing: Richtung der Ausgangsseite ist überschrieben
                Some(connector) => connector,
                None => {
                    let mut connector = self.make_connector(self.settings.size.clone());
                    connector.attach_to(&last_port);
                    last_port = connector.end().clone();
                    connector
                }
            })
        };

        let mut pipe = PipeRunPart::from_template(&template, last_port.position, last_port.direction);
        if continue_pipe {
            pipe.continue_of = anchor.part;
        }
        pipe.align_to(&last_port, cursor);
        elements.push(PendingElement::Run { connector, pipe });

        PendingChain {
            anchor: anchor.clone(),
            elements,
            cutback,
        }
    }

    /// Kürzungsweite des Anker-Laufs für die aktuelle Bogen-Platzierung.
    fn cutback_shift(&self, elbow: &ElbowPart, connector: &ConnectorPart) -> Option<f64> {
        let info = self.anchor_run.as_ref()?;
        let slack = info.length - info.min_length;
        let at_fixed_max = info
            .fixed_max
            .is_none_or(|max| (max - info.length).abs() < DISTANCE_EPSILON);
        if slack <= DISTANCE_EPSILON || !at_fixed_max {
            return None;
        }
        let shift = (elbow.corner_size + connector.gap).min(slack);
        (shift > DISTANCE_EPSILON).then_some(shift)
    }

    /// Prüft ob der Anker-Lauf in-place fortgeführt werden kann.
    fn can_continue(&self, template: &PipeTemplate) -> bool {
        let Some(info) = self.anchor_run.as_ref() else {
            return false;
        };
        let below_max = info.fixed_max.is_none_or(|max| info.length < max);
        below_max && info.props.same_size_record(&template.props)
    }

    // ── Accept ──────────────────────────────────────────────────────

    /// Übergibt die schwebende Kette an die Commit-Pipeline.
    ///
    /// Bei Erfolg wird das Ketten-Ende zum neuen Anker (fortlaufendes
    /// Routing); bei Fehlern bleibt die Kette zur Korrektur erhalten.
    pub fn on_accept(&mut self, model: &mut PipingModel) -> Result<CommitReceipt> {
        let chain = self
            .chain
            .take()
            .ok_or_else(|| anyhow!("Keine schwebende Kette zum Übernehmen"))?;

        match commit_chain(model, &chain, &self.settings.line_number, self.group, None) {
            Ok(receipt) => {
                self.group = Some(receipt.group);
                let tail = receipt.tail.clone();
                let tail_props = receipt.tail_props.clone();
                self.branch = None;
                self.set_anchor(tail, tail_props, model, &NullCatalog);
                Ok(receipt)
            }
            Err(err) => {
                self.chain = Some(chain);
                Err(err)
            }
        }
    }

    // ── Caches ──────────────────────────────────────────────────────

    fn ensure_pipe_template(&mut self, catalog: &dyn SpecCatalog) -> Option<PipeTemplate> {
        if self.pipe_template.is_none() {
            self.pipe_template = catalog.pipe_template(&self.settings.spec, &self.settings.size);
            if self.pipe_template.is_none() {
                self.warn(format!(
                    "Kein Rohr {} in Spec {} gefunden",
                    self.settings.size, self.settings.spec
                ));
            }
        }
        self.pipe_template.clone()
    }

    fn ensure_elbow_candidates(&mut self, catalog: &dyn SpecCatalog) -> Vec<ElbowCandidate> {
        if self.elbow_candidates.is_none() {
            self.elbow_candidates =
                Some(catalog.find_elbows(&self.settings.size, &self.settings.spec, false));
        }
        self.elbow_candidates.clone().unwrap_or_default()
    }

    fn make_connector(&self, nd: NominalDiameter) -> ConnectorPart {
        ConnectorPart::new(
            &self.settings.spec,
            nd,
            self.settings.slope_tolerance,
            self.settings.offset_tolerance,
            self.settings.weld_gap,
        )
    }

    fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(message);
    }
}

/// Leerer Katalog für den Anker-Wechsel nach einem Commit: das Ketten-Ende
/// ist immer ein benannter Port, ein Abzweig-Fitting wird nie gebraucht.
struct NullCatalog;

impl SpecCatalog for NullCatalog {
    fn fetch_part(
        &self,
        _spec: &str,
        _part_type: &str,
        _nd: &NominalDiameter,
        _filters: &[(&str, &str)],
    ) -> Option<PartSizeProperties> {
        None
    }

    fn find_elbows(
        &self,
        _nd: &NominalDiameter,
        _spec: &str,
        _include_bend: bool,
    ) -> Vec<ElbowCandidate> {
        Vec::new()
    }
}
