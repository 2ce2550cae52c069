//! Schwebende (unpersistierte) Bauteile der Routing-Kette.
//!
//! Jedes Bauteil wird in einem lokalen Koordinatensystem konstruiert und
//! anschließend über Starrkörper-Transformationen an seinen Platz in der
//! Kette gebracht. Erst der Commit macht daraus platzierte Parts.

use glam::{DMat4, DVec3};

use crate::core::{ElbowCandidate, NominalDiameter, Pair, PartSizeProperties, PipeTemplate, Port};
use crate::routing::align::{attach_matrix, port_normal};
use crate::routing::elbow::ElbowChoice;
use crate::shared::ANGLE_EPSILON;

/// Verhältnis Biegeradius zu Außendurchmesser für Biegungen (Langradius).
const BEND_RADIUS_FACTOR: f64 = 1.5;

// ── Verbinder ───────────────────────────────────────────────────────

/// Schwebender Verbinder (Schweißnaht o.ä.) zwischen zwei Ports.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectorPart {
    /// Eigenschaften des Verbinders
    pub props: PartSizeProperties,
    /// Beide Seiten in Weltkoordinaten
    pub ports: [Port; 2],
    /// Maximal still absorbierte Winkelabweichung (Radiant)
    pub slope_tolerance: f64,
    /// Maximal still absorbierter Versatz
    pub offset_tolerance: f64,
    /// Spaltbreite zwischen den Seiten
    pub gap: f64,
}

impl ConnectorPart {
    /// Erstellt einen Verbinder im lokalen System: S1 im Ursprung nach
    /// -X, S2 im Abstand `gap` nach +X.
    pub fn new(
        spec: &str,
        nd: NominalDiameter,
        slope_tolerance: f64,
        offset_tolerance: f64,
        gap: f64,
    ) -> Self {
        let props = PartSizeProperties::new(spec, "Buttweld", nd);
        Self {
            props,
            ports: [
                Port::new("S1", DVec3::ZERO, -DVec3::X),
                Port::new("S2", DVec3::new(gap, 0.0, 0.0), DVec3::X),
            ],
            slope_tolerance,
            offset_tolerance,
            gap,
        }
    }

    /// Erste Seite (dockt an das vorhandene Ende der Kette).
    pub fn start(&self) -> &Port {
        &self.ports[0]
    }

    /// Zweite Seite (dort setzt das nächste Bauteil an).
    pub fn end(&self) -> &Port {
        &self.ports[1]
    }

    /// Wendet eine Starrkörper-Transformation an.
    pub fn transform_by(&mut self, mat: &DMat4) {
        for port in &mut self.ports {
            *port = port.transformed(mat);
        }
    }

    /// Dockt S1 an den übergebenen Port an.
    pub fn attach_to(&mut self, target: &Port) {
        let mat = attach_matrix(
            target,
            port_normal(target),
            self.start(),
            port_normal(self.start()),
        );
        self.transform_by(&mat);
    }

    /// Überschreibt die Richtung der Ausgangsseite (Toleranz-Routing).
    pub fn override_end_direction(&mut self, direction: DVec3) {
        self.ports[1].direction = direction;
    }
}

// ── Bogen ───────────────────────────────────────────────────────────

/// Schwebender Bogen (diskret, Cutback oder Biegung).
#[derive(Debug, Clone, PartialEq)]
pub struct ElbowPart {
    /// Eigenschaften (bei Biegungen aus der Rohr-Vorlage abgeleitet)
    pub props: PartSizeProperties,
    /// Effektiver Umlenkwinkel (Radiant)
    pub angle: f64,
    /// Abstand Port → Ecke
    pub corner_size: f64,
    /// Ports: [nahe Seite, ferne Seite] in Weltkoordinaten
    pub ports: [Port; 2],
    /// Geometrische Ecke in Weltkoordinaten
    pub corner: DVec3,
}

impl ElbowPart {
    /// Baut die lokale Bogen-Geometrie: Ecke im Ursprung, naher Schenkel
    /// entlang -X, ferner Schenkel um `angle` in der XY-Ebene gedreht.
    fn with_local_frame(props: PartSizeProperties, angle: f64, corner_size: f64) -> Self {
        let far_dir = DVec3::new(angle.cos(), angle.sin(), 0.0);
        Self {
            props,
            angle,
            corner_size,
            ports: [
                Port::new("S1", DVec3::new(-corner_size, 0.0, 0.0), -DVec3::X),
                Port::new("S2", far_dir * corner_size, far_dir),
            ],
            corner: DVec3::ZERO,
        }
    }

    /// Erstellt einen diskreten Katalog-Bogen.
    pub fn fixed(candidate: &ElbowCandidate) -> Self {
        Self::with_local_frame(candidate.props.clone(), candidate.angle, candidate.corner_size)
    }

    /// Erstellt einen Cutback-Bogen: der Katalogeintrag wird auf exakt
    /// `angle` gekürzt, der Eckenabstand skaliert mit dem Radius.
    pub fn cutback(candidate: &ElbowCandidate, angle: f64) -> Self {
        let half_nominal = (candidate.angle / 2.0).tan();
        let corner_size = if half_nominal.abs() > ANGLE_EPSILON {
            candidate.corner_size / half_nominal * (angle / 2.0).tan()
        } else {
            candidate.corner_size
        };
        let props = candidate
            .props
            .clone()
            .with_prop("CutbackAngle", format!("{:.4}", angle.to_degrees()));
        Self::with_local_frame(props, angle, corner_size)
    }

    /// Erstellt eine Biegung aus der Rohr-Vorlage mit exakt `angle`.
    pub fn bend(template: &PipeTemplate, angle: f64) -> Self {
        let radius = BEND_RADIUS_FACTOR * template.outer_diameter;
        let corner_size = radius * (angle / 2.0).tan();
        let mut props = template.props.clone();
        props.part_type = "PipeBend".to_string();
        let props = props.with_prop("BendAngle", format!("{:.4}", angle.to_degrees()));
        Self::with_local_frame(props, angle, corner_size)
    }

    /// Erstellt den passenden Bogen zur Auswahl; `None` bei `ElbowChoice::None`.
    pub fn from_choice(choice: &ElbowChoice, template: &PipeTemplate) -> Option<Self> {
        match choice {
            ElbowChoice::None => None,
            ElbowChoice::Bend(angle) => Some(Self::bend(template, *angle)),
            ElbowChoice::Cutback(candidate, angle) => Some(Self::cutback(candidate, *angle)),
            ElbowChoice::Fixed(candidate) => Some(Self::fixed(candidate)),
        }
    }

    /// Nahe Seite (dockt an den Verbinder).
    pub fn near(&self) -> &Port {
        &self.ports[0]
    }

    /// Ferne Seite (zeigt Richtung Cursor).
    pub fn far(&self) -> &Port {
        &self.ports[1]
    }

    /// Wendet eine Starrkörper-Transformation an.
    pub fn transform_by(&mut self, mat: &DMat4) {
        for port in &mut self.ports {
            *port = port.transformed(mat);
        }
        self.corner = mat.transform_point3(self.corner);
    }
}

// ── Reduzierung ─────────────────────────────────────────────────────

/// Schwebende Reduzierung zwischen zwei Größenklassen.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducerPart {
    /// Eigenschaften (Nenngröße = Eingangsseite)
    pub props: PartSizeProperties,
    /// Zielgröße der Ausgangsseite
    pub reduce_to: NominalDiameter,
    /// Ports: [Eingang, Ausgang] in Weltkoordinaten
    pub ports: [Port; 2],
}

impl ReducerPart {
    /// Erstellt die Reduzierung im lokalen System entlang +X.
    pub fn new(props: PartSizeProperties, reduce_to: NominalDiameter, body_length: f64) -> Self {
        Self {
            props,
            reduce_to,
            ports: [
                Port::new("S1", DVec3::ZERO, -DVec3::X),
                Port::new("S2", DVec3::new(body_length, 0.0, 0.0), DVec3::X),
            ],
        }
    }

    /// Eingangsseite.
    pub fn start(&self) -> &Port {
        &self.ports[0]
    }

    /// Ausgangsseite.
    pub fn end(&self) -> &Port {
        &self.ports[1]
    }

    /// Wendet eine Starrkörper-Transformation an.
    pub fn transform_by(&mut self, mat: &DMat4) {
        for port in &mut self.ports {
            *port = port.transformed(mat);
        }
    }

    /// Dockt die Eingangsseite an den übergebenen Port an.
    pub fn attach_to(&mut self, target: &Port) {
        let mat = attach_matrix(
            target,
            port_normal(target),
            self.start(),
            port_normal(self.start()),
        );
        self.transform_by(&mat);
    }
}

// ── Rohrlauf ────────────────────────────────────────────────────────

/// Schwebender gerader Rohrlauf.
#[derive(Debug, Clone, PartialEq)]
pub struct PipeRunPart {
    /// Eigenschaften aus der Rohr-Vorlage
    pub props: PartSizeProperties,
    /// Startpunkt der Mittellinie
    pub start: DVec3,
    /// Endpunkt der Mittellinie
    pub end: DVec3,
    /// Außendurchmesser
    pub outer_diameter: f64,
    /// Zulässige Mindestlänge
    pub min_length: f64,
    /// Maximallänge, falls Festlängen-Rohr
    pub fixed_max: Option<f64>,
    /// Wird ein existierender Lauf in-place verlängert, steht hier seine ID
    pub continue_of: Option<crate::core::PartId>,
}

impl PipeRunPart {
    /// Erstellt einen kurzen Lauf aus der Vorlage, ab `start` in `dir`.
    pub fn from_template(template: &PipeTemplate, start: DVec3, dir: DVec3) -> Self {
        let dir = dir.try_normalize().unwrap_or(DVec3::X);
        Self {
            props: template.props.clone(),
            start,
            end: start + dir * (2.0 * template.min_length),
            outer_diameter: template.outer_diameter,
            min_length: template.min_length,
            fixed_max: template.fixed_max,
            continue_of: None,
        }
    }

    /// Richtet den Lauf ab `port` aus und projiziert den Cursor auf die
    /// Port-Achse; das Ende wird auf mindestens die Mindestlänge (und bei
    /// Festlängen-Rohren höchstens die Maximallänge) geklemmt.
    pub fn align_to(&mut self, port: &Port, cursor: DVec3) {
        let dir = port.direction.try_normalize().unwrap_or(DVec3::X);
        let mut t = (cursor - port.position).dot(dir);
        if t < self.min_length {
            t = self.min_length;
        }
        if let Some(max) = self.fixed_max {
            if t > max {
                t = max;
            }
        }
        self.start = port.position;
        self.end = port.position + dir * t;
    }

    /// Aktuelle Länge des Laufs.
    pub fn length(&self) -> f64 {
        (self.end - self.start).length()
    }

    /// Ports des Laufs (S1 am Start, S2 am Ende, Richtungen nach außen).
    pub fn ports(&self) -> [Port; 2] {
        let axis = (self.end - self.start).try_normalize().unwrap_or(DVec3::X);
        [
            Port::new("S1", self.start, -axis),
            Port::new("S2", self.end, axis),
        ]
    }

    /// Port am Ende des Laufs.
    pub fn end_port(&self) -> Port {
        let [_, s2] = self.ports();
        s2
    }
}

// ── Abzweig ─────────────────────────────────────────────────────────

/// Schwebender Abzweig von einem unbenannten Körperpunkt.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchPart {
    /// Wirts-Pair (unbenannter Port auf dem Körper)
    pub host: Pair,
    /// Eigenschaften des Abzweig-Fittings (T-Stück oder Stutzen)
    pub props: PartSizeProperties,
    /// Zielgröße des Abzweigs
    pub branch_nd: NominalDiameter,
    /// Synthetischer Abzweig-Endport
    pub end_port: Port,
}

impl BranchPart {
    /// Erstellt einen Abzweig am Wirtspunkt; die Richtung wird beim
    /// ersten Cursor-Sample gesetzt.
    pub fn new(host: Pair, props: PartSizeProperties, branch_nd: NominalDiameter) -> Self {
        let host_axis = host.port.direction.try_normalize().unwrap_or(DVec3::X);
        let initial = port_normal(&Port::unnamed(host.port.position, host_axis));
        let end_port = Port::new("BRANCH", host.port.position, initial);
        Self {
            host,
            props,
            branch_nd,
            end_port,
        }
    }

    /// Richtet den Abzweig auf den Cursor aus: Endport-Richtung ist die
    /// Komponente von (Cursor − Wirtspunkt) senkrecht zur Wirtsachse.
    ///
    /// Gibt `true` zurück wenn sich die Richtung merklich geändert hat
    /// (nachgelagerte Teile müssen neu aufgebaut werden).
    pub fn update(&mut self, cursor: DVec3) -> bool {
        let host_axis = self.host.port.direction.try_normalize().unwrap_or(DVec3::X);
        let to_cursor = cursor - self.host.port.position;
        let lateral = to_cursor - host_axis * to_cursor.dot(host_axis);
        let Some(new_dir) = lateral.try_normalize() else {
            return false;
        };
        let old_dir = self.end_port.direction;
        self.end_port.direction = new_dir;
        old_dir.dot(new_dir) < (1.0 - 1e-6)
    }
}
