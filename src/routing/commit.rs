//! Atomare Persistierung einer akzeptierten Kette.
//!
//! Einzige Stelle, die dauerhaften Zustand schreibt: alle Parts und
//! Verbindungen einer Kette landen in genau einer Arbeitseinheit; jeder
//! Teilfehler rollt die gesamte Einheit zurück.

use anyhow::{anyhow, Result};

use crate::core::{LineGroupId, Pair, PartGeometry, PartId, PartSizeProperties, PipingModel, Port};
use crate::routing::parts::ConnectorPart;
use crate::routing::{PendingChain, PendingElement};

/// Ergebnis eines erfolgreichen Commits.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Verwendete Leitungsgruppe
    pub group: LineGroupId,
    /// IDs der neu erstellten Parts in Ketten-Reihenfolge
    pub created: Vec<PartId>,
    /// Anzahl geschriebener Port-Verbindungen
    pub connections: usize,
    /// Das freie Ende der Kette — der Anker des nächsten Segments
    pub tail: Pair,
    /// Eigenschaften des Bauteils am freien Ende
    pub tail_props: Option<PartSizeProperties>,
}

/// Persistiert eine Kette als eine Arbeitseinheit.
///
/// `group_hint` wird verwendet, wenn die Gruppe bereits aufgelöst ist;
/// sonst wird sie über die Leitungsnummer gefunden oder angelegt.
/// `terminal` verbindet das letzte Laufende zusätzlich mit einem fixen
/// Endport (Auto-Routing).
pub fn commit_chain(
    model: &mut PipingModel,
    chain: &PendingChain,
    line_number: &str,
    group_hint: Option<LineGroupId>,
    terminal: Option<&Pair>,
) -> Result<CommitReceipt> {
    if chain.is_empty() {
        return Err(anyhow!("Leere Kette kann nicht übernommen werden"));
    }

    model.run_unit(|m| {
        let group = match group_hint {
            Some(g) if m.group_tag(g).is_some() => g,
            _ => m.find_or_create_line_group(line_number),
        };

        let mut created: Vec<PartId> = Vec::new();
        let mut connections = 0usize;

        // Laufendes Ketten-Ende: (Part, Portname) der offenen Seite
        let mut last: Option<(PartId, String)> = match (&chain.anchor.part, &chain.anchor.port) {
            (Some(id), port) if !port.is_unnamed() => Some((*id, port.name.clone())),
            _ => None,
        };
        let mut tail = chain.anchor.clone();
        let mut tail_props: Option<PartSizeProperties> = None;

        // Cutback zuerst: der Anker-Lauf wurde beim Ausrichten verkürzt
        if let Some(distance) = chain.cutback {
            let anchor_id = chain
                .anchor
                .part
                .ok_or_else(|| anyhow!("Cutback ohne Anker-Bauteil"))?;
            m.cutback_run(anchor_id, distance)?;
        }

        for element in &chain.elements {
            match element {
                PendingElement::Branch(branch) => {
                    let host_id = branch
                        .host
                        .part
                        .ok_or_else(|| anyhow!("Abzweig ohne Wirts-Bauteil"))?;
                    let base = Port::new(
                        "S1",
                        branch.host.port.position,
                        -branch.end_port.direction,
                    );
                    let id = m.add_part(
                        branch.props.clone(),
                        PartGeometry::Fixture {
                            ports: vec![base, branch.end_port.clone()],
                        },
                        group,
                    );
                    created.push(id);
                    m.connect_tap(host_id, branch.host.port.position, (id, "S1"))?;
                    connections += 1;
                    last = Some((id, branch.end_port.name.clone()));
                    tail = Pair::new(id, branch.end_port.clone());
                    tail_props = Some(branch.props.clone());
                }

                PendingElement::Reducer { connector, reducer } => {
                    let reducer_id = m.add_part(
                        reducer.props.clone(),
                        PartGeometry::Fixture {
                            ports: reducer.ports.to_vec(),
                        },
                        group,
                    );
                    created.push(reducer_id);
                    connections +=
                        write_joint(m, connector, &mut last, (reducer_id, "S1"), group, &mut created)?;
                    last = Some((reducer_id, "S2".to_string()));
                    tail = Pair::new(reducer_id, reducer.end().clone());
                    tail_props = Some(reducer.props.clone());
                }

                PendingElement::Elbow { connector, elbow } => {
                    let elbow_id = m.add_part(
                        elbow.props.clone(),
                        PartGeometry::Fixture {
                            ports: elbow.ports.to_vec(),
                        },
                        group,
                    );
                    created.push(elbow_id);
                    connections +=
                        write_joint(m, connector, &mut last, (elbow_id, "S1"), group, &mut created)?;
                    last = Some((elbow_id, "S2".to_string()));
                    tail = Pair::new(elbow_id, elbow.far().clone());
                    tail_props = Some(elbow.props.clone());
                }

                PendingElement::Run { connector, pipe } => {
                    if let Some(host_id) = pipe.continue_of {
                        // Bestehenden Lauf in-place verlängern
                        m.extend_run(host_id, pipe.end)?;
                        let part = m
                            .part(host_id)
                            .ok_or_else(|| anyhow!("Fortgeführter Lauf {} fehlt", host_id))?;
                        let end_port = part
                            .port("S2")
                            .ok_or_else(|| anyhow!("Lauf {} ohne Endport", host_id))?;
                        last = Some((host_id, "S2".to_string()));
                        tail = Pair::new(host_id, end_port);
                        tail_props = Some(part.props.clone());
                    } else {
                        let run_id = m.add_part(
                            pipe.props.clone(),
                            PartGeometry::Run {
                                start: pipe.start,
                                end: pipe.end,
                                outer_diameter: pipe.outer_diameter,
                                min_length: pipe.min_length,
                                fixed_max: pipe.fixed_max,
                            },
                            group,
                        );
                        created.push(run_id);
                        if let Some(connector) = connector {
                            connections += write_joint(
                                m,
                                connector,
                                &mut last,
                                (run_id, "S1"),
                                group,
                                &mut created,
                            )?;
                        }
                        last = Some((run_id, "S2".to_string()));
                        tail = Pair::new(run_id, pipe.end_port());
                        tail_props = Some(pipe.props.clone());
                    }
                }
            }
        }

        // Terminal-Verbindung für Auto-Routing: letztes Ende an den Endport
        if let Some(end_pair) = terminal {
            let end_id = end_pair
                .part
                .ok_or_else(|| anyhow!("Endpunkt ohne Bauteil"))?;
            let (last_id, last_name) = last
                .clone()
                .ok_or_else(|| anyhow!("Kette ohne offenes Ende"))?;
            if end_pair.port.is_unnamed() {
                return Err(anyhow!("Endpunkt ohne benannten Port"));
            }
            m.connect((last_id, &last_name), (end_id, &end_pair.port.name))?;
            connections += 1;
        }

        log::info!(
            "Kette übernommen: {} Parts, {} Verbindungen, Gruppe {}",
            created.len(),
            connections,
            group
        );

        Ok(CommitReceipt {
            group,
            created,
            connections,
            tail,
            tail_props,
        })
    })
}

/// Persistiert einen Verbinder und verdrahtet beide Seiten.
///
/// Gibt die Anzahl geschriebener Verbindungen zurück (0 wenn die Kette
/// kein offenes Vorgänger-Ende hat, z.B. beim Freistart).
fn write_joint(
    m: &mut PipingModel,
    connector: &ConnectorPart,
    last: &mut Option<(PartId, String)>,
    next: (PartId, &str),
    group: LineGroupId,
    created: &mut Vec<PartId>,
) -> Result<usize> {
    let Some((prev_id, prev_name)) = last.clone() else {
        return Ok(0);
    };
    let joint_id = m.add_part(
        connector.props.clone(),
        PartGeometry::Joint {
            ports: connector.ports.clone(),
            slope_tolerance: connector.slope_tolerance,
            offset_tolerance: connector.offset_tolerance,
            gap: connector.gap,
        },
        group,
    );
    created.push(joint_id);
    m.connect((prev_id, &prev_name), (joint_id, "S1"))?;
    m.connect((joint_id, "S2"), next)?;
    Ok(2)
}
