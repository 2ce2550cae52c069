//! Parser für Rohrleitungs-Projekte.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use glam::DVec3;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::{
    LineGroupId, NominalDiameter, PartGeometry, PartId, PartSizeProperties, PipingModel, Port,
};

/// Parsed ein Projekt aus einem XML-String.
///
/// Part- und Gruppen-IDs werden in Dokumentreihenfolge neu vergeben;
/// Verbindungen und Gruppen-Referenzen werden entsprechend umgeleitet.
pub fn parse_piping_project(xml_content: &str) -> Result<PipingModel> {
    let mut reader = Reader::from_str(xml_content);
    reader.config_mut().trim_text(true);

    let mut buffer = Vec::new();
    let mut model = PipingModel::new();

    // Datei-ID → Modell-ID
    let mut group_remap: HashMap<LineGroupId, LineGroupId> = HashMap::new();
    let mut part_remap: HashMap<PartId, PartId> = HashMap::new();

    // Zustand des gerade gelesenen Parts
    let mut pending: Option<PendingPart> = None;
    let mut pending_ports: Vec<Port> = Vec::new();
    let mut joint_attrs: Option<(f64, f64, f64)> = None;
    let mut connections: Vec<((PartId, String), (PartId, String))> = Vec::new();

    loop {
        match reader.read_event_into(&mut buffer) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.name();
                let tag = reader.decoder().decode(name.as_ref())?.into_owned();
                match tag.as_str() {
                    "Group" => {
                        let file_id: LineGroupId = require_attr(e, "id")?.parse()?;
                        let tag_value = require_attr(e, "tag")?;
                        let new_id = model.find_or_create_line_group(&tag_value);
                        group_remap.insert(file_id, new_id);
                    }
                    "Part" => {
                        let file_id: PartId = require_attr(e, "id")?.parse()?;
                        let size = require_attr(e, "size")?;
                        let nd = NominalDiameter::from_display_string(&size)
                            .ok_or_else(|| anyhow!("Ungültige Größe: {size}"))?;
                        let file_group: LineGroupId = require_attr(e, "group")?.parse()?;
                        let group = *group_remap
                            .get(&file_group)
                            .ok_or_else(|| anyhow!("Unbekannte Gruppe {file_group}"))?;
                        pending = Some(PendingPart {
                            file_id,
                            props: PartSizeProperties::new(
                                require_attr(e, "spec")?,
                                require_attr(e, "type")?,
                                nd,
                            ),
                            group,
                            geometry: None,
                        });
                        pending_ports.clear();
                        joint_attrs = None;
                    }
                    "Prop" => {
                        let part = pending
                            .as_mut()
                            .ok_or_else(|| anyhow!("Prop außerhalb eines Parts"))?;
                        part.props
                            .props
                            .insert(require_attr(e, "name")?, require_attr(e, "value")?);
                    }
                    "Run" => {
                        let part = pending
                            .as_mut()
                            .ok_or_else(|| anyhow!("Run außerhalb eines Parts"))?;
                        part.geometry = Some(PartGeometry::Run {
                            start: parse_vec(&require_attr(e, "start")?)?,
                            end: parse_vec(&require_attr(e, "end")?)?,
                            outer_diameter: require_attr(e, "od")?.parse()?,
                            min_length: require_attr(e, "min")?.parse()?,
                            fixed_max: optional_attr(e, "max")?
                                .map(|v| v.parse::<f64>())
                                .transpose()?,
                        });
                    }
                    "Joint" => {
                        joint_attrs = Some((
                            require_attr(e, "slope")?.parse()?,
                            require_attr(e, "offset")?.parse()?,
                            require_attr(e, "gap")?.parse()?,
                        ));
                    }
                    "Port" => {
                        pending_ports.push(Port::new(
                            require_attr(e, "name")?,
                            parse_vec(&require_attr(e, "pos")?)?,
                            parse_vec(&require_attr(e, "dir")?)?,
                        ));
                    }
                    "Connect" => {
                        connections.push((
                            parse_endpoint(&require_attr(e, "a")?)?,
                            parse_endpoint(&require_attr(e, "b")?)?,
                        ));
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                let tag = reader.decoder().decode(name.as_ref())?.into_owned();
                match tag.as_str() {
                    "Fixture" => {
                        let part = pending
                            .as_mut()
                            .ok_or_else(|| anyhow!("Fixture außerhalb eines Parts"))?;
                        part.geometry = Some(PartGeometry::Fixture {
                            ports: std::mem::take(&mut pending_ports),
                        });
                    }
                    "Joint" => {
                        let part = pending
                            .as_mut()
                            .ok_or_else(|| anyhow!("Joint außerhalb eines Parts"))?;
                        let (slope_tolerance, offset_tolerance, gap) = joint_attrs
                            .take()
                            .ok_or_else(|| anyhow!("Joint ohne Attribute"))?;
                        let ports: [Port; 2] = std::mem::take(&mut pending_ports)
                            .try_into()
                            .map_err(|_| anyhow!("Joint braucht genau zwei Ports"))?;
                        part.geometry = Some(PartGeometry::Joint {
                            ports,
                            slope_tolerance,
                            offset_tolerance,
                            gap,
                        });
                    }
                    "Part" => {
                        let part = pending
                            .take()
                            .ok_or_else(|| anyhow!("Part-Ende ohne Part-Anfang"))?;
                        let geometry = part
                            .geometry
                            .ok_or_else(|| anyhow!("Part {} ohne Geometrie", part.file_id))?;
                        let new_id = model.add_part(part.props, geometry, part.group);
                        part_remap.insert(part.file_id, new_id);
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => bail!("XML-Fehler an Position {}: {e}", reader.buffer_position()),
        }
        buffer.clear();
    }

    // Verbindungen mit umgeleiteten IDs wiederherstellen
    for (a, b) in connections {
        let a_id = *part_remap
            .get(&a.0)
            .ok_or_else(|| anyhow!("Verbindung auf unbekanntes Bauteil {}", a.0))?;
        let b_id = *part_remap
            .get(&b.0)
            .ok_or_else(|| anyhow!("Verbindung auf unbekanntes Bauteil {}", b.0))?;
        model.restore_connection((a_id, a.1), (b_id, b.1))?;
    }

    Ok(model)
}

/// Part im Aufbau während des Parsens.
struct PendingPart {
    file_id: PartId,
    props: PartSizeProperties,
    group: LineGroupId,
    geometry: Option<PartGeometry>,
}

/// Liest ein Pflicht-Attribut.
fn require_attr(e: &BytesStart<'_>, name: &str) -> Result<String> {
    optional_attr(e, name)?.ok_or_else(|| anyhow!("Attribut '{name}' fehlt"))
}

/// Liest ein optionales Attribut.
fn optional_attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if attr.key.as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Parsed "x,y,z" in einen Vektor.
fn parse_vec(s: &str) -> Result<DVec3> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        bail!("Ungültiger Vektor: {s}");
    }
    Ok(DVec3::new(
        parts[0].trim().parse().context("x")?,
        parts[1].trim().parse().context("y")?,
        parts[2].trim().parse().context("z")?,
    ))
}

/// Parsed "partId:portName".
fn parse_endpoint(s: &str) -> Result<(PartId, String)> {
    let (id, port) = s
        .split_once(':')
        .ok_or_else(|| anyhow!("Ungültiger Verbindungs-Endpunkt: {s}"))?;
    Ok((id.parse()?, port.to_string()))
}
