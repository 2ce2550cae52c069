//! Writer für Rohrleitungs-Projekte.

use anyhow::Result;

use crate::core::{PartGeometry, PipingModel};

/// Schreibt ein Modell als Projekt-XML.
///
/// Die Ausgabe ist deterministisch (Parts in Einfüge-Reihenfolge,
/// Verbindungen sortiert), damit identische Modelle byte-identische
/// Dokumente ergeben.
pub fn write_piping_project(model: &PipingModel) -> Result<String> {
    let mut output = String::new();
    output.push_str("<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"no\"?>\n");
    output.push_str("<PipingProject>\n");

    output.push_str("    <LineGroups>\n");
    for (id, tag) in model.groups_iter() {
        output.push_str(&format!(
            "        <Group id=\"{}\" tag=\"{}\"/>\n",
            id,
            escape_xml(tag)
        ));
    }
    output.push_str("    </LineGroups>\n");

    output.push_str("    <Parts>\n");
    for part in model.parts_iter() {
        output.push_str(&format!(
            "        <Part id=\"{}\" type=\"{}\" spec=\"{}\" size=\"{}\" group=\"{}\">\n",
            part.id,
            escape_xml(&part.props.part_type),
            escape_xml(&part.props.spec),
            escape_xml(&part.props.nominal_diameter.display()),
            part.group
        ));
        for (key, value) in &part.props.props {
            output.push_str(&format!(
                "            <Prop name=\"{}\" value=\"{}\"/>\n",
                escape_xml(key),
                escape_xml(value)
            ));
        }
        match &part.geometry {
            PartGeometry::Run {
                start,
                end,
                outer_diameter,
                min_length,
                fixed_max,
            } => {
                output.push_str(&format!(
                    "            <Run start=\"{}\" end=\"{}\" od=\"{}\" min=\"{}\"{}/>\n",
                    format_vec(start),
                    format_vec(end),
                    format_float(*outer_diameter),
                    format_float(*min_length),
                    match fixed_max {
                        Some(max) => format!(" max=\"{}\"", format_float(*max)),
                        None => String::new(),
                    }
                ));
            }
            PartGeometry::Fixture { ports } => {
                output.push_str("            <Fixture>\n");
                for port in ports {
                    output.push_str(&format!(
                        "                <Port name=\"{}\" pos=\"{}\" dir=\"{}\"/>\n",
                        escape_xml(&port.name),
                        format_vec(&port.position),
                        format_vec(&port.direction)
                    ));
                }
                output.push_str("            </Fixture>\n");
            }
            PartGeometry::Joint {
                ports,
                slope_tolerance,
                offset_tolerance,
                gap,
            } => {
                output.push_str(&format!(
                    "            <Joint slope=\"{}\" offset=\"{}\" gap=\"{}\">\n",
                    format_float(*slope_tolerance),
                    format_float(*offset_tolerance),
                    format_float(*gap)
                ));
                for port in ports {
                    output.push_str(&format!(
                        "                <Port name=\"{}\" pos=\"{}\" dir=\"{}\"/>\n",
                        escape_xml(&port.name),
                        format_vec(&port.position),
                        format_vec(&port.direction)
                    ));
                }
                output.push_str("            </Joint>\n");
            }
        }
        output.push_str("        </Part>\n");
    }
    output.push_str("    </Parts>\n");

    // Verbindungen sortiert ausgeben, jede genau einmal
    let mut connections: Vec<(String, String)> = model
        .connections_iter()
        .map(|(a, b)| (format!("{}:{}", a.0, a.1), format!("{}:{}", b.0, b.1)))
        .collect();
    connections.sort();

    output.push_str("    <Connections>\n");
    for (a, b) in connections {
        output.push_str(&format!(
            "        <Connect a=\"{}\" b=\"{}\"/>\n",
            escape_xml(&a),
            escape_xml(&b)
        ));
    }
    output.push_str("    </Connections>\n");

    output.push_str("</PipingProject>\n");
    Ok(output)
}

/// Formatiert einen Vektor als kommagetrennte Koordinaten.
fn format_vec(v: &glam::DVec3) -> String {
    format!("{},{},{}", format_float(v.x), format_float(v.y), format_float(v.z))
}

/// Formatiert einen Float ohne überflüssige Nullen.
fn format_float(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let mut s = format!("{value:.6}");
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}

/// Escaped XML-Sonderzeichen in Attributwerten.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
