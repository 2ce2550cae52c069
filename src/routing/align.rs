//! Starrkörper-Ausrichtung: Andocken von Ports und Zwei-Port-Ausrichtung.
//!
//! Reine Funktionen über Port-Daten; kein Zugriff auf Modell oder
//! Persistenz, damit die Geometrie isoliert testbar bleibt.

use glam::{DMat3, DMat4, DQuat, DVec3};

use crate::core::Port;

/// Schwelle, unterhalb derer eine Richtung als degeneriert gilt.
const DEGENERATE_SQ: f64 = 1e-20;

/// Liefert eine deterministische Normale senkrecht zur Port-Richtung.
///
/// Bei degenerierter Richtung wird die Z-Achse zurückgegeben; die
/// Ersatz-Richtung selbst wählt der Aufrufer (X-Achse).
pub fn port_normal(port: &Port) -> DVec3 {
    let Some(dir) = port.direction.try_normalize() else {
        return DVec3::Z;
    };
    let reference = if dir.dot(DVec3::Z).abs() < 0.9 {
        DVec3::Z
    } else {
        DVec3::X
    };
    dir.cross(reference).normalize()
}

/// Orthonormalisiert `normal` gegen die (normierte) Achse `axis`.
fn orthonormal(normal: DVec3, axis: DVec3) -> DVec3 {
    let projected = normal - axis * normal.dot(axis);
    projected
        .try_normalize()
        .unwrap_or_else(|| port_normal(&Port::unnamed(DVec3::ZERO, axis)))
}

/// Richtung eines Ports mit X-Achsen-Ersatz bei degenerierter Richtung.
fn direction_or_x(port: &Port) -> DVec3 {
    port.direction.try_normalize().unwrap_or(DVec3::X)
}

/// Berechnet die Starrkörper-Transformation, die `moving` auf `fixed`
/// andockt: Position identisch, Richtungen exakt antiparallel, die
/// Normalen-Ebene bleibt über die übergebenen Normalen erhalten.
pub fn attach_matrix(
    fixed: &Port,
    fixed_normal: DVec3,
    moving: &Port,
    moving_normal: DVec3,
) -> DMat4 {
    let fixed_dir = direction_or_x(fixed);
    let moving_dir = direction_or_x(moving);

    // Zielbasis: bewegte Richtung landet antiparallel zur fixen Richtung
    let a1 = -fixed_dir;
    let a2 = orthonormal(fixed_normal, a1);
    let a3 = a1.cross(a2);

    let b1 = moving_dir;
    let b2 = orthonormal(moving_normal, b1);
    let b3 = b1.cross(b2);

    let target = DMat3::from_cols(a1, a2, a3);
    let source = DMat3::from_cols(b1, b2, b3);
    let rotation = target * source.transpose();

    let translation = fixed.position - rotation * moving.position;
    DMat4::from_translation(translation) * DMat4::from_mat3(rotation)
}

/// Rotation um eine Achse durch einen Punkt.
fn rotation_about(point: DVec3, axis: DVec3, angle: f64) -> DMat4 {
    DMat4::from_translation(point)
        * DMat4::from_quat(DQuat::from_axis_angle(axis, angle))
        * DMat4::from_translation(-point)
}

/// Zwei-Port-Ausrichtung: `port_a` dockt exakt auf `ref_a`, anschließend
/// wird um die Achse von `ref_a` gedreht, bis `port_b` so antiparallel
/// wie möglich zu `ref_b` zeigt.
///
/// Überbestimmte Eingaben werden zugunsten des bereits angedockten Ports
/// aufgelöst; der zweite Port wird bestmöglich angenähert.
pub fn align_matrix(port_a: &Port, port_b: &Port, ref_a: &Port, ref_b: &Port) -> DMat4 {
    let dock = attach_matrix(ref_a, port_normal(ref_a), port_a, port_normal(port_a));

    let axis = direction_or_x(ref_a);
    let b_dir = dock.transform_vector3(port_b.direction);
    let Some(wanted) = (-ref_b.direction).try_normalize() else {
        return dock;
    };

    // Beide Richtungen in die Ebene senkrecht zur Dock-Achse projizieren
    let u = b_dir - axis * b_dir.dot(axis);
    let v = wanted - axis * wanted.dot(axis);
    if u.length_squared() < DEGENERATE_SQ || v.length_squared() < DEGENERATE_SQ {
        return dock;
    }

    let angle = u.cross(v).dot(axis).atan2(u.dot(v));
    rotation_about(ref_a.position, axis, angle) * dock
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn port(pos: [f64; 3], dir: [f64; 3]) -> Port {
        Port::new("S1", DVec3::from_array(pos), DVec3::from_array(dir))
    }

    #[test]
    fn attach_docks_position_and_antiparallel_direction() {
        let fixed = port([10.0, 5.0, -2.0], [0.0, 1.0, 0.0]);
        let moving = port([3.0, 0.0, 0.0], [1.0, 0.0, 0.0]);

        let mat = attach_matrix(&fixed, port_normal(&fixed), &moving, port_normal(&moving));
        let docked = moving.transformed(&mat);

        assert_relative_eq!(docked.position.x, fixed.position.x, epsilon = 1e-9);
        assert_relative_eq!(docked.position.y, fixed.position.y, epsilon = 1e-9);
        assert_relative_eq!(docked.position.z, fixed.position.z, epsilon = 1e-9);

        let dir = docked.direction.normalize();
        let fixed_dir = fixed.direction.normalize();
        assert_relative_eq!(dir.dot(fixed_dir), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn attach_preserves_normal_plane() {
        let fixed = port([0.0, 0.0, 0.0], [0.0, 0.0, 1.0]);
        let moving = port([5.0, 5.0, 5.0], [0.0, 1.0, 0.0]);
        let n_fixed = port_normal(&fixed);
        let n_moving = port_normal(&moving);

        let mat = attach_matrix(&fixed, n_fixed, &moving, n_moving);
        let mapped_normal = mat.transform_vector3(n_moving);

        assert_relative_eq!(mapped_normal.dot(n_fixed), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn attach_is_rigid() {
        let fixed = port([1.0, 2.0, 3.0], [1.0, 1.0, 0.0]);
        let moving = port([-4.0, 0.0, 2.0], [0.0, 0.0, -1.0]);
        let mat = attach_matrix(&fixed, port_normal(&fixed), &moving, port_normal(&moving));

        // Längen bleiben unter der Transformation erhalten
        let v = DVec3::new(3.0, -7.0, 2.0);
        assert_relative_eq!(mat.transform_vector3(v).length(), v.length(), epsilon = 1e-9);
    }

    #[test]
    fn degenerate_direction_falls_back_to_x_axis() {
        let fixed = port([0.0, 0.0, 0.0], [0.0, 0.0, 0.0]);
        let moving = port([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let mat = attach_matrix(&fixed, port_normal(&fixed), &moving, port_normal(&moving));
        let docked = moving.transformed(&mat);
        // Bewegte Richtung antiparallel zur Ersatz-X-Achse
        assert_relative_eq!(docked.direction.normalize().dot(DVec3::X), -1.0, epsilon = 1e-9);
    }

    #[test]
    fn align_docks_first_port_and_aims_second() {
        // Bogen lokal: 90°, Ecke im Ursprung, Schenkellänge 2
        let near = port([-2.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let far = Port::new("S2", DVec3::new(0.0, 2.0, 0.0), DVec3::Y);

        // Dock-Ziel: Port bei (10, 0, 0) mit Richtung +X
        let ref_a = port([10.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        // Cursor bei (12, 0, 5): Referenzrichtung zeigt vom Cursor zurück
        let cursor = DVec3::new(12.0, 0.0, 5.0);
        let ref_b = Port::unnamed(cursor, ref_a.position - cursor);

        let mat = align_matrix(&near, &far, &ref_a, &ref_b);

        let docked_near = near.transformed(&mat);
        assert_relative_eq!(docked_near.position.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(
            docked_near.direction.normalize().dot(DVec3::X),
            -1.0,
            epsilon = 1e-9
        );

        // Der ferne Port liegt in der von Achse und Cursor aufgespannten
        // Ebene und zeigt von der Achse weg in Richtung Cursor (+Z-Anteil)
        let docked_far = far.transformed(&mat);
        let far_dir = docked_far.direction.normalize();
        assert_relative_eq!(far_dir.y, 0.0, epsilon = 1e-9);
        assert!(far_dir.z > 0.9);
    }

    #[test]
    fn align_with_collinear_reference_keeps_dock() {
        let near = port([-2.0, 0.0, 0.0], [-1.0, 0.0, 0.0]);
        let far = Port::new("S2", DVec3::new(0.0, 2.0, 0.0), DVec3::Y);
        let ref_a = port([0.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        // Referenz exakt auf der Dock-Achse: keine Dreh-Information
        let ref_b = Port::unnamed(DVec3::new(5.0, 0.0, 0.0), DVec3::new(-1.0, 0.0, 0.0));

        let mat = align_matrix(&near, &far, &ref_a, &ref_b);
        let docked_near = near.transformed(&mat);
        assert_relative_eq!(docked_near.position.length(), 0.0, epsilon = 1e-9);
    }
}
