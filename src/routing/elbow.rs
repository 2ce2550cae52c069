//! Bogen-Auswahl: diskreter Bogen, Biegung oder kein Bogen für einen
//! geforderten Umlenkwinkel.

use crate::core::ElbowCandidate;
use crate::shared::MIN_ELBOW_ANGLE;

/// Ergebnis der Bogen-Auswahl.
#[derive(Debug, Clone, PartialEq)]
pub enum ElbowChoice {
    /// Kein Bogen — Verbinder/Rohr nehmen die Umlenkung auf
    None,
    /// Biegung (gebogenes Rohr) mit exakt dem geforderten Winkel
    Bend(f64),
    /// Cutback-Bogen: Katalogeintrag, auf den exakten Winkel gekürzt
    Cutback(ElbowCandidate, f64),
    /// Diskreter Katalog-Bogen mit seinem Nennwinkel
    Fixed(ElbowCandidate),
}

impl ElbowChoice {
    /// Effektiver Umlenkwinkel; `None` wenn kein Bogen gewählt wurde.
    pub fn angle(&self) -> Option<f64> {
        match self {
            ElbowChoice::None => None,
            ElbowChoice::Bend(a) => Some(*a),
            ElbowChoice::Cutback(_, a) => Some(*a),
            ElbowChoice::Fixed(c) => Some(c.angle),
        }
    }

    /// Prüft ob ein Bogen gewählt wurde.
    pub fn is_some(&self) -> bool {
        !matches!(self, ElbowChoice::None)
    }
}

/// Wählt einen Bogen für den Umlenkwinkel `theta` (≥ 0).
///
/// Reihenfolge: unterhalb des Mindestwinkels kein Bogen; im
/// Biegungs-Modus eine Biegung mit exakt `theta`; im Cutback-Modus der
/// cutback-fähige Kandidat mit kleinstem Überschuss (Nennwinkel ≥
/// `theta`); sonst der Katalog-Bogen mit größtem Nennwinkel ≤ `theta`.
/// Bleibt auch der leer, wird keine Umlenkung korrigiert — der
/// Restwinkel wird bewusst nicht ausgeglichen.
pub fn select_elbow(
    theta: f64,
    candidates: &[ElbowCandidate],
    cutback_mode: bool,
    bend_mode: bool,
) -> ElbowChoice {
    if theta < MIN_ELBOW_ANGLE {
        return ElbowChoice::None;
    }

    if bend_mode {
        return ElbowChoice::Bend(theta);
    }

    if cutback_mode {
        let mut best: Option<&ElbowCandidate> = None;
        for candidate in candidates {
            if candidate.can_cutback && candidate.angle >= theta {
                let diff = candidate.angle - theta;
                if best.is_none_or(|b| diff < b.angle - theta) {
                    best = Some(candidate);
                }
            }
        }
        if let Some(candidate) = best {
            return ElbowChoice::Cutback(candidate.clone(), theta);
        }
        // Kein cutback-fähiger Kandidat: auf diskrete Auswahl zurückfallen
    }

    let mut best: Option<&ElbowCandidate> = None;
    for candidate in candidates {
        if candidate.angle <= theta {
            let diff = theta - candidate.angle;
            if best.is_none_or(|b| diff < theta - b.angle) {
                best = Some(candidate);
            }
        }
    }
    match best {
        Some(candidate) => ElbowChoice::Fixed(candidate.clone()),
        None => ElbowChoice::None,
    }
}
