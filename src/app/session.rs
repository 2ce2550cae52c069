//! Die Routing-Session: besitzt Modell, Katalog, Optionen und den
//! aktiven Builder; verarbeitet Intents strikt sequenziell.

use anyhow::{anyhow, Context, Result};
use glam::DVec3;

use crate::app::RouteIntent;
use crate::core::{Pair, PipingModel, PortIndex, SpecCatalog};
use crate::routing::{AutoRouter, BuilderState, RouteSegmentBuilder, RoutingSettings};
use crate::shared::RouterOptions;

/// Eine interaktive Routing-Session.
///
/// Pro Session existiert genau ein Builder; die schwebende Kette gehört
/// exklusiv ihm. Jeder Intent läuft synchron bis zum Ende durch, bevor
/// der nächste verarbeitet wird.
pub struct RoutingSession {
    model: PipingModel,
    catalog: Box<dyn SpecCatalog>,
    options: RouterOptions,
    builder: RouteSegmentBuilder,
}

impl RoutingSession {
    /// Erstellt eine Session über einem (ggf. leeren) Modell.
    pub fn new(
        model: PipingModel,
        catalog: Box<dyn SpecCatalog>,
        options: RouterOptions,
    ) -> Result<Self> {
        let settings = RoutingSettings::from_options(&options)?;
        Ok(Self {
            model,
            catalog,
            options,
            builder: RouteSegmentBuilder::new(settings),
        })
    }

    /// Das Modell (read-only).
    pub fn model(&self) -> &PipingModel {
        &self.model
    }

    /// Der aktive Builder (read-only).
    pub fn builder(&self) -> &RouteSegmentBuilder {
        &self.builder
    }

    /// Zerlegt die Session in ihr Modell.
    pub fn into_model(self) -> PipingModel {
        self.model
    }

    /// Verarbeitet einen Intent vollständig.
    pub fn handle_intent(&mut self, intent: RouteIntent) -> Result<()> {
        match intent {
            RouteIntent::StartAt(point) => self.start_at(point),
            RouteIntent::CursorMoved(point) => {
                self.builder.on_cursor_move(point, self.catalog.as_ref());
                for warning in self.builder.warnings() {
                    log::warn!("Routing degradiert: {warning}");
                }
                Ok(())
            }
            RouteIntent::Accept => {
                let receipt = self.builder.on_accept(&mut self.model)?;
                log::info!(
                    "Segment übernommen: {} Parts (Gruppe {})",
                    receipt.created.len(),
                    receipt.group
                );
                Ok(())
            }
            RouteIntent::ConnectTo(point) => self.connect_to(point),
            RouteIntent::Toggle(change) => {
                self.builder.apply_setting(change);
                Ok(())
            }
            RouteIntent::Cancel => {
                self.builder.cancel();
                log::info!("Routing abgebrochen; Modell unverändert");
                Ok(())
            }
        }
    }

    /// Beginnt das Routing an einem Punkt: Snap auf offenen Port oder
    /// Lauf-Körper, sonst freier Anker im Raum.
    fn start_at(&mut self, point: DVec3) -> Result<()> {
        let index = PortIndex::from_model(&self.model);
        match index.resolve(&self.model, point, self.options.snap_radius) {
            Some(hit) => {
                log::info!(
                    "Anker auf Bauteil {:?} (Port '{}')",
                    hit.pair.part,
                    hit.pair.port.name
                );
                self.builder.set_anchor(
                    hit.pair,
                    Some(hit.props),
                    &self.model,
                    self.catalog.as_ref(),
                );
            }
            None => {
                log::info!("Freier Anker bei ({:.1}, {:.1}, {:.1})", point.x, point.y, point.z);
                self.builder.set_anchor(
                    Pair::free(point),
                    None,
                    &self.model,
                    self.catalog.as_ref(),
                );
            }
        }
        Ok(())
    }

    /// Versucht Auto-Routing vom aktuellen Anker zu einem gesnappten
    /// offenen Port; null realisierbare Pfade brechen die Operation ab.
    fn connect_to(&mut self, point: DVec3) -> Result<()> {
        if self.builder.state() == BuilderState::Idle {
            return Err(anyhow!("Auto-Routing ohne Anker"));
        }
        let index = PortIndex::from_model(&self.model);
        let target = index
            .nearest_port(&self.model, point, self.options.snap_radius)
            .ok_or_else(|| anyhow!("Kein offener Port in Snap-Reichweite"))?;

        let start = self
            .builder
            .anchor()
            .ok_or_else(|| anyhow!("Auto-Routing ohne Anker"))?
            .clone();

        let router = AutoRouter::new(
            start,
            target.pair,
            self.builder.settings(),
            self.catalog.as_ref(),
        )
        .context("Auto-Routing nicht möglich")?;
        if router.path_count() == 0 {
            return Err(anyhow!("Auto-Routing: keine realisierbaren Pfade"));
        }

        let receipt = router.append(&mut self.model, self.builder.group())?;
        log::info!(
            "Auto-Routing übernommen: {} Parts, {} Verbindungen",
            receipt.created.len(),
            receipt.connections
        );
        // Abschluss des Routings: Kette/Anker freigeben
        self.builder.cancel();
        Ok(())
    }
}
