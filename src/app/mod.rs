//! Session-/Controller-Schicht: übersetzt diskrete Eingabe-Intents in
//! Engine-Aufrufe.

mod intent;
mod session;

pub use intent::{RouteIntent, ScriptedIntent};
pub use session::RoutingSession;
