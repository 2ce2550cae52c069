//! Pipe Routing Editor Library.
//! Interaktive Routing-Engine für Rohrleitungsläufe in 3D-Anlagenmodellen,
//! als Library exportiert für Tests und Wiederverwendung.

pub mod app;
pub mod core;
pub mod routing;
pub mod shared;
pub mod xml;

pub use app::{RouteIntent, RoutingSession};
pub use core::{
    ElbowCandidate, InMemoryCatalog, LineGroupId, NominalDiameter, Pair, PartGeometry, PartId,
    PartSizeProperties, PipeTemplate, PipingModel, PlacedPart, Port, PortIndex, SnapMatch,
    SpecCatalog,
};
pub use routing::{
    commit_chain, select_elbow, AutoRouter, BuilderState, CommitReceipt, ElbowChoice,
    PendingChain, PendingElement, PreviewSink, RoutePreview, RouteSegmentBuilder,
    RoutingSettings, SettingChange,
};
pub use shared::RouterOptions;
pub use xml::{parse_piping_project, write_piping_project};
