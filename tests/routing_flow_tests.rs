//! Integrations-Tests des interaktiven Routings: Ketten-Aufbau,
//! Commit-Semantik, Abbruch-Reinheit und Auto-Routing.

use glam::DVec3;
use pipe_routing_editor::{
    write_piping_project, AutoRouter, BuilderState, ElbowChoice, InMemoryCatalog,
    NominalDiameter, Pair, PartGeometry, PartSizeProperties, PendingElement, PipingModel,
    RouteSegmentBuilder, RoutingSettings, SettingChange,
};

fn nd(value: f64) -> NominalDiameter {
    NominalDiameter::new("in", value)
}

/// Katalog mit Rohr, 45°/90°-Bögen (Ecke 0 für exakte Geometrie-Checks)
/// und einer Reduzierung 6" → 4".
fn catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    catalog.add_pipe("CS300", nd(6.0), 168.3, 50.0);
    catalog.add_pipe("CS300", nd(4.0), 114.3, 40.0);
    catalog.add_elbow("CS300", nd(6.0), 90.0, true, 0.0);
    catalog.add_elbow("CS300", nd(6.0), 45.0, false, 0.0);
    catalog.add_reducer("CS300", nd(6.0), &nd(4.0), 140.0);
    catalog.add_branch_fitting("CS300", "Tee", nd(6.0), &nd(6.0));
    catalog
}

fn settings() -> RoutingSettings {
    RoutingSettings {
        spec: "CS300".to_string(),
        size: nd(6.0),
        cutback_elbow: false,
        bent_pipe: false,
        stub_in: false,
        tolerance_routing: false,
        line_number: "25-100-CS300".to_string(),
        weld_gap: 0.0,
        slope_tolerance: 0.1,
        offset_tolerance: 0.0,
    }
}

/// Modell mit einem Lauf, der bei `end` offen endet (S2 zeigt entlang der Achse).
fn model_with_run(start: DVec3, end: DVec3) -> (PipingModel, Pair, PartSizeProperties) {
    let mut model = PipingModel::new();
    let group = model.find_or_create_line_group("25-100-CS300");
    let props = PartSizeProperties::new("CS300", "Pipe", nd(6.0)).with_prop("SizeRecordId", "P-X");
    let id = model.add_part(
        props.clone(),
        PartGeometry::Run {
            start,
            end,
            outer_diameter: 168.3,
            min_length: 50.0,
            fixed_max: None,
        },
        group,
    );
    let port = model.part(id).unwrap().port("S2").unwrap();
    (model, Pair::new(id, port), props)
}

// ── Rundlauf-Szenario ───────────────────────────────────────────────

#[test]
fn round_trip_places_largest_undershoot_elbow() {
    let catalog = catalog();
    let (model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);

    let chain = builder
        .on_cursor_move(DVec3::new(0.0, 0.0, 100.0), &catalog)
        .expect("Kette erwartet");

    // Genau ein Bogen (größter Katalogwinkel ≤ 90°) und ein Lauf
    assert_eq!(chain.len(), 2);
    let PendingElement::Elbow { elbow, .. } = &chain.elements[0] else {
        panic!("Bogen als erstes Element erwartet");
    };
    assert!((elbow.angle - 90.0_f64.to_radians()).abs() < 1e-9);
    let PendingElement::Run { connector, pipe } = &chain.elements[1] else {
        panic!("Lauf als zweites Element erwartet");
    };
    assert!(connector.is_some());
    assert!((pipe.end - DVec3::new(0.0, 0.0, 100.0)).length() < 1e-9);
}

#[test]
fn accept_persists_chain_and_advances_anchor() {
    let catalog = catalog();
    let (mut model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.on_cursor_move(DVec3::new(0.0, 0.0, 100.0), &catalog);

    let receipt = builder.on_accept(&mut model).expect("Commit erwartet");

    // Bogen + 2 Verbinder + Lauf
    assert_eq!(receipt.created.len(), 4);
    assert!((receipt.tail.port.position - DVec3::new(0.0, 0.0, 100.0)).length() < 1e-9);
    assert_eq!(builder.state(), BuilderState::AnchorSet);
    assert!(builder.chain().is_none());

    // Port-Exklusivität: kein Port taucht in zwei Verbindungen auf
    let mut seen = std::collections::HashSet::new();
    for (a, b) in model.connections_iter() {
        assert!(seen.insert(a.clone()), "Port doppelt verbunden: {a:?}");
        assert!(seen.insert(b.clone()), "Port doppelt verbunden: {b:?}");
    }
}

// ── Abbruch-Reinheit ────────────────────────────────────────────────

#[test]
fn cancel_after_cursor_moves_leaves_store_untouched() {
    let catalog = catalog();
    let (model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);
    let before = write_piping_project(&model).expect("XML erwartet");

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    for i in 1..=25 {
        let f = i as f64;
        builder.on_cursor_move(DVec3::new(f * 10.0, f * 4.0, f * 2.0), &catalog);
    }
    builder.cancel();

    let after = write_piping_project(&model).expect("XML erwartet");
    assert_eq!(before, after);
    assert_eq!(builder.state(), BuilderState::Idle);
}

// ── Fortführung und Reduzierung ─────────────────────────────────────

#[test]
fn straight_continuation_extends_run_in_place() {
    let catalog = catalog();
    let mut model = PipingModel::new();

    let mut builder = RouteSegmentBuilder::new(settings());
    // Freistart und erstes Segment übernehmen
    builder.set_anchor(Pair::free(DVec3::ZERO), None, &model, &catalog);
    builder.on_cursor_move(DVec3::new(500.0, 0.0, 0.0), &catalog);
    let receipt = builder.on_accept(&mut model).expect("Commit erwartet");
    assert_eq!(model.part_count(), 1);
    let run_id = receipt.created[0];

    // Geradeaus weiter: der Lauf wird in-place verlängert
    builder.on_cursor_move(DVec3::new(900.0, 0.0, 0.0), &catalog);
    let chain = builder.chain().expect("Kette erwartet");
    assert_eq!(chain.len(), 1);
    let PendingElement::Run { connector, pipe } = &chain.elements[0] else {
        panic!("Lauf erwartet");
    };
    assert!(connector.is_none());
    assert_eq!(pipe.continue_of, Some(run_id));

    builder.on_accept(&mut model).expect("Commit erwartet");
    assert_eq!(model.part_count(), 1);
    assert_eq!(model.part(run_id).unwrap().run_length(), Some(900.0));
}

#[test]
fn size_change_inserts_reducer() {
    let catalog = catalog();
    let (model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.apply_setting(SettingChange::Size(nd(4.0)));

    // Geradeaus: Reduzierung + Lauf, kein Bogen
    builder.on_cursor_move(DVec3::new(600.0, 0.0, 0.0), &catalog);
    let chain = builder.chain().expect("Kette erwartet");
    assert!(matches!(chain.elements[0], PendingElement::Reducer { .. }));
    let PendingElement::Run { pipe, .. } = chain.elements.last().unwrap() else {
        panic!("Lauf am Ende erwartet");
    };
    // Lauf in der Zielgröße
    assert_eq!(pipe.props.nominal_diameter, nd(4.0));
}

#[test]
fn diameter_continuity_holds_after_reducer_commit() {
    let catalog = catalog();
    let (mut model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.apply_setting(SettingChange::Size(nd(4.0)));
    builder.on_cursor_move(DVec3::new(600.0, 0.0, 0.0), &catalog);
    builder.on_accept(&mut model).expect("Commit erwartet");

    // Benachbarte Parts haben gleiche Größe oder eine Reduzierung dazwischen
    for (a, b) in model.connections_iter() {
        let part_a = model.part(a.0).unwrap();
        let part_b = model.part(b.0).unwrap();
        let same = part_a.props.nominal_diameter == part_b.props.nominal_diameter;
        let reducer_between = part_a.props.part_type == "Reducer"
            || part_b.props.part_type == "Reducer"
            || part_a.props.prop_value("ReduceTo").is_some()
            || part_b.props.prop_value("ReduceTo").is_some();
        assert!(
            same || reducer_between,
            "Größensprung ohne Reduzierung: {:?} ↔ {:?}",
            part_a.props.nominal_diameter,
            part_b.props.nominal_diameter
        );
    }
}

// ── Toleranz-Routing ────────────────────────────────────────────────

#[test]
fn tolerance_routing_absorbs_small_deflection_without_elbow() {
    let catalog = catalog();
    let (model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.apply_setting(SettingChange::ToleranceRouting(true));

    // Umlenkung ~0.05 rad < Toleranz 0.1
    let cursor = DVec3::new(400.0, 20.0, 0.0);
    let chain = builder.on_cursor_move(cursor, &catalog).expect("Kette erwartet");

    assert_eq!(chain.len(), 1);
    let PendingElement::Run { connector, pipe } = &chain.elements[0] else {
        panic!("Lauf erwartet");
    };
    let connector = connector.as_ref().expect("Verbinder erwartet");
    // Ausgangsseite zeigt zum Cursor, der Lauf endet dort
    assert!(connector.end().direction.normalize().dot(cursor.normalize()) > 0.999);
    assert!((pipe.end - cursor).length() < 1e-9);
}

#[test]
fn large_deflection_ignores_tolerance_and_places_elbow() {
    let catalog = catalog();
    let (model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.apply_setting(SettingChange::ToleranceRouting(true));

    let chain = builder
        .on_cursor_move(DVec3::new(200.0, 200.0, 0.0), &catalog)
        .expect("Kette erwartet");
    assert!(matches!(chain.elements[0], PendingElement::Elbow { .. }));
}

// ── Biegung und Cutback ─────────────────────────────────────────────

#[test]
fn bend_mode_uses_exact_angle() {
    let catalog = catalog();
    let (model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.apply_setting(SettingChange::PipeBend(true));

    // 60° liegt zwischen den Katalogwinkeln; die Biegung trifft exakt
    let theta = 60.0_f64.to_radians();
    let cursor = DVec3::new(200.0 * theta.cos(), 200.0 * theta.sin(), 0.0);
    let chain = builder.on_cursor_move(cursor, &catalog).expect("Kette erwartet");

    let PendingElement::Elbow { elbow, .. } = &chain.elements[0] else {
        panic!("Biegung erwartet");
    };
    assert!((elbow.angle - theta).abs() < 1e-9);
    assert_eq!(elbow.props.part_type, "PipeBend");
}

#[test]
fn cutback_mode_trims_catalog_elbow() {
    let catalog = catalog();
    let (model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.apply_setting(SettingChange::Cutback(true));

    let theta = 60.0_f64.to_radians();
    let cursor = DVec3::new(200.0 * theta.cos(), 200.0 * theta.sin(), 0.0);
    let chain = builder.on_cursor_move(cursor, &catalog).expect("Kette erwartet");

    let PendingElement::Elbow { elbow, .. } = &chain.elements[0] else {
        panic!("Cutback-Bogen erwartet");
    };
    assert!((elbow.angle - theta).abs() < 1e-9);
    assert!(elbow.props.prop_value("CutbackAngle").is_some());
}

// ── Abzweig ─────────────────────────────────────────────────────────

#[test]
fn branch_from_run_body_commits_tap_connection() {
    let catalog = catalog();
    let (mut model, _, props) = model_with_run(DVec3::ZERO, DVec3::new(1000.0, 0.0, 0.0));
    let host_id = 1;

    // Anker mitten auf dem Lauf (unbenannter Port, Richtung = Laufachse)
    let anchor = Pair {
        part: Some(host_id),
        port: pipe_routing_editor::Port::unnamed(DVec3::new(500.0, 0.0, 0.0), DVec3::X),
    };

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.on_cursor_move(DVec3::new(500.0, 300.0, 0.0), &catalog);

    let chain = builder.chain().expect("Kette erwartet");
    assert!(matches!(chain.elements[0], PendingElement::Branch(_)));

    let receipt = builder.on_accept(&mut model).expect("Commit erwartet");
    // Abzweig-Fitting wurde angebunden, der Lauf trägt den Anschlag
    let branch_id = receipt.created[0];
    assert!(model.connected_peer(branch_id, "S1").is_some());
    let peer = model.connected_peer(branch_id, "S1").unwrap();
    assert_eq!(peer.0, host_id);
}

// ── Auto-Routing ────────────────────────────────────────────────────

/// Modell mit zwei offenen Läufen für das Auto-Routing-Szenario:
/// Start-Port im Ursprung nach +X, End-Port bei (50,50,0) nach +X.
fn auto_route_model() -> (PipingModel, Pair, Pair) {
    let mut model = PipingModel::new();
    let group = model.find_or_create_line_group("25-100-CS300");
    let props = PartSizeProperties::new("CS300", "Pipe", nd(6.0)).with_prop("SizeRecordId", "P-X");
    let a = model.add_part(
        props.clone(),
        PartGeometry::Run {
            start: DVec3::new(-100.0, 0.0, 0.0),
            end: DVec3::ZERO,
            outer_diameter: 168.3,
            min_length: 10.0,
            fixed_max: None,
        },
        group,
    );
    let b = model.add_part(
        props,
        PartGeometry::Run {
            start: DVec3::new(50.0, 50.0, 0.0),
            end: DVec3::new(-50.0, 50.0, 0.0),
            outer_diameter: 168.3,
            min_length: 10.0,
            fixed_max: None,
        },
        group,
    );
    let start = Pair::new(a, model.part(a).unwrap().port("S2").unwrap());
    let end = Pair::new(b, model.part(b).unwrap().port("S1").unwrap());
    (model, start, end)
}

fn auto_route_catalog() -> InMemoryCatalog {
    let mut catalog = InMemoryCatalog::new();
    catalog.add_pipe("CS300", nd(6.0), 168.3, 10.0);
    catalog.add_elbow("CS300", nd(6.0), 90.0, false, 5.0);
    catalog
}

#[test]
fn auto_router_enumerates_both_jog_orderings() {
    let (_, start, end) = auto_route_model();
    let router = AutoRouter::new(start, end, &settings(), &auto_route_catalog())
        .expect("Router erwartet");
    assert_eq!(router.path_count(), 2);
}

#[test]
fn append_connects_both_endpoints_exactly_once() {
    let catalog = auto_route_catalog();
    for path in 0..2 {
        let (mut model, start, end) = auto_route_model();
        let mut router =
            AutoRouter::new(start.clone(), end.clone(), &settings(), &catalog)
                .expect("Router erwartet");
        router.set_current_path(path).expect("Pfad erwartet");

        let receipt = router.append(&mut model, None).expect("Append erwartet");
        assert!(!receipt.created.is_empty());

        let start_peer = model.connected_peer(start.part.unwrap(), &start.port.name);
        let end_peer = model.connected_peer(end.part.unwrap(), &end.port.name);
        assert!(start_peer.is_some(), "Startport unverbunden (Pfad {path})");
        assert!(end_peer.is_some(), "Endport unverbunden (Pfad {path})");
    }
}

#[test]
fn auto_router_reports_zero_paths_when_nothing_fits() {
    let (_, start, end) = auto_route_model();
    // Katalog ohne Bögen: kein Pfad realisierbar
    let mut catalog = InMemoryCatalog::new();
    catalog.add_pipe("CS300", nd(6.0), 168.3, 10.0);

    let router = AutoRouter::new(start, end, &settings(), &catalog).expect("Router erwartet");
    assert_eq!(router.path_count(), 0);
    assert!(router.preview_data().is_err());
}

// ── Degradierter Betrieb ────────────────────────────────────────────

#[test]
fn missing_reducer_degrades_to_straight_routing() {
    // Katalog ohne Reduzierungen
    let mut catalog = InMemoryCatalog::new();
    catalog.add_pipe("CS300", nd(6.0), 168.3, 50.0);
    catalog.add_pipe("CS300", nd(4.0), 114.3, 40.0);

    let (model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);
    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.apply_setting(SettingChange::Size(nd(4.0)));

    let chain = builder
        .on_cursor_move(DVec3::new(600.0, 0.0, 0.0), &catalog)
        .expect("Kette erwartet");

    // Keine Reduzierung, aber das Routing läuft weiter
    assert!(!chain.elements.iter().any(|e| matches!(e, PendingElement::Reducer { .. })));
    assert!(chain.elements.iter().any(|e| matches!(e, PendingElement::Run { .. })));
    assert!(!builder.warnings().is_empty());
}

#[test]
fn elbow_choice_angle_accessor_matches_selection() {
    // Kleiner Regressionstest für die öffentliche Auswahl-API
    let catalog = catalog();
    let elbows = pipe_routing_editor::SpecCatalog::find_elbows(&catalog, &nd(6.0), "CS300", false);
    let choice = pipe_routing_editor::select_elbow(70.0_f64.to_radians(), &elbows, false, false);
    match &choice {
        ElbowChoice::Fixed(c) => assert!((c.angle - 45.0_f64.to_radians()).abs() < 1e-9),
        other => panic!("Fixed erwartet, war {other:?}"),
    }
    assert_eq!(choice.angle(), Some(45.0_f64.to_radians()));
}

// ── Leere Kette / Zustandsmaschine ─────────────────────────────────

#[test]
fn accept_without_preview_is_rejected() {
    let catalog = catalog();
    let (mut model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    assert!(builder.on_accept(&mut model).is_err());
    assert_eq!(model.part_count(), 1);
}

#[test]
fn cursor_before_anchor_yields_no_chain() {
    let catalog = catalog();
    let mut builder = RouteSegmentBuilder::new(settings());
    assert!(builder.on_cursor_move(DVec3::ZERO, &catalog).is_none());
    assert_eq!(builder.state(), BuilderState::Idle);
}

/// Verkettung: zwei akzeptierte Segmente mit Bogen teilen die Gruppe.
#[test]
fn successive_segments_share_line_group() {
    let catalog = catalog();
    let (mut model, anchor, props) = model_with_run(DVec3::new(-500.0, 0.0, 0.0), DVec3::ZERO);

    let mut builder = RouteSegmentBuilder::new(settings());
    builder.set_anchor(anchor, Some(props), &model, &catalog);
    builder.on_cursor_move(DVec3::new(0.0, 0.0, 300.0), &catalog);
    let first = builder.on_accept(&mut model).expect("Commit erwartet");

    builder.on_cursor_move(DVec3::new(0.0, 400.0, 300.0), &catalog);
    let second = builder.on_accept(&mut model).expect("Commit erwartet");

    assert_eq!(first.group, second.group);
    for id in second.created {
        assert_eq!(model.line_group_of(id), Some(first.group));
    }
}
