//! Pipe Routing Editor — kopfloser Skript-Treiber.
//!
//! Spielt ein JSON-Routing-Skript (Anker, Cursor-Samples, Schalter,
//! Accept) gegen die Engine ab und schreibt das resultierende Modell
//! als Projekt-XML.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use pipe_routing_editor::app::ScriptedIntent;
use pipe_routing_editor::{
    parse_piping_project, write_piping_project, InMemoryCatalog, PipingModel, RouterOptions,
    RoutingSession,
};

/// JSON-Wurzel eines Routing-Skripts.
#[derive(Debug, Deserialize)]
struct RoutingScript {
    #[serde(default)]
    steps: Vec<ScriptedIntent>,
}

/// Kommandozeilen-Argumente (ohne externes CLI-Framework, wie der Rest
/// der Toolchain schlicht gehalten).
struct Args {
    script: PathBuf,
    catalog: PathBuf,
    project_in: Option<PathBuf>,
    project_out: Option<PathBuf>,
    options: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut script = None;
        let mut catalog = None;
        let mut project_in = None;
        let mut project_out = None;
        let mut options = None;

        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--catalog" => catalog = Some(PathBuf::from(next_value(&mut iter, "--catalog")?)),
                "--in" => project_in = Some(PathBuf::from(next_value(&mut iter, "--in")?)),
                "--out" => project_out = Some(PathBuf::from(next_value(&mut iter, "--out")?)),
                "--options" => options = Some(PathBuf::from(next_value(&mut iter, "--options")?)),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                other if script.is_none() && !other.starts_with('-') => {
                    script = Some(PathBuf::from(other));
                }
                other => bail!("Unbekanntes Argument: {other}"),
            }
        }

        Ok(Self {
            script: script.context("Skript-Datei fehlt (siehe --help)")?,
            catalog: catalog.context("Katalog-Datei fehlt (--catalog <datei.toml>)")?,
            project_in,
            project_out,
            options,
        })
    }
}

fn next_value(iter: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    iter.next().with_context(|| format!("Wert für {flag} fehlt"))
}

fn print_usage() {
    println!(
        "Pipe-Routing-Editor <skript.json> --catalog <katalog.toml> \
         [--in <projekt.xml>] [--out <projekt.xml>] [--options <optionen.toml>]"
    );
}

fn main() -> Result<()> {
    // Logger initialisieren
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Pipe Routing Editor v{} startet...", env!("CARGO_PKG_VERSION"));

    let args = Args::parse()?;

    // Optionen aus TOML laden (oder Standardwerte)
    let options = match &args.options {
        Some(path) => RouterOptions::load_from_file(path),
        None => RouterOptions::load_from_file(&RouterOptions::config_path()),
    };

    let catalog = InMemoryCatalog::load_from_file(&args.catalog)?;
    log::info!("Katalog geladen: {} Einträge", catalog.len());

    // Bestehendes Projekt fortsetzen oder leer beginnen
    let model = match &args.project_in {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Projekt nicht lesbar: {}", path.display()))?;
            let model = parse_piping_project(&text)?;
            log::info!("Projekt geladen: {} Parts", model.part_count());
            model
        }
        None => PipingModel::new(),
    };

    let script_text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Skript nicht lesbar: {}", args.script.display()))?;
    let script: RoutingScript =
        serde_json::from_str(&script_text).context("Skript-JSON nicht lesbar")?;

    let mut session = RoutingSession::new(model, Box::new(catalog), options)?;
    for (index, step) in script.steps.into_iter().enumerate() {
        let intent = step.into_intent()?;
        if let Err(err) = session.handle_intent(intent) {
            log::error!("Schritt {} fehlgeschlagen: {:#}", index + 1, err);
        }
    }

    let model = session.into_model();
    log::info!(
        "Skript abgespielt: {} Parts, {} Verbindungen",
        model.part_count(),
        model.connection_count()
    );

    let xml = write_piping_project(&model)?;
    match &args.project_out {
        Some(path) => {
            std::fs::write(path, &xml)
                .with_context(|| format!("Projekt nicht schreibbar: {}", path.display()))?;
            log::info!("Projekt geschrieben: {}", path.display());
        }
        None => print!("{xml}"),
    }

    Ok(())
}
