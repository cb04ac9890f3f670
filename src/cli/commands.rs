use std::path::Path;

use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::cli::config::AppConfig;
use crate::element::element_model::RawScreen;
use crate::engine::Verifier;
use crate::env::{DriverSession, Environment, parse_view};
use crate::report::{RunReport, format_console_report, format_json_report};
use crate::script::{Script, ScriptRunner, compile};
use crate::trace::TraceLogger;
use crate::tree::ElementTree;

// ============================================================================
// run subcommand
// ============================================================================

/// Options of one `run` invocation after merging CLI flags with config.
#[derive(Debug, Clone)]
pub struct RunOptions<'a> {
    pub catalog: &'a str,
    pub script: &'a str,
    pub format: &'a str,
    pub output: Option<&'a str>,
    pub trace: Option<&'a str>,
    pub driver: Option<&'a str>,
}

/// Run scripts and return whether all passed.
pub fn cmd_run(
    options: &RunOptions,
    config: &AppConfig,
    verbose: u8,
) -> Result<bool, Box<dyn std::error::Error>> {
    let catalog = Catalog::load(Path::new(options.catalog))?;
    let scripts = load_scripts(options.script)?;

    if scripts.is_empty() {
        eprintln!("No scripts found at: {}", options.script);
        return Ok(true);
    }

    let command = options
        .driver
        .or(config.driver.command.as_deref())
        .ok_or("no driver command configured (use --driver or driver.command)")?;
    let env = DriverSession::launch(command, &config.driver.args)?;

    let logger = match options.trace {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };
    let mut verifier = Verifier::new(env, catalog, config.engine.clone(), logger);

    if verbose > 0 {
        eprintln!("Running {} scripts...", scripts.len());
    }

    let start = std::time::Instant::now();
    let mut results = Vec::new();
    for (i, script) in scripts.iter().enumerate() {
        if i > 0 {
            if let Err(e) = verifier.reset() {
                warn!(error = %e, "failed to reset the app between scripts");
            }
        }
        if verbose > 0 {
            eprintln!("  Running: {}", script.name);
        }
        results.push(ScriptRunner::run(script, &mut verifier));
    }
    let duration = start.elapsed().as_millis();
    verifier.env_mut().close()?;

    let report = RunReport::from_results("CLI Run", results).with_duration(duration);
    let all_passed = report.all_passed();

    let output_content = match options.format {
        "json" => format_json_report(&report)?,
        _ => format_console_report(&report),
    };

    match options.output {
        Some(path) => std::fs::write(path, &output_content)?,
        None => print!("{}", output_content),
    }

    Ok(all_passed)
}

/// Load scripts from a single file or a directory of script files.
pub fn load_scripts(path: &str) -> Result<Vec<Script>, Box<dyn std::error::Error>> {
    let metadata = std::fs::metadata(path)?;
    if metadata.is_dir() {
        let mut scripts = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let p = entry?.path();
            let known = p
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "yaml" | "yml" | "json" | "txt" | "script"));
            if known {
                scripts.push(load_script(&p)?);
            }
        }
        // Sort by name for deterministic order
        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scripts)
    } else {
        Ok(vec![load_script(Path::new(path))?])
    }
}

/// Load one script. YAML and JSON files hold pre-structured steps;
/// anything else is compiled from script text.
pub fn load_script(path: &Path) -> Result<Script, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let script = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&content)?,
        Some("json") => serde_json::from_str(&content)?,
        _ => {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("script");
            compile(name, &content)?
        }
    };
    Ok(script)
}

// ============================================================================
// compile subcommand
// ============================================================================

pub fn cmd_compile(script_path: &str, output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let script = load_script(Path::new(script_path))?;
    let yaml = serde_yaml::to_string(&script)?;
    match output {
        Some(path) => std::fs::write(path, &yaml)?,
        None => print!("{}", yaml),
    }
    Ok(())
}

// ============================================================================
// check subcommand
// ============================================================================

pub fn cmd_check(catalog_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog::load(Path::new(catalog_path))?;
    println!(
        "Catalog OK: {} screens, {} elements (default screen: {})",
        catalog.screens().len(),
        catalog.elements().count(),
        catalog.default_screen().unwrap_or("-")
    );
    for screen in catalog.screens() {
        let paths: usize = screen.elements.iter().map(|e| e.paths.len()).sum();
        println!(
            "  {}: {} elements, {} dependency paths, skeleton {}",
            screen.name,
            screen.elements.len(),
            paths,
            screen.skeleton.fingerprint()
        );
    }
    Ok(())
}

// ============================================================================
// identify subcommand
// ============================================================================

pub fn cmd_identify(
    catalog_path: &str,
    observation_path: &str,
    config: &AppConfig,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let catalog =
        Catalog::load(Path::new(catalog_path))?.with_default_screen(config.engine.default_screen.clone());
    let tree = load_observation(observation_path)?;
    let skeleton = tree.skeleton();

    let screen = catalog.resolve_screen(&skeleton).map(str::to_string);
    info!(screen = ?screen, nodes = tree.len(), "identified observation");
    match &screen {
        Some(name) => {
            println!("{}", name);
            let present = catalog.present_elements(name, &tree);
            for api in present {
                println!("  {}", api.name);
            }
        }
        None => println!("(no matching screen)"),
    }
    Ok(screen)
}

/// Read an observation: raw JSON screen, or tagged view markup.
pub fn load_observation(path: &str) -> Result<ElementTree, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let raw: RawScreen = if content.trim_start().starts_with('<') {
        parse_view(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(ElementTree::from_raw(&raw, None))
}
