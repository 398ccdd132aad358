//! quote-runner: headless quoting runner.
//!
//! Usage:
//!   quote-runner import --db quotes.db --data-dir ./data
//!   quote-runner quote  --db quotes.db --service drains --input input.json
//!   quote-runner --ipc-mode --db quotes.db --service drains
//!
//! With the default `:memory:` database, documents under
//! `<data-dir>/pricing` are imported at startup.

use anyhow::{bail, Context, Result};
use fieldquote_core::{
    fields::FieldKey,
    input::QuoteInput,
    quote::QuoteResult,
    resolver::ConfigResolver,
    session::{QuoteSession, RefreshMode},
    store::QuoteStore,
    tracker::ChangeSink,
};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    SetInput { input: QuoteInput },
    SetOverride { field: String, value: f64 },
    ClearOverride { field: String },
    Refresh {
        #[serde(default)]
        force: bool,
    },
    Save,
    Cancel,
    Quit,
}

#[derive(serde::Serialize)]
struct UiState<'a> {
    session_id: &'a str,
    service_id: &'a str,
    input:      &'a QuoteInput,
    overrides:  &'a fieldquote_core::overrides::OverrideSet,
    pending_changes: usize,
    result:     &'a QuoteResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cleared:    Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag(&args, "--db").unwrap_or(":memory:");
    let data_dir = flag(&args, "--data-dir").unwrap_or("./data");
    let service = flag(&args, "--service").unwrap_or("drains");
    let mode = args.get(1).map(String::as_str).filter(|a| !a.starts_with("--"));

    let store = QuoteStore::open(db)?;
    store.migrate()?;
    if db == ":memory:" || mode == Some("import") {
        let imported = import_documents(&store, data_dir)?;
        if mode == Some("import") {
            println!("Imported {imported} pricing documents into {db}");
            return Ok(());
        }
    }

    let mut resolver = ConfigResolver::new();
    let mut session = QuoteSession::resolve_and_open(&mut resolver, &store, service, &store);

    if ipc_mode {
        return run_ipc_loop(&mut session, &mut resolver, &store);
    }

    match mode {
        Some("quote") | None => {
            if let Some(path) = flag(&args, "--input") {
                let raw = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
                let input: QuoteInput = serde_json::from_str(&raw)?;
                session.update_input(input);
            }
            print_summary(session.result());
            Ok(())
        }
        Some(other) => bail!("unknown mode '{other}' (expected import or quote)"),
    }
}

fn run_ipc_loop<S: ChangeSink>(
    session: &mut QuoteSession<S>,
    resolver: &mut ConfigResolver,
    store: &QuoteStore,
) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();
    let mut handle = stdin.lock();

    loop {
        buffer.clear();
        if handle.read_line(&mut buffer)? == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, &e.to_string())?;
                continue;
            }
        };

        let mut cleared = Vec::new();
        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => {}
            IpcCommand::SetInput { input } => cleared = session.update_input(input),
            IpcCommand::SetOverride { field, value } => match field.parse::<FieldKey>() {
                Ok(key) => cleared = session.set_override(key, value),
                Err(e) => {
                    write_error(&mut stdout, &e.to_string())?;
                    continue;
                }
            },
            IpcCommand::ClearOverride { field } => match field.parse::<FieldKey>() {
                Ok(key) => cleared = session.clear_override(&key),
                Err(e) => {
                    write_error(&mut stdout, &e.to_string())?;
                    continue;
                }
            },
            IpcCommand::Refresh { force } => {
                let mode = if force { RefreshMode::Force } else { RefreshMode::Keep };
                session.refresh_config(resolver, store, mode);
            }
            IpcCommand::Save => {
                if let Err(e) = session.save() {
                    write_error(&mut stdout, &e.to_string())?;
                    continue;
                }
            }
            IpcCommand::Cancel => session.cancel(),
        }

        let state = UiState {
            session_id: session.session_id(),
            service_id: session.service_id(),
            input: session.input(),
            overrides: session.overrides(),
            pending_changes: session.tracker().pending_count(),
            result: session.result(),
            cleared: cleared.iter().map(|f| f.to_string()).collect(),
        };
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn write_error(out: &mut impl Write, message: &str) -> Result<()> {
    let err_json = serde_json::json!({ "error": message });
    writeln!(out, "{err_json}")?;
    out.flush()?;
    Ok(())
}

/// Load `<data_dir>/pricing/<service>.json` into the store. The service id
/// is the file stem; the version comes from the document or defaults to 1.
fn import_documents(store: &QuoteStore, data_dir: &str) -> Result<usize> {
    let dir = Path::new(data_dir).join("pricing");
    if !dir.is_dir() {
        log::warn!("No pricing directory at {}; quoting from compiled defaults", dir.display());
        return Ok(0);
    }

    let mut imported = 0;
    let mut paths: Vec<_> = fs::read_dir(&dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "json"))
        .collect();
    paths.sort();

    for path in paths {
        let Some(service_id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let raw = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let doc: serde_json::Value =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        let version = fieldquote_core::config_shape::unwrap_envelope(&doc)
            .get("version")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as u32;
        store.put_config_document(service_id, version, &doc)?;
        log::info!("Imported {service_id} v{version} from {}", path.display());
        imported += 1;
    }
    Ok(imported)
}

fn print_summary(r: &QuoteResult) {
    println!("=== QUOTE: {} (config v{}) ===", r.service_id, r.config_version);
    println!("  frequency:        {} ({:?})", r.frequency, r.frequency_class);
    println!("  rate category:    {} ({:.0}% commission)", r.rate_category, r.commission_rate * 100.0);
    println!("  contract months:  {}", r.contract_months);
    println!();
    for item in &r.line_items {
        println!(
            "  {:<28} {:>10.2} x {:>8.2} = {:>10.2}{}",
            item.display_name,
            item.quantity,
            item.rate,
            item.amount,
            if item.one_time { "  (one-time)" } else { "" }
        );
    }
    println!();
    println!("  per visit:        ${:.2}", r.per_visit);
    println!("  installation:     ${:.2}", r.installation_total);
    println!("  first visit:      ${:.2}", r.first_visit);
    println!("  first month:      ${:.2}", r.first_month);
    println!("  monthly:          ${:.2}", r.monthly_recurring);
    println!("  contract total:   ${:.2}", r.contract_total);
    if let Some(visits) = r.total_visits {
        println!("  visits:           {visits}");
    }
    if !r.notes.is_empty() {
        println!();
        println!("=== NOTES ===");
        for note in &r.notes {
            println!("  - {note}");
        }
    }
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == name)
        .map(|w| w[1].as_str())
}
