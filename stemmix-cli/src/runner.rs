use std::{
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
    thread::sleep,
    time::Duration,
};

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use crossterm::{
    cursor, execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use ratatui::{backend::CrosstermBackend, Terminal};
use stemmix_lib::diagnostics::Report;
use stemmix_lib::mixdown;
use stemmix_lib::{EffectParameters, EngineConfig, MixGroup, OutputTarget};

use crate::controls::{self, Action, ControlState};
use crate::logging::{self, LogBuffer};
use crate::{cli, ui};

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32> {
    match args.subcommand() {
        Some(("create", sub)) => create(sub),
        Some(("mixdown", sub)) => run_mixdown(sub),
        _ => play(args, log_buffer),
    }
}

fn create(args: &ArgMatches) -> Result<i32> {
    match args.subcommand() {
        Some(("params-json", _)) => {
            println!("{}", cli::params::default_params_json()?);
            Ok(0)
        }
        _ => bail!("unknown create target"),
    }
}

fn stem_paths(args: &ArgMatches) -> Result<Vec<PathBuf>> {
    let stems: Vec<PathBuf> = args
        .get_many::<String>("STEMS")
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default();
    if stems.is_empty() {
        bail!("no stem files given");
    }
    Ok(stems)
}

/// Decode `stems` into a new group and apply `params` to every stem.
fn load_group(stems: &[PathBuf], config: EngineConfig, params: &EffectParameters) -> Result<MixGroup> {
    let mut group = MixGroup::new(config);
    if let Err(err) = group.load(stems) {
        for failure in &err.failures {
            warn!("{}", failure);
        }
        if err.loaded == 0 {
            return Err(err).context("none of the stems could be loaded");
        }
        warn!("{}", err);
    }

    group.apply_params_all(params);
    for stem in group.stems() {
        stem.set_volume(params.volume);
    }
    Ok(group)
}

fn run_mixdown(args: &ArgMatches) -> Result<i32> {
    let stems = stem_paths(args)?;
    let out = args
        .get_one::<String>("out")
        .map(PathBuf::from)
        .context("missing --out")?;
    let params = cli::params::effect_params(args)?;
    let mut config = cli::params::engine_config(args);
    config.output = OutputTarget::Manual;

    let group = load_group(&stems, config, &params)?;
    let buffer = mixdown::render_group(&group)?;
    mixdown::write_wav(&buffer, &out)?;

    if !args.get_flag("quiet") {
        println!(
            "wrote {} ({} stem(s), {:.2}s, {} ch @ {} Hz)",
            out.display(),
            group.stem_count(),
            buffer.duration_seconds(),
            buffer.channels,
            buffer.sample_rate
        );
    }
    Ok(0)
}

fn play(args: &ArgMatches, log_buffer: LogBuffer) -> Result<i32> {
    info!("Starting stemmix");
    let stems = stem_paths(args)?;
    let params = cli::params::effect_params(args)?;
    let config = cli::params::engine_config(args);
    let quiet = args.get_flag("quiet");

    let group = load_group(&stems, config, &params)?;

    let latest: Arc<Mutex<Option<Report>>> = Arc::new(Mutex::new(None));
    let sink = latest.clone();
    let reporter = group.reporter(Arc::new(Mutex::new(move |report: Report| {
        *sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(report);
    })));

    group.play_all();

    let _raw_mode = RawModeGuard::enable().ok();
    let mut terminal = if !quiet {
        let mut stdout = io::stdout();
        let _ = execute!(stdout, EnterAlternateScreen, cursor::Hide);
        let backend = CrosstermBackend::new(stdout);
        Terminal::new(backend).ok()
    } else {
        None
    };

    let mut control_state = ControlState::default();

    // UI / input loop.
    loop {
        if let Some(term) = terminal.as_mut() {
            let report = *latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let status = controls::status_text(&group, report, &control_state);
            let progress = report.map(|report| report.fraction()).unwrap_or(0.0);
            let log_lines = logging::snapshot(&log_buffer);
            ui::draw_status(term, &status, progress, &log_lines);
        }

        if controls::handle_key_event(&group, &mut control_state) == Action::Quit {
            break;
        }

        if !control_state.user_stopped && controls::all_stopped(&group) {
            info!("all stems finished");
            break;
        }

        sleep(Duration::from_millis(50));
    }

    if let Some(reporter) = reporter {
        reporter.stop();
    }
    group.stop_all();

    // Restore the terminal state before exiting.
    if let Some(mut term) = terminal {
        let _ = term.show_cursor();
        let stdout = term.backend_mut();
        let _ = execute!(stdout, LeaveAlternateScreen, cursor::Show);
    }

    Ok(0)
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}
