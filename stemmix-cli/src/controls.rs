use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use stemmix_lib::playback::format_time;
use stemmix_lib::{EffectParameters, EqUpdate, MixGroup, PlaybackState, PositionReport};

const SEEK_STEP_SECONDS: f64 = 5.0;
const VOLUME_STEP: f32 = 0.05;
const EFFECT_STEP: f32 = 0.1;

pub struct StatusSnapshot {
    pub text: String,
}

/// Interactive state that lives in the UI, not in the engines.
#[derive(Debug, Default)]
pub struct ControlState {
    /// Stem addressed by per-stem keys.
    pub selected: usize,
    /// Set by `s`; keeps the UI open after a manual stop.
    pub user_stopped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

pub fn status_text(group: &MixGroup, report: Option<PositionReport>, controls: &ControlState) -> StatusSnapshot {
    let mut lines = Vec::with_capacity(group.stem_count() + 2);

    match report {
        Some(report) => {
            let state = match report.state {
                PlaybackState::Playing => "▶ Playing",
                PlaybackState::Paused => "⏸ Paused",
                PlaybackState::Stopped => "■ Stopped",
            };
            lines.push(format!(
                "{}   {} / {}   ({:>5.1}%)",
                state,
                format_time(report.position_seconds),
                format_time(report.duration_seconds),
                report.fraction() * 100.0
            ));
        }
        None => lines.push("No stems loaded".to_string()),
    }

    if let Some(reference) = group.stem(0) {
        let params = reference.params();
        lines.push(format!(
            "Effects: {} (reverb {:.1}, delay {:.1}) | EQ: {} (low {:.1}, mid {:.1}, high {:.1})",
            on_off(params.effects_enabled),
            params.reverb_amount,
            params.delay_amount,
            on_off(params.eq_enabled),
            params.eq_low,
            params.eq_mid,
            params.eq_high
        ));
    }

    for (index, stem) in group.stems().iter().enumerate() {
        let marker = if index == controls.selected { '>' } else { ' ' };
        let name = stem
            .track()
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut line = format!(
            "{} [{}] {:<24} vol {:.2}",
            marker,
            index + 1,
            name,
            stem.get_volume()
        );
        if stem.is_muted() {
            line.push_str("  muted");
        }
        if let Some(err) = stem.last_error() {
            line.push_str(&format!("  ({})", err));
        }
        lines.push(line);
    }

    StatusSnapshot {
        text: lines.join("\n"),
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

pub fn handle_key_event(group: &MixGroup, controls: &mut ControlState) -> Action {
    if event::poll(Duration::from_millis(100)).unwrap_or(false) {
        if let Ok(Event::Key(key)) = event::read() {
            if key.kind != KeyEventKind::Press {
                return Action::Continue;
            }
            return apply_key(group, controls, key.code);
        }
    }

    Action::Continue
}

/// Apply one key press to the group.
pub fn apply_key(group: &MixGroup, controls: &mut ControlState, code: KeyCode) -> Action {
    match code {
        KeyCode::Char('q') | KeyCode::Esc => {
            group.stop_all();
            return Action::Quit;
        }
        KeyCode::Char(' ') => {
            if all_stopped(group) {
                controls.user_stopped = false;
                group.play_all();
            } else {
                group.pause_all();
            }
        }
        KeyCode::Char('p') => {
            controls.user_stopped = false;
            group.play_all();
        }
        KeyCode::Char('s') => {
            controls.user_stopped = true;
            group.stop_all();
        }
        KeyCode::Left => seek_by(group, -SEEK_STEP_SECONDS),
        KeyCode::Right => seek_by(group, SEEK_STEP_SECONDS),
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            if index < group.stem_count() {
                controls.selected = index;
            }
        }
        KeyCode::Char('m') => {
            if let Some(stem) = group.stem(controls.selected) {
                stem.toggle_mute();
            }
        }
        KeyCode::Char('-') => nudge_volume(group, controls, -VOLUME_STEP),
        KeyCode::Char('=') | KeyCode::Char('+') => nudge_volume(group, controls, VOLUME_STEP),
        KeyCode::Char('e') => {
            if let Some(reference) = group.stem(0) {
                group.set_effects_enabled_all(!reference.params().effects_enabled);
            }
        }
        KeyCode::Char('E') => {
            if let Some(reference) = group.stem(0) {
                group.set_eq_enabled_all(!reference.params().eq_enabled);
            }
        }
        KeyCode::Char('r') => nudge_shared(group, |p| p.reverb_amount, MixGroup::set_reverb_all, -EFFECT_STEP),
        KeyCode::Char('R') => nudge_shared(group, |p| p.reverb_amount, MixGroup::set_reverb_all, EFFECT_STEP),
        KeyCode::Char('d') => nudge_shared(group, |p| p.delay_amount, MixGroup::set_delay_all, -EFFECT_STEP),
        KeyCode::Char('D') => nudge_shared(group, |p| p.delay_amount, MixGroup::set_delay_all, EFFECT_STEP),
        KeyCode::Char('l') => nudge_eq(group, |p| p.eq_low, EqUpdate::low, -EFFECT_STEP),
        KeyCode::Char('L') => nudge_eq(group, |p| p.eq_low, EqUpdate::low, EFFECT_STEP),
        KeyCode::Char('k') => nudge_eq(group, |p| p.eq_mid, EqUpdate::mid, -EFFECT_STEP),
        KeyCode::Char('K') => nudge_eq(group, |p| p.eq_mid, EqUpdate::mid, EFFECT_STEP),
        KeyCode::Char('h') => nudge_eq(group, |p| p.eq_high, EqUpdate::high, -EFFECT_STEP),
        KeyCode::Char('H') => nudge_eq(group, |p| p.eq_high, EqUpdate::high, EFFECT_STEP),
        _ => {}
    }

    Action::Continue
}

pub fn all_stopped(group: &MixGroup) -> bool {
    group
        .stems()
        .iter()
        .all(|stem| stem.state() == PlaybackState::Stopped)
}

fn seek_by(group: &MixGroup, delta_seconds: f64) {
    if let Some(report) = group.poll_position() {
        if report.duration_seconds > 0.0 {
            let target = (report.position_seconds + delta_seconds).clamp(0.0, report.duration_seconds);
            group.seek_all(target / report.duration_seconds);
        }
    }
}

fn nudge_volume(group: &MixGroup, controls: &ControlState, delta: f32) {
    if let Some(stem) = group.stem(controls.selected) {
        stem.set_volume(stem.get_volume() + delta);
    }
}

fn nudge_shared(
    group: &MixGroup,
    read: fn(&EffectParameters) -> f32,
    write: fn(&MixGroup, f32),
    delta: f32,
) {
    if let Some(reference) = group.stem(0) {
        write(group, read(&reference.params()) + delta);
    }
}

fn nudge_eq(
    group: &MixGroup,
    read: fn(&EffectParameters) -> f32,
    band: fn(EqUpdate, f32) -> EqUpdate,
    delta: f32,
) {
    if let Some(reference) = group.stem(0) {
        group.set_eq_all(band(EqUpdate::default(), read(&reference.params()) + delta));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stemmix_lib::{DecodedTrack, EngineConfig};

    fn group() -> MixGroup {
        let a = Arc::new(DecodedTrack::from_samples("drums.wav", vec![0.0; 20_000], 2, 1_000));
        let b = Arc::new(DecodedTrack::from_samples("bass.wav", vec![0.0; 10_000], 1, 1_000));
        let mut group = MixGroup::new(EngineConfig::manual());
        group.load_tracks(vec![a, b]);
        group
    }

    #[test]
    fn space_starts_then_toggles_pause() {
        let group = group();
        let mut controls = ControlState::default();
        apply_key(&group, &mut controls, KeyCode::Char(' '));
        assert_eq!(group.stem(0).unwrap().state(), PlaybackState::Playing);
        apply_key(&group, &mut controls, KeyCode::Char(' '));
        assert_eq!(group.stem(0).unwrap().state(), PlaybackState::Paused);
        apply_key(&group, &mut controls, KeyCode::Char(' '));
        assert_eq!(group.stem(1).unwrap().state(), PlaybackState::Playing);
    }

    #[test]
    fn stop_marks_user_stop_and_quit_returns_quit() {
        let group = group();
        let mut controls = ControlState::default();
        apply_key(&group, &mut controls, KeyCode::Char('p'));
        apply_key(&group, &mut controls, KeyCode::Char('s'));
        assert!(controls.user_stopped);
        assert!(all_stopped(&group));
        assert_eq!(apply_key(&group, &mut controls, KeyCode::Char('q')), Action::Quit);
    }

    #[test]
    fn seek_keys_move_by_five_seconds() {
        let group = group();
        let mut controls = ControlState::default();
        apply_key(&group, &mut controls, KeyCode::Right);
        let report = group.poll_position().unwrap();
        assert!((report.position_seconds - 5.0).abs() < 1e-6);
        apply_key(&group, &mut controls, KeyCode::Left);
        apply_key(&group, &mut controls, KeyCode::Left);
        assert_eq!(group.poll_position().unwrap().position_seconds, 0.0);
    }

    #[test]
    fn per_stem_keys_follow_selection() {
        let group = group();
        let mut controls = ControlState::default();
        apply_key(&group, &mut controls, KeyCode::Char('2'));
        assert_eq!(controls.selected, 1);
        apply_key(&group, &mut controls, KeyCode::Char('9'));
        assert_eq!(controls.selected, 1);

        apply_key(&group, &mut controls, KeyCode::Char('m'));
        apply_key(&group, &mut controls, KeyCode::Char('-'));
        assert!(group.stem(1).unwrap().is_muted());
        assert!((group.stem(1).unwrap().get_volume() - 0.95).abs() < 1e-6);
        assert!(!group.stem(0).unwrap().is_muted());
    }

    #[test]
    fn effect_keys_apply_to_every_stem() {
        let group = group();
        let mut controls = ControlState::default();
        apply_key(&group, &mut controls, KeyCode::Char('R'));
        apply_key(&group, &mut controls, KeyCode::Char('L'));
        apply_key(&group, &mut controls, KeyCode::Char('e'));
        for stem in group.stems() {
            let params = stem.params();
            assert!((params.reverb_amount - 0.1).abs() < 1e-6);
            assert!((params.eq_low - 1.1).abs() < 1e-6);
            assert!(!params.effects_enabled);
        }
    }

    #[test]
    fn status_lists_every_stem() {
        let group = group();
        let controls = ControlState::default();
        group.stem(1).unwrap().mute();
        let status = status_text(&group, group.poll_position(), &controls);
        assert!(status.text.contains("■ Stopped"));
        assert!(status.text.contains("00:00 / 00:10"));
        assert!(status.text.contains("drums.wav"));
        assert!(status.text.contains("muted"));
    }
}
