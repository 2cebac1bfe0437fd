//! Effect parameters and their lock-free shared representation.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::constants::EQ_MAX;

/// Snapshot of every value the effect chain reads for one buffer.
///
/// `#[serde(default)]` lets a settings file name only the fields it changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParameters {
    pub reverb_amount: f32,
    pub delay_amount: f32,
    pub eq_low: f32,
    pub eq_mid: f32,
    pub eq_high: f32,
    pub effects_enabled: bool,
    pub eq_enabled: bool,
    pub volume: f32,
    pub muted: bool,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            reverb_amount: 0.0,
            delay_amount: 0.0,
            eq_low: 1.0,
            eq_mid: 1.0,
            eq_high: 1.0,
            effects_enabled: true,
            eq_enabled: true,
            volume: 1.0,
            muted: false,
        }
    }
}

impl EffectParameters {
    /// Parse a settings document, which may name only some fields. Values
    /// are clamped the same way the setters clamp them.
    ///
    /// Anything other than a JSON object is rejected.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom(
                "effect parameters must be a JSON object",
            ));
        }
        serde_json::from_value::<Self>(value).map(Self::clamped)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Return a copy with every continuous value clamped to its range.
    pub fn clamped(self) -> Self {
        Self {
            reverb_amount: clamp_unit(self.reverb_amount),
            delay_amount: clamp_unit(self.delay_amount),
            eq_low: clamp_eq(self.eq_low),
            eq_mid: clamp_eq(self.eq_mid),
            eq_high: clamp_eq(self.eq_high),
            volume: clamp_unit(self.volume),
            ..self
        }
    }

    /// True when the EQ stage would change the signal.
    pub fn eq_active(&self) -> bool {
        self.eq_enabled && (self.eq_low != 1.0 || self.eq_mid != 1.0 || self.eq_high != 1.0)
    }

    /// Final linear gain applied after the EQ stage.
    pub fn output_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }
}

/// Partial EQ change: `None` leaves a band as it is.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EqUpdate {
    pub low: Option<f32>,
    pub mid: Option<f32>,
    pub high: Option<f32>,
}

impl EqUpdate {
    pub fn low(mut self, value: f32) -> Self {
        self.low = Some(value);
        self
    }

    pub fn mid(mut self, value: f32) -> Self {
        self.mid = Some(value);
        self
    }

    pub fn high(mut self, value: f32) -> Self {
        self.high = Some(value);
        self
    }

    /// Update setting all three bands.
    pub fn all(low: f32, mid: f32, high: f32) -> Self {
        Self {
            low: Some(low),
            mid: Some(mid),
            high: Some(high),
        }
    }
}

pub(crate) fn clamp_unit(value: f32) -> f32 {
    sanitize(value).clamp(0.0, 1.0)
}

pub(crate) fn clamp_eq(value: f32) -> f32 {
    sanitize(value).clamp(0.0, EQ_MAX)
}

fn sanitize(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value
    }
}

/// `f32` stored as raw bits so the output callback can load it without locking.
#[derive(Debug)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Effect parameters shared between the control thread and the callback.
///
/// Every field is an independent relaxed atomic. A write becomes visible to
/// the callback at some later buffer boundary; fields are not published
/// together, which is fine for continuous control values.
#[derive(Debug)]
pub(crate) struct SharedParams {
    reverb_amount: AtomicF32,
    delay_amount: AtomicF32,
    eq_low: AtomicF32,
    eq_mid: AtomicF32,
    eq_high: AtomicF32,
    effects_enabled: AtomicBool,
    eq_enabled: AtomicBool,
    volume: AtomicF32,
    muted: AtomicBool,
}

impl SharedParams {
    pub(crate) fn new(initial: EffectParameters) -> Self {
        let initial = initial.clamped();
        Self {
            reverb_amount: AtomicF32::new(initial.reverb_amount),
            delay_amount: AtomicF32::new(initial.delay_amount),
            eq_low: AtomicF32::new(initial.eq_low),
            eq_mid: AtomicF32::new(initial.eq_mid),
            eq_high: AtomicF32::new(initial.eq_high),
            effects_enabled: AtomicBool::new(initial.effects_enabled),
            eq_enabled: AtomicBool::new(initial.eq_enabled),
            volume: AtomicF32::new(initial.volume),
            muted: AtomicBool::new(initial.muted),
        }
    }

    pub(crate) fn snapshot(&self) -> EffectParameters {
        EffectParameters {
            reverb_amount: self.reverb_amount.load(),
            delay_amount: self.delay_amount.load(),
            eq_low: self.eq_low.load(),
            eq_mid: self.eq_mid.load(),
            eq_high: self.eq_high.load(),
            effects_enabled: self.effects_enabled.load(Ordering::Relaxed),
            eq_enabled: self.eq_enabled.load(Ordering::Relaxed),
            volume: self.volume.load(),
            muted: self.muted.load(Ordering::Relaxed),
        }
    }

    /// Store every field of `params` after clamping.
    pub(crate) fn apply(&self, params: EffectParameters) {
        let params = params.clamped();
        self.reverb_amount.store(params.reverb_amount);
        self.delay_amount.store(params.delay_amount);
        self.eq_low.store(params.eq_low);
        self.eq_mid.store(params.eq_mid);
        self.eq_high.store(params.eq_high);
        self.effects_enabled
            .store(params.effects_enabled, Ordering::Relaxed);
        self.eq_enabled.store(params.eq_enabled, Ordering::Relaxed);
        self.volume.store(params.volume);
        self.muted.store(params.muted, Ordering::Relaxed);
    }

    pub(crate) fn set_volume(&self, value: f32) {
        self.volume.store(clamp_unit(value));
    }

    pub(crate) fn volume(&self) -> f32 {
        self.volume.load()
    }

    pub(crate) fn set_reverb(&self, value: f32) {
        self.reverb_amount.store(clamp_unit(value));
    }

    pub(crate) fn set_delay(&self, value: f32) {
        self.delay_amount.store(clamp_unit(value));
    }

    pub(crate) fn set_eq(&self, update: EqUpdate) {
        if let Some(low) = update.low {
            self.eq_low.store(clamp_eq(low));
        }
        if let Some(mid) = update.mid {
            self.eq_mid.store(clamp_eq(mid));
        }
        if let Some(high) = update.high {
            self.eq_high.store(clamp_eq(high));
        }
    }

    pub(crate) fn set_effects_enabled(&self, enabled: bool) {
        self.effects_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flip the effects flag and return the new value.
    pub(crate) fn toggle_effects(&self) -> bool {
        !self.effects_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub(crate) fn set_eq_enabled(&self, enabled: bool) {
        self.eq_enabled.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn toggle_eq(&self) -> bool {
        !self.eq_enabled.fetch_xor(true, Ordering::Relaxed)
    }

    pub(crate) fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    pub(crate) fn toggle_mute(&self) -> bool {
        !self.muted.fetch_xor(true, Ordering::Relaxed)
    }

    pub(crate) fn muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_clamp_to_documented_ranges() {
        let shared = SharedParams::new(EffectParameters::default());
        shared.set_volume(-5.0);
        shared.set_reverb(3.0);
        shared.set_delay(-1.0);
        shared.set_eq(EqUpdate::default().low(10.0).high(-2.0));

        let params = shared.snapshot();
        assert_eq!(params.volume, 0.0);
        assert_eq!(params.reverb_amount, 1.0);
        assert_eq!(params.delay_amount, 0.0);
        assert_eq!(params.eq_low, 2.0);
        assert_eq!(params.eq_mid, 1.0);
        assert_eq!(params.eq_high, 0.0);
    }

    #[test]
    fn partial_eq_update_leaves_other_bands() {
        let shared = SharedParams::new(EffectParameters::default());
        shared.set_eq(EqUpdate::all(0.5, 1.5, 0.25));
        shared.set_eq(EqUpdate::default().mid(0.75));

        let params = shared.snapshot();
        assert_eq!(params.eq_low, 0.5);
        assert_eq!(params.eq_mid, 0.75);
        assert_eq!(params.eq_high, 0.25);
    }

    #[test]
    fn toggles_return_new_state() {
        let shared = SharedParams::new(EffectParameters::default());
        assert!(!shared.toggle_effects());
        assert!(shared.toggle_effects());
        assert!(!shared.toggle_eq());
        assert!(shared.toggle_mute());
        assert!(shared.muted());
    }

    #[test]
    fn mute_keeps_stored_volume() {
        let shared = SharedParams::new(EffectParameters::default());
        shared.set_volume(0.6);
        shared.set_muted(true);
        let params = shared.snapshot();
        assert_eq!(params.output_gain(), 0.0);
        assert!((shared.volume() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn partial_json_uses_defaults_and_clamps() {
        let json = r#"{"reverb_amount":4.0,"eq_low":0.5}"#;
        let params = EffectParameters::from_json(json).expect("deserialize params");
        assert_eq!(params.reverb_amount, 1.0);
        assert_eq!(params.eq_low, 0.5);
        assert_eq!(params.eq_mid, 1.0);
        assert!(params.effects_enabled);
        assert_eq!(params.volume, 1.0);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(EffectParameters::from_json("{\"volume\": \"loud\"}").is_err());
        assert!(EffectParameters::from_json("[]").is_err());
        assert!(EffectParameters::from_json("0.5").is_err());
        assert!(EffectParameters::from_json("{}").is_ok());
    }

    #[test]
    fn eq_inactive_at_unity() {
        let mut params = EffectParameters::default();
        assert!(!params.eq_active());
        params.eq_mid = 0.5;
        assert!(params.eq_active());
        params.eq_enabled = false;
        assert!(!params.eq_active());
    }
}
