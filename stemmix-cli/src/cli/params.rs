//! Resolve effect parameters from `--params-json` and the effect flags.

use std::fs;

use anyhow::{Context, Result};
use clap::ArgMatches;
use stemmix_lib::{EffectParameters, EngineConfig};

/// Start from the JSON file (if any), then apply explicit flags on top.
pub fn effect_params(args: &ArgMatches) -> Result<EffectParameters> {
    let mut params = match args.get_one::<String>("params-json") {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read params json {}", path))?;
            EffectParameters::from_json(&text)
                .with_context(|| format!("invalid params json {}", path))?
        }
        None => EffectParameters::default(),
    };

    if let Some(&volume) = args.get_one::<f32>("volume") {
        params.volume = volume;
    }
    if let Some(&reverb) = args.get_one::<f32>("reverb") {
        params.reverb_amount = reverb;
    }
    if let Some(&delay) = args.get_one::<f32>("delay") {
        params.delay_amount = delay;
    }
    if let Some(&low) = args.get_one::<f32>("eq-low") {
        params.eq_low = low;
    }
    if let Some(&mid) = args.get_one::<f32>("eq-mid") {
        params.eq_mid = mid;
    }
    if let Some(&high) = args.get_one::<f32>("eq-high") {
        params.eq_high = high;
    }
    if args.get_flag("no-effects") {
        params.effects_enabled = false;
    }
    if args.get_flag("no-eq") {
        params.eq_enabled = false;
    }

    Ok(params.clamped())
}

pub fn engine_config(args: &ArgMatches) -> EngineConfig {
    let mut config = EngineConfig::default();
    if let Some(&frames) = args.get_one::<usize>("block-frames") {
        config.block_frames = frames.max(1);
    }
    config
}

/// Pretty JSON for the default parameters.
pub fn default_params_json() -> Result<String> {
    EffectParameters::default()
        .to_json_pretty()
        .context("failed to serialize default effect parameters")
}
