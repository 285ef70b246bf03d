use crate::params::Params;
use crate::pattern::{Track, NUM_STEPS};
use crate::state::Store;

use anyhow::{anyhow, Context, Result};
use camino::Utf8Path;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;

#[derive(Serialize)]
struct Snapshot {
    bpm: f64,
    swing: f64,
    grid: BTreeMap<Track, [bool; NUM_STEPS]>,
    vol: BTreeMap<Track, f64>,
    params: BTreeMap<&'static str, f64>,
}

pub fn save_state(store: &Store) -> Result<String> {
    let snapshot = Snapshot {
        bpm: store.bpm(),
        swing: store.swing(),
        grid: Track::ALL
            .iter()
            .map(|&track| (track, store.pattern.row(track)))
            .collect(),
        vol: Track::ALL
            .iter()
            .map(|&track| (track, store.volumes.get(track).value()))
            .collect(),
        params: store
            .synth
            .iter()
            .map(|(key, param)| (key, param.value()))
            .collect(),
    };
    Ok(serde_json::to_string(&snapshot)?)
}

/// Applies a blob written by [`save_state`].
///
/// Fields are applied one by one. Missing or ill-typed fields are left alone
/// and their names returned, values go through the usual clamping. A blob
/// that is not a JSON object changes nothing.
pub fn load_state(store: &Store, blob: &str) -> Result<Vec<String>> {
    let value: Value = serde_json::from_str(blob).context("state is not valid JSON")?;
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("state must be a JSON object"))?;

    let mut skipped = Vec::new();

    for (key, param) in store.transport.iter() {
        if let Some(v) = number(key, object.get(key), &mut skipped) {
            param.set(v)?;
        }
    }

    match object.get("grid").and_then(Value::as_object) {
        Some(grid) => {
            for track in Track::ALL {
                match grid.get(track.name()).and_then(parse_row) {
                    Some(row) => store.pattern.set_row(track, &row),
                    None => skipped.push(format!("grid.{}", track)),
                }
            }
        }
        None => skipped.push("grid".into()),
    }

    match object.get("vol").and_then(Value::as_object) {
        Some(vol) => {
            for track in Track::ALL {
                let field = format!("vol.{}", track);
                if let Some(v) = number(&field, vol.get(track.name()), &mut skipped) {
                    store.volumes.get(track).set(v)?;
                }
            }
        }
        None => skipped.push("vol".into()),
    }

    match object.get("params").and_then(Value::as_object) {
        Some(params) => load_params(store, params, &mut skipped)?,
        None => skipped.push("params".into()),
    }

    Ok(skipped)
}

fn load_params(store: &Store, params: &Map<String, Value>, skipped: &mut Vec<String>) -> Result<()> {
    for (key, param) in store.synth.iter() {
        match params.get(key).and_then(Value::as_f64) {
            Some(v) => {
                param.set(v)?;
            }
            None => skipped.push(format!("params.{}", key)),
        }
    }
    Ok(())
}

fn number(field: &str, value: Option<&Value>, skipped: &mut Vec<String>) -> Option<f64> {
    let n = value.and_then(Value::as_f64);
    if n.is_none() {
        skipped.push(field.to_string());
    }
    n
}

fn parse_row(value: &Value) -> Option<[bool; NUM_STEPS]> {
    let cells = value.as_array()?;
    if cells.len() != NUM_STEPS {
        return None;
    }
    let mut row = [false; NUM_STEPS];
    for (cell, value) in row.iter_mut().zip(cells) {
        *cell = value.as_bool()?;
    }
    Some(row)
}

pub fn write_state(store: &Store, path: &Utf8Path) -> Result<()> {
    let blob = save_state(store)?;
    if let Some(dir) = path.parent() {
        if !dir.as_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    fs::write(path, blob).with_context(|| format!("unable to write {}", path))
}

pub fn read_state(store: &Store, path: &Utf8Path) -> Result<Vec<String>> {
    let blob = fs::read_to_string(path).with_context(|| format!("unable to read {}", path))?;
    load_state(store, &blob)
}
