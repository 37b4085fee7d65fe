use serde_json::{Value, json};

use crate::model::UvTile;
use crate::session::{LoadReport, PatchSession};

fn tile_json(t: &UvTile) -> Value {
    let rect = json!({"x": t.rect.x, "y": t.rect.y, "w": t.rect.w, "h": t.rect.h});
    json!({
        "name": t.texture_name,
        "layer": t.layer_index,
        "rect": rect,
        "blockSize": {"w": t.block_w, "h": t.block_h},
        "globalUv": t.flags.global_uv,
        "switchUv": t.flags.switch_uv,
        "material": t.material,
        "tint": t.tint,
    })
}

/// UV table of every target: custom tiles of layered targets keyed by slot,
/// and the full tile list of every live sprite atlas.
/// Shape: `{ layered: { target: [tile] }, sprites: { target: { width, height, tiles: [tile] } } }`.
pub fn uv_table_to_json(session: &PatchSession) -> Value {
    let mut layered = serde_json::Map::new();
    for t in session.layered_targets() {
        let tiles: Vec<Value> = t.tiles().values().map(tile_json).collect();
        layered.insert(t.name().to_string(), Value::Array(tiles));
    }
    let mut sprites = serde_json::Map::new();
    for t in session.sprite_targets() {
        let live = t.live();
        sprites.insert(
            t.name().to_string(),
            json!({
                "width": live.width(),
                "height": live.height(),
                "tiles": live.tiles.iter().map(tile_json).collect::<Vec<_>>(),
            }),
        );
    }
    json!({ "layered": layered, "sprites": sprites })
}

/// Name to slot bindings per target: `{ target: { name: index } }`.
pub fn registry_to_json(session: &PatchSession) -> Value {
    let mut out = serde_json::Map::new();
    let names = session
        .layered_targets()
        .map(|t| t.name())
        .chain(session.sprite_targets().map(|t| t.name()));
    for name in names {
        let Some(reg) = session.registry(name) else {
            continue;
        };
        let bindings: serde_json::Map<String, Value> =
            reg.iter().map(|(k, i)| (k.to_string(), json!(i))).collect();
        out.insert(name.to_string(), Value::Object(bindings));
    }
    Value::Object(out)
}

pub fn load_report_to_json(report: &LoadReport) -> Value {
    json!({
        "entries": report.entries,
        "bindings": report.bindings,
        "written": report.entries_written,
        "targets": report.targets,
        "conflicts": report.conflicts,
        "repacked": report.repacked,
    })
}
