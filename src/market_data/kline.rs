use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::candle_window::Candle;

/// Stream name for a (symbol, interval) kline subscription, e.g. `btcusdt@kline_1m`.
pub fn stream_name(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{interval}", symbol.to_lowercase())
}

/// JSON text of the subscription request sent right after the socket opens.
pub fn subscribe_request(symbol: &str, interval: &str, id: u64) -> String {
    json!({
        "method": "SUBSCRIBE",
        "params": [stream_name(symbol, interval)],
        "id": id,
    })
    .to_string()
}

/// Parse one inbound feed message.
///
/// Returns `Ok(None)` for well-formed JSON without a kline payload (for
/// example the `{"result":null,"id":1}` subscription acknowledgement) and
/// `Err` for invalid JSON or a kline missing one of `t`, `o`, `h`, `l`, `c`.
///
/// Both the direct single-stream payload and the combined-stream envelope
/// (`{"stream": ..., "data": {...}}`) are accepted.
pub fn parse_kline_message(text: &str) -> Result<Option<Candle>> {
    let root: Value = serde_json::from_str(text).context("failed to parse feed JSON")?;

    let data = root.get("data").unwrap_or(&root);
    let Some(k) = data.get("k") else {
        return Ok(None);
    };

    let open_time = k["t"].as_i64().context("missing field k.t")?;
    let open = parse_string_f64(&k["o"], "k.o")?;
    let high = parse_string_f64(&k["h"], "k.h")?;
    let low = parse_string_f64(&k["l"], "k.l")?;
    let close = parse_string_f64(&k["c"], "k.c")?;

    Ok(Some(Candle::new(open_time, open, high, low, close)))
}

/// The feed sends prices as JSON strings; plain numbers are accepted too.
fn parse_string_f64(val: &Value, name: &str) -> Result<f64> {
    match val {
        Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        Value::Null => anyhow::bail!("missing field {name}"),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}
