/// Utility helpers shared by sources and writers.
///
/// This module contains:
/// - Time helpers
/// - Parsing of Valkey `INFO` replies
///
/// IMPORTANT:
/// - No scheduling logic should live here.
/// - This module must remain lightweight and deterministic.
///
use serde_json::{Map, Number, Value};

/// Returns the current Unix timestamp in milliseconds.
///
/// Used as the `ts` field of every sampled row.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Parse a Valkey / Redis `INFO` reply into a flat JSON object.
///
/// Input:
///     # CPU
///     used_cpu_sys:12.345
///     used_cpu_user:6.7
///     executable:/usr/bin/valkey-server
///
/// Output:
///     { "used_cpu_sys": 12.345, "used_cpu_user": 6.7,
///       "executable": "/usr/bin/valkey-server" }
///
/// DESIGN NOTES:
/// - `# Section` headers and blank lines are skipped.
/// - Values that parse as integers or finite floats become JSON numbers,
///   everything else stays a string (e.g. `db0:keys=1,expires=0`).
/// - Only the first `:` splits key and value, so values may contain `:`.
///
pub fn parse_info(raw: &str) -> Map<String, Value> {
    let mut fields = Map::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };

        fields.insert(key.to_string(), info_value(value));
    }

    fields
}

fn info_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_sections_numbers_and_strings() {
        let raw = "# CPU\r\nused_cpu_sys:12.5\r\nused_cpu_user:3\r\n\r\n# Server\r\nexecutable:/usr/bin/valkey-server\r\ndb0:keys=1,expires=0\r\n";
        let fields = parse_info(raw);

        assert_eq!(fields.len(), 4);
        assert_eq!(fields["used_cpu_sys"], json!(12.5));
        assert_eq!(fields["used_cpu_user"], json!(3));
        assert_eq!(fields["executable"], json!("/usr/bin/valkey-server"));
        assert_eq!(fields["db0"], json!("keys=1,expires=0"));
    }

    #[test]
    fn skips_lines_without_separator() {
        let fields = parse_info("garbage\nok:1\n");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["ok"], json!(1));
    }

    #[test]
    fn non_finite_floats_stay_strings() {
        let fields = parse_info("ratio:nan\n");
        assert_eq!(fields["ratio"], json!("nan"));
    }

    #[test]
    fn now_ms_is_after_2020() {
        assert!(now_ms() > 1_577_836_800_000);
    }
}
