use std::collections::HashMap;

/// Parses a Prometheus text-exposition-format body into a flat map of
/// metric name (with its label set, if any, appended verbatim) to value,
/// mirroring `_parse_prometheus_metrics` in the Python original.
pub fn parse_prometheus_metrics(body: &str) -> HashMap<String, f64> {
    let mut metrics = HashMap::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.rsplit_once(' ') else { continue };
        if let Ok(value) = value.parse::<f64>() {
            metrics.insert(key.to_string(), value);
        }
    }

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_counter_and_gauge_lines() {
        let body = "# HELP vllm:num_requests_running number of requests running\n\
                     # TYPE vllm:num_requests_running gauge\n\
                     vllm:num_requests_running{model_name=\"x\"} 3\n\
                     vllm:num_requests_waiting 0\n";
        let metrics = parse_prometheus_metrics(body);
        assert_eq!(metrics["vllm:num_requests_running{model_name=\"x\"}"], 3.0);
        assert_eq!(metrics["vllm:num_requests_waiting"], 0.0);
    }

    #[test]
    fn ignores_non_numeric_lines() {
        let metrics = parse_prometheus_metrics("garbage line without a value\n");
        assert!(metrics.is_empty());
    }
}
