//! Malicious-intent pattern scan.
//!
//! Flags configuration values that look like injection payloads, backdoors
//! or deliberately weakened security posture. Findings are data, not
//! errors: they ride on the delta into certification, where a critical
//! severity forces a block.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use drift_engine::{Delta, IntentFinding, IntentGuard, Severity};

struct IntentPattern {
    category: &'static str,
    severity: Severity,
    regexes: Vec<Regex>,
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("valid intent pattern"))
        .collect()
}

lazy_static! {
    static ref INTENT_PATTERNS: Vec<IntentPattern> = vec![
        IntentPattern {
            category: "sql_injection",
            severity: Severity::Critical,
            regexes: compile(&[
                r"';\s*DROP\s+TABLE",
                r"' OR '1'='1",
                r"UNION\s+SELECT",
                r"';?\s*DELETE\s+FROM",
                r"';?\s*UPDATE\s+.*SET",
            ]),
        },
        IntentPattern {
            category: "command_injection",
            severity: Severity::Critical,
            regexes: compile(&[
                r";\s*rm\s+-rf",
                r"&&\s*cat\s+/etc/passwd",
                r"\$\(.*\)",
                r"`.*`",
                r";\s*curl\s+http",
                r";\s*wget\s+http",
            ]),
        },
        IntentPattern {
            category: "backdoor_ports",
            severity: Severity::High,
            regexes: compile(&[
                r"port:\s*(4444|31337|1337|6666|6667)\b",
                r"PORT\s*=\s*(4444|31337|1337|6666|6667)\b",
            ]),
        },
        IntentPattern {
            category: "debug_mode_prod",
            severity: Severity::High,
            regexes: compile(&[
                r"debug:\s*true",
                r"DEBUG_MODE\s*=\s*true",
                r"debug\s*=\s*true",
            ]),
        },
        IntentPattern {
            category: "wildcard_cors",
            severity: Severity::Medium,
            regexes: compile(&[
                r#"cors\.allowed-origins\s*[:=]\s*["']?\*["']?"#,
                r#"CORS_ALLOWED_ORIGINS\s*=\s*["']?\*["']?"#,
            ]),
        },
        IntentPattern {
            category: "disabled_security",
            severity: Severity::Critical,
            regexes: compile(&[
                r#"ssl\.enabled\s*[:=]\s*["']?false["']?"#,
                r#"SSL_ENABLED\s*=\s*["']?false["']?"#,
                r#"authentication\.enabled\s*[:=]\s*["']?false["']?"#,
            ]),
        },
    ];
}

/// Scans text for suspicious patterns.
pub fn scan_text(text: &str) -> Vec<IntentFinding> {
    let mut findings = Vec::new();
    for pattern in INTENT_PATTERNS.iter() {
        for regex in &pattern.regexes {
            for m in regex.find_iter(text) {
                findings.push(IntentFinding {
                    category: pattern.category.to_string(),
                    value: m.as_str().to_string(),
                    start: m.start(),
                    end: m.end(),
                    severity: pattern.severity,
                });
            }
        }
    }
    findings
}

/// Scans a delta's string values and attaches the intent annotation.
pub fn scan_delta(delta: &mut Delta) {
    let mut findings = Vec::new();
    for field in [&delta.old, &delta.new] {
        if let Value::String(s) = field {
            findings.extend(scan_text(s));
        }
    }

    let severity = findings
        .iter()
        .map(|f| f.severity)
        .max()
        .unwrap_or(Severity::None);

    delta.intent_guard = Some(IntentGuard {
        suspicious: !findings.is_empty(),
        patterns_detected: findings,
        severity,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_engine::{DeltaCategory, Locator};
    use serde_json::json;

    #[test]
    fn drop_table_is_critical() {
        let findings = scan_text("name = 'x'; DROP TABLE users --");
        assert!(!findings.is_empty());
        assert_eq!(findings[0].category, "sql_injection");
        assert_eq!(findings[0].severity, Severity::Critical);
    }

    #[test]
    fn backdoor_port_is_high() {
        let findings = scan_text("port: 31337");
        assert_eq!(findings[0].category, "backdoor_ports");
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn severity_is_the_maximum_across_findings() {
        let mut delta = Delta::new(
            "cfg~a.yml.startup",
            DeltaCategory::Config,
            "a.yml",
            Locator::for_key("a.yml", "startup"),
            Value::Null,
            json!("debug: true; rm -rf /tmp/x"),
        );
        scan_delta(&mut delta);
        let guard = delta.intent_guard.unwrap();
        assert!(guard.suspicious);
        assert_eq!(guard.severity, Severity::Critical);
        assert!(guard.patterns_detected.len() >= 2);
    }

    #[test]
    fn clean_values_scan_clean() {
        let mut delta = Delta::new(
            "cfg~a.yml.timeout",
            DeltaCategory::Config,
            "a.yml",
            Locator::for_key("a.yml", "timeout"),
            json!(30),
            json!(45),
        );
        scan_delta(&mut delta);
        let guard = delta.intent_guard.unwrap();
        assert!(!guard.suspicious);
        assert_eq!(guard.severity, Severity::None);
        assert!(guard.patterns_detected.is_empty());
    }
}
