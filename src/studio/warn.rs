fn sanitize_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        if ch.is_whitespace() {
            if !out.is_empty() && !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else if !ch.is_control() {
            out.push(ch);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "na".to_string()
    } else {
        trimmed.to_string()
    }
}

/// A best-effort failure that must not reach the caller's result.
pub struct WarnEvent<'a> {
    pub code: &'a str,
    pub stage: &'a str,
    pub subject: &'a str,
    pub reason: &'a str,
    pub err: &'a str,
}

fn render(event: &WarnEvent<'_>) -> String {
    format!(
        "STUDIO_WARN code={} stage={} subject={} reason={} err={}",
        sanitize_value(event.code),
        sanitize_value(event.stage),
        sanitize_value(event.subject),
        sanitize_value(event.reason),
        sanitize_value(event.err),
    )
}

pub fn emit(event: WarnEvent<'_>) {
    tracing::debug!(code = event.code, stage = event.stage, reason = event.reason, "best-effort step failed");
    eprintln!("{}", render(&event));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_value_rewrites_whitespace() {
        assert_eq!(sanitize_value("a b\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_value_falls_back_for_empty() {
        assert_eq!(sanitize_value("   "), "na");
    }

    #[test]
    fn render_is_single_line() {
        let line = render(&WarnEvent {
            code: "SYNC_LOG_WRITE_FAILED",
            stage: "append",
            subject: "/tmp/sync.log",
            reason: "open failed",
            err: "permission denied\n(os error 13)",
        });
        assert!(!line.contains('\n'));
        assert!(line.starts_with("STUDIO_WARN code=SYNC_LOG_WRITE_FAILED"));
        assert!(line.contains("err=permission_denied_(os_error_13)"));
    }
}
