use std::time::Duration;

use owo_colors::OwoColorize;

/// Picks ASCII (`OK`/`FAIL`) or Unicode (`✓`/`✗`) symbols. `--ascii` wins
/// over `WSU_UNICODE`, which wins over `WSU_ASCII`, which wins over the
/// platform default (Unicode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolSet {
    pub success: &'static str,
    pub failure: &'static str,
}

impl SymbolSet {
    pub const ASCII: SymbolSet = SymbolSet {
        success: "OK",
        failure: "FAIL",
    };
    pub const UNICODE: SymbolSet = SymbolSet {
        success: "\u{2713}",
        failure: "\u{2717}",
    };

    pub fn resolve(force_ascii: bool) -> Self {
        if force_ascii {
            return Self::ASCII;
        }
        if std::env::var_os("WSU_UNICODE").is_some() {
            return Self::UNICODE;
        }
        if std::env::var_os("WSU_ASCII").is_some() {
            return Self::ASCII;
        }
        Self::UNICODE
    }
}

/// Renders the final successes/failures/duration line every orchestrator
/// prints on exit.
pub fn render_summary(symbols: SymbolSet, succeeded: usize, failed: usize, duration: Duration) -> String {
    let tag = if failed == 0 {
        symbols.success.green().to_string()
    } else {
        symbols.failure.red().to_string()
    };
    format!(
        "{tag} {succeeded} succeeded, {failed} failed ({}ms)",
        duration.as_millis()
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn ascii_flag_forces_ascii_regardless_of_env() {
        assert_eq!(SymbolSet::resolve(true), SymbolSet::ASCII);
    }

    #[test]
    fn summary_reports_both_counts() {
        let line = render_summary(SymbolSet::ASCII, 3, 1, Duration::from_millis(250));
        assert!(line.contains("3 succeeded"));
        assert!(line.contains("1 failed"));
        assert!(line.contains("250ms"));
    }
}
