//! Shared FFmpeg filtergraph fragments.

/// Format seconds for FFmpeg arguments with microsecond precision.
///
/// Measured durations are passed through unrounded beyond what FFmpeg's
/// internal time base resolves, so generated silence never drifts.
pub fn format_secs(seconds: f64) -> String {
    format!("{:.6}", seconds.max(0.0))
}

/// Escape a path for use inside a single-quoted filter option value.
///
/// Backslashes and colons are escaped for the option parser. A quote cannot
/// appear inside quotes, so it closes the quote, is emitted escaped for both
/// parsing levels and reopens it.
pub fn escape_filter_path(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', r"'\\\''")
}

/// Stack two labelled video streams, first on top.
pub fn vstack(top: &str, bottom: &str, output: &str) -> String {
    format!("[{}][{}]vstack=inputs=2[{}]", top, bottom, output)
}

/// Concatenate labelled video-only segments.
pub fn concat_video(labels: &[&str], output: &str) -> String {
    let inputs: String = labels.iter().map(|l| format!("[{}]", l)).collect();
    format!("{}concat=n={}:v=1:a=0[{}]", inputs, labels.len(), output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_secs() {
        assert_eq!(format_secs(5.0), "5.000000");
        assert_eq!(format_secs(4.9666667), "4.966667");
        assert_eq!(format_secs(-1.0), "0.000000");
    }

    #[test]
    fn test_escape_filter_path() {
        assert_eq!(escape_filter_path("C:\\fonts\\a.ttf"), "C\\:\\\\fonts\\\\a.ttf");
        assert_eq!(escape_filter_path("/tmp/it's.txt"), r"/tmp/it'\\\''s.txt");
    }

    #[test]
    fn test_graph_fragments() {
        assert_eq!(vstack("p", "s", "v"), "[p][s]vstack=inputs=2[v]");
        assert_eq!(concat_video(&["v0", "v1"], "v"), "[v0][v1]concat=n=2:v=1:a=0[v]");
    }
}
