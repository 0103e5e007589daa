//! Log text analyzer.
//!
//! Pure functions over raw container log text: level extraction, known
//! failure-pattern identification, stack-trace parsing, exit-code
//! interpretation, summaries, and repeated-error detection. No I/O.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref ERROR_LINE: Regex =
        Regex::new(r"(?i)(error|err|fatal|critical|crit|exception)").unwrap();
    static ref WARNING_LINE: Regex = Regex::new(r"(?i)(warning|warn)").unwrap();
    static ref INFO_LINE: Regex = Regex::new(r"(?i)(info|information)").unwrap();
    static ref DEBUG_LINE: Regex = Regex::new(r"(?i)(debug|trace)").unwrap();

    /// Known failure signatures, most specific name first.
    static ref ERROR_PATTERNS: Vec<(&'static str, Regex)> = vec![
        ("Connection Refused", Regex::new(r"(?i)connection refused").unwrap()),
        ("Connection Timeout", Regex::new(r"(?i)(connection.*timeout|timeout.*connection)").unwrap()),
        ("No Such Host", Regex::new(r"(?i)(no such host|name resolution failed|could not resolve)").unwrap()),
        ("Permission Denied", Regex::new(r"(?i)permission denied").unwrap()),
        ("Out Of Memory", Regex::new(r"(?i)(out of memory|oom|cannot allocate memory)").unwrap()),
        ("File Not Found", Regex::new(r"(?i)(no such file|file not found|cannot find)").unwrap()),
        ("Port In Use", Regex::new(r"(?i)(address already in use|port.*already in use)").unwrap()),
        ("Authentication Failed", Regex::new(r"(?i)(auth.*failed|authentication.*failed|invalid credentials)").unwrap()),
        ("Database Error", Regex::new(r"(?i)(database.*error|sql.*error|connection pool)").unwrap()),
        ("Network Unreachable", Regex::new(r"(?i)network.*unreachable").unwrap()),
        ("Disk Full", Regex::new(r"(?i)(no space left|disk.*full)").unwrap()),
        ("Certificate Error", Regex::new(r"(?i)(certificate.*error|tls.*error|ssl.*error)").unwrap()),
    ];

    // Prefixes stripped when normalizing error messages for repeat counting.
    static ref TIMESTAMP_PREFIX: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}[T\s]\d{2}:\d{2}:\d{2}[.,\d]*\s*").unwrap();
    static ref BRACKET_PREFIX: Regex = Regex::new(r"^\[.*?\]\s*").unwrap();
    static ref LEVEL_PREFIX: Regex = Regex::new(r"^[A-Z]+\s*:\s*").unwrap();
}

#[derive(Debug, Clone)]
pub enum LogAction {
    ExtractErrors { limit: usize },
    ExtractWarnings { limit: usize },
    IdentifyPatterns,
    ParseStackTraces,
    AnalyzeExitCode { exit_code: i32 },
    Summarize { tail_lines: usize },
    FindRepeated { min_occurrences: usize },
}

pub fn analyze(logs: &str, action: LogAction) -> String {
    match action {
        LogAction::ExtractErrors { limit } => extract_errors(logs, limit),
        LogAction::ExtractWarnings { limit } => extract_warnings(logs, limit),
        LogAction::IdentifyPatterns => identify_patterns(logs),
        LogAction::ParseStackTraces => parse_stack_traces(logs),
        LogAction::AnalyzeExitCode { exit_code } => analyze_exit_code(exit_code),
        LogAction::Summarize { tail_lines } => summarize(logs, tail_lines),
        LogAction::FindRepeated { min_occurrences } => find_repeated(logs, min_occurrences),
    }
}

pub fn extract_errors(logs: &str, limit: usize) -> String {
    extract_level(logs, limit, &ERROR_LINE, "error")
}

pub fn extract_warnings(logs: &str, limit: usize) -> String {
    extract_level(logs, limit, &WARNING_LINE, "warning")
}

fn extract_level(logs: &str, limit: usize, pattern: &Regex, level: &str) -> String {
    if logs.is_empty() {
        return "No logs provided".to_string();
    }

    let matches: Vec<String> = logs
        .lines()
        .enumerate()
        .filter(|(_, line)| pattern.is_match(line))
        .map(|(i, line)| format!("Line {}: {}", i + 1, line.trim()))
        .collect();

    if matches.is_empty() {
        return format!("No {level} lines found in logs");
    }

    if matches.len() > limit {
        format!(
            "Found {} {level} lines (showing first {limit}):\n\n{}",
            matches.len(),
            matches[..limit].join("\n")
        )
    } else {
        format!(
            "Found {} {level} line(s):\n\n{}",
            matches.len(),
            matches.join("\n")
        )
    }
}

pub fn identify_patterns(logs: &str) -> String {
    if logs.is_empty() {
        return "No logs provided".to_string();
    }

    let mut matches: Vec<(&str, usize)> = ERROR_PATTERNS
        .iter()
        .filter_map(|(name, pattern)| {
            let count = pattern.find_iter(logs).count();
            (count > 0).then_some((*name, count))
        })
        .collect();

    if matches.is_empty() {
        return "No known error patterns identified in logs".to_string();
    }

    matches.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut result = String::from("**Identified Error Patterns:**\n\n");
    for (name, count) in matches {
        result.push_str(&format!("- **{name}**: {count} occurrence(s)\n"));
    }
    result
}

pub fn parse_stack_traces(logs: &str) -> String {
    if logs.is_empty() {
        return "No logs provided".to_string();
    }

    let lines: Vec<&str> = logs.lines().collect();
    let mut traces: Vec<String> = Vec::new();

    collect_python_traces(&lines, &mut traces);
    collect_jvm_traces(&lines, &mut traces);
    collect_go_panics(&lines, &mut traces);

    if traces.is_empty() {
        return "No stack traces found in logs".to_string();
    }

    let mut result = format!("**Found {} Stack Trace(s):**\n\n", traces.len());
    for (idx, trace) in traces.iter().enumerate() {
        result.push_str(&format!("### Stack Trace {}\n```\n{trace}\n```\n\n", idx + 1));
    }
    result
}

fn collect_python_traces(lines: &[&str], traces: &mut Vec<String>) {
    let mut i = 0;
    while i < lines.len() {
        if lines[i].contains("Traceback") || lines[i].contains("traceback") {
            let mut trace = vec![lines[i]];
            i += 1;
            while i < lines.len()
                && (lines[i].starts_with("  ")
                    || lines[i].starts_with('\t')
                    || lines[i].contains("File")
                    || lines[i].contains("Error"))
            {
                trace.push(lines[i]);
                i += 1;
            }
            traces.push(trace.join("\n"));
        }
        i += 1;
    }
}

fn collect_jvm_traces(lines: &[&str], traces: &mut Vec<String>) {
    lazy_static! {
        static ref THROWABLE: Regex = Regex::new(r"^\s*(Exception|Error)").unwrap();
        static ref AT_FRAME: Regex = Regex::new(r"^\s*at ").unwrap();
        static ref ELIDED: Regex = Regex::new(r"^\s*\.\.\.").unwrap();
    }

    let mut i = 0;
    while i < lines.len() {
        if THROWABLE.is_match(lines[i]) || lines[i].contains("Caused by:") {
            let mut trace = vec![lines[i]];
            i += 1;
            while i < lines.len()
                && (AT_FRAME.is_match(lines[i])
                    || ELIDED.is_match(lines[i])
                    || lines[i].contains("Caused by:"))
            {
                trace.push(lines[i]);
                i += 1;
            }
            // A lone "Exception" line without frames is noise, not a trace.
            if trace.len() > 1 {
                traces.push(trace.join("\n"));
            }
        }
        i += 1;
    }
}

fn collect_go_panics(lines: &[&str], traces: &mut Vec<String>) {
    let mut i = 0;
    while i < lines.len() {
        if lines[i].contains("panic:") {
            let mut trace = vec![lines[i]];
            i += 1;
            while i < lines.len()
                && (lines[i].starts_with("goroutine")
                    || (lines[i].starts_with(char::is_whitespace) && !lines[i].trim().is_empty()))
            {
                trace.push(lines[i]);
                i += 1;
            }
            traces.push(trace.join("\n"));
        }
        i += 1;
    }
}

pub fn analyze_exit_code(exit_code: i32) -> String {
    let explanation = match exit_code {
        0 => "Success - Normal exit",
        1 => "General error - Application-specific error",
        2 => "Misuse of shell command",
        126 => "Command cannot execute - Permission problem",
        127 => "Command not found",
        128 => "Invalid exit argument",
        130 => "Terminated by Ctrl+C (SIGINT)",
        137 => "Killed (SIGKILL) - Often OOMKilled in Kubernetes",
        143 => "Terminated (SIGTERM) - Graceful shutdown signal",
        _ => "Unknown exit code",
    };

    let mut result = format!("**Exit Code {exit_code}:** {explanation}\n\n");
    match exit_code {
        137 => {
            result.push_str("**Analysis:** Container was killed, likely by the OOM killer.\n");
            result.push_str("**Investigation:** Check memory limits and actual memory usage.\n");
            result.push_str("**Solution:** Increase memory limits or optimize application memory usage.\n");
        }
        143 => {
            result.push_str("**Analysis:** Container received SIGTERM, typically during graceful shutdown.\n");
            result.push_str("**Investigation:** Check if the application handles SIGTERM properly.\n");
            result.push_str("**Note:** This can be normal during rolling updates or pod termination.\n");
        }
        1 => {
            result.push_str("**Analysis:** Application exited with error status.\n");
            result.push_str("**Investigation:** Check application logs for error messages.\n");
            result.push_str("**Action:** Review the error logs to identify the specific failure.\n");
        }
        127 => {
            result.push_str("**Analysis:** Command not found in container.\n");
            result.push_str("**Investigation:** Check the container ENTRYPOINT/CMD in the Dockerfile.\n");
            result.push_str("**Solution:** Ensure the binary exists in the container image.\n");
        }
        _ => {}
    }
    result
}

pub fn summarize(logs: &str, tail_lines: usize) -> String {
    if logs.is_empty() {
        return "No logs provided".to_string();
    }

    let lines: Vec<&str> = logs.lines().collect();
    let total = lines.len();

    let levels: [(&str, &Regex); 4] = [
        ("ERROR", &ERROR_LINE),
        ("WARNING", &WARNING_LINE),
        ("INFO", &INFO_LINE),
        ("DEBUG", &DEBUG_LINE),
    ];
    // A line counts toward its first matching level only.
    let mut counts = [0usize; 4];
    for line in &lines {
        if let Some(idx) = levels.iter().position(|(_, p)| p.is_match(line)) {
            counts[idx] += 1;
        }
    }
    let mut level_counts: Vec<(&str, usize)> = levels
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|((name, _), count)| (*name, count))
        .collect();
    level_counts.sort_by(|a, b| b.1.cmp(&a.1));

    let mut pattern_counts: Vec<(&str, usize)> = ERROR_PATTERNS
        .iter()
        .filter_map(|(name, pattern)| {
            let count = pattern.find_iter(logs).count();
            (count > 0).then_some((*name, count))
        })
        .collect();
    pattern_counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let mut result = String::from("# Log Summary\n\n");
    result.push_str(&format!("**Total Lines:** {total}\n\n"));

    if !level_counts.is_empty() {
        result.push_str("## Log Level Distribution\n");
        for (level, count) in level_counts {
            result.push_str(&format!("- {level}: {count}\n"));
        }
        result.push('\n');
    }

    if !pattern_counts.is_empty() {
        result.push_str("## Error Patterns Detected\n");
        for (name, count) in pattern_counts {
            result.push_str(&format!("- {name}: {count}\n"));
        }
        result.push('\n');
    }

    if total > 0 {
        let shown = tail_lines.min(total);
        result.push_str(&format!("## Last {shown} Lines\n\n```\n"));
        result.push_str(&lines[total - shown..].join("\n"));
        result.push_str("\n```\n");
    }
    result
}

pub fn find_repeated(logs: &str, min_occurrences: usize) -> String {
    if logs.is_empty() {
        return "No logs provided".to_string();
    }

    // Strip timestamps and level prefixes so identical messages collate.
    let mut counts: HashMap<String, usize> = HashMap::new();
    for line in logs.lines() {
        if !ERROR_LINE.is_match(line) {
            continue;
        }
        let cleaned = TIMESTAMP_PREFIX.replace(line, "");
        let cleaned = BRACKET_PREFIX.replace(&cleaned, "");
        let cleaned = LEVEL_PREFIX.replace(&cleaned, "");
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            *counts.entry(cleaned.to_string()).or_insert(0) += 1;
        }
    }

    if counts.is_empty() {
        return "No error messages found in logs".to_string();
    }

    let mut repeated: Vec<(String, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= min_occurrences)
        .collect();

    if repeated.is_empty() {
        return format!("No errors repeated {min_occurrences}+ times");
    }

    repeated.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut result = format!("**Repeated Errors (occurring {min_occurrences}+ times):**\n\n");
    for (message, count) in repeated {
        let (shown, ellipsis) = if message.len() > 200 {
            (&message[..200], "...")
        } else {
            (message.as_str(), "")
        };
        result.push_str(&format!("- **{count} times:** {shown}{ellipsis}\n"));
    }
    result.push_str("\nRepeated errors suggest a persistent issue or error loop.\n");
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
2024-10-11 14:30:01 INFO Starting application
2024-10-11 14:30:02 INFO Connecting to database
2024-10-11 14:30:03 ERROR Connection refused: database:5432
2024-10-11 14:30:04 WARNING Retrying connection (attempt 1/3)
2024-10-11 14:30:05 ERROR Connection refused: database:5432
2024-10-11 14:30:06 WARNING Retrying connection (attempt 2/3)
2024-10-11 14:30:07 ERROR Connection refused: database:5432
2024-10-11 14:30:08 ERROR Failed to connect to database after 3 attempts
2024-10-11 14:30:09 FATAL Application startup failed
Traceback (most recent call last):
  File \"app.py\", line 42, in connect
    conn = database.connect()
ConnectionError: Connection refused";

    #[test]
    fn extracts_error_lines_with_line_numbers() {
        let result = extract_errors(SAMPLE, 50);
        assert!(result.contains("Line 3: 2024-10-11 14:30:03 ERROR Connection refused"));
        assert!(result.contains("FATAL Application startup failed"));
        assert!(!result.contains("WARNING Retrying"));
    }

    #[test]
    fn error_limit_truncates_output() {
        let result = extract_errors(SAMPLE, 2);
        assert!(result.contains("showing first 2"));
    }

    #[test]
    fn identifies_connection_refused_pattern() {
        let result = identify_patterns(SAMPLE);
        assert!(result.contains("**Connection Refused**"));
    }

    #[test]
    fn no_patterns_in_clean_logs() {
        assert_eq!(
            identify_patterns("all quiet"),
            "No known error patterns identified in logs"
        );
    }

    #[test]
    fn parses_python_traceback() {
        let result = parse_stack_traces(SAMPLE);
        assert!(result.contains("Stack Trace 1"));
        assert!(result.contains("Traceback (most recent call last):"));
        assert!(result.contains("ConnectionError: Connection refused"));
    }

    #[test]
    fn parses_go_panic() {
        let logs = "panic: runtime error: index out of range\ngoroutine 1 [running]:\n\tmain.main()\n\t\t/app/main.go:10";
        let result = parse_stack_traces(logs);
        assert!(result.contains("panic: runtime error"));
        assert!(result.contains("goroutine 1 [running]:"));
    }

    #[test]
    fn interprets_common_exit_codes() {
        assert!(analyze_exit_code(137).contains("OOMKilled"));
        assert!(analyze_exit_code(143).contains("SIGTERM"));
        assert!(analyze_exit_code(127).contains("Command not found"));
        assert!(analyze_exit_code(99).contains("Unknown exit code"));
    }

    #[test]
    fn finds_repeated_errors() {
        let result = find_repeated(SAMPLE, 2);
        assert!(result.contains("- **3 times:** ERROR Connection refused: database:5432"));
    }

    #[test]
    fn no_repeats_below_threshold() {
        let result = find_repeated(SAMPLE, 5);
        assert_eq!(result, "No errors repeated 5+ times");
    }

    #[test]
    fn summary_counts_levels_and_tails_logs() {
        let result = summarize(SAMPLE, 3);
        assert!(result.contains("**Total Lines:** 13"));
        assert!(result.contains("## Log Level Distribution"));
        assert!(result.contains("## Error Patterns Detected"));
        assert!(result.contains("## Last 3 Lines"));
        assert!(result.contains("ConnectionError: Connection refused"));
    }

    #[test]
    fn empty_input_is_reported() {
        assert_eq!(extract_errors("", 10), "No logs provided");
        assert_eq!(analyze("", LogAction::IdentifyPatterns), "No logs provided");
    }
}
