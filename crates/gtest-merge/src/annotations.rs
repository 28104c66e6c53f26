//! Buildbot step annotations.

use std::io::{self, Write};

/// Mark the step as warning, with an optional log attached under `title`.
pub fn emit_warning(out: &mut dyn Write, title: &str, log: Option<&str>) -> io::Result<()> {
    writeln!(out, "@@@STEP_WARNINGS@@@")?;
    writeln!(out, "{}", title)?;
    if let Some(log) = log {
        let title = title.trim_end();
        for line in log.lines() {
            writeln!(out, "@@@STEP_LOG_LINE@{}@{}@@@", title, line.trim_end())?;
        }
        writeln!(out, "@@@STEP_LOG_END@{}@@@", title)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_warning_with_log() {
        let mut out = Vec::new();
        emit_warning(&mut out, "title ", Some("one \ntwo")).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "@@@STEP_WARNINGS@@@\ntitle \n@@@STEP_LOG_LINE@title@one@@@\n\
             @@@STEP_LOG_LINE@title@two@@@\n@@@STEP_LOG_END@title@@@\n"
        );
    }

    #[test]
    fn test_emit_warning_without_log() {
        let mut out = Vec::new();
        emit_warning(&mut out, "plain", None).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "@@@STEP_WARNINGS@@@\nplain\n"
        );
    }
}
