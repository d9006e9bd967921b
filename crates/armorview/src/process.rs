use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Column titles for process rows, in display order.
pub const COLUMN_NAMES: [&str; 4] = ["Process Name", "User", "Pid", "Status"];

// The status is the only field allowed to contain whitespace: either the bare
// word `unconfined` or a profile name followed by its mode in parentheses.
static PROCESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\S+)\s+(\S+)\s+(\S+)\s+(unconfined|\S+ \(\S+\))\s+(\S+)")
        .expect("process line pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line does not look like a process listing entry: {0:?}")]
    MalformedLine(String),
    #[error("invalid {field} value {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    /// `0` when the process has no parent.
    pub parent_pid: u32,
    pub user: String,
    pub status: String,
    pub command: String,
}

impl ProcessRecord {
    pub fn is_root(&self) -> bool {
        self.parent_pid == 0
    }

    pub fn is_confined(&self) -> bool {
        self.status != "unconfined"
    }

    /// Confinement mode of a confined process, e.g. `enforce` for
    /// `docker-default (enforce)`.
    pub fn mode(&self) -> Option<&str> {
        mode_of(&self.status)
    }

    /// Observable columns in display order: command, user, pid, status.
    pub fn columns(&self) -> [String; 4] {
        [
            self.command.clone(),
            self.user.clone(),
            self.pid.to_string(),
            self.status.clone(),
        ]
    }
}

/// Extracts the parenthesized mode suffix of a status or profile line.
pub fn mode_of(status: &str) -> Option<&str> {
    let open = status.rfind('(')?;
    let rest = &status[open + 1..];
    let close = rest.find(')')?;
    Some(&rest[..close])
}

pub fn parse_line(line: &str) -> Result<ProcessRecord, ParseError> {
    let captures = PROCESS_LINE
        .captures(line)
        .ok_or_else(|| ParseError::MalformedLine(line.to_string()))?;

    let field = |idx: usize| captures.get(idx).map_or("", |m| m.as_str());

    Ok(ProcessRecord {
        pid: parse_number("pid", field(1))?,
        parent_pid: parse_number("parent pid", field(2))?,
        user: field(3).to_string(),
        status: field(4).to_string(),
        command: field(5).to_string(),
    })
}

fn parse_number(field: &'static str, value: &str) -> Result<u32, ParseError> {
    value.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unconfined_line() {
        let record = parse_line("123   1   root   unconfined   bash").unwrap();
        assert_eq!(
            record,
            ProcessRecord {
                pid: 123,
                parent_pid: 1,
                user: "root".to_string(),
                status: "unconfined".to_string(),
                command: "bash".to_string(),
            }
        );
        assert!(!record.is_confined());
        assert_eq!(record.mode(), None);
    }

    #[test]
    fn test_parse_profile_status_as_single_field() {
        let record = parse_line("50  10  alice  docker-default (enforce)  dockerd").unwrap();
        assert_eq!(record.status, "docker-default (enforce)");
        assert_eq!(record.command, "dockerd");
        assert_eq!(record.user, "alice");
        assert_eq!(record.mode(), Some("enforce"));
    }

    #[test]
    fn test_parse_leading_whitespace_like_ps_output() {
        let record = parse_line("    1     0 root     unconfined               systemd").unwrap();
        assert_eq!(record.pid, 1);
        assert!(record.is_root());
        assert_eq!(record.command, "systemd");
    }

    #[test]
    fn test_header_line_is_malformed() {
        let header = "  PID  PPID USER     LABEL                    COMMAND";
        assert!(matches!(
            parse_line(header),
            Err(ParseError::MalformedLine(_))
        ));
        assert!(matches!(parse_line(""), Err(ParseError::MalformedLine(_))));
    }

    #[test]
    fn test_non_numeric_pid_is_rejected() {
        let err = parse_line("abc 1 root unconfined bash").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidNumber {
                field: "pid",
                value: "abc".to_string()
            }
        );
        let err = parse_line("12 x1 root unconfined bash").unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidNumber {
                field: "parent pid",
                ..
            }
        ));
    }

    #[test]
    fn test_columns_order() {
        let record = parse_line("7 1 bob firefox (complain) firefox").unwrap();
        assert_eq!(
            record.columns(),
            [
                "firefox".to_string(),
                "bob".to_string(),
                "7".to_string(),
                "firefox (complain)".to_string()
            ]
        );
    }
}
