//! Line scanner: turns log lines into rpc records.
//!
//! Expected line shape:
//! [2024-01-01 00:00:00.000000] [scord] [1234] [info] rpc <= pid: 77 id: 10 name: "ADM_ping" from: "ofi+tcp://10.0.0.1:52000" body: {retval: 0} [op_id: 4]
//!
//! The `pid:` field is only present in multi-hop logs; the trailing options
//! block is only present on replies that report a remote correlation id.

use crate::Result;
use crate::body::parse_body;
use crate::error::VerifyError;
use crate::rpc::names::RpcNames;
use crate::rpc::record::{CallRecord, Direction, LocalId, RecordMeta};

use anyhow::{Context, anyhow};
use log::{info, trace, warn};
use regex::{Captures, Regex};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

const RPC_LINE_RE: &str = r#"(?x)
    ^\[(?P<timestamp>\d{4}-\d{2}-\d{2}\s\d{2}:\d{2}:\d{2}\.\d+)\]\s
    \[(?P<progname>\w+(?:-\w+)*?)\]\s
    \[(?P<pid>\d+)\]\s
    \[(?P<log_level>\w+)\]\s
    rpc\s
    (?P<direction><=|=>)\s
    (?:pid:\s(?P<rpc_pid>\d+)\s)?
    id:\s(?P<rpc_id>\d+)\s
    name:\s"(?P<rpc_name>\w+)"\s
    (?:from|to):\s"(?P<address>.*?)"\s
    body:\s(?P<body>.*)$
"#;

/// Lazily yields every record of one rpc name from a line source, paired
/// with its 1-based line number.
pub struct RpcScanner<'a, R> {
    lines: Lines<R>,
    lineno: usize,
    source: String,
    target: String,
    names: &'a RpcNames,
    re: Regex,
}

impl<'a> RpcScanner<'a, BufReader<File>> {
    /// Open a log file for scanning.
    pub fn open(path: &Path, target: &str, names: &'a RpcNames) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open log file {}", path.display()))?;
        Self::new(
            BufReader::new(file),
            path.display().to_string(),
            target,
            names,
        )
    }
}

impl<'a, R: BufRead> RpcScanner<'a, R> {
    /// `source` names the input in diagnostics.
    pub fn new(
        reader: R,
        source: impl Into<String>,
        target: &str,
        names: &'a RpcNames,
    ) -> Result<Self> {
        let re = Regex::new(RPC_LINE_RE)?;
        Ok(Self {
            lines: reader.lines(),
            lineno: 0,
            source: source.into(),
            target: target.to_string(),
            names,
            re,
        })
    }

    fn build(&self, caps: &Captures<'_>, line: &str, lno: usize) -> Result<CallRecord> {
        let field = |name: &str| {
            caps.name(name).map(|m| m.as_str()).ok_or_else(|| {
                anyhow!("rpc parse error at {}:{}: missing {}", self.source, lno, name)
            })
        };

        let meta = RecordMeta {
            line: line.to_string(),
            lineno: lno,
            timestamp: field("timestamp")?.to_string(),
            progname: field("progname")?.to_string(),
            pid: field("pid")?
                .parse()
                .with_context(|| format!("bad pid at {}:{}", self.source, lno))?,
            log_level: field("log_level")?.to_string(),
        };

        let pid = caps
            .name("rpc_pid")
            .map(|m| m.as_str().parse::<u32>())
            .transpose()
            .with_context(|| format!("bad rpc pid at {}:{}", self.source, lno))?;
        let id: u64 = field("rpc_id")?
            .parse()
            .with_context(|| format!("bad rpc id at {}:{}", self.source, lno))?;

        let direction_marker = field("direction")?;
        let direction = Direction::from_marker(direction_marker).ok_or_else(|| {
            anyhow!(
                "bad rpc direction at {}:{}: {}",
                self.source,
                lno,
                direction_marker
            )
        })?;

        let body = parse_body(field("body")?).map_err(|reason| VerifyError::MalformedBody {
            lineno: lno,
            line: line.to_string(),
            reason,
        })?;

        let record = CallRecord::new(
            meta,
            LocalId { pid, id },
            field("rpc_name")?.to_string(),
            direction,
            field("address")?.to_string(),
            body,
        )?;
        Ok(record)
    }
}

impl<R: BufRead> Iterator for RpcScanner<'_, R> {
    type Item = Result<(CallRecord, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.lines.next()? {
                Ok(raw) => raw,
                Err(e) => {
                    return Some(Err(anyhow::Error::new(e).context(format!(
                        "read {} after line {}",
                        self.source, self.lineno
                    ))));
                }
            };
            self.lineno += 1;
            let lno = self.lineno;
            let line = raw.trim_end_matches('\r');

            trace!("processing line {}: {:?}", lno, line);

            let Some(caps) = self.re.captures(line) else {
                warn!("failed to parse line {} in {}", lno, self.source);
                continue;
            };

            // A well-formed record whose name is unknown: either a new rpc
            // missing from the allow-list or a typo in the logging code.
            let name = caps.name("rpc_name").map_or("", |m| m.as_str());
            if !self.names.contains(name) {
                warn!(
                    "found rpc with unknown name '{}' at line {} in {}, line ignored",
                    name, lno, self.source
                );
                continue;
            }

            if name != self.target {
                trace!("searching rpc name '{}' in line {} -- not found", self.target, lno);
                continue;
            }

            info!("searching rpc name '{}' in line {} -- found", self.target, lno);
            return Some(self.build(&caps, line, lno).map(|record| (record, lno)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    const LOG: &str = r#"[2024-01-01 00:00:00.000000] [clientd] [123] [INFO] rpc => id: 10 name: "ADM_ping" to: "ofi+tcp://127.0.0.1:9999" body: {}
garbage that is not a record
[2024-01-01 00:00:00.000500] [clientd] [123] [INFO] rpc => id: 11 name: "ADM_register_job" to: "ofi+tcp://127.0.0.1:9999" body: {job: 1}
[2024-01-01 00:00:00.000600] [clientd] [123] [INFO] rpc => id: 12 name: "ADM_made_up" to: "ofi+tcp://127.0.0.1:9999" body: {}
[2024-01-01 00:00:00.001000] [clientd] [123] [INFO] rpc <= id: 10 name: "ADM_ping" from: "ofi+tcp://127.0.0.1:9999" body: {retval: 0} [op_id: 42]
"#;

    fn scan(text: &str, target: &str) -> Vec<Result<(CallRecord, usize)>> {
        let names = RpcNames::builtin();
        RpcScanner::new(Cursor::new(text.to_string()), "test.log", target, &names)
            .unwrap()
            .collect()
    }

    #[test]
    fn yields_only_target_records() {
        let found: Vec<(CallRecord, usize)> = scan(LOG, "ADM_ping")
            .into_iter()
            .collect::<Result<_>>()
            .unwrap();
        let linenos: Vec<usize> = found.iter().map(|(_, l)| *l).collect();
        assert_eq!(linenos, vec![1, 5]);

        let (req, _) = &found[0];
        assert_eq!(req.direction, Direction::Outbound);
        assert_eq!(req.local_id, LocalId { pid: None, id: 10 });
        assert_eq!(req.address, "ofi+tcp://127.0.0.1:9999");
        assert_eq!(req.op_id, 10);
        assert_eq!(req.meta.progname, "clientd");
        assert_eq!(req.meta.pid, 123);
        assert_eq!(req.meta.lineno, 1);

        let (rep, _) = &found[1];
        assert_eq!(rep.direction, Direction::Inbound);
        assert_eq!(rep.op_id, 42);
        assert_eq!(rep.body.len(), 1);
    }

    #[test]
    fn unknown_names_are_skipped_even_when_targeted() {
        assert!(scan(LOG, "ADM_made_up").is_empty());
    }

    #[test]
    fn multi_hop_records_carry_peer_pid() {
        let line = r#"[2024-01-01 00:00:00.000000] [scord-ctl] [55] [info] rpc <= pid: 77 id: 3 name: "ADM_ping" from: "tcp://h:1" body: {}"#;
        let found = scan(line, "ADM_ping");
        let (rec, _) = found.into_iter().next().unwrap().unwrap();
        assert_eq!(rec.local_id, LocalId { pid: Some(77), id: 3 });
        assert_eq!(rec.meta.progname, "scord-ctl");
    }

    #[test]
    fn crlf_line_endings_are_tolerated() {
        let text = LOG.replace('\n', "\r\n");
        let found = scan(&text, "ADM_ping");
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn malformed_body_is_fatal_with_provenance() {
        let line = r#"[2024-01-01 00:00:00.000000] [clientd] [1] [INFO] rpc => id: 1 name: "ADM_ping" to: "tcp://h:1" body: {oops"#;
        let err = scan(line, "ADM_ping").into_iter().next().unwrap().unwrap_err();
        match err.downcast_ref::<VerifyError>() {
            Some(VerifyError::MalformedBody { lineno, line: raw, .. }) => {
                assert_eq!(*lineno, 1);
                assert!(raw.ends_with("{oops"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
