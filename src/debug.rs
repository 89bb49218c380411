//! Line-oriented JSON debug stream: one `DebugEvent` per line, CRLF
//! terminated, serialized with `serde_json` so each variant produces
//! exactly the documented shape via `#[serde(tag = "t")]`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "t")]
pub enum DebugEvent {
    #[serde(rename = "opcode")]
    Opcode { op: u8, pc: u16, sp: u16, tos: u32 },
    #[serde(rename = "fb")]
    FunctionBlock { name: String, pc: u16 },
    #[serde(rename = "task")]
    Task { id: u16, start: u32, end: u32, us: u32, ovr: u32 },
    #[serde(rename = "cycle")]
    Cycle { n: u64, us: u32, tasks: u16 },
    #[serde(rename = "error")]
    Error { code: i32, msg: String, pc: u16 },
    #[serde(rename = "ack")]
    Ack { cmd: String, val: Option<String>, ok: bool, err: Option<String> },
    #[serde(rename = "watch")]
    Watch { addr: u16, #[serde(rename = "type")] ty: String, val: u32 },
    #[serde(rename = "ready")]
    Ready { fw: String, caps: Vec<String> },
}

impl DebugEvent {
    /// Renders the event as one CRLF-terminated JSON line. The ≤256-byte
    /// budget is a caller contract (keep payloads like `msg`/`name` short);
    /// this function does not truncate.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push_str("\r\n");
        Ok(line)
    }
}

/// Debug verbosity requested by the host via `DBG:MODE:...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugMode {
    #[default]
    Off,
    Summary,
    Verbose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchType {
    U8,
    U16,
    U32,
    F32,
}

/// One parsed host→device command. The wire grammar is five fixed
/// colon-delimited prefixes, not worth a parser-combinator dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    Mode(DebugMode),
    WatchAdd { addr: u16, ty: WatchType },
    WatchDel { addr: u16, ty: WatchType },
    WatchClear,
    BreakSet { pc: u16 },
    BreakDel { pc: u16 },
    BreakClear,
    Step,
    Resume,
    Halt,
    Reset,
    QueryStatus,
    QueryRegs,
    QueryMem { start: u16, len: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

fn parse_watch_type(s: &str) -> Result<WatchType, ParseError> {
    match s {
        "u8" | "U8" => Ok(WatchType::U8),
        "u16" | "U16" => Ok(WatchType::U16),
        "u32" | "U32" => Ok(WatchType::U32),
        "f32" | "F32" => Ok(WatchType::F32),
        _ => Err(ParseError),
    }
}

fn parse_u16(s: &str) -> Result<u16, ParseError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).map_err(|_| ParseError)
    } else {
        s.parse().map_err(|_| ParseError)
    }
}

/// Parses one host→device text line, e.g. `DBG:WATCH:ADD:1000:u32`.
pub fn parse_command(line: &str) -> Result<HostCommand, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let parts: Vec<&str> = line.split(':').collect();
    match parts.as_slice() {
        ["DBG", "MODE", "OFF"] => Ok(HostCommand::Mode(DebugMode::Off)),
        ["DBG", "MODE", "SUMMARY"] => Ok(HostCommand::Mode(DebugMode::Summary)),
        ["DBG", "MODE", "VERBOSE"] => Ok(HostCommand::Mode(DebugMode::Verbose)),
        ["DBG", "WATCH", "ADD", addr, ty] => {
            Ok(HostCommand::WatchAdd { addr: parse_u16(addr)?, ty: parse_watch_type(ty)? })
        }
        ["DBG", "WATCH", "DEL", addr, ty] => {
            Ok(HostCommand::WatchDel { addr: parse_u16(addr)?, ty: parse_watch_type(ty)? })
        }
        ["DBG", "WATCH", "CLR"] => Ok(HostCommand::WatchClear),
        ["DBG", "BREAK", "SET", pc] => Ok(HostCommand::BreakSet { pc: parse_u16(pc)? }),
        ["DBG", "BREAK", "DEL", pc] => Ok(HostCommand::BreakDel { pc: parse_u16(pc)? }),
        ["DBG", "BREAK", "CLR"] => Ok(HostCommand::BreakClear),
        ["DBG", "STEP"] => Ok(HostCommand::Step),
        ["DBG", "RESUME"] => Ok(HostCommand::Resume),
        ["DBG", "HALT"] => Ok(HostCommand::Halt),
        ["DBG", "RESET"] => Ok(HostCommand::Reset),
        ["DBG", "QUERY", "STATUS"] => Ok(HostCommand::QueryStatus),
        ["DBG", "QUERY", "REGS"] => Ok(HostCommand::QueryRegs),
        ["DBG", "QUERY", "MEM", start, len] => {
            Ok(HostCommand::QueryMem { start: parse_u16(start)?, len: parse_u16(len)? })
        }
        _ => Err(ParseError),
    }
}
