use chrono::{Local, NaiveDateTime, TimeZone};
use log::{debug, trace};

use crate::error_handling::types::ParseError;
use crate::session_management::session::{Session, SessionTable};

pub const CLIENT_LIST_HEADER: &str = "OpenVPN CLIENT LIST";
pub const ROUTING_TABLE_HEADER: &str = "ROUTING TABLE";
pub const GLOBAL_STATS_HEADER: &str = "GLOBAL STATS";
pub const END_HEADER: &str = "END";

const CLIENT_LIST_COLUMNS: [&str; 5] = [
    "Common Name",
    "Real Address",
    "Bytes Received",
    "Bytes Sent",
    "Connected Since",
];
const ROUTING_TABLE_COLUMNS: [&str; 4] = [
    "Virtual Address",
    "Common Name",
    "Real Address",
    "Last Ref",
];

/// A status file with nothing but headers and placeholders has 8 lines.
pub const MIN_STATUS_LINES: usize = 9;

const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    ClientList,
    RoutingTable,
    GlobalStats,
    End,
}

impl Section {
    fn from_header(line: &str) -> Option<Self> {
        match line {
            CLIENT_LIST_HEADER => Some(Section::ClientList),
            ROUTING_TABLE_HEADER => Some(Section::RoutingTable),
            GLOBAL_STATS_HEADER => Some(Section::GlobalStats),
            END_HEADER => Some(Section::End),
            _ => None,
        }
    }
}

/// Routing table data for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    pub virtual_address: String,
    pub identity: String,
    pub real_address: String,
    pub last_ref: i64,
}

/// Converts a status file timestamp such as `Thu Feb 11 06:45:56 2021` to
/// epoch seconds, reading it in the host's local time zone.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    // ctime pads single digit days with a space
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let naive = NaiveDateTime::parse_from_str(&normalized, TIMESTAMP_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
}

/// Parses one CLIENT LIST line.
///
/// Returns `None` for the column header, for lines without exactly five fields
/// and for lines whose counters or timestamp are not valid.
pub fn client_list_line(line: &str) -> Option<Session> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != CLIENT_LIST_COLUMNS.len() || fields == CLIENT_LIST_COLUMNS {
        return None;
    }

    let bytes_received = fields[2].trim().parse::<u64>().ok()?;
    let bytes_sent = fields[3].trim().parse::<u64>().ok()?;
    let connected_since = parse_timestamp(fields[4])?;

    Some(Session::new(
        fields[0],
        fields[1],
        bytes_received,
        bytes_sent,
        connected_since,
    ))
}

/// Parses one ROUTING TABLE line, with the same skip rules as
/// [`client_list_line`].
pub fn routing_table_line(line: &str) -> Option<RouteEntry> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != ROUTING_TABLE_COLUMNS.len() || fields == ROUTING_TABLE_COLUMNS {
        return None;
    }

    Some(RouteEntry {
        virtual_address: fields[0].to_string(),
        identity: fields[1].to_string(),
        real_address: fields[2].to_string(),
        last_ref: parse_timestamp(fields[3])?,
    })
}

/// Parses a full status file into a session table.
///
/// The whole file is rejected when it is too short to be complete, when it does
/// not open with the client list header, or when a non-header line precedes the
/// first header. Individual malformed lines inside a section are skipped.
pub fn parse(content: &str) -> Result<SessionTable, ParseError> {
    let lines: Vec<&str> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    if lines.len() < MIN_STATUS_LINES {
        return Err(ParseError::TooFewLines(lines.len()));
    }
    if lines[0] != CLIENT_LIST_HEADER {
        return Err(ParseError::MissingClientListHeader);
    }

    let mut table = SessionTable::new();
    let mut section: Option<Section> = None;

    for (index, line) in lines.iter().enumerate() {
        if let Some(header) = Section::from_header(line) {
            section = Some(header);
            continue;
        }

        match section {
            None => return Err(ParseError::UnexpectedLine(index + 1)),
            Some(Section::ClientList) => match client_list_line(line) {
                Some(session) => {
                    trace!("Client list entry for {}", session.identity);
                    table.insert(session);
                }
                None => trace!("Skipping client list line {}", index + 1),
            },
            Some(Section::RoutingTable) => {
                let Some(route) = routing_table_line(line) else {
                    trace!("Skipping routing table line {}", index + 1);
                    continue;
                };
                match table.get_mut(&route.identity) {
                    Some(session) => {
                        session.virtual_address = route.virtual_address;
                        session.real_address = route.real_address;
                        session.last_ref = Some(route.last_ref);
                    }
                    None => debug!(
                        "Dropping route {} for {}: identity not in client list",
                        route.virtual_address, route.identity
                    ),
                }
            }
            Some(Section::GlobalStats) | Some(Section::End) => {}
        }
    }

    Ok(table)
}
