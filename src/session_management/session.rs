use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// One VPN client as observed in the status file.
///
/// `connected_since` identifies a connection instance: the same identity with a
/// later `connected_since` is a new connection, not an update of the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub identity: String,
    pub real_address: String,
    /// Empty until the routing table has been correlated.
    #[serde(default)]
    pub virtual_address: String,
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub connected_since: i64,
    /// Unknown until the routing table has listed the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_ref: Option<i64>,
}

impl Session {
    /// Minimal session used when only the client list line is known.
    pub fn new(
        identity: impl Into<String>,
        real_address: impl Into<String>,
        bytes_received: u64,
        bytes_sent: u64,
        connected_since: i64,
    ) -> Self {
        Self {
            identity: identity.into(),
            real_address: real_address.into(),
            virtual_address: String::new(),
            bytes_received,
            bytes_sent,
            connected_since,
            last_ref: None,
        }
    }
}

/// Identity keyed view of every session seen in one snapshot.
///
/// Ordered so that reconciliation emits events in a stable order and the
/// recovery file is written deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionTable {
    sessions: BTreeMap<String, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `session` under its identity, replacing any previous entry.
    pub fn insert(&mut self, session: Session) -> Option<Session> {
        self.sessions.insert(session.identity.clone(), session)
    }

    pub fn get(&self, identity: &str) -> Option<&Session> {
        self.sessions.get(identity)
    }

    pub fn get_mut(&mut self, identity: &str) -> Option<&mut Session> {
        self.sessions.get_mut(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.sessions.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, Session> {
        self.sessions.values()
    }
}

impl FromIterator<Session> for SessionTable {
    fn from_iter<I: IntoIterator<Item = Session>>(iter: I) -> Self {
        let mut table = SessionTable::new();
        for session in iter {
            table.insert(session);
        }
        table
    }
}

impl<'a> IntoIterator for &'a SessionTable {
    type Item = &'a Session;
    type IntoIter = btree_map::Values<'a, String, Session>;

    fn into_iter(self) -> Self::IntoIter {
        self.sessions.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_same_identity() {
        let mut table = SessionTable::new();
        assert!(table.insert(Session::new("42", "1.2.3.4:1000", 1, 2, 100)).is_none());
        let previous = table.insert(Session::new("42", "1.2.3.4:1001", 5, 6, 200));

        assert_eq!(previous.map(|s| s.connected_since), Some(100));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("42").unwrap().bytes_received, 5);
    }

    #[test]
    fn test_serialized_form_is_keyed_by_identity() {
        let table: SessionTable = vec![Session::new("7", "10.0.0.1:5", 10, 20, 300)]
            .into_iter()
            .collect();

        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["7"]["identity"], "7");
        assert_eq!(value["7"]["realAddress"], "10.0.0.1:5");
        assert_eq!(value["7"]["bytesSent"], 20);
        assert_eq!(value["7"]["connectedSince"], 300);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{"9": {"identity": "9", "realAddress": "r", "bytesReceived": 1,
            "bytesSent": 2, "connectedSince": 3}}"#;
        let table: SessionTable = serde_json::from_str(json).unwrap();
        let session = table.get("9").unwrap();
        assert_eq!(session.virtual_address, "");
        assert_eq!(session.last_ref, None);
    }
}
