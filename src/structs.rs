use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// De-duplicated, ordered list of study UIDs.
///
/// UIDs are opaque strings: nothing here parses them, so `"1.20"` and
/// `"1.2"` stay distinct. Empty entries are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct UidList(Vec<String>);

impl UidList {
    pub fn new<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for uid in uids.into_iter().map(Into::into) {
            if !uid.is_empty() && !list.contains(&uid) {
                list.push(uid);
            }
        }
        UidList(list)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Appends the UIDs not already present, keeping the order.
    pub fn extend<I, S>(&mut self, uids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut merged = std::mem::take(&mut self.0);
        merged.extend(uids.into_iter().map(Into::into));
        *self = UidList::new(merged);
    }
}

impl From<&str> for UidList {
    fn from(uid: &str) -> Self {
        UidList::new([uid])
    }
}

impl From<String> for UidList {
    fn from(uid: String) -> Self {
        UidList::new([uid])
    }
}

impl From<Vec<String>> for UidList {
    fn from(uids: Vec<String>) -> Self {
        UidList::new(uids)
    }
}

impl From<Vec<&str>> for UidList {
    fn from(uids: Vec<&str>) -> Self {
        UidList::new(uids)
    }
}

impl From<&[&str]> for UidList {
    fn from(uids: &[&str]) -> Self {
        UidList::new(uids.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for UidList {
    fn from(uids: [&str; N]) -> Self {
        UidList::new(uids)
    }
}

impl<'de> Deserialize<'de> for UidList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(uid) => UidList::from(uid),
            OneOrMany::Many(uids) => UidList::from(uids),
        })
    }
}

/// Series attribute name (e.g. `seriesDescription`) to its allowed values.
pub type Filters = BTreeMap<String, Vec<String>>;

/// Series kept for one study after filtering.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub series_descriptions: Vec<String>,
    pub series_instance_uids: Vec<String>,
}

/// Study UID to its filtered series.
pub type Studies = BTreeMap<String, Study>;

/// Connection parameters of the DICOM SCP that pulls studies from PACS.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ScpParams {
    pub pacs_id: String,
    /// `<AE title>%3A<port>`, already URL encoded.
    pub ae: String,
}

/// Snapshot of the import queue for one project.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct QueueStatus {
    pub total_sessions: usize,
    pub total_scans: usize,
    pub sessions: Vec<QueuedSession>,
}

impl QueueStatus {
    pub fn is_empty(&self) -> bool {
        self.total_sessions == 0
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct QueuedSession {
    pub status: String,
    pub num_scans: usize,
    pub study_uid: String,
    pub sec_queued: f64,
}

/// Why the queue monitor stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    /// Items were seen in the queue and it has since emptied.
    Drained,
    /// Nothing ever arrived before the timeout.
    NothingQueued,
    /// Items were still queued when the timeout expired.
    TimedOut { sessions: usize, scans: usize },
}

/// Level of the project hierarchy a command runs on.
///
/// The ordering is the order in which [CommandSpec] entries are run: scans
/// first, then sessions, then the whole project.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Scan,
    Session,
    Project,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Scan => "scan",
            Scope::Session => "session",
            Scope::Project => "project",
        };
        f.write_str(name)
    }
}

/// Name of a container command and the extra launch parameters to pass it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommandEntry {
    pub name: String,
    #[serde(default)]
    pub opts: Map<String, Value>,
}

pub type CommandSpec = BTreeMap<Scope, CommandEntry>;

/// A project, session or scan as listed by the XNAT REST API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Target {
    #[serde(rename = "xsiType")]
    pub xsi_type: String,
    #[serde(rename = "URI")]
    pub uri: String,
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Target {
    pub fn project(project: &str) -> Self {
        Target {
            xsi_type: "xnat:projectData".to_string(),
            uri: format!("/data/projects/{}", project),
            id: Some(project.to_string()),
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uid_list_from_scalar_and_list() {
        assert_eq!(UidList::from("1.2.3").as_slice(), ["1.2.3"]);
        assert_eq!(
            UidList::from(vec!["1.2.3", "4.5", "1.2.3", ""]).as_slice(),
            ["1.2.3", "4.5"]
        );
        assert!(UidList::from(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_uid_list_is_idempotent() {
        let once = UidList::from(["2.1", "1.2", "2.1"]);
        let twice = UidList::new(once.iter().cloned());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_uid_list_extend_keeps_order() {
        let mut uids = UidList::from(["1", "2"]);
        uids.extend(vec!["2", "3"]);
        assert_eq!(uids.as_slice(), ["1", "2", "3"]);
    }

    #[test]
    fn test_uid_list_deserialize() {
        let one: UidList = serde_json::from_value(json!("1.20")).unwrap();
        assert_eq!(one.as_slice(), ["1.20"]);
        let many: UidList = serde_json::from_value(json!(["1.20", "1.2"])).unwrap();
        assert_eq!(many.len(), 2);
        assert!(serde_json::from_value::<UidList>(json!(12)).is_err());
    }

    #[test]
    fn test_scope_order_and_keys() {
        let spec: CommandSpec = serde_json::from_value(json!({
            "project": {"name": "bids-mriqc"},
            "scan": {"name": "dcm2niix", "opts": {"bids": true}},
        }))
        .unwrap();
        let scopes: Vec<Scope> = spec.keys().copied().collect();
        assert_eq!(scopes, vec![Scope::Scan, Scope::Project]);
        assert!(spec[&Scope::Project].opts.is_empty());
        assert_eq!(Scope::Session.to_string(), "session");
    }

    #[test]
    fn test_target_keeps_unknown_fields() {
        let target: Target = serde_json::from_value(json!({
            "xsiType": "xnat:mrScanData",
            "URI": "/data/experiments/E1/scans/2",
            "ID": "2",
            "quality": "usable"
        }))
        .unwrap();
        assert_eq!(target.id.as_deref(), Some("2"));
        assert_eq!(target.extra["quality"], "usable");
    }
}
