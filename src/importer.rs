use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, XnatError},
    session::{Payload, Wait, XnatSession},
    structs::{Filters, QueueOutcome, QueueStatus, QueuedSession, ScpParams, Study, Studies, UidList},
    utils::{convert_seconds, log_error, plain_string},
};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// PACS queried by the batch study lookup when none is set.
const DEFAULT_PACS_ID: u32 = 1;

/// Imports studies from a PACS into an XNAT project by Study Instance UID.
///
/// The usual sequence is [set_uids](Self::set_uids),
/// [set_filters](Self::set_filters), [find_studies](Self::find_studies),
/// [import_studies](Self::import_studies) and finally
/// [monitor_import_queue](Self::monitor_import_queue).
pub struct UidImporter {
    session: Arc<dyn XnatSession>,
    project: Option<String>,
    uids: UidList,
    filters: Filters,
    studies: Studies,
    scp: Option<ScpParams>,
    pacs_id: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueueEntry {
    xnat_project: String,
    #[serde(default)]
    series_ids: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    study_instance_uid: String,
    #[serde(default)]
    timestamp: f64,
    #[serde(default)]
    queued_time: f64,
}

impl UidImporter {
    pub fn new(session: Arc<dyn XnatSession>, project: Option<String>) -> Self {
        Self {
            session,
            project,
            uids: UidList::default(),
            filters: Filters::new(),
            studies: Studies::new(),
            scp: None,
            pacs_id: DEFAULT_PACS_ID,
        }
    }

    pub fn set_project(&mut self, project: impl Into<String>) {
        self.project = Some(project.into());
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Replaces the UIDs to look for. Accepts a single UID or a list; an
    /// empty list clears them.
    pub fn set_uids(&mut self, uids: impl Into<UidList>) {
        self.uids = uids.into();
    }

    pub fn uids(&self) -> &UidList {
        &self.uids
    }

    /// Replaces the series filters. No merging with the previous set.
    pub fn set_filters(&mut self, filters: Filters) {
        self.filters = filters;
    }

    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// PACS used by [find_studies](Self::find_studies) until SCP parameters
    /// are known, after which their id takes over. Defaults to 1.
    pub fn set_pacs_id(&mut self, pacs_id: u32) {
        self.pacs_id = pacs_id;
    }

    pub fn get_studies(&self) -> &Studies {
        &self.studies
    }

    pub fn set_studies(&mut self, studies: Studies) {
        self.studies = studies;
    }

    fn require_project(&self, action: &str) -> Result<&str> {
        self.project.as_deref().ok_or_else(|| {
            XnatError::Precondition(format!("Unable to {}: Project has not been defined.", action))
        })
    }

    /// Fetches the DICOM SCP parameters from the server, replacing any
    /// previously fetched ones. A given `project` also becomes the importer's
    /// project.
    pub async fn set_scp_params(&mut self, project: Option<&str>) -> Result<ScpParams> {
        if let Some(project) = project {
            self.set_project(project);
        }
        self.scp = None;
        info!("Gathering SCP parameters...");
        let response = self.session.get("/xapi/dicomscp", &[]).await?;
        let info = response
            .as_array()
            .and_then(|list| list.first())
            .and_then(Value::as_object)
            .ok_or_else(|| XnatError::response("/xapi/dicomscp", "no DICOM SCP receiver found"))?;

        let field = |name: &str| {
            info.get(name)
                .map(plain_string)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| XnatError::response("/xapi/dicomscp", format!("missing {}", name)))
        };
        let scp = ScpParams {
            pacs_id: field("id")?,
            ae: format!("{}%3A{}", field("aeTitle")?, field("port")?),
        };
        info!("...success!");
        debug!("SCP Info: {:?}", scp);
        self.scp = Some(scp.clone());
        Ok(scp)
    }

    async fn scp_params(&mut self) -> Result<ScpParams> {
        match &self.scp {
            Some(scp) => Ok(scp.clone()),
            None => self.set_scp_params(None).await,
        }
    }

    /// Looks up all configured UIDs in one request and keeps, for each study,
    /// the series that pass the filters. Returns the number of studies kept.
    ///
    /// A study whose entry in the response cannot be read is logged and
    /// skipped; a failed request leaves no studies.
    pub async fn find_studies(&mut self) -> usize {
        self.studies.clear();

        if self.uids.is_empty() {
            warn!("Unable to get studies: No UIDs found.");
            return 0;
        }

        let data = self.uids.as_slice().join(",");
        info!("Gathering studies for UID(s): {}", data);

        let pacs_id = match &self.scp {
            Some(scp) => scp.pacs_id.clone(),
            None => self.pacs_id.to_string(),
        };
        let path = format!("/xapi/dqr/seriesInfo/pacs/{}/studies", pacs_id);
        let response = match self.session.post(&path, Payload::Text(data), Wait::Default).await {
            Ok(response) => response,
            Err(e) => {
                log_error(&e);
                return 0;
            }
        };

        let mut studies = Studies::new();
        for uid in self.uids.iter() {
            match filter_study(&response, uid, &self.filters) {
                Ok(Some(study)) => {
                    studies.insert(uid.clone(), study);
                }
                Ok(None) => debug!("No series of study {} passed the filters.", uid),
                Err(e) => log_error(&e),
            }
        }

        info!("Search complete: {} Studies found.", studies.len());
        self.studies = studies;
        self.studies.len()
    }

    /// Submits the found studies for import. Never fails: every problem is
    /// logged and reported as `false`.
    pub async fn import_studies(&mut self) -> bool {
        match self.try_import_studies().await {
            Ok(()) => true,
            Err(XnatError::Precondition(message)) => {
                warn!("{}", message);
                false
            }
            Err(e) => {
                log_error(&e);
                false
            }
        }
    }

    async fn try_import_studies(&mut self) -> Result<()> {
        let project = self.require_project("import studies")?.to_string();
        if self.studies.is_empty() {
            return Err(XnatError::Precondition(
                "Unable to import studies: No studies found.".to_string(),
            ));
        }
        let scp = self.scp_params().await.map_err(|e| {
            log_error(&e);
            XnatError::Precondition(
                "Unable to import studies: No dicomscp parameters found.".to_string(),
            )
        })?;

        info!("Importing data from PACS...");
        debug!("Data: {:?}", self.studies);

        let path = format!(
            "/xapi/dqr/csvimport/generalImportFromJson?pacsId={}&ae={}&project={}",
            scp.pacs_id, scp.ae, project
        );
        let body = serde_json::to_value(&self.studies)?;
        self.session
            .post(&path, Payload::Json(body), Wait::Default)
            .await?;

        info!(
            "...success! Subject(s) were successfully added to {}.",
            project
        );
        Ok(())
    }

    /// Single look at the server-wide import queue, restricted to the
    /// current project.
    pub async fn check_import_queue(&self) -> Result<QueueStatus> {
        let project = self.require_project("check the import queue")?;
        let query = [("format".to_string(), "json".to_string())];
        let response = self
            .session
            .get("/xapi/dqr/query/queue/all", &query)
            .await?;
        let items = response.as_array().ok_or_else(|| {
            XnatError::response("/xapi/dqr/query/queue/all", "expected a list of queue entries")
        })?;

        let mut status = QueueStatus::default();
        for item in items {
            let entry: QueueEntry = match serde_json::from_value(item.clone()) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable queue entry: {}", e);
                    continue;
                }
            };
            if entry.xnat_project != project {
                continue;
            }

            let num_scans = entry.series_ids.split(',').filter(|s| !s.is_empty()).count();
            status.total_sessions += 1;
            status.total_scans += num_scans;
            status.sessions.push(QueuedSession {
                status: entry.status,
                num_scans,
                study_uid: entry.study_instance_uid,
                sec_queued: (entry.timestamp - entry.queued_time) / 1000.0,
            });
        }
        Ok(status)
    }

    /// Polls the import queue once per second until it drains or `timeout`
    /// runs out.
    ///
    /// With `refresh_on_change` the timeout counts from the last time the
    /// queue status changed, otherwise from the start. Items still queued at
    /// the timeout are reported with a warning and the monitor stops anyway.
    pub async fn monitor_import_queue(
        &self,
        timeout: Duration,
        refresh_on_change: bool,
    ) -> Result<QueueOutcome> {
        self.require_project("monitor the import queue")?;

        let mut start = Instant::now();
        let mut has_populated = false;
        let mut last_status: Option<String> = None;

        loop {
            let queue = match self.check_import_queue().await {
                Ok(queue) => queue,
                Err(e) => {
                    log_error(&e);
                    QueueStatus::default()
                }
            };
            let elapsed = start.elapsed();

            let (status, outcome) = if !queue.is_empty() {
                has_populated = true;
                let outcome = (elapsed > timeout).then_some(QueueOutcome::TimedOut {
                    sessions: queue.total_sessions,
                    scans: queue.total_scans,
                });
                (queue_summary(&queue), outcome)
            } else if has_populated {
                (
                    "There are no more items in the queue.".to_string(),
                    Some(QueueOutcome::Drained),
                )
            } else if elapsed > timeout {
                (
                    "Time limit exceeded and no items were found.".to_string(),
                    Some(QueueOutcome::NothingQueued),
                )
            } else {
                ("Waiting for items to arrive in queue...".to_string(), None)
            };

            if last_status.as_deref() != Some(status.as_str()) {
                info!("Queue Updated:\n{}", status);
                if refresh_on_change {
                    start = Instant::now();
                }
                last_status = Some(status);
            }

            match outcome {
                Some(outcome @ QueueOutcome::TimedOut { .. }) => {
                    warn!(
                        "There are items still in the queue, but it is taking longer than usual \
                         to finish. Try manually monitoring these items in the browser. \
                         Exiting queue monitor."
                    );
                    return Ok(outcome);
                }
                Some(outcome) => {
                    info!("Exiting queue monitor.");
                    return Ok(outcome);
                }
                None => sleep(POLL_INTERVAL).await,
            }
        }
    }
}

/// True when `series` holds, for every filter key, one of the allowed
/// values. An empty filter set matches everything.
pub fn series_matches(series: &Map<String, Value>, filters: &Filters) -> bool {
    filters.iter().all(|(key, allowed)| {
        series
            .get(key)
            .map(plain_string)
            .is_some_and(|value| allowed.contains(&value))
    })
}

fn filter_study(response: &Value, uid: &str, filters: &Filters) -> Result<Option<Study>> {
    let context = || format!("study lookup for {}", uid);
    let results = response
        .get(uid)
        .and_then(|study| study.get("results"))
        .and_then(Value::as_array)
        .ok_or_else(|| XnatError::response(context(), "no series results returned"))?;

    let mut study = Study::default();
    for series in results {
        let series = series
            .as_object()
            .ok_or_else(|| XnatError::response(context(), "series entry is not an object"))?;
        if !series_matches(series, filters) {
            continue;
        }

        let series_uid = series
            .get("seriesInstanceUid")
            .map(plain_string)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| XnatError::response(context(), "series without seriesInstanceUid"))?;
        if !study.series_instance_uids.contains(&series_uid) {
            study.series_instance_uids.push(series_uid);
        }
        if let Some(description) = series.get("seriesDescription").map(plain_string) {
            if !study.series_descriptions.contains(&description) {
                study.series_descriptions.push(description);
            }
        }
    }

    Ok((!study.series_instance_uids.is_empty()).then_some(study))
}

fn short_uid(uid: &str) -> String {
    let parts: Vec<&str> = uid.split('.').collect();
    if parts.len() > 5 {
        format!("{}...{}", parts[..3].join("."), parts[parts.len() - 2..].join("."))
    } else {
        uid.to_string()
    }
}

fn queue_summary(queue: &QueueStatus) -> String {
    let mut summary = format!(
        "{} sessions containing {} scans are currently queued.",
        queue.total_sessions, queue.total_scans
    );
    for session in &queue.sessions {
        summary.push_str(&format!(
            "\n\t>> {} ({} queue time): {} scans are {}",
            short_uid(&session.study_uid),
            convert_seconds(session.sec_queued, None),
            session.num_scans,
            session.status
        ));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mock::{Method, MockSession};
    use serde_json::json;

    const IMPORT_PATH: &str =
        "/xapi/dqr/csvimport/generalImportFromJson?pacsId=3&ae=XNAT%3A8104&project=demo";

    fn importer(session: &Arc<MockSession>) -> UidImporter {
        UidImporter::new(session.clone(), Some("demo".to_string()))
    }

    fn lookup_response() -> Value {
        json!({
            "U1": {"results": [
                {"seriesDescription": "Ax T1", "seriesInstanceUid": "1.1", "modality": "MR"},
                {"seriesDescription": "Ax T1", "seriesInstanceUid": "1.2", "modality": "MR"},
                {"seriesDescription": "Localizer", "seriesInstanceUid": "1.3", "modality": "MR"}
            ]},
            "U2": {"results": [
                {"seriesDescription": "Ax T2", "seriesInstanceUid": "2.1", "modality": "MR"}
            ]}
        })
    }

    fn queue_entry(project: &str, uid: &str, series: &str) -> Value {
        json!({
            "xnatProject": project,
            "seriesIds": series,
            "status": "QUEUED",
            "studyInstanceUid": uid,
            "timestamp": 1_700_000_065_000u64,
            "queuedTime": 1_700_000_000_000u64
        })
    }

    #[test]
    fn test_series_matches_is_and_of_any() {
        let series = json!({"seriesDescription": "Ax T1", "modality": "MR"});
        let series = series.as_object().unwrap();

        assert!(series_matches(series, &Filters::new()));

        let mut filters = Filters::new();
        filters.insert("seriesDescription".into(), vec!["Ax T1".into(), "Ax T2".into()]);
        assert!(series_matches(series, &filters));

        filters.insert("modality".into(), vec!["CT".into()]);
        assert!(!series_matches(series, &filters));

        let mut filters = Filters::new();
        filters.insert("seriesDescription".into(), vec!["ax t1".into()]);
        assert!(!series_matches(series, &filters));

        let mut filters = Filters::new();
        filters.insert("bodyPart".into(), vec!["HEAD".into()]);
        assert!(!series_matches(series, &filters));
    }

    #[test]
    fn test_set_uids_normalizes() {
        let session = Arc::new(MockSession::new());
        let mut importer = importer(&session);

        importer.set_uids("1.2.840.10008");
        assert_eq!(importer.uids().as_slice(), ["1.2.840.10008"]);

        importer.set_uids(vec!["2", "1", "2"]);
        assert_eq!(importer.uids().as_slice(), ["2", "1"]);
        let again = importer.uids().clone();
        importer.set_uids(again.as_slice().to_vec());
        assert_eq!(importer.uids().as_slice(), ["2", "1"]);

        importer.set_uids(Vec::<String>::new());
        assert!(importer.uids().is_empty());
    }

    #[tokio::test]
    async fn test_find_studies_drops_filtered_study() {
        let session = Arc::new(MockSession::new().on(
            Method::Post,
            "/xapi/dqr/seriesInfo/pacs/1/studies",
            lookup_response(),
        ));
        let mut importer = importer(&session);
        importer.set_uids(["U1", "U2"]);
        let mut filters = Filters::new();
        filters.insert("seriesDescription".into(), vec!["Ax T1".into()]);
        importer.set_filters(filters);

        assert_eq!(importer.find_studies().await, 1);

        let studies = importer.get_studies();
        assert_eq!(studies.len(), 1);
        assert_eq!(studies["U1"].series_descriptions, vec!["Ax T1"]);
        assert_eq!(studies["U1"].series_instance_uids, vec!["1.1", "1.2"]);

        let calls = session.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0].payload {
            Some(Payload::Text(body)) => assert_eq!(body, "U1,U2"),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_find_studies_uses_scp_pacs_id() {
        let session = Arc::new(
            MockSession::new()
                .on(
                    Method::Get,
                    "/xapi/dicomscp",
                    json!([{"id": 3, "aeTitle": "XNAT", "port": 8104}]),
                )
                .on(
                    Method::Post,
                    "/xapi/dqr/seriesInfo/pacs/3/studies",
                    lookup_response(),
                ),
        );
        let mut importer = UidImporter::new(session.clone(), None);
        importer.set_pacs_id(7);
        importer.set_uids(["U1"]);

        let scp = importer.set_scp_params(Some("demo")).await.unwrap();
        assert_eq!(scp.pacs_id, "3");
        assert_eq!(scp.ae, "XNAT%3A8104");
        assert_eq!(importer.project(), Some("demo"));

        assert_eq!(importer.find_studies().await, 1);
        let posts: Vec<String> = session
            .calls()
            .into_iter()
            .filter(|c| c.method == Method::Post)
            .map(|c| c.path)
            .collect();
        assert_eq!(posts, vec!["/xapi/dqr/seriesInfo/pacs/3/studies".to_string()]);
    }

    #[tokio::test]
    async fn test_find_studies_uses_set_pacs_id_without_scp() {
        let session = Arc::new(MockSession::new().on(
            Method::Post,
            "/xapi/dqr/seriesInfo/pacs/7/studies",
            lookup_response(),
        ));
        let mut importer = importer(&session);
        importer.set_pacs_id(7);
        importer.set_uids(["U2"]);

        assert_eq!(importer.find_studies().await, 1);
        assert!(session.calls_to(Method::Get, "/xapi/dicomscp").is_empty());
    }

    #[tokio::test]
    async fn test_find_studies_survives_bad_uid() {
        let session = Arc::new(MockSession::new().on(
            Method::Post,
            "/xapi/dqr/seriesInfo/pacs/1/studies",
            lookup_response(),
        ));
        let mut importer = importer(&session);
        importer.set_uids(["U3", "U2"]);

        assert_eq!(importer.find_studies().await, 1);
        assert!(importer.get_studies().contains_key("U2"));
    }

    #[tokio::test]
    async fn test_find_studies_without_uids_or_server() {
        let session = Arc::new(MockSession::new());
        let mut importer = importer(&session);

        assert_eq!(importer.find_studies().await, 0);
        assert!(session.calls().is_empty());

        importer.set_uids("U1");
        assert_eq!(importer.find_studies().await, 0);
        assert!(importer.get_studies().is_empty());
    }

    #[tokio::test]
    async fn test_import_studies_posts_found_studies() {
        let session = Arc::new(
            MockSession::new()
                .on(
                    Method::Get,
                    "/xapi/dicomscp",
                    json!([{"id": 3, "aeTitle": "XNAT", "port": 8104}]),
                )
                .on(Method::Post, IMPORT_PATH, Value::Null),
        );
        let mut importer = importer(&session);
        let mut studies = Studies::new();
        studies.insert(
            "U1".to_string(),
            Study {
                series_descriptions: vec!["Ax T1".into()],
                series_instance_uids: vec!["1.1".into()],
            },
        );
        importer.set_studies(studies);

        assert!(importer.import_studies().await);

        let posts = session.calls_to(Method::Post, IMPORT_PATH);
        assert_eq!(posts.len(), 1);
        match &posts[0].payload {
            Some(Payload::Json(body)) => assert_eq!(
                body,
                &json!({"U1": {"seriesDescriptions": ["Ax T1"], "seriesInstanceUids": ["1.1"]}})
            ),
            other => panic!("unexpected payload {:?}", other),
        }

        // SCP parameters are fetched once
        assert!(importer.import_studies().await);
        assert_eq!(session.calls_to(Method::Get, "/xapi/dicomscp").len(), 1);
    }

    #[tokio::test]
    async fn test_import_studies_failures_are_false() {
        let session = Arc::new(MockSession::new().on(Method::Get, "/xapi/dicomscp", json!([])));
        let mut importer = importer(&session);

        // no studies yet
        assert!(!importer.import_studies().await);
        assert!(session.calls().is_empty());

        importer.set_studies(Studies::from([("U1".to_string(), Study::default())]));
        // no SCP receiver configured
        assert!(!importer.import_studies().await);
        assert!(session.calls_to(Method::Post, IMPORT_PATH).is_empty());
    }

    #[tokio::test]
    async fn test_check_import_queue_counts_project_entries() {
        let session = Arc::new(MockSession::new().on(
            Method::Get,
            "/xapi/dqr/query/queue/all",
            json!([
                queue_entry("demo", "1.2.840.113619.2.55.3.1", "a,b,c"),
                queue_entry("other", "9.9", "a"),
                queue_entry("demo", "1.2.3", "d"),
                {"unexpected": true}
            ]),
        ));
        let importer = importer(&session);

        let status = importer.check_import_queue().await.unwrap();
        assert_eq!(status.total_sessions, 2);
        assert_eq!(status.total_scans, 4);
        assert_eq!(status.sessions[0].sec_queued, 65.0);
        assert_eq!(status.sessions[1].study_uid, "1.2.3");

        let calls = session.calls();
        assert_eq!(calls[0].query, vec![("format".to_string(), "json".to_string())]);
    }

    #[tokio::test]
    async fn test_check_import_queue_requires_project() {
        let session = Arc::new(MockSession::new());
        let importer = UidImporter::new(session, None);
        let err = importer.check_import_queue().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Precondition);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_times_out_while_populated() {
        let populated = json!([queue_entry("demo", "1.2.3", "a,b")]);
        let mut replies: Vec<std::result::Result<Value, String>> =
            (0..10).map(|_| Ok(populated.clone())).collect();
        replies.push(Ok(json!([])));
        let session = Arc::new(MockSession::new().on_sequence(
            Method::Get,
            "/xapi/dqr/query/queue/all",
            replies,
        ));
        let importer = importer(&session);
        let (logs, _guard) = crate::utils::log_capture::capture();

        let start = Instant::now();
        let outcome = importer
            .monitor_import_queue(Duration::from_secs(5), false)
            .await
            .unwrap();

        assert_eq!(outcome, QueueOutcome::TimedOut { sessions: 1, scans: 2 });
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5));
        assert!(elapsed < Duration::from_secs(7));

        let logs = logs.contents();
        assert!(logs.contains("taking longer than usual"));
        assert_eq!(logs.matches("Queue Updated").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_returns_when_queue_drains() {
        let populated = json!([queue_entry("demo", "1.2.3", "a")]);
        let session = Arc::new(MockSession::new().on_sequence(
            Method::Get,
            "/xapi/dqr/query/queue/all",
            vec![Ok(json!([])), Ok(populated.clone()), Ok(populated), Ok(json!([]))],
        ));
        let importer = importer(&session);

        let outcome = importer
            .monitor_import_queue(Duration::from_secs(180), true)
            .await
            .unwrap();
        assert_eq!(outcome, QueueOutcome::Drained);
        assert_eq!(session.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_gives_up_when_nothing_arrives() {
        let session = Arc::new(MockSession::new().on(
            Method::Get,
            "/xapi/dqr/query/queue/all",
            json!([queue_entry("other", "1.2.3", "a")]),
        ));
        let importer = importer(&session);

        let start = Instant::now();
        let outcome = importer
            .monitor_import_queue(Duration::from_secs(3), true)
            .await
            .unwrap();
        assert_eq!(outcome, QueueOutcome::NothingQueued);
        assert!(start.elapsed() <= Duration::from_secs(5));
    }

    #[test]
    fn test_queue_summary_shortens_uids() {
        let queue = QueueStatus {
            total_sessions: 1,
            total_scans: 3,
            sessions: vec![QueuedSession {
                status: "QUEUED".into(),
                num_scans: 3,
                study_uid: "1.2.840.113619.2.55.3.604688119".into(),
                sec_queued: 65.0,
            }],
        };
        assert_eq!(
            queue_summary(&queue),
            "1 sessions containing 3 scans are currently queued.\n\t>> 1.2.840...3.604688119 \
             (1 minute and 5.00 seconds queue time): 3 scans are QUEUED"
        );
    }
}
