use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, XnatError},
    session::{Payload, Wait, XnatSession},
    structs::{CommandSpec, Scope, Target},
    utils::{log_error, plain_string, write_json, Progress},
};

const DEFAULT_BIDS_MAP: &str = "bmap.json";

/// A container command wrapper as listed by `/xapi/commands/available`.
///
/// `launch` is filled in once the wrapper is resolved and holds the project
/// scoped endpoint used both to validate and to launch the container.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Wrapper {
    #[serde(default)]
    pub enabled: bool,
    pub command_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrapper_name: Option<String>,
    #[serde(default)]
    pub root_element_name: String,
    #[serde(default)]
    pub launch: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Flattened view of one wrapper input.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct InputSpec {
    pub required: bool,
    /// Set for inputs nested under another input; their value is derived
    /// from the parent so they never block a launch.
    pub is_inherited: bool,
    pub default_value: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InputDescriptor {
    #[serde(default)]
    name: String,
    #[serde(default)]
    user_settable: bool,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    input_type: String,
    #[serde(default)]
    children: Vec<Value>,
}

/// Launch descriptor returned by the server for a set of parameters, along
/// with the parameters that produced it.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ContainerInfo {
    pub params: Map<String, Value>,
    #[serde(flatten)]
    pub descriptor: Map<String, Value>,
}

/// Outcome of one launch request.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunResult {
    pub command: String,
    pub opts: Map<String, Value>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub info: Target,
    pub wrapper: Wrapper,
    pub container: ContainerInfo,
    pub result: RunResult,
}

pub type Results = BTreeMap<Scope, Vec<RunRecord>>;

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ProjectExperiments {
    pub sessions: Vec<Target>,
    /// Only scans of `usable` quality.
    pub scans: Vec<Target>,
}

/// Runs container commands on the sessions and scans of an XNAT project and
/// collects their results.
pub struct CommandUtility {
    session: Arc<dyn XnatSession>,
    project: Option<String>,
    commands: CommandSpec,
    experiments: ProjectExperiments,
    has_experiments: bool,
    has_bids: bool,
    bids_map: PathBuf,
    results: Results,
}

impl CommandUtility {
    pub fn new(session: Arc<dyn XnatSession>, project: Option<String>) -> Self {
        Self {
            session,
            project,
            commands: CommandSpec::new(),
            experiments: ProjectExperiments::default(),
            has_experiments: false,
            has_bids: false,
            bids_map: PathBuf::from(DEFAULT_BIDS_MAP),
            results: Results::new(),
        }
    }

    pub fn set_project(&mut self, project: impl Into<String>) {
        self.project = Some(project.into());
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    pub fn set_commands(&mut self, commands: CommandSpec) {
        self.commands = commands;
    }

    pub fn commands(&self) -> &CommandSpec {
        &self.commands
    }

    /// JSON file uploaded by [check_bids_map](Self::check_bids_map) when the
    /// project has no BIDS map yet. Defaults to `bmap.json`.
    pub fn set_bids_map(&mut self, path: impl AsRef<Path>) {
        self.bids_map = path.as_ref().to_path_buf();
    }

    pub fn has_bids(&self) -> bool {
        self.has_bids
    }

    fn require_project(&self, action: &str) -> Result<String> {
        self.project.clone().ok_or_else(|| {
            XnatError::Precondition(format!("Unable to {}: Project has not been defined.", action))
        })
    }

    /// Items of an XNAT `ResultSet` listing.
    async fn result_set(&self, path: &str) -> Result<Vec<Value>> {
        let response = self.session.get(path, &[]).await?;
        response
            .pointer("/ResultSet/Result")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| XnatError::response(path, "missing ResultSet.Result"))
    }

    /// Listing rows as [Target]s. Rows missing `xsiType` or `URI` are skipped.
    async fn targets(&self, path: &str) -> Result<Vec<Target>> {
        let items = self.result_set(path).await?;
        Ok(items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(target) => Some(target),
                Err(e) => {
                    debug!("Skipping unreadable row of {}: {}", path, e);
                    None
                }
            })
            .collect())
    }

    /// Lists the sessions of the project and the usable scans of each
    /// session, replacing anything found before.
    ///
    /// A session whose scans cannot be listed is logged and skipped.
    pub async fn find_project_experiments(&mut self, project: Option<&str>) -> Result<()> {
        if let Some(project) = project {
            self.set_project(project);
        }
        let project = self.require_project("get project experiments")?;

        self.experiments = ProjectExperiments::default();
        self.has_experiments = false;

        let sessions = match self
            .targets(&format!("/data/projects/{}/experiments", project))
            .await
        {
            Ok(sessions) => sessions,
            Err(e) => {
                log_error(&e);
                return Ok(());
            }
        };

        let mut scans = Vec::new();
        let mut failures = 0;
        for session in &sessions {
            let uri = format!("/data/experiments/{}/scans", experiment_id(session));
            match self.targets(&uri).await {
                Ok(found) => scans.extend(found.into_iter().filter(|scan| {
                    scan.extra.get("quality").and_then(Value::as_str) == Some("usable")
                })),
                Err(e) => {
                    log_error(&e);
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            warn!(
                "Unable to list scans for {} of {} session(s) in {}.",
                failures,
                sessions.len(),
                project
            );
        }

        info!(
            "Found {} session(s) and {} usable scan(s) in {}.",
            sessions.len(),
            scans.len(),
            project
        );
        self.has_experiments = !sessions.is_empty();
        self.experiments = ProjectExperiments { sessions, scans };
        Ok(())
    }

    pub fn has_experiments(&self) -> bool {
        self.has_experiments
    }

    pub fn get_project_experiments(&self) -> &ProjectExperiments {
        &self.experiments
    }

    /// Makes sure the project holds a BIDS map, uploading the configured one
    /// when it does not. A failed upload is logged and leaves the map marked
    /// as unavailable.
    pub async fn check_bids_map(&mut self) -> Result<bool> {
        let project = self.require_project("check for BIDS map")?;
        let config_uri = format!("/data/projects/{}/config", project);

        let tools: Vec<String> = match self.result_set(&config_uri).await {
            Ok(items) => items
                .iter()
                .filter_map(|item| item.get("tool"))
                .map(plain_string)
                .collect(),
            Err(e) => {
                log_error(&e);
                Vec::new()
            }
        };

        let has_bids = if tools.iter().any(|tool| tool == "bids") {
            let mut status = "BIDS map found!".to_string();
            match self.result_set(&format!("{}/bids", config_uri)).await {
                Ok(items) => {
                    for item in items
                        .iter()
                        .filter(|item| item.get("path").and_then(Value::as_str) == Some("bidsmap"))
                    {
                        status.push_str(&format!(
                            " Status: {}, Created: {}",
                            item.get("status").map(plain_string).unwrap_or_default(),
                            item.get("create_date").map(plain_string).unwrap_or_default()
                        ));
                    }
                }
                Err(e) => log_error(&e),
            }
            info!("{}", status);
            true
        } else {
            info!(
                "No BIDS map found in project {}. Uploading mapping now...",
                project
            );
            match self.upload_bids_map(&config_uri).await {
                Ok(()) => {
                    info!("Successfully uploaded BIDS map.");
                    true
                }
                Err(e) => {
                    log_error(&e);
                    false
                }
            }
        };

        self.has_bids = has_bids;
        Ok(has_bids)
    }

    async fn upload_bids_map(&self, config_uri: &str) -> Result<()> {
        let text =
            fs::read_to_string(&self.bids_map).map_err(|e| XnatError::io(&self.bids_map, e))?;
        let map: Value = serde_json::from_str(&text)?;
        self.session
            .put(
                &format!("{}/bids/bidsmap?inbody=true", config_uri),
                Payload::Json(map),
            )
            .await
    }

    /// Finds the first enabled wrapper whose command name contains `name`
    /// among the commands available for `xsi_type` (e.g. `xnat:mrScanData`)
    /// in the project, and fills in its launch endpoint.
    pub async fn get_wrapper_command(&self, name: &str, xsi_type: &str) -> Result<Option<Wrapper>> {
        let project = self.require_project("find command wrappers")?;
        let query = [
            ("project".to_string(), project.clone()),
            ("xsiType".to_string(), xsi_type.to_string()),
        ];
        let response = self.session.get("/xapi/commands/available", &query).await?;
        let items = response.as_array().ok_or_else(|| {
            XnatError::response("/xapi/commands/available", "expected a list of commands")
        })?;

        for item in items {
            let mut wrapper: Wrapper = match serde_json::from_value(item.clone()) {
                Ok(wrapper) => wrapper,
                Err(e) => {
                    debug!("Skipping unreadable command entry: {}", e);
                    continue;
                }
            };
            if !wrapper.enabled || !wrapper.command_name.contains(name) {
                continue;
            }

            let launch = match (&wrapper.wrapper_id, &wrapper.command_id, &wrapper.wrapper_name) {
                (Some(wrapper_id), _, _) => format!(
                    "/xapi/projects/{}/wrappers/{}/launch",
                    project,
                    plain_string(wrapper_id)
                ),
                (None, Some(command_id), Some(wrapper_name)) => format!(
                    "/xapi/projects/{}/commands/{}/wrappers/{}/launch",
                    project,
                    plain_string(command_id),
                    wrapper_name
                ),
                _ => continue,
            };
            wrapper.launch = launch;
            return Ok(Some(wrapper));
        }
        Ok(None)
    }

    /// Asks the launch endpoint to validate `params`, retrying with rewritten
    /// `/data/...` paths, and returns the first accepted descriptor.
    ///
    /// `Ok(None)` means the server answered but some required input stayed
    /// empty for every variant; one warning is logged per such input. An
    /// error is returned only when no variant got an answer at all.
    pub async fn get_container_info(
        &self,
        launch_url: &str,
        params: &Map<String, Value>,
    ) -> Result<Option<ContainerInfo>> {
        let mut last_error = None;
        let mut missing = Vec::new();
        let mut answered = false;

        for variant in param_variants(params) {
            let query: Vec<(String, String)> = variant
                .iter()
                .map(|(k, v)| (k.clone(), plain_string(v)))
                .collect();
            let descriptor = match self.session.get(launch_url, &query).await {
                Ok(Value::Object(descriptor)) => descriptor,
                Ok(_) => {
                    last_error = Some(XnatError::response(launch_url, "expected a JSON object"));
                    continue;
                }
                Err(e) => {
                    log_error(&e);
                    last_error = Some(e);
                    continue;
                }
            };

            match missing_inputs(launch_url, &descriptor) {
                Ok(errors) if errors.is_empty() => {
                    return Ok(Some(ContainerInfo {
                        params: variant,
                        descriptor,
                    }))
                }
                Ok(errors) => {
                    answered = true;
                    missing = errors;
                }
                Err(e) => {
                    log_error(&e);
                    last_error = Some(e);
                }
            }
        }

        if answered {
            for message in &missing {
                warn!("{}", message);
            }
            return Ok(None);
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }

    /// Launches a container. Transport errors and failures reported by the
    /// server end up in [RunResult::error] instead of being returned.
    pub async fn run_container(&self, launch_url: &str, params: &Map<String, Value>) -> RunResult {
        let mut result = RunResult {
            command: launch_url.to_string(),
            opts: params.clone(),
            result: None,
            error: None,
        };

        // project level launches can take a long time to answer
        let wait = if params.contains_key("project") {
            Wait::Unbounded
        } else {
            Wait::Default
        };

        match self
            .session
            .post(launch_url, Payload::Json(Value::Object(params.clone())), wait)
            .await
        {
            Ok(output) => {
                result.error = launch_error(&output);
                result.result = Some(output);
            }
            Err(e) => {
                log_error(&e);
                result.error = Some(e.to_string());
            }
        }
        result
    }

    /// Resolves, validates and launches `command_name` on every target.
    /// Targets without a matching wrapper or valid parameters are skipped
    /// with a warning.
    pub async fn find_and_run_command(
        &self,
        targets: &[Target],
        command_name: &str,
        extra_params: &Map<String, Value>,
    ) -> Vec<RunRecord> {
        let mut records = Vec::new();

        for (index, target) in targets.iter().enumerate() {
            info!(
                "({}/{}) Gathering info on {}...",
                index + 1,
                targets.len(),
                target.uri
            );

            info!(">> Getting wrapper...");
            let wrapper = match self.get_wrapper_command(command_name, &target.xsi_type).await {
                Ok(Some(wrapper)) if !wrapper.root_element_name.is_empty() => wrapper,
                Ok(_) => {
                    warn!(">> No command found for {} ({}).", target.uri, target.xsi_type);
                    continue;
                }
                Err(e) => {
                    log_error(&e);
                    warn!(">> No command found for {} ({}).", target.uri, target.xsi_type);
                    continue;
                }
            };

            let mut params = extra_params.clone();
            params.insert(
                wrapper.root_element_name.clone(),
                Value::String(target.uri.clone()),
            );

            info!(">> Getting container...");
            let container = match self.get_container_info(&wrapper.launch, &params).await {
                Ok(Some(container)) => container,
                Ok(None) => {
                    warn!(
                        ">> Unable to get container information for {} ({})",
                        target.uri, wrapper.root_element_name
                    );
                    continue;
                }
                Err(e) => {
                    log_error(&e);
                    warn!(
                        ">> Unable to get container information for {} ({})",
                        target.uri, wrapper.root_element_name
                    );
                    continue;
                }
            };

            info!(">> Running container...");
            let result = self.run_container(&wrapper.launch, &container.params).await;
            match &result.error {
                None => info!(">> Success!"),
                Some(error) => warn!(">> {}", error),
            }

            records.push(RunRecord {
                info: target.clone(),
                wrapper,
                container,
                result,
            });
        }
        records
    }

    /// Runs every command of the command spec on the matching targets and
    /// stores the records by scope.
    ///
    /// Errors only when no project or no commands are defined; scopes without
    /// targets are skipped.
    pub async fn run_commands(
        &mut self,
        project: Option<&str>,
        commands: Option<CommandSpec>,
    ) -> Result<()> {
        if let Some(project) = project {
            self.set_project(project);
        }
        if let Some(commands) = commands {
            self.set_commands(commands);
        }

        let project = self.require_project("run commands")?;
        if self.commands.is_empty() {
            return Err(XnatError::Precondition(
                "Unable to run commands: No commands found.".to_string(),
            ));
        }

        for (scope, command) in self.commands.clone() {
            let targets = match scope {
                Scope::Scan => self.experiments.scans.clone(),
                Scope::Session => self.experiments.sessions.clone(),
                Scope::Project => vec![Target::project(&project)],
            };

            if command.name.contains("bids") && !self.has_bids {
                self.check_bids_map().await?;
            }

            if targets.is_empty() {
                info!(
                    "Unable to run command \"{}\": No {}(s) found.",
                    command.name, scope
                );
                continue;
            }

            info!(
                "Running \"{}\" on {} {}(s)",
                command.name,
                targets.len(),
                scope
            );
            let records = self
                .find_and_run_command(&targets, &command.name, &command.opts)
                .await;
            self.results.insert(scope, records);
        }
        Ok(())
    }

    pub fn get_results(&self) -> &Results {
        &self.results
    }

    /// Pretty-prints the results to `filename` (`.json` appended when
    /// missing). Does nothing when there are no results yet.
    pub fn save_results(&self, filename: &str) -> Result<Option<PathBuf>> {
        if self.results.is_empty() {
            warn!("Unable to write results to file: No results found.");
            return Ok(None);
        }
        let path = write_json(&self.results, filename, 2)?;
        info!("Saved results to {}", path.display());
        Ok(Some(path))
    }

    /// Downloads every `.json` file of the project, or of one of its resource
    /// folders, and returns the parsed contents.
    pub async fn download_json_files(
        &mut self,
        project: Option<&str>,
        resource: Option<&str>,
    ) -> Result<Vec<Value>> {
        if let Some(project) = project {
            self.set_project(project);
        }
        let project = self.require_project("download project files")?;

        let uri = match resource.filter(|r| !r.is_empty()) {
            Some(resource) => format!("/data/projects/{}/resources/{}/files", project, resource),
            None => format!("/data/projects/{}/files", project),
        };
        info!("Searching for JSON files in {}", uri);

        let files: Vec<String> = match self.result_set(&uri).await {
            Ok(items) => items
                .iter()
                .filter_map(|item| item.get("URI").and_then(Value::as_str))
                .filter(|uri| uri.ends_with(".json"))
                .map(String::from)
                .collect(),
            Err(e) => {
                log_error(&e);
                return Ok(Vec::new());
            }
        };

        info!(
            "Search complete. Downloading data from {} files...",
            files.len()
        );
        let mut progress = Progress::new(files.len());
        let mut output = Vec::new();
        for file in &files {
            match self.session.get(file, &[]).await {
                Ok(data) => output.push(data),
                Err(e) => log_error(&e),
            }
            for step in progress.advance() {
                info!(">> {}% complete", step);
            }
        }
        info!(">> Download complete!");
        Ok(output)
    }
}

fn experiment_id(target: &Target) -> &str {
    match &target.id {
        Some(id) => id.as_str(),
        None => target.uri.rsplit('/').next().unwrap_or_default(),
    }
}

/// Flattens a tree of wrapper input descriptors into `name -> InputSpec`.
///
/// Only user-settable inputs are listed. Anything below a top-level input is
/// marked as inherited. Boolean inputs default to `true`, text inputs to an
/// empty string and static inputs to nothing.
pub fn get_inputs(search_list: &[Value]) -> BTreeMap<String, InputSpec> {
    collect_inputs(search_list, false)
}

fn collect_inputs(list: &[Value], inherited: bool) -> BTreeMap<String, InputSpec> {
    let mut output = BTreeMap::new();
    for item in list {
        let Ok(input) = InputDescriptor::deserialize(item) else {
            continue;
        };
        if input.user_settable && !input.name.is_empty() {
            let default_value = match input.input_type.as_str() {
                "static" => None,
                "boolean" => Some(Value::Bool(true)),
                _ => Some(Value::String(String::new())),
            };
            output.insert(
                input.name.clone(),
                InputSpec {
                    required: input.required,
                    is_inherited: inherited,
                    default_value,
                },
            );
        }
        output.extend(collect_inputs(&input.children, true));
    }
    output
}

/// The parameter sets tried in turn by
/// [get_container_info](CommandUtility::get_container_info): as given, with
/// `/data` swapped for `/archive`, and with only the part after the third
/// slash. Duplicates are dropped.
fn param_variants(params: &Map<String, Value>) -> Vec<Map<String, Value>> {
    let mut raw = params.clone();
    raw.insert("format".to_string(), Value::String("json".to_string()));

    let mut archive = raw.clone();
    let mut suffix = raw.clone();
    for (key, value) in &raw {
        let Some(text) = value.as_str() else {
            continue;
        };
        if !text.contains("/data") {
            continue;
        }
        archive.insert(key.clone(), Value::String(text.replace("/data", "/archive")));

        let parts: Vec<&str> = text.split('/').collect();
        let tail = if parts.len() > 3 {
            parts[3..].join("/")
        } else {
            parts.last().copied().unwrap_or_default().to_string()
        };
        suffix.insert(key.clone(), Value::String(tail));
    }

    let mut variants = vec![raw];
    for variant in [archive, suffix] {
        if !variants.contains(&variant) {
            variants.push(variant);
        }
    }
    variants
}

fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Messages for every required, non-inherited input left without a value.
fn missing_inputs(launch_url: &str, descriptor: &Map<String, Value>) -> Result<Vec<String>> {
    let config = descriptor
        .get("input-config")
        .and_then(Value::as_array)
        .ok_or_else(|| XnatError::response(launch_url, "missing input-config"))?;
    let values = descriptor
        .get("input-values")
        .and_then(Value::as_array)
        .ok_or_else(|| XnatError::response(launch_url, "missing input-values"))?;
    let inputs = get_inputs(config);

    Ok(values
        .iter()
        .filter(|value| is_empty_value(value.get("values")))
        .filter_map(|value| value.get("name").and_then(Value::as_str))
        .filter(|name| {
            inputs
                .get(*name)
                .is_some_and(|input| input.required && !input.is_inherited)
        })
        .map(|name| format!("Required value \"{}\" missing from input values.", name))
        .collect())
}

/// Describes a failure reported in a launch response, if any.
fn launch_error(output: &Value) -> Option<String> {
    if let Some(status) = output.get("status") {
        let status = plain_string(status);
        if status == "success" {
            return None;
        }
        let mut error = format!("Status: {}", status);
        if let Some(message) = output.get("message") {
            error.push_str(&format!(". Message: {}", plain_string(message)));
        }
        return Some(error);
    }

    let successes = output.get("successes")?;
    let failures = output
        .get("failures")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    if failures == 0 {
        return None;
    }
    let total = failures + successes.as_array().map_or(0, Vec::len);
    Some(format!(
        "Warning: {}/{} containers failed to complete.",
        failures, total
    ))
}
