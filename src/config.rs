use std::{env, fmt, fs, path::Path, path::PathBuf};

use serde::Deserialize;

use crate::{
    error::{Result, XnatError},
    structs::{CommandSpec, Filters, UidList},
};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Address and credentials of an XNAT server.
///
/// Either read from a JSON login file:
///
/// ```json
/// { "server": "https://xnat.example.org", "user": "admin", "password": "admin" }
/// ```
///
/// or from the `XNAT_SERVER`, `XNAT_USER`, `XNAT_PASSWORD` and (optional)
/// `XNAT_TIMEOUT` environment variables.
#[derive(Deserialize, Clone, Default)]
pub struct ConnectionConfig {
    pub server: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("server", &self.server)
            .field("user", &self.user)
            .field("password", &"********")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ConnectionConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| XnatError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| XnatError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Reads the connection from the environment. A missing variable is left
    /// empty so that command line flags can fill the gap.
    pub fn from_env() -> Result<Self> {
        let timeout_secs = match env::var("XNAT_TIMEOUT") {
            Ok(value) => value.parse().map_err(|_| {
                XnatError::Config(format!("XNAT_TIMEOUT is not a number of seconds: {}", value))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        Ok(Self {
            server: env::var("XNAT_SERVER").unwrap_or_default(),
            user: env::var("XNAT_USER").unwrap_or_default(),
            password: env::var("XNAT_PASSWORD").unwrap_or_default(),
            timeout_secs,
        })
    }

    /// Replaces every field for which an override is given.
    pub fn with_overrides(
        mut self,
        server: Option<String>,
        user: Option<String>,
        password: Option<String>,
    ) -> Self {
        if let Some(server) = server {
            self.server = server;
        }
        if let Some(user) = user {
            self.user = user;
        }
        if let Some(password) = password {
            self.password = password;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(XnatError::Config(
                "No XNAT server provided (use --server or XNAT_SERVER).".to_string(),
            ));
        }
        if self.user.is_empty() {
            return Err(XnatError::Config(
                "No XNAT user provided (use --user or XNAT_USER).".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything a run of the `xnat_rs` binary needs besides the connection.
#[derive(Deserialize, Debug, Clone)]
pub struct JobConfig {
    pub project: String,
    #[serde(default)]
    pub uids: UidList,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub commands: CommandSpec,
    #[serde(default = "default_results_file")]
    pub results_file: String,
    #[serde(default = "default_results_csv")]
    pub results_csv: String,
    /// Project resource folder holding the JSON files to collect.
    #[serde(default)]
    pub resource: Option<String>,
    /// Extra CSV headers looked up inside nested values.
    #[serde(default)]
    pub csv_keys: Vec<String>,
    /// Queue monitor timeout in seconds.
    #[serde(default = "default_queue_timeout")]
    pub timeout: u64,
    #[serde(default = "default_true")]
    pub refresh_on_change: bool,
    /// Directory of local DICOM files whose study UIDs are added to `uids`.
    #[serde(default)]
    pub dicom_dir: Option<PathBuf>,
    #[serde(default)]
    pub recursive: bool,
}

fn default_results_file() -> String {
    "results.json".to_string()
}

fn default_results_csv() -> String {
    "results.csv".to_string()
}

fn default_queue_timeout() -> u64 {
    180
}

fn default_true() -> bool {
    true
}

impl JobConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| XnatError::io(path, e))?;
        let job: JobConfig = serde_json::from_str(&text)
            .map_err(|e| XnatError::Config(format!("{}: {}", path.display(), e)))?;
        if job.project.is_empty() {
            return Err(XnatError::Config(format!(
                "{}: project must not be empty",
                path.display()
            )));
        }
        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Scope;
    use std::io::Write;

    #[test]
    fn test_connection_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": "https://xnat.example.org", "user": "admin", "password": "pw"}}"#
        )
        .unwrap();

        let config = ConnectionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server, "https://xnat.example.org");
        assert_eq!(config.user, "admin");
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(!format!("{:?}", config).contains("pw"));
    }

    #[test]
    fn test_overrides_and_validation() {
        let config = ConnectionConfig::default();
        assert!(config.validate().is_err());

        let config = config.with_overrides(
            Some("https://xnat.example.org".to_string()),
            Some("admin".to_string()),
            None,
        );
        assert!(config.validate().is_ok());
        assert!(config.password.is_empty());
    }

    #[test]
    fn test_job_defaults_and_commands() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "project": "demo",
                "uids": "1.2.840.1",
                "filters": {{"seriesDescription": ["Ax T1", "Ax T2"]}},
                "commands": {{
                    "scan": {{"name": "dcm2niix", "opts": {{"bids": true}}}},
                    "project": {{"name": "bids-mriqc", "opts": {{"flags": ""}}}}
                }},
                "csv_keys": ["subject_id"]
            }}"#
        )
        .unwrap();

        let job = JobConfig::from_file(file.path()).unwrap();
        assert_eq!(job.project, "demo");
        assert_eq!(job.uids.as_slice(), ["1.2.840.1".to_string()]);
        assert_eq!(job.filters["seriesDescription"], vec!["Ax T1", "Ax T2"]);
        assert_eq!(job.commands[&Scope::Scan].name, "dcm2niix");
        assert!(!job.commands.contains_key(&Scope::Session));
        assert_eq!(job.timeout, 180);
        assert!(job.refresh_on_change);
        assert_eq!(job.results_file, "results.json");
    }

    #[test]
    fn test_job_without_project_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"project": ""}}"#).unwrap();
        let err = JobConfig::from_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }
}
