//! # xnat_rs
//! ## Before you begin
//! This library talks to the REST API of an [XNAT](https://www.xnat.org/) server. You need the server URL and an
//! account on it, either in a JSON login file or in the `XNAT_SERVER`, `XNAT_USER` and `XNAT_PASSWORD` environment
//! variables. More details in the [ConnectionConfig] documentation.
//!
//! ## Description
//! **xnat_rs** wraps the XNAT calls needed to move imaging studies from a PACS into an XNAT project and then
//! process them with container commands. It is organised around two components sharing one connection:
//!
//! 1. The [UidImporter] looks study UIDs up on the PACS, keeps the series matching a set of [Filters], submits the
//!    result for import and watches the import queue until it drains.
//! 2. The [CommandUtility] lists the sessions and usable scans of a project, resolves container command wrappers
//!    for each of them, validates the launch parameters, launches the containers and collects the outcomes.
//!
//! A [Connector] bundles both behind a single [XnatSession]. The HTTP implementation is [HttpSession]; anything
//! implementing [XnatSession] can be used instead.
//!
//! The [utils] module holds the file helpers used around these calls: [utils::write_json], [utils::json_to_csv],
//! [utils::parse_csv] and the [utils::convert_seconds] duration formatter. [local::uids_from_paths] reads study
//! UIDs from DICOM files on disk.
//!
//! ## Example
//! The following example imports two studies and runs a command on every usable scan of the project.
//! ```rust no_run
//! use std::time::Duration;
//!
//! use xnat_rs::{CommandEntry, CommandSpec, ConnectionConfig, Connector, Filters, Scope};
//!
//! #[tokio::main]
//! pub async fn main() {
//!     let config = ConnectionConfig::from_env().unwrap();
//!     let mut xnat = Connector::connect(&config, Some("demo".to_string())).unwrap();
//!
//!     let importer = xnat.importer_mut();
//!     importer.set_uids(["1.2.840.113619.2.55.3.1", "1.2.840.113619.2.55.3.2"]);
//!     importer.set_filters(Filters::from([(
//!         "seriesDescription".to_string(),
//!         vec!["Ax T1".to_string(), "Ax T2".to_string()],
//!     )]));
//!     importer.find_studies().await;
//!     if importer.import_studies().await {
//!         let outcome = importer
//!             .monitor_import_queue(Duration::from_secs(180), true)
//!             .await
//!             .unwrap();
//!         println!("Import finished: {:?}", outcome);
//!     }
//!
//!     let commands = CommandSpec::from([(
//!         Scope::Scan,
//!         CommandEntry {
//!             name: "dcm2niix".to_string(),
//!             opts: Default::default(),
//!         },
//!     )]);
//!     let utility = xnat.commands_mut();
//!     utility.find_project_experiments(None).await.unwrap();
//!     utility.run_commands(None, Some(commands)).await.unwrap();
//!     utility.save_results("results").unwrap();
//! }
//! ```

mod commands;
mod config;
mod connector;
mod error;
mod importer;
pub mod local;
mod session;
mod structs;
pub mod utils;

pub use commands::{
    get_inputs, CommandUtility, ContainerInfo, InputSpec, ProjectExperiments, Results, RunRecord,
    RunResult, Wrapper,
};
pub use config::{ConnectionConfig, JobConfig};
pub use connector::Connector;
pub use error::{ErrorKind, Result, XnatError};
pub use importer::{series_matches, UidImporter};
pub use session::{HttpSession, Payload, Wait, XnatSession};
pub use structs::{
    CommandEntry, CommandSpec, Filters, QueueOutcome, QueueStatus, QueuedSession, ScpParams, Scope,
    Studies, Study, Target, UidList,
};
