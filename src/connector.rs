use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    commands::CommandUtility,
    config::ConnectionConfig,
    error::Result,
    importer::UidImporter,
    session::{HttpSession, XnatSession},
};

/// One XNAT connection shared by a [UidImporter] and a [CommandUtility].
pub struct Connector {
    session: Arc<dyn XnatSession>,
    project: Option<String>,
    importer: UidImporter,
    commands: CommandUtility,
}

impl Connector {
    pub fn new(session: Arc<dyn XnatSession>, project: Option<String>) -> Self {
        Self {
            importer: UidImporter::new(session.clone(), project.clone()),
            commands: CommandUtility::new(session.clone(), project.clone()),
            session,
            project,
        }
    }

    /// Opens an HTTP session on the configured server.
    pub fn connect(config: &ConnectionConfig, project: Option<String>) -> Result<Self> {
        config.validate()?;
        let session = HttpSession::new(config)?;
        info!("Connecting to {} as {}", config.server, config.user);
        Ok(Self::new(Arc::new(session), project))
    }

    /// Sets the project of the connection and of both components.
    pub fn set_project(&mut self, project: impl Into<String>) {
        let project = project.into();
        self.importer.set_project(project.clone());
        self.commands.set_project(project.clone());
        self.project = Some(project);
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Whether the server answers an authenticated request.
    pub async fn is_connected(&self) -> bool {
        match self
            .session
            .get("/xapi/siteConfig/uptime/display", &[])
            .await
        {
            Ok(uptime) => {
                debug!("Server uptime: {}", uptime);
                true
            }
            Err(e) => {
                debug!("Connection check failed: {}", e);
                false
            }
        }
    }

    pub fn importer(&self) -> &UidImporter {
        &self.importer
    }

    pub fn importer_mut(&mut self) -> &mut UidImporter {
        &mut self.importer
    }

    pub fn commands(&self) -> &CommandUtility {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandUtility {
        &mut self.commands
    }
}
