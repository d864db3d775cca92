//! Export of what a provisioning run created.
//!
//! The report is informational. Teardown never reads it back; it relies on
//! labels alone.

use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::NetworkHandle;
use crate::error::ProvisionResult;
use crate::resource::Role;

/// One started container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub index: usize,
    pub role: Role,
    pub name: String,
    pub id: Option<String>,
    pub image: String,
}

/// Summary of a provisioned network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkReport {
    pub name: String,
    pub network: Option<NetworkHandle>,
    pub generated_at: DateTime<Utc>,
    pub containers: Vec<ContainerEntry>,
}

/// Where `up --export` writes the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSink {
    Stdout,
    File(PathBuf),
}

impl ExportSink {
    /// `-` means stdout; anything else is a file path.
    pub fn parse(target: &str) -> Self {
        if target == "-" {
            ExportSink::Stdout
        } else {
            ExportSink::File(PathBuf::from(target))
        }
    }
}

impl NetworkReport {
    /// Entries sorted by role, then node index.
    pub fn sort(&mut self) {
        self.containers
            .sort_by_key(|c| (c.role != Role::TxManager, c.index));
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> ProvisionResult<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        Ok(())
    }

    pub fn export(&self, sink: &ExportSink) -> ProvisionResult<()> {
        match sink {
            ExportSink::Stdout => self.write_to(std::io::stdout().lock()),
            ExportSink::File(path) => self.write_to(std::fs::File::create(path)?),
        }
    }
}
