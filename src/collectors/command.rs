use crate::collectors::Controller;
use crate::domain::{DiskDriveStats, Presentation, StoragePool, VirtualDisk, VirtualDiskStats};
use anyhow::{Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::process::Command;

#[derive(Debug, Deserialize)]
struct ControllerInfo {
    fw_release: String,
}

/// Controller reached through an external query program.
///
/// The program is invoked as `<program> <args..> <object> --host <address>`
/// and must print a JSON array of records for `object` on stdout.
pub struct CommandController {
    host: String,
    program: String,
    args: Vec<String>,
    user: Option<String>,
    password: Option<String>,
}

impl CommandController {
    pub fn new(host: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            program: program.into(),
            args: Vec::new(),
            user: None,
            password: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_credentials(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.user = user;
        self.password = password;
        self
    }

    fn run_query(&self, object: &str) -> Result<String> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(object)
            .arg("--host")
            .arg(&self.host);
        if let Some(ref user) = self.user {
            command.env("SFA_USER", user);
        }
        if let Some(ref password) = self.password {
            command.env("SFA_PASSWORD", password);
        }

        let output = command
            .output()
            .with_context(|| format!("Failed to execute {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {} exited with {}: {}",
                self.program,
                object,
                output.status,
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("Failed to parse {} output as UTF-8", self.program))
    }

    fn query<T: DeserializeOwned>(&self, object: &str) -> Result<Vec<T>> {
        let stdout = self.run_query(object)?;
        let records = parse_records(&stdout)
            .with_context(|| format!("Failed to decode {} records from {}", object, self.host))?;
        debug!("{}: fetched {} {} records", self.host, records.len(), object);
        Ok(records)
    }
}

pub fn parse_records<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>> {
    Ok(serde_json::from_str(raw.trim())?)
}

impl Controller for CommandController {
    fn host(&self) -> &str {
        &self.host
    }

    fn firmware_version(&mut self) -> Result<String> {
        let controllers: Vec<ControllerInfo> = self.query("controller")?;
        controllers
            .into_iter()
            .next()
            .map(|c| c.fw_release)
            .with_context(|| format!("{} reported no controllers", self.host))
    }

    fn virtual_disk_stats(&mut self) -> Result<Vec<VirtualDiskStats>> {
        self.query("vd-stats")
    }

    fn disk_drive_stats(&mut self) -> Result<Vec<DiskDriveStats>> {
        self.query("dd-stats")
    }

    fn presentations(&mut self) -> Result<Vec<Presentation>> {
        self.query("presentations")
    }

    fn storage_pools(&mut self) -> Result<Vec<StoragePool>> {
        self.query("pools")
    }

    fn virtual_disks(&mut self) -> Result<Vec<VirtualDisk>> {
        self.query("virtual-disks")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoolState;

    #[test]
    fn parses_presentation_records() {
        let raw = r#"
            [{"virtual_disk_index": 3, "logical_unit_number": 0},
             {"virtual_disk_index": 9, "logical_unit_number": 1}]
        "#;
        let records: Vec<Presentation> = parse_records(raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].virtual_disk_index, 9);
    }

    #[test]
    fn parses_pool_state_as_raw_code() {
        let raw = r#"[{"pool_index": 0, "pool_state": 2}]"#;
        let pools: Vec<StoragePool> = parse_records(raw).unwrap();
        assert_eq!(pools[0].pool_state, PoolState(2));
    }

    #[test]
    fn rejects_non_array_output() {
        let result: Result<Vec<VirtualDisk>> = parse_records("error: not logged in");
        assert!(result.is_err());
    }

    #[test]
    fn missing_program_is_a_fetch_error() {
        let mut controller = CommandController::new("sfa-a", "/nonexistent/sfa-query");
        assert!(controller.virtual_disk_stats().is_err());
    }
}
