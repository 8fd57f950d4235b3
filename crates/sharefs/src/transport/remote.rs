use std::path::Path;

use async_trait::async_trait;
use diagnostics::{log_debug, log_error};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::transport::LocationTransport;

/// Placeholder for the locally staged source path.
pub const SRC_PATH_PATTERN: &str = "%srcpath%";
/// Placeholder for the destination path on the target machine.
pub const DST_PATH_PATTERN: &str = "%dstpath%";
/// Placeholder for the destination machine name.
pub const DST_MACHINE_PATTERN: &str = "%dstmach%";

pub const CP_TEMPLATE_KEY: &str = "sharefs.remote.cp";
pub const RM_TEMPLATE_KEY: &str = "sharefs.remote.rm";
pub const MKDIR_TEMPLATE_KEY: &str = "sharefs.remote.mkdir";

/// Transport for locations reachable only via remote command execution.
///
/// Built from three command templates (copy, remove, mkdir). Each operation
/// substitutes the literal source/destination values into its template and
/// runs the result through `sh -c`; a non-zero exit (or signal termination)
/// is an error carrying the rendered command.
///
/// `lock_file` and `release` are no-ops: this transport provides **no
/// cross-machine mutual exclusion**. Callers must not rely on `lock` for
/// correctness when the remote transport is in use.
///
/// The `overwrite` flag on `copy_file` cannot be honored: existence on the
/// remote machine is not observable here, so the copy command always runs.
pub struct RemoteTransport {
    cp_template: String,
    rm_template: String,
    mkdir_template: String,
}

impl RemoteTransport {
    /// Validates that every template is present and contains its mandatory
    /// placeholders, failing fast with a configuration error otherwise.
    pub fn new(cp_template: &str, rm_template: &str, mkdir_template: &str) -> Result<Self> {
        validate_template(
            "cp",
            cp_template,
            &[SRC_PATH_PATTERN, DST_PATH_PATTERN, DST_MACHINE_PATTERN],
        )?;
        validate_template("rm", rm_template, &[DST_PATH_PATTERN, DST_MACHINE_PATTERN])?;
        validate_template(
            "mkdir",
            mkdir_template,
            &[DST_PATH_PATTERN, DST_MACHINE_PATTERN],
        )?;
        Ok(RemoteTransport {
            cp_template: cp_template.to_string(),
            rm_template: rm_template.to_string(),
            mkdir_template: mkdir_template.to_string(),
        })
    }

    /// Reads the three `sharefs.remote.*` template keys.
    pub fn from_config(config: &Config) -> Result<Self> {
        let get = |key: &str| {
            config
                .get(key)
                .ok_or_else(|| Error::config(format!("remote transport requires '{key}'")))
        };
        RemoteTransport::new(
            get(CP_TEMPLATE_KEY)?,
            get(RM_TEMPLATE_KEY)?,
            get(MKDIR_TEMPLATE_KEY)?,
        )
    }

    async fn run(&self, command: String) -> Result<()> {
        log_debug!("running remote command {command}", command: command.as_str());
        let status = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command)
            .status()
            .await?;
        if !status.success() {
            log_error!("remote command failed {command}", command: command.as_str());
            return Err(Error::CommandFailed { command, status });
        }
        Ok(())
    }
}

fn validate_template(name: &str, template: &str, required: &[&str]) -> Result<()> {
    for pattern in required {
        if !template.contains(pattern) {
            return Err(Error::config(format!(
                "remote {name} template '{template}' is missing {pattern}"
            )));
        }
    }
    Ok(())
}

fn render(template: &str, machine: Option<&str>, src: Option<&Path>, dst: &Path) -> String {
    let mut command = template.replace(DST_PATH_PATTERN, &dst.display().to_string());
    command = command.replace(DST_MACHINE_PATTERN, machine.unwrap_or(""));
    if let Some(src) = src {
        command = command.replace(SRC_PATH_PATTERN, &src.display().to_string());
    }
    command
}

#[async_trait]
impl LocationTransport for RemoteTransport {
    async fn copy_file(
        &self,
        machine: Option<&str>,
        location: &Path,
        rel: &Path,
        src: &Path,
        _overwrite: bool,
    ) -> Result<()> {
        let dst = location.join(rel);
        if let Some(parent) = dst.parent() {
            self.run(render(&self.mkdir_template, machine, None, parent))
                .await?;
        }
        self.run(render(&self.cp_template, machine, Some(src), &dst))
            .await
    }

    async fn delete_file(&self, machine: Option<&str>, location: &Path, rel: &Path) -> Result<()> {
        self.run(render(&self.rm_template, machine, None, &location.join(rel)))
            .await
    }

    async fn rename_file(
        &self,
        machine: Option<&str>,
        location: &Path,
        src_rel: &Path,
        dst_rel: &Path,
        staged: &Path,
    ) -> Result<()> {
        // No remote rename primitive: re-copy the locally resolved bytes to
        // the new name, then remove the old one.
        self.copy_file(machine, location, dst_rel, staged, true)
            .await?;
        self.delete_file(machine, location, src_rel).await
    }

    async fn lock_file(
        &self,
        _machine: Option<&str>,
        _location: &Path,
        _rel: &Path,
        _exclusive: bool,
    ) -> Result<()> {
        // No cross-machine locking mechanism.
        Ok(())
    }

    async fn release(&self, _machine: Option<&str>, _location: &Path, _rel: &Path) -> Result<()> {
        Ok(())
    }
}
