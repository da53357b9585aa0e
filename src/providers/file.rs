//! File provider: presence and content of a single file.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use convergence::{
    Action, ActionTable, ConvergeContext, NodeFacts, Provider, RequirementSet, Resource,
};

/// Manages one file: its existence and, optionally, its content.
///
/// Content comparison goes through a checksum so converging a large
/// unchanged file never rewrites it.
pub struct FileProvider {
    current: Option<Resource>,
    handlers: ActionTable<Self>,
}

impl FileProvider {
    pub fn new() -> Self {
        Self {
            current: None,
            handlers: ActionTable::new()
                .on(Action::Create, Self::action_create)
                .on(Action::Delete, Self::action_delete)
                .on(Action::Touch, Self::action_touch),
        }
    }

    /// Target path: the `path` property, or the resource name itself.
    fn path_of(resource: &Resource) -> PathBuf {
        let raw = resource.property_str("path").unwrap_or_else(|| resource.name());
        PathBuf::from(shellexpand::tilde(raw).into_owned())
    }

    fn checksum(bytes: &[u8]) -> String {
        blake3::hash(bytes).to_hex().to_string()
    }

    fn exists(&self) -> bool {
        self.current
            .as_ref()
            .and_then(|c| c.property_bool("exists"))
            .unwrap_or(false)
    }

    fn current_checksum(&self) -> Option<&str> {
        self.current.as_ref().and_then(|c| c.property_str("checksum"))
    }

    fn action_create(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let path = Self::path_of(cx.resource());
        let content = cx.resource().property_str("content").map(str::to_owned);

        if !self.exists() {
            let desc = format!("create file {}", path.display());
            let body = content.unwrap_or_default();
            cx.converge_by(desc, move || write_file(&path, body.as_bytes()))?;
        } else if let Some(body) = content {
            if self.current_checksum() != Some(Self::checksum(body.as_bytes()).as_str()) {
                let desc = format!("rewrite content of {}", path.display());
                cx.converge_by(desc, move || write_file(&path, body.as_bytes()))?;
            }
        }
        Ok(())
    }

    fn action_delete(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if !self.exists() {
            return Ok(());
        }
        let path = Self::path_of(cx.resource());
        let desc = format!("delete file {}", path.display());
        cx.converge_by(desc, move || {
            fs::remove_file(&path)
                .with_context(|| format!("failed to delete {}", path.display()))
        })
    }

    fn action_touch(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let path = Self::path_of(cx.resource());
        if self.exists() {
            let desc = format!("update modification time of {}", path.display());
            cx.converge_by(desc, move || {
                let file = fs::File::options()
                    .append(true)
                    .open(&path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                file.set_modified(SystemTime::now())
                    .with_context(|| format!("failed to touch {}", path.display()))
            })
        } else {
            let desc = format!("create file {}", path.display());
            cx.converge_by(desc, move || write_file(&path, b""))
        }
    }
}

fn write_file(path: &Path, body: &[u8]) -> Result<()> {
    fs::write(path, body).with_context(|| format!("failed to write {}", path.display()))
}

impl Default for FileProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for FileProvider {
    fn name(&self) -> &'static str {
        "file"
    }

    fn whyrun_supported(&self) -> bool {
        true
    }

    fn load_current_resource(&mut self, resource: &Resource, _node: &NodeFacts) -> Result<()> {
        let path = Self::path_of(resource);
        let mut current = Resource::new("file", resource.name());

        if path.is_file() {
            current.set_property("exists", true);
            let bytes = fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            current.set_property("checksum", Self::checksum(&bytes));
        } else {
            current.set_property("exists", false);
        }

        self.current = Some(current);
        Ok(())
    }

    fn current_resource(&self) -> Option<&Resource> {
        self.current.as_ref()
    }

    fn define_resource_requirements(
        &mut self,
        _action: Action,
        requirements: &mut RequirementSet,
        resource: &Resource,
    ) {
        let path = Self::path_of(resource);
        let parent_ok = path
            .parent()
            .map(|p| p.as_os_str().is_empty() || p.is_dir())
            .unwrap_or(true);

        requirements
            .assert(&[Action::Create, Action::Touch])
            .assertion(move || parent_ok)
            .failure_message(format!(
                "parent directory of {} does not exist",
                path.display()
            ))
            .whyrun("parent directory is missing; assuming it would have been created upstream");
    }

    fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let handler = self.handlers.lookup(self.name(), action)?;
        handler(self, cx)
    }
}
