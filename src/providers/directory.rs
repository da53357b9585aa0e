//! Directory provider.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use convergence::{
    Action, ActionTable, ConvergeContext, NodeFacts, Provider, RequirementSet, Resource,
};

/// Manages a directory, creating intermediate components as needed.
pub struct DirectoryProvider {
    current: Option<Resource>,
    handlers: ActionTable<Self>,
}

impl DirectoryProvider {
    pub fn new() -> Self {
        Self {
            current: None,
            handlers: ActionTable::new()
                .on(Action::Create, Self::action_create)
                .on(Action::Delete, Self::action_delete),
        }
    }

    fn path_of(resource: &Resource) -> PathBuf {
        let raw = resource.property_str("path").unwrap_or_else(|| resource.name());
        PathBuf::from(shellexpand::tilde(raw).into_owned())
    }

    fn exists(&self) -> bool {
        self.current
            .as_ref()
            .and_then(|c| c.property_bool("exists"))
            .unwrap_or(false)
    }

    fn action_create(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.exists() {
            return Ok(());
        }
        let path = Self::path_of(cx.resource());
        let desc = format!("create directory {}", path.display());
        cx.converge_by(desc, move || {
            fs::create_dir_all(&path)
                .with_context(|| format!("failed to create {}", path.display()))
        })
    }

    fn action_delete(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if !self.exists() {
            return Ok(());
        }
        let path = Self::path_of(cx.resource());
        let desc = format!("delete directory {}", path.display());
        cx.converge_by(desc, move || {
            fs::remove_dir_all(&path)
                .with_context(|| format!("failed to delete {}", path.display()))
        })
    }
}

impl Default for DirectoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for DirectoryProvider {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn whyrun_supported(&self) -> bool {
        true
    }

    fn load_current_resource(&mut self, resource: &Resource, _node: &NodeFacts) -> Result<()> {
        let path = Self::path_of(resource);
        let mut current = Resource::new("directory", resource.name());
        current.set_property("exists", path.is_dir());
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
        // A plain file squatting on the target path cannot be converged
        // into a directory.
        let path = Self::path_of(resource);
        let not_a_file = !path.is_file();

        requirements
            .assert(&[Action::Create])
            .assertion(move || not_a_file)
            .failure_message(format!(
                "{} exists and is not a directory",
                path.display()
            ))
            .whyrun("path is occupied by a file; manual cleanup would be required");
    }

    fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let handler = self.handlers.lookup(self.name(), action)?;
        handler(self, cx)
    }
}
