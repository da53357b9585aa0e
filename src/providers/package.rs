//! Package provider: system packages through the platform's tool.

use anyhow::Result;
use std::sync::Arc;

use convergence::{
    Action, ActionTable, ConvergeContext, NodeFacts, Provider, RequirementSet, Resource,
};

use crate::shell::CommandRunner;

/// Package manager the provider drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageTool {
    Apt,
    Brew,
}

impl PackageTool {
    pub fn binary(self) -> &'static str {
        match self {
            Self::Apt => "apt-get",
            Self::Brew => "brew",
        }
    }

    fn query(self, package: &str) -> (&'static str, Vec<String>) {
        match self {
            Self::Apt => (
                "dpkg-query",
                vec!["-W".into(), "-f=${Status}".into(), package.into()],
            ),
            Self::Brew => (
                "brew",
                vec!["list".into(), "--versions".into(), package.into()],
            ),
        }
    }

    fn install(self, package: &str) -> (&'static str, Vec<String>) {
        match self {
            Self::Apt => (
                "apt-get",
                vec!["install".into(), "-y".into(), package.into()],
            ),
            Self::Brew => ("brew", vec!["install".into(), package.into()]),
        }
    }

    fn remove(self, package: &str) -> (&'static str, Vec<String>) {
        match self {
            Self::Apt => ("apt-get", vec!["remove".into(), "-y".into(), package.into()]),
            Self::Brew => ("brew", vec!["uninstall".into(), package.into()]),
        }
    }

    fn upgrade(self, package: &str) -> (&'static str, Vec<String>) {
        match self {
            Self::Apt => (
                "apt-get",
                vec![
                    "install".into(),
                    "-y".into(),
                    "--only-upgrade".into(),
                    package.into(),
                ],
            ),
            Self::Brew => ("brew", vec!["upgrade".into(), package.into()]),
        }
    }
}

pub struct PackageProvider {
    tool: PackageTool,
    shell: Arc<dyn CommandRunner>,
    current: Option<Resource>,
    handlers: ActionTable<Self>,
}

impl PackageProvider {
    pub fn new(tool: PackageTool, shell: Arc<dyn CommandRunner>) -> Self {
        Self {
            tool,
            shell,
            current: None,
            handlers: ActionTable::new()
                .on(Action::Install, Self::action_install)
                .on(Action::Remove, Self::action_remove)
                .on(Action::Upgrade, Self::action_upgrade),
        }
    }

    /// Package to manage: the `package` property, or the resource name.
    fn package_of(resource: &Resource) -> String {
        resource
            .property_str("package")
            .unwrap_or_else(|| resource.name())
            .to_string()
    }

    fn installed(&self) -> bool {
        self.current
            .as_ref()
            .and_then(|c| c.property_bool("installed"))
            .unwrap_or(false)
    }

    fn run_tool(
        &self,
        cx: &mut ConvergeContext<'_>,
        desc: String,
        (cmd, args): (&'static str, Vec<String>),
    ) -> Result<()> {
        let shell = self.shell.clone();
        cx.converge_by(desc, move || {
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            shell.run_capture(cmd, &refs)?;
            Ok(())
        })
    }

    fn action_install(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.installed() {
            return Ok(());
        }
        let package = Self::package_of(cx.resource());
        let desc = format!("install package {package} via {}", self.tool.binary());
        let invocation = self.tool.install(&package);
        self.run_tool(cx, desc, invocation)
    }

    fn action_remove(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if !self.installed() {
            return Ok(());
        }
        let package = Self::package_of(cx.resource());
        let desc = format!("remove package {package} via {}", self.tool.binary());
        let invocation = self.tool.remove(&package);
        self.run_tool(cx, desc, invocation)
    }

    fn action_upgrade(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let package = Self::package_of(cx.resource());
        let (desc, invocation) = if self.installed() {
            (
                format!("upgrade package {package} via {}", self.tool.binary()),
                self.tool.upgrade(&package),
            )
        } else {
            (
                format!("install package {package} via {}", self.tool.binary()),
                self.tool.install(&package),
            )
        };
        self.run_tool(cx, desc, invocation)
    }
}

impl Provider for PackageProvider {
    fn name(&self) -> &'static str {
        "package"
    }

    fn whyrun_supported(&self) -> bool {
        true
    }

    fn load_current_resource(&mut self, resource: &Resource, _node: &NodeFacts) -> Result<()> {
        let package = Self::package_of(resource);
        let mut current = Resource::new("package", resource.name());

        // With the tool missing there is nothing to query; leave the
        // reporting to the requirement set.
        if self.shell.command_exists(self.tool.binary()) {
            let (cmd, args) = self.tool.query(&package);
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let output = self.shell.run(cmd, &refs)?;
            let installed = match self.tool {
                PackageTool::Apt => {
                    output.success && output.stdout_str().contains("install ok installed")
                }
                PackageTool::Brew => output.success,
            };
            current.set_property("installed", installed);
        } else {
            current.set_property("installed", false);
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
        _resource: &Resource,
    ) {
        let binary = self.tool.binary();
        let available = self.shell.command_exists(binary);

        requirements
            .assert_all_actions()
            .assertion(move || available)
            .failure_message(format!("{binary} is not available on this system"))
            .whyrun(format!(
                "{binary} not found; would be unable to manage packages"
            ))
            .block_action();
    }

    fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let handler = self.handlers.lookup(self.name(), action)?;
        handler(self, cx)
    }
}
