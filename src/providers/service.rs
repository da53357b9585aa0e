//! Service provider: system services via systemd or launchd.

use anyhow::Result;
use std::sync::Arc;

use convergence::{
    Action, ActionTable, ConvergeContext, NodeFacts, Provider, RequirementSet, Resource,
};

use crate::shell::CommandRunner;

/// Service manager the provider drives.
///
/// Launchd has no enable/disable counterpart here, so those handlers
/// are only registered for systemd; requesting them elsewhere is a
/// checked unsupported-action error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceManager {
    Systemd,
    Launchctl,
}

impl ServiceManager {
    pub fn binary(self) -> &'static str {
        match self {
            Self::Systemd => "systemctl",
            Self::Launchctl => "launchctl",
        }
    }
}

pub struct ServiceProvider {
    manager: ServiceManager,
    shell: Arc<dyn CommandRunner>,
    current: Option<Resource>,
    handlers: ActionTable<Self>,
}

impl ServiceProvider {
    pub fn new(manager: ServiceManager, shell: Arc<dyn CommandRunner>) -> Self {
        let mut handlers = ActionTable::new()
            .on(Action::Start, Self::action_start)
            .on(Action::Stop, Self::action_stop)
            .on(Action::Restart, Self::action_restart);
        if manager == ServiceManager::Systemd {
            handlers = handlers
                .on(Action::Enable, Self::action_enable)
                .on(Action::Disable, Self::action_disable);
        }
        Self {
            manager,
            shell,
            current: None,
            handlers,
        }
    }

    fn service_of(resource: &Resource) -> String {
        resource
            .property_str("service")
            .unwrap_or_else(|| resource.name())
            .to_string()
    }

    fn state(&self, key: &str) -> bool {
        self.current
            .as_ref()
            .and_then(|c| c.property_bool(key))
            .unwrap_or(false)
    }

    fn control(
        &self,
        cx: &mut ConvergeContext<'_>,
        verb: &'static str,
        service: String,
    ) -> Result<()> {
        let shell = self.shell.clone();
        let binary = self.manager.binary();
        let desc = format!("{verb} service {service}");
        cx.converge_by(desc, move || {
            shell.run_capture(binary, &[verb, &service])?;
            Ok(())
        })
    }

    fn action_start(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.state("running") {
            return Ok(());
        }
        let service = Self::service_of(cx.resource());
        self.control(cx, "start", service)
    }

    fn action_stop(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if !self.state("running") {
            return Ok(());
        }
        let service = Self::service_of(cx.resource());
        self.control(cx, "stop", service)
    }

    // Restart is inherently a mutation; it converges every run.
    fn action_restart(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let service = Self::service_of(cx.resource());
        self.control(cx, "restart", service)
    }

    fn action_enable(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.state("enabled") {
            return Ok(());
        }
        let service = Self::service_of(cx.resource());
        self.control(cx, "enable", service)
    }

    fn action_disable(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if !self.state("enabled") {
            return Ok(());
        }
        let service = Self::service_of(cx.resource());
        self.control(cx, "disable", service)
    }
}

impl Provider for ServiceProvider {
    fn name(&self) -> &'static str {
        "service"
    }

    fn whyrun_supported(&self) -> bool {
        true
    }

    fn load_current_resource(&mut self, resource: &Resource, _node: &NodeFacts) -> Result<()> {
        let service = Self::service_of(resource);
        let mut current = Resource::new("service", resource.name());

        if self.shell.command_exists(self.manager.binary()) {
            match self.manager {
                ServiceManager::Systemd => {
                    let running = self
                        .shell
                        .run_status("systemctl", &["is-active", "--quiet", &service])?;
                    let enabled = self
                        .shell
                        .run_status("systemctl", &["is-enabled", "--quiet", &service])?;
                    current.set_property("running", running);
                    current.set_property("enabled", enabled);
                }
                ServiceManager::Launchctl => {
                    let running = self.shell.run_status("launchctl", &["list", &service])?;
                    current.set_property("running", running);
                }
            }
        } else {
            current.set_property("running", false);
            current.set_property("enabled", false);
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
        let binary = self.manager.binary();
        let available = self.shell.command_exists(binary);

        requirements
            .assert_all_actions()
            .assertion(move || available)
            .failure_message(format!("{binary} is not available on this system"))
            .whyrun(format!(
                "{binary} not found; would be unable to manage services"
            ))
            .block_action();
    }

    fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let handler = self.handlers.lookup(self.name(), action)?;
        handler(self, cx)
    }
}
