//! Concrete providers riding on the convergence core.
//!
//! Each provider is deliberately thin: current-state inspection, a
//! requirement or two, and converge actions that either touch the
//! filesystem directly or go through the shared [`CommandRunner`].
//!
//! [`CommandRunner`]: crate::shell::CommandRunner

pub mod cron;
pub mod directory;
pub mod file;
pub mod message;
pub mod package;
pub mod service;

use std::sync::Arc;

use convergence::{Action, PlatformSupport, ProviderRegistry};

use crate::shell::CommandRunner;
use cron::CronProvider;
use directory::DirectoryProvider;
use file::FileProvider;
use message::MessageProvider;
use package::{PackageProvider, PackageTool};
use service::{ServiceManager, ServiceProvider};

/// Build the registry of built-in providers.
///
/// Platform-specific registrations precede catch-alls; the first
/// matching registration wins.
pub fn default_registry(shell: Arc<dyn CommandRunner>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    registry.register("file", PlatformSupport::All, |_| {
        Box::new(FileProvider::new())
    });
    registry.register("directory", PlatformSupport::All, |_| {
        Box::new(DirectoryProvider::new())
    });
    registry.register("message", PlatformSupport::All, |_| {
        Box::new(MessageProvider::new())
    });

    let sh = shell.clone();
    registry.register("package", PlatformSupport::only("linux"), move |_| {
        Box::new(PackageProvider::new(PackageTool::Apt, sh.clone()))
    });
    let sh = shell.clone();
    registry.register("package", PlatformSupport::only("macos"), move |_| {
        Box::new(PackageProvider::new(PackageTool::Brew, sh.clone()))
    });

    let sh = shell.clone();
    registry.register("service", PlatformSupport::only("linux"), move |_| {
        Box::new(ServiceProvider::new(ServiceManager::Systemd, sh.clone()))
    });
    let sh = shell.clone();
    registry.register("service", PlatformSupport::only("macos"), move |_| {
        Box::new(ServiceProvider::new(ServiceManager::Launchctl, sh.clone()))
    });

    registry.register("cron", PlatformSupport::All, move |_| {
        Box::new(CronProvider::new(shell.clone()))
    });

    registry
}

/// Default action for a resource type when the recipe declares none.
pub fn default_action(type_tag: &str) -> Option<Action> {
    match type_tag {
        "file" | "directory" | "cron" => Some(Action::Create),
        "message" => Some(Action::Write),
        "package" => Some(Action::Install),
        "service" => Some(Action::Start),
        _ => None,
    }
}
