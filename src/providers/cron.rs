//! Cron provider: one managed crontab entry per resource.
//!
//! Managed entries carry a marker comment so repeated runs find and
//! replace their own line without disturbing the rest of the crontab:
//!
//! ```text
//! # tend: nightly-backup
//! 0 2 * * * /usr/local/bin/backup.sh
//! ```

use anyhow::Result;
use regex::Regex;
use std::sync::Arc;

use convergence::{
    Action, ActionTable, ConvergeContext, NodeFacts, Provider, RequirementSet, Resource,
};

use crate::shell::CommandRunner;

const MARKER_PREFIX: &str = "# tend:";

pub struct CronProvider {
    shell: Arc<dyn CommandRunner>,
    crontab: String,
    current_line: Option<String>,
    current: Option<Resource>,
    handlers: ActionTable<Self>,
}

impl CronProvider {
    pub fn new(shell: Arc<dyn CommandRunner>) -> Self {
        Self {
            shell,
            crontab: String::new(),
            current_line: None,
            current: None,
            handlers: ActionTable::new()
                .on(Action::Create, Self::action_create)
                .on(Action::Delete, Self::action_delete),
        }
    }

    /// Five-field schedule from properties, each defaulting to `*`.
    fn schedule_of(resource: &Resource) -> String {
        let field = |key| resource.property_str(key).unwrap_or("*");
        format!(
            "{} {} {} {} {}",
            field("minute"),
            field("hour"),
            field("day"),
            field("month"),
            field("weekday")
        )
    }

    fn desired_line(resource: &Resource) -> Option<String> {
        let command = resource.property_str("command")?;
        Some(format!("{} {}", Self::schedule_of(resource), command))
    }

    fn write_crontab(
        &self,
        cx: &mut ConvergeContext<'_>,
        desc: String,
        text: String,
    ) -> Result<()> {
        let shell = self.shell.clone();
        cx.converge_by(desc, move || {
            shell.run_with_stdin("crontab", &["-"], &text)?;
            Ok(())
        })
    }

    fn action_create(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let name = cx.resource().name().to_string();
        // The requirement guarantees a command is present.
        let Some(desired) = Self::desired_line(cx.resource()) else {
            return Ok(());
        };

        if self.current_line.as_deref() == Some(desired.as_str()) {
            return Ok(());
        }

        let desc = format!("install cron entry for {name}");
        let text = with_entry(&self.crontab, &name, &desired);
        self.write_crontab(cx, desc, text)
    }

    fn action_delete(&mut self, cx: &mut ConvergeContext<'_>) -> Result<()> {
        if self.current_line.is_none() {
            return Ok(());
        }
        let name = cx.resource().name().to_string();
        let desc = format!("remove cron entry for {name}");
        let text = strip_entry(&self.crontab, &name);
        self.write_crontab(cx, desc, text)
    }
}

/// Find the managed entry line for `name`, if present.
fn find_entry(crontab: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r"(?m)^{} {}\r?\n(.*)$",
        regex::escape(MARKER_PREFIX),
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    re.captures(crontab)
        .map(|caps| caps[1].trim_end().to_string())
}

/// Remove the managed block (marker plus entry line) for `name`.
fn strip_entry(crontab: &str, name: &str) -> String {
    let marker = format!("{MARKER_PREFIX} {name}");
    let mut out = String::new();
    let mut lines = crontab.lines();
    while let Some(line) = lines.next() {
        if line.trim_end() == marker {
            // Drop the entry line that follows the marker too.
            lines.next();
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Replace or append the managed block for `name`.
fn with_entry(crontab: &str, name: &str, entry: &str) -> String {
    let mut out = strip_entry(crontab, name);
    out.push_str(&format!("{MARKER_PREFIX} {name}\n{entry}\n"));
    out
}

impl Provider for CronProvider {
    fn name(&self) -> &'static str {
        "cron"
    }

    fn whyrun_supported(&self) -> bool {
        true
    }

    fn load_current_resource(&mut self, resource: &Resource, _node: &NodeFacts) -> Result<()> {
        // `crontab -l` fails when the user has no crontab yet; treat
        // that as empty.
        self.crontab = if self.shell.command_exists("crontab") {
            let listing = self.shell.run("crontab", &["-l"])?;
            if listing.success {
                listing.stdout_str()
            } else {
                String::new()
            }
        } else {
            String::new()
        };

        self.current_line = find_entry(&self.crontab, resource.name());

        let mut current = Resource::new("cron", resource.name());
        current.set_property("exists", self.current_line.is_some());
        if let Some(line) = &self.current_line {
            current.set_property("entry", line.clone());
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
        let available = self.shell.command_exists("crontab");
        requirements
            .assert_all_actions()
            .assertion(move || available)
            .failure_message("crontab is not available on this system")
            .whyrun("crontab not found; would be unable to manage cron entries")
            .block_action();

        let has_command = resource.property_str("command").is_some();
        requirements
            .assert(&[Action::Create])
            .assertion(move || has_command)
            .failure_message(format!(
                "cron entry {} declares no `command` property",
                resource.name()
            ));
    }

    fn run_handler(&mut self, action: Action, cx: &mut ConvergeContext<'_>) -> Result<()> {
        let handler = self.handlers.lookup(self.name(), action)?;
        handler(self, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::CommandOutput;
    use convergence::{run_action, Outcome, ProviderRegistry, RunContext};
    use std::sync::Mutex;

    #[test]
    fn test_find_entry() {
        let crontab = "MAILTO=ops\n# tend: backup\n0 2 * * * /bin/backup\n# unrelated\n";
        assert_eq!(
            find_entry(crontab, "backup").as_deref(),
            Some("0 2 * * * /bin/backup")
        );
        assert_eq!(find_entry(crontab, "missing"), None);
    }

    #[test]
    fn test_strip_and_with_entry_preserve_other_lines() {
        let crontab = "MAILTO=ops\n# tend: backup\n0 2 * * * /bin/backup\n* * * * * /bin/beat\n";

        let stripped = strip_entry(crontab, "backup");
        assert_eq!(stripped, "MAILTO=ops\n* * * * * /bin/beat\n");

        let replaced = with_entry(crontab, "backup", "30 3 * * * /bin/backup");
        assert_eq!(
            replaced,
            "MAILTO=ops\n* * * * * /bin/beat\n# tend: backup\n30 3 * * * /bin/backup\n"
        );
    }

    struct ScriptedShell {
        crontab: String,
        written: Mutex<Option<String>>,
    }

    impl ScriptedShell {
        fn new(crontab: &str) -> Arc<Self> {
            Arc::new(Self {
                crontab: crontab.to_string(),
                written: Mutex::new(None),
            })
        }

        fn written(&self) -> Option<String> {
            self.written.lock().unwrap().clone()
        }
    }

    impl CommandRunner for ScriptedShell {
        fn run(&self, cmd: &str, args: &[&str]) -> Result<CommandOutput> {
            let success = match (cmd, args.first().copied()) {
                ("which", _) => true,
                ("crontab", Some("-l")) => !self.crontab.is_empty(),
                _ => true,
            };
            Ok(CommandOutput {
                stdout: self.crontab.clone().into_bytes(),
                stderr: Vec::new(),
                success,
            })
        }

        fn run_with_stdin(&self, _cmd: &str, _args: &[&str], input: &str) -> Result<CommandOutput> {
            *self.written.lock().unwrap() = Some(input.to_string());
            Ok(CommandOutput {
                stdout: Vec::new(),
                stderr: Vec::new(),
                success: true,
            })
        }
    }

    fn cron_resource(name: &str, command: &str) -> Resource {
        let mut resource = Resource::new("cron", name);
        resource.set_property("command", command);
        resource
    }

    fn converge(
        shell: Arc<ScriptedShell>,
        resource: &mut Resource,
        action: Action,
    ) -> Result<Outcome> {
        let mut provider = CronProvider::new(shell);
        let mut run = RunContext::new(NodeFacts::local());
        let registry = ProviderRegistry::new();
        run_action(&mut provider, resource, action, &mut run, &registry)
    }

    #[test]
    fn test_create_installs_entry() {
        let shell = ScriptedShell::new("");
        let mut resource = cron_resource("backup", "/bin/backup");
        resource.set_property("minute", "0");
        resource.set_property("hour", "2");

        assert_eq!(
            converge(shell.clone(), &mut resource, Action::Create).unwrap(),
            Outcome::Updated
        );
        assert_eq!(
            shell.written().unwrap(),
            "# tend: backup\n0 2 * * * /bin/backup\n"
        );
    }

    #[test]
    fn test_create_matching_entry_is_noop() {
        let shell = ScriptedShell::new("# tend: backup\n0 2 * * * /bin/backup\n");
        let mut resource = cron_resource("backup", "/bin/backup");
        resource.set_property("minute", "0");
        resource.set_property("hour", "2");

        assert_eq!(
            converge(shell.clone(), &mut resource, Action::Create).unwrap(),
            Outcome::UpToDate
        );
        assert!(shell.written().is_none());
    }

    #[test]
    fn test_create_replaces_divergent_entry() {
        let shell = ScriptedShell::new("# tend: backup\n0 2 * * * /bin/backup\n");
        let mut resource = cron_resource("backup", "/bin/backup");
        resource.set_property("minute", "30");
        resource.set_property("hour", "3");

        assert_eq!(
            converge(shell.clone(), &mut resource, Action::Create).unwrap(),
            Outcome::Updated
        );
        assert_eq!(
            shell.written().unwrap(),
            "# tend: backup\n30 3 * * * /bin/backup\n"
        );
    }

    #[test]
    fn test_delete_removes_only_the_managed_block() {
        let shell =
            ScriptedShell::new("MAILTO=ops\n# tend: backup\n0 2 * * * /bin/backup\n");
        let mut resource = Resource::new("cron", "backup");

        assert_eq!(
            converge(shell.clone(), &mut resource, Action::Delete).unwrap(),
            Outcome::Updated
        );
        assert_eq!(shell.written().unwrap(), "MAILTO=ops\n");
    }

    #[test]
    fn test_create_without_command_fails() {
        let shell = ScriptedShell::new("");
        let mut resource = Resource::new("cron", "broken");
        let err = converge(shell, &mut resource, Action::Create).unwrap_err();
        assert!(err.to_string().contains("command"));
    }
}
