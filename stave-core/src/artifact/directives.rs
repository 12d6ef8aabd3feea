// stave-core/src/artifact/directives.rs
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use stave_common::config::Config;
use stave_common::error::{Result, StaveError};
use stave_common::model::cask::{Cask, RawStanza, StringOrVec};
use tracing::{debug, error, warn};

use super::{helpers, normalize_entries, warn_unknown_keys, PhaseOptions};

lazy_static! {
    static ref VALID_PKGID_RE: Regex = Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap();
    static ref VALID_LABEL_RE: Regex = Regex::new(r"^[a-zA-Z0-9._-]+$").unwrap();
    static ref VALID_SCRIPT_PATH_RE: Regex = Regex::new(r"^[a-zA-Z0-9/._-]+$").unwrap();
    static ref VALID_SIGNAL_RE: Regex = Regex::new(r"^[A-Z0-9]+$").unwrap();
    static ref VALID_BUNDLE_ID_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9-]+(\.[a-zA-Z0-9-]+)+$").unwrap();
}

/// Recognized cleanup directive identifiers, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Launchctl,
    Quit,
    Signal,
    Script,
    Pkgutil,
    Delete,
    Trash,
    Rmdir,
}

/// Dispatch happens in this fixed order regardless of declaration order:
/// stop things first (services, apps, processes), then author scripts, then
/// receipt forgetting, then path removal. `rmdir` is listed last but is
/// additionally deferred to the post sub-phase, because it only works once
/// the other directives have emptied the directory.
pub const DIRECTIVE_ORDER: &[DirectiveKind] = &[
    DirectiveKind::Launchctl,
    DirectiveKind::Quit,
    DirectiveKind::Signal,
    DirectiveKind::Script,
    DirectiveKind::Pkgutil,
    DirectiveKind::Delete,
    DirectiveKind::Trash,
    DirectiveKind::Rmdir,
];

/// Directives that would disturb a still-running app. Skipped on
/// upgrade/reinstall unless the cask opts in via `on_upgrade`.
pub const DISRUPTIVE_DIRECTIVES: &[DirectiveKind] = &[DirectiveKind::Quit, DirectiveKind::Signal];

impl DirectiveKind {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "launchctl" => Some(DirectiveKind::Launchctl),
            "quit" => Some(DirectiveKind::Quit),
            "signal" => Some(DirectiveKind::Signal),
            "script" => Some(DirectiveKind::Script),
            "pkgutil" => Some(DirectiveKind::Pkgutil),
            "delete" => Some(DirectiveKind::Delete),
            "trash" => Some(DirectiveKind::Trash),
            "rmdir" => Some(DirectiveKind::Rmdir),
            _ => None,
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectiveKind::Launchctl => "launchctl",
            DirectiveKind::Quit => "quit",
            DirectiveKind::Signal => "signal",
            DirectiveKind::Script => "script",
            DirectiveKind::Pkgutil => "pkgutil",
            DirectiveKind::Delete => "delete",
            DirectiveKind::Trash => "trash",
            DirectiveKind::Rmdir => "rmdir",
        };
        f.write_str(name)
    }
}

/// A `SIGNAL/bundle.id` pair from a `signal` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSpec {
    pub signal: String,
    pub bundle_id: String,
}

/// A script invocation (`script` directives and `installer` stanzas).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptSpec {
    pub executable: String,
    pub args: Vec<String>,
    pub sudo: bool,
}

impl ScriptSpec {
    /// Parse the string-or-map shape a script argument arrives in.
    pub fn from_value(value: &Value, context: &str) -> Option<ScriptSpec> {
        let spec = if let Some(s) = value.as_str() {
            ScriptSpec {
                executable: s.to_string(),
                args: Vec::new(),
                sudo: false,
            }
        } else if let Some(map) = value.as_object() {
            warn_unknown_keys(map, &["executable", "script", "args", "sudo"], context);
            let exe_key = if map.contains_key("script") {
                "script"
            } else {
                "executable"
            };
            let Some(executable) = map.get(exe_key).and_then(|v| v.as_str()) else {
                warn!("{context} stanza missing '{exe_key}' field, skipping: {value:?}");
                return None;
            };
            let args = map
                .get("args")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|a| a.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_default();
            let sudo = map.get("sudo").and_then(|v| v.as_bool()).unwrap_or(false);
            ScriptSpec {
                executable: executable.to_string(),
                args,
                sudo,
            }
        } else {
            warn!("Invalid {context} entry, skipping: {value:?}");
            return None;
        };

        if !VALID_SCRIPT_PATH_RE.is_match(&spec.executable) {
            warn!(
                "{context} path contains invalid characters: '{}'. Skipping.",
                spec.executable
            );
            return None;
        }
        Some(spec)
    }

    /// Run the script, resolving relative names against `base_dir` first and
    /// the `PATH` second.
    pub fn run(&self, base_dir: Option<&std::path::Path>) -> Result<()> {
        let mut resolved = PathBuf::from(&self.executable);
        if let Some(base) = base_dir {
            let staged = base.join(&self.executable);
            if staged.exists() {
                resolved = staged;
            }
        }
        if !resolved.exists() {
            if !resolved.is_absolute() {
                match which::which(&resolved) {
                    Ok(found) => {
                        debug!(
                            "Found script {} in PATH: {}",
                            resolved.display(),
                            found.display()
                        );
                        resolved = found;
                    }
                    Err(_) => {
                        return Err(StaveError::NotFound(format!(
                            "Script '{}' not found (staged, absolute, or in PATH)",
                            resolved.display()
                        )));
                    }
                }
            } else {
                return Err(StaveError::NotFound(format!(
                    "Script not found: {}",
                    resolved.display()
                )));
            }
        }

        debug!(
            "Running script {} with args {:?}",
            resolved.display(),
            self.args
        );
        let mut cmd = if self.sudo {
            let mut c = Command::new("sudo");
            c.arg(&resolved);
            c
        } else {
            Command::new(&resolved)
        };
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().map_err(|e| {
            StaveError::CommandExecError(format!(
                "Failed to execute script '{}': {e}",
                resolved.display()
            ))
        })?;
        if !output.status.success() {
            return Err(StaveError::CommandExecError(format!(
                "Script '{}' exited with {}: {}",
                resolved.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("Script stdout: {}", stdout.trim());
        }
        Ok(())
    }
}

/// One typed cleanup directive with its validated arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Launchctl(Vec<String>),
    Quit(Vec<String>),
    Signal(Vec<SignalSpec>),
    Script(ScriptSpec),
    Pkgutil(Vec<String>),
    Delete(Vec<String>),
    Trash(Vec<String>),
    Rmdir(Vec<String>),
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Launchctl(_) => DirectiveKind::Launchctl,
            Directive::Quit(_) => DirectiveKind::Quit,
            Directive::Signal(_) => DirectiveKind::Signal,
            Directive::Script(_) => DirectiveKind::Script,
            Directive::Pkgutil(_) => DirectiveKind::Pkgutil,
            Directive::Delete(_) => DirectiveKind::Delete,
            Directive::Trash(_) => DirectiveKind::Trash,
            Directive::Rmdir(_) => DirectiveKind::Rmdir,
        }
    }
}

/// An `uninstall` or `zap` stanza: the declared directives plus the
/// `on_upgrade` opt-in list. Dispatch is best-effort throughout: partial
/// cleanup beats none, so directive failures are logged and never abort the
/// rest of the run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectiveSet {
    directives: Vec<Directive>,
    on_upgrade: Vec<DirectiveKind>,
}

impl DirectiveSet {
    pub fn new(directives: Vec<Directive>, on_upgrade: Vec<DirectiveKind>) -> Self {
        Self {
            directives,
            on_upgrade,
        }
    }

    /// Parse an `uninstall`/`zap` stanza value (one map or an array of
    /// maps). Unknown directive identifiers are warned about and stripped;
    /// `on_upgrade` entries that match no declared directive are reported as
    /// likely misconfiguration but kept non-fatal.
    pub fn from_stanza(value: &RawStanza, cask_token: &str) -> DirectiveSet {
        let mut set = DirectiveSet::default();
        for entry in normalize_entries(value) {
            let Some(obj) = entry.as_object() else {
                warn!("Invalid directive stanza entry for cask {cask_token}, skipping: {entry:?}");
                continue;
            };
            for (key, val) in obj {
                if key == "on_upgrade" {
                    set.parse_on_upgrade(val, cask_token);
                    continue;
                }
                match DirectiveKind::from_key(key) {
                    Some(kind) => set.parse_directive(kind, val, cask_token),
                    None => {
                        warn!("Unsupported directive key '{key}' for cask {cask_token}, ignoring")
                    }
                }
            }
        }

        for kind in &set.on_upgrade {
            if !set.has_kind(*kind) {
                warn!(
                    "on_upgrade names '{kind}' but cask {cask_token} declares no such directive; \
                     likely misconfiguration"
                );
            }
        }
        set
    }

    fn parse_on_upgrade(&mut self, value: &Value, cask_token: &str) {
        for name in string_list(value) {
            let bare = name.trim_start_matches(':');
            match DirectiveKind::from_key(bare) {
                Some(kind) => {
                    if !self.on_upgrade.contains(&kind) {
                        self.on_upgrade.push(kind);
                    }
                }
                None => warn!(
                    "on_upgrade entry '{name}' for cask {cask_token} is not a directive name, \
                     ignoring"
                ),
            }
        }
    }

    fn parse_directive(&mut self, kind: DirectiveKind, value: &Value, cask_token: &str) {
        match kind {
            DirectiveKind::Quit => {
                let ids = validated(string_list(value), &VALID_BUNDLE_ID_RE, "bundle id");
                if !ids.is_empty() {
                    self.directives.push(Directive::Quit(ids));
                }
            }
            DirectiveKind::Signal => {
                let mut specs = Vec::new();
                for spec in string_list(value) {
                    let parts: Vec<&str> = spec.splitn(2, '/').collect();
                    if parts.len() != 2 {
                        warn!(
                            "Invalid signal spec format '{spec}', expected SIGNAL/bundle.id. \
                             Skipping."
                        );
                        continue;
                    }
                    let signal = parts[0].trim().to_uppercase();
                    let bundle_id = parts[1].trim().to_string();
                    if !VALID_SIGNAL_RE.is_match(&signal) {
                        warn!("Invalid signal name '{signal}' in spec '{spec}'. Skipping.");
                        continue;
                    }
                    specs.push(SignalSpec { signal, bundle_id });
                }
                if !specs.is_empty() {
                    self.directives.push(Directive::Signal(specs));
                }
            }
            DirectiveKind::Launchctl => {
                let labels = validated(string_list(value), &VALID_LABEL_RE, "launchctl label");
                if !labels.is_empty() {
                    self.directives.push(Directive::Launchctl(labels));
                }
            }
            DirectiveKind::Script => {
                for entry in normalize_entries(value) {
                    if let Some(spec) = ScriptSpec::from_value(&entry, "script") {
                        self.directives.push(Directive::Script(spec));
                    }
                }
            }
            DirectiveKind::Pkgutil => {
                let ids = validated(string_list(value), &VALID_PKGID_RE, "pkgutil id");
                if !ids.is_empty() {
                    self.directives.push(Directive::Pkgutil(ids));
                }
            }
            DirectiveKind::Delete => {
                self.push_paths(Directive::Delete(string_list(value)), cask_token)
            }
            DirectiveKind::Trash => {
                self.push_paths(Directive::Trash(string_list(value)), cask_token)
            }
            DirectiveKind::Rmdir => {
                self.push_paths(Directive::Rmdir(string_list(value)), cask_token)
            }
        }
    }

    fn push_paths(&mut self, directive: Directive, cask_token: &str) {
        let empty = match &directive {
            Directive::Delete(p) | Directive::Trash(p) | Directive::Rmdir(p) => p.is_empty(),
            _ => false,
        };
        if empty {
            debug!(
                "Empty '{}' directive for cask {cask_token}, ignoring",
                directive.kind()
            );
        } else {
            self.directives.push(directive);
        }
    }

    pub fn has_kind(&self, kind: DirectiveKind) -> bool {
        self.directives.iter().any(|d| d.kind() == kind)
    }

    /// Kinds that would dispatch in a normal (or upgrade-flavored) uninstall
    /// run, in dispatch order. `rmdir` never appears here; it belongs to the
    /// post sub-phase.
    pub fn uninstall_plan(&self, upgrade_like: bool) -> Vec<DirectiveKind> {
        DIRECTIVE_ORDER
            .iter()
            .copied()
            .filter(|kind| *kind != DirectiveKind::Rmdir)
            .filter(|kind| {
                !(upgrade_like
                    && DISRUPTIVE_DIRECTIVES.contains(kind)
                    && !self.on_upgrade.contains(kind))
            })
            .filter(|kind| self.has_kind(*kind))
            .collect()
    }

    /// Zap always means full removal: every declared kind, no filtering.
    pub fn zap_plan(&self) -> Vec<DirectiveKind> {
        DIRECTIVE_ORDER
            .iter()
            .copied()
            .filter(|kind| self.has_kind(*kind))
            .collect()
    }

    pub fn describe(&self, kind_word: &str) -> String {
        let kinds: Vec<String> = self.zap_plan().iter().map(|k| k.to_string()).collect();
        format!("{kind_word} directives [{}]", kinds.join(", "))
    }

    pub fn uninstall_phase(&self, cask: &Cask, config: &Config, opts: &PhaseOptions) -> Result<()> {
        let upgrade_like = opts.upgrade || opts.reinstall;
        for kind in self.uninstall_plan(upgrade_like) {
            self.dispatch_kind(kind, cask, config, opts);
        }
        Ok(())
    }

    pub fn post_uninstall_phase(
        &self,
        cask: &Cask,
        config: &Config,
        opts: &PhaseOptions,
    ) -> Result<()> {
        if self.has_kind(DirectiveKind::Rmdir) {
            self.dispatch_kind(DirectiveKind::Rmdir, cask, config, opts);
        }
        Ok(())
    }

    pub fn zap_phase(&self, cask: &Cask, config: &Config, opts: &PhaseOptions) -> Result<()> {
        for kind in self.zap_plan() {
            self.dispatch_kind(kind, cask, config, opts);
        }
        Ok(())
    }

    fn dispatch_kind(&self, kind: DirectiveKind, cask: &Cask, config: &Config, opts: &PhaseOptions) {
        for directive in self.directives.iter().filter(|d| d.kind() == kind) {
            debug!("Dispatching '{kind}' directive for cask {}", cask.token);
            if let Err(e) = run_directive(directive, config, opts) {
                warn!(
                    "'{kind}' directive failed for cask {} (continuing): {e}",
                    cask.token
                );
            }
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match serde_json::from_value::<StringOrVec>(value.clone()) {
        Ok(sv) => sv.into_vec(),
        Err(_) => {
            warn!("Expected string or list of strings, got: {value:?}");
            Vec::new()
        }
    }
}

fn validated(items: Vec<String>, re: &Regex, what: &str) -> Vec<String> {
    items
        .into_iter()
        .filter(|item| {
            if re.is_match(item) {
                true
            } else {
                warn!("Invalid {what} format: '{item}'. Skipping.");
                false
            }
        })
        .collect()
}

fn run_directive(directive: &Directive, config: &Config, opts: &PhaseOptions) -> Result<()> {
    let mut failed: Vec<String> = Vec::new();

    match directive {
        Directive::Quit(ids) => {
            for id in ids {
                if let Err(msg) = quit_application(id) {
                    failed.push(msg);
                }
            }
        }
        Directive::Signal(specs) => {
            for spec in specs {
                if let Err(msg) = signal_processes(&spec.signal, &spec.bundle_id) {
                    failed.push(msg);
                }
            }
        }
        Directive::Launchctl(labels) => {
            for label in labels {
                if let Err(msg) = unload_and_remove_launchd(label, config, opts) {
                    failed.push(msg);
                }
            }
        }
        Directive::Script(spec) => {
            if let Err(e) = spec.run(None) {
                failed.push(e.to_string());
            }
        }
        Directive::Pkgutil(ids) => {
            for id in ids {
                if let Err(msg) = forget_pkgutil_receipt(id) {
                    failed.push(msg);
                }
            }
        }
        Directive::Delete(paths) => {
            for path_str in paths {
                let target = helpers::expand_tilde(path_str, config.home_dir());
                if !helpers::is_safe_path(&target, config.home_dir(), config) {
                    failed.push(format!("skipped unsafe delete path {}", target.display()));
                    continue;
                }
                if !target.exists() && target.symlink_metadata().is_err() {
                    debug!("Delete target {} not found, skipping.", target.display());
                    continue;
                }
                let use_sudo =
                    target.starts_with("/Library") || target.starts_with("/Applications");
                let helper = if use_sudo { Some(opts.helper) } else { None };
                if !helpers::remove_filesystem_artifact(&target, helper)
                    && (target.exists() || target.symlink_metadata().is_ok())
                {
                    failed.push(format!("failed to delete {}", target.display()));
                }
            }
        }
        Directive::Trash(paths) => {
            for path_str in paths {
                let target = helpers::expand_tilde(path_str, config.home_dir());
                if !helpers::is_safe_path(&target, config.home_dir(), config) {
                    failed.push(format!("skipped unsafe trash path {}", target.display()));
                    continue;
                }
                trash_path(&target);
            }
        }
        Directive::Rmdir(paths) => {
            for path_str in paths {
                let target = helpers::expand_tilde(path_str, config.home_dir());
                if !helpers::is_safe_path(&target, config.home_dir(), config) {
                    failed.push(format!("skipped unsafe rmdir path {}", target.display()));
                    continue;
                }
                if let Err(msg) = remove_directory_if_empty(&target) {
                    failed.push(msg);
                }
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(StaveError::DirectiveFailed {
            directive: directive.kind().to_string(),
            message: failed.join("; "),
        })
    }
}

#[cfg(target_os = "macos")]
fn quit_application(bundle_id: &str) -> std::result::Result<(), String> {
    debug!("Asking application id {bundle_id} to quit");
    let script = format!("tell application id \"{bundle_id}\" to quit");
    let output = Command::new("osascript")
        .arg("-e")
        .arg(&script)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| format!("failed to run osascript: {e}"))?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    // A not-running app errors out; that is the state we wanted anyway.
    if stderr.contains("isn't running") || stderr.contains("(-600)") {
        debug!("Application id {bundle_id} was not running.");
        return Ok(());
    }
    Err(format!("osascript quit failed: {}", stderr.trim()))
}

#[cfg(not(target_os = "macos"))]
fn quit_application(bundle_id: &str) -> std::result::Result<(), String> {
    signal_processes("TERM", bundle_id)
}

fn signal_processes(signal: &str, pattern: &str) -> std::result::Result<(), String> {
    debug!("Sending signal {signal} to processes matching '{pattern}' (using pkill -f)");
    let mut cmd = Command::new("pkill");
    cmd.arg(format!("-{signal}"));
    cmd.arg("-f");
    cmd.arg(pattern);
    cmd.stdout(Stdio::null()).stderr(Stdio::piped());
    match cmd.status() {
        Ok(status) if status.success() => Ok(()),
        Ok(status) if status.code() == Some(1) => {
            debug!("No running processes found matching '{pattern}' for signal {signal}.");
            Ok(())
        }
        Ok(status) => Err(format!(
            "pkill failed for signal {signal} / pattern '{pattern}' with status: {status}"
        )),
        Err(e) => Err(format!(
            "failed to execute pkill for signal {signal} / pattern '{pattern}': {e}"
        )),
    }
}

fn forget_pkgutil_receipt(id: &str) -> std::result::Result<(), String> {
    debug!("Forgetting package receipt (requires sudo): {id}");
    let output = Command::new("sudo")
        .arg("pkgutil")
        .arg("--forget")
        .arg(id)
        .output()
        .map_err(|e| format!("failed to execute sudo pkgutil --forget {id}: {e}"))?;
    if output.status.success() {
        debug!("Successfully forgot package receipt {id}");
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.contains("No receipt for") || stderr.trim().is_empty() {
        debug!("Package receipt {id} already forgotten or never existed.");
        return Ok(());
    }
    Err(format!(
        "failed to forget package receipt {id}: {}",
        stderr.trim()
    ))
}

fn unload_and_remove_launchd(
    label: &str,
    config: &Config,
    opts: &PhaseOptions,
) -> std::result::Result<(), String> {
    debug!("Unloading launchd service (if loaded): {label}");
    let unload_output = Command::new("launchctl")
        .arg("unload")
        .arg("-w")
        .arg(label)
        .stderr(Stdio::piped())
        .output();

    match unload_output {
        Ok(out) if out.status.success() => {
            debug!("Successfully unloaded launchd service {label}");
        }
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("Could not find specified service")
                || stderr.contains("service is not loaded")
                || stderr.trim().is_empty()
            {
                debug!("Launchd service {label} already unloaded or not found.");
            } else {
                warn!(
                    "launchctl unload {label} failed (proceeding with plist removal attempt): {}",
                    stderr.trim()
                );
            }
        }
        Err(e) => {
            warn!(
                "Failed to execute launchctl unload {label} (proceeding with plist removal \
                 attempt): {e}"
            );
        }
    }

    let plist_name = format!("{label}.plist");
    let candidates = vec![
        config.home_dir().join("Library/LaunchAgents").join(&plist_name),
        PathBuf::from("/Library/LaunchAgents").join(&plist_name),
        PathBuf::from("/Library/LaunchDaemons").join(&plist_name),
    ];
    for plist_path in candidates.into_iter().filter(|p| p.exists()) {
        debug!("Removing launchd plist file: {}", plist_path.display());
        let use_sudo = plist_path.starts_with("/Library/LaunchDaemons")
            || plist_path.starts_with("/Library/LaunchAgents");
        let helper = if use_sudo { Some(opts.helper) } else { None };
        if !helpers::remove_filesystem_artifact(&plist_path, helper) {
            return Err(format!(
                "failed to remove launchd plist: {}",
                plist_path.display()
            ));
        }
    }
    Ok(())
}

fn trash_path(path: &std::path::Path) {
    if !path.exists() && path.symlink_metadata().is_err() {
        debug!("Path for trashing not found: {}", path.display());
        return;
    }
    match trash::delete(path) {
        Ok(_) => debug!("Trashed: {}", path.display()),
        Err(e) => warn!(
            "Failed to trash {} (proceeding anyway): {e}. This might require manual cleanup.",
            path.display()
        ),
    }
}

/// `rmdir` is never recursive: a stray `.DS_Store` is cleared, then the
/// directory is removed only if actually empty.
fn remove_directory_if_empty(target: &std::path::Path) -> std::result::Result<(), String> {
    if !target.exists() {
        debug!("Rmdir target {} not found, skipping.", target.display());
        return Ok(());
    }
    if !target.is_dir() {
        debug!(
            "Rmdir target {} is not a directory, skipping.",
            target.display()
        );
        return Ok(());
    }
    let ds_store = target.join(".DS_Store");
    if ds_store.is_file() {
        let _ = fs::remove_file(&ds_store);
    }
    match fs::remove_dir(target) {
        Ok(()) => {
            debug!("Removed empty directory {}", target.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::DirectoryNotEmpty => {
            debug!(
                "Directory {} not empty, leaving in place.",
                target.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("Failed to rmdir {}: {e}", target.display());
            Err(format!("failed to rmdir {}: {e}", target.display()))
        }
    }
}
