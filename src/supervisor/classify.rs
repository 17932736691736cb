use std::path::PathBuf;

/// A point-in-time process entry: pid and full command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub command: String,
}

impl ProcessInfo {
    pub fn new(pid: u32, command: impl Into<String>) -> Self {
        Self {
            pid,
            command: command.into(),
        }
    }
}

/// Command-line markers of Electron/Chromium child processes.
const HELPER_MARKERS: &[&str] = &[
    "--type=",
    "helper",
    "renderer",
    "gpu",
    "utility",
    "sandbox",
    "plugin",
    "crashpad",
    "crash-reporter",
    "crash_reporter",
    "crash_handler",
    "audio",
    "worker",
];

const USER_DATA_DIR_FLAG: &str = "--user-data-dir";

pub fn is_helper(process: &ProcessInfo) -> bool {
    let command = process.command.to_ascii_lowercase();
    HELPER_MARKERS.iter().any(|marker| command.contains(marker))
}

/// Whether `process` belongs to the foreign application.
///
/// With a known install path the command line must contain it; otherwise the
/// lowercase process name is matched against the command line.
pub fn matches_app(
    process: &ProcessInfo,
    install_path: Option<&std::path::Path>,
    process_name: &str,
) -> bool {
    match install_path {
        Some(path) => process.command.contains(&*path.to_string_lossy()),
        None => {
            let name = process_name.trim().to_ascii_lowercase();
            !name.is_empty() && process.command.to_ascii_lowercase().contains(&name)
        }
    }
}

/// Non-helper processes; all of `processes` when none classify as main.
pub fn main_processes(processes: &[ProcessInfo]) -> Vec<&ProcessInfo> {
    let main: Vec<&ProcessInfo> = processes.iter().filter(|p| !is_helper(p)).collect();
    if main.is_empty() {
        processes.iter().collect()
    } else {
        main
    }
}

/// Value of `--user-data-dir` (either `=value` or a following argument).
///
/// `ps` flattens argv into one string, so a value ends at the next ` --` flag.
pub fn parse_user_data_dir(command: &str) -> Option<PathBuf> {
    let start = command.find(USER_DATA_DIR_FLAG)? + USER_DATA_DIR_FLAG.len();
    let rest = &command[start..];
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(' '))?
        .trim_start();

    let end = rest.find(" --").unwrap_or(rest.len());
    let value = rest[..end].trim().trim_matches(|c| c == '"' || c == '\'');
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

/// Install location implied by a running main process.
///
/// macOS bundles resolve to the `.app` directory; elsewhere the executable (first token).
pub fn install_path_from_command(command: &str) -> Option<PathBuf> {
    if let Some(idx) = command.find(".app/") {
        return Some(PathBuf::from(&command[..idx + ".app".len()]));
    }
    command
        .split_whitespace()
        .next()
        .filter(|exe| exe.contains(std::path::MAIN_SEPARATOR))
        .map(PathBuf::from)
}
