//! UI context for detecting interactive vs CI environments

use std::io::IsTerminal;

/// Common CI environment indicators
const CI_VARS: &[&str] = &[
    "CI",
    "GITHUB_ACTIONS",
    "GITLAB_CI",
    "CIRCLECI",
    "TRAVIS",
    "JENKINS_URL",
    "BUILDKITE",
    "TEAMCITY_VERSION",
    "TF_BUILD",
];

/// UI context that determines output behavior
#[derive(Debug, Clone)]
pub struct UiContext {
    /// Whether a user is at the terminal to answer prompts
    interactive: bool,
    /// Whether stderr can redraw a progress line in place
    live_progress: bool,
    /// Whether --yes flag was passed (auto-approve prompts)
    auto_yes: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        let ci = CI_VARS.iter().any(|var| std::env::var_os(var).is_some());
        let stderr_tty = std::io::stderr().is_terminal();
        let interactive =
            !ci && std::io::stdout().is_terminal() && std::io::stdin().is_terminal();

        Self {
            interactive,
            live_progress: !ci && stderr_tty,
            auto_yes: false,
        }
    }

    /// Create a non-interactive context (for testing or explicit CI mode)
    pub fn non_interactive() -> Self {
        Self {
            interactive: false,
            live_progress: false,
            auto_yes: false,
        }
    }

    /// Set auto-yes mode (bypass prompts with defaults)
    pub fn with_auto_yes(mut self, yes: bool) -> Self {
        self.auto_yes = yes;
        self
    }

    /// Check if we're in an interactive terminal
    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Check if prompts should be auto-approved
    pub fn auto_yes(&self) -> bool {
        self.auto_yes
    }

    /// Check if we should use fancy output (cliclack steps, colors)
    pub fn use_fancy_output(&self) -> bool {
        self.interactive
    }

    /// Whether in-place download progress is wanted and can be shown.
    ///
    /// Progress lines are logged periodically instead when stderr is not a
    /// terminal or a CI system is detected.
    pub fn live_progress(&self, requested: bool) -> bool {
        requested && self.live_progress
    }
}
