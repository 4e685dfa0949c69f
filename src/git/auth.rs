//! Authentication strategy selection.
//!
//! The strategy is a pure function of the URL shape plus which key files are
//! readable. No credentials are stored or prompted for; HTTPS remotes rely on
//! whatever credential helper the user has configured.

use std::path::{Path, PathBuf};

use crate::constants::SSH_KEY_CANDIDATES;

/// How a git subprocess should authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// SSH with an explicit identity file and user `git`
    SshKey {
        key: PathBuf,
    },
    /// Let the environment decide (ssh-agent, credential helpers, none)
    Ambient,
}

impl AuthStrategy {
    /// Environment variables that apply this strategy to a `git` process.
    #[must_use]
    pub fn git_env(&self) -> Vec<(String, String)> {
        match self {
            Self::SshKey {
                key,
            } => vec![(
                "GIT_SSH_COMMAND".to_string(),
                format!(
                    "ssh -i '{}' -l git -o IdentitiesOnly=yes -o BatchMode=yes",
                    key.display()
                ),
            )],
            Self::Ambient => Vec::new(),
        }
    }
}

/// Pick the strategy for `url`.
///
/// `git@` URLs try `preferred` first, then `id_ed25519`, `id_rsa` and
/// `id_ecdsa` under `ssh_dir`; the first readable file wins. Every other URL,
/// or a `git@` URL with no readable key, is [`AuthStrategy::Ambient`].
#[must_use]
pub fn select_auth(url: &str, ssh_dir: Option<&Path>, preferred: Option<&Path>) -> AuthStrategy {
    if !url.starts_with("git@") {
        return AuthStrategy::Ambient;
    }

    let candidates = preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(ssh_dir.into_iter().flat_map(|dir| SSH_KEY_CANDIDATES.iter().map(move |k| dir.join(k))));

    for key in candidates {
        if std::fs::File::open(&key).is_ok_and(|f| f.metadata().is_ok_and(|m| m.is_file())) {
            tracing::debug!(target: "git", "Using SSH key {} for {}", key.display(), url);
            return AuthStrategy::SshKey {
                key,
            };
        }
    }

    tracing::debug!(target: "git", "No SSH key found for {}, using ambient auth", url);
    AuthStrategy::Ambient
}

/// `~/.ssh`, when a home directory is known.
#[must_use]
pub fn default_ssh_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ssh"))
}
