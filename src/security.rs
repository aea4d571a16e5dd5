//! Process-level guards applied before the server binds a socket.

use anyhow::{Result, bail};
use nix::unistd::Uid;

/// Refuses to run as root. The API writes uploads and the database with the
/// invoking user's permissions, so it must run under an unprivileged account.
pub fn ensure_not_root(process: &str) -> Result<()> {
    refuse_root(Uid::current(), process)
}

fn refuse_root(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!("{process} must not be run as root; start it under an unprivileged service account");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_refused() {
        let err = refuse_root(Uid::from_raw(0), "backend").unwrap_err();
        assert!(err.to_string().starts_with("backend must not be run as root"));
        assert!(refuse_root(Uid::from_raw(1000), "backend").is_ok());
    }
}
