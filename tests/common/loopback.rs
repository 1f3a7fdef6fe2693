//! Loopback transport shared by integration tests.
//!
//! Integration tests are compiled as separate crates, so this file is pulled
//! in with:
//!
//! ```rust
//! #[path = "common/loopback.rs"]
//! mod loopback;
//! ```
//!
//! The shims are written once per test binary. Writing executables while
//! other threads spawn processes can make `exec` fail with `ETXTBSY`, so no
//! test writes its own copy.

use std::process::Command;
use std::sync::OnceLock;

use camino::Utf8Path;
use sshbed::TransportConfig;
use sshbed::test_support::install_loopback_transport;
use tempfile::TempDir;

static LOOPBACK: OnceLock<(TempDir, TransportConfig)> = OnceLock::new();

/// Transport whose `ssh`/`scp` run against the local machine.
pub fn transport() -> TransportConfig {
    let (_, config) = LOOPBACK.get_or_init(|| {
        let dir = TempDir::new().expect("loopback dir");
        let path = Utf8Path::from_path(dir.path()).expect("utf8 temp dir");
        let config = install_loopback_transport(path).expect("install loopback shims");
        (dir, config)
    });
    config.clone()
}

/// Name of the user running the tests, which is who every loopback node
/// runs commands as.
pub fn local_user() -> String {
    let output = Command::new("whoami").output().expect("run whoami");
    String::from_utf8(output.stdout)
        .expect("utf8 whoami output")
        .trim()
        .to_owned()
}
