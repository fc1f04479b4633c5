#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Write an executable shell script into `dir` and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    let mut perms =
        fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("make script executable");
    path
}

/// A stand-in pipeline that starts cleanly and runs until signalled.
pub fn sleeper_script(dir: &Path, name: &str) -> PathBuf {
    write_script(dir, name, "#!/bin/sh\nexec sleep 30\n")
}

/// Whether `pid` still names a process (zombies included).
pub fn pid_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None)
        .is_ok()
}

/// SIGKILL a process the way an external actor would.
pub fn kill_externally(pid: u32) {
    let _ = nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(pid as i32),
        nix::sys::signal::Signal::SIGKILL,
    );
}
