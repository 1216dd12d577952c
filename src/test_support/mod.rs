//! Test fixtures for coordination tests.
//!
//! [`FakeNinja`] writes a shell script that stands in for the build executor.
//! It logs its arguments, can snapshot the registry while it runs, print
//! lines, sleep, and exit with a chosen code.

#![cfg(unix)]

use std::fmt::Write as _;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Builder for a fake build executor script.
#[derive(Debug, Clone)]
pub struct FakeNinja {
    dir: PathBuf,
    name: String,
    snapshot: Option<PathBuf>,
    output: Vec<String>,
    sleep_secs: Option<f64>,
    hang: bool,
    exit_code: i32,
}

/// A fake build executor written to disk.
#[derive(Debug, Clone)]
pub struct FakeNinjaScript {
    path: PathBuf,
    log: PathBuf,
    snapshot: PathBuf,
}

impl FakeNinja {
    /// Fake executor stored in `dir`.
    pub fn new(dir: &Path) -> Self {
        FakeNinja {
            dir: dir.to_path_buf(),
            name: "fake-ninja".to_string(),
            snapshot: None,
            output: Vec::new(),
            sleep_secs: None,
            hang: false,
            exit_code: 0,
        }
    }

    /// Script file name, for several executors in one directory.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Copy `registry` into the snapshot file shortly after starting.
    pub fn snapshot(mut self, registry: &Path) -> Self {
        self.snapshot = Some(registry.to_path_buf());
        self
    }

    /// Print `line` on stdout.
    pub fn output(mut self, line: &str) -> Self {
        self.output.push(line.to_string());
        self
    }

    /// Sleep before exiting.
    pub fn sleep_secs(mut self, secs: f64) -> Self {
        self.sleep_secs = Some(secs);
        self
    }

    /// Replace the script with a long `sleep`, so killing the pid ends it.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Exit code of the fake build.
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Write the script and make it executable.
    pub fn write(self) -> FakeNinjaScript {
        let path = self.dir.join(&self.name);
        let log = self.dir.join(format!("{}.log", self.name));
        let snapshot = self.dir.join(format!("{}.snapshot", self.name));

        let mut script = String::from("#!/bin/sh\n");
        let _ = writeln!(script, "echo \"$@\" >> '{}'", log.display());
        if let Some(registry) = &self.snapshot {
            let _ = writeln!(
                script,
                "sleep 0.2\ncat '{}' >> '{}' 2>/dev/null",
                registry.display(),
                snapshot.display()
            );
        }
        for line in &self.output {
            let _ = writeln!(script, "echo '{}'", line);
        }
        if let Some(secs) = self.sleep_secs {
            let _ = writeln!(script, "sleep {}", secs);
        }
        if self.hang {
            script.push_str("exec sleep 60\n");
        }
        let _ = writeln!(script, "exit {}", self.exit_code);

        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        FakeNinjaScript {
            path,
            log,
            snapshot,
        }
    }
}

impl FakeNinjaScript {
    /// Path of the executable script.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the script has run at least once.
    pub fn was_invoked(&self) -> bool {
        self.log.exists()
    }

    /// Argument lists of every run, in order.
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(&self.log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Registry contents captured by every run, concatenated.
    pub fn snapshot_contents(&self) -> String {
        fs::read_to_string(&self.snapshot).unwrap_or_default()
    }
}
