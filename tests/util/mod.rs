use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use winget_batch::model::types::BatchAction;
use winget_batch::winget::{OutputLine, PackageManager, PackageManagerError, ProcessOutput};

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }

    pub fn unset(key: &str) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::remove_var(key) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// winget-style table: header, dashes, then rows padded to fixed columns.
#[allow(dead_code)]
pub fn search_table(rows: &[(&str, &str, &str)]) -> String {
    let line = |name: &str, id: &str, version: &str, source: &str| {
        format!("{name:<28}{id:<30}{version:<14}{source}")
    };
    let mut out = vec![line("Name", "Id", "Version", "Source"), "-".repeat(80)];
    for (name, id, version) in rows {
        out.push(line(name, id, version, "winget"));
    }
    out.join("\n")
}

/// winget-style `show` dump.
#[allow(dead_code)]
pub fn show_text(id: &str, name: &str, publisher: &str) -> String {
    format!(
        "Found {name} [{id}]\nVersion: 1.0.0\nPublisher: {publisher}\nDescription: {name} does things\n"
    )
}

/// Scripted package manager. Unknown queries return an empty listing,
/// unknown `show` ids exit with 1, actions succeed unless scripted.
#[allow(dead_code)]
#[derive(Default)]
pub struct FakePackageManager {
    searches: HashMap<String, String>,
    shows: HashMap<String, String>,
    show_delays: HashMap<String, Duration>,
    show_stderr: HashMap<String, Vec<String>>,
    show_panics: Vec<String>,
    list: String,
    upgrades: String,
    action_codes: HashMap<String, i32>,
    spawn_failures: Vec<String>,
    show_calls: Mutex<Vec<String>>,
    actions: Mutex<Vec<(BatchAction, String)>>,
}

#[allow(dead_code)]
impl FakePackageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_search(mut self, query: &str, stdout: impl Into<String>) -> Self {
        self.searches.insert(query.to_string(), stdout.into());
        self
    }

    pub fn with_show(mut self, id: &str, stdout: impl Into<String>) -> Self {
        self.shows.insert(id.to_string(), stdout.into());
        self
    }

    pub fn with_show_delay(mut self, id: &str, delay: Duration) -> Self {
        self.show_delays.insert(id.to_string(), delay);
        self
    }

    /// Lines printed on stderr ahead of the scripted stdout.
    pub fn with_show_stderr(mut self, id: &str, line: &str) -> Self {
        self.show_stderr
            .entry(id.to_string())
            .or_default()
            .push(line.to_string());
        self
    }

    /// `show` for `id` panics, taking its worker thread down.
    pub fn with_show_panic(mut self, id: &str) -> Self {
        self.show_panics.push(id.to_string());
        self
    }

    pub fn with_list(mut self, stdout: impl Into<String>) -> Self {
        self.list = stdout.into();
        self
    }

    pub fn with_upgrades(mut self, stdout: impl Into<String>) -> Self {
        self.upgrades = stdout.into();
        self
    }

    pub fn with_action_code(mut self, id: &str, code: i32) -> Self {
        self.action_codes.insert(id.to_string(), code);
        self
    }

    pub fn with_spawn_failure(mut self, id: &str) -> Self {
        self.spawn_failures.push(id.to_string());
        self
    }

    pub fn show_calls(&self) -> Vec<String> {
        self.show_calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<(BatchAction, String)> {
        self.actions.lock().unwrap().clone()
    }

    fn act(&self, action: BatchAction, id: &str) -> Result<i32, PackageManagerError> {
        self.actions.lock().unwrap().push((action, id.to_string()));
        if self.spawn_failures.iter().any(|f| f == id) {
            return Err(PackageManagerError::Spawn {
                program: "winget".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            });
        }
        Ok(self.action_codes.get(id).copied().unwrap_or(0))
    }
}

impl PackageManager for FakePackageManager {
    fn search(&self, query: &str) -> Result<ProcessOutput, PackageManagerError> {
        let text = self.searches.get(query).map(String::as_str).unwrap_or("");
        Ok(ProcessOutput::from_stdout(0, text))
    }

    fn show(&self, id: &str) -> Result<ProcessOutput, PackageManagerError> {
        self.show_calls.lock().unwrap().push(id.to_string());
        if let Some(delay) = self.show_delays.get(id) {
            thread::sleep(*delay);
        }
        if self.show_panics.iter().any(|p| p == id) {
            panic!("scripted show panic for {id}");
        }
        let mut output = match self.shows.get(id) {
            Some(text) => ProcessOutput::from_stdout(0, text),
            None => ProcessOutput::from_stdout(1, "No package found matching input criteria."),
        };
        if let Some(errors) = self.show_stderr.get(id) {
            let stderr = errors.iter().map(|l| OutputLine::Stderr(l.clone()));
            output.lines.splice(0..0, stderr);
        }
        Ok(output)
    }

    fn list(&self, _query: Option<&str>) -> Result<ProcessOutput, PackageManagerError> {
        Ok(ProcessOutput::from_stdout(0, &self.list))
    }

    fn upgrades(&self) -> Result<ProcessOutput, PackageManagerError> {
        Ok(ProcessOutput::from_stdout(0, &self.upgrades))
    }

    fn install(&self, id: &str) -> Result<i32, PackageManagerError> {
        self.act(BatchAction::Install, id)
    }

    fn upgrade(&self, id: &str) -> Result<i32, PackageManagerError> {
        self.act(BatchAction::Upgrade, id)
    }

    fn uninstall(&self, id: &str) -> Result<i32, PackageManagerError> {
        self.act(BatchAction::Uninstall, id)
    }
}
