use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use tracing::debug;
use vellum_common::types::{Author, BlameLine, CommitMeta};

use super::logparse::{parse_blame_porcelain, parse_log_records, ParseError, LOG_FORMAT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl GitOutput {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    EmptyRemovePaths,
    BadRevision { revision: String },
    PathMissing { path: String },
    SpawnFailed { command: String, message: String },
    CommandFailed { command: String, code: Option<i32>, stderr: String },
    Io { path: String, message: String },
    Parse(ParseError),
}

impl Display for GitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::EmptyRemovePaths => write!(f, "remove requires at least one path"),
            GitError::BadRevision { revision } => {
                write!(f, "revision `{revision}` is not a valid revision identifier")
            }
            GitError::PathMissing { path } => write!(f, "`{path}` does not exist"),
            GitError::SpawnFailed { command, message } => {
                write!(f, "failed to run `{command}`: {message}")
            }
            GitError::CommandFailed { command, code, stderr } => {
                write!(f, "`{command}` failed with code {:?}: {}", code, stderr.trim())
            }
            GitError::Io { path, message } => write!(f, "I/O error on `{path}`: {message}"),
            GitError::Parse(error) => write!(f, "unexpected git output: {error}"),
        }
    }
}

impl Error for GitError {}

impl From<ParseError> for GitError {
    fn from(error: ParseError) -> Self {
        GitError::Parse(error)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

pub trait CommandExecutor: Send + Sync {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

impl CommandExecutor for ProcessCommandExecutor {
    fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> Result<CommandResult, std::io::Error> {
        let output = Command::new(program).args(args).current_dir(cwd).output()?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Git-backed repository of page files.
///
/// Every operation is keyed by a repo-relative path that has already passed
/// page-path validation; nothing here joins untrusted input onto the root.
/// Writes follow stage-then-commit discipline: a failed commit rolls the
/// index and working tree back before the error is surfaced.
#[derive(Debug, Clone)]
pub struct GitBackend<E = ProcessCommandExecutor> {
    root: PathBuf,
    executor: E,
}

impl GitBackend<ProcessCommandExecutor> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), executor: ProcessCommandExecutor }
    }
}

impl<E: CommandExecutor> GitBackend<E> {
    pub fn with_executor(root: impl Into<PathBuf>, executor: E) -> Self {
        Self { root: root.into(), executor }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the repository directory and run `git init` when the
    /// directory is not yet a repository.
    pub fn init_if_needed(&self) -> Result<(), GitError> {
        fs::create_dir_all(&self.root).map_err(|error| GitError::Io {
            path: self.root.display().to_string(),
            message: error.to_string(),
        })?;

        if !self.root.join(".git").exists() {
            self.run(vec!["init".into(), "-q".into()])?;
            debug!(root = %self.root.display(), "initialized page repository");
        }
        Ok(())
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Write `content` to `path` and commit it as one change.
    ///
    /// Returns the short revision id of the new commit. On commit failure
    /// the staged change is undone: a previously tracked file is restored
    /// from HEAD, a new file is unstaged and deleted.
    pub fn store(
        &self,
        path: &str,
        content: &str,
        message: &str,
        author: &Author,
    ) -> Result<String, GitError> {
        let was_tracked = self.is_tracked(path)?;

        let abs = self.root.join(path);
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).map_err(|error| GitError::Io {
                path: path.to_string(),
                message: error.to_string(),
            })?;
        }
        fs::write(&abs, content).map_err(|error| GitError::Io {
            path: path.to_string(),
            message: error.to_string(),
        })?;

        self.run(vec!["add".into(), "--".into(), path.into()])?;

        if let Err(error) = self.commit(message, author, &[path]) {
            // Saving byte-identical content stages nothing; report the
            // file's current revision instead of failing the save.
            if let GitError::CommandFailed { ref stderr, .. } = error {
                if is_no_change(stderr) {
                    if let Some(meta) = self.metadata(path, "")? {
                        return Ok(meta.id);
                    }
                }
            }
            self.rollback_store(path, was_tracked);
            return Err(error);
        }

        self.head_revision()
    }

    /// Remove one or more paths (recursively for directories) in a single
    /// commit. Used for page deletion and attachment-directory cleanup.
    pub fn remove(
        &self,
        paths: &[String],
        message: &str,
        author: &Author,
    ) -> Result<String, GitError> {
        if paths.is_empty() {
            return Err(GitError::EmptyRemovePaths);
        }

        let mut args = vec!["rm".to_string(), "-r".into(), "-q".into(), "--".into()];
        args.extend(paths.iter().cloned());
        self.run(args)?;

        let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        if let Err(error) = self.commit(message, author, &path_refs) {
            // git rm already deleted the working copies; bring them back.
            let mut restore = vec!["checkout".to_string(), "HEAD".into(), "--".into()];
            restore.extend(paths.iter().cloned());
            let _ = self.run(restore);
            return Err(error);
        }

        self.head_revision()
    }

    /// Apply the inverse of `revision` as a new commit, preserving forward
    /// history. A revert that does not apply cleanly is aborted and the
    /// working tree restored before the error is returned.
    pub fn revert(
        &self,
        revision: &str,
        message: &str,
        author: &Author,
    ) -> Result<String, GitError> {
        validate_revision(revision)?;

        if let Err(error) =
            self.run(vec!["revert".into(), "--no-commit".into(), "--no-edit".into(), revision.into()])
        {
            let _ = self.run(vec!["revert".into(), "--abort".into()]);
            return Err(error);
        }

        if let Err(error) = self.commit(message, author, &[]) {
            // The inverse is staged but could not be committed; put the
            // tree back at HEAD.
            let _ = self.run(vec!["reset".into(), "-q".into(), "--hard".into(), "HEAD".into()]);
            return Err(error);
        }

        self.head_revision()
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Load file content. Empty revision reads the current working
    /// snapshot; otherwise the file is read as of that revision.
    pub fn load(&self, path: &str, revision: &str) -> Result<String, GitError> {
        self.load_bytes(path, revision)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn load_bytes(&self, path: &str, revision: &str) -> Result<Vec<u8>, GitError> {
        if revision.is_empty() {
            return fs::read(self.root.join(path)).map_err(|error| {
                if error.kind() == std::io::ErrorKind::NotFound {
                    GitError::PathMissing { path: path.to_string() }
                } else {
                    GitError::Io { path: path.to_string(), message: error.to_string() }
                }
            });
        }

        validate_revision(revision)?;
        match self.run(vec!["show".into(), format!("{revision}:{path}")]) {
            Ok(output) => Ok(output.stdout),
            Err(GitError::CommandFailed { stderr, .. }) if is_missing_object(&stderr) => {
                Err(GitError::PathMissing { path: path.to_string() })
            }
            Err(error) => Err(error),
        }
    }

    /// Whether the path exists in the current working snapshot.
    pub fn exists(&self, path: &str) -> bool {
        self.root.join(path).is_file()
    }

    pub fn is_tracked(&self, path: &str) -> Result<bool, GitError> {
        let output = self.run(vec!["ls-files".into(), "--".into(), path.into()])?;
        Ok(!output.text().trim().is_empty())
    }

    /// List tracked files, optionally restricted to a path prefix.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, GitError> {
        let mut args = vec!["ls-files".to_string()];
        if !prefix.is_empty() {
            args.push("--".into());
            args.push(prefix.into());
        }
        let output = self.run(args)?;
        Ok(output.text().lines().map(str::to_string).filter(|l| !l.is_empty()).collect())
    }

    /// History for one path, or the whole repository when `path` is empty.
    /// Most recent first.
    pub fn log(&self, path: &str, limit: usize) -> Result<Vec<CommitMeta>, GitError> {
        let mut args = vec![
            "log".to_string(),
            "-n".into(),
            limit.to_string(),
            format!("--format={LOG_FORMAT}"),
            "--name-only".into(),
        ];
        if !path.is_empty() {
            args.push("--".into());
            args.push(path.into());
        }

        match self.run(args) {
            Ok(output) => Ok(parse_log_records(&output.text())?),
            Err(GitError::CommandFailed { stderr, .. }) if is_empty_repo(&stderr) => Ok(vec![]),
            Err(error) => Err(error),
        }
    }

    /// The commit that last touched `path` at or before `revision`
    /// (HEAD when `revision` is empty). `None` when the path has never
    /// been committed.
    pub fn metadata(&self, path: &str, revision: &str) -> Result<Option<CommitMeta>, GitError> {
        let mut args = vec![
            "log".to_string(),
            "-1".into(),
            format!("--format={LOG_FORMAT}"),
            "--name-only".into(),
        ];
        if !revision.is_empty() {
            validate_revision(revision)?;
            args.push(revision.into());
        }
        if !path.is_empty() {
            args.push("--".into());
            args.push(path.into());
        }

        match self.run(args) {
            Ok(output) => Ok(parse_log_records(&output.text())?.into_iter().next()),
            Err(GitError::CommandFailed { stderr, .. })
                if is_empty_repo(&stderr) || is_missing_object(&stderr) =>
            {
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Short revision id of the commit that last touched `path`, if any.
    pub fn current_revision(&self, path: &str) -> Result<Option<String>, GitError> {
        Ok(self.metadata(path, "")?.map(|meta| meta.id))
    }

    /// Last-modified time of `path`, derived from commit history.
    pub fn mtime(&self, path: &str) -> Result<DateTime<Utc>, GitError> {
        self.metadata(path, "")?
            .map(|meta| meta.timestamp)
            .ok_or_else(|| GitError::PathMissing { path: path.to_string() })
    }

    /// Textual diff between two revisions.
    pub fn diff(&self, rev_a: &str, rev_b: &str) -> Result<String, GitError> {
        validate_revision(rev_a)?;
        validate_revision(rev_b)?;
        let output =
            self.run(vec!["diff".into(), "--no-color".into(), rev_a.into(), rev_b.into()])?;
        Ok(output.text())
    }

    /// Commit metadata plus the full textual diff of one commit.
    pub fn show_commit(&self, revision: &str) -> Result<(CommitMeta, String), GitError> {
        validate_revision(revision)?;

        let meta = self
            .metadata("", revision)?
            .ok_or_else(|| GitError::PathMissing { path: revision.to_string() })?;

        let output = self.run(vec![
            "show".into(),
            "--no-color".into(),
            "--format=".into(),
            revision.into(),
        ])?;
        Ok((meta, output.text()))
    }

    /// Per-line attribution for the current content of `path`.
    pub fn blame(&self, path: &str) -> Result<Vec<BlameLine>, GitError> {
        match self.run(vec!["blame".into(), "--porcelain".into(), "--".into(), path.into()]) {
            Ok(output) => Ok(parse_blame_porcelain(&output.text())?),
            Err(GitError::CommandFailed { stderr, .. }) if is_missing_object(&stderr) => {
                Err(GitError::PathMissing { path: path.to_string() })
            }
            Err(error) => Err(error),
        }
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Commit staged changes, restricted to `paths` when non-empty.
    /// Author and committer identity both come from `author`, so no
    /// machine-level git configuration is required.
    fn commit(&self, message: &str, author: &Author, paths: &[&str]) -> Result<(), GitError> {
        let mut args = vec![
            "-c".to_string(),
            format!("user.name={}", author.name),
            "-c".into(),
            format!("user.email={}", author.email),
            "commit".into(),
            "-q".into(),
            "-m".into(),
            message.to_string(),
            format!("--author={}", author.signature()),
        ];
        if !paths.is_empty() {
            args.push("--".into());
            args.extend(paths.iter().map(|p| p.to_string()));
        }
        self.run(args).map(|_| ())
    }

    fn rollback_store(&self, path: &str, was_tracked: bool) {
        if was_tracked {
            let _ = self.run(vec!["checkout".into(), "HEAD".into(), "--".into(), path.into()]);
        } else {
            let _ = self.run(vec![
                "rm".into(),
                "-f".into(),
                "-q".into(),
                "--cached".into(),
                "--".into(),
                path.into(),
            ]);
            let _ = fs::remove_file(self.root.join(path));
        }
    }

    fn head_revision(&self) -> Result<String, GitError> {
        let output = self.run(vec!["rev-parse".into(), "--short".into(), "HEAD".into()])?;
        Ok(output.text().trim().to_string())
    }

    fn run(&self, args: Vec<String>) -> Result<GitOutput, GitError> {
        let command = format!("git {}", args.join(" "));
        let result = self.executor.execute("git", &args, &self.root).map_err(|error| {
            GitError::SpawnFailed { command: command.clone(), message: error.to_string() }
        })?;

        if result.success {
            return Ok(GitOutput { stdout: result.stdout, stderr: result.stderr });
        }

        let stderr = if result.stderr.trim().is_empty() {
            String::from_utf8_lossy(&result.stdout).into_owned()
        } else {
            result.stderr
        };

        Err(GitError::CommandFailed { command, code: result.code, stderr })
    }
}

/// Revision strings come from callers; only plain alphanumeric identifiers
/// (hex ids, `HEAD`) are accepted so a revision can never smuggle command
/// options or pathspecs into git.
pub fn validate_revision(revision: &str) -> Result<(), GitError> {
    let valid = !revision.is_empty()
        && revision.len() <= 64
        && revision.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(GitError::BadRevision { revision: revision.to_string() })
    }
}

fn is_empty_repo(stderr: &str) -> bool {
    // Wording differs across git versions.
    stderr.contains("does not have any commits yet")
        || stderr.contains("bad default revision 'HEAD'")
}

fn is_no_change(stderr: &str) -> bool {
    const MARKERS: &[&str] =
        &["nothing to commit", "nothing added to commit", "no changes added to commit"];
    MARKERS.iter().any(|marker| stderr.contains(marker))
}

fn is_missing_object(stderr: &str) -> bool {
    const MARKERS: &[&str] = &[
        "does not exist",
        "exists on disk, but not in",
        "invalid object name",
        "unknown revision",
        "bad revision",
        "no such path",
        "no such ref",
    ];
    MARKERS.iter().any(|marker| stderr.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Invocation {
        program: String,
        args: Vec<String>,
        cwd: PathBuf,
    }

    #[derive(Clone)]
    struct MockExecutor {
        calls: Arc<Mutex<Vec<Invocation>>>,
        responses: Arc<Mutex<VecDeque<Result<CommandResult, std::io::Error>>>>,
    }

    impl MockExecutor {
        fn new(responses: Vec<Result<CommandResult, std::io::Error>>) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            }
        }

        fn calls(&self) -> Vec<Invocation> {
            self.calls.lock().expect("mock calls lock poisoned").clone()
        }
    }

    impl CommandExecutor for MockExecutor {
        fn execute(
            &self,
            program: &str,
            args: &[String],
            cwd: &Path,
        ) -> Result<CommandResult, std::io::Error> {
            self.calls.lock().expect("mock calls lock poisoned").push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
                cwd: cwd.to_path_buf(),
            });

            self.responses
                .lock()
                .expect("mock responses lock poisoned")
                .pop_front()
                .expect("missing mock response")
        }
    }

    fn ok(stdout: &str) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult {
            success: true,
            code: Some(0),
            stdout: stdout.as_bytes().to_vec(),
            stderr: String::new(),
        })
    }

    fn fail(stderr: &str) -> Result<CommandResult, std::io::Error> {
        Ok(CommandResult {
            success: false,
            code: Some(1),
            stdout: Vec::new(),
            stderr: stderr.to_string(),
        })
    }

    fn author() -> Author {
        Author::new("Ada", "ada@example.com")
    }

    // ── store ───────────────────────────────────────────────────────

    #[test]
    fn store_stages_commits_and_returns_head_revision() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![
            ok(""),          // ls-files (not tracked)
            ok(""),          // add
            ok(""),          // commit
            ok("abc1234\n"), // rev-parse
        ]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let rev = backend.store("docs/intro.md", "# Intro\n", "create intro", &author()).unwrap();

        assert_eq!(rev, "abc1234");
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("docs/intro.md")).unwrap(),
            "# Intro\n"
        );

        let calls = mock.calls();
        assert_eq!(calls[0].args, vec!["ls-files", "--", "docs/intro.md"]);
        assert_eq!(calls[1].args, vec!["add", "--", "docs/intro.md"]);
        assert_eq!(
            calls[2].args,
            vec![
                "-c",
                "user.name=Ada",
                "-c",
                "user.email=ada@example.com",
                "commit",
                "-q",
                "-m",
                "create intro",
                "--author=Ada <ada@example.com>",
                "--",
                "docs/intro.md",
            ]
        );
        assert_eq!(calls[3].args, vec!["rev-parse", "--short", "HEAD"]);
        assert_eq!(calls[0].cwd, tmp.path());
    }

    #[test]
    fn store_rolls_back_new_file_when_commit_fails() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![
            ok(""),                // ls-files (not tracked)
            ok(""),                // add
            fail("disk full"),     // commit
            ok(""),                // rm --cached (rollback)
        ]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let error = backend.store("new.md", "body", "msg", &author()).unwrap_err();

        assert!(matches!(error, GitError::CommandFailed { .. }));
        assert!(!tmp.path().join("new.md").exists(), "failed store must not leave the file");

        let calls = mock.calls();
        assert_eq!(calls[3].args, vec!["rm", "-f", "-q", "--cached", "--", "new.md"]);
    }

    #[test]
    fn store_of_identical_content_returns_current_revision() {
        let tmp = TempDir::new().unwrap();
        let log_record = format!(
            "\u{1e}cafef00\u{1f}{}\u{1f}Ada\u{1f}ada@example.com\u{1f}2024-05-01T10:00:00Z\u{1f}update home\u{1f}\n\nhome.md\n",
            "c".repeat(40)
        );
        let mock = MockExecutor::new(vec![
            ok("home.md\n"),              // ls-files (tracked)
            ok(""),                       // add (no-op)
            fail("nothing to commit, working tree clean"),
            ok(&log_record),              // metadata fallback
        ]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let rev = backend.store("home.md", "same content", "msg", &author()).unwrap();

        assert_eq!(rev, "cafef00");
        // No rollback happened.
        assert_eq!(mock.calls().len(), 4);
    }

    #[test]
    fn store_restores_tracked_file_when_commit_fails() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![
            ok("docs/intro.md\n"), // ls-files (tracked)
            ok(""),                // add
            fail("lock timeout"),  // commit
            ok(""),                // checkout HEAD (rollback)
        ]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let error = backend.store("docs/intro.md", "v2", "msg", &author()).unwrap_err();

        assert!(matches!(error, GitError::CommandFailed { .. }));
        let calls = mock.calls();
        assert_eq!(calls[3].args, vec!["checkout", "HEAD", "--", "docs/intro.md"]);
    }

    // ── remove ──────────────────────────────────────────────────────

    #[test]
    fn remove_deletes_all_paths_in_one_commit() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![
            ok(""),          // rm
            ok(""),          // commit
            ok("beadfee\n"), // rev-parse
        ]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let rev = backend
            .remove(
                &["docs/intro.md".to_string(), "docs/intro".to_string()],
                "delete intro",
                &author(),
            )
            .unwrap();

        assert_eq!(rev, "beadfee");
        let calls = mock.calls();
        assert_eq!(calls[0].args, vec!["rm", "-r", "-q", "--", "docs/intro.md", "docs/intro"]);
        assert!(calls[1].args.contains(&"commit".to_string()));
        assert!(calls[1].args.ends_with(&[
            "--".to_string(),
            "docs/intro.md".to_string(),
            "docs/intro".to_string()
        ]));
    }

    #[test]
    fn remove_requires_at_least_one_path() {
        let tmp = TempDir::new().unwrap();
        let backend = GitBackend::with_executor(tmp.path(), MockExecutor::new(Vec::new()));
        assert_eq!(backend.remove(&[], "msg", &author()).unwrap_err(), GitError::EmptyRemovePaths);
    }

    #[test]
    fn remove_restores_working_tree_when_commit_fails() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![
            ok(""),          // rm
            fail("refused"), // commit
            ok(""),          // checkout restore
        ]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        backend.remove(&["a.md".to_string()], "msg", &author()).unwrap_err();

        let calls = mock.calls();
        assert_eq!(calls[2].args, vec!["checkout", "HEAD", "--", "a.md"]);
    }

    // ── load ────────────────────────────────────────────────────────

    #[test]
    fn load_at_revision_uses_git_show() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![ok("# Intro\n")]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let content = backend.load("docs/intro.md", "abc1234").unwrap();

        assert_eq!(content, "# Intro\n");
        assert_eq!(mock.calls()[0].args, vec!["show", "abc1234:docs/intro.md"]);
    }

    #[test]
    fn load_missing_path_at_revision_is_path_missing() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![fail(
            "fatal: path 'ghost.md' does not exist in 'abc1234'",
        )]);
        let backend = GitBackend::with_executor(tmp.path(), mock);

        assert_eq!(
            backend.load("ghost.md", "abc1234").unwrap_err(),
            GitError::PathMissing { path: "ghost.md".into() }
        );
    }

    #[test]
    fn load_from_working_tree_reads_filesystem() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("home.md"), "welcome").unwrap();
        let backend = GitBackend::with_executor(tmp.path(), MockExecutor::new(Vec::new()));

        assert_eq!(backend.load("home.md", "").unwrap(), "welcome");
        assert_eq!(
            backend.load("missing.md", "").unwrap_err(),
            GitError::PathMissing { path: "missing.md".into() }
        );
    }

    // ── list / log / metadata ───────────────────────────────────────

    #[test]
    fn list_returns_tracked_files_under_prefix() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![ok("docs/a.md\ndocs/b.md\n")]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let files = backend.list("docs/").unwrap();

        assert_eq!(files, vec!["docs/a.md", "docs/b.md"]);
        assert_eq!(mock.calls()[0].args, vec!["ls-files", "--", "docs/"]);
    }

    #[test]
    fn log_on_empty_repository_returns_no_entries() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![fail(
            "fatal: your current branch 'main' does not have any commits yet",
        )]);
        let backend = GitBackend::with_executor(tmp.path(), mock);

        assert!(backend.log("", 50).unwrap().is_empty());
    }

    #[test]
    fn log_limits_and_scopes_to_path() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![ok("")]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        backend.log("docs/intro.md", 25).unwrap();

        let args = &mock.calls()[0].args;
        assert_eq!(args[0], "log");
        assert_eq!(args[1], "-n");
        assert_eq!(args[2], "25");
        assert!(args[3].starts_with("--format="));
        assert_eq!(args[4], "--name-only");
        assert_eq!(&args[5..], ["--", "docs/intro.md"]);
    }

    #[test]
    fn metadata_for_uncommitted_path_is_none() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![ok("")]);
        let backend = GitBackend::with_executor(tmp.path(), mock);

        assert_eq!(backend.metadata("never-committed.md", "").unwrap(), None);
    }

    // ── revision validation ─────────────────────────────────────────

    #[test]
    fn diff_rejects_option_like_revisions_without_spawning() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(Vec::new());
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let error = backend.diff("--help", "abc1234").unwrap_err();

        assert_eq!(error, GitError::BadRevision { revision: "--help".into() });
        assert!(mock.calls().is_empty(), "no git command may run for a bad revision");
    }

    #[test]
    fn revision_validation_accepts_hex_and_head() {
        assert!(validate_revision("abc1234").is_ok());
        assert!(validate_revision(&"f".repeat(40)).is_ok());
        assert!(validate_revision("HEAD").is_ok());
        assert!(validate_revision("").is_err());
        assert!(validate_revision("HEAD~1").is_err());
        assert!(validate_revision("main..dev").is_err());
        assert!(validate_revision("-option").is_err());
    }

    // ── blame / revert ──────────────────────────────────────────────

    #[test]
    fn blame_invokes_porcelain_mode() {
        let tmp = TempDir::new().unwrap();
        let sha = "a".repeat(40);
        let porcelain = format!("{sha} 1 1 1\nauthor Ada\nfilename home.md\n\thello\n");
        let mock = MockExecutor::new(vec![ok(&porcelain)]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let lines = backend.blame("home.md").unwrap();

        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].author, "Ada");
        assert_eq!(mock.calls()[0].args, vec!["blame", "--porcelain", "--", "home.md"]);
    }

    #[test]
    fn revert_aborts_when_inverse_does_not_apply() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![
            fail("error: could not revert abc1234"), // revert --no-commit
            ok(""),                                  // revert --abort
        ]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        backend.revert("abc1234", "undo", &author()).unwrap_err();

        let calls = mock.calls();
        assert_eq!(calls[0].args, vec!["revert", "--no-commit", "--no-edit", "abc1234"]);
        assert_eq!(calls[1].args, vec!["revert", "--abort"]);
    }

    #[test]
    fn revert_commits_with_supplied_message_and_author() {
        let tmp = TempDir::new().unwrap();
        let mock = MockExecutor::new(vec![
            ok(""),          // revert --no-commit
            ok(""),          // commit
            ok("0ddba11\n"), // rev-parse
        ]);
        let backend = GitBackend::with_executor(tmp.path(), mock.clone());

        let rev = backend.revert("abc1234", "undo bad edit", &author()).unwrap();

        assert_eq!(rev, "0ddba11");
        let commit_args = &mock.calls()[1].args;
        assert!(commit_args.contains(&"undo bad edit".to_string()));
        assert!(commit_args.contains(&"--author=Ada <ada@example.com>".to_string()));
    }
}
