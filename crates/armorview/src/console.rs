//! Background worker that fetches raw text for the tabs.
//!
//! ```text
//! Control thread                   Console thread
//! ──────────────                   ──────────────
//! send_refresh_message(kind) ───►  DataSource::fetch(kind)
//!                                    │
//! try_recv() ◄──── ConsoleReply ─────┘
//!   └─► controller.ingest(text)
//! ```
//!
//! Requests are served one at a time in arrival order, so replies come back
//! in the order the refreshes were requested. Dropping the [`Console`] stops
//! the worker after the fetch in progress; queued requests are abandoned.

use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use nix::unistd::Uid;
use thiserror::Error;

use crate::config::PkexecMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshKind {
    Profile,
    Process,
    Logs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleRequest {
    Refresh(RefreshKind),
    /// Switch a profile to another mode, then reply with fresh profile text.
    ChangeProfileStatus {
        profile: String,
        old_status: String,
        new_status: String,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleReply {
    Data { kind: RefreshKind, text: String },
    Failed { kind: RefreshKind, error: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("cannot switch {profile} to {status} mode")]
    UnsupportedStatus { profile: String, status: String },
}

/// Where the console gets its text from, and how it changes profile modes.
pub trait DataSource: Send + 'static {
    fn fetch(&mut self, kind: RefreshKind) -> Result<String, SourceError>;

    fn change_profile_status(
        &mut self,
        profile: &str,
        old_status: &str,
        new_status: &str,
    ) -> Result<(), SourceError>;
}

/// Runs the system tools that list processes, profiles and AppArmor audit
/// messages, and the `aa-*` utilities that change profile modes.
#[derive(Debug, Clone)]
pub struct CommandSource {
    use_pkexec: bool,
}

impl CommandSource {
    pub fn new(mode: PkexecMode) -> Self {
        let use_pkexec = match mode {
            PkexecMode::Always => true,
            PkexecMode::Never => false,
            PkexecMode::Auto => !Uid::effective().is_root(),
        };
        Self { use_pkexec }
    }

    fn run(&self, args: &[&str], privileged: bool) -> Result<String, SourceError> {
        let mut argv: Vec<&str> = Vec::with_capacity(args.len() + 1);
        if privileged && self.use_pkexec {
            argv.push("pkexec");
        }
        argv.extend_from_slice(args);

        let program = argv.join(" ");
        log::debug!("running {program}");
        let output = Command::new(argv[0])
            .args(&argv[1..])
            .output()
            .map_err(|source| SourceError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SourceError::Exit {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl DataSource for CommandSource {
    fn fetch(&mut self, kind: RefreshKind) -> Result<String, SourceError> {
        match kind {
            RefreshKind::Process => self.run(
                &["ps", "-A", "--format", "pid,ppid,user,context,comm"],
                false,
            ),
            RefreshKind::Profile => {
                self.run(&["cat", "/sys/kernel/security/apparmor/profiles"], true)
            }
            RefreshKind::Logs => self.run(
                &[
                    "journalctl",
                    "-b",
                    "_AUDIT_TYPE=1400",
                    "--no-pager",
                    "--output=short-iso",
                ],
                false,
            ),
        }
    }

    fn change_profile_status(
        &mut self,
        profile: &str,
        old_status: &str,
        new_status: &str,
    ) -> Result<(), SourceError> {
        let program = match new_status {
            "enforce" => "aa-enforce",
            "complain" => "aa-complain",
            "disable" => "aa-disable",
            _ => {
                return Err(SourceError::UnsupportedStatus {
                    profile: profile.to_string(),
                    status: new_status.to_string(),
                });
            }
        };
        log::info!("switching {profile} from {old_status} to {new_status}");
        self.run(&[program, profile], true).map(|_| ())
    }
}

fn fetch_reply<S: DataSource>(source: &mut S, kind: RefreshKind) -> ConsoleReply {
    match source.fetch(kind) {
        Ok(text) => ConsoleReply::Data { kind, text },
        Err(err) => {
            log::warn!("refresh of {kind:?} failed: {err}");
            ConsoleReply::Failed {
                kind,
                error: err.to_string(),
            }
        }
    }
}

pub struct Console {
    requests: Sender<ConsoleRequest>,
    replies: Receiver<ConsoleReply>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Console {
    pub fn spawn<S: DataSource>(mut source: S) -> Self {
        let (request_tx, request_rx) = unbounded::<ConsoleRequest>();
        let (reply_tx, reply_rx) = unbounded::<ConsoleReply>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let stop = shutdown.clone();
        let handle = thread::spawn(move || {
            for request in request_rx.iter() {
                if stop.load(Ordering::Acquire) {
                    log::debug!("console stopping, {} request(s) abandoned", request_rx.len() + 1);
                    break;
                }
                let reply = match request {
                    ConsoleRequest::Refresh(kind) => fetch_reply(&mut source, kind),
                    ConsoleRequest::ChangeProfileStatus {
                        profile,
                        old_status,
                        new_status,
                    } => match source.change_profile_status(&profile, &old_status, &new_status) {
                        Ok(()) => fetch_reply(&mut source, RefreshKind::Profile),
                        Err(err) => {
                            log::warn!("changing {profile} to {new_status} failed: {err}");
                            ConsoleReply::Failed {
                                kind: RefreshKind::Profile,
                                error: err.to_string(),
                            }
                        }
                    },
                    ConsoleRequest::Shutdown => break,
                };
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
            log::debug!("console thread exiting");
        });

        Self {
            requests: request_tx,
            replies: reply_rx,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn send_refresh_message(&self, kind: RefreshKind) {
        if self.requests.send(ConsoleRequest::Refresh(kind)).is_err() {
            log::warn!("console thread is gone, dropping refresh of {kind:?}");
        }
    }

    /// Always answered by exactly one [`RefreshKind::Profile`] reply.
    pub fn send_change_profile_status_message(
        &self,
        profile: &str,
        old_status: &str,
        new_status: &str,
    ) {
        let request = ConsoleRequest::ChangeProfileStatus {
            profile: profile.to_string(),
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
        };
        if self.requests.send(request).is_err() {
            log::warn!("console thread is gone, dropping status change of {profile}");
        }
    }

    pub fn try_recv(&self) -> Option<ConsoleReply> {
        self.replies.try_recv().ok()
    }

    #[cfg(test)]
    pub fn replies(&self) -> &Receiver<ConsoleReply> {
        &self.replies
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.requests.send(ConsoleRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    /// Canned text per refresh kind; kinds without text fail. A status
    /// change rewrites the `profile (old)` line of the profile text.
    pub(crate) struct FakeSource {
        pub texts: HashMap<RefreshKind, String>,
        pub delay: Duration,
        pub fetches: Arc<AtomicUsize>,
    }

    impl FakeSource {
        pub(crate) fn new(texts: HashMap<RefreshKind, String>) -> Self {
            Self {
                texts,
                delay: Duration::ZERO,
                fetches: Arc::default(),
            }
        }
    }

    impl DataSource for FakeSource {
        fn fetch(&mut self, kind: RefreshKind) -> Result<String, SourceError> {
            thread::sleep(self.delay);
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.texts.get(&kind).cloned().ok_or(SourceError::Exit {
                program: format!("{kind:?}"),
                status: "exit status: 1".to_string(),
                stderr: "not available".to_string(),
            })
        }

        fn change_profile_status(
            &mut self,
            profile: &str,
            old_status: &str,
            new_status: &str,
        ) -> Result<(), SourceError> {
            let old_line = format!("{profile} ({old_status})");
            let text = self
                .texts
                .get_mut(&RefreshKind::Profile)
                .filter(|text| text.contains(&old_line))
                .ok_or_else(|| SourceError::UnsupportedStatus {
                    profile: profile.to_string(),
                    status: new_status.to_string(),
                })?;
            *text = text.replace(&old_line, &format!("{profile} ({new_status})"));
            Ok(())
        }
    }

    #[test]
    fn test_replies_follow_request_order() {
        let mut texts = HashMap::new();
        texts.insert(RefreshKind::Process, "1 0 root unconfined init".to_string());
        texts.insert(RefreshKind::Profile, "docker-default (enforce)".to_string());
        let console = Console::spawn(FakeSource::new(texts));

        console.send_refresh_message(RefreshKind::Process);
        console.send_refresh_message(RefreshKind::Logs);
        console.send_refresh_message(RefreshKind::Profile);

        let timeout = Duration::from_secs(5);
        let replies: Vec<ConsoleReply> = (0..3)
            .map(|_| console.replies().recv_timeout(timeout).unwrap())
            .collect();

        assert_eq!(
            replies[0],
            ConsoleReply::Data {
                kind: RefreshKind::Process,
                text: "1 0 root unconfined init".to_string()
            }
        );
        assert!(matches!(
            &replies[1],
            ConsoleReply::Failed { kind: RefreshKind::Logs, error } if error.contains("not available")
        ));
        assert!(matches!(
            replies[2],
            ConsoleReply::Data {
                kind: RefreshKind::Profile,
                ..
            }
        ));
        assert!(console.try_recv().is_none());
    }

    #[test]
    fn test_status_change_replies_with_fresh_profiles() {
        let mut texts = HashMap::new();
        texts.insert(
            RefreshKind::Profile,
            "docker-default (enforce)\nfirefox (complain)\n".to_string(),
        );
        let console = Console::spawn(FakeSource::new(texts));
        let timeout = Duration::from_secs(5);

        console.send_change_profile_status_message("firefox", "complain", "enforce");
        assert_eq!(
            console.replies().recv_timeout(timeout).unwrap(),
            ConsoleReply::Data {
                kind: RefreshKind::Profile,
                text: "docker-default (enforce)\nfirefox (enforce)\n".to_string()
            }
        );

        console.send_change_profile_status_message("sshd", "enforce", "complain");
        assert!(matches!(
            console.replies().recv_timeout(timeout).unwrap(),
            ConsoleReply::Failed { kind: RefreshKind::Profile, error } if error.contains("sshd")
        ));
    }

    #[test]
    fn test_drop_abandons_queued_requests() {
        let mut texts = HashMap::new();
        texts.insert(RefreshKind::Process, "1 0 root unconfined init".to_string());
        let mut source = FakeSource::new(texts);
        source.delay = Duration::from_millis(200);
        let fetches = source.fetches.clone();

        let console = Console::spawn(source);
        for _ in 0..20 {
            console.send_refresh_message(RefreshKind::Process);
        }
        console
            .replies()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();

        let started = Instant::now();
        drop(console);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(fetches.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let mut source = CommandSource { use_pkexec: false };
        let err = source
            .change_profile_status("firefox", "complain", "audit")
            .unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedStatus { .. }));
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let source = CommandSource { use_pkexec: false };
        let err = source
            .run(&["armorview-no-such-program-here"], true)
            .unwrap_err();
        assert!(matches!(err, SourceError::Spawn { .. }));
    }
}
