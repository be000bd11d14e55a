//! Starting and stopping an engine process.
//!
//! [`EngineLauncher`] spawns the engine binary with the command line it
//! expects, then blocks on the session's loading semaphore until the
//! engine reports that its world is loaded. The returned
//! [`EngineProcess`] kills and reaps the child when dropped.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use log::{info, warn};
use simlink_core::{ErrorClass, SessionId};
use simlink_shm::{IpcBackend, ShmError, ShmNaming, SignalError};

// ── LaunchError ────────────────────────────────────────────────────

/// Errors starting the engine.
#[derive(Debug)]
pub enum LaunchError {
    /// The loading semaphore could not be created.
    Semaphore(ShmError),
    /// Waiting on the loading semaphore failed.
    Signal(SignalError),
    /// The binary could not be executed.
    Spawn {
        /// The binary path.
        binary: PathBuf,
        /// The OS failure.
        source: std::io::Error,
    },
    /// The engine did not finish loading in time.
    LoadTimeout {
        /// How long the launcher waited.
        waited: Duration,
    },
}

impl LaunchError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Semaphore(e) => e.class(),
            Self::Signal(e) => e.class(),
            Self::Spawn { .. } => ErrorClass::Resource,
            Self::LoadTimeout { .. } => ErrorClass::Protocol,
        }
    }
}

impl fmt::Display for LaunchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semaphore(e) => write!(f, "loading semaphore: {e}"),
            Self::Signal(e) => write!(f, "waiting for engine to load: {e}"),
            Self::Spawn { binary, source } => {
                write!(f, "cannot start {}: {source}", binary.display())
            }
            Self::LoadTimeout { waited } => write!(
                f,
                "engine did not load within {waited:?}; make sure it is not running as root"
            ),
        }
    }
}

impl Error for LaunchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Semaphore(e) => Some(e),
            Self::Signal(e) => Some(e),
            Self::Spawn { source, .. } => Some(source),
            Self::LoadTimeout { .. } => None,
        }
    }
}

// ── EngineLauncher ─────────────────────────────────────────────────

/// How to start an engine binary.
#[derive(Clone, Debug)]
pub struct EngineLauncher {
    /// Path to the engine binary.
    pub binary: PathBuf,
    /// World (map) to load.
    pub world: String,
    /// Window height and width in pixels. Default: 720 x 1280.
    pub window_size: (u32, u32),
    /// OpenGL major version. Default: 4.
    pub gl_version: u32,
    /// Simulated ticks per engine second. Default: 30.
    pub ticks_per_sec: u32,
    /// Whether the viewport window is shown. Hiding it removes `DISPLAY`
    /// from the child's environment. Default: true.
    pub show_viewport: bool,
    /// Whether engine output is forwarded to this process's stdout and
    /// stderr instead of discarded. Default: false.
    pub verbose: bool,
}

impl EngineLauncher {
    /// A launcher with default window and timing settings.
    pub fn new(binary: impl Into<PathBuf>, world: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            world: world.into(),
            window_size: (720, 1280),
            gl_version: 4,
            ticks_per_sec: 30,
            show_viewport: true,
            verbose: false,
        }
    }

    /// The engine's command-line arguments for `session`.
    pub fn args(&self, session: &SessionId) -> Vec<String> {
        let (height, width) = self.window_size;
        vec![
            self.world.clone(),
            "-HolodeckOn".to_string(),
            format!("-opengl{}", self.gl_version),
            "-LOG=HolodeckLog.txt".to_string(),
            format!("-ResX={width}"),
            format!("-ResY={height}"),
            format!("--HolodeckUUID={session}"),
            format!("-TicksPerSec={}", self.ticks_per_sec),
        ]
    }

    /// The process command, ready to spawn.
    pub fn command(&self, session: &SessionId) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args(session));
        if !self.show_viewport {
            cmd.env_remove("DISPLAY");
        }
        if self.verbose {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        cmd
    }

    /// Start the engine and wait until it has loaded.
    ///
    /// The loading semaphore is created before the child starts and
    /// unlinked afterwards whatever the outcome. On timeout the child is
    /// killed.
    pub fn launch(
        &self,
        backend: &dyn IpcBackend,
        naming: &ShmNaming,
        load_timeout: Duration,
    ) -> Result<EngineProcess, LaunchError> {
        let sem_name = naming.loading_semaphore();
        let loading = backend
            .create_semaphore(&sem_name, 0)
            .map_err(LaunchError::Semaphore)?;

        let result = self.spawn_and_wait(&*loading, naming.session(), load_timeout);
        if let Err(e) = backend.unlink_semaphore(&sem_name) {
            warn!("failed to unlink loading semaphore {sem_name}: {e}");
        }
        result
    }

    fn spawn_and_wait(
        &self,
        loading: &dyn simlink_shm::Semaphore,
        session: &SessionId,
        load_timeout: Duration,
    ) -> Result<EngineProcess, LaunchError> {
        let child = self
            .command(session)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;
        let process = EngineProcess { child: Some(child) };
        info!(
            "started engine {} (pid {:?}) for world '{}'",
            self.binary.display(),
            process.id(),
            self.world
        );

        // On error `process` is dropped, which kills the child.
        match loading.wait(Some(load_timeout)) {
            Ok(true) => Ok(process),
            Ok(false) => Err(LaunchError::LoadTimeout {
                waited: load_timeout,
            }),
            Err(e) => Err(LaunchError::Signal(e)),
        }
    }
}

// ── EngineProcess ──────────────────────────────────────────────────

/// A running engine child process.
#[derive(Debug)]
pub struct EngineProcess {
    child: Option<Child>,
}

impl EngineProcess {
    /// OS process id, until the process is killed.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Kill and reap the process. Idempotent.
    pub fn kill(&mut self) -> std::io::Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            child.kill()?;
        }
        child.wait()?;
        info!("engine process {} stopped", child.id());
        Ok(())
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            warn!("failed to stop engine process: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simlink_shm::InProcessIpc;

    #[test]
    fn args_follow_engine_convention() {
        let mut launcher = EngineLauncher::new("/opt/engine", "SimpleWorld");
        launcher.window_size = (480, 640);
        launcher.ticks_per_sec = 60;
        let args = launcher.args(&SessionId::new("abc"));
        assert_eq!(
            args,
            vec![
                "SimpleWorld",
                "-HolodeckOn",
                "-opengl4",
                "-LOG=HolodeckLog.txt",
                "-ResX=640",
                "-ResY=480",
                "--HolodeckUUID=abc",
                "-TicksPerSec=60",
            ]
        );
    }

    #[test]
    fn hidden_viewport_drops_display() {
        let mut launcher = EngineLauncher::new("/opt/engine", "W");
        launcher.show_viewport = false;
        let cmd = launcher.command(&SessionId::new("s"));
        let removed = cmd
            .get_envs()
            .any(|(k, v)| k == std::ffi::OsStr::new("DISPLAY") && v.is_none());
        assert!(removed);
    }

    #[test]
    fn missing_binary_is_spawn_error() {
        let ipc = InProcessIpc::new();
        let naming = ShmNaming::new(SessionId::new("missing"));
        let err = EngineLauncher::new("/nonexistent/engine-binary", "W")
            .launch(&ipc, &naming, Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, LaunchError::Spawn { .. }));
        assert_eq!(err.class(), ErrorClass::Resource);
        assert_eq!(ipc.semaphore_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn silent_engine_times_out() {
        let ipc = InProcessIpc::new();
        let naming = ShmNaming::new(SessionId::new("slow"));
        let err = EngineLauncher::new("true", "W")
            .launch(&ipc, &naming, Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, LaunchError::LoadTimeout { .. }));
        assert_eq!(ipc.semaphore_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn loading_signal_completes_launch() {
        let ipc = InProcessIpc::new();
        let naming = ShmNaming::new(SessionId::new("ok"));
        let sem_name = naming.loading_semaphore();
        let engine_ipc = ipc.clone();
        let signaller = std::thread::spawn(move || loop {
            if let Ok(sem) = engine_ipc.open_semaphore(&sem_name) {
                sem.post().unwrap();
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        });
        let mut process = EngineLauncher::new("sleep", "5")
            .launch(&ipc, &naming, Duration::from_secs(5))
            .unwrap();
        signaller.join().unwrap();
        assert!(process.id().is_some());
        process.kill().unwrap();
        assert!(process.id().is_none());
        process.kill().unwrap();
    }
}
