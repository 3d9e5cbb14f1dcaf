//! The oracle sub-process supervisor (spec.md §4.5): spawns the configured pre-image server with
//! its server-side channel endpoints exposed as inherited file descriptors, and owns shutdown.

use anyhow::Result;
use command_fds::{CommandFdExt, FdMapping};
use std::{
    io,
    os::fd::AsRawFd,
    path::PathBuf,
    process::{Child, Command},
    time::Duration,
};
use stepvm_core::PreimageOracle;
use stepvm_preimage::{FileChannel, Hint, HintWriter, Hinter, Oracle, OracleClient, ReadWritePair};

/// A [Hint] wrapping a borrowed byte slice, so [stepvm_core::PreimageOracle::hint]'s `&[u8]`
/// contract can be forwarded to [stepvm_preimage::Hinter]'s `impl Hint` one.
struct RawHint<'a>(&'a [u8]);

impl Hint for RawHint<'_> {
    fn hint(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Talks to a sub-process implementing the pre-image oracle wire protocol (spec.md §4.4/§6.3)
/// over the two channel pairs the supervisor created.
pub struct ProcessPreimageOracle {
    preimage_client: OracleClient<ReadWritePair>,
    hint_writer_client: HintWriter,
}

impl ProcessPreimageOracle {
    /// Spawn `cmd args...` with `server_io`'s reader/writer pairs inherited at fd indices 3..6 in
    /// the fixed order hint-read, hint-write, preimage-read, preimage-write (spec.md §6.5). If
    /// `cmd` is empty, no process is spawned and this degrades to a stub (spec.md §4.5): hints
    /// are dropped, pre-image requests fail loudly.
    pub fn start(
        cmd: PathBuf,
        args: &[String],
        client_io: (ReadWritePair, ReadWritePair),
        server_io: &mut [ReadWritePair; 2],
    ) -> Result<(Self, Option<Child>)> {
        let cmd_str = cmd.display().to_string();
        let child = (!cmd_str.is_empty())
            .then(|| {
                crate::info!("starting preimage server process: {} {:?}", cmd.display(), args);

                let fds = [
                    server_io[0].reader().as_raw_fd(),
                    server_io[0].writer().as_raw_fd(),
                    server_io[1].reader().as_raw_fd(),
                    server_io[1].writer().as_raw_fd(),
                ];

                let mut command = Command::new(cmd);
                let command = command
                    .args(args)
                    .stdout(io::stdout())
                    .stderr(io::stderr())
                    .fd_mappings(
                        fds.iter()
                            .enumerate()
                            .map(|(i, fd)| FdMapping {
                                parent_fd: *fd,
                                child_fd: 3 + i as i32,
                            })
                            .collect(),
                    )?;

                command
                    .spawn()
                    .map_err(|e| anyhow::anyhow!("failed to start preimage server process: {e}"))
            })
            .transpose()?;

        Ok((
            Self {
                hint_writer_client: HintWriter::new(client_io.0),
                preimage_client: OracleClient::new(client_io.1),
            },
            child,
        ))
    }

    /// Send an interrupt to `child`, wait up to 10 seconds, then force-kill and reap (spec.md
    /// §4.5). A clean exit is not an error; a non-zero exit is returned as one.
    pub fn shutdown(&mut self, child: &mut Child) -> Result<()> {
        // SAFETY: `child.id()` names a process this supervisor owns exclusively.
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGINT);
        }

        let deadline = Duration::from_secs(10);
        let start = std::time::Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= deadline {
                child.kill()?;
                break child.wait()?;
            }
            std::thread::sleep(Duration::from_millis(50));
        };

        match status.code() {
            Some(0) | None => Ok(()),
            Some(code) => anyhow::bail!("pre-image server exited with code {code}"),
        }
    }
}

impl PreimageOracle for ProcessPreimageOracle {
    fn hint(&mut self, value: &[u8]) {
        // Fire-and-forget: a failed hint write is not fatal to the step (spec.md §4.4).
        let _ = self.hint_writer_client.hint(&RawHint(value));
    }

    fn get(&mut self, key: alloy_primitives::B256) -> Result<Vec<u8>> {
        self.preimage_client.get(key)
    }
}
