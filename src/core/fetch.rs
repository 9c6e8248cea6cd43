//! Purpose: Download remote hrefs into the staging directory so the browser loads them same-origin.
//! Exports: `RemoteFetcher`, `ProgressFn`, `local_name_for_href`, `CHUNK_SIZE`.
//! Role: RemoteFetcher; blocking streaming GET with optional fractional progress.
//! Invariants: The local name is the final `/` segment of the URL, query string included.
//! Invariants: Progress is reported only when the response declares a non-zero length.
//! Invariants: No retries and no partial-file cleanup; the first failure is returned.
//! Invariants: A failing progress callback aborts the transfer mid-stream.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::{Error, ErrorKind};
use crate::core::stage::require_dir;

pub const CHUNK_SIZE: usize = 1024;

/// Receives the fraction of the body written so far. An error stops the
/// download and is returned from `fetch` as-is.
pub type ProgressFn<'a> = dyn FnMut(f64) -> Result<(), Error> + 'a;

/// Side-effect-free name computation. Different URLs may map to the same
/// local path.
pub fn local_name_for_href(url: &str, staging_dir: &Path) -> Result<PathBuf, Error> {
    if url.is_empty() {
        return Err(Error::new(ErrorKind::Validation).with_message("url must not be empty"));
    }
    let basename = url.rsplit('/').next().unwrap_or(url);
    if basename.is_empty() {
        return Err(Error::new(ErrorKind::Validation)
            .with_message(format!("url {url:?} has no final path segment to name the file"))
            .with_hint("Point the url at a file, not a directory."));
    }
    Ok(staging_dir.join(basename))
}

#[derive(Clone, Debug)]
pub struct RemoteFetcher {
    agent: ureq::Agent,
}

impl RemoteFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    pub fn fetch(
        &self,
        url: &str,
        staging_dir: &Path,
        mut on_progress: Option<&mut ProgressFn<'_>>,
    ) -> Result<PathBuf, Error> {
        let local_path = local_name_for_href(url, staging_dir)?;
        require_dir(staging_dir)?;

        let response = match self.agent.get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(Error::new(ErrorKind::Transfer)
                    .with_message(format!("server rejected download of {url}"))
                    .with_status(code));
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(Error::new(ErrorKind::Transfer)
                    .with_message(format!("request for {url} failed"))
                    .with_source(err));
            }
        };

        let total = response
            .header("Content-Length")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|total| *total > 0);
        debug!(url, total, path = %local_path.display(), "downloading href");

        let file = File::create(&local_path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to create download file")
                .with_path(&local_path)
                .with_source(err)
        })?;
        let mut writer = BufWriter::new(file);
        let mut reader = response.into_reader();
        let mut buf = [0u8; CHUNK_SIZE];
        let mut wrote: u64 = 0;
        loop {
            let read = reader.read(&mut buf).map_err(|err| {
                Error::new(ErrorKind::Transfer)
                    .with_message(format!("failed while reading {url}"))
                    .with_path(&local_path)
                    .with_source(err)
            })?;
            if read == 0 {
                break;
            }
            writer.write_all(&buf[..read]).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to write download file")
                    .with_path(&local_path)
                    .with_source(err)
            })?;
            wrote += read as u64;
            if let (Some(total), Some(callback)) = (total, on_progress.as_mut()) {
                callback(wrote as f64 / total as f64)?;
            }
        }
        writer.flush().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to flush download file")
                .with_path(&local_path)
                .with_source(err)
        })?;

        info!(url, bytes = wrote, path = %local_path.display(), "downloaded href");
        Ok(local_path)
    }
}

impl Default for RemoteFetcher {
    fn default() -> Self {
        Self::new()
    }
}
