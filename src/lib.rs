pub mod config;
pub mod error;
pub mod flv;
pub mod join;
pub mod metadata;
pub mod playlist;
pub mod script;

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

//
// Re-export
//
pub use config::Config;
pub use error::{DemuxError, JoinError, PlaylistError, ScriptError};
pub use flv::{Continuity, FlvHeader, Tag, TagHeader, TagReader, TagType, TagWriter};
pub use join::{FileSummary, JoinConfig, JoinSummary, Joiner, Marks};
pub use metadata::{MetadataPatcher, MetadataRecord};
pub use playlist::{InputEntry, read_playlist};

/// Joins every input named in the playlist into the configured output.
pub fn run(config: Config) -> Result<JoinSummary> {
    debug!(
        little_endian = flv::primitive::HOST_IS_LITTLE_ENDIAN,
        "Host byte order"
    );

    let playlist: Box<dyn BufRead> = match &config.playlist {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open input list {path}"))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let mut join_config = config.join_config();
    let output = config.output()?;

    let summary = if config.writes_to_stdout() {
        if join_config.write_metadata {
            warn!("Output is stdout, metadata disabled");
            join_config.write_metadata = false;
        }
        let mut joiner = Joiner::new(BufWriter::new(io::stdout().lock()), join_config)?;
        join_all(&mut joiner, playlist)?;
        let (_, summary) = joiner.finish_unpatched()?;
        summary
    } else {
        let file = create_output(Path::new(output), config.force)?;
        let mut joiner = Joiner::new(BufWriter::new(file), join_config)?;
        join_all(&mut joiner, playlist)?;
        let (writer, summary) = joiner.finish()?;
        let file = writer
            .into_inner()
            .map_err(|error| error.into_error())
            .with_context(|| format!("Failed to flush output {output}"))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync output {output}"))?;
        summary
    };

    info!(
        files = summary.files_joined,
        skipped = summary.files_skipped,
        tags = summary.tags_written,
        duration_ms = summary.duration_ms,
        bytes = summary.bytes_written,
        "Join complete"
    );
    Ok(summary)
}

/// Opens the output for writing. An existing file is left alone unless
/// `force` is set.
fn create_output(path: &Path, force: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    match options.open(path) {
        Ok(file) => Ok(file),
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
            bail!(
                "Output file {} already exists, use --force to replace it",
                path.display()
            )
        }
        Err(error) => {
            Err(error).with_context(|| format!("Failed to create output {}", path.display()))
        }
    }
}

fn join_all<W: Write>(joiner: &mut Joiner<W>, playlist: impl BufRead) -> Result<()> {
    for entry in read_playlist(playlist) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(PlaylistError::InvalidMark { line, value }) => {
                warn!(line, value = %value, "Invalid mark in input list, skipping line");
                continue;
            }
            Err(error) => return Err(error.into()),
        };
        joiner.append_path(&entry.path, entry.marks)?;
    }
    Ok(())
}
