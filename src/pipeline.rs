use std::path::PathBuf;
use std::time::Instant;

use crate::album::AlbumMembership;
use crate::config::Config;
use crate::downloader;
use crate::file_utils::{self, CopyStats, PruneStats};
use crate::gate::{Checkpoint, Decision};
use crate::logger::Logger;
use crate::preflight;
use crate::runner::CommandRunner;
use crate::uploader::{self, AlbumMode};

/// The migration steps, in the only order they may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Preflight,
    Authenticate,
    ListAlbums,
    DiscoverMembership,
    Download,
    Materialize,
    Prune,
    UploadFlat,
    UploadAlbums,
}

pub const PHASES: [Phase; 9] = [
    Phase::Preflight,
    Phase::Authenticate,
    Phase::ListAlbums,
    Phase::DiscoverMembership,
    Phase::Download,
    Phase::Materialize,
    Phase::Prune,
    Phase::UploadFlat,
    Phase::UploadAlbums,
];

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Preflight => "preflight checks",
            Phase::Authenticate => "authenticate with iCloud",
            Phase::ListAlbums => "list albums",
            Phase::DiscoverMembership => "collect album filenames",
            Phase::Download => "download all photos",
            Phase::Materialize => "copy photos into album folders",
            Phase::Prune => "remove album photos from downloads",
            Phase::UploadFlat => "upload photos without an album",
            Phase::UploadAlbums => "upload album folders",
        }
    }

    /// Whether the operator gets a chance to stop right before this phase.
    pub fn gated(&self) -> bool {
        matches!(
            self,
            Phase::Download | Phase::Materialize | Phase::Prune | Phase::UploadFlat | Phase::UploadAlbums
        )
    }
}

/// Data handed from one phase to the next.
#[derive(Debug, Default)]
pub struct RunState {
    pub albums: Vec<String>,
    pub membership: AlbumMembership,
    pub copy: CopyStats,
    pub prune: PruneStats,
}

#[derive(Debug)]
pub enum Outcome {
    Completed,
    /// The operator declined to start this phase.
    Aborted(Phase),
    Failed(Phase, anyhow::Error),
}

impl Outcome {
    /// Process exit status: an operator abort is not an error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Completed | Outcome::Aborted(_) => 0,
            Outcome::Failed(..) => 1,
        }
    }
}

#[derive(Debug)]
pub struct Report {
    pub outcome: Outcome,
    pub completed: Vec<Phase>,
    pub state: RunState,
}

impl Report {
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "albums": self.state.membership.len(),
            "album_files": self.state.membership.pair_count(),
            "copy": self.state.copy,
            "prune": self.state.prune,
        })
    }
}

type Locate = fn(&str) -> Option<PathBuf>;

pub struct Pipeline<'a> {
    config: &'a Config,
    runner: &'a dyn CommandRunner,
    logger: &'a Logger,
    gate: Checkpoint,
    locate: Locate,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, runner: &'a dyn CommandRunner, logger: &'a Logger, gate: Checkpoint) -> Self {
        Self {
            config,
            runner,
            logger,
            gate,
            locate: preflight::find_executable,
        }
    }

    #[cfg(test)]
    fn with_locate(mut self, locate: Locate) -> Self {
        self.locate = locate;
        self
    }

    /// Run every phase in order. The first fatal error or operator abort
    /// stops the run; nothing is rolled back.
    pub fn run(mut self) -> Report {
        let mut state = RunState::default();
        let mut completed = Vec::new();

        for phase in PHASES {
            if phase.gated() {
                match self.gate.confirm(phase.label()) {
                    Ok(Decision::Continue) => {}
                    Ok(Decision::Abort) => {
                        self.logger.warn(&format!("Stopped by operator before: {}", phase.label()));
                        return Report {
                            outcome: Outcome::Aborted(phase),
                            completed,
                            state,
                        };
                    }
                    Err(e) => {
                        return Report {
                            outcome: Outcome::Failed(phase, e.context("Failed to read confirmation")),
                            completed,
                            state,
                        };
                    }
                }
            }

            self.logger.phase_start(phase.label());
            let started = Instant::now();
            if let Err(e) = self.run_phase(phase, &mut state) {
                return Report {
                    outcome: Outcome::Failed(phase, e),
                    completed,
                    state,
                };
            }
            self.logger.phase_complete(phase.label(), started.elapsed().as_millis());
            completed.push(phase);
        }

        Report {
            outcome: Outcome::Completed,
            completed,
            state,
        }
    }

    fn run_phase(&self, phase: Phase, state: &mut RunState) -> anyhow::Result<()> {
        let (config, runner, logger) = (self.config, self.runner, self.logger);
        match phase {
            Phase::Preflight => {
                preflight::check_tools(config, self.locate)?;
                preflight::prepare_layout(config)?;
            }
            Phase::Authenticate => downloader::authenticate(runner, config, logger)?,
            Phase::ListAlbums => {
                state.albums = downloader::list_albums(runner, config, logger)?;
                if state.albums.is_empty() {
                    logger.warn("No albums found; every photo will be uploaded without an album.");
                } else {
                    logger.info(&format!("Found albums: {:?}", state.albums));
                }
            }
            Phase::DiscoverMembership => {
                state.membership = downloader::discover_membership(runner, config, logger, &state.albums);
                if !state.membership.is_empty() {
                    logger.info(&format!(
                        "{} albums reference {} files",
                        state.membership.len(),
                        state.membership.union().len()
                    ));
                }
            }
            Phase::Download => {
                downloader::download_all(runner, config, logger)?;
                logger.success("Download finished.");
            }
            Phase::Materialize => {
                state.copy = file_utils::materialize_albums(
                    &config.downloads_dir(),
                    &config.albums_dir(),
                    &state.membership,
                    logger,
                );
                logger.success("Album pictures copied.");
            }
            Phase::Prune => {
                state.prune =
                    file_utils::prune_flat_pool(&config.downloads_dir(), &state.membership.union(), logger);
                logger.success("Album pictures removed from downloads.");
            }
            Phase::UploadFlat => {
                uploader::upload_folder(runner, config, logger, &config.downloads_dir(), AlbumMode::None)?;
                logger.success("Photos without an album uploaded.");
            }
            Phase::UploadAlbums => {
                uploader::upload_folder(runner, config, logger, &config.albums_dir(), AlbumMode::FolderAsAlbum)?;
                logger.success("Album folders uploaded.");
            }
        }
        Ok(())
    }
}
