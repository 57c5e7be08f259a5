//! One extraction run over a Matroska file.
//!
//! The walker yields segment events in file order. The track table creates
//! one extractor per requested track, every block is split into frames and
//! handed to the extractors of its track, and chapters and tags are kept
//! until the end of the file for the cue sheets. Errors of a single track
//! stop that track only; container and output I/O errors stop the run.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use matroska::{Block, ChapterAtom, SegmentEvent, SegmentWalker, Tag, TrackEntry, info::DEFAULT_TIMESTAMP_SCALE};
use tracing::{debug, error, info, warn};

use crate::config::ExtractConfig;
use crate::cuesheet::{cue_sheet_path, write_cue_sheet};
use crate::error::{ExtractError, Result, TrackError, TrackResult};
use crate::extractor::{Extractor, ExtractorState};
use crate::output::{FileId, OutputArena, SinkOpener};
use crate::registry::Registry;
use crate::spec::TrackSpec;
use crate::splitter::{BlockGroupContext, SplitBlock, split_block_group, split_simple_block};

/// An extracted track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    pub track_id: u64,
    pub codec_id: String,
    pub output: PathBuf,
    pub container: &'static str,
    /// Frames handed to the extractor.
    pub frames: u64,
    /// Frames the extractor dropped, such as AVC frames before the first IDR.
    pub skipped_frames: usize,
    /// Key frames found in the bitstream, for video extractors.
    pub keyframes: Option<u64>,
}

/// A track whose extraction was abandoned.
#[derive(Debug)]
pub struct TrackFailure {
    pub track_id: u64,
    pub error: TrackError,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct ExtractReport {
    pub tracks: Vec<TrackSummary>,
    pub failures: Vec<TrackFailure>,
    pub cue_sheets: Vec<PathBuf>,
    /// Requested track IDs absent from the track table.
    pub missing_tracks: Vec<u64>,
}

impl ExtractReport {
    /// Whether every created track was extracted without error.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Extracts the tracks in `specs` from the file at `input`.
pub fn extract_file(input: &Path, specs: Vec<TrackSpec>, config: ExtractConfig) -> Result<ExtractReport> {
    let file = File::open(input).map_err(|source| ExtractError::Input {
        path: input.to_path_buf(),
        source,
    })?;

    info!(input = %input.display(), tracks = specs.len(), "Opened input file");
    Extraction::new(config).run(BufReader::new(file), specs)
}

/// Builder for an extraction run.
pub struct Extraction {
    config: ExtractConfig,
    registry: Registry,
    arena: OutputArena,
}

impl Extraction {
    /// Run with the built-in extractors, writing to files on disk.
    pub fn new(config: ExtractConfig) -> Self {
        Self {
            config,
            registry: Registry::default(),
            arena: OutputArena::new(),
        }
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Creates output files through `opener` instead of on disk.
    pub fn with_opener(mut self, opener: SinkOpener) -> Self {
        self.arena = OutputArena::with_opener(opener);
        self
    }

    pub fn run<R: Read + Seek>(self, mut reader: R, specs: Vec<TrackSpec>) -> Result<ExtractReport> {
        let input_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let mut walker = SegmentWalker::open(reader)?.with_max_element_size(self.config.max_element_size);
        let mut context = ExtractContext::new(self, specs, input_len);

        if let Err(err) = context.walk(&mut walker) {
            if let Err(close_err) = context.arena.close_all() {
                debug!(error = %close_err, "Failed to close output files after error");
            }
            return Err(err);
        }

        context.finish()
    }
}

struct ActiveTrack {
    track_id: u64,
    codec_id: String,
    output: PathBuf,
    container: &'static str,
    default_duration: Option<u64>,
    extractor: Box<dyn Extractor>,
    file: FileId,
    is_master: bool,
    state: ExtractorState,
    frames: u64,
    skipped_frames: usize,
}

/// State of one run.
struct ExtractContext {
    config: ExtractConfig,
    registry: Registry,
    arena: OutputArena,
    specs: Vec<TrackSpec>,
    tracks: Vec<ActiveTrack>,
    tracks_seen: bool,
    table: HashSet<u64>,
    timestamp_scale: u64,
    cluster_timestamp: u64,
    clusters: u64,
    input_len: u64,
    chapters: Vec<ChapterAtom>,
    tags: Vec<Tag>,
    report: ExtractReport,
}

impl ExtractContext {
    fn new(extraction: Extraction, specs: Vec<TrackSpec>, input_len: u64) -> Self {
        Self {
            config: extraction.config,
            registry: extraction.registry,
            arena: extraction.arena,
            specs,
            tracks: Vec::new(),
            tracks_seen: false,
            table: HashSet::new(),
            timestamp_scale: DEFAULT_TIMESTAMP_SCALE,
            cluster_timestamp: 0,
            clusters: 0,
            input_len,
            chapters: Vec::new(),
            tags: Vec::new(),
            report: ExtractReport::default(),
        }
    }

    fn walk<R: Read + Seek>(&mut self, walker: &mut SegmentWalker<R>) -> Result<()> {
        while let Some(event) = walker.next_event()? {
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: SegmentEvent) -> Result<()> {
        match event {
            SegmentEvent::Info(info) => {
                self.timestamp_scale = info.timestamp_scale;
                debug!(timestamp_scale = info.timestamp_scale, "Segment info");
            }
            SegmentEvent::Tracks(entries) => self.handle_tracks(entries)?,
            SegmentEvent::ClusterStart { position } => {
                self.cluster_timestamp = 0;
                self.clusters += 1;
                self.report_progress(position);
            }
            SegmentEvent::ClusterTimestamp(timestamp) => self.cluster_timestamp = timestamp,
            SegmentEvent::SimpleBlock(block) => self.handle_block(block, None)?,
            SegmentEvent::BlockGroup(group) => {
                let (block, context) =
                    BlockGroupContext::from_group(group, self.cluster_timestamp, self.timestamp_scale);
                self.handle_block(block, Some(context))?;
            }
            SegmentEvent::CorruptBlock {
                track_number,
                position,
                reason,
            } => self.handle_corrupt_block(track_number, position, reason)?,
            SegmentEvent::Chapters(editions) => {
                for edition in editions {
                    self.chapters.extend(edition.atoms);
                }
            }
            SegmentEvent::Tags(tags) => self.tags.extend(tags),
        }
        Ok(())
    }

    fn report_progress(&self, position: u64) {
        let interval = self.config.progress_interval;
        if interval == 0 || self.clusters % interval != 0 || self.input_len == 0 {
            return;
        }

        let percent = position.saturating_mul(100) / self.input_len;
        info!(progress = percent, clusters = self.clusters, "Extraction progress: {percent}%");
    }

    fn handle_tracks(&mut self, entries: Vec<TrackEntry>) -> Result<()> {
        if self.tracks_seen {
            debug!("Ignoring additional Tracks element");
            return Ok(());
        }
        self.tracks_seen = true;

        for entry in &entries {
            if entry.number == 0 {
                debug!("Ignoring track entry with track number 0");
                continue;
            }

            if !self.table.insert(entry.number) {
                warn!(
                    track_id = entry.number,
                    "Track number occurs more than once, ignoring the later entry"
                );
                continue;
            }

            for index in 0..self.specs.len() {
                if self.specs[index].track_id != entry.number {
                    continue;
                }
                self.specs[index].track_uid = entry.uid;
                self.create_track(entry, index)?;
            }
        }

        Ok(())
    }

    /// Builds the extractor of `specs[spec_index]` and opens or joins its
    /// output file.
    fn create_track(&mut self, entry: &TrackEntry, spec_index: usize) -> Result<()> {
        let track_id = entry.number;
        let output = self.specs[spec_index].output.clone();

        let mut extractor = match self.registry.create(entry, &self.config) {
            Ok(extractor) => extractor,
            Err(err) => {
                self.record_failure(track_id, err);
                return Ok(());
            }
        };
        let container = extractor.container_name();

        let (file, is_master) = match self.arena.find(&output) {
            Some(file) => {
                let joinable = extractor.is_shareable()
                    && self.arena.is_shareable(file)
                    && self.arena.container(file) == container;
                if !joinable {
                    let master = self.arena.container(file);
                    self.record_failure(track_id, TrackError::OutputConflict { path: output, master });
                    return Ok(());
                }
                (file, false)
            }
            None => {
                let file = self
                    .arena
                    .open(&output, container, extractor.is_shareable())
                    .map_err(|source| ExtractError::Output {
                        path: output.clone(),
                        source,
                    })?;
                (file, true)
            }
        };

        let created = match (is_master, self.arena.sink(file)) {
            (false, _) => Ok(()),
            (true, Some(sink)) => extractor.create_file(entry, sink),
            (true, None) => Err(TrackError::State("output file already closed")),
        };

        self.tracks.push(ActiveTrack {
            track_id,
            codec_id: entry.codec_id.clone(),
            output,
            container,
            default_duration: entry.default_duration,
            extractor,
            file,
            is_master,
            state: ExtractorState::Created,
            frames: 0,
            skipped_frames: 0,
        });
        let index = self.tracks.len() - 1;

        if let Err(err) = created {
            return self.track_failed(index, err);
        }

        let track = &mut self.tracks[index];
        track.state = ExtractorState::HeaderReceived;
        info!(
            track_id,
            codec_id = %track.codec_id,
            output = %track.output.display(),
            container,
            "Extracting track {track_id} with the codec ID '{}' to the file '{}'. Container format: {container}",
            track.codec_id,
            track.output.display()
        );
        Ok(())
    }

    fn handle_block(&mut self, block: Block, context: Option<BlockGroupContext>) -> Result<()> {
        for index in 0..self.tracks.len() {
            let track = &self.tracks[index];
            if track.track_id != block.track_number || !track.state.accepts_frames() {
                continue;
            }

            let split = match &context {
                Some(context) => split_block_group(block.clone(), context.clone(), track.default_duration),
                None => split_simple_block(
                    block.clone(),
                    self.cluster_timestamp,
                    self.timestamp_scale,
                    track.default_duration,
                ),
            };

            if let Err(err) = self.deliver(index, split) {
                self.track_failed(index, err)?;
            }
        }
        Ok(())
    }

    /// Fails the tracks a corrupt block belongs to. Blocks of other track
    /// numbers are dropped.
    fn handle_corrupt_block(&mut self, track_number: Option<u64>, position: u64, reason: String) -> Result<()> {
        let Some(track_number) = track_number else {
            warn!(position, %reason, "Skipping a block without a readable track number");
            return Ok(());
        };

        for index in 0..self.tracks.len() {
            let track = &self.tracks[index];
            if track.track_id != track_number || !track.state.accepts_frames() {
                continue;
            }
            let err = TrackError::CorruptBlock {
                position,
                reason: reason.clone(),
            };
            self.track_failed(index, err)?;
        }
        Ok(())
    }

    fn deliver(&mut self, index: usize, split: SplitBlock) -> TrackResult<()> {
        let track = &mut self.tracks[index];
        let sink = self
            .arena
            .sink(track.file)
            .ok_or(TrackError::State("output file already closed"))?;

        if let Some(state) = &split.codec_state {
            track.extractor.handle_codec_state(state, sink)?;
        }

        for frame in split.frames {
            track.extractor.handle_frame(frame, sink)?;
            track.frames += 1;
        }
        track.state = ExtractorState::Extracting;

        Self::collect_skipped(track);
        Ok(())
    }

    fn collect_skipped(track: &mut ActiveTrack) {
        if let Some(skipped) = track.extractor.take_skipped_frames() {
            warn!(
                track_id = track.track_id,
                skipped,
                "{skipped} frames before the first key frame of track {} were skipped",
                track.track_id
            );
            track.skipped_frames += skipped;
        }
    }

    /// Marks `tracks[index]` as failed. I/O errors on the output abort the
    /// run.
    fn track_failed(&mut self, index: usize, err: TrackError) -> Result<()> {
        let track = &mut self.tracks[index];
        track.state = ExtractorState::Failed;

        if let TrackError::Io(source) = err {
            return Err(ExtractError::Output {
                path: track.output.clone(),
                source,
            });
        }

        let track_id = track.track_id;
        self.record_failure(track_id, err);
        Ok(())
    }

    fn record_failure(&mut self, track_id: u64, err: TrackError) {
        error!(track_id, error = %err, "Track {track_id} will not be extracted");
        self.report.failures.push(TrackFailure { track_id, error: err });
    }

    fn write_cue_sheets(&mut self) -> Result<()> {
        for spec in self.specs.iter().filter(|spec| spec.cuesheet) {
            if !self.table.contains(&spec.track_id) {
                continue;
            }
            if self.chapters.is_empty() {
                warn!(track_id = spec.track_id, "No chapters found, skipping the CUE sheet");
                continue;
            }

            let path = cue_sheet_path(&spec.output);
            let output_error = |source| ExtractError::Output {
                path: path.clone(),
                source,
            };

            info!(
                track_id = spec.track_id,
                path = %path.display(),
                "The CUE sheet for track {} will be written to '{}'",
                spec.track_id,
                path.display()
            );

            let mut sink = self.arena.create_unregistered(&path).map_err(output_error)?;
            write_cue_sheet(&mut sink, &spec.output, &self.chapters, &self.tags, spec.track_uid)
                .map_err(output_error)?;
            sink.close().map_err(output_error)?;
            self.report.cue_sheets.push(path);
        }
        Ok(())
    }

    /// Finishes every track, then the files: followers before masters, and
    /// only masters close.
    fn finish(mut self) -> Result<ExtractReport> {
        for spec in &self.specs {
            if !self.table.contains(&spec.track_id) {
                warn!(track_id = spec.track_id, "Track {} not found in the file", spec.track_id);
                self.report.missing_tracks.push(spec.track_id);
            }
        }

        self.write_cue_sheets()?;

        for index in 0..self.tracks.len() {
            if !self.tracks[index].state.accepts_frames() {
                continue;
            }

            let track = &mut self.tracks[index];
            let finished = match self.arena.sink(track.file) {
                Some(sink) => track.extractor.finish_track(sink),
                None => Err(TrackError::State("output file already closed")),
            };
            Self::collect_skipped(track);

            match finished {
                Ok(()) => track.state = ExtractorState::Finished,
                Err(err) => self.track_failed(index, err)?,
            }
        }

        for masters in [false, true] {
            for index in 0..self.tracks.len() {
                let track = &mut self.tracks[index];
                if track.is_master != masters || track.state != ExtractorState::Finished {
                    continue;
                }

                let finished = match self.arena.sink(track.file) {
                    Some(sink) => track.extractor.finish_file(sink),
                    None => Ok(()),
                };
                if let Err(err) = finished {
                    self.track_failed(index, err)?;
                    continue;
                }

                let track = &self.tracks[index];
                if track.is_master {
                    self.arena.close(track.file).map_err(|source| ExtractError::Output {
                        path: track.output.clone(),
                        source,
                    })?;
                }
            }
        }

        self.arena.close_all()?;

        for track in &self.tracks {
            if track.state != ExtractorState::Finished {
                continue;
            }
            debug!(
                track_id = track.track_id,
                frames = track.frames,
                skipped = track.skipped_frames,
                "Track finished"
            );
            self.report.tracks.push(TrackSummary {
                track_id: track.track_id,
                codec_id: track.codec_id.clone(),
                output: track.output.clone(),
                container: track.container,
                frames: track.frames,
                skipped_frames: track.skipped_frames,
                keyframes: track.extractor.keyframes(),
            });
        }

        Ok(self.report)
    }
}
